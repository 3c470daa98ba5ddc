use anyhow::{Context, Result};
use lopdf::Document;
use tracing::debug;

/// Upper bound on extracted text handed to the generation backend
pub const MAX_EXTRACTED_CHARS: usize = 4000;

/// Converts an attached file into plain text
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// Extracts text from PDF files, page by page, and accepts UTF-8 text files as-is
#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    max_chars: usize,
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self {
            max_chars: MAX_EXTRACTED_CHARS,
        }
    }
}

impl DocumentExtractor {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    fn extract_pdf(bytes: &[u8]) -> Result<String> {
        let doc = Document::load_mem(bytes).context("Failed to parse PDF")?;

        let mut pages = Vec::new();
        for page_number in doc.get_pages().keys() {
            match doc.extract_text(&[*page_number]) {
                Ok(text) if !text.trim().is_empty() => pages.push(text.trim_end().to_string()),
                Ok(_) => debug!("PDF page {} has no text", page_number),
                Err(e) => debug!("Skipping PDF page {}: {}", page_number, e),
            }
        }

        Ok(pages.join("\n"))
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let text = if bytes.starts_with(b"%PDF") {
            Self::extract_pdf(bytes)?
        } else {
            std::str::from_utf8(bytes)
                .context("Document is neither a PDF nor UTF-8 text")?
                .to_string()
        };

        if text.trim().is_empty() {
            anyhow::bail!("Document contains no extractable text");
        }

        Ok(truncate_chars(&text, self.max_chars).to_string())
    }
}

/// First `max` characters of `text`, never splitting a character
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
