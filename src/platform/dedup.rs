//! Remembers recently delivered update ids so a redelivered update is not
//! answered twice.

use std::collections::HashMap;
use std::time::{Duration, Instant};

const DEDUP_TTL_SECS: u64 = 300;
const DEDUP_MAX_ENTRIES: usize = 2000;

#[derive(Debug)]
pub struct UpdateDedup {
    seen: HashMap<u32, Instant>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for UpdateDedup {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEDUP_TTL_SECS), DEDUP_MAX_ENTRIES)
    }
}

impl UpdateDedup {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            seen: HashMap::new(),
            ttl,
            max_entries,
        }
    }

    /// `true` if `update_id` was already seen within the TTL.
    /// On first sight the id is recorded and `false` is returned.
    pub fn is_duplicate(&mut self, update_id: u32) -> bool {
        let now = Instant::now();

        if self.seen.len() >= self.max_entries {
            self.seen.retain(|_, at| now.duration_since(*at) < self.ttl);
        }
        if self.seen.len() >= self.max_entries {
            if let Some(oldest) = self
                .seen
                .iter()
                .min_by_key(|(_, at)| **at)
                .map(|(id, _)| *id)
            {
                self.seen.remove(&oldest);
            }
        }

        if let Some(at) = self.seen.get(&update_id) {
            if now.duration_since(*at) < self.ttl {
                return true;
            }
        }

        self.seen.insert(update_id, now);
        false
    }
}
