//! Sliding-window flood detection.
//!
//! Counts messages per sender per chat over a rolling window. Crossing
//! the threshold yields a single warning and resets the window, so a
//! sustained flood produces one warning per burst rather than one per
//! message.

use std::time::{Duration, Instant};

use crate::cache::TtlMap;

const WINDOW: Duration = Duration::from_secs(60);
const THRESHOLD: usize = 10;

pub struct AntiSpam {
    windows: TtlMap<String, Vec<Instant>>,
}

impl Default for AntiSpam {
    fn default() -> Self {
        Self::new()
    }
}

impl AntiSpam {
    pub fn new() -> Self {
        Self {
            windows: TtlMap::new(WINDOW),
        }
    }

    /// Record one message; true means the sender just exceeded the
    /// threshold and should be warned. The window resets on a hit.
    pub fn record(&self, chat_id: &str, sender_id: &str) -> bool {
        self.record_at(chat_id, sender_id, Instant::now())
    }

    pub fn record_at(&self, chat_id: &str, sender_id: &str, now: Instant) -> bool {
        let key = format!("{chat_id}:{sender_id}");

        let mut stamps = self.windows.get_at(&key, now).unwrap_or_default();
        stamps.retain(|t| now.duration_since(*t) < WINDOW);
        stamps.push(now);

        // A full window is tolerated; one past it trips the warning.
        if stamps.len() > THRESHOLD {
            self.windows.remove(&key);
            return true;
        }
        // Re-insert to refresh the entry age alongside the newest stamp.
        self.windows.insert_at(key, stamps, now);
        false
    }

    /// Drop stale windows; wired to the periodic maintenance timer.
    pub fn prune(&self) -> usize {
        self.windows.evict_expired()
    }

    pub fn tracked_senders(&self) -> usize {
        self.windows.len()
    }
}
