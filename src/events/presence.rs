//! Presence tracking.
//!
//! Remembers the last observed presence per (chat, user) so commands and
//! observers can ask "is this user typing right now". Entries decay
//! after five minutes; typing itself is only considered live for ten
//! seconds, since pause notifications are frequently lost.

use std::time::{Duration, Instant};

use crate::cache::TtlMap;
use crate::transport::PresenceKind;

const DECAY: Duration = Duration::from_secs(300);
const TYPING_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PresenceRecord {
    pub kind: PresenceKind,
    pub seen_at: Instant,
}

pub struct PresenceTracker {
    map: TtlMap<(String, String), PresenceRecord>,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            map: TtlMap::new(DECAY),
        }
    }

    pub fn note(&self, chat_id: &str, user_id: &str, kind: PresenceKind) {
        self.note_at(chat_id, user_id, kind, Instant::now());
    }

    pub fn note_at(&self, chat_id: &str, user_id: &str, kind: PresenceKind, now: Instant) {
        self.map.insert_at(
            (chat_id.to_string(), user_id.to_string()),
            PresenceRecord { kind, seen_at: now },
            now,
        );
    }

    /// Last observed presence, if it has not decayed.
    pub fn presence_of(&self, chat_id: &str, user_id: &str) -> Option<PresenceKind> {
        self.map
            .get(&(chat_id.to_string(), user_id.to_string()))
            .map(|r| r.kind)
    }

    /// True while a recent composing/recording notification is live.
    pub fn is_typing(&self, chat_id: &str, user_id: &str) -> bool {
        self.is_typing_at(chat_id, user_id, Instant::now())
    }

    pub fn is_typing_at(&self, chat_id: &str, user_id: &str, now: Instant) -> bool {
        self.map
            .get_at(&(chat_id.to_string(), user_id.to_string()), now)
            .is_some_and(|r| {
                matches!(r.kind, PresenceKind::Composing | PresenceKind::Recording)
                    && now.duration_since(r.seen_at) < TYPING_WINDOW
            })
    }

    pub fn prune(&self) -> usize {
        self.map.evict_expired()
    }

    pub fn tracked_count(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_expires_after_the_short_window() {
        let tracker = PresenceTracker::new();
        let t0 = Instant::now();
        tracker.note_at("g@g.us", "u@s.whatsapp.net", PresenceKind::Composing, t0);

        assert!(tracker.is_typing_at("g@g.us", "u@s.whatsapp.net", t0 + Duration::from_secs(5)));
        assert!(!tracker.is_typing_at("g@g.us", "u@s.whatsapp.net", t0 + Duration::from_secs(11)));
        // The presence record itself is still there, just no longer "typing".
        assert_eq!(
            tracker.presence_of("g@g.us", "u@s.whatsapp.net"),
            Some(PresenceKind::Composing)
        );
    }

    #[test]
    fn paused_is_not_typing() {
        let tracker = PresenceTracker::new();
        let t0 = Instant::now();
        tracker.note_at("g@g.us", "u@s.whatsapp.net", PresenceKind::Paused, t0);
        assert!(!tracker.is_typing_at("g@g.us", "u@s.whatsapp.net", t0));
    }

    #[test]
    fn records_decay() {
        let tracker = PresenceTracker::new();
        let t0 = Instant::now();
        tracker.note_at("g@g.us", "u@s.whatsapp.net", PresenceKind::Available, t0);
        tracker.note_at(
            "g@g.us",
            "v@s.whatsapp.net",
            PresenceKind::Available,
            t0 + Duration::from_secs(200),
        );

        assert_eq!(tracker.map.evict_expired_at(t0 + DECAY), 1);
        assert_eq!(tracker.tracked_count(), 1);
    }
}
