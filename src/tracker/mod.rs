//! Anti-delete message tracker.
//!
//! Keeps a TTL-bounded snapshot of every message seen, so that later
//! update and delete notifications can be resolved against the original
//! content. The tracker itself is a pure state machine: it classifies
//! each notification and returns an outcome, and the dispatcher decides
//! what to send (see [`alerts`]).

pub mod alerts;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::TtlMap;
use crate::storage::JsonStore;
use crate::transport::{InboundMessage, MessageKey};

/// How many deleted messages the persisted store keeps (FIFO-trimmed).
const DELETED_STORE_CAP: usize = 1000;

/// Cached copy of a message as it was last seen.
#[derive(Debug, Clone)]
pub struct MessageSnapshot {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    pub has_media: bool,
    pub is_group: bool,
    pub captured_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub edits: Vec<EditRecord>,
}

/// One detected edit.
#[derive(Debug, Clone)]
pub struct EditRecord {
    pub old_text: String,
    pub new_text: String,
    /// Who performed the edit, when the notification carried it.
    pub editor: Option<String>,
    pub at: DateTime<Utc>,
}

/// A message recovered at delete time, persisted for later lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub deleted_by: Option<String>,
    pub text: String,
    pub has_media: bool,
    pub was_edited: bool,
    pub deleted_at: DateTime<Utc>,
}

/// Lifetime counters, persisted across restarts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TrackerStats {
    pub messages_seen: u64,
    pub edits_detected: u64,
    pub deletes_detected: u64,
}

/// Classification of an update notification.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The referenced message was never cached (or already expired).
    Uncached,
    /// Text identical to the cached copy; duplicate delivery.
    Unchanged,
    /// New text empty while the cached copy had content. Likely a delete
    /// arriving as an edit; suppressed rather than reported as an edit.
    Suppressed,
    /// A genuine content change.
    Edited(EditRecord),
}

/// Classification of a delete notification.
#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    Uncached,
    Deleted(DeletedMessage),
}

/// The tracker proper. Cheap to clone is not needed; it lives behind an
/// `Arc` in the app state.
pub struct MessageTracker {
    cache: TtlMap<String, MessageSnapshot>,
    deleted: Mutex<Vec<DeletedMessage>>,
    deleted_store: JsonStore<Vec<DeletedMessage>>,
    stats: Mutex<TrackerStats>,
    stats_store: JsonStore<TrackerStats>,
}

impl MessageTracker {
    pub fn new(ttl: Duration, data_dir: &Path) -> Self {
        let deleted_store: JsonStore<Vec<DeletedMessage>> =
            JsonStore::open(data_dir.join("deleted.json"));
        let stats_store: JsonStore<TrackerStats> = JsonStore::open(data_dir.join("stats.json"));
        let deleted = deleted_store.load();
        let stats = stats_store.load();
        if !deleted.is_empty() {
            info!("Loaded {} deleted messages from store", deleted.len());
        }
        Self {
            cache: TtlMap::new(ttl),
            deleted: Mutex::new(deleted),
            deleted_store,
            stats: Mutex::new(stats),
            stats_store,
        }
    }

    /// Cache a freshly arrived message. Idempotent; a duplicate delivery
    /// simply overwrites the snapshot with identical content.
    ///
    /// Snapshots key on the message id alone. Ids are unique per chat
    /// upstream; a cross-chat collision overwrites, which we accept.
    pub fn capture(&self, msg: &InboundMessage) {
        let snapshot = MessageSnapshot {
            id: msg.id.clone(),
            chat_id: msg.chat_id.clone(),
            sender_id: msg.sender_id.clone(),
            text: msg.text.clone(),
            has_media: msg.has_media,
            is_group: msg.is_group(),
            captured_at: msg.timestamp,
            edited_at: None,
            edits: Vec::new(),
        };
        self.cache.insert(msg.id.clone(), snapshot);
        self.stats.lock().messages_seen += 1;
    }

    /// Resolve an update notification against the cache.
    pub fn on_update(&self, key: &MessageKey, new_text: &str) -> UpdateOutcome {
        let Some(old) = self.cache.get(&key.id) else {
            debug!("Update for uncached message {}", key.id);
            return UpdateOutcome::Uncached;
        };

        if new_text == old.text {
            return UpdateOutcome::Unchanged;
        }

        if new_text.is_empty() && !old.text.is_empty() {
            debug!("Blank update for {}; treating as possible delete", key.id);
            return UpdateOutcome::Suppressed;
        }

        let record = EditRecord {
            old_text: old.text.clone(),
            new_text: new_text.to_string(),
            editor: key.participant.clone(),
            at: Utc::now(),
        };
        let applied = record.clone();
        self.cache.update(&key.id, |snap| {
            snap.text = record.new_text.clone();
            snap.edited_at = Some(record.at);
            snap.edits.push(record);
        });

        let mut stats = self.stats.lock();
        stats.edits_detected += 1;
        self.stats_store.save(&stats);

        UpdateOutcome::Edited(applied)
    }

    /// Resolve a delete notification against the cache. A hit moves the
    /// snapshot into the persisted deleted store.
    pub fn on_delete(&self, key: &MessageKey) -> DeleteOutcome {
        let Some(snapshot) = self.cache.remove(&key.id) else {
            debug!("Delete for uncached message {}", key.id);
            return DeleteOutcome::Uncached;
        };

        let deleted = DeletedMessage {
            id: snapshot.id,
            chat_id: snapshot.chat_id,
            sender_id: snapshot.sender_id,
            deleted_by: key.participant.clone(),
            text: snapshot.text,
            has_media: snapshot.has_media,
            was_edited: snapshot.edited_at.is_some(),
            deleted_at: Utc::now(),
        };

        {
            let mut store = self.deleted.lock();
            store.push(deleted.clone());
            if store.len() > DELETED_STORE_CAP {
                let excess = store.len() - DELETED_STORE_CAP;
                store.drain(..excess);
            }
            self.deleted_store.save(&store);
        }

        let mut stats = self.stats.lock();
        stats.deletes_detected += 1;
        self.stats_store.save(&stats);

        DeleteOutcome::Deleted(deleted)
    }

    /// Drop snapshots older than the TTL; returns how many were evicted.
    pub fn evict_expired(&self) -> usize {
        let evicted = self.cache.evict_expired();
        if evicted > 0 {
            debug!("Evicted {} expired message snapshots", evicted);
        }
        evicted
    }

    /// Current cached snapshot for a message id, if still live.
    pub fn snapshot(&self, id: &str) -> Option<MessageSnapshot> {
        self.cache.get(&id.to_string())
    }

    /// Look a deleted message up by id.
    pub fn recover(&self, id: &str) -> Option<DeletedMessage> {
        self.deleted.lock().iter().rev().find(|d| d.id == id).cloned()
    }

    /// Most recent deletions in a chat, newest first.
    pub fn recent_deleted(&self, chat_id: &str, limit: usize) -> Vec<DeletedMessage> {
        self.deleted
            .lock()
            .iter()
            .rev()
            .filter(|d| d.chat_id == chat_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.lock().len()
    }

    pub fn stats(&self) -> TrackerStats {
        *self.stats.lock()
    }

    /// Persist the counters; called on shutdown so the messages-seen
    /// count survives without a write per message.
    pub fn flush_stats(&self) {
        self.stats_store.save(&self.stats.lock());
    }
}
