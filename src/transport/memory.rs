//! In-memory transport.
//!
//! Stands in for the real socket wrapper: records every outbound call and
//! lets callers inject inbound events. Used by the test suite and as the
//! default event source when no protocol adapter is wired in.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{
    CloseInfo, ConnectionUpdate, GroupMetadata, GroupParticipant, MessageKey, OutboundContent,
    PresenceKind, Transport, TransportEvent,
};
use crate::error::BotError;

/// One recorded `send_message` call.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: String,
    pub content: OutboundContent,
}

/// Transport double backed by channels and call logs.
#[derive(Default)]
pub struct MemoryTransport {
    sender: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    sent: Mutex<Vec<SentMessage>>,
    read_calls: Mutex<Vec<Vec<MessageKey>>>,
    /// Event scripts replayed on successive `start` calls, front first.
    scripts: Mutex<VecDeque<Vec<TransportEvent>>>,
    group_admins: Mutex<HashMap<String, Vec<String>>>,
    fail_sends: AtomicBool,
    start_count: AtomicUsize,
    ended: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose first `start` immediately reports an open
    /// connection.
    pub fn connected() -> Self {
        let t = Self::new();
        t.script(vec![TransportEvent::Connection(ConnectionUpdate::Open)]);
        t
    }

    /// Queue a batch of events to be emitted by the next unclaimed
    /// `start` call.
    pub fn script(&self, events: Vec<TransportEvent>) {
        self.scripts.lock().push_back(events);
    }

    /// Inject an event into the live feed. No-op if `start` has not been
    /// called or the receiver was dropped.
    pub async fn emit(&self, event: TransportEvent) {
        let tx = self.sender.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    /// Emit a connection close with the given code.
    pub async fn emit_close(&self, code: Option<u16>, message: &str) {
        self.emit(TransportEvent::Connection(ConnectionUpdate::Close(
            CloseInfo::new(code, message),
        )))
        .await;
    }

    /// Configure the admin set returned by `group_metadata`.
    pub fn set_group_admins(&self, chat_id: &str, admins: Vec<String>) {
        self.group_admins
            .lock()
            .insert(chat_id.to_string(), admins);
    }

    /// Make every `send_message` call fail until cleared.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, chat_id: &str) -> Vec<SentMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|s| s.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub fn read_calls(&self) -> Vec<Vec<MessageKey>> {
        self.read_calls.lock().clone()
    }

    pub fn start_count(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }

    pub fn was_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn start(&self) -> Result<mpsc::Receiver<TransportEvent>, BotError> {
        self.start_count.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(64);
        *self.sender.lock() = Some(tx.clone());

        let script = self.scripts.lock().pop_front();
        if let Some(events) = script {
            for event in events {
                let _ = tx.send(event).await;
            }
        }

        Ok(rx)
    }

    async fn send_message(&self, chat_id: &str, content: OutboundContent) -> Result<(), BotError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BotError::Transport("send failed".into()));
        }
        self.sent.lock().push(SentMessage {
            chat_id: chat_id.to_string(),
            content,
        });
        Ok(())
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), BotError> {
        self.read_calls.lock().push(keys.to_vec());
        Ok(())
    }

    async fn group_metadata(&self, chat_id: &str) -> Result<GroupMetadata, BotError> {
        let admins = self
            .group_admins
            .lock()
            .get(chat_id)
            .cloned()
            .ok_or_else(|| BotError::Transport(format!("unknown group {chat_id}")))?;

        let participants = admins
            .into_iter()
            .map(|jid| GroupParticipant {
                jid,
                is_admin: true,
            })
            .collect();

        Ok(GroupMetadata {
            id: chat_id.to_string(),
            subject: format!("Group {}", super::jid::short(chat_id)),
            participants,
        })
    }

    async fn presence_update(
        &self,
        _kind: PresenceKind,
        _chat_id: Option<&str>,
    ) -> Result<(), BotError> {
        Ok(())
    }

    async fn end(&self) -> Result<(), BotError> {
        self.ended.store(true, Ordering::SeqCst);
        *self.sender.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_events_then_live_injection() {
        let transport = MemoryTransport::connected();
        let mut rx = transport.start().await.unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(TransportEvent::Connection(ConnectionUpdate::Open))
        ));

        transport.emit_close(Some(503), "stream errored").await;
        match rx.recv().await {
            Some(TransportEvent::Connection(ConnectionUpdate::Close(info))) => {
                assert_eq!(info.code, Some(503));
            }
            other => panic!("expected close, got {other:?}"),
        }

        transport.end().await.unwrap();
        assert!(transport.was_ended());
        // After end the feed is detached; emits go nowhere.
        transport
            .emit(TransportEvent::Connection(ConnectionUpdate::Connecting))
            .await;
        assert!(rx.try_recv().is_err());
    }
}
