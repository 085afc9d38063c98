//! Transport adapter boundary.
//!
//! The actual multi-device protocol (encryption, session handshake, binary
//! framing) lives in an external socket library. This module defines the
//! seam the rest of the bot consumes: a typed event feed plus an outbound
//! send API. Everything above this boundary is transport-agnostic, which
//! is also what makes the pipeline testable against [`memory::MemoryTransport`].

pub mod jid;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::BotError;

/// A single inbound message, already normalized by the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Opaque message identifier. Unique per chat, not globally unique.
    pub id: String,
    /// Chat the message arrived in (group or direct, by suffix).
    pub chat_id: String,
    /// The individual sender (differs from `chat_id` in groups).
    pub sender_id: String,
    /// Extracted body: first non-empty of plain text, extended text, or
    /// media caption. Empty for captionless media.
    pub text: String,
    pub has_media: bool,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn is_group(&self) -> bool {
        jid::is_group(&self.chat_id)
    }

    pub fn key(&self) -> MessageKey {
        MessageKey {
            id: self.id.clone(),
            chat_id: self.chat_id.clone(),
            participant: Some(self.sender_id.clone()),
        }
    }
}

/// Reference to a message, as used by update/delete/read/react calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageKey {
    pub id: String,
    pub chat_id: String,
    /// In groups, the participant the key refers to (e.g. the deleter).
    pub participant: Option<String>,
}

/// Failure descriptor attached to a connection close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Protocol status code, when the transport reported one.
    pub code: Option<u16>,
    pub message: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Lifecycle notifications from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUpdate {
    Connecting,
    Open,
    Close(CloseInfo),
}

/// Presence states, both observed and sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceKind {
    Available,
    Unavailable,
    Composing,
    Recording,
    Paused,
}

/// Everything the socket can hand us, as one typed stream.
///
/// Delivery is at-least-once; duplicates are possible and consumers must
/// be idempotent.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Message(InboundMessage),
    /// A message's content changed (edit, or a delete disguised as an
    /// edit-to-blank; disambiguation happens in the tracker).
    MessageUpdate { key: MessageKey, text: String },
    MessageDelete { keys: Vec<MessageKey> },
    Presence {
        chat_id: String,
        user_id: String,
        kind: PresenceKind,
    },
    Connection(ConnectionUpdate),
    /// New credential material to be persisted by the supervisor.
    CredentialsChanged(Vec<u8>),
}

/// Outbound message content.
#[derive(Debug, Clone, Default)]
pub struct OutboundContent {
    pub text: Option<String>,
    pub mentions: Vec<String>,
    /// When set, this is a reaction: `text` holds the emoji.
    pub react_to: Option<MessageKey>,
    /// Message to quote in the reply.
    pub quote: Option<MessageKey>,
}

impl OutboundContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn reaction(emoji: impl Into<String>, key: MessageKey) -> Self {
        Self {
            text: Some(emoji.into()),
            react_to: Some(key),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_mentions(mut self, mentions: Vec<String>) -> Self {
        self.mentions = mentions;
        self
    }

    #[must_use]
    pub fn quoting(mut self, key: MessageKey) -> Self {
        self.quote = Some(key);
        self
    }
}

/// Group metadata as reported by the transport.
#[derive(Debug, Clone)]
pub struct GroupMetadata {
    pub id: String,
    pub subject: String,
    pub participants: Vec<GroupParticipant>,
}

#[derive(Debug, Clone)]
pub struct GroupParticipant {
    pub jid: String,
    pub is_admin: bool,
}

impl GroupMetadata {
    /// JIDs of all admin participants.
    pub fn admin_jids(&self) -> Vec<String> {
        self.participants
            .iter()
            .filter(|p| p.is_admin)
            .map(|p| p.jid.clone())
            .collect()
    }
}

/// The socket seam. One implementation wraps the real protocol library;
/// the in-memory one drives tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name.
    fn name(&self) -> &str;

    /// Open the socket and start the event feed. May be called again
    /// after a close to establish a fresh connection.
    async fn start(&self) -> Result<mpsc::Receiver<TransportEvent>, BotError>;

    async fn send_message(&self, chat_id: &str, content: OutboundContent) -> Result<(), BotError>;

    /// Mark messages as read (best-effort).
    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), BotError>;

    async fn group_metadata(&self, chat_id: &str) -> Result<GroupMetadata, BotError>;

    async fn presence_update(
        &self,
        kind: PresenceKind,
        chat_id: Option<&str>,
    ) -> Result<(), BotError>;

    /// Graceful shutdown; no events are delivered afterwards.
    async fn end(&self) -> Result<(), BotError>;
}
