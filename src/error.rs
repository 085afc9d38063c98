//! Error taxonomy for the bot core.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the connection supervisor and transport boundary.
///
/// Command handlers use `anyhow::Result` and are recovered at the router
/// boundary; these variants cover the lifecycle paths that need to be
/// matched on.
#[derive(Debug, Error)]
pub enum BotError {
    /// No persisted credentials found. The external pairing flow must be
    /// run before the bot can connect.
    #[error("no session found at {0}; run the pairing process first")]
    NoSession(String),

    /// The transport did not reach the Open state within the deadline.
    #[error("connection timeout after {0:?}")]
    ConnectionTimeout(Duration),

    /// The transport closed. Whether this is retryable is decided by the
    /// supervisor's close classification, not here.
    #[error("connection closed: {message} (code {code:?})")]
    ConnectionClosed { code: Option<u16>, message: String },

    /// Credentials were revoked (logout). Terminal until re-pairing.
    #[error("session logged out; re-pairing required")]
    LoggedOut,

    /// Any other failure reported by the transport layer.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),
}
