//! Connection supervisor.
//!
//! Owns the socket lifecycle: starting the transport, waiting for the
//! session to open, pumping events to the dispatcher, classifying closes
//! and scheduling reconnects with capped exponential backoff. Credential
//! updates and connection updates never leave this module; everything
//! else is forwarded downstream untouched.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::BotError;
use crate::transport::{
    CloseInfo, ConnectionUpdate, OutboundContent, Transport, TransportEvent,
};

/// Where the socket currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }
}

/// Shared, observable connection state. The status server reads this.
pub struct ConnectionState {
    status: RwLock<ConnectionStatus>,
    attempts: AtomicU32,
    last_error: Mutex<Option<String>>,
    connected_at: Mutex<Option<DateTime<Utc>>>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            status: RwLock::new(ConnectionStatus::Disconnected),
            attempts: AtomicU32::new(0),
            last_error: Mutex::new(None),
            connected_at: Mutex::new(None),
        }
    }
}

impl ConnectionState {
    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    pub fn is_open(&self) -> bool {
        self.status() == ConnectionStatus::Open
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Seconds since the session last opened, while open.
    pub fn connected_secs(&self) -> Option<i64> {
        if !self.is_open() {
            return None;
        }
        self.connected_at
            .lock()
            .map(|at| (Utc::now() - at).num_seconds())
    }

    fn set_status(&self, status: ConnectionStatus) {
        *self.status.write() = status;
    }

    fn mark_open(&self) {
        self.set_status(ConnectionStatus::Open);
        self.attempts.store(0, Ordering::Relaxed);
        *self.connected_at.lock() = Some(Utc::now());
    }

    fn record_error(&self, message: &str) {
        *self.last_error.lock() = Some(message.to_string());
    }
}

/// Persisted credential material for the multi-device session.
///
/// Pairing happens out of process; the bot only ever reads the blob at
/// startup and rewrites it when the transport rotates keys.
pub trait CredentialStore: Send + Sync {
    fn exists(&self) -> bool;
    fn save(&self, blob: &[u8]) -> Result<(), BotError>;
}

/// Credential blob as a single file under the session directory.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(session_dir: &Path) -> Self {
        Self {
            path: session_dir.join("creds.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn save(&self, blob: &[u8]) -> Result<(), BotError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, blob)?;
        Ok(())
    }
}

/// What to do after a close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Non-retryable close (credentials revoked). Stay down.
    Fatal,
    /// Retry budget exhausted. Stay down.
    GiveUp,
    /// Schedule another attempt after the given delay.
    RetryAfter(Duration),
}

/// Capped exponential backoff over the reconnect attempt counter.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub growth: f64,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            growth: 1.5,
            cap: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.growth.powi(attempt.saturating_sub(1) as i32);
        let delay = self.base.mul_f64(factor);
        delay.min(self.cap)
    }

    /// Classify a close and, when retryable, compute the next delay.
    /// `attempts_so_far` is the number of reconnects already tried since
    /// the last successful open.
    pub fn decide(&self, close: &CloseInfo, attempts_so_far: u32) -> ReconnectDecision {
        if !is_retryable(close) {
            return ReconnectDecision::Fatal;
        }
        let attempt = attempts_so_far + 1;
        if attempt > self.max_attempts {
            return ReconnectDecision::GiveUp;
        }
        ReconnectDecision::RetryAfter(self.delay(attempt))
    }
}

/// A 401 means the session was logged out remotely; everything else,
/// including closes with no code at all, is worth retrying.
pub fn is_retryable(close: &CloseInfo) -> bool {
    close.code != Some(401)
}

/// The supervisor task. Created once and driven by [`Supervisor::run`].
pub struct Supervisor {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    state: Arc<ConnectionState>,
    policy: BackoffPolicy,
    connect_timeout: Duration,
    owner_jid: String,
    bot_name: String,
    events_tx: mpsc::Sender<TransportEvent>,
    notified_online: AtomicBool,
    shutdown: AtomicBool,
}

impl Supervisor {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        config: &Config,
        events_tx: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            transport,
            credentials,
            state: Arc::new(ConnectionState::default()),
            policy: BackoffPolicy {
                max_attempts: config.max_reconnect_attempts,
                ..BackoffPolicy::default()
            },
            connect_timeout: config.connect_timeout,
            owner_jid: config.owner_jid(),
            bot_name: config.bot_name.clone(),
            events_tx,
            notified_online: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> Arc<ConnectionState> {
        Arc::clone(&self.state)
    }

    /// Fail fast when no session has been paired yet.
    pub fn initialize(&self) -> Result<(), BotError> {
        if !self.credentials.exists() {
            return Err(BotError::NoSession(
                "credential blob missing from session dir".to_string(),
            ));
        }
        Ok(())
    }

    /// Request a graceful stop. The run loop exits after the current
    /// connection winds down.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.state.set_status(ConnectionStatus::Closing);
        if let Err(e) = self.transport.end().await {
            warn!("Transport end failed: {}", e);
        }
        self.state.set_status(ConnectionStatus::Disconnected);
    }

    /// Connect-and-reconnect loop. Returns when shut down, logged out,
    /// or out of retries.
    pub async fn run(&self) {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }

            let close = match self.connect_and_pump().await {
                Ok(close) => close,
                Err(e) => {
                    self.state.record_error(&e.to_string());
                    warn!("Connection attempt failed: {}", e);
                    match e {
                        BotError::LoggedOut => {
                            self.state.set_status(ConnectionStatus::Disconnected);
                            return;
                        }
                        BotError::ConnectionClosed { code, message } => {
                            CloseInfo::new(code, message)
                        }
                        other => CloseInfo::new(None, other.to_string()),
                    }
                }
            };

            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }

            self.state.record_error(&close.message);
            let attempts_so_far = self.state.attempts();
            match self.policy.decide(&close, attempts_so_far) {
                ReconnectDecision::Fatal => {
                    error!("Session logged out ({}); re-pairing required", close.message);
                    self.state.set_status(ConnectionStatus::Disconnected);
                    return;
                }
                ReconnectDecision::GiveUp => {
                    error!(
                        "Giving up after {} reconnection attempts",
                        self.policy.max_attempts
                    );
                    self.state.set_status(ConnectionStatus::Disconnected);
                    return;
                }
                ReconnectDecision::RetryAfter(delay) => {
                    let attempt = attempts_so_far + 1;
                    self.state.attempts.store(attempt, Ordering::Relaxed);
                    info!(
                        "Reconnecting in {:?} (attempt {}/{})",
                        delay, attempt, self.policy.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One full connection: start the socket, wait for Open within the
    /// deadline, then pump events until the stream closes.
    async fn connect_and_pump(&self) -> Result<CloseInfo, BotError> {
        self.state.set_status(ConnectionStatus::Connecting);
        let mut rx = self.transport.start().await?;

        self.wait_for_open(&mut rx).await?;
        Ok(self.pump(&mut rx).await)
    }

    async fn wait_for_open(
        &self,
        rx: &mut mpsc::Receiver<TransportEvent>,
    ) -> Result<(), BotError> {
        let deadline = tokio::time::sleep(self.connect_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    return Err(BotError::ConnectionTimeout(self.connect_timeout));
                }
                event = rx.recv() => match event {
                    Some(TransportEvent::Connection(ConnectionUpdate::Open)) => {
                        self.on_open().await;
                        return Ok(());
                    }
                    Some(TransportEvent::Connection(ConnectionUpdate::Close(info))) => {
                        if !is_retryable(&info) {
                            return Err(BotError::LoggedOut);
                        }
                        return Err(BotError::ConnectionClosed {
                            code: info.code,
                            message: info.message,
                        });
                    }
                    Some(TransportEvent::Connection(ConnectionUpdate::Connecting)) => {}
                    Some(other) => self.consume(other).await,
                    None => {
                        return Err(BotError::ConnectionClosed {
                            code: None,
                            message: "event stream ended before open".to_string(),
                        });
                    }
                }
            }
        }
    }

    async fn on_open(&self) {
        self.state.mark_open();
        info!("Connection open");

        // One announcement per process, not per reconnect.
        if !self.notified_online.swap(true, Ordering::SeqCst) {
            let text = format!("✅ {} is online", self.bot_name);
            if let Err(e) = self
                .transport
                .send_message(&self.owner_jid, OutboundContent::text(text))
                .await
            {
                warn!("Failed to send online notification: {}", e);
            }
        }
    }

    /// Forward events downstream until the stream closes.
    async fn pump(&self, rx: &mut mpsc::Receiver<TransportEvent>) -> CloseInfo {
        while let Some(event) = rx.recv().await {
            match event {
                TransportEvent::Connection(ConnectionUpdate::Close(info)) => return info,
                TransportEvent::Connection(_) => {}
                other => self.consume(other).await,
            }
        }
        CloseInfo::new(None, "event stream ended".to_string())
    }

    /// Handle a non-connection event: credentials are persisted here,
    /// everything else goes to the dispatcher.
    async fn consume(&self, event: TransportEvent) {
        match event {
            TransportEvent::CredentialsChanged(blob) => {
                if let Err(e) = self.credentials.save(&blob) {
                    error!("Failed to persist credentials: {}", e);
                }
            }
            other => {
                // A closed dispatcher means we are shutting down.
                let _ = self.events_tx.send(other).await;
            }
        }
    }
}
