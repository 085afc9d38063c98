//! Configuration module for the Caracal bot.
//!
//! Loads configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Display name used in notifications and the status endpoint.
    pub bot_name: String,

    /// Command prefix. A single marker character by convention (".").
    pub prefix: String,

    /// Owner phone number (digits only). Owner-only commands and
    /// anti-delete alerts are keyed to this identity.
    pub owner_phone: String,

    /// Optional display name of the owner.
    pub owner_name: String,

    /// Directory holding the persisted credential blob.
    pub session_dir: PathBuf,

    /// Directory for flat JSON state files (auto-react, deleted store, stats).
    pub data_dir: PathBuf,

    /// Port for the HTTP status surface.
    pub status_port: u16,

    /// Artificial delay applied before command execution.
    pub reply_delay: Duration,

    /// TTL for the anti-delete message cache.
    pub cache_ttl: Duration,

    /// Deadline for a single connect attempt.
    pub connect_timeout: Duration,

    /// Maximum consecutive reconnection attempts before giving up.
    pub max_reconnect_attempts: u32,

    // Feature toggles
    pub anti_delete: bool,
    pub anti_link: bool,
    pub anti_spam: bool,
    pub anti_tag_admin: bool,
    pub auto_read: bool,
    pub cache_messages: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Only `OWNER_PHONE` is required; everything else has a sensible
    /// default.
    ///
    /// # Panics
    /// Panics if `OWNER_PHONE` is not set.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let owner_phone = env::var("OWNER_PHONE").expect("OWNER_PHONE must be set");

        Self {
            bot_name: env::var("BOT_NAME").unwrap_or_else(|_| "Caracal".to_string()),
            prefix: env::var("PREFIX").unwrap_or_else(|_| ".".to_string()),
            owner_phone,
            owner_name: env::var("OWNER_NAME").unwrap_or_default(),
            session_dir: env::var("SESSION_DIR")
                .unwrap_or_else(|_| "./session".to_string())
                .into(),
            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            status_port: env_parse("PORT", 3000),
            reply_delay: Duration::from_millis(env_parse("REPLY_DELAY_MS", 0u64)),
            cache_ttl: Duration::from_secs(env_parse("CACHE_TTL_SECS", 3600u64)),
            connect_timeout: Duration::from_secs(env_parse("CONNECT_TIMEOUT_SECS", 60u64)),
            max_reconnect_attempts: env_parse("MAX_RECONNECT_ATTEMPTS", 10u32),
            anti_delete: env_flag("ANTI_DELETE", true),
            anti_link: env_flag("ANTI_LINK", true),
            anti_spam: env_flag("ANTI_SPAM", true),
            anti_tag_admin: env_flag("ANTI_TAG_ADMIN", false),
            auto_read: env_flag("AUTO_READ", true),
            cache_messages: env_flag("CACHE_MESSAGES", true),
        }
    }

    /// Chat identifier the owner notification channel resolves to.
    pub fn owner_jid(&self) -> String {
        crate::transport::jid::direct_jid(&self.owner_phone)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
impl Config {
    /// Minimal config for tests; no environment access.
    pub fn for_tests(data_dir: PathBuf) -> Self {
        Self {
            bot_name: "Caracal".to_string(),
            prefix: ".".to_string(),
            owner_phone: "254700000001".to_string(),
            owner_name: "Owner".to_string(),
            session_dir: data_dir.join("session"),
            data_dir,
            status_port: 0,
            reply_delay: Duration::ZERO,
            cache_ttl: Duration::from_secs(3600),
            connect_timeout: Duration::from_secs(60),
            max_reconnect_attempts: 10,
            anti_delete: true,
            anti_link: true,
            anti_spam: true,
            anti_tag_admin: true,
            auto_read: false,
            cache_messages: true,
        }
    }
}
