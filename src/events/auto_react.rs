//! Auto-react.
//!
//! When enabled, the bot reacts to incoming messages with a random emoji
//! from a fixed catalog. A one-second per-sender cooldown keeps bursts
//! from turning into reaction spam. Mode and counters are persisted
//! write-through so a restart picks up where it left off.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::TtlMap;
use crate::storage::JsonStore;
use crate::transport::{InboundMessage, OutboundContent, Transport};

const COOLDOWN: Duration = Duration::from_secs(1);

const EMOJIS: &[&str] = &[
    "👍", "❤️", "😂", "🔥", "👏", "😮", "🎉", "💯", "✨", "🙌",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactMode {
    #[default]
    Off,
    /// React everywhere.
    All,
    /// React in direct chats only.
    DirectOnly,
}

impl ReactMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::All => "on",
            Self::DirectOnly => "dm",
        }
    }

    /// Parse a toggle argument as typed by the owner.
    pub fn parse(arg: &str) -> Option<Self> {
        match arg.to_lowercase().as_str() {
            "off" => Some(Self::Off),
            "on" | "all" => Some(Self::All),
            "dm" | "direct" => Some(Self::DirectOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoReactSettings {
    pub mode: ReactMode,
    pub reactions_sent: u64,
}

pub struct AutoReact {
    transport: Arc<dyn Transport>,
    settings: Mutex<AutoReactSettings>,
    store: JsonStore<AutoReactSettings>,
    cooldown: TtlMap<String, ()>,
}

impl AutoReact {
    pub fn new(transport: Arc<dyn Transport>, data_dir: &Path) -> Self {
        let store: JsonStore<AutoReactSettings> = JsonStore::open(data_dir.join("autoreact.json"));
        let settings = store.load();
        Self {
            transport,
            settings: Mutex::new(settings),
            store,
            cooldown: TtlMap::new(COOLDOWN),
        }
    }

    pub fn mode(&self) -> ReactMode {
        self.settings.lock().mode
    }

    pub fn reactions_sent(&self) -> u64 {
        self.settings.lock().reactions_sent
    }

    /// Switch mode and persist immediately.
    pub fn set_mode(&self, mode: ReactMode) {
        let mut settings = self.settings.lock();
        settings.mode = mode;
        self.store.save(&settings);
    }

    /// React to a message if the mode allows it and the sender is off
    /// cooldown. Returns whether a reaction was sent.
    pub async fn maybe_react(&self, msg: &InboundMessage) -> bool {
        match self.mode() {
            ReactMode::Off => return false,
            ReactMode::DirectOnly if msg.is_group() => return false,
            _ => {}
        }

        if self.cooldown.contains(&msg.sender_id) {
            return false;
        }

        let emoji = EMOJIS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("👍");

        // The send happens outside any lock; only a successful reaction
        // stamps the cooldown and the counter.
        let content = OutboundContent::reaction(emoji, msg.key());
        if let Err(e) = self.transport.send_message(&msg.chat_id, content).await {
            warn!("Auto-react failed for {}: {}", msg.chat_id, e);
            return false;
        }

        self.cooldown.insert(msg.sender_id.clone(), ());
        let mut settings = self.settings.lock();
        settings.reactions_sent += 1;
        self.store.save(&settings);
        debug!("Reacted {} to {}", emoji, msg.id);
        true
    }
}
