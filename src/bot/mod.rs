//! Bot core: shared state and the event loop.
//!
//! The dispatcher is a single task consuming the supervised event stream.
//! Per-event work is short; anything that talks to the transport does so
//! without holding locks, and observer side effects never prevent a
//! command from running.

pub mod server;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheRegistry;
use crate::config::Config;
use crate::connection::ConnectionState;
use crate::events::{anti_link, anti_tag, AntiSpam, AutoReact, PresenceTracker};
use crate::permissions::PermissionChecker;
use crate::router::{self, CommandRegistry};
use crate::tracker::{alerts, DeleteOutcome, MessageTracker, UpdateOutcome};
use crate::transport::{
    InboundMessage, MessageKey, OutboundContent, Transport, TransportEvent, jid,
};

/// Shared handles for everything the pipeline touches. Cloning is cheap;
/// every component sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub transport: Arc<dyn Transport>,
    pub connection: Arc<ConnectionState>,
    pub caches: CacheRegistry,
    pub registry: Arc<CommandRegistry>,
    pub tracker: Arc<MessageTracker>,
    pub permissions: Arc<PermissionChecker>,
    pub auto_react: Arc<AutoReact>,
    pub anti_spam: Arc<AntiSpam>,
    pub presence: Arc<PresenceTracker>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        connection: Arc<ConnectionState>,
    ) -> Self {
        let caches = CacheRegistry::new();
        let tracker = Arc::new(MessageTracker::new(config.cache_ttl, &config.data_dir));
        let permissions = Arc::new(PermissionChecker::new(
            Arc::clone(&transport),
            &caches,
            config.owner_phone.clone(),
        ));
        let auto_react = Arc::new(AutoReact::new(Arc::clone(&transport), &config.data_dir));

        Self {
            config: Arc::new(config),
            transport,
            connection,
            caches,
            registry: Arc::new(CommandRegistry::new()),
            tracker,
            permissions,
            auto_react,
            anti_spam: Arc::new(AntiSpam::new()),
            presence: Arc::new(PresenceTracker::new()),
            started_at: Utc::now(),
        }
    }

    #[cfg(test)]
    pub fn for_tests(
        transport: Arc<crate::transport::memory::MemoryTransport>,
        data_dir: &std::path::Path,
    ) -> Self {
        Self::new(
            Config::for_tests(data_dir.to_path_buf()),
            transport,
            Arc::new(ConnectionState::default()),
        )
    }
}

/// Consume the supervised event stream until it closes.
pub async fn run_event_loop(state: AppState, mut events: mpsc::Receiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        handle_event(&state, event).await;
    }
    info!("Event stream closed; dispatcher exiting");
}

pub async fn handle_event(state: &AppState, event: TransportEvent) {
    match event {
        TransportEvent::Message(msg) => handle_message(state, msg).await,
        TransportEvent::MessageUpdate { key, text } => handle_update(state, key, text).await,
        TransportEvent::MessageDelete { keys } => {
            for key in keys {
                handle_delete(state, key).await;
            }
        }
        TransportEvent::Presence {
            chat_id,
            user_id,
            kind,
        } => state.presence.note(&chat_id, &user_id, kind),
        // Connection and credential events are consumed by the supervisor
        // and never reach this loop.
        TransportEvent::Connection(_) | TransportEvent::CredentialsChanged(_) => {}
    }
}

async fn handle_message(state: &AppState, msg: InboundMessage) {
    if state.config.cache_messages {
        state.tracker.capture(&msg);
    }

    if state.config.auto_read {
        let key = msg.key();
        if let Err(e) = state.transport.read_messages(&[key]).await {
            debug!("Auto-read failed for {}: {}", msg.id, e);
        }
    }

    state.auto_react.maybe_react(&msg).await;

    router::dispatch(state, &msg).await;

    if msg.is_group() {
        observe_group_message(state, &msg).await;
    }
}

/// Moderation observers, run on every inbound group message, commands
/// included. Admin and owner senders are counted by the spam window but
/// never warned, and are exempt from the link and tag checks.
async fn observe_group_message(state: &AppState, msg: &InboundMessage) {
    let is_admin = state
        .permissions
        .is_group_admin(&msg.chat_id, &msg.sender_id)
        .await;

    if state.config.anti_spam
        && state.anti_spam.record(&msg.chat_id, &msg.sender_id)
        && !is_admin
    {
        warn_sender(state, msg, "please slow down, you are sending too many messages.").await;
    }

    if is_admin {
        return;
    }

    if state.config.anti_link {
        if let Some(kind) = anti_link::find_link(&msg.text) {
            warn_sender(state, msg, &format!("sharing a {} is not allowed here.", kind.label()))
                .await;
        }
    }

    if state.config.anti_tag_admin && anti_tag::mentions_admins(&msg.text) {
        warn_sender(state, msg, "please do not mass-tag the admins.").await;
    }
}

async fn warn_sender(state: &AppState, msg: &InboundMessage, reason: &str) {
    let text = format!("⚠️ @{}, {}", jid::phone(&msg.sender_id), reason);
    let content = OutboundContent::text(text).with_mentions(vec![msg.sender_id.clone()]);
    if let Err(e) = state.transport.send_message(&msg.chat_id, content).await {
        warn!("Failed to warn {} in {}: {}", msg.sender_id, msg.chat_id, e);
    }
}

async fn handle_update(state: &AppState, key: MessageKey, text: String) {
    if let UpdateOutcome::Edited(record) = state.tracker.on_update(&key, &text) {
        if state.config.anti_delete {
            if let Some(snapshot) = state.tracker.snapshot(&key.id) {
                alerts::send_edit_alert(
                    state.transport.as_ref(),
                    &state.config.owner_jid(),
                    &snapshot,
                    &record,
                )
                .await;
            }
        }
    }
}

async fn handle_delete(state: &AppState, key: MessageKey) {
    if let DeleteOutcome::Deleted(deleted) = state.tracker.on_delete(&key) {
        if state.config.anti_delete {
            alerts::send_delete_alert(
                state.transport.as_ref(),
                &state.config.owner_jid(),
                &deleted,
            )
            .await;
        }
    }
}

/// Periodic housekeeping: hourly snapshot eviction, five-minute pruning
/// of the sliding windows and presence map. The handles are aborted on
/// shutdown.
pub fn spawn_maintenance(state: &AppState) -> Vec<JoinHandle<()>> {
    let evict = {
        let tracker = Arc::clone(&state.tracker);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(Duration::from_secs(3600));
            timer.tick().await;
            loop {
                timer.tick().await;
                let evicted = tracker.evict_expired();
                debug!("Hourly eviction removed {} snapshots", evicted);
            }
        })
    };

    let prune = {
        let anti_spam = Arc::clone(&state.anti_spam);
        let presence = Arc::clone(&state.presence);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(Duration::from_secs(300));
            timer.tick().await;
            loop {
                timer.tick().await;
                anti_spam.prune();
                presence.prune();
            }
        })
    };

    vec![evict, prune]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::PresenceKind;
    use crate::transport::memory::MemoryTransport;

    fn msg(id: &str, text: &str, chat: &str, sender: &str) -> InboundMessage {
        InboundMessage {
            id: id.to_string(),
            chat_id: chat.to_string(),
            sender_id: sender.to_string(),
            text: text.to_string(),
            has_media: false,
            timestamp: Utc::now(),
        }
    }

    fn harness() -> (AppState, Arc<MemoryTransport>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let state = AppState::for_tests(Arc::clone(&transport), dir.path());
        state.registry.load(crate::plugins::built_in());
        (state, transport, dir)
    }

    #[tokio::test]
    async fn ping_round_trip() {
        let (state, transport, _dir) = harness();

        handle_event(
            &state,
            TransportEvent::Message(msg(".m1", ".ping", "1@s.whatsapp.net", "1@s.whatsapp.net")),
        )
        .await;

        let sent = transport.sent_to("1@s.whatsapp.net");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content.text.as_deref().unwrap().contains("Pong"));
    }

    #[tokio::test]
    async fn delete_raises_owner_alert_with_original_text() {
        let (state, transport, _dir) = harness();
        let owner = state.config.owner_jid();

        let m = msg("m1", "secret plans", "g@g.us", "a@s.whatsapp.net");
        handle_event(&state, TransportEvent::Message(m.clone())).await;
        handle_event(
            &state,
            TransportEvent::MessageDelete {
                keys: vec![MessageKey {
                    id: "m1".to_string(),
                    chat_id: "g@g.us".to_string(),
                    participant: Some("b@s.whatsapp.net".to_string()),
                }],
            },
        )
        .await;

        let alerts = transport.sent_to(&owner);
        assert_eq!(alerts.len(), 1);
        let text = alerts[0].content.text.as_deref().unwrap();
        assert!(text.contains("secret plans"));
        assert!(text.contains("deleted"));
    }

    #[tokio::test]
    async fn uncached_delete_sends_nothing() {
        let (state, transport, _dir) = harness();

        handle_event(
            &state,
            TransportEvent::MessageDelete {
                keys: vec![MessageKey {
                    id: "never-seen".to_string(),
                    chat_id: "g@g.us".to_string(),
                    participant: None,
                }],
            },
        )
        .await;

        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn edit_raises_owner_alert() {
        let (state, transport, _dir) = harness();
        let owner = state.config.owner_jid();

        handle_event(
            &state,
            TransportEvent::Message(msg("m1", "original", "c@s.whatsapp.net", "c@s.whatsapp.net")),
        )
        .await;
        handle_event(
            &state,
            TransportEvent::MessageUpdate {
                key: MessageKey {
                    id: "m1".to_string(),
                    chat_id: "c@s.whatsapp.net".to_string(),
                    participant: None,
                },
                text: "revised".to_string(),
            },
        )
        .await;

        let alerts = transport.sent_to(&owner);
        assert_eq!(alerts.len(), 1);
        let text = alerts[0].content.text.as_deref().unwrap();
        assert!(text.contains("original"));
        assert!(text.contains("revised"));
    }

    #[tokio::test]
    async fn non_admin_link_draws_a_warning() {
        let (state, transport, _dir) = harness();
        transport.set_group_admins("g@g.us", vec!["admin@s.whatsapp.net".to_string()]);

        handle_event(
            &state,
            TransportEvent::Message(msg(
                "m1",
                "join https://chat.whatsapp.com/xyz",
                "g@g.us",
                "user@s.whatsapp.net",
            )),
        )
        .await;

        let sent = transport.sent_to("g@g.us");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content.text.as_deref().unwrap().contains("invite"));
        assert_eq!(sent[0].content.mentions, vec!["user@s.whatsapp.net"]);
    }

    #[tokio::test]
    async fn admins_are_exempt_from_moderation() {
        let (state, transport, _dir) = harness();
        transport.set_group_admins("g@g.us", vec!["admin@s.whatsapp.net".to_string()]);

        handle_event(
            &state,
            TransportEvent::Message(msg(
                "m1",
                "see https://example.com and @admins",
                "g@g.us",
                "admin@s.whatsapp.net",
            )),
        )
        .await;

        // The spam window still counted the admin's message.
        assert_eq!(state.anti_spam.tracked_senders(), 1);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn command_flood_is_moderated() {
        let (state, transport, _dir) = harness();
        transport.set_group_admins("g@g.us", vec!["admin@s.whatsapp.net".to_string()]);

        for i in 0..11 {
            handle_event(
                &state,
                TransportEvent::Message(msg(
                    &format!("m{i}"),
                    ".ping",
                    "g@g.us",
                    "user@s.whatsapp.net",
                )),
            )
            .await;
        }

        let warnings: Vec<_> = transport
            .sent_to("g@g.us")
            .into_iter()
            .filter(|s| s.content.text.as_deref().unwrap_or("").contains("slow down"))
            .collect();
        assert_eq!(warnings.len(), 1);
        // The warning reset the sender's window.
        assert_eq!(state.anti_spam.tracked_senders(), 0);
    }

    #[tokio::test]
    async fn links_in_command_text_are_checked() {
        let (state, transport, _dir) = harness();
        transport.set_group_admins("g@g.us", vec!["admin@s.whatsapp.net".to_string()]);

        handle_event(
            &state,
            TransportEvent::Message(msg(
                "m1",
                ".ping https://example.com",
                "g@g.us",
                "user@s.whatsapp.net",
            )),
        )
        .await;

        // The command ran and the observer still flagged the link.
        let sent = transport.sent_to("g@g.us");
        let texts: Vec<_> = sent
            .iter()
            .filter_map(|s| s.content.text.as_deref())
            .collect();
        assert!(texts.iter().any(|t| t.contains("Pong")));
        assert!(texts.iter().any(|t| t.contains("link")));
    }

    #[tokio::test]
    async fn auto_read_marks_incoming_messages() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let mut config = Config::for_tests(dir.path().to_path_buf());
        config.auto_read = true;
        let state = AppState::new(
            config,
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::new(ConnectionState::default()),
        );

        handle_event(
            &state,
            TransportEvent::Message(msg("m1", "hello", "c@s.whatsapp.net", "c@s.whatsapp.net")),
        )
        .await;

        let calls = transport.read_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].id, "m1");
    }

    #[tokio::test]
    async fn presence_events_feed_the_tracker() {
        let (state, _transport, _dir) = harness();

        handle_event(
            &state,
            TransportEvent::Presence {
                chat_id: "g@g.us".to_string(),
                user_id: "u@s.whatsapp.net".to_string(),
                kind: PresenceKind::Composing,
            },
        )
        .await;

        assert!(state.presence.is_typing("g@g.us", "u@s.whatsapp.net"));
    }

    #[tokio::test]
    async fn failing_transport_does_not_poison_the_loop() {
        let (state, transport, _dir) = harness();

        transport.fail_sends(true);
        handle_event(
            &state,
            TransportEvent::Message(msg(".m1", ".ping", "1@s.whatsapp.net", "1@s.whatsapp.net")),
        )
        .await;

        // Sends recover and the next command goes through.
        transport.fail_sends(false);
        handle_event(
            &state,
            TransportEvent::Message(msg(".m2", ".ping", "1@s.whatsapp.net", "1@s.whatsapp.net")),
        )
        .await;

        let sent = transport.sent_to("1@s.whatsapp.net");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content.text.as_deref().unwrap().contains("Pong"));
    }

    #[tokio::test]
    async fn reload_is_owner_gated_end_to_end() {
        let (state, transport, _dir) = harness();
        let owner = state.config.owner_jid();

        handle_event(
            &state,
            TransportEvent::Message(msg(".m1", ".reload", "g@g.us", "user@s.whatsapp.net")),
        )
        .await;
        let sent = transport.sent_to("g@g.us");
        assert!(sent[0].content.text.as_deref().unwrap().contains("owner"));

        handle_event(
            &state,
            TransportEvent::Message(msg(".m2", ".reload", owner.as_str(), owner.as_str())),
        )
        .await;
        let sent = transport.sent_to(owner.as_str());
        assert!(sent[0].content.text.as_deref().unwrap().contains("Reloaded"));
    }
}
