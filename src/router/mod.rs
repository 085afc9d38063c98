//! Command routing.
//!
//! Turns a prefixed message into a command invocation: token resolution
//! against the registry, permission gating, and an error boundary that
//! keeps a broken handler from taking the event loop down with it.

pub mod registry;

pub use registry::{CommandProvider, CommandRegistry};

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::bot::AppState;
use crate::transport::{InboundMessage, MessageKey, OutboundContent};

/// Everything a handler gets to work with.
#[derive(Clone)]
pub struct Ctx {
    pub state: AppState,
    /// Tokens after the command name.
    pub args: Vec<String>,
    pub raw_text: String,
    pub chat_id: String,
    pub sender_id: String,
    pub is_group: bool,
    /// Key of the triggering message, used for quoting and reactions.
    pub key: MessageKey,
}

impl Ctx {
    /// Send a quoted reply into the originating chat.
    pub async fn reply(&self, text: impl Into<String>) -> anyhow::Result<()> {
        self.state
            .transport
            .send_message(
                &self.chat_id,
                OutboundContent::text(text).quoting(self.key.clone()),
            )
            .await?;
        Ok(())
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, ctx: Ctx) -> anyhow::Result<()>;
}

/// Adapter letting plain async functions act as handlers.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(Ctx) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn execute(&self, ctx: Ctx) -> anyhow::Result<()> {
        (self.0)(ctx).await
    }
}

/// One registered command.
pub struct CommandSpec {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub group_only: bool,
    pub owner_only: bool,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, handler: impl CommandHandler + 'static) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: String::new(),
            group_only: false,
            owner_only: false,
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    #[must_use]
    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases.extend(aliases.iter().map(|a| a.to_string()));
        self
    }

    #[must_use]
    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    #[must_use]
    pub fn group_only(mut self) -> Self {
        self.group_only = true;
        self
    }

    #[must_use]
    pub fn owner_only(mut self) -> Self {
        self.owner_only = true;
        self
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("group_only", &self.group_only)
            .field("owner_only", &self.owner_only)
            .finish()
    }
}

/// How a message fared in routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not prefixed, or prefix with no token. Not a command.
    NoMatch,
    /// Prefixed but no command or alias matched.
    Unknown,
    /// Matched but refused by a group-only or owner-only gate.
    Rejected,
    Handled,
    /// Handler errored or panicked; the failure was reported to the chat.
    Failed,
}

/// Route one inbound message.
pub async fn dispatch(state: &AppState, msg: &InboundMessage) -> DispatchOutcome {
    let prefix = state.config.prefix.as_str();
    let text = msg.text.trim();
    let Some(stripped) = text.strip_prefix(prefix) else {
        return DispatchOutcome::NoMatch;
    };

    let mut parts = stripped.split_whitespace();
    let Some(token) = parts.next() else {
        return DispatchOutcome::NoMatch;
    };
    let args: Vec<String> = parts.map(str::to_string).collect();

    let Some(spec) = state.registry.get(token) else {
        let mut reply = format!("Unknown command: {prefix}{}", token.to_lowercase());
        let suggestions = state.registry.suggest(token);
        if !suggestions.is_empty() {
            let list: Vec<String> = suggestions.iter().map(|s| format!("{prefix}{s}")).collect();
            reply.push_str("\nDid you mean: ");
            reply.push_str(&list.join(", "));
        }
        notify(state, &msg.chat_id, reply).await;
        return DispatchOutcome::Unknown;
    };

    if spec.group_only && !msg.is_group() {
        notify(
            state,
            &msg.chat_id,
            format!("{prefix}{} only works in group chats.", spec.name),
        )
        .await;
        return DispatchOutcome::Rejected;
    }

    if spec.owner_only && !state.permissions.is_owner(&msg.sender_id) {
        notify(
            state,
            &msg.chat_id,
            format!("{prefix}{} is restricted to the bot owner.", spec.name),
        )
        .await;
        return DispatchOutcome::Rejected;
    }

    if !state.config.reply_delay.is_zero() {
        tokio::time::sleep(state.config.reply_delay).await;
    }

    let ctx = Ctx {
        state: state.clone(),
        args,
        raw_text: msg.text.clone(),
        chat_id: msg.chat_id.clone(),
        sender_id: msg.sender_id.clone(),
        is_group: msg.is_group(),
        key: msg.key(),
    };

    debug!("Executing command '{}' for {}", spec.name, msg.sender_id);
    match AssertUnwindSafe(spec.handler.execute(ctx)).catch_unwind().await {
        Ok(Ok(())) => DispatchOutcome::Handled,
        Ok(Err(e)) => {
            warn!("Command '{}' failed: {:#}", spec.name, e);
            let detail = truncate_chars(&format!("{e:#}"), 120);
            notify(
                state,
                &msg.chat_id,
                format!("⚠️ {prefix}{} failed: {detail}", spec.name),
            )
            .await;
            DispatchOutcome::Failed
        }
        Err(_) => {
            error!("Command '{}' panicked", spec.name);
            notify(
                state,
                &msg.chat_id,
                format!("⚠️ {prefix}{} failed unexpectedly.", spec.name),
            )
            .await;
            DispatchOutcome::Failed
        }
    }
}

/// Best-effort send; routing never propagates transport failures.
async fn notify(state: &AppState, chat_id: &str, text: String) {
    if let Err(e) = state
        .transport
        .send_message(chat_id, OutboundContent::text(text))
        .await
    {
        warn!("Failed to send routing reply to {}: {}", chat_id, e);
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::AppState;
    use crate::transport::memory::MemoryTransport;
    use chrono::Utc;

    fn msg(text: &str, chat: &str, sender: &str) -> InboundMessage {
        InboundMessage {
            id: format!("t-{}", rand::random::<u32>()),
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
        (state, transport, dir)
    }

    #[tokio::test]
    async fn unprefixed_text_is_not_a_command() {
        let (state, transport, _dir) = harness();
        state.registry.register(CommandSpec::new(
            "ping",
            FnHandler(|ctx: Ctx| async move { ctx.reply("pong").await }),
        ));

        let outcome = dispatch(&state, &msg("ping", "1@s.whatsapp.net", "1@s.whatsapp.net")).await;
        assert_eq!(outcome, DispatchOutcome::NoMatch);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn alias_executes_the_same_handler() {
        let (state, transport, _dir) = harness();
        state.registry.register(
            CommandSpec::new(
                "ping",
                FnHandler(|ctx: Ctx| async move { ctx.reply("pong").await }),
            )
            .alias("p"),
        );

        let outcome = dispatch(&state, &msg(".p", "1@s.whatsapp.net", "1@s.whatsapp.net")).await;
        assert_eq!(outcome, DispatchOutcome::Handled);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content.text.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn unknown_command_offers_suggestions() {
        let (state, transport, _dir) = harness();
        state.registry.register(CommandSpec::new(
            "stats",
            FnHandler(|_ctx: Ctx| async { anyhow::Ok(()) }),
        ));

        let outcome =
            dispatch(&state, &msg(".stat", "1@s.whatsapp.net", "1@s.whatsapp.net")).await;
        assert_eq!(outcome, DispatchOutcome::Unknown);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let text = sent[0].content.text.clone().unwrap();
        assert!(text.contains("Unknown command"));
        assert!(text.contains(".stats"));
    }

    #[tokio::test]
    async fn group_only_command_is_rejected_in_direct_chat() {
        let (state, transport, _dir) = harness();
        state.registry.register(
            CommandSpec::new(
                "kick",
                FnHandler(|_ctx: Ctx| async { anyhow::Ok(()) }),
            )
            .group_only(),
        );

        let outcome =
            dispatch(&state, &msg(".kick", "1@s.whatsapp.net", "1@s.whatsapp.net")).await;
        assert_eq!(outcome, DispatchOutcome::Rejected);
        assert!(
            transport.sent()[0]
                .content
                .text
                .as_deref()
                .unwrap()
                .contains("group")
        );
    }

    #[tokio::test]
    async fn owner_only_command_is_gated() {
        let (state, transport, _dir) = harness();
        state.registry.register(
            CommandSpec::new(
                "reload",
                FnHandler(|ctx: Ctx| async move { ctx.reply("done").await }),
            )
            .owner_only(),
        );

        let stranger = msg(".reload", "1@s.whatsapp.net", "254799999999@s.whatsapp.net");
        assert_eq!(dispatch(&state, &stranger).await, DispatchOutcome::Rejected);

        let owner_jid = state.config.owner_jid();
        let owner = msg(".reload", "1@s.whatsapp.net", &owner_jid);
        assert_eq!(dispatch(&state, &owner).await, DispatchOutcome::Handled);
        assert_eq!(transport.sent_to("1@s.whatsapp.net").len(), 2);
    }

    #[tokio::test]
    async fn handler_error_reports_to_chat() {
        let (state, transport, _dir) = harness();
        state.registry.register(CommandSpec::new(
            "boom",
            FnHandler(|_ctx: Ctx| async { anyhow::bail!("storage unavailable") }),
        ));

        let outcome =
            dispatch(&state, &msg(".boom", "1@s.whatsapp.net", "1@s.whatsapp.net")).await;
        assert_eq!(outcome, DispatchOutcome::Failed);

        let text = transport.sent()[0].content.text.clone().unwrap();
        assert!(text.contains(".boom"));
        assert!(text.contains("storage unavailable"));
    }

    #[tokio::test]
    async fn handler_panic_is_contained() {
        let (state, transport, _dir) = harness();
        state.registry.register(CommandSpec::new(
            "panic",
            FnHandler(|_ctx: Ctx| async {
                panic!("unreachable branch");
                #[allow(unreachable_code)]
                anyhow::Ok(())
            }),
        ));

        let outcome =
            dispatch(&state, &msg(".panic", "1@s.whatsapp.net", "1@s.whatsapp.net")).await;
        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_chars("short", 120), "short");
        let long = "é".repeat(200);
        let cut = truncate_chars(&long, 120);
        assert_eq!(cut.chars().count(), 121);
    }
}
