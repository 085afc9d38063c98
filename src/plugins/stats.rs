//! Runtime statistics.

use crate::router::{CommandSpec, Ctx, FnHandler};

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("stats", FnHandler(stats)).describe("Show bot statistics"),
    ]
}

async fn stats(ctx: Ctx) -> anyhow::Result<()> {
    let tracker = ctx.state.tracker.stats();
    let uptime = (chrono::Utc::now() - ctx.state.started_at).num_seconds();

    let text = format!(
        "*{} stats*\n\
         Connection: {}\n\
         Uptime: {}s\n\
         Messages seen: {}\n\
         Edits detected: {}\n\
         Deletes detected: {}\n\
         Cached messages: {}\n\
         Commands loaded: {}\n\
         Auto-react: {} ({} sent)",
        ctx.state.config.bot_name,
        ctx.state.connection.status().as_str(),
        uptime,
        tracker.messages_seen,
        tracker.edits_detected,
        tracker.deletes_detected,
        ctx.state.tracker.cached_count(),
        ctx.state.registry.command_count(),
        ctx.state.auto_react.mode().as_str(),
        ctx.state.auto_react.reactions_sent(),
    );

    ctx.reply(text).await
}
