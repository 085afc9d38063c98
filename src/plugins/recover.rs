//! Deleted-message lookup.

use crate::router::{CommandSpec, Ctx, FnHandler};
use crate::tracker::DeletedMessage;
use crate::transport::jid;

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("recover", FnHandler(recover))
            .alias("deleted")
            .describe("Show recently deleted messages in this chat"),
    ]
}

fn format_entry(d: &DeletedMessage) -> String {
    let content = if d.text.is_empty() && d.has_media {
        "<media, no caption>".to_string()
    } else {
        d.text.clone()
    };
    format!(
        "• {} at {}: {}",
        jid::short(&d.sender_id),
        d.deleted_at.format("%Y-%m-%d %H:%M UTC"),
        content
    )
}

async fn recover(ctx: Ctx) -> anyhow::Result<()> {
    // With an argument, look one message up by id; otherwise list the
    // latest deletions in this chat.
    if let Some(id) = ctx.arg(0) {
        return match ctx.state.tracker.recover(id) {
            Some(d) => ctx.reply(format_entry(&d)).await,
            None => ctx.reply("No deleted message with that id.").await,
        };
    }

    let recent = ctx.state.tracker.recent_deleted(&ctx.chat_id, 5);
    if recent.is_empty() {
        return ctx.reply("No deleted messages recorded for this chat.").await;
    }

    let mut lines = vec!["*Recently deleted:*".to_string()];
    lines.extend(recent.iter().map(format_entry));
    ctx.reply(lines.join("\n")).await
}
