//! Liveness check.

use chrono::Utc;

use crate::router::{CommandSpec, Ctx, FnHandler};

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("ping", FnHandler(ping))
            .alias("p")
            .describe("Check that the bot is alive"),
    ]
}

async fn ping(ctx: Ctx) -> anyhow::Result<()> {
    let now = Utc::now();
    ctx.reply(format!("🏓 Pong! ({})", now.format("%H:%M:%S UTC"))).await
}
