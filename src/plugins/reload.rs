//! Registry reload.

use crate::router::{CommandSpec, Ctx, FnHandler};

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("reload", FnHandler(reload))
            .describe("Rebuild the command registry")
            .owner_only(),
    ]
}

async fn reload(ctx: Ctx) -> anyhow::Result<()> {
    let count = ctx.state.registry.reload();
    ctx.reply(format!("Reloaded {count} commands.")).await
}
