//! Command menu.

use crate::router::{CommandSpec, Ctx, FnHandler};

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("help", FnHandler(help))
            .alias("menu")
            .describe("List available commands"),
    ]
}

async fn help(ctx: Ctx) -> anyhow::Result<()> {
    let prefix = &ctx.state.config.prefix;
    let mut lines = vec![format!("*{} commands*", ctx.state.config.bot_name)];

    for spec in ctx.state.registry.specs() {
        let mut line = format!("{prefix}{}", spec.name);
        if !spec.description.is_empty() {
            line.push_str(" - ");
            line.push_str(&spec.description);
        }
        if spec.owner_only {
            line.push_str(" (owner)");
        }
        lines.push(line);
    }

    ctx.reply(lines.join("\n")).await
}
