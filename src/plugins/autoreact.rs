//! Auto-react mode toggle.

use crate::events::ReactMode;
use crate::router::{CommandSpec, Ctx, FnHandler};

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("autoreact", FnHandler(autoreact))
            .describe("Control auto reactions: on / off / dm")
            .owner_only(),
    ]
}

async fn autoreact(ctx: Ctx) -> anyhow::Result<()> {
    let Some(arg) = ctx.arg(0) else {
        return ctx
            .reply(format!(
                "Auto-react is *{}* ({} reactions sent)",
                ctx.state.auto_react.mode().as_str(),
                ctx.state.auto_react.reactions_sent(),
            ))
            .await;
    };

    match ReactMode::parse(arg) {
        Some(mode) => {
            ctx.state.auto_react.set_mode(mode);
            ctx.reply(format!("Auto-react set to *{}*", mode.as_str())).await
        }
        None => {
            ctx.reply(format!("Usage: {}autoreact on|off|dm", ctx.state.config.prefix))
                .await
        }
    }
}
