//! Built-in commands.
//!
//! Each submodule exposes a `commands()` provider; the full set is
//! installed into the registry at startup and on `.reload`.

pub mod autoreact;
pub mod help;
pub mod ping;
pub mod recover;
pub mod reload;
pub mod stats;

use crate::router::CommandProvider;

/// Providers for every built-in command.
pub fn built_in() -> Vec<CommandProvider> {
    vec![
        ping::commands,
        help::commands,
        autoreact::commands,
        recover::commands,
        stats::commands,
        reload::commands,
    ]
}
