//! Command registry.
//!
//! Specs are contributed by provider functions so the whole table can be
//! rebuilt wholesale on reload; there is never a partially updated view.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::CommandSpec;

/// A function contributing a batch of command specs.
pub type CommandProvider = fn() -> Vec<CommandSpec>;

#[derive(Default)]
struct Table {
    commands: HashMap<String, Arc<CommandSpec>>,
    aliases: HashMap<String, String>,
}

#[derive(Default)]
pub struct CommandRegistry {
    table: RwLock<Table>,
    providers: RwLock<Vec<CommandProvider>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the provider set and build the table from it.
    pub fn load(&self, providers: Vec<CommandProvider>) -> usize {
        *self.providers.write() = providers;
        self.reload()
    }

    /// Rebuild the table from the installed providers. Returns the number
    /// of commands registered.
    pub fn reload(&self) -> usize {
        let providers = self.providers.read().clone();
        let mut table = Table::default();
        for provider in providers {
            for spec in provider() {
                register_into(&mut table, spec);
            }
        }
        let count = table.commands.len();
        *self.table.write() = table;
        info!("Command registry loaded: {} commands", count);
        count
    }

    /// Register one spec directly (tests and ad-hoc wiring).
    pub fn register(&self, spec: CommandSpec) {
        register_into(&mut self.table.write(), spec);
    }

    /// Resolve a token against names, then aliases. Case-insensitive.
    pub fn get(&self, token: &str) -> Option<Arc<CommandSpec>> {
        let token = token.to_lowercase();
        let table = self.table.read();
        if let Some(spec) = table.commands.get(&token) {
            return Some(Arc::clone(spec));
        }
        table
            .aliases
            .get(&token)
            .and_then(|name| table.commands.get(name))
            .map(Arc::clone)
    }

    pub fn command_count(&self) -> usize {
        self.table.read().commands.len()
    }

    /// All registered specs, sorted by name. Used by the help command.
    pub fn specs(&self) -> Vec<Arc<CommandSpec>> {
        let table = self.table.read();
        let mut specs: Vec<_> = table.commands.values().cloned().collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Up to three suggestions for a mistyped token: commands whose name
    /// starts with the token, or that the token starts with.
    pub fn suggest(&self, token: &str) -> Vec<String> {
        let token = token.to_lowercase();
        if token.is_empty() {
            return Vec::new();
        }
        let table = self.table.read();
        let mut names: Vec<_> = table
            .commands
            .keys()
            .filter(|name| name.starts_with(&token) || token.starts_with(name.as_str()))
            .cloned()
            .collect();
        names.sort();
        names.truncate(3);
        names
    }
}

fn register_into(table: &mut Table, spec: CommandSpec) {
    let name = spec.name.to_lowercase();
    if name.is_empty() {
        warn!("Command with empty name ignored");
        return;
    }
    if table.commands.contains_key(&name) {
        warn!("Duplicate command '{}' ignored", name);
        return;
    }

    let aliases: Vec<String> = spec.aliases.iter().map(|a| a.to_lowercase()).collect();
    for alias in &aliases {
        if table.commands.contains_key(alias) || table.aliases.contains_key(alias) {
            warn!("Alias '{}' for '{}' collides; ignored", alias, name);
            continue;
        }
        table.aliases.insert(alias.clone(), name.clone());
    }

    table.commands.insert(name, Arc::new(spec));
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.command_count())
            .finish()
    }
}
