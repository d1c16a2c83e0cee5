//! Command registry with aliases
//!
//! A registry owns an ordered set of canonical commands plus an alias table.
//! Aliases resolve transparently but never show up as separate entries in
//! listings or completions; help shows them next to their command instead,
//! e.g. `git (g)`.

use thiserror::Error;

use super::alias::{AliasInsert, AliasTable};
use super::command::{CommandNode, NodeKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Command '{name}' is already registered in '{group}'")]
    NameTaken { group: String, name: String },

    #[error("Alias '{alias}' already refers to '{existing}', cannot assign it to '{requested}'")]
    AliasConflict {
        alias: String,
        existing: String,
        requested: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No such command '{token}'.")]
    NotFound { group: String, token: String },
}

/// One row of a help listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpEntry {
    /// `name` or `name (alias1, alias2)`
    pub display_name: String,

    /// First line of the command description
    pub about: String,
}

/// An ordered, aliasable set of commands
#[derive(Debug)]
pub struct CommandRegistry {
    name: String,
    about: String,
    commands: Vec<CommandNode>,
    aliases: AliasTable,
}

impl CommandRegistry {
    pub fn new(name: impl Into<String>, about: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: about.into(),
            commands: Vec::new(),
            aliases: AliasTable::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn about(&self) -> &str {
        &self.about
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Registers `node` under its own name with the given aliases
    ///
    /// Nothing is modified when an error is returned.
    pub fn register(&mut self, node: CommandNode, aliases: &[&str]) -> Result<(), RegistryError> {
        let name = node.name().to_string();

        if self.get(&name).is_some() || self.aliases.contains(&name) {
            return Err(RegistryError::NameTaken {
                group: self.name.clone(),
                name,
            });
        }

        for alias in aliases {
            let existing = if *alias == name || self.get(alias).is_some() {
                Some(alias.to_string())
            } else {
                self.aliases.canonical(alias).map(str::to_string)
            };

            if let Some(existing) = existing {
                return Err(RegistryError::AliasConflict {
                    alias: alias.to_string(),
                    existing,
                    requested: name,
                });
            }
        }

        for alias in aliases {
            // Validated above; repeated aliases in the same call are harmless
            if let AliasInsert::Conflict { existing } = self.aliases.insert(alias, &name) {
                tracing::warn!(alias, existing, "alias conflict after validation");
            }
        }

        tracing::trace!(group = %self.name, command = %name, ?aliases, "registered command");
        self.commands.push(node);
        Ok(())
    }

    /// Looks up a command by canonical name or alias
    pub fn resolve(&self, token: &str) -> Result<&CommandNode, ResolveError> {
        let name = self.aliases.canonical(token).unwrap_or(token);

        self.get(name).ok_or_else(|| ResolveError::NotFound {
            group: self.name.clone(),
            token: token.to_string(),
        })
    }

    /// Looks up a command by canonical name only
    pub fn get(&self, name: &str) -> Option<&CommandNode> {
        self.commands.iter().find(|node| node.name() == name)
    }

    /// Canonical names in registration order; aliases are never included
    pub fn list_canonical_names(&self) -> Vec<&str> {
        self.commands.iter().map(CommandNode::name).collect()
    }

    /// Iterates commands in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CommandNode> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Help rows for visible commands, aliases folded into the display name
    pub fn render_help(&self) -> Vec<HelpEntry> {
        self.commands
            .iter()
            .filter(|node| !node.is_hidden())
            .map(|node| {
                let aliases = self.aliases.aliases_for(node.name());
                let display_name = if aliases.is_empty() {
                    node.name().to_string()
                } else {
                    format!("{} ({})", node.name(), aliases.join(", "))
                };

                HelpEntry {
                    display_name,
                    about: node.short_help().to_string(),
                }
            })
            .collect()
    }

    /// Full help screen for this group
    ///
    /// `usage` is the command path shown in the usage line and `options` are
    /// `(flags, description)` rows.
    pub fn format_help(&self, usage: &str, options: &[(&str, &str)]) -> String {
        let mut out = format!("Usage: {} [OPTIONS] COMMAND [ARGS]...\n", usage);

        if !self.about.is_empty() {
            out.push('\n');
            for line in self.about.lines() {
                if line.is_empty() {
                    out.push('\n');
                } else {
                    out.push_str(&format!("  {}\n", line));
                }
            }
        }

        if !options.is_empty() {
            out.push_str("\nOptions:\n");
            let rows: Vec<(&str, &str)> = options.to_vec();
            write_rows(&mut out, &rows);
        }

        let entries = self.render_help();
        if !entries.is_empty() {
            out.push_str("\nCommands:\n");
            let rows: Vec<(&str, &str)> = entries
                .iter()
                .map(|e| (e.display_name.as_str(), e.about.as_str()))
                .collect();
            write_rows(&mut out, &rows);
        }

        out
    }

    /// Mirrors this tree as a clap command, canonical names only
    ///
    /// Used for shell completion scripts. Lazy groups are built.
    pub fn to_clap(&self) -> clap::Command {
        let mut command = clap::Command::new(self.name.clone()).about(self.about.clone());

        for node in &self.commands {
            let sub = match node.kind() {
                NodeKind::Leaf(leaf) => leaf.args().clone(),
                NodeKind::Group(registry) => registry.to_clap(),
                NodeKind::Lazy(group) => group.get().to_clap(),
            };

            command = command.subcommand(
                sub.name(node.name().to_string())
                    .about(node.short_help().to_string())
                    .hide(node.is_hidden()),
            );
        }

        command
    }
}

/// Writes two aligned columns, indented like the rest of the help screen
fn write_rows(out: &mut String, rows: &[(&str, &str)]) {
    let width = rows.iter().map(|(left, _)| left.len()).max().unwrap_or(0);

    for (left, right) in rows {
        if right.is_empty() {
            out.push_str(&format!("  {}\n", left));
        } else {
            out.push_str(&format!("  {:<width$}  {}\n", left, right, width = width));
        }
    }
}
