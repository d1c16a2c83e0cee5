//! Samosa - a personal task-automation CLI
//!
//! Samosa wraps everyday tool invocations (git, formatters, linters, test
//! runners) behind short, aliasable subcommands, and lets a project add its
//! own commands from a `.samosa/commands/` directory.

pub mod domain;
pub mod process;
pub mod storage;
pub mod plugin;
pub mod cli;

pub use domain::{AliasTable, CommandNode, CommandRegistry, LeafCommand, NodeKind};
pub use storage::ProjectContext;
