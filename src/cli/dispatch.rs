//! Walks argv through nested registries
//!
//! Each token is resolved in the current group (aliases included) until a
//! leaf is reached; the leaf parses the remaining tokens itself. A group
//! given no further token, or `-h`/`--help`, prints its help.

use std::path::Path;

use anyhow::Result;
use thiserror::Error;

use super::Output;
use crate::domain::{CommandRegistry, Invocation, NodeKind};
use crate::process::ProcessRunner;

/// Options every group accepts
const GROUP_OPTIONS: &[(&str, &str)] = &[("-h, --help", "Show this message and exit.")];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("No such command '{token}'.")]
    NotFound { path: String, token: String },

    #[error("No such option: {option}")]
    UnknownOption { path: String, option: String },
}

impl DispatchError {
    /// Command path of the group where dispatch stopped
    pub fn path(&self) -> &str {
        match self {
            DispatchError::NotFound { path, .. } | DispatchError::UnknownOption { path, .. } => path,
        }
    }
}

/// What a dispatched command runs with
pub struct DispatchEnv<'a> {
    pub cwd: &'a Path,
    pub output: &'a Output,
    pub runner: &'a dyn ProcessRunner,
}

/// Resolves `argv` against `root` and runs the command it names
pub fn dispatch(root: &CommandRegistry, argv: &[String], env: &DispatchEnv<'_>) -> Result<()> {
    let mut registry = root;
    let mut path = vec![root.name().to_string()];
    let mut rest = argv;

    loop {
        let Some((token, tail)) = rest.split_first() else {
            print_group_help(registry, &path);
            return Ok(());
        };

        if token == "-h" || token == "--help" {
            print_group_help(registry, &path);
            return Ok(());
        }
        if token.starts_with('-') {
            return Err(DispatchError::UnknownOption {
                path: path.join(" "),
                option: token.clone(),
            }
            .into());
        }

        let node = registry.resolve(token).map_err(|e| {
            tracing::debug!(error = %e, "resolution failed");
            DispatchError::NotFound {
                path: path.join(" "),
                token: token.clone(),
            }
        })?;
        path.push(node.name().to_string());
        env.output
            .verbose_ctx("dispatch", &format!("Resolved '{}' to '{}'", token, path.join(" ")));

        registry = match node.kind() {
            NodeKind::Leaf(leaf) => {
                let path = path.join(" ");
                let invocation = Invocation {
                    path: &path,
                    cwd: env.cwd,
                    output: env.output,
                    runner: env.runner,
                };
                return leaf.invoke(node, &invocation, tail);
            }
            NodeKind::Group(group) => group,
            NodeKind::Lazy(group) => group.get(),
        };
        rest = tail;
    }
}

fn print_group_help(registry: &CommandRegistry, path: &[String]) {
    print!("{}", registry.format_help(&path.join(" "), GROUP_OPTIONS));
}
