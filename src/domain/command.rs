//! Command nodes
//!
//! A command tree is built from [`CommandNode`]s. Each node is either a leaf
//! action, a nested registry, or a registry that is built on first use.

use std::cell::OnceCell;
use std::fmt;
use std::path::Path;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Args, FromArgMatches};
use thiserror::Error;

use super::registry::CommandRegistry;
use crate::cli::Output;
use crate::process::{ProcessError, ProcessRunner, RunOptions, RunOutput};

/// Invalid arguments for a leaf command
#[derive(Debug, Error)]
#[error("{0}")]
pub struct UsageError(pub clap::Error);

/// Everything a leaf handler gets to work with
pub struct Invocation<'a> {
    /// Command path as typed, e.g. `samosa git push`
    pub path: &'a str,

    /// Directory the command was invoked from
    pub cwd: &'a Path,

    pub output: &'a Output,

    pub runner: &'a dyn ProcessRunner,
}

impl Invocation<'_> {
    /// Runs a command with output streamed to the terminal
    pub fn run(&self, command: &str) -> Result<RunOutput, ProcessError> {
        self.runner.run(command, &RunOptions::new())
    }

    /// Runs a command and captures its output; nonzero exit is an error
    pub fn capture(&self, command: &str) -> Result<RunOutput, ProcessError> {
        self.runner.run(command, &RunOptions::new().capture())
    }

    /// Runs a command, captures its output and tolerates failure
    pub fn probe(&self, command: &str) -> Result<RunOutput, ProcessError> {
        self.runner
            .run(command, &RunOptions::new().capture().allow_failure())
    }
}

type Handler = Box<dyn Fn(&Invocation<'_>, &ArgMatches) -> Result<()>>;

/// A leaf action with its own argument surface
pub struct LeafCommand {
    args: clap::Command,
    handler: Handler,
}

impl LeafCommand {
    /// Leaf with a hand-built argument surface
    pub fn new<F>(args: clap::Command, handler: F) -> Self
    where
        F: Fn(&Invocation<'_>, &ArgMatches) -> Result<()> + 'static,
    {
        Self {
            args,
            handler: Box::new(handler),
        }
    }

    /// Leaf whose arguments come from a derived [`clap::Args`] struct
    pub fn typed<A, F>(handler: F) -> Self
    where
        A: Args + FromArgMatches + 'static,
        F: Fn(&Invocation<'_>, A) -> Result<()> + 'static,
    {
        let args = A::augment_args(clap::Command::new("command"));
        Self::new(args, move |invocation, matches| {
            let parsed = A::from_arg_matches(matches).map_err(UsageError)?;
            handler(invocation, parsed)
        })
    }

    /// Leaf without arguments
    pub fn simple<F>(handler: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<()> + 'static,
    {
        Self::new(clap::Command::new("command"), move |invocation, _| {
            handler(invocation)
        })
    }

    /// Leaf that receives every remaining argument untouched
    pub fn passthrough<F>(handler: F) -> Self
    where
        F: Fn(&Invocation<'_>, &[String]) -> Result<()> + 'static,
    {
        let args = clap::Command::new("command").arg(
            Arg::new("args")
                .help("Arguments passed through unchanged")
                .action(ArgAction::Append)
                .num_args(1..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        );

        Self::new(args, move |invocation, matches| {
            let rest: Vec<String> = matches
                .get_many::<String>("args")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            handler(invocation, &rest)
        })
    }

    /// The argument surface (without name and about)
    pub fn args(&self) -> &clap::Command {
        &self.args
    }

    /// Parses `argv` against this leaf's arguments and runs the handler
    ///
    /// `--help` prints the leaf's help and succeeds without running it.
    pub fn invoke(&self, node: &CommandNode, invocation: &Invocation<'_>, argv: &[String]) -> Result<()> {
        let mut command = self
            .args
            .clone()
            .name(node.name().to_string())
            .bin_name(invocation.path.to_string())
            .about(node.about().to_string());

        let full_argv = std::iter::once(invocation.path.to_string()).chain(argv.iter().cloned());
        let matches = match command.try_get_matches_from_mut(full_argv) {
            Ok(matches) => matches,
            Err(e) if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
            {
                e.print()?;
                return Ok(());
            }
            Err(e) => return Err(UsageError(e).into()),
        };

        (self.handler)(invocation, &matches)
    }
}

impl fmt::Debug for LeafCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafCommand")
            .field("args", &self.args.get_arguments().map(|a| a.get_id().as_str()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A group whose registry is built the first time it is needed
pub struct LazyGroup {
    cell: OnceCell<CommandRegistry>,
    build: Box<dyn Fn() -> CommandRegistry>,
}

impl LazyGroup {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn() -> CommandRegistry + 'static,
    {
        Self {
            cell: OnceCell::new(),
            build: Box::new(build),
        }
    }

    /// Returns the registry, building it on first access
    pub fn get(&self) -> &CommandRegistry {
        self.cell.get_or_init(|| (self.build)())
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl fmt::Debug for LazyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyGroup")
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

/// What a node does when resolved
#[derive(Debug)]
pub enum NodeKind {
    Leaf(LeafCommand),
    Group(CommandRegistry),
    Lazy(LazyGroup),
}

/// A named entry in a command tree
#[derive(Debug)]
pub struct CommandNode {
    name: String,
    about: String,
    hidden: bool,
    kind: NodeKind,
}

impl CommandNode {
    pub fn leaf(name: impl Into<String>, about: impl Into<String>, leaf: LeafCommand) -> Self {
        Self {
            name: name.into(),
            about: about.into(),
            hidden: false,
            kind: NodeKind::Leaf(leaf),
        }
    }

    /// Node for a nested registry; takes the registry's name and description
    pub fn group(registry: CommandRegistry) -> Self {
        Self {
            name: registry.name().to_string(),
            about: registry.about().to_string(),
            hidden: false,
            kind: NodeKind::Group(registry),
        }
    }

    pub fn lazy(name: impl Into<String>, about: impl Into<String>, group: LazyGroup) -> Self {
        Self {
            name: name.into(),
            about: about.into(),
            hidden: false,
            kind: NodeKind::Lazy(group),
        }
    }

    /// Keeps the node resolvable but out of help listings
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn about(&self) -> &str {
        &self.about
    }

    /// First line of the description
    pub fn short_help(&self) -> &str {
        self.about.lines().next().unwrap_or("").trim()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Subcommands of a group node (building a lazy group if needed)
    pub fn subcommands(&self) -> Option<&CommandRegistry> {
        match &self.kind {
            NodeKind::Leaf(_) => None,
            NodeKind::Group(registry) => Some(registry),
            NodeKind::Lazy(group) => Some(group.get()),
        }
    }
}
