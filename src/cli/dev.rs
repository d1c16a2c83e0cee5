//! Development and testing commands

use std::path::Path;

use anyhow::Result;
use clap::Args;

use crate::domain::{CommandNode, CommandRegistry, Invocation, LeafCommand, RegistryError};
use crate::process::quote;

/// Directories `dev test` looks for when given no arguments
const TEST_DIRS: [&str; 2] = ["tests", "test"];

#[derive(Debug, Args)]
struct FormatArgs {
    /// Check formatting without making changes
    #[arg(long)]
    check: bool,
}

#[derive(Debug, Args)]
struct LintArgs {
    /// Fix linting issues automatically
    #[arg(long)]
    fix: bool,
}

/// The `dev` group
pub fn command() -> Result<CommandNode, RegistryError> {
    let mut dev = CommandRegistry::new("dev", "Development and testing commands.");

    dev.register(
        CommandNode::leaf(
            "test",
            "Run tests with pytest (proxy all arguments to pytest).",
            LeafCommand::passthrough(test),
        ),
        &[],
    )?;
    dev.register(
        CommandNode::leaf("format", "Format code with black.", LeafCommand::typed(format)),
        &["fmt"],
    )?;
    dev.register(
        CommandNode::leaf("lint", "Lint code with ruff.", LeafCommand::typed(lint)),
        &[],
    )?;
    dev.register(
        CommandNode::leaf(
            "mypy",
            "Run type checking with mypy.",
            LeafCommand::simple(mypy),
        ),
        &[],
    )?;

    Ok(CommandNode::group(dev))
}

/// `pytest` command line; without arguments the first existing test dir is used
pub fn pytest_command(cwd: &Path, args: &[String]) -> String {
    let mut parts = vec!["pytest".to_string()];

    if args.is_empty() {
        if let Some(dir) = TEST_DIRS.iter().find(|dir| cwd.join(dir).exists()) {
            parts.push(dir.to_string());
        }
    } else {
        parts.extend(args.iter().map(|arg| quote(arg).into_owned()));
    }

    parts.join(" ")
}

fn test(invocation: &Invocation<'_>, args: &[String]) -> Result<()> {
    let command = pytest_command(invocation.cwd, args);
    invocation.output.info(&format!("Running: {}", command));
    invocation.run(&command)?;
    Ok(())
}

fn format(invocation: &Invocation<'_>, args: FormatArgs) -> Result<()> {
    let command = if args.check { "black . --check" } else { "black ." };
    invocation.run(command)?;
    Ok(())
}

fn lint(invocation: &Invocation<'_>, args: LintArgs) -> Result<()> {
    let command = if args.fix { "ruff check . --fix" } else { "ruff check ." };
    invocation.run(command)?;
    Ok(())
}

fn mypy(invocation: &Invocation<'_>) -> Result<()> {
    invocation.run("mypy src/")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn pytest_uses_tests_dir_by_default() {
        let dir = TempDir::new().unwrap();
        assert_eq!(pytest_command(dir.path(), &[]), "pytest");

        std::fs::create_dir(dir.path().join("test")).unwrap();
        assert_eq!(pytest_command(dir.path(), &[]), "pytest test");

        std::fs::create_dir(dir.path().join("tests")).unwrap();
        assert_eq!(pytest_command(dir.path(), &[]), "pytest tests");
    }

    #[test]
    fn pytest_passes_arguments_through() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("tests")).unwrap();
        let args = vec!["-k".to_string(), "not slow".to_string(), "-x".to_string()];

        assert_eq!(pytest_command(dir.path(), &args), "pytest -k 'not slow' -x");
    }

    #[test]
    fn format_has_fmt_alias() {
        let node = command().unwrap();
        let dev = node.subcommands().unwrap();

        assert_eq!(dev.resolve("fmt").unwrap().name(), "format");
        assert_eq!(dev.list_canonical_names(), vec!["test", "format", "lint", "mypy"]);
    }
}
