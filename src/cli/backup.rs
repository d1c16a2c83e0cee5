//! Backup branch management
//!
//! Backups are plain branches named `backup/<branch>-<HH-MM-SS_DD-MM-YYYY>`.
//! Deletion only ever touches branches under [`BACKUP_PREFIX`]; the prefix is
//! checked again right before every `git branch -D`.

use anyhow::{bail, Result};
use chrono::{Local, NaiveDateTime};
use clap::Args;
use thiserror::Error;

use super::git::current_branch;
use crate::domain::{CommandNode, CommandRegistry, Invocation, LeafCommand, RegistryError};
use crate::process::{quote, ProcessRunner, RunOptions};

/// Every backup branch starts with this
pub const BACKUP_PREFIX: &str = "backup/";

const TIMESTAMP_FORMAT: &str = "%H-%M-%S_%d-%m-%Y";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackupError {
    #[error("Safety check failed: can only delete backup branches (must start with 'backup/'), got '{0}'")]
    SafetyViolation(String),

    #[error("Backup branch '{0}' not found")]
    NotFound(String),
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Create without asking
    #[arg(long, short)]
    yes: bool,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    /// Delete all backup branches for the current branch
    #[arg(long, conflicts_with = "branch")]
    all: bool,

    /// Delete a specific backup branch (with or without the backup/ prefix)
    #[arg(long)]
    branch: Option<String>,

    /// Delete without asking
    #[arg(long, short)]
    yes: bool,
}

/// The `git backup` group
pub fn command() -> Result<CommandNode, RegistryError> {
    let mut backup = CommandRegistry::new("backup", "Backup branch management commands.");

    backup.register(
        CommandNode::leaf(
            "add",
            "Create a backup branch from the current branch.",
            LeafCommand::typed(add),
        ),
        &[],
    )?;
    backup.register(
        CommandNode::leaf(
            "list",
            "List all backup branches for the current branch.",
            LeafCommand::simple(list),
        ),
        &[],
    )?;
    backup.register(
        CommandNode::leaf(
            "delete",
            "Delete backup branches for the current branch.",
            LeafCommand::typed(delete),
        ),
        &[],
    )?;

    Ok(CommandNode::group(backup))
}

/// `backup/<branch>-<HH-MM-SS_DD-MM-YYYY>`
pub fn backup_branch_name(branch: &str, at: NaiveDateTime) -> String {
    format!("{}{}-{}", BACKUP_PREFIX, branch, at.format(TIMESTAMP_FORMAT))
}

/// Branch names from `git branch` output, markers and remote prefixes removed
pub fn parse_branches(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(|line| line.trim().trim_start_matches(['*', '+']).trim())
        .filter(|name| !name.is_empty())
        .map(|name| name.strip_prefix("remotes/origin/").unwrap_or(name).to_string())
        .collect()
}

/// Sorted, de-duplicated backups of `branch`
///
/// The rest after `backup/<branch>-` must be a backup timestamp, so
/// `main` never claims the backups of `main-hotfix`.
pub fn backups_of(branches: &[String], branch: &str) -> Vec<String> {
    let pattern = format!("{}{}-", BACKUP_PREFIX, branch);
    let mut backups: Vec<String> = branches
        .iter()
        .filter(|name| {
            name.strip_prefix(&pattern)
                .is_some_and(|rest| NaiveDateTime::parse_from_str(rest, TIMESTAMP_FORMAT).is_ok())
        })
        .cloned()
        .collect();
    backups.sort();
    backups.dedup();
    backups
}

/// Turns user input into a backup branch name
///
/// A bare name gets the prefix; any other path-like name is refused.
pub fn normalize_target(name: &str) -> Result<String, BackupError> {
    if name.starts_with(BACKUP_PREFIX) {
        Ok(name.to_string())
    } else if !name.contains('/') {
        Ok(format!("{}{}", BACKUP_PREFIX, name))
    } else {
        Err(BackupError::SafetyViolation(name.to_string()))
    }
}

/// Outcome of a bulk delete
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub refused: Vec<BackupError>,
    pub failed: Vec<String>,
}

/// Deletes each candidate, refusing anything outside [`BACKUP_PREFIX`]
pub fn delete_backups(runner: &dyn ProcessRunner, candidates: &[String]) -> DeleteReport {
    let mut report = DeleteReport::default();

    for branch in candidates {
        if !branch.starts_with(BACKUP_PREFIX) {
            tracing::warn!(branch = %branch, "refusing to delete non-backup branch");
            report.refused.push(BackupError::SafetyViolation(branch.clone()));
            continue;
        }

        let command = format!("git branch -D {}", quote(branch));
        match runner.run(&command, &RunOptions::new().capture()) {
            Ok(_) => report.deleted.push(branch.clone()),
            Err(e) => {
                tracing::debug!(branch = %branch, error = %e, "delete failed");
                report.failed.push(branch.clone());
            }
        }
    }

    report
}

fn add(invocation: &Invocation<'_>, args: AddArgs) -> Result<()> {
    let output = invocation.output;
    let current = current_branch(invocation)?;
    let backup = backup_branch_name(&current, Local::now().naive_local());

    if !output.confirm("Create backup branch?", args.yes)? {
        output.info("Backup creation cancelled");
        return Ok(());
    }

    output.info(&format!("Creating backup branch: {}", backup));
    invocation.run(&format!("git branch {}", quote(&backup)))?;
    output.success(&format!("Backup branch '{}' created successfully!", backup));
    Ok(())
}

fn list(invocation: &Invocation<'_>) -> Result<()> {
    let output = invocation.output;
    let current = current_branch(invocation)?;
    let branches = parse_branches(invocation.capture("git branch -a")?.text());
    let backups = backups_of(&branches, &current);

    output.info(&format!("Backup branches for '{}':", current));
    if backups.is_empty() {
        output.info(&format!("  No backup branches found for '{}'", current));
        return Ok(());
    }

    for backup in &backups {
        output.info(&format!("  {}", backup));
    }
    output.blank();
    output.success(&format!("Found {} backup(s)", backups.len()));
    Ok(())
}

fn delete(invocation: &Invocation<'_>, args: DeleteArgs) -> Result<()> {
    let output = invocation.output;

    if let Some(name) = &args.branch {
        return delete_one(invocation, name, args.yes);
    }
    if !args.all {
        output.hint("samosa git backup delete --all");
        output.hint("samosa git backup delete --branch main-21-36-47_08-08-2025");
        bail!("Please specify either --all or --branch");
    }

    let current = current_branch(invocation)?;
    let branches = parse_branches(invocation.capture("git branch")?.text());
    let backups = backups_of(&branches, &current);

    if backups.is_empty() {
        output.info(&format!("No local backup branches found for '{}'", current));
        return Ok(());
    }

    output.info(&format!("Found {} backup branch(es) to delete:", backups.len()));
    for backup in &backups {
        output.info(&format!("  {}", backup));
    }
    output.warn(&format!(
        "This will permanently delete {} backup branch(es)!",
        backups.len()
    ));
    if !output.confirm("Are you sure you want to delete all backup branches?", args.yes)? {
        output.info("Backup deletion cancelled");
        return Ok(());
    }

    let report = delete_backups(invocation.runner, &backups);
    for branch in &report.deleted {
        output.info(&format!("  Deleted: {}", branch));
    }
    for refusal in &report.refused {
        output.error(&refusal.to_string());
    }
    for branch in &report.failed {
        output.error(&format!("Failed to delete {}", branch));
    }

    if report.deleted.is_empty() {
        bail!("No backup branches were deleted");
    }
    output.success(&format!(
        "Successfully deleted {}/{} backup branch(es)",
        report.deleted.len(),
        backups.len()
    ));
    Ok(())
}

fn delete_one(invocation: &Invocation<'_>, name: &str, assume_yes: bool) -> Result<()> {
    let output = invocation.output;

    let target = normalize_target(name).inspect_err(|_| {
        output.hint("Use 'samosa git backup list' to see available backup branches");
    })?;

    let branches = parse_branches(invocation.capture("git branch")?.text());
    if !branches.contains(&target) {
        output.hint("Use 'samosa git backup list' to see available backups");
        return Err(BackupError::NotFound(target).into());
    }

    output.warn(&format!(
        "This will permanently delete backup branch '{}'!",
        target
    ));
    if !output.confirm("Are you sure you want to delete this backup branch?", assume_yes)? {
        output.info("Backup deletion cancelled");
        return Ok(());
    }

    let report = delete_backups(invocation.runner, std::slice::from_ref(&target));
    if let Some(refusal) = report.refused.into_iter().next() {
        return Err(refusal.into());
    }
    if !report.failed.is_empty() {
        bail!("Failed to delete {}", target);
    }

    output.success(&format!("Successfully deleted backup branch '{}'", target));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::NaiveDate;

    use super::*;
    use crate::cli::Output;
    use crate::process::testing::RecordingRunner;

    fn with_invocation<T>(runner: &RecordingRunner, f: impl FnOnce(&Invocation<'_>) -> T) -> T {
        let output = Output::new(false);
        let invocation = Invocation {
            path: "samosa git backup",
            cwd: Path::new("."),
            output: &output,
            runner,
        };
        f(&invocation)
    }

    #[test]
    fn branch_name_format() {
        let at = NaiveDate::from_ymd_opt(2025, 8, 8)
            .unwrap()
            .and_hms_opt(21, 36, 47)
            .unwrap();

        assert_eq!(
            backup_branch_name("main", at),
            "backup/main-21-36-47_08-08-2025"
        );
    }

    #[test]
    fn parses_branch_listing() {
        let listing = "  backup/main-1\n* main\n+ wt-branch\n  remotes/origin/backup/main-2\n\n";

        assert_eq!(
            parse_branches(listing),
            vec!["backup/main-1", "main", "wt-branch", "backup/main-2"]
        );
    }

    #[test]
    fn backups_are_per_branch_and_sorted() {
        let branches: Vec<String> = [
            "backup/main-22-00-00_08-08-2025",
            "main",
            "backup/main-21-36-47_08-08-2025",
            "backup/mainline-21-36-47_08-08-2025",
            "backup/feature-21-36-47_08-08-2025",
            "backup/main-21-36-47_08-08-2025",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(
            backups_of(&branches, "main"),
            vec!["backup/main-21-36-47_08-08-2025", "backup/main-22-00-00_08-08-2025"]
        );
    }

    #[test]
    fn backups_of_ignore_sibling_branches() {
        let branches: Vec<String> = [
            "backup/main-21-36-47_08-08-2025",
            "backup/main-hotfix-10-00-00_01-01-2025",
            "backup/main-v2-10-00-00_01-01-2025",
            "backup/main-notes",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(backups_of(&branches, "main"), vec!["backup/main-21-36-47_08-08-2025"]);
        assert_eq!(
            backups_of(&branches, "main-hotfix"),
            vec!["backup/main-hotfix-10-00-00_01-01-2025"]
        );
    }

    #[test]
    fn target_normalization() {
        assert_eq!(normalize_target("main-1").unwrap(), "backup/main-1");
        assert_eq!(normalize_target("backup/main-1").unwrap(), "backup/main-1");
        assert_eq!(
            normalize_target("feature/x"),
            Err(BackupError::SafetyViolation("feature/x".to_string()))
        );
    }

    #[test]
    fn bulk_delete_refuses_non_backup_candidates() {
        let runner = RecordingRunner::new();
        let candidates = vec![
            "backup/main-1".to_string(),
            "main".to_string(),
            "feature/backup/main-2".to_string(),
            "backup/main-3".to_string(),
        ];

        let report = delete_backups(&runner, &candidates);

        assert_eq!(report.deleted, vec!["backup/main-1", "backup/main-3"]);
        assert_eq!(report.refused.len(), 2);
        assert_eq!(
            runner.calls(),
            vec!["git branch -D backup/main-1", "git branch -D backup/main-3"]
        );
        assert!(runner.calls().iter().all(|c| c.starts_with("git branch -D backup/")));
    }

    #[test]
    fn bulk_delete_continues_after_failure() {
        let runner = RecordingRunner::new().respond("git branch -D backup/main-1", 1, "");
        let candidates = vec!["backup/main-1".to_string(), "backup/main-2".to_string()];

        let report = delete_backups(&runner, &candidates);
        assert_eq!(report.failed, vec!["backup/main-1"]);
        assert_eq!(report.deleted, vec!["backup/main-2"]);
    }

    #[test]
    fn delete_all_only_touches_current_branch_backups() {
        let runner = RecordingRunner::new()
            .respond("git branch --show-current", 0, "main\n")
            .respond(
                "git branch",
                0,
                "* main\n  backup/main-10-00-00_01-01-2025\n  backup/other-10-00-00_01-01-2025\n  \
                 backup/main-hotfix-10-00-00_01-01-2025\n  backup/main-11-00-00_01-01-2025\n",
            );
        let args = DeleteArgs {
            all: true,
            branch: None,
            yes: true,
        };

        with_invocation(&runner, |inv| delete(inv, args)).unwrap();

        let deletes: Vec<_> = runner
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("git branch -D"))
            .collect();
        assert_eq!(
            deletes,
            vec![
                "git branch -D backup/main-10-00-00_01-01-2025",
                "git branch -D backup/main-11-00-00_01-01-2025"
            ]
        );
    }

    #[test]
    fn delete_by_path_outside_prefix_never_runs_git() {
        let runner = RecordingRunner::new();
        let args = DeleteArgs {
            all: false,
            branch: Some("feature/important".to_string()),
            yes: true,
        };

        let err = with_invocation(&runner, |inv| delete(inv, args)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackupError>(),
            Some(BackupError::SafetyViolation(_))
        ));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn delete_missing_backup_is_not_found() {
        let runner = RecordingRunner::new().respond("git branch", 0, "* main\n");
        let args = DeleteArgs {
            all: false,
            branch: Some("main-1".to_string()),
            yes: true,
        };

        let err = with_invocation(&runner, |inv| delete(inv, args)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BackupError>(),
            Some(&BackupError::NotFound("backup/main-1".to_string()))
        );
        assert!(!runner.calls().iter().any(|c| c.contains("-D")));
    }

    #[test]
    fn delete_needs_a_target() {
        let runner = RecordingRunner::new();
        let args = DeleteArgs {
            all: false,
            branch: None,
            yes: true,
        };

        assert!(with_invocation(&runner, |inv| delete(inv, args)).is_err());
        assert!(runner.calls().is_empty());
    }
}
