//! Git worktree management
//!
//! Worktrees live next to the project: `../<project>-<branch>`, with `/` in
//! the branch name replaced by `-`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;

use crate::domain::{CommandNode, CommandRegistry, Invocation, LeafCommand, RegistryError};
use crate::process::quote;

#[derive(Debug, Args)]
struct AddArgs {
    /// Branch to check out in the worktree
    branch: String,

    /// Base branch or commit for a new branch (default: current HEAD)
    #[arg(long, default_value = "")]
    base: String,

    /// Fetch latest remote changes first
    #[arg(long, overrides_with = "no_fetch")]
    fetch: bool,

    /// Skip fetching
    #[arg(long = "no-fetch", overrides_with = "fetch")]
    no_fetch: bool,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    /// Branch whose worktree should be removed
    branch: String,
}

/// How `worktree add` obtains its branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorktreePlan {
    /// The branch exists locally
    Local,

    /// Only `origin/<branch>` exists; create a tracking branch
    Tracking,

    /// A new branch from `base`, or from HEAD
    New { base: Option<String> },
}

impl WorktreePlan {
    pub fn decide(branch: &str, local_listing: &str, remote_listing: &str, base: &str) -> Self {
        let exists_locally = local_listing
            .lines()
            .map(|line| line.trim().trim_start_matches(['*', '+']).trim())
            .any(|name| name == branch);
        let remote_ref = format!("origin/{}", branch);
        let exists_remotely = remote_listing
            .lines()
            .map(str::trim)
            .any(|name| name == remote_ref);

        if exists_locally {
            WorktreePlan::Local
        } else if exists_remotely {
            WorktreePlan::Tracking
        } else {
            let base = base.trim();
            WorktreePlan::New {
                base: (!base.is_empty()).then(|| base.to_string()),
            }
        }
    }

    /// The `git worktree add` command line for this plan
    pub fn command(&self, branch: &str, path: &Path) -> String {
        let path = path.display().to_string();
        let path = quote(&path);
        let branch_q = quote(branch);

        match self {
            WorktreePlan::Local => format!("git worktree add {} {}", path, branch_q),
            WorktreePlan::Tracking => format!(
                "git worktree add -b {} {} {}",
                branch_q,
                path,
                quote(&format!("origin/{}", branch))
            ),
            WorktreePlan::New { base: Some(base) } => {
                format!("git worktree add -b {} {} {}", branch_q, path, quote(base))
            }
            WorktreePlan::New { base: None } => {
                format!("git worktree add -b {} {}", branch_q, path)
            }
        }
    }
}

/// `../<project>-<branch>` relative to `project_dir`
pub fn worktree_path(project_dir: &Path, branch: &str) -> Option<PathBuf> {
    let project = project_dir.file_name()?.to_string_lossy();
    let parent = project_dir.parent()?;
    Some(parent.join(format!("{}-{}", project, branch.replace('/', "-"))))
}

/// The `git worktree` group
pub fn command() -> Result<CommandNode, RegistryError> {
    let mut worktree = CommandRegistry::new("worktree", "Git worktree management commands.");

    worktree.register(
        CommandNode::leaf(
            "add",
            "Create a git worktree one directory up with project-name-branch format.",
            LeafCommand::typed(add),
        ),
        &[],
    )?;
    worktree.register(
        CommandNode::leaf(
            "remove",
            "Remove a git worktree by branch name.",
            LeafCommand::typed(remove),
        ),
        &[],
    )?;
    worktree.register(
        CommandNode::leaf("list", "List all git worktrees.", LeafCommand::simple(list)),
        &[],
    )?;

    Ok(CommandNode::group(worktree))
}

fn target_path(invocation: &Invocation<'_>, branch: &str) -> Result<PathBuf> {
    let cwd = invocation
        .cwd
        .canonicalize()
        .unwrap_or_else(|_| invocation.cwd.to_path_buf());
    match worktree_path(&cwd, branch) {
        Some(path) => Ok(path),
        None => bail!("Cannot place a worktree next to {}", cwd.display()),
    }
}

fn add(invocation: &Invocation<'_>, args: AddArgs) -> Result<()> {
    let output = invocation.output;
    let path = target_path(invocation, &args.branch)?;

    output.info(&format!(
        "Creating worktree for branch '{}' at: {}",
        args.branch,
        path.display()
    ));

    if args.fetch || !args.no_fetch {
        output.info("Fetching latest changes...");
        invocation.probe("git fetch --all")?;
    }

    let local = invocation.probe("git branch --list")?;
    let remote = invocation.probe("git branch -r")?;
    let local = if local.success() { local.stdout } else { String::new() };
    let remote = if remote.success() { remote.stdout } else { String::new() };

    let plan = WorktreePlan::decide(&args.branch, &local, &remote, &args.base);
    match &plan {
        WorktreePlan::Local => output.info(&format!(
            "Branch '{}' exists locally, creating worktree...",
            args.branch
        )),
        WorktreePlan::Tracking => output.info(&format!(
            "Branch '{}' exists on remote, creating tracking worktree...",
            args.branch
        )),
        WorktreePlan::New { base: Some(base) } => output.info(&format!(
            "Creating new branch '{}' from '{}'...",
            args.branch, base
        )),
        WorktreePlan::New { base: None } => output.info(&format!(
            "Creating new branch '{}' from current HEAD...",
            args.branch
        )),
    }

    if let Err(e) = invocation.run(&plan.command(&args.branch, &path)) {
        output.hint("For an existing remote branch: samosa git worktree add feature-branch");
        output.hint("For a new branch from main: samosa git worktree add new-feature --base main");
        return Err(e.into());
    }

    output.success("Worktree created successfully!");
    output.info(&format!("Location: {}", path.display()));
    output.info(&format!("To switch: cd {}", path.display()));
    Ok(())
}

fn remove(invocation: &Invocation<'_>, args: RemoveArgs) -> Result<()> {
    let output = invocation.output;
    let path = target_path(invocation, &args.branch)?;
    let path_arg = path.display().to_string();

    output.info(&format!(
        "Removing worktree for branch '{}' at: {}",
        args.branch,
        path.display()
    ));

    if !path.exists() {
        bail!("Worktree directory not found: {}", path.display());
    }

    if let Err(e) = invocation.run(&format!("git worktree remove {}", quote(&path_arg))) {
        output.warn(&format!("{}", e));
        output.info("Attempting force removal...");
        invocation.run(&format!("git worktree remove --force {}", quote(&path_arg)))?;
        output.success("Worktree force removed successfully!");
        return Ok(());
    }

    output.success("Worktree removed successfully!");
    Ok(())
}

fn list(invocation: &Invocation<'_>) -> Result<()> {
    invocation.output.info("Git Worktrees:");
    invocation.run("git worktree list")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Output;
    use crate::process::testing::RecordingRunner;
    use tempfile::TempDir;

    #[test]
    fn path_sits_next_to_project() {
        let path = worktree_path(Path::new("/work/samosa"), "feat/some-feature").unwrap();
        assert_eq!(path, PathBuf::from("/work/samosa-feat-some-feature"));

        assert!(worktree_path(Path::new("/"), "main").is_none());
    }

    #[test]
    fn plan_prefers_local_then_remote() {
        let local = "* main\n  feature\n";
        let remote = "  origin/HEAD -> origin/main\n  origin/main\n  origin/topic\n";

        assert_eq!(WorktreePlan::decide("feature", local, remote, ""), WorktreePlan::Local);
        assert_eq!(WorktreePlan::decide("main", local, remote, ""), WorktreePlan::Local);
        assert_eq!(WorktreePlan::decide("topic", local, remote, ""), WorktreePlan::Tracking);
        assert_eq!(
            WorktreePlan::decide("new", local, remote, "main"),
            WorktreePlan::New {
                base: Some("main".to_string())
            }
        );
        assert_eq!(
            WorktreePlan::decide("new", local, remote, "  "),
            WorktreePlan::New { base: None }
        );
    }

    #[test]
    fn plan_matches_whole_names() {
        // `feat` must not match `feature` or `origin/feature`
        let plan = WorktreePlan::decide("feat", "  feature\n", "  origin/feature\n", "");
        assert_eq!(plan, WorktreePlan::New { base: None });
    }

    #[test]
    fn plan_commands() {
        let path = Path::new("/work/p-topic");

        assert_eq!(
            WorktreePlan::Local.command("topic", path),
            "git worktree add /work/p-topic topic"
        );
        assert_eq!(
            WorktreePlan::Tracking.command("topic", path),
            "git worktree add -b topic /work/p-topic origin/topic"
        );
        assert_eq!(
            WorktreePlan::New { base: None }.command("topic", path),
            "git worktree add -b topic /work/p-topic"
        );
    }

    #[test]
    fn remove_falls_back_to_force() {
        let root = TempDir::new().unwrap();
        let project = root.path().join("proj");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::create_dir_all(root.path().join("proj-topic")).unwrap();

        // Plain removal fails; the forced one falls through to success
        let runner = RecordingRunner::new()
            .respond("git worktree remove /", 1, "")
            .respond("git worktree remove '/", 1, "");
        let output = Output::new(false);
        let invocation = Invocation {
            path: "samosa git worktree remove",
            cwd: &project,
            output: &output,
            runner: &runner,
        };

        let result = remove(
            &invocation,
            RemoveArgs {
                branch: "topic".to_string(),
            },
        );
        assert!(result.is_ok());

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].starts_with("git worktree remove --force"));
    }

    #[test]
    fn remove_missing_worktree_fails_without_git() {
        let root = TempDir::new().unwrap();
        let project = root.path().join("proj");
        std::fs::create_dir_all(&project).unwrap();

        let runner = RecordingRunner::new();
        let output = Output::new(false);
        let invocation = Invocation {
            path: "samosa git worktree remove",
            cwd: &project,
            output: &output,
            runner: &runner,
        };

        let result = remove(
            &invocation,
            RemoveArgs {
                branch: "gone".to_string(),
            },
        );
        assert!(result.is_err());
        assert!(runner.calls().is_empty());
    }
}
