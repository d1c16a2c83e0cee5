//! Git version control commands

use std::sync::OnceLock;

use anyhow::{bail, Result};
use clap::Args;
use regex::Regex;

use super::{backup, worktree};
use crate::domain::{CommandNode, CommandRegistry, Invocation, LeafCommand, RegistryError};
use crate::process::quote;

/// Fallback branches tried, in order, when the remote has no HEAD
const MAIN_BRANCH_CANDIDATES: [&str; 3] = ["main", "master", "develop"];

#[derive(Debug, Args)]
struct AddArgs {
    /// Files to add (default: all files)
    #[arg(long, default_value = ".")]
    files: String,
}

#[derive(Debug, Args)]
struct CommitArgs {
    /// Commit message
    message: String,
}

#[derive(Debug, Args)]
struct RemoteArgs {
    /// Remote name
    #[arg(long, default_value = "origin")]
    remote: String,

    /// Branch (default: current branch)
    #[arg(long)]
    branch: Option<String>,
}

#[derive(Debug, Args)]
struct MergeArgs {
    /// Branch to merge into the current branch
    branch: String,
}

#[derive(Debug, Args)]
struct CheckoutArgs {
    /// Branch to check out
    branch: String,

    /// Create the branch if it doesn't exist
    #[arg(long)]
    create: bool,
}

#[derive(Debug, Args)]
struct SyncArgs {
    /// Remote name
    #[arg(long, default_value = "origin")]
    remote: String,

    /// Main branch name (auto-detected if not provided)
    #[arg(long)]
    main_branch: Option<String>,
}

/// The `git` group
pub fn command() -> Result<CommandNode, RegistryError> {
    let mut git = CommandRegistry::new("git", "Git version control commands.");

    git.register(
        CommandNode::leaf("status", "Show git status.", LeafCommand::simple(status)),
        &[],
    )?;
    git.register(
        CommandNode::leaf("add", "Add files to git staging.", LeafCommand::typed(add)),
        &[],
    )?;
    git.register(
        CommandNode::leaf("commit", "Create a git commit.", LeafCommand::typed(commit)),
        &[],
    )?;
    git.register(
        CommandNode::leaf("push", "Push changes to remote.", LeafCommand::typed(push)),
        &[],
    )?;
    git.register(
        CommandNode::leaf("pull", "Pull changes from remote.", LeafCommand::typed(pull)),
        &[],
    )?;
    git.register(
        CommandNode::leaf(
            "merge",
            "Merge a branch into current branch.",
            LeafCommand::typed(merge),
        ),
        &[],
    )?;
    git.register(
        CommandNode::leaf("checkout", "Checkout a branch.", LeafCommand::typed(checkout)),
        &[],
    )?;
    git.register(
        CommandNode::leaf(
            "sync",
            "Sync current branch with remote main.",
            LeafCommand::typed(sync),
        ),
        &[],
    )?;
    git.register(
        CommandNode::leaf(
            "open",
            "Open current git repository in GitHub in the browser.",
            LeafCommand::simple(open_repository),
        ),
        &[],
    )?;
    git.register(backup::command()?, &["b"])?;
    git.register(worktree::command()?, &["w"])?;

    Ok(CommandNode::group(git))
}

fn status(invocation: &Invocation<'_>) -> Result<()> {
    invocation.run("git status")?;
    Ok(())
}

fn add(invocation: &Invocation<'_>, args: AddArgs) -> Result<()> {
    let files: Vec<_> = args.files.split_whitespace().map(quote).collect();
    invocation.run(&format!("git add {}", files.join(" ")))?;
    Ok(())
}

fn commit(invocation: &Invocation<'_>, args: CommitArgs) -> Result<()> {
    invocation.run(&format!("git commit -m {}", quote(&args.message)))?;
    Ok(())
}

fn push(invocation: &Invocation<'_>, args: RemoteArgs) -> Result<()> {
    invocation.run(&remote_command("push", &args))?;
    Ok(())
}

fn pull(invocation: &Invocation<'_>, args: RemoteArgs) -> Result<()> {
    invocation.run(&remote_command("pull", &args))?;
    Ok(())
}

fn remote_command(verb: &str, args: &RemoteArgs) -> String {
    match &args.branch {
        Some(branch) => format!("git {} {} {}", verb, quote(&args.remote), quote(branch)),
        None => format!("git {} {}", verb, quote(&args.remote)),
    }
}

fn merge(invocation: &Invocation<'_>, args: MergeArgs) -> Result<()> {
    invocation.run(&format!("git merge {}", quote(&args.branch)))?;
    Ok(())
}

fn checkout(invocation: &Invocation<'_>, args: CheckoutArgs) -> Result<()> {
    let command = if args.create {
        format!("git checkout -b {}", quote(&args.branch))
    } else {
        format!("git checkout {}", quote(&args.branch))
    };
    invocation.run(&command)?;
    Ok(())
}

/// Name of the checked-out branch
pub fn current_branch(invocation: &Invocation<'_>) -> Result<String> {
    let branch = invocation.capture("git branch --show-current")?.text().to_string();
    if branch.is_empty() {
        bail!("Could not determine current branch");
    }
    Ok(branch)
}

/// Finds the main branch of `remote`
///
/// Uses the remote HEAD when set, then the first of main/master/develop that
/// exists on the remote, and finally `main`.
pub fn detect_main_branch(invocation: &Invocation<'_>, remote: &str) -> Result<String> {
    let head_ref = format!("refs/remotes/{}/HEAD", remote);
    let head = invocation.probe(&format!("git symbolic-ref {}", quote(&head_ref)))?;
    if head.success() {
        let target = head.text();
        let prefix = format!("refs/remotes/{}/", remote);
        let branch = target
            .strip_prefix(&prefix)
            .or_else(|| target.rsplit('/').next())
            .unwrap_or(target);
        if !branch.is_empty() {
            return Ok(branch.to_string());
        }
    }

    for candidate in MAIN_BRANCH_CANDIDATES {
        let heads = invocation.probe(&format!(
            "git ls-remote --heads {} {}",
            quote(remote),
            candidate
        ))?;
        if heads.success() && !heads.text().is_empty() {
            return Ok(candidate.to_string());
        }
    }

    Ok("main".to_string())
}

fn sync(invocation: &Invocation<'_>, args: SyncArgs) -> Result<()> {
    let output = invocation.output;
    let result = (|| -> Result<()> {
        let current = current_branch(invocation)?;
        let main = match args.main_branch.as_deref().map(str::trim) {
            Some(branch) if !branch.is_empty() => branch.to_string(),
            _ => detect_main_branch(invocation, &args.remote)?,
        };

        output.info(&format!(
            "Syncing branch '{}' with {}/{}...",
            current, args.remote, main
        ));
        output.info("Fetching latest changes...");
        invocation.run(&format!("git fetch {}", quote(&args.remote)))?;

        output.info(&format!("Rebasing {} onto {}/{}...", current, args.remote, main));
        invocation.run(&format!(
            "git rebase {}",
            quote(&format!("{}/{}", args.remote, main))
        ))?;

        output.success("Branch synced successfully!");
        Ok(())
    })();

    if result.is_err() {
        output.hint("Make sure you have no uncommitted changes and the remote exists");
    }
    result
}

/// Web URL of a GitHub remote (SSH, or HTTPS with or without `.git`)
pub fn github_url(remote_url: &str) -> Option<String> {
    remote_patterns().iter().find_map(|pattern| {
        let captures = pattern.captures(remote_url)?;
        Some(format!("https://github.com/{}/{}", &captures[1], &captures[2]))
    })
}

fn remote_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^git@github\.com:([^/]+)/(.+)\.git$",
            r"^https://github\.com/([^/]+)/(.+?)\.git$",
            r"^https://github\.com/([^/]+)/([^/]+?)/?$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("remote pattern is valid"))
        .collect()
    })
}

fn open_repository(invocation: &Invocation<'_>) -> Result<()> {
    let output = invocation.output;

    let remote = invocation.probe("git remote get-url origin")?;
    if !remote.success() || remote.text().is_empty() {
        output.hint("Make sure you're in a git repository with a GitHub remote");
        bail!("No remote 'origin' found");
    }

    let remote_url = remote.text();
    output.info(&format!("Found remote URL: {}", remote_url));

    let Some(url) = github_url(remote_url) else {
        output.hint(
            "Supported formats: git@github.com:user/repo.git or https://github.com/user/repo.git",
        );
        bail!("Could not parse GitHub URL from: {}", remote_url);
    };

    output.info(&format!("Opening: {}", url));
    open::that(&url)?;
    output.success("Repository opened in browser!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::cli::Output;
    use crate::process::testing::RecordingRunner;

    fn with_invocation<T>(runner: &RecordingRunner, f: impl FnOnce(&Invocation<'_>) -> T) -> T {
        let output = Output::new(false);
        let invocation = Invocation {
            path: "samosa git",
            cwd: Path::new("."),
            output: &output,
            runner,
        };
        f(&invocation)
    }

    #[test]
    fn remote_patterns_are_compiled_once() {
        assert_eq!(remote_patterns().len(), 3);
        assert!(std::ptr::eq(remote_patterns(), remote_patterns()));
    }

    #[test]
    fn github_urls() {
        assert_eq!(
            github_url("git@github.com:user/repo.git").unwrap(),
            "https://github.com/user/repo"
        );
        assert_eq!(
            github_url("https://github.com/user/repo.git").unwrap(),
            "https://github.com/user/repo"
        );
        assert_eq!(
            github_url("https://github.com/user/repo").unwrap(),
            "https://github.com/user/repo"
        );
        assert_eq!(
            github_url("https://github.com/user/repo/").unwrap(),
            "https://github.com/user/repo"
        );
        assert!(github_url("https://gitlab.com/user/repo.git").is_none());
    }

    #[test]
    fn main_branch_from_remote_head() {
        let runner = RecordingRunner::new().respond(
            "git symbolic-ref",
            0,
            "refs/remotes/origin/trunk\n",
        );

        let branch = with_invocation(&runner, |inv| detect_main_branch(inv, "origin")).unwrap();
        assert_eq!(branch, "trunk");
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn main_branch_falls_back_to_known_names() {
        let runner = RecordingRunner::new()
            .respond("git symbolic-ref", 128, "")
            .respond("git ls-remote --heads origin main", 0, "")
            .respond("git ls-remote --heads origin master", 0, "abc123\trefs/heads/master\n");

        let branch = with_invocation(&runner, |inv| detect_main_branch(inv, "origin")).unwrap();
        assert_eq!(branch, "master");
    }

    #[test]
    fn main_branch_defaults_to_main() {
        let runner = RecordingRunner::new().respond("git", 2, "");

        let branch = with_invocation(&runner, |inv| detect_main_branch(inv, "origin")).unwrap();
        assert_eq!(branch, "main");
    }

    #[test]
    fn sync_fetches_then_rebases() {
        let runner = RecordingRunner::new().respond("git branch --show-current", 0, "feature\n");
        let args = SyncArgs {
            remote: "origin".to_string(),
            main_branch: Some("develop".to_string()),
        };

        with_invocation(&runner, |inv| sync(inv, args)).unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                "git branch --show-current",
                "git fetch origin",
                "git rebase origin/develop"
            ]
        );
    }

    #[test]
    fn sync_without_branch_fails() {
        let runner = RecordingRunner::new().respond("git branch --show-current", 0, "");
        let args = SyncArgs {
            remote: "origin".to_string(),
            main_branch: None,
        };

        let err = with_invocation(&runner, |inv| sync(inv, args)).unwrap_err();
        assert!(err.to_string().contains("current branch"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn commit_message_is_quoted() {
        let runner = RecordingRunner::new();
        let args = CommitArgs {
            message: "fix the thing".to_string(),
        };

        with_invocation(&runner, |inv| commit(inv, args)).unwrap();
        assert_eq!(runner.calls(), vec!["git commit -m 'fix the thing'"]);
    }

    #[test]
    fn push_with_and_without_branch() {
        let runner = RecordingRunner::new();
        with_invocation(&runner, |inv| {
            push(
                inv,
                RemoteArgs {
                    remote: "origin".to_string(),
                    branch: None,
                },
            )?;
            push(
                inv,
                RemoteArgs {
                    remote: "upstream".to_string(),
                    branch: Some("main".to_string()),
                },
            )
        })
        .unwrap();

        assert_eq!(runner.calls(), vec!["git push origin", "git push upstream main"]);
    }

    #[test]
    fn group_lists_subgroups_with_aliases() {
        let node = command().unwrap();
        let help = node.subcommands().unwrap().render_help();
        let names: Vec<_> = help.iter().map(|e| e.display_name.as_str()).collect();

        assert!(names.contains(&"backup (b)"));
        assert!(names.contains(&"worktree (w)"));
    }
}
