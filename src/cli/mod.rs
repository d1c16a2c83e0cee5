//! # Command-Line Interface
//!
//! The root dispatcher and the built-in command groups.
//!
//! ## Command Groups
//!
//! | Group | Aliases | Examples |
//! |-------|---------|----------|
//! | git | `g` | `git sync`, `git backup add`, `git worktree add feat/x` |
//! | utils | `u` | `utils info`, `utils install-alias` |
//! | dev | `d`, `development` | `dev test -k slow`, `dev fmt --check` |
//! | local | `l` | `local init`, project commands from `.samosa/commands/` |
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! samosa --verbose git sync
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command,
//! and [`report()`] to turn a failure into an exit code.

mod app;
mod backup;
mod dev;
mod dispatch;
mod git;
mod local;
mod output;
mod utils;
mod worktree;

pub use app::{build_root_dispatcher, completion_command, exit_status, report, run, Cli, CommandPath};
pub use backup::{delete_backups, normalize_target, BackupError, DeleteReport, BACKUP_PREFIX};
pub use dispatch::{dispatch, DispatchEnv, DispatchError};
pub use git::github_url;
pub use output::Output;
pub use utils::{Shell, ShellFiles};
pub use worktree::{worktree_path, WorktreePlan};
