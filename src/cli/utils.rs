//! Utility and helper commands
//!
//! Shell integration edits files under the user's home directory. Every edit
//! is marked with a comment so it can be found and removed again.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use clap_complete::{generate, shells};
use directories::BaseDirs;

use crate::domain::{CommandNode, CommandRegistry, Invocation, LeafCommand, RegistryError};

const ALIAS_MARKER: &str = "# Samosa CLI alias";
const ZSH_COMPLETION_MARKER: &str = "# Samosa completion setup";
const ZSH_COMPLETION_SETUP: &str = "fpath=(~/.zsh/completions $fpath)\nautoload -U compinit && compinit";

/// A shell samosa can integrate with
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    /// Guesses the shell from a `SHELL` value
    pub fn detect(shell_path: &str) -> Option<Self> {
        let shell_path = shell_path.to_lowercase();
        if shell_path.contains("zsh") {
            Some(Shell::Zsh)
        } else if shell_path.contains("bash") {
            Some(Shell::Bash)
        } else if shell_path.contains("fish") {
            Some(Shell::Fish)
        } else {
            None
        }
    }

    fn alias_line(self) -> &'static str {
        match self {
            Shell::Fish => "alias s samosa",
            Shell::Bash | Shell::Zsh => "alias s=\"samosa\"",
        }
    }

    fn rc_hint(self) -> &'static str {
        match self {
            Shell::Bash => "source ~/.bashrc",
            Shell::Zsh => "source ~/.zshrc",
            Shell::Fish => "source ~/.config/fish/config.fish",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum ShellChoice {
    #[default]
    Auto,
    Bash,
    Zsh,
    Fish,
}

#[derive(Debug, Args)]
struct ShellArgs {
    /// Shell to configure
    #[arg(long, value_enum, default_value = "auto")]
    shell: ShellChoice,

    /// Answer yes to prompts
    #[arg(long, short)]
    yes: bool,
}

#[derive(Debug, Args)]
struct CompletionsArgs {
    /// Shell to generate the script for
    #[arg(value_enum)]
    shell: Shell,
}

/// Resolves `--shell`, reading `SHELL` for `auto`
fn resolve_shell(choice: ShellChoice) -> Result<Shell> {
    let shell = match choice {
        ShellChoice::Bash => Some(Shell::Bash),
        ShellChoice::Zsh => Some(Shell::Zsh),
        ShellChoice::Fish => Some(Shell::Fish),
        ShellChoice::Auto => std::env::var("SHELL").ok().as_deref().and_then(Shell::detect),
    };

    match shell {
        Some(shell) => Ok(shell),
        None => bail!("Could not auto-detect shell. Please specify: --shell bash|zsh|fish"),
    }
}

/// Shell configuration files below a home directory
#[derive(Debug, Clone)]
pub struct ShellFiles {
    home: PathBuf,
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Written(PathBuf),
    Unchanged(PathBuf),
    Removed(PathBuf),
    /// Another `s` alias is already defined and was left in place
    Conflicting(PathBuf),
}

impl ShellFiles {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Files of the current user
    pub fn for_user() -> Result<Self> {
        let dirs = BaseDirs::new().context("Could not determine home directory")?;
        Ok(Self::new(dirs.home_dir()))
    }

    pub fn alias_files(&self, shell: Shell) -> Vec<PathBuf> {
        match shell {
            Shell::Bash => vec![self.home.join(".bashrc"), self.home.join(".bash_profile")],
            Shell::Zsh => vec![self.home.join(".zshrc")],
            Shell::Fish => vec![self.home.join(".config/fish/config.fish")],
        }
    }

    pub fn completion_file(&self, shell: Shell) -> PathBuf {
        match shell {
            Shell::Bash => self
                .home
                .join(".local/share/bash-completion/completions/samosa"),
            Shell::Zsh => self.home.join(".zsh/completions/_samosa"),
            Shell::Fish => self.home.join(".config/fish/completions/samosa.fish"),
        }
    }

    /// Appends the `s` alias to every config file that lacks one
    pub fn install_alias(&self, shell: Shell) -> Result<Vec<FileChange>> {
        let mut changes = Vec::new();

        for path in self.alias_files(shell) {
            let content = read_optional(&path)?;
            if content.lines().any(is_samosa_alias) {
                changes.push(FileChange::Unchanged(path));
                continue;
            }
            if has_alias(&content) {
                changes.push(FileChange::Conflicting(path));
                continue;
            }

            write_file(&path, &format!("{}\n{}\n{}\n", content, ALIAS_MARKER, shell.alias_line()))?;
            changes.push(FileChange::Written(path));
        }

        Ok(changes)
    }

    /// Removes samosa alias lines; files without one are left alone
    pub fn uninstall_alias(&self, shell: Shell) -> Result<Vec<FileChange>> {
        let mut changes = Vec::new();

        for path in self.alias_files(shell) {
            if !path.exists() {
                continue;
            }
            let content = read_optional(&path)?;
            match strip_alias(&content) {
                Some(stripped) => {
                    write_file(&path, &stripped)?;
                    changes.push(FileChange::Removed(path));
                }
                None => changes.push(FileChange::Unchanged(path)),
            }
        }

        Ok(changes)
    }

    /// Writes the completion script, plus the zsh `fpath` setup if missing
    pub fn install_completion(&self, shell: Shell, script: &[u8]) -> Result<Vec<FileChange>> {
        let path = self.completion_file(shell);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, script).with_context(|| format!("Failed to write {}", path.display()))?;
        let mut changes = vec![FileChange::Written(path)];

        if shell == Shell::Zsh {
            let zshrc = self.home.join(".zshrc");
            let content = read_optional(&zshrc)?;
            if content.contains(".zsh/completions") {
                changes.push(FileChange::Unchanged(zshrc));
            } else {
                write_file(
                    &zshrc,
                    &format!("{}\n{}\n{}\n", content, ZSH_COMPLETION_MARKER, ZSH_COMPLETION_SETUP),
                )?;
                changes.push(FileChange::Written(zshrc));
            }
        }

        Ok(changes)
    }

    pub fn uninstall_completion(&self, shell: Shell) -> Result<Option<FileChange>> {
        let path = self.completion_file(shell);
        if !path.exists() {
            return Ok(None);
        }
        fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(Some(FileChange::Removed(path)))
    }
}

fn read_optional(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Whether a shell config already defines an `s` alias
pub fn has_alias(content: &str) -> bool {
    content.contains("alias s=") || content.contains("alias s ")
}

/// Whether `line` is an `s` alias pointing at samosa
fn is_samosa_alias(line: &str) -> bool {
    has_alias(line) && line.contains("samosa")
}

/// Content without samosa alias lines, or `None` if there were none
///
/// The marker comment goes only together with the alias line after it.
pub fn strip_alias(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let mut kept = Vec::new();
    let mut removed = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if line.trim() == ALIAS_MARKER && lines.get(i + 1).is_some_and(|next| is_samosa_alias(next)) {
            removed = true;
            i += 2;
            continue;
        }
        if is_samosa_alias(line) {
            removed = true;
        } else {
            kept.push(line);
        }
        i += 1;
    }

    if !removed {
        return None;
    }
    let mut out = kept.join("\n");
    out.push('\n');
    Some(out)
}

/// Completion script for `command`
pub fn completion_script(shell: Shell, command: &mut clap::Command) -> Vec<u8> {
    let name = command.get_name().to_string();
    let mut script = Vec::new();

    match shell {
        Shell::Bash => generate(shells::Bash, command, &name, &mut script),
        Shell::Zsh => generate(shells::Zsh, command, &name, &mut script),
        Shell::Fish => generate(shells::Fish, command, &name, &mut script),
    }

    script
}

/// The `utils` group
pub fn command() -> Result<CommandNode, RegistryError> {
    let mut utils = CommandRegistry::new("utils", "Utility and helper commands.");

    utils.register(
        CommandNode::leaf("info", "Show project information.", LeafCommand::simple(info)),
        &[],
    )?;
    utils.register(
        CommandNode::leaf("env", "Show environment information.", LeafCommand::simple(env)),
        &[],
    )?;
    utils.register(
        CommandNode::leaf(
            "install-alias",
            "Install shell alias 's' for samosa command.",
            LeafCommand::typed(install_alias),
        ),
        &[],
    )?;
    utils.register(
        CommandNode::leaf(
            "uninstall-alias",
            "Remove shell alias 's' for samosa command.",
            LeafCommand::typed(uninstall_alias),
        ),
        &[],
    )?;
    utils.register(
        CommandNode::leaf(
            "install-completion",
            "Install shell completion for samosa command.",
            LeafCommand::typed(install_completion),
        ),
        &[],
    )?;
    utils.register(
        CommandNode::leaf(
            "uninstall-completion",
            "Remove shell completion for samosa command.",
            LeafCommand::typed(uninstall_completion),
        ),
        &[],
    )?;
    utils.register(
        CommandNode::leaf(
            "completions",
            "Print a shell completion script.",
            LeafCommand::typed(completions),
        ),
        &[],
    )?;

    Ok(CommandNode::group(utils))
}

fn info(invocation: &Invocation<'_>) -> Result<()> {
    let output = invocation.output;
    let name = env!("CARGO_PKG_NAME");
    let mut title = name.chars();
    let title: String = title
        .next()
        .map(|first| first.to_uppercase().chain(title).collect())
        .unwrap_or_default();

    output.info(&format!("{} CLI Tool", title));
    output.info(&format!("Version: {}", env!("CARGO_PKG_VERSION")));
    output.info(env!("CARGO_PKG_DESCRIPTION"));
    Ok(())
}

fn env(invocation: &Invocation<'_>) -> Result<()> {
    let output = invocation.output;
    output.info(&format!("Samosa version: {}", env!("CARGO_PKG_VERSION")));
    output.info(&format!(
        "Platform: {}-{} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH,
        std::env::consts::FAMILY
    ));
    output.info(&format!("Working directory: {}", invocation.cwd.display()));
    Ok(())
}

fn install_alias(invocation: &Invocation<'_>, args: ShellArgs) -> Result<()> {
    let output = invocation.output;
    let shell = resolve_shell(args.shell)?;

    if let Ok(exe) = std::env::current_exe() {
        output.info(&format!("Found samosa at: {}", exe.display()));
    }
    output.info(&format!("Configuring {:?} shell...", shell).to_lowercase());

    let existing = invocation.probe("command -v s")?;
    if existing.success() && !existing.text().is_empty() {
        let target = existing.text();
        output.warn(&format!("'s' command already exists: {}", target));
        if target.contains("samosa") {
            output.success("'s' already points to samosa!");
            return Ok(());
        }
        if !output.confirm("'s' exists but points elsewhere. Override?", args.yes)? {
            output.info("Installation cancelled to avoid conflicts");
            return Ok(());
        }
    }

    let changes = ShellFiles::for_user()?.install_alias(shell)?;
    let mut installed = false;
    for change in &changes {
        match change {
            FileChange::Written(path) => {
                installed = true;
                output.info(&format!("Added alias to {}", path.display()));
            }
            FileChange::Unchanged(path) => {
                installed = true;
                output.info(&format!("Samosa alias already in {}", path.display()));
            }
            FileChange::Conflicting(path) => output.warn(&format!(
                "Another 's' alias is defined in {}; left it in place",
                path.display()
            )),
            FileChange::Removed(_) => {}
        }
    }

    if !installed {
        output.hint("Remove the existing 's' alias and run this command again");
        return Ok(());
    }

    output.success("Shell alias installed successfully!");
    output.info(&format!("Added: {}", shell.alias_line()));
    output.info(&format!(
        "Restart your terminal or run: {}",
        shell.rc_hint()
    ));
    Ok(())
}

fn uninstall_alias(invocation: &Invocation<'_>, args: ShellArgs) -> Result<()> {
    let output = invocation.output;
    let shell = resolve_shell(args.shell)?;

    let changes = ShellFiles::for_user()?.uninstall_alias(shell)?;
    let mut removed = false;
    for change in &changes {
        match change {
            FileChange::Removed(path) => {
                removed = true;
                output.info(&format!("Removed alias from {}", path.display()));
            }
            FileChange::Unchanged(path) => {
                output.info(&format!("No alias found in {}", path.display()))
            }
            FileChange::Written(_) | FileChange::Conflicting(_) => {}
        }
    }

    if removed {
        output.success("Shell alias removed! Restart your terminal to apply changes");
    } else {
        output.info("No samosa aliases found to remove");
    }
    Ok(())
}

fn install_completion(invocation: &Invocation<'_>, args: ShellArgs) -> Result<()> {
    let output = invocation.output;
    let shell = resolve_shell(args.shell)?;

    let mut command = super::completion_command(invocation.cwd)?;
    let script = completion_script(shell, &mut command);

    for change in ShellFiles::for_user()?.install_completion(shell, &script)? {
        match change {
            FileChange::Written(path) => {
                output.info(&format!("Installed completion to {}", path.display()))
            }
            FileChange::Unchanged(path) => {
                output.info(&format!("Completion setup already in {}", path.display()))
            }
            FileChange::Removed(_) | FileChange::Conflicting(_) => {}
        }
    }

    output.success("Shell completion installed successfully!");
    output.info("Restart your terminal to activate completion");
    Ok(())
}

fn uninstall_completion(invocation: &Invocation<'_>, args: ShellArgs) -> Result<()> {
    let output = invocation.output;
    let shell = resolve_shell(args.shell)?;

    match ShellFiles::for_user()?.uninstall_completion(shell)? {
        Some(FileChange::Removed(path)) => {
            output.success(&format!("Removed {}", path.display()));
            output.info("Restart your terminal to apply changes");
        }
        _ => output.info("No samosa completions found to remove"),
    }
    Ok(())
}

fn completions(invocation: &Invocation<'_>, args: CompletionsArgs) -> Result<()> {
    use std::io::Write;

    let mut command = super::completion_command(invocation.cwd)?;
    let script = completion_script(args.shell, &mut command);
    std::io::stdout().write_all(&script)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn detects_shell_from_path() {
        assert_eq!(Shell::detect("/bin/zsh"), Some(Shell::Zsh));
        assert_eq!(Shell::detect("/usr/local/bin/BASH"), Some(Shell::Bash));
        assert_eq!(Shell::detect("/opt/homebrew/bin/fish"), Some(Shell::Fish));
        assert_eq!(Shell::detect("/bin/tcsh"), None);
        assert_eq!(Shell::detect(""), None);
    }

    #[test]
    fn explicit_shell_wins() {
        assert_eq!(resolve_shell(ShellChoice::Fish).unwrap(), Shell::Fish);
    }

    #[test]
    fn alias_install_is_idempotent() {
        let home = TempDir::new().unwrap();
        let files = ShellFiles::new(home.path());

        let first = files.install_alias(Shell::Zsh).unwrap();
        assert!(matches!(first[0], FileChange::Written(_)));

        let second = files.install_alias(Shell::Zsh).unwrap();
        assert!(matches!(second[0], FileChange::Unchanged(_)));

        let content = fs::read_to_string(home.path().join(".zshrc")).unwrap();
        assert_eq!(content.matches("alias s=\"samosa\"").count(), 1);
    }

    #[test]
    fn fish_alias_goes_to_config_dir() {
        let home = TempDir::new().unwrap();
        ShellFiles::new(home.path()).install_alias(Shell::Fish).unwrap();

        let content = fs::read_to_string(home.path().join(".config/fish/config.fish")).unwrap();
        assert!(content.contains("alias s samosa"));
    }

    #[test]
    fn alias_uninstall_keeps_other_lines() {
        let home = TempDir::new().unwrap();
        let bashrc = home.path().join(".bashrc");
        fs::write(&bashrc, "export PATH=$HOME/bin:$PATH\nalias ll='ls -l'\n").unwrap();
        let files = ShellFiles::new(home.path());

        files.install_alias(Shell::Bash).unwrap();
        let changes = files.uninstall_alias(Shell::Bash).unwrap();
        assert!(changes.iter().any(|c| matches!(c, FileChange::Removed(_))));

        let content = fs::read_to_string(&bashrc).unwrap();
        assert!(!content.contains("samosa"));
        assert!(content.contains("alias ll='ls -l'"));
        assert!(content.contains("export PATH"));
    }

    #[test]
    fn foreign_alias_is_not_stripped() {
        assert!(strip_alias("alias s='git status'\n").is_none());
        assert!(has_alias("alias s='git status'\n"));
    }

    #[test]
    fn marker_without_alias_keeps_the_next_line() {
        let content = format!("{}\nexport EDITOR=vim\n", ALIAS_MARKER);
        assert!(strip_alias(&content).is_none());

        let edited = format!("{}\nalias s='git status'\nexport EDITOR=vim\n", ALIAS_MARKER);
        assert!(strip_alias(&edited).is_none());
    }

    #[test]
    fn marker_and_alias_are_removed_together() {
        let content = format!("export A=1\n{}\nalias s=\"samosa\"\nexport EDITOR=vim\n", ALIAS_MARKER);
        assert_eq!(strip_alias(&content).unwrap(), "export A=1\nexport EDITOR=vim\n");
    }

    #[test]
    fn foreign_alias_file_is_reported_as_conflicting() {
        let home = TempDir::new().unwrap();
        let zshrc = home.path().join(".zshrc");
        fs::write(&zshrc, "alias s='git status'\n").unwrap();

        let changes = ShellFiles::new(home.path()).install_alias(Shell::Zsh).unwrap();
        assert_eq!(changes, vec![FileChange::Conflicting(zshrc.clone())]);
        assert_eq!(fs::read_to_string(&zshrc).unwrap(), "alias s='git status'\n");
    }

    #[test]
    fn zsh_completion_sets_up_fpath_once() {
        let home = TempDir::new().unwrap();
        let files = ShellFiles::new(home.path());

        files.install_completion(Shell::Zsh, b"#compdef samosa\n").unwrap();
        files.install_completion(Shell::Zsh, b"#compdef samosa\n").unwrap();

        assert!(home.path().join(".zsh/completions/_samosa").is_file());
        let zshrc = fs::read_to_string(home.path().join(".zshrc")).unwrap();
        assert_eq!(zshrc.matches(ZSH_COMPLETION_MARKER).count(), 1);

        assert!(files.uninstall_completion(Shell::Zsh).unwrap().is_some());
        assert!(files.uninstall_completion(Shell::Zsh).unwrap().is_none());
    }

    #[test]
    fn completion_script_names_commands() {
        let mut command = clap::Command::new("samosa")
            .subcommand(clap::Command::new("git").subcommand(clap::Command::new("status")));

        let script = String::from_utf8(completion_script(Shell::Bash, &mut command)).unwrap();
        assert!(script.contains("samosa"));
        assert!(script.contains("status"));
    }
}
