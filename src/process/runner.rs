//! Shell command execution

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command '{command}' exited with code {code}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },
}

impl ProcessError {
    /// Exit code of the failed process, if it ran at all
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Spawn { .. } => None,
            ProcessError::NonZeroExit { code, .. } => Some(*code),
        }
    }
}

/// Options for a single command execution
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Working directory (overrides the runner's own directory)
    pub cwd: Option<PathBuf>,

    /// Capture stdout/stderr instead of streaming them to the terminal
    pub capture: bool,

    /// Return normally on a nonzero exit
    pub allow_failure: bool,

    /// Keep stdin attached to the terminal even when capturing
    pub interactive: bool,

    /// Extra environment variables for the child
    pub env: Vec<(String, String)>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn allow_failure(mut self) -> Self {
        self.allow_failure = true;
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Trimmed stdout
    pub fn text(&self) -> &str {
        self.stdout.trim()
    }
}

/// Something that can execute a command line
pub trait ProcessRunner {
    fn run(&self, command: &str, options: &RunOptions) -> Result<RunOutput, ProcessError>;
}

/// Runs command lines through the platform shell
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    cwd: Option<PathBuf>,
}

impl ShellRunner {
    /// Runner that uses the process working directory
    pub fn new() -> Self {
        Self { cwd: None }
    }

    /// Runner bound to a working directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(dir.into()),
        }
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    fn shell_command(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }

        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

impl ProcessRunner for ShellRunner {
    fn run(&self, command: &str, options: &RunOptions) -> Result<RunOutput, ProcessError> {
        let mut cmd = Self::shell_command(command);

        let cwd = options.cwd.as_deref().or(self.cwd.as_deref());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        tracing::debug!(command, cwd = ?cwd, capture = options.capture, "running command");

        let spawn_error = |source| ProcessError::Spawn {
            command: command.to_string(),
            source,
        };

        let output = if options.capture {
            let stdin = if options.interactive {
                Stdio::inherit()
            } else {
                Stdio::null()
            };
            let out = cmd
                .stdin(stdin)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .map_err(spawn_error)?;

            RunOutput {
                code: exit_code(out.status),
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            }
        } else {
            let status = cmd.status().map_err(spawn_error)?;
            RunOutput {
                code: exit_code(status),
                stdout: String::new(),
                stderr: String::new(),
            }
        };

        finish(command, output, options)
    }
}

/// Applies the nonzero-exit policy to a finished command
fn finish(command: &str, output: RunOutput, options: &RunOptions) -> Result<RunOutput, ProcessError> {
    if output.success() || options.allow_failure {
        return Ok(output);
    }

    Err(ProcessError::NonZeroExit {
        command: command.to_string(),
        code: output.code,
        stderr: output.stderr,
    })
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Quotes a single argument for `sh`
pub fn quote(arg: &str) -> Cow<'_, str> {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c));

    if safe {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}
