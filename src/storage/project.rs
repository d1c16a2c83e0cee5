//! Project discovery and context
//!
//! A samosa project is any directory containing `.samosa/commands/`. The
//! nearest such ancestor of the working directory is the project root.

use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use super::config::{self, CONFIG_FILE, DEFAULT_CONFIG};
use crate::process::{ProcessError, ProcessRunner, RunOptions, RunOutput, ShellRunner};

/// Name of the marker directory at a project root
pub const MARKER_DIR: &str = ".samosa";

/// Subdirectory of the marker directory holding command modules
pub const COMMANDS_DIR: &str = "commands";

/// Placeholder module written by `samosa local init`
pub const EXAMPLE_MODULE: &str = r#"# Example project-specific commands.
#
# Every entry under `commands` becomes `samosa local <name>`. An entry either
# runs shell lines (`run`) or groups further commands (`commands`).
# Placeholders: {project_root}, {marker_dir}, {<arg name>}, {config.<path>}
commands:
  - name: deploy
    about: Deployment commands for this project.
    commands:
      - name: app
        about: Deploy application to specified environment.
        args:
          - name: environment
            help: Target environment
            choices: [dev, staging, prod]
        run:
          - echo "Deploying {config.project.name} to {environment}..."
          - echo "Project root: {project_root}"

  - name: test
    about: Run project-specific tests.
    run: echo "Running project tests..."

  - name: setup
    about: Setup project development environment.
    run: echo "Setting up development environment..."
"#;

/// Finds the nearest ancestor of `start` (inclusive) that holds `.samosa/commands/`
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());

    start
        .ancestors()
        .find(|dir| dir.join(MARKER_DIR).join(COMMANDS_DIR).is_dir())
        .map(Path::to_path_buf)
}

/// Shared state handed to every project command
///
/// Configuration and the process runner are created on first use and reused
/// for the rest of the invocation.
#[derive(Debug)]
pub struct ProjectContext {
    project_root: PathBuf,
    marker_dir: PathBuf,
    config: OnceCell<Mapping>,
    runner: OnceCell<ShellRunner>,
}

/// Serializable view of a context, sent to executable plugins
#[derive(Debug, Clone, Serialize)]
pub struct ContextPayload {
    pub project_root: PathBuf,
    pub marker_dir: PathBuf,
    pub config: serde_json::Value,
}

impl ProjectContext {
    pub fn new(project_root: impl Into<PathBuf>, marker_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            marker_dir: marker_dir.into(),
            config: OnceCell::new(),
            runner: OnceCell::new(),
        }
    }

    /// Context for a project root using the standard marker directory
    pub fn for_root(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let marker_dir = project_root.join(MARKER_DIR);
        Self::new(project_root, marker_dir)
    }

    /// Discovers the project containing `start`
    pub fn discover(start: &Path) -> Option<Self> {
        find_project_root(start).map(Self::for_root)
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn marker_dir(&self) -> &Path {
        &self.marker_dir
    }

    pub fn commands_dir(&self) -> PathBuf {
        self.marker_dir.join(COMMANDS_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.marker_dir.join(CONFIG_FILE)
    }

    /// Project configuration, loaded on first access
    pub fn config(&self) -> &Mapping {
        self.config.get_or_init(|| config::load_config(&self.config_file()))
    }

    /// Looks up a dotted configuration path
    pub fn config_value(&self, path: &str) -> Option<&Value> {
        config::lookup(self.config(), path)
    }

    /// Process runner bound to the project root, created on first access
    pub fn runner(&self) -> &ShellRunner {
        self.runner
            .get_or_init(|| ShellRunner::in_dir(self.project_root.clone()))
    }

    /// Runs a command in the project root
    pub fn run(&self, command: &str, options: &RunOptions) -> Result<RunOutput, ProcessError> {
        self.runner().run(command, options)
    }

    /// Snapshot for plugins that run out of process
    pub fn payload(&self) -> ContextPayload {
        let config = serde_json::to_value(self.config()).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "configuration is not representable as JSON");
            serde_json::Value::Null
        });

        ContextPayload {
            project_root: self.project_root.clone(),
            marker_dir: self.marker_dir.clone(),
            config,
        }
    }
}

/// Result of bootstrapping a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Created {
        marker_dir: PathBuf,
        commands_dir: PathBuf,
        example_module: PathBuf,
        config_file: PathBuf,
    },

    /// The marker directory was already there; nothing was touched
    AlreadyExists(PathBuf),
}

/// Creates `.samosa/` with an example module and default configuration
pub fn init_project(root: &Path) -> Result<InitOutcome> {
    let marker_dir = root.join(MARKER_DIR);
    if marker_dir.exists() {
        return Ok(InitOutcome::AlreadyExists(marker_dir));
    }

    let commands_dir = marker_dir.join(COMMANDS_DIR);
    fs::create_dir_all(&commands_dir).with_context(|| {
        format!(
            "Failed to create commands directory: {}",
            commands_dir.display()
        )
    })?;

    let example_module = commands_dir.join("example.yaml");
    fs::write(&example_module, EXAMPLE_MODULE)
        .with_context(|| format!("Failed to write example module: {}", example_module.display()))?;

    let config_file = marker_dir.join(CONFIG_FILE);
    fs::write(&config_file, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write config: {}", config_file.display()))?;

    Ok(InitOutcome::Created {
        marker_dir,
        commands_dir,
        example_module,
        config_file,
    })
}
