//! Project command discovery and loading
//!
//! Modules are read from `.samosa/commands/` of the nearest project:
//! 1. `*.yaml` / `*.yml` files (declarative modules)
//! 2. Executables speaking the manifest protocol
//!
//! Files starting with `__` or `.` are skipped, as is anything else that is
//! neither YAML nor executable.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::rc::Rc;

use super::module::{self, context_env, BuiltCommand, ModuleError};
use super::protocol::{CommandDescriptor, PluginManifest, PluginRequest};
use crate::domain::{CommandNode, CommandRegistry, LeafCommand};
use crate::process::quote;
use crate::storage::ProjectContext;

/// File names starting with this prefix are never loaded
pub const RESERVED_PREFIX: &str = "__";

/// How a file in the commands directory is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Declarative,
    Executable,
}

/// A command harvested from a module
#[derive(Debug)]
pub struct LoadedCommand {
    pub node: CommandNode,
    pub aliases: Vec<String>,
    pub source: PathBuf,
}

/// A module or command that was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub source: PathBuf,
    pub message: String,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to load {}: {}", self.source.display(), self.message)
    }
}

/// Everything one discovery pass produced
#[derive(Debug, Default)]
pub struct LoadReport {
    pub commands: Vec<LoadedCommand>,
    pub warnings: Vec<LoadWarning>,
}

/// Finds the current project and loads its commands
pub struct ProjectCommandLoader {
    start: PathBuf,
    context: OnceCell<Option<Rc<ProjectContext>>>,
}

impl ProjectCommandLoader {
    /// Loader that searches upward from `start`
    pub fn new(start: impl Into<PathBuf>) -> Self {
        Self {
            start: start.into(),
            context: OnceCell::new(),
        }
    }

    pub fn start(&self) -> &Path {
        &self.start
    }

    /// The project context, discovered once per loader
    pub fn discover(&self) -> Option<&Rc<ProjectContext>> {
        self.context
            .get_or_init(|| {
                let context = ProjectContext::discover(&self.start);
                match &context {
                    Some(ctx) => {
                        tracing::debug!(root = %ctx.project_root().display(), "found project")
                    }
                    None => tracing::debug!(start = %self.start.display(), "no project found"),
                }
                context.map(Rc::new)
            })
            .as_ref()
    }

    /// Loads every module of the discovered project
    ///
    /// A failing module only produces a warning. When two modules claim the
    /// same command name, the first one (in file name order) keeps it.
    pub fn load_commands(&self) -> LoadReport {
        let mut report = LoadReport::default();
        let Some(context) = self.discover() else {
            return report;
        };

        let mut claimed: HashMap<String, PathBuf> = HashMap::new();

        for (path, kind) in scan_directory(&context.commands_dir()) {
            let built = match kind {
                ModuleKind::Declarative => module::load_module(&path, context),
                ModuleKind::Executable => load_executable(&path, context),
            };

            let built = match built {
                Ok(built) => built,
                Err(e) => {
                    tracing::debug!(module = %path.display(), error = %e, "skipping module");
                    report.warnings.push(LoadWarning {
                        source: path,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            for BuiltCommand { node, aliases } in built {
                if let Some(first) = claimed.get(node.name()) {
                    report.warnings.push(LoadWarning {
                        source: path.clone(),
                        message: format!(
                            "command '{}' is already defined by {}",
                            node.name(),
                            first.display()
                        ),
                    });
                    continue;
                }

                claimed.insert(node.name().to_string(), path.clone());
                report.commands.push(LoadedCommand {
                    node,
                    aliases,
                    source: path.clone(),
                });
            }
        }

        report
    }
}

/// Lists loadable files in sorted order
pub fn scan_directory(dir: &Path) -> Vec<(PathBuf, ModuleKind)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(), // Missing or unreadable directory
    };

    let mut modules: Vec<(PathBuf, ModuleKind)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|name| !name.starts_with(RESERVED_PREFIX) && !name.starts_with('.'))
                .unwrap_or(false)
        })
        .filter_map(|path| classify(&path).map(|kind| (path, kind)))
        .collect();

    modules.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    modules
}

/// Decides how (and whether) a file is loaded
pub fn classify(path: &Path) -> Option<ModuleKind> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => Some(ModuleKind::Declarative),
        _ if is_executable(path) => Some(ModuleKind::Executable),
        _ => None,
    }
}

/// Checks if a file is executable
fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = path.metadata() {
            return meta.permissions().mode() & 0o111 != 0;
        }
    }

    #[cfg(windows)]
    {
        if let Some(ext) = path.extension() {
            return ext == "exe" || ext == "bat" || ext == "cmd";
        }
    }

    false
}

/// Asks an executable for its manifest, passing the context on stdin
pub fn fetch_manifest(path: &Path, context: &ProjectContext) -> Result<PluginManifest, ModuleError> {
    let mut child = Command::new(path)
        .arg("--manifest")
        .current_dir(context.project_root())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ModuleError::Manifest(format!("failed to spawn: {}", e)))?;

    let request = PluginRequest::new(
        "manifest",
        serde_json::to_value(context.payload())
            .map_err(|e| ModuleError::Manifest(format!("failed to serialize context: {}", e)))?,
    );

    if let Some(mut stdin) = child.stdin.take() {
        let request_json = serde_json::to_string(&request)
            .map_err(|e| ModuleError::Manifest(format!("failed to serialize request: {}", e)))?;
        // A plugin that ignores stdin may already have exited
        if let Err(e) = writeln!(stdin, "{}", request_json) {
            tracing::debug!(plugin = %path.display(), error = %e, "plugin did not read the request");
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| ModuleError::Manifest(format!("failed to read output: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ModuleError::Manifest(format!(
            "exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| ModuleError::Manifest(format!("invalid manifest: {}", e)))
}

fn load_executable(path: &Path, context: &Rc<ProjectContext>) -> Result<Vec<BuiltCommand>, ModuleError> {
    let manifest = fetch_manifest(path, context)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    manifest
        .commands
        .iter()
        .map(|descriptor| {
            let name = descriptor.name.clone().unwrap_or_else(|| stem.clone());
            let node = plugin_node(path, &name, descriptor, &[], context)?;
            Ok(BuiltCommand {
                node,
                aliases: descriptor.aliases.clone(),
            })
        })
        .collect()
}

/// Builds the node for a manifest entry; `parents` is the path above it
fn plugin_node(
    plugin: &Path,
    name: &str,
    descriptor: &CommandDescriptor,
    parents: &[String],
    context: &Rc<ProjectContext>,
) -> Result<CommandNode, ModuleError> {
    if name.is_empty() || name.starts_with('-') || name.chars().any(char::is_whitespace) {
        return Err(ModuleError::InvalidCommand {
            name: name.to_string(),
            reason: "needs a name without whitespace".to_string(),
        });
    }

    let mut path = parents.to_vec();
    path.push(name.to_string());

    let node = if descriptor.commands.is_empty() {
        let plugin = plugin.to_path_buf();
        let context = Rc::clone(context);
        let segments = path;

        let leaf = LeafCommand::passthrough(move |invocation, args| {
            let command_line = std::iter::once(plugin.display().to_string())
                .chain(segments.iter().cloned())
                .chain(args.iter().cloned())
                .map(|part| quote(&part).into_owned())
                .collect::<Vec<_>>()
                .join(" ");

            let payload = serde_json::to_string(&context.payload())?;
            let options = context_env(&context).env("SAMOSA_CONTEXT", payload);

            invocation
                .output
                .verbose_ctx("local", &format!("Running: {}", command_line));
            context.run(&command_line, &options)?;
            Ok(())
        });
        CommandNode::leaf(name, descriptor.about.clone(), leaf)
    } else {
        let mut registry = CommandRegistry::new(name, descriptor.about.clone());
        for child in &descriptor.commands {
            let child_name = child.name.clone().ok_or_else(|| ModuleError::InvalidCommand {
                name: name.to_string(),
                reason: "has a subcommand without a name".to_string(),
            })?;
            let node = plugin_node(plugin, &child_name, child, &path, context)?;
            let aliases: Vec<&str> = child.aliases.iter().map(String::as_str).collect();
            registry
                .register(node, &aliases)
                .map_err(|e| ModuleError::InvalidCommand {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
        }
        CommandNode::group(registry)
    };

    Ok(if descriptor.hidden { node.hidden() } else { node })
}
