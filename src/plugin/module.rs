//! Declarative command modules
//!
//! A `*.yaml` file in `.samosa/commands/` declares commands that run shell
//! lines in the project root:
//!
//! ```yaml
//! commands:
//!   - name: deploy
//!     about: Deployment commands.
//!     aliases: [dp]
//!     commands:
//!       - name: app
//!         args:
//!           - name: environment
//!             choices: [dev, staging, prod]
//!         run: ./deploy.sh {environment} {config.project.name}
//! ```
//!
//! Placeholders are `{project_root}`, `{marker_dir}`, `{<arg name>}` and
//! `{config.<dotted path>}`. They are substituted verbatim, without quoting.

use std::path::Path;
use std::rc::Rc;
use std::sync::OnceLock;

use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, ArgMatches};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{CommandNode, CommandRegistry, LeafCommand};
use crate::process::RunOptions;
use crate::storage::{scalar_to_string, ProjectContext};

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Failed to read module: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid module: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Command '{name}' {reason}")]
    InvalidCommand { name: String, reason: String },

    #[error("Unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("Config value '{0}' is missing or not a scalar")]
    MissingConfig(String),

    #[error("Plugin manifest failed: {0}")]
    Manifest(String),
}

/// Top-level document of a declarative module
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleFile {
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

/// One declared command: a leaf (`run`) or a group (`commands`)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSpec {
    /// Defaults to the module's file stem for top-level commands
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub about: String,

    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub hidden: bool,

    #[serde(default)]
    pub args: Vec<ArgSpec>,

    #[serde(default)]
    pub run: Option<RunSpec>,

    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

/// Shell lines to execute, in order
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RunSpec {
    Line(String),
    Lines(Vec<String>),
}

impl RunSpec {
    pub fn lines(&self) -> Vec<String> {
        match self {
            RunSpec::Line(line) => vec![line.clone()],
            RunSpec::Lines(lines) => lines.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    /// `samosa local deploy prod`
    #[default]
    Positional,

    /// `--name value`
    Option,

    /// `--name`; renders as `--name` when set and as nothing otherwise
    Flag,
}

/// A declared argument
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgSpec {
    pub name: String,

    #[serde(default)]
    pub help: Option<String>,

    #[serde(default)]
    pub kind: ArgKind,

    #[serde(default)]
    pub short: Option<char>,

    #[serde(default)]
    pub choices: Vec<String>,

    #[serde(default)]
    pub default: Option<String>,

    /// Positionals are required unless they have a default
    #[serde(default)]
    pub required: Option<bool>,
}

impl ArgSpec {
    fn to_arg(&self, command: &str) -> Result<Arg, ModuleError> {
        if !valid_name(&self.name) {
            return Err(ModuleError::InvalidCommand {
                name: command.to_string(),
                reason: format!("has an invalid argument name '{}'", self.name),
            });
        }

        let mut arg = Arg::new(self.name.clone());

        match self.kind {
            ArgKind::Positional => {
                arg = arg.required(self.required.unwrap_or(self.default.is_none()));
            }
            ArgKind::Option => {
                arg = arg
                    .long(self.name.clone())
                    .required(self.required.unwrap_or(false));
            }
            ArgKind::Flag => {
                if !self.choices.is_empty() || self.default.is_some() {
                    return Err(ModuleError::InvalidCommand {
                        name: command.to_string(),
                        reason: format!("flag '{}' cannot take choices or a default", self.name),
                    });
                }
                arg = arg.long(self.name.clone()).action(ArgAction::SetTrue);
            }
        }

        if let Some(short) = self.short {
            if self.kind == ArgKind::Positional {
                return Err(ModuleError::InvalidCommand {
                    name: command.to_string(),
                    reason: format!("positional '{}' cannot have a short flag", self.name),
                });
            }
            arg = arg.short(short);
        }
        if let Some(help) = &self.help {
            arg = arg.help(help.clone());
        }
        if !self.choices.is_empty() {
            arg = arg.value_parser(PossibleValuesParser::new(self.choices.clone()));
        }
        if let Some(default) = &self.default {
            arg = arg.default_value(default.clone());
        }

        Ok(arg)
    }
}

/// Command and argument names: non-empty, no whitespace, no leading dash
fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('-') && !name.chars().any(char::is_whitespace)
}

/// A top-level command built from a module, with its aliases
#[derive(Debug)]
pub struct BuiltCommand {
    pub node: CommandNode,
    pub aliases: Vec<String>,
}

/// Parses a module document
pub fn parse_module(content: &str) -> Result<ModuleFile, ModuleError> {
    let value: serde_yaml::Value = serde_yaml::from_str(content)?;

    // An empty (or comment-only) file is a module without commands
    if value.is_null() {
        return Ok(ModuleFile { commands: Vec::new() });
    }
    Ok(serde_yaml::from_value(value)?)
}

/// Loads a module file and builds its top-level commands
pub fn load_module(path: &Path, context: &Rc<ProjectContext>) -> Result<Vec<BuiltCommand>, ModuleError> {
    let content = std::fs::read_to_string(path)?;
    let module = parse_module(&content)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    module
        .commands
        .iter()
        .map(|spec| {
            let node = build_node(spec, Some(&stem), context)?;
            Ok(BuiltCommand {
                node,
                aliases: spec.aliases.clone(),
            })
        })
        .collect()
}

/// Builds a node from a spec; `default_name` applies only at the top level
pub fn build_node(
    spec: &CommandSpec,
    default_name: Option<&str>,
    context: &Rc<ProjectContext>,
) -> Result<CommandNode, ModuleError> {
    let name = spec
        .name
        .as_deref()
        .or(default_name)
        .unwrap_or_default()
        .to_string();

    if !valid_name(&name) {
        return Err(ModuleError::InvalidCommand {
            name,
            reason: "needs a name without whitespace".to_string(),
        });
    }

    let node = match (&spec.run, spec.commands.is_empty()) {
        (Some(_), false) => {
            return Err(ModuleError::InvalidCommand {
                name,
                reason: "cannot have both 'run' and 'commands'".to_string(),
            })
        }
        (None, true) => {
            return Err(ModuleError::InvalidCommand {
                name,
                reason: "needs either 'run' or 'commands'".to_string(),
            })
        }
        (Some(run), true) => {
            let leaf = build_leaf(&name, &spec.args, run.lines(), context)?;
            CommandNode::leaf(name, spec.about.clone(), leaf)
        }
        (None, false) => {
            if !spec.args.is_empty() {
                return Err(ModuleError::InvalidCommand {
                    name,
                    reason: "is a group and cannot declare 'args'".to_string(),
                });
            }

            let mut registry = CommandRegistry::new(name.clone(), spec.about.clone());
            for child in &spec.commands {
                let node = build_node(child, None, context)?;
                let aliases: Vec<&str> = child.aliases.iter().map(String::as_str).collect();
                registry
                    .register(node, &aliases)
                    .map_err(|e| ModuleError::InvalidCommand {
                        name: name.clone(),
                        reason: e.to_string(),
                    })?;
            }
            CommandNode::group(registry)
        }
    };

    Ok(if spec.hidden { node.hidden() } else { node })
}

fn build_leaf(
    name: &str,
    args: &[ArgSpec],
    lines: Vec<String>,
    context: &Rc<ProjectContext>,
) -> Result<LeafCommand, ModuleError> {
    let mut command = clap::Command::new("command");
    for spec in args {
        command = command.arg(spec.to_arg(name)?);
    }

    // Catch typos at load time rather than when the command runs
    let kinds: Vec<(String, ArgKind)> = args.iter().map(|a| (a.name.clone(), a.kind)).collect();
    for line in &lines {
        for key in placeholders(line) {
            let known = matches!(key, "project_root" | "marker_dir")
                || key.starts_with("config.")
                || kinds.iter().any(|(n, _)| n == key);
            if !known {
                return Err(ModuleError::UnknownPlaceholder(key.to_string()));
            }
        }
    }

    let context = Rc::clone(context);
    Ok(LeafCommand::new(command, move |invocation, matches| {
        let options = context_env(&context);
        for line in &lines {
            let rendered = render(line, &context, |key| arg_value(matches, &kinds, key))?;
            invocation
                .output
                .verbose_ctx("local", &format!("Running: {}", rendered));
            context.run(&rendered, &options)?;
        }
        Ok(())
    }))
}

/// Environment exported to every project command
pub fn context_env(context: &ProjectContext) -> RunOptions {
    RunOptions::new()
        .env(
            "SAMOSA_PROJECT_ROOT",
            context.project_root().display().to_string(),
        )
        .env("SAMOSA_MARKER_DIR", context.marker_dir().display().to_string())
}

fn arg_value(matches: &ArgMatches, kinds: &[(String, ArgKind)], key: &str) -> Option<String> {
    let (name, kind) = kinds.iter().find(|(n, _)| n == key)?;

    Some(match kind {
        ArgKind::Flag => {
            if matches.get_flag(name) {
                format!("--{}", name)
            } else {
                String::new()
            }
        }
        ArgKind::Positional | ArgKind::Option => {
            matches.get_one::<String>(name).cloned().unwrap_or_default()
        }
    })
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // `${VAR}` is shell syntax and matched only so it can be skipped
        Regex::new(r"\$?\{([A-Za-z_][A-Za-z0-9_.\-]*)\}").expect("placeholder pattern is valid")
    })
}

fn placeholders(template: &str) -> impl Iterator<Item = &str> {
    placeholder_pattern()
        .captures_iter(template)
        .filter(|c| !c[0].starts_with('$'))
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
}

/// Substitutes placeholders in a run line
///
/// `args` resolves argument names; context keys take precedence.
pub fn render<F>(template: &str, context: &ProjectContext, args: F) -> Result<String, ModuleError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for captures in placeholder_pattern().captures_iter(template) {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.as_str().starts_with('$') {
            continue;
        }
        let key = key.as_str();

        let value = match key {
            "project_root" => context.project_root().display().to_string(),
            "marker_dir" => context.marker_dir().display().to_string(),
            _ => {
                if let Some(path) = key.strip_prefix("config.") {
                    context
                        .config_value(path)
                        .and_then(scalar_to_string)
                        .ok_or_else(|| ModuleError::MissingConfig(path.to_string()))?
                } else {
                    args(key).ok_or_else(|| ModuleError::UnknownPlaceholder(key.to_string()))?
                }
            }
        };

        out.push_str(&template[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::storage::EXAMPLE_MODULE;
    use tempfile::TempDir;

    fn context(dir: &Path) -> Rc<ProjectContext> {
        fs::create_dir_all(dir.join(".samosa/commands")).unwrap();
        fs::write(
            dir.join(".samosa/config.yaml"),
            "project:\n  name: demo\nreplicas: 3\n",
        )
        .unwrap();
        Rc::new(ProjectContext::for_root(dir))
    }

    fn spec(yaml: &str) -> CommandSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn example_module_builds() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let path = dir.path().join(".samosa/commands/example.yaml");
        fs::write(&path, EXAMPLE_MODULE).unwrap();

        let built = load_module(&path, &ctx).unwrap();
        let names: Vec<_> = built.iter().map(|b| b.node.name().to_string()).collect();
        assert_eq!(names, vec!["deploy", "test", "setup"]);

        let deploy = built[0].node.subcommands().unwrap();
        assert_eq!(deploy.list_canonical_names(), vec!["app"]);
    }

    #[test]
    fn unnamed_command_takes_file_stem() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let path = dir.path().join(".samosa/commands/lint.yaml");
        fs::write(&path, "commands:\n  - about: Lint it\n    run: echo lint\n").unwrap();

        let built = load_module(&path, &ctx).unwrap();
        assert_eq!(built[0].node.name(), "lint");
    }

    #[test]
    fn empty_module_has_no_commands() {
        assert!(parse_module("").unwrap().commands.is_empty());
        assert!(parse_module("# nothing yet\n").unwrap().commands.is_empty());
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let err = parse_module("commands: [unclosed").unwrap_err();
        assert!(matches!(err, ModuleError::Parse(_)));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_module("commands:\n  - name: x\n    runn: echo\n").unwrap_err();
        assert!(matches!(err, ModuleError::Parse(_)));
    }

    #[test]
    fn leaf_and_group_are_exclusive() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let both = spec("name: x\nrun: echo\ncommands:\n  - name: y\n    run: echo\n");
        assert!(matches!(
            build_node(&both, None, &ctx),
            Err(ModuleError::InvalidCommand { .. })
        ));

        let neither = spec("name: x\n");
        assert!(matches!(
            build_node(&neither, None, &ctx),
            Err(ModuleError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn nested_command_needs_a_name() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let group = spec("name: x\ncommands:\n  - run: echo\n");
        assert!(matches!(
            build_node(&group, None, &ctx),
            Err(ModuleError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn nested_aliases_are_registered() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let group = spec(
            "name: db\ncommands:\n  - name: migrate\n    aliases: [m]\n    run: echo migrate\n",
        );
        let node = build_node(&group, None, &ctx).unwrap();
        let registry = node.subcommands().unwrap();
        assert_eq!(registry.resolve("m").unwrap().name(), "migrate");
        assert_eq!(registry.render_help()[0].display_name, "migrate (m)");
    }

    #[test]
    fn typo_in_placeholder_fails_at_load() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let leaf = spec("name: x\nargs:\n  - name: env\nrun: echo {evn}\n");
        let err = build_node(&leaf, None, &ctx).unwrap_err();
        assert!(matches!(err, ModuleError::UnknownPlaceholder(ref key) if key == "evn"));
    }

    #[test]
    fn flags_reject_choices() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let leaf = spec("name: x\nargs:\n  - name: force\n    kind: flag\n    default: 'yes'\nrun: echo\n");
        assert!(build_node(&leaf, None, &ctx).is_err());
    }

    #[test]
    fn render_substitutes_everything() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let rendered = render(
            "deploy {project} x{replicas} to {env} in {project_root}",
            &ctx,
            |key| (key == "env").then(|| "prod".to_string()),
        );
        // `{project}` is neither an arg nor a context key
        assert!(matches!(rendered, Err(ModuleError::UnknownPlaceholder(_))));

        let rendered = render(
            "deploy {config.project.name} x{config.replicas} to {env} in {project_root}",
            &ctx,
            |key| (key == "env").then(|| "prod".to_string()),
        )
        .unwrap();
        assert_eq!(
            rendered,
            format!("deploy demo x3 to prod in {}", dir.path().display())
        );
    }

    #[test]
    fn render_reports_missing_config() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let err = render("{config.nope}", &ctx, |_| None).unwrap_err();
        assert!(matches!(err, ModuleError::MissingConfig(ref p) if p == "nope"));

        let err = render("{config.project}", &ctx, |_| None).unwrap_err();
        assert!(matches!(err, ModuleError::MissingConfig(_)));
    }

    #[test]
    fn render_leaves_shell_braces_alone() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let rendered = render("echo ${HOME} { not } {}", &ctx, |_| None).unwrap();
        assert_eq!(rendered, "echo ${HOME} { not } {}");
    }

    #[test]
    fn arg_values_by_kind() {
        let kinds = vec![
            ("env".to_string(), ArgKind::Positional),
            ("check".to_string(), ArgKind::Flag),
            ("tag".to_string(), ArgKind::Option),
        ];
        let command = clap::Command::new("x")
            .arg(Arg::new("env").required(true))
            .arg(Arg::new("check").long("check").action(ArgAction::SetTrue))
            .arg(Arg::new("tag").long("tag"));
        let matches = command.try_get_matches_from(["x", "prod", "--check"]).unwrap();

        assert_eq!(arg_value(&matches, &kinds, "env").unwrap(), "prod");
        assert_eq!(arg_value(&matches, &kinds, "check").unwrap(), "--check");
        assert_eq!(arg_value(&matches, &kinds, "tag").unwrap(), "");
        assert!(arg_value(&matches, &kinds, "other").is_none());
    }
}
