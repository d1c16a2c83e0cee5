//! Project-specific commands
//!
//! `samosa local` is built the first time it is resolved. Inside a project
//! it holds the commands from `.samosa/commands/`; elsewhere it only offers
//! `init`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::Output;
use crate::domain::{CommandNode, CommandRegistry, Invocation, LazyGroup, LeafCommand};
use crate::plugin::{LoadReport, ProjectCommandLoader};
use crate::storage::{init_project, InitOutcome, COMMANDS_DIR, MARKER_DIR};

const ABOUT: &str = "Project-specific commands.";

/// The lazy `local` group for a start directory
pub fn command(start: &Path) -> CommandNode {
    let start = start.to_path_buf();
    CommandNode::lazy(
        "local",
        ABOUT,
        LazyGroup::new(move || build_group(&start)),
    )
}

/// Discovers the project above `start` and builds its command group
pub fn build_group(start: &Path) -> CommandRegistry {
    let loader = ProjectCommandLoader::new(start);

    if loader.discover().is_none() {
        tracing::debug!(start = %start.display(), "no project, offering init");
        return init_group();
    }

    let report = loader.load_commands();
    report_warnings(&report);
    registry_from(report)
}

fn registry_from(report: LoadReport) -> CommandRegistry {
    let mut local = CommandRegistry::new("local", ABOUT);

    for loaded in report.commands {
        let aliases: Vec<&str> = loaded.aliases.iter().map(String::as_str).collect();
        let name = loaded.node.name().to_string();

        match local.register(loaded.node, &aliases) {
            Ok(()) => {}
            // Name clashes are filtered by the loader; alias clashes end up here
            Err(e) => Output::default().warn(&format!(
                "Failed to load {}: {} ('{}' skipped)",
                loaded.source.display(),
                e,
                name
            )),
        }
    }

    if local.is_empty() {
        let info = CommandNode::leaf(
            "info",
            "Show information about local commands.",
            LeafCommand::simple(info),
        );
        if let Err(e) = local.register(info, &[]) {
            tracing::warn!(error = %e, "could not register local info");
        }
    }

    local
}

fn report_warnings(report: &LoadReport) {
    let output = Output::default();
    for warning in &report.warnings {
        output.warn(&warning.to_string());
    }
}

fn init_group() -> CommandRegistry {
    let mut local = CommandRegistry::new(
        "local",
        "Project-specific commands.\n\nNo .samosa/commands directory found. Run 'samosa local init' to create one.",
    );

    let init = CommandNode::leaf(
        "init",
        "Initialize a .samosa/commands directory for local commands.",
        LeafCommand::simple(init),
    );
    if let Err(e) = local.register(init, &[]) {
        tracing::warn!(error = %e, "could not register local init");
    }

    local
}

fn init(invocation: &Invocation<'_>) -> Result<()> {
    let output = invocation.output;

    match init_project(invocation.cwd)? {
        InitOutcome::AlreadyExists(marker_dir) => {
            output.info(&format!("{} already exists", marker_dir.display()));
        }
        InitOutcome::Created {
            commands_dir,
            example_module,
            config_file,
            ..
        } => {
            output.success(&format!("Created {}", commands_dir.display()));
            output.success(&format!("Created example module: {}", example_module.display()));
            output.success(&format!("Created config: {}", config_file.display()));
            output.blank();
            output.info("Try: samosa local --help");
        }
    }
    Ok(())
}

fn info(invocation: &Invocation<'_>) -> Result<()> {
    let output = invocation.output;
    let commands_dir: PathBuf = ProjectCommandLoader::new(invocation.cwd)
        .discover()
        .map(|ctx| ctx.commands_dir())
        .unwrap_or_else(|| invocation.cwd.join(MARKER_DIR).join(COMMANDS_DIR));

    output.info(&format!("Local commands directory: {}", commands_dir.display()));
    output.info("No commands are defined yet.");
    output.info("Add a *.yaml module or an executable plugin to that directory.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::domain::NodeKind;
    use tempfile::TempDir;

    #[test]
    fn outside_a_project_only_init_is_offered() {
        let dir = TempDir::new().unwrap();
        let group = build_group(dir.path());

        assert_eq!(group.list_canonical_names(), vec!["init"]);
        assert!(group.about().contains("samosa local init"));
    }

    #[test]
    fn empty_project_offers_info() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".samosa/commands")).unwrap();

        let group = build_group(dir.path());
        assert_eq!(group.list_canonical_names(), vec!["info"]);
    }

    #[test]
    fn project_commands_and_aliases_are_registered() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".samosa/commands")).unwrap();
        fs::write(
            dir.path().join(".samosa/commands/build.yaml"),
            "commands:\n  - about: Build it\n    aliases: [b]\n    run: echo build\n",
        )
        .unwrap();

        let group = build_group(dir.path());
        assert_eq!(group.list_canonical_names(), vec!["build"]);
        assert_eq!(group.resolve("b").unwrap().name(), "build");
        assert_eq!(group.render_help()[0].display_name, "build (b)");
    }

    #[test]
    fn alias_clash_between_modules_skips_the_later_command() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".samosa/commands")).unwrap();
        fs::write(
            dir.path().join(".samosa/commands/a.yaml"),
            "commands:\n  - name: build\n    aliases: [x]\n    run: echo a\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(".samosa/commands/b.yaml"),
            "commands:\n  - name: deploy\n    aliases: [x]\n    run: echo b\n",
        )
        .unwrap();

        let group = build_group(dir.path());
        assert_eq!(group.list_canonical_names(), vec!["build"]);
        assert_eq!(group.resolve("x").unwrap().name(), "build");
    }

    #[test]
    fn group_is_lazy() {
        let dir = TempDir::new().unwrap();
        let node = command(dir.path());

        let NodeKind::Lazy(group) = node.kind() else {
            panic!("local should be lazy");
        };
        assert!(!group.is_loaded());
        node.subcommands();
        assert!(group.is_loaded());
    }
}
