//! Main CLI application structure

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::dispatch::{dispatch, DispatchEnv, DispatchError};
use super::output::Output;
use super::{dev, git, local, utils};
use crate::domain::{CommandNode, CommandRegistry, LeafCommand, RegistryError, UsageError};
use crate::process::{ProcessError, ShellRunner};

const ABOUT: &str = "Samosa - a CLI tool for task automation and project management.";

/// Root options shown in `samosa --help`
const ROOT_OPTIONS: &[(&str, &str)] = &[
    ("-v, --verbose", "Enable verbose output for debugging."),
    ("-V, --version", "Show the version and exit."),
    ("-h, --help", "Show this message and exit."),
];

#[derive(Parser)]
#[command(name = "samosa")]
#[command(version, about = ABOUT)]
#[command(disable_help_flag = true)]
pub struct Cli {
    /// Enable verbose output for debugging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Show help
    #[arg(long, short = 'h')]
    pub help: bool,

    #[command(subcommand)]
    pub command: Option<CommandPath>,
}

/// Everything after the root options, resolved by the dispatcher
#[derive(Subcommand)]
pub enum CommandPath {
    #[command(external_subcommand)]
    Run(Vec<String>),
}

#[derive(Debug, Args)]
struct HelloArgs {
    /// Name to greet
    #[arg(long, default_value = "World")]
    name: String,
}

/// Builds the root command tree
///
/// `local` is registered lazily: nothing under `start` is read until it is
/// resolved.
pub fn build_root_dispatcher(start: &Path) -> Result<CommandRegistry, RegistryError> {
    let mut root = CommandRegistry::new("samosa", ABOUT);

    root.register(git::command()?, &["g"])?;
    root.register(utils::command()?, &["u"])?;
    root.register(dev::command()?, &["d", "development"])?;
    root.register(local::command(start), &["l"])?;
    root.register(
        CommandNode::leaf(
            "hello",
            "Say hello to someone.",
            LeafCommand::typed(|invocation, args: HelloArgs| {
                invocation.output.success(&format!("Hello, {}!", args.name));
                Ok(())
            }),
        ),
        &[],
    )?;

    Ok(root)
}

/// The full tree as a clap command, for completion scripts
pub fn completion_command(start: &Path) -> Result<clap::Command> {
    let root = build_root_dispatcher(start)?;

    Ok(root
        .to_clap()
        .bin_name("samosa")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Enable verbose output for debugging"),
        ))
}

/// Installs the stderr log subscriber
///
/// `RUST_LOG` wins; otherwise warnings only, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "samosa=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = Output::new(cli.verbose);

    output.verbose("Samosa starting");

    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let root = build_root_dispatcher(&cwd)?;

    let argv = match cli.command {
        Some(CommandPath::Run(argv)) => argv,
        None => Vec::new(),
    };

    if cli.help || argv.is_empty() {
        print!("{}", root.format_help("samosa", ROOT_OPTIONS));
        return Ok(ExitCode::SUCCESS);
    }

    let runner = ShellRunner::new();
    let env = DispatchEnv {
        cwd: &cwd,
        output: &output,
        runner: &runner,
    };
    dispatch(&root, &argv, &env)?;

    output.verbose("Command completed successfully");
    Ok(ExitCode::SUCCESS)
}

/// Prints an error and picks the process exit code
pub fn report(error: &anyhow::Error) -> ExitCode {
    if let Some(e) = error.downcast_ref::<DispatchError>() {
        eprintln!("Error: {}", e);
        eprintln!("Try '{} --help' for help.", e.path());
    } else if let Some(UsageError(e)) = error.downcast_ref::<UsageError>() {
        if let Err(print_error) = e.print() {
            eprintln!("Error: {}", print_error);
        }
    } else {
        eprintln!("Error: {:#}", error);
    }

    ExitCode::from(exit_status(error))
}

/// Exit status for an error
///
/// Unknown commands and usage errors give 2, a failed child process gives
/// its own code, anything else 1.
pub fn exit_status(error: &anyhow::Error) -> u8 {
    if error.downcast_ref::<DispatchError>().is_some() {
        return 2;
    }
    if let Some(UsageError(e)) = error.downcast_ref::<UsageError>() {
        return u8::try_from(e.exit_code()).unwrap_or(2);
    }

    let process_code = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ProcessError>())
        .and_then(ProcessError::exit_code);
    match process_code.and_then(|code| u8::try_from(code).ok()) {
        Some(code) if code != 0 => code,
        _ => 1,
    }
}
