//! # Project Commands
//!
//! Loading of project-local commands from `.samosa/commands/`.
//!
//! ## Module Kinds
//!
//! | Kind | File | Registration |
//! |------|------|--------------|
//! | Declarative | `*.yaml`, `*.yml` | `commands:` list parsed with serde |
//! | Executable | any executable file | `<file> --manifest`, JSON over stdin/stdout |
//!
//! Files starting with `__` or `.` are never loaded.
//!
//! ## Failure Handling
//!
//! A module that fails to load is skipped and reported as a [`LoadWarning`].
//! Discovery continues with the next file. When two modules declare the same
//! command, the file that sorts first keeps it.
//!
//! ## Key Types
//!
//! - [`ProjectCommandLoader`] - Finds the project and loads its modules
//! - [`LoadReport`] - Commands and warnings from one pass
//! - [`PluginManifest`] - What an executable plugin declares

mod loader;
mod module;
mod protocol;

pub use loader::{
    classify, fetch_manifest, scan_directory, LoadReport, LoadWarning, LoadedCommand,
    ModuleKind, ProjectCommandLoader, RESERVED_PREFIX,
};
pub use module::{
    build_node, context_env, load_module, parse_module, render, ArgKind, ArgSpec, BuiltCommand,
    CommandSpec, ModuleError, ModuleFile, RunSpec,
};
pub use protocol::{CommandDescriptor, PluginManifest, PluginRequest};
