//! # Project Storage
//!
//! Discovery of the project marker directory and the per-invocation
//! [`ProjectContext`] handed to project commands.
//!
//! ## Project Structure
//!
//! ```text
//! <project root>/
//! └── .samosa/
//!     ├── commands/          # Command modules (*.yaml or executables)
//!     │   └── example.yaml
//!     └── config.yaml        # Free-form project configuration
//! ```
//!
//! ## Key Types
//!
//! - [`ProjectContext`] - Project root, lazy configuration, lazy process runner
//! - [`find_project_root`] - Upward search for `.samosa/commands/`
//! - [`init_project`] - Bootstraps the marker directory

mod config;
mod project;

pub use config::{
    load_config, lookup, scalar_to_string, try_load_config, ConfigError, CONFIG_FILE,
    DEFAULT_CONFIG,
};
pub use project::{
    find_project_root, init_project, ContextPayload, InitOutcome, ProjectContext, COMMANDS_DIR,
    EXAMPLE_MODULE, MARKER_DIR,
};
