//! Executable plugin protocol
//!
//! An executable in `.samosa/commands/` registers its commands when called
//! with `--manifest`. It reads a [`PluginRequest`] carrying the project
//! context from stdin and prints a [`PluginManifest`] to stdout.
//!
//! ```text
//! samosa                         .samosa/commands/db
//!  │                               │
//!  ├── Spawn: db --manifest        │
//!  ├── Stdin: {"operation": "manifest", "params": {"project_root": ...}}
//!  └── Stdout: {"commands": [{"name": "db", "commands": [{"name": "migrate"}]}]}
//! ```
//!
//! Running `samosa local db migrate --step 2` then spawns
//! `db db migrate --step 2` in the project root.

use serde::{Deserialize, Serialize};

/// Commands declared by an executable plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Plugin version (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Top-level commands the plugin provides
    #[serde(default)]
    pub commands: Vec<CommandDescriptor>,
}

/// One command in a plugin manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Command name; top-level commands default to the plugin file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Description shown in help
    #[serde(default)]
    pub about: String,

    /// Alternate names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    /// Keep out of help listings
    #[serde(default)]
    pub hidden: bool,

    /// Subcommands; a descriptor with subcommands is a group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandDescriptor>,
}

/// A message sent to a plugin on stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    /// The operation to perform
    pub operation: String,

    /// Operation-specific parameters
    pub params: serde_json::Value,
}

impl PluginRequest {
    pub fn new(operation: impl Into<String>, params: impl Into<serde_json::Value>) -> Self {
        Self {
            operation: operation.into(),
            params: params.into(),
        }
    }
}
