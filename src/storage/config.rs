//! Project configuration
//!
//! Configuration lives in `.samosa/config.yaml`. It is a free-form nested
//! mapping with no schema: commands read whatever keys they need through
//! dotted paths such as `environments.prod.url`.
//!
//! A missing or broken file is never an error. It degrades to an empty mapping.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// File name of the project configuration inside the marker directory
pub const CONFIG_FILE: &str = "config.yaml";

/// Configuration written by `samosa local init`
pub const DEFAULT_CONFIG: &str = r#"# Project-specific configuration
# Values are available to command modules as {config.<path>}
project:
  name: "My Project"
  version: "1.0.0"

environments:
  dev:
    url: "http://localhost:3000"
  staging:
    url: "https://staging.myproject.com"
  prod:
    url: "https://myproject.com"
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Reads and parses a configuration file
///
/// A missing file and an empty or non-mapping document yield an empty mapping.
pub fn try_load_config(path: &Path) -> Result<Mapping, ConfigError> {
    if !path.exists() {
        return Ok(Mapping::new());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let value: Value = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Mapping(mapping) => Ok(mapping),
        _ => Ok(Mapping::new()),
    }
}

/// Like [`try_load_config`], but any failure becomes an empty mapping
pub fn load_config(path: &Path) -> Mapping {
    try_load_config(path).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "ignoring unusable configuration");
        Mapping::new()
    })
}

/// Looks up a dotted path (`a.b.c`) in a mapping
pub fn lookup<'a>(config: &'a Mapping, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = config.get(first)?;

    for segment in segments {
        current = current.as_mapping()?.get(segment)?;
    }

    Some(current)
}

/// Renders a scalar config value as text; mappings and sequences give `None`
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
