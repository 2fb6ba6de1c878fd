//! # Configuration
//!
//! Settings come from three layers, later ones winning:
//! 1. an optional TOML file (`--config`, or `kgorm.toml` in the working directory)
//! 2. environment variables:
//!    - `KG_HOST`: kg-core host name or API URL
//!    - `KG_AUTH_TOKEN`: bearer token
//!    - `KG_SCOPE`: default read scope (`released`, `in progress`, `any`)
//!    - `KG_TIMEOUT_SECS`: HTTP timeout
//! 3. command-line flags (applied by the CLI)
//!
//! ```toml
//! host = "core.kg.ebrains.eu"
//! scope = "in progress"
//! timeout_secs = 60
//! schema_files = ["schemas/extra.json"]
//! ```

use crate::error::OrmError;
use kgorm_core::primitives::DEFAULT_PAGE_SIZE;
use kgorm_core::{SchemaRegistry, Scope, openminds};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "core.kg.ebrains.eu";
pub const DEFAULT_CONFIG_FILE: &str = "kgorm.toml";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KgConfig {
    pub host: String,
    pub token: Option<String>,
    pub scope: Scope,
    pub timeout_secs: u64,
    pub page_size: usize,
    /// JSON files with additional schemas, merged into the built-in registry.
    pub schema_files: Vec<PathBuf>,
}

impl Default for KgConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            token: None,
            scope: Scope::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            schema_files: Vec::new(),
        }
    }
}

// Tokens stay out of logs.
impl fmt::Debug for KgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KgConfig")
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .field("timeout_secs", &self.timeout_secs)
            .field("page_size", &self.page_size)
            .field("schema_files", &self.schema_files)
            .finish()
    }
}

impl KgConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, OrmError> {
        toml::from_str(text).map_err(|e| OrmError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, OrmError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| OrmError::Io(format!("Cannot read '{}': {e}", path.display())))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(OrmError::Config(format!(
                "'{}' is larger than {MAX_CONFIG_FILE_SIZE} bytes",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| OrmError::Io(format!("Cannot read '{}': {e}", path.display())))?;
        let mut config = Self::from_toml_str(&text)
            .map_err(|e| OrmError::Config(format!("{}: {e}", path.display())))?;
        // Schema paths are relative to the config file.
        if let Some(dir) = path.parent() {
            for file in &mut config.schema_files {
                if file.is_relative() {
                    *file = dir.join(&*file);
                }
            }
        }
        Ok(config)
    }

    /// Read `path` if given (it must exist), else `kgorm.toml` if present,
    /// else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, OrmError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), OrmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(host) = get("KG_HOST") {
            self.host = host;
        }
        if let Some(token) = get("KG_AUTH_TOKEN") {
            self.token = Some(token);
        }
        if let Some(scope) = get("KG_SCOPE") {
            self.scope = scope.parse()?;
        }
        if let Some(secs) = get("KG_TIMEOUT_SECS") {
            self.timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| OrmError::Config(format!("KG_TIMEOUT_SECS: '{secs}' is not a number")))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The built-in schemas plus those from `schema_files`.
    pub fn registry(&self) -> Result<SchemaRegistry, OrmError> {
        let mut registry = openminds::core_registry()?;
        for path in &self.schema_files {
            let text = std::fs::read_to_string(path)
                .map_err(|e| OrmError::Io(format!("Cannot read '{}': {e}", path.display())))?;
            let added = registry.extend_from_json(&text)?;
            tracing::debug!(path = %path.display(), added, "loaded schemas");
        }
        Ok(registry)
    }
}
