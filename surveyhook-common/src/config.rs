//! Bootstrap configuration loading
//!
//! Configuration is resolved once at startup and is read-only afterwards.
//!
//! Config file location priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SURVEYHOOK_CONFIG`)
//! 3. Platform config directory (`<config_dir>/surveyhook/config.toml`)
//! 4. Built-in defaults (no file)
//!
//! After the file is read, individual `SURVEYHOOK_*` environment variables
//! override single fields so credentials never have to live in the file.

use crate::time::millis_to_duration;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SURVEYHOOK_CONFIG";
pub const SIGNING_SECRET_ENV_VAR: &str = "SURVEYHOOK_SIGNING_SECRET";
pub const DATABASE_ENV_VAR: &str = "SURVEYHOOK_DATABASE";
pub const PORT_ENV_VAR: &str = "SURVEYHOOK_PORT";
pub const MIRROR_BASE_ID_ENV_VAR: &str = "SURVEYHOOK_MIRROR_BASE_ID";
pub const MIRROR_TABLE_ENV_VAR: &str = "SURVEYHOOK_MIRROR_TABLE";
pub const MIRROR_TOKEN_ENV_VAR: &str = "SURVEYHOOK_MIRROR_TOKEN";

/// Default payload ceiling (1 MiB)
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Receiver configuration
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HookConfig {
    /// Interface the HTTP listener binds to
    pub bind_address: String,

    /// HTTP listener port
    pub port: u16,

    /// SQLite database file for the durable store
    pub database_path: PathBuf,

    /// Shared signing secret; `None` or blank runs in open mode
    pub signing_secret: Option<String>,

    /// Largest accepted request body, in bytes
    pub max_payload_bytes: usize,

    /// Deadline for the durable store stage
    pub store_timeout_ms: u64,

    /// Secondary mirror settings
    pub mirror: MirrorConfig,
}

/// Secondary mirror (spreadsheet workspace) settings
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// REST API root
    pub api_url: String,

    /// Root of human-facing record links
    pub link_base_url: String,

    /// Workspace base identifier; mirror is disabled without one
    pub base_id: Option<String>,

    /// Table name or id inside the base
    pub table: String,

    /// Bearer credential
    pub api_token: Option<String>,

    /// Deadline for the whole mirror stage
    pub timeout_ms: u64,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5731,
            database_path: default_database_path(),
            signing_secret: None,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            store_timeout_ms: 5_000,
            mirror: MirrorConfig::default(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.airtable.com".to_string(),
            link_base_url: "https://airtable.com".to_string(),
            base_id: None,
            table: "Survey Responses".to_string(),
            api_token: None,
            timeout_ms: 10_000,
        }
    }
}

// Credentials must never reach the logs
impl std::fmt::Debug for HookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookConfig")
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("database_path", &self.database_path)
            .field("signing_secret", &self.signing_secret.as_ref().map(|_| "<redacted>"))
            .field("max_payload_bytes", &self.max_payload_bytes)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("mirror", &self.mirror)
            .finish()
    }
}

impl std::fmt::Debug for MirrorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorConfig")
            .field("api_url", &self.api_url)
            .field("link_base_url", &self.link_base_url)
            .field("base_id", &self.base_id)
            .field("table", &self.table)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl MirrorConfig {
    /// Mirror runs only with both a base id and a credential
    pub fn is_enabled(&self) -> bool {
        is_set(&self.base_id) && is_set(&self.api_token)
    }

    pub fn timeout(&self) -> Duration {
        millis_to_duration(self.timeout_ms)
    }
}

impl HookConfig {
    /// Load configuration from `path`, or defaults when there is no file
    ///
    /// A missing file is not an error: the receiver starts on defaults and
    /// logs a warning. A file that exists but does not parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file found, using built-in defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!("Config file {} not found, using built-in defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: HookConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `SURVEYHOOK_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(SIGNING_SECRET_ENV_VAR) {
            self.signing_secret = Some(secret);
        }
        if let Some(path) = lookup(DATABASE_ENV_VAR) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(port) = lookup(PORT_ENV_VAR) {
            self.port = port
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("{} is not a port: {}", PORT_ENV_VAR, e)))?;
        }
        if let Some(base_id) = lookup(MIRROR_BASE_ID_ENV_VAR) {
            self.mirror.base_id = Some(base_id);
        }
        if let Some(table) = lookup(MIRROR_TABLE_ENV_VAR) {
            self.mirror.table = table;
        }
        if let Some(token) = lookup(MIRROR_TOKEN_ENV_VAR) {
            self.mirror.api_token = Some(token);
        }
        Ok(())
    }

    /// Reject configurations the receiver cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_payload_bytes == 0 {
            return Err(Error::Config("max_payload_bytes must be greater than 0".to_string()));
        }
        if self.store_timeout_ms == 0 {
            return Err(Error::Config("store_timeout_ms must be greater than 0".to_string()));
        }
        if is_set(&self.mirror.base_id) && !is_set(&self.mirror.api_token) {
            return Err(Error::Config(
                "mirror.base_id is set but mirror.api_token is missing".to_string(),
            ));
        }
        if self.mirror.is_enabled() && self.mirror.table.trim().is_empty() {
            return Err(Error::Config("mirror.table must not be empty".to_string()));
        }
        Ok(())
    }

    /// Whether deliveries must carry a valid signature
    pub fn signing_enabled(&self) -> bool {
        is_set(&self.signing_secret)
    }

    pub fn store_timeout(&self) -> Duration {
        millis_to_duration(self.store_timeout_ms)
    }
}

/// Resolve the config file location
///
/// Returns `None` when no candidate exists, which means "use defaults".
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir()
        .map(|d| d.join("surveyhook").join("config.toml"))
        .filter(|p| p.exists())
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("surveyhook").join("surveyhook.db"))
        .unwrap_or_else(|| PathBuf::from("./surveyhook_data/surveyhook.db"))
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
