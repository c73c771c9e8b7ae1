//! Portico configuration file handling
//!
//! Provides default configuration generation and loading for the Portico
//! service. Configuration files are TOML format and stored in the service
//! data directory.
//!
//! The master secret is deliberately NOT part of the config file: it is
//! sourced from the `PORTICO_MASTER_SECRET` environment variable or a
//! secret file, so a leaked config never leaks the token signing root.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Default listen address
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Default public base URL used to build portal links
const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default bound on each store call inside a submission, in seconds
const DEFAULT_IO_TIMEOUT_SECS: u64 = 10;

/// Environment variable holding the hex master secret
pub const MASTER_SECRET_ENV: &str = "PORTICO_MASTER_SECRET";

/// Portico service configuration (operator settings)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PorticoConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Approval workflow configuration
    #[serde(default)]
    pub approval: ApprovalConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. "127.0.0.1:8080"
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Public base URL portal links are built on (no trailing slash).
    /// Behind a reverse proxy this is the externally visible origin.
    #[serde(default = "default_base_url")]
    pub public_base_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file (portico.db)
    pub database_path: PathBuf,
}

/// Approval workflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Request-level bound on each store call, in seconds.
    /// A verification read that exceeds this is reported as failure.
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_io_timeout_secs() -> u64 {
    DEFAULT_IO_TIMEOUT_SECS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_base_url: default_base_url(),
        }
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            io_timeout_secs: default_io_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl PorticoConfig {
    /// Create a new configuration with the given database path
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig { database_path },
            approval: ApprovalConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: PorticoConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(database_path: &Path) -> String {
        format!(
            r#"# Portico Service Configuration
#
# The master secret is NOT configured here. Provide it via the
# PORTICO_MASTER_SECRET environment variable or a secret file
# (see `portico run --secret-file`). Generate one with:
#   openssl rand -hex 32

[server]
# Listen address
bind_addr = "{bind_addr}"

# Public base URL portal links are built on (no trailing slash).
# Behind a reverse proxy, set this to the externally visible origin.
public_base_url = "{base_url}"

[storage]
# Path to the SQLite database file
database_path = "{database_path}"

[approval]
# Bound on each store call inside a decision submission, in seconds.
# A verification read that exceeds this is reported as failure.
io_timeout_secs = {io_timeout}

[logging]
# Log level: trace, debug, info, warn, error
level = "info"
"#,
            bind_addr = DEFAULT_BIND_ADDR,
            base_url = DEFAULT_BASE_URL,
            database_path = database_path.display(),
            io_timeout = DEFAULT_IO_TIMEOUT_SECS,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        database_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(database_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// Get the default data directory (~/.local/share/portico or equivalent)
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portico")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

/// Get the default database path
pub fn default_database_path() -> PathBuf {
    default_data_dir().join("portico.db")
}

/// Get the default master secret file path
pub fn default_secret_path() -> PathBuf {
    default_data_dir().join("master-secret.txt")
}

/// Read the master secret.
///
/// Priority: `--secret-file` flag > `PORTICO_MASTER_SECRET` environment
/// variable > default secret file. Missing everywhere is an error; the
/// service never invents a signing root.
pub fn read_master_secret(
    secret_file: Option<&str>,
) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(path) = secret_file {
        let secret = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read secret file '{}': {}", path, e))?;
        return Ok(secret);
    }

    if let Ok(secret) = std::env::var(MASTER_SECRET_ENV) {
        return Ok(secret);
    }

    let default_path = default_secret_path();
    if default_path.exists() {
        let secret = fs::read_to_string(&default_path).map_err(|e| {
            format!(
                "Failed to read secret file '{}': {}",
                default_path.display(),
                e
            )
        })?;
        return Ok(secret);
    }

    Err(format!(
        "No master secret found. Set {} or provide --secret-file (generate one with: openssl rand -hex 32)",
        MASTER_SECRET_ENV
    )
    .into())
}
