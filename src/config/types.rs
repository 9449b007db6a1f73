//! Configuration types, defaults, loading, and validation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP / WebSocket server
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat-list stabilization
    #[serde(default)]
    pub sync: SyncConfig,

    /// Contact scan bounds
    #[serde(default)]
    pub scan: ScanConfig,

    /// Automation bridge connection
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: "0.0.0.0")
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port (default: 3001)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory of front-end assets served at `/`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Also print login QR codes to the terminal
    #[serde(default)]
    pub print_qr: bool,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            static_dir: default_static_dir(),
            print_qr: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Delay between chat-count samples
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Consecutive equal samples needed before the chat list counts as synced
    #[serde(default = "default_required_stable_checks")]
    pub required_stable_checks: u32,

    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// When false, `max_wait_ms` only produces a warning
    #[serde(default)]
    pub enforce_max_wait: bool,
}

fn default_check_interval_ms() -> u64 {
    2000
}

fn default_required_stable_checks() -> u32 {
    3
}

fn default_max_wait_ms() -> u64 {
    60_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            required_stable_checks: default_required_stable_checks(),
            max_wait_ms: default_max_wait_ms(),
            enforce_max_wait: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Upper bound on contacts scanned per connection
    #[serde(default = "default_contact_limit")]
    pub contact_limit: usize,

    /// Recent messages requested per chat
    #[serde(default = "default_message_fetch_limit")]
    pub message_fetch_limit: usize,
}

fn default_contact_limit() -> usize {
    1000
}

fn default_message_fetch_limit() -> usize {
    100
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            contact_limit: default_contact_limit(),
            message_fetch_limit: default_message_fetch_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Base URL of the automation bridge
    #[serde(default = "default_bridge_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How often to poll the bridge for QR / ready status
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3002".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_status_poll_interval_ms() -> u64 {
    1000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_bridge_url(),
            request_timeout_secs: default_request_timeout_secs(),
            status_poll_interval_ms: default_status_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log to file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Base directory: `~/.wa-recency/`
pub fn wa_recency_home() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".wa-recency")
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. Default values
    /// 2. System config: ~/.wa-recency/config.toml
    /// 3. Local config: ./wa-recency.toml
    /// 4. Environment variables
    pub fn load() -> Result<Self> {
        tracing::debug!("Loading configuration...");

        let mut config = Self::default();

        let system_config_path = Self::system_config_path();
        if system_config_path.exists() {
            tracing::debug!("Loading system config from: {:?}", system_config_path);
            config = Self::merge_from_file(&system_config_path)?;
        }

        let local_config_path = Self::local_config_path();
        if local_config_path.exists() {
            tracing::debug!("Loading local config from: {:?}", local_config_path);
            config = Self::merge_from_file(&local_config_path)?;
        }

        config.apply_env_overrides();

        tracing::debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply environment
    /// overrides. Fails if the file does not exist.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading configuration from custom path: {:?}", path);

        if !path.exists() {
            anyhow::bail!("Config file not found: {:?}", path);
        }
        let mut config = Self::merge_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn system_config_path() -> PathBuf {
        wa_recency_home().join("config.toml")
    }

    fn local_config_path() -> PathBuf {
        PathBuf::from("./wa-recency.toml")
    }

    /// Parse a TOML file. Sections it leaves out fall back to defaults.
    fn merge_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("WA_RECENCY_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid WA_RECENCY_PORT: {}", port),
            }
        }

        if let Ok(bind) = std::env::var("WA_RECENCY_BIND") {
            self.server.bind = bind;
        }

        if let Ok(dir) = std::env::var("WA_RECENCY_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(dir);
        }

        if let Ok(url) = std::env::var("WA_RECENCY_BRIDGE_URL") {
            self.bridge.base_url = url;
        }

        if let Ok(level) = std::env::var("WA_RECENCY_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(file) = std::env::var("WA_RECENCY_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
    }

    pub fn validate(&self) -> Result<()> {
        tracing::debug!("Validating configuration...");

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.sync.check_interval_ms == 0 {
            anyhow::bail!("sync.check_interval_ms must be non-zero");
        }
        if self.sync.required_stable_checks == 0 {
            anyhow::bail!("sync.required_stable_checks must be at least 1");
        }
        if self.scan.contact_limit == 0 {
            anyhow::bail!("scan.contact_limit must be at least 1");
        }
        if self.scan.message_fetch_limit == 0 {
            anyhow::bail!("scan.message_fetch_limit must be at least 1");
        }
        if self.bridge.base_url.trim().is_empty() {
            anyhow::bail!("bridge.base_url is empty");
        }

        if !self.server.static_dir.exists() {
            tracing::warn!(
                "Static directory does not exist, front-end requests will 404: {:?}",
                self.server.static_dir
            );
        }

        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        tracing::info!("Configuration saved to: {:?}", path);
        Ok(())
    }
}
