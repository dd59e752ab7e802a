//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. TICKET_DESK_CONFIG environment variable
//! 3. Default: config/ticket-desk.toml

use crate::domain::ticket::EventInfo;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const CONFIG_ENV_VAR: &str = "TICKET_DESK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/ticket-desk.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: default_base_url(), timeout_ms: default_timeout_ms() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Path prefix for avatar images
    #[serde(default = "default_avatar_prefix")]
    pub avatar_prefix: String,
    /// Path prefix for QR code images
    #[serde(default = "default_qr_prefix")]
    pub qr_prefix: String,
    /// Local directory for downloaded assets
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
}

fn default_avatar_prefix() -> String {
    "/uploads".to_string()
}

fn default_qr_prefix() -> String {
    "/qr_codes".to_string()
}

fn default_download_dir() -> String {
    "tickets".to_string()
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            avatar_prefix: default_avatar_prefix(),
            qr_prefix: default_qr_prefix(),
            download_dir: default_download_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Largest accepted avatar, in raw bytes
    #[serde(default = "default_max_avatar_bytes")]
    pub max_avatar_bytes: usize,
}

fn default_max_avatar_bytes() -> usize {
    500_000
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self { max_avatar_bytes: default_max_avatar_bytes() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Directory auto-refresh interval (0 to disable)
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    /// Log file for the dashboard (it owns the terminal)
    #[serde(default = "default_dashboard_log_file")]
    pub log_file: String,
}

fn default_refresh_secs() -> u64 {
    30
}

fn default_dashboard_log_file() -> String {
    "ticket-dashboard.log".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { refresh_secs: default_refresh_secs(), log_file: default_dashboard_log_file() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MockConfig {
    #[serde(default = "default_mock_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_mock_port")]
    pub port: u16,
}

fn default_mock_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_mock_port() -> u16 {
    5000
}

impl Default for MockConfig {
    fn default() -> Self {
        Self { bind_address: default_mock_bind_address(), port: default_mock_port() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub event: Option<EventInfo>,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub mock: MockConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    base_url: String,
    timeout_ms: u64,
    avatar_prefix: String,
    qr_prefix: String,
    download_dir: String,
    max_avatar_bytes: usize,
    event: EventInfo,
    refresh_secs: u64,
    dashboard_log_file: String,
    mock_bind_address: String,
    mock_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            base_url: toml_config.api.base_url,
            timeout_ms: toml_config.api.timeout_ms,
            avatar_prefix: toml_config.assets.avatar_prefix,
            qr_prefix: toml_config.assets.qr_prefix,
            download_dir: toml_config.assets.download_dir,
            max_avatar_bytes: toml_config.registration.max_avatar_bytes,
            event: toml_config.event.unwrap_or_default(),
            refresh_secs: toml_config.dashboard.refresh_secs,
            dashboard_log_file: toml_config.dashboard.log_file,
            mock_bind_address: toml_config.mock.bind_address,
            mock_port: toml_config.mock.port,
            config_file,
        }
    }

    /// Determine config file path from the CLI value or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return path;
            }
        }

        DEFAULT_CONFIG_PATH.to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_fallback_to_defaults");
                Self::default()
            }
        }
    }

    /// Override the registrar base URL (CLI `--base-url`)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn avatar_prefix(&self) -> &str {
        &self.avatar_prefix
    }

    pub fn qr_prefix(&self) -> &str {
        &self.qr_prefix
    }

    pub fn download_dir(&self) -> &str {
        &self.download_dir
    }

    pub fn max_avatar_bytes(&self) -> usize {
        self.max_avatar_bytes
    }

    pub fn event(&self) -> &EventInfo {
        &self.event
    }

    pub fn refresh_secs(&self) -> u64 {
        self.refresh_secs
    }

    pub fn dashboard_log_file(&self) -> &str {
        &self.dashboard_log_file
    }

    pub fn mock_bind_address(&self) -> &str {
        &self.mock_bind_address
    }

    pub fn mock_port(&self) -> u16 {
        self.mock_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}
