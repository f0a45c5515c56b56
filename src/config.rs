use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

use crate::registry::types::RuntimeTarget;

// =============================================================================
// Time-related constants
// =============================================================================

/// Timeout for artifact downloads in milliseconds (30 seconds)
pub const DEFAULT_DOWNLOAD_TIMEOUT_MS: u64 = 30_000;

/// Timeout for panel API calls in milliseconds (10 seconds)
pub const DEFAULT_PANEL_TIMEOUT_MS: u64 = 10_000;

/// Timeout for registry metadata requests in milliseconds (10 seconds)
pub const DEFAULT_REGISTRY_TIMEOUT_MS: u64 = 10_000;

/// Upper bound for a delayed restart in seconds
pub const MAX_RESTART_DELAY_SECS: u64 = 300;

// =============================================================================
// Filesystem constants
// =============================================================================

/// Smallest file accepted as a plugin artifact, in bytes
pub const DEFAULT_MIN_ARTIFACT_SIZE: u64 = 1000;

/// Subdirectory of the plugin directory holding displaced artifacts
pub const BACKUP_DIR_NAME: &str = ".backup";

/// Name of the staging directory created next to the plugin directory
pub const STAGING_DIR_NAME: &str = ".panel-relay-staging";

const DEFAULT_MODRINTH_BASE_URL: &str = "https://api.modrinth.com/v2";

/// Application configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub plugins: PluginsConfig,
    pub runtime: RuntimeTarget,
    pub registry: RegistryConfig,
    pub panel: PanelConfig,
    pub logging: LoggingConfig,
}

/// Plugin directory and download settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginsConfig {
    pub dir: PathBuf,
    /// Where downloads are staged before validation; defaults to a sibling of `dir`
    pub staging_dir: Option<PathBuf>,
    pub min_artifact_size: u64,
    pub download_timeout_ms: u64,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("plugins"),
            staging_dir: None,
            min_artifact_size: DEFAULT_MIN_ARTIFACT_SIZE,
            download_timeout_ms: DEFAULT_DOWNLOAD_TIMEOUT_MS,
        }
    }
}

impl PluginsConfig {
    /// Staging directory, falling back to a hidden sibling of the plugin directory
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(|| {
            self.dir
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
                .join(STAGING_DIR_NAME)
        })
    }
}

/// Marketplace configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    pub base_url: String,
    /// Bounds connecting and each read; also the deadline for a version listing
    pub timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MODRINTH_BASE_URL.to_string(),
            timeout_ms: DEFAULT_REGISTRY_TIMEOUT_MS,
        }
    }
}

/// Panel (Crafty Controller) configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PanelConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub server_id: Option<String>,
    /// Accept self-signed certificates, common on panel installs
    pub allow_insecure: bool,
    pub timeout_ms: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            server_id: None,
            allow_insecure: false,
            timeout_ms: DEFAULT_PANEL_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Write to stderr instead of the log file
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            stderr: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load configuration from a JSON file and the process environment.
    ///
    /// A missing file at the default location yields defaults; a missing file at an
    /// explicitly given path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_path(), false),
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_json(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => Self::default(),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Override fields from environment variables resolved through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_empty("MINECRAFT_PATH") {
            self.plugins.dir = PathBuf::from(path).join("plugins");
        }
        if let Some(dir) = non_empty("PLUGINS_DIR") {
            self.plugins.dir = PathBuf::from(dir);
        }
        if let Some(loader) = non_empty("SERVER_LOADER") {
            self.runtime.loader = loader;
        }
        if let Some(game_version) = non_empty("SERVER_GAME_VERSION") {
            self.runtime.game_version = Some(game_version);
        }
        if let Some(url) = non_empty("MODRINTH_BASE_URL") {
            self.registry.base_url = url;
        }
        if let Some(url) = non_empty("CRAFTY_API_URL") {
            self.panel.url = Some(url);
        }
        if let Some(token) = non_empty("CRAFTY_API_TOKEN") {
            self.panel.token = Some(token);
        }
        if let Some(server_id) = non_empty("CRAFTY_SERVER_ID") {
            self.panel.server_id = Some(server_id);
        }
        if let Some(flag) = non_empty("CRAFTY_ALLOW_INSECURE") {
            self.panel.allow_insecure = matches!(flag.trim(), "1" | "true" | "yes");
        }
        if let Some(level) = non_empty("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = non_empty("LOG_FORMAT").and_then(|f| LogFormat::parse(&f)) {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.loader.trim().is_empty() {
            return Err(ConfigError::Invalid("runtime.loader must not be empty".into()));
        }
        if self.plugins.download_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "plugins.downloadTimeoutMs must be greater than zero".into(),
            ));
        }
        if self.registry.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "registry.timeoutMs must be greater than zero".into(),
            ));
        }
        if staging_overlaps(&self.plugins.dir, &self.plugins.staging_dir()) {
            return Err(ConfigError::Invalid(format!(
                "plugins.stagingDir {:?} must be outside plugins.dir {:?}",
                self.plugins.staging_dir(),
                self.plugins.dir
            )));
        }
        if self.panel.url.is_some() != self.panel.token.is_some() {
            return Err(ConfigError::Invalid(
                "panel.url and panel.token must be set together".into(),
            ));
        }
        Ok(())
    }
}

/// Whether `staging_dir` is `plugin_dir` itself or lies inside it (compared lexically)
pub fn staging_overlaps(plugin_dir: &Path, staging_dir: &Path) -> bool {
    let lexical = |p: &Path| -> PathBuf {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    };
    lexical(staging_dir).starts_with(lexical(plugin_dir))
}

/// Returns the path to the data directory for panel-relay.
/// Uses $XDG_DATA_HOME/panel-relay if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/panel-relay,
/// or ./panel-relay if neither is available.
pub fn data_dir() -> PathBuf {
    xdg_dir_with_env(
        std::env::var("XDG_DATA_HOME").ok(),
        dirs::home_dir(),
        ".local/share",
    )
}

/// Returns the configuration directory, following $XDG_CONFIG_HOME.
pub fn config_dir() -> PathBuf {
    xdg_dir_with_env(
        std::env::var("XDG_CONFIG_HOME").ok(),
        dirs::home_dir(),
        ".config",
    )
}

/// Returns the path to the default configuration file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("panel-relay.log")
}

fn xdg_dir_with_env(xdg_home: Option<String>, home_dir: Option<PathBuf>, fallback: &str) -> PathBuf {
    let base = xdg_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(fallback)))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join("panel-relay")
}
