use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub forms: FormsConfig,
    pub paths: PathsConfig,
    pub ui: UiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// REST API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds (default: 15000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How long fetched catalogs stay fresh, in seconds (default: 300)
    #[serde(default = "default_catalog_ttl")]
    pub catalog_ttl_secs: u64,
    /// Retry attempts for transient failures on reads (default: 3)
    #[serde(default = "default_retries")]
    pub retries: usize,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_catalog_ttl() -> u64 {
    300 // 5 minutes
}

fn default_retries() -> usize {
    3
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            catalog_ttl_secs: default_catalog_ttl(),
            retries: default_retries(),
        }
    }
}

/// Form behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormsConfig {
    /// Quiet period after the last edit before a draft is written
    #[serde(default = "default_draft_debounce")]
    pub draft_debounce_ms: u64,
    /// Write a pending draft when the form closes (false = drop it)
    #[serde(default = "default_flush_on_close")]
    pub flush_on_close: bool,
}

fn default_draft_debounce() -> u64 {
    300
}

fn default_flush_on_close() -> bool {
    true
}

impl FormsConfig {
    pub fn draft_debounce(&self) -> Duration {
        Duration::from_millis(self.draft_debounce_ms)
    }
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            draft_debounce_ms: default_draft_debounce(),
            flush_on_close: default_flush_on_close(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for drafts, tokens and logs
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Event poll interval for the terminal loop
    pub tick_rate_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to log to file in TUI mode (false = stderr for debugging)
    #[serde(default = "default_log_to_file")]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_to_file() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: default_log_to_file(),
        }
    }
}

impl Config {
    /// Path to the user config file (~/.config/hrdesk/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hrdesk").join("config.toml"))
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so hrdesk works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with HRDESK_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("HRDESK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to the user config file
    pub fn save(&self) -> Result<PathBuf> {
        let config_path =
            Self::user_config_path().context("Could not determine user config directory")?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }

    /// JSON document holding drafts and session tokens
    pub fn storage_path(&self) -> PathBuf {
        self.state_path().join("storage.json")
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.ui.tick_rate_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        let state = dirs::data_local_dir()
            .map(|dir| dir.join("hrdesk").to_string_lossy().into_owned())
            .unwrap_or_else(|| ".hrdesk".to_string());

        Self {
            api: ApiConfig::default(),
            forms: FormsConfig::default(),
            paths: PathsConfig { state },
            ui: UiConfig { tick_rate_ms: 100 },
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.api.timeout(), Duration::from_secs(15));
        assert_eq!(config.api.catalog_ttl(), Duration::from_secs(300));
        assert_eq!(config.forms.draft_debounce(), Duration::from_millis(300));
        assert!(config.forms.flush_on_close);
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hrdesk.toml");
        std::fs::write(
            &path,
            "[api]\nbase_url = \"https://rh.example.mx/api\"\n\n[forms]\nflush_on_close = false\n",
        )
        .unwrap();

        let config = Config::load(path.to_str()).unwrap();
        assert_eq!(config.api.base_url, "https://rh.example.mx/api");
        assert_eq!(config.api.retries, 3);
        assert!(!config.forms.flush_on_close);
        assert_eq!(config.forms.draft_debounce_ms, 300);
    }

    #[test]
    fn test_save_writes_loadable_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.paths.state = temp_dir.path().to_string_lossy().into_owned();
        config.ui.tick_rate_ms = 50;
        config.save_to(&path).unwrap();

        let loaded = Config::load(path.to_str()).unwrap();
        assert_eq!(loaded.ui.tick_rate_ms, 50);
        assert_eq!(loaded.storage_path(), temp_dir.path().join("storage.json"));
    }
}
