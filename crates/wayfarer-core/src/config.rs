use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, WayfarerError};

/// Top-level configuration for the Wayfarer backend.
///
/// Loaded from `~/.wayfarer/config.toml` by default. Secrets never live in
/// this file: each section names the environment variable holding its key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WayfarerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub flight: FlightConfig,
    #[serde(default)]
    pub geo: GeoConfig,
    #[serde(default)]
    pub form: FormConfig,
}

impl WayfarerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WayfarerConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| WayfarerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply `WAYFARER_*` environment overrides on top of file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("WAYFARER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("WAYFARER_PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid WAYFARER_PORT"),
            }
        }
        if let Some(debug) = lookup("WAYFARER_DEBUG") {
            self.server.debug = matches!(
                debug.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(level) = lookup("WAYFARER_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.server.api_version.trim().is_empty() {
            return Err(WayfarerError::Config(
                "server.api_version must not be empty".to_string(),
            ));
        }
        if self.orchestration.default_route.trim().is_empty() {
            return Err(WayfarerError::Config(
                "orchestration.default_route must not be empty".to_string(),
            ));
        }
        if self.orchestration.step_limit == 0 {
            return Err(WayfarerError::Config(
                "orchestration.step_limit must be at least 1".to_string(),
            ));
        }
        if self.form.date_range_field == self.form.list_field {
            return Err(WayfarerError::Config(
                "form.date_range_field and form.list_field must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read a secret from the environment, treating empty values as unset.
pub fn secret(env_name: &str) -> Option<String> {
    std::env::var(env_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Human-readable service name, used in the health payload and logs.
    pub app_name: String,
    /// Path prefix for every route (e.g. `v1` gives `/v1/ask`).
    pub api_version: String,
    pub host: String,
    pub port: u16,
    /// Enables debug-level logging when no explicit level is set.
    pub debug: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    /// `["*"]` allows any header.
    pub allowed_headers: Vec<String>,
    /// Requests per second across ask and form; 0 disables limiting.
    pub rate_limit_per_sec: u64,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_name: "Travel Agency Backend".to_string(),
            api_version: "v1".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            debug: false,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: vec!["*".to_string()],
            rate_limit_per_sec: 50,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Temperature for routing, combining and capability extraction.
    pub temperature: f32,
    /// Temperature for the conversational booking form.
    pub form_temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            max_tokens: 1024,
            timeout_secs: 60,
            temperature: 0.0,
            form_temperature: 0.7,
        }
    }
}

/// Router and dispatch loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Capability used when the router reply cannot be parsed.
    pub default_route: String,
    /// Hard upper bound on dispatch iterations per request.
    pub step_limit: usize,
    /// Extra attempts for a failing capability call (0 = single attempt).
    pub capability_retries: u32,
    pub retry_backoff_ms: u64,
    /// Maximum accepted input length in characters.
    pub max_message_length: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            default_route: "weather".to_string(),
            step_limit: 25,
            capability_retries: 0,
            retry_backoff_ms: 250,
            max_message_length: 2000,
        }
    }
}

/// Weather capability settings (Open-Meteo).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub geocoding_url: String,
    pub forecast_url: String,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Exchange-rate capability settings (exchangerate.host).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    /// Environment variable holding the access key (optional upstream).
    pub api_key_env: String,
    /// Source currency used when geolocation gives none.
    pub default_currency: String,
    pub timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.exchangerate.host/convert".to_string(),
            api_key_env: "EXCHANGE_API_KEY".to_string(),
            default_currency: "USD".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Flight search capability settings (Amadeus self-service API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub api_secret_env: String,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            base_url: "https://test.api.amadeus.com".to_string(),
            api_key_env: "AMADEUS_API_KEY".to_string(),
            api_secret_env: "AMADEUS_API_SECRET".to_string(),
            max_results: 5,
            timeout_secs: 10,
        }
    }
}

/// Where the geolocation cache persists its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// In-process only; lost on restart.
    Memory,
    /// A single JSON document on disk.
    Json,
    /// A SQLite table on disk.
    Sqlite,
}

/// IP geolocation settings (ipapi.co).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub base_url: String,
    pub ttl_secs: u64,
    pub cache_backend: CacheBackend,
    /// File used by the `json` and `sqlite` backends. `~/` is expanded.
    pub cache_path: String,
    pub timeout_secs: u64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ipapi.co".to_string(),
            ttl_secs: 60 * 60 * 24,
            cache_backend: CacheBackend::Json,
            cache_path: "~/.wayfarer/geoip_cache.json".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Booking form settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Path to the JSON form schema. The built-in schema is used when unset.
    pub schema_path: Option<String>,
    /// Field holding a `{startDate, endDate}` object.
    pub date_range_field: String,
    /// Field holding a list of strings.
    pub list_field: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            schema_path: None,
            date_range_field: "availability".to_string(),
            list_field: "destinationPreferences".to_string(),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> std::path::PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        std::path::PathBuf::from(home).join(rest)
    } else {
        std::path::PathBuf::from(path)
    }
}
