//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `hearth.toml` in the working directory. Every field has a
//! default so the file is optional, but the database URL and the broker
//! address must come from somewhere. Environment variables take precedence
//! over file values.

use std::time::Duration;

use serde::Deserialize;

use hearth_adapter_mqtt::MqttConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Broker settings.
    pub mqtt: MqttConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Heartbeat publishing.
    pub heartbeat: HeartbeatConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL. Required.
    pub url: String,
    /// Upper bound on concurrently open units of work.
    pub max_connections: u32,
    /// Seconds a unit of work may wait for a free connection.
    pub acquire_timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Heartbeat configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Seconds between two heartbeat events. Zero disables the heartbeat.
    pub interval_secs: u64,
}

impl Config {
    /// Load configuration from `hearth.toml` (if present), apply
    /// environment-variable overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, an
    /// override is malformed, or a required value is missing.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("hearth.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply overrides read through `lookup`. For pairs of variables the
    /// `HEARTH_` one wins.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = lookup("HEARTH_HOST") {
            self.server.host = val;
        }
        if let Some(port) = lookup("HEARTH_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = lookup("HEARTH_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        for key in ["DATABASE_URL", "HEARTH_DATABASE_URL"] {
            if let Some(val) = lookup(key) {
                self.database.url = val;
            }
        }
        for key in ["MQTT_BROKER", "HEARTH_MQTT_BROKER"] {
            if let Some(val) = lookup(key) {
                self.mqtt
                    .set_broker(&val)
                    .map_err(|err| ConfigError::Validation(err.to_string()))?;
            }
        }
        for key in ["RUST_LOG", "HEARTH_LOG"] {
            if let Some(val) = lookup(key) {
                self.logging.filter = val;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Missing("database url"));
        }
        if !self.mqtt.is_configured() {
            return Err(ConfigError::Missing("mqtt broker"));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database max_connections must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Storage adapter configuration.
    #[must_use]
    pub fn storage(&self) -> hearth_adapter_storage_sqlite_sqlx::Config {
        hearth_adapter_storage_sqlite_sqlx::Config {
            database_url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            acquire_timeout: Duration::from_secs(self.database.acquire_timeout_secs),
        }
    }

    /// Heartbeat period, if enabled.
    #[must_use]
    pub fn heartbeat_period(&self) -> Option<Duration> {
        (self.heartbeat.interval_secs > 0).then(|| Duration::from_secs(self.heartbeat.interval_secs))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hearthd=info,hearth_app=info,hearth_adapter_mqtt=info,hearth_adapter_storage_sqlite_sqlx=info,tower_http=debug"
                .to_string(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// A required value is set neither in the file nor in the environment.
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
