//! Pipeline configuration and the secret-source seam
//!
//! Credentials come from a [`SecretSource`]; everything else has a default
//! and can be overridden through `TASKSCOPE_*` variables.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Default ingestion host
pub const DEFAULT_BASE_URL: &str = "https://cloud.langfuse.com";

/// Default secret paths for the two ingestion keys
pub const PUBLIC_KEY_PATH: &str = "telemetry/public-key";
pub const SECRET_KEY_PATH: &str = "telemetry/secret-key";

/// Error type for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("secret not found: {0}")]
    MissingSecret(String),
    #[error("secret source error: {0}")]
    Secret(String),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Fetches secrets by path-like key (e.g. `telemetry/public-key`)
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<String, ConfigError>;
}

/// Reads secrets from environment variables.
///
/// `telemetry/public-key` is looked up as `TELEMETRY_PUBLIC_KEY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl EnvSecrets {
    pub fn var_name(path: &str) -> String {
        path.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }
}

#[async_trait]
impl SecretSource for EnvSecrets {
    async fn fetch(&self, path: &str) -> Result<String, ConfigError> {
        let var = Self::var_name(path);
        match std::env::var(&var) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigError::MissingSecret(path.to_string())),
        }
    }
}

/// In-memory secrets, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(path.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretSource for StaticSecrets {
    async fn fetch(&self, path: &str) -> Result<String, ConfigError> {
        self.values
            .get(path)
            .cloned()
            .ok_or_else(|| ConfigError::MissingSecret(path.to_string()))
    }
}

/// Configuration for the tracer and its pipeline
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Ingestion host, without trailing slash
    pub base_url: String,
    pub public_key: String,
    pub secret_key: String,
    /// How often the background task drains the buffer
    pub flush_interval: Duration,
    /// Maximum events per request
    pub max_batch_size: usize,
    /// Events held in memory before new ones are dropped
    pub buffer_capacity: usize,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Pause before the single retry of a failed batch
    pub retry_delay: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            public_key: String::new(),
            secret_key: String::new(),
            flush_interval: Duration::from_secs(5),
            max_batch_size: 50,
            buffer_capacity: 1024,
            request_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl TelemetryConfig {
    /// Defaults with the given credentials
    pub fn with_credentials(public_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            secret_key: secret_key.into(),
            ..Self::default()
        }
    }

    /// Defaults with credentials fetched from a secret source
    pub async fn from_secrets(
        source: &dyn SecretSource,
        public_key_path: &str,
        secret_key_path: &str,
    ) -> Result<Self, ConfigError> {
        let public_key = source.fetch(public_key_path).await?;
        let secret_key = source.fetch(secret_key_path).await?;
        Ok(Self::with_credentials(public_key, secret_key))
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Apply `TASKSCOPE_*` overrides using `lookup` to resolve variable names
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TASKSCOPE_BASE_URL") {
            self = self.base_url(url);
        }
        if let Some(ms) = parse_override::<u64, _>(&lookup, "TASKSCOPE_FLUSH_INTERVAL_MS")? {
            self.flush_interval = Duration::from_millis(ms);
        }
        if let Some(n) = parse_override(&lookup, "TASKSCOPE_MAX_BATCH_SIZE")? {
            self.max_batch_size = n;
        }
        if let Some(n) = parse_override(&lookup, "TASKSCOPE_BUFFER_CAPACITY")? {
            self.buffer_capacity = n;
        }
        if let Some(ms) = parse_override::<u64, _>(&lookup, "TASKSCOPE_REQUEST_TIMEOUT_MS")? {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_override::<u64, _>(&lookup, "TASKSCOPE_RETRY_DELAY_MS")? {
            self.retry_delay = Duration::from_millis(ms);
        }
        Ok(self)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&str, bool, String); 6] = [
            ("base_url", self.base_url.is_empty(), self.base_url.clone()),
            ("public_key", self.public_key.is_empty(), String::new()),
            ("secret_key", self.secret_key.is_empty(), String::new()),
            (
                "flush_interval",
                self.flush_interval.is_zero(),
                format!("{:?}", self.flush_interval),
            ),
            (
                "max_batch_size",
                self.max_batch_size == 0,
                self.max_batch_size.to_string(),
            ),
            (
                "buffer_capacity",
                self.buffer_capacity == 0,
                self.buffer_capacity.to_string(),
            ),
        ];

        for (key, bad, value) in checks {
            if bad {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

fn parse_override<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.base_url, "https://cloud.langfuse.com");
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert_eq!(config.max_batch_size, 50);
        assert_eq!(config.buffer_capacity, 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.retry_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TASKSCOPE_BASE_URL", "http://localhost:3000/"),
            ("TASKSCOPE_FLUSH_INTERVAL_MS", "250"),
            ("TASKSCOPE_MAX_BATCH_SIZE", "10"),
            ("TASKSCOPE_BUFFER_CAPACITY", "64"),
        ]
        .into_iter()
        .collect();

        let config = TelemetryConfig::with_credentials("pk", "sk")
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.flush_interval, Duration::from_millis(250));
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.buffer_capacity, 64);
        // Untouched values keep their defaults
        assert_eq!(config.retry_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_override() {
        let err = TelemetryConfig::default()
            .with_overrides(|k| (k == "TASKSCOPE_MAX_BATCH_SIZE").then(|| "lots".to_string()))
            .unwrap_err();

        match err {
            ConfigError::Invalid { key, value } => {
                assert_eq!(key, "TASKSCOPE_MAX_BATCH_SIZE");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate() {
        assert!(TelemetryConfig::with_credentials("pk", "sk").validate().is_ok());
        assert!(TelemetryConfig::default().validate().is_err());

        let mut config = TelemetryConfig::with_credentials("pk", "sk");
        config.buffer_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref key, .. }) if key == "buffer_capacity"
        ));
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(EnvSecrets::var_name("telemetry/public-key"), "TELEMETRY_PUBLIC_KEY");
    }

    #[tokio::test]
    async fn test_from_secrets() {
        let secrets = StaticSecrets::new()
            .with(PUBLIC_KEY_PATH, "pk-lf-1")
            .with(SECRET_KEY_PATH, "sk-lf-1");

        let config = TelemetryConfig::from_secrets(&secrets, PUBLIC_KEY_PATH, SECRET_KEY_PATH)
            .await
            .unwrap();
        assert_eq!(config.public_key, "pk-lf-1");
        assert_eq!(config.secret_key, "sk-lf-1");
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let secrets = StaticSecrets::new().with(PUBLIC_KEY_PATH, "pk");
        let err = TelemetryConfig::from_secrets(&secrets, PUBLIC_KEY_PATH, SECRET_KEY_PATH)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret(p) if p == SECRET_KEY_PATH));
    }
}
