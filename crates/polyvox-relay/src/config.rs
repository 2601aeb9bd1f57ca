//! Relay configuration loading from file and environment variables.

use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Token signing settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Membership mirror settings.
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// Realtime provider proxy settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Token signing configuration.
///
/// The `Debug` impl redacts the secret so config dumps in logs never
/// leak signing material.
#[derive(Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing secret for signaling tokens. Token issuance and
    /// socket admission are disabled while this is empty.
    #[serde(default)]
    pub signing_secret: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "signing_secret",
                &if self.signing_secret.is_empty() {
                    "<unset>"
                } else {
                    "<redacted>"
                },
            )
            .finish()
    }
}

/// Best-effort room membership mirror.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Redis connection URL. The mirror is disabled when absent.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// TTL applied to each room's membership set, in seconds.
    #[serde(default = "default_mirror_ttl_secs")]
    pub ttl_secs: u64,
}

/// Settings for the realtime provider credential proxy.
///
/// The `Debug` impl redacts the API key.
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    /// Provider API key. The proxy endpoint returns an error while this
    /// is empty; the key itself is never sent to clients.
    #[serde(default)]
    pub api_key: String,

    /// Provider API base URL.
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Realtime model requested for client sessions.
    #[serde(default = "default_provider_model")]
    pub model: String,

    /// Synthesis voice requested for client sessions.
    #[serde(default = "default_provider_voice")]
    pub voice: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field(
                "api_key",
                &if self.api_key.is_empty() {
                    "<unset>"
                } else {
                    "<redacted>"
                },
            )
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "polyvox_relay=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_mirror_ttl_secs() -> u64 {
    600
}

fn default_provider_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_provider_model() -> String {
    "gpt-4o-realtime-preview-2024-12-17".to_string()
}

fn default_provider_voice() -> String {
    "verse".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: default_mirror_ttl_secs(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_provider_base_url(),
            model: default_provider_model(),
            voice: default_provider_voice(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `POLYVOX_HOST` overrides `server.host`
/// - `POLYVOX_PORT` overrides `server.port`
/// - `POLYVOX_SIGNING_SECRET` overrides `auth.signing_secret`
/// - `POLYVOX_REDIS_URL` overrides `mirror.redis_url`
/// - `POLYVOX_PROVIDER_API_KEY` overrides `provider.api_key`
/// - `POLYVOX_LOG_LEVEL` overrides `logging.level`
/// - `POLYVOX_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("POLYVOX_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("POLYVOX_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(secret) = std::env::var("POLYVOX_SIGNING_SECRET") {
        config.auth.signing_secret = secret;
    }
    if let Ok(url) = std::env::var("POLYVOX_REDIS_URL") {
        if !url.trim().is_empty() {
            config.mirror.redis_url = Some(url);
        }
    }
    if let Ok(key) = std::env::var("POLYVOX_PROVIDER_API_KEY") {
        config.provider.api_key = key;
    }
    if let Ok(level) = std::env::var("POLYVOX_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("POLYVOX_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_no_path_given() {
        let config = load_config(None).unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.auth.signing_secret.is_empty());
        assert!(config.mirror.redis_url.is_none());
        assert_eq!(config.mirror.ttl_secs, 600);
        assert_eq!(config.provider.base_url, "https://api.openai.com");
    }

    #[test]
    fn parses_partial_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8443

[auth]
signing_secret = "test-secret"

[mirror]
redis_url = "redis://127.0.0.1:6379"
ttl_secs = 120
"#
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.auth.signing_secret, "test-secret");
        assert_eq!(
            config.mirror.redis_url.as_deref(),
            Some("redis://127.0.0.1:6379")
        );
        assert_eq!(config.mirror.ttl_secs, 120);
        // Untouched sections keep their defaults.
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.provider.voice, "verse");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/nonexistent/polyvox.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = Config {
            auth: AuthConfig {
                signing_secret: "super-secret".to_string(),
            },
            provider: ProviderConfig {
                api_key: "sk-abc".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("sk-abc"));
        assert!(rendered.contains("<redacted>"));
    }
}
