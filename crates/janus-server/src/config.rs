//! Bridge configuration loading from file and environment variables.

use janus_sigil::{AgentSecret, AgentSecretStore};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Sigil authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Connection and forwarding settings.
    #[serde(default)]
    pub bridge: BridgeConfig,
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

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "janus_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Hex master secret. A random one is generated when unset, which
    /// invalidates every sigil on restart.
    #[serde(default)]
    pub master_secret: Option<String>,

    /// Agents known to the bridge at startup.
    #[serde(default)]
    pub agents: Vec<AgentSecretConfig>,
}

impl AuthConfig {
    /// Builds a secret store holding every configured agent.
    pub fn secret_store(&self) -> AgentSecretStore {
        let store = AgentSecretStore::new();
        for agent in &self.agents {
            store.insert(agent.agent_id.clone(), agent.secret.clone());
        }
        store
    }
}

/// A preconfigured agent secret.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSecretConfig {
    pub agent_id: String,
    pub secret: AgentSecret,
}

/// Connection table and forwarding settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Seconds without a heartbeat before a record is pruned. `0` disables pruning.
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,

    /// Timeout for delivering a directive to an agent's callback endpoint.
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,
}

impl BridgeConfig {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_heartbeat_timeout_secs() -> u64 {
    300
}

fn default_forward_timeout_ms() -> u64 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
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

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            forward_timeout_ms: default_forward_timeout_ms(),
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
/// - `JANUS_HOST` overrides `server.host`
/// - `JANUS_PORT` overrides `server.port`
/// - `JANUS_LOG_LEVEL` overrides `logging.level`
/// - `JANUS_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `JANUS_MASTER_SECRET` overrides `auth.master_secret`
/// - `JANUS_HEARTBEAT_TIMEOUT_SECS` overrides `bridge.heartbeat_timeout_secs`
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

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies `JANUS_*` overrides read through `var`. Unparseable values are ignored.
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("JANUS_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("JANUS_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = var("JANUS_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("JANUS_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(secret) = var("JANUS_MASTER_SECRET").filter(|s| !s.trim().is_empty()) {
        config.auth.master_secret = Some(secret);
    }
    if let Some(timeout) = var("JANUS_HEARTBEAT_TIMEOUT_SECS") {
        if let Ok(parsed) = timeout.parse() {
            config.bridge.heartbeat_timeout_secs = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, default_host());
        assert_eq!(config.bridge.heartbeat_timeout_secs, 300);
        assert_eq!(config.bridge.forward_timeout(), Duration::from_secs(5));
        assert!(config.auth.agents.is_empty());
    }

    #[test]
    fn parses_all_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
host = "0.0.0.0"
port = 9100

[logging]
level = "debug"
json = true

[auth]
master_secret = "00ff"

[[auth.agents]]
agent_id = "jaguar"
secret = "0123456789abcdef0123456789abcdef"

[bridge]
heartbeat_timeout_secs = 0
forward_timeout_ms = 250
"#
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.auth.master_secret.as_deref(), Some("00ff"));
        assert_eq!(config.auth.agents.len(), 1);
        assert_eq!(config.auth.agents[0].agent_id, "jaguar");
        assert_eq!(
            config.auth.agents[0].secret.as_str(),
            "0123456789abcdef0123456789abcdef"
        );
        assert_eq!(config.bridge.heartbeat_timeout_secs, 0);
        assert_eq!(config.bridge.forward_timeout(), Duration::from_millis(250));

        let store = config.auth.secret_store();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("jaguar"), Some(config.auth.agents[0].secret.clone()));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[server\nport = ").unwrap();
        let err = load_config(file.path().to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("JANUS_HOST", "10.0.0.1"),
            ("JANUS_PORT", "7000"),
            ("JANUS_LOG_LEVEL", "trace"),
            ("JANUS_LOG_JSON", "1"),
            ("JANUS_MASTER_SECRET", "abcd"),
            ("JANUS_HEARTBEAT_TIMEOUT_SECS", "30"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.host.to_string(), "10.0.0.1");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.logging.level, "trace");
        assert!(config.logging.json);
        assert_eq!(config.auth.master_secret.as_deref(), Some("abcd"));
        assert_eq!(config.bridge.heartbeat_timeout_secs, 30);
    }

    #[test]
    fn unparseable_env_values_are_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| match key {
            "JANUS_PORT" => Some("not-a-port".to_string()),
            "JANUS_MASTER_SECRET" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 8000);
        assert!(config.auth.master_secret.is_none());
    }
}
