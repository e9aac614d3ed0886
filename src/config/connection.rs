use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RelayError, Result};

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/nook.sock";
pub const DEFAULT_PORT: u16 = 4851;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SERVICE_TYPE: &str = "_nook._tcp";

pub const ENV_MODE: &str = "NOOK_MODE";
pub const ENV_SOCKET: &str = "NOOK_SOCKET";
pub const ENV_HOST: &str = "NOOK_HOST";
pub const ENV_PORT: &str = "NOOK_PORT";
pub const ENV_TOKEN: &str = "NOOK_TOKEN";
pub const ENV_TIMEOUT: &str = "NOOK_TIMEOUT";
pub const ENV_DEBUG: &str = "NOOK_DEBUG";
pub const ENV_DISCOVERY: &str = "NOOK_DISCOVERY";
pub const ENV_SERVICE: &str = "NOOK_SERVICE";

/// Which transports the relay may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Unix socket when present, then TCP if trusted or a token is set.
    #[default]
    Auto,
    /// Unix socket only.
    Socket,
    /// TCP only.
    Tcp,
}

impl ConnectionMode {
    /// Parse a mode setting. Anything unrecognized selects `Auto`.
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "socket" | "local" | "unix" => ConnectionMode::Socket,
            "tcp" | "remote" => ConnectionMode::Tcp,
            _ => ConnectionMode::Auto,
        }
    }
}

impl std::fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionMode::Auto => write!(f, "auto"),
            ConnectionMode::Socket => write!(f, "socket"),
            ConnectionMode::Tcp => write!(f, "tcp"),
        }
    }
}

/// Connection settings for one hook invocation. Loaded once, then read-only.
#[derive(Clone)]
pub struct RelayConfig {
    pub socket_path: PathBuf,

    /// Explicit TCP host. `None` means discover, then fall back to loopback.
    pub host: Option<String>,

    pub port: u16,

    /// Shared secret for the `AUTH` handshake.
    pub token: Option<String>,

    pub mode: ConnectionMode,

    /// Upper bound on a whole exchange, including the wait for a decision.
    pub response_timeout: Duration,

    pub debug: bool,

    /// Whether to try service discovery when no host is configured.
    pub discovery: bool,

    pub service_type: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            host: None,
            port: DEFAULT_PORT,
            token: None,
            mode: ConnectionMode::Auto,
            response_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            debug: false,
            discovery: true,
            service_type: DEFAULT_SERVICE_TYPE.into(),
        }
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("socket_path", &self.socket_path)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("mode", &self.mode)
            .field("response_timeout", &self.response_timeout)
            .field("debug", &self.debug)
            .field("discovery", &self.discovery)
            .field("service_type", &self.service_type)
            .finish()
    }
}

impl RelayConfig {
    /// Load from `~/.config/nook-relay/config.yml` and the process environment.
    pub fn load() -> Result<Self> {
        let path = super::dirs_global().join("config.yml");
        Self::load_with(&path, |key| std::env::var(key).ok())
    }

    /// Defaults, then the YAML file (if present), then `env` overrides.
    pub fn load_with<F>(file: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_file(FileConfig::load_from(file)?);
        config.apply_env(env)?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(mode) = file.mode {
            self.mode = ConnectionMode::from_setting(&mode);
        }
        if let Some(path) = file.socket_path {
            self.socket_path = path;
        }
        if let Some(host) = file.host.filter(|h| !h.is_empty()) {
            self.host = Some(host);
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(token) = file.token.filter(|t| !t.is_empty()) {
            self.token = Some(token);
        }
        if let Some(secs) = file.timeout_secs {
            self.response_timeout = Duration::from_secs(secs);
        }
        if let Some(debug) = file.debug {
            self.debug = debug;
        }
        if let Some(discovery) = file.discovery {
            self.discovery = discovery;
        }
        if let Some(service) = file.service_type {
            self.service_type = service;
        }
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty variables count as unset.
        let get = |key: &str| env(key).filter(|v| !v.is_empty());

        if let Some(mode) = get(ENV_MODE) {
            self.mode = ConnectionMode::from_setting(&mode);
        }
        if let Some(path) = get(ENV_SOCKET) {
            self.socket_path = PathBuf::from(path);
        }
        if let Some(host) = get(ENV_HOST) {
            self.host = Some(host);
        }
        if let Some(port) = get(ENV_PORT) {
            self.port = parse_number(ENV_PORT, &port)?;
        }
        if let Some(token) = get(ENV_TOKEN) {
            self.token = Some(token);
        }
        if let Some(secs) = get(ENV_TIMEOUT) {
            self.response_timeout = Duration::from_secs(parse_number(ENV_TIMEOUT, &secs)?);
        }
        if let Some(debug) = get(ENV_DEBUG) {
            self.debug = parse_flag(&debug);
        }
        if let Some(discovery) = get(ENV_DISCOVERY) {
            self.discovery = parse_flag(&discovery);
        }
        if let Some(service) = get(ENV_SERVICE) {
            self.service_type = service;
        }
        Ok(())
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| RelayError::InvalidConfig {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// On-disk form of the config. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub mode: Option<String>,
    pub socket_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub debug: Option<bool>,
    pub discovery: Option<bool>,
    pub service_type: Option<String>,
}

impl FileConfig {
    /// Load from a YAML file. Returns default if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|e| RelayError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let tmp = TempDir::new().unwrap();
        let config = RelayConfig::load_with(&tmp.path().join("missing.yml"), env_of(&[])).unwrap();

        assert_eq!(config.mode, ConnectionMode::Auto);
        assert_eq!(config.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(config.port, 4851);
        assert_eq!(config.response_timeout, Duration::from_secs(300));
        assert!(config.host.is_none());
        assert!(config.token.is_none());
        assert!(!config.debug);
        assert!(config.discovery);
    }

    #[test]
    fn test_env_overrides() {
        let tmp = TempDir::new().unwrap();
        let config = RelayConfig::load_with(
            &tmp.path().join("missing.yml"),
            env_of(&[
                ("NOOK_MODE", "tcp"),
                ("NOOK_HOST", "100.101.102.103"),
                ("NOOK_PORT", "9000"),
                ("NOOK_TOKEN", "s3cret"),
                ("NOOK_TIMEOUT", "12"),
                ("NOOK_DEBUG", "1"),
                ("NOOK_SOCKET", "/run/nook.sock"),
            ]),
        )
        .unwrap();

        assert_eq!(config.mode, ConnectionMode::Tcp);
        assert_eq!(config.host.as_deref(), Some("100.101.102.103"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.token.as_deref(), Some("s3cret"));
        assert_eq!(config.response_timeout, Duration::from_secs(12));
        assert!(config.debug);
        assert_eq!(config.socket_path, PathBuf::from("/run/nook.sock"));
    }

    #[test]
    fn test_empty_env_values_are_unset() {
        let tmp = TempDir::new().unwrap();
        let config = RelayConfig::load_with(
            &tmp.path().join("missing.yml"),
            env_of(&[("NOOK_HOST", ""), ("NOOK_TOKEN", ""), ("NOOK_PORT", "")]),
        )
        .unwrap();

        assert!(config.host.is_none());
        assert!(config.token.is_none());
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_invalid_port_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = RelayConfig::load_with(
            &tmp.path().join("missing.yml"),
            env_of(&[("NOOK_PORT", "not-a-port")]),
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::InvalidConfig { key: "NOOK_PORT", .. }));
    }

    #[test]
    fn test_file_then_env_precedence() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yml");
        std::fs::write(
            &path,
            "mode: socket\nhost: 192.168.1.20\nport: 5000\ntoken: from-file\ndiscovery: false\n",
        )
        .unwrap();

        let config = RelayConfig::load_with(&path, env_of(&[("NOOK_PORT", "6000")])).unwrap();

        assert_eq!(config.mode, ConnectionMode::Socket);
        assert_eq!(config.host.as_deref(), Some("192.168.1.20"));
        assert_eq!(config.port, 6000);
        assert_eq!(config.token.as_deref(), Some("from-file"));
        assert!(!config.discovery);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yml");
        std::fs::write(&path, "port: [1, 2\n").unwrap();

        let err = RelayConfig::load_with(&path, env_of(&[])).unwrap_err();
        assert!(matches!(err, RelayError::ConfigParse { .. }));
    }

    #[test]
    fn test_mode_aliases() {
        assert_eq!(ConnectionMode::from_setting("socket"), ConnectionMode::Socket);
        assert_eq!(ConnectionMode::from_setting("LOCAL"), ConnectionMode::Socket);
        assert_eq!(ConnectionMode::from_setting("tcp"), ConnectionMode::Tcp);
        assert_eq!(ConnectionMode::from_setting("remote"), ConnectionMode::Tcp);
        assert_eq!(ConnectionMode::from_setting("auto"), ConnectionMode::Auto);
        assert_eq!(ConnectionMode::from_setting("bogus"), ConnectionMode::Auto);
    }

    #[test]
    fn test_debug_output_redacts_token() {
        let config = RelayConfig {
            token: Some("hunter2".into()),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
