use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::time::parse_duration_str;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the query facade binds; the dashboard UI expects 8080.
    pub http_addr: String,
    /// How long one scanning query may run before it is cancelled.
    pub query_timeout: Duration,
    /// Listing page size when the request names none.
    pub default_limit: usize,
    /// Hard cap on a requested page size.
    pub max_limit: usize,
    pub retention_ttl: Duration,
    pub retention_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8080".to_string(),
            query_timeout: Duration::from_secs(10),
            default_limit: 100,
            max_limit: 1000,
            retention_ttl: Duration::from_secs(60 * 60 * 24),
            retention_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        apply_overrides(&mut cfg, load_env_overrides()?, "environment")?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        apply_overrides(&mut cfg, load_env_overrides()?, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    http_addr: Option<String>,
    query_timeout: Option<String>,
    default_limit: Option<usize>,
    max_limit: Option<usize>,
    retention_ttl: Option<String>,
    retention_interval: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TRACELENS_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("tracelens/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| EngineError::Validation(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| EngineError::Validation(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let parse_usize = |name: &str| -> Result<Option<usize>> {
        match env::var(name) {
            Ok(v) => v
                .parse::<usize>()
                .map(Some)
                .map_err(|e| EngineError::Validation(format!("bad {name} in environment: {e}"))),
            Err(_) => Ok(None),
        }
    };

    Ok(ConfigOverrides {
        http_addr: env::var("TRACELENS_HTTP_ADDR").ok(),
        query_timeout: env::var("TRACELENS_QUERY_TIMEOUT").ok(),
        default_limit: parse_usize("TRACELENS_DEFAULT_LIMIT")?,
        max_limit: parse_usize("TRACELENS_MAX_LIMIT")?,
        retention_ttl: env::var("TRACELENS_RETENTION_TTL").ok(),
        retention_interval: env::var("TRACELENS_RETENTION_INTERVAL").ok(),
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.http_addr {
        cfg.http_addr = v;
    }
    if let Some(v) = overrides.query_timeout {
        cfg.query_timeout = parse_duration_str(&v).map_err(|e| {
            EngineError::Validation(format!("bad query_timeout in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.default_limit {
        cfg.default_limit = v;
    }
    if let Some(v) = overrides.max_limit {
        cfg.max_limit = v;
    }
    if let Some(v) = overrides.retention_ttl {
        cfg.retention_ttl = parse_duration_str(&v).map_err(|e| {
            EngineError::Validation(format!("bad retention_ttl in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.retention_interval {
        cfg.retention_interval = parse_duration_str(&v).map_err(|e| {
            EngineError::Validation(format!(
                "bad retention_interval in {source}: {e} (value={v})"
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_ui_expectations() {
        let cfg = Config::default();
        assert_eq!(cfg.http_addr, "127.0.0.1:8080");
        assert_eq!(cfg.query_timeout, Duration::from_secs(10));
        assert_eq!(cfg.default_limit, 100);
        assert!(cfg.max_limit >= cfg.default_limit);
    }

    #[test]
    fn file_overrides_apply() {
        let mut cfg = Config::default();
        let overrides = ConfigOverrides {
            http_addr: Some("0.0.0.0:9090".to_string()),
            query_timeout: Some("3s".to_string()),
            default_limit: Some(50),
            ..ConfigOverrides::default()
        };
        apply_overrides(&mut cfg, overrides, "config file").unwrap();
        assert_eq!(cfg.http_addr, "0.0.0.0:9090");
        assert_eq!(cfg.query_timeout, Duration::from_secs(3));
        assert_eq!(cfg.default_limit, 50);
    }

    #[test]
    fn bad_duration_is_rejected() {
        let mut cfg = Config::default();
        let overrides = ConfigOverrides {
            retention_ttl: Some("soon".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, overrides, "config file").is_err());
    }

    #[test]
    fn toml_round_trip() {
        let parsed: ConfigOverrides =
            toml::from_str("http_addr = \"127.0.0.1:8081\"\nretention_ttl = \"12h\"\n").unwrap();
        assert_eq!(parsed.http_addr.as_deref(), Some("127.0.0.1:8081"));
        assert_eq!(parsed.retention_ttl.as_deref(), Some("12h"));
    }
}
