use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Console client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Websocket base url, feeds live under `{ws_url}/ws/<domain>` (default: ws://localhost:8080)
    pub ws_url: Url,
    /// REST base url for control actions (default: http://localhost:8080/api/)
    pub api_url: Url,
    /// Reconnect delay unit; attempt `n` waits `n * base` (default: 1000ms)
    pub reconnect_base_interval: Duration,
    /// Reconnect attempts before giving up (default: 5)
    pub reconnect_max_attempts: u32,
    /// Interval for polled views (default: 5000ms)
    pub poll_interval: Duration,
    /// REST request timeout (default: 30s)
    pub request_timeout: Duration,
    /// Validate TLS certificates for wss:// and https:// (default: true)
    pub validate_certs: bool,
}

impl ConsoleConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup; missing keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let ws_url = parse_base_url(
            "CONSOLE_WS_URL",
            &get_or("CONSOLE_WS_URL", "ws://localhost:8080"),
            &["ws", "wss"],
        )?;
        let mut api_url = parse_base_url(
            "CONSOLE_API_URL",
            &get_or("CONSOLE_API_URL", "http://localhost:8080/api/"),
            &["http", "https"],
        )?;
        // Relative joins drop the last segment unless the base ends in '/'.
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }

        let reconnect_base_ms: u64 = get_or("CONSOLE_RECONNECT_BASE_MS", "1000")
            .parse()
            .map_err(|_| {
                ConfigError::InvalidConfig("CONSOLE_RECONNECT_BASE_MS must be a number".into())
            })?;
        let reconnect_max_attempts: u32 = get_or("CONSOLE_RECONNECT_MAX_ATTEMPTS", "5")
            .parse()
            .map_err(|_| {
                ConfigError::InvalidConfig(
                    "CONSOLE_RECONNECT_MAX_ATTEMPTS must be a number".into(),
                )
            })?;
        let poll_interval_ms: u64 = get_or("CONSOLE_POLL_INTERVAL_MS", "5000")
            .parse()
            .map_err(|_| {
                ConfigError::InvalidConfig("CONSOLE_POLL_INTERVAL_MS must be a number".into())
            })?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "CONSOLE_POLL_INTERVAL_MS must be greater than zero".into(),
            ));
        }
        let request_timeout_secs: u64 = get_or("CONSOLE_REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|_| {
                ConfigError::InvalidConfig("CONSOLE_REQUEST_TIMEOUT_SECS must be a number".into())
            })?;
        let validate_certs: bool = get_or("CONSOLE_WS_VALIDATE_CERTS", "true")
            .trim()
            .parse()
            .map_err(|_| {
                ConfigError::InvalidConfig(
                    "CONSOLE_WS_VALIDATE_CERTS must be true or false".into(),
                )
            })?;

        Ok(ConsoleConfig {
            ws_url,
            api_url,
            reconnect_base_interval: Duration::from_millis(reconnect_base_ms),
            reconnect_max_attempts,
            poll_interval: Duration::from_millis(poll_interval_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
            validate_certs,
        })
    }
}

fn parse_base_url(key: &str, raw: &str, schemes: &[&str]) -> ConfigResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidConfig(format!("{key} must be a valid URL: {e}")))?;

    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidConfig(format!(
            "{key} has unsupported scheme: {}",
            url.scheme()
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::InvalidConfig(format!(
            "{key} must not include query/fragment"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> ConfigResult<ConsoleConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConsoleConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.ws_url.as_str(), "ws://localhost:8080/");
        assert_eq!(cfg.api_url.as_str(), "http://localhost:8080/api/");
        assert_eq!(cfg.reconnect_base_interval, Duration::from_millis(1000));
        assert_eq!(cfg.reconnect_max_attempts, 5);
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert!(cfg.validate_certs);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = load(&[
            ("CONSOLE_WS_URL", "wss://console.example.com"),
            ("CONSOLE_API_URL", "https://console.example.com/api"),
            ("CONSOLE_RECONNECT_BASE_MS", "250"),
            ("CONSOLE_RECONNECT_MAX_ATTEMPTS", "2"),
            ("CONSOLE_WS_VALIDATE_CERTS", "false"),
        ])
        .unwrap();
        assert_eq!(cfg.ws_url.scheme(), "wss");
        assert_eq!(cfg.api_url.as_str(), "https://console.example.com/api/");
        assert_eq!(cfg.reconnect_base_interval, Duration::from_millis(250));
        assert_eq!(cfg.reconnect_max_attempts, 2);
        assert!(!cfg.validate_certs);
    }

    #[test]
    fn wrong_scheme_is_rejected() {
        let err = load(&[("CONSOLE_WS_URL", "http://localhost:8080")]).unwrap_err();
        assert!(err.to_string().contains("CONSOLE_WS_URL"));
    }

    #[test]
    fn non_numeric_interval_is_rejected() {
        assert!(load(&[("CONSOLE_RECONNECT_BASE_MS", "soon")]).is_err());
        assert!(load(&[("CONSOLE_POLL_INTERVAL_MS", "0")]).is_err());
    }

    #[test]
    fn validate_certs_must_be_a_bool() {
        for raw in ["0", "no", "TRUE", ""] {
            let err = load(&[("CONSOLE_WS_VALIDATE_CERTS", raw)]).unwrap_err();
            assert!(err.to_string().contains("CONSOLE_WS_VALIDATE_CERTS"), "{raw:?}");
        }
        assert!(load(&[("CONSOLE_WS_VALIDATE_CERTS", " false ")]).is_ok());
    }

    #[test]
    fn query_in_base_url_is_rejected() {
        assert!(load(&[("CONSOLE_API_URL", "http://h/api/?x=1")]).is_err());
    }
}
