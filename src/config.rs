//! Runtime settings that the command-line grammar does not carry.
//!
//! Every value comes from the environment and falls back to the standard
//! Modbus TCP behaviour when unset.

use anyhow::{anyhow, Result};
use std::{path::PathBuf, time::Duration};

use crate::protocol::modbus::{DEFAULT_PORT, DEFAULT_TIMEOUT};

pub const ENV_PORT: &str = "MBPROBE_PORT";
pub const ENV_TIMEOUT_MS: &str = "MBPROBE_TIMEOUT_MS";
pub const ENV_LOG_FILE: &str = "MBPROBE_LOG_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// TCP port the target is contacted on.
    pub port: u16,
    /// Socket read/write timeout for every exchange.
    pub timeout: Duration,
    /// Write detailed logs here instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            log_file: None,
        }
    }
}

impl ProbeConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = non_empty(lookup(ENV_PORT)) {
            config.port = raw
                .parse::<u16>()
                .map_err(|err| anyhow!("Invalid {ENV_PORT} value '{raw}': {err}"))?;
            if config.port == 0 {
                return Err(anyhow!("Invalid {ENV_PORT} value '0': port must be non-zero"));
            }
        }

        if let Some(raw) = non_empty(lookup(ENV_TIMEOUT_MS)) {
            let millis = raw
                .parse::<u64>()
                .map_err(|err| anyhow!("Invalid {ENV_TIMEOUT_MS} value '{raw}': {err}"))?;
            if millis == 0 {
                return Err(anyhow!(
                    "Invalid {ENV_TIMEOUT_MS} value '0': timeout must be non-zero"
                ));
            }
            config.timeout = Duration::from_millis(millis);
        }

        config.log_file = non_empty(lookup(ENV_LOG_FILE)).map(PathBuf::from);

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = ProbeConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ProbeConfig::default());
        assert_eq!(config.port, 502);
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = ProbeConfig::from_lookup(lookup_from(&[
            (ENV_PORT, "1502"),
            (ENV_TIMEOUT_MS, " 250 "),
            (ENV_LOG_FILE, "/tmp/mbprobe.log"),
        ]))
        .unwrap();
        assert_eq!(config.port, 1502);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/mbprobe.log")));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(ProbeConfig::from_lookup(lookup_from(&[(ENV_PORT, "70000")])).is_err());
        assert!(ProbeConfig::from_lookup(lookup_from(&[(ENV_PORT, "0")])).is_err());
        assert!(ProbeConfig::from_lookup(lookup_from(&[(ENV_TIMEOUT_MS, "soon")])).is_err());
        assert!(ProbeConfig::from_lookup(lookup_from(&[(ENV_TIMEOUT_MS, "0")])).is_err());
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config =
            ProbeConfig::from_lookup(lookup_from(&[(ENV_PORT, "  "), (ENV_LOG_FILE, "")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.log_file.is_none());
    }
}
