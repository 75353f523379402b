// crates/tessera-daemon/src/config.rs
//
// Runtime configuration for the Tessera daemon.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;

use tessera_core::{PeerId, TesseraError};

/// Errors raised while loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl From<ConfigError> for TesseraError {
    fn from(e: ConfigError) -> Self {
        TesseraError::Config(e.to_string())
    }
}

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Hex-encoded public key identifying this node in reports. Takes
    /// precedence over the hotkey file.
    #[serde(default)]
    pub local_key: Option<String>,

    /// Path to the hex-encoded ed25519 hotkey secret.
    #[serde(default = "default_hotkey_path")]
    pub hotkey_path: String,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Length of one epoch in seconds.
    #[serde(default = "default_epoch_interval_secs")]
    pub epoch_interval_secs: u64,

    /// Number of concurrent report workers.
    #[serde(default = "default_report_workers")]
    pub report_workers: usize,

    /// Maximum number of queued report requests.
    #[serde(default = "default_report_backlog")]
    pub report_backlog: usize,

    /// Number of epochs whose network map is kept in memory.
    #[serde(default = "default_netmap_cache_size")]
    pub netmap_cache_size: usize,

    /// Hex public keys of the storage nodes in the network map.
    #[serde(default)]
    pub roster: Vec<String>,

    /// Aggregator endpoints receiving local trust reports
    /// (e.g., ["http://10.0.0.2:50051"]). When empty, reports are only logged.
    #[serde(default)]
    pub aggregator_urls: Vec<String>,
}

fn default_hotkey_path() -> String {
    "~/.tessera/hotkey.key".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_epoch_interval_secs() -> u64 {
    60
}

fn default_report_workers() -> usize {
    4
}

fn default_report_backlog() -> usize {
    16
}

fn default_netmap_cache_size() -> usize {
    8
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            local_key: None,
            hotkey_path: default_hotkey_path(),
            log_level: default_log_level(),
            epoch_interval_secs: default_epoch_interval_secs(),
            report_workers: default_report_workers(),
            report_backlog: default_report_backlog(),
            netmap_cache_size: default_netmap_cache_size(),
            roster: Vec::new(),
            aggregator_urls: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(path, &contents)
    }

    fn parse(path: &str, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Parse the configured roster into peer identities.
    pub fn roster_peers(&self) -> Result<Vec<PeerId>, TesseraError> {
        self.roster
            .iter()
            .map(|s| {
                s.parse::<PeerId>()
                    .map_err(|e| TesseraError::Config(format!("roster entry {}: {}", s, e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = DaemonConfig::parse("empty.toml", "").unwrap();
        assert_eq!(cfg.epoch_interval_secs, 60);
        assert_eq!(cfg.report_workers, 4);
        assert_eq!(cfg.report_backlog, 16);
        assert!(cfg.local_key.is_none());
        assert!(cfg.roster.is_empty());
    }

    #[test]
    fn parses_reporting_section() {
        let key = "ab".repeat(32);
        let toml = format!(
            r#"
            local_key = "{key}"
            epoch_interval_secs = 5
            report_workers = 2
            roster = ["{key}", "{other}"]
            aggregator_urls = ["http://10.0.0.2:50051"]
            "#,
            key = key,
            other = "cd".repeat(32),
        );
        let cfg = DaemonConfig::parse("node.toml", &toml).unwrap();
        assert_eq!(cfg.epoch_interval_secs, 5);
        assert_eq!(cfg.report_workers, 2);
        assert_eq!(cfg.report_backlog, 16);
        assert_eq!(cfg.aggregator_urls.len(), 1);

        let peers = cfg.roster_peers().unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].to_hex(), key);
    }

    #[test]
    fn bad_roster_entry_is_config_error() {
        let cfg = DaemonConfig {
            roster: vec!["not-hex".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            cfg.roster_peers().unwrap_err(),
            TesseraError::Config(_)
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = DaemonConfig::load("/nonexistent/tessera/config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(matches!(TesseraError::from(err), TesseraError::Config(_)));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let err = DaemonConfig::parse("bad.toml", "report_workers = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
