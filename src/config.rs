//! Configuration for the weekly scan job.
use crate::miners;
use crate::registry;
use serde;
use std::collections::HashSet;
use std::fs;

pub const DEFAULT_SEED_NODE: &str = "https://50.28.86.131";

#[derive(Debug, serde::Deserialize, Clone)]
pub struct Config {
    /// The seed node queried for network health, epoch, and the node registry
    #[serde(default = "default_seed_node")]
    pub seed_node: String,

    /// Additional node URL(s) to scan beyond the registry
    #[serde(default)]
    pub extra_node_urls: Vec<String>,

    /// Path to newline-delimited expected miner IDs. Missing IDs are flagged
    /// for outreach. Empty disables the file source.
    #[serde(default)]
    pub expected_miners_file: String,

    /// Expected miner IDs given inline
    #[serde(default)]
    pub expected_miners: Vec<String>,

    /// Hours considered actively attesting
    #[serde(default = "default_active_window_hours")]
    pub active_window_hours: f64,

    /// Hours considered weekly payout eligible
    #[serde(default = "default_weekly_window_hours")]
    pub weekly_window_hours: f64,

    /// HTTP timeout per request in seconds
    #[serde(default = "default_http_timeout_sec")]
    pub http_timeout_sec: u64,

    /// Verify TLS certs. Off by default because the official node uses
    /// self-signed TLS.
    #[serde(default)]
    pub verify_tls: bool,

    /// Optional admin key, forwarded as X-Admin-Key/X-API-Key where required
    #[serde(default)]
    pub admin_key: String,

    /// Maximum number of nodes probed concurrently
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,

    /// Write the machine-readable JSON report to this path. Empty disables.
    #[serde(default)]
    pub out_json: String,

    /// Write the markdown report to this path. Empty prints it to stdout.
    #[serde(default)]
    pub out_md: String,
}

fn default_seed_node() -> String {
    DEFAULT_SEED_NODE.to_string()
}

fn default_active_window_hours() -> f64 {
    2.0
}

fn default_weekly_window_hours() -> f64 {
    168.0
}

fn default_http_timeout_sec() -> u64 {
    20
}

fn default_scan_concurrency() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Config {
            seed_node: default_seed_node(),
            extra_node_urls: Vec::new(),
            expected_miners_file: String::new(),
            expected_miners: Vec::new(),
            active_window_hours: default_active_window_hours(),
            weekly_window_hours: default_weekly_window_hours(),
            http_timeout_sec: default_http_timeout_sec(),
            verify_tls: false,
            admin_key: String::new(),
            scan_concurrency: default_scan_concurrency(),
            out_json: String::new(),
            out_md: String::new(),
        }
    }
}

/// Load the configuration from a config json file
impl Config {
    pub fn load(path: &str) -> Result<Self, String> {
        let config_data = fs::read_to_string(path)
            .map_err(|err| format!("Failed to read config file: {}", err))?;

        let config: Config = serde_json::from_str(&config_data)
            .map_err(|err| format!("Failed to parse config file: {}", err))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the classifiers cannot give meaningful answers
    /// for: a seed that does not normalize to a base URL, and classification
    /// windows in the wrong order (the age bands would overlap).
    pub fn validate(&self) -> Result<(), String> {
        if registry::normalize_base_url(&self.seed_node).is_empty() {
            return Err(format!("seed_node is not a usable URL: {:?}", self.seed_node));
        }
        if self.active_window_hours > self.weekly_window_hours {
            return Err(format!(
                "active_window_hours ({}) must not exceed weekly_window_hours ({})",
                self.active_window_hours, self.weekly_window_hours
            ));
        }
        Ok(())
    }

    /// The full expectation set: inline IDs plus the optional file. A
    /// configured but missing file path is a fatal configuration error.
    pub fn expected_miner_ids(&self) -> Result<HashSet<String>, String> {
        let mut expected: HashSet<String> = self
            .expected_miners
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        expected.extend(miners::load_expected_miners(&self.expected_miners_file)?);
        Ok(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_minimal_config() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.seed_node, DEFAULT_SEED_NODE);
        assert_eq!(config.active_window_hours, 2.0);
        assert_eq!(config.weekly_window_hours, 168.0);
        assert_eq!(config.http_timeout_sec, 20);
        assert_eq!(config.scan_concurrency, 8);
        assert!(!config.verify_tls);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_windows() {
        let config = Config {
            active_window_hours: 200.0,
            weekly_window_hours: 168.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("active_window_hours"));
    }

    #[test]
    fn validate_rejects_unusable_seed() {
        let config = Config {
            seed_node: "   ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn expected_ids_merge_inline_and_file_sources() {
        let dir = std::env::temp_dir();
        let path = dir.join("config_expected_miners_test.txt");
        fs::write(&path, "filed-miner\n").unwrap();

        let config = Config {
            expected_miners: vec!["inline-miner".into(), " ".into()],
            expected_miners_file: path.to_str().unwrap().to_string(),
            ..Default::default()
        };
        let expected = config.expected_miner_ids().unwrap();
        let _ = fs::remove_file(&path);

        assert!(expected.contains("inline-miner"));
        assert!(expected.contains("filed-miner"));
        assert_eq!(expected.len(), 2);

        let broken = Config {
            expected_miners_file: "/no/such/file.txt".into(),
            ..Default::default()
        };
        assert!(broken.expected_miner_ids().is_err());
    }
}
