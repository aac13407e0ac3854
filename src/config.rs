//! Client configuration: defaults, optional TOML file, environment
//! overrides, CLI flags on top (applied by the binary).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::poll::{
    PollPolicy, ADAPTIVE_FAILURE_MS, ADAPTIVE_SUCCESS_MS, LIST_REFRESH_MS,
};
use crate::slash::DEFAULT_VIEWPORT_ROWS;
use crate::transport::ApiClient;
use crate::ConsoleError;

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "SLASH_CONSOLE_BASE_URL";

/// All knobs of the client, every one with a sensible default.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the demo API server.
    pub base_url: String,
    /// Per-request timeout (ms).
    pub request_timeout_ms: u64,
    /// TCP connect timeout (ms).
    pub connect_timeout_ms: u64,
    /// Fixed refresh cadence of the list loops (ms).
    pub list_refresh_ms: u64,
    /// Re-poll delay after a successful incremental tick (ms).
    pub adaptive_success_ms: u64,
    /// Retry delay after a failed incremental tick (ms).
    pub adaptive_failure_ms: u64,
    /// Rows the tail viewport keeps visible.
    pub viewport_rows: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
            list_refresh_ms: LIST_REFRESH_MS,
            adaptive_success_ms: ADAPTIVE_SUCCESS_MS,
            adaptive_failure_ms: ADAPTIVE_FAILURE_MS,
            viewport_rows: DEFAULT_VIEWPORT_ROWS,
        }
    }
}

impl ClientConfig {
    /// Load configuration: defaults, then the TOML file when given, then
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConsoleError> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|e| {
                    ConsoleError::Config(format!("cannot read {}: {e}", p.display()))
                })?;
                Self::from_toml_str(&raw)?
            }
            None => ClientConfig::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConsoleError> {
        toml::from_str(raw).map_err(|e| ConsoleError::Config(e.to_string()))
    }

    fn apply_env(&mut self) {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.is_empty() {
                self.base_url = base_url;
            }
        }
    }

    /// The fixed-rate policy for the full-refresh list loops.
    pub fn list_policy(&self) -> PollPolicy {
        PollPolicy::FixedRate {
            every: Duration::from_millis(self.list_refresh_ms),
        }
    }

    /// The adaptive policy for the tail and game loops.
    pub fn adaptive_policy(&self) -> PollPolicy {
        PollPolicy::Adaptive {
            success: Duration::from_millis(self.adaptive_success_ms),
            failure: Duration::from_millis(self.adaptive_failure_ms),
        }
    }

    /// Build the transport client this config describes.
    pub fn api_client(&self) -> ApiClient {
        ApiClient::builder(&self.base_url)
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .request_timeout(Duration::from_millis(self.request_timeout_ms))
            .build()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_page_behavior() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.list_refresh_ms, 3000);
        assert_eq!(config.adaptive_success_ms, 100);
        assert_eq!(config.adaptive_failure_ms, 1000);
    }

    #[test]
    fn from_toml_partial_keeps_defaults() {
        let config =
            ClientConfig::from_toml_str("base_url = \"http://demo:9000\"").expect("parse");
        assert_eq!(config.base_url, "http://demo:9000");
        assert_eq!(config.list_refresh_ms, 3000);
    }

    #[test]
    fn from_toml_full_document() {
        let raw = r#"
            base_url = "http://demo:9000"
            request_timeout_ms = 5000
            connect_timeout_ms = 500
            list_refresh_ms = 10000
            adaptive_success_ms = 50
            adaptive_failure_ms = 2000
            viewport_rows = 20
        "#;
        let config = ClientConfig::from_toml_str(raw).expect("parse");
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.viewport_rows, 20);
    }

    #[test]
    fn from_toml_rejects_unknown_keys() {
        assert!(ClientConfig::from_toml_str("no_such_knob = 1").is_err());
    }

    #[test]
    fn from_toml_rejects_malformed_document() {
        let err = ClientConfig::from_toml_str("base_url = [").unwrap_err();
        assert!(matches!(err, ConsoleError::Config(_)));
    }

    #[test]
    fn load_missing_file_errors() {
        let err = ClientConfig::load(Some(Path::new("/no/such/file.toml"))).unwrap_err();
        assert!(matches!(err, ConsoleError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "list_refresh_ms = 7000").expect("write");
        let config = ClientConfig::load(Some(file.path())).expect("load");
        assert_eq!(config.list_refresh_ms, 7000);
    }

    #[test]
    fn env_overrides_base_url() {
        std::env::set_var(BASE_URL_ENV, "http://override:1234");
        let config = ClientConfig::load(None).expect("load");
        std::env::remove_var(BASE_URL_ENV);
        assert_eq!(config.base_url, "http://override:1234");
    }

    #[test]
    fn policies_reflect_config() {
        let config = ClientConfig {
            list_refresh_ms: 9000,
            adaptive_success_ms: 10,
            adaptive_failure_ms: 500,
            ..ClientConfig::default()
        };
        assert_eq!(
            config.list_policy(),
            PollPolicy::FixedRate { every: Duration::from_millis(9000) }
        );
        assert_eq!(
            config.adaptive_policy(),
            PollPolicy::Adaptive {
                success: Duration::from_millis(10),
                failure: Duration::from_millis(500)
            }
        );
    }

    #[test]
    fn api_client_uses_configured_base_url() {
        let config = ClientConfig {
            base_url: "http://demo:9000".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(config.api_client().base_url(), "http://demo:9000");
    }
}
