//! Facade configuration and logging setup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tollgate_session::SessionConfig;

use crate::TollgateError;

/// Top-level configuration.
///
/// Every field has a default, so `{}` is a valid config and a file only
/// needs the keys it changes:
///
/// ```json
/// {
///   "session": { "timeout_secs": 3600, "concurrent": false },
///   "eviction_interval_secs": 60
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TollgateConfig {
    pub session: SessionConfig,
    /// How often [`Tollgate::spawn_eviction`](crate::Tollgate::spawn_eviction)
    /// purges expired records. `None` leaves purging to the caller.
    pub eviction_interval_secs: Option<u64>,
    /// `tracing` filter directive used by [`init_tracing`] when
    /// `RUST_LOG` is unset, e.g. `"tollgate=debug"`.
    pub log_filter: Option<String>,
}

impl TollgateConfig {
    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, TollgateError> {
        serde_json::from_str(json).map_err(|e| TollgateError::Config(e.to_string()))
    }

    /// Reads and parses a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TollgateError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TollgateError::Config(format!("{}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn eviction_interval(&self) -> Option<Duration> {
        self.eviction_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// the config's `log_filter` and then to `info`.
///
/// Does nothing if a global subscriber is already set, so it is safe to
/// call from tests and from applications that configure their own.
pub fn init_tracing(config: &TollgateConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_filter.as_deref().unwrap_or("info"))
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TollgateConfig::from_json_str("{}").unwrap();

        assert_eq!(config, TollgateConfig::default());
        assert!(config.session.concurrent);
        assert_eq!(config.eviction_interval(), None);
    }

    #[test]
    fn test_partial_session_section_keeps_other_defaults() {
        let config = TollgateConfig::from_json_str(
            r#"{"session": {"timeout_secs": 60, "concurrent": false},
                "eviction_interval_secs": 5}"#,
        )
        .unwrap();

        assert_eq!(config.session.timeout_secs, Some(60));
        assert!(!config.session.concurrent);
        assert_eq!(
            config.session.default_device,
            SessionConfig::default().default_device
        );
        assert_eq!(config.eviction_interval(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = TollgateConfig::from_json_str("{not json").unwrap_err();

        assert!(matches!(err, TollgateError::Config(_)));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = TollgateConfig::from_json_file("/nonexistent/tollgate.json")
            .unwrap_err();

        assert!(err.to_string().contains("/nonexistent/tollgate.json"));
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        let config = TollgateConfig::default();
        init_tracing(&config);
        init_tracing(&config);
    }
}
