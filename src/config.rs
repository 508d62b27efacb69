//! Loader Configuration
//!
//! Environment variables (optionally from `.env`):
//!   INDYKITE_HOST  - Capture API host (default: https://api.indykite.com)
//!   INDYKITE_TOKEN - Client key sent as X-IK-ClientKey (required)
//!   BATCH_SIZE     - Items per batch (default: 250)
//!   MAX_THREADS    - Concurrent batch workers (default: 6)
//!   DEBUG_MODE     - "true" to log payloads without sending (default: false)
//!   SSL_VERIFY     - "false" to skip TLS certificate checks (default: true)
//!   CSV_FILE_PATH  - Default CSV input (default: emissions_data.csv)

use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "https://api.indykite.com";
pub const DEFAULT_BATCH_SIZE: usize = 250;
pub const DEFAULT_MAX_CONCURRENCY: usize = 6;
pub const DEFAULT_CSV_PATH: &str = "emissions_data.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidValue { var: &'static str, value: String },
    InputNotFound(PathBuf),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVar(var) => write!(
                f,
                "missing required environment variable: {} (update your .env file)",
                var
            ),
            Self::InvalidValue { var, value } => {
                write!(f, "invalid value for {}: '{}'", var, value)
            }
            Self::InputNotFound(path) => write!(f, "input file not found: {}", path.display()),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Resolved settings for one run, built once at the binary boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub host: String,
    pub token: String,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub dry_run: bool,
    pub verify_tls: bool,
    pub csv_path: PathBuf,
}

impl CaptureConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Endpoint settings only; batch variables are ignored and left at
    /// their defaults. Used by the single-request replay tool.
    pub fn endpoint_from_env() -> Result<Self, ConfigError> {
        Self::endpoint_from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::endpoint_from_lookup(&lookup)?;
        config.batch_size = positive(&lookup, "BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        config.max_concurrency = positive(&lookup, "MAX_THREADS", DEFAULT_MAX_CONCURRENCY)?;
        Ok(config)
    }

    pub fn endpoint_from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("INDYKITE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        if host.trim().is_empty() {
            return Err(ConfigError::MissingVar("INDYKITE_HOST"));
        }

        let token = lookup("INDYKITE_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("INDYKITE_TOKEN"))?;

        let dry_run = lookup("DEBUG_MODE")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let verify_tls = lookup("SSL_VERIFY")
            .map(|v| !v.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        let csv_path = lookup("CSV_FILE_PATH")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CSV_PATH.to_string())
            .into();

        Ok(Self {
            host: host.trim().to_string(),
            token,
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            dry_run,
            verify_tls,
            csv_path,
        })
    }

    /// Apply per-invocation overrides. Zero is rejected.
    pub fn with_overrides(
        mut self,
        batch_size: Option<usize>,
        max_concurrency: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if let Some(n) = batch_size {
            if n == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "--batch-size",
                    value: n.to_string(),
                });
            }
            self.batch_size = n;
        }
        if let Some(n) = max_concurrency {
            if n == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "--max-threads",
                    value: n.to_string(),
                });
            }
            self.max_concurrency = n;
        }
        Ok(self)
    }

    /// The CSV to load: the explicit path when given, else the configured
    /// default. Must exist.
    pub fn resolve_input(&self, explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let path = explicit.unwrap_or(self.csv_path.as_path()).to_path_buf();
        if !path.exists() {
            return Err(ConfigError::InputNotFound(path));
        }
        Ok(path)
    }
}

fn positive<F>(lookup: &F, var: &'static str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidValue { var, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<CaptureConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CaptureConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("INDYKITE_TOKEN", "tok")]).unwrap();
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.batch_size, 250);
        assert_eq!(cfg.max_concurrency, 6);
        assert!(!cfg.dry_run);
        assert!(cfg.verify_tls);
        assert_eq!(cfg.csv_path, PathBuf::from("emissions_data.csv"));
    }

    #[test]
    fn test_missing_token_fails_fast() {
        assert_eq!(
            config(&[]).unwrap_err(),
            ConfigError::MissingVar("INDYKITE_TOKEN")
        );
        assert_eq!(
            config(&[("INDYKITE_TOKEN", "  ")]).unwrap_err(),
            ConfigError::MissingVar("INDYKITE_TOKEN")
        );
        assert_eq!(
            config(&[("INDYKITE_TOKEN", "t"), ("INDYKITE_HOST", "")]).unwrap_err(),
            ConfigError::MissingVar("INDYKITE_HOST")
        );
    }

    #[test]
    fn test_env_values_and_flags() {
        let cfg = config(&[
            ("INDYKITE_TOKEN", "t"),
            ("INDYKITE_HOST", "http://localhost:8080"),
            ("BATCH_SIZE", "10"),
            ("MAX_THREADS", "2"),
            ("DEBUG_MODE", "TRUE"),
            ("SSL_VERIFY", "false"),
        ])
        .unwrap();
        assert_eq!(cfg.host, "http://localhost:8080");
        assert_eq!((cfg.batch_size, cfg.max_concurrency), (10, 2));
        assert!(cfg.dry_run);
        assert!(!cfg.verify_tls);
    }

    #[test]
    fn test_bad_numbers_rejected() {
        let err = config(&[("INDYKITE_TOKEN", "t"), ("BATCH_SIZE", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "BATCH_SIZE", .. }));
        assert!(config(&[("INDYKITE_TOKEN", "t"), ("MAX_THREADS", "0")]).is_err());
    }

    #[test]
    fn test_endpoint_config_ignores_batch_settings() {
        let vars: HashMap<&str, &str> = [
            ("INDYKITE_TOKEN", "t"),
            ("BATCH_SIZE", "lots"),
            ("MAX_THREADS", "0"),
            ("SSL_VERIFY", "false"),
        ]
        .into_iter()
        .collect();
        let cfg =
            CaptureConfig::endpoint_from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!((cfg.batch_size, cfg.max_concurrency), (250, 6));
        assert!(!cfg.verify_tls);
        assert_eq!(
            CaptureConfig::endpoint_from_lookup(|_| None).unwrap_err(),
            ConfigError::MissingVar("INDYKITE_TOKEN")
        );
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[("INDYKITE_TOKEN", "t")])
            .unwrap()
            .with_overrides(Some(50), None)
            .unwrap();
        assert_eq!((cfg.batch_size, cfg.max_concurrency), (50, 6));
        assert!(cfg.clone().with_overrides(None, Some(0)).is_err());
    }

    #[test]
    fn test_resolve_input() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("data.csv");
        std::fs::write(&present, "h\n").unwrap();
        let cfg = config(&[("INDYKITE_TOKEN", "t")]).unwrap();

        assert_eq!(cfg.resolve_input(Some(present.as_path())).unwrap(), present);
        let missing = dir.path().join("nope.csv");
        assert_eq!(
            cfg.resolve_input(Some(missing.as_path())).unwrap_err(),
            ConfigError::InputNotFound(missing)
        );
    }
}
