//! Configuration management for Slated
//!
//! All settings come from the environment. Required variables fail fast at
//! startup; everything else has a default.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Result, SlatedError};

/// Backing store for the small provisioning key-value state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateStoreKind {
    /// Single JSON file on the local filesystem
    Local,
}

/// Process configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the agent service (`FOUNDRY_PROJECT_ENDPOINT`)
    pub project_endpoint: String,
    /// API version appended as a query parameter to every call
    pub api_version: String,
    /// Model deployment embedded in each response request
    pub model_deployment_name: String,
    /// Per-call HTTP timeout, clamped to 10..600 seconds
    pub http_timeout: Duration,
    /// Directory scanned for seed files at boot
    pub seed_data_dir: PathBuf,
    pub state_store: StateStoreKind,
    /// Path of the JSON state file for the local state store
    pub state_local_path: PathBuf,
    /// Root directory for per-job artifacts
    pub job_data_dir: PathBuf,
    /// Gate for the result.html download endpoint
    pub allow_html_download: bool,
    /// Optional shared secret required by the download endpoint
    pub html_download_api_key: Option<String>,
    pub cors_allowed_origins: Vec<String>,
}

const DEFAULT_API_VERSION: &str = "2025-11-15-preview";
const DEFAULT_TIMEOUT_SECS: u64 = 600;
const MIN_TIMEOUT_SECS: u64 = 10;
const MAX_TIMEOUT_SECS: u64 = 600;

fn required(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SlatedError::Config(format!("{} must be set", name)))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self> {
        let project_endpoint = required("FOUNDRY_PROJECT_ENDPOINT")?;
        let model_deployment_name = required("MODEL_DEPLOYMENT_NAME")?;

        let api_version =
            optional("FOUNDRY_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let timeout_secs = match optional("FOUNDRY_HTTP_TIMEOUT_SECONDS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    SlatedError::Config(format!(
                        "FOUNDRY_HTTP_TIMEOUT_SECONDS must be an integer, got {:?}",
                        raw
                    ))
                })?;
                let clamped = secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
                if clamped != secs {
                    tracing::warn!(
                        "FOUNDRY_HTTP_TIMEOUT_SECONDS {} outside {}..{}, clamped to {}",
                        secs,
                        MIN_TIMEOUT_SECS,
                        MAX_TIMEOUT_SECS,
                        clamped
                    );
                }
                clamped
            }
            None => DEFAULT_TIMEOUT_SECS,
        };

        let state_store = match optional("STATE_STORE").as_deref() {
            None | Some("local") => StateStoreKind::Local,
            Some(other) => {
                return Err(SlatedError::Config(format!(
                    "Unsupported STATE_STORE: {}",
                    other
                )))
            }
        };

        let cors_allowed_origins = optional("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            project_endpoint,
            api_version,
            model_deployment_name,
            http_timeout: Duration::from_secs(timeout_secs),
            seed_data_dir: PathBuf::from(
                optional("SEED_DATA_DIR").unwrap_or_else(|| "seed-data".to_string()),
            ),
            state_store,
            state_local_path: PathBuf::from(
                optional("STATE_LOCAL_PATH").unwrap_or_else(|| "data/state.json".to_string()),
            ),
            job_data_dir: PathBuf::from(
                optional("JOB_DATA_DIR").unwrap_or_else(|| "data/jobs".to_string()),
            ),
            allow_html_download: optional("ALLOW_HTML_DOWNLOAD")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            html_download_api_key: optional("HTML_DOWNLOAD_API_KEY"),
            cors_allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to prevent concurrent env var modifications
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_vars<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap();

        let originals: Vec<_> = vars
            .iter()
            .map(|(k, _)| (*k, std::env::var(k).ok()))
            .collect();

        for (key, value) in vars {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }

        let result = f();

        for (key, original) in originals {
            match original {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }

        result
    }

    const BASE: &[(&str, Option<&str>)] = &[
        ("FOUNDRY_PROJECT_ENDPOINT", Some("https://proj.example.com")),
        ("MODEL_DEPLOYMENT_NAME", Some("gpt-test")),
        ("FOUNDRY_API_VERSION", None),
        ("FOUNDRY_HTTP_TIMEOUT_SECONDS", None),
        ("SEED_DATA_DIR", None),
        ("STATE_STORE", None),
        ("STATE_LOCAL_PATH", None),
        ("JOB_DATA_DIR", None),
        ("ALLOW_HTML_DOWNLOAD", None),
        ("HTML_DOWNLOAD_API_KEY", None),
        ("CORS_ALLOWED_ORIGINS", None),
    ];

    #[test]
    fn test_defaults() {
        with_env_vars(BASE, || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.api_version, "2025-11-15-preview");
            assert_eq!(config.http_timeout, Duration::from_secs(600));
            assert_eq!(config.seed_data_dir, PathBuf::from("seed-data"));
            assert_eq!(config.state_local_path, PathBuf::from("data/state.json"));
            assert_eq!(config.job_data_dir, PathBuf::from("data/jobs"));
            assert!(!config.allow_html_download);
            assert_eq!(config.cors_allowed_origins, vec!["http://localhost:5173"]);
        });
    }

    #[test]
    fn test_missing_endpoint_fails() {
        let mut vars = BASE.to_vec();
        vars[0] = ("FOUNDRY_PROJECT_ENDPOINT", None);
        with_env_vars(&vars, || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn test_timeout_clamped() {
        let mut vars = BASE.to_vec();
        vars[3] = ("FOUNDRY_HTTP_TIMEOUT_SECONDS", Some("5"));
        with_env_vars(&vars, || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.http_timeout, Duration::from_secs(10));
        });

        let mut vars = BASE.to_vec();
        vars[3] = ("FOUNDRY_HTTP_TIMEOUT_SECONDS", Some("1200"));
        with_env_vars(&vars, || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.http_timeout, Duration::from_secs(600));
        });
    }

    #[test]
    fn test_cors_origin_list() {
        let mut vars = BASE.to_vec();
        vars[10] = (
            "CORS_ALLOWED_ORIGINS",
            Some("http://a.test, http://b.test ,"),
        );
        with_env_vars(&vars, || {
            let config = Config::from_env().unwrap();
            assert_eq!(
                config.cors_allowed_origins,
                vec!["http://a.test", "http://b.test"]
            );
        });
    }

    #[test]
    fn test_unknown_state_store_rejected() {
        let mut vars = BASE.to_vec();
        vars[5] = ("STATE_STORE", Some("cosmos"));
        with_env_vars(&vars, || {
            assert!(Config::from_env().is_err());
        });
    }
}
