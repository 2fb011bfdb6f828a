use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::DeletePolicy;
use crate::error::AppError;

const DEFAULT_KEY_PREFIX: &str = "portfolio:v1:";
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Where the catalog blobs live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediumKind {
    Memory,
    File { dir: PathBuf },
    Redis { url: String },
}

/// Application configuration loaded explicitly from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub medium: MediumKind,
    /// Prepended to both blob keys.
    pub key_prefix: String,
    /// Root directory for locally-rooted image paths such as `/images/x.jpg`.
    pub public_dir: PathBuf,
    /// When set, locally-rooted image paths are probed over HTTP against this origin.
    pub asset_base_url: Option<String>,
    /// Per-probe timeout. `None` waits indefinitely.
    pub probe_timeout: Option<Duration>,
    pub delete_policy: DeletePolicy,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `CATALOG_MEDIUM`: `file` (default), `memory` or `redis`
    /// - `CATALOG_DATA_DIR`: data directory for the file medium (default `./data`)
    /// - `REDIS_URL`: Redis connection string, required for the redis medium
    /// - `CATALOG_KEY_PREFIX`: key namespace (default `portfolio:v1:`)
    /// - `ASSET_PUBLIC_DIR`: public directory for local images (default `./public`)
    /// - `ASSET_BASE_URL`: origin for probing local images over HTTP
    /// - `ASSET_PROBE_TIMEOUT_MS`: per-probe timeout, `0` disables (default 10000)
    /// - `CATEGORY_DELETE_POLICY`: `keep` (default), `block` or `cascade`
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let medium = match var("CATALOG_MEDIUM").as_deref().unwrap_or("file") {
            "memory" => MediumKind::Memory,
            "file" => MediumKind::File {
                dir: var("CATALOG_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data")),
            },
            "redis" => MediumKind::Redis {
                url: var("REDIS_URL").ok_or_else(|| {
                    AppError::Config(
                        "REDIS_URL environment variable is required when CATALOG_MEDIUM=redis"
                            .to_string(),
                    )
                })?,
            },
            other => {
                return Err(AppError::Config(format!(
                    "unknown CATALOG_MEDIUM '{other}' (expected file, memory or redis)"
                )))
            }
        };

        let probe_timeout_ms = match var("ASSET_PROBE_TIMEOUT_MS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                AppError::Config(format!("ASSET_PROBE_TIMEOUT_MS must be an integer, got '{raw}'"))
            })?,
            None => DEFAULT_PROBE_TIMEOUT_MS,
        };

        let delete_policy = match var("CATEGORY_DELETE_POLICY") {
            Some(raw) => raw.parse()?,
            None => DeletePolicy::default(),
        };

        Ok(Self {
            medium,
            key_prefix: var("CATALOG_KEY_PREFIX").unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            public_dir: var("ASSET_PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./public")),
            asset_base_url: var("ASSET_BASE_URL"),
            probe_timeout: (probe_timeout_ms > 0).then(|| Duration::from_millis(probe_timeout_ms)),
            delete_policy,
        })
    }
}
