//! Typed configuration loading
//!
//! Configuration is resolved once at startup: a TOML file (optional) is
//! loaded first, then environment variables override individual fields, and
//! compiled defaults fill the rest. The resulting [`AppConfig`] is validated
//! once; job code reads plain typed fields and never re-validates.
//!
//! Priority per field: environment variable → TOML → compiled default.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub ingest: IngestConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the service
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5740".to_string(),
        }
    }
}

/// Database location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("ofertafit.db"),
        }
    }
}

/// Price-sync job configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minutes between scheduler-triggered runs
    pub interval_minutes: u64,
    /// Maximum eligible items fetched per batch
    pub batch_size: u32,
    /// Token bucket refill rate
    pub rate_per_minute: u32,
    /// Token bucket capacity (burst allowance)
    pub rate_capacity: u32,
    /// Per-request timeout for marketplace fetches
    pub request_timeout_ms: u64,
    /// TTL of the cross-process run lock; a crashed run's lock expires after
    /// this long
    pub lock_ttl_seconds: i64,
    /// Inter-item jitter window, milliseconds
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    /// Maximum additional batches a single run may process
    pub max_continuations: u32,
    /// Wall-clock budget for a single run
    pub max_runtime_ms: u64,
    /// Shared secret guarding the run-trigger endpoints. `None` disables the
    /// guard (development only).
    pub secret: Option<String>,
    /// Recipients for the post-run summary notification
    pub notify_recipients: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 360,
            batch_size: 200,
            rate_per_minute: 40,
            rate_capacity: 10,
            request_timeout_ms: 8000,
            lock_ttl_seconds: 900,
            jitter_min_ms: 300,
            jitter_max_ms: 500,
            max_continuations: 4,
            max_runtime_ms: 600_000,
            secret: None,
            notify_recipients: Vec::new(),
        }
    }
}

/// Daily intake quota: either a fixed count or an explicit range
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum QuotaConfig {
    Fixed(u32),
    Range { min: u32, max: u32 },
}

/// Catalog-admission pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Per-brand daily admission cap
    pub max_per_brand: u32,
    /// Per-category daily intake quotas (site category slug → quota)
    pub quotas: HashMap<String, QuotaConfig>,
    /// Fallback quota range for categories with no explicit entry
    pub fallback_min: u32,
    pub fallback_max: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_per_brand: 2,
            quotas: HashMap::new(),
            fallback_min: 3,
            fallback_max: 6,
        }
    }
}

/// Default data directory for the platform
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ofertafit"))
        .unwrap_or_else(|| PathBuf::from("./ofertafit_data"))
}

/// Load configuration from an optional TOML file plus environment overrides
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) if p.exists() => {
            let content = std::fs::read_to_string(p)
                .map_err(|e| Error::Config(format!("Read config failed: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Parse config failed: {}", e)))?
        }
        Some(p) => {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
        None => AppConfig::default(),
    };

    // Environment overrides
    if let Ok(addr) = std::env::var("OFERTAFIT_BIND_ADDR") {
        config.server.bind_addr = addr;
    }
    if let Ok(db_path) = std::env::var("OFERTAFIT_DB_PATH") {
        config.database.path = PathBuf::from(db_path);
    }
    if let Ok(secret) = std::env::var("OFERTAFIT_SYNC_SECRET") {
        if !secret.trim().is_empty() {
            config.sync.secret = Some(secret);
        }
    }

    validate(&config)?;
    Ok(config)
}

/// Validate configuration once at startup
fn validate(config: &AppConfig) -> Result<()> {
    let sync = &config.sync;
    if sync.batch_size == 0 {
        return Err(Error::Config("sync.batch_size must be > 0".to_string()));
    }
    if sync.rate_per_minute == 0 || sync.rate_capacity == 0 {
        return Err(Error::Config(
            "sync.rate_per_minute and sync.rate_capacity must be > 0".to_string(),
        ));
    }
    if sync.jitter_min_ms > sync.jitter_max_ms {
        return Err(Error::Config(
            "sync.jitter_min_ms must not exceed sync.jitter_max_ms".to_string(),
        ));
    }
    if sync.lock_ttl_seconds <= 0 {
        return Err(Error::Config("sync.lock_ttl_seconds must be > 0".to_string()));
    }
    for (slug, quota) in &config.ingest.quotas {
        if let QuotaConfig::Range { min, max } = quota {
            if min > max {
                return Err(Error::Config(format!(
                    "ingest.quotas.{}: min exceeds max",
                    slug
                )));
            }
        }
    }
    Ok(())
}
