//! Configuration options (§6.3)
//!
//! Plain struct loaded from `MEMVAULT_*` environment variables, in the
//! same spirit as the teacher reading `FASTEMBED_CACHE_PATH` and
//! `VESTIGE_ENCRYPTION_KEY` directly via `std::env::var` rather than
//! pulling in a config-loading crate.

use std::time::Duration;

/// Which storage backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    Local,
    Cloud,
    #[default]
    Hybrid,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "cloud" => Ok(StorageBackend::Cloud),
            "hybrid" => Ok(StorageBackend::Hybrid),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

/// Top-level configuration, assembled from environment variables with
/// defaults matching the spec's stated defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub sqlite_busy_timeout_ms: u32,
    pub sqlite_cache_size_kb: i32,

    pub hybrid_sync_interval: Duration,
    pub hybrid_batch_size: usize,
    pub hybrid_queue_size: usize,
    pub hybrid_sync_on_startup: bool,
    pub hybrid_drift_check_interval: Duration,
    pub hybrid_drift_batch_size: usize,

    pub consolidation_enabled: bool,
    pub consolidation_compression_enabled: bool,

    pub quality_boost_enabled: bool,
    pub quality_boost_weight: f32,

    pub consolidation_min_connections_for_boost: usize,
    pub consolidation_quality_boost_factor: f32,

    pub retention_high_min_days: i64,
    pub retention_medium_min_days: i64,
    pub retention_low_min_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::default(),
            sqlite_busy_timeout_ms: 15_000,
            sqlite_cache_size_kb: 64_000,

            hybrid_sync_interval: Duration::from_millis(500),
            hybrid_batch_size: 100,
            hybrid_queue_size: 2_000,
            hybrid_sync_on_startup: true,
            hybrid_drift_check_interval: Duration::from_secs(3_600),
            hybrid_drift_batch_size: 100,

            consolidation_enabled: true,
            consolidation_compression_enabled: true,

            quality_boost_enabled: true,
            quality_boost_weight: 0.3,

            consolidation_min_connections_for_boost: 5,
            consolidation_quality_boost_factor: 1.2,

            retention_high_min_days: 365,
            retention_medium_min_days: 180,
            retention_low_min_days: 30,
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults for anything unset
    /// or unparsable. Never fails: the service should start with sane
    /// defaults rather than refuse to boot over a malformed env var.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("MEMVAULT_STORAGE_BACKEND") {
            if let Ok(parsed) = v.parse() {
                cfg.storage_backend = parsed;
            }
        }
        if let Some(v) = env_u32("MEMVAULT_SQLITE_BUSY_TIMEOUT_MS") {
            cfg.sqlite_busy_timeout_ms = v;
        }
        if let Some(v) = env_i32("MEMVAULT_SQLITE_CACHE_SIZE_KB") {
            cfg.sqlite_cache_size_kb = v;
        }
        if let Some(v) = env_u64("MEMVAULT_HYBRID_SYNC_INTERVAL_MS") {
            cfg.hybrid_sync_interval = Duration::from_millis(v);
        }
        if let Some(v) = env_usize("MEMVAULT_HYBRID_BATCH_SIZE") {
            cfg.hybrid_batch_size = v;
        }
        if let Some(v) = env_usize("MEMVAULT_HYBRID_QUEUE_SIZE") {
            cfg.hybrid_queue_size = v;
        }
        if let Ok(v) = std::env::var("MEMVAULT_HYBRID_SYNC_ON_STARTUP") {
            cfg.hybrid_sync_on_startup = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = env_u64("MEMVAULT_HYBRID_DRIFT_CHECK_INTERVAL") {
            cfg.hybrid_drift_check_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_usize("MEMVAULT_HYBRID_DRIFT_BATCH_SIZE") {
            cfg.hybrid_drift_batch_size = v;
        }
        if let Ok(v) = std::env::var("MEMVAULT_CONSOLIDATION_ENABLED") {
            cfg.consolidation_enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("MEMVAULT_CONSOLIDATION_COMPRESSION_ENABLED") {
            cfg.consolidation_compression_enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("MEMVAULT_QUALITY_BOOST_ENABLED") {
            cfg.quality_boost_enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = env_f32("MEMVAULT_QUALITY_BOOST_WEIGHT") {
            cfg.quality_boost_weight = v;
        }
        if let Some(v) = env_usize("MEMVAULT_CONSOLIDATION_MIN_CONNECTIONS_FOR_BOOST") {
            cfg.consolidation_min_connections_for_boost = v;
        }
        if let Some(v) = env_f32("MEMVAULT_CONSOLIDATION_QUALITY_BOOST_FACTOR") {
            cfg.consolidation_quality_boost_factor = v;
        }
        if let Some(v) = env_i64("MEMVAULT_RETENTION_HIGH_MIN") {
            cfg.retention_high_min_days = v;
        }
        if let Some(v) = env_i64("MEMVAULT_RETENTION_MEDIUM_MIN") {
            cfg.retention_medium_min_days = v;
        }
        if let Some(v) = env_i64("MEMVAULT_RETENTION_LOW_MIN") {
            cfg.retention_low_min_days = v;
        }

        cfg
    }
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
fn env_i32(key: &str) -> Option<i32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
fn env_f32(key: &str) -> Option<f32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.hybrid_batch_size, 100);
        assert_eq!(cfg.hybrid_queue_size, 2_000);
        assert_eq!(cfg.consolidation_quality_boost_factor, 1.2);
        assert_eq!(cfg.consolidation_min_connections_for_boost, 5);
    }

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!(
            "HYBRID".parse::<StorageBackend>().unwrap(),
            StorageBackend::Hybrid
        );
        assert!("bogus".parse::<StorageBackend>().is_err());
    }
}
