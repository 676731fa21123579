//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Hard limit for one pipeline run, from download to final status
    pub job_timeout: Duration,
    /// Limit for a single ffmpeg invocation
    pub ffmpeg_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Parent of the per-job scratch directories
    pub work_dir: PathBuf,
    /// How often the worker should scan for orphaned pending jobs
    pub claim_interval: Duration,
    /// Minimum idle time before a pending job can be claimed (crash recovery)
    pub claim_min_idle: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(3600), // 1 hour
            ffmpeg_timeout: Duration::from_secs(1800),
            shutdown_timeout: Duration::from_secs(30),
            work_dir: PathBuf::from("/tmp/stash"),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300), // 5 minutes
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env_parse::<u64>(key)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_parse::<usize>("WORKER_MAX_JOBS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            job_timeout: env_secs("WORKER_JOB_TIMEOUT", defaults.job_timeout),
            ffmpeg_timeout: env_secs("WORKER_FFMPEG_TIMEOUT", defaults.ffmpeg_timeout),
            shutdown_timeout: env_secs("WORKER_SHUTDOWN_TIMEOUT", defaults.shutdown_timeout),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            claim_interval: env_secs("WORKER_CLAIM_INTERVAL_SECS", defaults.claim_interval),
            claim_min_idle: env_secs("WORKER_CLAIM_MIN_IDLE_SECS", defaults.claim_min_idle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "WORKER_MAX_JOBS",
        "WORKER_JOB_TIMEOUT",
        "WORKER_FFMPEG_TIMEOUT",
        "WORKER_SHUTDOWN_TIMEOUT",
        "WORKER_WORK_DIR",
        "WORKER_CLAIM_INTERVAL_SECS",
        "WORKER_CLAIM_MIN_IDLE_SECS",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = WorkerConfig::from_env();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.job_timeout, Duration::from_secs(3600));
        assert_eq!(config.ffmpeg_timeout, Duration::from_secs(1800));
        assert_eq!(config.work_dir, PathBuf::from("/tmp/stash"));
        assert_eq!(config.claim_min_idle, Duration::from_secs(300));
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        std::env::set_var("WORKER_MAX_JOBS", "8");
        std::env::set_var("WORKER_JOB_TIMEOUT", "120");
        std::env::set_var("WORKER_WORK_DIR", "/var/lib/stash");
        let config = WorkerConfig::from_env();
        assert_eq!(config.max_concurrent_jobs, 8);
        assert_eq!(config.job_timeout, Duration::from_secs(120));
        assert_eq!(config.work_dir, PathBuf::from("/var/lib/stash"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_or_garbage_falls_back() {
        clear_env();
        std::env::set_var("WORKER_MAX_JOBS", "0");
        std::env::set_var("WORKER_FFMPEG_TIMEOUT", "soon");
        let config = WorkerConfig::from_env();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.ffmpeg_timeout, Duration::from_secs(1800));
        clear_env();
    }
}
