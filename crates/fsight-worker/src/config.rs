//! Worker configuration.

use std::time::Duration;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs this process will run concurrently
    pub local_ceiling: usize,
    /// Maximum jobs concurrently in flight to the analysis service
    pub downstream_ceiling: usize,
    /// Attempts before a job is abandoned permanently
    pub max_attempts: u32,
    /// Sleep between queue polls when no job is ready
    pub idle_poll_interval: Duration,
    /// Base delay for the retry backoff
    pub retry_base_delay: Duration,
    /// Cap on the retry backoff
    pub retry_max_delay: Duration,
    /// Consecutive downstream failures before the breaker opens
    pub breaker_failure_threshold: u32,
    /// How long the breaker stays open before letting a probe through
    pub breaker_cooldown: Duration,
    /// Minimum per-submit timeout
    pub submit_timeout_floor: Duration,
    /// Maximum per-submit timeout
    pub submit_timeout_ceiling: Duration,
    /// Assumed transfer rate used to scale timeouts with payload size
    pub submit_bytes_per_sec: u64,
    /// How long shutdown waits for in-flight jobs
    pub shutdown_timeout: Duration,
    /// Interval of the maintenance tick (status eviction, gauges)
    pub maintenance_interval: Duration,
    /// How long terminal transfer-status entries are retained
    pub status_ttl: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            local_ceiling: 4,
            downstream_ceiling: 2,
            max_attempts: 3,
            idle_poll_interval: Duration::from_millis(500),
            retry_base_delay: Duration::from_secs(2),
            retry_max_delay: Duration::from_secs(60),
            breaker_failure_threshold: 3,
            breaker_cooldown: Duration::from_secs(60),
            submit_timeout_floor: Duration::from_secs(10),
            submit_timeout_ceiling: Duration::from_secs(120),
            submit_bytes_per_sec: 512 * 1024,
            shutdown_timeout: Duration::from_secs(30),
            maintenance_interval: Duration::from_secs(30),
            status_ttl: Duration::from_secs(3600),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            local_ceiling: env_usize("WORKER_LOCAL_CEILING", defaults.local_ceiling),
            downstream_ceiling: env_usize("WORKER_DOWNSTREAM_CEILING", defaults.downstream_ceiling),
            max_attempts: env_u32("WORKER_MAX_ATTEMPTS", defaults.max_attempts),
            idle_poll_interval: Duration::from_millis(env_u64("WORKER_IDLE_POLL_MS", 500)),
            retry_base_delay: Duration::from_secs(env_u64("WORKER_RETRY_BASE_SECS", 2)),
            retry_max_delay: Duration::from_secs(env_u64("WORKER_RETRY_MAX_SECS", 60)),
            breaker_failure_threshold: env_u32(
                "BREAKER_FAILURE_THRESHOLD",
                defaults.breaker_failure_threshold,
            ),
            breaker_cooldown: Duration::from_secs(env_u64("BREAKER_COOLDOWN_SECS", 60)),
            submit_timeout_floor: Duration::from_secs(env_u64("SUBMIT_TIMEOUT_FLOOR_SECS", 10)),
            submit_timeout_ceiling: Duration::from_secs(env_u64("SUBMIT_TIMEOUT_CEILING_SECS", 120)),
            submit_bytes_per_sec: env_u64("SUBMIT_BYTES_PER_SEC", defaults.submit_bytes_per_sec),
            shutdown_timeout: Duration::from_secs(env_u64("WORKER_SHUTDOWN_TIMEOUT", 30)),
            maintenance_interval: Duration::from_secs(env_u64("WORKER_MAINTENANCE_SECS", 30)),
            status_ttl: Duration::from_secs(env_u64("WORKER_STATUS_TTL_SECS", 3600)),
        }
    }

    /// Per-submit timeout, scaled with payload size.
    ///
    /// Large blobs get proportionally more time so legitimately slow
    /// transfers are not killed, while the ceiling still bounds the worst
    /// case.
    pub fn submit_timeout_for(&self, payload_bytes: u64) -> Duration {
        let rate = self.submit_bytes_per_sec.max(1);
        let transfer = Duration::from_secs(payload_bytes / rate);
        (self.submit_timeout_floor + transfer).min(self.submit_timeout_ceiling)
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_timeout_scales_with_size() {
        let config = WorkerConfig::default();

        // Tiny payloads stay at the floor.
        assert_eq!(config.submit_timeout_for(0), config.submit_timeout_floor);
        assert_eq!(config.submit_timeout_for(1024), config.submit_timeout_floor);

        // 10 MiB at 512 KiB/s adds 20 seconds.
        let ten_mib = 10 * 1024 * 1024;
        assert_eq!(
            config.submit_timeout_for(ten_mib),
            config.submit_timeout_floor + Duration::from_secs(20)
        );

        // Huge payloads are capped at the ceiling.
        assert_eq!(
            config.submit_timeout_for(u64::MAX / 2),
            config.submit_timeout_ceiling
        );
    }
}
