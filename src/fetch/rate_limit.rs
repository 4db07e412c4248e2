use crate::config::AntiDetectionConfig;
use std::time::{Duration, Instant};
use tracing::debug;

/// Per-worker pacing state. Each worker owns exactly one of these; the
/// state is never shared, so no locking is needed.
#[derive(Debug)]
pub struct RateLimiter {
    base_delay_min: f64,
    base_delay_max: f64,
    max_delay: f64,
    backoff_cap: u32,
    backoff_multiplier: u32,
    last_request_at: Option<Instant>,
}

impl RateLimiter {
    pub fn new(config: &AntiDetectionConfig) -> Self {
        Self {
            base_delay_min: config.base_delay_min,
            base_delay_max: config.base_delay_max,
            max_delay: config.max_delay,
            backoff_cap: config.backoff_cap,
            backoff_multiplier: 1,
            last_request_at: None,
        }
    }

    /// Remaining time to sleep before the next request may go out. Zero if
    /// enough time has already passed naturally (extraction work between
    /// requests counts toward the delay).
    pub fn pending_delay(&self) -> Duration {
        let delay = self.current_delay();
        match self.last_request_at {
            Some(at) => delay.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Full inter-request delay under the current backoff level.
    pub fn current_delay(&self) -> Duration {
        let jittered = self.base_delay_min
            + fastrand::f64() * (self.base_delay_max - self.base_delay_min).max(0.0);
        let backed_off = jittered * f64::from(self.backoff_multiplier);
        Duration::from_secs_f64(backed_off.min(self.max_delay))
    }

    /// Block until at least the computed delay has elapsed since the last
    /// request, then stamp the request time.
    pub async fn wait(&mut self) {
        let pending = self.pending_delay();
        if !pending.is_zero() {
            debug!("Rate limiting: sleeping for {:.2}s", pending.as_secs_f64());
            tokio::time::sleep(pending).await;
        }
        self.last_request_at = Some(Instant::now());
    }

    pub fn record_failure(&mut self) {
        self.backoff_multiplier = (self.backoff_multiplier * 2).min(self.backoff_cap);
    }

    pub fn record_success(&mut self) {
        self.backoff_multiplier = 1;
    }

    pub fn backoff_multiplier(&self) -> u32 {
        self.backoff_multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(&AntiDetectionConfig::default())
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut rl = limiter();
        assert_eq!(rl.backoff_multiplier(), 1);
        rl.record_failure();
        assert_eq!(rl.backoff_multiplier(), 2);
        rl.record_failure();
        assert_eq!(rl.backoff_multiplier(), 4);
        rl.record_failure();
        assert_eq!(rl.backoff_multiplier(), 4);
    }

    #[test]
    fn backoff_delay_is_monotonic_until_cap() {
        let mut rl = limiter();
        let mut floors = Vec::new();
        for _ in 0..4 {
            // The jittered delay is bounded below by base_min * multiplier
            // (capped at max_delay), so track that floor.
            let floor = (rl.base_delay_min * f64::from(rl.backoff_multiplier())).min(rl.max_delay);
            floors.push(floor);
            rl.record_failure();
        }
        for pair in floors.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn success_resets_backoff_to_baseline() {
        let mut rl = limiter();
        rl.record_failure();
        rl.record_failure();
        rl.record_failure();
        assert_eq!(rl.backoff_multiplier(), 4);
        rl.record_success();
        assert_eq!(rl.backoff_multiplier(), 1);
    }

    #[test]
    fn no_pending_delay_before_first_request() {
        let rl = limiter();
        assert_eq!(rl.pending_delay(), Duration::ZERO);
    }

    #[test]
    fn pending_delay_never_exceeds_full_delay() {
        let mut rl = limiter();
        rl.last_request_at = Some(Instant::now());
        // Jitter varies between calls, so compare against the max bound.
        assert!(rl.pending_delay() <= Duration::from_secs_f64(rl.max_delay));
    }

    #[test]
    fn delay_respects_max_cap() {
        let mut rl = limiter();
        for _ in 0..10 {
            rl.record_failure();
        }
        assert!(rl.current_delay() <= Duration::from_secs_f64(rl.max_delay));
    }
}
