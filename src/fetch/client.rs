use crate::config::AntiDetectionConfig;
use crate::error::Result;
use crate::fetch::identity::IdentityRotator;
use crate::fetch::rate_limit::RateLimiter;
use crate::fetch::session::Session;
use crate::fetch::{BlockReason, FailureKind, FetchOutcome, FetchTarget};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Running totals for one client, surfaced for batch diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limit_violations: u64,
    pub sessions_rotated: u64,
}

/// One logical "get page" operation: rate limiting, session rotation,
/// retry with identity rotation on soft blocks, exponential backoff on
/// hard failures. Owns its RateLimiter and Session exclusively; never
/// shared across workers.
pub struct FetchClient {
    config: AntiDetectionConfig,
    rate_limiter: RateLimiter,
    rotator: IdentityRotator,
    session: Session,
    metrics: FetchMetrics,
}

impl FetchClient {
    pub fn new(config: AntiDetectionConfig) -> Result<Self> {
        let mut rotator = IdentityRotator::new();
        let session = Session::new(&config, rotator.next())?;
        Ok(Self {
            rate_limiter: RateLimiter::new(&config),
            rotator,
            session,
            metrics: FetchMetrics::default(),
            config,
        })
    }

    pub fn metrics(&self) -> FetchMetrics {
        self.metrics
    }

    /// Fetch one page, retrying internally up to `max_retries` attempts.
    /// Always resolves to an outcome; a single page failure is never a
    /// process error. Cancellation is checked before every sleep and every
    /// retry iteration.
    pub async fn fetch(&mut self, target: &FetchTarget, cancel: &CancellationToken) -> FetchOutcome {
        let mut last_outcome = FetchOutcome::HardFailure(FailureKind::Network(
            "no attempts made".to_string(),
        ));

        for attempt in 0..self.config.max_retries {
            if cancel.is_cancelled() {
                return FetchOutcome::HardFailure(FailureKind::Cancelled);
            }

            // Rotation happens here, between requests, never mid-request.
            if self.session.is_expired(&self.config) {
                if let Err(e) = self.rotate_session() {
                    return FetchOutcome::HardFailure(FailureKind::Network(e.to_string()));
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return FetchOutcome::HardFailure(FailureKind::Cancelled);
                }
                _ = self.rate_limiter.wait() => {}
            }

            let outcome = self.attempt(target).await;
            match &outcome {
                FetchOutcome::Success { .. } => {
                    self.metrics.successful_requests += 1;
                    self.rate_limiter.record_success();
                    self.session.record_success();
                    return outcome;
                }
                FetchOutcome::SoftBlocked(reason) => {
                    self.metrics.failed_requests += 1;
                    if *reason == BlockReason::RateLimited {
                        self.metrics.rate_limit_violations += 1;
                    }
                    self.rate_limiter.record_failure();
                    self.session.record_failure();
                    warn!(
                        "Soft block ({:?}) on attempt {} for {}",
                        reason,
                        attempt + 1,
                        target.url
                    );

                    // Burned fingerprint: swap identity before the next try.
                    let identity = self.rotator.rotate_blocked();
                    if let Err(e) = self.session.adopt_identity(&self.config, identity) {
                        return FetchOutcome::HardFailure(FailureKind::Network(e.to_string()));
                    }

                    let penalty = self.penalty_delay(reason, attempt);
                    if !self.sleep_cancellable(penalty, cancel).await {
                        return FetchOutcome::HardFailure(FailureKind::Cancelled);
                    }
                }
                FetchOutcome::HardFailure(kind) => {
                    self.metrics.failed_requests += 1;
                    self.rate_limiter.record_failure();
                    self.session.record_failure();
                    warn!(
                        "Hard failure ({:?}) on attempt {} for {}",
                        kind,
                        attempt + 1,
                        target.url
                    );

                    let backoff = Duration::from_secs(
                        self.config.retry_delay_base_secs * 2u64.pow(attempt),
                    );
                    if !self.sleep_cancellable(backoff, cancel).await {
                        return FetchOutcome::HardFailure(FailureKind::Cancelled);
                    }
                }
            }
            last_outcome = outcome;
        }

        info!(
            "Exhausted {} attempts for {}",
            self.config.max_retries, target.url
        );
        last_outcome
    }

    async fn attempt(&mut self, target: &FetchTarget) -> FetchOutcome {
        self.metrics.total_requests += 1;
        self.session.record_request();

        debug!("GET {}", target.url);
        let response = match self.session.client().get(&target.url).send().await {
            Ok(r) => r,
            Err(e) => return FetchOutcome::HardFailure(FailureKind::Network(e.to_string())),
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return FetchOutcome::HardFailure(FailureKind::Network(e.to_string())),
        };

        classify_response(status, body, target, &self.config)
    }

    fn penalty_delay(&self, reason: &BlockReason, attempt: u32) -> Duration {
        let multiplier = match reason {
            BlockReason::RateLimited => self.config.rate_limit_wait_multiplier,
            BlockReason::Forbidden => self.config.forbidden_wait_multiplier,
            _ => self.config.soft_block_wait_multiplier,
        };
        Duration::from_secs(multiplier * u64::from(attempt + 1))
    }

    fn rotate_session(&mut self) -> Result<()> {
        self.rotator.reset_session();
        self.session = Session::new(&self.config, self.rotator.next())?;
        self.metrics.sessions_rotated += 1;
        info!(
            "Rotated session (total rotations: {})",
            self.metrics.sessions_rotated
        );
        Ok(())
    }

    /// Sleep that aborts promptly on cancellation. Returns false if the
    /// token fired before the sleep completed.
    async fn sleep_cancellable(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        if duration.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

/// Classify a raw response into the fetch outcome taxonomy. Pure so the
/// block heuristics can be tested without a network.
fn classify_response(
    status: u16,
    body: String,
    target: &FetchTarget,
    config: &AntiDetectionConfig,
) -> FetchOutcome {
    match status {
        429 => return FetchOutcome::SoftBlocked(BlockReason::RateLimited),
        403 => return FetchOutcome::SoftBlocked(BlockReason::Forbidden),
        200 => {}
        s => return FetchOutcome::HardFailure(FailureKind::Status(s)),
    }

    let lowered = body.to_lowercase();
    for indicator in &config.soft_block_indicators {
        if lowered.contains(&indicator.to_lowercase()) {
            return FetchOutcome::SoftBlocked(BlockReason::ChallengePage(indicator.clone()));
        }
    }

    if body.len() < config.min_response_length {
        return FetchOutcome::SoftBlocked(BlockReason::ShortBody(body.len()));
    }

    for marker in &target.expected_markers {
        if !lowered.contains(&marker.to_lowercase()) {
            return FetchOutcome::SoftBlocked(BlockReason::MissingMarker(marker.clone()));
        }
    }

    FetchOutcome::Success { body, status }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AntiDetectionConfig {
        AntiDetectionConfig::default()
    }

    fn target() -> FetchTarget {
        FetchTarget::new("https://example.test/players/B/BurrJo01/splits/2024/")
    }

    fn long_body(seed: &str) -> String {
        let mut body = String::from(seed);
        while body.len() < 2000 {
            body.push_str("<tr><td>8</td><td>5</td><td>3</td></tr>");
        }
        body
    }

    #[test]
    fn challenge_page_with_status_200_is_soft_blocked() {
        let body = long_body("<html>please complete the security check</html>");
        let outcome = classify_response(200, body, &target(), &config());
        assert!(matches!(
            outcome,
            FetchOutcome::SoftBlocked(BlockReason::ChallengePage(_))
        ));
    }

    #[test]
    fn short_body_with_status_200_is_soft_blocked() {
        let body = "<html>ok</html>".repeat(10);
        assert!(body.len() < 1000);
        let outcome = classify_response(200, body.clone(), &target(), &config());
        assert_eq!(
            match outcome {
                FetchOutcome::SoftBlocked(BlockReason::ShortBody(len)) => len,
                other => panic!("expected short-body block, got {:?}", other),
            },
            body.len()
        );
    }

    #[test]
    fn status_codes_map_to_block_reasons() {
        let cfg = config();
        assert!(matches!(
            classify_response(429, String::new(), &target(), &cfg),
            FetchOutcome::SoftBlocked(BlockReason::RateLimited)
        ));
        assert!(matches!(
            classify_response(403, String::new(), &target(), &cfg),
            FetchOutcome::SoftBlocked(BlockReason::Forbidden)
        ));
        assert!(matches!(
            classify_response(503, String::new(), &target(), &cfg),
            FetchOutcome::HardFailure(FailureKind::Status(503))
        ));
        assert!(matches!(
            classify_response(404, String::new(), &target(), &cfg),
            FetchOutcome::HardFailure(FailureKind::Status(404))
        ));
    }

    #[test]
    fn healthy_body_is_success() {
        let body = long_body("<html><table id=\"stats\"></table></html>");
        let outcome = classify_response(200, body, &target(), &config());
        assert!(outcome.is_success());
    }

    #[test]
    fn missing_expected_marker_is_soft_blocked() {
        let t = FetchTarget::with_markers(
            "https://example.test/x",
            vec!["advanced_splits".to_string()],
        );
        let body = long_body("<html><p>nothing useful here</p></html>");
        let outcome = classify_response(200, body, &t, &config());
        assert!(matches!(
            outcome,
            FetchOutcome::SoftBlocked(BlockReason::MissingMarker(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_fetch_returns_promptly() {
        let mut client = FetchClient::new(config()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = client.fetch(&target(), &cancel).await;
        assert!(outcome.is_cancelled());
    }
}
