use crate::config::AntiDetectionConfig;
use crate::error::Result;
use crate::fetch::identity::Identity;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Healthy,
    Degraded,
    Expired,
}

/// One logical browsing identity: a fingerprint, a cookie jar (held by the
/// reqwest client), and the counters that decide when to throw it away.
/// Owned exclusively by one FetchClient; replaced wholesale on expiry so
/// cookies never leak across identities.
#[derive(Debug)]
pub struct Session {
    identity: Identity,
    client: Client,
    requests_issued: u32,
    created_at: Instant,
    consecutive_failures: u32,
    status: SessionStatus,
}

impl Session {
    pub fn new(config: &AntiDetectionConfig, identity: Identity) -> Result<Self> {
        let client = Self::build_client(config, &identity)?;
        debug!(
            "New session with identity: {}",
            &identity.user_agent[..identity.user_agent.len().min(50)]
        );
        Ok(Self {
            identity,
            client,
            requests_issued: 0,
            created_at: Instant::now(),
            consecutive_failures: 0,
            status: SessionStatus::Healthy,
        })
    }

    fn build_client(config: &AntiDetectionConfig, identity: &Identity) -> Result<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(identity.accept));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(identity.accept_language),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(identity.user_agent));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .cookie_store(true)
            .default_headers(headers)
            .build()?;
        Ok(client)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Swap in a new fingerprint mid-session after a block. The cookie jar
    /// is rebuilt along with the client so the old identity's cookies do
    /// not travel with the new user agent.
    pub fn adopt_identity(&mut self, config: &AntiDetectionConfig, identity: Identity) -> Result<()> {
        self.client = Self::build_client(config, &identity)?;
        self.identity = identity;
        Ok(())
    }

    pub fn record_request(&mut self) {
        self.requests_issued += 1;
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    pub fn requests_issued(&self) -> u32 {
        self.requests_issued
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Re-evaluate the Healthy -> Degraded -> Expired state machine against
    /// the rotation thresholds. Any one threshold expires the session
    /// outright; a session partway toward a threshold is Degraded.
    pub fn refresh_status(&mut self, config: &AntiDetectionConfig) -> SessionStatus {
        let max_age = Duration::from_secs(config.max_session_duration_secs);

        let expired = self.requests_issued >= config.requests_before_rotation
            || self.age() >= max_age
            || self.consecutive_failures >= config.max_consecutive_failures;

        let degraded = self.consecutive_failures > 0
            || self.requests_issued * 4 >= config.requests_before_rotation * 3
            || self.age() * 4 >= max_age * 3;

        self.status = if expired {
            SessionStatus::Expired
        } else if degraded {
            SessionStatus::Degraded
        } else {
            SessionStatus::Healthy
        };
        self.status
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_expired(&mut self, config: &AntiDetectionConfig) -> bool {
        self.refresh_status(config) == SessionStatus::Expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::identity::IdentityRotator;

    fn session() -> (AntiDetectionConfig, Session) {
        let config = AntiDetectionConfig::default();
        let identity = IdentityRotator::new().next();
        let session = Session::new(&config, identity).unwrap();
        (config, session)
    }

    #[test]
    fn fresh_session_is_healthy() {
        let (config, mut session) = session();
        assert_eq!(session.refresh_status(&config), SessionStatus::Healthy);
    }

    #[test]
    fn request_count_expires_session() {
        let (config, mut session) = session();
        for _ in 0..config.requests_before_rotation {
            session.record_request();
        }
        assert!(session.is_expired(&config));
    }

    #[test]
    fn consecutive_failures_expire_session() {
        let (config, mut session) = session();
        for _ in 0..config.max_consecutive_failures {
            session.record_failure();
        }
        assert!(session.is_expired(&config));
    }

    #[test]
    fn single_failure_degrades_but_does_not_expire() {
        let (config, mut session) = session();
        session.record_failure();
        assert_eq!(session.refresh_status(&config), SessionStatus::Degraded);
    }

    #[test]
    fn success_resets_failure_streak() {
        let (config, mut session) = session();
        session.record_failure();
        session.record_success();
        session.record_failure();
        assert_eq!(session.consecutive_failures(), 1);
        assert_ne!(session.refresh_status(&config), SessionStatus::Expired);
    }
}
