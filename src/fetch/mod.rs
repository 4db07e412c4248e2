pub(crate) mod client;
pub(crate) mod identity;
pub(crate) mod rate_limit;
pub(crate) mod session;

pub use client::{FetchClient, FetchMetrics};
pub use identity::{Identity, IdentityRotator};
pub use rate_limit::RateLimiter;
pub use session::{Session, SessionStatus};

/// One page to acquire, plus the content markers a healthy body must carry.
#[derive(Debug, Clone)]
pub struct FetchTarget {
    pub url: String,
    pub expected_markers: Vec<String>,
}

impl FetchTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expected_markers: Vec::new(),
        }
    }

    pub fn with_markers(url: impl Into<String>, markers: Vec<String>) -> Self {
        Self {
            url: url.into(),
            expected_markers: markers,
        }
    }
}

/// Why a nominally successful response was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// HTTP 429.
    RateLimited,
    /// HTTP 403.
    Forbidden,
    /// Body matched a soft-block indicator.
    ChallengePage(String),
    /// Body was too short to be a real stats page.
    ShortBody(usize),
    /// Body was missing an expected content marker.
    MissingMarker(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Unexpected HTTP status.
    Status(u16),
    /// Transport-level failure, including timeouts.
    Network(String),
    /// The caller's cancellation signal fired.
    Cancelled,
}

/// Classified result of one fetch. Terminal failures are values, not
/// errors; the caller decides whether to skip, requeue, or abort.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success { body: String, status: u16 },
    SoftBlocked(BlockReason),
    HardFailure(FailureKind),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchOutcome::HardFailure(FailureKind::Cancelled))
    }
}
