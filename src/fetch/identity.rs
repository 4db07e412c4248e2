use std::collections::HashSet;

/// A browser-consistent fingerprint: the user agent, the accept headers
/// that browser family actually sends, and viewport/timezone values drawn
/// from common desktop configurations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: &'static str,
    pub accept: &'static str,
    pub accept_language: &'static str,
    pub viewport: (u32, u32),
    pub timezone_offset_minutes: i32,
}

const CHROME_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const FIREFOX_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const SAFARI_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Curated pool of real desktop identities. Each entry keeps the accept
/// header consistent with its user agent so the fingerprint holds together
/// under inspection.
static IDENTITY_POOL: &[Identity] = &[
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        accept: CHROME_ACCEPT,
        accept_language: "en-US,en;q=0.9",
        viewport: (1920, 937),
        timezone_offset_minutes: -300,
    },
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        accept: CHROME_ACCEPT,
        accept_language: "en-US,en;q=0.9,es;q=0.8",
        viewport: (1366, 625),
        timezone_offset_minutes: -240,
    },
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        accept: CHROME_ACCEPT,
        accept_language: "en-US,en;q=0.9",
        viewport: (1536, 722),
        timezone_offset_minutes: -480,
    },
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
        accept: FIREFOX_ACCEPT,
        accept_language: "en-US,en;q=0.9",
        viewport: (1440, 789),
        timezone_offset_minutes: -360,
    },
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        accept: FIREFOX_ACCEPT,
        accept_language: "en-US,en;q=0.9,fr;q=0.8",
        viewport: (1600, 789),
        timezone_offset_minutes: -300,
    },
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:122.0) Gecko/20100101 Firefox/122.0",
        accept: FIREFOX_ACCEPT,
        accept_language: "en-US,en;q=0.9",
        viewport: (2560, 1313),
        timezone_offset_minutes: -420,
    },
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
        accept: SAFARI_ACCEPT,
        accept_language: "en-US,en;q=0.9",
        viewport: (1440, 789),
        timezone_offset_minutes: -300,
    },
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        accept: SAFARI_ACCEPT,
        accept_language: "en-US,en;q=0.9,de;q=0.8",
        viewport: (1280, 617),
        timezone_offset_minutes: -240,
    },
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36 Edg/121.0.0.0",
        accept: CHROME_ACCEPT,
        accept_language: "en-US,en;q=0.9",
        viewport: (1920, 937),
        timezone_offset_minutes: -300,
    },
    Identity {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        accept: CHROME_ACCEPT,
        accept_language: "en-US,en;q=0.9,it;q=0.8",
        viewport: (1920, 937),
        timezone_offset_minutes: 60,
    },
];

/// Walks the identity pool round-robin for baseline traffic and hands out
/// a fresh, unused identity when the caller signals a block. The pool
/// itself is static and read-only, so rotators can live on every worker
/// without coordination.
#[derive(Debug)]
pub struct IdentityRotator {
    next_index: usize,
    current_index: usize,
    used_in_session: HashSet<usize>,
}

impl IdentityRotator {
    pub fn new() -> Self {
        Self {
            next_index: 0,
            current_index: 0,
            used_in_session: HashSet::new(),
        }
    }

    /// Round-robin selection for baseline traffic.
    pub fn next(&mut self) -> Identity {
        let index = self.next_index;
        self.next_index = (self.next_index + 1) % IDENTITY_POOL.len();
        self.current_index = index;
        self.used_in_session.insert(index);
        IDENTITY_POOL[index].clone()
    }

    /// Immediate switch after a block or 403: prefer an identity not yet
    /// used in this session, and never hand back the one currently in use.
    pub fn rotate_blocked(&mut self) -> Identity {
        let fresh = (0..IDENTITY_POOL.len())
            .find(|i| !self.used_in_session.contains(i) && *i != self.current_index);

        let index = match fresh {
            Some(i) => i,
            None => {
                // Pool exhausted for this session; fall back to a random
                // pick that still avoids the burned identity.
                let mut i = fastrand::usize(..IDENTITY_POOL.len());
                while i == self.current_index && IDENTITY_POOL.len() > 1 {
                    i = fastrand::usize(..IDENTITY_POOL.len());
                }
                i
            }
        };

        self.current_index = index;
        self.used_in_session.insert(index);
        IDENTITY_POOL[index].clone()
    }

    /// A new session starts with a clean slate of usable identities.
    pub fn reset_session(&mut self) {
        self.used_in_session.clear();
    }

    pub fn pool_size() -> usize {
        IDENTITY_POOL.len()
    }
}

impl Default for IdentityRotator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_cycles_whole_pool() {
        let mut rotator = IdentityRotator::new();
        let first = rotator.next();
        for _ in 1..IdentityRotator::pool_size() {
            rotator.next();
        }
        // After a full cycle we come back to the start.
        assert_eq!(rotator.next(), first);
    }

    #[test]
    fn rotate_blocked_never_repeats_current_identity() {
        let mut rotator = IdentityRotator::new();
        let mut current = rotator.next();
        // Exhaust the pool several times over; the burned identity must
        // never come straight back.
        for _ in 0..(IdentityRotator::pool_size() * 3) {
            let replacement = rotator.rotate_blocked();
            assert_ne!(replacement, current);
            current = replacement;
        }
    }

    #[test]
    fn rotate_blocked_prefers_unused_identities() {
        let mut rotator = IdentityRotator::new();
        rotator.next();
        let mut seen = HashSet::new();
        for _ in 1..IdentityRotator::pool_size() {
            let identity = rotator.rotate_blocked();
            // Until exhaustion, each rotation must produce a new identity.
            assert!(seen.insert(identity.user_agent));
        }
    }

    #[test]
    fn accept_headers_match_browser_family() {
        for identity in IDENTITY_POOL {
            if identity.user_agent.contains("Firefox") {
                assert_eq!(identity.accept, FIREFOX_ACCEPT);
            } else if identity.user_agent.contains("Version/") {
                assert_eq!(identity.accept, SAFARI_ACCEPT);
            } else {
                assert_eq!(identity.accept, CHROME_ACCEPT);
            }
        }
    }
}
