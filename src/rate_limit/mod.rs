use std::fmt;

use crate::{error::internal::InternalError, state_store::StateStore};

/// Which bucket a rate-limit check consumes from. Scopes deliberately
/// never include the raw credential — only an opaque identifier derived
/// from it (the key id for [`Scope::Key`], the request's peer address or
/// similar pre-auth signal for [`Scope::Preauth`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Key,
    Preauth,
    Admin,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Key => "key",
            Self::Preauth => "preauth",
            Self::Admin => "admin",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub retry_after: u64,
    pub reset_at: u64,
}

/// Fixed-window counter rate limiter: `INCR` then conditionally `EXPIRE`
/// the window bucket, keyed by `scope`, `identifier`, and the window's
/// start timestamp. A misconfigured window/max falls back to a safe
/// default (60s / 120 requests) rather than refusing all traffic.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: StateStore,
    prefix: String,
}

const SAFE_DEFAULT_WINDOW_SECONDS: u64 = 60;
const SAFE_DEFAULT_MAX_REQUESTS: u64 = 120;

impl RateLimiter {
    pub fn new(store: StateStore, prefix: String) -> Self {
        Self { store, prefix }
    }

    pub async fn consume(
        &self,
        scope: Scope,
        identifier: &str,
        window_seconds: u64,
        max_requests: u64,
    ) -> Result<RateLimitDecision, InternalError> {
        let (window_seconds, max_requests) = if window_seconds == 0 || max_requests == 0 {
            (SAFE_DEFAULT_WINDOW_SECONDS, SAFE_DEFAULT_MAX_REQUESTS)
        } else {
            (window_seconds, max_requests)
        };

        let now = now_unix_seconds();
        let window_start = (now / window_seconds) * window_seconds;
        let key = format!(
            "{}:ratelimit:{}:{}:{}",
            self.prefix, scope, identifier, window_start
        );

        let count = self.store.incr_with_expire(&key, window_seconds).await?;
        let count = u64::try_from(count).unwrap_or(u64::MAX);
        let reset_at = window_start + window_seconds;

        if count <= max_requests {
            Ok(RateLimitDecision {
                allowed: true,
                limit: max_requests,
                remaining: max_requests - count,
                retry_after: 0,
                reset_at,
            })
        } else {
            Ok(RateLimitDecision {
                allowed: false,
                limit: max_requests,
                remaining: 0,
                retry_after: (reset_at - now).max(1),
                reset_at,
            })
        }
    }
}

fn now_unix_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::InMemoryStateStore;

    fn limiter() -> RateLimiter {
        RateLimiter::new(StateStore::InMemory(InMemoryStateStore::new()), "proxy".to_string())
    }

    #[tokio::test]
    async fn allows_up_to_max_then_throttles() {
        let limiter = limiter();
        for i in 1..=5 {
            let decision = limiter.consume(Scope::Key, "k1", 60, 5).await.unwrap();
            assert!(decision.allowed, "request {i} should be allowed");
            assert_eq!(decision.remaining, 5 - i);
        }
        let sixth = limiter.consume(Scope::Key, "k1", 60, 5).await.unwrap();
        assert!(!sixth.allowed);
        assert!(sixth.retry_after >= 1);
    }

    #[tokio::test]
    async fn scopes_and_identifiers_are_independent() {
        let limiter = limiter();
        for _ in 0..3 {
            assert!(limiter.consume(Scope::Key, "a", 60, 3).await.unwrap().allowed);
        }
        assert!(!limiter.consume(Scope::Key, "a", 60, 3).await.unwrap().allowed);
        assert!(limiter.consume(Scope::Key, "b", 60, 3).await.unwrap().allowed);
        assert!(limiter.consume(Scope::Preauth, "a", 60, 3).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn bad_config_falls_back_to_safe_defaults() {
        let limiter = limiter();
        let decision = limiter.consume(Scope::Admin, "x", 0, 0).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.limit, SAFE_DEFAULT_MAX_REQUESTS);
    }
}
