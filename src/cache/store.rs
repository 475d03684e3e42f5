use std::{future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{error::internal::InternalError, state_store::StateStore, upstream::model::UpstreamResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Stale,
    Bypass,
}

impl CacheStatus {
    pub fn as_header_value(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Stale => "STALE",
            Self::Bypass => "BYPASS",
        }
    }
}

/// What a cache-store-driven loader hands back: the response to serve,
/// plus the cacheability verdict [`crate::cache::policy::decide`] already
/// computed for it.
pub struct LoaderResult {
    pub value: UpstreamResponse,
    pub cacheable: bool,
    pub ttl_seconds: Option<u64>,
    pub stale_ttl_seconds: Option<u64>,
}

pub struct SwrOutcome {
    pub value: UpstreamResponse,
    pub status: CacheStatus,
}

pub type Loader = Arc<
    dyn Fn() -> Pin<Box<dyn Future<Output = Result<LoaderResult, InternalError>> + Send>>
        + Send
        + Sync,
>;

/// Envelope persisted for cache entries that know their own stale
/// deadline. Values written before this format existed (or by some other
/// writer) are tolerated as "legacy": any stored value lacking
/// `marker: true` is treated as perpetually fresh until its backing TTL
/// expires the key outright.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    value: UpstreamResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    stale_until: Option<i64>,
    marker: bool,
}

/// Cache-aside + stale-while-revalidate orchestration on top of
/// [`StateStore`]. The entry envelope tracks an optional stale deadline;
/// reads past that deadline are served once and trigger a detached
/// background refresh.
#[derive(Debug, Clone)]
pub struct CacheStore {
    store: StateStore,
}

impl CacheStore {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: &str) -> Option<UpstreamResponse> {
        match self.store.get(key).await {
            Ok(Some(raw)) => decode_entry(&raw).map(|(value, _)| value),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(%error, "cache get failed, treating as miss");
                None
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(error) = self.store.delete(key).await {
            tracing::warn!(%error, "cache delete failed");
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &UpstreamResponse,
        ttl_seconds: u64,
        stale_ttl_seconds: u64,
    ) -> Result<(), InternalError> {
        if stale_ttl_seconds > 0 {
            let stale_until = now_unix_millis() + i64::try_from(ttl_seconds * 1000).unwrap_or(i64::MAX);
            let envelope = Envelope {
                value: value.clone(),
                stale_until: Some(stale_until),
                marker: true,
            };
            let serialized = serde_json::to_string(&envelope)?;
            self.store
                .set(key, &serialized, Some(ttl_seconds + stale_ttl_seconds))
                .await
        } else {
            let serialized = serde_json::to_string(value)?;
            self.store.set(key, &serialized, Some(ttl_seconds)).await
        }
    }

    /// Cache-aside dispatch with stale-while-revalidate. `default_ttl`/
    /// `default_stale_ttl` apply when [`LoaderResult::ttl_seconds`] is
    /// unset. The background refresh this schedules on a STALE read is
    /// detached from the caller and never affects the returned value.
    #[tracing::instrument(name = "cache", skip_all, fields(key = %key))]
    pub async fn swr(
        &self,
        key: &str,
        default_ttl_seconds: u64,
        default_stale_ttl_seconds: u64,
        loader: Loader,
    ) -> Result<SwrOutcome, InternalError> {
        if self.store.is_fallback() {
            let result = loader().await?;
            return Ok(SwrOutcome {
                value: result.value,
                status: CacheStatus::Bypass,
            });
        }

        let raw = match self.store.get(key).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(%error, "cache store unreachable, bypassing cache for this request");
                let result = loader().await?;
                return Ok(SwrOutcome {
                    value: result.value,
                    status: CacheStatus::Bypass,
                });
            }
        };
        if let Some(raw) = raw {
            if let Some((value, stale_until)) = decode_entry(&raw) {
                let fresh = stale_until.is_none_or(|deadline| now_unix_millis() <= deadline);
                if fresh {
                    return Ok(SwrOutcome { value, status: CacheStatus::Hit });
                }
                self.schedule_background_refresh(
                    key.to_string(),
                    default_ttl_seconds,
                    default_stale_ttl_seconds,
                    loader,
                );
                return Ok(SwrOutcome { value, status: CacheStatus::Stale });
            }
        }

        let result = loader().await?;
        if !result.cacheable {
            return Ok(SwrOutcome {
                value: result.value,
                status: CacheStatus::Bypass,
            });
        }
        let ttl = result.ttl_seconds.unwrap_or(default_ttl_seconds);
        let stale_ttl = result.stale_ttl_seconds.unwrap_or(default_stale_ttl_seconds);
        match self.set(key, &result.value, ttl, stale_ttl).await {
            Ok(()) => Ok(SwrOutcome { value: result.value, status: CacheStatus::Miss }),
            Err(error) => {
                tracing::warn!(%error, "cache write failed, downgrading to bypass");
                Ok(SwrOutcome { value: result.value, status: CacheStatus::Bypass })
            }
        }
    }

    fn schedule_background_refresh(
        &self,
        key: String,
        default_ttl_seconds: u64,
        default_stale_ttl_seconds: u64,
        loader: Loader,
    ) {
        let store = self.clone();
        tokio::spawn(async move {
            let result = match loader().await {
                Ok(result) => result,
                Err(error) => {
                    tracing::warn!(%error, key, "background cache refresh failed");
                    return;
                }
            };
            if !result.cacheable {
                return;
            }
            let ttl = result.ttl_seconds.unwrap_or(default_ttl_seconds);
            let stale_ttl = result.stale_ttl_seconds.unwrap_or(default_stale_ttl_seconds);
            if let Err(error) = store.set(&key, &result.value, ttl, stale_ttl).await {
                tracing::warn!(%error, key, "background cache refresh write failed");
            }
        });
    }
}

fn decode_entry(raw: &str) -> Option<(UpstreamResponse, Option<i64>)> {
    if let Ok(envelope) = serde_json::from_str::<Envelope>(raw)
        && envelope.marker
    {
        return Some((envelope.value, envelope.stale_until));
    }
    serde_json::from_str::<UpstreamResponse>(raw)
        .ok()
        .map(|value| (value, None))
}

fn now_unix_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::state_store::InMemoryStateStore;

    fn response(body: &str) -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            body: serde_json::json!({ "ok": body }),
            content_type: Some("application/json".to_string()),
            headers: BTreeMap::new(),
        }
    }

    fn counting_loader(calls: Arc<AtomicUsize>, cacheable: bool) -> Loader {
        Arc::new(move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(LoaderResult {
                    value: response(&n.to_string()),
                    cacheable,
                    ttl_seconds: None,
                    stale_ttl_seconds: None,
                })
            })
        })
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let store = CacheStore::new(StateStore::InMemory(InMemoryStateStore::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = store
            .swr("k", 60, 30, counting_loader(calls.clone(), true))
            .await
            .unwrap();
        assert_eq!(first.status, CacheStatus::Miss);

        let second = store
            .swr("k", 60, 30, counting_loader(calls.clone(), true))
            .await
            .unwrap();
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_cacheable_result_is_bypass_and_not_written() {
        let store = CacheStore::new(StateStore::InMemory(InMemoryStateStore::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = store
            .swr("k", 60, 30, counting_loader(calls.clone(), false))
            .await
            .unwrap();
        assert_eq!(first.status, CacheStatus::Bypass);

        let second = store
            .swr("k", 60, 30, counting_loader(calls.clone(), false))
            .await
            .unwrap();
        assert_eq!(second.status, CacheStatus::Bypass);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fallback_store_always_bypasses_without_writing() {
        let store = CacheStore::new(StateStore::InMemory(InMemoryStateStore::new()));
        assert!(store.store.is_fallback());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = store
            .swr("k", 60, 30, counting_loader(calls.clone(), true))
            .await
            .unwrap();
        assert_eq!(first.status, CacheStatus::Bypass);

        let second = store
            .swr("k", 60, 30, counting_loader(calls.clone(), true))
            .await
            .unwrap();
        assert_eq!(second.status, CacheStatus::Bypass);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn legacy_bare_value_is_tolerated_as_fresh() {
        let inner = StateStore::InMemory(InMemoryStateStore::new());
        let serialized = serde_json::to_string(&response("legacy")).unwrap();
        inner.set("k", &serialized, None).await.unwrap();
        let store = CacheStore::new(inner);
        let calls = Arc::new(AtomicUsize::new(0));

        let outcome = store
            .swr("k", 60, 30, counting_loader(calls.clone(), true))
            .await
            .unwrap();
        assert_eq!(outcome.status, CacheStatus::Hit);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
