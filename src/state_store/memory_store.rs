use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::{Duration, Instant},
};

use super::ScanDeleteResult;
use crate::error::internal::InternalError;

#[derive(Debug)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Mutex-guarded in-memory state store. Serves two roles: the startup
/// fallback used when no Redis URL is configured or the real backend
/// fails to connect, and the default backend for unit/integration tests
/// that don't stand up Redis. Provides the same INCR/EXPIRE and
/// pattern-SCAN primitives Redis does, which a bounded TTL cache like
/// `moka` has no equivalent for.
#[derive(Debug, Clone)]
pub struct InMemoryStateStore {
    entries: std::sync::Arc<Mutex<HashMap<String, Entry>>>,
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            entries: std::sync::Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().expect("state store mutex poisoned")
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, InternalError> {
        let mut map = self.lock();
        let now = Instant::now();
        if map.get(key).is_some_and(|entry| entry.is_expired(now)) {
            map.remove(key);
            return Ok(None);
        }
        match map.get(key) {
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s.clone())),
            _ => Ok(None),
        }
    }

    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<(), InternalError> {
        let mut map = self.lock();
        map.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: ttl_seconds.map(|ttl| Instant::now() + Duration::from_secs(ttl)),
            },
        );
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), InternalError> {
        self.lock().remove(key);
        Ok(())
    }

    pub async fn incr_with_expire(
        &self,
        key: &str,
        window_seconds: u64,
    ) -> Result<i64, InternalError> {
        let mut map = self.lock();
        let now = Instant::now();
        let expired = map.get(key).is_some_and(|entry| entry.is_expired(now));
        if expired {
            map.remove(key);
        }
        let entry = map.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Str("0".to_string()),
            expires_at: None,
        });
        let current = match &entry.value {
            Value::Str(s) => s.parse::<i64>().unwrap_or(0),
            Value::Set(_) => 0,
        };
        let next = current + 1;
        entry.value = Value::Str(next.to_string());
        if next == 1 {
            entry.expires_at = Some(now + Duration::from_secs(window_seconds + 1));
        }
        Ok(next)
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<(), InternalError> {
        let mut map = self.lock();
        let entry = map.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(HashSet::new()),
            expires_at: None,
        });
        if let Value::Set(set) = &mut entry.value {
            set.insert(member.to_string());
        }
        Ok(())
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<(), InternalError> {
        let mut map = self.lock();
        if let Some(Entry { value: Value::Set(set), .. }) = map.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, InternalError> {
        let map = self.lock();
        match map.get(key) {
            Some(Entry { value: Value::Set(set), .. }) => {
                Ok(set.iter().cloned().collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    pub async fn sismember(
        &self,
        key: &str,
        member: &str,
    ) -> Result<bool, InternalError> {
        let map = self.lock();
        match map.get(key) {
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.contains(member)),
            _ => Ok(false),
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, InternalError> {
        let mut map = self.lock();
        let now = Instant::now();
        if map.get(key).is_some_and(|entry| entry.is_expired(now)) {
            map.remove(key);
            return Ok(false);
        }
        Ok(map.contains_key(key))
    }

    pub async fn scan_and_delete(
        &self,
        pattern: &str,
        _batch_size: usize,
        dry_run: bool,
    ) -> Result<ScanDeleteResult, InternalError> {
        let mut map = self.lock();
        let now = Instant::now();
        let matched: Vec<String> = map
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        let mut result = ScanDeleteResult {
            matched: matched.len() as u64,
            deleted: 0,
        };
        if !dry_run {
            for key in &matched {
                if map.remove(key).is_some() {
                    result.deleted += 1;
                }
            }
        }
        Ok(result)
    }
}

/// Minimal Redis-style glob matcher: `*`, `?`, `[...]` character classes,
/// and `\`-escaped literals, matching the subset `AdminInvalidator` builds
/// (see `admin::invalidate::escape_glob`, which backslash-escapes glob
/// metacharacters in user-supplied path segments before composing a
/// pattern).
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_match_inner(&pattern, &text)
}

fn glob_match_inner(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            glob_match_inner(&pattern[1..], text)
                || (!text.is_empty() && glob_match_inner(pattern, &text[1..]))
        }
        Some('?') => !text.is_empty() && glob_match_inner(&pattern[1..], &text[1..]),
        Some('\\') => {
            let Some(escaped) = pattern.get(1) else {
                return !text.is_empty() && text[0] == '\\' && glob_match_inner(&pattern[1..], &text[1..]);
            };
            !text.is_empty() && *escaped == text[0] && glob_match_inner(&pattern[2..], &text[1..])
        }
        Some('[') => {
            let Some(close) = pattern.iter().position(|c| *c == ']') else {
                return !text.is_empty()
                    && text[0] == '['
                    && glob_match_inner(&pattern[1..], &text[1..]);
            };
            if text.is_empty() {
                return false;
            }
            let class = &pattern[1..close];
            if class.contains(&text[0]) {
                glob_match_inner(&pattern[close + 1..], &text[1..])
            } else {
                false
            }
        }
        Some(c) => !text.is_empty() && *c == text[0] && glob_match_inner(&pattern[1..], &text[1..]),
    }
}
