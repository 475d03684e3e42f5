use std::time::Duration;

use r2d2::Pool;
use redis::{Client, Commands};

use super::ScanDeleteResult;
use crate::error::{init::InitError, internal::InternalError};

const SCAN_COUNT_HINT: usize = 200;

#[derive(Debug, Clone)]
pub struct RedisStateStore {
    pool: Pool<Client>,
}

impl RedisStateStore {
    pub fn new(url: url::Url, connection_timeout: Duration) -> Result<Self, InitError> {
        let client = Client::open(url)?;
        let pool = Pool::builder()
            .connection_timeout(connection_timeout)
            .build(client)?;
        Ok(Self { pool })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, InternalError> {
        let mut conn = self.pool.get().map_err(InternalError::Pool)?;
        let value: Option<String> = conn.get(key)?;
        Ok(value)
    }

    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<(), InternalError> {
        let mut conn = self.pool.get().map_err(InternalError::Pool)?;
        match ttl_seconds {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl)?;
            }
            None => {
                let _: () = conn.set(key, value)?;
            }
        }
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), InternalError> {
        let mut conn = self.pool.get().map_err(InternalError::Pool)?;
        let _: () = conn.del(key)?;
        Ok(())
    }

    pub async fn incr_with_expire(
        &self,
        key: &str,
        window_seconds: u64,
    ) -> Result<i64, InternalError> {
        let mut conn = self.pool.get().map_err(InternalError::Pool)?;
        let count: i64 = conn.incr(key, 1)?;
        if count == 1 {
            let _: () = conn.expire(key, i64::try_from(window_seconds + 1).unwrap_or(i64::MAX))?;
        }
        Ok(count)
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<(), InternalError> {
        let mut conn = self.pool.get().map_err(InternalError::Pool)?;
        let _: () = conn.sadd(key, member)?;
        Ok(())
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<(), InternalError> {
        let mut conn = self.pool.get().map_err(InternalError::Pool)?;
        let _: () = conn.srem(key, member)?;
        Ok(())
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, InternalError> {
        let mut conn = self.pool.get().map_err(InternalError::Pool)?;
        let members: Vec<String> = conn.smembers(key)?;
        Ok(members)
    }

    pub async fn sismember(
        &self,
        key: &str,
        member: &str,
    ) -> Result<bool, InternalError> {
        let mut conn = self.pool.get().map_err(InternalError::Pool)?;
        let is_member: bool = conn.sismember(key, member)?;
        Ok(is_member)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, InternalError> {
        let mut conn = self.pool.get().map_err(InternalError::Pool)?;
        let exists: bool = conn.exists(key)?;
        Ok(exists)
    }

    pub async fn scan_and_delete(
        &self,
        pattern: &str,
        batch_size: usize,
        dry_run: bool,
    ) -> Result<ScanDeleteResult, InternalError> {
        let mut conn = self.pool.get().map_err(InternalError::Pool)?;
        let mut result = ScanDeleteResult::default();
        let mut cursor: u64 = 0;
        let mut pending: Vec<String> = Vec::with_capacity(batch_size);

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT_HINT)
                .query(&mut *conn)?;

            result.matched += keys.len() as u64;
            if !dry_run {
                pending.extend(keys);
                while pending.len() >= batch_size {
                    let batch: Vec<String> = pending.drain(..batch_size).collect();
                    let deleted: u64 = conn.del(&batch)?;
                    result.deleted += deleted;
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        if !dry_run && !pending.is_empty() {
            let deleted: u64 = conn.del(&pending)?;
            result.deleted += deleted;
        }

        Ok(result)
    }

    pub async fn ping(&self) -> bool {
        let Ok(mut conn) = self.pool.get() else {
            return false;
        };
        redis::cmd("PING").query::<String>(&mut *conn).is_ok()
    }
}
