use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use rand::RngCore;
use uuid::Uuid;

use super::model::{ApiConsumer, ApiKeyRecord, NewApiKey};
use crate::{error::internal::InternalError, hash::sha256_hex, state_store::StateStore};

/// Owns the persisted set of API keys: validates opaque caller-presented
/// keys, mints new ones, lists/revokes/activates/deletes by id.
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    store: StateStore,
    prefix: String,
}

impl KeyRegistry {
    pub fn new(store: StateStore, prefix: String) -> Self {
        Self { store, prefix }
    }

    fn record_key(&self, key_id: Uuid) -> String {
        format!("{}:apikeys:record:{}", self.prefix, key_id)
    }

    fn lookup_key(&self, raw_key_hash: &str) -> String {
        format!("{}:apikeys:lookup:{}", self.prefix, raw_key_hash)
    }

    fn index_key(&self) -> String {
        format!("{}:apikeys:index", self.prefix)
    }

    /// Validates a raw caller-presented key. Returns `None` for unknown,
    /// revoked, or expired keys — never distinguishing which, so callers
    /// can't probe for valid-but-revoked keys.
    pub async fn validate(&self, raw_key: &str) -> Result<Option<ApiConsumer>, InternalError> {
        let raw_hash = sha256_hex(raw_key);
        let Some(key_id) = self.store.get(&self.lookup_key(&raw_hash)).await? else {
            return Ok(None);
        };
        let Ok(key_id) = Uuid::parse_str(&key_id) else {
            return Ok(None);
        };
        let Some(record) = self.get_record(key_id).await? else {
            return Ok(None);
        };
        if !record.is_active(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(ApiConsumer {
            key_id: record.key_id,
            owner: record.owner,
        }))
    }

    /// Mints a new key, returning the raw value exactly once — it is never
    /// retrievable again after this call returns.
    pub async fn create(&self, input: NewApiKey) -> Result<(String, ApiKeyRecord), InternalError> {
        let key_id = Uuid::new_v4();
        let raw_key = generate_raw_key();
        let raw_hash = sha256_hex(&raw_key);

        let record = ApiKeyRecord {
            key_id,
            hash: raw_hash.clone(),
            owner: input.owner,
            label: input.label,
            contact: input.contact,
            created_at: Utc::now(),
            created_by: input.created_by,
            revoked: false,
            revoked_at: None,
            expires_at: input.expires_at,
        };

        let serialized = serde_json::to_string(&record)?;
        self.store.set(&self.record_key(key_id), &serialized, None).await?;
        self.store
            .set(&self.lookup_key(&raw_hash), &key_id.to_string(), None)
            .await?;
        self.store.sadd(&self.index_key(), &key_id.to_string()).await?;

        Ok((raw_key, record))
    }

    /// Lists all non-deleted keys, newest first. Self-heals: index entries
    /// whose record no longer exists are dropped from the index as they're
    /// found, instead of surfacing a stale/partial record.
    pub async fn list(&self) -> Result<Vec<ApiKeyRecord>, InternalError> {
        let ids = self.store.smembers(&self.index_key()).await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let Ok(key_id) = Uuid::parse_str(&id) else {
                self.store.srem(&self.index_key(), &id).await?;
                continue;
            };
            match self.get_record(key_id).await? {
                Some(record) => records.push(record),
                None => {
                    self.store.srem(&self.index_key(), &id).await?;
                }
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    pub async fn revoke(&self, key_id: Uuid) -> Result<bool, InternalError> {
        self.set_revoked(key_id, true).await
    }

    pub async fn activate(&self, key_id: Uuid) -> Result<bool, InternalError> {
        self.set_revoked(key_id, false).await
    }

    pub async fn delete(&self, key_id: Uuid) -> Result<bool, InternalError> {
        let Some(record) = self.get_record(key_id).await? else {
            return Ok(false);
        };
        self.store.delete(&self.record_key(key_id)).await?;
        self.store.delete(&self.lookup_key(&record.hash)).await?;
        self.store.srem(&self.index_key(), &key_id.to_string()).await?;
        Ok(true)
    }

    async fn set_revoked(&self, key_id: Uuid, revoked: bool) -> Result<bool, InternalError> {
        let Some(mut record) = self.get_record(key_id).await? else {
            return Ok(false);
        };
        record.revoked = revoked;
        record.revoked_at = if revoked { Some(Utc::now()) } else { None };
        let serialized = serde_json::to_string(&record)?;
        self.store.set(&self.record_key(key_id), &serialized, None).await?;
        Ok(true)
    }

    async fn get_record(&self, key_id: Uuid) -> Result<Option<ApiKeyRecord>, InternalError> {
        let Some(raw) = self.store.get(&self.record_key(key_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

fn generate_raw_key() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    format!("pk_{}", URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::InMemoryStateStore;

    fn registry() -> KeyRegistry {
        KeyRegistry::new(StateStore::InMemory(InMemoryStateStore::new()), "proxy".to_string())
    }

    #[tokio::test]
    async fn create_then_validate_succeeds() {
        let registry = registry();
        let (raw, record) = registry
            .create(NewApiKey {
                owner: "acme".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let consumer = registry.validate(&raw).await.unwrap().unwrap();
        assert_eq!(consumer.key_id, record.key_id);
        assert_eq!(consumer.owner, "acme");
    }

    #[tokio::test]
    async fn unknown_key_does_not_validate() {
        let registry = registry();
        assert!(registry.validate("not-a-real-key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoked_key_does_not_validate() {
        let registry = registry();
        let (raw, record) = registry
            .create(NewApiKey {
                owner: "acme".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        registry.revoke(record.key_id).await.unwrap();
        assert!(registry.validate(&raw).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reactivated_key_validates_again() {
        let registry = registry();
        let (raw, record) = registry
            .create(NewApiKey {
                owner: "acme".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        registry.revoke(record.key_id).await.unwrap();
        registry.activate(record.key_id).await.unwrap();
        assert!(registry.validate(&raw).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_heals_stale_index_entries() {
        let registry = registry();
        let (_raw1, rec1) = registry
            .create(NewApiKey { owner: "a".to_string(), ..Default::default() })
            .await
            .unwrap();
        let (_raw2, rec2) = registry
            .create(NewApiKey { owner: "b".to_string(), ..Default::default() })
            .await
            .unwrap();

        registry.delete(rec1.key_id).await.unwrap();
        // simulate a stale index entry pointing at a deleted record
        registry
            .store
            .sadd(&registry.index_key(), &rec1.key_id.to_string())
            .await
            .unwrap();

        let listed = registry.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key_id, rec2.key_id);
    }

    #[tokio::test]
    async fn delete_removes_record_and_lookup() {
        let registry = registry();
        let (raw, record) = registry
            .create(NewApiKey { owner: "a".to_string(), ..Default::default() })
            .await
            .unwrap();
        assert!(registry.delete(record.key_id).await.unwrap());
        assert!(registry.validate(&raw).await.unwrap().is_none());
        assert!(!registry.delete(record.key_id).await.unwrap());
    }
}
