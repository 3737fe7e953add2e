//! Read-through cache for contract queries, keyed by query identity.
//!
//! Lists live under `contracts:owner:{owner}:g{n}`, where `n` is a per-owner
//! generation bumped on every create or delete. A list read from the database
//! before a mutation is written under the old generation and is never read
//! again. Single records live under `contracts:item:{id}`; a delete leaves a
//! tombstone `contracts:deleted:{id}` and `put_item` refuses to write over it,
//! so a read that overlaps a delete cannot resurrect the record.
//!
//! Callers treat cache failures as misses.

use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::contract::ContractAnalysis;

/// Tombstones outlive any in-flight read, whatever the entry TTL.
const TOMBSTONE_MIN_SECS: u64 = 3600;

/// SET item EX ttl unless the tombstone exists. Returns 1 when written.
const PUT_UNLESS_DELETED: &str = r#"
if redis.call('EXISTS', KEYS[2]) == 1 then
    return 0
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[2])
return 1
"#;

#[async_trait]
pub trait ContractCache: Send + Sync {
    /// Current list generation for `owner_id`. Read it before querying the
    /// database and pass it back to `put_list`.
    async fn list_generation(&self, owner_id: Uuid) -> Result<u64, AppError>;
    async fn get_list(
        &self,
        owner_id: Uuid,
        generation: u64,
    ) -> Result<Option<Vec<ContractAnalysis>>, AppError>;
    async fn put_list(
        &self,
        owner_id: Uuid,
        generation: u64,
        contracts: &[ContractAnalysis],
    ) -> Result<(), AppError>;
    /// `None` for unknown and for deleted ids.
    async fn get_item(&self, id: Uuid) -> Result<Option<ContractAnalysis>, AppError>;
    /// No-op when the record has been deleted.
    async fn put_item(&self, contract: &ContractAnalysis) -> Result<(), AppError>;
    /// Bumps the owner's list generation. With `deleted`, also tombstones
    /// that record and drops its cached copy.
    async fn invalidate(&self, owner_id: Uuid, deleted: Option<Uuid>) -> Result<(), AppError>;
}

pub fn generation_key(owner_id: Uuid) -> String {
    format!("contracts:owner:{owner_id}:gen")
}

pub fn list_key(owner_id: Uuid, generation: u64) -> String {
    format!("contracts:owner:{owner_id}:g{generation}")
}

pub fn item_key(id: Uuid) -> String {
    format!("contracts:item:{id}")
}

pub fn tombstone_key(id: Uuid) -> String {
    format!("contracts:deleted:{id}")
}

pub fn tombstone_ttl(ttl_secs: u64) -> u64 {
    ttl_secs.max(TOMBSTONE_MIN_SECS)
}

pub struct RedisContractCache {
    client: redis::Client,
    ttl_secs: u64,
    put_unless_deleted: redis::Script,
}

impl RedisContractCache {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self {
            client,
            ttl_secs,
            put_unless_deleted: redis::Script::new(PUT_UNLESS_DELETED),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(key).await?;
        raw.map(|s| decode(key, &s)).transpose()
    }
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Result<T, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt cache entry {key}: {e}")))
}

fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Cache serialization failed: {e}")))
}

#[async_trait]
impl ContractCache for RedisContractCache {
    async fn list_generation(&self, owner_id: Uuid) -> Result<u64, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let generation: Option<u64> = conn.get(generation_key(owner_id)).await?;
        Ok(generation.unwrap_or(0))
    }

    async fn get_list(
        &self,
        owner_id: Uuid,
        generation: u64,
    ) -> Result<Option<Vec<ContractAnalysis>>, AppError> {
        self.get_json(&list_key(owner_id, generation)).await
    }

    async fn put_list(
        &self,
        owner_id: Uuid,
        generation: u64,
        contracts: &[ContractAnalysis],
    ) -> Result<(), AppError> {
        let payload = encode(contracts)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(list_key(owner_id, generation), payload, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<ContractAnalysis>, AppError> {
        let key = item_key(id);
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let (raw, deleted): (Option<String>, bool) = redis::pipe()
            .get(&key)
            .exists(tombstone_key(id))
            .query_async(&mut conn)
            .await?;
        if deleted {
            return Ok(None);
        }
        raw.map(|s| decode(&key, &s)).transpose()
    }

    async fn put_item(&self, contract: &ContractAnalysis) -> Result<(), AppError> {
        let payload = encode(contract)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let written: i32 = self
            .put_unless_deleted
            .key(item_key(contract.id))
            .key(tombstone_key(contract.id))
            .arg(payload)
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await?;
        if written == 0 {
            tracing::debug!("Skipped caching deleted contract {}", contract.id);
        }
        Ok(())
    }

    async fn invalidate(&self, owner_id: Uuid, deleted: Option<Uuid>) -> Result<(), AppError> {
        let mut pipe = redis::pipe();
        pipe.atomic().incr(generation_key(owner_id), 1).ignore();
        if let Some(id) = deleted {
            pipe.set_ex(tombstone_key(id), 1, tombstone_ttl(self.ttl_secs))
                .ignore()
                .del(item_key(id))
                .ignore();
        }
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}
