// db/cache.rs
use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::models::reputationmodel::ReputationSnapshot;

pub struct CacheHelper;

impl CacheHelper {
    /// Generic get from cache
    pub async fn get<T: DeserializeOwned>(
        redis: &Arc<ConnectionManager>,
        key: &str,
    ) -> Result<Option<T>, redis::RedisError> {
        let mut conn = ConnectionManager::clone(redis);
        let cached: Option<String> = conn.get(key).await?;

        match cached {
            Some(data) => match serde_json::from_str::<T>(&data) {
                Ok(value) => {
                    tracing::debug!("Cache HIT: {}", key);
                    Ok(Some(value))
                }
                Err(_) => {
                    tracing::warn!("Cache deserialization failed for: {}", key);
                    Ok(None)
                }
            },
            None => {
                tracing::debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    /// Generic set to cache with TTL
    pub async fn set<T: Serialize>(
        redis: &Arc<ConnectionManager>,
        key: &str,
        value: &T,
        ttl_seconds: usize,
    ) -> Result<(), redis::RedisError> {
        if let Ok(json) = serde_json::to_string(value) {
            let mut conn = ConnectionManager::clone(redis);
            let _: () = conn.set_ex(key, json, ttl_seconds).await?;
            tracing::debug!("Cache SET: {} (TTL: {}s)", key, ttl_seconds);
        }
        Ok(())
    }

    /// Delete a cache key
    pub async fn delete(redis: &Arc<ConnectionManager>, key: &str) -> Result<(), redis::RedisError> {
        let mut conn = ConnectionManager::clone(redis);
        let _: () = conn.del(key).await?;
        tracing::debug!("Cache DELETE: {}", key);
        Ok(())
    }

    pub async fn get_counter(redis: &Arc<ConnectionManager>, key: &str) -> Result<u64, redis::RedisError> {
        let mut conn = ConnectionManager::clone(redis);
        let value: Option<u64> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }

    pub async fn incr(redis: &Arc<ConnectionManager>, key: &str) -> Result<u64, redis::RedisError> {
        let mut conn = ConnectionManager::clone(redis);
        conn.incr(key, 1u64).await
    }
}

fn snapshot_key(client_id: &str) -> String {
    format!("reputation:{}", client_id)
}

fn generation_key(client_id: &str) -> String {
    format!("reputation:{}:generation", client_id)
}

/// A cached snapshot tagged with the client's invalidation generation at the
/// time the read started. Entries whose generation is behind the current one
/// are stale even if they are still within their TTL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedSnapshot {
    pub generation: u64,
    pub snapshot: ReputationSnapshot,
}

/// Storage for reputation snapshots. Every replica must see the same
/// invalidations, so production deployments share one Redis.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn generation(&self, client_id: &str) -> Result<u64, redis::RedisError>;

    async fn get(&self, client_id: &str) -> Result<Option<CachedSnapshot>, redis::RedisError>;

    async fn set(&self, client_id: &str, entry: &CachedSnapshot, ttl_seconds: usize) -> Result<(), redis::RedisError>;

    /// Drops the entry and bumps the generation so in-flight reads cannot
    /// publish what they computed before the release.
    async fn invalidate(&self, client_id: &str) -> Result<(), redis::RedisError>;
}

#[derive(Clone)]
pub struct RedisSnapshotCache {
    redis: Arc<ConnectionManager>,
}

impl std::fmt::Debug for RedisSnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSnapshotCache").finish_non_exhaustive()
    }
}

impl RedisSnapshotCache {
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("✅ Redis connection established successfully");

        Ok(Self {
            redis: Arc::new(conn),
        })
    }
}

#[async_trait]
impl SnapshotCache for RedisSnapshotCache {
    async fn generation(&self, client_id: &str) -> Result<u64, redis::RedisError> {
        CacheHelper::get_counter(&self.redis, &generation_key(client_id)).await
    }

    async fn get(&self, client_id: &str) -> Result<Option<CachedSnapshot>, redis::RedisError> {
        CacheHelper::get(&self.redis, &snapshot_key(client_id)).await
    }

    async fn set(&self, client_id: &str, entry: &CachedSnapshot, ttl_seconds: usize) -> Result<(), redis::RedisError> {
        CacheHelper::set(&self.redis, &snapshot_key(client_id), entry, ttl_seconds).await
    }

    async fn invalidate(&self, client_id: &str) -> Result<(), redis::RedisError> {
        CacheHelper::incr(&self.redis, &generation_key(client_id)).await?;
        CacheHelper::delete(&self.redis, &snapshot_key(client_id)).await
    }
}

/// Fallback when `REDIS_URL` is not set. Only correct for a single replica.
#[derive(Debug, Default)]
pub struct LocalSnapshotCache {
    state: RwLock<LocalCacheState>,
}

#[derive(Debug, Default)]
struct LocalCacheState {
    entries: HashMap<String, CachedSnapshot>,
    generations: HashMap<String, u64>,
}

impl LocalSnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotCache for LocalSnapshotCache {
    async fn generation(&self, client_id: &str) -> Result<u64, redis::RedisError> {
        Ok(self.state.read().await.generations.get(client_id).copied().unwrap_or(0))
    }

    async fn get(&self, client_id: &str) -> Result<Option<CachedSnapshot>, redis::RedisError> {
        Ok(self.state.read().await.entries.get(client_id).cloned())
    }

    async fn set(&self, client_id: &str, entry: &CachedSnapshot, _ttl_seconds: usize) -> Result<(), redis::RedisError> {
        let mut state = self.state.write().await;
        let current = state.generations.get(client_id).copied().unwrap_or(0);
        if entry.generation == current {
            state.entries.insert(client_id.to_string(), entry.clone());
        }
        Ok(())
    }

    async fn invalidate(&self, client_id: &str) -> Result<(), redis::RedisError> {
        let mut state = self.state.write().await;
        state.entries.remove(client_id);
        *state.generations.entry(client_id.to_string()).or_insert(0) += 1;
        Ok(())
    }
}
