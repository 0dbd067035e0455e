//! Read-through wallet cache
//!
//! Caches whole wallet snapshots, keyed by wallet id. The cache is an
//! availability optimization only: a read failure is a miss, a write
//! failure is reported to the caller for logging, and the engine never
//! fails an operation over it. Staleness is bounded by the entry TTL and
//! by post-commit invalidation.

use crate::error::Result;
use crate::types::Wallet;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

/// Cache TTL defaults (in seconds)
pub mod ttl {
    /// Default lifetime of a cached wallet snapshot
    pub const WALLET_SECS: u64 = 600; // 10 minutes
}

/// Cache key prefixes
pub mod keys {
    /// Wallet snapshots, keyed `wallet:<uuid>`
    pub const WALLET: &str = "wallet";
}

/// Wallet snapshot cache used by the transfer engine
#[async_trait]
pub trait WalletCache: Send + Sync {
    /// Cached wallet snapshot, `None` on miss (a backend failure reads as a miss)
    async fn get(&self, wallet_id: Uuid) -> Option<Wallet>;

    /// Store a wallet snapshot with the given TTL
    async fn set(&self, wallet: &Wallet, ttl: Duration) -> Result<()>;

    /// Drop a wallet's cached snapshot
    async fn invalidate(&self, wallet_id: Uuid) -> Result<()>;
}

/// Hit/miss accounting for one cache instance
#[derive(Default, Debug, Clone)]
pub struct CacheMetrics {
    /// Reads answered from the cache
    pub hits: u64,
    /// Reads that fell through to the store
    pub misses: u64,
    /// Successful fills
    pub sets: u64,
    /// Invalidations
    pub deletes: u64,
}

impl CacheMetrics {
    /// Percentage of reads answered from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64) / (total as f64) * 100.0
        }
    }
}

/// Redis-backed wallet cache
#[derive(Clone)]
pub struct RedisWalletCache {
    redis: ConnectionManager,
    metrics: Arc<RwLock<CacheMetrics>>,
}

impl RedisWalletCache {
    /// Create a cache over an established connection manager
    pub fn new(redis: ConnectionManager) -> Self {
        RedisWalletCache {
            redis,
            metrics: Arc::new(RwLock::new(CacheMetrics::default())),
        }
    }

    /// Current hit/miss counters
    pub async fn metrics(&self) -> CacheMetrics {
        self.metrics.read().await.clone()
    }

    async fn record_hit(&self) {
        self.metrics.write().await.hits += 1;
    }

    async fn record_miss(&self) {
        self.metrics.write().await.misses += 1;
    }

    async fn record_set(&self) {
        self.metrics.write().await.sets += 1;
    }

    async fn record_delete(&self) {
        self.metrics.write().await.deletes += 1;
    }
}

#[async_trait]
impl WalletCache for RedisWalletCache {
    async fn get(&self, wallet_id: Uuid) -> Option<Wallet> {
        let key = format!("{}:{}", keys::WALLET, wallet_id);

        match self.redis.clone().get::<_, Option<String>>(&key).await {
            Ok(Some(json)) => {
                self.record_hit().await;
                match serde_json::from_str(&json) {
                    Ok(wallet) => Some(wallet),
                    Err(e) => {
                        warn!("Failed to deserialize cached wallet: {}", e);
                        None
                    }
                }
            }
            Ok(None) => {
                self.record_miss().await;
                None
            }
            Err(e) => {
                error!("Redis error getting wallet: {}", e);
                self.record_miss().await;
                None
            }
        }
    }

    async fn set(&self, wallet: &Wallet, ttl: Duration) -> Result<()> {
        let key = format!("{}:{}", keys::WALLET, wallet.id);
        let json = serde_json::to_string(wallet)?;

        let _: () = self
            .redis
            .clone()
            .set_ex(&key, json, ttl.as_secs().max(1))
            .await?;
        self.record_set().await;
        Ok(())
    }

    async fn invalidate(&self, wallet_id: Uuid) -> Result<()> {
        let key = format!("{}:{}", keys::WALLET, wallet_id);
        let _: () = self.redis.clone().del(&key).await?;
        self.record_delete().await;
        Ok(())
    }
}

/// In-process TTL cache for tests and single-node runs
pub struct MemoryWalletCache {
    entries: Arc<RwLock<HashMap<Uuid, (Wallet, Instant)>>>,
    metrics: Arc<RwLock<CacheMetrics>>,
}

impl MemoryWalletCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            metrics: Arc::new(RwLock::new(CacheMetrics::default())),
        }
    }

    /// Current hit/miss counters
    pub async fn metrics(&self) -> CacheMetrics {
        self.metrics.read().await.clone()
    }
}

impl Default for MemoryWalletCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletCache for MemoryWalletCache {
    async fn get(&self, wallet_id: Uuid) -> Option<Wallet> {
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(&wallet_id) {
                Some((wallet, expires_at)) if Instant::now() < *expires_at => {
                    let wallet = wallet.clone();
                    self.metrics.write().await.hits += 1;
                    return Some(wallet);
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            self.entries.write().await.remove(&wallet_id);
        }
        self.metrics.write().await.misses += 1;
        None
    }

    async fn set(&self, wallet: &Wallet, ttl: Duration) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(wallet.id, (wallet.clone(), Instant::now() + ttl));
        self.metrics.write().await.sets += 1;
        Ok(())
    }

    async fn invalidate(&self, wallet_id: Uuid) -> Result<()> {
        self.entries.write().await.remove(&wallet_id);
        self.metrics.write().await.deletes += 1;
        Ok(())
    }
}
