//! In-memory wallet store
//!
//! Implements the full store contract, including exclusive row locks and
//! staged scope writes, so the engine's concurrency behavior can be tested
//! without a database. Each wallet row sits behind its own async mutex;
//! a scope holds the guards it acquired until commit or rollback. Only
//! `get_for_update` is subject to the lock timeout; plain reads wait out
//! any open scope.

use crate::error::{Result, WalletError};
use crate::store::{UnitOfWork, WalletStore};
use crate::types::{TransactionLogEntry, Wallet};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::timeout;
use uuid::Uuid;

type SharedRow = Arc<Mutex<Wallet>>;

/// Infrastructure-free wallet store
pub struct MemoryWalletStore {
    wallets: Arc<RwLock<HashMap<Uuid, SharedRow>>>,
    log: Arc<RwLock<Vec<TransactionLogEntry>>>,
    lock_timeout: Duration,
}

impl MemoryWalletStore {
    /// Create an empty store with a one second lock wait
    pub fn new() -> Self {
        Self::with_lock_timeout(Duration::from_secs(1))
    }

    /// Create an empty store with the given lock wait
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            wallets: Arc::new(RwLock::new(HashMap::new())),
            log: Arc::new(RwLock::new(Vec::new())),
            lock_timeout,
        }
    }
}

impl Default for MemoryWalletStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn create(&self, owner_id: Uuid) -> Result<Wallet> {
        let wallet = Wallet::new(owner_id);
        self.wallets
            .write()
            .await
            .insert(wallet.id, Arc::new(Mutex::new(wallet.clone())));
        Ok(wallet)
    }

    async fn get(&self, wallet_id: Uuid) -> Result<Wallet> {
        let row = self
            .wallets
            .read()
            .await
            .get(&wallet_id)
            .cloned()
            .ok_or(WalletError::WalletNotFound(wallet_id))?;

        // Plain reads wait out an open scope rather than timing out; the
        // Postgres store serves the same read from a snapshot without
        // blocking at all.
        let guard = row.lock().await;
        Ok((*guard).clone())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            wallets: Arc::clone(&self.wallets),
            log: Arc::clone(&self.log),
            held: HashMap::new(),
            staged_balances: HashMap::new(),
            staged_entries: Vec::new(),
            lock_timeout: self.lock_timeout,
        }))
    }

    async fn entries_for_wallet(
        &self,
        wallet_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TransactionLogEntry>> {
        let log = self.log.read().await;
        let mut entries: Vec<_> = log
            .iter()
            .filter(|e| e.sender_id == Some(wallet_id) || e.receiver_id == Some(wallet_id))
            .cloned()
            .collect();
        entries.reverse();
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    async fn recent_entries(&self, limit: i64) -> Result<Vec<TransactionLogEntry>> {
        let log = self.log.read().await;
        let mut entries: Vec<_> = log.iter().rev().cloned().collect();
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }
}

/// Scope state: held row guards plus writes staged for commit
struct MemoryUnitOfWork {
    wallets: Arc<RwLock<HashMap<Uuid, SharedRow>>>,
    log: Arc<RwLock<Vec<TransactionLogEntry>>>,
    held: HashMap<Uuid, OwnedMutexGuard<Wallet>>,
    staged_balances: HashMap<Uuid, i64>,
    staged_entries: Vec<TransactionLogEntry>,
    lock_timeout: Duration,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn get_for_update(&mut self, wallet_id: Uuid) -> Result<Wallet> {
        // Re-locking a row already held in this scope sees staged state,
        // like a repeated FOR UPDATE inside one transaction.
        if let Some(guard) = self.held.get(&wallet_id) {
            let mut wallet = (**guard).clone();
            if let Some(&balance) = self.staged_balances.get(&wallet_id) {
                wallet.balance = balance;
            }
            return Ok(wallet);
        }

        let row = self
            .wallets
            .read()
            .await
            .get(&wallet_id)
            .cloned()
            .ok_or(WalletError::WalletNotFound(wallet_id))?;

        let guard = timeout(self.lock_timeout, row.lock_owned())
            .await
            .map_err(|_| WalletError::LockTimeout(wallet_id))?;

        let wallet = (*guard).clone();
        self.held.insert(wallet_id, guard);
        Ok(wallet)
    }

    async fn update_balance(&mut self, wallet_id: Uuid, new_balance: i64) -> Result<()> {
        if !self.held.contains_key(&wallet_id) {
            return Err(WalletError::Internal(format!(
                "balance write without row lock: {}",
                wallet_id
            )));
        }
        self.staged_balances.insert(wallet_id, new_balance);
        Ok(())
    }

    async fn append_entry(&mut self, entry: &TransactionLogEntry) -> Result<()> {
        self.staged_entries.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = *self;

        // Mirror of the schema's balance check; staged writes are refused
        // in full before any of them is applied.
        for (wallet_id, balance) in this.staged_balances.iter() {
            if *balance < 0 {
                return Err(WalletError::Internal(format!(
                    "negative balance commit refused for wallet {}",
                    wallet_id
                )));
            }
        }

        let now = Utc::now();
        for (wallet_id, balance) in this.staged_balances {
            let guard = this.held.get_mut(&wallet_id).ok_or_else(|| {
                WalletError::Internal(format!("staged write for unlocked wallet {}", wallet_id))
            })?;
            guard.balance = balance;
            guard.updated_at = now;
        }

        if !this.staged_entries.is_empty() {
            this.log.write().await.append(&mut this.staged_entries);
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // Dropping the guards releases the rows; staged writes are discarded.
        Ok(())
    }
}
