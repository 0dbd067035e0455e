//! Transfer engine
//!
//! Orchestrates every service operation: validation happens before any lock
//! or scope is taken, balance movement and the log append share one atomic
//! scope, and the cache invalidation plus event publish run after commit on
//! a best-effort basis.

use crate::cache::WalletCache;
use crate::error::{Result, WalletError};
use crate::store::{run_in_unit_of_work, WalletStore};
use crate::types::{TransactionLogEntry, TransferEvent, Wallet};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Sink for committed transfer events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event, at-least-once
    async fn publish(&self, event: &TransferEvent) -> Result<()>;
}

/// Service facade over the store, the cache and the event publisher
pub struct TransferEngine {
    store: Arc<dyn WalletStore>,
    cache: Arc<dyn WalletCache>,
    publisher: Arc<dyn EventPublisher>,
    cache_ttl: Duration,
}

impl TransferEngine {
    /// Wire an engine from its collaborators
    pub fn new(
        store: Arc<dyn WalletStore>,
        cache: Arc<dyn WalletCache>,
        publisher: Arc<dyn EventPublisher>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            cache_ttl,
        }
    }

    /// Create a zero-balance wallet for the owner
    pub async fn create_wallet(&self, owner_id: Uuid) -> Result<Wallet> {
        let wallet = self.store.create(owner_id).await?;
        info!(wallet_id = %wallet.id, owner_id = %owner_id, "wallet created");
        Ok(wallet)
    }

    /// Wallet snapshot, read through the cache.
    ///
    /// A cache miss falls through to the store and fills the cache with the
    /// configured TTL; a failed fill only degrades the next read.
    pub async fn get_balance(&self, wallet_id: Uuid) -> Result<Wallet> {
        if let Some(wallet) = self.cache.get(wallet_id).await {
            return Ok(wallet);
        }

        let wallet = self.store.get(wallet_id).await?;
        if let Err(e) = self.cache.set(&wallet, self.cache_ttl).await {
            warn!(wallet_id = %wallet_id, error = %e, "wallet cache fill failed");
        }
        Ok(wallet)
    }

    /// Move `amount` from `sender_id` to `receiver_id`.
    ///
    /// Rejections before the scope opens (non-positive amount, self
    /// transfer) have zero side effects. Both balance writes and the log
    /// entry commit atomically; insufficient funds roll the scope back with
    /// both balances untouched.
    pub async fn transfer(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        amount: i64,
    ) -> Result<TransactionLogEntry> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        if sender_id == receiver_id {
            return Err(WalletError::SelfTransfer(sender_id));
        }

        let entry = run_in_unit_of_work(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let (first, second) = lock_order(sender_id, receiver_id);
                let first_row = uow.get_for_update(first).await?;
                let second_row = uow.get_for_update(second).await?;

                let (sender, receiver) = if first_row.id == sender_id {
                    (first_row, second_row)
                } else {
                    (second_row, first_row)
                };

                if sender.balance < amount {
                    return Err(WalletError::InsufficientFunds {
                        required: amount,
                        available: sender.balance,
                    });
                }

                let credited = receiver.balance.checked_add(amount).ok_or_else(|| {
                    WalletError::Internal(format!("balance overflow for wallet {}", receiver.id))
                })?;

                uow.update_balance(sender.id, sender.balance - amount).await?;
                uow.update_balance(receiver.id, credited).await?;

                let entry = TransactionLogEntry::transfer(sender_id, receiver_id, amount);
                uow.append_entry(&entry).await?;
                Ok(entry)
            })
        })
        .await?;

        // The transfer is durable from here on; cache and event delivery
        // are best-effort and must not fail it.
        self.invalidate_cached(sender_id).await;
        self.invalidate_cached(receiver_id).await;

        let event = TransferEvent {
            transaction_id: entry.id,
            sender_id,
            receiver_id,
            amount,
        };
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(transaction_id = %entry.id, error = %e, "transfer event publish failed");
        }

        info!(
            transaction_id = %entry.id,
            sender_id = %sender_id,
            receiver_id = %receiver_id,
            amount,
            "transfer committed"
        );
        Ok(entry)
    }

    /// Credit external funds to a wallet
    pub async fn deposit(&self, wallet_id: Uuid, amount: i64) -> Result<TransactionLogEntry> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let entry = run_in_unit_of_work(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let wallet = uow.get_for_update(wallet_id).await?;
                let credited = wallet.balance.checked_add(amount).ok_or_else(|| {
                    WalletError::Internal(format!("balance overflow for wallet {}", wallet_id))
                })?;
                uow.update_balance(wallet_id, credited).await?;

                let entry = TransactionLogEntry::deposit(wallet_id, amount);
                uow.append_entry(&entry).await?;
                Ok(entry)
            })
        })
        .await?;

        self.invalidate_cached(wallet_id).await;
        info!(transaction_id = %entry.id, wallet_id = %wallet_id, amount, "deposit committed");
        Ok(entry)
    }

    /// Debit external funds from a wallet
    pub async fn withdraw(&self, wallet_id: Uuid, amount: i64) -> Result<TransactionLogEntry> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let entry = run_in_unit_of_work(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let wallet = uow.get_for_update(wallet_id).await?;
                if wallet.balance < amount {
                    return Err(WalletError::InsufficientFunds {
                        required: amount,
                        available: wallet.balance,
                    });
                }
                uow.update_balance(wallet_id, wallet.balance - amount).await?;

                let entry = TransactionLogEntry::withdrawal(wallet_id, amount);
                uow.append_entry(&entry).await?;
                Ok(entry)
            })
        })
        .await?;

        self.invalidate_cached(wallet_id).await;
        info!(transaction_id = %entry.id, wallet_id = %wallet_id, amount, "withdrawal committed");
        Ok(entry)
    }

    async fn invalidate_cached(&self, wallet_id: Uuid) {
        if let Err(e) = self.cache.invalidate(wallet_id).await {
            warn!(wallet_id = %wallet_id, error = %e, "cache invalidation failed after commit");
        }
    }
}

/// Canonical pair ordering: rows are locked in ascending UUID order
/// regardless of transfer direction, so opposing transfers over the same
/// pair cannot each hold one row while waiting on the other.
fn lock_order(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryWalletCache;
    use crate::store::MemoryWalletStore;
    use crate::types::EntryType;
    use tokio::sync::RwLock;

    struct RecordingPublisher {
        events: RwLock<Vec<TransferEvent>>,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self {
                events: RwLock::new(Vec::new()),
            }
        }

        async fn published(&self) -> Vec<TransferEvent> {
            self.events.read().await.clone()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: &TransferEvent) -> Result<()> {
            self.events.write().await.push(event.clone());
            Ok(())
        }
    }

    struct Fixture {
        engine: TransferEngine,
        store: Arc<MemoryWalletStore>,
        cache: Arc<MemoryWalletCache>,
        publisher: Arc<RecordingPublisher>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryWalletStore::new());
        let cache = Arc::new(MemoryWalletCache::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let engine = TransferEngine::new(
            store.clone(),
            cache.clone(),
            publisher.clone(),
            Duration::from_secs(60),
        );
        Fixture {
            engine,
            store,
            cache,
            publisher,
        }
    }

    #[tokio::test]
    async fn transfer_moves_funds_atomically() {
        let f = fixture();
        let sender = f.engine.create_wallet(Uuid::new_v4()).await.unwrap();
        let receiver = f.engine.create_wallet(Uuid::new_v4()).await.unwrap();
        f.engine.deposit(sender.id, 1000).await.unwrap();

        let entry = f.engine.transfer(sender.id, receiver.id, 400).await.unwrap();

        assert_eq!(entry.entry_type, EntryType::Transfer);
        assert_eq!(entry.sender_id, Some(sender.id));
        assert_eq!(entry.receiver_id, Some(receiver.id));
        assert_eq!(entry.amount, 400);

        assert_eq!(f.store.get(sender.id).await.unwrap().balance, 600);
        assert_eq!(f.store.get(receiver.id).await.unwrap().balance, 400);

        let events = f.publisher.published().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transaction_id, entry.id);
        assert_eq!(events[0].amount, 400);
    }

    #[tokio::test]
    async fn rejection_before_locks_has_no_side_effects() {
        let f = fixture();
        let a = f.engine.create_wallet(Uuid::new_v4()).await.unwrap();
        let b = f.engine.create_wallet(Uuid::new_v4()).await.unwrap();

        let err = f.engine.transfer(a.id, b.id, 0).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(0)));

        let err = f.engine.transfer(a.id, b.id, -7).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(-7)));

        let err = f.engine.transfer(a.id, a.id, 10).await.unwrap_err();
        assert!(matches!(err, WalletError::SelfTransfer(id) if id == a.id));

        assert!(f.store.entries_for_wallet(a.id, 10).await.unwrap().is_empty());
        assert!(f.publisher.published().await.is_empty());

        let metrics = f.cache.metrics().await;
        assert_eq!(metrics.sets, 0);
        assert_eq!(metrics.deletes, 0);
    }

    #[tokio::test]
    async fn insufficient_funds_rolls_back() {
        let f = fixture();
        let sender = f.engine.create_wallet(Uuid::new_v4()).await.unwrap();
        let receiver = f.engine.create_wallet(Uuid::new_v4()).await.unwrap();
        f.engine.deposit(sender.id, 100).await.unwrap();

        let err = f.engine.transfer(sender.id, receiver.id, 250).await.unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientFunds {
                required: 250,
                available: 100
            }
        ));

        assert_eq!(f.store.get(sender.id).await.unwrap().balance, 100);
        assert_eq!(f.store.get(receiver.id).await.unwrap().balance, 0);

        // Only the setup deposit is in the log.
        let entries = f.store.entries_for_wallet(sender.id, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, EntryType::Deposit);
        assert!(f.publisher.published().await.is_empty());
    }

    #[tokio::test]
    async fn transfer_to_missing_wallet_fails() {
        let f = fixture();
        let sender = f.engine.create_wallet(Uuid::new_v4()).await.unwrap();
        f.engine.deposit(sender.id, 50).await.unwrap();

        let ghost = Uuid::new_v4();
        let err = f.engine.transfer(sender.id, ghost, 10).await.unwrap_err();
        assert!(matches!(err, WalletError::WalletNotFound(id) if id == ghost));
        assert_eq!(f.store.get(sender.id).await.unwrap().balance, 50);
    }

    #[tokio::test]
    async fn get_balance_reads_through_and_fills_cache() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let wallet = f.engine.create_wallet(owner).await.unwrap();
        f.engine.deposit(wallet.id, 250).await.unwrap();

        // The miss returns the whole snapshot, not just the number.
        let read = f.engine.get_balance(wallet.id).await.unwrap();
        assert_eq!(read.id, wallet.id);
        assert_eq!(read.owner_id, owner);
        assert_eq!(read.balance, 250);
        let metrics = f.cache.metrics().await;
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.sets, 1);

        let cached = f.engine.get_balance(wallet.id).await.unwrap();
        assert_eq!(cached, read);
        let metrics = f.cache.metrics().await;
        assert_eq!(metrics.hits, 1);
    }

    #[tokio::test]
    async fn transfer_invalidates_both_cached_wallets() {
        let f = fixture();
        let sender = f.engine.create_wallet(Uuid::new_v4()).await.unwrap();
        let receiver = f.engine.create_wallet(Uuid::new_v4()).await.unwrap();
        f.engine.deposit(sender.id, 500).await.unwrap();

        // Prime the cache on both sides.
        assert_eq!(f.engine.get_balance(sender.id).await.unwrap().balance, 500);
        assert_eq!(f.engine.get_balance(receiver.id).await.unwrap().balance, 0);

        f.engine.transfer(sender.id, receiver.id, 200).await.unwrap();

        // Stale entries are gone; the next read observes the new balances.
        assert_eq!(f.cache.get(sender.id).await, None);
        assert_eq!(f.cache.get(receiver.id).await, None);
        assert_eq!(f.engine.get_balance(sender.id).await.unwrap().balance, 300);
        assert_eq!(f.engine.get_balance(receiver.id).await.unwrap().balance, 200);
    }

    #[tokio::test]
    async fn withdraw_checks_funds() {
        let f = fixture();
        let wallet = f.engine.create_wallet(Uuid::new_v4()).await.unwrap();
        f.engine.deposit(wallet.id, 80).await.unwrap();

        let err = f.engine.withdraw(wallet.id, 100).await.unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        assert_eq!(f.store.get(wallet.id).await.unwrap().balance, 80);

        let entry = f.engine.withdraw(wallet.id, 30).await.unwrap();
        assert_eq!(entry.entry_type, EntryType::Withdrawal);
        assert_eq!(entry.receiver_id, None);
        assert_eq!(f.store.get(wallet.id).await.unwrap().balance, 50);
    }

    #[test]
    fn lock_order_is_direction_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(lock_order(a, b), lock_order(b, a));
        assert!(lock_order(a, b).0 <= lock_order(a, b).1);
    }
}
