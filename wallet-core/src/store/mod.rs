//! Wallet persistence contracts
//!
//! All balance mutation goes through a [`UnitOfWork`]: an atomic scope that
//! carries the locking reads, the staged balance writes and the transaction
//! log append bound to one commit boundary. Operations outside a scope are
//! plain reads and the wallet insert.

use crate::error::Result;
use crate::types::{TransactionLogEntry, Wallet};
use async_trait::async_trait;
use futures::future::BoxFuture;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryWalletStore;
pub use postgres::PgWalletStore;

/// Wallet persistence backend
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Insert a fresh zero-balance wallet for the owner
    async fn create(&self, owner_id: Uuid) -> Result<Wallet>;

    /// Read a wallet outside any scope; not subject to the lock timeout
    async fn get(&self, wallet_id: Uuid) -> Result<Wallet>;

    /// Open an atomic scope
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    /// Log entries touching the wallet, newest first
    async fn entries_for_wallet(
        &self,
        wallet_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TransactionLogEntry>>;

    /// Most recent log entries across all wallets, newest first
    async fn recent_entries(&self, limit: i64) -> Result<Vec<TransactionLogEntry>>;
}

/// One atomic scope over the wallet store.
///
/// Row locks taken by [`get_for_update`](UnitOfWork::get_for_update) are held
/// until the scope ends. `commit` makes every staged write durable at once;
/// `rollback` discards all of them. Dropping a scope without committing
/// behaves like `rollback`.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Read a wallet under an exclusive row lock.
    ///
    /// Waits at most the store's configured lock timeout and surfaces
    /// [`WalletError::LockTimeout`](crate::WalletError::LockTimeout) on expiry.
    async fn get_for_update(&mut self, wallet_id: Uuid) -> Result<Wallet>;

    /// Stage a balance write for a row locked earlier in this scope
    async fn update_balance(&mut self, wallet_id: Uuid, new_balance: i64) -> Result<()>;

    /// Stage a transaction log append
    async fn append_entry(&mut self, entry: &TransactionLogEntry) -> Result<()>;

    /// Commit every staged write and release the locks
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every staged write and release the locks
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Run `f` inside a unit of work, committing iff it returns success.
///
/// Any error from the closure rolls the scope back before being returned,
/// so a failed operation leaves no partial writes behind.
pub async fn run_in_unit_of_work<T, F>(store: &dyn WalletStore, f: F) -> Result<T>
where
    T: Send,
    F: for<'a> FnOnce(&'a mut dyn UnitOfWork) -> BoxFuture<'a, Result<T>> + Send,
{
    let mut uow = store.begin().await?;

    match f(uow.as_mut()).await {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed after aborted scope");
            }
            Err(err)
        }
    }
}
