//! Wallet ledger core
//!
//! Wallets, the append-only transaction log and the transfer engine.
//!
//! # Invariants
//!
//! - Balances never go negative, under any interleaving
//! - Money conservation: a transfer debits and credits atomically
//! - Canonical lock ordering: pair locks are deadlock-free
//! - Log entries are append-only, never modified or deleted

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod cache;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;

// Re-exports
pub use cache::{MemoryWalletCache, RedisWalletCache, WalletCache};
pub use engine::{EventPublisher, TransferEngine};
pub use error::{Result, WalletError};
pub use store::{MemoryWalletStore, PgWalletStore, UnitOfWork, WalletStore};
pub use types::{EntryType, TransactionLogEntry, TransferEvent, Wallet};
