//! Error taxonomy for wallet operations

use thiserror::Error;
use uuid::Uuid;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, WalletError>;

/// Wallet operation error
#[derive(Error, Debug)]
pub enum WalletError {
    /// Transfer amount was zero or negative
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Sender and receiver refer to the same wallet
    #[error("Transfer to self: {0}")]
    SelfTransfer(Uuid),

    /// Wallet does not exist
    #[error("Wallet not found: {0}")]
    WalletNotFound(Uuid),

    /// Sender balance cannot cover the amount
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount the operation needed
        required: i64,
        /// Balance at the time of the check
        available: i64,
    },

    /// Row lock was not acquired within the configured wait
    #[error("Lock wait timed out for wallet {0}")]
    LockTimeout(Uuid),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cache error
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Whether the caller may retry the operation after backing off.
    ///
    /// Business rejections (insufficient funds, validation, missing wallets)
    /// are terminal; only contention-induced failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::LockTimeout(_))
    }
}
