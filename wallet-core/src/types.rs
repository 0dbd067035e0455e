//! Core types for the wallet ledger
//!
//! Balances are integer amounts in the minor currency unit. All monetary
//! movement is recorded as append-only transaction log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// A user-owned wallet holding a single balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    /// Unique wallet ID
    pub id: Uuid,

    /// Owning user
    pub owner_id: Uuid,

    /// Balance in minor currency units, never negative
    pub balance: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last balance update
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a wallet with a zero balance
    pub fn new(owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            balance: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kind of movement a log entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Wallet-to-wallet movement
    Transfer,
    /// External funds in, no sender wallet
    Deposit,
    /// External funds out, no receiver wallet
    Withdrawal,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Transfer => write!(f, "TRANSFER"),
            EntryType::Deposit => write!(f, "DEPOSIT"),
            EntryType::Withdrawal => write!(f, "WITHDRAWAL"),
        }
    }
}

/// Immutable record of one committed movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TransactionLogEntry {
    /// Unique entry ID, doubles as the transaction ID on the wire
    pub id: Uuid,

    /// Debited wallet, absent for deposits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Uuid>,

    /// Credited wallet, absent for withdrawals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<Uuid>,

    /// Moved amount in minor units, always positive
    pub amount: i64,

    /// Movement kind
    #[serde(rename = "type")]
    pub entry_type: EntryType,

    /// Commit timestamp
    pub created_at: DateTime<Utc>,
}

impl TransactionLogEntry {
    /// Entry for a wallet-to-wallet transfer
    pub fn transfer(sender_id: Uuid, receiver_id: Uuid, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: Some(sender_id),
            receiver_id: Some(receiver_id),
            amount,
            entry_type: EntryType::Transfer,
            created_at: Utc::now(),
        }
    }

    /// Entry for external funds credited to a wallet
    pub fn deposit(receiver_id: Uuid, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: None,
            receiver_id: Some(receiver_id),
            amount,
            entry_type: EntryType::Deposit,
            created_at: Utc::now(),
        }
    }

    /// Entry for external funds debited from a wallet
    pub fn withdrawal(sender_id: Uuid, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: Some(sender_id),
            receiver_id: None,
            amount,
            entry_type: EntryType::Withdrawal,
            created_at: Utc::now(),
        }
    }
}

/// Event emitted after a transfer commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    /// ID of the committed log entry
    pub transaction_id: Uuid,

    /// Debited wallet
    pub sender_id: Uuid,

    /// Credited wallet
    pub receiver_id: Uuid,

    /// Transferred amount in minor units
    pub amount: i64,
}
