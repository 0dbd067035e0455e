//! Wallet ledger service: HTTP API, background worker host and bootstrap.

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
