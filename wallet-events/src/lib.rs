//! NATS JetStream transport for wallet transfer events.
//!
//! Pairs with `wallet-core`: the publisher implements the engine's
//! [`EventPublisher`](wallet_core::EventPublisher) seam, and the worker
//! consumes what the publisher emits.
//!
//! Delivery model:
//! - at-least-once publish with broker-side dedup by transaction id
//! - durable work-queue consumer with explicit acks
//! - poison payloads are terminated, never silently dropped

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod error;
pub mod publisher;
pub mod worker;

pub use client::{subjects, NatsClient};
pub use error::{Error, Result};
pub use publisher::{NatsTransferPublisher, PublisherConfig};
pub use worker::{NotificationHandler, TransferHandler, TransferWorker, WorkerConfig};
