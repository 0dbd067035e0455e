//! NATS JetStream client
//!
//! One stream carries every wallet event subject. Retention is work-queue:
//! a message is dropped once the consumer acknowledges it, and the
//! duplicate window lets the broker drop republished transaction ids.

use crate::error::{Error, Result};
use async_nats::jetstream::{
    stream::{Config as StreamConfig, RetentionPolicy, StorageType},
    Context as JetStreamContext,
};
use std::time::Duration;
use tracing::info;

/// Stream and subject names used by the wallet platform
pub mod subjects {
    /// Stream holding all wallet events
    pub const STREAM: &str = "WALLET_TRANSFERS";

    /// Subject filter covering every wallet event
    pub const WILDCARD: &str = "wallet.transfers.>";

    /// Subject for committed transfers
    pub const TRANSFERS_COMPLETED: &str = "wallet.transfers.completed";
}

/// Broker-side deduplication window for republished events
const DUPLICATE_WINDOW: Duration = Duration::from_secs(300);

/// Handle to a NATS server with JetStream enabled
pub struct NatsClient {
    context: JetStreamContext,
}

impl NatsClient {
    /// Connect to the NATS server at `url`
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS JetStream at {}", url);

        let client = async_nats::connect(url)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        let context = async_nats::jetstream::new(client);

        Ok(Self { context })
    }

    /// Create the wallet event stream if it does not exist yet
    pub async fn ensure_transfer_stream(&self) -> Result<()> {
        let config = StreamConfig {
            name: subjects::STREAM.to_string(),
            description: Some("Committed wallet transfer events".to_string()),
            subjects: vec![subjects::WILDCARD.to_string()],
            retention: RetentionPolicy::WorkQueue,
            max_messages: 1_000_000,
            max_age: Duration::from_secs(7 * 24 * 3600),
            storage: StorageType::File,
            num_replicas: 1,
            duplicate_window: DUPLICATE_WINDOW,
            ..Default::default()
        };

        self.context
            .get_or_create_stream(config)
            .await
            .map_err(|e| Error::Stream(e.to_string()))?;

        info!("Stream {} ready", subjects::STREAM);
        Ok(())
    }

    /// JetStream context for publishing and consumer creation
    pub fn jetstream(&self) -> &JetStreamContext {
        &self.context
    }
}
