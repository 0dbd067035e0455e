//! Transfer event publisher with retry logic

use crate::client::{subjects, NatsClient};
use crate::error::{Error, Result};
use async_nats::HeaderMap;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use wallet_core::{EventPublisher, TransferEvent, WalletError};

/// Publisher configuration
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Max attempts per event before giving up
    pub max_retry_attempts: u32,

    /// Initial retry delay
    pub initial_retry_delay: Duration,

    /// Max retry delay
    pub max_retry_delay: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            initial_retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(2),
        }
    }
}

/// Publishes committed transfer events to JetStream.
///
/// Delivery is at-least-once: each event carries its transaction id as the
/// `Nats-Msg-Id` header, so the broker drops duplicates republished within
/// the stream's duplicate window.
pub struct NatsTransferPublisher {
    client: Arc<NatsClient>,
    config: PublisherConfig,
}

impl NatsTransferPublisher {
    /// Create a publisher over an established client
    pub fn new(client: Arc<NatsClient>, config: PublisherConfig) -> Self {
        Self { client, config }
    }

    /// Publish one event, retrying with exponential backoff
    pub async fn publish_event(&self, event: &TransferEvent) -> Result<()> {
        let payload: bytes::Bytes = serde_json::to_vec(event)?.into();

        let msg_id = event.transaction_id.to_string();
        let mut headers = HeaderMap::new();
        headers.insert("Nats-Msg-Id", msg_id.as_str());

        retry_with_backoff(&self.config, &msg_id, || {
            self.publish_once(headers.clone(), payload.clone())
        })
        .await
    }

    /// Single publish attempt, waiting for the broker ack
    async fn publish_once(&self, headers: HeaderMap, payload: bytes::Bytes) -> Result<()> {
        self.client
            .jetstream()
            .publish_with_headers(subjects::TRANSFERS_COMPLETED, headers, payload)
            .await
            .map_err(|e| Error::Publish(e.to_string()))?
            .await
            .map_err(|e| Error::Publish(format!("Publish ack failed: {}", e)))?;

        Ok(())
    }
}

/// Drive `attempt` until it succeeds or the attempt budget is spent,
/// doubling the delay between failures up to `max_retry_delay`.
async fn retry_with_backoff<F, Fut>(
    config: &PublisherConfig,
    msg_id: &str,
    mut attempt: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let mut attempts = 0;
    let mut delay = config.initial_retry_delay;

    loop {
        attempts += 1;

        match attempt().await {
            Ok(()) => {
                if attempts > 1 {
                    info!(transaction_id = %msg_id, attempts, "event published after retry");
                }
                return Ok(());
            }
            Err(e) => {
                if attempts >= config.max_retry_attempts {
                    error!(
                        transaction_id = %msg_id,
                        attempts, error = %e, "event publish gave up"
                    );
                    return Err(e);
                }

                warn!(
                    transaction_id = %msg_id,
                    attempts, retry_in = ?delay, error = %e, "event publish failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(config.max_retry_delay);
            }
        }
    }
}

#[async_trait]
impl EventPublisher for NatsTransferPublisher {
    async fn publish(&self, event: &TransferEvent) -> wallet_core::Result<()> {
        self.publish_event(event)
            .await
            .map_err(|e| WalletError::Internal(e.to_string()))
    }
}
