//! Async transfer event worker
//!
//! Pulls committed transfer events from a durable JetStream consumer and
//! hands them to a [`TransferHandler`]. Acknowledgment is manual:
//!
//! - handled events are acked and leave the work queue
//! - handler failures are nak'd for broker redelivery, up to `max_deliver`
//! - undecodable payloads are terminated so they are never redelivered
//!
//! The worker itself never retries in process; redelivery is the broker's
//! job.

use crate::client::{subjects, NatsClient};
use crate::error::{Error, Result};
use async_nats::jetstream::{self, consumer, AckKind};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use wallet_core::TransferEvent;

/// Processes one committed transfer event
#[async_trait]
pub trait TransferHandler: Send + Sync {
    /// Handle the event; an error requests broker redelivery
    async fn handle(&self, event: TransferEvent) -> Result<()>;
}

/// Default handler: emits a notification log line per transfer
pub struct NotificationHandler;

/// Stand-in for calling a downstream notification service
const NOTIFICATION_LATENCY: Duration = Duration::from_millis(50);

#[async_trait]
impl TransferHandler for NotificationHandler {
    async fn handle(&self, event: TransferEvent) -> Result<()> {
        tokio::time::sleep(NOTIFICATION_LATENCY).await;
        info!(
            transaction_id = %event.transaction_id,
            sender_id = %event.sender_id,
            receiver_id = %event.receiver_id,
            amount = event.amount,
            "transfer completed notification"
        );
        Ok(())
    }
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Durable consumer name; restarts resume from the same cursor
    pub durable_name: String,

    /// How long the broker waits for an ack before redelivering
    pub ack_wait: Duration,

    /// Max delivery attempts per message
    pub max_deliver: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            durable_name: "wallet-transfer-worker".to_string(),
            ack_wait: Duration::from_secs(30),
            max_deliver: 3,
        }
    }
}

/// Durable consumer loop over committed transfer events
pub struct TransferWorker {
    client: Arc<NatsClient>,
    config: WorkerConfig,
    handler: Arc<dyn TransferHandler>,
}

impl TransferWorker {
    /// Create a worker over an established client
    pub fn new(
        client: Arc<NatsClient>,
        config: WorkerConfig,
        handler: Arc<dyn TransferHandler>,
    ) -> Self {
        Self {
            client,
            config,
            handler,
        }
    }

    /// Pull and process events until `shutdown` flips to true.
    ///
    /// A message already being processed when the signal arrives is
    /// finished and acknowledged before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.client.ensure_transfer_stream().await?;

        let consumer_config = consumer::pull::Config {
            durable_name: Some(self.config.durable_name.clone()),
            filter_subject: subjects::TRANSFERS_COMPLETED.to_string(),
            ack_policy: consumer::AckPolicy::Explicit,
            ack_wait: self.config.ack_wait,
            max_deliver: self.config.max_deliver,
            deliver_policy: consumer::DeliverPolicy::All,
            ..Default::default()
        };

        let consumer = self
            .client
            .jetstream()
            .get_stream(subjects::STREAM)
            .await
            .map_err(|e| Error::Stream(e.to_string()))?
            .create_consumer(consumer_config)
            .await
            .map_err(|e| Error::Consumer(e.to_string()))?;

        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| Error::Subscribe(e.to_string()))?;

        info!(
            durable_name = %self.config.durable_name,
            subject = subjects::TRANSFERS_COMPLETED,
            "transfer worker started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    match changed {
                        Ok(()) if !*shutdown.borrow() => continue,
                        _ => {
                            info!("Shutdown signal received, draining transfer worker");
                            break;
                        }
                    }
                }
                next = messages.next() => {
                    match next {
                        Some(Ok(msg)) => self.process(msg).await,
                        Some(Err(e)) => {
                            error!(error = %e, "transfer consumer pull failed");
                        }
                        None => {
                            warn!("transfer consumer stream ended");
                            break;
                        }
                    }
                }
            }
        }

        info!("transfer worker stopped");
        Ok(())
    }

    async fn process(&self, msg: jetstream::Message) {
        match disposition_for(self.handler.as_ref(), &msg.payload).await {
            Disposition::Ack => {
                if let Err(e) = msg.ack().await {
                    error!(error = %e, "failed to ack message");
                }
            }
            Disposition::Nak => {
                if let Err(e) = msg.ack_with(AckKind::Nak(None)).await {
                    error!(error = %e, "failed to nak message");
                }
            }
            Disposition::Term => {
                // Term keeps the poison message out of the redelivery loop.
                if let Err(e) = msg.ack_with(AckKind::Term).await {
                    error!(error = %e, "failed to terminate bad message");
                }
            }
        }
    }
}

/// Acknowledgment owed to the broker for one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Handled; leaves the work queue
    Ack,
    /// Handler failed; redeliver up to `max_deliver`
    Nak,
    /// Payload can never be handled; never redeliver
    Term,
}

/// Decode one payload and run the handler, deciding the acknowledgment.
/// Kept apart from the JetStream plumbing so the decision is testable
/// without a broker.
async fn disposition_for(handler: &dyn TransferHandler, payload: &[u8]) -> Disposition {
    let event: TransferEvent = match serde_json::from_slice(payload) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "undecodable transfer event, terminating message");
            return Disposition::Term;
        }
    };

    let transaction_id = event.transaction_id;
    match handler.handle(event).await {
        Ok(()) => Disposition::Ack,
        Err(e) => {
            error!(
                transaction_id = %transaction_id,
                error = %e, "transfer event handling failed, requesting redelivery"
            );
            Disposition::Nak
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.durable_name, "wallet-transfer-worker");
        assert_eq!(config.ack_wait, Duration::from_secs(30));
        assert_eq!(config.max_deliver, 3);
    }

    #[tokio::test]
    async fn test_notification_handler_accepts_event() {
        let event = TransferEvent {
            transaction_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            amount: 40,
        };
        assert!(NotificationHandler.handle(event).await.is_ok());
    }

    /// Handler double whose downstream is always unavailable
    struct RejectingHandler;

    #[async_trait]
    impl TransferHandler for RejectingHandler {
        async fn handle(&self, _event: TransferEvent) -> Result<()> {
            Err(Error::Subscribe("downstream unavailable".to_string()))
        }
    }

    fn event_payload(amount: i64) -> Vec<u8> {
        serde_json::to_vec(&TransferEvent {
            transaction_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            amount,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_terminated() {
        let bad: [&[u8]; 3] = [
            b"not json",
            b"{}",
            br#"{"transaction_id":"x","sender_id":"y","receiver_id":"z","amount":1}"#,
        ];
        for payload in bad {
            assert_eq!(
                disposition_for(&NotificationHandler, payload).await,
                Disposition::Term
            );
        }
    }

    #[tokio::test]
    async fn test_handled_event_is_acked() {
        let payload = event_payload(75);
        assert_eq!(
            disposition_for(&NotificationHandler, &payload).await,
            Disposition::Ack
        );
    }

    #[tokio::test]
    async fn test_handler_failure_requests_redelivery() {
        let payload = event_payload(75);
        assert_eq!(
            disposition_for(&RejectingHandler, &payload).await,
            Disposition::Nak
        );
    }

    #[tokio::test]
    #[ignore] // Requires NATS server
    async fn test_worker_starts_and_drains() {
        let client = Arc::new(
            NatsClient::connect("nats://localhost:4222")
                .await
                .expect("Failed to connect"),
        );
        client.ensure_transfer_stream().await.expect("stream");

        let worker = TransferWorker::new(
            client,
            WorkerConfig::default(),
            Arc::new(NotificationHandler),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { worker.run(rx).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).expect("signal");
        handle.await.expect("join").expect("worker run");
    }
}
