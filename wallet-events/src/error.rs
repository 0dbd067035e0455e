//! Event transport errors

use thiserror::Error;

/// Result alias for event transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the NATS client, publisher and worker
#[derive(Error, Debug)]
pub enum Error {
    /// Connecting to the NATS server failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Creating or looking up a stream failed
    #[error("Stream error: {0}")]
    Stream(String),

    /// Creating a durable consumer failed
    #[error("Consumer error: {0}")]
    Consumer(String),

    /// Publishing a message or awaiting its broker ack failed
    #[error("Publish error: {0}")]
    Publish(String),

    /// Pulling messages from the consumer failed
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    /// Event payload could not be serialized or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
