//! Error definitions for the MQTT link

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqttError {
    /// The request could not be queued on the client
    #[error("Client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// Outbound body could not be encoded as JSON
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Timed out after {0:?} waiting for the broker connection")]
    ConnectTimeout(Duration),

    /// The event loop task is gone
    #[error("MQTT event loop terminated")]
    ChannelClosed,
}
