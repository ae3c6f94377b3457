//! Command line tools
//!
//! Each subcommand lives in its own module with a clap `Args` struct and an
//! async `execute` entry point taking the loaded [`AppConfig`].
//!
//! [`AppConfig`]: crate::config::AppConfig

pub mod client;
pub mod monitor;
pub mod replay;
pub mod server;
pub mod smoke;

use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use serde_json::json;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::mqtt::{MQTTMessage, MqttHandler, MqttLink};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const INBOUND_CAPACITY: usize = 100;

/// Connects a tool to the broker and waits for the CONNACK.
async fn connect(
    config: &AppConfig,
    suffix: &str,
    subscriptions: Vec<String>,
) -> Result<(MqttLink, mpsc::Receiver<MQTTMessage>)> {
    let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
    let link = MqttHandler::new(config.broker.clone(), suffix).start(subscriptions, Some(tx));

    link.wait_connected(CONNECT_TIMEOUT)
        .await
        .map_err(|e| eyre!("Failed to connect to {}: {}", config.broker.address(), e))?;
    Ok((link, rx))
}

/// Publishes a command request on `<ns>/action/request`.
async fn send_command(
    link: &MqttLink,
    config: &AppConfig,
    command: i64,
    nonce: &str,
) -> Result<()> {
    let topic = config.topics.action_request();
    link.publish_json(&topic, &json!({ "command": command, "nonce": nonce }))
        .await
        .map_err(|e| eyre!("Failed to publish to {}: {}", topic, e))
}
