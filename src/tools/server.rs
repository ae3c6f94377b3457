use clap::Args;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::mqtt::{MqttHandler, MqttLink};
use crate::server::{Outbound, Server, ServerHandle};

const CHANNEL_CAPACITY: usize = 100;

#[derive(Args, Debug)]
pub struct ServerCommand {
    /// Seconds between telemetry rounds (overrides the config, 0 disables)
    #[arg(long)]
    pub publish_interval: Option<u64>,

    /// Start with the simulated Z-Wave network stopped
    #[arg(long)]
    pub network_stopped: bool,
}

/// Runs the mock gateway until Ctrl-C.
pub async fn execute(cmd: ServerCommand, mut config: AppConfig) -> Result<()> {
    if let Some(secs) = cmd.publish_interval {
        config.simulation.publish_interval_secs = secs;
    }
    if cmd.network_stopped {
        config.simulation.start_network = false;
    }

    let server =
        Server::new(&config).map_err(|e| eyre!("Invalid product configuration: {}", e))?;
    info!(
        "Mock gateway serving namespace '{}' with {} product templates",
        config.topics.namespace,
        config.products.len()
    );

    let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(CHANNEL_CAPACITY);

    let link = MqttHandler::new(config.broker.clone(), "server")
        .start(config.topics.server_subscriptions(), Some(inbound_tx));

    let telemetry = match config.simulation.publish_interval_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let mut handle = ServerHandle::spawn(server, inbound_rx, outbound_tx, telemetry);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutdown requested");
                break;
            }
            outbound = outbound_rx.recv() => match outbound {
                Some(outbound) => publish(&link, &outbound).await,
                None => {
                    warn!("Mock server task stopped");
                    break;
                }
            },
        }
    }

    let server = handle
        .shutdown()
        .await
        .map_err(|e| eyre!("Failed to stop mock server: {}", e))?;
    info!(
        "Mock server for '{}' stopped with {} nodes registered (network {})",
        server.topics().namespace,
        server.node_count(),
        if server.gateway().is_network_running() {
            "running"
        } else {
            "stopped"
        }
    );

    // flush what the server produced before it stopped
    while let Ok(outbound) = outbound_rx.try_recv() {
        publish(&link, &outbound).await;
    }
    let status = link.status().borrow().clone();
    info!(
        "Received {} messages, last activity {:?}",
        status.messages_received, status.last_activity
    );
    if !status.error_messages.is_empty() {
        warn!("Recent MQTT errors: {:?}", status.error_messages);
    }
    link.shutdown().await;
    Ok(())
}

async fn publish(link: &MqttLink, outbound: &Outbound) {
    let payload = match outbound.encode() {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to encode event for {}: {}", outbound.topic, e);
            return;
        }
    };
    if let Err(e) = link.publish(&outbound.topic, payload).await {
        error!("Failed to publish to {}: {}", outbound.topic, e);
    }
}
