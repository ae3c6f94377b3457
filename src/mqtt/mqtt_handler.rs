use std::time::Duration;

use chrono::Local;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::MqttConfig;
use super::error::MqttError;
use super::message_manager::MQTTMessage;

const REQUEST_CAPACITY: usize = 100;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);
const MAX_ERROR_MESSAGES: usize = 10;

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Broker refused the CONNECT
    Failed,
    Reconnecting,
}

#[derive(Clone, Debug, Default)]
pub struct MQTTStatus {
    pub connection_state: ConnectionState,
    pub error_messages: Vec<String>,
    pub messages_received: usize,
    pub last_activity: Option<chrono::DateTime<chrono::Local>>,
}

impl MQTTStatus {
    fn record_error(&mut self, message: String) {
        if self.error_messages.len() == MAX_ERROR_MESSAGES {
            self.error_messages.remove(0);
        }
        self.error_messages.push(message);
    }
}

/// Unstarted broker connection.
///
/// Holds the client/event-loop pair built from the configuration; nothing
/// touches the network until [`MqttHandler::start`] spawns the event loop.
pub struct MqttHandler {
    status: MQTTStatus,
    client: AsyncClient,
    event_loop: EventLoop,
    config: MqttConfig,
}

impl MqttHandler {
    pub fn new(config: MqttConfig, client_suffix: &str) -> Self {
        let client_id = format!("{}-{}", config.client_id, client_suffix);
        let mut mqtt_options = MqttOptions::new(client_id, config.host.clone(), config.port);
        mqtt_options.set_keep_alive(config.keep_alive());
        if let (Some(user), Some(pw)) = (&config.user, &config.password) {
            mqtt_options.set_credentials(user.clone(), pw.clone());
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        let status = MQTTStatus {
            connection_state: ConnectionState::Connecting,
            ..MQTTStatus::default()
        };

        MqttHandler {
            status,
            client,
            event_loop,
            config,
        }
    }

    /// Spawns the event loop and returns the live link.
    ///
    /// `subscriptions` are (re)issued on every CONNACK, so they survive
    /// reconnects. Incoming publishes are forwarded to `inbound` when given.
    pub fn start(
        self,
        subscriptions: Vec<String>,
        inbound: Option<mpsc::Sender<MQTTMessage>>,
    ) -> MqttLink {
        info!("Connecting to MQTT broker at {}", self.config.address());
        let (status_tx, status_rx) = watch::channel(self.status);
        let shutdown = CancellationToken::new();

        let task_handle = tokio::spawn(run_event_loop(
            self.event_loop,
            self.client.clone(),
            subscriptions,
            inbound,
            status_tx,
            shutdown.clone(),
        ));

        MqttLink {
            client: self.client,
            status: status_rx,
            shutdown,
            task_handle: Some(task_handle),
        }
    }
}

/// Running broker connection
///
/// Dropping the link cancels the event loop; [`MqttLink::shutdown`] also
/// sends a DISCONNECT first.
pub struct MqttLink {
    client: AsyncClient,
    status: watch::Receiver<MQTTStatus>,
    shutdown: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl MqttLink {
    pub async fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> Result<(), MqttError> {
        debug!("Publishing to {}", topic);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }

    pub async fn publish_json<T: Serialize>(&self, topic: &str, body: &T) -> Result<(), MqttError> {
        let payload = serde_json::to_string(body)?;
        self.publish(topic, payload).await
    }

    pub fn status(&self) -> watch::Receiver<MQTTStatus> {
        self.status.clone()
    }

    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), MqttError> {
        let mut status = self.status.clone();
        tokio::time::timeout(
            timeout,
            status.wait_for(|s| s.connection_state == ConnectionState::Connected),
        )
        .await
        .map_err(|_| MqttError::ConnectTimeout(timeout))?
        .map_err(|_| MqttError::ChannelClosed)?;
        Ok(())
    }

    /// Disconnects from the broker and joins the event loop task.
    pub async fn shutdown(mut self) {
        info!("Disconnecting from MQTT broker");
        // the request queue may be full while the broker is unreachable
        if let Err(e) = self.client.try_disconnect() {
            warn!("Failed to queue DISCONNECT: {}", e);
        }

        let Some(mut handle) = self.task_handle.take() else {
            return;
        };
        match tokio::time::timeout(DISCONNECT_GRACE, &mut handle).await {
            Ok(Ok(())) => debug!("MQTT event loop finished"),
            Ok(Err(e)) => error!("MQTT event loop panicked: {}", e),
            Err(_) => {
                warn!("MQTT event loop did not stop in time, cancelling");
                self.shutdown.cancel();
                if let Err(e) = handle.await {
                    error!("MQTT event loop panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    subscriptions: Vec<String>,
    mut inbound: Option<mpsc::Sender<MQTTMessage>>,
    status_tx: watch::Sender<MQTTStatus>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("MQTT event loop cancelled");
                break;
            }
            event = event_loop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("Connected to MQTT broker ({:?})", ack.code);
                status_tx.send_modify(|s| {
                    s.connection_state = ConnectionState::Connected;
                    s.last_activity = Some(Local::now());
                });
                // only this task drains the request queue, so never wait on it here
                for topic in &subscriptions {
                    debug!("Subscribing to {}", topic);
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                        warn!("Failed to subscribe to {}: {}", topic, e);
                        status_tx.send_modify(|s| {
                            s.record_error(format!("subscribe {} failed: {}", topic, e))
                        });
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = MQTTMessage::from_payload(publish.topic.clone(), &publish.payload);
                debug!("Received message on {}", msg.topic);
                status_tx.send_modify(|s| {
                    s.messages_received += 1;
                    s.last_activity = Some(Local::now());
                });
                if let Some(tx) = &inbound {
                    if tx.send(msg).await.is_err() {
                        warn!("Inbound message receiver dropped, no longer forwarding");
                        inbound = None;
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("Disconnected from MQTT broker");
                break;
            }
            Ok(other) => debug!("MQTT event: {:?}", other),
            Err(ConnectionError::ConnectionRefused(code)) => {
                error!("MQTT broker refused connection: {:?}", code);
                status_tx.send_modify(|s| {
                    s.connection_state = ConnectionState::Failed;
                    s.record_error(format!("connection refused: {:?}", code));
                });
                if wait_or_cancel(&shutdown).await {
                    break;
                }
            }
            Err(e) => {
                error!("MQTT connection error: {}", e);
                status_tx.send_modify(|s| {
                    s.connection_state = ConnectionState::Reconnecting;
                    s.record_error(e.to_string());
                });
                if wait_or_cancel(&shutdown).await {
                    break;
                }
            }
        }
    }

    status_tx.send_modify(|s| s.connection_state = ConnectionState::Disconnected);
}

/// Sleeps before the next reconnect attempt; `true` when cancelled meanwhile.
async fn wait_or_cancel(shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(RECONNECT_DELAY) => false,
    }
}
