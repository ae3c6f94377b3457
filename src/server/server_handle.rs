//! Server Handle - single-owner task around the mock [`Server`]
//!
//! The server is moved into one tokio task which is the only code touching
//! the node registry. Inbound MQTT messages and telemetry ticks are processed
//! strictly one at a time; every resulting [`Outbound`] is handed to the
//! publisher through an mpsc channel in order.
//!
//! ```text
//! inbound mpsc ──┐
//!                ├──► Server::handle_message / telemetry_tick ──► outbound mpsc
//! interval ──────┘
//! ```

use std::future::pending;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::events::Outbound;
use super::mock_server::Server;
use crate::mqtt::MQTTMessage;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Server task panicked: {0}")]
    TaskPanicked(String),

    #[error("Server task already shut down")]
    AlreadyShutDown,
}

pub struct ServerHandle {
    task_handle: Option<JoinHandle<Server>>,
    shutdown: CancellationToken,
}

impl ServerHandle {
    /// Moves `server` into its own task.
    ///
    /// `telemetry` of `None` disables periodic value updates. The task ends on
    /// [`ServerHandle::shutdown`] or when the inbound channel closes.
    pub fn spawn(
        server: Server,
        inbound: mpsc::Receiver<MQTTMessage>,
        outbound: mpsc::Sender<Outbound>,
        telemetry: Option<Duration>,
    ) -> Self {
        info!("Spawning mock server task (telemetry every {:?})", telemetry);
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let task_handle = tokio::spawn(run_server(server, inbound, outbound, telemetry, token));
        debug!("Tokio task spawned with handle: {:?}", task_handle);

        Self {
            task_handle: Some(task_handle),
            shutdown,
        }
    }

    /// Stops the task and hands the server back.
    pub async fn shutdown(&mut self) -> Result<Server, ServerError> {
        let handle = self.task_handle.take().ok_or(ServerError::AlreadyShutDown)?;
        self.shutdown.cancel();

        handle
            .await
            .map_err(|e| ServerError::TaskPanicked(e.to_string()))
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_server(
    mut server: Server,
    mut inbound: mpsc::Receiver<MQTTMessage>,
    outbound: mpsc::Sender<Outbound>,
    telemetry: Option<Duration>,
    shutdown: CancellationToken,
) -> Server {
    let mut ticker = telemetry.and_then(telemetry_interval);

    loop {
        let messages = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Mock server shutting down");
                break;
            }
            msg = inbound.recv() => match msg {
                Some(msg) => {
                    debug!("Handling {}", msg);
                    server.handle_message(&msg)
                }
                None => {
                    warn!("Inbound channel closed, stopping mock server");
                    break;
                }
            },
            _ = next_tick(&mut ticker) => server.telemetry_tick(),
        };

        for message in messages {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    warn!("Mock server shutting down with unpublished events");
                    return server;
                }
                sent = outbound.send(message) => {
                    if sent.is_err() {
                        error!("Outbound channel closed, stopping mock server");
                        return server;
                    }
                }
            }
        }
    }

    server
}

/// Telemetry ticker, first tick one period from now.
///
/// Zero disables telemetry, as does a period too long to schedule.
fn telemetry_interval(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let Some(start) = Instant::now().checked_add(period) else {
        warn!("Telemetry interval {:?} is out of range, telemetry disabled", period);
        return None;
    };
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::server::events::EventBody;

    fn channels() -> (
        mpsc::Sender<MQTTMessage>,
        mpsc::Receiver<MQTTMessage>,
        mpsc::Sender<Outbound>,
        mpsc::Receiver<Outbound>,
    ) {
        let (in_tx, in_rx) = mpsc::channel(16);
        let (out_tx, out_rx) = mpsc::channel(16);
        (in_tx, in_rx, out_tx, out_rx)
    }

    #[tokio::test]
    async fn processes_requests_in_order_and_returns_server() {
        let (in_tx, in_rx, out_tx, mut out_rx) = channels();
        let server = Server::new(&AppConfig::default()).unwrap();
        let mut handle = ServerHandle::spawn(server, in_rx, out_tx, None);

        in_tx
            .send(MQTTMessage::from_topic(
                "ozw/action/request",
                r#"{"command":1,"nonce":"bbb"}"#,
            ))
            .await
            .unwrap();
        in_tx
            .send(MQTTMessage::from_topic(
                "ozw/action/request",
                r#"{"command":17,"nonce":"ccc"}"#,
            ))
            .await
            .unwrap();

        let mut nonces = Vec::new();
        for _ in 0..3 {
            let out = out_rx.recv().await.unwrap();
            nonces.push(out.nonce().map(str::to_string));
        }
        assert_eq!(
            nonces,
            vec![Some("bbb".into()), Some("bbb".into()), Some("ccc".into())]
        );

        let server = handle.shutdown().await.unwrap();
        assert_eq!(server.node_count(), 1);
        assert!(matches!(
            handle.shutdown().await,
            Err(ServerError::AlreadyShutDown)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn telemetry_ticks_publish_value_changes() {
        let (_in_tx, in_rx, out_tx, mut out_rx) = channels();
        let mut server = Server::new(&AppConfig::sample()).unwrap();
        server.add_node(Some("Smart Switch 6".into())).unwrap();
        let mut handle =
            ServerHandle::spawn(server, in_rx, out_tx, Some(Duration::from_secs(5)));

        let out = out_rx.recv().await.unwrap();
        assert_eq!(out.topic, "ozw/value/changed");
        assert!(matches!(out.body, EventBody::ValueUpdated { nonce: None, .. }));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_completes_while_outbound_is_full() {
        let (in_tx, in_rx) = mpsc::channel(16);
        let (out_tx, _out_rx) = mpsc::channel(1);
        let watch_tx = out_tx.clone();
        let server = Server::new(&AppConfig::default()).unwrap();
        let mut handle = ServerHandle::spawn(server, in_rx, out_tx, None);

        // an add produces two events, so the second send blocks
        in_tx
            .send(MQTTMessage::from_topic(
                "ozw/action/request",
                r#"{"command":1,"nonce":"bbb"}"#,
            ))
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(3), async {
            while watch_tx.capacity() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("actor never filled the outbound channel");

        let server = tokio::time::timeout(Duration::from_secs(3), handle.shutdown())
            .await
            .expect("shutdown blocked on the outbound channel")
            .unwrap();
        assert_eq!(server.node_count(), 1);
    }

    #[tokio::test]
    async fn oversized_telemetry_interval_disables_telemetry() {
        assert!(telemetry_interval(Duration::from_secs(u64::MAX)).is_none());
        assert!(telemetry_interval(Duration::ZERO).is_none());
        assert!(telemetry_interval(Duration::from_secs(5)).is_some());

        let (in_tx, in_rx, out_tx, mut out_rx) = channels();
        let server = Server::new(&AppConfig::default()).unwrap();
        let mut handle =
            ServerHandle::spawn(server, in_rx, out_tx, Some(Duration::from_secs(u64::MAX)));

        in_tx
            .send(MQTTMessage::from_topic(
                "ozw/action/request",
                r#"{"command":17,"nonce":"ccc"}"#,
            ))
            .await
            .unwrap();
        let out = out_rx.recv().await.unwrap();
        assert_eq!(out.nonce(), Some("ccc"));

        let server = handle.shutdown().await.unwrap();
        assert_eq!(server.node_count(), 0);
    }

    #[tokio::test]
    async fn closed_inbound_channel_stops_the_task() {
        let (in_tx, in_rx, out_tx, _out_rx) = channels();
        let server = Server::new(&AppConfig::default()).unwrap();
        let mut handle = ServerHandle::spawn(server, in_rx, out_tx, None);

        drop(in_tx);
        let server = handle.shutdown().await.unwrap();
        assert_eq!(server.node_count(), 0);
    }
}
