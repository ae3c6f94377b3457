//! # MQTT Link Module
//!
//! Thin wrapper around `rumqttc` shared by the mock gateway and the developer
//! tools. It owns the broker connection lifecycle and nothing else: no topic
//! semantics live here.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker settings (host, port, credentials, keep-alive)
//! ├── error.rs            - MqttError
//! ├── message_manager.rs  - Message representation and rendering
//! └── mqtt_handler.rs     - Event loop task, connection status and shutdown
//! ```
//!
//! ## Connection Lifecycle
//!
//! ```text
//! MqttHandler::new ──► start() ──► MqttLink ──► shutdown()
//!                        │                         │
//!                 spawns event loop          DISCONNECT + join
//! ```
//!
//! The event loop keeps polling after errors, which is how `rumqttc`
//! reconnects; subscriptions are re-issued on every CONNACK. Connection status
//! is published through a `watch` channel so tools can wait for the broker
//! before sending anything.

pub mod config;
pub mod error;
pub mod message_manager;
pub mod mqtt_handler;

pub use config::MqttConfig;
pub use error::MqttError;
pub use message_manager::MQTTMessage;
pub use mqtt_handler::{ConnectionState, MQTTStatus, MqttHandler, MqttLink};
