//! Outbound events published by the mock gateway

use serde::Serialize;

use crate::simulation::{Node, SimulationError, Value};

/// Body of an outbound event.
///
/// Serialized untagged: the topic tells consumers which shape to expect, as
/// with the real gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventBody {
    /// Result of a request on `action/return` or a gateway `.../result`
    Reply {
        rc: i32,
        #[serde(rename = "str")]
        message: String,
        nonce: Option<String>,
    },
    Error {
        rc: i32,
        #[serde(rename = "str")]
        message: String,
        error: &'static str,
        nonce: Option<String>,
    },
    NodeAdded {
        id: u32,
        product: String,
        nonce: Option<String>,
    },
    NodeRemoved {
        id: u32,
        nonce: Option<String>,
    },
    /// Requested refresh or periodic telemetry; telemetry has no nonce
    ValueUpdated {
        id: String,
        node: u32,
        value: Value,
        nonce: Option<String>,
    },
    Snapshot {
        rc: i32,
        nodes: Vec<Node>,
        nonce: Option<String>,
    },
    Driver {
        state: &'static str,
    },
    ConfigReport {
        rc: i32,
        #[serde(rename = "str")]
        message: String,
        nonce: Option<String>,
        config: GatewayConfigReport,
    },
    NetworkStatus {
        rc: i32,
        #[serde(rename = "str")]
        message: String,
        running: bool,
        nonce: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayConfigReport {
    pub device: String,
    pub namespace: String,
    pub available_devices: Vec<String>,
}

impl EventBody {
    pub fn reply(rc: i32, message: impl Into<String>, nonce: Option<String>) -> Self {
        EventBody::Reply {
            rc,
            message: message.into(),
            nonce,
        }
    }

    pub fn error(err: &SimulationError, nonce: Option<String>) -> Self {
        EventBody::Error {
            rc: err.rc(),
            message: err.to_string(),
            error: err.kind(),
            nonce,
        }
    }

    pub fn value_updated(node: u32, value: Value, nonce: Option<String>) -> Self {
        EventBody::ValueUpdated {
            id: value.value_id(node),
            node,
            value,
            nonce,
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    payload: &'a EventBody,
}

/// An event ready to publish
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub topic: String,
    pub body: EventBody,
}

impl Outbound {
    pub fn new(topic: impl Into<String>, body: EventBody) -> Self {
        Self {
            topic: topic.into(),
            body,
        }
    }

    /// Wire form: the body wrapped as `{"payload": ...}`.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Envelope {
            payload: &self.body,
        })
    }

    pub fn nonce(&self) -> Option<&str> {
        match &self.body {
            EventBody::Reply { nonce, .. }
            | EventBody::Error { nonce, .. }
            | EventBody::NodeAdded { nonce, .. }
            | EventBody::NodeRemoved { nonce, .. }
            | EventBody::ValueUpdated { nonce, .. }
            | EventBody::Snapshot { nonce, .. }
            | EventBody::ConfigReport { nonce, .. }
            | EventBody::NetworkStatus { nonce, .. } => nonce.as_deref(),
            EventBody::Driver { .. } => None,
        }
    }
}
