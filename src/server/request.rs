//! Command request lifecycle with statum state machine
//!
//! Every request on `<ns>/action/request` walks the same path, enforced at
//! compile time:
//!
//! ```text
//! Received ──► Validated ──► Applied ──► Acknowledged
//!     │            │
//!     └────────────┴──► Rejection (error event, registry untouched)
//! ```
//!
//! The whole walk happens synchronously inside the server actor, so there is
//! never more than one request in flight.

use chrono::{DateTime, Local};
use statum::{machine, state};
use tracing::{debug, warn};

use super::command::{decode_object, nonce_of, Command};
use super::events::{EventBody, Outbound};
use super::mock_server::Server;
use crate::simulation::SimulationError;

/// What applying a command produced
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Reply text for `action/return`; `None` when the events are the reply
    pub ack: Option<String>,
    pub events: Vec<Outbound>,
}

/// A request that failed validation or application
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub nonce: Option<String>,
    pub error: SimulationError,
}

#[state]
#[derive(Debug, Clone)]
pub enum RequestState {
    Received,
    Validated(Command),
    Applied(Outcome),
    Acknowledged,
}

#[machine]
#[derive(Debug)]
pub struct Request<S: RequestState> {
    payload: String,
    nonce: Option<String>,
    received_at: DateTime<Local>,
}

impl<S: RequestState> Request<S> {
    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    fn reject(&self, error: SimulationError) -> Rejection {
        Rejection {
            nonce: self.nonce.clone(),
            error,
        }
    }
}

impl Request<Received> {
    pub fn receive(payload: impl Into<String>) -> Self {
        Self::new(payload.into(), None, Local::now())
    }

    /// Decodes the payload and transitions to Validated with the parsed command.
    pub fn validate(mut self) -> Result<Request<Validated>, Rejection> {
        let fields = decode_object(&self.payload).map_err(|e| self.reject(e))?;
        self.nonce = nonce_of(&fields).map_err(|e| self.reject(e))?;
        let command = Command::from_fields(&fields).map_err(|e| self.reject(e))?;

        debug!(
            "Validated request '{}' (nonce {:?})",
            command.name(),
            self.nonce
        );
        Ok(self.transition_with(command))
    }
}

impl Request<Validated> {
    /// Runs the command against the registry.
    pub fn apply(self, server: &mut Server) -> Result<Request<Applied>, Rejection> {
        let command = if let Some(command) = self.get_state_data() {
            command.clone()
        } else {
            warn!("Validated request carries no command, this should not happen");
            return Err(self.reject(SimulationError::MalformedRequest(
                "request lost its command".to_string(),
            )));
        };

        match server.execute(&command, self.nonce.clone()) {
            Ok(outcome) => Ok(self.transition_with(outcome)),
            Err(e) => Err(self.reject(e)),
        }
    }
}

impl Request<Applied> {
    /// Produces the messages to publish, the reply first.
    pub fn acknowledge(self, reply_topic: &str) -> (Request<Acknowledged>, Vec<Outbound>) {
        let mut messages = Vec::new();
        if let Some(outcome) = self.get_state_data() {
            if let Some(ack) = &outcome.ack {
                messages.push(Outbound::new(
                    reply_topic,
                    EventBody::reply(0, ack.clone(), self.nonce.clone()),
                ));
            }
            messages.extend(outcome.events.iter().cloned());
        }
        (self.transition(), messages)
    }
}

impl Request<Acknowledged> {
    pub fn elapsed(&self) -> chrono::Duration {
        Local::now() - self.received_at
    }
}
