use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use super::command::Command;
use super::events::{EventBody, Outbound};
use super::gateway::Gateway;
use super::request::{Outcome, Request};
use crate::config::{AppConfig, TopicConfig};
use crate::mqtt::MQTTMessage;
use crate::simulation::{Node, SimulationError, Value, ValueIdentity};

/// The simulated Z-Wave service: node registry plus request dispatch.
///
/// Owns every [`Node`] exclusively. It performs no I/O; callers feed it
/// inbound messages and publish whatever [`Outbound`]s it returns.
#[derive(Debug)]
pub struct Server {
    nodes: BTreeMap<u32, Node>,
    /// `None` once every id has been used
    next_id: Option<u32>,
    topics: TopicConfig,
    default_product: String,
    templates: HashMap<String, Vec<Value>>,
    gateway: Gateway,
    rng: StdRng,
}

impl Server {
    pub fn new(config: &AppConfig) -> Result<Self, SimulationError> {
        Self::with_parts(config, Gateway::new(config.simulation.start_network), StdRng::from_entropy())
    }

    /// Builds a server with an explicit gateway and RNG.
    ///
    /// Product templates are validated here, so a broken configuration fails
    /// at startup rather than on the first add request.
    pub fn with_parts(
        config: &AppConfig,
        gateway: Gateway,
        rng: StdRng,
    ) -> Result<Self, SimulationError> {
        let mut templates = HashMap::new();
        for product in &config.products {
            let values = product
                .values
                .iter()
                .map(Value::from_description)
                .collect::<Result<Vec<_>, _>>()?;
            debug!("Product template '{}' with {} values", product.name, values.len());
            templates.insert(product.name.clone(), values);
        }

        Ok(Self {
            nodes: BTreeMap::new(),
            next_id: Some(1),
            topics: config.topics.clone(),
            default_product: config.simulation.default_product.clone(),
            templates,
            gateway,
            rng,
        })
    }

    pub fn topics(&self) -> &TopicConfig {
        &self.topics
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn node(&self, id: u32) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes in id order.
    pub fn snapshot(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    /// Routes an inbound message by topic.
    pub fn handle_message(&mut self, msg: &MQTTMessage) -> Vec<Outbound> {
        if msg.topic == self.topics.action_request() {
            return self.handle_request(&msg.content);
        }

        let gateway_prefix = format!("{}/", self.topics.gateway);
        if let Some(path) = msg.topic.strip_prefix(&gateway_prefix) {
            return self.gateway.handle(path, &msg.content, &self.topics);
        }

        debug!("Ignoring message on {}", msg.topic);
        Vec::new()
    }

    /// Handles one command request payload from `<ns>/action/request`.
    pub fn handle_request(&mut self, payload: &str) -> Vec<Outbound> {
        let reply_topic = self.topics.ns_topic("action/return");

        match Request::receive(payload)
            .validate()
            .and_then(|request| request.apply(self))
        {
            Ok(applied) => {
                let (done, messages) = applied.acknowledge(&reply_topic);
                debug!(
                    "Request {:?} acknowledged in {} us with {} messages",
                    done.nonce(),
                    done.elapsed().num_microseconds().unwrap_or_default(),
                    messages.len()
                );
                messages
            }
            Err(rejection) => {
                warn!(
                    "Rejected request (nonce {:?}): {}",
                    rejection.nonce, rejection.error
                );
                vec![Outbound::new(
                    reply_topic,
                    EventBody::error(&rejection.error, rejection.nonce),
                )]
            }
        }
    }

    pub(super) fn execute(
        &mut self,
        command: &Command,
        nonce: Option<String>,
    ) -> Result<Outcome, SimulationError> {
        info!("handling command '{}' (code {})", command.name(), command.code());

        match command {
            Command::AddNode { product } => {
                let id = self.add_node(product.clone())?;
                let product = self
                    .nodes
                    .get(&id)
                    .map(|node| node.product.clone())
                    .unwrap_or_default();
                Ok(Outcome {
                    ack: Some("command executing".to_string()),
                    events: vec![Outbound::new(
                        self.topics.ns_topic("node/add"),
                        EventBody::NodeAdded { id, product, nonce },
                    )],
                })
            }
            Command::RemoveNode { node } => {
                self.remove_node(*node)?;
                Ok(Outcome {
                    ack: Some("command executing".to_string()),
                    events: vec![Outbound::new(
                        self.topics.ns_topic("node/rm"),
                        EventBody::NodeRemoved { id: *node, nonce },
                    )],
                })
            }
            Command::Cancel => {
                info!("cancelling controller command");
                Ok(Outcome {
                    ack: Some("command cancelled".to_string()),
                    events: Vec::new(),
                })
            }
            Command::GetState => Ok(Outcome {
                ack: None,
                events: vec![Outbound::new(
                    self.topics.ns_topic("action/completed"),
                    EventBody::Snapshot {
                        rc: 0,
                        nodes: self.snapshot(),
                        nonce,
                    },
                )],
            }),
            Command::RefreshValue { node, identity } => {
                let value = self.refresh_value(*node, *identity)?;
                Ok(Outcome {
                    ack: Some("command executing".to_string()),
                    events: vec![Outbound::new(
                        self.topics.ns_topic("value/refreshed"),
                        EventBody::value_updated(*node, value, nonce),
                    )],
                })
            }
        }
    }

    /// Registers a new node and returns its id. Ids are never reused.
    pub fn add_node(&mut self, product: Option<String>) -> Result<u32, SimulationError> {
        let id = self.next_id.ok_or(SimulationError::IdsExhausted)?;
        self.next_id = id.checked_add(1);

        let product = product.unwrap_or_else(|| self.default_product.clone());
        let mut node = Node::new(id, product);
        if let Some(values) = self.templates.get(&node.product) {
            node.init_values(values.clone());
        }

        self.nodes.insert(id, node);
        Ok(id)
    }

    pub fn remove_node(&mut self, id: u32) -> Result<Node, SimulationError> {
        let node = self
            .nodes
            .remove(&id)
            .ok_or(SimulationError::NodeNotFound(id))?;
        info!("removed node id: {}, product: {}", id, node.product);
        Ok(node)
    }

    /// Refreshes one value and returns its new state.
    pub fn refresh_value(
        &mut self,
        node_id: u32,
        identity: ValueIdentity,
    ) -> Result<Value, SimulationError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(SimulationError::NodeNotFound(node_id))?;
        let value = node
            .value_mut(identity)
            .ok_or(SimulationError::ValueNotFound {
                node: node_id,
                cls: identity.cls,
                inst: identity.inst,
                idx: identity.idx,
            })?;
        value.refresh_with(&mut self.rng);
        Ok(value.clone())
    }

    /// One round of periodic telemetry: refreshes every dynamic value while
    /// the simulated network runs.
    pub fn telemetry_tick(&mut self) -> Vec<Outbound> {
        if !self.gateway.is_network_running() {
            return Vec::new();
        }

        let topic = self.topics.ns_topic("value/changed");
        let mut events = Vec::new();
        for node in self.nodes.values_mut() {
            for value in node.refresh_all(&mut self.rng) {
                events.push(Outbound::new(
                    topic.clone(),
                    EventBody::value_updated(node.id, value, None),
                ));
            }
        }
        debug!("Telemetry round produced {} events", events.len());
        events
    }
}
