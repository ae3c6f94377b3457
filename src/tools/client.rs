//! Interactive line client for poking a running gateway by hand

use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value as Json};
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error};

use crate::config::{AppConfig, TopicConfig};
use crate::server::command::{
    CMD_ADD_NODE, CMD_CANCEL, CMD_GET_STATE, CMD_REFRESH_VALUE, CMD_REMOVE_NODE,
};
use crate::simulation::random_letters;

const NONCE_LEN: usize = 15;

const HELP: &str = "\
commands:
  node add [product]
  node rm <id>
  value refresh <node> <cls> <inst> <idx>
  cancel
  get-state
  config get
  config set device <dev> namespace <ns> [force]
  network <start|stop|status>
  help
  quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkOp {
    Start,
    Stop,
    Status,
}

impl NetworkOp {
    fn as_str(&self) -> &'static str {
        match self {
            NetworkOp::Start => "start",
            NetworkOp::Stop => "stop",
            NetworkOp::Status => "status",
        }
    }
}

/// One line typed at the client prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    NodeAdd { product: Option<String> },
    NodeRemove { node: u32 },
    ValueRefresh { node: u32, cls: u32, inst: u32, idx: u32 },
    Cancel,
    GetState,
    ConfigGet,
    ConfigSet { device: String, namespace: String, force: bool },
    Network(NetworkOp),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),
}

impl FromStr for Input {
    type Err = InputError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => Err(InputError::Empty),
            ["node", "add"] => Ok(Input::NodeAdd { product: None }),
            ["node", "add", product @ ..] => Ok(Input::NodeAdd {
                product: Some(product.join(" ")),
            }),
            ["node", "rm", id] => Ok(Input::NodeRemove { node: number(id)? }),
            ["node", ..] => Err(InputError::Usage("node add [product] | node rm <id>")),
            ["value", "refresh", node, cls, inst, idx] => Ok(Input::ValueRefresh {
                node: number(node)?,
                cls: number(cls)?,
                inst: number(inst)?,
                idx: number(idx)?,
            }),
            ["value", ..] => Err(InputError::Usage("value refresh <node> <cls> <inst> <idx>")),
            ["cancel"] => Ok(Input::Cancel),
            ["get-state"] => Ok(Input::GetState),
            ["config", "get"] => Ok(Input::ConfigGet),
            ["config", "set", "device", device, "namespace", namespace, rest @ ..] => {
                let force = match rest {
                    [] => false,
                    ["force"] => true,
                    _ => return Err(InputError::Usage(CONFIG_SET_USAGE)),
                };
                Ok(Input::ConfigSet {
                    device: device.to_string(),
                    namespace: namespace.to_string(),
                    force,
                })
            }
            ["config", "set", ..] => Err(InputError::Usage(CONFIG_SET_USAGE)),
            ["config", ..] => Err(InputError::Usage("config get | config set ...")),
            ["network", "start"] => Ok(Input::Network(NetworkOp::Start)),
            ["network", "stop"] => Ok(Input::Network(NetworkOp::Stop)),
            ["network", "status"] => Ok(Input::Network(NetworkOp::Status)),
            ["network", ..] => Err(InputError::Usage("network <start|stop|status>")),
            ["help"] => Ok(Input::Help),
            ["quit"] | ["exit"] => Ok(Input::Quit),
            [other, ..] => Err(InputError::Unknown(other.to_string())),
        }
    }
}

const CONFIG_SET_USAGE: &str = "config set device <dev> namespace <ns> [force]";

fn number(word: &str) -> Result<u32, InputError> {
    word.parse()
        .map_err(|_| InputError::InvalidNumber(word.to_string()))
}

impl Input {
    /// Topic and body to publish, or `None` for local commands.
    pub fn into_request(self, topics: &TopicConfig, nonce: &str) -> Option<(String, Json)> {
        let action = |body: Json| Some((topics.action_request(), body));
        match self {
            Input::NodeAdd { product: None } => {
                action(json!({ "command": CMD_ADD_NODE, "nonce": nonce }))
            }
            Input::NodeAdd {
                product: Some(product),
            } => action(json!({ "command": CMD_ADD_NODE, "nonce": nonce, "product": product })),
            Input::NodeRemove { node } => {
                action(json!({ "command": CMD_REMOVE_NODE, "nonce": nonce, "node": node }))
            }
            Input::ValueRefresh {
                node,
                cls,
                inst,
                idx,
            } => action(json!({
                "command": CMD_REFRESH_VALUE,
                "nonce": nonce,
                "node": node,
                "cls": cls,
                "inst": inst,
                "idx": idx,
            })),
            Input::Cancel => action(json!({ "command": CMD_CANCEL, "nonce": nonce })),
            Input::GetState => action(json!({ "command": CMD_GET_STATE, "nonce": nonce })),
            Input::ConfigGet => Some((
                topics.gateway_topic("config/get/request"),
                json!({ "nonce": nonce }),
            )),
            Input::ConfigSet {
                device,
                namespace,
                force,
            } => Some((
                topics.gateway_topic("config/set/request"),
                json!({
                    "nonce": nonce,
                    "config": { "device": device, "namespace": namespace },
                    "force": force,
                }),
            )),
            Input::Network(op) => Some((
                topics.gateway_topic(&format!("network/{}/request", op.as_str())),
                json!({ "nonce": nonce }),
            )),
            Input::Help | Input::Quit => None,
        }
    }
}

pub async fn execute(config: AppConfig) -> Result<()> {
    let (link, mut inbound) =
        super::connect(&config, "client", config.topics.client_subscriptions()).await?;
    println!("mqtt > connected to {}", config.broker.address());
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = line.map_err(|e| eyre!("Failed to read stdin: {}", e))?;
                let Some(line) = line else {
                    break;
                };
                let input = match line.parse::<Input>() {
                    Ok(input) => input,
                    Err(InputError::Empty) => continue,
                    Err(e) => {
                        println!("-> {}", e);
                        continue;
                    }
                };
                match input {
                    Input::Quit => break,
                    Input::Help => println!("{}", HELP),
                    input => {
                        let nonce = random_letters(&mut rand::thread_rng(), NONCE_LEN);
                        if let Some((topic, body)) = input.into_request(&config.topics, &nonce) {
                            println!("-> cmd: {} (nonce {})", line.trim(), nonce);
                            debug!("Publishing {} to {}", body, topic);
                            if let Err(e) = link.publish_json(&topic, &body).await {
                                error!("Failed to publish to {}: {}", topic, e);
                            }
                        }
                    }
                }
            }
            msg = inbound.recv() => match msg {
                Some(msg) => println!("mqtt > message > {}", msg.render()),
                None => break,
            },
        }
    }

    link.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        assert_eq!("node add".parse(), Ok(Input::NodeAdd { product: None }));
        assert_eq!(
            "node add Multisensor 6".parse(),
            Ok(Input::NodeAdd {
                product: Some("Multisensor 6".into())
            })
        );
        assert_eq!("node rm 3".parse(), Ok(Input::NodeRemove { node: 3 }));
        assert_eq!(
            "value refresh 1 49 1 5".parse(),
            Ok(Input::ValueRefresh {
                node: 1,
                cls: 49,
                inst: 1,
                idx: 5
            })
        );
        assert_eq!("  cancel ".parse(), Ok(Input::Cancel));
        assert_eq!("get-state".parse(), Ok(Input::GetState));
        assert_eq!("config get".parse(), Ok(Input::ConfigGet));
        assert_eq!(
            "config set device /dev/ttyACM0 namespace lab force".parse(),
            Ok(Input::ConfigSet {
                device: "/dev/ttyACM0".into(),
                namespace: "lab".into(),
                force: true
            })
        );
        assert_eq!(
            "network status".parse(),
            Ok(Input::Network(NetworkOp::Status))
        );
        assert_eq!("quit".parse(), Ok(Input::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!("".parse::<Input>(), Err(InputError::Empty));
        assert_eq!(
            "reboot".parse::<Input>(),
            Err(InputError::Unknown("reboot".into()))
        );
        assert_eq!(
            "node rm x".parse::<Input>(),
            Err(InputError::InvalidNumber("x".into()))
        );
        assert!(matches!(
            "network restart".parse::<Input>(),
            Err(InputError::Usage(_))
        ));
        assert!(matches!(
            "config set device /dev/ttyACM0".parse::<Input>(),
            Err(InputError::Usage(_))
        ));
        assert!(matches!(
            "config set device d namespace n please".parse::<Input>(),
            Err(InputError::Usage(_))
        ));
    }

    #[test]
    fn builds_requests() {
        let topics = TopicConfig::default();

        let (topic, body) = Input::NodeRemove { node: 7 }
            .into_request(&topics, "abc")
            .unwrap();
        assert_eq!(topic, "ozw/action/request");
        assert_eq!(body, json!({"command": 4, "nonce": "abc", "node": 7}));

        let (topic, body) = Input::Network(NetworkOp::Start)
            .into_request(&topics, "n")
            .unwrap();
        assert_eq!(topic, "ozw-mqtt-gateway/zwave/network/start/request");
        assert_eq!(body, json!({"nonce": "n"}));

        let (topic, body) = Input::ConfigSet {
            device: "/dev/ttyUSB0".into(),
            namespace: "ozw".into(),
            force: false,
        }
        .into_request(&topics, "c")
        .unwrap();
        assert_eq!(topic, "ozw-mqtt-gateway/zwave/config/set/request");
        assert_eq!(body["config"]["device"], "/dev/ttyUSB0");
        assert_eq!(body["force"], false);

        assert_eq!(Input::Help.into_request(&topics, "h"), None);
    }

    #[test]
    fn client_nonces_are_fifteen_letters() {
        let nonce = random_letters(&mut rand::thread_rng(), NONCE_LEN);
        assert_eq!(nonce.len(), 15);
        assert!(nonce.chars().all(|c| c.is_ascii_alphabetic()));
    }
}
