//! Gateway management topics: `<gw>/config/{get,set}` and
//! `<gw>/network/{start,stop,status}`

use serde_json::{Map, Value as Json};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::command::{decode_object, nonce_of, optional_bool, optional_str};
use super::events::{EventBody, GatewayConfigReport, Outbound};
use crate::config::TopicConfig;
use crate::simulation::error::{EINVAL, ENOENT, ENOTSUP};

const DEFAULT_NAMESPACE: &str = "ozw";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub device: String,
    pub namespace: String,
}

/// Simulated gateway state.
///
/// The stored namespace is reported back on `config/get` only; topics keep
/// following the loaded [`TopicConfig`].
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    network_running: bool,
    device_root: PathBuf,
}

impl Gateway {
    pub fn new(network_running: bool) -> Self {
        Self::with_device_root(network_running, "/dev")
    }

    /// Gateway that looks for serial devices under `device_root`.
    pub fn with_device_root(network_running: bool, device_root: impl Into<PathBuf>) -> Self {
        let mut gateway = Self {
            config: GatewayConfig {
                device: String::new(),
                namespace: DEFAULT_NAMESPACE.to_string(),
            },
            network_running,
            device_root: device_root.into(),
        };
        gateway.config.device = gateway.candidate_device().unwrap_or_default();
        gateway
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn is_network_running(&self) -> bool {
        self.network_running
    }

    /// Serial devices a Z-Wave stick could sit on, sorted by path.
    pub fn available_devices(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.device_root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Unable to list devices in {}: {}",
                    self.device_root.display(),
                    e
                );
                return Vec::new();
            }
        };

        let mut devices: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with("ttyACM") || name.starts_with("ttyUSB")
            })
            .map(|entry| entry.path().to_string_lossy().into_owned())
            .collect();
        devices.sort();
        devices
    }

    pub fn candidate_device(&self) -> Option<String> {
        self.available_devices().into_iter().next()
    }

    /// Handles a request below the gateway prefix, e.g. `network/start/request`.
    pub fn handle(&mut self, path: &str, payload: &str, topics: &TopicConfig) -> Vec<Outbound> {
        let Some(operation) = path.strip_suffix("/request") else {
            debug!("Ignoring gateway topic {}", path);
            return Vec::new();
        };

        let fields = match decode_object(payload) {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Dropping gateway request on {}: {}", path, e);
                return Vec::new();
            }
        };
        let nonce = match nonce_of(&fields) {
            Ok(Some(nonce)) => nonce,
            _ => {
                warn!("payload on {} does not specify a nonce; drop.", path);
                return Vec::new();
            }
        };

        info!("handling gateway request '{}' (nonce {})", operation, nonce);
        let result_topic = topics.gateway_topic(&format!("{}/result", operation));

        let mut messages = Vec::new();
        let body = match operation {
            "config/get" => self.config_report(nonce),
            "config/set" => self.set_config(&fields, nonce),
            "network/start" => {
                if !self.network_running {
                    self.network_running = true;
                    for state in ["connected", "ready"] {
                        messages.push(Outbound::new(
                            topics.ns_topic("driver"),
                            EventBody::Driver { state },
                        ));
                    }
                    EventBody::reply(0, "network successfully started", Some(nonce))
                } else {
                    EventBody::reply(0, "network already started", Some(nonce))
                }
            }
            "network/stop" => {
                let message = if self.network_running {
                    "network successfully stopped"
                } else {
                    "network already stopped"
                };
                self.network_running = false;
                EventBody::reply(0, message, Some(nonce))
            }
            "network/status" => EventBody::NetworkStatus {
                rc: 0,
                message: if self.network_running {
                    "network running".to_string()
                } else {
                    "network stopped".to_string()
                },
                running: self.network_running,
                nonce: Some(nonce),
            },
            other => {
                warn!("Unsupported gateway operation '{}'", other);
                EventBody::reply(
                    -ENOTSUP,
                    format!("operation '{}' not supported", other),
                    Some(nonce),
                )
            }
        };

        messages.push(Outbound::new(result_topic, body));
        messages
    }

    fn config_report(&self, nonce: String) -> EventBody {
        EventBody::ConfigReport {
            rc: 0,
            message: "config successfully obtained".to_string(),
            nonce: Some(nonce),
            config: GatewayConfigReport {
                device: self.config.device.clone(),
                namespace: self.config.namespace.clone(),
                available_devices: self.available_devices(),
            },
        }
    }

    fn set_config(&mut self, fields: &Map<String, Json>, nonce: String) -> EventBody {
        let invalid = |message: String, nonce: String| EventBody::reply(-EINVAL, message, Some(nonce));

        let force = match optional_bool(fields, "force") {
            Ok(force) => force,
            Err(e) => return invalid(e.to_string(), nonce),
        };
        let config = match fields.get("config") {
            Some(Json::Object(config)) => config,
            Some(_) => return invalid("config must be an object".to_string(), nonce),
            None => {
                warn!("payload does not provide a config.");
                return invalid("config not provided".to_string(), nonce);
            }
        };

        let device = match optional_str(config, "device") {
            Ok(Some(device)) => device,
            Ok(None) => {
                warn!("provided config does not specify a device; default.");
                self.candidate_device().unwrap_or_default()
            }
            Err(e) => return invalid(e.to_string(), nonce),
        };
        if device.is_empty() {
            warn!("no configured device; abort.");
            return invalid("device not provided or available".to_string(), nonce);
        }
        if !force && !Path::new(&device).exists() {
            warn!("specified device '{}' does not exist", device);
            return EventBody::reply(
                -ENOENT,
                format!("device '{}' does not exist", device),
                Some(nonce),
            );
        }

        let namespace = match optional_str(config, "namespace") {
            Ok(namespace) => namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            Err(e) => return invalid(e.to_string(), nonce),
        };
        if namespace.is_empty() && !force {
            warn!("empty namespace provided; abort.");
            return invalid("namespace cannot be empty".to_string(), nonce);
        }

        info!("gateway config set: device {}, namespace {}", device, namespace);
        self.config = GatewayConfig { device, namespace };
        EventBody::reply(0, "config successfully set", Some(nonce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gateway_with_devices(names: &[&str]) -> (tempfile::TempDir, Gateway) {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let gateway = Gateway::with_device_root(false, dir.path());
        (dir, gateway)
    }

    fn rc_of(out: &Outbound) -> i32 {
        match &out.body {
            EventBody::Reply { rc, .. }
            | EventBody::ConfigReport { rc, .. }
            | EventBody::NetworkStatus { rc, .. } => *rc,
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn lists_serial_devices_only() {
        let (dir, gateway) = gateway_with_devices(&["ttyUSB1", "ttyACM0", "ttyS0", "null"]);
        let root = dir.path().to_string_lossy().into_owned();
        assert_eq!(
            gateway.available_devices(),
            vec![format!("{}/ttyACM0", root), format!("{}/ttyUSB1", root)]
        );
        assert_eq!(gateway.config().device, format!("{}/ttyACM0", root));
    }

    #[test]
    fn config_get_reports_state() {
        let (_dir, mut gateway) = gateway_with_devices(&["ttyACM0"]);
        let topics = TopicConfig::default();
        let out = gateway.handle("config/get/request", r#"{"nonce":"g"}"#, &topics);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].topic, "ozw-mqtt-gateway/zwave/config/get/result");
        let EventBody::ConfigReport { config, nonce, .. } = &out[0].body else {
            panic!("expected config report, got {:?}", out[0].body);
        };
        assert_eq!(nonce.as_deref(), Some("g"));
        assert_eq!(config.namespace, "ozw");
        assert_eq!(config.available_devices.len(), 1);
    }

    #[test]
    fn config_set_validation() {
        let (dir, mut gateway) = gateway_with_devices(&["ttyACM0"]);
        let topics = TopicConfig::default();
        let device = dir.path().join("ttyACM0").to_string_lossy().into_owned();
        let set = |gateway: &mut Gateway, payload: Json| {
            gateway.handle("config/set/request", &payload.to_string(), &topics)
        };

        let out = set(&mut gateway, json!({"nonce": "a"}));
        assert_eq!(rc_of(&out[0]), -EINVAL);

        let out = set(&mut gateway, json!({"nonce": "b", "config": {"device": "/nonexistent/ttyACM9"}}));
        assert_eq!(rc_of(&out[0]), -ENOENT);

        let out = set(&mut gateway, json!({"nonce": "c", "config": {"device": device, "namespace": ""}}));
        assert_eq!(rc_of(&out[0]), -EINVAL);

        let out = set(
            &mut gateway,
            json!({"nonce": "d", "config": {"device": "/nonexistent/ttyACM9", "namespace": "lab"}, "force": true}),
        );
        assert_eq!(rc_of(&out[0]), 0);
        assert_eq!(
            gateway.config(),
            &GatewayConfig {
                device: "/nonexistent/ttyACM9".to_string(),
                namespace: "lab".to_string()
            }
        );

        let out = set(&mut gateway, json!({"nonce": "e", "config": {}}));
        assert_eq!(rc_of(&out[0]), 0);
        assert_eq!(gateway.config().device, device);
        assert_eq!(gateway.config().namespace, "ozw");
    }

    #[test]
    fn config_set_without_any_device_fails() {
        let (_dir, mut gateway) = gateway_with_devices(&[]);
        let out = gateway.handle(
            "config/set/request",
            r#"{"nonce":"x","config":{}}"#,
            &TopicConfig::default(),
        );
        assert_eq!(rc_of(&out[0]), -EINVAL);
    }

    #[test]
    fn network_lifecycle() {
        let (_dir, mut gateway) = gateway_with_devices(&[]);
        let topics = TopicConfig::default();

        let out = gateway.handle("network/start/request", r#"{"nonce":"1"}"#, &topics);
        assert!(gateway.is_network_running());
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].topic, "ozw/driver");
        assert_eq!(out[0].body, EventBody::Driver { state: "connected" });
        assert_eq!(out[1].body, EventBody::Driver { state: "ready" });
        assert_eq!(out[2].topic, "ozw-mqtt-gateway/zwave/network/start/result");

        let out = gateway.handle("network/start/request", r#"{"nonce":"2"}"#, &topics);
        assert_eq!(out.len(), 1);
        assert_eq!(rc_of(&out[0]), 0);

        let out = gateway.handle("network/stop/request", r#"{"nonce":"3"}"#, &topics);
        assert_eq!(rc_of(&out[0]), 0);
        assert!(!gateway.is_network_running());

        let out = gateway.handle("network/status/request", r#"{"nonce":"4"}"#, &topics);
        assert!(matches!(
            out[0].body,
            EventBody::NetworkStatus { running: false, .. }
        ));
    }

    #[test]
    fn requests_without_nonce_are_dropped() {
        let (_dir, mut gateway) = gateway_with_devices(&[]);
        let topics = TopicConfig::default();
        assert!(gateway.handle("network/start/request", "{}", &topics).is_empty());
        assert!(gateway.handle("network/start/request", "garbage", &topics).is_empty());
        assert!(!gateway.is_network_running());
    }

    #[test]
    fn unknown_operations_are_unsupported() {
        let (_dir, mut gateway) = gateway_with_devices(&[]);
        let out = gateway.handle("network/reset/request", r#"{"nonce":"z"}"#, &TopicConfig::default());
        assert_eq!(out[0].topic, "ozw-mqtt-gateway/zwave/network/reset/result");
        assert_eq!(rc_of(&out[0]), -ENOTSUP);
        assert!(gateway.handle("network/reset/result", r#"{"nonce":"z"}"#, &TopicConfig::default()).is_empty());
    }
}
