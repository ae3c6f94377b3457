//! Application configuration
//!
//! One TOML file holds the broker settings, the topic layout, the simulation
//! knobs and the product templates used to populate new nodes. A missing
//! default file degrades to built-in defaults so every tool works out of the
//! box against a local broker.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::mqtt::config::MqttConfig;
use crate::simulation::ValueDescription;

const CONFIG_DIR: &str = ".config/ozw-mock";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub broker: MqttConfig,
    pub topics: TopicConfig,
    pub simulation: SimulationConfig,
    pub products: Vec<ProductTemplate>,
}

/// Topic layout of the simulated gateway.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TopicConfig {
    /// Prefix of the Z-Wave service topics (`<ns>/action/request`, ...)
    pub namespace: String,
    /// Prefix of the gateway management topics (config, network)
    pub gateway: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            namespace: "ozw".to_string(),
            gateway: "ozw-mqtt-gateway/zwave".to_string(),
        }
    }
}

impl TopicConfig {
    pub fn ns_topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.namespace, suffix)
    }

    pub fn gateway_topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.gateway, suffix)
    }

    pub fn action_request(&self) -> String {
        self.ns_topic("action/request")
    }

    /// Topics the mock server listens on.
    pub fn server_subscriptions(&self) -> Vec<String> {
        vec![
            self.action_request(),
            self.gateway_topic("config/+/request"),
            self.gateway_topic("network/+/request"),
        ]
    }

    /// Topics an interactive client watches.
    pub fn client_subscriptions(&self) -> Vec<String> {
        vec![
            format!("{}/#", self.namespace),
            format!("{}/#", self.gateway),
        ]
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds between telemetry rounds; 0 disables periodic telemetry
    pub publish_interval_secs: u64,
    /// Whether the simulated Z-Wave network is running at startup
    pub start_network: bool,
    /// Product label used when an add request names none
    pub default_product: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            publish_interval_secs: 5,
            start_network: true,
            default_product: "Mock Device".to_string(),
        }
    }
}

/// Values given to every node added with a matching product label.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct ProductTemplate {
    pub name: String,
    #[serde(default)]
    pub values: Vec<ValueDescription>,
}

impl AppConfig {
    /// Configuration written by `init-config`, with a couple of sample products.
    pub fn sample() -> Self {
        let value = |cls: u32,
                     idx: u32,
                     label: &str,
                     vtype: &str,
                     units: Option<&str>,
                     reading: Option<&str>| {
            ValueDescription {
                cls: Some(cls),
                inst: Some(1),
                idx: Some(idx),
                label: Some(label.to_string()),
                vtype: Some(vtype.to_string()),
                units: units.map(str::to_string),
                value: reading.map(str::to_string),
            }
        };

        Self {
            products: vec![
                ProductTemplate {
                    name: "Multisensor 6".to_string(),
                    values: vec![
                        value(49, 1, "Air Temperature", "float", Some("C"), None),
                        value(49, 3, "Illuminance", "int", Some("Lux"), None),
                        value(49, 5, "Humidity", "int", Some("%"), None),
                        value(128, 0, "Battery Level", "static", Some("%"), Some("100")),
                        value(114, 0, "Serial Number", "string", None, None),
                    ],
                },
                ProductTemplate {
                    name: "Smart Switch 6".to_string(),
                    values: vec![
                        value(37, 0, "Switch", "static", None, Some("false")),
                        value(50, 8, "Power", "float", Some("W"), None),
                        value(134, 0, "Library Version", "none", None, None),
                    ],
                },
            ],
            ..Self::default()
        }
    }

    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one the default location is
    /// tried, and a missing file there falls back to defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (default_config_path(), false),
        };

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?;

        if !exists {
            if explicit {
                return Err(eyre!("Config file does not exist: {}", path.display()));
            }
            warn!(
                "Config file {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

        debug!("Loaded configuration from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))?;

        info!("Configuration written to {}", path.display());
        Ok(())
    }
}

/// Writes the sample configuration unless a file already exists (or `force`).
pub async fn ensure_default_config(path: Option<&Path>, force: bool) -> Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    let exists = tokio::fs::try_exists(&path)
        .await
        .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?;
    if exists && !force {
        return Err(eyre!(
            "Config file {} already exists (use --force to overwrite)",
            path.display()
        ));
    }

    AppConfig::sample().save(&path).await?;
    Ok(path)
}

pub fn default_config_path() -> PathBuf {
    let mut path = get_home_dir();
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sample_config_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let written = ensure_default_config(Some(&path), false).await.unwrap();
        assert_eq!(written, path);

        let loaded = AppConfig::load(Some(&path)).await.unwrap();
        assert_eq!(loaded, AppConfig::sample());
    }

    #[tokio::test]
    async fn existing_config_is_not_overwritten_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "[broker]\nport = 1884\n").await.unwrap();

        assert!(ensure_default_config(Some(&path), false).await.is_err());
        ensure_default_config(Some(&path), true).await.unwrap();
        let loaded = AppConfig::load(Some(&path)).await.unwrap();
        assert_eq!(loaded.broker.port, 1883);
    }

    #[tokio::test]
    async fn partial_file_is_completed_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
[broker]
host = "broker.lan"

[simulation]
publish_interval_secs = 0

[[products]]
name = "Sensor-A"
[[products.values]]
cls = 49
inst = 1
idx = 1
label = "Temperature"
vtype = "float"
"#,
        )
        .await
        .unwrap();

        let config = AppConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.broker.host, "broker.lan");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.topics, TopicConfig::default());
        assert_eq!(config.simulation.publish_interval_secs, 0);
        assert!(config.simulation.start_network);
        assert_eq!(config.products.len(), 1);
        assert_eq!(config.products[0].values[0].units, None);
    }

    #[tokio::test]
    async fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(AppConfig::load(Some(&path)).await.is_err());
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "[broker\nport = ").await.unwrap();
        assert!(AppConfig::load(Some(&path)).await.is_err());
    }

    #[test]
    fn topic_layout() {
        let topics = TopicConfig::default();
        assert_eq!(topics.action_request(), "ozw/action/request");
        assert_eq!(
            topics.gateway_topic("config/get/result"),
            "ozw-mqtt-gateway/zwave/config/get/result"
        );
        assert_eq!(topics.server_subscriptions().len(), 3);
    }
}
