use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Broker connection settings, shared by the mock server and every tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Base client id; each tool appends its own suffix
    pub client_id: String,
    pub keep_alive_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "ozw-mock".to_string(),
            keep_alive_secs: 60,
            user: None,
            password: None,
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        // rumqttc rejects keep-alive intervals below five seconds
        Duration::from_secs(self.keep_alive_secs.max(5))
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
