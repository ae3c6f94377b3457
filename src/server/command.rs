//! Command requests accepted on `<ns>/action/request`

use serde_json::{Map, Value as Json};

use crate::simulation::{SimulationError, ValueIdentity};

pub const CMD_ADD_NODE: i64 = 1;
pub const CMD_REMOVE_NODE: i64 = 4;
pub const CMD_CANCEL: i64 = 17;
pub const CMD_GET_STATE: i64 = 18;
pub const CMD_REFRESH_VALUE: i64 = 19;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddNode { product: Option<String> },
    RemoveNode { node: u32 },
    Cancel,
    GetState,
    RefreshValue { node: u32, identity: ValueIdentity },
}

impl Command {
    pub fn code(&self) -> i64 {
        match self {
            Command::AddNode { .. } => CMD_ADD_NODE,
            Command::RemoveNode { .. } => CMD_REMOVE_NODE,
            Command::Cancel => CMD_CANCEL,
            Command::GetState => CMD_GET_STATE,
            Command::RefreshValue { .. } => CMD_REFRESH_VALUE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::AddNode { .. } => "node-add",
            Command::RemoveNode { .. } => "node-remove",
            Command::Cancel => "cancel",
            Command::GetState => "get-state",
            Command::RefreshValue { .. } => "value-refresh",
        }
    }

    /// Builds the command from a decoded request object.
    pub fn from_fields(fields: &Map<String, Json>) -> Result<Self, SimulationError> {
        let code = match fields.get("command") {
            None => {
                return Err(SimulationError::MalformedRequest(
                    "no command supplied".to_string(),
                ))
            }
            Some(code) => code.as_i64().ok_or_else(|| {
                SimulationError::MalformedRequest("'command' must be an integer".to_string())
            })?,
        };

        match code {
            CMD_ADD_NODE => Ok(Command::AddNode {
                product: optional_str(fields, "product")?,
            }),
            CMD_REMOVE_NODE => Ok(Command::RemoveNode {
                node: required_u32(fields, "node")?,
            }),
            CMD_CANCEL => Ok(Command::Cancel),
            CMD_GET_STATE => Ok(Command::GetState),
            CMD_REFRESH_VALUE => Ok(Command::RefreshValue {
                node: required_u32(fields, "node")?,
                identity: ValueIdentity {
                    cls: required_u32(fields, "cls")?,
                    inst: required_u32(fields, "inst")?,
                    idx: required_u32(fields, "idx")?,
                },
            }),
            other => Err(SimulationError::UnsupportedCommand(other)),
        }
    }
}

/// Decodes a payload into a JSON object.
pub fn decode_object(payload: &str) -> Result<Map<String, Json>, SimulationError> {
    match serde_json::from_str::<Json>(payload) {
        Ok(Json::Object(fields)) => Ok(fields),
        Ok(_) => Err(SimulationError::MalformedRequest(
            "payload is not a JSON object".to_string(),
        )),
        Err(e) => Err(SimulationError::MalformedRequest(format!(
            "invalid JSON: {}",
            e
        ))),
    }
}

/// Reads the nonce; a present but non-string nonce is malformed.
pub fn nonce_of(fields: &Map<String, Json>) -> Result<Option<String>, SimulationError> {
    optional_str(fields, "nonce")
}

pub fn optional_str(
    fields: &Map<String, Json>,
    name: &str,
) -> Result<Option<String>, SimulationError> {
    match fields.get(name) {
        None | Some(Json::Null) => Ok(None),
        Some(Json::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SimulationError::MalformedRequest(format!(
            "'{}' must be a string",
            name
        ))),
    }
}

pub fn optional_bool(fields: &Map<String, Json>, name: &str) -> Result<bool, SimulationError> {
    match fields.get(name) {
        None | Some(Json::Null) => Ok(false),
        Some(Json::Bool(b)) => Ok(*b),
        Some(_) => Err(SimulationError::MalformedRequest(format!(
            "'{}' must be a boolean",
            name
        ))),
    }
}

fn required_u32(fields: &Map<String, Json>, name: &str) -> Result<u32, SimulationError> {
    let value = fields
        .get(name)
        .ok_or_else(|| SimulationError::MalformedRequest(format!("missing '{}'", name)))?;
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            SimulationError::MalformedRequest(format!("'{}' must be a non-negative integer", name))
        })
}
