//! Error taxonomy of the simulation core

use thiserror::Error;

pub const EINVAL: i32 = 22;
pub const ENOENT: i32 = 2;
pub const ENOSPC: i32 = 28;
pub const ENOTSUP: i32 = 95;

/// Errors raised while building or driving the simulated node registry.
///
/// Every variant is recoverable at the request boundary: the server turns it
/// into an error event for the originating nonce and keeps serving.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// A value description lacks one of its required fields
    #[error("malformed value description: missing '{0}'")]
    MalformedDescription(&'static str),

    /// A value description names a type the simulator does not know
    #[error("unknown value type '{0}'")]
    UnknownValueType(String),

    #[error("node {0} not found")]
    NodeNotFound(u32),

    #[error("value {cls}-{inst}-{idx} not found on node {node}")]
    ValueNotFound { node: u32, cls: u32, inst: u32, idx: u32 },

    /// Inbound payload is not valid JSON, or lacks/mistypes a required field
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unsupported command {0}")]
    UnsupportedCommand(i64),

    /// Every node id has been handed out once
    #[error("no node ids left")]
    IdsExhausted,
}

impl SimulationError {
    /// Stable tag carried in the `error` field of error events.
    pub fn kind(&self) -> &'static str {
        match self {
            SimulationError::MalformedDescription(_) => "MalformedDescription",
            SimulationError::UnknownValueType(_) => "UnknownValueType",
            SimulationError::NodeNotFound(_) => "NodeNotFound",
            SimulationError::ValueNotFound { .. } => "ValueNotFound",
            SimulationError::MalformedRequest(_) => "MalformedRequest",
            SimulationError::UnsupportedCommand(_) => "UnsupportedCommand",
            SimulationError::IdsExhausted => "IdsExhausted",
        }
    }

    /// Negative errno reported as `rc`, matching the gateway's convention.
    pub fn rc(&self) -> i32 {
        match self {
            SimulationError::NodeNotFound(_) | SimulationError::ValueNotFound { .. } => -ENOENT,
            SimulationError::UnsupportedCommand(_) => -ENOTSUP,
            SimulationError::IdsExhausted => -ENOSPC,
            SimulationError::MalformedDescription(_)
            | SimulationError::UnknownValueType(_)
            | SimulationError::MalformedRequest(_) => -EINVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_codes_follow_errno_convention() {
        let err = SimulationError::NodeNotFound(5);
        assert_eq!(err.kind(), "NodeNotFound");
        assert_eq!(err.rc(), -2);
        assert_eq!(err.to_string(), "node 5 not found");

        assert_eq!(SimulationError::UnsupportedCommand(42).rc(), -95);
        assert_eq!(
            SimulationError::MalformedRequest("no command supplied".into()).rc(),
            -22
        );
        assert_eq!(SimulationError::IdsExhausted.rc(), -28);
    }
}
