//! # Device Simulation Model
//!
//! Fabricates plausible Z-Wave telemetry without a controller or real nodes.
//! A [`Node`] owns an ordered set of [`Value`]s; each value knows how to
//! synthesize a new reading from its [`ValueType`].
//!
//! ```text
//! simulation/
//! ├── error.rs  - SimulationError taxonomy (kind tags, errno codes)
//! ├── node.rs   - Node and bulk refresh
//! └── value.rs  - ValueType, ValueDescription, Value and reading generators
//! ```
//!
//! The registry that owns nodes lives in the server module; nothing here does
//! I/O.

pub mod error;
pub mod node;
pub mod value;

pub use error::SimulationError;
pub use node::Node;
pub use value::{random_letters, Value, ValueDescription, ValueIdentity, ValueType};
