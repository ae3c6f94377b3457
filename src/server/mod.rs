//! # Mock Gateway Server
//!
//! Simulates the Z-Wave service side of an OpenZWave MQTT gateway: it accepts
//! command requests, keeps a registry of simulated nodes and publishes the
//! same events a real controller would.
//!
//! ```text
//! server/
//! ├── command.rs        - Command codes and request field decoding
//! ├── events.rs         - Outbound event bodies and the {"payload": ..} envelope
//! ├── gateway.rs        - config/network management topics
//! ├── mock_server.rs    - Node registry and command dispatch (no I/O)
//! ├── request.rs        - Typestate request lifecycle
//! └── server_handle.rs  - Single-owner task with periodic telemetry
//! ```

pub mod command;
pub mod events;
pub mod gateway;
pub mod mock_server;
pub mod request;
pub mod server_handle;

pub use command::Command;
pub use events::{EventBody, Outbound};
pub use gateway::Gateway;
pub use mock_server::Server;
pub use server_handle::{ServerError, ServerHandle};
