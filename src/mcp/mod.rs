//! MCP remote shell module: connection and session multiplexing over SSH.
//!
//! This module is organized into the following submodules:
//!
//! - `types`: Serializable response types for MCP tools
//! - `config`: Configuration resolution with environment variable support
//! - `error`: Error taxonomy and retry classification
//! - `auth`: Private key loading and public key authentication
//! - `transport`: Transport traits and the russh implementation
//! - `storage`: Connection and session registries
//! - `directory`: Working-directory emulation for stateless commands
//! - `executor`: Command dispatch and output collection
//! - `transfer`: File transfer operations
//! - `stats`: Process-wide statistics
//! - `manager`: The `ShellManager` tying the above together
//! - `commands`: MCP tool implementations

pub(crate) mod auth;
pub mod commands;
pub mod config;
pub(crate) mod directory;
pub mod error;
pub(crate) mod executor;
pub(crate) mod ids;
pub mod manager;
pub(crate) mod message;
pub(crate) mod schema;
pub(crate) mod stats;
pub(crate) mod storage;
pub(crate) mod transfer;
pub mod transport;
pub mod types;

pub use commands::McpShellCommands;
pub use config::ManagerConfig;
pub use manager::ShellManager;
pub use transport::ssh::RusshTransport;
