//! Storage abstractions for connection and session registries.
//!
//! This module provides trait-based storage abstractions that enable:
//! - Dependency injection for testability
//! - Lock-free concurrent access via DashMap implementations
//! - Clean separation between storage and business logic

mod connection;
mod session;
mod traits;

pub use connection::DashMapConnectionStorage;
pub use session::DashMapSessionStorage;
pub use traits::{ConnectionRecord, ConnectionStorage, SessionRecord, SessionStorage};
