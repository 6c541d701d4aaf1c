//! Message building utilities for MCP responses.
//!
//! This module provides builder patterns for constructing human-readable
//! messages that restate the identifiers a caller needs for follow-up calls.

mod builder;

pub use builder::{
    CommandMessageBuilder, ConnectMessageBuilder, DisconnectMessageBuilder,
    SessionStartMessageBuilder,
};
