//! Error taxonomy for connection, session, command and transfer operations.
//!
//! Every failure the core can produce is a [`ShellError`]. Tools never let one
//! escape as a fault: [`ShellError::to_tool_error`] renders it as a JSON
//! payload carrying the kind, the message and the contextual parameters of the
//! call (identifiers, host, command, paths).
//!
//! # Retry Classification
//!
//! Handshake failures are retried only when they look transient. The keyword
//! classifier in [`is_retryable_error`] decides:
//!
//! 1. **Authentication failures (NOT retryable)**: wrong key, denied access.
//! 2. **Connection errors (retryable)**: refused, reset, unreachable, timeout.
//! 3. **Unknown errors**: retried unless they look like an SSH protocol error
//!    without a timeout/connect hint.
//!
//! Authentication keywords take precedence over connection keywords.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which kind of registry entity a lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Connection,
    Session,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Connection => write!(f, "connection"),
            EntityKind::Session => write!(f, "session"),
        }
    }
}

/// Stage of the transport at which a failure was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStage {
    Handshake,
    Authentication,
    /// Channel could not be opened or the command could not be started.
    Dispatch,
    /// Command output stream failed before a terminal event.
    Stream,
    /// File-transfer channel could not be opened.
    ChannelOpen,
    /// A file-transfer primitive failed after the channel was open.
    Transfer,
}

impl fmt::Display for TransportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportStage::Handshake => "handshake",
            TransportStage::Authentication => "authentication",
            TransportStage::Dispatch => "dispatch",
            TransportStage::Stream => "stream",
            TransportStage::ChannelOpen => "channel open",
            TransportStage::Transfer => "transfer",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("name '{name}' is already used by live connection {existing_id}")]
    NameConflict { name: String, existing_id: String },

    #[error("no {kind} with ID: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("connection {connection_id} is closed")]
    ConnectionClosed { connection_id: String },

    #[error("{operation} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        operation: String,
        timeout: std::time::Duration,
    },

    #[error("{stage} failed: {message}")]
    Transport {
        stage: TransportStage,
        message: String,
    },

    #[error("local I/O error on {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },
}

/// Serialisable classification of a [`ShellError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NameConflict,
    NotFound,
    ConnectionClosed,
    Timeout,
    Transport,
    LocalIo,
    Cancelled,
}

/// Failure payload returned across the tool boundary.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl ShellError {
    pub fn transport(stage: TransportStage, message: impl fmt::Display) -> Self {
        ShellError::Transport {
            stage,
            message: message.to_string(),
        }
    }

    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        ShellError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ShellError::LocalIo {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ShellError::Validation(_) => ErrorKind::Validation,
            ShellError::NameConflict { .. } => ErrorKind::NameConflict,
            ShellError::NotFound { .. } => ErrorKind::NotFound,
            ShellError::ConnectionClosed { .. } => ErrorKind::ConnectionClosed,
            ShellError::Timeout { .. } => ErrorKind::Timeout,
            ShellError::Transport { .. } => ErrorKind::Transport,
            ShellError::LocalIo { .. } => ErrorKind::LocalIo,
            ShellError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether a failed handshake attempt is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ShellError::Timeout { .. } => true,
            ShellError::Transport {
                stage: TransportStage::Handshake,
                message,
            } => is_retryable_error(message),
            _ => false,
        }
    }

    /// Render this error as the JSON payload returned by a tool.
    pub fn to_tool_error(&self, context: &[(&str, &str)]) -> String {
        let failure = ToolFailure {
            kind: self.kind(),
            message: self.to_string(),
            context: context
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        };
        serde_json::to_string(&failure).unwrap_or_else(|_| failure.message.clone())
    }
}

/// Authentication error patterns that indicate permanent failures.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "key authentication failed",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "all authentication methods failed",
];

/// Connection error patterns that indicate transient failures.
const RETRYABLE_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "timeout",
    "network is unreachable",
    "no route to host",
    "host is down",
    "temporary failure",
    "resource temporarily unavailable",
    "handshake failed",
    "failed to connect",
    "broken pipe",
    "would block",
];

/// Determines if a transport error message is retryable (transient) or permanent.
///
/// Authentication errors are checked first and take precedence. An error like
/// "Connection timeout during authentication failed" is NOT retryable.
pub(crate) fn is_retryable_error(error: &str) -> bool {
    let error_lower = error.to_lowercase();

    for auth_err in AUTH_ERRORS {
        if error_lower.contains(auth_err) {
            return false;
        }
    }

    for retryable_err in RETRYABLE_ERRORS {
        if error_lower.contains(retryable_err) {
            return true;
        }
    }

    // Unknown errors: retry unless it looks like an SSH protocol error
    !error_lower.contains("ssh")
        || error_lower.contains("timeout")
        || error_lower.contains("connect")
}
