//! Serializable response types for MCP remote shell tools.
//!
//! All types implement `Serialize`, `Deserialize`, and `JsonSchema` for proper
//! MCP protocol compatibility. Unsigned fields use [`crate::mcp::schema::uint`]
//! so schemas carry no Rust-specific integer formats. Timestamps are RFC3339
//! strings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mcp::transport::EntryKind;

/// Snapshot of one live connection.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectionView {
    pub connection_id: String,
    /// Display name, unique among live connections
    pub name: String,
    pub host: String,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub port: u16,
    pub username: String,
    pub connected_at: String,
    pub last_activity: String,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub command_count: u64,
    /// Directory commands issued directly on the connection run in
    pub working_directory: String,
    /// Whether the transport is still open
    pub alive: bool,
    /// Number of sessions bound to this connection
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub session_count: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ConnectResponse {
    pub connection_id: String,
    pub name: String,
    pub host: String,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub port: u16,
    pub username: String,
    pub working_directory: String,
    /// Number of retry attempts needed to establish the connection
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub retry_attempts: u32,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DisconnectResponse {
    pub connection_id: String,
    pub name: String,
    /// How long the connection was open, in seconds
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub connected_secs: u64,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub command_count: u64,
    /// Sessions removed along with the connection
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub sessions_closed: usize,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ConnectionListResponse {
    pub connections: Vec<ConnectionView>,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub count: usize,
}

/// Outcome of a command that ran to completion on the remote side.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CommandResponse {
    pub connection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// The command as submitted, before directory rewriting
    pub command: String,
    pub exit_status: i32,
    /// `exit_status == 0`
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Tracked directory after the command
    pub working_directory: String,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub duration_ms: u64,
    pub message: String,
}

/// One executed command in a session's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HistoryEntry {
    pub command: String,
    pub executed_at: String,
    /// Remote exit status; absent when the command failed at transport level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
    /// Tracked directory the command ran in
    pub working_directory: String,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub duration_ms: u64,
}

/// Snapshot of one session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionView {
    pub session_id: String,
    pub name: String,
    pub connection_id: String,
    pub working_directory: String,
    /// Always true for a listed session; closed sessions are removed
    pub active: bool,
    /// Whether the referenced connection is still registered and open
    pub connection_alive: bool,
    pub created_at: String,
    pub last_activity: String,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub command_count: u64,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub history_len: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionStartResponse {
    pub session_id: String,
    pub name: String,
    pub connection_id: String,
    pub working_directory: String,
    /// False when a requested initial directory could not be entered
    pub directory_verified: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionCloseResponse {
    pub session_id: String,
    pub name: String,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub duration_secs: u64,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub command_count: u64,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionInfoResponse {
    pub session: SessionView,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionHistoryResponse {
    pub session_id: String,
    /// Oldest first
    pub entries: Vec<HistoryEntry>,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub count: usize,
    /// Entries retained for the session
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionView>,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub count: usize,
}

/// Which file-transfer operation a [`TransferResponse`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransferOperation {
    Upload,
    Download,
    Delete,
    Mkdir,
    Rmdir,
}

impl std::fmt::Display for TransferOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferOperation::Upload => write!(f, "upload"),
            TransferOperation::Download => write!(f, "download"),
            TransferOperation::Delete => write!(f, "delete"),
            TransferOperation::Mkdir => write!(f, "mkdir"),
            TransferOperation::Rmdir => write!(f, "rmdir"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TransferResponse {
    pub connection_id: String,
    pub operation: TransferOperation,
    pub remote_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    /// Bytes moved, for upload and download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub bytes: Option<u64>,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub duration_ms: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DirEntryView {
    pub name: String,
    pub kind: EntryKind,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DirListingResponse {
    pub connection_id: String,
    pub path: String,
    /// Directories first, then by name
    pub entries: Vec<DirEntryView>,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub count: usize,
    /// One line per entry: kind, size, modification time, name
    pub listing: String,
}

/// Process-wide counters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatsSnapshot {
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub total_connections: u64,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub active_connections: u64,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub total_commands: u64,
    /// Commands that ran to completion, whatever their exit status
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub successful_commands: u64,
    /// Commands that timed out or failed at transport level
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub failed_commands: u64,
    pub total_execution_ms: f64,
    pub average_execution_ms: f64,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub uptime_secs: u64,
}
