//! Storage trait definitions for connection and session state.
//!
//! These traits define the interface for storage implementations, enabling
//! dependency injection and testability. Every mutation is a single call so
//! that no caller ever holds a map guard across an `.await`.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::mcp::transport::RemoteHandle;
use crate::mcp::types::HistoryEntry;

/// Registry entry for one live connection.
#[derive(Clone)]
pub struct ConnectionRecord {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Exclusively owned; closed exactly once, when the record is removed
    pub handle: Arc<dyn RemoteHandle>,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub command_count: u64,
    pub working_directory: String,
}

impl std::fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("closed", &self.handle.is_closed())
            .field("command_count", &self.command_count)
            .field("working_directory", &self.working_directory)
            .finish_non_exhaustive()
    }
}

/// Registry entry for one session.
///
/// `connection_id` is a lookup key only; the session never keeps its
/// connection alive.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub name: String,
    pub connection_id: String,
    pub working_directory: String,
    /// Oldest first, bounded by the cap passed to `record_command`
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub command_count: u64,
}

/// Trait for connection storage operations.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// async tasks. Display names are reserved separately from insertion so a
/// name can be claimed before the handshake starts.
pub trait ConnectionStorage: Send + Sync {
    /// Claim `name` for `connection_id`. Returns the current holder's ID when
    /// the name is taken.
    fn reserve_name(&self, name: &str, connection_id: &str) -> Result<(), String>;

    /// Release `name` if it is still held by `connection_id`.
    fn release_name(&self, name: &str, connection_id: &str);

    /// Insert a connection whose name has already been reserved.
    fn insert(&self, record: ConnectionRecord);

    fn get(&self, connection_id: &str) -> Option<ConnectionRecord>;

    /// Remove a connection and release its name. Only one caller ever
    /// receives the record.
    fn remove(&self, connection_id: &str) -> Option<ConnectionRecord>;

    fn list(&self) -> Vec<ConnectionRecord>;

    fn connection_ids(&self) -> Vec<String>;

    /// Count a command, refresh last activity and optionally move the
    /// tracked directory. Returns false if the connection is gone.
    fn record_command(&self, connection_id: &str, working_directory: Option<String>) -> bool;

    /// Refresh last activity.
    fn touch(&self, connection_id: &str);
}

/// Trait for session storage operations.
///
/// The default implementation keeps a secondary index from connection ID to
/// session IDs for cascaded removal.
pub trait SessionStorage: Send + Sync {
    fn insert(&self, record: SessionRecord);

    fn get(&self, session_id: &str) -> Option<SessionRecord>;

    fn remove(&self, session_id: &str) -> Option<SessionRecord>;

    fn list(&self) -> Vec<SessionRecord>;

    fn list_by_connection(&self, connection_id: &str) -> Vec<SessionRecord>;

    fn count_by_connection(&self, connection_id: &str) -> usize;

    /// Remove every session bound to `connection_id`, returning them.
    fn remove_by_connection(&self, connection_id: &str) -> Vec<SessionRecord>;

    /// Append to history (dropping the oldest entries beyond `history_cap`),
    /// count the command and, when given, move the tracked directory.
    /// Returns false if the session is gone.
    fn record_command(
        &self,
        session_id: &str,
        entry: HistoryEntry,
        working_directory: Option<String>,
        history_cap: usize,
    ) -> bool;
}
