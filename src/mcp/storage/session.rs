//! DashMap-based session storage implementation.
//!
//! Provides lock-free concurrent access to sessions using `DashMap`.
//! Includes a secondary index for O(1) connection-to-sessions lookups.

use std::collections::HashSet;

use chrono::Utc;
use dashmap::DashMap;

use crate::mcp::types::HistoryEntry;

use super::traits::{SessionRecord, SessionStorage};

/// DashMap-based implementation of `SessionStorage`.
///
/// Uses two `DashMap` instances:
/// - Primary storage: session_id -> SessionRecord
/// - Secondary index: connection_id -> HashSet<session_id>
pub struct DashMapSessionStorage {
    sessions: DashMap<String, SessionRecord>,
    sessions_by_connection: DashMap<String, HashSet<String>>,
}

impl DashMapSessionStorage {
    /// Create a new session storage instance.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            sessions_by_connection: DashMap::new(),
        }
    }

    fn unindex(&self, connection_id: &str, session_id: &str) {
        if let Some(mut ids) = self.sessions_by_connection.get_mut(connection_id) {
            ids.remove(session_id);
            if ids.is_empty() {
                drop(ids);
                self.sessions_by_connection
                    .remove_if(connection_id, |_, ids| ids.is_empty());
            }
        }
    }
}

impl Default for DashMapSessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStorage for DashMapSessionStorage {
    fn insert(&self, record: SessionRecord) {
        self.sessions_by_connection
            .entry(record.connection_id.clone())
            .or_default()
            .insert(record.id.clone());
        self.sessions.insert(record.id.clone(), record);
    }

    fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.get(session_id).map(|r| r.clone())
    }

    fn remove(&self, session_id: &str) -> Option<SessionRecord> {
        let (_, record) = self.sessions.remove(session_id)?;
        self.unindex(&record.connection_id, &record.id);
        Some(record)
    }

    fn list(&self) -> Vec<SessionRecord> {
        self.sessions.iter().map(|r| r.clone()).collect()
    }

    fn list_by_connection(&self, connection_id: &str) -> Vec<SessionRecord> {
        let ids: Vec<String> = self
            .sessions_by_connection
            .get(connection_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    fn count_by_connection(&self, connection_id: &str) -> usize {
        self.sessions_by_connection
            .get(connection_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    fn remove_by_connection(&self, connection_id: &str) -> Vec<SessionRecord> {
        let ids = self
            .sessions_by_connection
            .remove(connection_id)
            .map(|(_, ids)| ids)
            .unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.sessions.remove(&id).map(|(_, record)| record))
            .collect()
    }

    fn record_command(
        &self,
        session_id: &str,
        entry: HistoryEntry,
        working_directory: Option<String>,
        history_cap: usize,
    ) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut record) => {
                record.history.push(entry);
                if record.history.len() > history_cap {
                    let excess = record.history.len() - history_cap;
                    record.history.drain(..excess);
                }
                record.command_count += 1;
                record.last_activity = Utc::now();
                if let Some(dir) = working_directory {
                    record.working_directory = dir;
                }
                true
            }
            None => false,
        }
    }
}
