//! DashMap-based connection storage implementation.
//!
//! Uses two `DashMap` instances:
//! - Primary storage: connection_id -> ConnectionRecord
//! - Name index: display name -> connection_id, for O(1) conflict checks

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::traits::{ConnectionRecord, ConnectionStorage};

pub struct DashMapConnectionStorage {
    connections: DashMap<String, ConnectionRecord>,
    names: DashMap<String, String>,
}

impl DashMapConnectionStorage {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            names: DashMap::new(),
        }
    }
}

impl Default for DashMapConnectionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStorage for DashMapConnectionStorage {
    fn reserve_name(&self, name: &str, connection_id: &str) -> Result<(), String> {
        match self.names.entry(name.to_string()) {
            Entry::Occupied(holder) => Err(holder.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(connection_id.to_string());
                Ok(())
            }
        }
    }

    fn release_name(&self, name: &str, connection_id: &str) {
        self.names.remove_if(name, |_, holder| holder == connection_id);
    }

    fn insert(&self, record: ConnectionRecord) {
        self.connections.insert(record.id.clone(), record);
    }

    fn get(&self, connection_id: &str) -> Option<ConnectionRecord> {
        self.connections.get(connection_id).map(|r| r.clone())
    }

    fn remove(&self, connection_id: &str) -> Option<ConnectionRecord> {
        let (_, record) = self.connections.remove(connection_id)?;
        self.release_name(&record.name, &record.id);
        Some(record)
    }

    fn list(&self) -> Vec<ConnectionRecord> {
        self.connections.iter().map(|r| r.clone()).collect()
    }

    fn connection_ids(&self) -> Vec<String> {
        self.connections.iter().map(|r| r.key().clone()).collect()
    }

    fn record_command(&self, connection_id: &str, working_directory: Option<String>) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut record) => {
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

    fn touch(&self, connection_id: &str) {
        if let Some(mut record) = self.connections.get_mut(connection_id) {
            record.last_activity = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mcp::directory::DEFAULT_HOME;
    use crate::mcp::transport::mock::MockRemote;

    fn record(id: &str, name: &str) -> ConnectionRecord {
        let now = Utc::now();
        ConnectionRecord {
            id: id.to_string(),
            name: name.to_string(),
            host: "example.com".to_string(),
            port: 22,
            username: "tester".to_string(),
            handle: Arc::new(MockRemote::new()),
            connected_at: now,
            last_activity: now,
            command_count: 0,
            working_directory: DEFAULT_HOME.to_string(),
        }
    }

    mod names {
        use super::*;

        #[test]
        fn test_reserve_conflict_reports_holder() {
            let storage = DashMapConnectionStorage::new();
            assert!(storage.reserve_name("prod", "conn-1").is_ok());
            assert_eq!(storage.reserve_name("prod", "conn-2"), Err("conn-1".to_string()));
        }

        #[test]
        fn test_release_only_by_holder() {
            let storage = DashMapConnectionStorage::new();
            storage.reserve_name("prod", "conn-1").unwrap();

            storage.release_name("prod", "conn-2");
            assert!(storage.reserve_name("prod", "conn-3").is_err());

            storage.release_name("prod", "conn-1");
            assert!(storage.reserve_name("prod", "conn-3").is_ok());
        }

        #[test]
        fn test_remove_releases_name() {
            let storage = DashMapConnectionStorage::new();
            storage.reserve_name("prod", "conn-1").unwrap();
            storage.insert(record("conn-1", "prod"));

            assert!(storage.remove("conn-1").is_some());
            assert!(storage.reserve_name("prod", "conn-2").is_ok());
        }
    }

    #[test]
    fn test_remove_is_taken_once() {
        let storage = DashMapConnectionStorage::new();
        storage.insert(record("conn-1", "a"));

        assert!(storage.remove("conn-1").is_some());
        assert!(storage.remove("conn-1").is_none());
        assert!(storage.get("conn-1").is_none());
    }

    #[test]
    fn test_record_command_updates_counters_and_directory() {
        let storage = DashMapConnectionStorage::new();
        storage.insert(record("conn-1", "a"));

        assert!(storage.record_command("conn-1", None));
        assert!(storage.record_command("conn-1", Some("/srv".to_string())));

        let stored = storage.get("conn-1").unwrap();
        assert_eq!(stored.command_count, 2);
        assert_eq!(stored.working_directory, "/srv");
    }

    #[test]
    fn test_record_command_on_missing_connection() {
        let storage = DashMapConnectionStorage::new();
        assert!(!storage.record_command("nope", None));
    }

    #[test]
    fn test_list_and_ids() {
        let storage = DashMapConnectionStorage::new();
        assert!(storage.list().is_empty());
        storage.insert(record("conn-1", "a"));
        storage.insert(record("conn-2", "b"));
        assert_eq!(storage.list().len(), 2);
        let mut ids = storage.connection_ids();
        ids.sort();
        assert_eq!(ids, vec!["conn-1", "conn-2"]);
    }
}
