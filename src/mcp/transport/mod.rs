//! Remote shell transport capability.
//!
//! The core never talks to SSH directly. It consumes four traits:
//!
//! - [`Transport`]: opens an authenticated [`RemoteHandle`].
//! - [`RemoteHandle`]: one live transport; dispatches commands and opens
//!   file-transfer channels. Closing is idempotent.
//! - [`ExecStream`]: the event stream of one dispatched command.
//! - [`FileTransferChannel`]: the file-transfer primitives on a fresh channel.
//!
//! The production implementation lives in [`ssh`] (russh + russh-sftp).
//! Tests use the scripted implementation in `mock`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use russh::keys::PrivateKey;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mcp::error::ShellError;

#[cfg(test)]
pub(crate) mod mock;
pub mod ssh;

/// Everything needed to open one transport.
#[derive(Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub key: Arc<PrivateKey>,
    pub compress: bool,
}

impl ConnectParams {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Key material stays out of logs.
impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("compress", &self.compress)
            .finish_non_exhaustive()
    }
}

/// One event of a running command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Exit(i32),
}

/// Kind of a remote directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One entry returned by [`FileTransferChannel::list_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Open and authenticate a transport.
    ///
    /// Implementations must leave nothing open when they return an error.
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn RemoteHandle>, ShellError>;
}

#[async_trait]
pub trait RemoteHandle: Send + Sync {
    /// Dispatch a command. Errors here are dispatch-level failures.
    async fn exec(&self, command: &str) -> Result<Box<dyn ExecStream>, ShellError>;

    /// Open a fresh file-transfer channel.
    async fn open_file_transfer(&self) -> Result<Box<dyn FileTransferChannel>, ShellError>;

    /// Whether the transport has been closed locally or by the peer.
    fn is_closed(&self) -> bool;

    /// Close the transport. Only the first call reaches the wire; later calls
    /// are no-ops. Errors are swallowed.
    async fn close(&self);
}

#[async_trait]
pub trait ExecStream: Send {
    /// Next event; `None` once the stream has closed, `Err` on a stream error.
    async fn next_event(&mut self) -> Option<Result<ExecEvent, ShellError>>;

    /// Best-effort close of the underlying channel.
    async fn close(&mut self);
}

#[async_trait]
pub trait FileTransferChannel: Send {
    async fn read_file(&mut self, path: &str) -> Result<Vec<u8>, ShellError>;
    async fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), ShellError>;
    async fn list_dir(&mut self, path: &str) -> Result<Vec<RemoteEntry>, ShellError>;
    async fn remove_file(&mut self, path: &str) -> Result<(), ShellError>;
    async fn make_dir(&mut self, path: &str) -> Result<(), ShellError>;
    async fn remove_dir(&mut self, path: &str) -> Result<(), ShellError>;
    async fn close(&mut self);
}
