//! MCP remote shell tools.
//!
//! Every tool is a thin adapter over [`ShellManager`]: it parses arguments,
//! calls one manager operation and shapes the structured response. Failures
//! are returned as a JSON `{kind, message, context}` payload.
//!
//! - Connections: `ssh_connect`, `ssh_disconnect`, `ssh_list_connections`, `ssh_execute`
//! - Sessions: `ssh_session_start`, `ssh_session_execute`, `ssh_session_close`,
//!   `ssh_session_info`, `ssh_session_history`, `ssh_list_sessions`
//! - Files: `ssh_upload`, `ssh_download`, `ssh_list_dir`, `ssh_delete`,
//!   `ssh_mkdir`, `ssh_rmdir`
//! - `ssh_get_stats`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use poem_mcpserver::{Tools, tool::StructuredContent};
use tracing::{error, info};

use super::auth::KeySource;
use super::error::ShellError;
use super::manager::{ConnectRequest, Execution, ShellManager};
use super::message::{
    CommandMessageBuilder, ConnectMessageBuilder, DisconnectMessageBuilder,
    SessionStartMessageBuilder,
};
use super::transfer;
use super::types::{
    CommandResponse, ConnectResponse, ConnectionListResponse, DirListingResponse,
    DisconnectResponse, SessionCloseResponse, SessionHistoryResponse, SessionInfoResponse,
    SessionListResponse, SessionStartResponse, StatsSnapshot, TransferOperation, TransferResponse,
};

/// MCP tool implementation over a shared [`ShellManager`].
pub struct McpShellCommands {
    manager: Arc<ShellManager>,
}

impl McpShellCommands {
    pub fn new(manager: Arc<ShellManager>) -> Self {
        Self { manager }
    }
}

/// Exactly one of `key_path` or `private_key`.
fn key_source(key_path: Option<String>, private_key: Option<String>) -> Result<KeySource, ShellError> {
    match (key_path, private_key) {
        (Some(path), None) => Ok(KeySource::File(PathBuf::from(path))),
        (None, Some(text)) => Ok(KeySource::Inline(text)),
        (Some(_), Some(_)) => Err(ShellError::Validation(
            "provide either key_path or private_key, not both".to_string(),
        )),
        (None, None) => Err(ShellError::Validation(
            "a private key is required: set key_path or private_key".to_string(),
        )),
    }
}

fn command_response(exec: Execution) -> CommandResponse {
    let message = CommandMessageBuilder::new(&exec.command, exec.output.exit_status)
        .with_session_id(exec.session_id.as_deref())
        .with_working_directory(&exec.working_directory)
        .directory_changed(exec.directory_changed)
        .build();

    CommandResponse {
        connection_id: exec.connection_id,
        session_id: exec.session_id,
        command: exec.command,
        exit_status: exec.output.exit_status,
        success: exec.output.exit_status == 0,
        stdout: exec.output.stdout,
        stderr: exec.output.stderr,
        working_directory: exec.working_directory,
        duration_ms: exec.output.elapsed.as_millis() as u64,
        message,
    }
}

fn transfer_response(
    connection_id: String,
    operation: TransferOperation,
    remote_path: String,
    local_path: Option<String>,
    bytes: Option<u64>,
    started: Instant,
) -> TransferResponse {
    let message = match (bytes, &local_path) {
        (Some(b), Some(local)) if operation == TransferOperation::Upload => {
            format!("Uploaded {} bytes from {} to {}", b, local, remote_path)
        }
        (Some(b), Some(local)) => {
            format!("Downloaded {} bytes from {} to {}", b, remote_path, local)
        }
        _ => format!("{} {} succeeded", operation, remote_path),
    };

    TransferResponse {
        connection_id,
        operation,
        remote_path,
        local_path,
        bytes,
        duration_ms: started.elapsed().as_millis() as u64,
        message,
    }
}

#[Tools]
impl McpShellCommands {
    /// Connect to a remote host with key authentication and register the connection.
    ///
    /// Returns a connection_id for subsequent commands. Transient network failures
    /// are retried with exponential backoff; authentication failures are not.
    /// Names are unique among live connections.
    #[allow(clippy::too_many_arguments)]
    async fn ssh_connect(
        &self,
        /// Remote host name or address
        host: String,
        /// Remote port (default: 22)
        port: Option<u16>,
        /// Login user
        username: String,
        /// Path to a private key file (OpenSSH or PEM)
        key_path: Option<String>,
        /// Private key text, as an alternative to key_path
        private_key: Option<String>,
        /// Passphrase for an encrypted private key
        passphrase: Option<String>,
        /// Optional unique display name (e.g., "production-db"); defaults to the connection ID
        name: Option<String>,
    ) -> Result<StructuredContent<ConnectResponse>, String> {
        let context_host = host.clone();
        let result = async {
            let key = key_source(key_path, private_key)?;
            self.manager
                .connect(ConnectRequest {
                    host,
                    port: port.unwrap_or(22),
                    username,
                    key,
                    passphrase,
                    name,
                })
                .await
        }
        .await;

        match result {
            Ok(connected) => {
                let view = connected.connection;
                let message = ConnectMessageBuilder::new(
                    &view.connection_id,
                    &view.username,
                    format!("{}:{}", view.host, view.port),
                )
                .with_name(Some(&view.name))
                .with_retry_attempts(connected.retry_attempts)
                .build();

                Ok(StructuredContent(ConnectResponse {
                    connection_id: view.connection_id,
                    name: view.name,
                    host: view.host,
                    port: view.port,
                    username: view.username,
                    working_directory: view.working_directory,
                    retry_attempts: connected.retry_attempts,
                    message,
                }))
            }
            Err(e) => {
                error!("Connection to {} failed: {}", context_host, e);
                Err(e.to_tool_error(&[("host", &context_host)]))
            }
        }
    }

    /// Close a connection. Every session bound to it is closed as well.
    async fn ssh_disconnect(
        &self,
        /// Connection ID returned from ssh_connect
        connection_id: String,
    ) -> Result<StructuredContent<DisconnectResponse>, String> {
        let summary = self
            .manager
            .disconnect(&connection_id)
            .await
            .map_err(|e| e.to_tool_error(&[("connection_id", &connection_id)]))?;

        let message = DisconnectMessageBuilder::new(&summary.connection_id)
            .with_name(Some(&summary.name))
            .with_sessions_closed(summary.sessions_closed)
            .with_command_count(summary.command_count)
            .build();

        Ok(StructuredContent(DisconnectResponse {
            connection_id: summary.connection_id,
            name: summary.name,
            connected_secs: summary.connected_for.as_secs(),
            command_count: summary.command_count,
            sessions_closed: summary.sessions_closed,
            message,
        }))
    }

    /// List registered connections, oldest first, with liveness and session counts.
    async fn ssh_list_connections(&self) -> StructuredContent<ConnectionListResponse> {
        let connections = self.manager.list_connections();
        let count = connections.len();
        StructuredContent(ConnectionListResponse { connections, count })
    }

    /// Run a shell command on a connection, in its tracked working directory.
    ///
    /// A leading `cd <dir>` (alone or followed by `&&`) moves the connection's
    /// working directory when it succeeds. Sessions keep their own directories.
    async fn ssh_execute(
        &self,
        /// Connection ID returned from ssh_connect
        connection_id: String,
        /// Shell command to run
        command: String,
        /// Timeout in milliseconds (default: 30000, env: SSH_COMMAND_TIMEOUT_MS)
        timeout_ms: Option<u64>,
    ) -> Result<StructuredContent<CommandResponse>, String> {
        self.manager
            .execute(&connection_id, &command, timeout_ms)
            .await
            .map(|exec| StructuredContent(command_response(exec)))
            .map_err(|e| {
                e.to_tool_error(&[("connection_id", &connection_id), ("command", &command)])
            })
    }

    /// Start a session on a connection: an independent working directory and history.
    ///
    /// Without initial_directory the session starts in the connection's current
    /// directory. A directory that cannot be entered falls back to the login
    /// directory and is reported with directory_verified=false.
    async fn ssh_session_start(
        &self,
        /// Connection ID returned from ssh_connect
        connection_id: String,
        /// Optional display name for the session
        name: Option<String>,
        /// Optional starting directory
        initial_directory: Option<String>,
    ) -> Result<StructuredContent<SessionStartResponse>, String> {
        let started = self
            .manager
            .start_session(&connection_id, name, initial_directory.clone())
            .await
            .map_err(|e| e.to_tool_error(&[("connection_id", &connection_id)]))?;

        let view = started.session;
        let message = SessionStartMessageBuilder::new(
            &view.session_id,
            &view.connection_id,
            &view.working_directory,
        )
        .with_name(Some(&view.name))
        .with_requested_directory(initial_directory)
        .directory_verified(started.directory_verified)
        .build();

        Ok(StructuredContent(SessionStartResponse {
            session_id: view.session_id,
            name: view.name,
            connection_id: view.connection_id,
            working_directory: view.working_directory,
            directory_verified: started.directory_verified,
            message,
        }))
    }

    /// Run a shell command in a session's tracked working directory.
    ///
    /// The command is recorded in the session history, including failures.
    async fn ssh_session_execute(
        &self,
        /// Session ID returned from ssh_session_start
        session_id: String,
        /// Shell command to run
        command: String,
        /// Timeout in milliseconds (default: 30000, env: SSH_COMMAND_TIMEOUT_MS)
        timeout_ms: Option<u64>,
    ) -> Result<StructuredContent<CommandResponse>, String> {
        self.manager
            .session_execute(&session_id, &command, timeout_ms)
            .await
            .map(|exec| StructuredContent(command_response(exec)))
            .map_err(|e| e.to_tool_error(&[("session_id", &session_id), ("command", &command)]))
    }

    /// Close a session. The connection stays open.
    async fn ssh_session_close(
        &self,
        /// Session ID returned from ssh_session_start
        session_id: String,
    ) -> Result<StructuredContent<SessionCloseResponse>, String> {
        let summary = self
            .manager
            .close_session(&session_id)
            .map_err(|e| e.to_tool_error(&[("session_id", &session_id)]))?;

        let message = format!(
            "Session '{}' closed after {} command(s).",
            summary.session_id, summary.command_count
        );
        Ok(StructuredContent(SessionCloseResponse {
            session_id: summary.session_id,
            name: summary.name,
            duration_secs: summary.open_for.as_secs(),
            command_count: summary.command_count,
            message,
        }))
    }

    /// Describe a session, including whether its connection is still alive.
    async fn ssh_session_info(
        &self,
        /// Session ID returned from ssh_session_start
        session_id: String,
    ) -> Result<StructuredContent<SessionInfoResponse>, String> {
        let session = self
            .manager
            .describe_session(&session_id)
            .map_err(|e| e.to_tool_error(&[("session_id", &session_id)]))?;

        let message = if session.connection_alive {
            format!(
                "Session '{}' is in {} on connection '{}'.",
                session.session_id, session.working_directory, session.connection_id
            )
        } else {
            format!(
                "Session '{}' belongs to connection '{}', which is no longer alive.",
                session.session_id, session.connection_id
            )
        };
        Ok(StructuredContent(SessionInfoResponse { session, message }))
    }

    /// Command history of a session, oldest first. At most 500 entries are retained.
    async fn ssh_session_history(
        &self,
        /// Session ID returned from ssh_session_start
        session_id: String,
        /// Return only the most recent N entries
        limit: Option<usize>,
    ) -> Result<StructuredContent<SessionHistoryResponse>, String> {
        let (entries, total) = self
            .manager
            .session_history(&session_id, limit)
            .map_err(|e| e.to_tool_error(&[("session_id", &session_id)]))?;

        Ok(StructuredContent(SessionHistoryResponse {
            session_id,
            count: entries.len(),
            entries,
            total,
        }))
    }

    /// List sessions, optionally only those of one connection.
    async fn ssh_list_sessions(
        &self,
        /// Only list sessions bound to this connection
        connection_id: Option<String>,
    ) -> StructuredContent<SessionListResponse> {
        let sessions = self.manager.list_sessions(connection_id.as_deref());
        let count = sessions.len();
        StructuredContent(SessionListResponse { sessions, count })
    }

    /// Upload a local file to the remote host.
    async fn ssh_upload(
        &self,
        /// Connection ID returned from ssh_connect
        connection_id: String,
        /// Local source file
        local_path: String,
        /// Remote destination file
        remote_path: String,
        /// Timeout in milliseconds (default: 120000, env: SSH_TRANSFER_TIMEOUT_MS)
        timeout_ms: Option<u64>,
    ) -> Result<StructuredContent<TransferResponse>, String> {
        let started = Instant::now();
        let bytes = self
            .manager
            .upload(&connection_id, local_path.as_ref(), &remote_path, timeout_ms)
            .await
            .map_err(|e| {
                e.to_tool_error(&[
                    ("connection_id", &connection_id),
                    ("local_path", &local_path),
                    ("remote_path", &remote_path),
                ])
            })?;

        info!("Uploaded {} bytes to {}", bytes, remote_path);
        Ok(StructuredContent(transfer_response(
            connection_id,
            TransferOperation::Upload,
            remote_path,
            Some(local_path),
            Some(bytes),
            started,
        )))
    }

    /// Download a remote file. Missing local parent directories are created.
    async fn ssh_download(
        &self,
        /// Connection ID returned from ssh_connect
        connection_id: String,
        /// Remote source file
        remote_path: String,
        /// Local destination file
        local_path: String,
        /// Timeout in milliseconds (default: 120000, env: SSH_TRANSFER_TIMEOUT_MS)
        timeout_ms: Option<u64>,
    ) -> Result<StructuredContent<TransferResponse>, String> {
        let started = Instant::now();
        let bytes = self
            .manager
            .download(&connection_id, &remote_path, local_path.as_ref(), timeout_ms)
            .await
            .map_err(|e| {
                e.to_tool_error(&[
                    ("connection_id", &connection_id),
                    ("remote_path", &remote_path),
                    ("local_path", &local_path),
                ])
            })?;

        info!("Downloaded {} bytes from {}", bytes, remote_path);
        Ok(StructuredContent(transfer_response(
            connection_id,
            TransferOperation::Download,
            remote_path,
            Some(local_path),
            Some(bytes),
            started,
        )))
    }

    /// List a remote directory, directories first.
    async fn ssh_list_dir(
        &self,
        /// Connection ID returned from ssh_connect
        connection_id: String,
        /// Remote directory
        path: String,
        /// Timeout in milliseconds (default: 120000, env: SSH_TRANSFER_TIMEOUT_MS)
        timeout_ms: Option<u64>,
    ) -> Result<StructuredContent<DirListingResponse>, String> {
        let entries = self
            .manager
            .list_dir(&connection_id, &path, timeout_ms)
            .await
            .map_err(|e| e.to_tool_error(&[("connection_id", &connection_id), ("path", &path)]))?;

        Ok(StructuredContent(DirListingResponse {
            connection_id,
            path,
            count: entries.len(),
            listing: transfer::render_listing(&entries),
            entries: entries.iter().map(transfer::entry_view).collect(),
        }))
    }

    /// Delete a remote file.
    async fn ssh_delete(
        &self,
        /// Connection ID returned from ssh_connect
        connection_id: String,
        /// Remote file to delete
        remote_path: String,
        /// Timeout in milliseconds (default: 120000, env: SSH_TRANSFER_TIMEOUT_MS)
        timeout_ms: Option<u64>,
    ) -> Result<StructuredContent<TransferResponse>, String> {
        let started = Instant::now();
        self.manager
            .delete(&connection_id, &remote_path, timeout_ms)
            .await
            .map_err(|e| {
                e.to_tool_error(&[("connection_id", &connection_id), ("remote_path", &remote_path)])
            })?;

        Ok(StructuredContent(transfer_response(
            connection_id,
            TransferOperation::Delete,
            remote_path,
            None,
            None,
            started,
        )))
    }

    /// Create a remote directory. The parent must exist.
    async fn ssh_mkdir(
        &self,
        /// Connection ID returned from ssh_connect
        connection_id: String,
        /// Remote directory to create
        remote_path: String,
        /// Timeout in milliseconds (default: 120000, env: SSH_TRANSFER_TIMEOUT_MS)
        timeout_ms: Option<u64>,
    ) -> Result<StructuredContent<TransferResponse>, String> {
        let started = Instant::now();
        self.manager
            .mkdir(&connection_id, &remote_path, timeout_ms)
            .await
            .map_err(|e| {
                e.to_tool_error(&[("connection_id", &connection_id), ("remote_path", &remote_path)])
            })?;

        Ok(StructuredContent(transfer_response(
            connection_id,
            TransferOperation::Mkdir,
            remote_path,
            None,
            None,
            started,
        )))
    }

    /// Remove an empty remote directory.
    async fn ssh_rmdir(
        &self,
        /// Connection ID returned from ssh_connect
        connection_id: String,
        /// Remote directory to remove
        remote_path: String,
        /// Timeout in milliseconds (default: 120000, env: SSH_TRANSFER_TIMEOUT_MS)
        timeout_ms: Option<u64>,
    ) -> Result<StructuredContent<TransferResponse>, String> {
        let started = Instant::now();
        self.manager
            .rmdir(&connection_id, &remote_path, timeout_ms)
            .await
            .map_err(|e| {
                e.to_tool_error(&[("connection_id", &connection_id), ("remote_path", &remote_path)])
            })?;

        Ok(StructuredContent(transfer_response(
            connection_id,
            TransferOperation::Rmdir,
            remote_path,
            None,
            None,
            started,
        )))
    }

    /// Process-wide connection and command statistics.
    async fn ssh_get_stats(&self) -> StructuredContent<StatsSnapshot> {
        StructuredContent(self.manager.stats())
    }
}
