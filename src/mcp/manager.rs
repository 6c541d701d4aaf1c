//! Connection and session multiplexing.
//!
//! [`ShellManager`] is the single owner of all runtime state: the connection
//! registry, the session registry and the statistics. Tool handlers hold an
//! `Arc<ShellManager>`; nothing lives in globals.
//!
//! # Connections
//!
//! A connection becomes visible only after its handshake completes. The
//! display name is reserved before the handshake starts, so two concurrent
//! connects with the same name cannot both succeed, and a conflicting name
//! never costs a network attempt. Handshake failures classified as transient
//! are retried with exponential backoff; each attempt is bounded by the
//! handshake timeout.
//!
//! # Sessions
//!
//! A session references its connection by ID only. It keeps its own tracked
//! directory and history; a command in one session never moves another
//! session's directory or the connection's own directory.
//!
//! # Dead transports
//!
//! Every operation re-validates liveness before use. When an operation finds
//! the transport closed (up front, or after a failure) it runs
//! [`ShellManager::cleanup`], which removes the connection and every session
//! bound to it, and the caller gets [`ShellError::ConnectionClosed`]. Cleanup
//! is idempotent, so concurrent detections are harmless.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::mcp::auth::{KeySource, load_private_key};
use crate::mcp::config::{MAX_RETRY_DELAY, ManagerConfig};
use crate::mcp::directory::{self, DEFAULT_HOME};
use crate::mcp::error::{EntityKind, ShellError};
use crate::mcp::executor::{self, CommandOutput};
use crate::mcp::ids;
use crate::mcp::stats::Statistics;
use crate::mcp::storage::{
    ConnectionRecord, ConnectionStorage, DashMapConnectionStorage, DashMapSessionStorage,
    SessionRecord, SessionStorage,
};
use crate::mcp::transfer;
use crate::mcp::transport::{ConnectParams, RemoteEntry, RemoteHandle, Transport};
use crate::mcp::types::{ConnectionView, HistoryEntry, SessionView, StatsSnapshot};

/// Maximum history entries retained per session; the oldest are dropped.
pub const HISTORY_CAP: usize = 500;

/// Arguments of [`ShellManager::connect`].
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub key: KeySource,
    pub passphrase: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Connected {
    pub connection: ConnectionView,
    pub retry_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct DisconnectSummary {
    pub connection_id: String,
    pub name: String,
    pub connected_for: Duration,
    pub command_count: u64,
    pub sessions_closed: usize,
}

/// A command that ran to completion, with the tracked directory after it.
#[derive(Debug, Clone)]
pub struct Execution {
    pub connection_id: String,
    pub session_id: Option<String>,
    pub command: String,
    pub output: CommandOutput,
    pub working_directory: String,
    pub directory_changed: bool,
}

#[derive(Debug, Clone)]
pub struct SessionStarted {
    pub session: SessionView,
    /// False when a requested initial directory could not be entered
    pub directory_verified: bool,
}

#[derive(Debug, Clone)]
pub struct SessionCloseSummary {
    pub session_id: String,
    pub name: String,
    pub open_for: Duration,
    pub command_count: u64,
}

pub struct ShellManager {
    transport: Arc<dyn Transport>,
    config: ManagerConfig,
    connections: Arc<dyn ConnectionStorage>,
    sessions: Arc<dyn SessionStorage>,
    stats: Statistics,
    cancel: CancellationToken,
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn since(t: DateTime<Utc>) -> Duration {
    (Utc::now() - t).to_std().unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ShellManager {
    pub fn new(transport: Arc<dyn Transport>, config: ManagerConfig) -> Self {
        Self::with_storage(
            transport,
            config,
            Arc::new(DashMapConnectionStorage::new()),
            Arc::new(DashMapSessionStorage::new()),
        )
    }

    pub fn with_storage(
        transport: Arc<dyn Transport>,
        config: ManagerConfig,
        connections: Arc<dyn ConnectionStorage>,
        sessions: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            transport,
            config,
            connections,
            sessions,
            stats: Statistics::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Connections
    // ---------------------------------------------------------------------

    /// Open, authenticate and register a connection.
    pub async fn connect(&self, request: ConnectRequest) -> Result<Connected, ShellError> {
        let host = request.host.trim().to_string();
        let username = request.username.trim().to_string();
        if host.is_empty() {
            return Err(ShellError::Validation("host must not be empty".to_string()));
        }
        if username.is_empty() {
            return Err(ShellError::Validation(
                "username must not be empty".to_string(),
            ));
        }
        if request.port == 0 {
            return Err(ShellError::Validation(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        let key = load_private_key(&request.key, request.passphrase.as_deref())?;

        let id = ids::connection_id();
        let name = non_empty(request.name).unwrap_or_else(|| id.clone());
        self.reserve_name(&name, &id).await?;

        let params = ConnectParams {
            host,
            port: request.port,
            username,
            key: Arc::new(key),
            compress: self.config.compression,
        };

        info!(
            "Connecting {} ({}) to {}@{}",
            id,
            name,
            params.username,
            params.address()
        );

        let (handle, retry_attempts) = match self.open_transport(&params).await {
            Ok(opened) => opened,
            Err(e) => {
                self.connections.release_name(&name, &id);
                return Err(e);
            }
        };

        if self.cancel.is_cancelled() {
            handle.close().await;
            self.connections.release_name(&name, &id);
            return Err(ShellError::Cancelled {
                operation: "connect".to_string(),
            });
        }

        let now = Utc::now();
        let record = ConnectionRecord {
            id: id.clone(),
            name,
            host: params.host,
            port: params.port,
            username: params.username,
            handle,
            connected_at: now,
            last_activity: now,
            command_count: 0,
            working_directory: DEFAULT_HOME.to_string(),
        };
        let connection = self.connection_view(&record);
        self.connections.insert(record);
        self.stats.connection_opened();

        info!("Connection {} established", id);
        Ok(Connected {
            connection,
            retry_attempts,
        })
    }

    /// Claim `name`, evicting a holder whose transport is already dead.
    async fn reserve_name(&self, name: &str, id: &str) -> Result<(), ShellError> {
        let holder = match self.connections.reserve_name(name, id) {
            Ok(()) => return Ok(()),
            Err(holder) => holder,
        };

        let stale = self
            .connections
            .get(&holder)
            .is_some_and(|record| record.handle.is_closed());
        if !stale {
            return Err(ShellError::NameConflict {
                name: name.to_string(),
                existing_id: holder,
            });
        }

        debug!("Name '{}' held by dead connection {}; cleaning up", name, holder);
        self.cleanup(&holder).await;
        self.connections
            .reserve_name(name, id)
            .map_err(|existing_id| ShellError::NameConflict {
                name: name.to_string(),
                existing_id,
            })
    }

    /// Handshake with retry. Returns the handle and the number of retries used.
    async fn open_transport(
        &self,
        params: &ConnectParams,
    ) -> Result<(Arc<dyn RemoteHandle>, u32), ShellError> {
        let attempt_counter = AtomicU32::new(0);

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.config.retry_delay)
            .with_max_delay(MAX_RETRY_DELAY)
            .with_max_times(self.config.max_retries as usize)
            .with_jitter();

        let result = (|| async {
            let current_attempt = attempt_counter.fetch_add(1, Ordering::SeqCst);
            if current_attempt > 0 {
                warn!(
                    "Connection retry attempt {} to {}@{}",
                    current_attempt,
                    params.username,
                    params.address()
                );
            }
            self.handshake(params).await
        })
        .retry(backoff)
        .when(|e: &ShellError| {
            let retryable = e.is_retryable();
            if !retryable {
                warn!(
                    "Connection to {}@{} failed with non-retryable error: {}",
                    params.username,
                    params.address(),
                    e
                );
            }
            retryable
        })
        .notify(|err: &ShellError, dur: Duration| {
            warn!("Connection failed: {}. Retrying in {:?}", err, dur);
        })
        .await;

        let total_attempts = attempt_counter.load(Ordering::SeqCst);
        let retry_count = total_attempts.saturating_sub(1);

        match result {
            Ok(handle) => {
                if retry_count > 0 {
                    info!(
                        "Connection to {}@{} succeeded after {} retry attempt(s)",
                        params.username,
                        params.address(),
                        retry_count
                    );
                }
                Ok((handle, retry_count))
            }
            Err(e) => {
                error!(
                    "Connection to {}@{} failed after {} attempt(s). Last error: {}",
                    params.username,
                    params.address(),
                    total_attempts,
                    e
                );
                Err(e)
            }
        }
    }

    /// One handshake attempt. Dropping the transport future on timeout or
    /// cancellation tears down anything half-open.
    async fn handshake(&self, params: &ConnectParams) -> Result<Arc<dyn RemoteHandle>, ShellError> {
        let timeout = self.config.handshake_timeout;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ShellError::Cancelled {
                operation: "connect".to_string(),
            }),
            result = tokio::time::timeout(timeout, self.transport.connect(params)) => {
                result.unwrap_or_else(|_| Err(ShellError::Timeout {
                    operation: "handshake".to_string(),
                    timeout,
                }))
            }
        }
    }

    /// Close and remove a connection and every session bound to it.
    pub async fn disconnect(&self, connection_id: &str) -> Result<DisconnectSummary, ShellError> {
        let summary = self
            .remove_connection(connection_id)
            .await
            .ok_or_else(|| ShellError::not_found(EntityKind::Connection, connection_id))?;

        info!(
            "Disconnected {} ({}) after {:?}, {} command(s), {} session(s) closed",
            summary.connection_id,
            summary.name,
            summary.connected_for,
            summary.command_count,
            summary.sessions_closed
        );
        Ok(summary)
    }

    /// Silent, idempotent variant of [`disconnect`](Self::disconnect) used
    /// when a dead transport is detected. Returns the number of sessions removed.
    pub async fn cleanup(&self, connection_id: &str) -> usize {
        match self.remove_connection(connection_id).await {
            Some(summary) => {
                warn!(
                    "Cleaned up connection {} ({}), {} session(s) removed",
                    summary.connection_id, summary.name, summary.sessions_closed
                );
                summary.sessions_closed
            }
            None => 0,
        }
    }

    async fn remove_connection(&self, connection_id: &str) -> Option<DisconnectSummary> {
        let record = self.connections.remove(connection_id)?;
        record.handle.close().await;
        self.stats.connection_closed();
        let sessions_closed = self.sessions.remove_by_connection(connection_id).len();

        Some(DisconnectSummary {
            connection_id: record.id,
            name: record.name,
            connected_for: since(record.connected_at),
            command_count: record.command_count,
            sessions_closed,
        })
    }

    /// Registered connection, whatever its transport state.
    pub fn lookup(&self, connection_id: &str) -> Result<ConnectionRecord, ShellError> {
        self.connections
            .get(connection_id)
            .ok_or_else(|| ShellError::not_found(EntityKind::Connection, connection_id))
    }

    /// Registered and transport not reported closed.
    pub fn is_live(&self, connection_id: &str) -> bool {
        self.connections
            .get(connection_id)
            .is_some_and(|record| !record.handle.is_closed())
    }

    /// Look up a connection for use, cleaning it up if its transport died.
    async fn live_connection(&self, connection_id: &str) -> Result<ConnectionRecord, ShellError> {
        let record = self.lookup(connection_id)?;
        if record.handle.is_closed() {
            self.cleanup(connection_id).await;
            return Err(ShellError::ConnectionClosed {
                connection_id: connection_id.to_string(),
            });
        }
        Ok(record)
    }

    /// Turn an operation failure into `ConnectionClosed` if the transport died.
    async fn after_failure(&self, record: &ConnectionRecord, err: ShellError) -> ShellError {
        if matches!(err, ShellError::Cancelled { .. }) || !record.handle.is_closed() {
            return err;
        }
        warn!(
            "Connection {} found closed after failure: {}",
            record.id, err
        );
        self.cleanup(&record.id).await;
        ShellError::ConnectionClosed {
            connection_id: record.id.clone(),
        }
    }

    pub fn list_connections(&self) -> Vec<ConnectionView> {
        let mut records = self.connections.list();
        records.sort_by_key(|r| r.connected_at);
        records.iter().map(|r| self.connection_view(r)).collect()
    }

    fn connection_view(&self, record: &ConnectionRecord) -> ConnectionView {
        ConnectionView {
            connection_id: record.id.clone(),
            name: record.name.clone(),
            host: record.host.clone(),
            port: record.port,
            username: record.username.clone(),
            connected_at: rfc3339(record.connected_at),
            last_activity: rfc3339(record.last_activity),
            command_count: record.command_count,
            working_directory: record.working_directory.clone(),
            alive: !record.handle.is_closed(),
            session_count: self.sessions.count_by_connection(&record.id),
        }
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Rewrite, dispatch and account for one command run from `tracked`.
    ///
    /// The directory is `Some` only when a directory change succeeded and
    /// moved away from `tracked`; callers write nothing back otherwise, so a
    /// slow command never reverts a `cd` that completed while it ran.
    async fn dispatch(
        &self,
        record: &ConnectionRecord,
        tracked: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<(CommandOutput, Option<String>), ShellError> {
        let rewrite = directory::rewrite_command(tracked, command);

        match executor::run_command(record.handle.as_ref(), &rewrite.command, timeout, &self.cancel)
            .await
        {
            Ok(output) => {
                self.stats.command_succeeded(output.elapsed);
                let next = directory::next_directory(
                    tracked,
                    rewrite.changes_directory,
                    output.exit_status,
                    &output.stdout,
                );
                if next == tracked {
                    if rewrite.changes_directory {
                        debug!("Directory change did not take effect: {}", command);
                    }
                    return Ok((output, None));
                }
                Ok((output, Some(next)))
            }
            Err(e) => {
                self.stats.command_failed();
                warn!("Command failed on {}: {}: {}", record.id, command, e);
                Err(self.after_failure(record, e).await)
            }
        }
    }

    /// Run a command directly on a connection, in its tracked directory.
    pub async fn execute(
        &self,
        connection_id: &str,
        command: &str,
        timeout_ms: Option<u64>,
    ) -> Result<Execution, ShellError> {
        let record = self.live_connection(connection_id).await?;
        let timeout = self.config.command_timeout_or(timeout_ms);

        let (output, moved) = self
            .dispatch(&record, &record.working_directory, command, timeout)
            .await?;

        self.connections.record_command(connection_id, moved.clone());

        Ok(Execution {
            connection_id: connection_id.to_string(),
            session_id: None,
            command: command.to_string(),
            output,
            directory_changed: moved.is_some(),
            working_directory: moved.unwrap_or(record.working_directory),
        })
    }

    // ---------------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------------

    pub async fn start_session(
        &self,
        connection_id: &str,
        name: Option<String>,
        initial_directory: Option<String>,
    ) -> Result<SessionStarted, ShellError> {
        let record = self.live_connection(connection_id).await?;

        let (working_directory, directory_verified) = match non_empty(initial_directory) {
            Some(dir) => match self.verify_directory(&record, &dir).await? {
                Some(resolved) => (resolved, true),
                None => {
                    warn!(
                        "Initial directory '{}' not usable on {}; using {}",
                        dir, connection_id, DEFAULT_HOME
                    );
                    (DEFAULT_HOME.to_string(), false)
                }
            },
            None => (record.working_directory.clone(), true),
        };

        let id = ids::session_id();
        let now = Utc::now();
        let session = SessionRecord {
            id: id.clone(),
            name: non_empty(name).unwrap_or_else(|| id.clone()),
            connection_id: connection_id.to_string(),
            working_directory,
            history: Vec::new(),
            created_at: now,
            last_activity: now,
            command_count: 0,
        };
        self.sessions.insert(session.clone());

        // A cleanup may have cascaded between the liveness check and the insert
        if self.connections.get(connection_id).is_none() {
            self.sessions.remove(&id);
            return Err(ShellError::ConnectionClosed {
                connection_id: connection_id.to_string(),
            });
        }

        info!(
            "Session {} ({}) started on {} in {}",
            id, session.name, connection_id, session.working_directory
        );
        Ok(SessionStarted {
            session: self.session_view(&session),
            directory_verified,
        })
    }

    /// Resolve `dir` from the login directory. `Ok(None)` if it cannot be
    /// entered; `Err` only if the connection died meanwhile.
    async fn verify_directory(
        &self,
        record: &ConnectionRecord,
        dir: &str,
    ) -> Result<Option<String>, ShellError> {
        let rewrite = directory::rewrite_command(DEFAULT_HOME, &format!("cd {}", dir));
        let outcome = executor::run_command(
            record.handle.as_ref(),
            &rewrite.command,
            self.config.command_timeout,
            &self.cancel,
        )
        .await;

        match outcome {
            Ok(output) => {
                let resolved =
                    directory::next_directory(DEFAULT_HOME, true, output.exit_status, &output.stdout);
                Ok((resolved != DEFAULT_HOME).then_some(resolved))
            }
            Err(e) => match self.after_failure(record, e).await {
                e @ (ShellError::ConnectionClosed { .. } | ShellError::Cancelled { .. }) => Err(e),
                e => {
                    debug!("Directory verification failed: {}", e);
                    Ok(None)
                }
            },
        }
    }

    pub fn close_session(&self, session_id: &str) -> Result<SessionCloseSummary, ShellError> {
        let session = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| ShellError::not_found(EntityKind::Session, session_id))?;

        info!(
            "Session {} ({}) closed after {} command(s)",
            session.id, session.name, session.command_count
        );
        Ok(SessionCloseSummary {
            session_id: session.id,
            name: session.name,
            open_for: since(session.created_at),
            command_count: session.command_count,
        })
    }

    /// Read-only snapshot. A dead connection is reported, not cleaned up.
    pub fn describe_session(&self, session_id: &str) -> Result<SessionView, ShellError> {
        self.sessions
            .get(session_id)
            .map(|session| self.session_view(&session))
            .ok_or_else(|| ShellError::not_found(EntityKind::Session, session_id))
    }

    /// Run a command in a session's tracked directory.
    pub async fn session_execute(
        &self,
        session_id: &str,
        command: &str,
        timeout_ms: Option<u64>,
    ) -> Result<Execution, ShellError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| ShellError::not_found(EntityKind::Session, session_id))?;

        let record = match self.live_connection(&session.connection_id).await {
            Ok(record) => record,
            Err(ShellError::NotFound { .. }) => {
                self.sessions.remove(session_id);
                return Err(ShellError::ConnectionClosed {
                    connection_id: session.connection_id,
                });
            }
            Err(e) => return Err(e),
        };

        let timeout = self.config.command_timeout_or(timeout_ms);
        let started = Utc::now();
        let result = self
            .dispatch(&record, &session.working_directory, command, timeout)
            .await;

        let (exit_status, moved, duration) = match &result {
            Ok((output, moved)) => (Some(output.exit_status), moved.clone(), output.elapsed),
            Err(_) => (None, None, since(started)),
        };
        self.sessions.record_command(
            session_id,
            HistoryEntry {
                command: command.to_string(),
                executed_at: rfc3339(started),
                exit_status,
                working_directory: session.working_directory.clone(),
                duration_ms: duration.as_millis() as u64,
            },
            moved,
            HISTORY_CAP,
        );

        let (output, moved) = result?;
        self.connections.record_command(&session.connection_id, None);

        Ok(Execution {
            connection_id: session.connection_id,
            session_id: Some(session_id.to_string()),
            command: command.to_string(),
            output,
            directory_changed: moved.is_some(),
            working_directory: moved.unwrap_or(session.working_directory),
        })
    }

    /// The newest `limit` history entries (all when `None`), oldest first,
    /// and the number retained.
    pub fn session_history(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<(Vec<HistoryEntry>, usize), ShellError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| ShellError::not_found(EntityKind::Session, session_id))?;

        let total = session.history.len();
        let skip = limit.map_or(0, |limit| total.saturating_sub(limit));
        Ok((session.history.into_iter().skip(skip).collect(), total))
    }

    pub fn list_sessions(&self, connection_id: Option<&str>) -> Vec<SessionView> {
        let mut sessions = match connection_id {
            Some(id) => self.sessions.list_by_connection(id),
            None => self.sessions.list(),
        };
        sessions.sort_by_key(|s| s.created_at);
        sessions.iter().map(|s| self.session_view(s)).collect()
    }

    fn session_view(&self, session: &SessionRecord) -> SessionView {
        SessionView {
            session_id: session.id.clone(),
            name: session.name.clone(),
            connection_id: session.connection_id.clone(),
            working_directory: session.working_directory.clone(),
            active: true,
            connection_alive: self.is_live(&session.connection_id),
            created_at: rfc3339(session.created_at),
            last_activity: rfc3339(session.last_activity),
            command_count: session.command_count,
            history_len: session.history.len(),
        }
    }

    // ---------------------------------------------------------------------
    // File transfer
    // ---------------------------------------------------------------------

    async fn settle_transfer<T>(
        &self,
        record: &ConnectionRecord,
        result: Result<T, ShellError>,
    ) -> Result<T, ShellError> {
        match result {
            Ok(value) => {
                self.connections.touch(&record.id);
                Ok(value)
            }
            Err(e) => Err(self.after_failure(record, e).await),
        }
    }

    pub async fn upload(
        &self,
        connection_id: &str,
        local_path: &Path,
        remote_path: &str,
        timeout_ms: Option<u64>,
    ) -> Result<u64, ShellError> {
        let record = self.live_connection(connection_id).await?;
        let timeout = self.config.transfer_timeout_or(timeout_ms);
        let result = transfer::upload(
            record.handle.as_ref(),
            local_path,
            remote_path,
            timeout,
            &self.cancel,
        )
        .await;
        self.settle_transfer(&record, result).await
    }

    pub async fn download(
        &self,
        connection_id: &str,
        remote_path: &str,
        local_path: &Path,
        timeout_ms: Option<u64>,
    ) -> Result<u64, ShellError> {
        let record = self.live_connection(connection_id).await?;
        let timeout = self.config.transfer_timeout_or(timeout_ms);
        let result = transfer::download(
            record.handle.as_ref(),
            remote_path,
            local_path,
            timeout,
            &self.cancel,
        )
        .await;
        self.settle_transfer(&record, result).await
    }

    pub async fn list_dir(
        &self,
        connection_id: &str,
        remote_path: &str,
        timeout_ms: Option<u64>,
    ) -> Result<Vec<RemoteEntry>, ShellError> {
        let record = self.live_connection(connection_id).await?;
        let timeout = self.config.transfer_timeout_or(timeout_ms);
        let result = transfer::list(record.handle.as_ref(), remote_path, timeout, &self.cancel).await;
        self.settle_transfer(&record, result).await
    }

    pub async fn delete(
        &self,
        connection_id: &str,
        remote_path: &str,
        timeout_ms: Option<u64>,
    ) -> Result<(), ShellError> {
        let record = self.live_connection(connection_id).await?;
        let timeout = self.config.transfer_timeout_or(timeout_ms);
        let result =
            transfer::delete(record.handle.as_ref(), remote_path, timeout, &self.cancel).await;
        self.settle_transfer(&record, result).await
    }

    pub async fn mkdir(
        &self,
        connection_id: &str,
        remote_path: &str,
        timeout_ms: Option<u64>,
    ) -> Result<(), ShellError> {
        let record = self.live_connection(connection_id).await?;
        let timeout = self.config.transfer_timeout_or(timeout_ms);
        let result =
            transfer::mkdir(record.handle.as_ref(), remote_path, timeout, &self.cancel).await;
        self.settle_transfer(&record, result).await
    }

    pub async fn rmdir(
        &self,
        connection_id: &str,
        remote_path: &str,
        timeout_ms: Option<u64>,
    ) -> Result<(), ShellError> {
        let record = self.live_connection(connection_id).await?;
        let timeout = self.config.transfer_timeout_or(timeout_ms);
        let result =
            transfer::rmdir(record.handle.as_ref(), remote_path, timeout, &self.cancel).await;
        self.settle_transfer(&record, result).await
    }

    // ---------------------------------------------------------------------
    // Process-wide
    // ---------------------------------------------------------------------

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Cancel in-flight operations and close every connection concurrently.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let ids = self.connections.connection_ids();
        let count = ids.len();
        join_all(ids.iter().map(|id| self.remove_connection(id))).await;

        info!("Shutdown complete, {} connection(s) closed", count);
    }
}
