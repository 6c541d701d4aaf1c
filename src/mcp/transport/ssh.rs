//! russh-backed transport.
//!
//! ## Connection Lifecycle
//!
//! 1. **Client Configuration**: keepalive every 30s (3 misses), optional zlib,
//!    no inactivity timeout. Connections stay open until disconnected.
//! 2. **Connection Establishment**: TCP connect and key exchange.
//! 3. **Authentication**: public key authentication via [`KeyAuth`].
//!
//! The caller bounds all three steps with one handshake timeout. A handle that
//! fails authentication is disconnected before the error is returned.
//!
//! ## Commands and Transfers
//!
//! Each command runs on its own session channel. Each file-transfer operation
//! opens its own channel, requests the `sftp` subsystem and drives it through
//! `russh-sftp`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use russh::client::{self, Msg};
use russh::{Channel, ChannelMsg, Disconnect, keys};
use russh_sftp::client::SftpSession;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::mcp::auth::{AuthStrategy, KeyAuth};
use crate::mcp::error::{ShellError, TransportStage};

use super::{
    ConnectParams, EntryKind, ExecEvent, ExecStream, FileTransferChannel, RemoteEntry,
    RemoteHandle, Transport,
};

/// Client handler for russh that accepts all host keys.
///
/// This implementation accepts all server public keys without verification,
/// similar to `StrictHostKeyChecking=no` in OpenSSH configuration.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Build russh client configuration.
///
/// - No inactivity timeout: a connection lives until it is disconnected
/// - Keepalive interval of 30 seconds with max 3 keepalives
/// - Compression preference based on `compress` (ZLIB if enabled, NONE if disabled)
pub(crate) fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        preferred,
        ..Default::default()
    })
}

/// Opens russh connections authenticated with a private key.
#[derive(Debug, Default, Clone, Copy)]
pub struct RusshTransport;

#[async_trait]
impl Transport for RusshTransport {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn RemoteHandle>, ShellError> {
        let config = build_client_config(params.compress);

        let mut handle = client::connect(
            config,
            (params.host.as_str(), params.port),
            SshClientHandler,
        )
        .await
        .map_err(|e| {
            ShellError::transport(
                TransportStage::Handshake,
                format!("Failed to connect to {}: {}", params.address(), e),
            )
        })?;

        let auth = KeyAuth::new(params.key.clone());
        match auth.authenticate(&mut handle, &params.username).await {
            Ok(true) => {
                debug!(
                    "Authenticated {}@{} with {} strategy",
                    params.username,
                    params.address(),
                    auth.name()
                );
                Ok(Arc::new(SshRemote::new(handle)))
            }
            Ok(false) => {
                disconnect_quietly(&handle).await;
                Err(ShellError::transport(
                    TransportStage::Authentication,
                    "Authentication failed: key rejected by server",
                ))
            }
            Err(e) => {
                disconnect_quietly(&handle).await;
                Err(e)
            }
        }
    }
}

async fn disconnect_quietly(handle: &client::Handle<SshClientHandler>) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "Connection closed by client", "en")
        .await
    {
        debug!("Error during disconnect (ignored): {}", e);
    }
}

/// A live russh connection.
pub struct SshRemote {
    handle: client::Handle<SshClientHandler>,
    closed: AtomicBool,
}

impl SshRemote {
    fn new(handle: client::Handle<SshClientHandler>) -> Self {
        Self {
            handle,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RemoteHandle for SshRemote {
    async fn exec(&self, command: &str) -> Result<Box<dyn ExecStream>, ShellError> {
        let mut channel = self.handle.channel_open_session().await.map_err(|e| {
            ShellError::transport(
                TransportStage::Dispatch,
                format!("Failed to open channel: {}", e),
            )
        })?;

        start_command(&mut channel, command).await?;

        Ok(Box::new(SshExecStream { channel }))
    }

    async fn open_file_transfer(&self) -> Result<Box<dyn FileTransferChannel>, ShellError> {
        let channel = self.handle.channel_open_session().await.map_err(|e| {
            ShellError::transport(
                TransportStage::ChannelOpen,
                format!("Failed to open channel: {}", e),
            )
        })?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| {
                ShellError::transport(
                    TransportStage::ChannelOpen,
                    format!("Failed to request SFTP subsystem: {}", e),
                )
            })?;

        let sftp = SftpSession::new(channel.into_stream()).await.map_err(|e| {
            ShellError::transport(
                TransportStage::ChannelOpen,
                format!("Failed to create SFTP session: {}", e),
            )
        })?;

        Ok(Box::new(SftpChannel { sftp }))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.handle.is_closed()
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        disconnect_quietly(&self.handle).await;
    }
}

async fn start_command(channel: &mut Channel<Msg>, command: &str) -> Result<(), ShellError> {
    channel.exec(true, command).await.map_err(|e| {
        ShellError::transport(
            TransportStage::Dispatch,
            format!("Failed to execute command: {}", e),
        )
    })
}

struct SshExecStream {
    channel: Channel<Msg>,
}

#[async_trait]
impl ExecStream for SshExecStream {
    async fn next_event(&mut self) -> Option<Result<ExecEvent, ShellError>> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    return Some(Ok(ExecEvent::Stdout(data.to_vec())));
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    // ext == 1 is stderr in SSH protocol
                    if ext == 1 {
                        return Some(Ok(ExecEvent::Stderr(data.to_vec())));
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    return Some(Ok(ExecEvent::Exit(exit_status as i32)));
                }
                Some(ChannelMsg::ExitSignal {
                    signal_name,
                    error_message,
                    ..
                }) => {
                    return Some(Err(ShellError::transport(
                        TransportStage::Stream,
                        format!(
                            "Remote process terminated by signal {:?}: {}",
                            signal_name, error_message
                        ),
                    )));
                }
                Some(ChannelMsg::Close) | None => return None,
                Some(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.channel.close().await {
            debug!("Error closing command channel (ignored): {}", e);
        }
    }
}

struct SftpChannel {
    sftp: SftpSession,
}

fn transfer_error(action: &str, path: &str, e: impl std::fmt::Display) -> ShellError {
    ShellError::transport(
        TransportStage::Transfer,
        format!("Failed to {} {}: {}", action, path, e),
    )
}

#[async_trait]
impl FileTransferChannel for SftpChannel {
    async fn read_file(&mut self, path: &str) -> Result<Vec<u8>, ShellError> {
        let mut file = self
            .sftp
            .open(path)
            .await
            .map_err(|e| transfer_error("open remote file", path, e))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .await
            .map_err(|e| transfer_error("read remote file", path, e))?;

        Ok(content)
    }

    async fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), ShellError> {
        let mut file = self
            .sftp
            .create(path)
            .await
            .map_err(|e| transfer_error("create remote file", path, e))?;

        file.write_all(data)
            .await
            .map_err(|e| transfer_error("write remote file", path, e))?;
        file.shutdown()
            .await
            .map_err(|e| transfer_error("close remote file", path, e))?;

        Ok(())
    }

    async fn list_dir(&mut self, path: &str) -> Result<Vec<RemoteEntry>, ShellError> {
        let read_dir = self
            .sftp
            .read_dir(path)
            .await
            .map_err(|e| transfer_error("list remote directory", path, e))?;

        let entries = read_dir
            .filter(|entry| {
                let name = entry.file_name();
                name != "." && name != ".."
            })
            .map(|entry| {
                let meta = entry.metadata();
                let kind = if meta.is_dir() {
                    EntryKind::Directory
                } else if meta.is_symlink() {
                    EntryKind::Symlink
                } else {
                    EntryKind::File
                };
                RemoteEntry {
                    name: entry.file_name(),
                    kind,
                    size: meta.size.unwrap_or(0),
                    modified: meta
                        .mtime
                        .and_then(|t| DateTime::from_timestamp(i64::from(t), 0)),
                }
            })
            .collect();

        Ok(entries)
    }

    async fn remove_file(&mut self, path: &str) -> Result<(), ShellError> {
        self.sftp
            .remove_file(path)
            .await
            .map_err(|e| transfer_error("remove remote file", path, e))
    }

    async fn make_dir(&mut self, path: &str) -> Result<(), ShellError> {
        self.sftp
            .create_dir(path)
            .await
            .map_err(|e| transfer_error("create remote directory", path, e))
    }

    async fn remove_dir(&mut self, path: &str) -> Result<(), ShellError> {
        self.sftp
            .remove_dir(path)
            .await
            .map_err(|e| transfer_error("remove remote directory", path, e))
    }

    async fn close(&mut self) {
        if let Err(e) = self.sftp.close().await {
            warn!("Error closing SFTP session (ignored): {}", e);
        }
    }
}
