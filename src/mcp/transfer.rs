//! File transfer operations.
//!
//! Each operation opens a fresh file-transfer channel, runs one primitive,
//! and closes the channel. Channel-open failures surface as
//! `TransportStage::ChannelOpen`; failures of the primitive itself surface as
//! `TransportStage::Transfer`. Every operation runs under its own timeout and
//! aborts on cancellation.
//!
//! Local preconditions are checked before the network is touched: an upload
//! reads its source first, a download creates its destination's parent
//! directory first.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::mcp::error::ShellError;
use crate::mcp::transport::{EntryKind, FileTransferChannel, RemoteEntry, RemoteHandle};
use crate::mcp::types::{DirEntryView, TransferOperation};

/// Race `operation` against `timeout` and `cancel`.
async fn guarded<T>(
    operation: &str,
    timeout: Duration,
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, ShellError>>,
) -> Result<T, ShellError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ShellError::Cancelled { operation: operation.to_string() }),
        result = tokio::time::timeout(timeout, fut) => {
            result.unwrap_or_else(|_| Err(ShellError::Timeout {
                operation: operation.to_string(),
                timeout,
            }))
        }
    }
}

async fn open(handle: &dyn RemoteHandle) -> Result<Box<dyn FileTransferChannel>, ShellError> {
    let channel = handle.open_file_transfer().await?;
    debug!("Opened file-transfer channel");
    Ok(channel)
}

/// Copy a local file to `remote_path`. Returns the number of bytes written.
pub async fn upload(
    handle: &dyn RemoteHandle,
    local_path: &Path,
    remote_path: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<u64, ShellError> {
    let data = tokio::fs::read(local_path)
        .await
        .map_err(|e| ShellError::local_io(local_path, e))?;

    let operation = TransferOperation::Upload.to_string();
    guarded(&operation, timeout, cancel, async {
        let mut channel = open(handle).await?;
        let result = channel.write_file(remote_path, &data).await;
        channel.close().await;
        result.map(|()| data.len() as u64)
    })
    .await
}

/// Copy `remote_path` to a local file, creating its parent directories.
/// Returns the number of bytes written.
pub async fn download(
    handle: &dyn RemoteHandle,
    remote_path: &str,
    local_path: &Path,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<u64, ShellError> {
    if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ShellError::local_io(parent, e))?;
    }

    let operation = TransferOperation::Download.to_string();
    let data = guarded(&operation, timeout, cancel, async {
        let mut channel = open(handle).await?;
        let result = channel.read_file(remote_path).await;
        channel.close().await;
        result
    })
    .await?;

    tokio::fs::write(local_path, &data)
        .await
        .map_err(|e| ShellError::local_io(local_path, e))?;

    Ok(data.len() as u64)
}

/// List a remote directory, directories first, then by name.
pub async fn list(
    handle: &dyn RemoteHandle,
    remote_path: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<RemoteEntry>, ShellError> {
    let mut entries = guarded("list", timeout, cancel, async {
        let mut channel = open(handle).await?;
        let result = channel.list_dir(remote_path).await;
        channel.close().await;
        result
    })
    .await?;

    entries.sort_by(|a, b| {
        let a_dir = a.kind == EntryKind::Directory;
        let b_dir = b.kind == EntryKind::Directory;
        b_dir.cmp(&a_dir).then_with(|| a.name.cmp(&b.name))
    });
    Ok(entries)
}

pub async fn delete(
    handle: &dyn RemoteHandle,
    remote_path: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), ShellError> {
    let operation = TransferOperation::Delete.to_string();
    guarded(&operation, timeout, cancel, async {
        let mut channel = open(handle).await?;
        let result = channel.remove_file(remote_path).await;
        channel.close().await;
        result
    })
    .await
}

pub async fn mkdir(
    handle: &dyn RemoteHandle,
    remote_path: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), ShellError> {
    let operation = TransferOperation::Mkdir.to_string();
    guarded(&operation, timeout, cancel, async {
        let mut channel = open(handle).await?;
        let result = channel.make_dir(remote_path).await;
        channel.close().await;
        result
    })
    .await
}

pub async fn rmdir(
    handle: &dyn RemoteHandle,
    remote_path: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), ShellError> {
    let operation = TransferOperation::Rmdir.to_string();
    guarded(&operation, timeout, cancel, async {
        let mut channel = open(handle).await?;
        let result = channel.remove_dir(remote_path).await;
        channel.close().await;
        result
    })
    .await
}

pub fn entry_view(entry: &RemoteEntry) -> DirEntryView {
    DirEntryView {
        name: entry.name.clone(),
        kind: entry.kind,
        size: entry.size,
        modified: entry.modified.map(|t| t.to_rfc3339()),
    }
}

/// Render entries one per line as `<kind> <size> <mtime> <name>`.
///
/// ```text
/// d       4096  2023-11-14 22:13  app
/// -        512  2023-11-14 22:13  notes.txt
/// ```
pub fn render_listing(entries: &[RemoteEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let kind = match entry.kind {
                EntryKind::Directory => 'd',
                EntryKind::Symlink => 'l',
                EntryKind::File => '-',
            };
            let modified = entry
                .modified
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".repeat(16));
            format!("{} {:>10}  {}  {}", kind, entry.size, modified, entry.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
