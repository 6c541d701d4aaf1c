//! Authentication seam used by the russh transport.

use async_trait::async_trait;
use russh::client;

use crate::mcp::error::ShellError;
use crate::mcp::transport::ssh::SshClientHandler;

/// One way of proving identity on an established, not yet authenticated handle.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// `Ok(false)` means the server rejected the credential; `Err` means the
    /// exchange itself failed.
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, ShellError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}
