//! Private key SSH authentication.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::mcp::error::{ShellError, TransportStage};
use crate::mcp::transport::ssh::SshClientHandler;

use super::traits::AuthStrategy;

/// Where private key material comes from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Path to a key file on the local filesystem
    File(PathBuf),
    /// OpenSSH or PEM key text
    Inline(String),
}

/// Read and decode a private key.
///
/// A file that cannot be read is a [`ShellError::LocalIo`]; text that does
/// not decode as a recognised private key format (or needs a passphrase that
/// was not given) is a [`ShellError::Validation`].
pub fn load_private_key(
    source: &KeySource,
    passphrase: Option<&str>,
) -> Result<keys::PrivateKey, ShellError> {
    let text = match source {
        KeySource::File(path) => {
            std::fs::read_to_string(path).map_err(|e| ShellError::local_io(path, e))?
        }
        KeySource::Inline(text) => text.clone(),
    };

    keys::decode_secret_key(text.trim(), passphrase)
        .map_err(|e| ShellError::Validation(format!("unrecognized private key: {}", e)))
}

/// Public key authentication with an already decoded private key.
pub struct KeyAuth {
    key: Arc<keys::PrivateKey>,
}

impl KeyAuth {
    pub fn new(key: Arc<keys::PrivateKey>) -> Self {
        Self { key }
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, ShellError> {
        // For RSA keys, use the best supported hash algorithm
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

        let key_with_hash = keys::PrivateKeyWithHashAlg::new(self.key.clone(), hash_alg);

        let result = handle
            .authenticate_publickey(username, key_with_hash)
            .await
            .map_err(|e| {
                ShellError::transport(
                    TransportStage::Authentication,
                    format!("Key authentication failed: {}", e),
                )
            })?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "key"
    }
}
