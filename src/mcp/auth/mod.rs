//! Authentication for remote shell connections.
//!
//! Exactly one credential shape is supported: a private key, given either as
//! a local file path or as inline key text, with an optional passphrase.
//! [`load_private_key`] reads and decodes it before any network attempt, so a
//! malformed key is a validation failure and never costs a handshake.

mod key;
mod traits;

pub use key::{KeyAuth, KeySource, load_private_key};
pub use traits::AuthStrategy;
