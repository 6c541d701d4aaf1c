//! Configuration resolution for the remote shell MCP server.
//!
//! This module handles configuration values with a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided function parameter (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_HANDSHAKE_TIMEOUT_MS` | 5000ms | Connect + authenticate bound per attempt |
//! | `SSH_COMMAND_TIMEOUT_MS` | 30000ms | Shell command execution timeout |
//! | `SSH_TRANSFER_TIMEOUT_MS` | 120000ms | File transfer operation timeout |
//! | `SSH_MAX_RETRIES` | 2 | Maximum handshake retry attempts |
//! | `SSH_RETRY_DELAY_MS` | 500ms | Initial retry delay in milliseconds |
//! | `SSH_COMPRESSION` | true | Enable zlib compression |

use std::env;
use std::time::Duration;

/// Default handshake timeout in milliseconds
pub(crate) const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5_000;

/// Default shell command execution timeout in milliseconds
pub(crate) const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// Default file transfer timeout in milliseconds
pub(crate) const DEFAULT_TRANSFER_TIMEOUT_MS: u64 = 120_000;

/// Default maximum retry attempts for the handshake
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default retry delay in milliseconds
pub(crate) const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Maximum retry delay cap (10 seconds)
pub(crate) const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

pub(crate) const HANDSHAKE_TIMEOUT_ENV_VAR: &str = "SSH_HANDSHAKE_TIMEOUT_MS";
pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "SSH_COMMAND_TIMEOUT_MS";
pub(crate) const TRANSFER_TIMEOUT_ENV_VAR: &str = "SSH_TRANSFER_TIMEOUT_MS";
pub(crate) const MAX_RETRIES_ENV_VAR: &str = "SSH_MAX_RETRIES";
pub(crate) const RETRY_DELAY_MS_ENV_VAR: &str = "SSH_RETRY_DELAY_MS";
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";

/// Read an environment variable and parse it, ignoring unset or malformed values.
fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Resolve a millisecond value with priority: parameter -> env var -> default
fn resolve_millis(param: Option<u64>, env_var: &str, default: u64) -> Duration {
    let millis = param
        .or_else(|| env_parsed::<u64>(env_var))
        .unwrap_or(default);
    Duration::from_millis(millis)
}

/// Resolve the handshake timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_handshake_timeout(timeout_param: Option<u64>) -> Duration {
    resolve_millis(
        timeout_param,
        HANDSHAKE_TIMEOUT_ENV_VAR,
        DEFAULT_HANDSHAKE_TIMEOUT_MS,
    )
}

/// Resolve the command execution timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_command_timeout(timeout_param: Option<u64>) -> Duration {
    resolve_millis(
        timeout_param,
        COMMAND_TIMEOUT_ENV_VAR,
        DEFAULT_COMMAND_TIMEOUT_MS,
    )
}

/// Resolve the file transfer timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_transfer_timeout(timeout_param: Option<u64>) -> Duration {
    resolve_millis(
        timeout_param,
        TRANSFER_TIMEOUT_ENV_VAR,
        DEFAULT_TRANSFER_TIMEOUT_MS,
    )
}

/// Resolve the max retries value with priority: parameter -> env var -> default
pub(crate) fn resolve_max_retries(max_retries_param: Option<u32>) -> u32 {
    max_retries_param
        .or_else(|| env_parsed::<u32>(MAX_RETRIES_ENV_VAR))
        .unwrap_or(DEFAULT_MAX_RETRIES)
}

/// Resolve the retry delay with priority: parameter -> env var -> default
pub(crate) fn resolve_retry_delay(retry_delay_param: Option<u64>) -> Duration {
    resolve_millis(
        retry_delay_param,
        RETRY_DELAY_MS_ENV_VAR,
        DEFAULT_RETRY_DELAY_MS,
    )
}

/// Resolve the compression setting with priority: parameter -> env var -> default (true)
pub(crate) fn resolve_compression(compress_param: Option<bool>) -> bool {
    if let Some(compress) = compress_param {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    true
}

/// Resolved settings held by the [`ShellManager`](crate::mcp::manager::ShellManager).
///
/// Per-call timeouts supplied through tool parameters override the command and
/// transfer defaults; everything else is fixed for the lifetime of the manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub handshake_timeout: Duration,
    pub command_timeout: Duration,
    pub transfer_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub compression: bool,
}

impl ManagerConfig {
    /// Build a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            handshake_timeout: resolve_handshake_timeout(None),
            command_timeout: resolve_command_timeout(None),
            transfer_timeout: resolve_transfer_timeout(None),
            max_retries: resolve_max_retries(None),
            retry_delay: resolve_retry_delay(None),
            compression: resolve_compression(None),
        }
    }

    /// Per-call command timeout, or the configured default.
    pub fn command_timeout_or(&self, timeout_ms: Option<u64>) -> Duration {
        timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.command_timeout)
    }

    /// Per-call transfer timeout, or the configured default.
    pub fn transfer_timeout_or(&self, timeout_ms: Option<u64>) -> Duration {
        timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.transfer_timeout)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            transfer_timeout: Duration::from_millis(DEFAULT_TRANSFER_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            compression: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // Use a mutex to serialize env var tests to avoid race conditions
    static ENV_TEST_MUTEX: once_cell::sync::Lazy<StdMutex<()>> =
        once_cell::sync::Lazy::new(|| StdMutex::new(()));

    /// SAFETY: Must be called while holding ENV_TEST_MUTEX to prevent data races.
    unsafe fn set_env(key: &str, value: &str) {
        // SAFETY: Caller ensures ENV_TEST_MUTEX is held
        unsafe { env::set_var(key, value) };
    }

    /// SAFETY: Must be called while holding ENV_TEST_MUTEX to prevent data races.
    unsafe fn remove_env(key: &str) {
        // SAFETY: Caller ensures ENV_TEST_MUTEX is held
        unsafe { env::remove_var(key) };
    }

    mod timeouts {
        use super::*;

        #[test]
        fn test_param_takes_priority_over_env() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(COMMAND_TIMEOUT_ENV_VAR, "90000");
            }
            let result = resolve_command_timeout(Some(1500));
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(COMMAND_TIMEOUT_ENV_VAR);
            }
            assert_eq!(result, Duration::from_millis(1500));
        }

        #[test]
        fn test_uses_env_var_when_no_param() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(HANDSHAKE_TIMEOUT_ENV_VAR, "2500");
            }
            let result = resolve_handshake_timeout(None);
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(HANDSHAKE_TIMEOUT_ENV_VAR);
            }
            assert_eq!(result, Duration::from_millis(2500));
        }

        #[test]
        fn test_ignores_invalid_env_var() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(TRANSFER_TIMEOUT_ENV_VAR, "soon");
            }
            let result = resolve_transfer_timeout(None);
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(TRANSFER_TIMEOUT_ENV_VAR);
            }
            assert_eq!(result, Duration::from_millis(DEFAULT_TRANSFER_TIMEOUT_MS));
        }

        #[test]
        fn test_transfer_default_exceeds_command_default() {
            assert!(DEFAULT_TRANSFER_TIMEOUT_MS > DEFAULT_COMMAND_TIMEOUT_MS);
        }

        #[test]
        fn test_handshake_default_is_five_seconds() {
            assert_eq!(DEFAULT_HANDSHAKE_TIMEOUT_MS, 5_000);
        }
    }

    mod retries {
        use super::*;

        #[test]
        fn test_zero_retries_is_valid() {
            assert_eq!(resolve_max_retries(Some(0)), 0);
        }

        #[test]
        fn test_uses_default_when_no_param_or_env() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(MAX_RETRIES_ENV_VAR);
                remove_env(RETRY_DELAY_MS_ENV_VAR);
            }
            assert_eq!(resolve_max_retries(None), DEFAULT_MAX_RETRIES);
            assert_eq!(
                resolve_retry_delay(None),
                Duration::from_millis(DEFAULT_RETRY_DELAY_MS)
            );
        }

        #[test]
        fn test_max_retry_delay_is_reasonable() {
            assert!(MAX_RETRY_DELAY.as_secs() >= 5);
            assert!(MAX_RETRY_DELAY.as_secs() <= 60);
        }
    }

    mod compression {
        use super::*;

        #[test]
        fn test_param_takes_priority_over_env() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(COMPRESSION_ENV_VAR, "true");
            }
            let result = resolve_compression(Some(false));
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(COMPRESSION_ENV_VAR);
            }
            assert!(!result);
        }

        #[test]
        fn test_env_var_one() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(COMPRESSION_ENV_VAR, "1");
            }
            let result = resolve_compression(None);
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(COMPRESSION_ENV_VAR);
            }
            assert!(result);
        }

        #[test]
        fn test_env_var_random_value_is_false() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(COMPRESSION_ENV_VAR, "yes");
            }
            let result = resolve_compression(None);
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(COMPRESSION_ENV_VAR);
            }
            assert!(!result);
        }
    }

    mod manager_config {
        use super::*;

        #[test]
        fn test_per_call_timeouts_override_defaults() {
            let config = ManagerConfig::default();
            assert_eq!(
                config.command_timeout_or(Some(250)),
                Duration::from_millis(250)
            );
            assert_eq!(config.command_timeout_or(None), config.command_timeout);
            assert_eq!(
                config.transfer_timeout_or(None),
                Duration::from_millis(DEFAULT_TRANSFER_TIMEOUT_MS)
            );
        }
    }
}
