//! Process-wide statistics.
//!
//! Counters are derived purely from connect / disconnect / command-outcome
//! events and are never consulted to make a decision. Updates are single
//! atomic operations, so recording an event can never fail.
//!
//! A command that ran to completion on the remote side is a success here even
//! when its exit status is non-zero; only transport-level failures (timeout,
//! stream, dispatch, cancellation) count as failed commands.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::mcp::types::StatsSnapshot;

#[derive(Debug)]
pub struct Statistics {
    started: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    total_commands: AtomicU64,
    successful_commands: AtomicU64,
    failed_commands: AtomicU64,
    /// Cumulative execution time of successful commands, in microseconds
    total_execution_micros: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            total_commands: AtomicU64::new(0),
            successful_commands: AtomicU64::new(0),
            failed_commands: AtomicU64::new(0),
            total_execution_micros: AtomicU64::new(0),
        }
    }

    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::SeqCst);
        self.active_connections.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the active count, clamped at zero.
    pub fn connection_closed(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            });
    }

    pub fn command_succeeded(&self, elapsed: Duration) {
        self.total_commands.fetch_add(1, Ordering::SeqCst);
        self.successful_commands.fetch_add(1, Ordering::SeqCst);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_execution_micros
            .fetch_add(micros, Ordering::SeqCst);
    }

    pub fn command_failed(&self) {
        self.total_commands.fetch_add(1, Ordering::SeqCst);
        self.failed_commands.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let successful = self.successful_commands.load(Ordering::SeqCst);
        let total_micros = self.total_execution_micros.load(Ordering::SeqCst);
        let average_execution_ms = if successful == 0 {
            0.0
        } else {
            total_micros as f64 / successful as f64 / 1000.0
        };

        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::SeqCst),
            active_connections: self.active_connections.load(Ordering::SeqCst),
            total_commands: self.total_commands.load(Ordering::SeqCst),
            successful_commands: successful,
            failed_commands: self.failed_commands.load(Ordering::SeqCst),
            total_execution_ms: total_micros as f64 / 1000.0,
            average_execution_ms,
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}
