//! Deduplication guard — single-flight plus cool-down per message id.
//!
//! The notification channel delivers at-least-once, so the same message id
//! can arrive twice within milliseconds or be redelivered minutes later.
//! The guard is the sole synchronization point across runs: `acquire` is an
//! atomic check-and-set over a mutex-protected table, and the lock is held
//! only for the table operation, never across I/O.
//!
//! State is in-memory by design. A restart forgets completions and may
//! reprocess recent messages; durable dedup is out of scope.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default cool-down after a successful run.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Result of an acquire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Caller owns this message id until it calls `release`.
    Granted,
    /// Another run owns the id, or it completed within the TTL window.
    Rejected(RejectReason),
}

/// Why an acquire was rejected. Rejection is expected behavior under
/// at-least-once delivery, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyInFlight,
    RecentlyCompleted,
}

/// Terminal outcome of a guarded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Entry enters the cool-down window.
    Success,
    /// Entry is removed immediately so redelivery can retry.
    Failure,
}

enum EntryState {
    InFlight,
    Completed { at: Instant },
}

/// Single-flight + cool-down guard over message ids.
pub struct DedupGuard {
    entries: Mutex<HashMap<String, EntryState>>,
    ttl: Duration,
}

impl DedupGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Try to claim a message id for processing.
    ///
    /// Exactly one concurrent caller per id receives `Granted`; everyone
    /// else is rejected until the holder releases (and, on success, until
    /// the TTL elapses). Expired completions are purged here so the table
    /// stays bounded without a background sweeper.
    pub fn acquire(&self, message_id: &str) -> AcquireOutcome {
        let mut entries = self.entries.lock().expect("dedup table mutex poisoned");

        let ttl = self.ttl;
        entries.retain(|_, state| match state {
            EntryState::InFlight => true,
            EntryState::Completed { at } => at.elapsed() < ttl,
        });

        match entries.get(message_id) {
            Some(EntryState::InFlight) => AcquireOutcome::Rejected(RejectReason::AlreadyInFlight),
            Some(EntryState::Completed { .. }) => {
                // Still present after the purge above, so still cooling down.
                AcquireOutcome::Rejected(RejectReason::RecentlyCompleted)
            }
            None => {
                entries.insert(message_id.to_string(), EntryState::InFlight);
                AcquireOutcome::Granted
            }
        }
    }

    /// Release a previously granted id.
    ///
    /// A failed run must not block retry: redelivery should get a fresh
    /// `Granted` immediately, so `Failure` drops the entry outright.
    pub fn release(&self, message_id: &str, outcome: RunOutcome) {
        let mut entries = self.entries.lock().expect("dedup table mutex poisoned");
        match outcome {
            RunOutcome::Success => {
                entries.insert(
                    message_id.to_string(),
                    EntryState::Completed { at: Instant::now() },
                );
            }
            RunOutcome::Failure => {
                entries.remove(message_id);
            }
        }
    }

    /// Number of live entries (in-flight or cooling down). Test hook.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().expect("dedup table mutex poisoned").len()
    }
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
