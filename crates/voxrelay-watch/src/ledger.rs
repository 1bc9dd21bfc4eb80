//! Duplicate-suppression ledger.
//!
//! # Design
//! - Two disjoint identity sets guarded by one mutex: `in_progress` holds
//!   claims owned by live workers, `completed` remembers finished files.
//! - `try_claim` tests both sets and inserts atomically, so concurrent
//!   events for one identity can never both pass.
//! - Claims release on [`ClaimGuard`] drop; a panicking worker cannot leak
//!   its claim.
//! - The completed set is bounded: exceeding capacity evicts the oldest
//!   entries down to half capacity.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use crate::identity::FileIdentity;

/// Shared, process-lifetime deduplication state.
///
/// Cheap to clone; all clones observe the same ledger.
#[derive(Debug, Clone)]
pub struct DedupLedger {
    inner: Arc<LedgerInner>,
}

#[derive(Debug)]
struct LedgerInner {
    capacity: usize,
    state: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    in_progress: HashSet<FileIdentity>,
    completed: HashSet<FileIdentity>,
    completed_order: VecDeque<FileIdentity>,
}

/// Outcome of a claim attempt.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// The identity was free; the caller now owns the claim.
    Claimed(ClaimGuard),
    /// The identity was already processed to completion.
    AlreadyCompleted,
    /// Another worker currently holds a claim on the identity.
    InProgress,
}

/// Owned claim on one identity, released on drop unless completed first.
#[derive(Debug)]
pub struct ClaimGuard {
    ledger: DedupLedger,
    identity: FileIdentity,
    armed: bool,
}

/// Point-in-time sizes of the two ledger sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerCounts {
    /// Identities currently claimed.
    pub in_progress: usize,
    /// Identities recorded as completed.
    pub completed: usize,
}

impl DedupLedger {
    /// Create a ledger retaining at most `capacity` completed identities.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ledger capacity must be positive");
        Self {
            inner: Arc::new(LedgerInner {
                capacity,
                state: Mutex::new(LedgerState::default()),
            }),
        }
    }

    /// Atomically test membership in both sets and claim the identity when
    /// it is in neither.
    #[must_use]
    pub fn try_claim(&self, identity: &FileIdentity) -> ClaimOutcome {
        let mut state = self.lock_state();
        if state.completed.contains(identity) {
            return ClaimOutcome::AlreadyCompleted;
        }
        if !state.in_progress.insert(identity.clone()) {
            return ClaimOutcome::InProgress;
        }
        drop(state);
        ClaimOutcome::Claimed(ClaimGuard {
            ledger: self.clone(),
            identity: identity.clone(),
            armed: true,
        })
    }

    /// Whether the identity is recorded as completed.
    #[must_use]
    pub fn is_completed(&self, identity: &FileIdentity) -> bool {
        self.lock_state().completed.contains(identity)
    }

    /// Record an unclaimed identity as completed, returning the number of
    /// entries evicted to stay within capacity.
    ///
    /// Identities currently claimed by a worker are left untouched so the
    /// two sets stay disjoint.
    #[must_use = "the eviction count feeds ledger telemetry"]
    pub fn record_completed(&self, identity: FileIdentity) -> usize {
        let mut state = self.lock_state();
        if state.in_progress.contains(&identity) {
            return 0;
        }
        Self::insert_completed(&mut state, identity);
        Self::evict_overflow(&mut state, self.inner.capacity)
    }

    /// Current sizes of both sets.
    #[must_use]
    pub fn counts(&self) -> LedgerCounts {
        let state = self.lock_state();
        LedgerCounts {
            in_progress: state.in_progress.len(),
            completed: state.completed.len(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_completed(state: &mut LedgerState, identity: FileIdentity) {
        if state.completed.insert(identity.clone()) {
            state.completed_order.push_back(identity);
        }
    }

    /// Evict the oldest completed entries until the set holds at most half
    /// the configured capacity, mirroring the bounded FIFO cache contract.
    fn evict_overflow(state: &mut LedgerState, capacity: usize) -> usize {
        if state.completed.len() <= capacity {
            return 0;
        }
        let target = capacity / 2;
        let mut removed = 0;
        while state.completed.len() > target {
            let Some(oldest) = state.completed_order.pop_front() else {
                break;
            };
            if state.completed.remove(&oldest) {
                removed += 1;
            }
        }
        removed
    }

    fn release(&self, identity: &FileIdentity) {
        self.lock_state().in_progress.remove(identity);
    }

    fn complete_claim(&self, identity: &FileIdentity) -> usize {
        let mut state = self.lock_state();
        state.in_progress.remove(identity);
        Self::insert_completed(&mut state, identity.clone());
        Self::evict_overflow(&mut state, self.inner.capacity)
    }
}

impl ClaimGuard {
    /// Identity this claim covers.
    #[must_use]
    pub const fn identity(&self) -> &FileIdentity {
        &self.identity
    }

    /// Move the claimed identity to the completed set, returning the number
    /// of entries evicted to stay within capacity.
    #[must_use = "the eviction count feeds ledger telemetry"]
    pub fn complete(mut self) -> usize {
        self.armed = false;
        self.ledger.complete_claim(&self.identity)
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if self.armed {
            self.ledger.release(&self.identity);
        }
    }
}
