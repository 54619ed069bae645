//! Dispatcher - one in-flight operation per peer
//!
//! `OperationTracker` diffs each new merged-view snapshot against the work
//! it already tracks. Work units are keyed by merged index; per snapshot
//! only the first (lowest-merged-index) entry of each peer is considered,
//! which is what enforces the one-operation-per-peer invariant. Units whose
//! merged index vanished from the snapshot are handed back for
//! cancellation.
//!
//! The tracker is plain single-threaded state; the worker task is its only
//! caller, so no locking is needed.

use courier_oplog::MergedOperationEntry;
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;

/// Result of one reconcile pass.
#[derive(Default)]
pub struct ReconcileOutcome {
    /// Entries to begin, each paired with its freshly tracked handle.
    pub to_begin: Vec<(MergedOperationEntry, CancellationToken)>,
    /// Handles of superseded units; the caller cancels them.
    pub to_cancel: Vec<CancellationToken>,
}

/// Tracks the set of in-flight work units by merged index.
#[derive(Default)]
pub struct OperationTracker {
    active: HashMap<u64, CancellationToken>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff a merged-view snapshot against the tracked units.
    ///
    /// Idempotent: an unchanged snapshot yields an empty outcome. At most
    /// one begin per peer per call.
    pub fn reconcile(&mut self, entries: &[MergedOperationEntry]) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        let mut claimed_peers = HashSet::new();
        let mut valid_indices = HashSet::new();
        for entry in entries {
            if claimed_peers.insert(entry.peer_id) {
                valid_indices.insert(entry.merged_index);

                if !self.active.contains_key(&entry.merged_index) {
                    let token = CancellationToken::new();
                    self.active.insert(entry.merged_index, token.clone());
                    outcome.to_begin.push((entry.clone(), token));
                }
            }
        }

        self.active.retain(|merged_index, token| {
            if valid_indices.contains(merged_index) {
                true
            } else {
                outcome.to_cancel.push(token.clone());
                false
            }
        });

        outcome
    }

    /// Drop all tracked units, returning their handles for cancellation.
    /// Called on worker shutdown.
    pub fn reset(&mut self) -> Vec<CancellationToken> {
        self.active.drain().map(|(_, token)| token).collect()
    }

    /// Number of tracked units.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Whether a merged index is currently tracked.
    pub fn is_tracking(&self, merged_index: u64) -> bool {
        self.active.contains_key(&merged_index)
    }
}
