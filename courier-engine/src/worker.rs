//! OperationWorker - drives the removals queue to completion
//!
//! Subscribes to the oplog's merged view and, on every emission, runs a
//! reconcile pass: superseded units are cancelled, new ones are claimed and
//! executed in their own tasks. Removal of a finished entry runs in its own
//! transaction after execution settles; a cancelled task never removes its
//! entry.

use crate::claim;
use crate::dispatcher::OperationTracker;
use crate::executor::{self, Services};
use courier_model::{OperationTag, TAG_CLOUD_CHAT_REMOVALS};
use courier_oplog::{MergedOperationEntry, MergedOperationView, Oplog, OplogError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How many merged entries the worker watches at a time.
pub const MERGED_VIEW_LIMIT: usize = 10;

/// The reconciliation worker for the removals tag.
pub struct OperationWorker {
    oplog: Oplog,
    services: Services,
    tag: OperationTag,
    view_limit: usize,
}

impl OperationWorker {
    pub fn new(oplog: Oplog, services: Services) -> Self {
        Self { oplog, services, tag: TAG_CLOUD_CHAT_REMOVALS, view_limit: MERGED_VIEW_LIMIT }
    }

    /// Subscribe to the merged view and start the worker task.
    pub async fn spawn(self) -> Result<WorkerHandle, OplogError> {
        let view_rx = self.oplog.merged_view(self.tag, self.view_limit).await?;
        let shutdown_token = CancellationToken::new();
        let join = tokio::spawn(self.run(view_rx, shutdown_token.clone()));
        Ok(WorkerHandle { shutdown_token, join })
    }

    async fn run(
        self,
        mut view_rx: watch::Receiver<MergedOperationView>,
        shutdown_token: CancellationToken,
    ) {
        tracing::debug!(tag = %self.tag, "operation worker started");
        let mut tracker = OperationTracker::new();

        loop {
            let entries = view_rx.borrow_and_update().entries.clone();
            let outcome = tracker.reconcile(&entries);

            for token in outcome.to_cancel {
                token.cancel();
            }
            for (entry, token) in outcome.to_begin {
                self.spawn_operation(entry, token);
            }

            tokio::select! {
                _ = shutdown_token.cancelled() => break,
                changed = view_rx.changed() => {
                    if changed.is_err() {
                        // Oplog actor is gone; nothing left to react to.
                        break;
                    }
                }
            }
        }

        for token in tracker.reset() {
            token.cancel();
        }
        tracing::debug!(tag = %self.tag, "operation worker stopped");
    }

    /// Claim, execute, and remove one entry in a task owned by its handle.
    fn spawn_operation(&self, entry: MergedOperationEntry, token: CancellationToken) {
        let oplog = self.oplog.clone();
        let services = self.services.clone();
        let tag = self.tag;

        tokio::spawn(async move {
            let work = async {
                match claim::take_operation(&oplog, entry.peer_id, tag, entry.tag_local_index).await
                {
                    Ok(Some(claimed)) => executor::execute(&services, &claimed).await,
                    Ok(None) => {
                        // Already claimed (e.g. an interrupted run) or
                        // unrecognized; skip straight to removal.
                    }
                    Err(e) => {
                        tracing::error!(peer = %entry.peer_id, "claim failed: {}", e);
                        return;
                    }
                }

                if let Err(e) =
                    oplog.remove_entry(entry.peer_id, tag, entry.tag_local_index).await
                {
                    tracing::error!(peer = %entry.peer_id, "entry removal failed: {}", e);
                }
            };

            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(peer = %entry.peer_id, merged_index = entry.merged_index,
                        "operation superseded, cancelled");
                }
                _ = work => {}
            }
        });
    }
}

/// Handle to a running worker.
pub struct WorkerHandle {
    shutdown_token: CancellationToken,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Request shutdown (non-blocking). All tracked operation handles are
    /// cancelled before the worker task exits.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    /// Shut down and wait for the worker task to exit.
    pub async fn close(self) {
        self.shutdown_token.cancel();
        let _ = self.join.await;
    }
}
