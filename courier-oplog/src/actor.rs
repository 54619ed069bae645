//! OplogActor - dedicated task that owns OplogState and processes commands
//!
//! Serializing every mutation through one task is what makes the claim
//! protocol's read-modify-clear atomic with respect to concurrent dispatch
//! passes. The actor also owns the live merged-view subscriptions and
//! re-publishes each affected view after a mutation.

use crate::entry::{EntryUpdate, MergedOperationView, OperationLogEntry};
use crate::state::{OplogError, OplogState};
use courier_model::{OperationContents, OperationTag, PeerId};
use tokio::sync::{mpsc, oneshot, watch};

pub(crate) type EntryMutator =
    Box<dyn FnOnce(Option<&OperationLogEntry>) -> EntryUpdate + Send>;

/// Commands sent to the oplog actor.
pub(crate) enum OplogCmd {
    AddEntry {
        peer_id: PeerId,
        tag: OperationTag,
        contents: OperationContents,
        resp: oneshot::Sender<Result<OperationLogEntry, OplogError>>,
    },
    UpdateEntry {
        peer_id: PeerId,
        tag: OperationTag,
        tag_local_index: u32,
        mutator: EntryMutator,
        resp: oneshot::Sender<Result<Option<OperationLogEntry>, OplogError>>,
    },
    RemoveEntry {
        peer_id: PeerId,
        tag: OperationTag,
        tag_local_index: u32,
        resp: oneshot::Sender<Result<bool, OplogError>>,
    },
    MergedView {
        tag: OperationTag,
        limit: usize,
        resp: oneshot::Sender<Result<watch::Receiver<MergedOperationView>, OplogError>>,
    },
    Entry {
        peer_id: PeerId,
        tag: OperationTag,
        tag_local_index: u32,
        resp: oneshot::Sender<Result<Option<OperationLogEntry>, OplogError>>,
    },
    Shutdown,
}

struct ViewSubscription {
    tag: OperationTag,
    limit: usize,
    tx: watch::Sender<MergedOperationView>,
}

/// Actor owning the durable log state.
pub(crate) struct OplogActor {
    state: OplogState,
    rx: mpsc::Receiver<OplogCmd>,
    views: Vec<ViewSubscription>,
}

impl OplogActor {
    pub(crate) fn new(state: OplogState, rx: mpsc::Receiver<OplogCmd>) -> Self {
        Self { state, rx, views: Vec::new() }
    }

    /// Process commands until Shutdown, cancellation, or channel closed.
    pub(crate) async fn run(mut self, shutdown_token: tokio_util::sync::CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    break;
                }
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(OplogCmd::Shutdown) => break,
                        Some(cmd) => self.handle_command(cmd),
                        None => break,
                    }
                }
            }
        }
    }

    /// Handle a single command (keeps select! block clean).
    fn handle_command(&mut self, cmd: OplogCmd) {
        match cmd {
            OplogCmd::AddEntry { peer_id, tag, contents, resp } => {
                let result = self.state.add_entry(peer_id, tag, contents);
                if result.is_ok() {
                    self.publish_views(tag);
                }
                let _ = resp.send(result);
            }
            OplogCmd::UpdateEntry { peer_id, tag, tag_local_index, mutator, resp } => {
                let result = self.state.update_entry(peer_id, tag, tag_local_index, mutator);
                if result.is_ok() {
                    self.publish_views(tag);
                }
                let _ = resp.send(result);
            }
            OplogCmd::RemoveEntry { peer_id, tag, tag_local_index, resp } => {
                let result = self.state.remove_entry(peer_id, tag, tag_local_index);
                if result.is_ok() {
                    self.publish_views(tag);
                }
                let _ = resp.send(result);
            }
            OplogCmd::MergedView { tag, limit, resp } => {
                let _ = resp.send(self.subscribe_view(tag, limit));
            }
            OplogCmd::Entry { peer_id, tag, tag_local_index, resp } => {
                let _ = resp.send(self.state.entry(peer_id, tag, tag_local_index));
            }
            OplogCmd::Shutdown => {
                // Handled in select! above, but keep for completeness
            }
        }
    }

    fn subscribe_view(
        &mut self,
        tag: OperationTag,
        limit: usize,
    ) -> Result<watch::Receiver<MergedOperationView>, OplogError> {
        let initial = MergedOperationView { entries: self.state.merged_view(tag, limit)? };
        let (tx, rx) = watch::channel(initial);
        self.views.push(ViewSubscription { tag, limit, tx });
        Ok(rx)
    }

    /// Recompute and publish every live view of `tag`. Subscriptions whose
    /// receivers are gone are dropped along the way.
    fn publish_views(&mut self, tag: OperationTag) {
        self.views.retain(|sub| !sub.tx.is_closed());
        for sub in self.views.iter().filter(|sub| sub.tag == tag) {
            let entries = match self.state.merged_view(sub.tag, sub.limit) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!("merged view query failed: {}", e);
                    continue;
                }
            };
            sub.tx.send_if_modified(|view| {
                if view.entries == entries {
                    false
                } else {
                    view.entries = entries;
                    true
                }
            });
        }
    }
}
