//! Oplog - handle to the operation log actor
//!
//! Cheaply cloneable; all mutations are forwarded to the actor task through
//! an mpsc channel with oneshot responses, so concurrent callers are
//! serialized at the log.

use crate::actor::{OplogActor, OplogCmd};
use crate::entry::{EntryUpdate, MergedOperationView, OperationLogEntry};
use crate::state::{OplogError, OplogState};
use courier_model::{OperationContents, OperationTag, PeerId};
use std::path::Path;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Handle to a running operation log.
pub struct Oplog {
    tx: mpsc::Sender<OplogCmd>,
    shutdown_token: CancellationToken,
}

impl Clone for Oplog {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), shutdown_token: self.shutdown_token.clone() }
    }
}

impl std::fmt::Debug for Oplog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oplog").finish_non_exhaustive()
    }
}

/// Runner for the oplog actor. Must be spawned as a tokio task.
pub struct OplogRunner {
    actor: OplogActor,
    shutdown_token: CancellationToken,
}

impl OplogRunner {
    /// Run the actor loop. Spawn via `tokio::spawn`.
    pub async fn run(self) {
        self.actor.run(self.shutdown_token).await;
    }
}

impl Oplog {
    /// Open (or create) the log at `path`. Returns the handle and the actor
    /// runner, which the caller must spawn.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, OplogRunner), OplogError> {
        Ok(Self::with_state(OplogState::open(path)?))
    }

    /// Wrap an already-opened state.
    pub fn with_state(state: OplogState) -> (Self, OplogRunner) {
        let (tx, rx) = mpsc::channel(32);
        let shutdown_token = CancellationToken::new();
        let runner = OplogRunner {
            actor: OplogActor::new(state, rx),
            shutdown_token: shutdown_token.clone(),
        };
        (Self { tx, shutdown_token }, runner)
    }

    /// Append a new operation for a peer; indices are allocated by the log.
    pub async fn add_entry(
        &self,
        peer_id: PeerId,
        tag: OperationTag,
        contents: OperationContents,
    ) -> Result<OperationLogEntry, OplogError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(OplogCmd::AddEntry { peer_id, tag, contents, resp: resp_tx })
            .await
            .map_err(|_| OplogError::ChannelClosed)?;
        resp_rx.await.map_err(|_| OplogError::ChannelClosed)?
    }

    /// Atomically read-and-mutate one entry; returns the captured pre-update
    /// entry. See [`OplogState::update_entry`].
    pub async fn update_entry(
        &self,
        peer_id: PeerId,
        tag: OperationTag,
        tag_local_index: u32,
        mutator: impl FnOnce(Option<&OperationLogEntry>) -> EntryUpdate + Send + 'static,
    ) -> Result<Option<OperationLogEntry>, OplogError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(OplogCmd::UpdateEntry {
                peer_id,
                tag,
                tag_local_index,
                mutator: Box::new(mutator),
                resp: resp_tx,
            })
            .await
            .map_err(|_| OplogError::ChannelClosed)?;
        resp_rx.await.map_err(|_| OplogError::ChannelClosed)?
    }

    /// Permanently remove one entry. Returns whether it existed.
    pub async fn remove_entry(
        &self,
        peer_id: PeerId,
        tag: OperationTag,
        tag_local_index: u32,
    ) -> Result<bool, OplogError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(OplogCmd::RemoveEntry { peer_id, tag, tag_local_index, resp: resp_tx })
            .await
            .map_err(|_| OplogError::ChannelClosed)?;
        resp_rx.await.map_err(|_| OplogError::ChannelClosed)?
    }

    /// Point read of one entry.
    pub async fn entry(
        &self,
        peer_id: PeerId,
        tag: OperationTag,
        tag_local_index: u32,
    ) -> Result<Option<OperationLogEntry>, OplogError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(OplogCmd::Entry { peer_id, tag, tag_local_index, resp: resp_tx })
            .await
            .map_err(|_| OplogError::ChannelClosed)?;
        resp_rx.await.map_err(|_| OplogError::ChannelClosed)?
    }

    /// Subscribe to the live merged view of a tag: the first `limit`
    /// unclaimed entries in merged order, re-emitted on every mutation.
    pub async fn merged_view(
        &self,
        tag: OperationTag,
        limit: usize,
    ) -> Result<watch::Receiver<MergedOperationView>, OplogError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(OplogCmd::MergedView { tag, limit, resp: resp_tx })
            .await
            .map_err(|_| OplogError::ChannelClosed)?;
        resp_rx.await.map_err(|_| OplogError::ChannelClosed)?
    }

    /// Request actor shutdown (non-blocking).
    ///
    /// 1. Tries to send a polite `Shutdown` command (preserves order).
    /// 2. If the channel is full, cancels the shutdown token (immediate stop).
    pub fn shutdown(&self) {
        use tokio::sync::mpsc::error::TrySendError;

        match self.tx.try_send(OplogCmd::Shutdown) {
            Ok(_) => {}
            Err(TrySendError::Full(_)) => {
                self.shutdown_token.cancel();
            }
            Err(TrySendError::Closed(_)) => {
                // Actor is already dead. Do nothing.
            }
        }
    }

    /// Shut down and wait for the actor to exit.
    pub async fn close(&self) {
        self.shutdown();
        self.tx.closed().await;
    }
}
