//! ChatStore - transactional chat metadata
//!
//! The engine's narrow window into conversation state: peer records with
//! access hashes, per-namespace top message ids, and local history wipes.
//! All access goes through one lock, so each method is a small transaction;
//! wipes are broadcast so observers can react to local history vanishing.

use courier_model::{MessageId, MessageNamespace, Peer, PeerId};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;

/// Error type for chat store operations.
#[derive(Debug, Error)]
pub enum ChatStoreError {
    #[error("lock poisoned")]
    LockPoisoned,
}

/// Event emitted when store contents change out from under readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStoreEvent {
    /// All local history for a peer was wiped.
    HistoryWiped { peer_id: PeerId },
}

#[derive(Default)]
struct ChatStoreInner {
    peers: HashMap<PeerId, Peer>,
    top_message_ids: HashMap<(PeerId, MessageNamespace), MessageId>,
}

/// In-memory chat metadata store.
pub struct ChatStore {
    inner: RwLock<ChatStoreInner>,
    event_tx: broadcast::Sender<ChatStoreEvent>,
}

impl std::fmt::Debug for ChatStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStore").finish_non_exhaustive()
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStore {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self { inner: RwLock::new(ChatStoreInner::default()), event_tx }
    }

    /// Subscribe to store change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatStoreEvent> {
        self.event_tx.subscribe()
    }

    /// Insert or replace a peer record.
    pub fn put_peer(&self, peer: Peer) -> Result<(), ChatStoreError> {
        let mut inner = self.inner.write().map_err(|_| ChatStoreError::LockPoisoned)?;
        inner.peers.insert(peer.id, peer);
        Ok(())
    }

    /// Look up a peer record.
    pub fn get_peer(&self, peer_id: PeerId) -> Option<Peer> {
        self.inner.read().ok()?.peers.get(&peer_id).cloned()
    }

    /// Record the latest known message id for a peer in a namespace.
    pub fn set_top_message_id(
        &self,
        peer_id: PeerId,
        namespace: MessageNamespace,
        id: MessageId,
    ) -> Result<(), ChatStoreError> {
        let mut inner = self.inner.write().map_err(|_| ChatStoreError::LockPoisoned)?;
        inner.top_message_ids.insert((peer_id, namespace), id);
        Ok(())
    }

    /// Latest known message id for a peer in a namespace.
    pub fn top_message_id(&self, peer_id: PeerId, namespace: MessageNamespace) -> Option<MessageId> {
        self.inner.read().ok()?.top_message_ids.get(&(peer_id, namespace)).copied()
    }

    /// Drop all local history state for a peer and notify observers.
    pub fn wipe_local_history(&self, peer_id: PeerId) -> Result<(), ChatStoreError> {
        {
            let mut inner = self.inner.write().map_err(|_| ChatStoreError::LockPoisoned)?;
            inner.top_message_ids.retain(|(id, _), _| *id != peer_id);
        }
        let _ = self.event_tx.send(ChatStoreEvent::HistoryWiped { peer_id });
        Ok(())
    }
}
