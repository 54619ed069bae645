//! Executor - interprets claimed operations as remote call sequences
//!
//! One module per operation variant. All remote calls for one claimed
//! operation run strictly sequentially (except where the variant explicitly
//! has no ordering dependency), so the server's pts counters reach the sink
//! in the order the server assigned them. Remote failures are absorbed
//! here; execution always runs to completion unless the task is cancelled.

pub mod clear_history;
pub mod remove_chat;
pub mod remove_messages;

use crate::claim::ClaimedOperation;
use courier_model::{OperationContents, Peer, UpdateSink};
use courier_remote::RemoteService;
use courier_store::ChatStore;
use std::sync::Arc;

/// The collaborators an executor works against.
pub struct Services {
    pub remote: Arc<dyn RemoteService>,
    pub chats: Arc<ChatStore>,
    pub updates: Arc<dyn UpdateSink>,
}

impl Clone for Services {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            chats: self.chats.clone(),
            updates: self.updates.clone(),
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

/// Run one claimed operation to completion.
///
/// A peer that is unknown locally cannot be addressed remotely; the
/// operation degenerates to a no-op and the entry is removed by the caller
/// as if it had completed.
pub async fn execute(services: &Services, operation: &ClaimedOperation) {
    let Some(peer) = services.chats.get_peer(operation.peer_id) else {
        tracing::debug!(peer = %operation.peer_id, "no peer record, skipping operation");
        return;
    };

    match &operation.contents {
        OperationContents::RemoveMessages(op) => {
            remove_messages::run(services, &peer, op).await;
        }
        OperationContents::RemoveChat(op) => {
            remove_chat::run(services, &peer, op).await;
        }
        OperationContents::ClearHistory(op) => {
            clear_history::run(services, &peer, op).await;
        }
    }
}

/// Issue a best-effort spam report; failure is ignored by design.
pub(crate) async fn report_spam_ignored(services: &Services, peer: &Peer) {
    let Some(input_peer) = peer.input_peer() else {
        return;
    };
    if let Err(e) = services.remote.report_spam(input_peer).await {
        tracing::debug!(peer = %peer.id, "spam report failed (ignored): {}", e);
    }
}

/// Wipe local history state for a peer. Only fails on a poisoned lock,
/// which is fatal enough to just log.
pub(crate) fn wipe_local_history(services: &Services, peer: &Peer) {
    if let Err(e) = services.chats.wipe_local_history(peer.id) {
        tracing::error!(peer = %peer.id, "local history wipe failed: {}", e);
    }
}
