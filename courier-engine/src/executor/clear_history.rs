//! ClearHistory - repeated deletion up to a top message id
//!
//! The server deletes history in passes: each delete-history response
//! carries a remaining offset, and a nonzero offset means the same request
//! must be reissued. The loop has a single exit path: offset zero or a
//! remote failure, both of which count as completion at this layer.

use super::Services;
use courier_model::{
    ClearHistoryOperation, DeletionScope, InputPeer, MessageId, Peer, PeerId, PeerKind, PtsUpdate,
};

/// Run the delete-history loop for a non-channel peer.
///
/// Emits one sequence update per successful pass. Failure terminates the
/// loop; a failed clear is not distinguished from a finished one here.
pub async fn clear_remote_history(
    services: &Services,
    peer_id: PeerId,
    input_peer: InputPeer,
    max_id: MessageId,
    just_clear: bool,
    scope: DeletionScope,
) {
    loop {
        match services.remote.delete_history(input_peer, max_id, just_clear, scope.revoke()).await {
            Ok(affected) => {
                services
                    .updates
                    .apply_sequence_update(PtsUpdate::common(affected.pts, affected.pts_count));
                if affected.offset == 0 {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(peer = %peer_id, "delete-history failed, treating as done: {}", e);
                break;
            }
        }
    }
}

/// Execute a standalone ClearHistory operation.
pub async fn run(services: &Services, peer: &Peer, op: &ClearHistoryOperation) {
    match peer.id.kind {
        PeerKind::User | PeerKind::Group => {
            let Some(input_peer) = peer.input_peer() else {
                return;
            };
            clear_remote_history(services, peer.id, input_peer, op.top_message_id, true, op.scope)
                .await;
        }
        PeerKind::Channel => {
            let Some(channel) = peer.input_channel() else {
                return;
            };
            // Channel history clears are a single call; the result carries
            // no sequence counters and failure is ignored.
            if let Err(e) = services.remote.delete_channel_history(channel, op.top_message_id).await
            {
                tracing::debug!(peer = %peer.id, "channel history clear failed (ignored): {}", e);
            }
        }
    }
}
