//! RemoveMessages - chunked message deletion
//!
//! Message ids are partitioned into fixed-size batches issued strictly one
//! after another; each successful batch forwards its pts advance before the
//! next batch goes out. A failed batch produces no update and never aborts
//! the remaining batches.

use super::Services;
use courier_model::{Peer, PeerKind, PtsUpdate, RemoveMessagesOperation};

/// Maximum number of message ids per delete call.
pub const DELETE_BATCH_SIZE: usize = 100;

pub async fn run(services: &Services, peer: &Peer, op: &RemoveMessagesOperation) {
    if peer.id.kind == PeerKind::Channel {
        let Some(channel) = peer.input_channel() else {
            return;
        };
        for batch in op.message_ids.chunks(DELETE_BATCH_SIZE) {
            match services.remote.delete_channel_messages(channel, batch).await {
                Ok(affected) => {
                    services.updates.apply_sequence_update(PtsUpdate::channel(
                        peer.id.id,
                        affected.pts,
                        affected.pts_count,
                    ));
                }
                Err(e) => {
                    tracing::debug!(peer = %peer.id, "channel delete batch failed: {}", e);
                }
            }
        }
    } else {
        let revoke = op.scope.revoke();
        for batch in op.message_ids.chunks(DELETE_BATCH_SIZE) {
            match services.remote.delete_messages(batch, revoke).await {
                Ok(affected) => {
                    services
                        .updates
                        .apply_sequence_update(PtsUpdate::common(affected.pts, affected.pts_count));
                }
                Err(e) => {
                    tracing::debug!(peer = %peer.id, "delete batch failed: {}", e);
                }
            }
        }
    }
}
