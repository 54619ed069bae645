//! RemoveChat - leave or delete a whole conversation
//!
//! Branches on the peer kind. Channel removal is two independent calls
//! awaited together; group and user removal are fixed ordered step lists
//! where each step forwards its updates as it completes and a failing step
//! never blocks the ones after it.

use super::{report_spam_ignored, wipe_local_history, Services};
use crate::executor::clear_history::clear_remote_history;
use courier_model::{
    DeletionScope, MessageId, MessageNamespace, Peer, PeerKind, RemoveChatOperation,
};

pub async fn run(services: &Services, peer: &Peer, op: &RemoveChatOperation) {
    match peer.id.kind {
        PeerKind::Channel => remove_channel(services, peer, op).await,
        PeerKind::Group => remove_group(services, peer, op).await,
        PeerKind::User => remove_user_chat(services, peer, op).await,
    }
}

fn clear_scope(op: &RemoveChatOperation) -> DeletionScope {
    if op.delete_globally_if_possible {
        DeletionScope::ForEveryone
    } else {
        DeletionScope::ForLocalPeer
    }
}

/// Channel: hard delete with a leave fallback, spam report alongside.
async fn remove_channel(services: &Services, peer: &Peer, op: &RemoveChatOperation) {
    let Some(channel) = peer.input_channel() else {
        return;
    };

    let leave = async {
        if op.delete_globally_if_possible {
            match services.remote.delete_channel(channel).await {
                Ok(updates) => Ok(updates),
                Err(e) => {
                    tracing::debug!(peer = %peer.id, "channel delete failed, leaving instead: {}", e);
                    services.remote.leave_channel(channel).await
                }
            }
        } else {
            services.remote.leave_channel(channel).await
        }
    };

    let report = async {
        if op.report_chat_spam {
            report_spam_ignored(services, peer).await;
        }
    };

    // No ordering dependency between leaving and reporting; both settle
    // before the updates batch is applied.
    let (leave_result, ()) = tokio::join!(leave, report);
    match leave_result {
        Ok(batch) => services.updates.apply_updates(batch),
        Err(e) => {
            tracing::debug!(peer = %peer.id, "channel removal failed (swallowed): {}", e);
        }
    }
}

/// Group: clear history, leave the participant list, report, wipe local.
async fn remove_group(services: &Services, peer: &Peer, op: &RemoveChatOperation) {
    // 1. Clear remote history if a target id is resolvable.
    if let Some(input_peer) = peer.input_peer() {
        let top = op
            .top_message_id
            .or_else(|| services.chats.top_message_id(peer.id, MessageNamespace::Cloud));
        if let Some(max_id) = top {
            clear_remote_history(services, peer.id, input_peer, max_id, false, clear_scope(op))
                .await;
        }
    }

    // 2. Remove self from the participant list.
    match services.remote.delete_chat_participant(peer.id.id).await {
        Ok(batch) => services.updates.apply_updates(batch),
        Err(e) => {
            tracing::debug!(peer = %peer.id, "leaving group failed (swallowed): {}", e);
        }
    }

    // 3. Best-effort spam report.
    if op.report_chat_spam {
        report_spam_ignored(services, peer).await;
    }

    // 4. Local history goes regardless of what the server said.
    wipe_local_history(services, peer);
}

/// User chat: report, clear up to the top (or the maximum id), wipe local.
/// Without an input reference the whole operation is a no-op.
async fn remove_user_chat(services: &Services, peer: &Peer, op: &RemoveChatOperation) {
    let Some(input_peer) = peer.input_peer() else {
        return;
    };

    if op.report_chat_spam {
        report_spam_ignored(services, peer).await;
    }

    let max_id = op.top_message_id.unwrap_or(MessageId::MAX_REMOTE);
    clear_remote_history(services, peer.id, input_peer, max_id, false, clear_scope(op)).await;

    wipe_local_history(services, peer);
}
