//! Queued cloud operation variants
//!
//! These are the payloads of operation log entries: mutating actions a user
//! performed locally that still have to be reconciled against the cloud.
//! The log is partitioned by tag; this crate defines the removals tag that
//! the reconciliation engine drains.

use crate::message::MessageId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category discriminator partitioning the operation log into independent
/// queues. Each tag has its own per-peer local index sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct OperationTag(pub u8);

/// Tag for message/chat/history removal operations.
pub const TAG_CLOUD_CHAT_REMOVALS: OperationTag = OperationTag(0);

impl fmt::Display for OperationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag{}", self.0)
    }
}

/// Whether a deletion is applied on the server for both sides or only for
/// the local account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeletionScope {
    ForEveryone,
    ForLocalPeer,
}

impl DeletionScope {
    /// The revoke flag sent on generic delete calls.
    pub fn revoke(&self) -> bool {
        matches!(self, DeletionScope::ForEveryone)
    }
}

/// Delete a set of messages in one peer's history.
///
/// `message_ids` is ordered and deduplicated by the producer; the executor
/// chunks it into fixed-size batches and preserves the order across batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMessagesOperation {
    pub message_ids: Vec<MessageId>,
    pub scope: DeletionScope,
}

/// Leave or delete an entire conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveChatOperation {
    /// Delete for all participants where the server allows it.
    pub delete_globally_if_possible: bool,
    /// Best-effort spam report issued alongside the removal.
    pub report_chat_spam: bool,
    /// Known top message id at the time the operation was queued.
    pub top_message_id: Option<MessageId>,
}

/// Clear a conversation's history up to a top message id, keeping the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearHistoryOperation {
    pub top_message_id: MessageId,
    pub scope: DeletionScope,
}

/// The tagged union stored in an operation log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationContents {
    RemoveMessages(RemoveMessagesOperation),
    RemoveChat(RemoveChatOperation),
    ClearHistory(ClearHistoryOperation),
}

impl OperationContents {
    pub fn kind_str(&self) -> &'static str {
        match self {
            OperationContents::RemoveMessages(_) => "remove_messages",
            OperationContents::RemoveChat(_) => "remove_chat",
            OperationContents::ClearHistory(_) => "clear_history",
        }
    }
}
