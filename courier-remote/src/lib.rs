//! Remote service facade
//!
//! The reconciliation engine talks to the cloud exclusively through the
//! `RemoteService` trait: one method per remote call family, each taking a
//! typed request and resolving to a typed response or an `RpcError`.
//! Transport concerns (framing, encryption, timeouts, retry of transport
//! frames) live behind the implementation; the engine treats any terminal
//! failure, timeout included, as a normal failure outcome.

use async_trait::async_trait;
use courier_model::{InputChannel, InputPeer, MessageId, UpdatesBatch};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal failure of a remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("network unavailable: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("server error {code}: {message}")]
    Server { code: i32, message: String },
}

/// Response to a delete-messages call: the pts advance it caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedMessages {
    pub pts: i32,
    pub pts_count: i32,
}

/// Response to a delete-history call.
///
/// `offset != 0` means the server truncated the pass and more history
/// remains below `max_id`; the caller reissues the same request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedHistory {
    pub pts: i32,
    pub pts_count: i32,
    pub offset: i32,
}

/// Typed facade over the cloud RPC surface used by the engine.
///
/// Implementations must be cancel-safe: the engine drops in-flight futures
/// when an operation is superseded.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Delete messages in a non-channel peer's history.
    /// `revoke` requests deletion for all participants.
    async fn delete_messages(
        &self,
        ids: &[MessageId],
        revoke: bool,
    ) -> Result<AffectedMessages, RpcError>;

    /// Delete messages in a channel's history. Channel deletions are always
    /// for everyone; there is no revoke flag.
    async fn delete_channel_messages(
        &self,
        channel: InputChannel,
        ids: &[MessageId],
    ) -> Result<AffectedMessages, RpcError>;

    /// Delete history of a non-channel peer up to and including `max_id`.
    /// `just_clear` keeps the dialog, `revoke` deletes for all participants.
    async fn delete_history(
        &self,
        peer: InputPeer,
        max_id: MessageId,
        just_clear: bool,
        revoke: bool,
    ) -> Result<AffectedHistory, RpcError>;

    /// Delete a channel's history up to and including `max_id`.
    async fn delete_channel_history(
        &self,
        channel: InputChannel,
        max_id: MessageId,
    ) -> Result<bool, RpcError>;

    /// Destroy a channel for all participants.
    async fn delete_channel(&self, channel: InputChannel) -> Result<UpdatesBatch, RpcError>;

    /// Leave a channel, keeping it alive for other participants.
    async fn leave_channel(&self, channel: InputChannel) -> Result<UpdatesBatch, RpcError>;

    /// Remove the local account from a basic group's participant list.
    async fn delete_chat_participant(&self, group_id: i64) -> Result<UpdatesBatch, RpcError>;

    /// Report a peer as spam. Best-effort side action.
    async fn report_spam(&self, peer: InputPeer) -> Result<bool, RpcError>;
}
