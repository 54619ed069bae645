//! Server sequence-counter updates
//!
//! Every successful mutating call returns new pts counters. Counters for the
//! same sequence must reach the state manager in emission order; applying
//! them out of order corrupts the local replica's view of server history.

use serde::{Deserialize, Serialize};

/// One pts advance produced by a remote call.
///
/// `channel_id` is set for channel-scoped sequences; `None` means the
/// account-wide common sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtsUpdate {
    pub channel_id: Option<i64>,
    pub pts: i32,
    pub pts_count: i32,
}

impl PtsUpdate {
    pub fn common(pts: i32, pts_count: i32) -> Self {
        Self { channel_id: None, pts, pts_count }
    }

    pub fn channel(channel_id: i64, pts: i32, pts_count: i32) -> Self {
        Self { channel_id: Some(channel_id), pts, pts_count }
    }
}

/// An opaque group of updates returned by calls that mutate chat membership
/// (delete-channel, leave-channel, delete-chat-participant).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdatesBatch {
    pub updates: Vec<PtsUpdate>,
}

impl UpdatesBatch {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Sink for ordered sequence updates, implemented by the state manager.
///
/// Both methods are fire-and-forget and must not block: the executor calls
/// them between sequential remote calls and relies on them returning
/// immediately.
pub trait UpdateSink: Send + Sync {
    fn apply_sequence_update(&self, update: PtsUpdate);
    fn apply_updates(&self, batch: UpdatesBatch);
}
