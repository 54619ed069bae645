//! Message identifiers
//!
//! Remote message ids are 32-bit, assigned by the server per peer. The local
//! store additionally partitions messages into namespaces so that cloud
//! history and local-only entries (drafts, service markers) never mix.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned message identifier within a peer's history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
pub struct MessageId(pub i32);

impl MessageId {
    /// The highest id usable as an upper bound in remote history requests.
    /// Used when clearing a 1:1 chat without a known top message.
    pub const MAX_REMOTE: MessageId = MessageId(i32::MAX - 1);
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for MessageId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

/// Namespace partitioning a peer's message index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageNamespace {
    /// Server-side history, ids assigned by the cloud.
    Cloud,
    /// Local-only entries, never reconciled remotely.
    Local,
}
