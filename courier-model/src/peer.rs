//! Peer identifiers and input references
//!
//! A `PeerId` names a conversation partner: a 1:1 user chat, a basic group,
//! or a broadcast/supergroup channel. Remote calls do not accept bare ids;
//! they require an input reference that carries the server-issued access
//! hash, so reference construction is fallible for users and channels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of conversation a peer id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PeerKind {
    /// 1:1 chat with another user.
    User,
    /// Basic (legacy) group chat.
    Group,
    /// Broadcast channel or supergroup.
    Channel,
}

impl PeerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerKind::User => "user",
            PeerKind::Group => "group",
            PeerKind::Channel => "channel",
        }
    }
}

/// Identifier of a conversation peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId {
    pub kind: PeerKind,
    pub id: i64,
}

impl PeerId {
    pub fn user(id: i64) -> Self {
        Self { kind: PeerKind::User, id }
    }

    pub fn group(id: i64) -> Self {
        Self { kind: PeerKind::Group, id }
    }

    pub fn channel(id: i64) -> Self {
        Self { kind: PeerKind::Channel, id }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// A peer record as held by the chat store.
///
/// `access_hash` is the server-issued capability required to address users
/// and channels in remote calls. Basic groups are addressed by bare id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub access_hash: Option<i64>,
}

impl Peer {
    pub fn new(id: PeerId, access_hash: Option<i64>) -> Self {
        Self { id, access_hash }
    }

    /// Build the generic input reference for this peer, if addressable.
    pub fn input_peer(&self) -> Option<InputPeer> {
        match self.id.kind {
            PeerKind::User => self.access_hash.map(|access_hash| InputPeer::User {
                user_id: self.id.id,
                access_hash,
            }),
            PeerKind::Group => Some(InputPeer::Group { group_id: self.id.id }),
            PeerKind::Channel => self.access_hash.map(|access_hash| InputPeer::Channel {
                channel_id: self.id.id,
                access_hash,
            }),
        }
    }

    /// Build the channel-scoped input reference, if this peer is a channel.
    pub fn input_channel(&self) -> Option<InputChannel> {
        match self.id.kind {
            PeerKind::Channel => self.access_hash.map(|access_hash| InputChannel {
                channel_id: self.id.id,
                access_hash,
            }),
            _ => None,
        }
    }
}

/// Input reference for generic (non-channel-scoped) remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputPeer {
    User { user_id: i64, access_hash: i64 },
    Group { group_id: i64 },
    Channel { channel_id: i64, access_hash: i64 },
}

/// Input reference for channel-scoped remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputChannel {
    pub channel_id: i64,
    pub access_hash: i64,
}
