//! Core types for the Courier cloud chat sync engine
//!
//! Identifier newtypes, peer records, the queued operation variants, and the
//! sequence-counter update types shared by the oplog, the remote facade, and
//! the reconciliation engine. No async, no I/O.

pub mod message;
pub mod operation;
pub mod peer;
pub mod updates;

pub use message::{MessageId, MessageNamespace};
pub use operation::{
    ClearHistoryOperation, DeletionScope, OperationContents, OperationTag, RemoveChatOperation,
    RemoveMessagesOperation, TAG_CLOUD_CHAT_REMOVALS,
};
pub use peer::{InputChannel, InputPeer, Peer, PeerId, PeerKind};
pub use updates::{PtsUpdate, UpdateSink, UpdatesBatch};
