//! Claim protocol - take an entry's contents exactly once
//!
//! A claim is a single transaction against the oplog: read the entry, and
//! if it still carries a merged index and recognized contents, capture both
//! and strip them from the stored entry. The entry itself stays in the log
//! (and its unit stays in the merged view) until the executor finishes and
//! removal runs in a second transaction. A crash between claim and removal
//! therefore leaves an inert entry that the next drain pass removes without
//! re-executing.

use courier_model::{OperationContents, OperationTag, PeerId};
use courier_oplog::{EntryUpdate, Oplog, OplogError};

/// An operation extracted from the log, owned by one executor task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedOperation {
    pub peer_id: PeerId,
    pub tag: OperationTag,
    pub tag_local_index: u32,
    pub merged_index: u64,
    pub contents: OperationContents,
}

/// Atomically claim one entry.
///
/// Returns `None` if the entry is gone, was already claimed by a concurrent
/// pass, or carries unrecognized contents (flagged by the oplog as a local
/// structural bug); in all three cases the caller skips execution.
pub async fn take_operation(
    oplog: &Oplog,
    peer_id: PeerId,
    tag: OperationTag,
    tag_local_index: u32,
) -> Result<Option<ClaimedOperation>, OplogError> {
    let captured = oplog
        .update_entry(peer_id, tag, tag_local_index, |entry| {
            match entry {
                Some(e) if e.merged_index.is_some() && e.contents.is_some() => EntryUpdate::clear(),
                _ => EntryUpdate::keep(),
            }
        })
        .await?;

    Ok(captured.and_then(|entry| {
        match (entry.merged_index, entry.contents) {
            (Some(merged_index), Some(contents)) => Some(ClaimedOperation {
                peer_id,
                tag,
                tag_local_index: entry.tag_local_index,
                merged_index,
                contents,
            }),
            _ => None,
        }
    }))
}
