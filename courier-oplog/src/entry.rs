//! Log entry types and single-entry update descriptions

use courier_model::{OperationContents, OperationTag, PeerId};

/// One stored entry of the operation log.
///
/// A claimed entry keeps its key but loses `merged_index` and `contents`;
/// it stays in the log as an inert placeholder until removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLogEntry {
    pub peer_id: PeerId,
    pub tag: OperationTag,
    pub tag_local_index: u32,
    pub merged_index: Option<u64>,
    pub contents: Option<OperationContents>,
}

/// An element of the live merged view: an entry together with its position
/// in the global ordering.
///
/// The view lists every entry that has not been removed yet, claimed ones
/// included; a claimed element has no contents. Listing claimed entries is
/// what keeps the dispatcher from cancelling its own in-flight work when a
/// claim strips the entry's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedOperationEntry {
    pub peer_id: PeerId,
    pub tag: OperationTag,
    pub tag_local_index: u32,
    pub merged_index: u64,
    pub contents: Option<OperationContents>,
}

/// Snapshot of the merged view for one tag, ordered by ascending merged
/// index. Re-published through a watch channel on every log mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergedOperationView {
    pub entries: Vec<MergedOperationEntry>,
}

/// How a single-entry update changes the merged index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergedIndexUpdate {
    Keep,
    Clear,
}

/// How a single-entry update changes the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentsUpdate {
    Keep,
    Clear,
    Set(OperationContents),
}

/// Result of an entry mutator: what to do with the entry's merged index and
/// contents. Applied atomically within the update transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryUpdate {
    pub merged_index: MergedIndexUpdate,
    pub contents: ContentsUpdate,
}

impl EntryUpdate {
    /// Leave the entry untouched.
    pub fn keep() -> Self {
        Self { merged_index: MergedIndexUpdate::Keep, contents: ContentsUpdate::Keep }
    }

    /// Strip the entry down to an inert placeholder.
    pub fn clear() -> Self {
        Self { merged_index: MergedIndexUpdate::Clear, contents: ContentsUpdate::Clear }
    }
}
