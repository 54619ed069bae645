//! OplogState - redb-backed storage for the operation log
//!
//! Three tables: entries keyed by `(tag, peer, local index)`, the merged
//! ordering keyed by `(tag, merged index)` pointing back at entry keys, and
//! index counters. Every public method is one write or read transaction;
//! callers (the actor) serialize them, so a mutator observes a stable entry.

use crate::codec::{self, CodecError};
use crate::entry::{
    ContentsUpdate, EntryUpdate, MergedIndexUpdate, MergedOperationEntry, OperationLogEntry,
};
use courier_model::{OperationContents, OperationTag, PeerId};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use thiserror::Error;

const TABLE_ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("oplog_entries");
const TABLE_MERGED: TableDefinition<&[u8], &[u8]> = TableDefinition::new("oplog_merged");
const TABLE_COUNTERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("oplog_counters");

const COUNTER_MERGED: &[u8] = b"next_merged_index";

/// Errors that can occur during oplog operations.
#[derive(Debug, Error)]
pub enum OplogError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("corrupt counter record")]
    CorruptCounter,
    #[error("actor channel closed")]
    ChannelClosed,
}

/// Durable log state. Owned by the oplog actor.
pub struct OplogState {
    db: Database,
}

impl std::fmt::Debug for OplogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OplogState").finish_non_exhaustive()
    }
}

impl OplogState {
    /// Open or create the log database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OplogError> {
        let db = Database::create(path)?;

        // Create tables up front so later read transactions never race a
        // missing table.
        let txn = db.begin_write()?;
        {
            txn.open_table(TABLE_ENTRIES)?;
            txn.open_table(TABLE_MERGED)?;
            txn.open_table(TABLE_COUNTERS)?;
        }
        txn.commit()?;

        Ok(Self { db })
    }

    /// Append a new entry, allocating its per-peer local index and global
    /// merged index. Returns the stored entry.
    pub fn add_entry(
        &self,
        peer_id: PeerId,
        tag: OperationTag,
        contents: OperationContents,
    ) -> Result<OperationLogEntry, OplogError> {
        let txn = self.db.begin_write()?;
        let entry;
        {
            let mut counters = txn.open_table(TABLE_COUNTERS)?;
            let tag_local_index = next_u64(&mut counters, &local_counter_key(tag, peer_id))? as u32;
            let merged_index = next_u64(&mut counters, COUNTER_MERGED)?;

            let key = codec::entry_key(tag, peer_id, tag_local_index);
            let value = codec::encode_entry_value(merged_index, true, Some(&contents));

            let mut entries = txn.open_table(TABLE_ENTRIES)?;
            entries.insert(key.as_slice(), value.as_slice())?;
            let mut merged = txn.open_table(TABLE_MERGED)?;
            merged.insert(codec::merged_key(tag, merged_index).as_slice(), key.as_slice())?;

            entry = OperationLogEntry {
                peer_id,
                tag,
                tag_local_index,
                merged_index: Some(merged_index),
                contents: Some(contents),
            };
        }
        txn.commit()?;
        Ok(entry)
    }

    /// Atomically read-and-mutate one entry.
    ///
    /// The mutator sees the current entry (or `None` if absent) and decides
    /// how to update it; the captured pre-update entry is returned. Used by
    /// the engine's claim protocol to extract contents and clear the merged
    /// index in one transaction.
    ///
    /// Clearing the merged index leaves the entry's ordering row in place:
    /// the live view keeps listing the claimed unit until `remove_entry`.
    pub fn update_entry(
        &self,
        peer_id: PeerId,
        tag: OperationTag,
        tag_local_index: u32,
        mutator: impl FnOnce(Option<&OperationLogEntry>) -> EntryUpdate,
    ) -> Result<Option<OperationLogEntry>, OplogError> {
        let txn = self.db.begin_write()?;
        let captured;
        {
            let mut entries = txn.open_table(TABLE_ENTRIES)?;
            let key = codec::entry_key(tag, peer_id, tag_local_index);

            let existing = match entries.get(key.as_slice())? {
                Some(guard) => {
                    let raw = codec::decode_entry_value(guard.value())?;
                    Some((raw.ordering_index, entry_from_raw(peer_id, tag, tag_local_index, raw)))
                }
                None => None,
            };

            let update = mutator(existing.as_ref().map(|(_, entry)| entry));
            if let Some((ordering_index, entry)) = &existing {
                let merged = match update.merged_index {
                    MergedIndexUpdate::Keep => entry.merged_index.is_some(),
                    MergedIndexUpdate::Clear => false,
                };
                let new_contents = match update.contents {
                    ContentsUpdate::Keep => entry.contents.clone(),
                    ContentsUpdate::Clear => None,
                    ContentsUpdate::Set(contents) => Some(contents),
                };

                let value =
                    codec::encode_entry_value(*ordering_index, merged, new_contents.as_ref());
                entries.insert(key.as_slice(), value.as_slice())?;
            }
            captured = existing.map(|(_, entry)| entry);
        }
        txn.commit()?;
        Ok(captured)
    }

    /// Remove an entry together with its ordering row. Returns whether an
    /// entry existed.
    pub fn remove_entry(
        &self,
        peer_id: PeerId,
        tag: OperationTag,
        tag_local_index: u32,
    ) -> Result<bool, OplogError> {
        let txn = self.db.begin_write()?;
        let existed;
        {
            let mut entries = txn.open_table(TABLE_ENTRIES)?;
            let key = codec::entry_key(tag, peer_id, tag_local_index);

            let ordering_index = match entries.remove(key.as_slice())? {
                Some(guard) => {
                    existed = true;
                    Some(codec::decode_entry_value(guard.value())?.ordering_index)
                }
                None => {
                    existed = false;
                    None
                }
            };

            if let Some(index) = ordering_index {
                let mut merged = txn.open_table(TABLE_MERGED)?;
                merged.remove(codec::merged_key(tag, index).as_slice())?;
            }
        }
        txn.commit()?;
        Ok(existed)
    }

    /// Point read of one entry.
    pub fn entry(
        &self,
        peer_id: PeerId,
        tag: OperationTag,
        tag_local_index: u32,
    ) -> Result<Option<OperationLogEntry>, OplogError> {
        let txn = self.db.begin_read()?;
        let entries = txn.open_table(TABLE_ENTRIES)?;
        let key = codec::entry_key(tag, peer_id, tag_local_index);
        let Some(guard) = entries.get(key.as_slice())? else {
            return Ok(None);
        };
        let raw = codec::decode_entry_value(guard.value())?;
        Ok(Some(entry_from_raw(peer_id, tag, tag_local_index, raw)))
    }

    /// The first `limit` live entries of a tag, ordered by ascending merged
    /// index. Claimed entries are listed without contents.
    pub fn merged_view(
        &self,
        tag: OperationTag,
        limit: usize,
    ) -> Result<Vec<MergedOperationEntry>, OplogError> {
        let txn = self.db.begin_read()?;
        let merged = txn.open_table(TABLE_MERGED)?;
        let entries = txn.open_table(TABLE_ENTRIES)?;

        let start = codec::merged_key(tag, 0);
        let end = codec::merged_key(tag, u64::MAX);

        let mut view = Vec::new();
        for item in merged.range::<&[u8]>(start.as_slice()..=end.as_slice())? {
            if view.len() >= limit {
                break;
            }
            let (merged_key, entry_key) = item?;
            let (_, merged_index) = codec::decode_merged_key(merged_key.value())?;
            let (entry_tag, peer_id, tag_local_index) = codec::decode_entry_key(entry_key.value())?;

            let Some(guard) = entries.get(entry_key.value())? else {
                tracing::warn!(merged_index, "merged index points at a missing entry");
                continue;
            };
            let raw = codec::decode_entry_value(guard.value())?;

            view.push(MergedOperationEntry {
                peer_id,
                tag: entry_tag,
                tag_local_index,
                merged_index,
                contents: decode_stored_contents(raw.contents),
            });
        }
        Ok(view)
    }
}

fn entry_from_raw(
    peer_id: PeerId,
    tag: OperationTag,
    tag_local_index: u32,
    raw: codec::RawEntryValue,
) -> OperationLogEntry {
    OperationLogEntry {
        peer_id,
        tag,
        tag_local_index,
        merged_index: raw.merged.then_some(raw.ordering_index),
        contents: decode_stored_contents(raw.contents),
    }
}

/// Decode stored contents bytes; an unrecognized variant is a local
/// structural bug, flagged and surfaced as "no contents".
fn decode_stored_contents(bytes: Option<Vec<u8>>) -> Option<OperationContents> {
    let bytes = bytes?;
    match codec::decode_contents(&bytes) {
        Ok(contents) => Some(contents),
        Err(e) => {
            tracing::error!("unrecognized operation log contents: {}", e);
            None
        }
    }
}

fn local_counter_key(tag: OperationTag, peer_id: PeerId) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + codec::ENTRY_KEY_LEN);
    key.push(b'l');
    key.extend_from_slice(&codec::entry_key(tag, peer_id, 0)[..10]);
    key
}

/// Read-increment-write a counter inside the current write transaction.
fn next_u64(
    counters: &mut redb::Table<&[u8], &[u8]>,
    key: &[u8],
) -> Result<u64, OplogError> {
    let current = match counters.get(key)? {
        Some(guard) => u64::from_be_bytes(
            guard.value().try_into().map_err(|_| OplogError::CorruptCounter)?,
        ),
        None => 0,
    };
    counters.insert(key, (current + 1).to_be_bytes().as_slice())?;
    Ok(current)
}
