//! On-disk encoding for log keys and values
//!
//! Keys are compound byte strings with big-endian integer fields so that the
//! natural byte order of the store is the scan order we need:
//!
//! - entry key:  `tag (1) | peer kind (1) | peer id (8, BE) | local index (4, BE)`
//! - merged key: `tag (1) | merged index (8, BE)` -> entry key
//!
//! Values are hand-encoded with explicit length prefixes. An entry value is
//! `flags (1) | [merged index (8, BE)] | [contents]`; contents start with a
//! variant tag byte so that an unknown variant is detected, not misparsed.

use courier_model::{
    ClearHistoryOperation, DeletionScope, MessageId, OperationContents, OperationTag, PeerId,
    PeerKind, RemoveChatOperation, RemoveMessagesOperation,
};
use thiserror::Error;

pub const ENTRY_KEY_LEN: usize = 14;
pub const MERGED_KEY_LEN: usize = 9;

const FLAG_MERGED: u8 = 1 << 0;
const FLAG_HAS_CONTENTS: u8 = 1 << 1;

const VARIANT_REMOVE_MESSAGES: u8 = 1;
const VARIANT_REMOVE_CHAT: u8 = 2;
const VARIANT_CLEAR_HISTORY: u8 = 3;

/// Errors produced while encoding or decoding stored bytes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated record: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("unknown operation variant tag {0}")]
    UnknownVariant(u8),
    #[error("unknown peer kind byte {0}")]
    UnknownPeerKind(u8),
    #[error("unknown deletion scope byte {0}")]
    UnknownScope(u8),
    #[error("invalid key length {0}")]
    InvalidKeyLength(usize),
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

fn peer_kind_byte(kind: PeerKind) -> u8 {
    match kind {
        PeerKind::User => 0,
        PeerKind::Group => 1,
        PeerKind::Channel => 2,
    }
}

fn peer_kind_from_byte(byte: u8) -> Result<PeerKind, CodecError> {
    match byte {
        0 => Ok(PeerKind::User),
        1 => Ok(PeerKind::Group),
        2 => Ok(PeerKind::Channel),
        other => Err(CodecError::UnknownPeerKind(other)),
    }
}

/// Build the entry table key for `(tag, peer, local index)`.
pub fn entry_key(tag: OperationTag, peer_id: PeerId, tag_local_index: u32) -> [u8; ENTRY_KEY_LEN] {
    let mut key = [0u8; ENTRY_KEY_LEN];
    key[0] = tag.0;
    key[1] = peer_kind_byte(peer_id.kind);
    key[2..10].copy_from_slice(&peer_id.id.to_be_bytes());
    key[10..14].copy_from_slice(&tag_local_index.to_be_bytes());
    key
}

/// Parse an entry table key back into its fields.
pub fn decode_entry_key(key: &[u8]) -> Result<(OperationTag, PeerId, u32), CodecError> {
    if key.len() != ENTRY_KEY_LEN {
        return Err(CodecError::InvalidKeyLength(key.len()));
    }
    let tag = OperationTag(key[0]);
    let kind = peer_kind_from_byte(key[1])?;
    let id = i64::from_be_bytes(key[2..10].try_into().unwrap());
    let tag_local_index = u32::from_be_bytes(key[10..14].try_into().unwrap());
    Ok((tag, PeerId { kind, id }, tag_local_index))
}

/// Build the merged table key for `(tag, merged index)`.
pub fn merged_key(tag: OperationTag, merged_index: u64) -> [u8; MERGED_KEY_LEN] {
    let mut key = [0u8; MERGED_KEY_LEN];
    key[0] = tag.0;
    key[1..9].copy_from_slice(&merged_index.to_be_bytes());
    key
}

/// Parse a merged table key back into `(tag, merged index)`.
pub fn decode_merged_key(key: &[u8]) -> Result<(OperationTag, u64), CodecError> {
    if key.len() != MERGED_KEY_LEN {
        return Err(CodecError::InvalidKeyLength(key.len()));
    }
    let merged_index = u64::from_be_bytes(key[1..9].try_into().unwrap());
    Ok((OperationTag(key[0]), merged_index))
}

// ---------------------------------------------------------------------------
// Entry values
// ---------------------------------------------------------------------------

/// Structurally decoded entry value.
///
/// `ordering_index` is the globally allocated merged index and is always
/// present; it keys the entry's row in the merged ordering table until the
/// entry is removed. The `merged` flag is the logical merged-index field:
/// claiming an entry clears the flag (and contents) while the ordering row
/// stays, so the live view keeps listing the in-flight unit.
///
/// Contents bytes are kept raw so that an unrecognized variant can be
/// flagged by the caller without losing the rest of the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntryValue {
    pub ordering_index: u64,
    pub merged: bool,
    pub contents: Option<Vec<u8>>,
}

/// Encode an entry value from its parts.
pub fn encode_entry_value(
    ordering_index: u64,
    merged: bool,
    contents: Option<&OperationContents>,
) -> Vec<u8> {
    let mut flags = 0u8;
    if merged {
        flags |= FLAG_MERGED;
    }
    if contents.is_some() {
        flags |= FLAG_HAS_CONTENTS;
    }

    let mut buf = Vec::with_capacity(16);
    buf.push(flags);
    buf.extend_from_slice(&ordering_index.to_be_bytes());
    if let Some(contents) = contents {
        encode_contents(contents, &mut buf);
    }
    buf
}

/// Decode the structural layer of an entry value.
pub fn decode_entry_value(value: &[u8]) -> Result<RawEntryValue, CodecError> {
    let mut cursor = Cursor::new(value);
    let flags = cursor.u8()?;
    let ordering_index = cursor.u64()?;

    let contents = if flags & FLAG_HAS_CONTENTS != 0 {
        Some(cursor.rest().to_vec())
    } else {
        None
    };
    Ok(RawEntryValue { ordering_index, merged: flags & FLAG_MERGED != 0, contents })
}

// ---------------------------------------------------------------------------
// Operation contents
// ---------------------------------------------------------------------------

fn scope_byte(scope: DeletionScope) -> u8 {
    match scope {
        DeletionScope::ForLocalPeer => 0,
        DeletionScope::ForEveryone => 1,
    }
}

fn scope_from_byte(byte: u8) -> Result<DeletionScope, CodecError> {
    match byte {
        0 => Ok(DeletionScope::ForLocalPeer),
        1 => Ok(DeletionScope::ForEveryone),
        other => Err(CodecError::UnknownScope(other)),
    }
}

/// Append the encoded form of `contents` to `buf`.
pub fn encode_contents(contents: &OperationContents, buf: &mut Vec<u8>) {
    match contents {
        OperationContents::RemoveMessages(op) => {
            buf.push(VARIANT_REMOVE_MESSAGES);
            buf.push(scope_byte(op.scope));
            buf.extend_from_slice(&(op.message_ids.len() as u32).to_be_bytes());
            for id in &op.message_ids {
                buf.extend_from_slice(&id.0.to_be_bytes());
            }
        }
        OperationContents::RemoveChat(op) => {
            buf.push(VARIANT_REMOVE_CHAT);
            let mut flags = 0u8;
            if op.delete_globally_if_possible {
                flags |= 1 << 0;
            }
            if op.report_chat_spam {
                flags |= 1 << 1;
            }
            if op.top_message_id.is_some() {
                flags |= 1 << 2;
            }
            buf.push(flags);
            if let Some(top) = op.top_message_id {
                buf.extend_from_slice(&top.0.to_be_bytes());
            }
        }
        OperationContents::ClearHistory(op) => {
            buf.push(VARIANT_CLEAR_HISTORY);
            buf.push(scope_byte(op.scope));
            buf.extend_from_slice(&op.top_message_id.0.to_be_bytes());
        }
    }
}

/// Decode operation contents from their encoded form.
pub fn decode_contents(bytes: &[u8]) -> Result<OperationContents, CodecError> {
    let mut cursor = Cursor::new(bytes);
    match cursor.u8()? {
        VARIANT_REMOVE_MESSAGES => {
            let scope = scope_from_byte(cursor.u8()?)?;
            let count = cursor.u32()? as usize;
            let mut message_ids = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                message_ids.push(MessageId(cursor.i32()?));
            }
            Ok(OperationContents::RemoveMessages(RemoveMessagesOperation { message_ids, scope }))
        }
        VARIANT_REMOVE_CHAT => {
            let flags = cursor.u8()?;
            let top_message_id = if flags & (1 << 2) != 0 {
                Some(MessageId(cursor.i32()?))
            } else {
                None
            };
            Ok(OperationContents::RemoveChat(RemoveChatOperation {
                delete_globally_if_possible: flags & (1 << 0) != 0,
                report_chat_spam: flags & (1 << 1) != 0,
                top_message_id,
            }))
        }
        VARIANT_CLEAR_HISTORY => {
            let scope = scope_from_byte(cursor.u8()?)?;
            let top_message_id = MessageId(cursor.i32()?);
            Ok(OperationContents::ClearHistory(ClearHistoryOperation { top_message_id, scope }))
        }
        other => Err(CodecError::UnknownVariant(other)),
    }
}

// ---------------------------------------------------------------------------
// Byte cursor
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.bytes.len() - self.pos < n {
            return Err(CodecError::Truncated { need: n, have: self.bytes.len() - self.pos });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(contents: OperationContents) {
        let mut buf = Vec::new();
        encode_contents(&contents, &mut buf);
        assert_eq!(decode_contents(&buf).unwrap(), contents);
    }

    #[test]
    fn test_contents_roundtrip() {
        roundtrip(OperationContents::RemoveMessages(RemoveMessagesOperation {
            message_ids: vec![MessageId(1), MessageId(5), MessageId(-3)],
            scope: DeletionScope::ForEveryone,
        }));
        roundtrip(OperationContents::RemoveChat(RemoveChatOperation {
            delete_globally_if_possible: true,
            report_chat_spam: false,
            top_message_id: Some(MessageId(77)),
        }));
        roundtrip(OperationContents::RemoveChat(RemoveChatOperation {
            delete_globally_if_possible: false,
            report_chat_spam: true,
            top_message_id: None,
        }));
        roundtrip(OperationContents::ClearHistory(ClearHistoryOperation {
            top_message_id: MessageId(123),
            scope: DeletionScope::ForLocalPeer,
        }));
    }

    #[test]
    fn test_unknown_variant_flagged() {
        let bytes = [0xEE, 0, 0];
        assert_eq!(decode_contents(&bytes), Err(CodecError::UnknownVariant(0xEE)));
    }

    #[test]
    fn test_truncated_contents() {
        let mut buf = Vec::new();
        encode_contents(
            &OperationContents::ClearHistory(ClearHistoryOperation {
                top_message_id: MessageId(9),
                scope: DeletionScope::ForEveryone,
            }),
            &mut buf,
        );
        buf.truncate(buf.len() - 1);
        assert!(matches!(decode_contents(&buf), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn test_entry_value_roundtrip() {
        let contents = OperationContents::ClearHistory(ClearHistoryOperation {
            top_message_id: MessageId(4),
            scope: DeletionScope::ForEveryone,
        });
        let encoded = encode_entry_value(8, true, Some(&contents));
        let raw = decode_entry_value(&encoded).unwrap();
        assert_eq!(raw.ordering_index, 8);
        assert!(raw.merged);
        assert_eq!(decode_contents(raw.contents.as_deref().unwrap()).unwrap(), contents);

        // A claimed entry keeps its ordering index but loses everything else.
        let inert = decode_entry_value(&encode_entry_value(8, false, None)).unwrap();
        assert_eq!(inert, RawEntryValue { ordering_index: 8, merged: false, contents: None });
    }

    #[test]
    fn test_entry_key_roundtrip() {
        let tag = OperationTag(3);
        let peer = PeerId::channel(1234567890123);
        let key = entry_key(tag, peer, 42);
        assert_eq!(decode_entry_key(&key).unwrap(), (tag, peer, 42));
    }

    #[test]
    fn test_merged_key_orders_by_index() {
        let tag = OperationTag(0);
        let a = merged_key(tag, 1);
        let b = merged_key(tag, 256);
        let c = merged_key(tag, u64::MAX);
        assert!(a < b && b < c);
    }
}
