//! Operation Log Store
//!
//! A durable, peer-partitioned, tag-partitioned append log for queued cloud
//! operations. Entries are keyed by a per-peer monotonically increasing
//! local index and grouped into one global ordering by a merged index; the
//! live merged view is re-published on every mutation.
//!
//! All mutations go through a single actor task, so each entry transition
//! (add, single-entry update, remove) is serialized and atomic with respect
//! to concurrent dispatch passes.

mod actor;
pub mod codec;
mod entry;
mod handle;
mod state;

pub use entry::{
    ContentsUpdate, EntryUpdate, MergedIndexUpdate, MergedOperationEntry, MergedOperationView,
    OperationLogEntry,
};
pub use handle::{Oplog, OplogRunner};
pub use state::{OplogError, OplogState};
