//! Cloud operation reconciliation engine
//!
//! Drains the removals queue of the operation log against the remote
//! service: the dispatcher keeps at most one in-flight operation per peer,
//! the claim protocol extracts an entry's contents exactly once, and the
//! executor interprets each operation variant as a sequence of remote calls
//! whose pts results are forwarded, in order, to the state manager sink.
//!
//! Remote failures never propagate out of the engine; a failed call is
//! absorbed at the batch or step level so the queue cannot jam on one bad
//! entry. The cost is that a genuinely failed deletion is indistinguishable
//! from a completed one at the log level.

pub mod claim;
pub mod dispatcher;
pub mod executor;
mod worker;

pub use claim::{take_operation, ClaimedOperation};
pub use dispatcher::{OperationTracker, ReconcileOutcome};
pub use executor::Services;
pub use worker::{OperationWorker, WorkerHandle, MERGED_VIEW_LIMIT};
