//! Record types shared by the cosmbench tools.
//!
//! - [`SubmissionRecord`]: one dispatch attempt from the client side
//! - [`BlockRecord`]: one block-commit event from a node log
//! - [`LatencyRecord`]: a submission joined with its block
//!
//! The stores in [`store`] hold these records in memory: submissions in
//! arrival order, blocks keyed by height.

mod identifiers;
mod records;
pub mod store;

pub use identifiers::{BlockHeight, TxIndex};
pub use records::{now_millis, unix_millis, BlockRecord, LatencyRecord, SubmissionRecord};
pub use store::{BlockTable, HeightConflict, InsertOutcome, MergePolicy, SubmissionStore};
