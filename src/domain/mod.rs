//! Core in-memory state: station registry, transaction/session store,
//! meter-value parsing, and the activity log.

pub mod activity_log;
pub mod meter;
pub mod station;
pub mod transaction;

pub use activity_log::ActivityLog;
pub use station::{Station, StationRegistry, StationStatus};
pub use transaction::{CompletedSession, FinalizeReason, Transaction, TransactionStore};
