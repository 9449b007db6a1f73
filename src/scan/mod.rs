//! Contact Recency Scan
//!
//! The three stages run after a session becomes ready: wait for the chat list
//! to settle, scan contacts for their latest message, rank by recency.

pub mod ranker;
pub mod scanner;
pub mod sync_waiter;
pub mod types;

pub use ranker::rank;
pub use scanner::{ScanOptions, ScanReport, scan};
pub use sync_waiter::{StabilityTracker, SyncOptions, SyncOutcome, wait_for_stable};
pub use types::{ContactResult, ContactStatus, ProgressEvent};
