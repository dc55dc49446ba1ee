//! Ingestion pipelines

pub mod scan;
pub mod sync;

pub use scan::{ScanCoordinator, ScanSummary};
pub use sync::{SyncCoordinator, SyncOptions, SyncSummary};

use osutrack_common::Error;

/// A worker task that panicked or was cancelled
pub(crate) fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Io(std::io::Error::other(e))
}
