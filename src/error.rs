//! Error types for segmented download operations.

use std::io;
use thiserror::Error;

/// Errors that can occur during a download run.
///
/// Per-segment transport failures are retried inside the segment executor and
/// never surface here; a segment that exhausts its attempts is reported as a
/// `Failed` entry in [`crate::DownloadOutcome::failed_segments`] instead.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// I/O error during file operations.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// HTTP request error during download.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The metadata probe failed or returned a non-success status.
    #[error("probe failed: {0}")]
    Probe(String),

    /// The segmentation parameters cannot produce a valid plan.
    #[error("invalid segmentation plan: {0}")]
    InvalidPlan(String),

    /// A response status outside the configured success set.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// All segments reported success but the final file size is wrong.
    #[error("destination size mismatch: expected {expected} bytes, got {actual} bytes")]
    Validation { expected: u64, actual: u64 },

    /// The run was cancelled via the cooperative cancel flag.
    #[error("download cancelled")]
    Cancelled,
}
