//! Segmented HTTP download engine with resume, retry, and progress
//! aggregation.
//!
//! # Features
//!
//! - **Segmented transfers**: splits a resource into byte ranges downloaded
//!   concurrently, bounded by a configurable concurrency ceiling
//! - **Resume**: treats a shorter existing file as a valid prefix and only
//!   fetches the segments beyond it
//! - **Bounded retry**: each segment retries transient failures with a fixed
//!   delay before being reported as failed
//! - **Partial outcomes**: a run with failed segments returns a structured
//!   outcome instead of an error, so callers can retry just the gaps
//! - **Progress aggregation**: a single monotone byte counter across all
//!   segments, with an optional callback
//!
//! # Example
//!
//! ```no_run
//! use rangefetch::{download_segmented, CancelFlag, DownloadTarget, NetConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NetConfig::default();
//!     let target = DownloadTarget::new(
//!         "https://example.com/release.tar.gz",
//!         "release.tar.gz",
//!     );
//!     let outcome = download_segmented(&config, target, CancelFlag::new()).await?;
//!     println!("downloaded {} bytes", outcome.bytes_written);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod segment;
pub mod sink;
pub mod types;

pub use config::NetConfig;
pub use error::DownloadError;
pub use orchestrator::download_segmented;
pub use plan::{plan_segments, DEFAULT_SEGMENT_COUNT, DEFAULT_SEGMENT_SIZE};
pub use probe::probe_resource;
pub use progress::ProgressAggregator;
pub use sink::{BufferSink, FileRegionSink, SegmentSink};
pub use types::{
    Approach, CancelFlag, DownloadOutcome, DownloadTarget, ProgressFn, ResourceMetadata,
    RetryPolicy, Segment, SegmentState,
};
