//! Data structures for segmented download operations.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Strategy used to split a resource of known size into byte-range segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Approach {
    /// Size-based planning for large resources, a single segment otherwise.
    Auto,
    /// The parameter is a worker-count target; segment count is clamped to
    /// the resource size so no segment is empty.
    Thread,
    /// Each segment spans `segment_param` bytes; the last takes the remainder.
    Size,
    /// The resource is divided into `segment_param` equal ranges.
    Quantity,
}

/// Lifecycle of a single segment within one coordinator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

/// A contiguous byte range of the resource, downloaded independently.
///
/// Segments partition `[0, total_size)` exactly: their union covers the whole
/// resource, they are pairwise disjoint, and they are ordered by index.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    /// Position of this segment in the plan.
    pub index: usize,
    /// First byte of the range.
    pub start_offset: u64,
    /// Last byte of the range (inclusive).
    pub end_offset: u64,
    /// Number of attempts made so far.
    pub attempt: u32,
    /// Current lifecycle state.
    pub state: SegmentState,
    /// The last error observed, kept when the segment ends up `Failed`.
    pub last_error: Option<String>,
}

impl Segment {
    pub(crate) fn new(index: usize, start_offset: u64, end_offset: u64) -> Self {
        Self {
            index,
            start_offset,
            end_offset,
            attempt: 0,
            state: SegmentState::Pending,
            last_error: None,
        }
    }

    /// Length of the range in bytes. Never zero; empty segments are not
    /// representable with inclusive end offsets.
    pub fn len(&self) -> u64 {
        self.end_offset - self.start_offset + 1
    }
}

/// Retry behavior for one segment's ranged requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per segment, including the first (default: 3).
    pub max_attempts: u32,
    /// Fixed delay between attempts (default: 150 ms).
    pub delay_between_attempts: Duration,
    /// HTTP statuses accepted as success (default: 200, 206).
    pub success_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_between_attempts: Duration::from_millis(150),
            success_codes: vec![200, 206],
        }
    }
}

/// Callback invoked with the cumulative byte total after each written chunk.
///
/// Calls are serialized by the progress aggregator, and the values passed are
/// monotonically non-decreasing within one run.
pub type ProgressFn = Box<dyn FnMut(u64) + Send>;

/// Everything needed to run one segmented download. Immutable once planning
/// begins.
pub struct DownloadTarget {
    /// Resource URL.
    pub url: String,
    /// Local destination file.
    pub destination: PathBuf,
    /// Trust bytes already present in the destination file and retry only the
    /// ranges they do not cover.
    pub resumable: bool,
    /// Segmentation strategy.
    pub approach: Approach,
    /// Strategy parameter (segment count, size in bytes, or worker target).
    /// `None` selects the per-approach default; `Some(0)` is rejected.
    pub segment_param: Option<u64>,
    /// Retry behavior applied to every segment.
    pub retry: RetryPolicy,
    /// Optional progress callback, registered once at run start.
    pub progress_callback: Option<ProgressFn>,
}

impl DownloadTarget {
    /// Creates a target with default approach (`Auto`), retry policy, and no
    /// resume or progress callback.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            resumable: false,
            approach: Approach::Auto,
            segment_param: None,
            retry: RetryPolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DownloadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadTarget")
            .field("url", &self.url)
            .field("destination", &self.destination)
            .field("resumable", &self.resumable)
            .field("approach", &self.approach)
            .field("segment_param", &self.segment_param)
            .field("retry", &self.retry)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

/// Resource facts gathered by the probe before planning.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceMetadata {
    /// Total size in bytes, when the server reports one.
    pub total_size: Option<u64>,
    /// Whether the server advertises byte-range support. Absence of the
    /// indicator is treated as "no" and forces single-stream mode.
    pub supports_ranges: bool,
    /// Reported content type, if any.
    pub content_type: Option<String>,
}

/// Structured result of one coordinator run.
///
/// The coordinator never errors for partial failure; it distinguishes full
/// success, resumable partial failure, and inability to start.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    /// True when every segment succeeded and the final size matched.
    pub success: bool,
    /// Segments that exhausted their attempts, ordered by index.
    pub failed_segments: Vec<Segment>,
    /// True when the destination's bytes for succeeded segments are durable,
    /// so a later resumable run can retry only the failed ranges.
    pub partial_file_valid: bool,
    /// Bytes reported to the progress aggregator during this run.
    pub bytes_written: u64,
    /// Total resource size, when the probe discovered one.
    pub total_size: Option<u64>,
}

/// Cooperative cancellation flag shared between the caller and all segment
/// tasks. Checked between retry attempts and streamed chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; in-flight segments stop writing at the next
    /// chunk boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
