//! Segmentation planning: splitting a resource of known size into disjoint
//! byte ranges.

use crate::error::DownloadError;
use crate::types::{Approach, Segment};

/// Default segment count for the `Quantity` and `Thread` approaches.
pub const DEFAULT_SEGMENT_COUNT: u64 = 100;

/// Default segment size for the `Size` approach; also the threshold above
/// which `Auto` switches from a single stream to size-based planning.
pub const DEFAULT_SEGMENT_SIZE: u64 = 5 * 1024 * 1024;

/// Partitions `[0, total_size)` into an ordered sequence of segments.
///
/// The result always covers the full resource with pairwise-disjoint ranges.
/// The planner is never invoked for resources of unknown size.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidPlan`] when `total_size` is zero or the
/// explicit parameter is zero.
pub fn plan_segments(
    total_size: u64,
    approach: Approach,
    segment_param: Option<u64>,
) -> Result<Vec<Segment>, DownloadError> {
    if total_size == 0 {
        return Err(DownloadError::InvalidPlan(
            "cannot plan a zero-byte resource".to_string(),
        ));
    }
    if segment_param == Some(0) {
        return Err(DownloadError::InvalidPlan(
            "segment parameter must be greater than zero".to_string(),
        ));
    }

    let segments = match approach {
        Approach::Quantity | Approach::Thread => {
            by_count(total_size, segment_param.unwrap_or(DEFAULT_SEGMENT_COUNT))
        }
        Approach::Size => by_size(total_size, segment_param.unwrap_or(DEFAULT_SEGMENT_SIZE)),
        Approach::Auto => {
            if total_size > DEFAULT_SEGMENT_SIZE {
                by_size(total_size, DEFAULT_SEGMENT_SIZE)
            } else {
                vec![Segment::new(0, 0, total_size - 1)]
            }
        }
    };

    Ok(segments)
}

/// Divides the resource into `count` equal ranges; the last absorbs the
/// remainder. The count is clamped to the resource size so every segment is
/// at least one byte long.
fn by_count(total_size: u64, count: u64) -> Vec<Segment> {
    let count = count.min(total_size).max(1);
    let base = total_size / count;
    let remainder = total_size % count;

    let mut segments = Vec::with_capacity(count as usize);
    let mut start = 0u64;
    for index in 0..count {
        let len = if index == count - 1 { base + remainder } else { base };
        segments.push(Segment::new(index as usize, start, start + len - 1));
        start += len;
    }
    segments
}

/// Cuts the resource into ranges of `size` bytes; the last segment is the
/// non-zero remainder.
fn by_size(total_size: u64, size: u64) -> Vec<Segment> {
    if size >= total_size {
        return vec![Segment::new(0, 0, total_size - 1)];
    }

    let full = total_size / size;
    let remainder = total_size % size;
    let count = full + u64::from(remainder > 0);

    let mut segments = Vec::with_capacity(count as usize);
    for index in 0..count {
        let start = index * size;
        let end = if index == count - 1 {
            total_size - 1
        } else {
            start + size - 1
        };
        segments.push(Segment::new(index as usize, start, end));
    }
    segments
}
