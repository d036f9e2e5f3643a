//! Download coordination: probe, plan, dispatch, join, validate.
//!
//! [`download_segmented`] drives one download end to end. Segments run as
//! spawned tasks behind a semaphore so at most `max_concurrent_segments`
//! requests are in flight; each failed segment is reported in the outcome
//! rather than aborting its siblings.

use crate::config::NetConfig;
use crate::error::DownloadError;
use crate::plan::plan_segments;
use crate::probe::probe_resource;
use crate::progress::ProgressAggregator;
use crate::segment::run_segment;
use crate::types::{CancelFlag, DownloadOutcome, DownloadTarget, Segment, SegmentState};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Phases a download run moves through, in order. Terminal phases are
/// `Completed` and `PartiallyFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Probing,
    Planning,
    Downloading,
    Validating,
    Completed,
    PartiallyFailed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Probing => "probing",
            RunState::Planning => "planning",
            RunState::Downloading => "downloading",
            RunState::Validating => "validating",
            RunState::Completed => "completed",
            RunState::PartiallyFailed => "partially-failed",
        };
        f.write_str(name)
    }
}

fn advance(state: &mut RunState, next: RunState) {
    debug!(from = %state, to = %next, "run state");
    *state = next;
}

/// Downloads `target.url` to `target.destination`, splitting the transfer
/// into concurrent byte-range segments when the server supports them.
///
/// Returns `Ok` with a [`DownloadOutcome`] describing per-segment results
/// whenever the run reached the transfer phase, including runs where some
/// segments exhausted their retries. Returns `Err` only when the run could
/// not proceed at all: the probe failed, the plan was invalid, the
/// destination could not be prepared, or the finished file failed length
/// validation.
///
/// # Arguments
///
/// * `config` - Client construction and concurrency settings.
/// * `target` - What to fetch, where to put it, and how to split it.
/// * `cancel` - Cooperative stop flag; cancellation surfaces as failed
///   segments in the outcome, with already-written bytes left on disk.
pub async fn download_segmented(
    config: &NetConfig,
    mut target: DownloadTarget,
    cancel: CancelFlag,
) -> Result<DownloadOutcome, DownloadError> {
    let mut state = RunState::Idle;
    let client = config.build_client()?;

    advance(&mut state, RunState::Probing);
    let metadata = probe_resource(&client, &target.url).await?;

    let Some(total_size) = metadata.total_size else {
        // Without a known size there is nothing to plan or validate against.
        warn!(url = %target.url, "resource size unknown, refusing to plan");
        advance(&mut state, RunState::PartiallyFailed);
        return Ok(DownloadOutcome {
            success: false,
            failed_segments: Vec::new(),
            partial_file_valid: false,
            bytes_written: 0,
            total_size: None,
        });
    };

    if let Some(parent) = target.destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let progress = Arc::new(ProgressAggregator::new(target.progress_callback.take()));

    if total_size == 0 {
        tokio::fs::File::create(&target.destination).await?;
        advance(&mut state, RunState::Completed);
        return Ok(DownloadOutcome {
            success: true,
            failed_segments: Vec::new(),
            partial_file_valid: true,
            bytes_written: 0,
            total_size: Some(0),
        });
    }

    // Resume baseline: a shorter existing file is treated as a valid prefix.
    let existing_len = if target.resumable {
        match tokio::fs::metadata(&target.destination).await {
            Ok(meta) => Some(meta.len()),
            Err(_) => None,
        }
    } else {
        None
    };

    if existing_len == Some(total_size) {
        info!(path = %target.destination.display(), "destination already complete, skipping");
        progress.add(total_size);
        advance(&mut state, RunState::Completed);
        return Ok(DownloadOutcome {
            success: true,
            failed_segments: Vec::new(),
            partial_file_valid: true,
            bytes_written: total_size,
            total_size: Some(total_size),
        });
    }

    advance(&mut state, RunState::Planning);
    let use_range = metadata.supports_ranges;
    let mut segments = if use_range {
        plan_segments(total_size, target.approach, target.segment_param)?
    } else {
        debug!(url = %target.url, "server does not accept ranges, using a single stream");
        vec![Segment::new(0, 0, total_size - 1)]
    };

    if !target.resumable {
        // Discard any stale bytes so the length check stays meaningful.
        tokio::fs::File::create(&target.destination).await?;
    } else if let Some(existing) = existing_len {
        for segment in &mut segments {
            if segment.end_offset < existing {
                progress.add(segment.len());
                segment.state = SegmentState::Succeeded;
            }
        }
    }

    let pending = segments
        .iter()
        .filter(|s| s.state == SegmentState::Pending)
        .count();
    info!(
        total = segments.len(),
        pending,
        size = total_size,
        "🚀 dispatching segments"
    );

    advance(&mut state, RunState::Downloading);
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_segments.max(1)));
    let mut handles = Vec::new();

    for segment in segments {
        if segment.state != SegmentState::Pending {
            handles.push((segment, None));
            continue;
        }
        let descriptor = segment.clone();
        let client = client.clone();
        let url = target.url.clone();
        let destination = target.destination.clone();
        let policy = target.retry.clone();
        let progress = Arc::clone(&progress);
        let cancel = cancel.clone();
        let semaphore = Arc::clone(&semaphore);

        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire().await.unwrap();
            run_segment(
                client,
                url,
                destination,
                segment,
                policy,
                progress,
                cancel,
                use_range,
            )
            .await
        });
        handles.push((descriptor, Some(handle)));
    }

    let mut finished = Vec::new();
    for (mut descriptor, handle) in handles {
        match handle {
            None => finished.push(descriptor),
            Some(handle) => match handle.await {
                Ok(segment) => finished.push(segment),
                Err(e) => {
                    descriptor.state = SegmentState::Failed;
                    descriptor.last_error = Some(format!("task failed: {e}"));
                    finished.push(descriptor);
                }
            },
        }
    }
    finished.sort_by_key(|s| s.index);

    let failed_segments: Vec<Segment> = finished
        .iter()
        .filter(|s| s.state == SegmentState::Failed)
        .cloned()
        .collect();

    if failed_segments.is_empty() {
        advance(&mut state, RunState::Validating);
        let actual = tokio::fs::metadata(&target.destination).await?.len();
        if actual != total_size {
            return Err(DownloadError::Validation {
                expected: total_size,
                actual,
            });
        }
        advance(&mut state, RunState::Completed);
        info!(path = %target.destination.display(), bytes = total_size, "✅ download complete");
        Ok(DownloadOutcome {
            success: true,
            failed_segments,
            partial_file_valid: true,
            bytes_written: progress.bytes_written(),
            total_size: Some(total_size),
        })
    } else {
        advance(&mut state, RunState::PartiallyFailed);
        warn!(
            failed = failed_segments.len(),
            total = finished.len(),
            "❌ download finished with failed segments"
        );
        Ok(DownloadOutcome {
            success: false,
            failed_segments,
            partial_file_valid: true,
            bytes_written: progress.bytes_written(),
            total_size: Some(total_size),
        })
    }
}
