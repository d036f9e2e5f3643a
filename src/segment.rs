//! Segment execution: one ranged fetch with bounded retry and positioned
//! writes into the shared destination file.

use crate::error::DownloadError;
use crate::progress::ProgressAggregator;
use crate::sink::{FileRegionSink, SegmentSink};
use crate::types::{CancelFlag, RetryPolicy, Segment, SegmentState};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, warn};

/// Fetches one segment's byte range, retrying transient failures with a
/// fixed delay, and returns the segment in a terminal state.
///
/// Every attempt reseeks to `start_offset` before writing, so a failed
/// attempt's partial bytes are overwritten rather than appended. Exhausting
/// the retry budget marks the segment `Failed` and records the last error;
/// sibling segments are unaffected.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_segment(
    client: reqwest::Client,
    url: String,
    destination: PathBuf,
    mut segment: Segment,
    policy: RetryPolicy,
    progress: Arc<ProgressAggregator>,
    cancel: CancelFlag,
    use_range: bool,
) -> Segment {
    segment.state = SegmentState::InFlight;

    let start_offset = segment.start_offset;
    let end_offset = segment.end_offset;
    let index = segment.index;
    let attempts = Arc::new(AtomicU32::new(0));
    // Furthest in-segment offset any attempt has reached; progress deltas
    // are measured against it so retries never double-count.
    let high_water = Arc::new(AtomicU64::new(0));

    let delay_ms = u64::try_from(policy.delay_between_attempts.as_millis()).unwrap_or(u64::MAX);
    let retry_strategy = tokio_retry2::strategy::FixedInterval::from_millis(delay_ms)
        .take(policy.max_attempts.saturating_sub(1) as usize);

    let result = Retry::spawn(retry_strategy, || {
        let client = client.clone();
        let url = url.clone();
        let destination = destination.clone();
        let success_codes = policy.success_codes.clone();
        let progress = Arc::clone(&progress);
        let cancel = cancel.clone();
        let attempts = Arc::clone(&attempts);
        let high_water = Arc::clone(&high_water);

        async move {
            if cancel.is_cancelled() {
                return RetryError::to_permanent(DownloadError::Cancelled);
            }
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;

            let outcome = attempt_segment(
                &client,
                &url,
                &destination,
                start_offset,
                end_offset,
                use_range,
                &success_codes,
                &progress,
                &cancel,
                &high_water,
            )
            .await;

            match outcome {
                Ok(()) => Ok(()),
                Err(DownloadError::Cancelled) => {
                    RetryError::to_permanent(DownloadError::Cancelled)
                }
                Err(e) => {
                    warn!(segment = index, attempt, error = %e, "segment attempt failed");
                    RetryError::to_transient(e)
                }
            }
        }
    })
    .await;

    segment.attempt = attempts.load(Ordering::SeqCst);
    match result {
        Ok(()) => {
            debug!(
                segment = index,
                attempts = segment.attempt,
                bytes = segment.len(),
                "segment complete"
            );
            segment.state = SegmentState::Succeeded;
        }
        Err(e) => {
            segment.state = SegmentState::Failed;
            segment.last_error = Some(e.to_string());
        }
    }
    segment
}

/// One attempt: ranged request, status check, stream-to-file.
#[allow(clippy::too_many_arguments)]
async fn attempt_segment(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    start_offset: u64,
    end_offset: u64,
    use_range: bool,
    success_codes: &[u16],
    progress: &ProgressAggregator,
    cancel: &CancelFlag,
    high_water: &AtomicU64,
) -> Result<(), DownloadError> {
    let mut sink = FileRegionSink::open(destination, start_offset).await?;
    sink.rewind().await?;

    let mut request = client.get(url);
    if use_range {
        request = request.header("Range", format!("bytes={}-{}", start_offset, end_offset));
    }
    let response = request.send().await?;

    let status = response.status().as_u16();
    // A 200 reply to a ranged request carries the whole resource body, which
    // would land at the wrong offset.
    if !success_codes.contains(&status) || (use_range && status != 206) {
        return Err(DownloadError::UnexpectedStatus {
            status,
            url: url.to_string(),
        });
    }

    stream_body(response, &mut sink, progress, cancel, high_water).await
}

/// Streams the response body into the sink chunk by chunk, reporting only
/// bytes beyond the segment's high-water mark to the aggregator.
async fn stream_body<S: SegmentSink>(
    response: reqwest::Response,
    sink: &mut S,
    progress: &ProgressAggregator,
    cancel: &CancelFlag,
    high_water: &AtomicU64,
) -> Result<(), DownloadError> {
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(piece) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let chunk = piece?;
        sink.append(&chunk).await?;
        written += chunk.len() as u64;

        let reached = high_water.load(Ordering::Relaxed);
        if written > reached {
            progress.add(written - reached);
            high_water.store(written, Ordering::Relaxed);
        }
    }

    sink.flush().await?;
    Ok(())
}
