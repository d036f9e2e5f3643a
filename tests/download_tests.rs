//! Integration tests for the segmented download coordinator, using a local
//! mock HTTP server.

use httpmock::prelude::*;
use httpmock::Method;
use rangefetch::{
    download_segmented, Approach, CancelFlag, DownloadError, DownloadTarget, NetConfig,
    RetryPolicy,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Deterministic test payload of the given size.
fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

fn mock_head<'a>(server: &'a MockServer, path: &str, content: &[u8], ranges: bool) -> httpmock::Mock<'a> {
    let body = content.to_vec();
    server.mock(move |when, then| {
        when.method(Method::HEAD).path(path);
        let mut then = then
            .status(200)
            .header("content-type", "application/octet-stream")
            .body(&body);
        if body.is_empty() {
            // An empty body yields no content-length header on its own,
            // which would read as "size unknown" rather than "zero bytes".
            then = then.header("content-length", "0");
        }
        if ranges {
            then.header("accept-ranges", "bytes");
        }
    })
}

fn mock_range(server: &MockServer, path: &str, content: &[u8], start: u64, end: u64) {
    let slice = content[start as usize..=end as usize].to_vec();
    let total = content.len();
    server.mock(move |when, then| {
        when.method(GET)
            .path(path)
            .header("range", format!("bytes={start}-{end}"));
        then.status(206)
            .header("content-range", format!("bytes {start}-{end}/{total}"))
            .body(&slice);
    });
}

#[tokio::test]
async fn downloads_all_segments_and_reports_monotone_progress() {
    let server = MockServer::start();
    let content = payload(8192);
    mock_head(&server, "/file.bin", &content, true);
    mock_range(&server, "/file.bin", &content, 0, 2999);
    mock_range(&server, "/file.bin", &content, 3000, 5999);
    mock_range(&server, "/file.bin", &content, 6000, 8191);

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("file.bin");
    let observed: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);

    let mut target = DownloadTarget::new(server.url("/file.bin"), &dest);
    target.approach = Approach::Size;
    target.segment_param = Some(3000);
    target.progress_callback = Some(Box::new(move |total| sink.lock().unwrap().push(total)));

    let outcome = download_segmented(&NetConfig::default(), target, CancelFlag::new())
        .await
        .unwrap();

    assert!(outcome.success);
    assert!(outcome.failed_segments.is_empty());
    assert_eq!(outcome.bytes_written, 8192);
    assert_eq!(outcome.total_size, Some(8192));
    assert_eq!(std::fs::read(&dest).unwrap(), content);

    let values = observed.lock().unwrap();
    assert_eq!(*values.last().unwrap(), 8192);
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn failed_segment_is_reported_without_aborting_siblings() {
    let server = MockServer::start();
    let content = payload(6000);
    mock_head(&server, "/file.bin", &content, true);
    mock_range(&server, "/file.bin", &content, 0, 2999);
    let failing = server.mock(|when, then| {
        when.method(GET)
            .path("/file.bin")
            .header("range", "bytes=3000-5999");
        then.status(500);
    });

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("file.bin");
    let mut target = DownloadTarget::new(server.url("/file.bin"), &dest);
    target.approach = Approach::Size;
    target.segment_param = Some(3000);
    target.retry = RetryPolicy {
        max_attempts: 2,
        delay_between_attempts: Duration::from_millis(10),
        ..RetryPolicy::default()
    };

    let outcome = download_segmented(&NetConfig::default(), target, CancelFlag::new())
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.partial_file_valid);
    assert_eq!(outcome.failed_segments.len(), 1);
    let failed = &outcome.failed_segments[0];
    assert_eq!(failed.index, 1);
    assert_eq!(failed.attempt, 2);
    assert!(failed.last_error.is_some());
    failing.assert_hits(2);

    // The succeeded segment's bytes are on disk and usable for a resume.
    let written = std::fs::read(&dest).unwrap();
    assert_eq!(&written[..3000], &content[..3000]);
}

#[tokio::test]
async fn probe_failure_aborts_before_touching_the_destination() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("file.bin");
    let target = DownloadTarget::new("http://127.0.0.1:9/file.bin", &dest);

    let result = download_segmented(&NetConfig::default(), target, CancelFlag::new()).await;

    assert!(matches!(result, Err(DownloadError::Probe(_))));
    assert!(!dest.exists());
}

#[tokio::test]
async fn complete_destination_short_circuits_without_fetching() {
    let server = MockServer::start();
    let content = payload(4096);
    let head = mock_head(&server, "/file.bin", &content, true);

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("file.bin");
    std::fs::write(&dest, &content).unwrap();

    let mut target = DownloadTarget::new(server.url("/file.bin"), &dest);
    target.resumable = true;

    let outcome = download_segmented(&NetConfig::default(), target, CancelFlag::new())
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.bytes_written, 4096);
    head.assert_hits(1);
    assert_eq!(std::fs::read(&dest).unwrap(), content);
}

#[tokio::test]
async fn server_without_range_support_falls_back_to_single_stream() {
    let server = MockServer::start();
    let content = payload(5000);
    mock_head(&server, "/file.bin", &content, false);
    let body = content.clone();
    server.mock(move |when, then| {
        when.method(GET).path("/file.bin");
        then.status(200).body(&body);
    });

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("file.bin");
    let target = DownloadTarget::new(server.url("/file.bin"), &dest);

    let outcome = download_segmented(&NetConfig::default(), target, CancelFlag::new())
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(std::fs::read(&dest).unwrap(), content);
}

#[tokio::test]
async fn resume_fetches_only_segments_beyond_the_existing_prefix() {
    let server = MockServer::start();
    let content = payload(9000);
    mock_head(&server, "/file.bin", &content, true);
    // Only the last segment's range is mocked; a request for an earlier
    // range would 404 and fail the run.
    mock_range(&server, "/file.bin", &content, 6000, 8999);

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("file.bin");
    std::fs::write(&dest, &content[..6000]).unwrap();

    let mut target = DownloadTarget::new(server.url("/file.bin"), &dest);
    target.approach = Approach::Size;
    target.segment_param = Some(3000);
    target.resumable = true;

    let outcome = download_segmented(&NetConfig::default(), target, CancelFlag::new())
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.bytes_written, 9000);
    assert_eq!(std::fs::read(&dest).unwrap(), content);
}

#[tokio::test]
async fn cancelled_run_reports_failed_segments_and_keeps_partial_state() {
    let server = MockServer::start();
    let content = payload(8192);
    mock_head(&server, "/file.bin", &content, true);

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("file.bin");
    let mut target = DownloadTarget::new(server.url("/file.bin"), &dest);
    target.approach = Approach::Size;
    target.segment_param = Some(3000);

    let cancel = CancelFlag::new();
    cancel.cancel();

    let outcome = download_segmented(&NetConfig::default(), target, cancel)
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.partial_file_valid);
    assert_eq!(outcome.failed_segments.len(), 3);
    assert!(outcome
        .failed_segments
        .iter()
        .all(|s| s.last_error.as_deref() == Some("download cancelled")));
}

#[tokio::test]
async fn zero_segment_parameter_is_rejected() {
    let server = MockServer::start();
    let content = payload(1024);
    mock_head(&server, "/file.bin", &content, true);

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("file.bin");
    let mut target = DownloadTarget::new(server.url("/file.bin"), &dest);
    target.approach = Approach::Size;
    target.segment_param = Some(0);

    let result = download_segmented(&NetConfig::default(), target, CancelFlag::new()).await;

    assert!(matches!(result, Err(DownloadError::InvalidPlan(_))));
}

#[tokio::test]
async fn missing_content_length_yields_unstarted_failure_outcome() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(Method::HEAD).path("/stream");
        then.status(200).header("accept-ranges", "bytes");
    });

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("stream.bin");
    let target = DownloadTarget::new(server.url("/stream"), &dest);

    let outcome = download_segmented(&NetConfig::default(), target, CancelFlag::new())
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.failed_segments.is_empty());
    assert!(!outcome.partial_file_valid);
    assert_eq!(outcome.total_size, None);
    assert!(!dest.exists());
}

#[tokio::test]
async fn zero_byte_resource_creates_an_empty_file() {
    let server = MockServer::start();
    mock_head(&server, "/empty.bin", &[], true);

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("empty.bin");
    let target = DownloadTarget::new(server.url("/empty.bin"), &dest);

    let outcome = download_segmented(&NetConfig::default(), target, CancelFlag::new())
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.bytes_written, 0);
    assert_eq!(std::fs::metadata(&dest).unwrap().len(), 0);
}
