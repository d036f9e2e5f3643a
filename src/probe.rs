//! Resource metadata probing.

use crate::error::DownloadError;
use crate::types::ResourceMetadata;
use tracing::debug;

/// Issues one metadata-only HEAD request and reports size, range support,
/// and content type.
///
/// Range support is inferred from the `Accept-Ranges` header; absence is
/// treated as "no", which forces single-stream mode even when the size is
/// known.
///
/// # Errors
///
/// Returns [`DownloadError::Probe`] on connection failure or a non-success
/// status.
pub async fn probe_resource(
    client: &reqwest::Client,
    url: &str,
) -> Result<ResourceMetadata, DownloadError> {
    let response = client
        .head(url)
        .send()
        .await
        .map_err(|e| DownloadError::Probe(format!("HEAD {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Probe(format!(
            "HEAD {} returned HTTP {}",
            url, status
        )));
    }

    let total_size = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());

    let supports_ranges = response
        .headers()
        .get("accept-ranges")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.eq_ignore_ascii_case("bytes"))
        .unwrap_or(false);

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    debug!(
        url,
        ?total_size,
        supports_ranges,
        ?content_type,
        "probe complete"
    );

    Ok(ResourceMetadata {
        total_size,
        supports_ranges,
        content_type,
    })
}
