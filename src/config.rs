//! Network configuration shared across a download run.
//!
//! Constructed once by the caller and passed by reference into the
//! coordinator; never mutated mid-run.

use crate::error::DownloadError;
use std::time::Duration;

/// Process-wide network defaults: identity, proxying, and the concurrency
/// ceiling for segment dispatch.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// User agent sent with every request.
    pub user_agent: String,
    /// Optional proxy URL (e.g. `http://proxy.example.com:8080`) applied to
    /// all requests.
    pub proxy: Option<String>,
    /// Protocol prefix used by [`NetConfig::build_url`] (e.g. `https://`).
    pub protocol: String,
    /// Preferred hosts, first entry wins. Used by [`NetConfig::build_url`]
    /// for callers that address resources by path.
    pub hosts: Vec<String>,
    /// Maximum number of segments fetched in parallel (default: 8).
    /// Segment fetches are I/O-bound, so this is bounded by bandwidth
    /// rather than CPU cores.
    pub max_concurrent_segments: usize,
    /// Connect timeout applied to the HTTP client.
    pub connect_timeout: Duration,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("rangefetch/", env!("CARGO_PKG_VERSION")).to_string(),
            proxy: None,
            protocol: "https://".to_string(),
            hosts: Vec::new(),
            max_concurrent_segments: 8,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl NetConfig {
    /// Builds a complete URL from a path, the first available host, and the
    /// configured protocol. Returns `None` when no host is configured.
    pub fn build_url(&self, path: &str) -> Option<String> {
        self.hosts
            .first()
            .map(|host| format!("{}{}{}", self.protocol, host, path))
    }

    /// Constructs the HTTP client used for one coordinator run.
    pub fn build_client(&self) -> Result<reqwest::Client, DownloadError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .connect_timeout(self.connect_timeout);

        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(builder.build()?)
    }
}
