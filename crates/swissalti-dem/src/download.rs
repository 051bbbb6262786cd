//! Bulk HTTP retrieval capability.
//!
//! The provider only needs two operations: fetch a URL as text and fetch
//! a URL into a local file. They are behind a trait so tests can inject
//! canned payloads instead of hitting the swisstopo servers.

use crate::Result;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Network timeout applied to every listing and tile request.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Bulk HTTP retrieval.
///
/// Failures surface as errors; implementations must never leave partial
/// results behind a successful return.
pub trait Downloader: Send + Sync {
    /// Fetch a URL and return the response body as text.
    fn fetch_text(&self, url: &str) -> Result<String>;

    /// Fetch a URL and write the response body to `path`.
    fn fetch_to_file(&self, url: &str, path: &Path) -> Result<()>;
}

/// Default downloader backed by a blocking reqwest client.
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    /// Build a client with the fixed download timeout.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.text()?)
    }

    fn fetch_to_file(&self, url: &str, path: &Path) -> Result<()> {
        let response = self.client.get(url).send()?.error_for_status()?;
        let bytes = response.bytes()?;
        let mut file = fs::File::create(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }
}
