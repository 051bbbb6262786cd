//! Remote access to the swisstopo swissALTI3D dataset.
//!
//! The dataset is published as one cloud-optimized GeoTIFF per
//! 1000x1000 meter tile, with URLs that embed the capture year and can
//! not be derived from the tile key alone. A search endpoint returns a
//! short JSON document pointing at a CSV listing of every tile URL; the
//! [`TileIndex`] fetches that listing once and builds the key -> URL
//! mapping in memory. The [`TileStore`] materializes individual tiles on
//! local storage, downloading each at most once.
//!
//! ## Thread safety
//!
//! Both types can be shared across threads:
//! - The index's first fetch happens at most once per populated process,
//!   guarded by a single mutex.
//! - Multiple threads requesting the same tile will coordinate, with
//!   only one performing the download while others wait.
//! - Tile files are downloaded to a scratch path and published with an
//!   atomic rename, so a partially written tile is never observable.

use crate::download::Downloader;
use crate::projection::TileKey;
use crate::{DemError, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use tracing::debug;

/// Search endpoint returning the CSV listing URL for the whole dataset.
const TILING_SCHEME_URL: &str = "https://ogd.swisstopo.admin.ch/services/swiseld/services/assets/ch.swisstopo.swissalti3d/search?format=image/tiff;%20application=geotiff;%20profile=cloud-optimized&resolution=2.0&srid=2056&state=current&csv=true";

/// Local filename of the cached CSV listing.
const LISTING_FILENAME: &str = "mappings.csv";

/// Lazily fetched mapping from tile key to download URL.
pub struct TileIndex {
    cache_dir: PathBuf,
    downloader: Arc<dyn Downloader>,
    entries: Mutex<Option<HashMap<String, String>>>,
}

impl TileIndex {
    /// Create an index over the given cache directory. Nothing is
    /// fetched until the first lookup.
    pub fn new(cache_dir: PathBuf, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            cache_dir,
            downloader,
            entries: Mutex::new(None),
        }
    }

    /// Resolve the download URL for a tile key, fetching and parsing the
    /// listing on first use. Returns `None` when no tile exists for the
    /// key (open water, foreign territory).
    pub fn url_for(&self, key: &TileKey) -> Result<Option<String>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DemError::CacheLockPoisoned)?;

        if entries.is_none() {
            let mapping = self.fetch_mapping().map_err(|e| DemError::IndexUnavailable {
                reason: e.to_string(),
            })?;
            debug!(tiles = mapping.len(), "tile index loaded");
            *entries = Some(mapping);
        }

        Ok(entries
            .as_ref()
            .and_then(|mapping| mapping.get(&key.to_string()))
            .cloned())
    }

    /// Fetch the CSV listing (or reuse the cached copy) and parse it
    /// into the key -> URL mapping.
    fn fetch_mapping(&self) -> Result<HashMap<String, String>> {
        let listing_path = self.cache_dir.join(LISTING_FILENAME);
        if !listing_path.exists() {
            fs::create_dir_all(&self.cache_dir)?;
            let response = self.downloader.fetch_text(TILING_SCHEME_URL)?;
            let csv_url = parse_listing_href(&response)?;
            debug!(url = %csv_url, "fetching tile listing");
            self.downloader.fetch_to_file(&csv_url, &listing_path)?;
        }

        let csv = fs::read_to_string(&listing_path)?;
        Ok(parse_tile_listing(&csv))
    }
}

/// Extract the CSV URL from the search response, e.g.
/// `{"href":"https://ogd.swisstopo.admin.ch/resources/ch.swisstopo.swissalti3d-9u0iezRG.csv"}`.
fn parse_listing_href(response: &str) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(response).map_err(|e| DemError::IndexUnavailable {
            reason: format!("listing response is not JSON: {e}"),
        })?;
    value
        .get("href")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| DemError::IndexUnavailable {
            reason: "listing response has no href".to_string(),
        })
}

/// Build the key -> URL mapping from the CSV listing. Each line is one
/// tile URL whose filename embeds the key as the third
/// underscore-separated element, e.g.
/// `.../swissalti3d_2019_2501-1120_2_2056_5728.tif`.
fn parse_tile_listing(csv: &str) -> HashMap<String, String> {
    let mut mapping = HashMap::new();
    for line in csv.lines() {
        let line = line.trim();
        let Some((_, filename)) = line.rsplit_once('/') else {
            continue;
        };
        if let Some(key) = filename.split('_').nth(2) {
            mapping.insert(key.to_string(), line.to_string());
        }
    }
    mapping
}

/// Tracks in-flight downloads to prevent duplicate requests.
///
/// A key is present only while a thread is downloading its tile; the
/// downloading thread removes its own entry once the outcome is
/// published, so the set is empty whenever the store is at rest.
struct DownloadTracker {
    in_flight: HashSet<TileKey>,
}

impl DownloadTracker {
    fn new() -> Self {
        Self {
            in_flight: HashSet::new(),
        }
    }
}

/// Ensures tile files exist on local storage, downloading on first
/// access and reusing thereafter.
pub struct TileStore {
    cache_dir: PathBuf,
    downloader: Arc<dyn Downloader>,
    /// Tracks which tiles are currently being downloaded.
    tracker: Mutex<DownloadTracker>,
    /// Condition variable for waiting on downloads.
    download_complete: Condvar,
}

impl TileStore {
    /// Create a store rooted at the given cache directory.
    pub fn new(cache_dir: PathBuf, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            cache_dir,
            downloader,
            tracker: Mutex::new(DownloadTracker::new()),
            download_complete: Condvar::new(),
        }
    }

    /// Local path a tile URL is cached at: the URL's final path segment
    /// inside the cache directory.
    pub fn cached_tile_path(&self, tile_url: &str) -> Result<PathBuf> {
        let filename = tile_url
            .rsplit_once('/')
            .map(|(_, segment)| segment)
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| DemError::InvalidTileUrl(tile_url.to_string()))?;
        Ok(self.cache_dir.join(filename))
    }

    /// Ensure the tile file exists locally and return its path.
    ///
    /// If multiple threads request the same tile, the first performs the
    /// download while the others wait; different tiles download
    /// concurrently. A waiter woken after a successful download finds
    /// the file on disk and returns it without a second download; after
    /// a failed download the tile is simply absent again, so the next
    /// caller starts a fresh attempt instead of being served a stale
    /// error. A second call for an already cached tile touches neither
    /// the network nor any lock beyond the existence check.
    pub fn ensure_local(&self, key: &TileKey, tile_url: &str) -> Result<PathBuf> {
        let cache_path = self.cached_tile_path(tile_url)?;

        // Fast path: already on disk.
        if cache_path.exists() {
            return Ok(cache_path);
        }

        loop {
            let mut tracker = self.tracker.lock().map_err(|_| DemError::CacheLockPoisoned)?;

            if tracker.in_flight.contains(key) {
                // Another thread is downloading this tile; wait and re-check.
                let _tracker = self
                    .download_complete
                    .wait(tracker)
                    .map_err(|_| DemError::CacheLockPoisoned)?;
                continue;
            }

            // Might have been downloaded while we waited.
            if cache_path.exists() {
                return Ok(cache_path);
            }
            tracker.in_flight.insert(*key);
            break;
        }

        // We are responsible for downloading this tile.
        let result = self.download_to(key, tile_url, &cache_path);

        {
            let mut tracker = self.tracker.lock().map_err(|_| DemError::CacheLockPoisoned)?;
            tracker.in_flight.remove(key);
        }
        self.download_complete.notify_all();

        result.map(|()| cache_path)
    }

    /// Download a tile to a scratch path and publish it with an atomic
    /// rename, so a crash mid-download never leaves a partial file at
    /// the final path.
    fn download_to(&self, key: &TileKey, tile_url: &str, cache_path: &Path) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;

        let part_path = cache_path.with_extension("part");
        debug!(key = %key, url = tile_url, "downloading tile");
        self.downloader
            .fetch_to_file(tile_url, &part_path)
            .map_err(|e| DemError::TileDownloadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        fs::rename(&part_path, cache_path)?;
        Ok(())
    }
}
