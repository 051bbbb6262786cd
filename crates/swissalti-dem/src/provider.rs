//! Elevation provider orchestration and within-tile sampling.

use crate::download::{Downloader, HttpDownloader};
use crate::projection::{is_inside_supported_area, SwissProjection, TileKey, TILE_EXTENT};
use crate::raster::{TileRaster, METERS_PER_PIXEL, PIXELS_PER_TILE};
use crate::swisstopo::{TileIndex, TileStore};
use crate::{DemError, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Maximum number of decoded rasters held in memory before the cache is
/// flushed wholesale.
const MAX_RESIDENT_RASTERS: usize = 100;

/// Common contract for elevation datasets.
///
/// A provider answers point queries against one dataset; implementations
/// differ in coverage and sampling behavior but share this surface.
pub trait ElevationProvider: fmt::Display {
    /// Whether the provider interpolates between samples.
    fn can_interpolate(&self) -> bool;

    /// Ground elevation in meters at a WGS84 coordinate.
    ///
    /// Returns `0.0` for points outside the dataset's coverage or when
    /// the data could not be retrieved; per-query failures are logged,
    /// never raised.
    fn elevation(&self, lat: f64, lon: f64) -> f64;

    /// Release owned resources.
    fn release(&mut self);
}

/// Within-tile pixel indices for a projected point.
///
/// Tiles are stored north to south, so the row axis is inverted relative
/// to the northward projected Y axis. `rem_euclid` keeps the offsets
/// non-negative for any input, not just this dataset's positive range.
fn pixel_indices(x: i32, y: i32) -> (u32, u32) {
    let px = x.rem_euclid(TILE_EXTENT) / METERS_PER_PIXEL;
    let py = (PIXELS_PER_TILE as i32 - 1) - y.rem_euclid(TILE_EXTENT) / METERS_PER_PIXEL;
    (px as u32, py as u32)
}

/// In-memory cache of decoded rasters.
///
/// Memory is bounded with minimal bookkeeping: once the cache holds more
/// than [`MAX_RESIDENT_RASTERS`] entries it is cleared wholesale before
/// the next insert. This trades periodic cold bursts for not tracking
/// access order; entry count never grows without bound.
struct RasterCache {
    rasters: HashMap<TileKey, Arc<TileRaster>>,
}

impl RasterCache {
    fn new() -> Self {
        Self {
            rasters: HashMap::new(),
        }
    }

    fn get(&self, key: &TileKey) -> Option<Arc<TileRaster>> {
        self.rasters.get(key).cloned()
    }

    fn insert(&mut self, key: TileKey, raster: Arc<TileRaster>) {
        if self.rasters.len() > MAX_RESIDENT_RASTERS {
            debug!("clearing in-memory raster cache");
            self.rasters.clear();
        }
        self.rasters.insert(key, raster);
    }

    fn len(&self) -> usize {
        self.rasters.len()
    }
}

/// Elevation provider for the swisstopo swissALTI3D dataset.
///
/// Tiles are fetched on demand, persisted under the cache directory and
/// kept decoded in a bounded in-memory cache. One instance owns its tile
/// index and caches; it can be shared across threads.
pub struct SwissAlti3dProvider {
    projection: SwissProjection,
    index: TileIndex,
    store: TileStore,
    rasters: Mutex<RasterCache>,
    cache_dir: PathBuf,
    auto_remove_cache: bool,
}

impl fmt::Debug for SwissAlti3dProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwissAlti3dProvider")
            .field("cache_dir", &self.cache_dir)
            .field("auto_remove_cache", &self.auto_remove_cache)
            .finish()
    }
}

impl SwissAlti3dProvider {
    /// Create a provider caching under the given directory. An empty
    /// path selects [`Self::default_cache_dir`].
    ///
    /// Fails if the coordinate systems cannot be set up or the cache
    /// path exists and is not a directory.
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        let downloader = Arc::new(HttpDownloader::new()?);
        Self::with_downloader(cache_dir, downloader)
    }

    /// Create a provider with an injected download capability.
    pub fn with_downloader<P: AsRef<Path>>(
        cache_dir: P,
        downloader: Arc<dyn Downloader>,
    ) -> Result<Self> {
        let cache_dir = cache_dir.as_ref();
        let cache_dir = if cache_dir.as_os_str().is_empty() {
            Self::default_cache_dir()
        } else {
            cache_dir.to_path_buf()
        };
        if cache_dir.exists() && !cache_dir.is_dir() {
            return Err(DemError::CacheDirNotADirectory(cache_dir));
        }

        Ok(Self {
            projection: SwissProjection::new()?,
            index: TileIndex::new(cache_dir.clone(), downloader.clone()),
            store: TileStore::new(cache_dir.clone(), downloader),
            rasters: Mutex::new(RasterCache::new()),
            cache_dir,
            auto_remove_cache: false,
        })
    }

    /// Default cache location under the system temp directory.
    pub fn default_cache_dir() -> PathBuf {
        std::env::temp_dir().join("swissalti3d")
    }

    /// Remove the cache directory when the provider is released.
    pub fn with_auto_remove_cache(mut self, remove: bool) -> Self {
        self.auto_remove_cache = remove;
        self
    }

    /// Directory tile files and the listing are cached under.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Number of decoded rasters currently held in memory.
    pub fn resident_raster_count(&self) -> usize {
        self.rasters.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Decoded raster for the tile containing a projected point,
    /// fetching and decoding on a cache miss.
    ///
    /// The decode happens outside the cache lock; two racing misses for
    /// one key may decode twice, the second insert simply wins.
    fn raster_containing(&self, key: TileKey) -> Result<Arc<TileRaster>> {
        {
            let cache = self.rasters.lock().map_err(|_| DemError::CacheLockPoisoned)?;
            if let Some(raster) = cache.get(&key) {
                return Ok(raster);
            }
        }

        let tile_url = self
            .index
            .url_for(&key)?
            .ok_or_else(|| DemError::NoTileFound {
                key: key.to_string(),
            })?;
        let path = self.store.ensure_local(&key, &tile_url)?;
        let raster = Arc::new(TileRaster::from_file(&path)?);

        let mut cache = self.rasters.lock().map_err(|_| DemError::CacheLockPoisoned)?;
        cache.insert(key, raster.clone());
        Ok(raster)
    }

    /// Sample the elevation at a projected point.
    fn sample_projected(&self, x: i32, y: i32) -> Result<f32> {
        let key = TileKey::containing(x, y);
        let raster = self.raster_containing(key)?;
        let (px, py) = pixel_indices(x, y);
        raster.sample(px, py)
    }
}

impl ElevationProvider for SwissAlti3dProvider {
    fn can_interpolate(&self) -> bool {
        false
    }

    fn elevation(&self, lat: f64, lon: f64) -> f64 {
        let (x, y) = match self.projection.project(lat, lon) {
            Ok(point) => point,
            Err(e) => {
                warn!(lat, lon, error = %e, "could not project coordinate");
                return 0.0;
            }
        };

        if !is_inside_supported_area(x, y) {
            return 0.0;
        }

        // The zero return deliberately conflates "outside coverage",
        // "tile unavailable" and a genuine sea-level sample; callers
        // that need to tell these apart cannot use this surface.
        match self.sample_projected(x, y) {
            Ok(elevation) => f64::from(elevation),
            Err(e) => {
                warn!(x, y, error = %e, "could not get raster data");
                0.0
            }
        }
    }

    fn release(&mut self) {
        if self.auto_remove_cache && self.cache_dir.exists() {
            debug!(cache_dir = %self.cache_dir.display(), "removing elevation cache directory");
            if let Err(e) = fs::remove_dir_all(&self.cache_dir) {
                warn!(error = %e, "could not remove cache directory");
            }
        }
    }
}

impl fmt::Display for SwissAlti3dProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("swissalti3d")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::testing::FailingDownloader;

    #[test]
    fn test_pixel_indices() {
        // x mod 1000 = 970 -> px 485; y mod 1000 = 492 -> py 499 - 246 = 253
        let (px, py) = pixel_indices(2_501_970, 1_120_492);
        assert_eq!(px, 485);
        assert_eq!(py, 253);

        // Tile corners
        assert_eq!(pixel_indices(2_501_000, 1_120_000), (0, 499));
        assert_eq!(pixel_indices(2_501_999, 1_120_999), (499, 0));
    }

    #[test]
    fn test_pixel_indices_negative_coordinates() {
        // The modulus must be mathematical, not a truncating remainder.
        assert_eq!(pixel_indices(-30, -508), (485, 253));
    }

    #[test]
    fn test_raster_cache_flushes_at_bound() {
        let mut cache = RasterCache::new();
        let raster = Arc::new(TileRaster::from_samples(vec![0.0], 1, 1));

        for x in 0..101 {
            cache.insert(TileKey { x, y: 0 }, raster.clone());
        }
        // 101 entries fit; the flush only happens once the count exceeds
        // the bound at the next insert.
        assert_eq!(cache.len(), 101);

        cache.insert(TileKey { x: 101, y: 0 }, raster.clone());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&TileKey { x: 101, y: 0 }).is_some());
        assert!(cache.get(&TileKey { x: 0, y: 0 }).is_none());
    }

    #[test]
    fn test_elevation_outside_coverage_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            SwissAlti3dProvider::with_downloader(dir.path(), Arc::new(FailingDownloader))
                .expect("provider setup");

        // Far outside Switzerland; must not touch the network at all.
        assert_eq!(provider.elevation(60.000_000_1, 16.0), 0.0);
    }

    #[test]
    fn test_elevation_degrades_to_zero_when_index_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            SwissAlti3dProvider::with_downloader(dir.path(), Arc::new(FailingDownloader))
                .expect("provider setup");

        // Inside coverage, but the listing fetch fails: the query
        // degrades instead of raising.
        assert_eq!(provider.elevation(46.1992990818056, 7.07552341505788), 0.0);
    }

    #[test]
    fn test_empty_cache_path_defaults_to_temp() {
        let provider = SwissAlti3dProvider::with_downloader("", Arc::new(FailingDownloader))
            .expect("provider setup");
        assert_eq!(
            provider.cache_dir(),
            std::env::temp_dir().join("swissalti3d")
        );
    }

    #[test]
    fn test_cache_path_must_be_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("occupied");
        std::fs::write(&file_path, b"x").unwrap();

        let err = SwissAlti3dProvider::with_downloader(&file_path, Arc::new(FailingDownloader))
            .unwrap_err();
        assert!(matches!(err, DemError::CacheDirNotADirectory(_)));
    }

    #[test]
    fn test_release_removes_cache_when_configured() {
        let root = tempfile::tempdir().unwrap();
        let cache_dir = root.path().join("swissalti3d");
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::write(cache_dir.join("mappings.csv"), b"").unwrap();

        let mut provider =
            SwissAlti3dProvider::with_downloader(&cache_dir, Arc::new(FailingDownloader))
                .expect("provider setup")
                .with_auto_remove_cache(true);
        provider.release();
        assert!(!cache_dir.exists());

        // Default keeps the cache.
        let keep_dir = root.path().join("kept");
        std::fs::create_dir_all(&keep_dir).unwrap();
        let mut provider =
            SwissAlti3dProvider::with_downloader(&keep_dir, Arc::new(FailingDownloader))
                .expect("provider setup");
        provider.release();
        assert!(keep_dir.exists());
    }

    #[test]
    fn test_provider_surface() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            SwissAlti3dProvider::with_downloader(dir.path(), Arc::new(FailingDownloader))
                .expect("provider setup");
        assert!(!provider.can_interpolate());
        assert_eq!(provider.to_string(), "swissalti3d");
    }
}
