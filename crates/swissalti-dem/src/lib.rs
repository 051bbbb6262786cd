//! # swissalti-dem
//!
//! Elevation provider for the swisstopo swissALTI3D dataset, open data
//! available from <https://www.swisstopo.admin.ch/en/geodata/height/alti3d.html>.
//!
//! The dataset covers Switzerland as cloud-optimized GeoTIFF tiles of
//! 1000x1000 meters at 2 meter resolution (500x500 pixels per tile) in
//! the EPSG:2056 projection. It is far too large to ship wholesale, so
//! this crate fetches only the tiles a query actually needs:
//!
//! 1. The queried WGS84 coordinate is reprojected to EPSG:2056 and
//!    checked against the dataset's coverage rectangle.
//! 2. The tile key (projected coordinates truncated to kilometers) is
//!    resolved to a download URL through a lazily fetched tile listing.
//! 3. The tile file is downloaded once and persisted under a cache
//!    directory; decoded rasters are kept in a bounded in-memory cache.
//!
//! ## Example
//!
//! ```no_run
//! use swissalti_dem::{ElevationProvider, SwissAlti3dProvider};
//!
//! let provider = SwissAlti3dProvider::new(SwissAlti3dProvider::default_cache_dir())?;
//!
//! // Dent de Morcles, ~2969 m
//! let elevation = provider.elevation(46.1992990818056, 7.07552341505788);
//! println!("Elevation: {} meters", elevation);
//! # Ok::<(), swissalti_dem::DemError>(())
//! ```
//!
//! Queries outside the dataset's coverage, and queries whose tile cannot
//! be fetched or decoded, return `0.0` (the failure is logged via
//! `tracing`). Construction fails instead if the coordinate systems
//! themselves cannot be set up.

mod download;
mod error;
mod projection;
mod provider;
mod raster;
mod swisstopo;

pub use download::{Downloader, HttpDownloader, DOWNLOAD_TIMEOUT};
pub use error::DemError;
pub use projection::{
    is_inside_supported_area, SwissProjection, TileKey, TILE_EXTENT, X_RANGE, Y_RANGE,
};
pub use provider::{ElevationProvider, SwissAlti3dProvider};
pub use raster::{TileRaster, METERS_PER_PIXEL, PIXELS_PER_TILE};
pub use swisstopo::{TileIndex, TileStore};

/// Result type for elevation operations.
pub type Result<T> = std::result::Result<T, DemError>;
