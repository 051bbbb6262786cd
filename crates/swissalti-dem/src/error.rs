//! Error types for the swissALTI3D elevation provider.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when resolving elevation data.
#[derive(Debug, Error)]
pub enum DemError {
    /// I/O error reading or writing a cached file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error (corrupt or truncated tile file).
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// HTTP request error when fetching the tile listing or a tile.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The coordinate systems could not be set up or a point could not
    /// be transformed between them.
    #[error("reprojection error: {0}")]
    Reprojection(String),

    /// The remote tile listing could not be fetched or parsed. All
    /// queries for tiles not already cached degrade to "no data".
    #[error("tile index unavailable: {reason}")]
    IndexUnavailable {
        /// Reason for failure.
        reason: String,
    },

    /// Failed to download a tile from the remote server.
    #[error("failed to download tile {key}: {reason}")]
    TileDownloadFailed {
        /// Tile key of the failed download.
        key: String,
        /// Reason for failure.
        reason: String,
    },

    /// The tile index has no entry for this key (no tile covers the point).
    #[error("no tile found for key {key}")]
    NoTileFound {
        /// Requested tile key.
        key: String,
    },

    /// A tile URL from the listing has no usable filename component.
    #[error("invalid tile URL: {0}")]
    InvalidTileUrl(String),

    /// Pixel coordinate falls outside the decoded raster.
    #[error("pixel ({px}, {py}) outside raster of {width}x{height}")]
    PixelOutOfBounds {
        /// Requested pixel column.
        px: u32,
        /// Requested pixel row.
        py: u32,
        /// Raster width in pixels.
        width: u32,
        /// Raster height in pixels.
        height: u32,
    },

    /// The configured cache path exists but is not a directory.
    #[error("cache path {0:?} is not a directory")]
    CacheDirNotADirectory(PathBuf),

    /// Cache lock was poisoned (a thread panicked while holding the lock).
    #[error("cache lock was poisoned")]
    CacheLockPoisoned,
}
