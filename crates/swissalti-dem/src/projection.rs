//! Coordinate reprojection and tile-key derivation for the swissALTI3D
//! tiling scheme.
//!
//! Callers address elevation queries in WGS84 (EPSG:4326). The dataset is
//! published in the Swiss LV95 projection (EPSG:2056), tiled into
//! 1000x1000 meter squares. A tile key is the projected coordinate pair
//! truncated to kilometers, rendered as `"2501-1120"`.

use crate::{DemError, Result};
use proj4rs::Proj;
use std::fmt;

/// Inclusive X range (meters, EPSG:2056) covered by the dataset.
pub const X_RANGE: (i32, i32) = (2_420_000, 2_900_000);

/// Inclusive Y range (meters, EPSG:2056) covered by the dataset.
pub const Y_RANGE: (i32, i32) = (1_000_000, 1_350_000);

/// Side length of one tile in dataset units (meters).
pub const TILE_EXTENT: i32 = 1000;

const WGS84_PROJ: &str = "+proj=longlat +datum=WGS84 +no_defs";

// EPSG:2056, CH1903+ / LV95 (Swiss Oblique Mercator on the Bessel ellipsoid).
const LV95_PROJ: &str = "+proj=somerc +lat_0=46.95240555555556 \
    +lon_0=7.439583333333333 +k_0=1 +x_0=2600000 +y_0=1200000 \
    +ellps=bessel +towgs84=674.374,15.056,405.346,0,0,0,0 +units=m +no_defs";

/// Check whether a projected point falls inside the dataset's coverage
/// rectangle. Both intervals are closed.
pub fn is_inside_supported_area(x: i32, y: i32) -> bool {
    x >= X_RANGE.0 && x <= X_RANGE.1 && y >= Y_RANGE.0 && y <= Y_RANGE.1
}

/// Transform from WGS84 geographic coordinates to EPSG:2056.
///
/// Construction resolves the coordinate-system definitions and can fail;
/// build one instance and reuse it. The transform itself is pure.
pub struct SwissProjection {
    wgs84: Proj,
    lv95: Proj,
}

impl fmt::Debug for SwissProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwissProjection").finish()
    }
}

impl SwissProjection {
    /// Set up the EPSG:4326 -> EPSG:2056 transform.
    pub fn new() -> Result<Self> {
        let wgs84 = Proj::from_proj_string(WGS84_PROJ)
            .map_err(|e| DemError::Reprojection(format!("EPSG:4326: {e:?}")))?;
        let lv95 = Proj::from_proj_string(LV95_PROJ)
            .map_err(|e| DemError::Reprojection(format!("EPSG:2056: {e:?}")))?;
        Ok(Self { wgs84, lv95 })
    }

    /// Project a geographic coordinate into the dataset's system,
    /// truncated to integer meters.
    pub fn project(&self, lat: f64, lon: f64) -> Result<(i32, i32)> {
        let (x, y) = self.project_f64(lat, lon)?;
        Ok((x as i32, y as i32))
    }

    /// Project without truncation. Geographic input is converted to
    /// radians as proj4rs expects; the projected output is in meters.
    pub fn project_f64(&self, lat: f64, lon: f64) -> Result<(f64, f64)> {
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        proj4rs::transform::transform(&self.wgs84, &self.lv95, &mut point)
            .map_err(|e| DemError::Reprojection(format!("({lat}, {lon}): {e:?}")))?;
        Ok((point.0, point.1))
    }
}

/// Canonical identifier of one 1000x1000 meter tile.
///
/// Two projected points belong to the same tile exactly when their keys
/// are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Projected X truncated to kilometers.
    pub x: i32,
    /// Projected Y truncated to kilometers.
    pub y: i32,
}

impl TileKey {
    /// Key of the tile containing a projected point.
    pub fn containing(x: i32, y: i32) -> Self {
        Self {
            x: x / TILE_EXTENT,
            y: y / TILE_EXTENT,
        }
    }
}

impl fmt::Display for TileKey {
    /// Renders the key the way the tile listing encodes it, e.g. `2501-1120`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_supported_area_corners() {
        // Lower corner is inclusive
        assert!(is_inside_supported_area(2_420_000, 1_000_000));
        assert!(!is_inside_supported_area(2_419_999, 1_000_000));
        // Upper corner is inclusive
        assert!(is_inside_supported_area(2_900_000, 1_350_000));
        assert!(!is_inside_supported_area(2_900_001, 1_350_000));
        assert!(!is_inside_supported_area(2_500_000, 1_350_001));
    }

    #[test]
    fn test_tile_key_containing() {
        let key = TileKey::containing(2_501_970, 1_120_492);
        assert_eq!(key, TileKey { x: 2501, y: 1120 });
        assert_eq!(key.to_string(), "2501-1120");

        // All points inside the same kilometer square share a key
        assert_eq!(
            TileKey::containing(2_501_000, 1_120_000),
            TileKey::containing(2_501_999, 1_120_999)
        );
        assert_ne!(
            TileKey::containing(2_501_000, 1_120_000),
            TileKey::containing(2_502_000, 1_120_000)
        );
    }

    #[test]
    fn test_project_dent_de_morcles() {
        // echo "2571970 1116492" | gdaltransform -t_srs EPSG:4326 -s_srs EPSG:2056
        // -> 7.07552341505788 46.1992990818056
        let projection = SwissProjection::new().expect("projection setup");
        let (x, y) = projection
            .project_f64(46.1992990818056, 7.07552341505788)
            .expect("transform");

        // The seven-parameter datum shift reproduces the reference point
        // to within a couple of meters.
        assert_relative_eq!(x, 2_571_970.0, epsilon = 2.0);
        assert_relative_eq!(y, 1_116_492.0, epsilon = 2.0);
    }

    #[test]
    fn test_project_truncates() {
        let projection = SwissProjection::new().expect("projection setup");
        let (fx, fy) = projection
            .project_f64(46.1992990818056, 7.07552341505788)
            .expect("transform");
        let (x, y) = projection
            .project(46.1992990818056, 7.07552341505788)
            .expect("transform");
        assert_eq!(x, fx as i32);
        assert_eq!(y, fy as i32);
    }
}
