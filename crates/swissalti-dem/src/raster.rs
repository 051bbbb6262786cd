//! Decoded elevation raster for one tile.

use crate::{DemError, Result};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};

/// Pixels per tile side; 500 pixels cover 1000 meters at the dataset's
/// 2 meter resolution.
pub const PIXELS_PER_TILE: u32 = 500;

/// Dataset resolution in meters per pixel.
pub const METERS_PER_PIXEL: i32 = 2;

/// A decoded raster grid of elevation samples for one tile.
///
/// Rows are stored north to south, matching the file layout. The dataset
/// carries a single band (band 0) holding elevation in meters.
#[derive(Debug)]
pub struct TileRaster {
    /// Elevation samples in row-major order.
    data: Vec<f32>,
    /// Width of the raster in pixels.
    width: u32,
    /// Height of the raster in pixels.
    height: u32,
}

impl TileRaster {
    /// Decode a tile file into an in-memory raster.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut decoder = Decoder::new(file)?;

        // 500x500 f32 tiles are ~1 MB decoded; leave headroom for
        // uncompressed strips and oversized metadata.
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 64 * 1024 * 1024;
        limits.intermediate_buffer_size = 64 * 1024 * 1024;
        limits.ifd_value_size = 64 * 1024 * 1024;
        decoder = decoder.with_limits(limits);

        let (width, height) = decoder.dimensions()?;
        let data = Self::decode_samples(&mut decoder)?;

        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Decode elevation samples from the TIFF decoder.
    fn decode_samples<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
    ) -> Result<Vec<f32>> {
        let result = decoder.read_image()?;

        match result {
            DecodingResult::F32(data) => Ok(data),
            DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        }
    }

    /// Elevation sample at a pixel coordinate, band 0.
    pub fn sample(&self, px: u32, py: u32) -> Result<f32> {
        if px >= self.width || py >= self.height {
            return Err(DemError::PixelOutOfBounds {
                px,
                py,
                width: self.width,
                height: self.height,
            });
        }
        Ok(self.data[(py * self.width + px) as usize])
    }

    /// Raster dimensions in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[cfg(test)]
    pub(crate) fn from_samples(data: Vec<f32>, width: u32, height: u32) -> Self {
        assert_eq!(data.len(), (width * height) as usize);
        Self {
            data,
            width,
            height,
        }
    }
}
