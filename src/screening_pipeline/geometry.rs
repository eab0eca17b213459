//! Geometric normalization: center-crop then resize to the classifier's
//! square input.

use image::RgbImage;
use image::imageops::{self, FilterType};
use tracing::debug;

use crate::screening_pipeline::common::error::{PipelineError, Result};
use crate::screening_pipeline::decode::PixelGrid;

/// Crops a grid to its centered square and scales it to `size × size`.
///
/// Cropping before scaling keeps the aspect ratio of lesions intact. Scaling
/// uses bilinear (triangle) interpolation and upscales small inputs.
#[derive(Debug, Clone, Copy)]
pub struct GeometricNormalizer {
    size: usize,
}

impl GeometricNormalizer {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn apply(&self, grid: &PixelGrid) -> Result<PixelGrid> {
        let (width, height) = (grid.width(), grid.height());
        if width == 0 || height == 0 || self.size == 0 {
            return Err(PipelineError::ShapeError(format!(
                "cannot resize {}x{} to {}x{}",
                width, height, self.size, self.size
            )));
        }

        let rgb = grid.clone().into_rgb();
        if rgb.is_square_rgb(self.size) {
            return Ok(rgb);
        }

        let buffer = RgbImage::from_raw(width as u32, height as u32, rgb.into_data())
            .ok_or_else(|| PipelineError::ShapeError(format!("pixel buffer does not fit {}x{}", width, height)))?;

        let side = width.min(height);
        let x = (width - side) / 2;
        let y = (height - side) / 2;
        debug!(width, height, side, x, y, target = self.size, "Center crop");

        let cropped = imageops::crop_imm(&buffer, x as u32, y as u32, side as u32, side as u32).to_image();
        let resized = if side == self.size {
            cropped
        } else {
            imageops::resize(&cropped, self.size as u32, self.size as u32, FilterType::Triangle)
        };

        let out = PixelGrid::from_raw(self.size, self.size, 3, resized.into_raw())?;
        if !out.is_square_rgb(self.size) {
            return Err(PipelineError::ShapeError(format!(
                "resize produced {}x{}, expected {}x{}",
                out.width(),
                out.height(),
                self.size,
                self.size
            )));
        }
        Ok(out)
    }
}
