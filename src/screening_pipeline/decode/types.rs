//! Captured image and decoded pixel types

use std::path::Path;

use tracing::warn;

use crate::screening_pipeline::common::error::{PipelineError, Result};

/// Sample value used for any pixel the decoder could not recover.
///
/// A grid padded with this value is black, which the classifier sees as
/// "no information" rather than a fabricated texture.
pub const FALLBACK_FILL: u8 = 0;

/// Largest pixel count any decoder will allocate for, about 64 megapixels.
///
/// Checked against the header before decoding or filling, so a forged header
/// cannot force a multi-gigabyte allocation.
pub const MAX_DECODED_PIXELS: usize = 64 * 1024 * 1024;

/// Rejects header dimensions whose decoded grid would exceed
/// [`MAX_DECODED_PIXELS`].
pub fn check_pixel_budget(width: usize, height: usize) -> Result<()> {
    match width.checked_mul(height) {
        Some(pixels) if pixels <= MAX_DECODED_PIXELS => Ok(()),
        _ => {
            warn!(width, height, max_pixels = MAX_DECODED_PIXELS, "Header dimensions exceed decode budget");
            Err(PipelineError::InvalidDimensions(width, height))
        }
    }
}

/// Declared encoding of a captured photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Jpeg,
    Png,
    Tiff,
    /// Camera sensor dump (DNG, ARW, CR2, NEF, ...)
    CameraRaw,
}

impl ImageEncoding {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageEncoding::Jpeg),
            "png" => Some(ImageEncoding::Png),
            "tif" | "tiff" => Some(ImageEncoding::Tiff),
            "dng" | "arw" | "cr2" | "nef" | "raf" | "orf" | "rw2" => Some(ImageEncoding::CameraRaw),
            _ => None,
        }
    }
}

/// Photo bytes as handed over by the capture or picker collaborator.
#[derive(Debug, Clone)]
pub struct RawImage {
    bytes: Vec<u8>,
    encoding: ImageEncoding,
    source: String,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>, encoding: ImageEncoding, source: impl Into<String>) -> Self {
        Self {
            bytes,
            encoding,
            source: source.into(),
        }
    }

    /// Reads a photo from disk, inferring its encoding from the extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let encoding = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageEncoding::from_extension)
            .ok_or_else(|| PipelineError::UnsupportedFormat(path.display().to_string()))?;

        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::InputReadError(format!("{}: {}", path.display(), e))
        })?;

        Ok(Self::new(bytes, encoding, path.display().to_string()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encoding(&self) -> ImageEncoding {
        self.encoding
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Dense grid of 8-bit samples, row-major with interleaved channels.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    width: usize,
    height: usize,
    /// 3 for RGB, 4 for RGBA (alpha is ignored downstream)
    channels: usize,
    data: Vec<u8>,
}

impl PixelGrid {
    /// Builds a grid from decoded samples.
    ///
    /// A buffer shorter than `width * height * channels` is padded with
    /// [`FALLBACK_FILL`]; a longer one is truncated. Both cases are logged.
    pub fn from_raw(width: usize, height: usize, channels: usize, mut data: Vec<u8>) -> Result<Self> {
        if channels != 3 && channels != 4 {
            return Err(PipelineError::ShapeError(format!(
                "pixel grids carry 3 or 4 channels, got {}",
                channels
            )));
        }

        let expected = width * height * channels;
        if data.len() < expected {
            warn!(
                expected,
                actual = data.len(),
                "Pixel buffer shorter than its dimensions, padding with fallback fill"
            );
            data.resize(expected, FALLBACK_FILL);
        } else if data.len() > expected {
            warn!(expected, actual = data.len(), "Pixel buffer longer than its dimensions, truncating");
            data.truncate(expected);
        }

        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// RGB grid where every sample is `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            channels: 3,
            data: vec![value; width * height * 3],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn rgb_at(&self, x: usize, y: usize) -> [u8; 3] {
        let offset = (y * self.width + x) * self.channels;
        [self.data[offset], self.data[offset + 1], self.data[offset + 2]]
    }

    /// Drops the alpha channel, if any.
    pub fn into_rgb(self) -> Self {
        if self.channels == 3 {
            return self;
        }
        let data = self
            .data
            .chunks_exact(self.channels)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        Self {
            width: self.width,
            height: self.height,
            channels: 3,
            data,
        }
    }

    pub fn is_square_rgb(&self, size: usize) -> bool {
        self.width == size && self.height == size && self.channels == 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_buffer_is_padded_with_fallback() {
        let grid = PixelGrid::from_raw(2, 2, 3, vec![200; 9]).unwrap();
        assert_eq!(grid.data().len(), 12);
        assert_eq!(grid.rgb_at(0, 0), [200, 200, 200]);
        assert_eq!(grid.rgb_at(1, 1), [FALLBACK_FILL; 3]);
    }

    #[test]
    fn long_buffer_is_truncated() {
        let grid = PixelGrid::from_raw(1, 1, 3, vec![1, 2, 3, 4, 5]).unwrap();
        assert_eq!(grid.data(), &[1, 2, 3]);
    }

    #[test]
    fn rejects_unsupported_channel_count() {
        let err = PixelGrid::from_raw(1, 1, 2, vec![0, 0]).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeError(_)));
    }

    #[test]
    fn alpha_is_dropped() {
        let grid = PixelGrid::from_raw(2, 1, 4, vec![1, 2, 3, 255, 4, 5, 6, 0]).unwrap();
        let rgb = grid.into_rgb();
        assert_eq!(rgb.channels(), 3);
        assert_eq!(rgb.data(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn encoding_from_extension() {
        assert_eq!(ImageEncoding::from_extension("JPG"), Some(ImageEncoding::Jpeg));
        assert_eq!(ImageEncoding::from_extension("tif"), Some(ImageEncoding::Tiff));
        assert_eq!(ImageEncoding::from_extension("dng"), Some(ImageEncoding::CameraRaw));
        assert_eq!(ImageEncoding::from_extension("heic"), None);
    }

    #[test]
    fn from_file_rejects_unknown_extension() {
        let err = RawImage::from_file("photo.heic").unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
    }

    #[test]
    fn from_file_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let image = RawImage::from_file(&path).unwrap();
        assert_eq!(image.encoding(), ImageEncoding::Png);
        assert_eq!(image.bytes(), b"not really a png");
        assert!(image.source().ends_with("capture.png"));
    }

    #[test]
    fn pixel_budget_bounds_header_dimensions() {
        assert!(check_pixel_budget(8000, 6000).is_ok());
        assert!(check_pixel_budget(8192, 8192).is_ok());
        assert!(matches!(
            check_pixel_budget(40000, 40000),
            Err(PipelineError::InvalidDimensions(40000, 40000))
        ));
        assert!(check_pixel_budget(usize::MAX, 2).is_err());
    }
}
