//! JPEG and PNG decoding backed by the `image` crate.

use std::io::Cursor;

use image::{ImageError, ImageFormat};
use image::io::Reader as ImageReader;
use tracing::{debug, warn};

use crate::screening_pipeline::common::error::{PipelineError, Result};
use crate::screening_pipeline::decode::reader::PixelDecoder;
use crate::screening_pipeline::decode::types::{
    FALLBACK_FILL, ImageEncoding, PixelGrid, RawImage, check_pixel_budget,
};

/// Decoder for the compressed photographic formats a phone camera produces.
///
/// The header is probed on its own first. A stream whose header cannot be
/// parsed, or that declares more pixels than the decode budget allows, is
/// rejected. A stream whose header parses but whose body is damaged yields a
/// grid of the header's dimensions filled with [`FALLBACK_FILL`]. Hitting the
/// `image` crate's allocation limits is a decode error, never a fallback.
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    fn format_for(encoding: ImageEncoding) -> Result<ImageFormat> {
        match encoding {
            ImageEncoding::Jpeg => Ok(ImageFormat::Jpeg),
            ImageEncoding::Png => Ok(ImageFormat::Png),
            other => Err(PipelineError::UnsupportedFormat(format!(
                "{:?} is not handled by the image decoder",
                other
            ))),
        }
    }
}

impl PixelDecoder for ImageCrateDecoder {
    fn decode(&self, image: &RawImage) -> Result<PixelGrid> {
        let format = Self::format_for(image.encoding())?;
        debug!("Decoding {:?} image, {} bytes", format, image.bytes().len());

        let (width, height) = ImageReader::with_format(Cursor::new(image.bytes()), format)
            .into_dimensions()
            .map_err(|e| PipelineError::DecodeError(format!("{}: {}", image.source(), e)))?;
        let (width, height) = (width as usize, height as usize);

        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions(width, height));
        }
        check_pixel_budget(width, height)?;

        let decoded = match ImageReader::with_format(Cursor::new(image.bytes()), format).decode() {
            Ok(decoded) => decoded,
            Err(ImageError::Limits(e)) => {
                return Err(PipelineError::DecodeError(format!("{}: {}", image.source(), e)));
            }
            Err(e) => {
                warn!(
                    source = image.source(),
                    width, height, "Image body failed to decode ({}), using fallback fill", e
                );
                return Ok(PixelGrid::filled(width, height, FALLBACK_FILL));
            }
        };

        debug!("Decoded image: {}x{} ({:?})", width, height, decoded.color());

        PixelGrid::from_raw(width, height, 3, decoded.to_rgb8().into_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::codecs::png::PngEncoder;
    use image::{ColorType, ImageEncoder};

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| {
                let v = (i % 256) as u8;
                [v, 255 - v, 128]
            })
            .collect()
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(&gradient(width, height), width, height, ColorType::Rgb8)
            .unwrap();
        buf
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, 90)
            .write_image(&gradient(width, height), width, height, ColorType::Rgb8)
            .unwrap();
        buf
    }

    #[test]
    fn png_decodes_losslessly() {
        let image = RawImage::new(png_bytes(6, 4), ImageEncoding::Png, "mem");
        let grid = ImageCrateDecoder.decode(&image).unwrap();

        assert_eq!((grid.width(), grid.height(), grid.channels()), (6, 4, 3));
        assert_eq!(grid.data(), gradient(6, 4).as_slice());
    }

    #[test]
    fn rgba_png_loses_alpha() {
        let rgba: Vec<u8> = (0..4).flat_map(|_| [10, 20, 30, 0]).collect();
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(&rgba, 2, 2, ColorType::Rgba8)
            .unwrap();

        let grid = ImageCrateDecoder
            .decode(&RawImage::new(buf, ImageEncoding::Png, "mem"))
            .unwrap();
        assert_eq!(grid.channels(), 3);
        assert_eq!(grid.rgb_at(1, 1), [10, 20, 30]);
    }

    #[test]
    fn jpeg_keeps_natural_dimensions() {
        let image = RawImage::new(jpeg_bytes(40, 24), ImageEncoding::Jpeg, "mem");
        let grid = ImageCrateDecoder.decode(&image).unwrap();
        assert_eq!((grid.width(), grid.height()), (40, 24));
    }

    #[test]
    fn trailing_garbage_is_ignored() {
        let mut bytes = jpeg_bytes(16, 16);
        bytes.extend_from_slice(b"\x00\x01garbage after the end marker");

        let grid = ImageCrateDecoder
            .decode(&RawImage::new(bytes, ImageEncoding::Jpeg, "mem"))
            .unwrap();
        assert_eq!((grid.width(), grid.height()), (16, 16));
    }

    #[test]
    fn truncated_body_keeps_header_dimensions() {
        let bytes = jpeg_bytes(128, 96);
        let truncated = bytes[..bytes.len() * 2 / 3].to_vec();

        let grid = ImageCrateDecoder
            .decode(&RawImage::new(truncated, ImageEncoding::Jpeg, "mem"))
            .unwrap();
        assert_eq!((grid.width(), grid.height(), grid.channels()), (128, 96, 3));
    }

    /// Rewrites the frame dimensions in the SOF0 segment of a baseline JPEG.
    fn patch_sof_dimensions(bytes: &mut [u8], width: u16, height: u16) {
        let sof = bytes
            .windows(2)
            .position(|w| w == [0xFF, 0xC0])
            .expect("baseline JPEG has a SOF0 marker");
        // marker(2) length(2) precision(1) height(2) width(2)
        bytes[sof + 5..sof + 7].copy_from_slice(&height.to_be_bytes());
        bytes[sof + 7..sof + 9].copy_from_slice(&width.to_be_bytes());
    }

    #[test]
    fn forged_header_dimensions_are_rejected_before_allocating() {
        let mut bytes = jpeg_bytes(8, 8);
        patch_sof_dimensions(&mut bytes, 40000, 40000);

        let err = ImageCrateDecoder
            .decode(&RawImage::new(bytes, ImageEncoding::Jpeg, "forged.jpg"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidDimensions(40000, 40000)));
    }

    #[test]
    fn forged_header_within_budget_still_falls_back() {
        let mut bytes = jpeg_bytes(8, 8);
        patch_sof_dimensions(&mut bytes, 64, 48);

        let grid = ImageCrateDecoder
            .decode(&RawImage::new(bytes, ImageEncoding::Jpeg, "forged.jpg"))
            .unwrap();
        assert_eq!((grid.width(), grid.height(), grid.channels()), (64, 48, 3));
    }

    #[test]
    fn unreadable_header_is_a_decode_error() {
        let image = RawImage::new(b"definitely not a jpeg".to_vec(), ImageEncoding::Jpeg, "mem");
        let err = ImageCrateDecoder.decode(&image).unwrap_err();
        assert!(matches!(err, PipelineError::DecodeError(_)));
    }

    #[test]
    fn wrong_declared_format_is_a_decode_error() {
        let image = RawImage::new(png_bytes(4, 4), ImageEncoding::Jpeg, "mem");
        let err = ImageCrateDecoder.decode(&image).unwrap_err();
        assert!(matches!(err, PipelineError::DecodeError(_)));
    }

    #[test]
    fn tiff_is_not_handled_here() {
        let image = RawImage::new(Vec::new(), ImageEncoding::Tiff, "mem");
        let err = ImageCrateDecoder.decode(&image).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
    }
}
