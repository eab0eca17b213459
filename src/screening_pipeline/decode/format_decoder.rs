use tracing::debug;

use crate::screening_pipeline::common::error::Result;
use crate::screening_pipeline::decode::image_decoder::ImageCrateDecoder;
use crate::screening_pipeline::decode::rawloader_decoder::RawLoaderDecoder;
use crate::screening_pipeline::decode::reader::PixelDecoder;
use crate::screening_pipeline::decode::tiff_decoder::TiffDecoder;
use crate::screening_pipeline::decode::types::{ImageEncoding, PixelGrid, RawImage};

/// Routes a photo to the decoder for its declared encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatDecoder;

impl PixelDecoder for FormatDecoder {
    fn decode(&self, image: &RawImage) -> Result<PixelGrid> {
        debug!(encoding = ?image.encoding(), source = image.source(), "Selecting decoder");
        match image.encoding() {
            ImageEncoding::Jpeg | ImageEncoding::Png => ImageCrateDecoder.decode(image),
            ImageEncoding::Tiff => TiffDecoder.decode(image),
            ImageEncoding::CameraRaw => RawLoaderDecoder.decode(image),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening_pipeline::common::error::PipelineError;
    use image::codecs::png::PngEncoder;
    use image::{ColorType, ImageEncoder};
    use std::io::Cursor;
    use tiff::encoder::{TiffEncoder, colortype};

    #[test]
    fn dispatches_on_declared_encoding() {
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(&[9u8; 12], 2, 2, ColorType::Rgb8)
            .unwrap();
        let grid = FormatDecoder
            .decode(&RawImage::new(png, ImageEncoding::Png, "a.png"))
            .unwrap();
        assert_eq!(grid.rgb_at(1, 1), [9, 9, 9]);

        let mut tif = Vec::new();
        TiffEncoder::new(Cursor::new(&mut tif))
            .unwrap()
            .write_image::<colortype::RGB8>(2, 2, &[7u8; 12])
            .unwrap();
        let grid = FormatDecoder
            .decode(&RawImage::new(tif, ImageEncoding::Tiff, "a.tif"))
            .unwrap();
        assert_eq!(grid.rgb_at(0, 1), [7, 7, 7]);
    }

    #[test]
    fn empty_buffer_fails_for_every_encoding() {
        for encoding in [
            ImageEncoding::Jpeg,
            ImageEncoding::Png,
            ImageEncoding::Tiff,
            ImageEncoding::CameraRaw,
        ] {
            let err = FormatDecoder
                .decode(&RawImage::new(Vec::new(), encoding, "empty"))
                .unwrap_err();
            assert!(matches!(err, PipelineError::DecodeError(_)), "{:?}", encoding);
        }
    }
}
