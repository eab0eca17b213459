use std::io::Cursor;

use tiff::{ColorType, TiffError};
use tiff::decoder::{Decoder, DecodingResult};
use tracing::{debug, warn};

use crate::screening_pipeline::common::error::{PipelineError, Result};
use crate::screening_pipeline::decode::reader::PixelDecoder;
use crate::screening_pipeline::decode::types::{FALLBACK_FILL, PixelGrid, RawImage, check_pixel_budget};

/// TIFF decoder for scanner and desktop exports, backed by the `tiff` crate.
///
/// Handles 8- and 16-bit gray, RGB and RGBA strips. 16-bit samples keep their
/// high byte. Oversized headers and the tiff crate's buffer limits are decode
/// errors; other strip failures fall back to a filled grid.
pub struct TiffDecoder;

fn samples_per_pixel(color: ColorType) -> Option<usize> {
    match color {
        ColorType::Gray(8) | ColorType::Gray(16) => Some(1),
        ColorType::RGB(8) | ColorType::RGB(16) => Some(3),
        ColorType::RGBA(8) | ColorType::RGBA(16) => Some(4),
        _ => None,
    }
}

fn to_rgb(samples: &[u8], spp: usize) -> Vec<u8> {
    match spp {
        1 => samples.iter().flat_map(|&v| [v, v, v]).collect(),
        3 => samples.to_vec(),
        _ => samples
            .chunks_exact(spp)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
    }
}

impl PixelDecoder for TiffDecoder {
    fn decode(&self, image: &RawImage) -> Result<PixelGrid> {
        debug!("Decoding TIFF image, {} bytes", image.bytes().len());

        let header_err = |e: tiff::TiffError| PipelineError::DecodeError(format!("{}: {}", image.source(), e));

        let mut decoder = Decoder::new(Cursor::new(image.bytes())).map_err(header_err)?;
        let (width, height) = decoder.dimensions().map_err(header_err)?;
        let (width, height) = (width as usize, height as usize);
        let color = decoder.colortype().map_err(header_err)?;

        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions(width, height));
        }
        check_pixel_budget(width, height)?;

        let spp = samples_per_pixel(color)
            .ok_or_else(|| PipelineError::UnsupportedFormat(format!("TIFF color type {:?}", color)))?;

        let samples: Vec<u8> = match decoder.read_image() {
            Ok(DecodingResult::U8(data)) => data,
            Ok(DecodingResult::U16(data)) => data.iter().map(|&v| (v >> 8) as u8).collect(),
            Ok(_) => {
                return Err(PipelineError::UnsupportedFormat(format!(
                    "TIFF sample format for {:?}",
                    color
                )));
            }
            Err(e @ TiffError::LimitsExceeded) => return Err(header_err(e)),
            Err(e) => {
                warn!(
                    source = image.source(),
                    width, height, "TIFF strips failed to decode ({}), using fallback fill", e
                );
                return Ok(PixelGrid::filled(width, height, FALLBACK_FILL));
            }
        };

        debug!("Decoded TIFF: {}x{} {:?}", width, height, color);

        PixelGrid::from_raw(width, height, 3, to_rgb(&samples, spp))
    }
}
