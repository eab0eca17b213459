//! Camera RAW decoding using rawloader and the bayer demosaicer.
//!
//! Some phones hand over DNG captures in "pro" mode. Those are sensor dumps,
//! not viewable pictures, so they are scaled to 8 bits using the sensor's
//! black and white levels and then demosaiced with the sensor's CFA pattern.

use std::io::Cursor;

use bayer::{BayerDepth, CFA, Demosaic, RasterDepth, RasterMut};
use rawloader::RawImageData as SensorData;
use tracing::debug;

use crate::screening_pipeline::common::error::{PipelineError, Result};
use crate::screening_pipeline::decode::reader::PixelDecoder;
use crate::screening_pipeline::decode::types::{PixelGrid, RawImage, check_pixel_budget};

pub struct RawLoaderDecoder;

/// Maps rawloader's CFA name onto a pattern the demosaicer understands.
/// Unknown layouts (X-Trans, 4-color) fall back to RGGB.
fn cfa_pattern(name: &str) -> CFA {
    match name {
        "BGGR" => CFA::BGGR,
        "GBRG" => CFA::GBRG,
        "GRBG" => CFA::GRBG,
        _ => CFA::RGGB,
    }
}

/// Rescales sensor values into 0..=255 between the black and white level.
fn scale_to_u8(values: &[u16], black: u16, white: u16) -> Vec<u8> {
    let black = black as f32;
    let range = (white as f32 - black).max(1.0);
    values
        .iter()
        .map(|&v| (((v as f32 - black).max(0.0) / range) * 255.0).round().min(255.0) as u8)
        .collect()
}

/// Sensor readout as rawloader leaves it, before any color processing.
struct SensorFrame<'a> {
    width: usize,
    height: usize,
    cpp: usize,
    cfa: CFA,
    black: u16,
    white: u16,
    values: &'a [u16],
}

/// Scales a sensor frame to 8 bits and demosaics it unless it is already RGB.
fn develop(frame: SensorFrame<'_>) -> Result<PixelGrid> {
    let samples = scale_to_u8(frame.values, frame.black, frame.white);

    // Linear DNGs already carry three samples per pixel.
    if frame.cpp == 3 {
        return PixelGrid::from_raw(frame.width, frame.height, 3, samples);
    }

    if samples.len() < frame.width * frame.height {
        return Err(PipelineError::DecodeError(format!(
            "sensor data holds {} samples for a {}x{} frame",
            samples.len(),
            frame.width,
            frame.height
        )));
    }

    let mut rgb = vec![0u8; frame.width * frame.height * 3];
    {
        let mut raster = RasterMut::new(frame.width, frame.height, RasterDepth::Depth8, &mut rgb);
        bayer::run_demosaic(
            &mut Cursor::new(&samples[..]),
            BayerDepth::Depth8,
            frame.cfa,
            Demosaic::Linear,
            &mut raster,
        )
        .map_err(|e| PipelineError::DecodeError(format!("demosaic failed: {:?}", e)))?;
    }

    PixelGrid::from_raw(frame.width, frame.height, 3, rgb)
}

impl PixelDecoder for RawLoaderDecoder {
    fn decode(&self, image: &RawImage) -> Result<PixelGrid> {
        debug!("Decoding camera RAW image, {} bytes", image.bytes().len());

        let decoded = rawloader::decode(&mut Cursor::new(image.bytes()))
            .map_err(|e| PipelineError::DecodeError(format!("{}: {}", image.source(), e)))?;

        let width = decoded.width;
        let height = decoded.height;
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions(width, height));
        }
        check_pixel_budget(width, height)?;

        let black = decoded.blacklevels[0];
        let white = decoded.whitelevels.iter().max().copied().unwrap_or(u16::MAX);
        let cpp = decoded.cpp;
        let cfa = cfa_pattern(&decoded.cfa.name);

        debug!(
            width,
            height,
            cpp,
            cfa = %decoded.cfa.name,
            black,
            white,
            "Sensor data loaded"
        );

        let values: Vec<u16> = match decoded.data {
            SensorData::Integer(values) => values,
            SensorData::Float(values) => values.iter().map(|&v| (v * u16::MAX as f32) as u16).collect(),
        };

        develop(SensorFrame {
            width,
            height,
            cpp,
            cfa,
            black,
            white,
            values: &values,
        })
    }
}
