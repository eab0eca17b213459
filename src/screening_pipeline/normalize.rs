//! Statistical normalization of 8-bit samples into the classifier's input
//! distribution.

use std::str::FromStr;

use tracing::debug;

use crate::screening_pipeline::common::error::{PipelineError, Result};
use crate::screening_pipeline::decode::PixelGrid;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
pub const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Input distribution a classifier build was trained under.
///
/// The two profiles produce tensors of very different ranges; feeding one to a
/// classifier trained on the other gives plausible but meaningless scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationProfile {
    /// RGB, `(x / 255 - mean) / std` per channel
    ImageNetMeanStd,
    /// BGR, `x - mean` per channel, no scaling
    CaffeBgrMeanSubtraction,
}

impl NormalizationProfile {
    pub fn channel_order(self) -> ChannelOrder {
        match self {
            NormalizationProfile::ImageNetMeanStd => ChannelOrder::Rgb,
            NormalizationProfile::CaffeBgrMeanSubtraction => ChannelOrder::Bgr,
        }
    }

    /// Normalizes one pixel, returning its channels in this profile's order.
    #[inline]
    pub fn normalize_pixel(self, [r, g, b]: [u8; 3]) -> [f32; 3] {
        match self {
            NormalizationProfile::ImageNetMeanStd => {
                let rgb = [r, g, b];
                std::array::from_fn(|c| (rgb[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c])
            }
            NormalizationProfile::CaffeBgrMeanSubtraction => {
                let bgr = [b, g, r];
                std::array::from_fn(|c| bgr[c] as f32 - CAFFE_MEAN_BGR[c])
            }
        }
    }
}

impl FromStr for NormalizationProfile {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "imagenet" | "imagenet-mean-std" => Ok(NormalizationProfile::ImageNetMeanStd),
            "caffe" | "caffe-bgr" | "bgr-mean" => Ok(NormalizationProfile::CaffeBgrMeanSubtraction),
            other => Err(PipelineError::NormalizationConfigError(format!(
                "unknown normalization profile '{}'",
                other
            ))),
        }
    }
}

/// `size × size × 3` floats, row-major, channels interleaved in `order`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedGrid {
    pub size: usize,
    pub order: ChannelOrder,
    pub data: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
pub struct StatisticalNormalizer {
    profile: NormalizationProfile,
}

impl StatisticalNormalizer {
    pub fn new(profile: NormalizationProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> NormalizationProfile {
        self.profile
    }

    pub fn apply(&self, grid: &PixelGrid, size: usize) -> Result<NormalizedGrid> {
        if !grid.is_square_rgb(size) {
            return Err(PipelineError::ShapeError(format!(
                "normalizer expects {}x{}x3, got {}x{}x{}",
                size,
                size,
                grid.width(),
                grid.height(),
                grid.channels()
            )));
        }

        debug!(profile = ?self.profile, size, "Normalizing samples");

        let data = grid
            .data()
            .chunks_exact(3)
            .flat_map(|px| self.profile.normalize_pixel([px[0], px[1], px[2]]))
            .collect();

        Ok(NormalizedGrid {
            size,
            order: self.profile.channel_order(),
            data,
        })
    }
}
