use tracing::debug;

use crate::screening_pipeline::common::error::{PipelineError, Result};
use crate::screening_pipeline::normalize::{ChannelOrder, NormalizedGrid};

/// Memory layout the inference boundary consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[S, S, 3]`, channels interleaved per pixel (HWC)
    #[default]
    Interleaved,
    /// `[3, S, S]`, one plane per channel (CHW)
    Planar,
}

/// Flat float buffer of exactly `3 × size²` values.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    size: usize,
    layout: TensorLayout,
    order: ChannelOrder,
    data: Vec<f32>,
}

impl NormalizedTensor {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    pub fn shape(&self) -> [usize; 3] {
        match self.layout {
            TensorLayout::Interleaved => [self.size, self.size, 3],
            TensorLayout::Planar => [3, self.size, self.size],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TensorPacker {
    size: usize,
    layout: TensorLayout,
}

impl TensorPacker {
    pub fn new(size: usize, layout: TensorLayout) -> Self {
        Self { size, layout }
    }

    /// Lays the grid out for the inference boundary. Values are moved, never
    /// changed.
    pub fn pack(&self, grid: NormalizedGrid) -> Result<NormalizedTensor> {
        let expected = 3 * self.size * self.size;
        if grid.size != self.size || grid.data.len() != expected {
            return Err(PipelineError::ShapeError(format!(
                "packer expects {} values for {}x{}x3, got {} ({}x{} grid)",
                expected,
                self.size,
                self.size,
                grid.data.len(),
                grid.size,
                grid.size
            )));
        }

        let data = match self.layout {
            TensorLayout::Interleaved => grid.data,
            TensorLayout::Planar => {
                let plane = self.size * self.size;
                let mut planar = vec![0.0f32; expected];
                for (pixel, values) in grid.data.chunks_exact(3).enumerate() {
                    for (c, &v) in values.iter().enumerate() {
                        planar[c * plane + pixel] = v;
                    }
                }
                planar
            }
        };

        debug!(layout = ?self.layout, len = data.len(), "Tensor packed");

        Ok(NormalizedTensor {
            size: self.size,
            layout: self.layout,
            order: grid.order,
            data,
        })
    }
}
