use crate::screening_pipeline::common::error::Result;
use crate::screening_pipeline::decode::types::{PixelGrid, RawImage};

pub trait PixelDecoder {
    fn decode(&self, image: &RawImage) -> Result<PixelGrid>;
}
