//! Pixel decoding module
//!
//! Turns captured photo bytes into a dense RGB [`PixelGrid`], whatever the
//! container format.

mod format_decoder;
mod image_decoder;
mod rawloader_decoder;
mod reader;
mod tiff_decoder;
pub mod types;

pub use format_decoder::FormatDecoder;
pub use image_decoder::ImageCrateDecoder;
pub use rawloader_decoder::RawLoaderDecoder;
pub use reader::PixelDecoder;
pub use tiff_decoder::TiffDecoder;
pub use types::{FALLBACK_FILL, ImageEncoding, MAX_DECODED_PIXELS, PixelGrid, RawImage, check_pixel_budget};
