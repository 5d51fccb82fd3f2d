//! # GIF coder
//!
//! Decodes GIF87a/GIF89a streams into fully composited RGBA frames and
//! encodes RGBA animations back into GIF89a.
//!
//! ```
//! use gif_coder::{DecodeOptions, EncodeOptions, HasParameters, LoopCount};
//! # use gif_coder::{AnimatedImage, DisposalMethod, Frame};
//! # use std::time::Duration;
//! # let frame = Frame::new(vec![255, 0, 0, 255], Duration::from_millis(50), DisposalMethod::Keep);
//! # let image = AnimatedImage::new(1, 1, vec![frame], 1).unwrap();
//! let mut options = EncodeOptions::new();
//! options.set(LoopCount(0));
//! let data = gif_coder::encode(&image, &options).unwrap();
//!
//! assert!(gif_coder::probe(&data));
//! let decoded = gif_coder::decode(&data, &DecodeOptions::new()).unwrap();
//! assert_eq!(decoded.loop_count, 0);
//! ```

#[macro_use]
extern crate enum_primitive;

mod coder;
mod error;
mod lzw;
mod reader;
mod traits;
mod types;
mod writer;

pub use crate::coder::{GifCoder, ImageCoder};
pub use crate::error::{Error, Result};
pub use crate::traits::{HasParameters, Parameter};
pub use crate::types::{
    AnimatedImage, Block, ColorTable, DisposalMethod, Extension, Frame, GraphicControl,
    ImageDescriptor, IndexedFrame, LogicalScreenDescriptor, Rgba,
};

pub use crate::reader::{ByteReader, Decoder};
/// Decoder configuration parameters
pub use crate::reader::{BackgroundFill, DecodeOptions, FrameSelection, MemoryLimit};

pub use crate::writer::{Encoder, ExtensionData, Quantizer};
/// Encoder configuration parameters
pub use crate::writer::{Dither, EncodeOptions, LoopCount, PaletteMode, PaletteSize};

/// Checks whether `data` begins with a GIF signature. Reads at most six
/// bytes.
pub fn probe(data: &[u8]) -> bool {
    reader::has_signature(data)
}

/// Decodes a GIF stream into composited frames.
pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<AnimatedImage> {
    reader::decode(data, options)
}

/// Encodes an animation as GIF89a.
pub fn encode(image: &AnimatedImage, options: &EncodeOptions) -> Result<Vec<u8>> {
    writer::encode(image, options)
}
