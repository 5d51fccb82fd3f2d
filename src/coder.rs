//! Format-agnostic coder interface
use crate::error::Result;
use crate::reader::{self, DecodeOptions};
use crate::types::AnimatedImage;
use crate::writer::{self, EncodeOptions};

/// An image format that can be detected, decoded and encoded.
///
/// The trait is object safe so several formats can be tried in turn.
pub trait ImageCoder {
    /// Short lowercase format name.
    fn name(&self) -> &'static str;

    /// Whether `data` starts like a stream of this format.
    fn probe(&self, data: &[u8]) -> bool;

    fn decode(&self, data: &[u8], options: &DecodeOptions) -> Result<AnimatedImage>;

    fn encode(&self, image: &AnimatedImage, options: &EncodeOptions) -> Result<Vec<u8>>;
}

/// The GIF coder. It keeps no state between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct GifCoder;

impl ImageCoder for GifCoder {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn probe(&self, data: &[u8]) -> bool {
        reader::has_signature(data)
    }

    fn decode(&self, data: &[u8], options: &DecodeOptions) -> Result<AnimatedImage> {
        reader::decode(data, options)
    }

    fn encode(&self, image: &AnimatedImage, options: &EncodeOptions) -> Result<Vec<u8>> {
        writer::encode(image, options)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{DisposalMethod, Frame};
    use std::time::Duration;

    #[test]
    fn dispatch_through_trait_objects() {
        let coders: Vec<Box<dyn ImageCoder>> = vec![Box::new(GifCoder)];
        let image = AnimatedImage::new(
            1,
            1,
            vec![Frame::new(
                vec![9, 8, 7, 255],
                Duration::from_millis(100),
                DisposalMethod::Any,
            )],
            1,
        )
        .unwrap();
        let data = coders[0].encode(&image, &EncodeOptions::new()).unwrap();

        let coder = coders.iter().find(|c| c.probe(&data)).unwrap();
        assert_eq!(coder.name(), "gif");
        let back = coder.decode(&data, &DecodeOptions::new()).unwrap();
        assert_eq!(back.frames[0].buffer, [9, 8, 7, 255]);
        assert!(!coders.iter().any(|c| c.probe(b"\x89PNG\r\n\x1a\n")));
    }
}
