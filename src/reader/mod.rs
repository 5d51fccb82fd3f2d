use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::{HasParameters, Parameter};
use crate::types::AnimatedImage;

mod canvas;
mod decoder;
mod stream;

pub use self::canvas::Canvas;
pub use self::decoder::{has_signature, Decoder};
pub use self::stream::ByteReader;

/// Which frames to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameSelection {
    /// Every frame up to the trailer.
    #[default]
    All,
    /// Only the first frame. The rest of the stream is not read.
    First,
}

impl Parameter<DecodeOptions> for FrameSelection {
    fn set_param(self, this: &mut DecodeOptions) {
        this.frames = self
    }
}

/// What the canvas starts as and what restore-to-background clears to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundFill {
    /// Transparent black.
    #[default]
    Transparent,
    /// The declared background color of the global color table, if any.
    Declared,
}

impl Parameter<DecodeOptions> for BackgroundFill {
    fn set_param(self, this: &mut DecodeOptions) {
        this.background = self
    }
}

/// Upper bound on the bytes of composited output of one decode call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimit(pub u64);

impl MemoryLimit {
    /// No limit.
    pub const NONE: MemoryLimit = MemoryLimit(u64::MAX);
}

impl Default for MemoryLimit {
    fn default() -> Self {
        MemoryLimit(1 << 30)
    }
}

impl Parameter<DecodeOptions> for MemoryLimit {
    fn set_param(self, this: &mut DecodeOptions) {
        this.memory_limit = self
    }
}

/// Decoder configuration parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    pub frames: FrameSelection,
    pub background: BackgroundFill,
    pub memory_limit: MemoryLimit,
}

impl HasParameters for DecodeOptions {}

impl DecodeOptions {
    pub fn new() -> DecodeOptions {
        DecodeOptions::default()
    }
}

/// Decodes a complete GIF stream into composited frames.
///
/// Decoding is all-or-nothing: any error discards the frames decoded so far.
pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<AnimatedImage> {
    let mut decoder = Decoder::new(data)?;
    let (width, height) = (decoder.width(), decoder.height());
    let background = decoder.background_color();
    let limit = options.memory_limit.0;

    let frame_len = width as u64 * height as u64 * 4;
    if frame_len > limit {
        return Err(Error::MemoryLimitExceeded {
            offset: 6,
            required: frame_len,
            limit,
        });
    }
    let fill = match options.background {
        BackgroundFill::Transparent => [0; 4],
        BackgroundFill::Declared => background,
    };
    let mut canvas = Canvas::new(width, height, fill);

    let mut frames = Vec::new();
    loop {
        let offset = decoder.offset();
        let Some(block) = decoder.next_frame()? else {
            break;
        };
        let required = (frames.len() as u64 + 1) * frame_len;
        if required > limit {
            return Err(Error::MemoryLimitExceeded {
                offset,
                required,
                limit,
            });
        }
        let palette = block.palette.as_ref().or(decoder.global_palette());
        frames.push(canvas.compose(&block, palette));
        if options.frames == FrameSelection::First {
            break;
        }
    }
    if frames.is_empty() {
        return Err(Error::CorruptStream {
            offset: decoder.offset(),
            reason: "stream contains no image",
        });
    }

    debug!(
        width,
        height,
        frames = frames.len(),
        loop_count = decoder.loop_count(),
        "decoded GIF"
    );
    Ok(AnimatedImage {
        width,
        height,
        frames,
        loop_count: decoder.loop_count(),
        background,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::DEFAULT_DELAY;
    use std::time::Duration;

    // 2x1 screen, global table red/green/blue/black, background index 2
    fn header() -> Vec<u8> {
        let mut data = b"GIF89a\x02\x00\x01\x00\x81\x02\x00".to_vec();
        data.extend_from_slice(&[255, 0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0]);
        data
    }

    // full-screen image drawing indices 0, 1
    fn image(gce: Option<[u8; 4]>) -> Vec<u8> {
        let mut data = Vec::new();
        if let Some(gce) = gce {
            data.extend_from_slice(&[0x21, 0xF9, 4]);
            data.extend_from_slice(&gce);
            data.push(0);
        }
        data.extend_from_slice(&[0x2C, 0, 0, 0, 0, 2, 0, 1, 0, 0]);
        // clear, 0, 1, end as 3 bit codes
        data.extend_from_slice(&[2, 2, 0x44, 0x0A, 0]);
        data
    }

    fn two_frames() -> Vec<u8> {
        let mut data = header();
        data.extend(image(Some([0b0000_0100, 25, 0, 0])));
        data.extend(image(Some([0b0000_0001, 0, 0, 1])));
        data.push(0x3B);
        data
    }

    #[test]
    fn decodes_frames_in_order() {
        let img = decode(&two_frames(), &DecodeOptions::new()).unwrap();
        assert_eq!((img.width, img.height), (2, 1));
        assert_eq!(img.frames.len(), 2);
        assert_eq!(img.loop_count, 1);
        assert_eq!(img.background, [0, 0, 255, 0xFF]);
        assert_eq!(img.frames[0].delay, Duration::from_millis(250));
        assert_eq!(img.frames[1].delay, DEFAULT_DELAY);
        assert_eq!(img.pixel(0, 0, 0), Some([255, 0, 0, 0xFF]));
        assert_eq!(img.pixel(0, 1, 0), Some([0, 255, 0, 0xFF]));
        // index 1 is transparent in the second frame, frame one was kept
        assert_eq!(img.pixel(1, 1, 0), Some([0, 255, 0, 0xFF]));
    }

    #[test]
    fn first_frame_only() {
        let mut opts = DecodeOptions::new();
        opts.set(FrameSelection::First);
        // no trailer needed
        let mut data = two_frames();
        data.truncate(data.len() - 1);
        let img = decode(&data, &opts).unwrap();
        assert_eq!(img.frames.len(), 1);
    }

    #[test]
    fn memory_limit() {
        let mut opts = DecodeOptions::new();
        opts.set(MemoryLimit(8));
        let err = decode(&two_frames(), &opts).unwrap_err();
        assert!(matches!(
            err,
            Error::MemoryLimitExceeded {
                required: 16,
                limit: 8,
                ..
            }
        ));
        opts.set(MemoryLimit(4));
        assert!(decode(&two_frames(), &opts).is_err());
        opts.set(MemoryLimit::NONE);
        assert!(decode(&two_frames(), &opts).is_ok());
    }

    #[test]
    fn declared_background() {
        let mut data = header();
        // frame restores to background, then an empty frame shows the fill
        data.extend(image(Some([0b0000_1000, 0, 0, 0])));
        data.extend_from_slice(&[0x2C, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0]);
        data.push(0x3B);

        let img = decode(&data, &DecodeOptions::new()).unwrap();
        assert_eq!(img.pixel(1, 0, 0), Some([0, 0, 0, 0]));

        let mut opts = DecodeOptions::new();
        opts.set(BackgroundFill::Declared);
        let img = decode(&data, &opts).unwrap();
        assert_eq!(img.pixel(1, 0, 0), Some([0, 0, 255, 0xFF]));
    }

    #[test]
    fn oversized_descriptors_are_clipped() {
        let mut data = header();
        for _ in 0..40 {
            // 65535x65535 image holding two pixels of data
            data.extend_from_slice(&[0x2C, 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0]);
            data.extend_from_slice(&[2, 2, 0x44, 0x0A, 0]);
        }
        data.push(0x3B);
        let mut opts = DecodeOptions::new();
        opts.set(MemoryLimit(40 * 8));
        let img = decode(&data, &opts).unwrap();
        assert_eq!(img.frames.len(), 40);
        assert_eq!(img.pixel(39, 0, 0), Some([255, 0, 0, 0xFF]));
        assert_eq!(img.pixel(39, 1, 0), Some([0, 255, 0, 0xFF]));
    }

    #[test]
    fn no_images() {
        let mut data = header();
        data.push(0x3B);
        assert!(matches!(
            decode(&data, &DecodeOptions::new()),
            Err(Error::CorruptStream { .. })
        ));
    }

    #[test]
    fn every_truncation_fails() {
        let data = two_frames();
        for n in 1..data.len() {
            let err = decode(&data[..data.len() - n], &DecodeOptions::new()).unwrap_err();
            assert!(
                matches!(err, Error::TruncatedStream { .. }),
                "cut {} bytes: {:?}",
                n,
                err
            );
        }
    }
}
