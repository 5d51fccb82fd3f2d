//! Common types used both by decoder and encoder
use std::time::Duration;

use crate::error::{Error, Result};

/// "GIF87a" signature
pub const SIGNATURE_87A: &[u8; 6] = b"GIF87a";
/// "GIF89a" signature
pub const SIGNATURE_89A: &[u8; 6] = b"GIF89a";

/// GIF palettes are RGB
pub const PLTE_CHANNELS: usize = 3;
/// Frames are RGBA
pub const N_CHANNELS: usize = 4;

/// Stored delays below this many centiseconds are shown for [`DEFAULT_DELAY`].
pub const MIN_DELAY_CS: u16 = 2;
/// Display interval used for frames that declare (almost) no delay.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// An RGBA color.
pub type Rgba = [u8; 4];

/// Disposal method
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DisposalMethod {
    /// Decoder is not required to take any action.
    #[default]
    Any = 0,
    /// Do not dispose.
    Keep = 1,
    /// Restore to background color.
    Background = 2,
    /// Restore to previous.
    Previous = 3,
}

impl DisposalMethod {
    pub fn from_u8(n: u8) -> Option<DisposalMethod> {
        match n {
            0 => Some(DisposalMethod::Any),
            1 => Some(DisposalMethod::Keep),
            2 => Some(DisposalMethod::Background),
            3 => Some(DisposalMethod::Previous),
            _ => None,
        }
    }
}

enum_from_primitive! {
/// Known block types
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Block {
    Image = 0x2C,
    Extension = 0x21,
    Trailer = 0x3B
}
}

enum_from_primitive! {
/// Known GIF extensions
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Extension {
    Text = 0x01,
    Control = 0xF9,
    Comment = 0xFE,
    Application = 0xFF
}
}

/// Color table size converted to flag bits, i.e. the smallest `n` with
/// `2 << n >= size`.
pub fn flag_size(size: usize) -> u8 {
    match size {
        0..=2 => 0,
        3..=4 => 1,
        5..=8 => 2,
        9..=16 => 3,
        17..=32 => 4,
        33..=64 => 5,
        65..=128 => 6,
        _ => 7,
    }
}

/// A palette of RGB triples whose length is a power of two in `2..=256`.
///
/// Global and local tables share this shape. A local table replaces the
/// global one for its own frame only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    colors: Vec<[u8; 3]>,
}

impl ColorTable {
    /// Builds a table from up to 256 colors, padding with black to the next
    /// power of two.
    pub fn new(mut colors: Vec<[u8; 3]>) -> Result<ColorTable> {
        if colors.len() > 256 {
            return Err(Error::constraint(format!(
                "color table has {} entries, at most 256 are allowed",
                colors.len()
            )));
        }
        let len = 2usize << flag_size(colors.len());
        colors.resize(len, [0, 0, 0]);
        Ok(ColorTable { colors })
    }

    /// Builds a table from packed RGB bytes as found in the stream.
    pub(crate) fn from_packed(rgb: &[u8]) -> ColorTable {
        ColorTable {
            colors: rgb
                .chunks_exact(PLTE_CHANNELS)
                .map(|c| [c[0], c[1], c[2]])
                .collect(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// The size field stored in the packed flags (`len == 2 << size_bits`).
    pub fn size_bits(&self) -> u8 {
        flag_size(self.colors.len())
    }

    pub fn get(&self, index: u8) -> Option<[u8; 3]> {
        self.colors.get(index as usize).copied()
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    /// First index holding `color`.
    pub fn position(&self, color: [u8; 3]) -> Option<u8> {
        self.colors.iter().position(|&c| c == color).map(|i| i as u8)
    }
}

/// The logical screen descriptor following the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalScreenDescriptor {
    pub width: u16,
    pub height: u16,
    pub global_color_table: bool,
    /// Bits per primary color minus one.
    pub color_resolution: u8,
    pub sorted: bool,
    /// Size field of the global table (`2 << n` entries).
    pub global_color_table_bits: u8,
    pub background_index: u8,
    pub pixel_aspect_ratio: u8,
}

impl LogicalScreenDescriptor {
    pub(crate) fn from_packed(
        width: u16,
        height: u16,
        flags: u8,
        background_index: u8,
        pixel_aspect_ratio: u8,
    ) -> Self {
        LogicalScreenDescriptor {
            width,
            height,
            global_color_table: flags & 0b1000_0000 != 0,
            color_resolution: (flags & 0b0111_0000) >> 4,
            sorted: flags & 0b0000_1000 != 0,
            global_color_table_bits: flags & 0b0000_0111,
            background_index,
            pixel_aspect_ratio,
        }
    }

    pub(crate) fn packed_flags(&self) -> u8 {
        let mut flags = (self.color_resolution & 0b111) << 4;
        flags |= self.global_color_table_bits & 0b111;
        if self.global_color_table {
            flags |= 0b1000_0000;
        }
        if self.sorted {
            flags |= 0b0000_1000;
        }
        flags
    }

    /// Number of entries in the global color table, 0 if there is none.
    pub fn global_table_len(&self) -> usize {
        if self.global_color_table {
            2 << self.global_color_table_bits
        } else {
            0
        }
    }
}

/// Graphic control extension. Applies to the next image descriptor only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphicControl {
    pub dispose: DisposalMethod,
    pub needs_user_input: bool,
    pub transparent: Option<u8>,
    /// Delay in 1/100 s.
    pub delay: u16,
}

impl GraphicControl {
    /// Unpacks the extension fields. The second value is `false` when the
    /// disposal bits hold a reserved value.
    pub(crate) fn from_packed(flags: u8, delay: u16, transparent_index: u8) -> (Self, bool) {
        let method = DisposalMethod::from_u8((flags & 0b1_1100) >> 2);
        let control = GraphicControl {
            dispose: method.unwrap_or_default(),
            needs_user_input: flags & 0b10 != 0,
            transparent: if flags & 1 != 0 {
                Some(transparent_index)
            } else {
                None
            },
            delay,
        };
        (control, method.is_some())
    }

    pub(crate) fn packed_flags(&self) -> u8 {
        let mut flags = (self.dispose as u8) << 2;
        flags |= (self.needs_user_input as u8) << 1;
        flags |= self.transparent.is_some() as u8;
        flags
    }
}

/// Image descriptor: the frame's bounding box on the logical screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageDescriptor {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub interlaced: bool,
    pub local_color_table: bool,
    pub sorted: bool,
    /// Size field of the local table (`2 << n` entries).
    pub local_color_table_bits: u8,
}

impl ImageDescriptor {
    pub(crate) fn with_flags(left: u16, top: u16, width: u16, height: u16, flags: u8) -> Self {
        ImageDescriptor {
            left,
            top,
            width,
            height,
            local_color_table: flags & 0b1000_0000 != 0,
            interlaced: flags & 0b0100_0000 != 0,
            sorted: flags & 0b0010_0000 != 0,
            local_color_table_bits: flags & 0b0000_0111,
        }
    }

    pub(crate) fn packed_flags(&self) -> u8 {
        let mut flags = self.local_color_table_bits & 0b111;
        if self.local_color_table {
            flags |= 0b1000_0000;
        }
        if self.interlaced {
            flags |= 0b0100_0000;
        }
        if self.sorted {
            flags |= 0b0010_0000;
        }
        flags
    }

    /// Number of entries in the local color table, 0 if there is none.
    pub fn local_table_len(&self) -> usize {
        if self.local_color_table {
            2 << self.local_color_table_bits
        } else {
            0
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// An image block as stored in the stream: palette indices plus the
/// extension and descriptor that govern them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexedFrame {
    pub control: GraphicControl,
    pub descriptor: ImageDescriptor,
    pub palette: Option<ColorTable>,
    /// Row-major indices, `descriptor.width * descriptor.height` of them.
    pub indices: Vec<u8>,
}

/// A fully composited frame the size of the logical screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// RGBA pixels, row-major.
    pub buffer: Vec<u8>,
    /// How long the frame is shown.
    pub delay: Duration,
    /// How the frame's area is treated before the next frame is drawn.
    pub dispose: DisposalMethod,
}

impl Frame {
    pub fn new(buffer: Vec<u8>, delay: Duration, dispose: DisposalMethod) -> Frame {
        Frame {
            buffer,
            delay,
            dispose,
        }
    }
}

/// Converts a stored delay to a display duration.
///
/// Many encoders write 0, which means "as fast as possible" and is shown
/// for [`DEFAULT_DELAY`] instead.
pub fn delay_to_duration(centis: u16) -> Duration {
    if centis < MIN_DELAY_CS {
        DEFAULT_DELAY
    } else {
        Duration::from_millis(centis as u64 * 10)
    }
}

/// Converts a display duration back to centiseconds, rounding to nearest.
///
/// Durations below 20 ms are stored as [`MIN_DELAY_CS`], the shortest delay
/// [`delay_to_duration`] does not replace with [`DEFAULT_DELAY`].
pub fn duration_to_delay(delay: Duration) -> u16 {
    let centis = (delay.as_millis() + 5) / 10;
    num::clamp(centis, MIN_DELAY_CS as u128, u16::MAX as u128) as u16
}

/// Target row of each stored row. Interlaced images store every 8th row
/// from 0, every 8th from 4, every 4th from 2, then every 2nd from 1.
pub(crate) fn row_order(height: usize, interlaced: bool) -> Vec<usize> {
    if !interlaced {
        return (0..height).collect();
    }
    [(0, 8), (4, 8), (2, 4), (1, 2)]
        .iter()
        .flat_map(|&(start, step)| (start..height).step_by(step))
        .collect()
}

/// A decoded animation. The only result of decoding and the only input of
/// encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimatedImage {
    pub width: u16,
    pub height: u16,
    /// Frames in display order, never empty.
    pub frames: Vec<Frame>,
    /// Number of loops, 0 means infinite.
    pub loop_count: u16,
    /// The declared background color, transparent if the stream has no
    /// global color table.
    pub background: Rgba,
}

impl AnimatedImage {
    /// Creates an animation after checking that every frame covers the
    /// whole screen.
    pub fn new(width: u16, height: u16, frames: Vec<Frame>, loop_count: u16) -> Result<Self> {
        let image = AnimatedImage {
            width,
            height,
            frames,
            loop_count,
            background: [0; 4],
        };
        image.validate()?;
        Ok(image)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::constraint(format!(
                "screen size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.frames.is_empty() {
            return Err(Error::constraint("an animation needs at least one frame"));
        }
        let expected = self.width as usize * self.height as usize * N_CHANNELS;
        for (i, frame) in self.frames.iter().enumerate() {
            if frame.buffer.len() != expected {
                return Err(Error::constraint(format!(
                    "frame {} has {} bytes, expected {}",
                    i,
                    frame.buffer.len(),
                    expected
                )));
            }
        }
        Ok(())
    }

    /// More than one frame.
    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// `None` only for an image whose `frames` were emptied by hand.
    pub fn first_frame(&self) -> Option<&Frame> {
        self.frames.first()
    }

    /// Duration of one pass through all frames.
    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|f| f.delay).sum()
    }

    /// RGBA value of a pixel in a frame.
    pub fn pixel(&self, frame: usize, x: u16, y: u16) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let frame = self.frames.get(frame)?;
        let i = (y as usize * self.width as usize + x as usize) * N_CHANNELS;
        let p = frame.buffer.get(i..i + N_CHANNELS)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use enum_primitive::FromPrimitive;

    #[test]
    fn block_and_extension_from_u8() {
        assert_eq!(Block::from_u8(0x2C), Some(Block::Image));
        assert_eq!(Block::from_u8(0x3B), Some(Block::Trailer));
        assert_eq!(Block::from_u8(0x00), None);
        assert_eq!(Extension::from_u8(0xF9), Some(Extension::Control));
        assert_eq!(Extension::from_u8(0x02), None);
    }

    #[test]
    fn color_table_pads_to_power_of_two() {
        let table = ColorTable::new(vec![[1, 2, 3]; 5]).unwrap();
        assert_eq!(table.len(), 8);
        assert_eq!(table.size_bits(), 2);
        assert_eq!(table.get(4), Some([1, 2, 3]));
        assert_eq!(table.get(5), Some([0, 0, 0]));
        assert_eq!(table.get(8), None);

        let tiny = ColorTable::new(vec![]).unwrap();
        assert_eq!(tiny.len(), 2);
        assert!(ColorTable::new(vec![[0; 3]; 257]).is_err());
    }

    #[test]
    fn flag_size_boundaries() {
        assert_eq!(flag_size(2), 0);
        assert_eq!(flag_size(3), 1);
        assert_eq!(flag_size(16), 3);
        assert_eq!(flag_size(17), 4);
        assert_eq!(flag_size(256), 7);
    }

    #[test]
    fn control_flags() {
        let (gce, known) = GraphicControl::from_packed(0b0000_1011, 7, 3);
        assert!(known);
        assert_eq!(gce.dispose, DisposalMethod::Background);
        assert!(gce.needs_user_input);
        assert_eq!(gce.transparent, Some(3));
        assert_eq!(gce.packed_flags(), 0b0000_1011);

        let (gce, known) = GraphicControl::from_packed(0b0001_1100, 0, 0);
        assert!(!known);
        assert_eq!(gce.dispose, DisposalMethod::Any);
        assert_eq!(gce.transparent, None);
    }

    #[test]
    fn screen_flags() {
        let lsd = LogicalScreenDescriptor::from_packed(4, 3, 0b1111_0010, 1, 0);
        assert!(lsd.global_color_table);
        assert_eq!(lsd.color_resolution, 7);
        assert_eq!(lsd.global_table_len(), 8);
        assert_eq!(lsd.packed_flags(), 0b1111_0010);
    }

    #[test]
    fn delays_are_clamped() {
        assert_eq!(delay_to_duration(0), DEFAULT_DELAY);
        assert_eq!(delay_to_duration(1), DEFAULT_DELAY);
        assert_eq!(delay_to_duration(2), Duration::from_millis(20));
        assert_eq!(duration_to_delay(Duration::from_millis(104)), 10);
        assert_eq!(duration_to_delay(Duration::from_millis(105)), 11);
        assert_eq!(duration_to_delay(Duration::from_secs(1_000_000)), u16::MAX);
        for short in [0, 1, 10, 14] {
            let centis = duration_to_delay(Duration::from_millis(short));
            assert_eq!(centis, MIN_DELAY_CS);
            assert_eq!(delay_to_duration(centis), Duration::from_millis(20));
        }
    }

    #[test]
    fn animated_image_checks_frame_size() {
        let ok = Frame::new(vec![0; 2 * 2 * 4], DEFAULT_DELAY, DisposalMethod::Any);
        let short = Frame::new(vec![0; 3], DEFAULT_DELAY, DisposalMethod::Any);
        assert!(AnimatedImage::new(2, 2, vec![ok.clone()], 0).is_ok());
        assert!(AnimatedImage::new(2, 2, vec![ok.clone(), short], 0).is_err());
        assert!(AnimatedImage::new(2, 2, vec![], 0).is_err());
        assert!(AnimatedImage::new(0, 2, vec![ok.clone()], 0).is_err());

        let mut image = AnimatedImage::new(2, 2, vec![ok.clone()], 0).unwrap();
        assert_eq!(image.first_frame(), Some(&ok));
        image.frames.clear();
        assert_eq!(image.first_frame(), None);
    }
}
