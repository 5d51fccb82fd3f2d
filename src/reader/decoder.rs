use enum_primitive::FromPrimitive;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::lzw;
use crate::types::{
    Block, ColorTable, Extension, GraphicControl, ImageDescriptor, IndexedFrame,
    LogicalScreenDescriptor, Rgba, SIGNATURE_87A, SIGNATURE_89A,
};

use super::stream::ByteReader;

/// Application identifiers whose data sub-block carries a loop count.
const LOOP_APPLICATIONS: [&[u8]; 2] = [b"NETSCAPE2.0", b"ANIMEXTS1.0"];

/// Whether `data` starts with a GIF signature.
pub fn has_signature(data: &[u8]) -> bool {
    data.len() >= 6 && (&data[..6] == SIGNATURE_87A || &data[..6] == SIGNATURE_89A)
}

fn is_signature_prefix(data: &[u8]) -> bool {
    data.len() < 6 && (SIGNATURE_87A.starts_with(data) || SIGNATURE_89A.starts_with(data))
}

/// Block-level GIF decoder.
///
/// Reads the header on construction and then hands out one
/// [`IndexedFrame`] per image block, each paired with the graphic control
/// extension that preceded it. Compositing is left to the caller.
#[derive(Debug)]
pub struct Decoder<'a> {
    r: ByteReader<'a>,
    screen: LogicalScreenDescriptor,
    global_color_table: Option<ColorTable>,
    loop_count: u16,
    /// Control extension waiting for the next image. A newer one replaces it.
    control: Option<GraphicControl>,
    done: bool,
}

impl<'a> Decoder<'a> {
    /// Parses signature, logical screen descriptor and global color table.
    pub fn new(data: &'a [u8]) -> Result<Decoder<'a>> {
        if !has_signature(data) {
            return Err(if is_signature_prefix(data) {
                Error::TruncatedStream { offset: data.len() }
            } else {
                Error::UnsupportedFormat
            });
        }
        let mut r = ByteReader::new(data);
        r.skip(6)?;

        let width = r.read_u16_le()?;
        let height = r.read_u16_le()?;
        let flags = r.read_u8()?;
        let background_index = r.read_u8()?;
        let pixel_aspect_ratio = r.read_u8()?;
        if width == 0 || height == 0 {
            return Err(Error::CorruptHeader {
                offset: 6,
                reason: "logical screen has zero width or height",
            });
        }
        let screen = LogicalScreenDescriptor::from_packed(
            width,
            height,
            flags,
            background_index,
            pixel_aspect_ratio,
        );
        let global_color_table = if screen.global_color_table {
            Some(r.read_color_table(screen.global_table_len())?)
        } else {
            None
        };
        debug!(
            width,
            height,
            global_colors = screen.global_table_len(),
            "read logical screen descriptor"
        );

        Ok(Decoder {
            r,
            screen,
            global_color_table,
            loop_count: 1,
            control: None,
            done: false,
        })
    }

    pub fn screen(&self) -> &LogicalScreenDescriptor {
        &self.screen
    }

    pub fn width(&self) -> u16 {
        self.screen.width
    }

    pub fn height(&self) -> u16 {
        self.screen.height
    }

    /// The global color palette
    pub fn global_palette(&self) -> Option<&ColorTable> {
        self.global_color_table.as_ref()
    }

    /// The declared background color, transparent without a global table.
    pub fn background_color(&self) -> Rgba {
        self.global_color_table
            .as_ref()
            .and_then(|t| t.get(self.screen.background_index))
            .map(|[r, g, b]| [r, g, b, 0xFF])
            .unwrap_or([0; 4])
    }

    /// Loop count seen so far; 1 until a loop extension was read.
    pub fn loop_count(&self) -> u16 {
        self.loop_count
    }

    /// Offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.r.offset()
    }

    /// Reads blocks up to and including the next image. Returns `None` once
    /// the trailer was reached.
    pub fn next_frame(&mut self) -> Result<Option<IndexedFrame>> {
        while !self.done {
            let offset = self.r.offset();
            let introducer = self.r.read_u8()?;
            match Block::from_u8(introducer) {
                Some(Block::Extension) => self.read_extension()?,
                Some(Block::Image) => return self.read_image(offset).map(Some),
                Some(Block::Trailer) => {
                    trace!(offset, "trailer");
                    self.done = true;
                }
                None => {
                    return Err(Error::CorruptStream {
                        offset,
                        reason: "unknown block type encountered",
                    })
                }
            }
        }
        Ok(None)
    }

    fn read_extension(&mut self) -> Result<()> {
        let offset = self.r.offset();
        let label = self.r.read_u8()?;
        match Extension::from_u8(label) {
            Some(Extension::Control) => self.read_control_extension(),
            Some(Extension::Application) => self.read_application_extension(),
            Some(Extension::Text) | Some(Extension::Comment) | None => {
                debug!(offset, label, "skipping extension");
                self.r.skip_blocks()
            }
        }
    }

    fn read_control_extension(&mut self) -> Result<()> {
        let offset = self.r.offset();
        let (flags, delay, transparent) = match self.r.read_block()? {
            Some(&[flags, lo, hi, transparent]) => (flags, u16::from_le_bytes([lo, hi]), transparent),
            _ => {
                return Err(Error::CorruptStream {
                    offset,
                    reason: "control extension has wrong length",
                })
            }
        };
        self.r.skip_blocks()?;

        let (control, known) = GraphicControl::from_packed(flags, delay, transparent);
        if !known {
            warn!(offset, flags, "reserved disposal method, treating as unspecified");
        }
        if self.control.is_some() {
            debug!(offset, "control extension replaces an unused one");
        }
        trace!(offset, ?control, "control extension");
        self.control = Some(control);
        Ok(())
    }

    fn read_application_extension(&mut self) -> Result<()> {
        let offset = self.r.offset();
        let Some(identifier) = self.r.read_block()? else {
            return Ok(());
        };
        if !LOOP_APPLICATIONS.contains(&identifier) {
            debug!(offset, "skipping unknown application extension");
            return self.r.skip_blocks();
        }
        while let Some(sub) = self.r.read_block()? {
            if let &[1, lo, hi, ..] = sub {
                self.loop_count = u16::from_le_bytes([lo, hi]);
                trace!(offset, loop_count = self.loop_count, "loop extension");
            }
        }
        Ok(())
    }

    fn read_image(&mut self, offset: usize) -> Result<IndexedFrame> {
        let left = self.r.read_u16_le()?;
        let top = self.r.read_u16_le()?;
        let width = self.r.read_u16_le()?;
        let height = self.r.read_u16_le()?;
        let flags = self.r.read_u8()?;
        let descriptor = ImageDescriptor::with_flags(left, top, width, height, flags);

        let palette = if descriptor.local_color_table {
            Some(self.r.read_color_table(descriptor.local_table_len())?)
        } else {
            None
        };
        if palette.is_none() && self.global_color_table.is_none() && descriptor.pixel_count() > 0 {
            return Err(Error::CorruptStream {
                offset,
                reason: "image has neither a local nor a global color table",
            });
        }

        let min_code_size = self.r.read_u8()?;
        let data_offset = self.r.offset();
        let mut data = Vec::new();
        while let Some(block) = self.r.read_block()? {
            data.extend_from_slice(block);
        }
        let expected = descriptor.pixel_count();
        let indices = lzw::decompress(&data, min_code_size, expected, data_offset)?;
        if indices.len() < expected {
            debug!(
                offset,
                decoded = indices.len(),
                expected,
                "image data ended early"
            );
        }

        let control = self.control.take().unwrap_or_default();
        trace!(offset, left, top, width, height, "image block");
        Ok(IndexedFrame {
            control,
            descriptor,
            palette,
            indices,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::DisposalMethod;

    const HEADER_1X1: [u8; 19] = [
        b'G', b'I', b'F', b'8', b'9', b'a', 1, 0, 1, 0, 0x80, 0, 0, // screen
        0xFF, 0, 0, 0, 0, 0, // global table: red, black
    ];
    const IMAGE_1X1: [u8; 15] = [
        0x2C, 0, 0, 0, 0, 1, 0, 1, 0, 0, // descriptor
        2, 2, 0x44, 0x01, 0, // lzw data
    ];

    fn stream(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    #[test]
    fn reads_header() {
        let data = stream(&[&HEADER_1X1, &[0x3B]]);
        let mut decoder = Decoder::new(&data).unwrap();
        assert_eq!(decoder.width(), 1);
        assert_eq!(decoder.global_palette().unwrap().len(), 2);
        assert_eq!(decoder.background_color(), [0xFF, 0, 0, 0xFF]);
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert_eq!(decoder.next_frame().unwrap(), None);
    }

    #[test]
    fn signature_errors() {
        assert!(matches!(
            Decoder::new(b"PNG\r\n\x1a\n....."),
            Err(Error::UnsupportedFormat)
        ));
        assert!(matches!(
            Decoder::new(b"GIF90a\x01\x00\x01\x00\x00\x00\x00;"),
            Err(Error::UnsupportedFormat)
        ));
        assert!(matches!(
            Decoder::new(b"GIF8"),
            Err(Error::TruncatedStream { offset: 4 })
        ));
    }

    #[test]
    fn zero_sized_screen() {
        let data = b"GIF89a\x00\x00\x01\x00\x00\x00\x00;";
        assert!(matches!(
            Decoder::new(data),
            Err(Error::CorruptHeader { offset: 6, .. })
        ));
    }

    #[test]
    fn last_control_extension_wins() {
        let gce_a = [0x21, 0xF9, 4, 0b0000_0100, 5, 0, 0, 0];
        let gce_b = [0x21, 0xF9, 4, 0b0000_1001, 7, 0, 1, 0];
        let data = stream(&[&HEADER_1X1, &gce_a, &gce_b, &IMAGE_1X1, &IMAGE_1X1, &[0x3B]]);
        let mut decoder = Decoder::new(&data).unwrap();

        let first = decoder.next_frame().unwrap().unwrap();
        assert_eq!(first.control.delay, 7);
        assert_eq!(first.control.dispose, DisposalMethod::Background);
        assert_eq!(first.control.transparent, Some(1));
        assert_eq!(first.indices, [0]);

        // consumed once: the second image gets defaults
        let second = decoder.next_frame().unwrap().unwrap();
        assert_eq!(second.control, GraphicControl::default());
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn loop_count_and_skipped_extensions() {
        let netscape = [
            0x21, 0xFF, 11, b'N', b'E', b'T', b'S', b'C', b'A', b'P', b'E', b'2', b'.', b'0', 3, 1,
            5, 0, 0,
        ];
        let comment = [0x21, 0xFE, 3, b'h', b'e', b'y', 0];
        let text = [0x21, 0x01, 2, 0, 0, 0];
        let unknown = [0x21, 0x42, 1, 9, 0];
        let data = stream(&[
            &HEADER_1X1,
            &netscape,
            &comment,
            &text,
            &unknown,
            &IMAGE_1X1,
            &[0x3B],
        ]);
        let mut decoder = Decoder::new(&data).unwrap();
        assert!(decoder.next_frame().unwrap().is_some());
        assert_eq!(decoder.loop_count(), 5);
    }

    #[test]
    fn unknown_block_is_corrupt() {
        let data = stream(&[&HEADER_1X1, &[0x00]]);
        let mut decoder = Decoder::new(&data).unwrap();
        assert!(matches!(
            decoder.next_frame(),
            Err(Error::CorruptStream { offset: 19, .. })
        ));
    }

    #[test]
    fn missing_trailer_is_truncated() {
        let data = stream(&[&HEADER_1X1, &IMAGE_1X1]);
        let mut decoder = Decoder::new(&data).unwrap();
        assert!(decoder.next_frame().unwrap().is_some());
        assert!(matches!(
            decoder.next_frame(),
            Err(Error::TruncatedStream { .. })
        ));
    }

    #[test]
    fn bad_control_length() {
        let gce = [0x21, 0xF9, 3, 0, 0, 0, 0];
        let data = stream(&[&HEADER_1X1, &gce, &IMAGE_1X1, &[0x3B]]);
        let mut decoder = Decoder::new(&data).unwrap();
        assert!(matches!(
            decoder.next_frame(),
            Err(Error::CorruptStream { offset: 21, .. })
        ));
    }

    #[test]
    fn image_without_palette() {
        let data = stream(&[
            b"GIF89a\x01\x00\x01\x00\x00\x00\x00",
            &IMAGE_1X1,
            &[0x3B],
        ]);
        let mut decoder = Decoder::new(&data).unwrap();
        assert!(matches!(
            decoder.next_frame(),
            Err(Error::CorruptStream { offset: 13, .. })
        ));
    }

    #[test]
    fn local_table_is_read() {
        let image = [
            0x2C, 0, 0, 0, 0, 1, 0, 1, 0, 0x80, // descriptor with 2 entry local table
            0, 0xFF, 0, 1, 2, 3, // local table
            2, 2, 0x44, 0x01, 0,
        ];
        let data = stream(&[&HEADER_1X1, &image, &[0x3B]]);
        let mut decoder = Decoder::new(&data).unwrap();
        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.palette.unwrap().get(0), Some([0, 0xFF, 0]));
    }
}
