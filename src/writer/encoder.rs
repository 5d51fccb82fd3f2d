use std::io::prelude::*;

use tracing::trace;

use crate::error::{Error, Result};
use crate::lzw;
use crate::traits::WriteBytesExt;
use crate::types::{
    row_order, Block, ColorTable, Extension, GraphicControl, ImageDescriptor, IndexedFrame,
    LogicalScreenDescriptor, SIGNATURE_89A,
};

/// Extensions the encoder knows how to write.
pub enum ExtensionData {
    Control { flags: u8, delay: u16, trns: u8 },
    /// NETSCAPE2.0 loop count, 0 = infinite.
    Repetitions(u16),
}

impl ExtensionData {
    pub fn new_control_ext(control: &GraphicControl) -> ExtensionData {
        ExtensionData::Control {
            flags: control.packed_flags(),
            delay: control.delay,
            trns: control.transparent.unwrap_or(0),
        }
    }
}

/// Low-level GIF writer for already indexed frames.
///
/// The header, logical screen descriptor and global color table are written
/// on construction; [`Encoder::finish`] writes the trailer.
pub struct Encoder<W: Write> {
    w: W,
    global_palette_len: Option<usize>,
    width: u16,
    height: u16,
}

impl<W: Write> Encoder<W> {
    pub fn new(
        w: W,
        width: u16,
        height: u16,
        global_palette: Option<&ColorTable>,
        background_index: u8,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::constraint(format!(
                "screen size {}x{} is empty",
                width, height
            )));
        }
        let mut encoder = Encoder {
            w,
            global_palette_len: global_palette.map(|p| p.len()),
            width,
            height,
        };
        encoder.write_screen_desc(global_palette, background_index)?;
        Ok(encoder)
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Writes a complete frame to the image
    ///
    /// Note: This function also writes a control extention if necessary.
    pub fn write_frame(&mut self, frame: &IndexedFrame) -> Result<()> {
        let d = &frame.descriptor;
        if frame.indices.len() != d.pixel_count() {
            return Err(Error::constraint(format!(
                "frame has {} indices for a {}x{} image",
                frame.indices.len(),
                d.width,
                d.height
            )));
        }
        let table_len = match (&frame.palette, self.global_palette_len) {
            (Some(palette), _) => palette.len(),
            (None, Some(len)) => len,
            (None, None) => {
                return Err(Error::constraint(
                    "The GIF format requires a color palette but none was given.",
                ))
            }
        };
        if let Some(&idx) = frame.indices.iter().find(|&&i| i as usize >= table_len) {
            return Err(Error::constraint(format!(
                "index {} is outside a color table of {} entries",
                idx, table_len
            )));
        }

        if frame.control != GraphicControl::default() {
            self.write_extension(ExtensionData::new_control_ext(&frame.control))?;
        }
        self.w.write_le(Block::Image as u8)?;
        self.w.write_le(d.left)?;
        self.w.write_le(d.top)?;
        self.w.write_le(d.width)?;
        self.w.write_le(d.height)?;
        let packed = ImageDescriptor {
            local_color_table: frame.palette.is_some(),
            local_color_table_bits: frame.palette.as_ref().map_or(0, |p| p.size_bits()),
            ..*d
        };
        self.w.write_le(packed.packed_flags())?;
        if let Some(ref palette) = frame.palette {
            self.write_color_table(palette)?;
        }

        let min_code_size = lzw::min_code_size(table_len);
        if d.interlaced {
            let width = d.width as usize;
            let mut stored = Vec::with_capacity(frame.indices.len());
            for row in row_order(d.height as usize, true) {
                stored.extend_from_slice(&frame.indices[row * width..(row + 1) * width]);
            }
            self.write_image_block(&stored, min_code_size)
        } else {
            self.write_image_block(&frame.indices, min_code_size)
        }
    }

    fn write_image_block(&mut self, data: &[u8], min_code_size: u8) -> Result<()> {
        let packed = lzw::compress(data, min_code_size)?;
        trace!(pixels = data.len(), bytes = packed.len(), "image data");
        self.w.write_le(min_code_size)?;
        self.write_sub_blocks(&packed)?;
        self.w.write_le(0u8)?;
        Ok(())
    }

    fn write_sub_blocks(&mut self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(0xFF) {
            self.w.write_le(chunk.len() as u8)?;
            self.w.write_all(chunk)?;
        }
        Ok(())
    }

    fn write_color_table(&mut self, table: &ColorTable) -> Result<()> {
        for color in table.colors() {
            self.w.write_all(color)?;
        }
        Ok(())
    }

    /// Writes an extension to the image
    pub fn write_extension(&mut self, extension: ExtensionData) -> Result<()> {
        use self::ExtensionData::*;
        match extension {
            Control { flags, delay, trns } => {
                self.w.write_le(Block::Extension as u8)?;
                self.w.write_le(Extension::Control as u8)?;
                self.w.write_le(4u8)?;
                self.w.write_le(flags)?;
                self.w.write_le(delay)?;
                self.w.write_le(trns)?;
                self.w.write_le(0u8)?;
            }
            Repetitions(count) => {
                let [lo, hi] = count.to_le_bytes();
                self.write_raw_extension(
                    Extension::Application as u8,
                    &[&b"NETSCAPE2.0"[..], &[1, lo, hi][..]],
                )?;
            }
        }
        Ok(())
    }

    /// Writes an extension made of the given sub-blocks. Blocks longer than
    /// 255 bytes are split.
    pub fn write_raw_extension(&mut self, func: u8, blocks: &[&[u8]]) -> Result<()> {
        self.w.write_le(Block::Extension as u8)?;
        self.w.write_le(func)?;
        for block in blocks {
            self.write_sub_blocks(block)?;
        }
        self.w.write_le(0u8)?;
        Ok(())
    }

    /// Writes the logical screen desriptor
    fn write_screen_desc(&mut self, global_palette: Option<&ColorTable>, bg: u8) -> Result<()> {
        self.w.write_all(SIGNATURE_89A)?;
        self.w.write_le(self.width)?;
        self.w.write_le(self.height)?;
        let screen = LogicalScreenDescriptor {
            width: self.width,
            height: self.height,
            global_color_table: global_palette.is_some(),
            // 8 bits of color resolution
            color_resolution: if global_palette.is_some() { 7 } else { 0 },
            sorted: false,
            global_color_table_bits: global_palette.map_or(0, |p| p.size_bits()),
            background_index: bg,
            pixel_aspect_ratio: 0,
        };
        self.w.write_le(screen.packed_flags())?;
        self.w.write_le(screen.background_index)?;
        self.w.write_le(screen.pixel_aspect_ratio)?;
        if let Some(palette) = global_palette {
            self.write_color_table(palette)?;
        }
        Ok(())
    }

    /// Writes the trailer and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.w.write_le(Block::Trailer as u8)?;
        self.w.flush()?;
        Ok(self.w)
    }
}
