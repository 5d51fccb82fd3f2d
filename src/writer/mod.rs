use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::{HasParameters, Parameter};
use crate::types::{
    duration_to_delay, AnimatedImage, DisposalMethod, GraphicControl, ImageDescriptor,
    IndexedFrame, N_CHANNELS,
};

mod encoder;
mod quantize;

pub use self::encoder::{Encoder, ExtensionData};
pub use self::quantize::Quantizer;

/// Where frame palettes are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaletteMode {
    /// One global table reduced across all frames.
    #[default]
    Global,
    /// One local table per frame.
    Local,
}

impl Parameter<EncodeOptions> for PaletteMode {
    fn set_param(self, this: &mut EncodeOptions) {
        this.palette = self
    }
}

/// Maximum number of palette entries, including the transparent one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteSize(pub u16);

impl Parameter<EncodeOptions> for PaletteSize {
    fn set_param(self, this: &mut EncodeOptions) {
        this.target_palette_size = self.0
    }
}

/// Overrides the animation's loop count, 0 = infinite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopCount(pub u16);

impl Parameter<EncodeOptions> for LoopCount {
    fn set_param(self, this: &mut EncodeOptions) {
        this.loop_count = Some(self.0)
    }
}

/// Error diffusion when colors have to be approximated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dither(pub bool);

impl Parameter<EncodeOptions> for Dither {
    fn set_param(self, this: &mut EncodeOptions) {
        this.dither = self.0
    }
}

/// Encoder configuration parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// In `2..=256`.
    pub target_palette_size: u16,
    /// `None` keeps the loop count of the image: an image with a count of
    /// 1 is written without a loop extension and plays once, 0 loops
    /// forever.
    pub loop_count: Option<u16>,
    pub dither: bool,
    pub palette: PaletteMode,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            target_palette_size: 256,
            loop_count: None,
            dither: false,
            palette: PaletteMode::Global,
        }
    }
}

impl HasParameters for EncodeOptions {}

impl EncodeOptions {
    pub fn new() -> EncodeOptions {
        EncodeOptions::default()
    }
}

fn has_transparency(rgba: &[u8]) -> bool {
    rgba.chunks_exact(N_CHANNELS).any(|px| px[3] == 0)
}

/// Encodes an animation as a GIF89a stream.
///
/// Every frame is written at full screen size. Pixels with zero alpha become
/// transparent, all others are written opaque. Delays are stored in
/// centiseconds and never below 20 ms, since shorter stored delays are shown
/// for 100 ms when decoded.
pub fn encode(image: &AnimatedImage, options: &EncodeOptions) -> Result<Vec<u8>> {
    image.validate()?;
    let max_colors = options.target_palette_size as usize;
    if !(2..=256).contains(&max_colors) {
        return Err(Error::constraint(format!(
            "palette size {} is outside 2..=256",
            max_colors
        )));
    }
    let (width, height) = (image.width, image.height);
    let loop_count = options.loop_count.unwrap_or(image.loop_count);

    let global = match options.palette {
        PaletteMode::Global => Some(Quantizer::new(
            image.frames.iter().map(|f| &f.buffer[..]),
            max_colors,
        )),
        PaletteMode::Local => None,
    };
    let global_table = global.as_ref().map(|q| q.color_table()).transpose()?;
    let background_index = match (&global_table, image.background) {
        (Some(table), [r, g, b, a]) if a != 0 => table.position([r, g, b]).unwrap_or(0),
        _ => 0,
    };

    let mut encoder = Encoder::new(
        Vec::new(),
        width,
        height,
        global_table.as_ref(),
        background_index,
    )?;
    if loop_count != 1 {
        encoder.write_extension(ExtensionData::Repetitions(loop_count))?;
    }

    for (i, frame) in image.frames.iter().enumerate() {
        let local;
        let (quantizer, palette) = match global {
            Some(ref q) => (q, None),
            None => {
                local = Quantizer::new([&frame.buffer[..]], max_colors);
                let table = local.color_table()?;
                (&local, Some(table))
            }
        };

        // Full-screen frames composite exactly when the canvas is cleared
        // before a frame that has holes.
        let next_has_holes = image
            .frames
            .get(i + 1)
            .map_or(false, |next| has_transparency(&next.buffer));
        let dispose = if next_has_holes {
            DisposalMethod::Background
        } else {
            frame.dispose
        };

        encoder.write_frame(&IndexedFrame {
            control: GraphicControl {
                dispose,
                needs_user_input: false,
                transparent: quantizer.transparent(),
                delay: duration_to_delay(frame.delay),
            },
            descriptor: ImageDescriptor {
                width,
                height,
                ..Default::default()
            },
            palette,
            indices: quantizer.map(&frame.buffer, width as usize, options.dither),
        })?;
    }

    let data = encoder.finish()?;
    debug!(
        width,
        height,
        frames = image.frames.len(),
        bytes = data.len(),
        "encoded GIF"
    );
    Ok(data)
}
