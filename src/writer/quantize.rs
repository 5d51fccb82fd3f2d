//! Palette reduction for RGBA frames
use std::collections::HashMap;

use color_quant::NeuQuant;

use crate::error::Result;
use crate::types::{ColorTable, N_CHANNELS};

/// NeuQuant sampling factor, 1 is best quality and 30 fastest.
const SAMPLE_FACTOR: i32 = 10;

enum Method {
    /// Every opaque color has its own entry.
    Exact(HashMap<[u8; 3], u8>),
    /// Colors are approximated by a trained network.
    Network(NeuQuant),
    /// Only one opaque slot is available.
    Single,
}

/// Maps RGBA pixels onto a palette of at most `max_colors` entries.
///
/// Pixels with zero alpha share one transparent entry placed after the
/// opaque colors. Any other alpha value counts as opaque.
pub struct Quantizer {
    colors: Vec<[u8; 3]>,
    transparent: Option<u8>,
    method: Method,
}

impl Quantizer {
    /// Builds a palette covering all of `frames`. `max_colors` must be in
    /// `2..=256`.
    pub fn new<'a, I>(frames: I, max_colors: usize) -> Quantizer
    where
        I: IntoIterator<Item = &'a [u8]> + Clone,
    {
        let mut has_transparent = false;
        let mut exact: HashMap<[u8; 3], u8> = HashMap::new();
        let mut colors = Vec::new();
        let mut overflow = false;
        for frame in frames.clone() {
            for px in frame.chunks_exact(N_CHANNELS) {
                if px[3] == 0 {
                    has_transparent = true;
                    continue;
                }
                let rgb = [px[0], px[1], px[2]];
                if overflow || exact.contains_key(&rgb) {
                    continue;
                }
                if colors.len() == max_colors {
                    overflow = true;
                    continue;
                }
                exact.insert(rgb, colors.len() as u8);
                colors.push(rgb);
            }
        }

        let slots = max_colors - has_transparent as usize;
        let method = if !overflow && colors.len() <= slots {
            Method::Exact(exact)
        } else if slots == 1 {
            colors = vec![mean_color(frames)];
            Method::Single
        } else {
            let mut samples = Vec::new();
            for frame in frames {
                for px in frame.chunks_exact(N_CHANNELS).filter(|px| px[3] != 0) {
                    samples.extend_from_slice(&[px[0], px[1], px[2], 0xFF]);
                }
            }
            let nq = NeuQuant::new(SAMPLE_FACTOR, slots, &samples);
            colors = nq
                .color_map_rgb()
                .chunks_exact(3)
                .map(|c| [c[0], c[1], c[2]])
                .collect();
            Method::Network(nq)
        };

        let transparent = if has_transparent {
            colors.push([0, 0, 0]);
            Some((colors.len() - 1) as u8)
        } else {
            None
        };
        Quantizer {
            colors,
            transparent,
            method,
        }
    }

    /// Whether every color is represented without loss.
    pub fn is_exact(&self) -> bool {
        matches!(self.method, Method::Exact(_))
    }

    /// Index used for fully transparent pixels.
    pub fn transparent(&self) -> Option<u8> {
        self.transparent
    }

    pub fn color_table(&self) -> Result<ColorTable> {
        ColorTable::new(self.colors.clone())
    }

    fn index_of(&self, rgb: [u8; 3]) -> u8 {
        match self.method {
            Method::Exact(ref map) => map.get(&rgb).copied().unwrap_or(0),
            Method::Network(ref nq) => nq.index_of(&[rgb[0], rgb[1], rgb[2], 0xFF]) as u8,
            Method::Single => 0,
        }
    }

    /// Maps one frame of `width` pixels per row to palette indices,
    /// optionally diffusing the quantization error (Floyd-Steinberg).
    pub fn map(&self, pixels: &[u8], width: usize, dither: bool) -> Vec<u8> {
        if !dither || self.is_exact() || width == 0 {
            return pixels
                .chunks_exact(N_CHANNELS)
                .map(|px| match (px[3], self.transparent) {
                    (0, Some(t)) => t,
                    _ => self.index_of([px[0], px[1], px[2]]),
                })
                .collect();
        }

        let n = pixels.len() / N_CHANNELS;
        let mut error = vec![[0i32; 3]; n];
        let mut indices = Vec::with_capacity(n);
        for i in 0..n {
            let px = &pixels[i * N_CHANNELS..(i + 1) * N_CHANNELS];
            if let (0, Some(t)) = (px[3], self.transparent) {
                indices.push(t);
                continue;
            }
            let mut want = [0u8; 3];
            for c in 0..3 {
                want[c] = (px[c] as i32 + error[i][c] / 16).clamp(0, 255) as u8;
            }
            let idx = self.index_of(want);
            indices.push(idx);

            let got = self.colors[idx as usize];
            let (x, last_row) = (i % width, i + width >= n);
            for c in 0..3 {
                let e = want[c] as i32 - got[c] as i32;
                if x + 1 < width {
                    error[i + 1][c] += e * 7;
                }
                if !last_row {
                    if x > 0 {
                        error[i + width - 1][c] += e * 3;
                    }
                    error[i + width][c] += e * 5;
                    if x + 1 < width {
                        error[i + width + 1][c] += e;
                    }
                }
            }
        }
        indices
    }
}

fn mean_color<'a, I: IntoIterator<Item = &'a [u8]>>(frames: I) -> [u8; 3] {
    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for frame in frames {
        for px in frame.chunks_exact(N_CHANNELS).filter(|px| px[3] != 0) {
            for c in 0..3 {
                sum[c] += px[c] as u64;
            }
            count += 1;
        }
    }
    let count = count.max(1);
    [
        (sum[0] / count) as u8,
        (sum[1] / count) as u8,
        (sum[2] / count) as u8,
    ]
}
