//! Compositing of image blocks onto the logical screen
use tracing::{debug, warn};

use crate::types::{
    delay_to_duration, row_order, ColorTable, DisposalMethod, Frame, IndexedFrame, Rgba,
    MIN_DELAY_CS, N_CHANNELS,
};

/// Area of a frame after clipping to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    left: usize,
    top: usize,
    width: usize,
    height: usize,
}

/// What has to happen to the canvas before the next frame is drawn.
#[derive(Debug)]
struct Pending {
    method: DisposalMethod,
    rect: Rect,
    saved: Option<Vec<u8>>,
}

/// The running RGBA canvas of a decode call.
#[derive(Debug)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    fill: Rgba,
    pending: Option<Pending>,
}

impl Canvas {
    /// Creates a canvas filled with `fill`, which is also what
    /// restore-to-background clears to.
    pub fn new(width: u16, height: u16, fill: Rgba) -> Canvas {
        let (width, height) = (width as usize, height as usize);
        let mut pixels = vec![0; width * height * N_CHANNELS];
        for px in pixels.chunks_exact_mut(N_CHANNELS) {
            px.copy_from_slice(&fill);
        }
        Canvas {
            width,
            height,
            pixels,
            fill,
            pending: None,
        }
    }

    /// Disposes the previous frame, draws `frame` with `palette` and returns
    /// a snapshot of the whole canvas.
    pub fn compose(&mut self, frame: &IndexedFrame, palette: Option<&ColorTable>) -> Frame {
        self.dispose_previous();

        let rect = self.clip(frame);
        let saved = match frame.control.dispose {
            DisposalMethod::Previous => Some(self.save(rect)),
            _ => None,
        };
        if let Some(palette) = palette {
            self.draw(frame, palette);
        }
        self.pending = Some(Pending {
            method: frame.control.dispose,
            rect,
            saved,
        });

        let delay = delay_to_duration(frame.control.delay);
        if frame.control.delay < MIN_DELAY_CS {
            debug!(stored = frame.control.delay, ?delay, "delay below minimum");
        }
        Frame::new(
            self.pixels.clone(),
            delay,
            frame.control.dispose,
        )
    }

    fn dispose_previous(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        match pending.method {
            DisposalMethod::Any | DisposalMethod::Keep => (),
            DisposalMethod::Background => {
                let fill = self.fill;
                self.for_rows(pending.rect, |row| {
                    for px in row.chunks_exact_mut(N_CHANNELS) {
                        px.copy_from_slice(&fill);
                    }
                });
            }
            DisposalMethod::Previous => {
                if let Some(saved) = pending.saved {
                    let row_len = pending.rect.width * N_CHANNELS;
                    let mut rows = saved.chunks_exact(row_len.max(1));
                    self.for_rows(pending.rect, |row| {
                        if let Some(src) = rows.next() {
                            row.copy_from_slice(src);
                        }
                    });
                }
            }
        }
    }

    fn clip(&self, frame: &IndexedFrame) -> Rect {
        let d = &frame.descriptor;
        let left = (d.left as usize).min(self.width);
        let top = (d.top as usize).min(self.height);
        let right = (d.left as usize + d.width as usize).min(self.width);
        let bottom = (d.top as usize + d.height as usize).min(self.height);
        if right - left < d.width as usize || bottom - top < d.height as usize {
            warn!(
                left = d.left,
                top = d.top,
                width = d.width,
                height = d.height,
                "frame extends beyond the logical screen, clipping"
            );
        }
        Rect {
            left,
            top,
            width: right - left,
            height: bottom - top,
        }
    }

    fn save(&self, rect: Rect) -> Vec<u8> {
        let mut saved = Vec::with_capacity(rect.width * rect.height * N_CHANNELS);
        for y in rect.top..rect.top + rect.height {
            let start = (y * self.width + rect.left) * N_CHANNELS;
            saved.extend_from_slice(&self.pixels[start..start + rect.width * N_CHANNELS]);
        }
        saved
    }

    fn for_rows<F: FnMut(&mut [u8])>(&mut self, rect: Rect, mut f: F) {
        for y in rect.top..rect.top + rect.height {
            let start = (y * self.width + rect.left) * N_CHANNELS;
            f(&mut self.pixels[start..start + rect.width * N_CHANNELS]);
        }
    }

    fn draw(&mut self, frame: &IndexedFrame, palette: &ColorTable) {
        let d = &frame.descriptor;
        let width = d.width as usize;
        if width == 0 || d.height == 0 {
            return;
        }
        let rows = row_order(d.height as usize, d.interlaced);
        for (line, &row) in frame.indices.chunks(width).zip(rows.iter()) {
            let y = d.top as usize + row;
            if y >= self.height {
                continue;
            }
            for (col, &idx) in line.iter().enumerate() {
                let x = d.left as usize + col;
                if x >= self.width {
                    break;
                }
                if frame.control.transparent == Some(idx) {
                    continue;
                }
                if let Some([r, g, b]) = palette.get(idx) {
                    let i = (y * self.width + x) * N_CHANNELS;
                    self.pixels[i..i + N_CHANNELS].copy_from_slice(&[r, g, b, 0xFF]);
                }
            }
        }
    }
}
