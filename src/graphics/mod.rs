//! Terminal graphics encoding - turns raw pixel buffers into printable
//! escape-sequence strings
//!
//! The encoder is deliberately decoupled from the terminal sink: `encode()`
//! returns a string plus its cell footprint, and the caller decides where
//! (and whether) to print it. This is what lets the video pipeline encode
//! frames on the decode thread while painting stays on the main thread.

mod blocks;
pub mod kitty;
mod sixel;

use crate::terminal::{TerminalCapabilities, TerminalGeometry};
use anyhow::{bail, Result};
use image::RgbaImage;

/// Pre-allocated capacity for escape sequence scratch buffers
const ESCAPE_BUFFER_CAPACITY: usize = 256;

/// Graphics rendering backends, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicsBackend {
    /// Kitty graphics protocol
    Kitty,
    /// Sixel graphics
    Sixel,
    /// Unicode half-block characters (universal fallback)
    Blocks,
}

impl GraphicsBackend {
    /// Pick the best backend the terminal supports
    pub fn detect(caps: &TerminalCapabilities) -> Self {
        if caps.kitty_graphics {
            GraphicsBackend::Kitty
        } else if caps.sixel {
            GraphicsBackend::Sixel
        } else {
            GraphicsBackend::Blocks
        }
    }

    /// Parse a backend name from config or the command line
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "kitty" => Some(GraphicsBackend::Kitty),
            "sixel" => Some(GraphicsBackend::Sixel),
            "blocks" => Some(GraphicsBackend::Blocks),
            _ => None,
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            GraphicsBackend::Kitty => "kitty",
            GraphicsBackend::Sixel => "sixel",
            GraphicsBackend::Blocks => "blocks",
        }
    }
}

/// One encoded image: printable text plus its cell footprint.
///
/// For the blocks backend `text` holds one terminal row per line (separated
/// by `\n`) so the painter can position each row; Kitty and Sixel produce a
/// single blob printed at the top-left cell, with `rows` still reporting the
/// vertical extent for clear tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub text: String,
    pub cols: u16,
    pub rows: u16,
}

/// Stateful frame encoder.
///
/// The only mutable state is the output-geometry configuration (cell pixel
/// size, refreshed on terminal resize) and scratch buffers; `encode()` is
/// otherwise a pure function of its inputs. Callers that share an encoder
/// across threads wrap it in a mutex held for the duration of one call.
pub struct FrameEncoder {
    backend: GraphicsBackend,
    in_tmux: bool,
    cell_width: u16,
    cell_height: u16,
    /// Scratch buffer for building escape sequences
    escape_buffer: String,
}

impl FrameEncoder {
    /// Create an encoder for the given backend and terminal geometry
    pub fn new(backend: GraphicsBackend, geometry: &TerminalGeometry, in_tmux: bool) -> Self {
        FrameEncoder {
            backend,
            in_tmux,
            cell_width: geometry.cell_width.max(1),
            cell_height: geometry.cell_height.max(1),
            escape_buffer: String::with_capacity(ESCAPE_BUFFER_CAPACITY),
        }
    }

    /// Current backend
    pub fn backend(&self) -> GraphicsBackend {
        self.backend
    }

    /// Re-read the cell pixel size after the terminal was resized
    pub fn refresh_geometry(&mut self, geometry: &TerminalGeometry) {
        self.cell_width = geometry.cell_width.max(1);
        self.cell_height = geometry.cell_height.max(1);
    }

    /// Encode a raw pixel buffer into printable terminal text.
    ///
    /// `stride` is the source row pitch in bytes; `channels` is 3 (RGB) or
    /// 4 (RGBA). Output geometry is constrained to `max_px_w × max_px_h`
    /// preserving aspect ratio.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        stride: usize,
        channels: u8,
        max_px_w: u32,
        max_px_h: u32,
    ) -> Result<EncodedFrame> {
        if width == 0 || height == 0 || max_px_w == 0 || max_px_h == 0 {
            bail!("degenerate image geometry {}x{}", width, height);
        }

        let rgba = copy_to_rgba(pixels, width, height, stride, channels)?;
        let (out_w, out_h) = fit_dimensions(width, height, max_px_w, max_px_h);
        let cols = (out_w.div_ceil(self.cell_width as u32)).max(1) as u16;
        let rows = (out_h.div_ceil(self.cell_height as u32)).max(1) as u16;

        let text = match self.backend {
            GraphicsBackend::Kitty => self.encode_kitty(&rgba, cols, rows)?,
            GraphicsBackend::Sixel => {
                let scaled = scale_to(&rgba, out_w, out_h);
                self.encode_sixel(&scaled)
            }
            GraphicsBackend::Blocks => {
                // Half blocks pack two pixels per cell vertically
                let scaled = scale_to(&rgba, cols as u32, rows as u32 * 2);
                self.encode_blocks(&scaled)
            }
        };

        Ok(EncodedFrame { text, cols, rows })
    }

    /// Wrap an escape sequence for tmux passthrough when multiplexed
    fn passthrough(&self, sequence: &str) -> String {
        if !self.in_tmux {
            return sequence.to_string();
        }
        let escaped = sequence.replace('\x1b', "\x1b\x1b");
        format!("\x1bPtmux;{}\x1b\\", escaped)
    }
}

/// Fit `w × h` into `max_w × max_h` preserving aspect ratio
fn fit_dimensions(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let scale = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
    (
        ((w as f64 * scale) as u32).max(1),
        ((h as f64 * scale) as u32).max(1),
    )
}

/// Copy a possibly-padded pixel buffer into a tightly packed RGBA image
fn copy_to_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    channels: u8,
) -> Result<RgbaImage> {
    let row_bytes = width as usize * channels as usize;
    if stride < row_bytes || pixels.len() < stride * (height as usize - 1) + row_bytes {
        bail!("pixel buffer too small for {}x{} stride {}", width, height, stride);
    }

    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height as usize {
        let row = &pixels[y * stride..y * stride + row_bytes];
        match channels {
            4 => rgba.extend_from_slice(row),
            3 => {
                for px in row.chunks_exact(3) {
                    rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
            }
            other => bail!("unsupported channel count {}", other),
        }
    }

    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow::anyhow!("invalid RGBA buffer dimensions"))
}

/// Downscale (or upscale) to exactly `w × h`
fn scale_to(rgba: &RgbaImage, w: u32, h: u32) -> RgbaImage {
    if rgba.dimensions() == (w, h) {
        return rgba.clone();
    }
    image::imageops::resize(rgba, w.max(1), h.max(1), image::imageops::FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_name() {
        assert_eq!(GraphicsBackend::from_name("kitty"), Some(GraphicsBackend::Kitty));
        assert_eq!(GraphicsBackend::from_name("blocks"), Some(GraphicsBackend::Blocks));
        assert_eq!(GraphicsBackend::from_name("webgl"), None);
    }

    #[test]
    fn test_fit_dimensions_preserves_aspect() {
        assert_eq!(fit_dimensions(1920, 1080, 800, 800), (800, 450));
        assert_eq!(fit_dimensions(1080, 1920, 800, 800), (450, 800));
        // Upscaling small sources is allowed
        assert_eq!(fit_dimensions(100, 100, 400, 200), (200, 200));
    }

    #[test]
    fn test_copy_to_rgba_handles_stride_padding() {
        // 2x2 RGB with 2 bytes of row padding
        let mut pixels = Vec::new();
        for row in 0..2 {
            for col in 0..2 {
                pixels.extend_from_slice(&[row * 100, col * 100, 7]);
            }
            pixels.extend_from_slice(&[0xAA, 0xBB]); // padding
        }
        let rgba = copy_to_rgba(&pixels, 2, 2, 8, 3).unwrap();
        assert_eq!(rgba.get_pixel(1, 1).0, [100, 100, 7, 255]);
    }

    #[test]
    fn test_copy_to_rgba_rejects_short_buffer() {
        assert!(copy_to_rgba(&[0u8; 10], 2, 2, 8, 4).is_err());
    }

    #[test]
    fn test_encode_blocks_smoke() {
        let geom = crate::terminal::TerminalGeometry::with_cell_size(80, 24, 10, 20);
        let mut enc = FrameEncoder::new(GraphicsBackend::Blocks, &geom, false);
        let pixels = vec![255u8; 16 * 16 * 4];
        let frame = enc.encode(&pixels, 16, 16, 64, 4, 100, 100).unwrap();
        assert!(frame.cols >= 1 && frame.rows >= 1);
        assert_eq!(frame.text.lines().count(), frame.rows as usize);
    }
}
