//! Sixel graphics encoding backend

use super::FrameEncoder;
use image::RgbaImage;
use std::fmt::Write as FmtWrite;

/// Quantization levels per channel; 6*6*6 = 216 registers fits the
/// conventional 256-register sixel limit
const LEVELS: u16 = 6;

impl FrameEncoder {
    /// Encode to a sixel stream with a fixed 216-color cube palette.
    ///
    /// Expects the image already scaled to the output pixel size. The
    /// stream positions nothing itself; the painter places the cursor.
    pub(super) fn encode_sixel(&mut self, rgba: &RgbaImage) -> String {
        let (width, height) = rgba.dimensions();
        let indexed = quantize(rgba);

        let mut out = String::with_capacity((width * height / 4) as usize);
        out.push_str("\x1bPq");
        write!(out, "\"1;1;{};{}", width, height).ok();

        // Palette registers: 0..=100 intensity scale per the sixel spec
        for idx in 0..LEVELS * LEVELS * LEVELS {
            let (r, g, b) = cube_color(idx);
            write!(out, "#{};2;{};{};{}", idx, r, g, b).ok();
        }

        let mut band_colors: Vec<u16> = Vec::new();
        for band_top in (0..height).step_by(6) {
            band_colors.clear();
            for y in band_top..(band_top + 6).min(height) {
                for x in 0..width {
                    let c = indexed[(y * width + x) as usize];
                    if !band_colors.contains(&c) {
                        band_colors.push(c);
                    }
                }
            }

            for (i, &color) in band_colors.iter().enumerate() {
                if i > 0 {
                    out.push('$'); // carriage return within the band
                }
                write!(out, "#{}", color).ok();

                let mut run_char = 0u8;
                let mut run_len = 0u32;
                for x in 0..width {
                    let mut bits = 0u8;
                    for dy in 0..6 {
                        let y = band_top + dy;
                        if y < height && indexed[(y * width + x) as usize] == color {
                            bits |= 1 << dy;
                        }
                    }
                    let ch = b'?' + bits;
                    if ch == run_char {
                        run_len += 1;
                    } else {
                        flush_run(&mut out, run_char, run_len);
                        run_char = ch;
                        run_len = 1;
                    }
                }
                flush_run(&mut out, run_char, run_len);
            }
            out.push('-'); // next band
        }

        out.push_str("\x1b\\");
        self.passthrough(&out)
    }
}

/// Emit a run of sixel characters, using `!n` repeat introducers for long runs
fn flush_run(out: &mut String, ch: u8, len: u32) {
    if len == 0 {
        return;
    }
    if len > 3 {
        write!(out, "!{}{}", len, ch as char).ok();
    } else {
        for _ in 0..len {
            out.push(ch as char);
        }
    }
}

/// Map every pixel to its palette register in the color cube
fn quantize(rgba: &RgbaImage) -> Vec<u16> {
    rgba.pixels()
        .map(|p| {
            let r = p.0[0] as u16 * (LEVELS - 1) / 255;
            let g = p.0[1] as u16 * (LEVELS - 1) / 255;
            let b = p.0[2] as u16 * (LEVELS - 1) / 255;
            (r * LEVELS + g) * LEVELS + b
        })
        .collect()
}

/// Palette register back to 0-100 intensity triple
fn cube_color(idx: u16) -> (u16, u16, u16) {
    let r = idx / (LEVELS * LEVELS);
    let g = (idx / LEVELS) % LEVELS;
    let b = idx % LEVELS;
    (
        r * 100 / (LEVELS - 1),
        g * 100 / (LEVELS - 1),
        b * 100 / (LEVELS - 1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::GraphicsBackend;
    use crate::terminal::TerminalGeometry;

    #[test]
    fn test_sixel_stream_framing() {
        let geom = TerminalGeometry::with_cell_size(80, 24, 10, 20);
        let mut enc = FrameEncoder::new(GraphicsBackend::Sixel, &geom, false);

        let rgba = RgbaImage::from_pixel(12, 12, image::Rgba([255, 255, 255, 255]));
        let text = enc.encode_sixel(&rgba);

        assert!(text.starts_with("\x1bPq\"1;1;12;12"));
        assert!(text.ends_with("\x1b\\"));
        // 12 rows is two sixel bands
        assert_eq!(text.matches('-').count(), 2);
    }

    #[test]
    fn test_quantize_extremes() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([255, 255, 255, 255]));
        let indexed = quantize(&img);
        assert_eq!(indexed[0], 0);
        assert_eq!(indexed[1], LEVELS * LEVELS * LEVELS - 1);
    }

    #[test]
    fn test_flush_run_uses_repeat_introducer() {
        let mut s = String::new();
        flush_run(&mut s, b'~', 10);
        assert_eq!(s, "!10~");

        let mut s = String::new();
        flush_run(&mut s, b'~', 2);
        assert_eq!(s, "~~");
    }
}
