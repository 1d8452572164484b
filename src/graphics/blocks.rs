//! Unicode half-block encoding backend (universal fallback)

use super::FrameEncoder;
use image::RgbaImage;
use std::fmt::Write as FmtWrite;

impl FrameEncoder {
    /// Encode using `▀` half-blocks: one cell covers two vertically stacked
    /// pixels, foreground colors the top half and background the bottom.
    ///
    /// Expects the image already scaled to `cols × rows*2` pixels. Rows are
    /// separated by `\n`; each row resets attributes at its end so the text
    /// can be printed anywhere without leaking colors.
    pub(super) fn encode_blocks(&mut self, rgba: &RgbaImage) -> String {
        let (width, height) = rgba.dimensions();
        let rows = height / 2;
        let mut out = String::with_capacity((width * rows * 20) as usize);

        for cy in 0..rows {
            if cy > 0 {
                out.push('\n');
            }
            let mut last: Option<([u8; 3], [u8; 3])> = None;
            for cx in 0..width {
                let top = rgba.get_pixel(cx, cy * 2).0;
                let bottom = rgba.get_pixel(cx, cy * 2 + 1).0;
                let pair = ([top[0], top[1], top[2]], [bottom[0], bottom[1], bottom[2]]);

                // Skip redundant SGR sequences for runs of identical color
                if last != Some(pair) {
                    write!(
                        out,
                        "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m",
                        pair.0[0], pair.0[1], pair.0[2], pair.1[0], pair.1[1], pair.1[2]
                    )
                    .ok();
                    last = Some(pair);
                }
                out.push('▀');
            }
            out.push_str("\x1b[0m");
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::GraphicsBackend;
    use crate::terminal::TerminalGeometry;

    #[test]
    fn test_blocks_rows_and_reset() {
        let geom = TerminalGeometry::with_cell_size(80, 24, 10, 20);
        let mut enc = FrameEncoder::new(GraphicsBackend::Blocks, &geom, false);

        let rgba = RgbaImage::from_pixel(4, 6, image::Rgba([255, 0, 0, 255]));
        let text = enc.encode_blocks(&rgba);

        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 3);
        for line in &lines {
            assert!(line.ends_with("\x1b[0m"));
            assert_eq!(line.matches('▀').count(), 4);
        }
    }

    #[test]
    fn test_blocks_color_run_compression() {
        let geom = TerminalGeometry::with_cell_size(80, 24, 10, 20);
        let mut enc = FrameEncoder::new(GraphicsBackend::Blocks, &geom, false);

        // Uniform image: one SGR pair per row, not per cell
        let rgba = RgbaImage::from_pixel(8, 2, image::Rgba([1, 2, 3, 255]));
        let text = enc.encode_blocks(&rgba);
        assert_eq!(text.matches("\x1b[38;2;").count(), 1);
    }
}
