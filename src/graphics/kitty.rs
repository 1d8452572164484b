//! Kitty graphics protocol encoding backend

use super::FrameEncoder;
use anyhow::Result;
use image::RgbaImage;
use std::fmt::Write as FmtWrite;
use std::io::Cursor;

/// Kitty protocol payload chunk size (spec maximum is 4096)
const CHUNK_SIZE: usize = 4096;

/// Fixed image id; every frame replaces the previous one so the terminal
/// never accumulates old transmissions
const IMAGE_ID: u32 = 1;

impl FrameEncoder {
    /// Encode to a Kitty `a=T` transmission placed into `cols × rows` cells.
    ///
    /// The image is sent at source resolution; the terminal scales it into
    /// the requested cell box, which keeps the hot path free of a software
    /// resize.
    pub(super) fn encode_kitty(&mut self, rgba: &RgbaImage, cols: u16, rows: u16) -> Result<String> {
        let png = png_from_rgba(rgba)?;

        let encoded_size = (png.len() * 4 / 3) + 4;
        let mut payload = String::with_capacity(encoded_size);
        base64::Engine::encode_string(
            &base64::engine::general_purpose::STANDARD,
            &png,
            &mut payload,
        );

        self.escape_buffer.clear();
        write!(
            self.escape_buffer,
            "a=T,f=100,t=d,i={},c={},r={},C=1,q=2",
            IMAGE_ID, cols, rows
        )
        .ok();

        let total_chunks = payload.len().div_ceil(CHUNK_SIZE).max(1);
        let mut out = String::with_capacity(payload.len() + total_chunks * 24);

        for (i, chunk) in payload.as_bytes().chunks(CHUNK_SIZE).enumerate() {
            let m = if i + 1 == total_chunks { 0 } else { 1 };
            let mut piece = String::with_capacity(chunk.len() + 32);

            if i == 0 {
                write!(piece, "\x1b_G{},m={};", self.escape_buffer, m).ok();
            } else {
                write!(piece, "\x1b_Gm={};", m).ok();
            }
            // SAFETY: base64 output is always valid ASCII
            piece.push_str(unsafe { std::str::from_utf8_unchecked(chunk) });
            piece.push_str("\x1b\\");

            out.push_str(&self.passthrough(&piece));
        }

        Ok(out)
    }
}

/// Escape sequence deleting all transmitted images (issued between frames
/// and on teardown so stale graphics never linger)
pub fn delete_all_images(in_tmux: bool) -> String {
    let cmd = "\x1b_Ga=d,d=A,q=2\x1b\\";
    if in_tmux {
        let escaped = cmd.replace('\x1b', "\x1b\x1b");
        format!("\x1bPtmux;{}\x1b\\", escaped)
    } else {
        cmd.to_string()
    }
}

fn png_from_rgba(rgba: &RgbaImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    rgba.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::GraphicsBackend;
    use crate::terminal::TerminalGeometry;

    fn test_encoder(in_tmux: bool) -> FrameEncoder {
        let geom = TerminalGeometry::with_cell_size(80, 24, 10, 20);
        FrameEncoder::new(GraphicsBackend::Kitty, &geom, in_tmux)
    }

    #[test]
    fn test_kitty_transmission_shape() {
        let mut enc = test_encoder(false);
        let rgba = RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        let text = enc.encode_kitty(&rgba, 8, 4).unwrap();

        assert!(text.starts_with("\x1b_Ga=T,f=100,t=d,i=1,c=8,r=4,"));
        assert!(text.ends_with("\x1b\\"));
        // Last chunk must be marked final
        assert!(text.contains("m=0;"));
    }

    #[test]
    fn test_kitty_tmux_passthrough_wrapping() {
        let mut enc = test_encoder(true);
        let rgba = RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));
        let text = enc.encode_kitty(&rgba, 2, 1).unwrap();
        assert!(text.starts_with("\x1bPtmux;"));
        assert!(text.contains("\x1b\x1b_G"));
    }

    #[test]
    fn test_delete_all_images_wrapping() {
        assert_eq!(delete_all_images(false), "\x1b_Ga=d,d=A,q=2\x1b\\");
        assert!(delete_all_images(true).starts_with("\x1bPtmux;"));
    }
}
