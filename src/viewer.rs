//! Static image and animated GIF viewing

use anyhow::{Context, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

/// Floor for GIF frame delays; zero-delay frames otherwise spin the loop
const MIN_GIF_DELAY: Duration = Duration::from_millis(20);

/// One frame of an (possibly single-frame) image document
struct ImageFrame {
    image: DynamicImage,
    delay: Duration,
}

/// A loaded image document: one frame for stills, several for animated
/// GIFs. Animation advances on `tick()` driven by the event loop.
pub struct ImageView {
    frames: Vec<ImageFrame>,
    current: usize,
    playing: bool,
    last_advance: Instant,
}

impl ImageView {
    /// Load an image; `.gif` files are decoded frame by frame
    pub fn load(path: &Path) -> Result<Self> {
        let is_gif = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .as_deref()
            == Some("gif");

        let frames = if is_gif {
            Self::load_gif(path)?
        } else {
            let image = image::open(path)
                .with_context(|| format!("cannot decode {}", path.display()))?;
            vec![ImageFrame {
                image,
                delay: Duration::ZERO,
            }]
        };

        Ok(ImageView {
            playing: frames.len() > 1,
            frames,
            current: 0,
            last_advance: Instant::now(),
        })
    }

    /// Build a view from an already-decoded still (preload cache hit)
    pub fn from_image(image: DynamicImage) -> Self {
        ImageView {
            frames: vec![ImageFrame {
                image,
                delay: Duration::ZERO,
            }],
            current: 0,
            playing: false,
            last_advance: Instant::now(),
        }
    }

    fn load_gif(path: &Path) -> Result<Vec<ImageFrame>> {
        let reader = BufReader::new(
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
        );
        let decoder = GifDecoder::new(reader)?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .with_context(|| format!("cannot decode {}", path.display()))?;

        let mut out = Vec::with_capacity(frames.len());
        for frame in frames {
            let delay = Duration::from(frame.delay()).max(MIN_GIF_DELAY);
            out.push(ImageFrame {
                image: DynamicImage::ImageRgba8(frame.into_buffer()),
                delay,
            });
        }
        anyhow::ensure!(!out.is_empty(), "gif has no frames");
        Ok(out)
    }

    pub fn current(&self) -> &DynamicImage {
        &self.frames[self.current].image
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn toggle_play(&mut self) {
        if self.is_animated() {
            self.playing = !self.playing;
            self.last_advance = Instant::now();
        }
    }

    /// Step animation manually (also pauses playback)
    pub fn step(&mut self, delta: i32) {
        if !self.is_animated() {
            return;
        }
        self.playing = false;
        let len = self.frames.len() as i32;
        self.current = (self.current as i32 + delta).rem_euclid(len) as usize;
    }

    /// Advance the animation if the current frame's delay has elapsed;
    /// returns true when the displayed frame changed
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.playing {
            return false;
        }
        let due = self.frames[self.current].delay;
        if now.duration_since(self.last_advance) < due {
            return false;
        }
        self.current = (self.current + 1) % self.frames.len();
        self.last_advance = now;
        true
    }

    /// Delay until the next animation frame is due, if playing
    pub fn next_delay(&self, now: Instant) -> Option<Duration> {
        if !self.playing {
            return None;
        }
        let due = self.frames[self.current].delay;
        Some(due.saturating_sub(now.duration_since(self.last_advance)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn still() -> ImageView {
        ImageView::from_image(DynamicImage::ImageRgba8(RgbaImage::new(2, 2)))
    }

    fn animated(count: usize, delay_ms: u64) -> ImageView {
        let frames = (0..count)
            .map(|i| ImageFrame {
                image: DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                    2,
                    2,
                    image::Rgba([i as u8, 0, 0, 255]),
                )),
                delay: Duration::from_millis(delay_ms),
            })
            .collect();
        ImageView {
            frames,
            current: 0,
            playing: true,
            last_advance: Instant::now(),
        }
    }

    #[test]
    fn test_still_never_animates() {
        let mut view = still();
        assert!(!view.is_animated());
        view.toggle_play();
        assert!(!view.is_playing());
        assert!(!view.tick(Instant::now() + Duration::from_secs(10)));
    }

    #[test]
    fn test_animation_advances_after_delay() {
        let mut view = animated(3, 50);
        let start = view.last_advance;
        assert!(!view.tick(start + Duration::from_millis(10)));
        assert!(view.tick(start + Duration::from_millis(60)));
        assert_eq!(view.current, 1);
    }

    #[test]
    fn test_animation_wraps() {
        let mut view = animated(2, 10);
        let mut now = view.last_advance;
        for _ in 0..2 {
            now += Duration::from_millis(15);
            view.tick(now);
        }
        assert_eq!(view.current, 0);
    }

    #[test]
    fn test_manual_step_pauses() {
        let mut view = animated(3, 50);
        view.step(-1);
        assert_eq!(view.current, 2);
        assert!(!view.is_playing());
        assert!(view.next_delay(Instant::now()).is_none());
    }

    #[test]
    fn test_gif_load_rejects_non_gif() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gif");
        std::fs::write(&path, b"not a gif").unwrap();
        assert!(ImageView::load(&path).is_err());
    }
}
