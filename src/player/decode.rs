//! FFmpeg-backed media source: demux, decode, color-convert

use super::source::{MediaSource, Picture};
use crate::error::MediaError;
use anyhow::Result;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use log::{debug, trace};
use std::path::Path;
use std::sync::Once;

static FFMPEG_INIT: Once = Once::new();

/// Fallback when the stream reports no usable frame rate (25 fps)
const DEFAULT_NOMINAL_MS: i64 = 40;

/// Demuxer + decoder + scaler for one video file.
///
/// The session loops forever: at end-of-stream it drains the codec's
/// internal buffer, seeks back to the start, and keeps decoding.
pub struct FfmpegSource {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: Option<scaling::Context>,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    nominal_ms: i64,
    draining: bool,
    /// Synthetic clock for frames whose container carries no timestamp
    fallback_pts_ms: i64,
}

// SAFETY: all ffmpeg state here is driven from exactly one thread at a
// time. The player moves the boxed source into the worker thread on play()
// and only touches it again after joining that thread.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    /// Open `path` and set up decoding for its best video stream
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        FFMPEG_INIT.call_once(|| {
            let _ = ffmpeg::init();
        });

        if !path.exists() {
            return Err(MediaError::NotFound(path.to_path_buf()));
        }

        let ictx = ffmpeg::format::input(&path).map_err(|e| MediaError::from_open(path, e))?;

        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| MediaError::invalid(path, "no video stream"))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let rate = stream.avg_frame_rate();

        let codec_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| MediaError::from_open(path, e))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| MediaError::from_open(path, e))?;

        if decoder.width() == 0 || decoder.height() == 0 {
            return Err(MediaError::invalid(path, "degenerate video dimensions"));
        }

        let nominal_ms = if rate.numerator() > 0 {
            (1000 * rate.denominator() as i64 / rate.numerator() as i64).max(1)
        } else {
            DEFAULT_NOMINAL_MS
        };

        debug!(
            "opened {}: {}x{} nominal {}ms",
            path.display(),
            decoder.width(),
            decoder.height(),
            nominal_ms
        );

        Ok(FfmpegSource {
            ictx,
            decoder,
            scaler: None,
            stream_index,
            time_base,
            nominal_ms,
            draining: false,
            fallback_pts_ms: 0,
        })
    }

    /// Rescale a native stream timestamp into milliseconds
    fn pts_to_ms(&self, ts: i64) -> i64 {
        ts * 1000 * self.time_base.numerator() as i64 / self.time_base.denominator().max(1) as i64
    }

    /// Feed one packet into the decoder, or switch to draining at EOF.
    /// Recoverable read/send errors are skipped.
    fn pump_one_packet(&mut self) {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.ictx) {
            Ok(()) => {
                if packet.stream() == self.stream_index {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        trace!("send_packet skipped: {}", e);
                    }
                }
            }
            Err(ffmpeg::Error::Eof) => {
                let _ = self.decoder.send_eof();
                self.draining = true;
            }
            Err(e) => trace!("packet read skipped: {}", e),
        }
    }

    /// Convert a decoded frame to packed RGBA via the software scaler
    fn convert(&mut self, decoded: &Video) -> Result<Video> {
        let (w, h) = (decoded.width(), decoded.height());
        let needs_new = match &self.scaler {
            Some(s) => s.input().width != w || s.input().height != h,
            None => true,
        };
        if needs_new {
            self.scaler = Some(scaling::Context::get(
                decoded.format(),
                w,
                h,
                Pixel::RGBA,
                w,
                h,
                scaling::Flags::BILINEAR,
            )?);
        }

        let mut rgba = Video::empty();
        if let Some(scaler) = &mut self.scaler {
            scaler.run(decoded, &mut rgba)?;
        }
        Ok(rgba)
    }
}

impl MediaSource for FfmpegSource {
    fn next_picture(&mut self) -> Result<Option<Picture>> {
        let mut decoded = Video::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => {
                // Codec fully drained; loop back to the start
                self.rewind()?;
                return Ok(None);
            }
            Err(_) => {
                // Needs more input (or a transient decode hiccup)
                if !self.draining {
                    self.pump_one_packet();
                }
                return Ok(None);
            }
        }

        let pts_ms = match decoded.timestamp() {
            Some(ts) => {
                let ms = self.pts_to_ms(ts);
                self.fallback_pts_ms = ms;
                Some(ms)
            }
            None => {
                self.fallback_pts_ms += self.nominal_ms;
                None
            }
        };

        let rgba = self.convert(&decoded)?;
        let stride = rgba.stride(0);
        let picture = Picture {
            data: rgba.data(0).to_vec(),
            width: rgba.width(),
            height: rgba.height(),
            stride,
            channels: 4,
            pts_ms: pts_ms.or(Some(self.fallback_pts_ms)),
        };
        Ok(Some(picture))
    }

    /// Seek back to the start and reset codec state for the next loop
    fn rewind(&mut self) -> Result<()> {
        self.ictx.seek(0, ..0)?;
        self.decoder.flush();
        self.draining = false;
        self.fallback_pts_ms = 0;
        Ok(())
    }

    fn nominal_delay_ms(&self) -> i64 {
        self.nominal_ms
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }
}
