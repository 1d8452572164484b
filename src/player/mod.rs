//! Video playback engine
//!
//! A single-producer/single-consumer real-time pipeline: a decode worker
//! thread turns compressed video into terminal-ready frames, and a
//! wall-clock-driven scheduler on the main thread decides tick by tick
//! which frame is "now".
//!
//! Three locks guard disjoint state: the queue lock (frame queue + stop
//! flag), the state lock (playback clock + render layout), and the render
//! lock (the frame encoder's mutable geometry). None is ever held across
//! I/O or a decode step.

mod clock;
mod decode;
mod frame;
mod queue;
mod sched;
mod source;
mod worker;

pub use decode::FfmpegSource;
pub use frame::FrameRecord;
pub use queue::FrameQueue;
pub use source::{MediaSource, Picture};

use crate::error::MediaError;
use crate::graphics::FrameEncoder;
use crate::render::TermSink;
use crate::terminal::TerminalGeometry;
use anyhow::Result;
use clock::PlaybackClock;
use log::debug;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Terminal region and pixel bounds the video is painted into.
///
/// The plain fields are written by the UI on resize; the `last_*` and
/// `fixed_*` fields are derived by the painter to keep vertical placement
/// stable and to track which rows need clearing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderLayout {
    pub term_w: u16,
    pub term_h: u16,
    pub area_top_row: u16,
    pub area_height: u16,
    pub max_px_w: u32,
    pub max_px_h: u32,
    pub valid: bool,
    pub(crate) last_top_row: u16,
    pub(crate) last_height: u16,
    pub(crate) fixed_top_row: u16,
    pub(crate) fixed_valid: bool,
}

impl RenderLayout {
    /// Copy the painter-derived fields from a scratch layout back in,
    /// leaving the UI-owned fields untouched
    fn adopt_derived(&mut self, painted: &RenderLayout) {
        self.last_top_row = painted.last_top_row;
        self.last_height = painted.last_height;
        self.fixed_top_row = painted.fixed_top_row;
        self.fixed_valid = painted.fixed_valid;
    }

    fn reset_derived(&mut self) {
        self.last_top_row = 0;
        self.last_height = 0;
        self.fixed_top_row = 0;
        self.fixed_valid = false;
    }
}

struct QueueState {
    queue: FrameQueue,
    stop: bool,
}

struct PlayState {
    clock: PlaybackClock,
    layout: RenderLayout,
}

/// State shared between the decode worker and the main thread
pub(crate) struct Shared {
    queue: Mutex<QueueState>,
    state: Mutex<PlayState>,
    render: Mutex<FrameEncoder>,
}

impl Shared {
    fn new(encoder: FrameEncoder, queue_capacity: usize) -> Self {
        Shared {
            queue: Mutex::new(QueueState {
                queue: FrameQueue::new(queue_capacity),
                stop: false,
            }),
            state: Mutex::new(PlayState {
                clock: PlaybackClock::new(),
                layout: RenderLayout::default(),
            }),
            render: Mutex::new(encoder),
        }
    }
}

type BoxedSource = Box<dyn MediaSource + Send>;

/// Playback engine facade.
///
/// States: idle (no session) → loaded (session exists) → playing (worker
/// running) → back to loaded on `pause()`/`stop()`. The session is owned
/// here while idle and moves into the worker thread while playing; the
/// join handle carries it back.
pub struct VideoPlayer {
    shared: Arc<Shared>,
    session: Option<BoxedSource>,
    worker: Option<JoinHandle<BoxedSource>>,
    path: Option<PathBuf>,
    nominal_ms: i64,
    playing: bool,
}

impl VideoPlayer {
    pub fn new(encoder: FrameEncoder, queue_capacity: usize) -> Self {
        VideoPlayer {
            shared: Arc::new(Shared::new(encoder, queue_capacity)),
            session: None,
            worker: None,
            path: None,
            nominal_ms: 40,
            playing: false,
        }
    }

    /// Open a media file and make it the current session.
    ///
    /// A failed open leaves the previous session (if any) intact. If the
    /// engine is playing, playback is stopped and joined first.
    pub fn load(&mut self, path: &Path) -> Result<(), MediaError> {
        self.halt();
        let source = FfmpegSource::open(path)?;
        self.install_source(Box::new(source));
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Install an already-open source as the current session
    pub fn load_source(&mut self, source: BoxedSource) {
        self.halt();
        self.install_source(source);
        self.path = None;
    }

    fn install_source(&mut self, source: BoxedSource) {
        self.nominal_ms = source.nominal_delay_ms().max(1);
        self.session = Some(source);
        let mut q = self.shared.queue.lock();
        q.queue.clear();
        q.stop = false;
        drop(q);
        let mut st = self.shared.state.lock();
        st.clock.reset();
        st.layout.reset_derived();
    }

    /// Start playback. No-op if already playing.
    ///
    /// Call [`VideoPlayer::tick`] immediately afterwards to paint the first
    /// available frame and obtain the initial re-arm delay.
    pub fn play(&mut self) -> Result<(), MediaError> {
        if self.playing {
            return Ok(());
        }
        let source = self.session.take().ok_or_else(|| {
            let path = self.path.clone().unwrap_or_default();
            MediaError::invalid(&path, "no video loaded")
        })?;

        {
            let mut q = self.shared.queue.lock();
            q.queue.clear();
            q.stop = false;
        }
        {
            let mut st = self.shared.state.lock();
            st.clock.reset();
            st.layout.reset_derived();
        }

        self.nominal_ms = source.nominal_delay_ms().max(1);
        match worker::spawn(source, Arc::clone(&self.shared), self.nominal_ms) {
            Ok(handle) => {
                self.worker = Some(handle);
                self.playing = true;
                debug!("playback started, nominal {}ms", self.nominal_ms);
                Ok(())
            }
            Err(e) => {
                debug!("worker spawn failed: {}", e);
                Err(MediaError::OutOfMemory)
            }
        }
    }

    /// Stop the worker, keeping the stream position for a later `play()`
    pub fn pause(&mut self) {
        self.halt();
    }

    /// Stop the worker and rewind to the start of the stream
    pub fn stop(&mut self) {
        self.halt();
        if let Some(session) = &mut self.session {
            let _ = session.rewind();
        }
    }

    /// Drop the current session entirely
    pub fn unload(&mut self) {
        self.halt();
        self.session = None;
        self.path = None;
    }

    /// Cooperative stop: set the flag, join the worker, drain the queue.
    /// Idempotent; a no-op when not playing.
    fn halt(&mut self) {
        if !self.playing {
            return;
        }
        self.shared.queue.lock().stop = true;
        if let Some(handle) = self.worker.take() {
            // Bounded wait: the worker polls the flag once per iteration
            if let Ok(source) = handle.join() {
                self.session = Some(source);
            }
        }
        let mut q = self.shared.queue.lock();
        q.queue.clear();
        q.stop = false;
        drop(q);
        self.shared.state.lock().clock.reset();
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn has_video(&self) -> bool {
        self.playing || self.session.is_some()
    }

    /// Nominal per-frame delay of the current session in milliseconds
    pub fn nominal_delay_ms(&self) -> i64 {
        self.nominal_ms
    }

    /// Pixel dimensions of the loaded stream; `None` while the session is
    /// inside the worker (or nothing is loaded)
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.session.as_ref().map(|s| s.dimensions())
    }

    /// Update the terminal region and pixel bounds frames are produced for
    pub fn set_render_area(
        &self,
        term_w: u16,
        term_h: u16,
        top_row: u16,
        height: u16,
        max_px_w: u32,
        max_px_h: u32,
    ) {
        let mut st = self.shared.state.lock();
        st.layout.term_w = term_w;
        st.layout.term_h = term_h;
        st.layout.area_top_row = top_row;
        st.layout.area_height = height;
        st.layout.max_px_w = max_px_w;
        st.layout.max_px_h = max_px_h;
        st.layout.valid = max_px_w > 0 && max_px_h > 0;
        // Re-lock vertical placement for the new geometry
        st.layout.reset_derived();
    }

    /// Push re-detected terminal cell geometry into the encoder
    pub fn update_terminal_size(&self, geometry: &TerminalGeometry) {
        self.shared.render.lock().refresh_geometry(geometry);
    }

    /// Run one scheduler tick at wall-clock `now`.
    ///
    /// Returns the delay until the next tick should fire, or `None` when
    /// not playing. The caller uses the delay as its event-poll timeout.
    pub fn tick(&mut self, sink: &mut dyn TermSink, now: Instant) -> Result<Option<Duration>> {
        if !self.playing {
            return Ok(None);
        }
        let outcome = sched::tick(&self.shared, sink, now, self.nominal_ms)?;
        Ok(Some(outcome.next_delay))
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        // The worker must be joined before any shared buffers go away
        self.halt();
    }
}
