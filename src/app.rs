//! Application - mode state machine and event loop
//!
//! The loop has a single timer: the event-poll timeout. While a video is
//! playing the playback scheduler's next-tick delay is fed in as that
//! timeout, so a timeout IS the scheduler tick; input events are handled
//! as they arrive in between.

use crate::browser::{Browser, EntryKind, FileEntry};
use crate::config::Config;
use crate::event::{Event, EventPoller, Key};
use crate::graphics::{kitty, EncodedFrame, FrameEncoder, GraphicsBackend};
use crate::layout::{truncate_name, Rect};
use crate::player::VideoPlayer;
use crate::preload::PreloadCache;
use crate::render::{Renderer, TermSink};
use crate::terminal::TerminalContext;
use crate::viewer::ImageView;
use anyhow::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Poll timeout when nothing is animating
const IDLE_TIMEOUT: Duration = Duration::from_millis(250);

/// Poll timeout while preloads are still pending
const PRELOAD_TIMEOUT: Duration = Duration::from_millis(10);

/// Rows reserved above (header) and below (status bar) the content area
const HEADER_ROWS: u16 = 1;
const STATUS_ROWS: u16 = 1;

enum Mode {
    Browse,
    Image(ImageView),
    Video,
}

pub struct App {
    ctx: TerminalContext,
    renderer: Renderer,
    browser: Browser,
    preload: PreloadCache,
    player: VideoPlayer,
    /// Encoder for stills and GIF frames; the video pipeline owns its own
    encoder: FrameEncoder,
    backend: GraphicsBackend,
    mode: Mode,
    /// Absolute deadline of the next scheduler tick. Input events re-arm
    /// the poll with the time remaining, so key repeat cannot starve
    /// playback.
    next_tick_at: Instant,
    status: String,
    /// Last cell footprint painted into the content area
    painted_rows: (u16, u16),
    running: bool,
}

impl App {
    pub fn new(config: Config, start_path: Option<PathBuf>) -> Result<Self> {
        let ctx = TerminalContext::detect()?;
        let backend = config
            .backend
            .as_deref()
            .and_then(GraphicsBackend::from_name)
            .unwrap_or_else(|| GraphicsBackend::detect(&ctx.capabilities));
        debug!("graphics backend: {}", backend.name());

        let in_tmux = ctx.capabilities.in_multiplexer;
        let encoder = FrameEncoder::new(backend, &ctx.geometry, in_tmux);
        let player_encoder = FrameEncoder::new(backend, &ctx.geometry, in_tmux);
        let player = VideoPlayer::new(player_encoder, config.queue_capacity);
        let preload = PreloadCache::new(config.preload_capacity);

        let (start_dir, start_file) = split_start_path(start_path);
        let browser = Browser::new(start_dir, config.show_hidden)?;

        let mut app = App {
            ctx,
            renderer: Renderer::new(),
            browser,
            preload,
            player,
            encoder,
            backend,
            mode: Mode::Browse,
            next_tick_at: Instant::now(),
            status: String::new(),
            painted_rows: (0, 0),
            running: true,
        };
        app.push_render_area();
        if let Some(file) = start_file {
            app.open_path(&file);
        }
        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        let poller = EventPoller::new()?;
        self.renderer.enter_alt_screen()?;
        self.renderer.hide_cursor()?;
        self.draw()?;

        while self.running {
            match poller.poll(self.poll_timeout())? {
                Some(event) => self.handle_event(event)?,
                None => self.on_idle()?,
            }
        }

        self.player.unload();
        self.clear_graphics()?;
        self.renderer.show_cursor()?;
        self.renderer.exit_alt_screen()?;
        Ok(())
    }

    /// The next deadline: video tick, GIF frame, pending preloads, or idle
    fn poll_timeout(&self) -> Duration {
        match &self.mode {
            Mode::Video if self.player.is_playing() => {
                tick_timeout(self.next_tick_at, Instant::now())
            }
            Mode::Video => IDLE_TIMEOUT,
            Mode::Image(view) => view
                .next_delay(Instant::now())
                .unwrap_or(IDLE_TIMEOUT)
                .min(IDLE_TIMEOUT),
            Mode::Browse if self.preload.has_pending() => PRELOAD_TIMEOUT,
            Mode::Browse => IDLE_TIMEOUT,
        }
    }

    /// Timeout expired: run whatever is animating
    fn on_idle(&mut self) -> Result<()> {
        match &mut self.mode {
            Mode::Video => {
                if self.player.is_playing() {
                    let now = Instant::now();
                    if let Some(delay) = self.player.tick(&mut self.renderer, now)? {
                        self.next_tick_at = now + delay;
                    }
                }
            }
            Mode::Image(view) => {
                if view.tick(Instant::now()) {
                    self.draw_content()?;
                }
            }
            Mode::Browse => {
                self.preload.step();
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(key) => self.handle_key(key)?,
            Event::Resize(cols, rows) => self.handle_resize(cols, rows)?,
            Event::FocusGained => self.draw()?,
        }
        Ok(())
    }

    fn handle_key(&mut self, key: Key) -> Result<()> {
        match (&mut self.mode, key) {
            // Global
            (_, Key::Ctrl('c')) => self.running = false,

            // Browser
            (Mode::Browse, Key::Char('q') | Key::Esc) => self.running = false,
            (Mode::Browse, Key::Up | Key::Char('k')) => self.move_selection(-1)?,
            (Mode::Browse, Key::Down | Key::Char('j')) => self.move_selection(1)?,
            (Mode::Browse, Key::PageUp) => self.move_selection(-10)?,
            (Mode::Browse, Key::PageDown) => self.move_selection(10)?,
            (Mode::Browse, Key::Home) => {
                self.browser.select_first();
                self.draw()?;
            }
            (Mode::Browse, Key::End) => {
                self.browser.select_last();
                self.draw()?;
            }
            (Mode::Browse, Key::Enter | Key::Right | Key::Char('l')) => {
                if let Some(entry) = self.browser.selected_entry().cloned() {
                    self.open_entry(&entry)?;
                }
            }
            (Mode::Browse, Key::Backspace | Key::Left | Key::Char('h')) => {
                if let Some(parent) = self.browser.current_dir.parent().map(Path::to_path_buf) {
                    self.change_directory(&parent)?;
                }
            }
            (Mode::Browse, Key::Char('r')) => {
                self.browser.reload()?;
                self.schedule_preloads();
                self.draw()?;
            }
            (Mode::Browse, Key::Char('.')) => {
                self.browser.show_hidden = !self.browser.show_hidden;
                self.browser.reload()?;
                self.draw()?;
            }

            // Image / GIF viewing
            (Mode::Image(_), Key::Char('q') | Key::Esc | Key::Backspace) => {
                self.leave_media()?;
            }
            (Mode::Image(view), Key::Char(' ')) => {
                view.toggle_play();
                self.draw_status()?;
            }
            (Mode::Image(view), Key::Left) if view.is_animated() => {
                view.step(-1);
                self.draw_content()?;
            }
            (Mode::Image(view), Key::Right) if view.is_animated() => {
                view.step(1);
                self.draw_content()?;
            }
            (Mode::Image(_), Key::Char('n') | Key::Down) => self.step_media(1)?,
            (Mode::Image(_), Key::Char('p') | Key::Up) => self.step_media(-1)?,

            // Video playback
            (Mode::Video, Key::Char('q') | Key::Esc | Key::Backspace) => {
                self.leave_media()?;
            }
            (Mode::Video, Key::Char(' ')) => {
                if self.player.is_playing() {
                    self.player.pause();
                } else {
                    self.start_playback()?;
                }
                self.draw_status()?;
            }
            (Mode::Video, Key::Char('n') | Key::Down) => self.step_media(1)?,
            (Mode::Video, Key::Char('p') | Key::Up) => self.step_media(-1)?,

            _ => {}
        }
        Ok(())
    }

    fn handle_resize(&mut self, _cols: u16, _rows: u16) -> Result<()> {
        // Full re-detection picks up cell pixel size changes too
        self.ctx.refresh_geometry()?;
        self.encoder.refresh_geometry(&self.ctx.geometry);
        self.player.update_terminal_size(&self.ctx.geometry);
        self.push_render_area();
        self.renderer.clear()?;
        self.draw()
    }

    fn move_selection(&mut self, delta: i32) -> Result<()> {
        self.browser.navigate(delta);
        self.schedule_preloads();
        self.draw()
    }

    /// Jump to the next/previous media file and open it in place
    fn step_media(&mut self, delta: i32) -> Result<()> {
        self.leave_media()?;
        if let Some(entry) = self.browser.step_media(delta).cloned() {
            self.open_entry(&entry)?;
        }
        Ok(())
    }

    /// Switch the browser to `path`, dropping cached images from the old
    /// directory
    fn change_directory(&mut self, path: &Path) -> Result<()> {
        self.browser.load_directory(path)?;
        self.preload.clear();
        self.schedule_preloads();
        self.draw()
    }

    fn open_path(&mut self, path: &Path) {
        let entry = FileEntry::from_path(path.to_path_buf());
        if let Some(pos) = self.browser.entries.iter().position(|e| e.path == entry.path) {
            self.browser.selected = pos;
        }
        if let Err(e) = self.open_entry(&entry) {
            self.status = format!("cannot open {}: {}", entry.name, e);
        }
    }

    fn open_entry(&mut self, entry: &FileEntry) -> Result<()> {
        match entry.kind {
            EntryKind::Directory => self.change_directory(&entry.path)?,
            EntryKind::Image => self.open_image(entry)?,
            EntryKind::Video => self.open_video(entry)?,
            EntryKind::Other => {
                self.status = format!("{}: not a media file", entry.name);
                self.draw_status()?;
            }
        }
        Ok(())
    }

    fn open_image(&mut self, entry: &FileEntry) -> Result<()> {
        // Animated GIFs always go through the frame decoder; stills can
        // come straight from the preload cache
        let view = if entry.path.extension().is_some_and(|e| e.eq_ignore_ascii_case("gif")) {
            ImageView::load(&entry.path)
        } else {
            match self.preload.get_or_load(&entry.path) {
                Some(img) => Ok(ImageView::from_image(img)),
                None => ImageView::load(&entry.path),
            }
        };

        match view {
            Ok(view) => {
                self.status = if view.is_animated() {
                    format!("{} ({} frames)", entry.name, view.frame_count())
                } else {
                    entry.name.clone()
                };
                self.mode = Mode::Image(view);
                self.painted_rows = (0, 0);
                self.renderer.clear()?;
                self.draw()?;
            }
            Err(e) => {
                warn!("image load failed: {}", e);
                self.status = format!("cannot open {}: {}", entry.name, e);
                self.draw_status()?;
            }
        }
        Ok(())
    }

    fn open_video(&mut self, entry: &FileEntry) -> Result<()> {
        match self.player.load(&entry.path) {
            Ok(()) => {
                self.mode = Mode::Video;
                let dims = self
                    .player
                    .dimensions()
                    .map(|(w, h)| format!(" {}x{}", w, h))
                    .unwrap_or_default();
                self.status = format!("{}{} [{}]", entry.name, dims, self.backend.name());
                self.renderer.clear()?;
                self.push_render_area();
                self.draw()?;
                self.start_playback()?;
            }
            Err(e) => {
                warn!("video load failed: {}", e);
                self.status = format!("cannot play {}: {}", entry.name, e);
                self.draw_status()?;
            }
        }
        Ok(())
    }

    fn start_playback(&mut self) -> Result<()> {
        if let Err(e) = self.player.play() {
            self.status = format!("playback failed: {}", e);
            return self.draw_status();
        }
        // Bootstrap tick paints the first available frame immediately
        let now = Instant::now();
        if let Some(delay) = self.player.tick(&mut self.renderer, now)? {
            self.next_tick_at = now + delay;
        }
        Ok(())
    }

    /// Return to the browser, stopping whatever was showing
    fn leave_media(&mut self) -> Result<()> {
        match self.mode {
            Mode::Browse => return Ok(()),
            Mode::Video => self.player.stop(),
            Mode::Image(_) => {}
        }
        self.mode = Mode::Browse;
        self.status = format!("{} items", self.browser.entries.len());
        self.clear_graphics()?;
        self.renderer.clear()?;
        self.draw()
    }

    /// Drop any terminal-retained graphics (kitty keeps transmitted images
    /// until told otherwise)
    fn clear_graphics(&mut self) -> Result<()> {
        if self.backend == GraphicsBackend::Kitty {
            let seq = kitty::delete_all_images(self.ctx.capabilities.in_multiplexer);
            self.renderer.write_text(&seq)?;
            self.renderer.flush()?;
        }
        Ok(())
    }

    fn schedule_preloads(&mut self) {
        let candidates: Vec<(usize, PathBuf)> = self
            .browser
            .preload_candidates()
            .into_iter()
            .map(|(d, p)| (d, p.to_path_buf()))
            .collect();
        self.preload
            .schedule(candidates.iter().map(|(d, p)| (*d, p.as_path())));
    }

    /// Content rectangle between the header and the status bar
    fn content_area(&self) -> Rect {
        let screen = Rect::fullscreen(self.ctx.geometry.cols, self.ctx.geometry.rows);
        let (_, below_header) = screen.split_horizontal(HEADER_ROWS);
        let height = below_header.height.saturating_sub(STATUS_ROWS);
        Rect::new(below_header.x, below_header.y, below_header.width, height)
    }

    /// Tell the video pipeline where frames go and how big they may be
    fn push_render_area(&mut self) {
        let geom = &self.ctx.geometry;
        let area = self.content_area();
        self.player.set_render_area(
            geom.cols,
            geom.rows,
            area.y,
            area.height,
            geom.cols as u32 * geom.cell_width as u32,
            area.height as u32 * geom.cell_height as u32,
        );
    }

    fn draw(&mut self) -> Result<()> {
        self.draw_header()?;
        self.draw_content()?;
        self.draw_status()?;
        self.renderer.flush()
    }

    fn draw_header(&mut self) -> Result<()> {
        let title = match &self.mode {
            Mode::Browse => self.browser.current_dir.display().to_string(),
            Mode::Image(_) | Mode::Video => self.status.clone(),
        };
        let width = self.ctx.geometry.cols as usize;
        self.renderer.move_cursor(0, 0)?;
        self.renderer.clear_line()?;
        self.renderer
            .write_styled(&truncate_name(&title, width), "\x1b[1m")?;
        Ok(())
    }

    fn draw_content(&mut self) -> Result<()> {
        match &self.mode {
            Mode::Browse => self.draw_browser(),
            Mode::Image(_) => self.draw_image(),
            Mode::Video => Ok(()), // scheduler ticks paint video frames
        }
    }

    fn draw_browser(&mut self) -> Result<()> {
        let area = self.content_area();
        let width = area.width as usize;
        let range = self.browser.visible_range(area.height as usize);
        let selected = self.browser.selected;

        let mut row = area.y;
        for idx in range {
            let entry = &self.browser.entries[idx];
            let marker = match entry.kind {
                EntryKind::Directory => "/",
                EntryKind::Image => "*",
                EntryKind::Video => ">",
                EntryKind::Other => " ",
            };
            let cached = if entry.kind == EntryKind::Image && self.preload.contains(&entry.path)
            {
                "+"
            } else {
                " "
            };
            let line = truncate_name(
                &format!("{}{} {}", marker, cached, entry.name),
                width.saturating_sub(1),
            );

            self.renderer.move_cursor(0, row)?;
            self.renderer.clear_line()?;
            if idx == selected {
                self.renderer.write_styled(&line, "\x1b[7m")?;
            } else {
                self.renderer.write_text(&line)?;
            }
            row += 1;
        }
        // Blank the remainder of the content area
        for r in row..area.bottom() {
            self.renderer.move_cursor(0, r)?;
            self.renderer.clear_line()?;
        }
        Ok(())
    }

    fn draw_image(&mut self) -> Result<()> {
        let Mode::Image(view) = &self.mode else {
            return Ok(());
        };
        let rgba = view.current().to_rgba8();
        let (w, h) = rgba.dimensions();
        let geom = &self.ctx.geometry;
        let area = self.content_area();

        let frame = self.encoder.encode(
            rgba.as_raw(),
            w,
            h,
            w as usize * 4,
            4,
            area.width as u32 * geom.cell_width as u32,
            area.height as u32 * geom.cell_height as u32,
        )?;
        self.paint_encoded(&frame, area)?;
        Ok(())
    }

    /// Place an encoded image centered in the content area, clearing rows
    /// the previous paint covered but this one does not
    fn paint_encoded(&mut self, frame: &EncodedFrame, area: Rect) -> Result<()> {
        let placed = area.center(frame.cols, frame.rows);
        let (col, row) = (placed.x, placed.y);

        let (last_top, last_rows) = self.painted_rows;
        for r in last_top..last_top.saturating_add(last_rows) {
            if r < row || r >= row.saturating_add(frame.rows) {
                self.renderer.move_cursor(0, r)?;
                self.renderer.clear_line()?;
            }
        }

        if frame.text.contains('\n') {
            for (i, line) in frame.text.split('\n').enumerate() {
                self.renderer.move_cursor(col, row.saturating_add(i as u16))?;
                self.renderer.write_text(line)?;
            }
        } else {
            self.renderer.move_cursor(col, row)?;
            self.renderer.write_text(&frame.text)?;
        }
        self.painted_rows = (row, frame.rows);
        self.renderer.flush()
    }

    fn draw_status(&mut self) -> Result<()> {
        let row = self.ctx.geometry.rows.saturating_sub(1);
        let width = self.ctx.geometry.cols as usize;
        let text = match &self.mode {
            Mode::Browse => format!(
                "{}/{}  {}",
                self.browser.selected + 1,
                self.browser.entries.len(),
                self.status
            ),
            Mode::Image(view) if view.is_animated() => format!(
                "{}  [{}]",
                self.status,
                if view.is_playing() { "playing" } else { "paused" }
            ),
            Mode::Image(_) => self.status.clone(),
            Mode::Video => format!(
                "{}  [{}]",
                self.status,
                if self.player.is_playing() { "playing" } else { "paused" }
            ),
        };
        self.renderer.move_cursor(0, row)?;
        self.renderer.clear_line()?;
        self.renderer
            .write_styled(&truncate_name(&text, width), "\x1b[2m")?;
        self.renderer.flush()
    }
}

/// Time remaining until `next_tick_at`, clamped for the poll timeout.
/// Zero once the deadline has passed, so a tick interrupted by input still
/// fires on the very next poll.
fn tick_timeout(next_tick_at: Instant, now: Instant) -> Duration {
    next_tick_at.saturating_duration_since(now).min(IDLE_TIMEOUT)
}

/// Split the CLI start path into (directory to browse, file to open)
fn split_start_path(start: Option<PathBuf>) -> (PathBuf, Option<PathBuf>) {
    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match start {
        None => (cwd(), None),
        Some(p) if p.is_dir() => (p, None),
        Some(p) => {
            let dir = p
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(cwd);
            (dir, Some(p))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_start_path_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"").unwrap();

        let (browse, open) = split_start_path(Some(file.clone()));
        assert_eq!(browse, dir.path());
        assert_eq!(open, Some(file));
    }

    #[test]
    fn test_split_start_path_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (browse, open) = split_start_path(Some(dir.path().to_path_buf()));
        assert_eq!(browse, dir.path());
        assert!(open.is_none());
    }

    #[test]
    fn test_split_start_path_bare_name() {
        let (_, open) = split_start_path(Some(PathBuf::from("clip.mp4")));
        assert_eq!(open, Some(PathBuf::from("clip.mp4")));
    }

    #[test]
    fn test_tick_timeout_counts_down_toward_deadline() {
        let now = Instant::now();
        let deadline = now + Duration::from_millis(40);
        assert_eq!(tick_timeout(deadline, now), Duration::from_millis(40));
        // Time spent handling input shrinks the remaining timeout instead
        // of restarting it
        let later = now + Duration::from_millis(30);
        assert_eq!(tick_timeout(deadline, later), Duration::from_millis(10));
    }

    #[test]
    fn test_tick_timeout_elapsed_deadline_is_zero() {
        let now = Instant::now();
        let deadline = now - Duration::from_millis(5);
        assert_eq!(tick_timeout(deadline, now), Duration::ZERO);
    }

    #[test]
    fn test_tick_timeout_clamps_to_idle() {
        let now = Instant::now();
        let deadline = now + Duration::from_secs(60);
        assert_eq!(tick_timeout(deadline, now), IDLE_TIMEOUT);
    }
}
