//! Terminal output sink - buffered writes, cursor management, screen modes
//!
//! Everything that touches stdout goes through here. Output is batched in a
//! `BufWriter` and pushed out with `flush()`, so a whole frame paint costs
//! one syscall.

use anyhow::Result;
use std::io::{self, BufWriter, Write};

/// Buffer capacity for write batching (64KB; encoded video frames are large)
const WRITE_BUFFER_CAPACITY: usize = 64 * 1024;

/// Minimal terminal output surface.
///
/// The frame painter is written against this trait so its positioning and
/// clearing logic can be tested against a recording sink instead of a live
/// terminal.
pub trait TermSink {
    /// Move the cursor to a 0-indexed cell position
    fn move_cursor(&mut self, col: u16, row: u16) -> Result<()>;
    /// Erase the line the cursor is on
    fn clear_line(&mut self) -> Result<()>;
    /// Write text at the current cursor position
    fn write_text(&mut self, text: &str) -> Result<()>;
    /// Push buffered output to the terminal
    fn flush(&mut self) -> Result<()>;
}

/// Live terminal sink over buffered stdout
pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    in_alt_screen: bool,
    cursor_hidden: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(WRITE_BUFFER_CAPACITY, io::stdout()),
            in_alt_screen: false,
            cursor_hidden: false,
        }
    }

    /// Enter the alternate screen buffer; flushes immediately so the switch
    /// happens before any subsequent drawing
    pub fn enter_alt_screen(&mut self) -> Result<()> {
        if !self.in_alt_screen {
            write!(self.writer, "\x1b[?1049h")?;
            self.writer.flush()?;
            self.in_alt_screen = true;
        }
        Ok(())
    }

    /// Leave the alternate screen buffer
    pub fn exit_alt_screen(&mut self) -> Result<()> {
        if self.in_alt_screen {
            write!(self.writer, "\x1b[?1049l")?;
            self.writer.flush()?;
            self.in_alt_screen = false;
        }
        Ok(())
    }

    /// Clear the whole screen
    pub fn clear(&mut self) -> Result<()> {
        write!(self.writer, "\x1b[2J")?;
        Ok(())
    }

    pub fn hide_cursor(&mut self) -> Result<()> {
        write!(self.writer, "\x1b[?25l")?;
        self.cursor_hidden = true;
        Ok(())
    }

    pub fn show_cursor(&mut self) -> Result<()> {
        write!(self.writer, "\x1b[?25h")?;
        self.cursor_hidden = false;
        Ok(())
    }

    /// Write text with ANSI style codes, resetting attributes after
    pub fn write_styled(&mut self, text: &str, style: &str) -> Result<()> {
        write!(self.writer, "{}{}\x1b[0m", style, text)?;
        Ok(())
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TermSink for Renderer {
    #[inline]
    fn move_cursor(&mut self, col: u16, row: u16) -> Result<()> {
        write!(self.writer, "\x1b[{};{}H", row + 1, col + 1)?;
        Ok(())
    }

    #[inline]
    fn clear_line(&mut self) -> Result<()> {
        write!(self.writer, "\x1b[2K")?;
        Ok(())
    }

    #[inline]
    fn write_text(&mut self, text: &str) -> Result<()> {
        write!(self.writer, "{}", text)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Restore the terminal even on panic paths
        if self.cursor_hidden {
            let _ = write!(self.writer, "\x1b[?25h");
        }
        if self.in_alt_screen {
            let _ = write!(self.writer, "\x1b[?1049l");
        }
        let _ = self.writer.flush();
    }
}
