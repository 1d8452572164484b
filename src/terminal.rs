//! Terminal abstraction - geometry, cell pixel size, and capabilities

use anyhow::{Context, Result};

/// Fallback cell size when the terminal does not report pixel dimensions
const FALLBACK_CELL_WIDTH: u16 = 10;
const FALLBACK_CELL_HEIGHT: u16 = 20;

/// Terminal geometry: character grid plus per-cell pixel size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalGeometry {
    /// Terminal width in columns
    pub cols: u16,
    /// Terminal height in rows
    pub rows: u16,
    /// Width of one character cell in pixels
    pub cell_width: u16,
    /// Height of one character cell in pixels
    pub cell_height: u16,
}

impl TerminalGeometry {
    /// Detect the current terminal geometry.
    ///
    /// Cell pixel size comes from the `TIOCGWINSZ` ioctl when the terminal
    /// reports pixel dimensions; otherwise a typical monospace estimate is
    /// used so graphics sizing still works over e.g. ssh.
    pub fn detect() -> Result<Self> {
        let (cols, rows) = crossterm::terminal::size().context("failed to get terminal size")?;

        let (cell_width, cell_height) =
            query_cell_pixels(cols, rows).unwrap_or((FALLBACK_CELL_WIDTH, FALLBACK_CELL_HEIGHT));

        Ok(TerminalGeometry {
            cols,
            rows,
            cell_width,
            cell_height,
        })
    }

    /// Construct geometry with explicit dimensions (used by tests)
    pub fn with_cell_size(cols: u16, rows: u16, cell_width: u16, cell_height: u16) -> Self {
        TerminalGeometry {
            cols,
            rows,
            cell_width,
            cell_height,
        }
    }

    /// Total drawable area in pixels
    pub fn pixel_dimensions(&self) -> (u32, u32) {
        (
            self.cols as u32 * self.cell_width as u32,
            self.rows as u32 * self.cell_height as u32,
        )
    }
}

/// Ask the kernel for the window size in pixels and derive the cell size.
///
/// Returns None when the terminal reports zero pixel dimensions (common for
/// terminals that do not implement the extension).
fn query_cell_pixels(cols: u16, rows: u16) -> Option<(u16, u16)> {
    if cols == 0 || rows == 0 {
        return None;
    }

    let mut ws = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    // SAFETY: TIOCGWINSZ only writes into the winsize struct we pass in.
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };
    if rc != 0 || ws.ws_xpixel == 0 || ws.ws_ypixel == 0 {
        return None;
    }

    Some((ws.ws_xpixel / cols, ws.ws_ypixel / rows))
}

/// Terminal capability detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCapabilities {
    /// Supports Kitty graphics protocol
    pub kitty_graphics: bool,
    /// Supports Sixel graphics
    pub sixel: bool,
    /// Supports 24-bit true color
    pub truecolor: bool,
    /// Inside tmux/screen multiplexer
    pub in_multiplexer: bool,
}

impl TerminalCapabilities {
    /// Detect capabilities from the environment
    pub fn detect() -> Self {
        let term = std::env::var("TERM").unwrap_or_default();
        let colorterm = std::env::var("COLORTERM").unwrap_or_default();
        let kitty_window = std::env::var("KITTY_WINDOW_ID").is_ok();

        let kitty_graphics = kitty_window || term.contains("kitty") || term.contains("ghostty");
        let sixel = term.contains("mlterm")
            || term.contains("foot")
            || std::env::var("TERM_PROGRAM")
                .unwrap_or_default()
                .contains("WezTerm");
        let truecolor =
            colorterm.contains("truecolor") || colorterm.contains("24bit") || kitty_window;

        TerminalCapabilities {
            kitty_graphics,
            sixel,
            truecolor,
            in_multiplexer: std::env::var("TMUX").is_ok(),
        }
    }
}

/// Complete terminal context combining geometry and capabilities
#[derive(Debug, Clone)]
pub struct TerminalContext {
    pub geometry: TerminalGeometry,
    pub capabilities: TerminalCapabilities,
}

impl TerminalContext {
    /// Detect the current terminal environment
    pub fn detect() -> Result<Self> {
        Ok(TerminalContext {
            geometry: TerminalGeometry::detect()?,
            capabilities: TerminalCapabilities::detect(),
        })
    }

    /// Refresh geometry after a resize event
    pub fn refresh_geometry(&mut self) -> Result<()> {
        self.geometry = TerminalGeometry::detect()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_with_cell_size() {
        let geom = TerminalGeometry::with_cell_size(80, 24, 10, 20);
        assert_eq!(geom.cols, 80);
        assert_eq!(geom.rows, 24);
        assert_eq!(geom.pixel_dimensions(), (800, 480));
    }

    #[test]
    fn test_query_cell_pixels_rejects_zero_grid() {
        assert!(query_cell_pixels(0, 24).is_none());
        assert!(query_cell_pixels(80, 0).is_none());
    }

    #[test]
    fn test_capabilities_detect() {
        // Just ensure detection never panics in any environment
        let _ = TerminalCapabilities::detect();
    }
}
