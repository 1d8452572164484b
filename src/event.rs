//! Input events - keyboard and terminal events via crossterm

use anyhow::Result;
use std::time::Duration;

/// Keyboard key representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Ctrl(char),
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Backspace,
    Enter,
    Esc,
    Other,
}

/// Events delivered to the application loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Keyboard event
    Key(Key),
    /// Terminal resized (new cols, new rows)
    Resize(u16, u16),
    /// Terminal gained focus (tmux pane switch etc.)
    FocusGained,
}

/// Event polling wrapper owning raw-mode lifetime
pub struct EventPoller {
    _raw: (),
}

impl EventPoller {
    /// Enable raw mode and start polling
    pub fn new() -> Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        let _ = crossterm::execute!(std::io::stdout(), crossterm::event::EnableFocusChange);
        Ok(EventPoller { _raw: () })
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// This timeout is the application's only timer: the playback
    /// scheduler's next-tick delay is fed in here, so a tick fires either
    /// when the deadline passes or early after an unrelated input event.
    pub fn poll(&self, timeout: Duration) -> Result<Option<Event>> {
        if !crossterm::event::poll(timeout)? {
            return Ok(None);
        }
        Ok(convert(crossterm::event::read()?))
    }
}

impl Drop for EventPoller {
    fn drop(&mut self) {
        let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableFocusChange);
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Convert a crossterm event, ignoring kinds the viewer has no use for
fn convert(event: crossterm::event::Event) -> Option<Event> {
    use crossterm::event::Event as CEvent;

    match event {
        CEvent::Key(key) if key.kind != crossterm::event::KeyEventKind::Release => {
            Some(Event::Key(convert_key(key.code, key.modifiers)))
        }
        CEvent::Resize(cols, rows) => Some(Event::Resize(cols, rows)),
        CEvent::FocusGained => Some(Event::FocusGained),
        _ => None,
    }
}

fn convert_key(code: crossterm::event::KeyCode, mods: crossterm::event::KeyModifiers) -> Key {
    use crossterm::event::{KeyCode, KeyModifiers};

    if mods.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = code {
            return Key::Ctrl(c);
        }
    }

    match code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        _ => Key::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    #[test]
    fn test_ctrl_modifier_wins() {
        assert_eq!(
            convert_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Key::Ctrl('c')
        );
        assert_eq!(
            convert_key(KeyCode::Char('c'), KeyModifiers::NONE),
            Key::Char('c')
        );
    }

    #[test]
    fn test_unknown_keys_collapse_to_other() {
        assert_eq!(convert_key(KeyCode::F(5), KeyModifiers::NONE), Key::Other);
    }
}
