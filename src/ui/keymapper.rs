//! Key mapping for teletype input
//!
//! Converts console key events to the characters a teletype keyboard sends,
//! and picks out the few keys that operate the machine itself.

use bitflags::bitflags;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::contracts::UserEvent;

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Key mapper for converting console events to user events
pub struct KeyMapper;

impl KeyMapper {
    /// Map any console event. Resizes are reported; mouse and focus are ignored.
    pub fn map_event(event: &Event) -> Option<UserEvent> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => Self::map(key),
            Event::Resize(_, _) => Some(UserEvent::Resized),
            _ => None,
        }
    }

    /// Map a crossterm KeyEvent
    pub fn map(event: &KeyEvent) -> Option<UserEvent> {
        let mods = Modifiers::from(event.modifiers);

        match event.code {
            // Machine controls
            KeyCode::F(5) => Some(UserEvent::ToggleFastMode),
            KeyCode::F(7) => Some(UserEvent::ToggleLid),
            KeyCode::F(10) => Some(UserEvent::Quit),
            KeyCode::PageUp => Some(UserEvent::PageUp),
            KeyCode::PageDown => Some(UserEvent::PageDown),

            KeyCode::Char(ch) => Self::map_char(ch, mods).map(UserEvent::Key),
            KeyCode::Enter => Some(UserEvent::Key('\r')),
            KeyCode::Backspace => Some(UserEvent::Key('\x08')),
            KeyCode::Tab => Some(UserEvent::Key('\t')),
            KeyCode::Esc => Some(UserEvent::Key('\x1b')),
            // RUBOUT
            KeyCode::Delete => Some(UserEvent::Key('\x7f')),

            _ => None,
        }
    }

    /// Map a character with modifiers. The keyboard has no meta key, so Alt
    /// is dropped.
    fn map_char(ch: char, mods: Modifiers) -> Option<char> {
        if !mods.contains(Modifiers::CTRL) {
            return Some(ch);
        }
        if ch.is_ascii_alphabetic() {
            let code = (ch.to_ascii_uppercase() as u8) - b'A' + 1;
            return Some(code as char);
        }
        match ch {
            '@' | ' ' => Some('\x00'),
            '[' => Some('\x1b'),
            '\\' => Some('\x1c'),
            ']' => Some('\x1d'),
            '^' => Some('\x1e'),
            '_' => Some('\x1f'),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, MouseEvent, MouseEventKind};

    fn key_event(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    fn key(code: KeyCode) -> Option<UserEvent> {
        KeyMapper::map(&key_event(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_char_keys() {
        assert_eq!(key(KeyCode::Char('a')), Some(UserEvent::Key('a')));

        // Ctrl+G rings the bell
        let event = key_event(KeyCode::Char('g'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), Some(UserEvent::Key('\x07')));

        let event = key_event(KeyCode::Char('D'), KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        assert_eq!(KeyMapper::map(&event), Some(UserEvent::Key('\x04')));

        // Alt is not a teletype key
        let event = key_event(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(KeyMapper::map(&event), Some(UserEvent::Key('x')));

        let event = key_event(KeyCode::Char('1'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), None);
    }

    #[test]
    fn test_control_keys() {
        assert_eq!(key(KeyCode::Enter), Some(UserEvent::Key('\r')));
        assert_eq!(key(KeyCode::Backspace), Some(UserEvent::Key('\x08')));
        assert_eq!(key(KeyCode::Tab), Some(UserEvent::Key('\t')));
        assert_eq!(key(KeyCode::Esc), Some(UserEvent::Key('\x1b')));
        assert_eq!(key(KeyCode::Delete), Some(UserEvent::Key('\x7f')));
        assert_eq!(key(KeyCode::Up), None);
    }

    #[test]
    fn test_machine_keys() {
        assert_eq!(key(KeyCode::F(5)), Some(UserEvent::ToggleFastMode));
        assert_eq!(key(KeyCode::F(7)), Some(UserEvent::ToggleLid));
        assert_eq!(key(KeyCode::F(10)), Some(UserEvent::Quit));
        assert_eq!(key(KeyCode::PageUp), Some(UserEvent::PageUp));
        assert_eq!(key(KeyCode::PageDown), Some(UserEvent::PageDown));
        assert_eq!(key(KeyCode::F(1)), None);
    }

    #[test]
    fn test_console_events() {
        assert_eq!(
            KeyMapper::map_event(&Event::Resize(80, 24)),
            Some(UserEvent::Resized)
        );

        let release = KeyEvent::new_with_kind_and_state(
            KeyCode::Char('a'),
            KeyModifiers::NONE,
            KeyEventKind::Release,
            KeyEventState::NONE,
        );
        assert_eq!(KeyMapper::map_event(&Event::Key(release)), None);

        let mouse = MouseEvent {
            kind: MouseEventKind::Moved,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(KeyMapper::map_event(&Event::Mouse(mouse)), None);
    }
}
