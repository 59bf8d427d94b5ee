//! Key bindings: normal and vim-style.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start, or restart once the board has halted.
    Start,
    Pause,
    Reset,
    /// One manual tick while paused.
    Step,
    Quit,
    None,
}

pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::Quit;
    }
    if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char(' ') | KeyCode::Enter => Action::Start,
        KeyCode::Char('p') => Action::Pause,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Reset,
        KeyCode::Char('n') | KeyCode::Char('j') | KeyCode::Down => Action::Step,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_normal_and_vim_keys() {
        assert_eq!(key_to_action(key(KeyCode::Char(' '))), Action::Start);
        assert_eq!(key_to_action(key(KeyCode::Enter)), Action::Start);
        assert_eq!(key_to_action(key(KeyCode::Down)), Action::Step);
        assert_eq!(key_to_action(key(KeyCode::Char('j'))), Action::Step);
        assert_eq!(key_to_action(key(KeyCode::Esc)), Action::Quit);
        assert_eq!(key_to_action(key(KeyCode::Char('x'))), Action::None);
    }

    #[test]
    fn test_modifiers() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_to_action(ctrl_c), Action::Quit);
        let alt_q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::ALT);
        assert_eq!(key_to_action(alt_q), Action::None);
        let shift_r = KeyEvent::new(KeyCode::Char('R'), KeyModifiers::SHIFT);
        assert_eq!(key_to_action(shift_r), Action::Reset);
    }
}
