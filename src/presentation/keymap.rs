//! Keyboard layout of the terminal remote.
//!
//! ```text
//!  q w e      ↖ ↑ ↗
//!  a s d      ← ■ →
//!  z x c      ↙ ↓ ↘
//! ```

use crate::domain::direction::Direction;
use crossterm::event::KeyCode;

/// Speed change per `+`/`-` press
pub const SPEED_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    Direction(Direction),
    /// `0`-`9`: speed in tens of percent, or a device pick while choosing.
    Digit(u8),
    SpeedUp,
    SpeedDown,
    Connect,
    Disconnect,
    /// Quit, or decline a pending device choice.
    Escape,
}

pub fn action_for(code: KeyCode) -> Option<KeyAction> {
    let action = match code {
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'q' => KeyAction::Direction(Direction::ForwardLeft),
            'w' => KeyAction::Direction(Direction::Forward),
            'e' => KeyAction::Direction(Direction::ForwardRight),
            'a' => KeyAction::Direction(Direction::Left),
            's' => KeyAction::Direction(Direction::Stop),
            'd' => KeyAction::Direction(Direction::Right),
            'z' => KeyAction::Direction(Direction::BackwardLeft),
            'x' => KeyAction::Direction(Direction::Backward),
            'c' => KeyAction::Direction(Direction::BackwardRight),
            '+' | '=' => KeyAction::SpeedUp,
            '-' | '_' => KeyAction::SpeedDown,
            d @ '0'..='9' => KeyAction::Digit(d as u8 - b'0'),
            _ => return None,
        },
        KeyCode::Up => KeyAction::Direction(Direction::Forward),
        KeyCode::Down => KeyAction::Direction(Direction::Backward),
        KeyCode::Left => KeyAction::Direction(Direction::Left),
        KeyCode::Right => KeyAction::Direction(Direction::Right),
        KeyCode::Enter => KeyAction::Connect,
        KeyCode::Backspace => KeyAction::Disconnect,
        KeyCode::Esc => KeyAction::Escape,
        _ => return None,
    };
    Some(action)
}

/// Speed after a step, kept within [0, 1] and on whole percents.
pub fn step_speed(current: f32, up: bool) -> f32 {
    let next = if up {
        current + SPEED_STEP
    } else {
        current - SPEED_STEP
    };
    (next.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

pub fn help_lines() -> [&'static str; 4] {
    [
        "Drive: q w e / a s d / z x c or arrow keys (s = stop)",
        "Speed: 0-9 sets 0-90%, +/- steps 10%",
        "Enter: connect   Backspace: disconnect   Esc: quit",
        "While choosing a device: press its number, Esc to cancel",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypad_layout() {
        assert_eq!(
            action_for(KeyCode::Char('w')),
            Some(KeyAction::Direction(Direction::Forward))
        );
        assert_eq!(
            action_for(KeyCode::Char('C')),
            Some(KeyAction::Direction(Direction::BackwardRight))
        );
        assert_eq!(
            action_for(KeyCode::Left),
            Some(KeyAction::Direction(Direction::Left))
        );
        assert_eq!(action_for(KeyCode::Char('7')), Some(KeyAction::Digit(7)));
        assert_eq!(action_for(KeyCode::Char('p')), None);
        assert_eq!(action_for(KeyCode::Tab), None);
    }

    #[test]
    fn test_every_direction_has_a_key() {
        let mapped: Vec<Direction> = "qweasdzxc"
            .chars()
            .filter_map(|c| match action_for(KeyCode::Char(c)) {
                Some(KeyAction::Direction(d)) => Some(d),
                _ => None,
            })
            .collect();
        for direction in Direction::ALL {
            assert!(mapped.contains(&direction), "{} has no key", direction);
        }
    }

    #[test]
    fn test_step_speed_clamps() {
        assert_eq!(step_speed(0.95, true), 1.0);
        assert_eq!(step_speed(0.05, false), 0.0);
        assert_eq!(step_speed(0.5, true), 0.6);
    }
}
