//! Direction identifiers and the held-input set.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the nine on-screen controls: eight compass points plus stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    ForwardLeft,
    ForwardRight,
    BackwardLeft,
    BackwardRight,
}

impl Direction {
    pub const ALL: [Direction; 9] = [
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
        Direction::Stop,
        Direction::ForwardLeft,
        Direction::ForwardRight,
        Direction::BackwardLeft,
        Direction::BackwardRight,
    ];

    /// Default transmit code, positional over the firmware alphabet `f b g l s q e z c`.
    pub fn canonical_code(self) -> char {
        match self {
            Self::Forward => 'f',
            Self::Backward => 'b',
            Self::Left => 'g',
            Self::Right => 'l',
            Self::Stop => 's',
            Self::ForwardLeft => 'q',
            Self::ForwardRight => 'e',
            Self::BackwardLeft => 'z',
            Self::BackwardRight => 'c',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Left => "left",
            Self::Right => "right",
            Self::Stop => "stop",
            Self::ForwardLeft => "forward_left",
            Self::ForwardRight => "forward_right",
            Self::BackwardLeft => "backward_left",
            Self::BackwardRight => "backward_right",
        }
    }

    /// Key under which the user's override for this direction is persisted.
    /// These names are stable; changing one orphans existing overrides.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Forward => "key_forward",
            Self::Backward => "key_backward",
            Self::Left => "key_left",
            Self::Right => "key_right",
            Self::Stop => "key_stop",
            Self::ForwardLeft => "key_forward_left",
            Self::ForwardRight => "key_forward_right",
            Self::BackwardLeft => "key_backward_left",
            Self::BackwardRight => "key_backward_right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown direction `{0}`")]
pub struct UnknownDirection(pub String);

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Direction::ALL
            .into_iter()
            .find(|d| d.name() == normalized)
            .ok_or_else(|| UnknownDirection(s.to_string()))
    }
}

/// Ordered indicator rules, evaluated top to bottom. Diagonal pairs come first
/// so that holding two axes wins over either axis alone.
const INDICATOR_RULES: &[(&[Direction], Direction)] = &[
    (&[Direction::Forward, Direction::Left], Direction::ForwardLeft),
    (&[Direction::Forward, Direction::Right], Direction::ForwardRight),
    (&[Direction::Backward, Direction::Left], Direction::BackwardLeft),
    (&[Direction::Backward, Direction::Right], Direction::BackwardRight),
    (&[Direction::Forward], Direction::Forward),
    (&[Direction::Backward], Direction::Backward),
    (&[Direction::Left], Direction::Left),
    (&[Direction::Right], Direction::Right),
    (&[Direction::Stop], Direction::Stop),
];

/// Directions whose inputs are currently held down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveDirections {
    held: BTreeSet<Direction>,
}

impl ActiveDirections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the direction was not already held.
    pub fn insert(&mut self, direction: Direction) -> bool {
        self.held.insert(direction)
    }

    /// Returns true if the direction was held.
    pub fn remove(&mut self, direction: Direction) -> bool {
        self.held.remove(&direction)
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }

    pub fn contains(&self, direction: Direction) -> bool {
        self.held.contains(&direction)
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        self.held.iter().copied()
    }

    /// Which single control to highlight. Presentation only: the transmitted
    /// stream is always the raw per-key codes.
    pub fn indicated(&self) -> Option<Direction> {
        INDICATOR_RULES
            .iter()
            .find(|(required, _)| required.iter().all(|d| self.held.contains(d)))
            .map(|(_, indicated)| *indicated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(directions: &[Direction]) -> ActiveDirections {
        let mut active = ActiveDirections::new();
        for d in directions {
            active.insert(*d);
        }
        active
    }

    #[test]
    fn test_canonical_codes_are_distinct() {
        let codes: BTreeSet<char> = Direction::ALL.iter().map(|d| d.canonical_code()).collect();
        assert_eq!(codes.len(), 9);
        let alphabet: String = Direction::ALL.iter().map(|d| d.canonical_code()).collect();
        assert_eq!(alphabet, "fbglsqezc");
    }

    #[test]
    fn test_parse_direction() {
        assert_eq!("forward".parse::<Direction>(), Ok(Direction::Forward));
        assert_eq!("Backward-Left".parse::<Direction>(), Ok(Direction::BackwardLeft));
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_set_semantics() {
        let mut active = ActiveDirections::new();
        assert!(active.insert(Direction::Forward));
        assert!(!active.insert(Direction::Forward));
        assert_eq!(active.len(), 1);

        assert!(active.remove(Direction::Forward));
        assert!(!active.remove(Direction::Forward));
        assert!(active.is_empty());

        // Releasing something never pressed leaves the set untouched
        active.insert(Direction::Left);
        assert!(!active.remove(Direction::Right));
        assert_eq!(active.iter().collect::<Vec<_>>(), vec![Direction::Left]);
    }

    #[test]
    fn test_indicator_diagonals() {
        assert_eq!(
            held(&[Direction::Forward, Direction::Right]).indicated(),
            Some(Direction::ForwardRight)
        );
        assert_eq!(
            held(&[Direction::Right, Direction::Forward]).indicated(),
            Some(Direction::ForwardRight)
        );
        assert_eq!(
            held(&[Direction::Backward, Direction::Left]).indicated(),
            Some(Direction::BackwardLeft)
        );
    }

    #[test]
    fn test_indicator_priority() {
        // Forward+Left is checked before Forward+Right
        assert_eq!(
            held(&[Direction::Forward, Direction::Left, Direction::Right]).indicated(),
            Some(Direction::ForwardLeft)
        );
        // Forward wins over Backward when no lateral key is held
        assert_eq!(
            held(&[Direction::Forward, Direction::Backward]).indicated(),
            Some(Direction::Forward)
        );
        assert_eq!(
            held(&[Direction::Stop, Direction::Right]).indicated(),
            Some(Direction::Right)
        );
        assert_eq!(held(&[Direction::Stop]).indicated(), Some(Direction::Stop));
    }

    #[test]
    fn test_indicator_none() {
        assert_eq!(ActiveDirections::new().indicated(), None);
        // Diagonal buttons on their own are not covered by any rule
        assert_eq!(held(&[Direction::ForwardLeft]).indicated(), None);
    }
}
