use crate::domain::direction::Direction;
use crate::domain::error::ControlError;
use crate::domain::store::KeyValueStore;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Per-direction override of the character sent to the car.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandMap {
    overrides: BTreeMap<Direction, char>,
}

impl CommandMap {
    /// Load overrides from the store. Entries that are not exactly one
    /// ASCII character are skipped.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut map = Self::default();
        for direction in Direction::ALL {
            let Some(raw) = store.get(direction.storage_key()) else {
                continue;
            };
            match single_char(&raw) {
                Some(code) => {
                    map.overrides.insert(direction, code);
                }
                None => warn!(
                    "Ignoring stored code {:?} for {}: expected a single ASCII character",
                    raw, direction
                ),
            }
        }
        debug!("Loaded {} command overrides", map.overrides.len());
        map
    }

    /// Code to transmit for `direction`, falling back to its canonical code.
    pub fn code(&self, direction: Direction) -> char {
        self.overrides
            .get(&direction)
            .copied()
            .unwrap_or_else(|| direction.canonical_code())
    }

    /// Update one entry and persist it right away. The car reads one byte
    /// per command, so only ASCII codes are accepted.
    pub fn set(
        &mut self,
        direction: Direction,
        code: char,
        store: &mut dyn KeyValueStore,
    ) -> Result<(), ControlError> {
        if !code.is_ascii() {
            return Err(ControlError::NonAsciiCode(code));
        }
        store.set(direction.storage_key(), &code.to_string())?;
        self.overrides.insert(direction, code);
        Ok(())
    }

    /// Restore every direction to its canonical code, persisting each entry.
    pub fn reset(&mut self, store: &mut dyn KeyValueStore) -> Result<(), ControlError> {
        for direction in Direction::ALL {
            self.set(direction, direction.canonical_code(), store)?;
        }
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = (Direction, char)> + '_ {
        Direction::ALL.into_iter().map(|d| (d, self.code(d)))
    }
}

fn single_char(raw: &str) -> Option<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemoryStore;

    #[test]
    fn test_defaults_are_canonical() {
        let map = CommandMap::default();
        assert_eq!(map.code(Direction::Forward), 'f');
        assert_eq!(map.code(Direction::BackwardRight), 'c');
    }

    #[test]
    fn test_set_persists_each_entry() {
        let mut store = MemoryStore::default();
        let mut map = CommandMap::default();
        map.set(Direction::Forward, 'T', &mut store).unwrap();
        map.set(Direction::Stop, 'x', &mut store).unwrap();

        assert_eq!(store.get("key_forward").as_deref(), Some("T"));
        assert_eq!(store.get("key_stop").as_deref(), Some("x"));
        assert_eq!(CommandMap::load(&store), map);
    }

    #[test]
    fn test_load_skips_invalid_entries() {
        let mut store = MemoryStore::default();
        store.set("key_left", "ab").unwrap();
        store.set("key_right", "").unwrap();
        store.set("key_backward", "B").unwrap();
        store.set("key_stop", "é").unwrap();

        let map = CommandMap::load(&store);
        assert_eq!(map.code(Direction::Left), 'g');
        assert_eq!(map.code(Direction::Right), 'l');
        assert_eq!(map.code(Direction::Backward), 'B');
        assert_eq!(map.code(Direction::Stop), 's');
    }

    #[test]
    fn test_set_rejects_non_ascii() {
        let mut store = MemoryStore::default();
        let mut map = CommandMap::default();
        assert!(matches!(
            map.set(Direction::Forward, 'é', &mut store),
            Err(ControlError::NonAsciiCode('é'))
        ));
        assert_eq!(map.code(Direction::Forward), 'f');
        assert_eq!(store.get("key_forward"), None);
    }
}
