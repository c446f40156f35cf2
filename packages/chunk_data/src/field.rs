//! Field state of a single tile.

use crate::content_id::FieldTypeId;


/// Max density of a field entry.
pub const MAX_FIELD_DENSITY: u8 = 3;


/// One field present on a tile.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FieldEntry {
    pub kind: FieldTypeId,
    /// Always within `1..=MAX_FIELD_DENSITY`.
    pub density: u8,
    pub age: i32,
}

/// The set of fields on a tile, at most one entry per kind, ordered by kind.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Field {
    entries: Vec<FieldEntry>,
}

fn clamp_density(density: i32) -> u8 {
    density.clamp(1, MAX_FIELD_DENSITY as i32) as u8
}

impl Field {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field of the given kind. If one is already present, its density
    /// is raised by `density` and it keeps the younger of the two ages.
    ///
    /// Returns whether a new entry was created. Adding the null kind does
    /// nothing.
    pub fn add(&mut self, kind: FieldTypeId, density: i32, age: i32) -> bool {
        if kind.is_null() {
            return false;
        }
        match self.entries.binary_search_by_key(&kind, |entry| entry.kind) {
            Ok(i) => {
                let entry = &mut self.entries[i];
                entry.density = clamp_density(entry.density as i32 + density);
                entry.age = entry.age.min(age);
                false
            }
            Err(i) => {
                self.entries.insert(i, FieldEntry {
                    kind,
                    density: clamp_density(density),
                    age,
                });
                true
            }
        }
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, kind: FieldTypeId) -> bool {
        match self.entries.binary_search_by_key(&kind, |entry| entry.kind) {
            Ok(i) => {
                self.entries.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    pub fn get(&self, kind: FieldTypeId) -> Option<&FieldEntry> {
        self.entries
            .binary_search_by_key(&kind, |entry| entry.kind)
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item=&FieldEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
