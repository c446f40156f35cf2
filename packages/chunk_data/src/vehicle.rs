//! Vehicle data as stored in the chunk that anchors it.

use serde::{Serialize, Deserialize};
use vek::*;


/// Stable handle to a vehicle that is currently loaded.
///
/// Handles are minted when a vehicle enters the loaded area and are not
/// persisted. A handle whose vehicle has since been unloaded or removed
/// simply resolves to nothing.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VehicleHandle {
    pub index: u32,
    pub generation: u32,
}

/// Behavior flags of a single vehicle part.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartFlags {
    pub obstacle: bool,
    pub openable: bool,
    pub open: bool,
    pub aisle: bool,
    pub roof: bool,
    pub inside: bool,
    pub opaque: bool,
}

/// One part of a vehicle. Every part covers exactly one tile.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct VehiclePart {
    /// Offset from the vehicle's position.
    pub mount: Vec2<i32>,
    pub hp: i32,
    #[serde(default)]
    pub flags: PartFlags,
}

impl VehiclePart {
    pub fn new(mount: Vec2<i32>, flags: PartFlags) -> Self {
        VehiclePart { mount, hp: 100, flags }
    }

    /// Whether this part stops movement and can be bashed.
    pub fn blocks_movement(&self) -> bool {
        self.flags.obstacle && !(self.flags.openable && self.flags.open)
    }

    /// Whether this part stops sight.
    pub fn blocks_sight(&self) -> bool {
        self.flags.opaque && self.hp > 0 && !(self.flags.openable && self.flags.open)
    }

    /// Whether this part puts a ceiling over its tile.
    pub fn covers(&self) -> bool {
        self.flags.inside || self.flags.roof
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub name: String,
    /// Local tile coordinate within the anchoring chunk.
    pub pos: Vec2<i32>,
    pub parts: Vec<VehiclePart>,
    #[serde(skip)]
    pub handle: Option<VehicleHandle>,
}

impl Vehicle {
    pub fn new(name: impl Into<String>, parts: Vec<VehiclePart>) -> Self {
        Vehicle {
            name: name.into(),
            pos: Vec2::zero(),
            parts,
            handle: None,
        }
    }

    /// Offsets of every part relative to the anchoring chunk's origin tile.
    pub fn part_offsets(&self) -> impl Iterator<Item=(usize, Vec2<i32>)> + '_ {
        self.parts.iter().enumerate().map(|(i, part)| (i, self.pos + part.mount))
    }
}
