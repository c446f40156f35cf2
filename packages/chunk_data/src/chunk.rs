//! Content of one chunk.

use crate::{
    content_id::*,
    field::Field,
    item::Item,
    per_tile::PerTile,
    spawn::SpawnPoint,
    vehicle::Vehicle,
};


/// A square of tiles at one z level, the unit of paging.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Chunk {
    pub ter: PerTile<TerId>,
    pub frn: PerTile<FurnId>,
    pub trp: PerTile<TrapId>,
    pub itm: PerTile<Vec<Item>>,
    pub fld: PerTile<Field>,
    pub rad: PerTile<i32>,
    pub graffiti: PerTile<Option<String>>,
    pub temperature: i32,
    pub turn_last_touched: i64,
    pub vehicles: Vec<Vehicle>,
    pub spawns: Vec<SpawnPoint>,
}

impl Chunk {
    /// Construct with every tile set to the given terrain and nothing else.
    pub fn new(ter: TerId) -> Self {
        Chunk {
            ter: PerTile::repeat(ter),
            frn: PerTile::repeat(F_NULL),
            trp: PerTile::repeat(TR_NULL),
            itm: PerTile::default(),
            fld: PerTile::default(),
            rad: PerTile::repeat(0),
            graffiti: PerTile::default(),
            temperature: 0,
            turn_last_touched: 0,
            vehicles: Vec::new(),
            spawns: Vec::new(),
        }
    }

    /// Number of field entries over all tiles.
    pub fn field_count(&self) -> usize {
        self.fld.0.iter().map(Field::len).sum()
    }

    /// Drop the loaded-session handles of every vehicle.
    pub fn clear_vehicle_handles(&mut self) {
        for vehicle in &mut self.vehicles {
            vehicle.handle = None;
        }
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Chunk::new(T_NULL)
    }
}
