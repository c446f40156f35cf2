//! Vehicle arena and tile occupancy index.
//!
//! Vehicles themselves live in the chunk that anchors them. The arena hands
//! out stable handles for loaded vehicles and remembers each one's anchor
//! chunk. The occupancy index maps tiles to handles, so a stale entry resolves
//! to nothing rather than to the wrong vehicle.

use crate::window::Window;
use chunk_data::*;
use std::collections::HashMap;
use slab::Slab;
use vek::*;


#[derive(Debug, Copy, Clone)]
struct ArenaEntry {
    generation: u32,
    anchor: Vec3<i32>,
}

/// Allocator of vehicle handles.
#[derive(Debug, Default)]
pub struct VehicleArena {
    slab: Slab<ArenaEntry>,
    next_generation: u32,
}

impl VehicleArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vehicle anchored in chunk `anchor`.
    pub fn insert(&mut self, anchor: Vec3<i32>) -> VehicleHandle {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        let index = self.slab.insert(ArenaEntry { generation, anchor });
        VehicleHandle {
            index: index as u32,
            generation,
        }
    }

    fn entry(&self, handle: VehicleHandle) -> Option<&ArenaEntry> {
        self.slab
            .get(handle.index as usize)
            .filter(|entry| entry.generation == handle.generation)
    }

    /// Anchor chunk of a live handle.
    pub fn anchor(&self, handle: VehicleHandle) -> Option<Vec3<i32>> {
        self.entry(handle).map(|entry| entry.anchor)
    }

    /// Returns false if the handle is stale.
    pub fn set_anchor(&mut self, handle: VehicleHandle, anchor: Vec3<i32>) -> bool {
        match self.slab.get_mut(handle.index as usize) {
            Some(entry) if entry.generation == handle.generation => {
                entry.anchor = anchor;
                true
            }
            _ => false,
        }
    }

    /// Returns the anchor chunk the handle had, if it was live.
    pub fn remove(&mut self, handle: VehicleHandle) -> Option<Vec3<i32>> {
        let anchor = self.anchor(handle)?;
        self.slab.remove(handle.index as usize);
        Some(anchor)
    }

    pub fn contains(&self, handle: VehicleHandle) -> bool {
        self.entry(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.slab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }
}


/// Which vehicle part, if any, occupies each tile.
#[derive(Debug)]
pub struct VehicleIndex {
    window: Window,
    parts: HashMap<Vec3<i32>, (VehicleHandle, usize)>,
    by_vehicle: HashMap<VehicleHandle, Vec<Vec3<i32>>>,
    occupied: Vec<PerTile<bool>>,
}

impl VehicleIndex {
    pub fn new(window: Window) -> Self {
        VehicleIndex {
            window,
            parts: HashMap::new(),
            by_vehicle: HashMap::new(),
            occupied: (0..window.slot_count()).map(|_| PerTile::repeat(false)).collect(),
        }
    }

    /// Forget everything and adopt a new window.
    pub fn reset(&mut self, window: Window) {
        *self = VehicleIndex::new(window);
    }

    fn set_occupied(&mut self, gtc: Vec3<i32>, val: bool) {
        let pos = self.window.gtc_pos(gtc);
        if self.window.inbounds(pos) {
            let slot = self.window.slot(self.window.pos_gp(pos));
            self.occupied[slot][self.window.pos_lti(pos)] = val;
        }
    }

    /// Record the tiles of a vehicle's parts, replacing anything recorded for
    /// that vehicle before.
    pub fn insert<I>(&mut self, handle: VehicleHandle, parts: I)
    where
        I: IntoIterator<Item=(usize, Vec3<i32>)>,
    {
        self.remove(handle);
        let mut cells = Vec::new();
        for (part, gtc) in parts {
            self.parts.insert(gtc, (handle, part));
            self.set_occupied(gtc, true);
            cells.push(gtc);
        }
        self.by_vehicle.insert(handle, cells);
    }

    /// Remove every entry of a vehicle, returning the tiles it covered.
    pub fn remove(&mut self, handle: VehicleHandle) -> Vec<Vec3<i32>> {
        let cells = self.by_vehicle.remove(&handle).unwrap_or_default();
        for &gtc in &cells {
            if self.parts.get(&gtc).map(|&(h, _)| h == handle).unwrap_or(false) {
                self.parts.remove(&gtc);
                self.set_occupied(gtc, false);
            }
        }
        cells
    }

    /// Handle and part index at a global tile coordinate.
    pub fn at(&self, gtc: Vec3<i32>) -> Option<(VehicleHandle, usize)> {
        self.parts.get(&gtc).copied()
    }

    /// Fast check whether anything occupies an in-window position.
    pub fn occupied(&self, pos: Vec3<i32>) -> bool {
        if !self.window.inbounds(pos) {
            return false;
        }
        let slot = self.window.slot(self.window.pos_gp(pos));
        self.occupied[slot][self.window.pos_lti(pos)]
    }

    pub fn vehicle_count(&self) -> usize {
        self.by_vehicle.len()
    }

    pub fn cells(&self, handle: VehicleHandle) -> &[Vec3<i32>] {
        self.by_vehicle.get(&handle).map(Vec::as_slice).unwrap_or(&[])
    }
}
