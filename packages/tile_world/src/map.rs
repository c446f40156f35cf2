//! The loaded window of the tile world and everything that reads or writes it.

use crate::{
    cache::{
        ChunkCache,
        CacheSource,
        VehicleCover,
        LIGHT_TRANSPARENCY_SOLID,
        LIGHT_TRANSPARENCY_CLEAR,
    },
    content::Content,
    error::{
        MapError,
        Result,
    },
    generate::{
        MapGenerator,
        generation_pair,
    },
    grid::ChunkGrid,
    settings::MapSettings,
    store::ChunkStore,
    traps::TrapIndex,
    vehicles::{
        VehicleArena,
        VehicleIndex,
    },
    window::Window,
};
use chunk_data::*;
use std::sync::Arc;
use vek::*;


/// A change to one tile. Applied with `TileMap::cell_write`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellMutation {
    Terrain(TerId),
    Furniture(FurnId),
    Trap(TrapId),
    AddField {
        kind: FieldTypeId,
        density: i32,
        age: i32,
    },
    RemoveField(FieldTypeId),
    SetRadiation(i32),
    AdjustRadiation(i32),
    AddItem(Item),
    ClearItems,
    Graffiti(Option<String>),
    /// Sets the temperature of the whole chunk containing the tile.
    Temperature(i32),
    /// Adds a spawn at the tile. The spawn's position is overwritten.
    AddSpawn(SpawnPoint),
}

// which caches a mutation invalidates
enum Dirties {
    Nothing,
    Structure,
    Fields,
}

/// Everything on one tile.
#[derive(Debug, Copy, Clone)]
pub struct CellView<'a> {
    pub ter: TerId,
    pub furn: FurnId,
    pub trap: TrapId,
    pub items: &'a [Item],
    pub field: &'a Field,
    pub radiation: i32,
    pub graffiti: Option<&'a str>,
    pub vehicle: Option<(VehicleHandle, usize)>,
}


/// The loaded window of chunks, backed by a chunk store and a generator.
pub struct TileMap {
    settings: MapSettings,
    content: Arc<Content>,
    store: ChunkStore,
    generator: Box<dyn MapGenerator>,
    grid: ChunkGrid,
    arena: VehicleArena,
    vehicles: VehicleIndex,
    traps: TrapIndex,
    turn: i64,
}

impl TileMap {
    /// Construct with nothing loaded yet and the window origin at chunk
    /// <0,0,0>. See `load_window`.
    pub fn new(
        settings: MapSettings,
        content: Arc<Content>,
        store: ChunkStore,
        generator: Box<dyn MapGenerator>,
    ) -> Self {
        let window = Window::new(Vec3::zero(), settings.map_size, settings.z_min, settings.z_max);
        TileMap {
            settings,
            content,
            store,
            generator,
            grid: ChunkGrid::new(window),
            arena: VehicleArena::new(),
            vehicles: VehicleIndex::new(window),
            traps: TrapIndex::new(),
            turn: 0,
        }
    }

    pub fn settings(&self) -> &MapSettings {
        &self.settings
    }

    pub fn content(&self) -> &Arc<Content> {
        &self.content
    }

    pub fn window(&self) -> Window {
        self.grid.window()
    }

    /// Chunk coordinate of the window's corner chunk.
    pub fn abs_sub(&self) -> Vec3<i32> {
        self.grid.window().abs_sub
    }

    pub fn inbounds(&self, pos: Vec3<i32>) -> bool {
        self.grid.window().inbounds(pos)
    }

    pub fn turn(&self) -> i64 {
        self.turn
    }

    pub fn set_turn(&mut self, turn: i64) {
        self.turn = turn;
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ChunkStore {
        &mut self.store
    }

    /// End the session, handing every loaded chunk back to the store and
    /// returning the store.
    pub fn into_store(mut self) -> ChunkStore {
        let abs_sub = self.abs_sub();
        let evicted = self.grid.relocate(abs_sub);
        self.evict(evicted);
        self.store
    }

    /// Loaded chunk at a grid position.
    pub fn chunk(&self, gp: Vec3<i32>) -> Option<&Chunk> {
        self.grid.chunk(gp)
    }

    pub fn is_loaded(&self, gp: Vec3<i32>) -> bool {
        self.grid.is_loaded(gp)
    }

    /// Whether the cache of a loaded chunk is currently valid.
    pub fn cache_is_valid(&self, gp: Vec3<i32>) -> bool {
        self.grid.cache_is_valid(gp)
    }


    // ==== loading and saving ====

    /// Move the window so its corner chunk is `abs_sub` and load every slot,
    /// returning previously loaded chunks to the store first.
    ///
    /// Slots that fail to load stay empty. The first error is returned after
    /// every slot has been attempted.
    pub fn load_window(&mut self, abs_sub: Vec3<i32>) -> Result<()> {
        debug!(?abs_sub, "loading window");
        let evicted = self.grid.relocate(abs_sub);
        self.evict(evicted);
        self.vehicles.reset(self.grid.window());
        self.load_empty_slots()
    }

    /// Move the window origin by `delta` chunks. Chunks that remain inside the
    /// window are kept along with their caches, chunks that leave it are
    /// returned to the store, and newly uncovered slots are loaded.
    ///
    /// Slots that fail to load stay empty. The first error is returned after
    /// every slot has been attempted.
    pub fn shift(&mut self, delta: Vec3<i32>) -> Result<()> {
        if delta == Vec3::zero() {
            return Ok(());
        }
        debug!(?delta, "shifting window");
        let evicted = self.grid.shift(delta);
        self.evict(evicted);
        self.reindex_vehicles();
        self.load_empty_slots()
    }

    fn load_empty_slots(&mut self) -> Result<()> {
        let mut first_error = None;
        for gp in self.grid.empty_gps() {
            if let Err(e) = self.load(gp) {
                error!(?gp, %e, "error loading chunk");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Load the chunk for grid position `gp` from the store, generating it
    /// and its generation pair first if the store does not have it. Does
    /// nothing if the slot is already loaded.
    pub fn load(&mut self, gp: Vec3<i32>) -> Result<()> {
        let window = self.grid.window();
        if !window.gp_inbounds(gp) {
            return Err(MapError::out_of_bounds(window.gp_lti_pos(gp, 0)));
        }
        if self.grid.is_loaded(gp) {
            return Ok(());
        }
        let cc = window.gp_cc(gp);
        let chunk = match self.store.get(cc)? {
            Some(chunk) => chunk,
            None => {
                let pair = generation_pair(cc);
                debug!(?cc, ?pair, "chunk not in store, generating");
                let (a, b) = self.generator
                    .generate(pair, self.turn)
                    .map_err(|e| MapError::GenerationFailure { cc, source: Some(e) })?;
                for (pair_cc, chunk) in pair.into_iter().zip([a, b]) {
                    if self.store.contains(pair_cc) {
                        debug!(cc = ?pair_cc, "keeping stored chunk over generated one");
                        continue;
                    }
                    self.store.put(pair_cc, chunk)?;
                }
                self.store.get(cc)?
                    .ok_or(MapError::GenerationFailure { cc, source: None })?
            }
        };
        self.install(gp, chunk);
        Ok(())
    }

    // put a chunk into an empty slot and register its vehicles
    fn install(&mut self, gp: Vec3<i32>, mut chunk: Chunk) {
        let window = self.grid.window();
        let cc = window.gp_cc(gp);
        for vehicle in &mut chunk.vehicles {
            let handle = self.arena.insert(cc);
            vehicle.handle = Some(handle);
            let cells = vehicle_gtcs(cc, vehicle);
            for &(_, gtc) in &cells {
                self.grid.dirty_vehicle_cover(window.gtc_pos(gtc));
            }
            self.vehicles.insert(handle, cells);
        }
        self.traps.add_chunk(cc, &chunk);
        self.grid.put(gp, chunk);
        self.grid.dirty_around(gp);
    }

    // hand chunks that left the window back to the store
    fn evict(&mut self, evicted: Vec<(Vec3<i32>, Chunk)>) {
        let window = self.grid.window();
        for (cc, mut chunk) in evicted {
            for vehicle in &chunk.vehicles {
                if let Some(handle) = vehicle.handle {
                    for gtc in self.vehicles.remove(handle) {
                        self.grid.dirty_vehicle_cover(window.gtc_pos(gtc));
                    }
                    self.arena.remove(handle);
                }
            }
            chunk.clear_vehicle_handles();
            self.traps.remove_chunk(cc, &chunk);
            if let Err(e) = self.store.put(cc, chunk) {
                error!(?cc, %e, "chunk lost while unloading");
            }
        }
    }

    // rebuild the occupancy index from the vehicles of every loaded chunk
    fn reindex_vehicles(&mut self) {
        let window = self.grid.window();
        self.vehicles.reset(window);
        for (gp, chunk) in self.grid.loaded_mut() {
            let cc = window.gp_cc(gp);
            for vehicle in &mut chunk.vehicles {
                let handle = match vehicle.handle {
                    Some(handle) if self.arena.contains(handle) => handle,
                    _ => self.arena.insert(cc),
                };
                vehicle.handle = Some(handle);
                self.vehicles.insert(handle, vehicle_gtcs(cc, vehicle));
            }
        }
    }

    /// Serialize the loaded chunk at grid position `gp` through the store.
    pub fn save(&mut self, gp: Vec3<i32>) -> Result<()> {
        let window = self.grid.window();
        let chunk = self.grid.chunk(gp)
            .ok_or_else(|| MapError::out_of_bounds(window.gp_lti_pos(gp, 0)))?;
        self.store.save(window.gp_cc(gp), chunk)
    }

    /// Stamp and save every loaded chunk.
    pub fn save_all(&mut self) -> Result<()> {
        let turn = self.turn;
        let gps = self.grid.loaded_mut()
            .map(|(gp, chunk)| {
                chunk.turn_last_touched = turn;
                gp
            })
            .collect::<Vec<_>>();
        for gp in gps {
            self.save(gp)?;
        }
        Ok(())
    }

    /// Save every loaded chunk and flush the store to disk.
    pub fn persist(&mut self) -> Result<()> {
        self.save_all()?;
        self.store.flush_all()
    }


    // ==== tile access ====

    /// Everything on a tile.
    pub fn cell_read(&self, pos: Vec3<i32>) -> Result<CellView<'_>> {
        let (chunk, lti) = self.grid.tile(pos).ok_or(MapError::out_of_bounds(pos))?;
        Ok(CellView {
            ter: chunk.ter[lti],
            furn: chunk.frn[lti],
            trap: chunk.trp[lti],
            items: &chunk.itm[lti],
            field: &chunk.fld[lti],
            radiation: chunk.rad[lti],
            graffiti: chunk.graffiti[lti].as_deref(),
            vehicle: self.vehicles.at(self.grid.window().pos_gtc(pos)),
        })
    }

    /// Apply a mutation to a tile, invalidating whatever caches depend on it.
    ///
    /// Every tile mutation goes through here.
    pub fn cell_write(&mut self, pos: Vec3<i32>, mutation: CellMutation) -> Result<()> {
        let gtc = self.grid.window().pos_gtc(pos);
        let (chunk, lti) = self.grid.tile_mut(pos).ok_or(MapError::out_of_bounds(pos))?;
        let dirties = match mutation {
            CellMutation::Terrain(ter) => {
                chunk.ter[lti] = ter;
                Dirties::Structure
            }
            CellMutation::Furniture(furn) => {
                chunk.frn[lti] = furn;
                Dirties::Structure
            }
            CellMutation::Trap(trap) => {
                self.traps.remove(chunk.trp[lti], gtc);
                self.traps.insert(trap, gtc);
                chunk.trp[lti] = trap;
                Dirties::Nothing
            }
            CellMutation::AddField { kind, density, age } => {
                chunk.fld[lti].add(kind, density, age);
                Dirties::Fields
            }
            CellMutation::RemoveField(kind) => {
                chunk.fld[lti].remove(kind);
                Dirties::Fields
            }
            CellMutation::SetRadiation(rad) => {
                chunk.rad[lti] = rad;
                Dirties::Nothing
            }
            CellMutation::AdjustRadiation(delta) => {
                chunk.rad[lti] += delta;
                Dirties::Nothing
            }
            CellMutation::AddItem(item) => {
                chunk.itm[lti].push(item);
                Dirties::Nothing
            }
            CellMutation::ClearItems => {
                chunk.itm[lti].clear();
                Dirties::Nothing
            }
            CellMutation::Graffiti(text) => {
                chunk.graffiti[lti] = text;
                Dirties::Nothing
            }
            CellMutation::Temperature(temperature) => {
                chunk.temperature = temperature;
                Dirties::Nothing
            }
            CellMutation::AddSpawn(mut spawn) => {
                spawn.pos = lti_to_ltc(lti);
                chunk.spawns.push(spawn);
                Dirties::Nothing
            }
        };
        match dirties {
            Dirties::Nothing => (),
            Dirties::Structure => self.grid.dirty_structure(pos),
            Dirties::Fields => self.grid.dirty_fields(pos),
        }
        Ok(())
    }

    pub fn ter_set(&mut self, pos: Vec3<i32>, ter: TerId) -> Result<()> {
        self.cell_write(pos, CellMutation::Terrain(ter))
    }

    pub fn furn_set(&mut self, pos: Vec3<i32>, furn: FurnId) -> Result<()> {
        self.cell_write(pos, CellMutation::Furniture(furn))
    }

    pub fn trap_set(&mut self, pos: Vec3<i32>, trap: TrapId) -> Result<()> {
        self.cell_write(pos, CellMutation::Trap(trap))
    }

    pub fn add_field(&mut self, pos: Vec3<i32>, kind: FieldTypeId, density: i32, age: i32) -> Result<()> {
        self.cell_write(pos, CellMutation::AddField { kind, density, age })
    }

    pub fn remove_field(&mut self, pos: Vec3<i32>, kind: FieldTypeId) -> Result<()> {
        self.cell_write(pos, CellMutation::RemoveField(kind))
    }

    pub fn set_radiation(&mut self, pos: Vec3<i32>, rad: i32) -> Result<()> {
        self.cell_write(pos, CellMutation::SetRadiation(rad))
    }

    pub fn adjust_radiation(&mut self, pos: Vec3<i32>, delta: i32) -> Result<()> {
        self.cell_write(pos, CellMutation::AdjustRadiation(delta))
    }

    pub fn add_item(&mut self, pos: Vec3<i32>, item: Item) -> Result<()> {
        self.cell_write(pos, CellMutation::AddItem(item))
    }

    pub fn clear_items(&mut self, pos: Vec3<i32>) -> Result<()> {
        self.cell_write(pos, CellMutation::ClearItems)
    }

    pub fn set_graffiti(&mut self, pos: Vec3<i32>, text: Option<String>) -> Result<()> {
        self.cell_write(pos, CellMutation::Graffiti(text))
    }

    pub fn set_temperature(&mut self, pos: Vec3<i32>, temperature: i32) -> Result<()> {
        self.cell_write(pos, CellMutation::Temperature(temperature))
    }

    pub fn add_spawn(&mut self, pos: Vec3<i32>, spawn: SpawnPoint) -> Result<()> {
        self.cell_write(pos, CellMutation::AddSpawn(spawn))
    }

    /// Terrain at a tile, null if not loaded.
    pub fn ter(&self, pos: Vec3<i32>) -> TerId {
        self.grid.tile(pos).map(|(chunk, lti)| chunk.ter[lti]).unwrap_or(T_NULL)
    }

    /// Furniture at a tile, null if not loaded.
    pub fn furn(&self, pos: Vec3<i32>) -> FurnId {
        self.grid.tile(pos).map(|(chunk, lti)| chunk.frn[lti]).unwrap_or(F_NULL)
    }

    /// Trap at a tile, null if not loaded.
    pub fn trap(&self, pos: Vec3<i32>) -> TrapId {
        self.grid.tile(pos).map(|(chunk, lti)| chunk.trp[lti]).unwrap_or(TR_NULL)
    }

    /// Positions of every loaded trap of a kind.
    pub fn trap_locations(&self, trap: TrapId) -> Vec<Vec3<i32>> {
        let window = self.grid.window();
        self.traps.locations(trap).into_iter().map(|gtc| window.gtc_pos(gtc)).collect()
    }

    pub fn field_at(&self, pos: Vec3<i32>) -> Option<&Field> {
        self.grid.tile(pos).map(|(chunk, lti)| &chunk.fld[lti])
    }

    /// Items at a tile, empty if not loaded.
    pub fn items_at(&self, pos: Vec3<i32>) -> &[Item] {
        self.grid.tile(pos).map(|(chunk, lti)| chunk.itm[lti].as_slice()).unwrap_or(&[])
    }

    /// Radiation at a tile, 0 if not loaded.
    pub fn radiation(&self, pos: Vec3<i32>) -> i32 {
        self.grid.tile(pos).map(|(chunk, lti)| chunk.rad[lti]).unwrap_or(0)
    }

    pub fn graffiti_at(&self, pos: Vec3<i32>) -> Option<&str> {
        self.grid.tile(pos).and_then(|(chunk, lti)| chunk.graffiti[lti].as_deref())
    }

    /// Temperature of the chunk containing a tile.
    pub fn temperature(&self, pos: Vec3<i32>) -> Option<i32> {
        self.grid.tile(pos).map(|(chunk, _)| chunk.temperature)
    }

    /// Cost of moving onto a tile, 0 meaning impassable or not loaded.
    pub fn move_cost(&self, pos: Vec3<i32>) -> i32 {
        let Some((chunk, lti)) = self.grid.tile(pos) else {
            return 0;
        };
        let cost = self.content.tile_move_cost(chunk.ter[lti], chunk.frn[lti]);
        if cost == 0 {
            return 0;
        }
        match self.vehicle_part_at(pos) {
            Some(part) if part.blocks_movement() => 0,
            Some(part) if part.flags.aisle => 2,
            Some(_) => 8,
            None => cost,
        }
    }

    pub fn is_bashable(&self, pos: Vec3<i32>) -> bool {
        let Some((chunk, lti)) = self.grid.tile(pos) else {
            return false;
        };
        self.content.is_bashable(chunk.ter[lti], chunk.frn[lti])
            || self.vehicle_part_at(pos).map(|part| part.blocks_movement()).unwrap_or(false)
    }

    /// Whether terrain or furniture at a tile is flagged indoors.
    pub fn is_indoors(&self, pos: Vec3<i32>) -> bool {
        self.grid.tile(pos)
            .map(|(chunk, lti)| self.content.is_indoors(chunk.ter[lti], chunk.frn[lti]))
            .unwrap_or(false)
    }

    pub fn is_closed_door(&self, pos: Vec3<i32>) -> bool {
        self.grid.tile(pos)
            .map(|(chunk, lti)| self.content.is_closed_door(chunk.ter[lti], chunk.frn[lti]))
            .unwrap_or(false)
    }


    // ==== cached queries ====

    fn cached<T>(&self, pos: Vec3<i32>, default: T, f: impl FnOnce(&ChunkCache, u8) -> T) -> T {
        let window = self.grid.window();
        if !window.inbounds(pos) {
            return default;
        }
        match self.grid.cache(window.pos_gp(pos), self) {
            Some(cache) => f(&cache, window.pos_lti(pos)),
            None => default,
        }
    }

    /// Transparency of a tile, solid if not loaded.
    pub fn light_transparency(&self, pos: Vec3<i32>) -> f32 {
        self.cached(pos, LIGHT_TRANSPARENCY_SOLID, |cache, lti| cache.transparency[lti])
    }

    /// Opacity of a tile, from 0 (clear) to 1 (solid). Solid if not loaded.
    pub fn opacity_at(&self, pos: Vec3<i32>) -> f32 {
        LIGHT_TRANSPARENCY_CLEAR - self.light_transparency(pos)
    }

    pub fn is_outdoors(&self, pos: Vec3<i32>) -> bool {
        self.cached(pos, false, |cache, lti| cache.outside[lti])
    }

    /// Whether sight passes from a tile up to the tile above it.
    pub fn allows_vertical_view_up(&self, pos: Vec3<i32>) -> bool {
        self.cached(pos, false, |cache, lti| cache.see_up[lti])
    }

    /// Whether sight passes from a tile down to the tile below it.
    pub fn allows_vertical_view_down(&self, pos: Vec3<i32>) -> bool {
        self.cached(pos, false, |cache, lti| cache.see_down[lti])
    }


    // ==== vehicles ====

    /// Place a vehicle with its position at `pos`. It is anchored in the
    /// chunk containing `pos`.
    pub fn add_vehicle(&mut self, pos: Vec3<i32>, mut vehicle: Vehicle) -> Result<VehicleHandle> {
        let window = self.grid.window();
        if self.grid.tile(pos).is_none() {
            return Err(MapError::out_of_bounds(pos));
        }
        let gp = window.pos_gp(pos);
        let cc = window.gp_cc(gp);
        vehicle.pos = lti_to_ltc(window.pos_lti(pos));
        let handle = self.arena.insert(cc);
        vehicle.handle = Some(handle);
        let cells = vehicle_gtcs(cc, &vehicle);
        for &(_, gtc) in &cells {
            self.grid.dirty_vehicle_cover(window.gtc_pos(gtc));
        }
        self.vehicles.insert(handle, cells);
        if let Some(chunk) = self.grid.chunk_mut(gp) {
            chunk.vehicles.push(vehicle);
        }
        trace!(?handle, ?pos, "added vehicle");
        Ok(handle)
    }

    /// Resolve a handle, revalidated against its anchor chunk.
    pub fn vehicle(&self, handle: VehicleHandle) -> Option<&Vehicle> {
        let anchor = self.arena.anchor(handle)?;
        self.grid.chunk(self.grid.window().cc_gp(anchor))?
            .vehicles.iter()
            .find(|vehicle| vehicle.handle == Some(handle))
    }

    /// Vehicle and part index occupying a tile.
    pub fn vehicle_at(&self, pos: Vec3<i32>) -> Option<(&Vehicle, usize)> {
        if !self.vehicles.occupied(pos) {
            return None;
        }
        let (handle, part) = self.vehicles.at(self.grid.window().pos_gtc(pos))?;
        let vehicle = self.vehicle(handle)?;
        if part < vehicle.parts.len() {
            Some((vehicle, part))
        } else {
            None
        }
    }

    pub fn vehicle_part_at(&self, pos: Vec3<i32>) -> Option<&VehiclePart> {
        self.vehicle_at(pos).map(|(vehicle, part)| &vehicle.parts[part])
    }

    /// Move a vehicle horizontally, transferring it to another chunk if its
    /// position crosses a chunk border.
    ///
    /// Returns false if the handle is stale. Errors if the destination is not
    /// loaded, in which case nothing changes.
    pub fn move_vehicle(&mut self, handle: VehicleHandle, delta: Vec2<i32>) -> Result<bool> {
        let window = self.grid.window();
        let Some(anchor) = self.arena.anchor(handle) else {
            return Ok(false);
        };
        let Some(vehicle) = self.vehicle(handle) else {
            return Ok(false);
        };
        let new_gtc = cc_ltc_to_gtc(anchor, vehicle.pos) + Vec3::new(delta.x, delta.y, 0);
        let new_pos = window.gtc_pos(new_gtc);
        if self.grid.tile(new_pos).is_none() {
            return Err(MapError::out_of_bounds(new_pos));
        }

        let Some(mut vehicle) = self.take_vehicle(handle, anchor) else {
            return Ok(false);
        };
        let new_cc = gtc_get_cc(new_gtc);
        vehicle.pos = gtc_get_ltc(new_gtc);
        self.arena.set_anchor(handle, new_cc);
        let cells = vehicle_gtcs(new_cc, &vehicle);
        for &(_, gtc) in &cells {
            self.grid.dirty_vehicle_cover(window.gtc_pos(gtc));
        }
        self.vehicles.insert(handle, cells);
        if let Some(chunk) = self.grid.chunk_mut(window.cc_gp(new_cc)) {
            chunk.vehicles.push(vehicle);
        }
        Ok(true)
    }

    /// Remove a vehicle from the world, returning it.
    pub fn remove_vehicle(&mut self, handle: VehicleHandle) -> Option<Vehicle> {
        let anchor = self.arena.anchor(handle)?;
        let mut vehicle = self.take_vehicle(handle, anchor);
        self.arena.remove(handle);
        if let Some(vehicle) = vehicle.as_mut() {
            vehicle.handle = None;
        }
        vehicle
    }

    // detach a vehicle from its chunk and the occupancy index
    fn take_vehicle(&mut self, handle: VehicleHandle, anchor: Vec3<i32>) -> Option<Vehicle> {
        let window = self.grid.window();
        for gtc in self.vehicles.remove(handle) {
            self.grid.dirty_vehicle_cover(window.gtc_pos(gtc));
        }
        let chunk = self.grid.chunk_mut(window.cc_gp(anchor))?;
        let i = chunk.vehicles.iter().position(|vehicle| vehicle.handle == Some(handle))?;
        Some(chunk.vehicles.remove(i))
    }

    /// Number of vehicles in the occupancy index.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.vehicle_count()
    }
}

// global tile coordinates of every part of a vehicle anchored in chunk `cc`
fn vehicle_gtcs(cc: Vec3<i32>, vehicle: &Vehicle) -> Vec<(usize, Vec3<i32>)> {
    vehicle.part_offsets()
        .map(|(part, offset)| (part, cc_ltc_to_gtc(cc, offset)))
        .collect()
}

impl CacheSource for TileMap {
    fn window(&self) -> Window {
        self.grid.window()
    }

    fn content(&self) -> &Content {
        &self.content
    }

    fn ter_furn(&self, pos: Vec3<i32>) -> Option<(TerId, FurnId)> {
        self.grid.tile(pos).map(|(chunk, lti)| (chunk.ter[lti], chunk.frn[lti]))
    }

    fn fields(&self, pos: Vec3<i32>) -> Option<&Field> {
        self.field_at(pos)
    }

    fn vehicle_cover(&self, pos: Vec3<i32>) -> VehicleCover {
        self.vehicle_part_at(pos).map(VehicleCover::of_part).unwrap_or_default()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use proptest::prelude::*;
    use std::{
        collections::BTreeSet,
        rc::Rc,
    };
    use tempfile::tempdir;

    fn car() -> Vehicle {
        let seat = PartFlags { inside: true, roof: true, ..PartFlags::default() };
        let board = PartFlags { obstacle: true, opaque: true, ..PartFlags::default() };
        Vehicle::new("car", vec![
            VehiclePart::new(Vec2::new(0, 0), seat),
            VehiclePart::new(Vec2::new(1, 0), board),
        ])
    }

    #[test]
    fn loads_whole_window() {
        let dir = tempdir().unwrap();
        let map = flat_map(&dir, 3, 0, 1);
        for gp in map.window().gps() {
            assert!(map.is_loaded(gp), "{:?} not loaded", gp);
        }
        assert_eq!(map.ter(Vec3::new(5, 30, 0)), ter(&map, "t_dirt"));
        assert_eq!(map.ter(Vec3::new(5, 30, 1)), ter(&map, "t_open_air"));
    }

    #[test]
    fn out_of_window_is_an_error() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 2, 0, 0);
        for pos in [Vec3::new(-1, 0, 0), Vec3::new(24, 0, 0), Vec3::new(0, 0, 1)] {
            assert!(matches!(map.cell_read(pos), Err(MapError::OutOfBounds { .. })));
            assert!(matches!(map.ter_set(pos, T_NULL), Err(MapError::OutOfBounds { .. })));
            assert_eq!(map.ter(pos), T_NULL);
            assert_eq!(map.opacity_at(pos), 1.0);
            assert_eq!(map.move_cost(pos), 0);
        }
    }

    #[test]
    fn generation_happens_in_pairs() {
        let dir = tempdir().unwrap();
        let content = content();
        let generator = FlatGenerator::new(Arc::clone(&content));
        let generated = Rc::clone(&generator.generated);
        let store = store(&dir, &content);
        let mut map = TileMap::new(settings(3, 0, 0), content, store, Box::new(generator));
        map.load_window(Vec3::zero()).unwrap();

        // x 0 and 1 share a pair, x 2 pairs with x 3 outside the window
        assert_eq!(generated.borrow().len(), 6);
        for y in 0..3 {
            assert!(map.store().contains(Vec3::new(3, y, 0)));
            assert!(!map.store().is_checked_out(Vec3::new(3, y, 0)));
            assert!(map.store().is_checked_out(Vec3::new(2, y, 0)));
        }
    }

    #[test]
    fn terrain_writes_invalidate_neighbors() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 2, 0, 0);
        let pos = Vec3::new(11, 5, 0);
        let east = Vec3::new(12, 5, 0);
        assert_eq!(map.opacity_at(pos), 0.0);
        assert!(map.is_outdoors(east));
        assert!(map.cache_is_valid(Vec3::new(0, 0, 0)));
        assert!(map.cache_is_valid(Vec3::new(1, 0, 0)));

        let wall = ter(&map, "t_wall");
        map.ter_set(pos, wall).unwrap();
        assert!(!map.cache_is_valid(Vec3::new(0, 0, 0)));
        assert!(!map.cache_is_valid(Vec3::new(1, 0, 0)));
        assert_eq!(map.opacity_at(pos), 1.0);
        assert!(!map.is_outdoors(east));
    }

    #[test]
    fn fields_dim_light() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 1, 0, 0);
        let smoke = map.content().field_type_id("fd_smoke").unwrap();
        let pos = Vec3::new(4, 4, 0);

        map.add_field(pos, smoke, 2, 0).unwrap();
        assert_eq!(map.opacity_at(pos), 0.5);
        map.add_field(pos, smoke, 1, 0).unwrap();
        assert_eq!(map.opacity_at(pos), 1.0);
        map.remove_field(pos, smoke).unwrap();
        assert_eq!(map.opacity_at(pos), 0.0);
    }

    #[test]
    fn underground_is_never_outdoors() {
        let dir = tempdir().unwrap();
        let map = flat_map(&dir, 1, -1, 0);
        assert!(map.is_outdoors(Vec3::new(3, 3, 0)));
        assert!(!map.is_outdoors(Vec3::new(3, 3, -1)));
    }

    #[test]
    fn vertical_view_follows_floors() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 1, 0, 1);
        let ground = Vec3::new(5, 5, 0);
        let above = Vec3::new(5, 5, 1);
        assert!(map.allows_vertical_view_up(ground));
        assert!(map.allows_vertical_view_down(above));
        assert!(!map.allows_vertical_view_down(ground));

        let floor = ter(&map, "t_floor");
        map.ter_set(above, floor).unwrap();
        assert!(!map.allows_vertical_view_up(ground));
        assert!(!map.allows_vertical_view_down(above));
    }

    #[test]
    fn zero_shift_changes_nothing() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 2, 0, 0);
        let wall = ter(&map, "t_wall");
        map.ter_set(Vec3::new(3, 3, 0), wall).unwrap();
        map.opacity_at(Vec3::new(3, 3, 0));
        let window = map.window();

        map.shift(Vec3::zero()).unwrap();
        assert_eq!(map.window(), window);
        assert!(map.cache_is_valid(Vec3::new(0, 0, 0)));
        assert_eq!(map.ter(Vec3::new(3, 3, 0)), wall);
    }

    #[test]
    fn shift_and_back_restores_contents() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 3, 0, 0);
        let wall = ter(&map, "t_wall");
        map.ter_set(Vec3::new(1, 1, 0), wall).unwrap();
        map.add_item(Vec3::new(30, 30, 0), Item::new("rock")).unwrap();
        map.set_graffiti(Vec3::new(2, 7, 0), Some("turn back".into())).unwrap();

        map.shift(Vec3::new(2, 0, 0)).unwrap();
        assert_eq!(map.abs_sub(), Vec3::new(2, 0, 0));
        assert_eq!(map.items_at(Vec3::new(6, 30, 0)), &[Item::new("rock")]);
        assert!(map.store().contains(Vec3::new(0, 0, 0)));

        map.shift(Vec3::new(-2, 0, 0)).unwrap();
        assert_eq!(map.abs_sub(), Vec3::zero());
        assert_eq!(map.ter(Vec3::new(1, 1, 0)), wall);
        assert_eq!(map.items_at(Vec3::new(30, 30, 0)), &[Item::new("rock")]);
        assert_eq!(map.graffiti_at(Vec3::new(2, 7, 0)), Some("turn back"));
    }

    #[test]
    fn moved_chunks_keep_their_caches() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 3, 0, 0);
        map.opacity_at(Vec3::new(15, 0, 0));
        assert!(map.cache_is_valid(Vec3::new(1, 0, 0)));

        map.shift(Vec3::new(1, 0, 0)).unwrap();
        assert!(map.cache_is_valid(Vec3::new(0, 0, 0)));
        assert!(!map.cache_is_valid(Vec3::new(2, 0, 0)));
    }

    #[test]
    fn trap_locations_follow_writes() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 2, 0, 0);
        let bear = map.content().trap_id("tr_beartrap").unwrap();
        let wire = map.content().trap_id("tr_tripwire").unwrap();
        map.trap_set(Vec3::new(20, 1, 0), bear).unwrap();
        map.trap_set(Vec3::new(3, 4, 0), bear).unwrap();
        map.trap_set(Vec3::new(5, 5, 0), wire).unwrap();
        assert_eq!(map.trap_locations(bear), vec![Vec3::new(20, 1, 0), Vec3::new(3, 4, 0)]);
        assert_eq!(map.trap_locations(wire), vec![Vec3::new(5, 5, 0)]);

        map.trap_set(Vec3::new(3, 4, 0), wire).unwrap();
        map.trap_set(Vec3::new(20, 1, 0), TR_NULL).unwrap();
        assert!(map.trap_locations(bear).is_empty());
        assert_eq!(map.trap_locations(wire), vec![Vec3::new(3, 4, 0), Vec3::new(5, 5, 0)]);
        assert!(map.trap_locations(TR_NULL).is_empty());
    }

    #[test]
    fn trap_locations_follow_the_window() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 3, 0, 0);
        let bear = map.content().trap_id("tr_beartrap").unwrap();
        map.trap_set(Vec3::new(2, 2, 0), bear).unwrap();
        map.trap_set(Vec3::new(30, 5, 0), bear).unwrap();

        map.shift(Vec3::new(1, 0, 0)).unwrap();
        assert_eq!(map.trap_locations(bear), vec![Vec3::new(18, 5, 0)]);

        map.shift(Vec3::new(-1, 0, 0)).unwrap();
        assert_eq!(map.trap_locations(bear), vec![Vec3::new(2, 2, 0), Vec3::new(30, 5, 0)]);

        map.load_window(Vec3::new(10, 10, 0)).unwrap();
        assert!(map.trap_locations(bear).is_empty());
        map.load_window(Vec3::zero()).unwrap();
        assert_eq!(map.trap_locations(bear).len(), 2);
    }

    #[test]
    fn failed_generation_leaves_rest_usable() {
        let dir = tempdir().unwrap();
        let content = content();
        let generator = FailingGenerator {
            inner: FlatGenerator::new(Arc::clone(&content)),
            fail: BTreeSet::from([(2, 0, 0)]),
        };
        let store = store(&dir, &content);
        let mut map = TileMap::new(settings(3, 0, 0), content, store, Box::new(generator));

        let e = map.load_window(Vec3::zero()).unwrap_err();
        assert!(matches!(e, MapError::GenerationFailure { cc, source: Some(_) } if cc == Vec3::new(2, 0, 0)));
        assert!(!map.is_loaded(Vec3::new(2, 0, 0)));
        assert!(map.is_loaded(Vec3::new(0, 0, 0)));
        assert!(map.is_loaded(Vec3::new(2, 1, 0)));
        assert!(matches!(map.cell_read(Vec3::new(30, 3, 0)), Err(MapError::OutOfBounds { .. })));

        let wall = ter(&map, "t_wall");
        map.ter_set(Vec3::new(3, 3, 0), wall).unwrap();
        assert_eq!(map.opacity_at(Vec3::new(3, 3, 0)), 1.0);
    }

    #[test]
    fn persisted_world_survives_restart() {
        let dir = tempdir().unwrap();
        let pos = Vec3::new(14, 3, 0);
        let mut map = flat_map(&dir, 2, 0, 0);
        let wall = ter(&map, "t_wall");
        map.ter_set(pos, wall).unwrap();
        let mut bottle = Item::new("bottle");
        bottle.put_in(Item::new("water"));
        map.add_item(Vec3::new(1, 1, 0), bottle).unwrap();
        map.set_radiation(Vec3::new(2, 2, 0), 7).unwrap();
        map.set_turn(42);
        map.persist().unwrap();
        drop(map.into_store());

        let content = content();
        let generator = FlatGenerator::new(Arc::clone(&content));
        let generated = Rc::clone(&generator.generated);
        let store = store(&dir, &content);
        let mut map = TileMap::new(settings(2, 0, 0), content, store, Box::new(generator));
        map.load_window(Vec3::zero()).unwrap();

        assert!(generated.borrow().is_empty());
        assert_eq!(map.ter(pos), wall);
        assert_eq!(map.items_at(Vec3::new(1, 1, 0))[0].contents, vec![Item::new("water")]);
        assert_eq!(map.radiation(Vec3::new(2, 2, 0)), 7);
        assert_eq!(map.chunk(Vec3::new(1, 1, 0)).unwrap().turn_last_touched, 42);
    }

    #[test]
    fn radiation_does_not_decay_while_unloaded() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 3, 0, 0);
        map.set_radiation(Vec3::new(4, 4, 0), 300).unwrap();
        map.persist().unwrap();

        map.set_turn(1_000_000);
        map.shift(Vec3::new(2, 0, 0)).unwrap();
        map.shift(Vec3::new(-2, 0, 0)).unwrap();
        assert_eq!(map.radiation(Vec3::new(4, 4, 0)), 300);
        assert_eq!(map.chunk(Vec3::zero()).unwrap().turn_last_touched, 0);
    }

    #[test]
    fn into_store_returns_every_chunk() {
        let dir = tempdir().unwrap();
        let map = flat_map(&dir, 2, 0, 0);
        let store = map.into_store();
        assert_eq!(store.len(), 4);
        assert!(!store.is_checked_out(Vec3::new(1, 1, 0)));
    }

    #[test]
    fn spawns_take_the_tile_position() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 2, 0, 0);
        map.add_spawn(Vec3::new(13, 4, 0), SpawnPoint::new("mon_zombie", 2, Vec2::zero())).unwrap();
        let spawns = &map.chunk(Vec3::new(1, 0, 0)).unwrap().spawns;
        assert_eq!(spawns.len(), 1);
        assert_eq!(spawns[0].pos, Vec2::new(1, 4));
    }

    #[test]
    fn vehicle_occupies_and_blocks() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 2, 0, 0);
        map.add_vehicle(Vec3::new(5, 5, 0), car()).unwrap();

        assert_eq!(map.vehicle_at(Vec3::new(5, 5, 0)).map(|(_, part)| part), Some(0));
        assert_eq!(map.vehicle_at(Vec3::new(6, 5, 0)).map(|(_, part)| part), Some(1));
        assert_eq!(map.move_cost(Vec3::new(5, 5, 0)), 8);
        assert_eq!(map.move_cost(Vec3::new(6, 5, 0)), 0);
        assert!(map.is_bashable(Vec3::new(6, 5, 0)));
        assert_eq!(map.opacity_at(Vec3::new(6, 5, 0)), 1.0);
        assert!(!map.is_outdoors(Vec3::new(5, 5, 0)));
        assert_eq!(map.vehicle_count(), 1);
    }

    #[test]
    fn vehicle_moves_between_chunks() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 2, 0, 0);
        let handle = map.add_vehicle(Vec3::new(10, 5, 0), car()).unwrap();
        assert_eq!(map.opacity_at(Vec3::new(11, 5, 0)), 1.0);

        assert!(map.move_vehicle(handle, Vec2::new(3, 0)).unwrap());
        assert!(map.chunk(Vec3::new(0, 0, 0)).unwrap().vehicles.is_empty());
        assert_eq!(map.chunk(Vec3::new(1, 0, 0)).unwrap().vehicles.len(), 1);
        assert_eq!(map.vehicle(handle).unwrap().pos, Vec2::new(1, 5));
        assert!(map.vehicle_at(Vec3::new(10, 5, 0)).is_none());
        assert_eq!(map.vehicle_at(Vec3::new(14, 5, 0)).map(|(_, part)| part), Some(1));
        assert_eq!(map.opacity_at(Vec3::new(11, 5, 0)), 0.0);
        assert_eq!(map.opacity_at(Vec3::new(14, 5, 0)), 1.0);
    }

    #[test]
    fn vehicle_move_out_of_window_is_refused() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 2, 0, 0);
        let handle = map.add_vehicle(Vec3::new(5, 5, 0), car()).unwrap();
        assert!(matches!(
            map.move_vehicle(handle, Vec2::new(100, 0)),
            Err(MapError::OutOfBounds { .. }),
        ));
        assert!(map.vehicle_at(Vec3::new(5, 5, 0)).is_some());
    }

    #[test]
    fn removed_vehicle_handle_goes_stale() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 2, 0, 0);
        let handle = map.add_vehicle(Vec3::new(5, 5, 0), car()).unwrap();
        let vehicle = map.remove_vehicle(handle).unwrap();
        assert_eq!(vehicle.handle, None);
        assert!(map.vehicle(handle).is_none());
        assert!(!map.move_vehicle(handle, Vec2::new(1, 0)).unwrap());
        assert!(map.vehicle_at(Vec3::new(5, 5, 0)).is_none());
        assert_eq!(map.move_cost(Vec3::new(6, 5, 0)), 2);
    }

    #[test]
    fn unloaded_vehicles_come_back_with_new_handles() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 2, 0, 0);
        let handle = map.add_vehicle(Vec3::new(2, 2, 0), car()).unwrap();

        map.shift(Vec3::new(2, 0, 0)).unwrap();
        assert!(map.vehicle(handle).is_none());
        assert_eq!(map.vehicle_count(), 0);

        map.shift(Vec3::new(-2, 0, 0)).unwrap();
        let (vehicle, part) = map.vehicle_at(Vec3::new(2, 2, 0)).unwrap();
        assert_eq!(part, 0);
        assert_ne!(vehicle.handle, Some(handle));
        assert_eq!(map.vehicle_count(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn cached_queries_match_fresh_rebuild(
            writes in prop::collection::vec((0..24i32, 0..24i32, 0..4usize, any::<bool>()), 1..24),
        ) {
            let dir = tempdir().unwrap();
            let mut map = flat_map(&dir, 2, 0, 0);
            let palette = ["t_dirt", "t_wall", "t_floor", "t_window"]
                .map(|symbol| ter(&map, symbol));
            for (x, y, i, query) in writes {
                let pos = Vec3::new(x, y, 0);
                map.ter_set(pos, palette[i]).unwrap();
                if query {
                    map.opacity_at(pos);
                }
            }

            for gp in map.window().gps() {
                let mut fresh = ChunkCache::new();
                fresh.rebuild(gp, &map);
                for lti in 0..=MAX_LTI {
                    let pos = map.window().gp_lti_pos(gp, lti);
                    prop_assert_eq!(map.light_transparency(pos), fresh.transparency[lti]);
                    prop_assert_eq!(map.is_outdoors(pos), fresh.outside[lti]);
                }
            }
        }
    }
}
