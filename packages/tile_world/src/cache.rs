//! Derived per-chunk caches of transparency, outdoors and vertical sight.

use crate::{
    content::Content,
    window::Window,
};
use chunk_data::*;
use vek::*;


/// Transparency of a tile that blocks all light.
pub const LIGHT_TRANSPARENCY_SOLID: f32 = 0.0;

/// Transparency of a tile that blocks no light.
pub const LIGHT_TRANSPARENCY_CLEAR: f32 = 1.0;


/// Effects of a vehicle part standing on a tile.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct VehicleCover {
    /// Tile is inside the vehicle.
    pub inside: bool,
    /// Something overhead stops sight up.
    pub roof: bool,
    pub blocks_sight: bool,
}

impl VehicleCover {
    pub fn of_part(part: &VehiclePart) -> Self {
        VehicleCover {
            inside: part.flags.inside,
            roof: part.covers(),
            blocks_sight: part.blocks_sight(),
        }
    }
}

/// Read access to the loaded window that a cache rebuild needs.
pub trait CacheSource {
    fn window(&self) -> Window;

    fn content(&self) -> &Content;

    /// Terrain and furniture at a position, if loaded.
    fn ter_furn(&self, pos: Vec3<i32>) -> Option<(TerId, FurnId)>;

    /// Field state at a position, if loaded.
    fn fields(&self, pos: Vec3<i32>) -> Option<&Field>;

    fn vehicle_cover(&self, pos: Vec3<i32>) -> VehicleCover;
}


/// Derived data for every tile of one chunk, guarded by a single dirty flag.
#[derive(Debug, Clone)]
pub struct ChunkCache {
    pub transparency: PerTile<f32>,
    pub outside: PerTile<bool>,
    pub see_up: PerTile<bool>,
    pub see_down: PerTile<bool>,
    dirty: bool,
}

impl ChunkCache {
    /// Construct in the dirty state.
    pub fn new() -> Self {
        ChunkCache {
            transparency: PerTile::repeat(LIGHT_TRANSPARENCY_SOLID),
            outside: PerTile::repeat(false),
            see_up: PerTile::repeat(false),
            see_down: PerTile::repeat(false),
            dirty: true,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Recompute everything for the chunk at grid position `gp` and clear the
    /// dirty flag.
    pub fn rebuild<S: CacheSource + ?Sized>(&mut self, gp: Vec3<i32>, src: &S) {
        let window = src.window();
        let content = src.content();
        let underground = window.gp_cc(gp).z < 0;

        for lti in 0..=MAX_LTI {
            let pos = window.gp_lti_pos(gp, lti);
            let cover = src.vehicle_cover(pos);

            let Some((ter, furn)) = src.ter_furn(pos) else {
                self.transparency[lti] = LIGHT_TRANSPARENCY_SOLID;
                self.outside[lti] = false;
                self.see_up[lti] = false;
                self.see_down[lti] = false;
                continue;
            };

            let mut transp = match src.fields(pos) {
                Some(field) => content.tile_transparency(ter, furn, field),
                None => LIGHT_TRANSPARENCY_SOLID,
            };
            if cover.blocks_sight {
                transp = LIGHT_TRANSPARENCY_SOLID;
            }
            self.transparency[lti] = transp;

            self.see_down[lti] = content.floor_is_permeable(ter, furn)
                && !src.vehicle_cover(pos - Vec3::unit_z()).roof;

            let above = pos + Vec3::unit_z();
            self.see_up[lti] = !cover.roof && src
                .ter_furn(above)
                .map(|(ter, furn)| content.floor_is_permeable(ter, furn))
                .unwrap_or(false);

            self.outside[lti] = !underground && !cover.inside && !indoors_near(src, pos);
        }

        self.dirty = false;
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new()
    }
}

// whether the tile or any of its 8 neighbors is flagged indoors
fn indoors_near<S: CacheSource + ?Sized>(src: &S, pos: Vec3<i32>) -> bool {
    let content = src.content();
    for dy in -1..=1 {
        for dx in -1..=1 {
            let neighbor = pos + Vec3::new(dx, dy, 0);
            if let Some((ter, furn)) = src.ter_furn(neighbor) {
                if content.is_indoors(ter, furn) {
                    return true;
                }
            }
        }
    }
    false
}
