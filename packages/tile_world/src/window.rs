//! Addressing within the loaded window.
//!
//! The window is a box of chunks `size` wide and deep, spanning the z levels
//! `z_min..=z_max`. Positions inside it ("pos") are tile coordinates relative
//! to the window's corner tile, with z left as is. A chunk's place in the
//! window is its grid position ("gp"), and `abs_sub` is the chunk coordinate
//! at grid position <0,0,0>.

use chunk_data::*;
use vek::*;


#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Window {
    pub abs_sub: Vec3<i32>,
    pub size: i32,
    pub z_min: i32,
    pub z_max: i32,
}

impl Window {
    pub fn new(abs_sub: Vec3<i32>, size: i32, z_min: i32, z_max: i32) -> Self {
        Window { abs_sub, size, z_min, z_max }
    }

    /// Same window shape, origin moved by `delta` chunks.
    pub fn shifted(self, delta: Vec3<i32>) -> Self {
        Window { abs_sub: self.abs_sub + delta, ..self }
    }

    /// Number of chunk slots.
    pub fn slot_count(&self) -> usize {
        (self.size * self.size * (self.z_max - self.z_min + 1)) as usize
    }

    /// Extent of the window in tiles, horizontally.
    pub fn tile_extent(&self) -> Vec2<i32> {
        CHUNK_EXTENT * self.size
    }

    pub fn inbounds(&self, pos: Vec3<i32>) -> bool {
        let extent = self.tile_extent();
        pos.x >= 0 && pos.x < extent.x
            && pos.y >= 0 && pos.y < extent.y
            && pos.z >= self.z_min && pos.z <= self.z_max
    }

    pub fn gp_inbounds(&self, gp: Vec3<i32>) -> bool {
        gp.x >= 0 && gp.x < self.size
            && gp.y >= 0 && gp.y < self.size
            && gp.z >= self.z_min && gp.z <= self.z_max
    }

    /// Grid position of the chunk containing a position. Position must be in bounds.
    pub fn pos_gp(&self, pos: Vec3<i32>) -> Vec3<i32> {
        Vec3 {
            x: pos.x / SEEX,
            y: pos.y / SEEY,
            z: pos.z,
        }
    }

    /// Local tile index of a position within its chunk. Position must be in bounds.
    pub fn pos_lti(&self, pos: Vec3<i32>) -> u8 {
        ltc_to_lti(Vec2 {
            x: pos.x % SEEX,
            y: pos.y % SEEY,
        })
    }

    /// Position of a tile given its chunk's grid position and its lti.
    pub fn gp_lti_pos(&self, gp: Vec3<i32>, lti: u8) -> Vec3<i32> {
        let ltc = lti_to_ltc(lti);
        Vec3 {
            x: gp.x * SEEX + ltc.x,
            y: gp.y * SEEY + ltc.y,
            z: gp.z,
        }
    }

    /// Flat slot index of a grid position. Grid position must be in bounds.
    pub fn slot(&self, gp: Vec3<i32>) -> usize {
        debug_assert!(self.gp_inbounds(gp), "gp out of bounds: {:?}", gp);
        (gp.x + gp.y * self.size + (gp.z - self.z_min) * self.size * self.size) as usize
    }

    pub fn slot_gp(&self, slot: usize) -> Vec3<i32> {
        let slot = slot as i32;
        let layer = self.size * self.size;
        Vec3 {
            x: slot % self.size,
            y: slot % layer / self.size,
            z: slot / layer + self.z_min,
        }
    }

    /// Every grid position, in slot order.
    pub fn gps(&self) -> impl Iterator<Item=Vec3<i32>> {
        let window = *self;
        (0..window.slot_count()).map(move |slot| window.slot_gp(slot))
    }

    pub fn gp_cc(&self, gp: Vec3<i32>) -> Vec3<i32> {
        self.abs_sub + gp
    }

    pub fn cc_gp(&self, cc: Vec3<i32>) -> Vec3<i32> {
        cc - self.abs_sub
    }

    /// Global tile coordinate of a position.
    pub fn pos_gtc(&self, pos: Vec3<i32>) -> Vec3<i32> {
        Vec3 {
            x: pos.x + self.abs_sub.x * SEEX,
            y: pos.y + self.abs_sub.y * SEEY,
            z: pos.z + self.abs_sub.z,
        }
    }

    /// Position of a global tile coordinate, whether or not it is in bounds.
    pub fn gtc_pos(&self, gtc: Vec3<i32>) -> Vec3<i32> {
        Vec3 {
            x: gtc.x - self.abs_sub.x * SEEX,
            y: gtc.y - self.abs_sub.y * SEEY,
            z: gtc.z - self.abs_sub.z,
        }
    }
}
