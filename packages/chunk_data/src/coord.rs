//! Coordinate conversions.

use vek::*;


/// Width of a chunk in tiles.
pub const SEEX: i32 = 12;

/// Depth of a chunk in tiles.
pub const SEEY: i32 = 12;

/// Extent of a chunk in tiles, on one z level.
pub const CHUNK_EXTENT: Vec2<i32> = Vec2 { x: SEEX, y: SEEY };

/// Max local tile index.
pub const MAX_LTI: u8 = (NUM_LTIS - 1) as u8;

/// Number of local tile indices.
pub const NUM_LTIS: usize = (SEEX * SEEY) as usize;


/// Whether a local tile coordinate lies within a chunk.
pub fn ltc_in_chunk(ltc: Vec2<i32>) -> bool {
    ltc.x >= 0 && ltc.x < SEEX && ltc.y >= 0 && ltc.y < SEEY
}

/// Convert local tile coordinate to local tile index.
///
/// Panics if out of range.
pub fn ltc_to_lti(ltc: Vec2<i32>) -> u8 {
    assert!(ltc_in_chunk(ltc), "ltc out of range: {:?}", ltc);
    (ltc.x + ltc.y * SEEX) as u8
}

/// Convert local tile index to local tile coordinate.
pub fn lti_to_ltc(lti: u8) -> Vec2<i32> {
    debug_assert!(lti <= MAX_LTI, "lti out of range");
    Vec2 {
        x: lti as i32 % SEEX,
        y: lti as i32 / SEEX,
    }
}

/// Get chunk coordinate part of global tile coordinate.
pub fn gtc_get_cc(gtc: Vec3<i32>) -> Vec3<i32> {
    Vec3 {
        x: gtc.x.div_euclid(SEEX),
        y: gtc.y.div_euclid(SEEY),
        z: gtc.z,
    }
}

/// Get local tile coordinate part of global tile coordinate.
pub fn gtc_get_ltc(gtc: Vec3<i32>) -> Vec2<i32> {
    Vec2 {
        x: gtc.x.rem_euclid(SEEX),
        y: gtc.y.rem_euclid(SEEY),
    }
}

/// Get local tile index part of global tile coordinate.
pub fn gtc_get_lti(gtc: Vec3<i32>) -> u8 {
    ltc_to_lti(gtc_get_ltc(gtc))
}

/// Convert chunk coordinate + local tile coordinate to global tile coordinate.
pub fn cc_ltc_to_gtc(cc: Vec3<i32>, ltc: Vec2<i32>) -> Vec3<i32> {
    Vec3 {
        x: cc.x * SEEX + ltc.x,
        y: cc.y * SEEY + ltc.y,
        z: cc.z,
    }
}
