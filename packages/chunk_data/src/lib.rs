//! Data structures for storing tile world chunks in memory.
//!
//! Basic example:
//!
//! ```
//! use chunk_data::*;
//! use vek::*;
//!
//! let floor = TerId(1);
//! let smoke = FieldTypeId(1);
//!
//! let mut chunk = Chunk::new(floor);
//!
//! let gtc = Vec3::new(-3, 14, 0);
//! let lti = gtc_get_lti(gtc);
//! chunk.fld[lti].add(smoke, 2, 0);
//! chunk.itm[lti].push(Item::new("rock"));
//!
//! assert_eq!(gtc_get_cc(gtc), Vec3::new(-1, 1, 0));
//! assert_eq!(chunk.field_count(), 1);
//! ```
//!
//! ## tiles, global tile coordinates
//!
//! The world contains a grid of _tiles_ which extends indefinitely in x and y
//! and across a bounded range of z levels. A tile can be globally identified by
//! a _global tile coordinate_ (gtc), a 3-vec of signed integers.
//!
//! ## chunks, chunk coordinates
//!
//! Tiles are grouped into _chunks_, which are squares of 12 by 12 tiles on a
//! single z level. A chunk can be globally identified by a _chunk coordinate_
//! (cc), a 3-vec of signed integers wherein the chunk's tiles start at
//! <12,12,1> times those coordinates. The z component of a cc and of the gtcs
//! within it are the same.
//!
//! ## local tile coordinates, local tile indices
//!
//! Relative to some chunk, a tile within that chunk can be identified by a
//! _local tile coordinate_ (ltc), a 2-vec of integers between <0,0>
//! (inclusive) and <12,12> (exclusive). Packed row-major into a single `u8`,
//! that is a _local tile index_ (lti). Storing some value for each tile in a
//! chunk is then just an array of length 144, which is what `PerTile` is.


mod coord;
mod per_tile;
mod content_id;
mod field;
mod item;
mod spawn;
mod vehicle;
mod chunk;


pub use self::{
    coord::{
        SEEX,
        SEEY,
        CHUNK_EXTENT,
        MAX_LTI,
        NUM_LTIS,
        ltc_in_chunk,
        ltc_to_lti,
        lti_to_ltc,
        gtc_get_cc,
        gtc_get_ltc,
        gtc_get_lti,
        cc_ltc_to_gtc,
    },
    per_tile::PerTile,
    content_id::{
        TerId,
        FurnId,
        TrapId,
        FieldTypeId,
        T_NULL,
        F_NULL,
        TR_NULL,
        FD_NULL,
    },
    field::{
        MAX_FIELD_DENSITY,
        Field,
        FieldEntry,
    },
    item::Item,
    spawn::SpawnPoint,
    vehicle::{
        VehicleHandle,
        PartFlags,
        VehiclePart,
        Vehicle,
    },
    chunk::Chunk,
};
