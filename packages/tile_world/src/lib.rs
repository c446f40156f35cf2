//! Paged tile world for a survival roguelike.
//!
//! The world is an unbounded grid of 12×12 tile chunks stacked in z levels.
//! A `TileMap` keeps a window of chunks around the player in memory, pages
//! chunks in and out of a `ChunkStore` on disk as the window shifts, and
//! generates chunks that were never visited. On top of the window sit lazily
//! rebuilt per-chunk caches of transparency, outdoors and vertical sight,
//! which back line of sight and route finding.
//!
//! ```no_run
//! use tile_world::{
//!     content::Content,
//!     generate::NoiseGenerator,
//!     map::TileMap,
//!     settings::MapSettings,
//!     store::ChunkStore,
//! };
//! use std::sync::Arc;
//! use vek::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let content = Arc::new(Content::builtin());
//! let store = ChunkStore::open("maps.txt", Arc::clone(&content))?;
//! let generator = NoiseGenerator::new(Arc::clone(&content), 0)?;
//! let mut map = TileMap::new(MapSettings::default(), content, store, Box::new(generator));
//! map.load_window(Vec3::zero())?;
//! let seen = map.sees(Vec3::new(60, 60, 0), Vec3::new(66, 63, 0), 60);
//! # let _ = seen;
//! map.persist()?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub mod logging;
pub mod settings;
pub mod error;
pub mod content;
pub mod window;
pub mod cache;
pub mod grid;
pub mod vehicles;
pub mod traps;
pub mod store;
pub mod generate;
pub mod map;
pub mod visibility;
pub mod pathfind;

#[cfg(test)]
mod test_util;
