//! Error types surfaced by the map engine.

use std::io;
use vek::*;


pub type Result<T, E = MapError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// Position outside the loaded window.
    #[error("position {pos:?} outside the loaded window")]
    OutOfBounds {
        pos: Vec3<i32>,
    },
    /// Chunk still missing after generating its pair.
    #[error("generation did not produce chunk {cc:?}")]
    GenerationFailure {
        cc: Vec3<i32>,
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("chunk store io failure")]
    StoreIo(#[from] io::Error),
    #[error("malformed chunk store at line {line}: {msg}")]
    StoreFormat {
        line: usize,
        msg: String,
    },
    /// Chunk store already holds a different chunk at this coordinate.
    #[error("chunk store already holds a different chunk at {cc:?}")]
    DuplicateChunk {
        cc: Vec3<i32>,
    },
}

impl MapError {
    pub fn out_of_bounds(pos: Vec3<i32>) -> Self {
        MapError::OutOfBounds { pos }
    }

    /// Whether this error belongs to the store io class, meaning an ongoing
    /// save or load should be aborted but in-memory state remains valid.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, MapError::StoreIo(_) | MapError::StoreFormat { .. })
    }
}
