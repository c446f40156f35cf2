
use serde::{Serialize, Deserialize};
use vek::*;


/// A pending creature spawn, resolved by gameplay code when the chunk comes
/// into play.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub kind: String,
    pub count: i32,
    /// Local tile coordinate within the owning chunk.
    pub pos: Vec2<i32>,
    #[serde(default = "no_id")]
    pub faction_id: i32,
    #[serde(default = "no_id")]
    pub mission_id: i32,
    #[serde(default)]
    pub friendly: bool,
    #[serde(default)]
    pub name: Option<String>,
}

fn no_id() -> i32 {
    -1
}

impl SpawnPoint {
    pub fn new(kind: impl Into<String>, count: i32, pos: Vec2<i32>) -> Self {
        SpawnPoint {
            kind: kind.into(),
            count,
            pos,
            faction_id: -1,
            mission_id: -1,
            friendly: false,
            name: None,
        }
    }
}
