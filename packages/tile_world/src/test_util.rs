//! Fixtures shared by the unit tests.

use crate::{
    content::Content,
    generate::MapGenerator,
    map::TileMap,
    pathfind::MoveMap,
    settings::MapSettings,
    store::ChunkStore,
    visibility::SightMap,
};
use chunk_data::*;
use std::{
    cell::RefCell,
    collections::{
        BTreeSet,
        HashMap,
    },
    rc::Rc,
    sync::Arc,
};
use tempfile::TempDir;
use vek::*;
use anyhow::*;


/// Dirt on level 0, open air above, rock below. Records every pair it
/// generates.
pub struct FlatGenerator {
    content: Arc<Content>,
    pub generated: Rc<RefCell<Vec<[Vec3<i32>; 2]>>>,
}

impl FlatGenerator {
    pub fn new(content: Arc<Content>) -> Self {
        FlatGenerator {
            content,
            generated: Default::default(),
        }
    }

    fn chunk(&self, cc: Vec3<i32>, turn: i64) -> Chunk {
        let symbol = match cc.z {
            z if z > 0 => "t_open_air",
            z if z < 0 => "t_rock",
            _ => "t_dirt",
        };
        let mut chunk = Chunk::new(self.content.ter_id(symbol).unwrap());
        chunk.turn_last_touched = turn;
        chunk
    }
}

impl MapGenerator for FlatGenerator {
    fn generate(&mut self, pair: [Vec3<i32>; 2], turn: i64) -> Result<(Chunk, Chunk)> {
        self.generated.borrow_mut().push(pair);
        Ok((self.chunk(pair[0], turn), self.chunk(pair[1], turn)))
    }
}

/// Fails for pairs containing any of the given chunk coordinates.
pub struct FailingGenerator {
    pub inner: FlatGenerator,
    pub fail: BTreeSet<(i32, i32, i32)>,
}

impl MapGenerator for FailingGenerator {
    fn generate(&mut self, pair: [Vec3<i32>; 2], turn: i64) -> Result<(Chunk, Chunk)> {
        for cc in pair {
            ensure!(!self.fail.contains(&cc.into_tuple()), "refusing to generate {:?}", cc);
        }
        self.inner.generate(pair, turn)
    }
}

pub fn content() -> Arc<Content> {
    Arc::new(Content::builtin())
}

pub fn settings(map_size: i32, z_min: i32, z_max: i32) -> MapSettings {
    MapSettings {
        map_size,
        z_min,
        z_max,
        ..MapSettings::default()
    }
}

pub fn store(dir: &TempDir, content: &Arc<Content>) -> ChunkStore {
    ChunkStore::open(dir.path().join("maps.txt"), Arc::clone(content)).unwrap()
}

/// A fully loaded map over a flat world.
pub fn flat_map(dir: &TempDir, map_size: i32, z_min: i32, z_max: i32) -> TileMap {
    let content = content();
    let store = store(dir, &content);
    let generator = FlatGenerator::new(Arc::clone(&content));
    let mut map = TileMap::new(settings(map_size, z_min, z_max), content, store, Box::new(generator));
    map.load_window(Vec3::zero()).unwrap();
    map
}

/// Look up a terrain id of the builtin content.
pub fn ter(map: &TileMap, symbol: &str) -> TerId {
    map.content().ter_id(symbol).unwrap()
}

pub fn furn(map: &TileMap, symbol: &str) -> FurnId {
    map.content().furn_id(symbol).unwrap()
}


/// One tile of a `TestGrid`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TestTile {
    pub cost: i32,
    pub transparent: bool,
    pub bashable: bool,
    pub door: bool,
}

impl TestTile {
    pub const OPEN: TestTile = TestTile { cost: 2, transparent: true, bashable: false, door: false };
    pub const WALL: TestTile = TestTile { cost: 0, transparent: false, bashable: false, door: false };
    pub const BASHABLE_WALL: TestTile = TestTile { cost: 0, transparent: false, bashable: true, door: false };
    pub const DOOR: TestTile = TestTile { cost: 0, transparent: false, bashable: true, door: true };
}

/// Single level grid of open ground with some tiles overridden.
#[derive(Debug, Clone)]
pub struct TestGrid {
    pub extent: Vec2<i32>,
    pub tiles: HashMap<Vec2<i32>, TestTile>,
}

impl TestGrid {
    pub fn new(w: i32, h: i32) -> Self {
        TestGrid {
            extent: Vec2::new(w, h),
            tiles: HashMap::new(),
        }
    }

    pub fn set(&mut self, x: i32, y: i32, tile: TestTile) {
        self.tiles.insert(Vec2::new(x, y), tile);
    }

    pub fn tile(&self, pos: Vec3<i32>) -> TestTile {
        self.tiles.get(&pos.xy()).copied().unwrap_or(TestTile::OPEN)
    }
}

impl SightMap for TestGrid {
    fn inbounds(&self, pos: Vec3<i32>) -> bool {
        pos.z == 0
            && pos.x >= 0 && pos.x < self.extent.x
            && pos.y >= 0 && pos.y < self.extent.y
    }

    fn light_transparency(&self, pos: Vec3<i32>) -> f32 {
        if self.inbounds(pos) && self.tile(pos).transparent { 1.0 } else { 0.0 }
    }

    fn move_cost(&self, pos: Vec3<i32>) -> i32 {
        if self.inbounds(pos) { self.tile(pos).cost } else { 0 }
    }

    fn allows_vertical_view_up(&self, _: Vec3<i32>) -> bool {
        false
    }

    fn allows_vertical_view_down(&self, _: Vec3<i32>) -> bool {
        false
    }
}

impl MoveMap for TestGrid {
    fn is_bashable(&self, pos: Vec3<i32>) -> bool {
        self.inbounds(pos) && self.tile(pos).bashable
    }

    fn is_closed_door(&self, pos: Vec3<i32>) -> bool {
        self.inbounds(pos) && self.tile(pos).door
    }
}
