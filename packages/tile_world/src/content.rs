//! Terrain, furniture, trap and field definitions.
//!
//! Every table starts with its null entry, so the null ids of `chunk_data`
//! always resolve. Definitions are registered through a `ContentBuilder` and
//! then frozen into a `Content`, which the rest of the engine shares behind an
//! `Arc`.

use crate::cache::{
    LIGHT_TRANSPARENCY_SOLID,
    LIGHT_TRANSPARENCY_CLEAR,
};
use chunk_data::*;
use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use anyhow::*;


/// Per-tile behavior flags shared by terrain and furniture.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileFlags {
    /// Has a ceiling; makes the tile and its neighbors indoors.
    pub indoors: bool,
    /// Lets sight pass through the floor to the level below.
    pub permeable_floor: bool,
    /// Impassable until opened, which takes a turn.
    pub closed_door: bool,
}

/// Strength range needed to bash something.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BashDef {
    pub str_min: i32,
    pub str_max: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainDef {
    pub symbol: String,
    pub name: String,
    /// 0 means impassable.
    pub move_cost: i32,
    pub transparent: bool,
    #[serde(default)]
    pub flags: TileFlags,
    #[serde(default)]
    pub bash: Option<BashDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FurnitureDef {
    pub symbol: String,
    pub name: String,
    /// Added to the terrain's move cost. Negative means impassable.
    pub move_cost: i32,
    pub transparent: bool,
    #[serde(default)]
    pub flags: TileFlags,
    #[serde(default)]
    pub bash: Option<BashDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrapDef {
    pub symbol: String,
    pub name: String,
}

/// How a field that is not transparent at some density dims light.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Translucency {
    /// Fully blocks sight.
    #[default]
    Opaque,
    /// Multiplies transparency by a constant factor.
    Multiply {
        factor: f32,
    },
    /// Solid at full density, halves transparency at medium density.
    Smoke,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTypeDef {
    pub symbol: String,
    pub name: String,
    /// Whether the field is transparent, per density 1 to 3.
    pub transparent: [bool; 3],
    #[serde(default)]
    pub translucency: Translucency,
}

impl FieldTypeDef {
    /// Apply this field's effect at `density` to a transparency value.
    pub fn dim(&self, density: u8, transp: f32) -> f32 {
        let density = density.clamp(1, MAX_FIELD_DENSITY);
        if self.transparent[density as usize - 1] {
            return transp;
        }
        match self.translucency {
            Translucency::Opaque => LIGHT_TRANSPARENCY_SOLID,
            Translucency::Multiply { factor } => transp * factor,
            Translucency::Smoke => match density {
                3 => LIGHT_TRANSPARENCY_SOLID,
                2 => transp * 0.5,
                _ => transp,
            },
        }
    }
}


/// Definitions file layout, as loaded by `Content::from_json`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFile {
    pub terrain: Vec<TerrainDef>,
    pub furniture: Vec<FurnitureDef>,
    pub traps: Vec<TrapDef>,
    pub fields: Vec<FieldTypeDef>,
}

/// A table of definitions indexed by id, with a reverse symbol lookup.
#[derive(Debug, Clone)]
struct Table<D> {
    defs: Vec<D>,
    by_symbol: HashMap<String, u16>,
}

impl<D> Table<D> {
    fn new() -> Self {
        Table {
            defs: Vec::new(),
            by_symbol: HashMap::new(),
        }
    }

    // registering an existing symbol replaces its definition in place
    fn register(&mut self, symbol: &str, def: D) -> Result<u16> {
        if let Some(&id) = self.by_symbol.get(symbol) {
            self.defs[id as usize] = def;
            return Ok(id);
        }
        let id = u16::try_from(self.defs.len())
            .map_err(|_| anyhow!("too many definitions registering {:?}", symbol))?;
        self.defs.push(def);
        self.by_symbol.insert(symbol.to_owned(), id);
        Ok(id)
    }

    fn get(&self, id: u16) -> &D {
        self.defs.get(id as usize).unwrap_or(&self.defs[0])
    }

    fn lookup(&self, symbol: &str) -> Option<u16> {
        self.by_symbol.get(symbol).copied()
    }
}


/// Builder for `Content`. Starts with the null entries registered.
pub struct ContentBuilder {
    terrain: Table<TerrainDef>,
    furniture: Table<FurnitureDef>,
    traps: Table<TrapDef>,
    fields: Table<FieldTypeDef>,
}

impl ContentBuilder {
    pub fn new() -> Self {
        let mut builder = ContentBuilder {
            terrain: Table::new(),
            furniture: Table::new(),
            traps: Table::new(),
            fields: Table::new(),
        };
        // these cannot fail on an empty table
        let _ = builder.terrain(TerrainDef {
            symbol: "t_null".into(),
            name: "nothing".into(),
            move_cost: 2,
            transparent: true,
            flags: TileFlags::default(),
            bash: None,
        });
        let _ = builder.furniture(FurnitureDef {
            symbol: "f_null".into(),
            name: "nothing".into(),
            move_cost: 0,
            transparent: true,
            flags: TileFlags::default(),
            bash: None,
        });
        let _ = builder.trap(TrapDef {
            symbol: "tr_null".into(),
            name: "none".into(),
        });
        let _ = builder.field(FieldTypeDef {
            symbol: "fd_null".into(),
            name: "nothing".into(),
            transparent: [true; 3],
            translucency: Translucency::Opaque,
        });
        builder
    }

    pub fn terrain(&mut self, def: TerrainDef) -> Result<TerId> {
        let symbol = def.symbol.clone();
        self.terrain.register(&symbol, def).map(TerId)
    }

    pub fn furniture(&mut self, def: FurnitureDef) -> Result<FurnId> {
        let symbol = def.symbol.clone();
        self.furniture.register(&symbol, def).map(FurnId)
    }

    pub fn trap(&mut self, def: TrapDef) -> Result<TrapId> {
        let symbol = def.symbol.clone();
        self.traps.register(&symbol, def).map(TrapId)
    }

    pub fn field(&mut self, def: FieldTypeDef) -> Result<FieldTypeId> {
        let symbol = def.symbol.clone();
        self.fields.register(&symbol, def).map(FieldTypeId)
    }

    /// Register everything in a definitions file.
    pub fn load(&mut self, file: ContentFile) -> Result<()> {
        for def in file.terrain {
            self.terrain(def)?;
        }
        for def in file.furniture {
            self.furniture(def)?;
        }
        for def in file.traps {
            self.trap(def)?;
        }
        for def in file.fields {
            if let Translucency::Multiply { factor } = def.translucency {
                ensure!(
                    (0.0..=1.0).contains(&factor),
                    "field {:?} has translucency factor {} outside 0..=1", def.symbol, factor,
                );
            }
            self.field(def)?;
        }
        Ok(())
    }

    pub fn finalize(self) -> Content {
        Content {
            terrain: self.terrain,
            furniture: self.furniture,
            traps: self.traps,
            fields: self.fields,
        }
    }
}

impl Default for ContentBuilder {
    fn default() -> Self {
        Self::new()
    }
}


/// Frozen content definitions.
#[derive(Debug, Clone)]
pub struct Content {
    terrain: Table<TerrainDef>,
    furniture: Table<FurnitureDef>,
    traps: Table<TrapDef>,
    fields: Table<FieldTypeDef>,
}

impl Content {
    /// Load definitions from a JSON definitions file, on top of the null
    /// entries.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ContentFile = serde_json::from_str(json)
            .context("parsing content definitions")?;
        let mut builder = ContentBuilder::new();
        builder.load(file)?;
        Ok(builder.finalize())
    }

    /// The built-in content set.
    pub fn builtin() -> Self {
        let mut builder = ContentBuilder::new();
        builder.load(builtin_content_file())
            .expect("built-in content is valid");
        builder.finalize()
    }

    /// Unknown ids resolve to the null definition.
    pub fn ter(&self, id: TerId) -> &TerrainDef {
        self.terrain.get(id.0)
    }

    /// Unknown ids resolve to the null definition.
    pub fn furn(&self, id: FurnId) -> &FurnitureDef {
        self.furniture.get(id.0)
    }

    /// Unknown ids resolve to the null definition.
    pub fn trap(&self, id: TrapId) -> &TrapDef {
        self.traps.get(id.0)
    }

    /// Unknown ids resolve to the null definition.
    pub fn field_type(&self, id: FieldTypeId) -> &FieldTypeDef {
        self.fields.get(id.0)
    }

    pub fn ter_id(&self, symbol: &str) -> Option<TerId> {
        self.terrain.lookup(symbol).map(TerId)
    }

    pub fn furn_id(&self, symbol: &str) -> Option<FurnId> {
        self.furniture.lookup(symbol).map(FurnId)
    }

    pub fn trap_id(&self, symbol: &str) -> Option<TrapId> {
        self.traps.lookup(symbol).map(TrapId)
    }

    pub fn field_type_id(&self, symbol: &str) -> Option<FieldTypeId> {
        self.fields.lookup(symbol).map(FieldTypeId)
    }

    /// Symbols of every terrain, furniture, trap and field type, in id order.
    pub fn symbol_tables(&self) -> SymbolTables {
        fn symbols<D>(table: &Table<D>, symbol: impl Fn(&D) -> &str) -> Vec<String> {
            table.defs.iter().map(|def| symbol(def).to_owned()).collect()
        }
        SymbolTables {
            terrain: symbols(&self.terrain, |def| &def.symbol),
            furniture: symbols(&self.furniture, |def| &def.symbol),
            traps: symbols(&self.traps, |def| &def.symbol),
            fields: symbols(&self.fields, |def| &def.symbol),
        }
    }

    /// Whether terrain or furniture at a tile carry the indoors flag.
    pub fn is_indoors(&self, ter: TerId, furn: FurnId) -> bool {
        self.ter(ter).flags.indoors || self.furn(furn).flags.indoors
    }

    /// Whether sight passes down through the floor of a tile.
    pub fn floor_is_permeable(&self, ter: TerId, furn: FurnId) -> bool {
        self.ter(ter).flags.permeable_floor
            && (furn.is_null() || self.furn(furn).flags.permeable_floor)
    }

    /// Whether terrain and furniture at a tile let light through.
    pub fn is_transparent(&self, ter: TerId, furn: FurnId) -> bool {
        self.ter(ter).transparent && self.furn(furn).transparent
    }

    /// Combined move cost of terrain and furniture, 0 meaning impassable.
    pub fn tile_move_cost(&self, ter: TerId, furn: FurnId) -> i32 {
        let ter_cost = self.ter(ter).move_cost;
        if ter_cost <= 0 {
            return 0;
        }
        let furn_cost = self.furn(furn).move_cost;
        if furn_cost < 0 {
            return 0;
        }
        ter_cost + furn_cost
    }

    pub fn is_bashable(&self, ter: TerId, furn: FurnId) -> bool {
        self.ter(ter).bash.is_some() || self.furn(furn).bash.is_some()
    }

    pub fn is_closed_door(&self, ter: TerId, furn: FurnId) -> bool {
        self.ter(ter).flags.closed_door || self.furn(furn).flags.closed_door
    }

    /// Transparency of a tile from its terrain, furniture and fields.
    pub fn tile_transparency(&self, ter: TerId, furn: FurnId, field: &Field) -> f32 {
        if !self.is_transparent(ter, furn) {
            return LIGHT_TRANSPARENCY_SOLID;
        }
        field.iter().fold(LIGHT_TRANSPARENCY_CLEAR, |transp, entry| {
            self.field_type(entry.kind).dim(entry.density, transp)
        })
    }
}

/// Symbols of every content table, in id order. Written into chunk store
/// headers so ids can be remapped when content changes between sessions.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SymbolTables {
    pub terrain: Vec<String>,
    pub furniture: Vec<String>,
    pub traps: Vec<String>,
    pub fields: Vec<String>,
}


fn ter(symbol: &str, name: &str, move_cost: i32, transparent: bool) -> TerrainDef {
    TerrainDef {
        symbol: symbol.into(),
        name: name.into(),
        move_cost,
        transparent,
        flags: TileFlags::default(),
        bash: None,
    }
}

fn furn(symbol: &str, name: &str, move_cost: i32, transparent: bool) -> FurnitureDef {
    FurnitureDef {
        symbol: symbol.into(),
        name: name.into(),
        move_cost,
        transparent,
        flags: TileFlags::default(),
        bash: None,
    }
}

fn field(symbol: &str, name: &str, transparent: [bool; 3], translucency: Translucency) -> FieldTypeDef {
    FieldTypeDef {
        symbol: symbol.into(),
        name: name.into(),
        transparent,
        translucency,
    }
}

const INDOORS: TileFlags = TileFlags {
    indoors: true,
    permeable_floor: false,
    closed_door: false,
};

const OPEN_FLOOR: TileFlags = TileFlags {
    indoors: false,
    permeable_floor: true,
    closed_door: false,
};

fn bash(str_min: i32, str_max: i32) -> Option<BashDef> {
    Some(BashDef { str_min, str_max })
}

fn builtin_content_file() -> ContentFile {
    ContentFile {
        terrain: vec![
            ter("t_open_air", "open air", 0, true).with_flags(OPEN_FLOOR),
            ter("t_hole", "hole", 0, true).with_flags(OPEN_FLOOR),
            ter("t_dirt", "dirt", 2, true),
            ter("t_grass", "grass", 2, true),
            ter("t_floor", "floor", 2, true).with_flags(INDOORS),
            ter("t_rock_floor", "rock floor", 2, true).with_flags(INDOORS),
            ter("t_rock", "solid rock", 0, false),
            ter("t_wall", "wall", 0, false).with_flags(INDOORS).with_bash(bash(30, 150)),
            ter("t_window", "window", 0, true).with_flags(INDOORS).with_bash(bash(3, 6)),
            ter("t_door_c", "closed door", 0, false)
                .with_flags(TileFlags { closed_door: true, ..INDOORS })
                .with_bash(bash(8, 80)),
            ter("t_door_o", "open door", 2, true).with_flags(INDOORS),
            ter("t_tree", "tree", 0, false),
            ter("t_shrub", "shrub", 8, true).with_bash(bash(4, 60)),
            ter("t_water_sh", "shallow water", 5, true),
        ],
        furniture: vec![
            furn("f_table", "table", 2, true).with_bash(bash(12, 50)),
            furn("f_chair", "chair", 1, true).with_bash(bash(6, 20)),
            furn("f_bookcase", "bookcase", -1, false).with_bash(bash(6, 40)),
            furn("f_rubble", "rubble", 1, true),
            furn("f_grate", "grate", 0, true).with_flags(OPEN_FLOOR),
        ],
        traps: vec![
            TrapDef { symbol: "tr_beartrap".into(), name: "bear trap".into() },
            TrapDef { symbol: "tr_tripwire".into(), name: "tripwire".into() },
            TrapDef { symbol: "tr_pit".into(), name: "pit".into() },
        ],
        fields: vec![
            field("fd_blood", "blood splatter", [true; 3], Translucency::Opaque),
            field("fd_fire", "fire", [true; 3], Translucency::Opaque),
            field("fd_smoke", "smoke", [true, false, false], Translucency::Smoke),
            field("fd_toxic_gas", "toxic gas", [true, false, false], Translucency::Smoke),
            field("fd_cigsmoke", "swirling tobacco smoke", [true, false, false],
                Translucency::Multiply { factor: 0.7 }),
            field("fd_nuke_gas", "radioactive gas", [true, false, false],
                Translucency::Multiply { factor: 0.5 }),
            field("fd_web", "cobwebs", [true, true, false], Translucency::Opaque),
        ],
    }
}

trait WithTileProps {
    fn with_flags(self, flags: TileFlags) -> Self;
    fn with_bash(self, bash: Option<BashDef>) -> Self;
}

impl WithTileProps for TerrainDef {
    fn with_flags(mut self, flags: TileFlags) -> Self {
        self.flags = flags;
        self
    }

    fn with_bash(mut self, bash: Option<BashDef>) -> Self {
        self.bash = bash;
        self
    }
}

impl WithTileProps for FurnitureDef {
    fn with_flags(mut self, flags: TileFlags) -> Self {
        self.flags = flags;
        self
    }

    fn with_bash(mut self, bash: Option<BashDef>) -> Self {
        self.bash = bash;
        self
    }
}
