
use std::{
    path::Path,
    fs::File,
    io::{
        BufReader,
        BufWriter,
    },
};
use serde::{Serialize, Deserialize};
use anyhow::*;


pub const SETTINGS_FILE_NAME: &'static str = "settings.json";


/// Map engine settings, fixed for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    /// Width and depth of the loaded window, in chunks.
    pub map_size: i32,
    pub z_min: i32,
    pub z_max: i32,
    /// Tiles of slack around origin and destination when searching routes.
    pub route_margin: i32,
    pub store_file_name: String,
}

impl Default for MapSettings {
    fn default() -> Self {
        MapSettings {
            map_size: 11,
            z_min: -10,
            z_max: 10,
            route_margin: 4,
            store_file_name: "maps.txt".to_owned(),
        }
    }
}

impl MapSettings {
    /// Read settings, falling back to defaults if the file is missing or
    /// invalid. Only an invalid file is logged.
    pub fn read(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::try_read(path).unwrap_or_else(|e| {
            if path.exists() {
                warn!(path = %path.display(), "invalid settings file, using defaults: {:#}", e);
            }
            Self::default()
        })
    }

    pub fn try_read(path: impl AsRef<Path>) -> Result<Self> {
        let settings: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.map_size > 0, "map_size must be positive, got {}", self.map_size);
        ensure!(
            self.z_min <= self.z_max,
            "z range {}..={} is empty", self.z_min, self.z_max,
        );
        ensure!(self.route_margin >= 0, "route_margin must not be negative");
        Ok(())
    }

    /// Number of z levels in the window.
    pub fn z_levels(&self) -> i32 {
        self.z_max - self.z_min + 1
    }
}
