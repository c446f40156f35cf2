#[macro_use]
extern crate tracing;

use tile_world::{
    logging::init_logging,
    settings::{
        MapSettings,
        SETTINGS_FILE_NAME,
    },
    content::Content,
    generate::NoiseGenerator,
    map::TileMap,
    store::ChunkStore,
};
use std::{
    sync::Arc,
    env::args,
    path::Path,
};
use vek::*;
use anyhow::*;


const CLI_INTRO: &'static str = r#"Tile world map engine demo.

Loads a window of the world around the origin, runs a few queries against
it, walks the window east and saves everything."#;

const CLI_HELP: &'static str = r#"
Examples:

    [this command]
    Run the demo against ./maps.txt.

    [this command] --save=saves/world --seed=7
    Keep the chunk store under saves/world and generate with seed 7.

Env var examples:
    RUST_LOG=tile_world=trace
    Changes logging levels"#;


fn main() {
    println!("{}", CLI_INTRO);
    init_logging();

    let args = args().collect::<Vec<_>>();
    if args.get(1).map(String::as_str) == Some("--help") {
        println!("{}", CLI_HELP);
    } else if let Err(e) = run_from_cli(&args) {
        error!(?e, "demo failed");
    }
}

fn arg<'a>(args: &'a [String], prefix: &str) -> Option<&'a str> {
    args.iter()
        .filter_map(|arg| arg.strip_prefix(prefix))
        .next()
}

// parse CLI args and run the demo from that
fn run_from_cli(args: &[String]) -> Result<()> {
    let settings = MapSettings::read(SETTINGS_FILE_NAME);
    let save_dir = arg(args, "--save=").unwrap_or(".");
    let seed = match arg(args, "--seed=") {
        Some(seed) => seed.parse().context("invalid --seed")?,
        None => 0,
    };
    std::fs::create_dir_all(save_dir)
        .with_context(|| format!("unable to create save directory {:?}", save_dir))?;
    let store_path = Path::new(save_dir).join(&settings.store_file_name);
    run(settings, &store_path, seed)
}

fn run(settings: MapSettings, store_path: &Path, seed: u64) -> Result<()> {
    let content = Arc::new(Content::builtin());
    let store = ChunkStore::open(store_path, Arc::clone(&content))?;
    info!(path = ?store_path, chunks = store.len(), "opened chunk store");
    let generator = NoiseGenerator::new(Arc::clone(&content), seed)?;
    let mut map = TileMap::new(settings, content, store, Box::new(generator));

    if let Err(e) = map.load_window(Vec3::zero()) {
        warn!(%e, "parts of the window could not be loaded");
    }

    let extent = map.window().tile_extent();
    let center = Vec3::new(extent.x / 2, extent.y / 2, 0);
    let target = center + Vec3::new(7, 3, 0);
    println!("terrain at {:?}: {}", center, map.content().ter(map.ter(center)).name);
    println!("{:?} sees {:?}: {}", center, target, map.sees(center, target, 60));
    let route = map.route(center, target, false);
    println!("route from {:?} to {:?}: {} steps", center, target, route.len());
    println!("outdoors at {:?}: {}", center, map.is_outdoors(center));

    map.set_turn(1);
    if let Err(e) = map.shift(Vec3::new(1, 0, 0)) {
        warn!(%e, "parts of the window could not be loaded");
    }
    println!("window now starts at chunk {:?}", map.abs_sub());

    map.persist()?;
    info!(chunks = map.store().len(), "saved");
    Ok(())
}
