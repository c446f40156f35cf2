//! Generating chunks of the world for the first time.

use crate::content::Content;
use chunk_data::*;
use std::sync::Arc;
use vek::*;
use bracket_noise::prelude::FastNoise;
use anyhow::*;


/// Procedural generation of chunks missing from the store.
///
/// Chunks are generated two at a time: the chunk with an even x coordinate
/// and its neighbor at x + 1.
pub trait MapGenerator {
    /// Generate both chunks of `pair`, as returned by `generation_pair`.
    fn generate(&mut self, pair: [Vec3<i32>; 2], turn: i64) -> Result<(Chunk, Chunk)>;
}

/// The generation pair containing chunk `cc`.
pub fn generation_pair(cc: Vec3<i32>) -> [Vec3<i32>; 2] {
    let x0 = cc.x - cc.x.rem_euclid(2);
    [
        Vec3 { x: x0, ..cc },
        Vec3 { x: x0 + 1, ..cc },
    ]
}


/// Rolling terrain: dirt and grass on the surface level with noise-placed
/// trees, shrubs and ruined walls, open air above, rock below.
pub struct NoiseGenerator {
    content: Arc<Content>,
    ids: NoiseIds,
    seed: u64,
}

struct NoiseIds {
    open_air: TerId,
    dirt: TerId,
    grass: TerId,
    rock: TerId,
    tree: TerId,
    shrub: TerId,
    wall: TerId,
    rubble: FurnId,
}

fn require<I>(id: Option<I>, symbol: &str) -> Result<I> {
    id.ok_or_else(|| anyhow!("content is missing {:?}, needed by the noise generator", symbol))
}

impl NoiseGenerator {
    pub fn new(content: Arc<Content>, seed: u64) -> Result<Self> {
        let ids = NoiseIds {
            open_air: require(content.ter_id("t_open_air"), "t_open_air")?,
            dirt: require(content.ter_id("t_dirt"), "t_dirt")?,
            grass: require(content.ter_id("t_grass"), "t_grass")?,
            rock: require(content.ter_id("t_rock"), "t_rock")?,
            tree: require(content.ter_id("t_tree"), "t_tree")?,
            shrub: require(content.ter_id("t_shrub"), "t_shrub")?,
            wall: require(content.ter_id("t_wall"), "t_wall")?,
            rubble: require(content.furn_id("f_rubble"), "f_rubble")?,
        };
        Ok(NoiseGenerator { content, ids, seed })
    }

    pub fn content(&self) -> &Arc<Content> {
        &self.content
    }

    fn generate_chunk(&self, cc: Vec3<i32>, turn: i64) -> Chunk {
        let ids = &self.ids;
        let mut chunk = match cc.z {
            z if z > 0 => Chunk::new(ids.open_air),
            z if z < 0 => Chunk::new(ids.rock),
            _ => Chunk::new(ids.dirt),
        };
        chunk.turn_last_touched = turn;
        chunk.temperature = 65 - 5 * cc.z.abs();
        if cc.z != 0 {
            return chunk;
        }

        let mut vegetation = FastNoise::seeded(self.seed);
        vegetation.set_frequency(1.0 / 9.0);
        let mut ruins = FastNoise::seeded(self.seed.wrapping_add(1));
        ruins.set_frequency(1.0 / 40.0);

        for lti in 0..=MAX_LTI {
            let gtc = cc_ltc_to_gtc(cc, lti_to_ltc(lti));
            let (x, y) = (gtc.x as f32, gtc.y as f32);
            let green = vegetation.get_noise(x, y);
            let ruin = ruins.get_noise(x, y);

            chunk.ter[lti] = if ruin > 0.45 && (gtc.x.rem_euclid(8) == 0 || gtc.y.rem_euclid(8) == 0) {
                ids.wall
            } else if green > 0.55 {
                ids.tree
            } else if green > 0.4 {
                ids.shrub
            } else if green > 0.0 {
                ids.grass
            } else {
                ids.dirt
            };
            if ruin > 0.45 && chunk.ter[lti] != ids.wall && green < -0.5 {
                chunk.frn[lti] = ids.rubble;
            }
        }
        chunk
    }
}

impl MapGenerator for NoiseGenerator {
    fn generate(&mut self, pair: [Vec3<i32>; 2], turn: i64) -> Result<(Chunk, Chunk)> {
        debug!(?pair, "generating chunk pair");
        Ok((self.generate_chunk(pair[0], turn), self.generate_chunk(pair[1], turn)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_even_aligned() {
        assert_eq!(generation_pair(Vec3::new(4, 7, 1)), [Vec3::new(4, 7, 1), Vec3::new(5, 7, 1)]);
        assert_eq!(generation_pair(Vec3::new(5, 7, 1)), [Vec3::new(4, 7, 1), Vec3::new(5, 7, 1)]);
        assert_eq!(generation_pair(Vec3::new(-3, 0, 0)), [Vec3::new(-4, 0, 0), Vec3::new(-3, 0, 0)]);
        assert_eq!(generation_pair(Vec3::new(-2, 0, 0)), [Vec3::new(-2, 0, 0), Vec3::new(-1, 0, 0)]);
    }

    #[test]
    fn levels_differ() {
        let content = Arc::new(Content::builtin());
        let mut gen = NoiseGenerator::new(content.clone(), 7).unwrap();
        let (above, _) = gen.generate(generation_pair(Vec3::new(0, 0, 1)), 10).unwrap();
        let (below, _) = gen.generate(generation_pair(Vec3::new(0, 0, -1)), 10).unwrap();
        let (surface, _) = gen.generate(generation_pair(Vec3::new(0, 0, 0)), 10).unwrap();
        assert!(above.ter.0.iter().all(|&t| t == content.ter_id("t_open_air").unwrap()));
        assert!(below.ter.0.iter().all(|&t| t == content.ter_id("t_rock").unwrap()));
        assert!(surface.ter.0.iter().all(|&t| t != content.ter_id("t_rock").unwrap()));
        assert_eq!(surface.turn_last_touched, 10);
    }

    #[test]
    fn generation_is_deterministic() {
        let content = Arc::new(Content::builtin());
        let mut a = NoiseGenerator::new(content.clone(), 3).unwrap();
        let mut b = NoiseGenerator::new(content, 3).unwrap();
        let pair = generation_pair(Vec3::new(10, -4, 0));
        assert_eq!(a.generate(pair, 0).unwrap(), b.generate(pair, 0).unwrap());
    }

    #[test]
    fn missing_content_is_an_error() {
        let content = Arc::new(Content::from_json("{}").unwrap());
        assert!(NoiseGenerator::new(content, 0).is_err());
    }
}
