//! Line of sight and straight-line passability.
//!
//! Lines are integer Bresenham walks. A walk can start with a range of error
//! offsets, which shifts where along the line the minor axis steps. Queries
//! try offsets from the straightest line to the most skewed and succeed on
//! the first walk that reaches its target, so a sightline is not rejected
//! because one stepping order grazed a corner. The successful offset is
//! returned so `line_to` can reproduce that same walk.

use crate::{
    cache::LIGHT_TRANSPARENCY_SOLID,
    map::TileMap,
};
use std::ops::RangeInclusive;
use vek::*;


/// Read access needed to trace lines through a tile grid.
pub trait SightMap {
    fn inbounds(&self, pos: Vec3<i32>) -> bool;

    /// Transparency from 0 (solid) to 1 (clear).
    fn light_transparency(&self, pos: Vec3<i32>) -> f32;

    /// Cost of moving onto a tile, 0 meaning impassable.
    fn move_cost(&self, pos: Vec3<i32>) -> i32;

    fn allows_vertical_view_up(&self, pos: Vec3<i32>) -> bool;

    fn allows_vertical_view_down(&self, pos: Vec3<i32>) -> bool;
}

/// Roguelike distance: the number of king moves between two tiles.
pub fn rl_dist(a: Vec3<i32>, b: Vec3<i32>) -> i32 {
    let d = (b - a).map(i32::abs);
    d.x.max(d.y).max(d.z)
}


/// Tiles along a line from one tile to another, excluding the start.
///
/// Horizontal movement follows a Bresenham walk with a starting error
/// offset. Vertical movement is spread evenly over the horizontal steps, or
/// taken one level per step if the line is purely vertical. A walk whose
/// offset makes it miss the target ends after the major-axis distance
/// without reaching it.
#[derive(Debug, Clone)]
pub struct Line {
    from: Vec3<i32>,
    cur: Vec3<i32>,
    t: i32,
    major: Vec3<i32>,
    minor: Vec3<i32>,
    a_major: i32,
    a_minor: i32,
    dz: i32,
    len: i32,
    k: i32,
}

impl Line {
    pub fn new(from: Vec3<i32>, to: Vec3<i32>, offset: i32) -> Self {
        let d = to - from;
        let ax = d.x.abs() * 2;
        let ay = d.y.abs() * 2;
        let sx = d.x.signum();
        let sy = d.y.signum();
        let (major, minor, a_major, a_minor) =
            if ax > ay {
                (Vec3::new(sx, 0, 0), Vec3::new(0, sy, 0), ax, ay)
            } else {
                (Vec3::new(0, sy, 0), Vec3::new(sx, 0, 0), ay, ax)
            };
        let horizontal = a_major / 2;
        Line {
            from,
            cur: from,
            t: offset,
            major,
            minor,
            a_major,
            a_minor,
            dz: d.z,
            len: if horizontal > 0 { horizontal } else { d.z.abs() },
            k: 0,
        }
    }

    /// The starting offsets worth trying, straightest first.
    pub fn offsets(from: Vec3<i32>, to: Vec3<i32>) -> Vec<i32> {
        let line = Line::new(from, to, 0);
        let skew = line.a_minor - line.a_major / 2;
        let st = skew.signum();
        if st == 0 {
            return vec![0];
        }
        (-1..=skew.abs() * 2 + 1).rev().map(|tc| tc * st).collect()
    }
}

impl Iterator for Line {
    type Item = Vec3<i32>;

    fn next(&mut self) -> Option<Vec3<i32>> {
        if self.k >= self.len {
            return None;
        }
        self.k += 1;
        if self.a_major == 0 {
            self.cur.z += self.dz.signum();
            return Some(self.cur);
        }
        if self.t > 0 {
            self.cur += self.minor;
            self.t -= self.a_major;
        }
        self.cur += self.major;
        self.t += self.a_minor;
        // z level after k of len steps, rounded to nearest
        let climbed = (self.dz.abs() * self.k * 2 + self.len) / (self.len * 2);
        self.cur.z = self.from.z + self.dz.signum() * climbed;
        Some(self.cur)
    }
}

/// The tiles of the line from `from` to `to` walked with `offset`, excluding
/// `from`.
pub fn line_to(from: Vec3<i32>, to: Vec3<i32>, offset: i32) -> Vec<Vec3<i32>> {
    Line::new(from, to, offset).collect()
}

// try offsets until one walk reaches `to`
//
// `can_step(prev, pos)` gates every step including the last, `can_pass(pos)`
// gates every tile strictly between the endpoints.
fn first_clear_line<S, P>(
    from: Vec3<i32>,
    to: Vec3<i32>,
    mut can_step: S,
    mut can_pass: P,
) -> Option<i32>
where
    S: FnMut(Vec3<i32>, Vec3<i32>) -> bool,
    P: FnMut(Vec3<i32>) -> bool,
{
    if from == to {
        return Some(0);
    }
    'offsets: for offset in Line::offsets(from, to) {
        let mut prev = from;
        for pos in Line::new(from, to, offset) {
            if !can_step(prev, pos) {
                continue 'offsets;
            }
            if pos == to {
                return Some(offset);
            }
            if !can_pass(pos) {
                continue 'offsets;
            }
            prev = pos;
        }
    }
    None
}

// whether sight can change z levels from `prev` before moving on to `pos`
fn vertical_step_clear<M: SightMap + ?Sized>(map: &M, prev: Vec3<i32>, pos: Vec3<i32>) -> bool {
    let mut p = prev;
    while p.z != pos.z {
        let ok =
            if pos.z > p.z {
                map.allows_vertical_view_up(p)
            } else {
                map.allows_vertical_view_down(p)
            };
        if !ok {
            return false;
        }
        p.z += (pos.z - p.z).signum();
    }
    true
}

/// Whether `to` is visible from `from`, returning the offset of the line
/// that sees it.
///
/// A negative range means unlimited. Tiles between the endpoints must not be
/// fully solid, and level changes must pass the vertical view gates.
pub fn sees<M>(map: &M, from: Vec3<i32>, to: Vec3<i32>, range: i32) -> Option<i32>
where
    M: SightMap + ?Sized,
{
    if range >= 0 && rl_dist(from, to) > range {
        return None;
    }
    first_clear_line(
        from,
        to,
        |prev, pos| vertical_step_clear(map, prev, pos),
        |pos| map.inbounds(pos) && map.light_transparency(pos) != LIGHT_TRANSPARENCY_SOLID,
    )
}

/// Whether every tile between `from` and `to` on some line has a move cost
/// within `cost_bounds`, returning the offset of that line.
///
/// Only defined within one level; lines between levels never succeed.
pub fn clear_path<M>(
    map: &M,
    from: Vec3<i32>,
    to: Vec3<i32>,
    range: i32,
    cost_bounds: RangeInclusive<i32>,
) -> Option<i32>
where
    M: SightMap + ?Sized,
{
    if from.z != to.z {
        return None;
    }
    if range >= 0 && rl_dist(from, to) > range {
        return None;
    }
    first_clear_line(
        from,
        to,
        |_, _| true,
        |pos| map.inbounds(pos) && cost_bounds.contains(&map.move_cost(pos)),
    )
}


impl SightMap for TileMap {
    fn inbounds(&self, pos: Vec3<i32>) -> bool {
        TileMap::inbounds(self, pos)
    }

    fn light_transparency(&self, pos: Vec3<i32>) -> f32 {
        TileMap::light_transparency(self, pos)
    }

    fn move_cost(&self, pos: Vec3<i32>) -> i32 {
        TileMap::move_cost(self, pos)
    }

    fn allows_vertical_view_up(&self, pos: Vec3<i32>) -> bool {
        TileMap::allows_vertical_view_up(self, pos)
    }

    fn allows_vertical_view_down(&self, pos: Vec3<i32>) -> bool {
        TileMap::allows_vertical_view_down(self, pos)
    }
}

impl TileMap {
    /// Whether `to` is visible from `from` within `range` tiles. A negative
    /// range means unlimited.
    pub fn sees(&self, from: Vec3<i32>, to: Vec3<i32>, range: i32) -> bool {
        sees(self, from, to, range).is_some()
    }

    /// The line along which `to` is visible from `from`, excluding `from`.
    pub fn sight_line(&self, from: Vec3<i32>, to: Vec3<i32>, range: i32) -> Option<Vec<Vec3<i32>>> {
        sees(self, from, to, range).map(|offset| line_to(from, to, offset))
    }

    /// Whether some straight line from `from` to `to` only crosses tiles with
    /// move costs within `cost_bounds`.
    pub fn clear_path(
        &self,
        from: Vec3<i32>,
        to: Vec3<i32>,
        range: i32,
        cost_bounds: RangeInclusive<i32>,
    ) -> bool {
        clear_path(self, from, to, range, cost_bounds).is_some()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn p(x: i32, y: i32) -> Vec3<i32> {
        Vec3::new(x, y, 0)
    }

    #[test]
    fn wall_block_blocks_until_removed() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 2, 0, 0);
        let wall = ter(&map, "t_wall");
        let dirt = ter(&map, "t_dirt");
        let (from, to) = (p(5, 5), p(9, 5));
        assert!(map.sees(from, to, -1));

        for y in 4..=6 {
            for x in 6..=8 {
                map.ter_set(p(x, y), wall).unwrap();
            }
        }
        assert!(!map.sees(from, to, -1));
        assert!(!map.clear_path(from, to, -1, 2..=2));

        for y in 4..=6 {
            for x in 6..=8 {
                map.ter_set(p(x, y), dirt).unwrap();
            }
        }
        assert!(map.sees(from, to, -1));
        assert!(map.clear_path(from, to, -1, 2..=2));
    }

    #[test]
    fn range_is_in_king_moves() {
        let grid = TestGrid::new(16, 16);
        assert_eq!(sees(&grid, p(0, 0), p(5, 3), 4), None);
        assert!(sees(&grid, p(0, 0), p(5, 3), 5).is_some());
        assert!(sees(&grid, p(0, 0), p(5, 3), -1).is_some());
        assert_eq!(sees(&grid, p(3, 3), p(3, 3), 0), Some(0));
    }

    #[test]
    fn skewed_line_gets_around_corner() {
        let mut grid = TestGrid::new(16, 16);
        grid.set(4, 1, TestTile::WALL);
        let offset = sees(&grid, p(0, 0), p(5, 2), -1).unwrap();
        let line = line_to(p(0, 0), p(5, 2), offset);
        assert!(!line.contains(&p(4, 1)));
        assert_eq!(line.last(), Some(&p(5, 2)));

        grid.set(4, 2, TestTile::WALL);
        assert_eq!(sees(&grid, p(0, 0), p(5, 2), -1), None);
    }

    #[test]
    fn target_tile_itself_may_be_solid() {
        let mut grid = TestGrid::new(8, 8);
        grid.set(5, 0, TestTile::WALL);
        assert!(sees(&grid, p(0, 0), p(5, 0), -1).is_some());
        assert_eq!(sees(&grid, p(0, 0), p(6, 0), -1), None);
    }

    #[test]
    fn clear_path_checks_costs() {
        let mut grid = TestGrid::new(10, 10);
        grid.set(3, 0, TestTile { cost: 4, ..TestTile::OPEN });
        assert_eq!(clear_path(&grid, p(0, 0), p(6, 0), -1, 2..=2), None);
        assert!(clear_path(&grid, p(0, 0), p(6, 0), -1, 2..=4).is_some());
        assert_eq!(clear_path(&grid, p(0, 0), Vec3::new(6, 0, 1), -1, 2..=4), None);
    }

    #[test]
    fn looking_between_levels() {
        let dir = tempdir().unwrap();
        let mut map = flat_map(&dir, 1, 0, 1);
        let eye = Vec3::new(5, 5, 1);
        assert!(map.sees(eye, Vec3::new(8, 5, 0), -1));
        assert!(map.sees(eye, Vec3::new(5, 5, 0), -1));
        assert!(map.sees(Vec3::new(5, 5, 0), eye, -1));

        let floor = ter(&map, "t_floor");
        map.ter_set(Vec3::new(6, 5, 1), floor).unwrap();
        assert!(!map.sees(eye, Vec3::new(8, 5, 0), -1));
        map.ter_set(eye, floor).unwrap();
        assert!(!map.sees(eye, Vec3::new(5, 5, 0), -1));
        assert!(!map.sees(Vec3::new(5, 5, 0), eye, -1));
    }

    #[test]
    fn sight_line_ends_at_target() {
        let dir = tempdir().unwrap();
        let map = flat_map(&dir, 2, 0, 0);
        let line = map.sight_line(p(1, 1), p(20, 7), -1).unwrap();
        assert_eq!(line.len(), 19);
        assert_eq!(line.last(), Some(&p(20, 7)));
    }

    proptest! {
        #[test]
        fn sight_lines_are_contiguous_and_clear(
            walls in prop::collection::vec((0..16i32, 0..16i32), 0..40),
            from in (0..16i32, 0..16i32),
            to in (0..16i32, 0..16i32),
        ) {
            let (from, to) = (p(from.0, from.1), p(to.0, to.1));
            let mut grid = TestGrid::new(16, 16);
            prop_assert!(sees(&grid, from, to, -1).is_some());
            for (x, y) in walls {
                if p(x, y) != from && p(x, y) != to {
                    grid.set(x, y, TestTile::WALL);
                }
            }

            if let Some(offset) = sees(&grid, from, to, -1) {
                let line = line_to(from, to, offset);
                prop_assert_eq!(line.len() as i32, rl_dist(from, to));
                let mut prev = from;
                for &pos in &line {
                    prop_assert_eq!(rl_dist(prev, pos), 1);
                    if pos != to {
                        prop_assert!(grid.tile(pos).transparent);
                    }
                    prev = pos;
                }
                prop_assert_eq!(prev, to);
            }
        }
    }
}
