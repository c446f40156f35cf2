//! Routes across one level of the map.

use crate::{
    map::TileMap,
    visibility::{
        Line,
        SightMap,
        clear_path,
        line_to,
        rl_dist,
        sees,
    },
};
use std::{
    cmp::Reverse,
    collections::BinaryHeap,
};
use vek::*;


/// Extra cost of stepping onto a closed door, for the turn spent opening it.
pub const DOOR_PENALTY: i32 = 4;

/// Extra cost of stepping onto an impassable bashable tile, for the worst
/// case of repeated bash attempts.
pub const BASH_PENALTY: i32 = 18;

/// Extra cost of a diagonal step.
pub const DIAGONAL_PENALTY: i32 = 1;

/// The eight horizontal directions, clockwise starting north.
const DIRECTIONS: [Vec2<i32>; 8] = [
    Vec2 { x: 0, y: -1 },
    Vec2 { x: 1, y: -1 },
    Vec2 { x: 1, y: 0 },
    Vec2 { x: 1, y: 1 },
    Vec2 { x: 0, y: 1 },
    Vec2 { x: -1, y: 1 },
    Vec2 { x: -1, y: 0 },
    Vec2 { x: -1, y: -1 },
];


/// Read access needed for route search.
pub trait MoveMap: SightMap {
    fn is_bashable(&self, pos: Vec3<i32>) -> bool;

    fn is_closed_door(&self, pos: Vec3<i32>) -> bool;
}

/// Neighbors of `cur`, starting with the first step of the straight line to
/// `to` and alternating outward to either side.
fn neighbors(cur: Vec3<i32>, to: Vec3<i32>) -> impl Iterator<Item=Vec3<i32>> {
    let toward = Line::new(cur, to, 0)
        .next()
        .map(|step| Vec2::new(step.x - cur.x, step.y - cur.y))
        .unwrap_or(Vec2::zero());
    let start = DIRECTIONS.iter().position(|&dir| dir == toward).unwrap_or(0) as i32;
    [0, 1, -1, 2, -2, 3, -3, 4].into_iter().map(move |turn| {
        let dir = DIRECTIONS[(start + turn).rem_euclid(8) as usize];
        cur + Vec3::new(dir.x, dir.y, 0)
    })
}

/// Cost of stepping from `from` onto the adjacent `to`.
pub fn step_cost<M>(map: &M, from: Vec3<i32>, to: Vec3<i32>, can_bash: bool) -> i32
where
    M: MoveMap + ?Sized,
{
    let move_cost = map.move_cost(to);
    let mut cost = move_cost;
    if from.x != to.x && from.y != to.y {
        cost += DIAGONAL_PENALTY;
    }
    if map.is_closed_door(to) {
        cost += DOOR_PENALTY;
    } else if move_cost == 0 && can_bash && map.is_bashable(to) {
        cost += BASH_PENALTY;
    }
    cost
}

fn can_enter<M>(map: &M, pos: Vec3<i32>, can_bash: bool) -> bool
where
    M: MoveMap + ?Sized,
{
    map.move_cost(pos) > 0 || (can_bash && map.is_bashable(pos))
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ListState {
    None,
    Open,
    Closed,
}

#[derive(Debug, Copy, Clone)]
struct Node {
    state: ListState,
    g: i32,
    f: i32,
    seq: u64,
    parent: Option<Vec3<i32>>,
}

/// Search area around the endpoints.
struct Area {
    min: Vec2<i32>,
    max: Vec2<i32>,
    z: i32,
}

impl Area {
    fn new(from: Vec3<i32>, to: Vec3<i32>, margin: i32) -> Self {
        Area {
            min: Vec2::new(from.x.min(to.x), from.y.min(to.y)) - Vec2::broadcast(margin),
            max: Vec2::new(from.x.max(to.x), from.y.max(to.y)) + Vec2::broadcast(margin),
            z: from.z,
        }
    }

    fn contains(&self, pos: Vec3<i32>) -> bool {
        pos.z == self.z
            && pos.x >= self.min.x && pos.x <= self.max.x
            && pos.y >= self.min.y && pos.y <= self.max.y
    }

    fn width(&self) -> i32 {
        self.max.x - self.min.x + 1
    }

    fn len(&self) -> usize {
        (self.width() * (self.max.y - self.min.y + 1)) as usize
    }

    fn index(&self, pos: Vec3<i32>) -> usize {
        ((pos.x - self.min.x) + (pos.y - self.min.y) * self.width()) as usize
    }
}

/// Route from `from` to `to` on one level, excluding `from` and including
/// `to`. Empty if there is no route.
///
/// Straight lines over plain ground are taken as is. Otherwise an A* search
/// runs within `margin` tiles of the endpoints' bounding box. Ties between
/// equally scored tiles go to whichever was discovered first. If either
/// endpoint is outside the map, the route is the line of sight between them
/// if there is one.
pub fn route<M>(map: &M, from: Vec3<i32>, to: Vec3<i32>, can_bash: bool, margin: i32) -> Vec<Vec3<i32>>
where
    M: MoveMap + ?Sized,
{
    if from.z != to.z {
        debug!(?from, ?to, "no routes between levels");
        return Vec::new();
    }
    if from == to {
        return Vec::new();
    }
    if !map.inbounds(from) || !map.inbounds(to) {
        return match sees(map, from, to, -1) {
            Some(offset) => line_to(from, to, offset),
            None => Vec::new(),
        };
    }
    if let Some(offset) = clear_path(map, from, to, -1, 2..=2) {
        return line_to(from, to, offset);
    }

    let area = Area::new(from, to, margin);
    let mut nodes = vec![
        Node {
            state: ListState::None,
            g: 0,
            f: 0,
            seq: 0,
            parent: None,
        };
        area.len()
    ];
    let mut open = BinaryHeap::new();
    let mut next_seq = 0u64;

    nodes[area.index(from)].state = ListState::Open;
    open.push(Reverse((0, next_seq, from.x, from.y)));
    next_seq += 1;

    let mut target_parent = None;
    while let Some(Reverse((f, _, x, y))) = open.pop() {
        let cur = Vec3::new(x, y, from.z);
        let cur_node = nodes[area.index(cur)];
        if cur_node.state != ListState::Open || cur_node.f != f {
            continue;
        }

        for next in neighbors(cur, to) {
            if next == to {
                target_parent = Some(cur);
                break;
            }
            if !area.contains(next) || !map.inbounds(next) || !can_enter(map, next, can_bash) {
                continue;
            }
            let g = cur_node.g + step_cost(map, cur, next, can_bash);
            let f = g + 2 * rl_dist(next, to);
            let node = &mut nodes[area.index(next)];
            match node.state {
                ListState::None => {
                    *node = Node {
                        state: ListState::Open,
                        g,
                        f,
                        seq: next_seq,
                        parent: Some(cur),
                    };
                    next_seq += 1;
                    open.push(Reverse((f, node.seq, next.x, next.y)));
                }
                ListState::Open if g < node.g => {
                    node.g = g;
                    node.f = f;
                    node.parent = Some(cur);
                    open.push(Reverse((f, node.seq, next.x, next.y)));
                }
                _ => (),
            }
        }
        nodes[area.index(cur)].state = ListState::Closed;
        if target_parent.is_some() {
            break;
        }
    }

    let Some(mut parent) = target_parent else {
        trace!(?from, ?to, "no route");
        return Vec::new();
    };
    let mut path = vec![to];
    while parent != from {
        path.push(parent);
        let next = nodes[area.index(parent)].parent;
        match next {
            Some(next) if rl_dist(next, parent) == 1 => parent = next,
            _ => {
                error!(?from, ?to, at = ?parent, "broken parent chain in route");
                return Vec::new();
            }
        }
    }
    path.reverse();
    path
}


impl MoveMap for TileMap {
    fn is_bashable(&self, pos: Vec3<i32>) -> bool {
        TileMap::is_bashable(self, pos)
    }

    fn is_closed_door(&self, pos: Vec3<i32>) -> bool {
        TileMap::is_closed_door(self, pos)
    }
}

impl TileMap {
    /// Route from `from` to `to` on one level, excluding `from`. Empty if
    /// there is no route.
    pub fn route(&self, from: Vec3<i32>, to: Vec3<i32>, can_bash: bool) -> Vec<Vec3<i32>> {
        route(self, from, to, can_bash, self.settings().route_margin)
    }
}
