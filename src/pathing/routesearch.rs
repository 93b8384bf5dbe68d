use super::costmap::*;
use super::tiles::*;
use crate::features::*;
use log::*;
use pathfinding::prelude::astar;
use screeps::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const STEP_SCALE: u32 = 10;

/// A path stored as step directions from a fixed origin, cheap to keep across ticks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackedPath {
    pub origin: Position,
    pub directions: Vec<Direction>,
}

impl PackedPath {
    pub fn empty(origin: Position) -> PackedPath {
        PackedPath {
            origin,
            directions: Vec::new(),
        }
    }

    /// Pack a tile path. `path` may or may not start with the origin tile.
    pub fn from_positions(origin: Position, path: &[Position]) -> PackedPath {
        let mut directions = Vec::with_capacity(path.len());
        let mut current = origin;

        for next in path.iter().copied() {
            if next == current {
                continue;
            }

            match direction_to(current, next) {
                Some(direction) if range(current, next) == 1 => {
                    directions.push(direction);
                    current = next;
                }
                _ => break,
            }
        }

        PackedPath { origin, directions }
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Direction> {
        self.directions.get(index).copied()
    }

    /// Tile reached after taking the first `index` steps.
    pub fn position_at(&self, index: usize) -> Position {
        self.directions
            .iter()
            .take(index)
            .fold(self.origin, |pos, direction| step(pos, *direction))
    }

    pub fn destination(&self) -> Position {
        self.position_at(self.directions.len())
    }

    /// First room the path enters that differs from the origin room.
    pub fn next_room(&self) -> Option<RoomName> {
        self.next_room_from(0)
    }

    /// First room entered after step `index` that differs from the room at `index`.
    pub fn next_room_from(&self, index: usize) -> Option<RoomName> {
        let mut pos = self.position_at(index);
        let start_room = pos.room_name();

        for direction in self.directions.iter().skip(index) {
            pos = step(pos, *direction);

            if pos.room_name() != start_room {
                return Some(pos.room_name());
            }
        }

        None
    }
}

#[derive(Clone, Debug)]
pub struct RouteResult {
    pub path: PackedPath,
    /// The search ran out of budget or the goal was unreachable. The path is empty.
    pub incomplete: bool,
    pub ops: u32,
}

impl RouteResult {
    pub fn usable(&self) -> bool {
        !self.incomplete && !self.path.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteSearchLimits {
    pub max_rooms: usize,
    pub max_ops: u32,
}

impl RouteSearchLimits {
    pub fn cross_zone(search: &SearchConfig) -> RouteSearchLimits {
        RouteSearchLimits {
            max_rooms: search.max_rooms,
            max_ops: search.max_ops,
        }
    }

    pub fn local(search: &SearchConfig) -> RouteSearchLimits {
        RouteSearchLimits {
            max_rooms: 1,
            max_ops: search.local_max_ops,
        }
    }
}

/// Bounded tile search over per-room cost grids.
pub struct ZoneRouteSearch {
    limits: RouteSearchLimits,
}

impl ZoneRouteSearch {
    pub fn new(limits: RouteSearchLimits) -> ZoneRouteSearch {
        ZoneRouteSearch { limits }
    }

    pub fn limits(&self) -> RouteSearchLimits {
        self.limits
    }

    /// Find a route from `from` to within `range` of `goal`. The supplier is asked
    /// for each room the search touches; returning `None` blocks that room.
    pub fn find_route<F>(&self, from: Position, goal: Position, goal_range: u32, movement: &MovementConfig, mut cost_for: F) -> RouteResult
    where
        F: FnMut(RoomName) -> Option<LocalCostMatrix>,
    {
        if range(from, goal) <= goal_range {
            return RouteResult {
                path: PackedPath::empty(from),
                incomplete: false,
                ops: 0,
            };
        }

        // With roads in play the plain estimate is no longer a lower bound anyway, so weight
        // it the way the game's own pathfinder does and keep the search greedy.
        let estimate_per_tile = if movement.prefer_roads {
            PLAIN_COST as u32 * STEP_SCALE * 6 / 5
        } else {
            PLAIN_COST as u32 * STEP_SCALE
        };
        let limits = self.limits;

        let mut rooms: HashMap<RoomName, Option<LocalCostMatrix>> = HashMap::new();
        let mut loaded_rooms = 0usize;
        let mut ops = 0u32;
        let mut exhausted = false;

        let result = {
            let successors = |pos: &Position| -> Vec<(Position, u32)> {
                ops += 1;

                if ops > limits.max_ops {
                    exhausted = true;
                    return Vec::new();
                }

                let mut next_positions = Vec::with_capacity(8);

                for direction in DIRECTIONS.iter().copied() {
                    let next = step(*pos, direction);

                    let crossing = next.room_name() != pos.room_name();

                    if crossing && exit_direction(*pos) != Some(direction) {
                        continue;
                    }

                    let room_name = next.room_name();

                    if !rooms.contains_key(&room_name) {
                        let cost_matrix = if loaded_rooms < limits.max_rooms {
                            cost_for(room_name)
                        } else {
                            None
                        };

                        if cost_matrix.is_some() {
                            loaded_rooms += 1;
                        }

                        rooms.insert(room_name, cost_matrix);
                    }

                    let cost = rooms
                        .get(&room_name)
                        .and_then(|cost_matrix| cost_matrix.as_ref())
                        .map(|cost_matrix| cost_matrix.get(next.xy()))
                        .unwrap_or(IMPASSABLE_COST);

                    if cost >= IMPASSABLE_COST {
                        continue;
                    }

                    // Scaled so equal-cost routes prefer orthogonal steps, keeping ties stable.
                    let diagonal = matches!(
                        direction,
                        Direction::TopRight | Direction::BottomRight | Direction::BottomLeft | Direction::TopLeft
                    );

                    next_positions.push((next, cost.max(1) as u32 * STEP_SCALE + diagonal as u32));
                }

                next_positions
            };

            astar(
                &from,
                successors,
                |pos| range(*pos, goal).saturating_sub(goal_range) * estimate_per_tile,
                |pos| range(*pos, goal) <= goal_range,
            )
        };

        match result {
            Some((path, _cost)) => RouteResult {
                path: PackedPath::from_positions(from, &path),
                incomplete: false,
                ops,
            },
            None => {
                debug!(
                    "Route search from {} to {} failed - exhausted: {} ops: {}",
                    describe(from),
                    describe(goal),
                    exhausted,
                    ops
                );

                RouteResult {
                    path: PackedPath::empty(from),
                    incomplete: true,
                    ops,
                }
            }
        }
    }
}
