use crate::features::MovementConfig;
use crate::pathing::routesearch::PackedPath;
use screeps::*;
use serde::{Deserialize, Serialize};

/// Leader path kept across ticks so the route search only runs when the path goes stale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuoPathCache {
    pub goal_key: String,
    pub path: PackedPath,
    /// Index of the next direction to take.
    pub index: usize,
    pub computed_at: u32,
    /// Where the leader should be if the last issued cached step succeeded.
    pub expected_pos: Option<Position>,
    /// Where the leader was when the last cached step was issued.
    pub issued_from: Option<Position>,
    pub stalled_ticks: u32,
}

impl DuoPathCache {
    pub fn new(goal_key: String, path: PackedPath, computed_at: u32) -> DuoPathCache {
        DuoPathCache {
            goal_key,
            path,
            index: 0,
            computed_at,
            expected_pos: None,
            issued_from: None,
            stalled_ticks: 0,
        }
    }

    /// Next cached direction for a leader standing at `leader_pos`, or `None` when
    /// the cache is stale and must be recomputed.
    pub fn next_direction(&mut self, leader_pos: Position, goal_key: &str, tick: u32, movement: &MovementConfig) -> Option<(usize, Direction)> {
        if self.goal_key != goal_key {
            return None;
        }

        if tick.saturating_sub(self.computed_at) >= movement.path_reuse_ticks {
            return None;
        }

        if self.expected_pos == Some(leader_pos) {
            self.stalled_ticks = 0;
        } else if self.issued_from == Some(leader_pos) && self.index > 0 {
            // The issued step never happened.
            self.index -= 1;
            self.stalled_ticks += 1;

            if self.stalled_ticks > movement.stall_repath_ticks {
                return None;
            }
        } else if self.path.position_at(self.index) != leader_pos {
            return None;
        }

        self.expected_pos = None;
        self.issued_from = None;

        self.path.get(self.index).map(|direction| (self.index, direction))
    }

    /// Record that the cached step at `index` was issued from `from` toward `to`.
    pub fn advance(&mut self, index: usize, from: Position, to: Position) {
        self.index = index + 1;
        self.expected_pos = Some(to);
        self.issued_from = Some(from);
    }
}

/// Facing exit tiles used to bring a pair split across two rooms back together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegroupExits {
    pub leader_room: RoomName,
    pub support_room: RoomName,
    /// Leader's exit; `None` when the rooms are not adjacent and the leader anchors in place.
    pub leader_exit: Option<Position>,
    pub support_exit: Position,
}

impl RegroupExits {
    pub fn matches(&self, leader_room: RoomName, support_room: RoomName) -> bool {
        self.leader_room == leader_room && self.support_room == support_room
    }
}

/// Per-squad cache handle threaded through the planner.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DuoCache {
    pub path: Option<DuoPathCache>,
    pub regroup: Option<RegroupExits>,
}
