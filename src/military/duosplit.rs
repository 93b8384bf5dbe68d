use super::duo::*;
use super::duocache::*;
use super::duoplanner::*;
use crate::pathing::routesearch::*;
use crate::pathing::tiles::*;
use log::*;
use screeps::*;

// ─── Pair split across rooms ─────────────────────────────────────────────────

impl<'a, 'r> DuoPlanning<'a, 'r> {
    pub(super) fn plan_split_rooms(&mut self, cache: &mut DuoCache) -> PlanResult {
        let leader = self.leader;
        let support = self.support;
        let goal = self.ctx.goal;

        cache.path = None;

        let leader_in_goal = same_room(leader.pos, goal.pos);
        let support_in_goal = same_room(support.pos, goal.pos);

        match (leader_in_goal, support_in_goal) {
            // Whoever already reached the goal room keeps going; the other follows it in.
            (true, false) => self.plan_anchor_advance(true, true),
            (false, true) => self.plan_anchor_advance(false, true),
            _ => self.plan_split_regroup(cache),
        }
    }

    /// One member (the anchor) stays in its room, optionally advancing on the goal,
    /// while the other walks to the exit facing the anchor's room and crosses.
    fn plan_anchor_advance(&mut self, anchor_is_leader: bool, anchor_moves: bool) -> PlanResult {
        let (anchor, mover) = if anchor_is_leader {
            (self.leader, self.support)
        } else {
            (self.support, self.leader)
        };

        let goal = self.ctx.goal;
        let limits = RouteSearchLimits::local(&self.ctx.search);

        let exit = self.ctx.exit_toward(mover.pos, anchor.pos);
        let crossing_now = matches!(exit, Some((side, _)) if exit_direction(mover.pos) == Some(side));

        // The mover lands on the anchor's tile when it crosses this tick.
        let blocks_arrival = crossing_now && exit.map(|(side, _)| step(mover.pos, side)) == Some(anchor.pos);

        let mut anchor_step = if anchor.is_fatigued() {
            self.ctx.rejections |= Rejections::FATIGUE;
            None
        } else if anchor_moves {
            self.ctx.step_toward(anchor, goal.pos, goal.goal_range(), limits)
        } else if is_edge(anchor.pos) {
            self.ctx.step_off_edge(anchor, goal.pos)
        } else {
            None
        };

        if anchor_step.is_none() && blocks_arrival && !anchor.is_fatigued() && !mover.is_fatigued() {
            anchor_step = self.ctx.step_off_edge(anchor, goal.pos);
        }

        if anchor_step.is_none() {
            self.ctx.ledger.claim(anchor.pos);
        }

        let mover_step = if mover.is_fatigued() {
            self.ctx.rejections |= Rejections::FATIGUE;
            None
        } else {
            match exit {
                Some(_) if crossing_now => self.ctx.cross(mover),
                Some((_, exit)) => self.ctx.step_toward(mover, exit, 0, limits),
                None => {
                    self.ctx.rejections |= Rejections::NO_PATH;
                    None
                }
            }
        };

        if mover_step.is_none() {
            self.ctx.ledger.claim(mover.pos);
        }

        let step = if anchor_is_leader {
            self.pair_step(anchor_step, mover_step)
        } else {
            self.pair_step(mover_step, anchor_step)
        };

        self.finish_split(step)
    }

    /// Outcome of a split-room tick. A pair held only by fatigue is waiting, not stuck.
    fn finish_split(&mut self, step: DuoStep) -> PlanResult {
        if !step.is_hold() {
            return self.finish(true, PlanReason::SplitAdvance, PlanMode::Regroup, step);
        }

        if self.leader.is_fatigued() || self.support.is_fatigued() {
            return self.finish(true, PlanReason::Fatigue, PlanMode::Regroup, step);
        }

        self.finish(false, PlanReason::SplitRooms, PlanMode::Regroup, step)
    }

    /// Facing exits for the current pair of rooms. Adjacent rooms meet halfway along
    /// the shared boundary; otherwise the leader anchors and the support comes to it.
    fn regroup_exits(&mut self) -> Option<RegroupExits> {
        let leader = self.leader;
        let support = self.support;

        let (leader_x, leader_y) = room_coords(leader.pos);
        let (support_x, support_y) = room_coords(support.pos);
        let adjacent = (leader_x - support_x).abs() + (leader_y - support_y).abs() == 1;

        if adjacent {
            let side = room_exit_toward(leader.pos, support.pos)?;
            let along = (along_boundary(leader.pos, side) + along_boundary(support.pos, side)) / 2;
            let leader_exit = self.ctx.find_exit_tile(leader.pos.room_name(), side, along)?;

            Some(RegroupExits {
                leader_room: leader.pos.room_name(),
                support_room: support.pos.room_name(),
                leader_exit: Some(leader_exit),
                support_exit: step(leader_exit, side),
            })
        } else {
            let (_, support_exit) = self.ctx.exit_toward(support.pos, leader.pos)?;

            Some(RegroupExits {
                leader_room: leader.pos.room_name(),
                support_room: support.pos.room_name(),
                leader_exit: None,
                support_exit,
            })
        }
    }

    fn plan_split_regroup(&mut self, cache: &mut DuoCache) -> PlanResult {
        let leader = self.leader;
        let support = self.support;

        let exits = match cache.regroup.clone() {
            Some(exits) if exits.matches(leader.pos.room_name(), support.pos.room_name()) => exits,
            _ => match self.regroup_exits() {
                Some(exits) => {
                    debug!(
                        "Duo {}/{} regrouping through {:?} and {}",
                        leader.id,
                        support.id,
                        exits.leader_exit.map(describe),
                        describe(exits.support_exit)
                    );

                    cache.regroup = Some(exits.clone());
                    exits
                }
                None => {
                    cache.regroup = None;
                    self.ctx.rejections |= Rejections::NO_PATH;

                    return self.finish(false, PlanReason::SplitRooms, PlanMode::Regroup, self.hold_step());
                }
            },
        };

        let Some(leader_exit) = exits.leader_exit else {
            return self.plan_anchor_advance(true, false);
        };

        let leader_staged = leader.pos == leader_exit;
        let support_staged = support.pos == exits.support_exit;

        if leader_staged && support_staged {
            return self.plan_anchored_crossing();
        }

        let limits = RouteSearchLimits::local(&self.ctx.search);

        let leader_step = if leader_staged {
            None
        } else if leader.is_fatigued() {
            self.ctx.rejections |= Rejections::FATIGUE;
            None
        } else {
            self.ctx.step_toward(leader, leader_exit, 0, limits)
        };

        if leader_step.is_none() {
            self.ctx.ledger.claim(leader.pos);
        }

        let support_step = if support_staged {
            None
        } else if support.is_fatigued() {
            self.ctx.rejections |= Rejections::FATIGUE;
            None
        } else {
            self.ctx.step_toward(support, exits.support_exit, 0, limits)
        };

        if support_step.is_none() {
            self.ctx.ledger.claim(support.pos);
        }

        let step = self.pair_step(leader_step, support_step);

        self.finish_split(step)
    }

    /// Both members stand on facing exits: the leader steps inward and the support
    /// crosses into the tile the leader vacated.
    fn plan_anchored_crossing(&mut self) -> PlanResult {
        let leader = self.leader;
        let support = self.support;

        if leader.is_fatigued() || support.is_fatigued() {
            self.ctx.rejections |= Rejections::FATIGUE;

            return self.finish(true, PlanReason::Fatigue, PlanMode::Regroup, self.hold_step());
        }

        let Some(crossing) = exit_direction(support.pos) else {
            return self.finish(false, PlanReason::SplitRooms, PlanMode::Regroup, self.hold_step());
        };

        for direction in inward_steps(leader.pos) {
            let checkpoint = self.ctx.ledger.checkpoint();

            let leader_to = match self.ctx.can_step(&leader.id, leader.pos, direction) {
                Ok(leader_to) => leader_to,
                Err(rejection) => {
                    self.ctx.rejections |= rejection;
                    continue;
                }
            };

            self.ctx.ledger.commit_move(leader.pos, leader_to);

            match self.ctx.can_step(&support.id, support.pos, crossing) {
                Ok(support_to) => {
                    self.ctx.ledger.commit_move(support.pos, support_to);

                    let step = DuoStep {
                        leader_dir: Some(direction),
                        support_dir: Some(crossing),
                        leader_to,
                        support_to,
                    };

                    return self.finish(true, PlanReason::AnchoredCrossing, PlanMode::Regroup, step);
                }
                Err(rejection) => {
                    self.ctx.rejections |= rejection;
                    self.ctx.ledger.rollback(checkpoint);
                }
            }
        }

        self.finish(false, PlanReason::SplitRooms, PlanMode::Regroup, self.hold_step())
    }

    // ─── Scatter ─────────────────────────────────────────────────────────────

    /// Each member heads for the goal on its own. Only the ledger ties them together.
    pub(super) fn plan_scatter(&mut self, cache: &mut DuoCache) -> PlanResult {
        let leader = self.leader;
        let support = self.support;
        let goal = self.ctx.goal;

        cache.path = None;
        cache.regroup = None;

        let limits = RouteSearchLimits::cross_zone(&self.ctx.search);

        let leader_step = if leader.is_fatigued() {
            self.ctx.rejections |= Rejections::FATIGUE;
            None
        } else {
            self.ctx.step_toward(leader, goal.pos, goal.goal_range(), limits)
        };

        if leader_step.is_none() {
            self.ctx.ledger.claim(leader.pos);
        }

        let support_step = if support.is_fatigued() {
            self.ctx.rejections |= Rejections::FATIGUE;
            None
        } else {
            self.ctx.step_toward(support, goal.pos, goal.goal_range(), limits)
        };

        if support_step.is_none() {
            self.ctx.ledger.claim(support.pos);
        }

        let step = self.pair_step(leader_step, support_step);

        if step.is_hold() {
            let settled = goal.is_satisfied_by(leader.pos) && goal.is_satisfied_by(support.pos);

            let (ok, reason) = if settled {
                (true, PlanReason::GoalReached)
            } else if leader.is_fatigued() || support.is_fatigued() {
                (true, PlanReason::Fatigue)
            } else {
                (false, PlanReason::NoValidStep)
            };

            return self.finish(ok, reason, PlanMode::Scatter, step);
        }

        self.finish(true, PlanReason::ScatteredRetreat, PlanMode::Scatter, step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::*;
    use crate::pathing::world::*;

    fn pos(room: &str, x: u8, y: u8) -> Position {
        Position::new(
            RoomCoordinate::new(x).unwrap(),
            RoomCoordinate::new(y).unwrap(),
            RoomName::new(room).unwrap(),
        )
    }

    fn world() -> StaticWorld {
        let mut world = StaticWorld::new();
        world.add_room(RoomName::new("E1N1").unwrap());
        world.add_room(RoomName::new("E2N1").unwrap());
        world.add_room(RoomName::new("E3N1").unwrap());
        world
    }

    fn request<'r>(leader: &'r DuoAgent, support: &'r DuoAgent, goal: DuoGoal) -> DuoPlanRequest<'r> {
        DuoPlanRequest {
            leader: Some(leader),
            support: Some(support),
            goal: Some(goal),
            formation: FormationConfig::default(),
            movement: MovementConfig::default(),
            tick: 1,
        }
    }

    #[test]
    fn member_in_goal_room_keeps_advancing() {
        let world = world();
        let planner = DuoPlanner::new(&world, SearchConfig::default());
        let leader = DuoAgent::new("leader", pos("E2N1", 5, 20));
        let support = DuoAgent::new("support", pos("E1N1", 40, 20));

        let result = planner.plan(&request(&leader, &support, DuoGoal::occupy(pos("E2N1", 25, 20))), &mut DuoCache::default());
        let step = result.step.unwrap();

        assert!(result.ok);
        assert_eq!(result.reason, PlanReason::SplitAdvance);
        assert_eq!(step.leader_to, pos("E2N1", 6, 20));
        // The support heads for the exit lined up with the leader.
        assert_eq!(step.support_to, pos("E1N1", 41, 20));
    }

    #[test]
    fn staged_exits_cross_with_anchor() {
        let world = world();
        let planner = DuoPlanner::new(&world, SearchConfig::default());
        let leader = DuoAgent::new("leader", pos("E2N1", 0, 25));
        let support = DuoAgent::new("support", pos("E1N1", 49, 25));
        let mut cache = DuoCache::default();

        let result = planner.plan(&request(&leader, &support, DuoGoal::occupy(pos("E3N1", 25, 25))), &mut cache);
        let step = result.step.unwrap();

        assert!(result.ok);
        assert_eq!(result.reason, PlanReason::AnchoredCrossing);
        assert_eq!(step.leader_to, pos("E2N1", 1, 25));
        assert_eq!(step.support_dir, Some(Direction::Right));
        assert_eq!(step.support_to, pos("E2N1", 0, 25));
        assert!(cache.regroup.is_some());
    }

    #[test]
    fn fatigue_in_split_rooms_is_a_wait() {
        let world = world();
        let planner = DuoPlanner::new(&world, SearchConfig::default());
        let goal = DuoGoal::occupy(pos("E2N1", 25, 20));

        let mut leader = DuoAgent::new("leader", pos("E2N1", 5, 20));
        let mut support = DuoAgent::new("support", pos("E1N1", 40, 20));
        leader.fatigue = 4;
        support.fatigue = 2;

        let both = planner.plan(&request(&leader, &support, goal), &mut DuoCache::default());

        assert!(both.ok);
        assert_eq!(both.reason, PlanReason::Fatigue);
        assert!(both.rejections.contains(Rejections::FATIGUE));
        assert!(both.step.unwrap().is_hold());

        support.fatigue = 0;

        let one = planner.plan(&request(&leader, &support, goal), &mut DuoCache::default());
        let step = one.step.unwrap();

        assert!(one.ok);
        assert_eq!(one.reason, PlanReason::SplitAdvance);
        assert_eq!(step.leader_to, leader.pos);
        assert_eq!(step.support_to, pos("E1N1", 41, 20));
    }

    #[test]
    fn fatigued_scatter_waits() {
        let world = world();
        let planner = DuoPlanner::new(&world, SearchConfig::default());

        let mut leader = DuoAgent::new("leader", pos("E1N1", 30, 10));
        let mut support = DuoAgent::new("support", pos("E1N1", 30, 40));
        leader.fatigue = 2;
        support.fatigue = 2;

        let mut scatter = request(&leader, &support, DuoGoal::range(pos("E1N1", 10, 25), 1));
        scatter.movement.allow_split = true;

        let result = planner.plan(&scatter, &mut DuoCache::default());

        assert!(result.ok);
        assert_eq!(result.mode, PlanMode::Scatter);
        assert_eq!(result.reason, PlanReason::Fatigue);
    }

    #[test]
    fn anchor_clears_arrival_tile_for_crossing_partner() {
        let world = world();
        let planner = DuoPlanner::new(&world, SearchConfig::default());
        let leader = DuoAgent::new("leader", pos("E2N1", 0, 25));
        let support = DuoAgent::new("support", pos("E1N1", 49, 25));

        let result = planner.plan(&request(&leader, &support, DuoGoal::occupy(pos("E2N1", 0, 25))), &mut DuoCache::default());
        let step = result.step.unwrap();

        assert!(result.ok);
        assert_eq!(result.reason, PlanReason::SplitAdvance);
        assert_eq!(step.leader_to, pos("E2N1", 1, 25));
        assert_eq!(step.support_dir, Some(Direction::Right));
        assert_eq!(step.support_to, pos("E2N1", 0, 25));
    }

    #[test]
    fn scatter_moves_members_independently() {
        let world = world();
        let planner = DuoPlanner::new(&world, SearchConfig::default());
        let leader = DuoAgent::new("leader", pos("E1N1", 30, 10));
        let support = DuoAgent::new("support", pos("E1N1", 30, 40));
        let goal = DuoGoal::range(pos("E1N1", 10, 25), 1);

        let mut scatter = request(&leader, &support, goal);
        scatter.movement.allow_split = true;

        let result = planner.plan(&scatter, &mut DuoCache::default());
        let step = result.step.unwrap();

        assert!(result.ok);
        assert_eq!(result.mode, PlanMode::Scatter);
        assert_eq!(result.reason, PlanReason::ScatteredRetreat);
        assert!(range(step.leader_to, goal.pos) < range(leader.pos, goal.pos));
        assert!(range(step.support_to, goal.pos) < range(support.pos, goal.pos));
    }
}
