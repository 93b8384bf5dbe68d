use super::duo::*;
use super::duocache::*;
use super::intentledger::*;
use crate::features::*;
use crate::identifiers::AgentId;
use crate::pathing::costmap::*;
use crate::pathing::routesearch::*;
use crate::pathing::tiles::*;
use crate::pathing::tiles::ROOM_SIZE;
use crate::pathing::world::*;
use log::*;
use screeps::*;
use std::collections::HashMap;

/// Inputs for one planning call. Either agent or the goal may be missing.
#[derive(Clone, Debug)]
pub struct DuoPlanRequest<'r> {
    pub leader: Option<&'r DuoAgent>,
    pub support: Option<&'r DuoAgent>,
    pub goal: Option<DuoGoal>,
    pub formation: FormationConfig,
    pub movement: MovementConfig,
    pub tick: u32,
}

/// Plans one tick of movement for a leader/support pair.
pub struct DuoPlanner<'a> {
    world: &'a dyn ZoneDataSource,
    search: SearchConfig,
}

impl<'a> DuoPlanner<'a> {
    pub fn new(world: &'a dyn ZoneDataSource, search: SearchConfig) -> DuoPlanner<'a> {
        DuoPlanner { world, search }
    }

    pub fn plan(&self, request: &DuoPlanRequest, cache: &mut DuoCache) -> PlanResult {
        let (Some(leader), Some(support), Some(goal)) = (request.leader, request.support, request.goal) else {
            return PlanResult::missing_input();
        };

        let context = PlanningContext::new(self.world, self.search, request.movement, goal, request.tick, &[leader, support]);

        let mut planning = DuoPlanning {
            ctx: context,
            leader,
            support,
            formation: request.formation,
            meta: PlanMeta {
                goal_key: Some(goal.key()),
                ..Default::default()
            },
        };

        planning.plan(cache)
    }

    /// Move a lone agent toward a goal. Used when the partner is gone.
    pub fn plan_solo(&self, agent: &DuoAgent, goal: &DuoGoal, movement: &MovementConfig, tick: u32) -> SoloPlan {
        let mut context = PlanningContext::new(self.world, self.search, *movement, *goal, tick, &[agent]);

        let (ok, reason, step) = if agent.is_fatigued() {
            context.rejections |= Rejections::FATIGUE;

            (true, PlanReason::Fatigue, None)
        } else {
            let limits = RouteSearchLimits::cross_zone(&self.search);

            match context.step_toward(agent, goal.pos, goal.goal_range(), limits) {
                Some(step) => (true, PlanReason::SoloStep, Some(step)),
                None if goal.is_satisfied_by(agent.pos) => (true, PlanReason::GoalReached, None),
                None => (false, PlanReason::NoValidStep, None),
            }
        };

        SoloPlan {
            ok,
            reason,
            direction: step.map(|(direction, _)| direction),
            to: step.map(|(_, to)| to).unwrap_or(agent.pos),
            rejections: context.rejections,
        }
    }
}

/// Per-call planning state: cost lookups, the intent ledger and lazily loaded occupancy.
pub(super) struct PlanningContext<'a> {
    pub(super) costs: ZoneCostCache<'a>,
    pub(super) ledger: IntentLedger,
    pub(super) goal: DuoGoal,
    pub(super) movement: MovementConfig,
    pub(super) search: SearchConfig,
    pub(super) tick: u32,
    pub(super) rejections: Rejections,
    /// Edge tiles an agent may deliberately end on this tick.
    pub(super) designated: Vec<Position>,
    members: Vec<(AgentId, Position)>,
    agents: HashMap<RoomName, Vec<ZoneAgent>>,
}

impl<'a> PlanningContext<'a> {
    pub(super) fn new(
        world: &'a dyn ZoneDataSource,
        search: SearchConfig,
        movement: MovementConfig,
        goal: DuoGoal,
        tick: u32,
        members: &[&DuoAgent],
    ) -> PlanningContext<'a> {
        PlanningContext {
            costs: ZoneCostCache::new(world, movement.prefer_roads),
            ledger: IntentLedger::new(),
            goal,
            movement,
            search,
            tick,
            rejections: Rejections::empty(),
            designated: Vec::new(),
            members: members.iter().map(|agent| (agent.id.clone(), agent.pos)).collect(),
            agents: HashMap::new(),
        }
    }

    fn is_member(&self, id: &AgentId) -> bool {
        self.members.iter().any(|(member, _)| member == id)
    }

    /// Agent standing on a tile at the start of the tick. Members are reported
    /// from their snapshot positions, never from the world view.
    pub(super) fn occupant(&mut self, pos: Position) -> Option<AgentId> {
        if let Some((id, _)) = self.members.iter().find(|(_, member_pos)| *member_pos == pos) {
            return Some(id.clone());
        }

        let world = self.costs.source();
        let members = &self.members;
        let room_name = pos.room_name();

        self.agents
            .entry(room_name)
            .or_insert_with(|| world.agents(room_name))
            .iter()
            .find(|agent| agent.pos == pos && !members.iter().any(|(member, _)| member == &agent.id))
            .map(|agent| agent.id.clone())
    }

    pub(super) fn is_foreign_occupied(&mut self, pos: Position) -> bool {
        match self.occupant(pos) {
            Some(id) => !self.is_member(&id),
            None => false,
        }
    }

    /// Whether `mover` may end the tick on `to`, ignoring how it gets there.
    pub(super) fn can_enter(&mut self, mover: &AgentId, to: Position) -> Result<(), Rejections> {
        if !self.costs.is_walkable(to) {
            return Err(Rejections::BLOCKED);
        }

        if self.ledger.is_claimed(to) {
            return Err(Rejections::CLAIMED);
        }

        match self.occupant(to) {
            None => Ok(()),
            Some(id) if &id == mover => Ok(()),
            Some(_) if self.ledger.is_vacating(to) => Ok(()),
            Some(id) if self.is_member(&id) => Err(Rejections::COLLISION),
            Some(_) => Err(Rejections::BLOCKED),
        }
    }

    /// Validate a single step. Room crossings are only possible from an edge tile
    /// in its exit direction.
    pub(super) fn can_step(&mut self, mover: &AgentId, from: Position, direction: Direction) -> Result<Position, Rejections> {
        let to = step(from, direction);

        if !same_room(from, to) && exit_direction(from) != Some(direction) {
            return Err(Rejections::BLOCKED);
        }

        self.can_enter(mover, to).map(|_| to)
    }

    /// An edge tile whose exit leads toward `target`, either into the hinted room
    /// or into a room closer to the target's room.
    pub(super) fn is_crossing_tile(&mut self, tile: Position, target: Position, hint: Option<RoomName>) -> bool {
        let Some(exit) = exit_direction(tile) else {
            return false;
        };

        let across = step(tile, exit);

        if same_room(tile, across) || !self.costs.is_walkable(across) {
            return false;
        }

        match hint {
            Some(room_name) => across.room_name() == room_name,
            None => room_range(across, target) < room_range(tile, target),
        }
    }

    pub(super) fn route(
        &mut self,
        from: Position,
        target: Position,
        target_range: u32,
        limits: RouteSearchLimits,
        avoid_borders: bool,
        extra_vacating: &[Position],
    ) -> RouteResult {
        let mut options = CostMapOptions::new(self.movement.prefer_roads)
            .avoid_borders(avoid_borders)
            .vacating_all(self.ledger.vacating_tiles())
            .vacating_all(extra_vacating.iter().copied());

        for (id, _) in self.members.iter() {
            options = options.ignore_agent(id);
        }

        let movement = self.movement;
        let costs = &mut self.costs;

        ZoneRouteSearch::new(limits).find_route(from, target, target_range, &movement, |room_name| {
            costs.overlay(room_name, &options)
        })
    }

    /// Walkable, unoccupied neighbours of a tile within its own room.
    pub(super) fn open_space(&mut self, tile: Position) -> usize {
        let mut open = 0;

        for direction in DIRECTIONS.iter() {
            let neighbour = step(tile, *direction);

            if same_room(tile, neighbour) && self.costs.is_walkable(neighbour) && !self.is_foreign_occupied(neighbour) {
                open += 1;
            }
        }

        open
    }

    /// Step one agent toward a target and commit it to the ledger. Route first,
    /// falling back to greedy steps that strictly close the distance.
    pub(super) fn step_toward(
        &mut self,
        agent: &DuoAgent,
        target: Position,
        target_range: u32,
        limits: RouteSearchLimits,
    ) -> Option<(Direction, Position)> {
        if range(agent.pos, target) <= target_range {
            if is_edge(agent.pos) && agent.pos != target {
                return self.step_off_edge(agent, target);
            }

            return None;
        }

        let local = limits.max_rooms == 1;
        let route = self.route(agent.pos, target, target_range, limits, local, &[]);

        let mut candidates = Vec::new();
        let mut hint = None;

        match route.path.get(0).filter(|_| route.usable()) {
            Some(primary) => {
                hint = route.path.next_room();
                candidates.extend([primary, rotate(primary, -1), rotate(primary, 1)]);
            }
            None => {
                self.rejections |= Rejections::NO_PATH;
            }
        }

        let current = range(agent.pos, target);

        for direction in greedy_directions(agent.pos, target) {
            if !candidates.contains(&direction) && range(step(agent.pos, direction), target) < current {
                candidates.push(direction);
            }
        }

        for direction in candidates {
            let to = step(agent.pos, direction);
            let crossing = !same_room(agent.pos, to);

            if crossing && local {
                continue;
            }

            if is_edge(to) && !crossing && to != target && !self.is_crossing_tile(to, target, hint) {
                self.rejections |= Rejections::EDGE;
                continue;
            }

            match self.can_step(&agent.id, agent.pos, direction) {
                Ok(to) => {
                    self.ledger.commit_move(agent.pos, to);

                    if is_edge(to) {
                        self.designated.push(to);
                    }

                    return Some((direction, to));
                }
                Err(rejection) => self.rejections |= rejection,
            }
        }

        None
    }

    /// Move an agent standing on an edge tile one tile inward, closest to `target` first.
    pub(super) fn step_off_edge(&mut self, agent: &DuoAgent, target: Position) -> Option<(Direction, Position)> {
        let mut directions = inward_steps(agent.pos);
        directions.sort_by_key(|direction| range(step(agent.pos, *direction), target));

        for direction in directions {
            match self.can_step(&agent.id, agent.pos, direction) {
                Ok(to) => {
                    self.ledger.commit_move(agent.pos, to);

                    return Some((direction, to));
                }
                Err(rejection) => self.rejections |= rejection,
            }
        }

        None
    }

    /// Cross from the edge tile the agent stands on into the neighbouring room.
    pub(super) fn cross(&mut self, agent: &DuoAgent) -> Option<(Direction, Position)> {
        let direction = exit_direction(agent.pos)?;

        match self.can_step(&agent.id, agent.pos, direction) {
            Ok(to) => {
                self.ledger.commit_move(agent.pos, to);

                Some((direction, to))
            }
            Err(rejection) => {
                self.rejections |= rejection;

                None
            }
        }
    }

    /// Replace a committed destination `to` (an edge tile) with an inward tile still
    /// reachable from `from`. Keeps the ledger consistent; `None` when nothing fits.
    pub(super) fn nudge_inward(&mut self, mover: &AgentId, from: Position, to: Position, keep_near: Option<(Position, u32)>) -> Option<Position> {
        for direction in inward_steps(to) {
            let candidate = step(to, direction);

            if range(from, candidate) > 1 || !same_room(from, candidate) {
                continue;
            }

            if let Some((partner, max_range)) = keep_near {
                if range(candidate, partner) > max_range {
                    continue;
                }
            }

            let allowed = if candidate == from {
                !self.ledger.is_claimed(from)
            } else {
                self.can_enter(mover, candidate).is_ok()
            };

            if allowed {
                self.ledger.release(to);

                if candidate == from {
                    self.ledger.unvacate(from);
                }

                self.ledger.claim(candidate);

                return Some(candidate);
            }
        }

        None
    }

    /// Exit side and tile in `from`'s room leading toward `partner`'s room, aligned
    /// with the partner's coordinate along that boundary.
    pub(super) fn exit_toward(&mut self, from: Position, partner: Position) -> Option<(Direction, Position)> {
        let side = room_exit_toward(from, partner)?;
        let along = along_boundary(partner, side);

        self.find_exit_tile(from.room_name(), side, along).map(|tile| (side, tile))
    }

    /// Nearest usable exit tile to `along` on a room boundary: walkable on both sides.
    pub(super) fn find_exit_tile(&mut self, room_name: RoomName, side: Direction, along: i32) -> Option<Position> {
        for offset in 0..ROOM_SIZE {
            for signed in [offset, -offset] {
                if offset == 0 && signed < 0 {
                    continue;
                }

                let coordinate = along + signed;

                if !(1..ROOM_SIZE - 1).contains(&coordinate) {
                    continue;
                }

                let Some(tile) = boundary_tile(room_name, side, coordinate) else {
                    continue;
                };

                if self.costs.is_walkable(tile) && self.costs.is_walkable(step(tile, side)) {
                    return Some(tile);
                }
            }
        }

        None
    }
}

/// All eight directions ordered by how well they close on `target`.
pub(super) fn greedy_directions(from: Position, target: Position) -> Vec<Direction> {
    let direct = direction_to(from, target).unwrap_or(Direction::Top);
    let mut directions = DIRECTIONS.to_vec();

    directions.sort_by_key(|direction| (range(step(from, *direction), target), angle_between(*direction, direct)));

    directions
}

fn distance_sq(a: Position, b: Position) -> i32 {
    let dx = a.world_x() - b.world_x();
    let dy = a.world_y() - b.world_y();

    dx * dx + dy * dy
}

#[derive(Clone, Copy, Debug)]
pub(super) struct CachedStep {
    pub(super) index: usize,
    pub(super) direction: Direction,
    pub(super) next_room: Option<RoomName>,
}

pub(super) struct DuoPlanning<'a, 'r> {
    pub(super) ctx: PlanningContext<'a>,
    pub(super) leader: &'r DuoAgent,
    pub(super) support: &'r DuoAgent,
    pub(super) formation: FormationConfig,
    pub(super) meta: PlanMeta,
}

impl<'a, 'r> DuoPlanning<'a, 'r> {
    fn plan(&mut self, cache: &mut DuoCache) -> PlanResult {
        let leader = self.leader;
        let support = self.support;

        if self.ctx.movement.allow_split {
            return self.plan_scatter(cache);
        }

        if !same_room(leader.pos, support.pos) {
            return self.plan_split_rooms(cache);
        }

        cache.regroup = None;

        let cohesive = self.is_cohesive(leader.pos, support.pos);

        if leader.is_fatigued() || support.is_fatigued() {
            self.ctx.rejections |= Rejections::FATIGUE;

            let mode = if cohesive { PlanMode::Hold } else { PlanMode::Regroup };

            return self.finish(true, PlanReason::Fatigue, mode, self.hold_step());
        }

        if !cohesive {
            return self.plan_regroup();
        }

        if self.ctx.goal.is_satisfied_by(leader.pos) {
            return self.plan_goal_reached();
        }

        let cached = self.cached_next(cache);

        if let Some(result) = self.plan_border_handshake(cache, cached) {
            return result;
        }

        self.plan_cohesive_travel(cache, cached)
    }

    pub(super) fn is_cohesive(&self, a: Position, b: Position) -> bool {
        same_room(a, b) && range(a, b) <= self.formation.cohesion_range
    }

    pub(super) fn hold_step(&self) -> DuoStep {
        DuoStep::hold(self.leader.pos, self.support.pos)
    }

    /// Combine independently planned moves into a pair step.
    pub(super) fn pair_step(&self, leader_step: Option<(Direction, Position)>, support_step: Option<(Direction, Position)>) -> DuoStep {
        DuoStep {
            leader_dir: leader_step.map(|(direction, _)| direction),
            support_dir: support_step.map(|(direction, _)| direction),
            leader_to: leader_step.map(|(_, to)| to).unwrap_or(self.leader.pos),
            support_to: support_step.map(|(_, to)| to).unwrap_or(self.support.pos),
        }
    }

    pub(super) fn finish(&mut self, ok: bool, reason: PlanReason, mode: PlanMode, step: DuoStep) -> PlanResult {
        let leader = self.leader;
        let support = self.support;

        let step = self.enforce_border_hygiene(step);

        if !self.ctx.rejections.is_empty() {
            debug!(
                "Duo {}/{} planned {} with rejections: {}",
                leader.id,
                support.id,
                reason,
                self.ctx.rejections.describe()
            );
        }

        PlanResult {
            ok,
            reason,
            mode,
            cohesive: self.is_cohesive(leader.pos, support.pos),
            same_zone: same_room(leader.pos, support.pos),
            distance: range(leader.pos, support.pos),
            step: Some(step),
            meta: self.meta.clone(),
            rejections: self.ctx.rejections,
        }
    }

    fn strays_onto_edge(&self, from: Position, to: Position) -> bool {
        from != to && same_room(from, to) && is_edge(to) && !self.ctx.designated.contains(&to)
    }

    /// Last pass: nothing ends on an edge tile unless it was chosen as a crossing or exit tile.
    fn enforce_border_hygiene(&mut self, mut step: DuoStep) -> DuoStep {
        let leader = self.leader;
        let support = self.support;
        let cohesion = if self.ctx.movement.allow_split {
            None
        } else {
            Some(self.formation.cohesion_range)
        };

        if self.strays_onto_edge(leader.pos, step.leader_to) {
            let keep_near = cohesion.map(|cohesion| (step.support_to, cohesion));

            match self.ctx.nudge_inward(&leader.id, leader.pos, step.leader_to, keep_near) {
                Some(to) => {
                    step.leader_to = to;
                    step.leader_dir = direction_to(leader.pos, to);
                }
                None => {
                    self.ctx.rejections |= Rejections::EDGE;

                    return self.hold_step();
                }
            }
        }

        if self.strays_onto_edge(support.pos, step.support_to) {
            let keep_near = cohesion.map(|cohesion| (step.leader_to, cohesion));

            match self.ctx.nudge_inward(&support.id, support.pos, step.support_to, keep_near) {
                Some(to) => {
                    step.support_to = to;
                    step.support_dir = direction_to(support.pos, to);
                }
                None => {
                    self.ctx.rejections |= Rejections::EDGE;

                    return self.hold_step();
                }
            }
        }

        step
    }

    /// Look up the next cached leader direction, dropping the cache when it is stale
    /// or its next tile is held by a foreign agent.
    fn cached_next(&mut self, cache: &mut DuoCache) -> Option<CachedStep> {
        if !self.ctx.movement.use_path_cache {
            cache.path = None;

            return None;
        }

        let leader = self.leader;
        let goal_key = self.ctx.goal.key();
        let tick = self.ctx.tick;
        let movement = self.ctx.movement;

        let next = cache.path.as_mut().and_then(|path_cache| {
            let (index, direction) = path_cache.next_direction(leader.pos, &goal_key, tick, &movement)?;

            Some((index, direction, path_cache.stalled_ticks, path_cache.path.next_room_from(index)))
        });

        match next {
            Some((index, direction, stalled_ticks, next_room)) => {
                self.meta.stalled_ticks = stalled_ticks;

                if self.ctx.is_foreign_occupied(step(leader.pos, direction)) {
                    debug!(
                        "Cached step {:?} from {} is blocked by a foreign agent, recomputing",
                        direction,
                        describe(leader.pos)
                    );

                    self.ctx.rejections |= Rejections::BLOCKED;
                    cache.path = None;

                    return None;
                }

                Some(CachedStep { index, direction, next_room })
            }
            None => {
                if cache.path.is_some() {
                    debug!("Cached path for {} is stale, recomputing", leader.id);
                }

                cache.path = None;

                None
            }
        }
    }

    /// Leader heading for this tick: cached direction, fresh route, or greedy fallback.
    fn leader_primary(&mut self, cache: &mut DuoCache, cached: Option<CachedStep>) -> Option<(Direction, Option<RoomName>)> {
        if let Some(cached) = cached {
            self.meta.used_path = true;
            self.meta.path_index = Some(cached.index);

            return Some((cached.direction, cached.next_room));
        }

        let leader = self.leader;
        let goal = self.ctx.goal;
        let limits = RouteSearchLimits::cross_zone(&self.ctx.search);

        let route = self.ctx.route(leader.pos, goal.pos, goal.goal_range(), limits, false, &[]);

        self.meta.repathed = true;

        if let Some(direction) = route.path.get(0).filter(|_| route.usable()) {
            let next_room = route.path.next_room();

            if self.ctx.movement.use_path_cache {
                cache.path = Some(DuoPathCache::new(goal.key(), route.path, self.ctx.tick));
            }

            self.meta.used_path = true;
            self.meta.path_index = Some(0);

            return Some((direction, next_room));
        }

        self.ctx.rejections |= Rejections::NO_PATH;

        direction_to(leader.pos, goal.pos).map(|direction| (direction, None))
    }

    /// Keep the cached path in step with what the leader was told to do.
    fn follow_cache(&mut self, cache: &mut DuoCache, direction: Option<Direction>, to: Position) {
        let from = self.leader.pos;
        let path_index = self.meta.path_index;

        let keep = match cache.path.as_mut() {
            None => return,
            Some(path_cache) => match (direction, path_index) {
                (None, _) => {
                    path_cache.expected_pos = None;
                    path_cache.issued_from = None;
                    true
                }
                (Some(direction), Some(index)) if path_cache.path.get(index) == Some(direction) => {
                    path_cache.advance(index, from, to);
                    true
                }
                _ => false,
            },
        };

        if !keep {
            cache.path = None;
        }
    }

    fn plan_regroup(&mut self) -> PlanResult {
        let leader = self.leader;
        let support = self.support;

        self.ctx.ledger.claim(leader.pos);

        let current = range(support.pos, leader.pos);

        for direction in greedy_directions(support.pos, leader.pos) {
            let to = step(support.pos, direction);

            if range(to, leader.pos) >= current {
                break;
            }

            if !same_room(to, support.pos) || is_edge(to) {
                self.ctx.rejections |= Rejections::EDGE;
                continue;
            }

            match self.ctx.can_step(&support.id, support.pos, direction) {
                Ok(to) => {
                    self.ctx.ledger.commit_move(support.pos, to);

                    let step = self.pair_step(None, Some((direction, to)));

                    return self.finish(true, PlanReason::RegroupStep, PlanMode::Regroup, step);
                }
                Err(rejection) => self.ctx.rejections |= rejection,
            }
        }

        let limits = RouteSearchLimits::local(&self.ctx.search);
        let route = self.ctx.route(support.pos, leader.pos, 1, limits, true, &[support.pos]);

        match route.path.get(0).filter(|_| route.usable()) {
            Some(direction) => {
                let to = step(support.pos, direction);

                if is_edge(to) {
                    self.ctx.rejections |= Rejections::EDGE;
                } else {
                    match self.ctx.can_step(&support.id, support.pos, direction) {
                        Ok(to) => {
                            self.ctx.ledger.commit_move(support.pos, to);

                            let step = self.pair_step(None, Some((direction, to)));

                            return self.finish(true, PlanReason::RegroupStep, PlanMode::Regroup, step);
                        }
                        Err(rejection) => self.ctx.rejections |= rejection,
                    }
                }
            }
            None => {
                self.ctx.rejections |= Rejections::NO_PATH;
            }
        }

        self.finish(false, PlanReason::RegroupBlocked, PlanMode::Regroup, self.hold_step())
    }

    fn plan_goal_reached(&mut self) -> PlanResult {
        let leader = self.leader;
        let support = self.support;

        self.ctx.ledger.claim(leader.pos);

        // A support left on an arrival tile steps inward while the leader holds.
        if is_edge(support.pos) {
            for direction in inward_steps(support.pos) {
                let to = step(support.pos, direction);

                if !self.is_cohesive(leader.pos, to) {
                    self.ctx.rejections |= Rejections::COHESION;
                    continue;
                }

                match self.ctx.can_step(&support.id, support.pos, direction) {
                    Ok(to) => {
                        self.ctx.ledger.commit_move(support.pos, to);

                        let step = self.pair_step(None, Some((direction, to)));

                        return self.finish(true, PlanReason::GoalReached, PlanMode::Hold, step);
                    }
                    Err(rejection) => self.ctx.rejections |= rejection,
                }
            }
        }

        self.ctx.ledger.claim(support.pos);

        self.finish(true, PlanReason::GoalReached, PlanMode::Hold, self.hold_step())
    }

    /// Leader standing on the crossing tile with the support adjacent: the leader
    /// crosses and the support takes the tile it vacates.
    fn plan_border_handshake(&mut self, cache: &mut DuoCache, cached: Option<CachedStep>) -> Option<PlanResult> {
        let leader = self.leader;
        let support = self.support;
        let goal = self.ctx.goal;

        let exit = exit_direction(leader.pos)?;

        if same_room(leader.pos, goal.pos) || range(leader.pos, support.pos) != 1 {
            return None;
        }

        let hint = cached.and_then(|cached| cached.next_room);

        if !self.ctx.is_crossing_tile(leader.pos, goal.pos, hint) {
            return None;
        }

        let across = step(leader.pos, exit);

        if let Err(rejection) = self.ctx.can_enter(&leader.id, across) {
            self.ctx.rejections |= rejection;

            return None;
        }

        let support_dir = direction_to(support.pos, leader.pos)?;
        let checkpoint = self.ctx.ledger.checkpoint();

        self.ctx.ledger.commit_move(leader.pos, across);

        match self.ctx.can_step(&support.id, support.pos, support_dir) {
            Ok(support_to) => {
                self.ctx.ledger.commit_move(support.pos, support_to);
                self.ctx.designated.push(support_to);

                match cached {
                    Some(cached) if cached.direction == exit => {
                        self.meta.used_path = true;
                        self.meta.path_index = Some(cached.index);
                    }
                    _ => {
                        self.meta.path_index = None;
                    }
                }

                self.follow_cache(cache, Some(exit), across);

                let step = DuoStep {
                    leader_dir: Some(exit),
                    support_dir: Some(support_dir),
                    leader_to: across,
                    support_to,
                };

                Some(self.finish(true, PlanReason::BorderHandshake, PlanMode::BorderHandshake, step))
            }
            Err(rejection) => {
                self.ctx.rejections |= rejection | Rejections::PRE_CROSS;
                self.ctx.ledger.rollback(checkpoint);

                None
            }
        }
    }

    fn plan_cohesive_travel(&mut self, cache: &mut DuoCache, cached: Option<CachedStep>) -> PlanResult {
        let leader = self.leader;
        let support = self.support;
        let goal = self.ctx.goal;

        let Some((primary, hint)) = self.leader_primary(cache, cached) else {
            return self.finish(false, PlanReason::NoValidStep, PlanMode::Hold, self.hold_step());
        };

        let mut candidates = vec![primary, rotate(primary, -1), rotate(primary, 1)];
        candidates.sort_by_key(|direction| range(step(leader.pos, *direction), goal.pos));

        for direction in candidates {
            let leader_to = step(leader.pos, direction);

            // Leaving the room is only done as a handshake.
            if !same_room(leader.pos, leader_to) {
                self.ctx.rejections |= Rejections::EDGE;
                continue;
            }

            let crossing = is_edge(leader_to) && self.ctx.is_crossing_tile(leader_to, goal.pos, hint);
            let onto_goal = leader_to == goal.pos;

            if is_edge(leader_to) && !crossing && !onto_goal {
                self.ctx.rejections |= Rejections::EDGE;
                continue;
            }

            let swapping = leader_to == support.pos;

            if swapping && !self.formation.allow_swap {
                self.ctx.rejections |= Rejections::COLLISION;
                continue;
            }

            let checkpoint = self.ctx.ledger.checkpoint();

            if swapping {
                self.ctx.ledger.vacate(support.pos);
            }

            if let Err(rejection) = self.ctx.can_enter(&leader.id, leader_to) {
                self.ctx.rejections |= rejection;
                self.ctx.ledger.rollback(checkpoint);
                continue;
            }

            self.ctx.ledger.commit_move(leader.pos, leader_to);

            if crossing {
                // The support has to trail into the vacated tile this same tick.
                let trail = direction_to(support.pos, leader.pos)
                    .filter(|_| range(support.pos, leader.pos) == 1)
                    .and_then(|support_dir| {
                        self.ctx
                            .can_step(&support.id, support.pos, support_dir)
                            .ok()
                            .map(|support_to| (support_dir, support_to))
                    });

                match trail {
                    Some((support_dir, support_to)) => {
                        self.ctx.ledger.commit_move(support.pos, support_to);
                        self.ctx.designated.push(leader_to);
                        self.follow_cache(cache, Some(direction), leader_to);

                        let step = DuoStep {
                            leader_dir: Some(direction),
                            support_dir: Some(support_dir),
                            leader_to,
                            support_to,
                        };

                        return self.finish(true, PlanReason::CohesiveStep, PlanMode::CohesiveTravel, step);
                    }
                    None => {
                        self.ctx.rejections |= Rejections::PRE_CROSS;
                        self.ctx.ledger.rollback(checkpoint);

                        if let Some(result) = self.plan_shimmy(cache) {
                            return result;
                        }

                        continue;
                    }
                }
            }

            match self.place_support(direction, leader_to, swapping) {
                Some((support_dir, support_to)) => {
                    self.ctx.ledger.commit_move(support.pos, support_to);
                    self.follow_cache(cache, Some(direction), leader_to);

                    if is_edge(leader_to) {
                        self.ctx.designated.push(leader_to);
                    }

                    let step = DuoStep {
                        leader_dir: Some(direction),
                        support_dir,
                        leader_to,
                        support_to,
                    };

                    return self.finish(true, PlanReason::CohesiveStep, PlanMode::CohesiveTravel, step);
                }
                None => {
                    self.ctx.ledger.rollback(checkpoint);
                }
            }
        }

        self.follow_cache(cache, None, leader.pos);

        self.finish(false, PlanReason::NoValidStep, PlanMode::Hold, self.hold_step())
    }

    /// Leader holds on its tile while the support closes in.
    fn plan_shimmy(&mut self, cache: &mut DuoCache) -> Option<PlanResult> {
        let leader = self.leader;
        let support = self.support;

        let checkpoint = self.ctx.ledger.checkpoint();
        self.ctx.ledger.claim(leader.pos);

        let current = range(support.pos, leader.pos);

        for direction in greedy_directions(support.pos, leader.pos) {
            let to = step(support.pos, direction);

            if range(to, leader.pos) >= current {
                break;
            }

            if !same_room(to, leader.pos) || is_edge(to) {
                self.ctx.rejections |= Rejections::EDGE;
                continue;
            }

            match self.ctx.can_step(&support.id, support.pos, direction) {
                Ok(to) => {
                    self.ctx.ledger.commit_move(support.pos, to);
                    self.follow_cache(cache, None, leader.pos);

                    let step = self.pair_step(None, Some((direction, to)));

                    return Some(self.finish(true, PlanReason::PreCrossShimmy, PlanMode::CohesiveTravel, step));
                }
                Err(rejection) => self.ctx.rejections |= rejection,
            }
        }

        self.ctx.ledger.rollback(checkpoint);

        None
    }

    /// Trailing tiles for the support, in preference order for the configured offset.
    fn offset_targets(&mut self, heading: Direction, leader_to: Position) -> Vec<Position> {
        let behind = opposite(heading);

        let offsets = match self.formation.support_offset {
            SupportOffset::Behind => vec![behind],
            SupportOffset::Left => vec![rotate(behind, 1)],
            SupportOffset::Right => vec![rotate(behind, -1)],
            SupportOffset::Auto => {
                let mut ranked = Vec::new();

                for offset in [behind, rotate(behind, 1), rotate(behind, -1)] {
                    let target = step(leader_to, offset);
                    let open = self.ctx.open_space(target);

                    ranked.push((offset, open));
                }

                ranked.sort_by_key(|(_, open)| std::cmp::Reverse(*open));
                ranked.into_iter().map(|(offset, _)| offset).collect()
            }
        };

        offsets.into_iter().map(|offset| step(leader_to, offset)).collect()
    }

    /// Pick the support's tile for a leader moving in `heading` to `leader_to`.
    fn place_support(&mut self, heading: Direction, leader_to: Position, must_move: bool) -> Option<(Option<Direction>, Position)> {
        let support = self.support;

        for target in self.offset_targets(heading, leader_to) {
            let mut moves: Vec<(Option<Direction>, Position)> = vec![(None, support.pos)];
            moves.extend(DIRECTIONS.iter().map(|direction| (Some(*direction), step(support.pos, *direction))));
            moves.sort_by_key(|(_, to)| (range(*to, target), distance_sq(*to, target)));

            for (direction, to) in moves {
                if must_move && direction.is_none() {
                    continue;
                }

                if to == leader_to {
                    self.ctx.rejections |= Rejections::COLLISION;
                    continue;
                }

                if !self.is_cohesive(leader_to, to) {
                    self.ctx.rejections |= Rejections::COHESION;
                    continue;
                }

                if is_edge(to) && !self.ctx.designated.contains(&to) {
                    self.ctx.rejections |= Rejections::EDGE;
                    continue;
                }

                match direction {
                    Some(direction) => match self.ctx.can_step(&support.id, support.pos, direction) {
                        Ok(_) => return Some((Some(direction), to)),
                        Err(rejection) => self.ctx.rejections |= rejection,
                    },
                    None => {
                        if self.ctx.ledger.is_claimed(to) {
                            self.ctx.rejections |= Rejections::CLAIMED;
                        } else {
                            return Some((None, to));
                        }
                    }
                }
            }
        }

        None
    }
}
