#![allow(dead_code)]

use screeps::*;
use screeps_duo::features::*;
use screeps_duo::military::duoplanner::*;
use screeps_duo::*;

pub fn room(name: &str) -> RoomName {
    RoomName::new(name).unwrap()
}

pub fn pos(room_name: &str, x: u8, y: u8) -> Position {
    Position::new(RoomCoordinate::new(x).unwrap(), RoomCoordinate::new(y).unwrap(), room(room_name))
}

pub fn open_world(rooms: &[&str]) -> StaticWorld {
    let mut world = StaticWorld::new();

    for room_name in rooms {
        world.add_room(room(room_name));
    }

    world
}

/// A leader/support pair walking around a static world, one planner call per tick.
pub struct DuoHarness {
    pub world: StaticWorld,
    pub leader: DuoAgent,
    pub support: DuoAgent,
    pub cache: DuoCache,
    pub formation: FormationConfig,
    pub movement: MovementConfig,
    pub tick: u32,
}

impl DuoHarness {
    pub fn new(world: StaticWorld, leader: Position, support: Position) -> DuoHarness {
        let mut harness = DuoHarness {
            world,
            leader: DuoAgent::new("leader", leader),
            support: DuoAgent::new("support", support),
            cache: DuoCache::default(),
            formation: FormationConfig::default(),
            movement: MovementConfig::default(),
            tick: 1,
        };

        harness.sync_world();
        harness
    }

    fn sync_world(&mut self) {
        self.world.place_agent(self.leader.id.clone(), self.leader.pos);
        self.world.place_agent(self.support.id.clone(), self.support.pos);
    }

    /// Plan the current tick without moving anyone.
    pub fn plan(&mut self, goal: DuoGoal) -> PlanResult {
        let planner = DuoPlanner::new(&self.world, SearchConfig::default());

        let request = DuoPlanRequest {
            leader: Some(&self.leader),
            support: Some(&self.support),
            goal: Some(goal),
            formation: self.formation,
            movement: self.movement,
            tick: self.tick,
        };

        planner.plan(&request, &mut self.cache)
    }

    /// Move both agents to where the step puts them and advance the clock.
    pub fn apply(&mut self, step: &DuoStep) {
        self.leader.pos = step.leader_to;
        self.support.pos = step.support_to;
        self.tick += 1;

        self.sync_world();
    }

    /// Plan and apply one tick.
    pub fn advance(&mut self, goal: DuoGoal) -> PlanResult {
        let result = self.plan(goal);

        if let Some(step) = result.step {
            self.apply(&step);
        } else {
            self.tick += 1;
        }

        result
    }
}

/// Hands every agent a fixed action, asking it to move somewhere the squad never goes.
pub struct FixedActions {
    pub calls: usize,
}

impl ActionPlanner for FixedActions {
    fn plan_action(&mut self, agent: &AgentSnapshot, role: DuoRole, _phase: SquadPhase) -> Option<ActionStub> {
        self.calls += 1;

        let mut stub = ActionStub::new(match role {
            DuoRole::Leader => "attack",
            DuoRole::Support => "heal",
        });

        stub.target = Some(agent.pos);
        stub.move_to = Some(pos("E9N9", 25, 25));

        Some(stub)
    }
}
