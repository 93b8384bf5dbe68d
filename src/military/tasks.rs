use super::duo::*;
use super::squadruntime::SquadPhase;
use crate::identifiers::*;
use screeps::*;
use serde::{Deserialize, Serialize};

/// What the squad has been sent to do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissionDescriptor {
    pub squad_key: SquadKey,
    pub rally: Option<Position>,
    pub waypoints: Vec<Position>,
    pub attack: Option<Position>,
}

impl MissionDescriptor {
    pub fn new(squad_key: impl Into<SquadKey>) -> MissionDescriptor {
        MissionDescriptor {
            squad_key: squad_key.into(),
            rally: None,
            waypoints: Vec::new(),
            attack: None,
        }
    }
}

/// Host view of one squad member this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub pos: Position,
    pub hits: u32,
    pub hits_max: u32,
    pub fatigue: u32,
    /// Role recorded on the agent itself, if any.
    pub role: Option<DuoRole>,
    /// Free-form assignment label, e.g. the body template it was spawned from.
    pub label: Option<String>,
}

impl AgentSnapshot {
    pub fn new(id: impl Into<AgentId>, pos: Position) -> AgentSnapshot {
        AgentSnapshot {
            id: id.into(),
            pos,
            hits: 100,
            hits_max: 100,
            fatigue: 0,
            role: None,
            label: None,
        }
    }

    pub fn to_agent(&self, role: DuoRole) -> DuoAgent {
        DuoAgent {
            id: self.id.clone(),
            pos: self.pos,
            hits: self.hits,
            hits_max: self.hits_max,
            fatigue: self.fatigue,
            role: Some(role),
        }
    }
}

/// Non-movement work chosen by the host for an agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionStub {
    pub kind: String,
    pub target: Option<Position>,
    /// Generic move request from the host. Always dropped in favour of the pair step.
    pub move_to: Option<Position>,
}

impl ActionStub {
    pub fn new(kind: impl Into<String>) -> ActionStub {
        ActionStub {
            kind: kind.into(),
            target: None,
            move_to: None,
        }
    }
}

/// Supplies combat/heal actions; the squad only owns movement.
pub trait ActionPlanner {
    fn plan_action(&mut self, agent: &AgentSnapshot, role: DuoRole, phase: SquadPhase) -> Option<ActionStub>;
}

/// Primitive movement for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveOrder {
    /// `None` means stay put.
    pub direction: Option<Direction>,
    pub destination: Position,
    /// The host must not substitute a generic move-toward when the step fails.
    pub no_fallback_move: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedTask {
    pub agent_id: AgentId,
    pub action: Option<ActionStub>,
    pub movement: MoveOrder,
}

impl MergedTask {
    pub fn merge(agent_id: AgentId, action: Option<ActionStub>, direction: Option<Direction>, destination: Position) -> MergedTask {
        let action = action.map(|mut stub| {
            stub.move_to = None;
            stub
        });

        MergedTask {
            agent_id,
            action,
            movement: MoveOrder {
                direction,
                destination,
                no_fallback_move: true,
            },
        }
    }
}
