use crate::identifiers::AgentId;
use crate::pathing::tiles::*;
use bitflags::*;
use screeps::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a member plays within the pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DuoRole {
    Leader,
    Support,
}

/// Snapshot of one member of the pair as the planner sees it this tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuoAgent {
    pub id: AgentId,
    pub pos: Position,
    pub hits: u32,
    pub hits_max: u32,
    /// Movement penalty. Non-zero means the agent cannot move this tick.
    pub fatigue: u32,
    pub role: Option<DuoRole>,
}

impl DuoAgent {
    pub fn new(id: impl Into<AgentId>, pos: Position) -> DuoAgent {
        DuoAgent {
            id: id.into(),
            pos,
            hits: 100,
            hits_max: 100,
            fatigue: 0,
            role: None,
        }
    }

    pub fn health_ratio(&self) -> f32 {
        if self.hits_max == 0 {
            return 0.0;
        }

        self.hits as f32 / self.hits_max as f32
    }

    pub fn is_fatigued(&self) -> bool {
        self.fatigue > 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalKind {
    /// Stand on the exact tile.
    Occupy,
    /// Be within the given range of the tile.
    Range(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuoGoal {
    pub pos: Position,
    pub kind: GoalKind,
}

impl DuoGoal {
    pub fn occupy(pos: Position) -> DuoGoal {
        DuoGoal { pos, kind: GoalKind::Occupy }
    }

    pub fn range(pos: Position, range: u32) -> DuoGoal {
        DuoGoal {
            pos,
            kind: GoalKind::Range(range),
        }
    }

    pub fn goal_range(&self) -> u32 {
        match self.kind {
            GoalKind::Occupy => 0,
            GoalKind::Range(range) => range,
        }
    }

    pub fn is_satisfied_by(&self, pos: Position) -> bool {
        match self.kind {
            GoalKind::Occupy => pos == self.pos,
            GoalKind::Range(goal_range) => range(pos, self.pos) <= goal_range,
        }
    }

    /// Stable key used to detect goal changes between ticks.
    pub fn key(&self) -> String {
        let kind = match self.kind {
            GoalKind::Occupy => "occupy".to_owned(),
            GoalKind::Range(range) => format!("range{}", range),
        };

        format!("{}:{}", describe(self.pos), kind)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanMode {
    Hold,
    Regroup,
    CohesiveTravel,
    BorderHandshake,
    /// Members travel independently; only used when splitting is permitted.
    Scatter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanReason {
    MissingInput,
    SplitRooms,
    RegroupBlocked,
    NoValidStep,
    Fatigue,
    GoalReached,
    CohesiveStep,
    BorderHandshake,
    PreCrossShimmy,
    RegroupStep,
    SplitAdvance,
    AnchoredCrossing,
    ScatteredRetreat,
    SoloStep,
}

impl PlanReason {
    pub fn code(&self) -> &'static str {
        match self {
            PlanReason::MissingInput => "missing-input",
            PlanReason::SplitRooms => "split-rooms",
            PlanReason::RegroupBlocked => "regroup-blocked",
            PlanReason::NoValidStep => "no-valid-step",
            PlanReason::Fatigue => "fatigue",
            PlanReason::GoalReached => "goal-reached",
            PlanReason::CohesiveStep => "cohesive-step",
            PlanReason::BorderHandshake => "border-handshake",
            PlanReason::PreCrossShimmy => "pre-cross-shimmy",
            PlanReason::RegroupStep => "regroup-step",
            PlanReason::SplitAdvance => "split-advance",
            PlanReason::AnchoredCrossing => "anchored-crossing",
            PlanReason::ScatteredRetreat => "scattered-retreat",
            PlanReason::SoloStep => "solo-step",
        }
    }
}

impl fmt::Display for PlanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

bitflags! {
    /// Why candidate steps were thrown away while planning. Diagnostic only.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Rejections: u16 {
        const BLOCKED   = 1;
        const COLLISION = 1 << 1;
        const COHESION  = 1 << 2;
        const EDGE      = 1 << 3;
        const PRE_CROSS = 1 << 4;
        const CLAIMED   = 1 << 5;
        const FATIGUE   = 1 << 6;
        const NO_PATH   = 1 << 7;
    }
}

impl Rejections {
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "-".to_owned();
        }

        self.iter_names()
            .map(|(name, _)| name.to_lowercase())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// One tick of movement for the pair. `None` directions mean "stay".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DuoStep {
    pub leader_dir: Option<Direction>,
    pub support_dir: Option<Direction>,
    pub leader_to: Position,
    pub support_to: Position,
}

impl DuoStep {
    pub fn hold(leader: Position, support: Position) -> DuoStep {
        DuoStep {
            leader_dir: None,
            support_dir: None,
            leader_to: leader,
            support_to: support,
        }
    }

    pub fn is_hold(&self) -> bool {
        self.leader_dir.is_none() && self.support_dir.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlanMeta {
    pub goal_key: Option<String>,
    pub used_path: bool,
    pub path_index: Option<usize>,
    pub stalled_ticks: u32,
    pub repathed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlanResult {
    pub ok: bool,
    pub reason: PlanReason,
    pub mode: PlanMode,
    pub cohesive: bool,
    pub same_zone: bool,
    pub distance: u32,
    /// `None` only when inputs were missing.
    pub step: Option<DuoStep>,
    pub meta: PlanMeta,
    pub rejections: Rejections,
}

impl PlanResult {
    pub fn missing_input() -> PlanResult {
        PlanResult {
            ok: false,
            reason: PlanReason::MissingInput,
            mode: PlanMode::Hold,
            cohesive: false,
            same_zone: false,
            distance: 0,
            step: None,
            meta: PlanMeta::default(),
            rejections: Rejections::empty(),
        }
    }
}

/// Single-agent outcome, used when one member of the pair is missing.
#[derive(Clone, Debug, PartialEq)]
pub struct SoloPlan {
    pub ok: bool,
    pub reason: PlanReason,
    pub direction: Option<Direction>,
    pub to: Position,
    pub rejections: Rejections,
}
