#![warn(clippy::all)]

pub mod features;
pub mod identifiers;
pub mod logging;
pub mod military;
pub mod pathing;
pub mod serialize;

pub use features::DuoFeatures;
pub use identifiers::{AgentId, SquadKey};
pub use military::duo::{DuoAgent, DuoGoal, DuoRole, DuoStep, PlanMode, PlanReason, PlanResult, Rejections, SoloPlan};
pub use military::duocache::DuoCache;
pub use military::duoplanner::{DuoPlanRequest, DuoPlanner};
pub use military::roles::{resolve_roles, RoleResolution, RoleSource};
pub use military::squadphase::{SquadCycleOutput, SquadPhaseController};
pub use military::squadruntime::{SquadPhase, SquadRuntime, SquadRuntimeStore};
pub use military::tasks::{ActionPlanner, ActionStub, AgentSnapshot, MergedTask, MissionDescriptor, MoveOrder};
pub use pathing::world::{StaticWorld, ZoneDataSource};
