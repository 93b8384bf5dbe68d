use super::duo::*;
use super::duoplanner::*;
use super::roles::*;
use super::squadruntime::*;
use super::tasks::*;
use crate::features::*;
use crate::identifiers::AgentId;
use crate::pathing::tiles::*;
use crate::pathing::world::ZoneDataSource;
use itertools::Itertools;
use log::*;
use screeps::*;

/// What one squad produced this tick.
#[derive(Clone, Debug)]
pub struct SquadCycleOutput {
    pub phase: SquadPhase,
    pub tasks: Vec<MergedTask>,
    pub plan: Option<PlanResult>,
    pub solo: Option<SoloPlan>,
    pub roles: Option<RoleSource>,
}

impl SquadCycleOutput {
    fn idle(phase: SquadPhase) -> SquadCycleOutput {
        SquadCycleOutput {
            phase,
            tasks: Vec::new(),
            plan: None,
            solo: None,
            roles: None,
        }
    }

    pub fn task_for(&self, id: &AgentId) -> Option<&MergedTask> {
        self.tasks.iter().find(|task| &task.agent_id == id)
    }
}

/// Drives each squad's phase machine and turns planner output into per-agent tasks.
pub struct SquadPhaseController {
    features: DuoFeatures,
    store: SquadRuntimeStore,
}

impl SquadPhaseController {
    pub fn new(features: DuoFeatures) -> SquadPhaseController {
        SquadPhaseController::with_store(features, SquadRuntimeStore::new())
    }

    pub fn with_store(features: DuoFeatures, store: SquadRuntimeStore) -> SquadPhaseController {
        SquadPhaseController { features, store }
    }

    pub fn features(&self) -> &DuoFeatures {
        &self.features
    }

    pub fn store(&self) -> &SquadRuntimeStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SquadRuntimeStore {
        &mut self.store
    }

    /// Run one decision cycle for a squad. `agents` holds whichever members are alive.
    pub fn run_cycle(
        &mut self,
        world: &dyn ZoneDataSource,
        actions: &mut dyn ActionPlanner,
        mission: &MissionDescriptor,
        agents: &[AgentSnapshot],
        threat: u8,
        tick: u32,
    ) -> SquadCycleOutput {
        let features = self.features;
        let key = &mission.squad_key;

        if agents.is_empty() {
            let runtime = self.store.get_or_create(key);

            if runtime.wipe.last_full_missing_at.is_none() {
                info!("Squad {} has no members, starting wipe countdown", key);

                runtime.wipe.last_full_missing_at = Some(tick);
            } else if runtime.wipe_expired(tick, features.phase.wipe_ttl) {
                info!("Squad {} wiped, resetting runtime", key);

                self.store.reset(key);
            }

            let runtime = self.store.get_or_create(key);
            runtime.spawn.allow = true;

            return SquadCycleOutput::idle(runtime.phase);
        }

        let runtime = self.store.get_or_create(key);

        if runtime.wipe_expired(tick, features.phase.wipe_ttl) {
            info!("Squad {} returned after a wipe, resetting runtime", key);

            *runtime = SquadRuntime::default();
        }

        runtime.wipe.last_full_missing_at = None;

        let planner = DuoPlanner::new(world, features.search);

        match agents {
            [agent] => run_solo(&features, &planner, runtime, actions, mission, agent, threat, tick),
            [first, second, ..] => run_pair(&features, &planner, runtime, actions, mission, first, second, threat, tick),
            [] => SquadCycleOutput::idle(runtime.phase),
        }
    }
}

/// Whether any of the agents is at or below the retreat threshold.
pub fn critically_wounded(features: &DuoFeatures, agents: &[&DuoAgent]) -> bool {
    agents.iter().any(|agent| agent.health_ratio() <= features.phase.retreat_ratio)
}

/// Formation and movement settings for the current phase and threat. `critical`
/// is set while an agent is still at or below the retreat threshold.
pub fn configs_for(features: &DuoFeatures, phase: SquadPhase, threat: u8, critical: bool) -> (FormationConfig, MovementConfig) {
    let mut formation = features.formation;
    let mut movement = features.movement;

    let elevated = threat >= features.phase.elevated_threat;
    let retreating = phase == SquadPhase::Retreat;

    if retreating || elevated {
        formation.cohesion_range = formation.cohesion_range.max(features.phase.threat_cohesion_range);
    }

    // Getting out alive matters more than staying together.
    if retreating && elevated && critical {
        formation.cohesion_range = UNBOUNDED_COHESION;
        movement.allow_split = true;
    }

    (formation, movement)
}

fn near(pos: Position, target: Position, within: u32) -> bool {
    range(pos, target) <= within
}

fn both_near(leader: &DuoAgent, support: &DuoAgent, target: Position, within: u32) -> bool {
    near(leader.pos, target, within) && near(support.pos, target, within)
}

fn within_cohesion(leader: &DuoAgent, support: &DuoAgent, formation: &FormationConfig) -> bool {
    same_room(leader.pos, support.pos) && range(leader.pos, support.pos) <= formation.cohesion_range
}

/// Route while waypoints remain, otherwise Engage.
fn phase_after_route(runtime: &SquadRuntime, mission: &MissionDescriptor) -> SquadPhase {
    if runtime.route.waypoint_index < mission.waypoints.len() {
        SquadPhase::Route
    } else {
        SquadPhase::Engage
    }
}

fn advance_phase(
    features: &DuoFeatures,
    runtime: &mut SquadRuntime,
    mission: &MissionDescriptor,
    leader: &DuoAgent,
    support: &DuoAgent,
    threat: u8,
    tick: u32,
) {
    let thresholds = &features.phase;
    let previous = runtime.phase;

    let wounded = critically_wounded(features, &[leader, support]);

    if wounded && runtime.phase != SquadPhase::Retreat {
        runtime.phase = SquadPhase::Retreat;
    }

    let (formation, _) = configs_for(features, runtime.phase, threat, wounded);
    let cohesive = within_cohesion(leader, support, &formation);

    match runtime.phase {
        SquadPhase::Assemble => {
            let at_rally = mission
                .rally
                .map(|rally| both_near(leader, support, rally, thresholds.rally_range))
                .unwrap_or(true);

            if at_rally && cohesive {
                runtime.assembled.done = true;
                runtime.assembled.at = Some(tick);
                runtime.assembled.pos = Some(leader.pos);
                runtime.route.waypoint_index = 0;
                runtime.phase = phase_after_route(runtime, mission);
            }
        }
        SquadPhase::Route => {
            if let Some(waypoint) = mission.waypoints.get(runtime.route.waypoint_index) {
                if cohesive && both_near(leader, support, *waypoint, thresholds.waypoint_range) {
                    runtime.route.waypoint_index += 1;
                }
            }

            runtime.phase = phase_after_route(runtime, mission);
        }
        SquadPhase::Engage => {}
        SquadPhase::Retreat => {
            let recovered = leader.health_ratio() >= thresholds.reengage_ratio && support.health_ratio() >= thresholds.reengage_ratio;

            let at_rally = mission
                .rally
                .map(|rally| both_near(leader, support, rally, thresholds.rally_range))
                .unwrap_or(true);

            if recovered && at_rally {
                runtime.phase = phase_after_route(runtime, mission);
            }
        }
    }

    if runtime.phase != previous {
        info!("Squad {} phase {:?} -> {:?}", mission.squad_key, previous, runtime.phase);
    }
}

/// Where the squad is heading in its current phase.
fn goal_for(features: &DuoFeatures, runtime: &SquadRuntime, mission: &MissionDescriptor, anchor: Position) -> DuoGoal {
    let thresholds = &features.phase;
    let rally = mission.rally.map(|rally| DuoGoal::range(rally, thresholds.rally_range));
    let hold = DuoGoal::occupy(anchor);

    match runtime.phase {
        SquadPhase::Assemble => rally.unwrap_or(hold),
        SquadPhase::Route => mission
            .waypoints
            .get(runtime.route.waypoint_index)
            .map(|waypoint| DuoGoal::range(*waypoint, thresholds.waypoint_range))
            .or(rally)
            .unwrap_or(hold),
        SquadPhase::Engage => mission
            .attack
            .map(|attack| DuoGoal::range(attack, thresholds.engage_range))
            .or_else(|| mission.waypoints.last().map(|waypoint| DuoGoal::range(*waypoint, thresholds.waypoint_range)))
            .or(rally)
            .unwrap_or(hold),
        SquadPhase::Retreat => rally
            .or_else(|| runtime.assembled.pos.map(|pos| DuoGoal::range(pos, thresholds.rally_range)))
            .unwrap_or(hold),
    }
}

fn actions_suppressed(runtime: &SquadRuntime) -> bool {
    matches!(runtime.phase, SquadPhase::Assemble | SquadPhase::Route) || runtime.regroup
}

#[allow(clippy::too_many_arguments)]
fn run_pair(
    features: &DuoFeatures,
    planner: &DuoPlanner,
    runtime: &mut SquadRuntime,
    actions: &mut dyn ActionPlanner,
    mission: &MissionDescriptor,
    first: &AgentSnapshot,
    second: &AgentSnapshot,
    threat: u8,
    tick: u32,
) -> SquadCycleOutput {
    let resolution = resolve_roles(first, second, runtime.leader_id.as_ref(), runtime.support_id.as_ref());

    if runtime.leader_id.as_ref() != Some(&resolution.leader.id) {
        debug!(
            "Squad {} leader is {} ({:?})",
            mission.squad_key, resolution.leader.id, resolution.source
        );
    }

    runtime.leader_id = Some(resolution.leader.id.clone());
    runtime.support_id = Some(resolution.support.id.clone());
    runtime.spawn.allow = false;

    let leader = resolution.leader.to_agent(DuoRole::Leader);
    let support = resolution.support.to_agent(DuoRole::Support);

    advance_phase(features, runtime, mission, &leader, &support, threat, tick);

    let critical = critically_wounded(features, &[&leader, &support]);
    let (formation, movement) = configs_for(features, runtime.phase, threat, critical);
    let goal = goal_for(features, runtime, mission, leader.pos);

    let request = DuoPlanRequest {
        leader: Some(&leader),
        support: Some(&support),
        goal: Some(goal),
        formation,
        movement,
        tick,
    };

    let plan = planner.plan(&request, &mut runtime.cache);

    runtime.regroup = plan.mode == PlanMode::Regroup;

    let step = plan.step.unwrap_or_else(|| DuoStep::hold(leader.pos, support.pos));
    let suppressed = actions_suppressed(runtime);

    let mut request_action = |snapshot: &AgentSnapshot, role: DuoRole| {
        if suppressed {
            None
        } else {
            actions.plan_action(snapshot, role, runtime.phase)
        }
    };

    let leader_action = request_action(resolution.leader, DuoRole::Leader);
    let support_action = request_action(resolution.support, DuoRole::Support);

    let tasks = vec![
        MergedTask::merge(leader.id.clone(), leader_action, step.leader_dir, step.leader_to),
        MergedTask::merge(support.id.clone(), support_action, step.support_dir, step.support_to),
    ];

    info!(
        "squad={} phase={:?} mode={:?} reason={} ok={} cohesion={} cohesive={} distance={} positions=[{}] steps=[{}] rejections={}",
        mission.squad_key,
        runtime.phase,
        plan.mode,
        plan.reason,
        plan.ok,
        describe_cohesion(&formation),
        plan.cohesive,
        plan.distance,
        [leader.pos, support.pos].iter().map(|pos| describe(*pos)).join(","),
        [step.leader_dir, step.support_dir]
            .iter()
            .map(|direction| direction.map(|d| format!("{:?}", d)).unwrap_or_else(|| "-".to_owned()))
            .join(","),
        plan.rejections.describe()
    );

    SquadCycleOutput {
        phase: runtime.phase,
        tasks,
        plan: Some(plan),
        solo: None,
        roles: Some(resolution.source),
    }
}

fn describe_cohesion(formation: &FormationConfig) -> String {
    if formation.is_unbounded() {
        "unbounded".to_owned()
    } else {
        formation.cohesion_range.to_string()
    }
}

/// The partner is gone: fall back to the rally point and ask for a replacement.
#[allow(clippy::too_many_arguments)]
fn run_solo(
    features: &DuoFeatures,
    planner: &DuoPlanner,
    runtime: &mut SquadRuntime,
    actions: &mut dyn ActionPlanner,
    mission: &MissionDescriptor,
    snapshot: &AgentSnapshot,
    threat: u8,
    tick: u32,
) -> SquadCycleOutput {
    let role = resolve_single(snapshot, runtime.leader_id.as_ref(), runtime.support_id.as_ref());
    let agent = snapshot.to_agent(role);
    let previous = runtime.phase;

    runtime.spawn.allow = true;
    runtime.regroup = false;
    runtime.cache = Default::default();

    match runtime.phase {
        SquadPhase::Route | SquadPhase::Engage => {
            runtime.phase = SquadPhase::Assemble;
            runtime.assembled = AssembledState::default();
        }
        SquadPhase::Retreat if agent.health_ratio() >= features.phase.reengage_ratio => {
            runtime.phase = SquadPhase::Assemble;
            runtime.assembled = AssembledState::default();
        }
        _ => {}
    }

    if agent.health_ratio() <= features.phase.retreat_ratio {
        runtime.phase = SquadPhase::Retreat;
    }

    if runtime.phase != previous {
        info!("Squad {} lost a member, phase {:?} -> {:?}", mission.squad_key, previous, runtime.phase);
    }

    let (_, movement) = configs_for(features, runtime.phase, threat, critically_wounded(features, &[&agent]));
    let rally = mission
        .rally
        .or(runtime.assembled.pos)
        .map(|rally| DuoGoal::range(rally, features.phase.rally_range))
        .unwrap_or_else(|| DuoGoal::occupy(agent.pos));

    let solo = planner.plan_solo(&agent, &rally, &movement, tick);

    let action = if actions_suppressed(runtime) {
        None
    } else {
        actions.plan_action(snapshot, role, runtime.phase)
    };

    info!(
        "squad={} phase={:?} mode=solo reason={} ok={} position={} step={} rejections={}",
        mission.squad_key,
        runtime.phase,
        solo.reason,
        solo.ok,
        describe(agent.pos),
        solo.direction.map(|d| format!("{:?}", d)).unwrap_or_else(|| "-".to_owned()),
        solo.rejections.describe()
    );

    SquadCycleOutput {
        phase: runtime.phase,
        tasks: vec![MergedTask::merge(agent.id.clone(), action, solo.direction, solo.to)],
        plan: None,
        solo: Some(solo),
        roles: None,
    }
}
