mod common;

use common::*;
use screeps::*;
use screeps_duo::military::duocache::DuoPathCache;
use screeps_duo::pathing::routesearch::PackedPath;
use screeps_duo::pathing::tiles::*;
use screeps_duo::*;

// ─── Pair planner ────────────────────────────────────────────────────────────

#[test]
fn leader_steps_onto_crossing_tile_with_support_trailing() {
    let world = open_world(&["E1N1", "E2N1"]);
    let mut duo = DuoHarness::new(world, pos("E1N1", 48, 25), pos("E1N1", 47, 25));

    let result = duo.plan(DuoGoal::range(pos("E2N1", 1, 25), 1));
    let step = result.step.unwrap();

    assert!(result.ok);
    assert_eq!(result.mode, PlanMode::CohesiveTravel);
    assert_eq!(step.leader_dir, Some(Direction::Right));
    assert_eq!(step.leader_to, pos("E1N1", 49, 25));
    assert_eq!(step.support_dir, Some(Direction::Right));
    assert_eq!(step.support_to, pos("E1N1", 48, 25));
}

#[test]
fn distant_support_shimmies_before_crossing() {
    let world = open_world(&["E1N1", "E2N1"]);
    let mut duo = DuoHarness::new(world, pos("E1N1", 48, 25), pos("E1N1", 46, 25));
    duo.formation.cohesion_range = 3;

    let result = duo.plan(DuoGoal::range(pos("E2N1", 1, 25), 1));
    let step = result.step.unwrap();

    assert!(result.ok);
    assert_eq!(result.reason, PlanReason::PreCrossShimmy);
    assert_eq!(step.leader_dir, None);
    assert_eq!(step.leader_to, pos("E1N1", 48, 25));
    assert_eq!(step.support_to, pos("E1N1", 47, 25));
    assert!(result.rejections.contains(Rejections::PRE_CROSS));
}

#[test]
fn handshake_carries_pair_into_next_room() {
    let world = open_world(&["E1N1", "E2N1"]);
    let mut duo = DuoHarness::new(world, pos("E1N1", 48, 25), pos("E1N1", 47, 25));
    let goal = DuoGoal::range(pos("E2N1", 1, 25), 1);

    let approach = duo.advance(goal);
    assert_eq!(approach.reason, PlanReason::CohesiveStep);

    let handshake = duo.advance(goal);
    let step = handshake.step.unwrap();
    assert_eq!(handshake.mode, PlanMode::BorderHandshake);
    assert_eq!(step.leader_to, pos("E2N1", 0, 25));
    assert_eq!(step.support_to, pos("E1N1", 49, 25));
    assert_eq!(handshake.meta.path_index, Some(1));

    let follow = duo.advance(goal);
    let step = follow.step.unwrap();
    assert_eq!(follow.reason, PlanReason::SplitAdvance);
    assert_eq!(step.leader_to, pos("E2N1", 1, 25));
    assert_eq!(step.support_to, pos("E2N1", 0, 25));

    let settle = duo.advance(goal);
    assert_eq!(settle.reason, PlanReason::GoalReached);
    assert_eq!(duo.leader.pos, pos("E2N1", 1, 25));
    assert!(!is_edge(duo.support.pos));
    assert!(range(duo.leader.pos, duo.support.pos) <= 1);
}

#[test]
fn cached_path_is_followed_without_repathing() {
    let world = open_world(&["E1N1"]);
    let mut duo = DuoHarness::new(world, pos("E1N1", 10, 25), pos("E1N1", 9, 25));
    let goal = DuoGoal::occupy(pos("E1N1", 30, 25));

    duo.cache.path = Some(DuoPathCache::new(
        goal.key(),
        PackedPath {
            origin: pos("E1N1", 10, 25),
            directions: vec![Direction::Right; 10],
        },
        0,
    ));

    for expected_index in 0..3 {
        let result = duo.advance(goal);

        assert!(result.ok);
        assert!(result.meta.used_path);
        assert!(!result.meta.repathed);
        assert_eq!(result.meta.path_index, Some(expected_index));
    }

    assert_eq!(duo.leader.pos, pos("E1N1", 13, 25));
    assert_eq!(duo.support.pos, pos("E1N1", 12, 25));
}

#[test]
fn goal_change_invalidates_cached_path() {
    let world = open_world(&["E1N1"]);
    let mut duo = DuoHarness::new(world, pos("E1N1", 10, 25), pos("E1N1", 9, 25));

    duo.advance(DuoGoal::occupy(pos("E1N1", 30, 25)));
    let result = duo.advance(DuoGoal::occupy(pos("E1N1", 11, 40)));

    assert!(result.meta.repathed);
    assert_eq!(result.meta.path_index, Some(0));
}

#[test]
fn foreign_agent_on_cached_step_forces_recompute() {
    let world = open_world(&["E1N1"]);
    let mut duo = DuoHarness::new(world, pos("E1N1", 10, 25), pos("E1N1", 9, 25));
    let goal = DuoGoal::occupy(pos("E1N1", 30, 25));

    duo.cache.path = Some(DuoPathCache::new(
        goal.key(),
        PackedPath {
            origin: pos("E1N1", 10, 25),
            directions: vec![Direction::Right; 20],
        },
        0,
    ));

    duo.world.place_agent("stranger", pos("E1N1", 11, 25));

    let result = duo.plan(goal);
    let step = result.step.unwrap();

    assert!(result.ok);
    assert!(result.meta.repathed);
    assert_eq!(result.meta.path_index, Some(0));
    assert!(result.rejections.contains(Rejections::BLOCKED));
    assert_ne!(step.leader_to, pos("E1N1", 11, 25));
    assert_eq!(range(step.leader_to, pos("E1N1", 10, 25)), 1);

    let fresh = duo.cache.path.as_ref().unwrap();
    assert_ne!(fresh.path.get(0), Some(Direction::Right));
}

#[test]
fn pair_settles_on_arrival_tile_goal() {
    let world = open_world(&["E1N1", "E2N1"]);
    let mut duo = DuoHarness::new(world, pos("E1N1", 47, 25), pos("E1N1", 46, 25));
    let goal = DuoGoal::occupy(pos("E2N1", 0, 25));

    let mut reached = false;

    for _ in 0..20 {
        let result = duo.advance(goal);

        assert_ne!(result.reason, PlanReason::SplitRooms);

        if result.reason == PlanReason::GoalReached {
            reached = true;
            break;
        }
    }

    assert!(reached);
    assert_eq!(duo.leader.pos, goal.pos);
    assert!(same_room(duo.leader.pos, duo.support.pos));
    assert!(!is_edge(duo.support.pos));
}

#[test]
fn pair_split_across_rooms_meets_at_facing_exits() {
    let world = open_world(&["E1N1", "E2N1", "E3N1"]);
    let mut duo = DuoHarness::new(world, pos("E2N1", 5, 20), pos("E1N1", 40, 30));
    let goal = DuoGoal::occupy(pos("E3N1", 25, 25));

    let mut crossed = false;

    for _ in 0..40 {
        let before = (duo.leader.pos, duo.support.pos);
        let result = duo.advance(goal);

        if result.reason == PlanReason::AnchoredCrossing {
            crossed = true;
        }

        for (from, to) in [(before.0, duo.leader.pos), (before.1, duo.support.pos)] {
            if from != to && same_room(from, to) && is_edge(to) {
                assert!(
                    to == pos("E2N1", 0, 25) || to == pos("E1N1", 49, 25),
                    "stopped on edge tile {}",
                    describe(to)
                );
            }
        }

        if same_room(duo.leader.pos, duo.support.pos) {
            break;
        }
    }

    assert!(crossed);
    assert_eq!(duo.leader.pos.room_name(), room("E2N1"));
    assert_eq!(duo.support.pos.room_name(), room("E2N1"));
}

#[test]
fn pair_travels_across_rooms_to_goal() {
    let world = open_world(&["E1N1", "E2N1"]);
    let mut duo = DuoHarness::new(world, pos("E1N1", 10, 25), pos("E1N1", 9, 25));
    let goal = DuoGoal::range(pos("E2N1", 20, 20), 1);

    let mut reached = false;

    for _ in 0..150 {
        let result = duo.advance(goal);

        if result.mode == PlanMode::CohesiveTravel {
            assert!(range(duo.leader.pos, duo.support.pos) <= 1);
        }

        if result.reason == PlanReason::GoalReached {
            reached = true;
            break;
        }
    }

    assert!(reached);
    assert!(goal.is_satisfied_by(duo.leader.pos));
    assert!(same_room(duo.leader.pos, duo.support.pos));
}

// ─── Squad controller ────────────────────────────────────────────────────────

fn snapshot(id: &str, at: Position, hits: u32, label: Option<&str>) -> AgentSnapshot {
    let mut snapshot = AgentSnapshot::new(id, at);
    snapshot.hits = hits;
    snapshot.label = label.map(|label| label.to_owned());
    snapshot
}

fn mission(rally: Position) -> MissionDescriptor {
    let mut mission = MissionDescriptor::new("duo-1");
    mission.rally = Some(rally);
    mission
}

#[test]
fn wounded_pair_under_threat_scatters_to_rally() {
    let world = open_world(&["E1N1"]);
    let mut controller = SquadPhaseController::new(DuoFeatures::default());
    let mut actions = FixedActions { calls: 0 };
    let rally = pos("E1N1", 10, 25);

    let agents = [
        snapshot("a", pos("E1N1", 30, 10), 25, Some("tank")),
        snapshot("b", pos("E1N1", 30, 40), 90, Some("healer")),
    ];

    let output = controller.run_cycle(&world, &mut actions, &mission(rally), &agents, 2, 1);
    let plan = output.plan.clone().unwrap();

    assert_eq!(output.phase, SquadPhase::Retreat);
    assert_eq!(plan.mode, PlanMode::Scatter);
    assert_eq!(plan.reason, PlanReason::ScatteredRetreat);
    assert_eq!(output.roles, Some(RoleSource::Label));

    for agent in agents.iter() {
        let task = output.task_for(&agent.id).unwrap();

        assert!(task.movement.direction.is_some());
        assert!(task.movement.no_fallback_move);
        assert!(range(task.movement.destination, rally) < range(agent.pos, rally));
        assert_eq!(task.action.as_ref().and_then(|action| action.move_to), None);
    }

    assert_eq!(actions.calls, 2);
}

#[test]
fn retreat_starts_at_threshold_without_splitting() {
    let world = open_world(&["E1N1"]);
    let mut controller = SquadPhaseController::new(DuoFeatures::default());
    let mut actions = FixedActions { calls: 0 };

    let agents = [
        snapshot("a", pos("E1N1", 30, 30), 30, None),
        snapshot("b", pos("E1N1", 31, 30), 100, None),
    ];

    let output = controller.run_cycle(&world, &mut actions, &mission(pos("E1N1", 10, 10)), &agents, 0, 1);
    let plan = output.plan.clone().unwrap();

    assert_eq!(output.phase, SquadPhase::Retreat);
    assert_ne!(plan.mode, PlanMode::Scatter);
    assert!(plan.cohesive);
}

#[test]
fn recovering_pair_keeps_formation_while_retreating() {
    let world = open_world(&["E1N1"]);
    let mut controller = SquadPhaseController::new(DuoFeatures::default());
    let mut actions = FixedActions { calls: 0 };
    let mission = mission(pos("E1N1", 10, 10));

    let hurt = [
        snapshot("a", pos("E1N1", 30, 30), 25, None),
        snapshot("b", pos("E1N1", 31, 30), 100, None),
    ];

    let first = controller.run_cycle(&world, &mut actions, &mission, &hurt, 0, 1);
    assert_eq!(first.phase, SquadPhase::Retreat);

    let healing = [
        snapshot("a", pos("E1N1", 30, 30), 50, None),
        snapshot("b", pos("E1N1", 31, 30), 50, None),
    ];

    let second = controller.run_cycle(&world, &mut actions, &mission, &healing, 2, 2);
    let plan = second.plan.clone().unwrap();

    assert_eq!(second.phase, SquadPhase::Retreat);
    assert_ne!(plan.mode, PlanMode::Scatter);
    assert_ne!(plan.reason, PlanReason::ScatteredRetreat);
    assert!(plan.cohesive);
}

#[test]
fn roles_stay_put_across_cycles() {
    let world = open_world(&["E1N1"]);
    let mut controller = SquadPhaseController::new(DuoFeatures::default());
    let mut actions = FixedActions { calls: 0 };
    let mission = mission(pos("E1N1", 10, 10));
    let key = SquadKey::from("duo-1");

    let a = snapshot("a", pos("E1N1", 21, 20), 100, None);
    let mut b = snapshot("b", pos("E1N1", 20, 20), 100, None);

    let first = controller.run_cycle(&world, &mut actions, &mission, &[b.clone(), a.clone()], 0, 1);
    assert_eq!(first.roles, Some(RoleSource::IdentityOrder));
    assert_eq!(controller.store().get(&key).unwrap().leader_id, Some(AgentId::from("a")));

    let second = controller.run_cycle(&world, &mut actions, &mission, &[a.clone(), b.clone()], 0, 2);
    assert_eq!(second.roles, Some(RoleSource::Recorded));
    assert_eq!(controller.store().get(&key).unwrap().leader_id, Some(AgentId::from("a")));

    b.role = Some(DuoRole::Leader);

    let third = controller.run_cycle(&world, &mut actions, &mission, &[a, b], 0, 3);
    assert_eq!(third.roles, Some(RoleSource::Tag));
    assert_eq!(controller.store().get(&key).unwrap().leader_id, Some(AgentId::from("b")));
}

#[test]
fn wipe_resets_only_after_ttl() {
    let world = open_world(&["E1N1"]);
    let mut controller = SquadPhaseController::new(DuoFeatures::default());
    let mut actions = FixedActions { calls: 0 };
    let rally = pos("E1N1", 20, 20);
    let mission = mission(rally);
    let key = SquadKey::from("duo-1");

    let at_rally = [
        snapshot("a", pos("E1N1", 20, 20), 100, None),
        snapshot("b", pos("E1N1", 21, 20), 100, None),
    ];

    let assembled = controller.run_cycle(&world, &mut actions, &mission, &at_rally, 0, 1);
    assert_eq!(assembled.phase, SquadPhase::Engage);
    assert!(controller.store().get(&key).unwrap().assembled.done);

    // Gone for exactly the ttl: the squad picks up where it left off.
    let missing = controller.run_cycle(&world, &mut actions, &mission, &[], 0, 2);
    assert!(missing.tasks.is_empty());
    assert!(controller.store().get(&key).unwrap().spawn.allow);

    let back = controller.run_cycle(&world, &mut actions, &mission, &at_rally, 0, 17);
    assert_eq!(back.phase, SquadPhase::Engage);
    assert_eq!(controller.store().get(&key).unwrap().wipe.last_full_missing_at, None);

    // Gone for longer: everything is rebuilt.
    controller.run_cycle(&world, &mut actions, &mission, &[], 0, 18);

    let away = [
        snapshot("c", pos("E1N1", 40, 40), 100, None),
        snapshot("d", pos("E1N1", 41, 40), 100, None),
    ];

    let rebuilt = controller.run_cycle(&world, &mut actions, &mission, &away, 0, 40);
    let runtime = controller.store().get(&key).unwrap();

    assert_eq!(rebuilt.phase, SquadPhase::Assemble);
    assert!(!runtime.assembled.done);
    assert_eq!(runtime.leader_id, Some(AgentId::from("c")));
}

#[test]
fn wipe_expires_while_still_absent() {
    let world = open_world(&["E1N1"]);
    let mut controller = SquadPhaseController::new(DuoFeatures::default());
    let mut actions = FixedActions { calls: 0 };
    let mission = mission(pos("E1N1", 20, 20));
    let key = SquadKey::from("duo-1");

    controller.store_mut().get_or_create(&key).phase = SquadPhase::Engage;

    controller.run_cycle(&world, &mut actions, &mission, &[], 0, 100);
    controller.run_cycle(&world, &mut actions, &mission, &[], 0, 115);
    assert_eq!(controller.store().get(&key).unwrap().phase, SquadPhase::Engage);

    controller.run_cycle(&world, &mut actions, &mission, &[], 0, 116);
    let runtime = controller.store().get(&key).unwrap();

    assert_eq!(runtime.phase, SquadPhase::Assemble);
    assert!(runtime.spawn.allow);
}

#[test]
fn lone_survivor_falls_back_to_rally() {
    let world = open_world(&["E1N1"]);
    let mut controller = SquadPhaseController::new(DuoFeatures::default());
    let mut actions = FixedActions { calls: 0 };
    let rally = pos("E1N1", 20, 20);
    let mission = mission(rally);
    let key = SquadKey::from("duo-1");

    let pair = [
        snapshot("a", pos("E1N1", 20, 20), 100, None),
        snapshot("b", pos("E1N1", 21, 20), 100, None),
    ];

    controller.run_cycle(&world, &mut actions, &mission, &pair, 0, 1);
    assert_eq!(controller.store().get(&key).unwrap().phase, SquadPhase::Engage);

    let calls_before = actions.calls;
    let survivor = [snapshot("a", pos("E1N1", 30, 20), 100, None)];
    let output = controller.run_cycle(&world, &mut actions, &mission, &survivor, 0, 2);
    let solo = output.solo.unwrap();
    let runtime = controller.store().get(&key).unwrap();

    assert_eq!(output.phase, SquadPhase::Assemble);
    assert!(runtime.spawn.allow);
    assert!(!runtime.assembled.done);
    assert!(solo.ok);
    assert_eq!(solo.reason, PlanReason::SoloStep);
    assert_eq!(solo.direction, Some(Direction::Left));
    assert_eq!(output.tasks.len(), 1);
    assert_eq!(actions.calls, calls_before);
}
