use glam::Vec3;

use crate::bvh::{Aabb, Collider};
use crate::config::RollbackConfig;
use crate::error::RollbackError;
use crate::frame::Frame;
use crate::group::{ManagerId, Phase, RestoreOutcome, RollbackSystemGroup, TickInput};
use crate::object::TrackedObject;
use crate::payload::Payload;
use crate::world::{LiveStore, World};

#[derive(Clone, Debug, Default, PartialEq, Payload)]
struct Health(i32);

fn config(max_frame_count: u32) -> RollbackConfig {
    RollbackConfig {
        max_frame_count,
        initial_capacity: 8,
        worker_threads: 2,
        ..RollbackConfig::default()
    }
}

fn group(max_frame_count: u32) -> (RollbackSystemGroup<World>, ManagerId) {
    let mut group = RollbackSystemGroup::new(config(max_frame_count)).unwrap();
    let id = group.add_manager();
    group
        .manager_mut(id)
        .unwrap()
        .register_field::<Health>()
        .unwrap();
    (group, id)
}

fn live(world: &World) -> Vec<TrackedObject> {
    world.objects().into_iter().map(TrackedObject::alive).collect()
}

#[test]
fn test_invalid_config_rejected() {
    let result = RollbackSystemGroup::<World>::new(config(0));
    assert!(matches!(result, Err(RollbackError::InvalidConfig(_))));
}

#[test]
fn test_ticks_advance_and_return_to_idle() {
    let (mut group, id) = group(8);
    let mut world = World::new();
    let e = world.spawn();
    world.set(e, Health(10));

    for f in 0..3 {
        let query = live(&world);
        let report = group.update(&mut world, TickInput::new(&query));
        assert_eq!(report.frame, Frame(f));
        assert_eq!(report.next_frame, Frame(f + 1));
        assert_eq!(report.saves[0].captured, 1);
        assert!(report.restore.is_none());
        assert_eq!(group.phase(), Phase::Idle);
    }

    let manager = group.manager(id).unwrap();
    assert_eq!(
        manager.recorded_frames(group.window()),
        vec![Frame(0), Frame(1), Frame(2)]
    );
}

#[test]
fn test_rollback_resimulates_from_target() {
    let (mut group, _) = group(8);
    let mut world = World::new();
    let e = world.spawn();

    for f in 0..6 {
        world.set(e, Health(f * 10));
        let query = live(&world);
        group.update(&mut world, TickInput::new(&query));
    }
    assert_eq!(group.current_frame(), Frame(6));

    world.set(e, Health(999));
    let query = live(&world);
    let report = group.update(&mut world, TickInput::new(&query).restore_to(Frame(2)));

    match report.restore {
        Some(RestoreOutcome::Performed { target, ref reports }) => {
            assert_eq!(target, Frame(2));
            assert_eq!(reports[0].stats.restored, 1);
        }
        ref other => panic!("unexpected outcome {:?}", other),
    }

    assert_eq!(world.get::<Health>(e), Some(Health(20)));
    // Rewound to 2, then advanced past it
    assert_eq!(report.next_frame, Frame(3));
    assert_eq!(report.evicted, 4 * 2);
}

#[test]
fn test_stale_rollback_not_performed() {
    let (mut group, _) = group(4);
    let mut world = World::new();
    let e = world.spawn();
    world.set(e, Health(1));

    for _ in 0..10 {
        let query = live(&world);
        group.update(&mut world, TickInput::new(&query));
    }

    let query = live(&world);
    let report = group.update(&mut world, TickInput::new(&query).restore_to(Frame(1)));

    match report.restore {
        Some(RestoreOutcome::NotPerformed(ref error)) => assert!(error.is_not_performed()),
        ref other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(report.next_frame, Frame(11));
}

#[test]
fn test_unrecorded_target_keeps_history() {
    let (mut group, id) = group(8);
    let mut world = World::new();
    let e = world.spawn();

    for f in 0..3 {
        world.set(e, Health(f));
        let query = live(&world);
        group.update(&mut world, TickInput::new(&query));
    }

    // Wraps to the frame before 0, inside the window but never saved
    let query = live(&world);
    let report = group.update(&mut world, TickInput::new(&query).restore_to(Frame(u32::MAX)));

    match report.restore {
        Some(RestoreOutcome::NotPerformed(RollbackError::FrameNotRecorded(frame))) => {
            assert_eq!(frame, Frame(u32::MAX))
        }
        ref other => panic!("unexpected outcome {:?}", other),
    }

    assert_eq!(report.drain.applied, 0);
    assert_eq!(report.evicted, 0);
    assert_eq!(report.next_frame, Frame(4));
    assert_eq!(world.get::<Health>(e), Some(Health(2)));
    assert_eq!(
        group.manager(id).unwrap().recorded_frames(group.window()),
        vec![Frame(0), Frame(1), Frame(2), Frame(3)]
    );
}

#[test]
fn test_round_trip_with_wrapping_offset() {
    let mut group = RollbackSystemGroup::<World>::new(RollbackConfig {
        frame_offset: -4,
        ..config(12)
    })
    .unwrap();
    let id = group.add_manager();
    group.manager_mut(id).unwrap().register_field::<Health>().unwrap();

    let mut world = World::new();
    let e = world.spawn();

    for f in 0..6 {
        world.set(e, Health(f * 10));
        let query = live(&world);
        group.update(&mut world, TickInput::new(&query));
    }

    let window = group.window();
    assert_eq!(
        group.manager(id).unwrap().recorded_frames(window),
        (0..6).map(Frame).collect::<Vec<_>>()
    );
    assert!(crate::safety::verify_manager_invariants(group.manager(id).unwrap(), window).is_ok());

    let query = live(&world);
    let report = group.update(&mut world, TickInput::new(&query).restore_to(Frame(0)));

    assert!(matches!(
        report.restore,
        Some(RestoreOutcome::Performed { target: Frame(0), .. })
    ));
    assert_eq!(world.get::<Health>(e), Some(Health(0)));
}

#[test]
fn test_rollback_recreates_and_destroys_through_one_drain() {
    let (mut group, _) = group(8);
    let mut world = World::new();
    let old = world.spawn();
    world.set(old, Health(5));

    let query = live(&world);
    group.update(&mut world, TickInput::new(&query));

    // Frame 1: old dies but stays tracked, a newcomer appears
    let newcomer = world.spawn();
    world.destroy(old);
    world.set(newcomer, Health(1));
    let query = [TrackedObject::destroyed(old), TrackedObject::alive(newcomer)];
    group.update(&mut world, TickInput::new(&query));

    let query = [TrackedObject::destroyed(old), TrackedObject::alive(newcomer)];
    let report = group.update(&mut world, TickInput::new(&query).restore_to(Frame(0)));

    assert_eq!(report.drain.applied, 3);
    assert_eq!(report.drain.dropped, 0);
    assert!(world.contains(old));
    assert_eq!(world.get::<Health>(old), Some(Health(5)));
    assert!(!world.contains(newcomer));
}

#[test]
fn test_manager_query_override() {
    let mut group = RollbackSystemGroup::<World>::new(config(4)).unwrap();
    let players = group.add_manager();
    let props = group.add_manager();

    let mut world = World::new();
    let player = world.spawn();
    let prop = world.spawn();

    let player_query = [TrackedObject::alive(player)];
    let prop_query = [TrackedObject::alive(prop)];
    group.update(
        &mut world,
        TickInput::new(&player_query).with_query(props, &prop_query),
    );

    assert_eq!(group.manager(players).unwrap().ids(), &[player]);
    assert_eq!(group.manager(props).unwrap().ids(), &[prop]);
    assert_eq!(group.manager(props).unwrap().id(), 1);
}

#[test]
fn test_snapshots_follow_the_window() {
    let (mut group, _) = group(4);
    let mut world = World::new();
    let e = world.spawn();

    let colliders = vec![
        Collider {
            object: e,
            bounds: Aabb::from_center(Vec3::ZERO, Vec3::splat(0.5)),
        },
        Collider {
            object: world.spawn(),
            bounds: Aabb::from_center(Vec3::new(5.0, 0.0, 0.0), Vec3::splat(0.5)),
        },
    ];

    for _ in 0..6 {
        let query = live(&world);
        group.update(&mut world, TickInput::new(&query).colliders(&colliders));
    }

    let tester = group.entry_tester();
    let window = group.window();
    assert_eq!(tester.len(), 4);
    assert!(tester.test(window, Frame(5), e, None));
    assert!(!tester.test(window, Frame(1), e, None));
}
