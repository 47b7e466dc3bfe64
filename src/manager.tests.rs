use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::command::{CommandQueue, CommandWriter};
use crate::error::{RestoreFault, RollbackError};
use crate::frame::{Frame, FrameWindow};
use crate::manager::{RollbackManager, UpdateState};
use crate::object::{ObjectId, TrackedObject};
use crate::payload::{ListPayload, Payload};
use crate::strategy::{ClearStrategy, LiveField, RestoreMode, RestoreStrategy, SaveStrategy};
use crate::world::{LiveStore, World};

#[derive(Clone, Debug, Default, PartialEq, Payload)]
struct Position {
    x: i32,
    y: i32,
}

#[derive(Clone, Debug, Default, PartialEq, ListPayload)]
struct Path {
    points: Vec<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Payload)]
struct Target(ObjectId);

fn pos(x: i32) -> Position {
    Position { x, y: x * 2 }
}

fn live(world: &World) -> Vec<TrackedObject> {
    world.objects().into_iter().map(TrackedObject::alive).collect()
}

fn manager_with_position(max_frame_count: u32) -> RollbackManager<World> {
    let mut manager = RollbackManager::new(max_frame_count, 16);
    manager.register_field::<Position>().unwrap();
    manager
}

/// Saves and clears the current frame with the live object set.
fn save_frame(manager: &mut RollbackManager<World>, world: &World, window: &FrameWindow) {
    manager.schedule_save(world, window, &live(world));
    manager.schedule_clear(window);
}

#[test]
fn test_restore_outside_window_is_not_performed() {
    let mut world = World::new();
    let e = world.spawn();
    let mut manager = manager_with_position(8);
    let mut window = FrameWindow::new(8);
    let queue = CommandQueue::new();

    for f in 0..=10 {
        world.set(e, pos(f * 10));
        save_frame(&mut manager, &world, &window);
        if f < 10 {
            window.advance();
        }
    }
    assert_eq!(window.current(), Frame(10));

    let err = manager
        .schedule_restore(&world, &window, Frame(2), &queue)
        .unwrap_err();
    assert!(matches!(err, RollbackError::StaleFrame { .. }));
    assert!(err.is_not_performed());
    assert_eq!(world.get::<Position>(e), Some(pos(100)));

    let report = manager
        .schedule_restore(&world, &window, Frame(5), &queue)
        .unwrap();
    assert_eq!(report.stats.restored, 1);
    assert_eq!(world.get::<Position>(e), Some(pos(50)));
    assert!(queue.is_empty());
}

#[test]
fn test_recorded_frames_follow_window() {
    let mut world = World::new();
    world.spawn();
    let mut manager = manager_with_position(8);
    let mut window = FrameWindow::new(8);

    for f in 0..=10 {
        window.set_current(Frame(f));
        save_frame(&mut manager, &world, &window);
    }

    let frames: Vec<u32> = manager.recorded_frames(&window).iter().map(|f| f.0).collect();
    assert_eq!(frames, (3..=10).collect::<Vec<_>>());
}

#[test]
fn test_future_frame_rejected() {
    let world = World::new();
    let manager = manager_with_position(8);
    let window = FrameWindow::new(8);

    let err = manager
        .schedule_restore(&world, &window, Frame(3), &CommandQueue::new())
        .unwrap_err();
    assert!(matches!(err, RollbackError::FutureFrame { .. }));
}

#[test]
fn test_unrecorded_frame_in_window() {
    let mut world = World::new();
    world.spawn();
    let mut manager = manager_with_position(8);
    let mut window = FrameWindow::new(8);

    window.set_current(Frame(3));
    save_frame(&mut manager, &world, &window);

    let err = manager
        .schedule_restore(&world, &window, Frame(1), &CommandQueue::new())
        .unwrap_err();
    assert!(matches!(err, RollbackError::FrameNotRecorded(Frame(1))));
}

#[test]
fn test_released_slot_is_compacted() {
    let mut world = World::new();
    let objects: Vec<ObjectId> = (0..5).map(|_| world.spawn()).collect();
    for (i, &e) in objects.iter().enumerate() {
        world.set(e, pos(i as i32));
    }

    let mut manager = manager_with_position(8);
    let mut window = FrameWindow::new(8);
    save_frame(&mut manager, &world, &window);
    assert_eq!(manager.slot_of(objects[2]), Some(2));

    window.advance();
    world.destroy(objects[2]);
    let report = manager.schedule_save(&world, &window, &live(&world));
    assert_eq!(report.tracked, 5);

    let clear = manager.schedule_clear(&window);

    assert_eq!(clear.retired, 1);
    assert_eq!(manager.len(), 4);
    assert_eq!(manager.slot_of(objects[4]), Some(2));
    assert_eq!(manager.slot_of(objects[2]), None);

    // History moved with the object
    let past = manager.delegate_restore::<Position>(&window, Frame(0)).unwrap();
    assert_eq!(past.get(objects[4]).map(|v| v.into_owned()), Some(pos(4)));
    assert_eq!(past.get(objects[3]).map(|v| v.into_owned()), Some(pos(3)));

    let alive = manager.alive_at(&window, Frame(0)).unwrap();
    assert_eq!(alive.len(), 4);
    assert!(!alive.contains(&objects[2]));

    crate::safety::verify_manager_invariants(&manager, &window).unwrap();
}

#[test]
fn test_destroyed_object_is_recreated() {
    let mut world = World::new();
    let a = world.spawn();
    let b = world.spawn();
    world.set(a, pos(1));
    world.set(b, pos(2));

    let mut manager = manager_with_position(8);
    let mut window = FrameWindow::new(8);
    let queue = CommandQueue::new();
    save_frame(&mut manager, &world, &window);

    window.advance();
    world.destroy(b);
    let query = [TrackedObject::alive(a), TrackedObject::destroyed(b)];
    manager.schedule_save(&world, &window, &query);
    manager.schedule_clear(&window);
    assert_eq!(manager.slot_of(b), Some(1));

    let report = manager
        .schedule_restore(&world, &window, Frame(0), &queue)
        .unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.destroyed, 0);

    let drain = queue.apply(&mut world);
    assert_eq!(drain.dropped, 0);
    assert!(world.contains(b));
    assert_eq!(world.get::<Position>(b), Some(pos(2)));
}

#[test]
fn test_update_destroys_objects_born_after_target() {
    let mut world = World::new();
    let a = world.spawn();
    world.set(a, pos(1));

    let mut manager = manager_with_position(8);
    let mut window = FrameWindow::new(8);
    let queue = CommandQueue::new();
    save_frame(&mut manager, &world, &window);

    window.advance();
    let c = world.spawn();
    world.set(c, pos(7));
    world.set(a, pos(9));

    let query = live(&world);
    let report = manager.update(UpdateState {
        world: &mut world,
        window: &mut window,
        query: &query,
        restore_to: Some(Frame(0)),
        queue: &queue,
    });

    let restore = report.restore.unwrap().unwrap();
    assert_eq!(restore.destroyed, 1);
    assert_eq!(report.drain.applied, 1);
    assert_eq!(report.clear.retired, 1);

    assert!(!world.contains(c));
    assert_eq!(world.get::<Position>(a), Some(pos(1)));
    assert_eq!(window.current(), Frame(0));
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.recorded_frames(&window), vec![Frame(0)]);
}

#[test]
fn test_update_reports_rejected_rollback() {
    let mut world = World::new();
    world.spawn();
    let mut manager = manager_with_position(4);
    let mut window = FrameWindow::new(4);
    window.set_current(Frame(20));
    let queue = CommandQueue::new();

    let query = live(&world);
    let report = manager.update(UpdateState {
        world: &mut world,
        window: &mut window,
        query: &query,
        restore_to: Some(Frame(2)),
        queue: &queue,
    });

    assert!(report.restore.unwrap().is_err());
    assert_eq!(window.current(), Frame(20));
    assert_eq!(report.save.captured, 1);
}

#[test]
fn test_resave_keeps_distinct_equal_records() {
    let mut world = World::new();
    let e = world.spawn();
    world.set(e, pos(3));

    let mut manager = manager_with_position(8);
    let mut window = FrameWindow::new(8);
    save_frame(&mut manager, &world, &window);
    window.advance();
    save_frame(&mut manager, &world, &window);

    assert_eq!(manager.recorded_frames(&window), vec![Frame(0), Frame(1)]);

    let first = manager.delegate_restore::<Position>(&window, Frame(0)).unwrap();
    let second = manager.delegate_restore::<Position>(&window, Frame(1)).unwrap();
    assert_eq!(first.get(e), second.get(e));
    assert!(first.get(e).is_some());
}

#[test]
fn test_list_round_trip() {
    let mut world = World::new();
    let e = world.spawn();
    let f = world.spawn();
    world.set(e, Path { points: vec![1, 2, 3] });
    world.set(f, Path { points: vec![] });

    let mut manager = RollbackManager::<World>::new(8, 16);
    manager.register_list::<Path>().unwrap();
    let mut window = FrameWindow::new(8);
    let queue = CommandQueue::new();

    save_frame(&mut manager, &world, &window);
    window.advance();
    world.set(e, Path::from_items(vec![9]));
    world.set(f, Path::from_items(vec![4, 4]));
    save_frame(&mut manager, &world, &window);

    manager
        .schedule_restore(&world, &window, Frame(0), &queue)
        .unwrap();

    assert_eq!(world.get::<Path>(e).unwrap().points, vec![1, 2, 3]);
    assert!(world.get::<Path>(f).unwrap().points.is_empty());
}

#[test]
fn test_diff_mode_skips_unchanged_values() {
    let mut world = World::new();
    let moving = world.spawn();
    let still = world.spawn();
    world.set(moving, pos(0));
    world.set(still, pos(5));

    let mut manager = RollbackManager::<World>::new(8, 16);
    manager.register_field_diff::<Position>().unwrap();
    let mut window = FrameWindow::new(8);
    let queue = CommandQueue::new();

    save_frame(&mut manager, &world, &window);
    window.advance();
    world.set(moving, pos(1));
    save_frame(&mut manager, &world, &window);

    let report = manager
        .schedule_restore(&world, &window, Frame(0), &queue)
        .unwrap();

    assert_eq!(report.stats.restored, 1);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(world.get::<Position>(moving), Some(pos(0)));
}

#[test]
fn test_duplicate_registration_fails() {
    let mut manager = manager_with_position(8);

    let err = manager.register_field::<Position>().unwrap_err();
    assert!(matches!(err, RollbackError::DuplicatePayload(_)));
    assert!(
        manager
            .register_with::<Position, _>(LiveField, RestoreMode::Diff)
            .is_err()
    );
    assert_eq!(manager.payload_count(), 1);
    assert!(manager.is_registered::<Position>());
    assert!(!manager.is_registered::<Target>());
}

#[test]
fn test_capacity_grows_before_save() {
    let mut world = World::new();
    for _ in 0..5 {
        world.spawn();
    }

    let mut manager = RollbackManager::<World>::new(4, 2);
    manager.register_field::<Position>().unwrap();
    let window = FrameWindow::new(4);

    let report = manager.schedule_save(&world, &window, &live(&world));

    assert_eq!(report.inserted, 5);
    assert_eq!(manager.capacity(), 8);
}

#[test]
fn test_chunks_cover_tracked_slots() {
    let mut world = World::new();
    for _ in 0..200 {
        world.spawn();
    }

    let mut manager = manager_with_position(4);
    manager.schedule_save(&world, &FrameWindow::new(4), &live(&world));

    assert_eq!(manager.chunk_count(), 2);
    let last = manager.chunk(1).unwrap();
    assert_eq!((last.start, last.count), (128, 72));
    assert!(manager.chunk(2).is_none());
}

struct TargetStrategy;

impl SaveStrategy<World, Target> for TargetStrategy {
    fn save(&self, world: &World, object: ObjectId) -> Option<Target> {
        world.get(object)
    }
}

impl RestoreStrategy<World, Target> for TargetStrategy {
    fn restore(
        &self,
        world: &World,
        object: ObjectId,
        value: &Target,
        exists: bool,
        commands: &CommandWriter<'_>,
    ) -> Result<(), RestoreFault> {
        if !world.contains(value.0) {
            return Err(RestoreFault::UnresolvedReference {
                object,
                referenced: value.0,
            });
        }

        LiveField.restore(world, object, value, exists, commands)
    }
}

impl ClearStrategy<Target> for TargetStrategy {}

#[test]
fn test_unresolved_reference_is_a_fault() {
    let mut world = World::new();
    let hunter = world.spawn();
    let prey = world.spawn();
    let other = world.spawn();
    world.set(hunter, Target(prey));

    let mut manager = RollbackManager::<World>::new(8, 16);
    manager
        .register_with::<Target, _>(TargetStrategy, RestoreMode::Overwrite)
        .unwrap();
    let mut window = FrameWindow::new(8);
    let queue = CommandQueue::new();

    // Only the hunter is tracked, so the prey is never recreated
    manager.schedule_save(&world, &window, &[TrackedObject::alive(hunter)]);
    window.advance();
    world.set(hunter, Target(other));
    world.destroy(prey);
    manager.schedule_save(&world, &window, &[TrackedObject::alive(hunter)]);

    let report = manager
        .schedule_restore(&world, &window, Frame(0), &queue)
        .unwrap();

    assert_eq!(report.stats.faults, 1);
    assert_eq!(report.stats.restored, 0);
    assert_eq!(world.get::<Target>(hunter), Some(Target(other)));
}

struct CountingClear(Arc<AtomicUsize>);

impl SaveStrategy<World, Position> for CountingClear {
    fn save(&self, world: &World, object: ObjectId) -> Option<Position> {
        world.get(object)
    }
}

impl RestoreStrategy<World, Position> for CountingClear {
    fn restore(
        &self,
        world: &World,
        object: ObjectId,
        value: &Position,
        exists: bool,
        commands: &CommandWriter<'_>,
    ) -> Result<(), RestoreFault> {
        LiveField.restore(world, object, value, exists, commands)
    }
}

impl ClearStrategy<Position> for CountingClear {
    fn clear(&self, _object: ObjectId) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_history_ages_out_and_runs_clear_hook() {
    let cleared = Arc::new(AtomicUsize::new(0));

    let mut world = World::new();
    let keep = world.spawn();
    let gone = world.spawn();
    world.set(gone, pos(1));

    let mut manager = RollbackManager::<World>::new(3, 4);
    manager
        .register_with::<Position, _>(CountingClear(cleared.clone()), RestoreMode::Overwrite)
        .unwrap();
    let mut window = FrameWindow::new(3);

    save_frame(&mut manager, &world, &window);
    world.destroy(gone);

    // Still reported, but destroyed: the slot lives while frame 0 is retained
    let query = [TrackedObject::alive(keep), TrackedObject::destroyed(gone)];
    for expected_len in [2, 2, 1] {
        window.advance();
        manager.schedule_save(&world, &window, &query);
        manager.schedule_clear(&window);
        assert_eq!(manager.len(), expected_len);
    }

    assert_eq!(cleared.load(Ordering::Relaxed), 1);
    assert_eq!(manager.slot_of(keep), Some(0));
}

#[test]
fn test_delegates() {
    let mut world = World::new();
    let e = world.spawn();

    let mut manager = manager_with_position(4);
    let mut window = FrameWindow::new(4);
    manager.schedule_save(&world, &window, &live(&world));

    {
        let mut save = manager.delegate_save::<Position>(&window).unwrap();
        assert!(save.save(e, Some(pos(6))));
        assert!(!save.save(ObjectId::new(99, 1), Some(pos(1))));
    }

    let restore = manager.delegate_restore::<Position>(&window, Frame(0)).unwrap();
    let mut seen = Vec::new();
    restore.for_each(|object, value| seen.push((object, value.clone())));
    assert_eq!(seen, vec![(e, pos(6))]);

    assert!(matches!(
        manager.delegate_restore::<Target>(&window, Frame(0)),
        Err(RollbackError::UnknownPayload(_))
    ));

    window.set_current(Frame(9));
    let mut clear = manager.delegate_clear::<Position>(&window).unwrap();
    assert_eq!(clear.evict(), 1);
    assert!(clear.held_frames().is_empty());
}
