use glam::Vec3;

use crate::bvh::{Aabb, Collider};
use crate::entry::{EntryTester, SnapshotState};
use crate::frame::{Frame, FrameWindow};
use crate::object::ObjectId;

fn body(index: u32, x: f32) -> Collider {
    Collider {
        object: ObjectId::new(index, 1),
        bounds: Aabb::from_center(Vec3::new(x, 0.0, 0.0), Vec3::splat(0.5)),
    }
}

fn window_at(current: u32) -> FrameWindow {
    let mut window = FrameWindow::new(16);
    window.set_current(Frame(current));
    window
}

#[test]
fn test_missing_snapshot_fails_closed() {
    let tester = EntryTester::new(0.1);
    let window = window_at(10);

    assert_eq!(tester.state(&window, Frame(7)), SnapshotState::Absent);
    assert!(!tester.test(&window, Frame(7), ObjectId::new(1, 1), None));
    assert!(!tester.test(
        &window,
        Frame(7),
        ObjectId::new(1, 1),
        Some(Aabb::new(Vec3::ZERO, Vec3::ONE))
    ));
}

#[test]
fn test_clear_placement_passes() {
    let tester = EntryTester::new(0.5);
    let window = window_at(3);
    tester.capture(&window, Frame(3), &vec![body(1, 0.0), body(2, 10.0)]);

    assert_eq!(tester.state(&window, Frame(3)), SnapshotState::Published);
    assert!(tester.test(&window, Frame(3), ObjectId::new(1, 1), None));
}

#[test]
fn test_crowded_placement_fails() {
    let tester = EntryTester::new(0.5);
    let window = window_at(3);
    tester.capture(&window, Frame(3), &vec![body(1, 0.0), body(2, 1.2)]);

    // 0.2 apart, inside the tolerance
    assert!(!tester.test(&window, Frame(3), ObjectId::new(1, 1), None));
    assert!(tester.test_with_tolerance(&window, Frame(3), ObjectId::new(1, 1), None, 0.1));
}

#[test]
fn test_historical_placement_used_for_absent_body() {
    let tester = EntryTester::new(0.5);
    let window = window_at(3);
    tester.capture(&window, Frame(3), &vec![body(2, 0.0)]);

    let ghost = ObjectId::new(9, 1);
    let far = Aabb::from_center(Vec3::new(20.0, 0.0, 0.0), Vec3::splat(0.5));
    let near = Aabb::from_center(Vec3::new(0.5, 0.0, 0.0), Vec3::splat(0.5));

    assert!(tester.test(&window, Frame(3), ghost, Some(far)));
    assert!(!tester.test(&window, Frame(3), ghost, Some(near)));
    // Nothing to place it by
    assert!(!tester.test(&window, Frame(3), ghost, None));
}

#[test]
fn test_building_snapshot_fails_closed() {
    let tester = EntryTester::default();
    let window = window_at(4);

    let builder = tester.begin(&window, Frame(4)).unwrap();
    assert_eq!(tester.state(&window, Frame(4)), SnapshotState::Building);
    assert!(tester.begin(&window, Frame(4)).is_none());
    assert!(!tester.test(&window, Frame(4), ObjectId::new(1, 1), None));

    builder.publish(vec![body(1, 0.0)]);
    assert!(tester.test(&window, Frame(4), ObjectId::new(1, 1), None));
}

#[test]
fn test_abandoned_builder_returns_to_absent() {
    let tester = EntryTester::default();
    let window = window_at(4);

    drop(tester.begin(&window, Frame(4)));

    assert_eq!(tester.state(&window, Frame(4)), SnapshotState::Absent);
    assert!(tester.is_empty());
}

#[test]
fn test_frame_outside_window_fails_closed() {
    let tester = EntryTester::new(0.5);
    let mut window = FrameWindow::new(4);
    window.set_current(Frame(2));
    tester.capture(&window, Frame(2), &vec![body(1, 0.0)]);

    window.set_current(Frame(9));
    assert!(!tester.test(&window, Frame(2), ObjectId::new(1, 1), None));
}

#[test]
fn test_clear_evicts_stale_and_future() {
    let tester = EntryTester::default();
    let mut window = FrameWindow::new(4);

    for f in 0..8 {
        window.set_current(Frame(f));
        tester.capture(&window, Frame(f), &vec![body(1, 0.0)]);
    }
    assert_eq!(tester.len(), 8);

    assert_eq!(tester.clear(&window), 4);

    window.rewind(Frame(5));
    assert_eq!(tester.clear(&window), 2);
    assert_eq!(tester.state(&window, Frame(5)), SnapshotState::Published);
    assert_eq!(tester.state(&window, Frame(6)), SnapshotState::Absent);
}
