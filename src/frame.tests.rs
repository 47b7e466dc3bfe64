use crate::error::RollbackError;
use crate::frame::{Frame, FrameDelta, FrameWindow};

#[test]
fn test_frame_diff_wrapping() {
    // u32::MAX - 0 wraps to -1
    assert_eq!(Frame::new(u32::MAX).diff(Frame::new(0)).value(), -1);
    assert_eq!(Frame::new(0).diff(Frame::new(u32::MAX)).value(), 1);

    assert!(Frame::new(u32::MAX).is_before(Frame::new(0)));
    assert!(Frame::new(0).is_after(Frame::new(u32::MAX)));
}

#[test]
fn test_frame_operators() {
    let frame = Frame::new(100);

    assert_eq!((frame + FrameDelta::new(50)).value(), 150);
    assert_eq!((frame - FrameDelta::new(50)).value(), 50);
    assert_eq!((frame - Frame::new(40)).value(), 60);
    assert_eq!(Frame::new(u32::MAX).next(), Frame::new(0));
}

#[test]
fn test_frame_debug() {
    assert_eq!(format!("{:?}", Frame::new(42)), "Frame(42)");
    assert_eq!(format!("{:?}", FrameDelta::new(-10)), "FrameDelta(-10)");
}

#[test]
fn test_window_contains() {
    let mut window = FrameWindow::new(8);
    window.set_current(Frame::new(10));

    // 10 - 8 = 2 is the first evicted frame, 3 is the oldest retained one
    assert!(!window.contains(Frame::new(2)));
    assert!(window.contains(Frame::new(3)));
    assert!(window.contains(Frame::new(10)));
    assert!(!window.contains(Frame::new(11)));
    assert_eq!(window.oldest(), Frame::new(3));
}

#[test]
fn test_window_contains_before_filled() {
    let mut window = FrameWindow::new(8);
    window.set_current(Frame::new(2));

    assert!(window.contains(Frame::new(0)));
    assert!(window.contains(Frame::new(2)));
    assert!(!window.contains(Frame::new(3)));
}

#[test]
fn test_window_check() {
    let mut window = FrameWindow::new(8);
    window.set_current(Frame::new(10));

    assert!(window.check(Frame::new(5)).is_ok());

    match window.check(Frame::new(2)) {
        Err(RollbackError::StaleFrame { requested, oldest }) => {
            assert_eq!(requested, Frame::new(2));
            assert_eq!(oldest, Frame::new(3));
        }
        other => panic!("expected stale frame, got {:?}", other),
    }

    assert!(matches!(
        window.check(Frame::new(11)),
        Err(RollbackError::FutureFrame { .. })
    ));
}

#[test]
fn test_window_ring_index() {
    let window = FrameWindow::new(8);

    assert_eq!(window.ring_index(Frame::new(0)), 0);
    assert_eq!(window.ring_index(Frame::new(7)), 7);
    assert_eq!(window.ring_index(Frame::new(8)), 0);
    assert_eq!(window.ring_index(Frame::new(13)), 5);
}

#[test]
fn test_window_ring_index_across_wrap() {
    // Stored numbers start just below u32::MAX and wrap after four frames
    let mut window = FrameWindow::with_offset(12, -4);
    assert_eq!(window.ring_len(), 16);

    window.set_current(Frame::new(11));
    let rings: Vec<usize> = (0..12).map(|f| window.ring_index(Frame::new(f))).collect();

    for pair in rings.windows(2) {
        assert_eq!(pair[1], (pair[0] + 1) % window.ring_len());
    }

    let mut unique = rings.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 12);
}

#[test]
fn test_window_advance_and_rewind() {
    let mut window = FrameWindow::new(4);

    assert_eq!(window.advance(), Frame::new(1));
    assert_eq!(window.advance(), Frame::new(2));

    window.rewind(Frame::new(1));
    assert_eq!(window.current(), Frame::new(1));
}

#[test]
fn test_window_rebase_keeps_history_addressable() {
    let mut window = FrameWindow::new(8);
    window.set_current(Frame::new(100));

    let stored_now = window.stored(Frame::new(100));
    let stored_past = window.stored(Frame::new(97));
    let ring_now = window.ring_index(Frame::new(100));

    window.rebase(Frame::new(5));

    assert_eq!(window.current(), Frame::new(5));
    assert_eq!(window.stored(Frame::new(5)), stored_now);
    assert_eq!(window.stored(Frame::new(2)), stored_past);
    assert_eq!(window.ring_index(Frame::new(5)), ring_now);
    assert_eq!(window.logical(stored_past), Frame::new(2));
    assert!(window.retains_stored(stored_past));
}

#[test]
fn test_window_future_stored_after_rewind() {
    let mut window = FrameWindow::with_offset(8, 3);
    window.set_current(Frame::new(6));
    let stored_six = window.stored(Frame::new(6));

    window.rewind(Frame::new(4));

    assert!(window.is_future_stored(stored_six));
    assert!(!window.is_future_stored(window.stored(Frame::new(4))));
}

#[test]
#[should_panic(expected = "at least one frame")]
fn test_window_zero_capacity_panics() {
    let _ = FrameWindow::new(0);
}
