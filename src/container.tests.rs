use crate::container::{FieldRecord, ListRecord, PayloadRecord, TypedContainer};
use crate::frame::{Frame, FrameWindow};
use crate::payload::{ListPayload, Payload};

#[derive(Clone, Debug, Default, PartialEq, Payload)]
struct Position {
    x: i32,
    y: i32,
}

#[derive(Clone, Debug, Default, PartialEq, ListPayload)]
struct Cargo {
    items: Vec<u32>,
}

fn pos(x: i32) -> Position {
    Position { x, y: -x }
}

fn cargo(items: &[u32]) -> Cargo {
    Cargo {
        items: items.to_vec(),
    }
}

#[test]
fn test_field_capture_marks_presence() {
    let mut record = FieldRecord::<Position>::default();
    record.begin(Frame(3), 300);

    // Every third slot is absent
    record.capture(&|slot| (slot % 3 != 0).then(|| pos(slot as i32)));

    assert_eq!(record.frame(), Some(Frame(3)));
    assert_eq!(record.len(), 300);
    assert!(!record.is_present(0));
    assert_eq!(record.value(1), Some(&pos(1)));
    assert_eq!(record.value(299), Some(&pos(299)));
    assert_eq!(record.value(297), None);
    assert_eq!(record.present_count(), 200);
}

#[test]
fn test_field_set_and_matches() {
    let mut record = FieldRecord::<Position>::default();
    record.begin(Frame(0), 2);

    record.set(1, Some(pos(7)));
    assert!(record.matches(1, &pos(7)));
    assert!(!record.matches(1, &pos(8)));
    assert!(!record.matches(0, &Position::default()));

    record.set(1, None);
    assert!(!record.is_present(1));
}

#[test]
fn test_field_set_past_end_grows() {
    let mut record = FieldRecord::<Position>::default();
    record.begin(Frame(0), 1);

    record.set(4, Some(pos(4)));

    assert_eq!(record.len(), 5);
    assert!(!record.is_present(3));
    assert_eq!(record.get(4).map(|v| v.into_owned()), Some(pos(4)));
}

#[test]
fn test_field_move_into_hole_and_remove_tail() {
    let mut record = FieldRecord::<Position>::default();
    record.begin(Frame(0), 5);
    record.capture(&|slot| Some(pos(slot as i32)));

    record.move_slots(4, 2, 1);
    record.remove_slots(4, 1);

    assert_eq!(record.len(), 4);
    assert_eq!(record.value(2), Some(&pos(4)));
    assert_eq!(record.value(3), Some(&pos(3)));
}

#[test]
fn test_field_move_absent_clears_destination() {
    let mut record = FieldRecord::<Position>::default();
    record.begin(Frame(0), 3);
    record.set(0, Some(pos(1)));

    record.move_slots(2, 0, 1);

    assert!(!record.is_present(0));
}

#[test]
fn test_field_evict() {
    let mut record = FieldRecord::<Position>::default();
    record.begin(Frame(9), 4);
    record.evict();

    assert_eq!(record.frame(), None);
    assert!(record.is_empty());
}

#[test]
fn test_list_capture_flattens() {
    let mut record = ListRecord::<Cargo>::default();
    record.begin(Frame(1), 4);

    record.capture(&|slot| match slot {
        0 => Some(cargo(&[1, 2])),
        1 => None,
        2 => Some(cargo(&[])),
        _ => Some(cargo(&[3, 4, 5])),
    });

    assert_eq!(record.item_count(), 5);
    assert_eq!(record.items_at(0), Some(&[1, 2][..]));
    assert_eq!(record.items_at(1), None);
    // Present with zero items is distinct from absent
    assert_eq!(record.items_at(2), Some(&[][..]));
    assert_eq!(record.items_at(3), Some(&[3, 4, 5][..]));
    assert_eq!(record.get(3).map(|v| v.into_owned()), Some(cargo(&[3, 4, 5])));
}

#[test]
fn test_list_capture_spans_chunks() {
    let mut record = ListRecord::<Cargo>::default();
    record.begin(Frame(1), 260);

    record.capture(&|slot| Some(cargo(&vec![slot; (slot % 3) as usize])));

    assert_eq!(record.items_at(259), Some(&[259][..]));
    assert_eq!(record.items_at(131), Some(&[131, 131][..]));
    assert_eq!(record.present_count(), 260);
}

#[test]
fn test_list_set_replaces_run() {
    let mut record = ListRecord::<Cargo>::default();
    record.begin(Frame(1), 3);
    record.capture(&|slot| Some(cargo(&[slot; 2])));

    record.set(1, Some(cargo(&[7, 7, 7, 7])));

    assert_eq!(record.items_at(0), Some(&[0, 0][..]));
    assert_eq!(record.items_at(1), Some(&[7, 7, 7, 7][..]));
    assert_eq!(record.items_at(2), Some(&[2, 2][..]));
    assert!(record.matches(1, &cargo(&[7, 7, 7, 7])));

    record.set(1, None);
    assert_eq!(record.item_count(), 4);
    assert_eq!(record.items_at(2), Some(&[2, 2][..]));
}

#[test]
fn test_list_remove_slots() {
    let mut record = ListRecord::<Cargo>::default();
    record.begin(Frame(1), 5);
    record.capture(&|slot| Some(cargo(&[slot])));

    record.move_slots(4, 2, 1);
    record.remove_slots(4, 1);

    assert_eq!(record.len(), 4);
    assert_eq!(record.items_at(2), Some(&[4][..]));
    assert_eq!(record.items_at(3), Some(&[3][..]));
    assert_eq!(record.item_count(), 4);
}

#[test]
fn test_list_remove_nothing() {
    let mut record = ListRecord::<Cargo>::default();
    record.begin(Frame(0), 2);
    record.capture(&|slot| Some(cargo(&[slot, slot + 1])));

    record.remove_slots(0, 0);
    record.remove_slots(1, 0);

    assert_eq!(record.len(), 2);
    assert_eq!(record.items_at(0), Some(&[0, 1][..]));
    assert_eq!(record.items_at(1), Some(&[1, 2][..]));
}

#[test]
fn test_container_keeps_every_frame_across_wrap() {
    let mut window = FrameWindow::with_offset(12, -4);
    let mut container = TypedContainer::<Position>::new(12);

    for f in 0..12 {
        window.set_current(Frame(f));
        let record = container.record_mut(window.ring_index(Frame(f)));
        record.begin(window.stored(Frame(f)), 1);
        record.set(0, Some(pos(f as i32)));
    }

    for f in 0..12 {
        let record = container.find(&window, Frame(f)).unwrap();
        assert_eq!(record.value(0), Some(&pos(f as i32)));
    }
    assert_eq!(container.evict(&window), 0);
}

#[test]
fn test_container_find_checks_tag() {
    let window = FrameWindow::new(4);
    let mut container = TypedContainer::<Position>::new(4);

    let ring = window.ring_index(Frame(0));
    container.record_mut(ring).begin(window.stored(Frame(0)), 1);

    assert!(container.find(&window, Frame(0)).is_some());
    // Frame 4 shares the ring position but not the tag
    assert!(container.find(&window, Frame(4)).is_none());
}

#[test]
fn test_container_evicts_stale_and_future() {
    let mut window = FrameWindow::new(4);
    let mut container = TypedContainer::<Position>::new(4);

    for f in 0..6 {
        window.set_current(Frame(f));
        let ring = window.ring_index(Frame(f));
        container.record_mut(ring).begin(window.stored(Frame(f)), 1);
    }

    // Frames 2..=5 are held, nothing to evict yet
    assert_eq!(container.evict(&window), 0);

    window.rewind(Frame(3));
    assert_eq!(container.evict(&window), 2);

    let mut frames: Vec<u32> = container.frames().map(|f| f.0).collect();
    frames.sort();
    assert_eq!(frames, vec![2, 3]);
}

#[test]
fn test_container_slot_edits_skip_empty_records() {
    let window = FrameWindow::new(2);
    let mut container = TypedContainer::<Position>::new(2);

    let ring = window.ring_index(Frame(0));
    container.record_mut(ring).begin(window.stored(Frame(0)), 3);
    container
        .record_mut(ring)
        .capture(&|slot| Some(pos(slot as i32)));

    container.move_slots(2, 0, 1);
    container.remove_slots(2, 1);

    let record = container.find(&window, Frame(0)).unwrap();
    assert_eq!(record.len(), 2);
    assert_eq!(record.value(0), Some(&pos(2)));
    assert!(container.record(1 - ring).is_empty());
}
