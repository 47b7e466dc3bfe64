use crate::index::SparseIndexTable;
use crate::object::ObjectId;

fn ids(n: u32) -> Vec<ObjectId> {
    (0..n).map(|i| ObjectId::new(i, 1)).collect()
}

#[test]
fn test_insert_assigns_dense_slots() {
    let mut table = SparseIndexTable::new();

    for (i, id) in ids(5).into_iter().enumerate() {
        let insertion = table.insert(id);
        assert_eq!(insertion.slot, i as u32);
        assert!(insertion.is_new);
    }

    assert_eq!(table.len(), 5);
}

#[test]
fn test_insert_existing_returns_same_slot() {
    let mut table = SparseIndexTable::new();
    let id = ObjectId::new(9, 1);

    table.insert(ObjectId::new(1, 1));
    let first = table.insert(id);
    let second = table.insert(id);

    assert_eq!(first.slot, second.slot);
    assert!(!second.is_new);
    assert_eq!(table.len(), 2);
}

#[test]
fn test_generations_are_distinct_identities() {
    let mut table = SparseIndexTable::new();
    let old = ObjectId::new(4, 1);
    let new = old.next_generation();

    table.insert(old);
    table.insert(new);

    assert_eq!(table.slot_of(old), Some(0));
    assert_eq!(table.slot_of(new), Some(1));
}

#[test]
fn test_swap_remove_moves_last_into_hole() {
    let mut table = SparseIndexTable::new();
    let objects = ids(5);
    for &id in &objects {
        table.insert(id);
    }

    let removal = table.swap_remove(2);

    assert_eq!(removal.slot, 2);
    assert_eq!(removal.removed, objects[2]);
    assert_eq!(removal.moved, Some(objects[4]));
    assert_eq!(removal.moved_from, 4);

    assert_eq!(table.len(), 4);
    assert_eq!(table.slot_of(objects[4]), Some(2));
    assert_eq!(table.slot_of(objects[2]), None);
    assert_eq!(table.id_at(2), Some(objects[4]));
}

#[test]
fn test_remove_last_moves_nothing() {
    let mut table = SparseIndexTable::new();
    let objects = ids(3);
    for &id in &objects {
        table.insert(id);
    }

    let removal = table.remove(objects[2]).unwrap();

    assert_eq!(removal.moved, None);
    assert_eq!(table.len(), 2);
    assert!(table.remove(objects[2]).is_none());
}

#[test]
fn test_slots_stay_contiguous_after_many_removals() {
    let mut table = SparseIndexTable::new();
    let objects = ids(64);
    for &id in &objects {
        table.insert(id);
    }

    for id in objects.iter().step_by(3) {
        table.remove(*id);
    }

    for (slot, id) in table.iter() {
        assert_eq!(table.slot_of(id), Some(slot));
    }
    assert_eq!(table.len(), 64 - objects.iter().step_by(3).count());
}

#[test]
#[should_panic(expected = "none id")]
fn test_none_id_rejected() {
    let mut table = SparseIndexTable::new();
    table.insert(ObjectId::none());
}
