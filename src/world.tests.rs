use crate::object::ObjectId;
use crate::payload::{ErasedPayload, Payload};
use crate::world::{LiveStore, World};

#[derive(Clone, Debug, Default, PartialEq, Payload)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Payload)]
struct Armor(u8);

#[test]
fn test_spawn_set_get() {
    let mut world = World::new();
    let e = world.spawn();

    world.set(e, Position { x: 1.0, y: 2.0 });

    assert!(world.contains(e));
    assert!(world.has::<Position>(e));
    assert!(!world.has::<Armor>(e));
    assert_eq!(world.get::<Position>(e), Some(Position { x: 1.0, y: 2.0 }));
}

#[test]
fn test_destroy_drops_fields_and_reuses_index() {
    let mut world = World::new();
    let e = world.spawn();
    world.set(e, Armor(3));

    assert!(world.destroy(e));
    assert!(!world.destroy(e));
    assert_eq!(world.get::<Armor>(e), None);

    let reused = world.spawn();
    assert_eq!(reused.index(), e.index());
    assert_ne!(reused.generation(), e.generation());
}

#[test]
#[should_panic(expected = "does not exist")]
fn test_set_on_missing_object_panics() {
    let mut world = World::new();
    world.set(ObjectId::new(7, 1), Armor(1));
}

#[test]
fn test_write_only_overwrites_existing_fields() {
    let mut world = World::new();
    let e = world.spawn();
    world.register::<Armor>();

    // Writing is not a structural change
    assert!(!world.write(e, Armor(9)));

    world.set(e, Armor(1));
    assert!(world.write(e, Armor(9)));
    assert_eq!(world.read::<Armor>(e), Some(Armor(9)));
}

#[test]
fn test_create_restores_exact_id() {
    let mut world = World::new();
    let e = world.spawn();
    world.destroy(e);

    assert!(world.create(e));
    assert!(!world.create(e));
    assert!(world.contains(e));

    // The freed index was claimed back, so the next spawn gets a new one
    let other = world.spawn();
    assert_ne!(other.index(), e.index());
}

#[test]
fn test_create_rejects_stale_generation() {
    let mut world = World::new();
    let old = world.spawn();
    world.destroy(old);

    let newer = world.spawn();
    assert_eq!(newer.index(), old.index());

    assert!(!world.create(old));
    assert!(!world.contains(old));
    assert!(world.contains(newer));
    assert_eq!(world.len(), 1);

    // Once the index is free again the old id can come back
    world.destroy(newer);
    assert!(world.create(old));
    assert_eq!(world.objects(), vec![old]);
}

#[test]
fn test_create_rejects_none() {
    let mut world = World::new();
    assert!(!world.create(ObjectId::none()));
}

#[test]
fn test_add_field_requires_registered_type() {
    let mut world = World::new();
    let e = world.spawn();

    assert!(!world.add_field(e, ErasedPayload::new(Armor(2))));

    world.register::<Armor>();
    assert!(world.add_field(e, ErasedPayload::new(Armor(2))));
    assert_eq!(world.get::<Armor>(e), Some(Armor(2)));
}

#[test]
fn test_add_field_on_missing_object_fails() {
    let mut world = World::new();
    world.register::<Armor>();

    assert!(!world.add_field(ObjectId::new(3, 1), ErasedPayload::new(Armor(2))));
}

#[test]
fn test_remove_field() {
    let mut world = World::new();
    let e = world.spawn();
    world.set(e, Armor(4));

    assert!(world.remove_field(e, Armor::type_index()));
    assert!(!world.remove_field(e, Armor::type_index()));
    assert!(world.contains(e));
}

#[test]
fn test_objects_sorted() {
    let mut world = World::new();
    let a = world.spawn();
    let b = world.spawn();
    let c = world.spawn();
    world.destroy(b);

    assert_eq!(world.objects(), vec![a, c]);
    assert_eq!(world.len(), 2);
}
