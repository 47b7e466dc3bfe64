use crate::command::{CommandKind, CommandQueue, StructuralCommand};
use crate::object::ObjectId;
use crate::payload::Payload;
use crate::world::{LiveStore, World};

#[derive(Clone, Debug, Default, PartialEq, Payload)]
struct Shield(u32);

#[test]
fn test_create_then_add_field_from_different_tasks() {
    let mut world = World::new();
    world.register::<Shield>();

    let a = ObjectId::new(12, 1);
    let queue = CommandQueue::new();

    // The field is written by a task with an earlier key than the create
    std::thread::scope(|scope| {
        scope.spawn(|| queue.writer(0, 1, 0).add_field(a, Shield(5)));
        scope.spawn(|| queue.writer(0, 2, 3).create(a, 0));
    });

    let report = queue.apply(&mut world);

    assert_eq!(report.applied, 2);
    assert_eq!(report.dropped, 0);
    assert!(world.contains(a));
    assert_eq!(world.get::<Shield>(a), Some(Shield(5)));
}

#[test]
fn test_drain_orders_by_kind_then_key() {
    let queue = CommandQueue::new();
    let a = ObjectId::new(1, 1);
    let b = ObjectId::new(2, 1);

    let late = queue.writer(1, 0, 0);
    late.destroy(a);
    late.create(b, 4);

    let early = queue.writer(0, 5, 9);
    early.remove_field::<Shield>(b);
    early.create(a, 0);

    let kinds: Vec<(CommandKind, ObjectId)> = queue
        .drain()
        .iter()
        .map(|s| (s.command.kind(), s.command.object()))
        .collect();

    assert_eq!(
        kinds,
        vec![
            (CommandKind::Create, a),
            (CommandKind::Create, b),
            (CommandKind::RemoveField, b),
            (CommandKind::Destroy, a),
        ]
    );
    assert!(queue.is_empty());
}

#[test]
fn test_same_writer_keeps_write_order() {
    let queue = CommandQueue::new();
    let writer = queue.writer(0, 0, 0);

    for i in 0..5 {
        writer.destroy(ObjectId::new(10 - i, 1));
    }
    assert_eq!(writer.written(), 5);

    let order: Vec<u32> = queue
        .drain()
        .iter()
        .map(|s| s.command.object().index())
        .collect();
    assert_eq!(order, vec![10, 9, 8, 7, 6]);
}

#[test]
fn test_inconsistent_commands_are_dropped() {
    let mut world = World::new();
    let e = world.spawn();
    let ghost = ObjectId::new(40, 1);

    let queue = CommandQueue::new();
    let writer = queue.writer(0, 0, 0);
    writer.create(e, 0);
    writer.destroy(ghost);
    writer.add_field(ghost, Shield(1));

    let report = queue.apply(&mut world);

    assert_eq!(report.applied, 0);
    assert_eq!(report.dropped, 3);
    assert!(world.contains(e));
}

#[test]
fn test_destroy_runs_after_fields() {
    let mut world = World::new();
    world.register::<Shield>();
    let e = world.spawn();

    let queue = CommandQueue::new();
    let writer = queue.writer(0, 0, 0);
    writer.destroy(e);
    writer.add_field(e, Shield(2));

    let report = queue.apply(&mut world);

    assert_eq!(report.applied, 2);
    assert!(!world.contains(e));
}

#[test]
fn test_add_field_carries_typed_payload() {
    let queue = CommandQueue::new();
    queue.writer(0, 0, 0).add_field(ObjectId::new(1, 1), Shield(8));

    let drained = queue.drain();
    match &drained[0].command {
        StructuralCommand::AddField { payload, .. } => {
            assert_eq!(payload.type_index(), Shield::type_index());
        }
        other => panic!("unexpected command {:?}", other),
    }
}
