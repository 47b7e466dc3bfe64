// WASM-specific tests using wasm-bindgen-test
// These run the same save and restore paths without the parallel feature

use crate::prelude::*;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[derive(Payload, Default, Clone, Debug, PartialEq)]
struct Counter {
    value: i32,
}

fn tracked(world: &World) -> Vec<TrackedObject> {
    world.objects().into_iter().map(TrackedObject::alive).collect()
}

#[wasm_bindgen_test]
fn test_wasm_frame_math() {
    let a = Frame(10);
    let b = Frame(20);

    assert!(b.is_after(a));
    assert!(!a.is_after(b));
    assert_eq!(b.diff(a).value(), 10);
}

#[wasm_bindgen_test]
fn test_wasm_save_and_restore() {
    let mut group = RollbackSystemGroup::<World>::new(RollbackConfig::default()).unwrap();
    let id = group.add_manager();
    group.manager_mut(id).unwrap().register_field::<Counter>().unwrap();

    let mut world = World::new();
    let e = world.spawn();

    for value in 0..5 {
        world.set(e, Counter { value });
        let query = tracked(&world);
        group.update(&mut world, TickInput::new(&query));
    }

    let query = tracked(&world);
    group.update(&mut world, TickInput::new(&query).restore_to(Frame(1)));

    assert_eq!(world.get::<Counter>(e), Some(Counter { value: 1 }));
    assert_eq!(group.current_frame(), Frame(2));
}

#[wasm_bindgen_test]
fn test_wasm_recreates_destroyed_object() {
    let mut group = RollbackSystemGroup::<World>::new(RollbackConfig::default()).unwrap();
    let id = group.add_manager();
    group.manager_mut(id).unwrap().register_field::<Counter>().unwrap();

    let mut world = World::new();
    let e = world.spawn();
    world.set(e, Counter { value: 7 });

    let query = tracked(&world);
    group.update(&mut world, TickInput::new(&query));

    world.destroy(e);
    let query = [TrackedObject::destroyed(e)];
    group.update(&mut world, TickInput::new(&query).restore_to(Frame(0)));

    assert!(world.contains(e));
    assert_eq!(world.get::<Counter>(e), Some(Counter { value: 7 }));
}
