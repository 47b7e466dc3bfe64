use criterion::{Criterion, criterion_group, criterion_main};
use resim::frame::FrameWindow;
use resim::manager::RollbackManager;
use resim::object::TrackedObject;
use resim::payload::{ListPayload, Payload};
use resim::world::World;

#[derive(Payload, Default, Clone, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(ListPayload, Default, Clone, Debug, PartialEq)]
struct Inventory {
    items: Vec<u32>,
}

fn populate(count: usize) -> (World, Vec<TrackedObject>) {
    let mut world = World::new();

    for i in 0..count {
        let e = world.spawn();
        world.set(
            e,
            Position {
                x: i as f32,
                y: 0.0,
                z: 0.0,
            },
        );
        world.set(
            e,
            Inventory {
                items: (0..(i % 8) as u32).collect(),
            },
        );
    }

    let query = world.objects().into_iter().map(TrackedObject::alive).collect();
    (world, query)
}

fn benchmark_save_fields_10000(c: &mut Criterion) {
    let (world, query) = populate(10_000);
    let mut manager = RollbackManager::<World>::new(32, 10_000);
    manager.register_field::<Position>().unwrap();

    let mut window = FrameWindow::new(32);

    c.bench_function("save_fields_10000", |b| {
        b.iter(|| {
            manager.schedule_save(&world, &window, &query);
            manager.schedule_clear(&window);
            window.advance();
        })
    });
}

fn benchmark_save_lists_10000(c: &mut Criterion) {
    let (world, query) = populate(10_000);
    let mut manager = RollbackManager::<World>::new(32, 10_000);
    manager.register_list::<Inventory>().unwrap();

    let mut window = FrameWindow::new(32);

    c.bench_function("save_lists_10000", |b| {
        b.iter(|| {
            manager.schedule_save(&world, &window, &query);
            manager.schedule_clear(&window);
            window.advance();
        })
    });
}

criterion_group!(
    benches,
    benchmark_save_fields_10000,
    benchmark_save_lists_10000
);
criterion_main!(benches);
