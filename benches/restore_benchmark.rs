use criterion::{Criterion, criterion_group, criterion_main};
use resim::command::CommandQueue;
use resim::frame::{Frame, FrameWindow};
use resim::manager::RollbackManager;
use resim::object::TrackedObject;
use resim::payload::Payload;
use resim::world::World;

#[derive(Payload, Default, Clone, Debug, PartialEq)]
struct Health {
    value: i32,
}

fn saved_history(count: usize, frames: u32, diff: bool) -> (World, RollbackManager<World>, FrameWindow) {
    let mut world = World::new();
    for _ in 0..count {
        let e = world.spawn();
        world.set(e, Health { value: 100 });
    }

    let mut manager = RollbackManager::<World>::new(frames, count);
    if diff {
        manager.register_field_diff::<Health>().unwrap();
    } else {
        manager.register_field::<Health>().unwrap();
    }

    let query: Vec<TrackedObject> = world.objects().into_iter().map(TrackedObject::alive).collect();
    let mut window = FrameWindow::new(frames);

    for f in 0..frames {
        for (i, &object) in world.objects().iter().enumerate() {
            if i as u32 % frames == f {
                world.set(object, Health { value: f as i32 });
            }
        }

        manager.schedule_save(&world, &window, &query);
        window.advance();
    }

    (world, manager, window)
}

fn benchmark_restore_overwrite_10000(c: &mut Criterion) {
    let (world, manager, window) = saved_history(10_000, 16, false);
    let queue = CommandQueue::new();

    c.bench_function("restore_overwrite_10000", |b| {
        b.iter(|| {
            manager
                .schedule_restore(&world, &window, Frame(2), &queue)
                .unwrap();
            queue.drain();
        })
    });
}

// Most values match the latest save and are skipped
fn benchmark_restore_diff_10000(c: &mut Criterion) {
    let (world, manager, window) = saved_history(10_000, 16, true);
    let queue = CommandQueue::new();

    c.bench_function("restore_diff_10000", |b| {
        b.iter(|| {
            manager
                .schedule_restore(&world, &window, Frame(14), &queue)
                .unwrap();
            queue.drain();
        })
    });
}

criterion_group!(
    benches,
    benchmark_restore_overwrite_10000,
    benchmark_restore_diff_10000
);
criterion_main!(benches);
