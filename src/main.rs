use resim::prelude::*;

// 1. Define payloads
#[derive(Payload, Default, Clone, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Payload, Default, Clone, Debug, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
}

#[derive(ListPayload, Default, Clone, Debug, PartialEq)]
struct Trail {
    points: Vec<(f32, f32)>,
}

fn step(world: &mut World) {
    for e in world.objects() {
        let (Some(pos), Some(vel)) = (world.get::<Position>(e), world.get::<Velocity>(e)) else {
            continue;
        };

        let next = Position {
            x: pos.x + vel.x,
            y: pos.y + vel.y,
        };

        let mut trail = world.get::<Trail>(e).unwrap_or_default();
        trail.points.push((next.x, next.y));

        world.set(e, next);
        world.set(e, trail);
    }
}

fn main() -> Result<(), RollbackError> {
    tracing_subscriber::fmt::init();

    let mut group = RollbackSystemGroup::<World>::new(RollbackConfig::default())?;

    // 2. Register what gets rolled back
    let id = group.add_manager();
    if let Some(manager) = group.manager_mut(id) {
        manager.register_field::<Position>()?;
        manager.register_field_diff::<Velocity>()?;
        manager.register_list::<Trail>()?;
    }

    // 3. Spawn objects
    let mut world = World::new();
    let e = world.spawn();
    world.set(e, Position { x: 0.0, y: 0.0 });
    world.set(e, Velocity { x: 1.0, y: 0.5 });

    // 4. Simulate, saving every frame
    for _ in 0..10 {
        step(&mut world);
        let query: Vec<TrackedObject> = world.objects().into_iter().map(TrackedObject::alive).collect();
        group.update(&mut world, TickInput::new(&query));
    }

    println!("frame {:?}: {:?}", group.current_frame(), world.get::<Position>(e));

    // 5. A late input arrives for frame 4: roll back and resimulate
    let query: Vec<TrackedObject> = world.objects().into_iter().map(TrackedObject::alive).collect();
    let report = group.update(&mut world, TickInput::new(&query).restore_to(Frame(4)));

    if let Some(RestoreOutcome::Performed { target, .. }) = report.restore {
        println!("restored {:?}: {:?}", target, world.get::<Position>(e));
    }

    world.set(e, Velocity { x: -1.0, y: 0.0 });
    while group.current_frame().is_before(Frame(11)) {
        step(&mut world);
        let query: Vec<TrackedObject> = world.objects().into_iter().map(TrackedObject::alive).collect();
        group.update(&mut world, TickInput::new(&query));
    }

    println!(
        "frame {:?}: {:?}, trail of {}",
        group.current_frame(),
        world.get::<Position>(e),
        world.get::<Trail>(e).map_or(0, |t| t.points.len())
    );

    Ok(())
}
