pub use crate::{
    bvh::{Aabb, Collider},
    command::{CommandQueue, CommandWriter},
    config::RollbackConfig,
    entry::{CollisionSource, EntryTester},
    error::{RestoreFault, RollbackError},
    frame::{Frame, FrameWindow},
    group::{ManagerId, RestoreOutcome, RollbackSystemGroup, TickInput},
    manager::RollbackManager,
    object::{ObjectId, TrackedObject},
    payload::{ListPayload, Payload},
    strategy::{ClearStrategy, RestoreMode, RestoreStrategy, SaveStrategy},
    world::{LiveStore, World},
};
