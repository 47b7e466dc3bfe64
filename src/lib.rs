// Allow this crate to reference itself as ::resim::
// so the derive macros emit paths that work both internally and externally
extern crate self as resim;

pub mod bvh;
pub mod chunk;
pub mod command;
pub mod config;
pub mod container;
pub mod entry;
pub mod error;
pub mod frame;
pub mod group;
pub mod index;
pub mod manager;
pub mod mask;
pub mod object;
pub mod payload;
pub mod prelude;
pub mod rollback;
pub mod safety;
pub mod strategy;
pub mod view;
pub mod world;

#[cfg(target_arch = "wasm32")]
#[cfg(test)]
mod wasm_tests;

pub use crate::{
    config::RollbackConfig,
    error::{RestoreFault, RollbackError},
    frame::{Frame, FrameWindow},
    group::{RollbackSystemGroup, TickInput},
    manager::RollbackManager,
    object::{ObjectId, TrackedObject},
    payload::{ListPayload, Payload},
    world::{LiveStore, World},
};
