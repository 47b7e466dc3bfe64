//! Per-phase strategies a payload type plugs into its manager.
//!
//! A strategy decides how one object's payload is read from the live world,
//! how a historical value is installed back, and what happens when the
//! object's slot is retired. [`LiveField`] covers the common case of a field
//! stored directly in the live store.

use crate::command::CommandWriter;
use crate::error::RestoreFault;
use crate::object::ObjectId;
use crate::payload::Payload;
use crate::world::LiveStore;

pub trait SaveStrategy<W, T>: Send + Sync {
    /// Current live value for `object`, or `None` if it carries no `T`.
    fn save(&self, world: &W, object: ObjectId) -> Option<T>;
}

pub trait RestoreStrategy<W, T>: Send + Sync {
    /// Installs a historical value. `exists` tells whether `object` is in the
    /// live store right now; when it is not, a `Create` for it has already
    /// been queued and the value has to travel as a command too.
    ///
    /// Restores only ever install values. A field the object gained after
    /// the target frame is left alone.
    fn restore(
        &self,
        world: &W,
        object: ObjectId,
        value: &T,
        exists: bool,
        commands: &CommandWriter<'_>,
    ) -> Result<(), RestoreFault>;
}

pub trait ClearStrategy<T>: Send + Sync {
    /// Called once when a slot holding `object` is retired from the manager.
    fn clear(&self, _object: ObjectId) {}
}

/// Everything a binding needs from one strategy value.
pub trait PayloadStrategy<W, T>:
    SaveStrategy<W, T> + RestoreStrategy<W, T> + ClearStrategy<T>
{
}

impl<W, T, S> PayloadStrategy<W, T> for S where
    S: SaveStrategy<W, T> + RestoreStrategy<W, T> + ClearStrategy<T>
{
}

/// How a binding writes history back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestoreMode {
    /// Install every historical value.
    #[default]
    Overwrite,
    /// Skip values equal to the latest saved record, so dependents see no
    /// change for state that did not actually move.
    Diff,
}

/// Reads and writes `T` straight through the live store.
#[derive(Clone, Copy, Debug, Default)]
pub struct LiveField;

impl<W: LiveStore, T: Payload> SaveStrategy<W, T> for LiveField {
    fn save(&self, world: &W, object: ObjectId) -> Option<T> {
        world.read::<T>(object)
    }
}

impl<W: LiveStore, T: Payload> RestoreStrategy<W, T> for LiveField {
    fn restore(
        &self,
        world: &W,
        object: ObjectId,
        value: &T,
        exists: bool,
        commands: &CommandWriter<'_>,
    ) -> Result<(), RestoreFault> {
        if exists && world.write(object, value.clone()) {
            return Ok(());
        }

        // Missing object or missing field: attach it during the drain
        commands.add_field(object, value.clone());
        Ok(())
    }
}

impl<T> ClearStrategy<T> for LiveField {}
