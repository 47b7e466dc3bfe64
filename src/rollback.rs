use std::any::Any;
use std::marker::PhantomData;

use tracing::warn;

use crate::chunk::map_chunks;
use crate::command::CommandQueue;
use crate::container::{PayloadRecord, TypedContainer};
use crate::frame::{Frame, FrameWindow};
use crate::mask::SlotMask;
use crate::object::ObjectId;
use crate::payload::{Payload, PayloadKind};
use crate::strategy::{ClearStrategy, PayloadStrategy, RestoreMode, RestoreStrategy, SaveStrategy};
use crate::world::LiveStore;

/// Inputs shared by every stage of one manager's save.
pub struct SaveContext<'a, W> {
    pub world: &'a W,
    pub window: &'a FrameWindow,
    pub frame: Frame,
    /// `ids[slot]` for every tracked slot.
    pub ids: &'a [ObjectId],
    /// Slots whose object is alive this frame. Others get no value.
    pub alive: &'a SlotMask,
}

/// Inputs shared by every stage of one manager's restore.
pub struct RestoreContext<'a, W> {
    pub world: &'a W,
    pub window: &'a FrameWindow,
    pub target: Frame,
    pub ids: &'a [ObjectId],
    pub queue: &'a CommandQueue,
    pub manager: u32,
    pub stage: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RestoreStats {
    pub restored: usize,
    /// Values left alone because they already matched the latest record.
    pub skipped: usize,
    pub faults: usize,
}

impl std::ops::Add for RestoreStats {
    type Output = RestoreStats;

    fn add(self, other: RestoreStats) -> RestoreStats {
        RestoreStats {
            restored: self.restored + other.restored,
            skipped: self.skipped + other.skipped,
            faults: self.faults + other.faults,
        }
    }
}

/// One payload type's container and strategy, with its type erased so a
/// manager can keep unrelated payloads side by side.
pub trait ContainerStage<W>: Send + Sync {
    fn type_index(&self) -> usize;

    fn type_name(&self) -> &'static str;

    fn kind(&self) -> PayloadKind;

    fn mode(&self) -> RestoreMode;

    fn reserve(&mut self, capacity: usize);

    fn save(&mut self, ctx: &SaveContext<'_, W>);

    fn restore(&self, ctx: &RestoreContext<'_, W>) -> RestoreStats;

    /// Evicts records the window no longer retains. Returns the count.
    fn evict(&mut self, window: &FrameWindow) -> usize;

    fn has_record(&self, window: &FrameWindow, frame: Frame) -> bool;

    /// Runs the strategy's clear hook for a slot being retired.
    fn retire(&self, object: ObjectId);

    fn move_slots(&mut self, from: u32, to: u32, count: u32);

    fn remove_slots(&mut self, from: u32, count: u32);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub struct Binding<W, T: Payload> {
    pub(crate) container: TypedContainer<T>,
    pub(crate) strategy: Box<dyn PayloadStrategy<W, T>>,
    pub(crate) mode: RestoreMode,
    _world: PhantomData<fn(&W)>,
}

impl<W, T: Payload> Binding<W, T> {
    pub fn new(
        max_frame_count: u32,
        capacity: usize,
        strategy: Box<dyn PayloadStrategy<W, T>>,
        mode: RestoreMode,
    ) -> Self {
        Binding {
            container: TypedContainer::with_capacity(max_frame_count, capacity),
            strategy,
            mode,
            _world: PhantomData,
        }
    }

    pub fn container(&self) -> &TypedContainer<T> {
        &self.container
    }

    pub fn strategy(&self) -> &dyn PayloadStrategy<W, T> {
        self.strategy.as_ref()
    }
}

impl<W, T> ContainerStage<W> for Binding<W, T>
where
    W: LiveStore,
    T: Payload,
{
    fn type_index(&self) -> usize {
        T::type_index()
    }

    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn kind(&self) -> PayloadKind {
        T::KIND
    }

    fn mode(&self) -> RestoreMode {
        self.mode
    }

    fn reserve(&mut self, capacity: usize) {
        self.container.reserve(capacity);
    }

    fn save(&mut self, ctx: &SaveContext<'_, W>) {
        let ring = ctx.window.ring_index(ctx.frame);
        let record = self.container.record_mut(ring);
        record.begin(ctx.window.stored(ctx.frame), ctx.ids.len());

        let strategy = self.strategy.as_ref();
        record.capture(&|slot| {
            if ctx.alive.get(slot as usize) {
                strategy.save(ctx.world, ctx.ids[slot as usize])
            } else {
                None
            }
        });
    }

    fn restore(&self, ctx: &RestoreContext<'_, W>) -> RestoreStats {
        // Registered after the target frame was saved
        let Some(record) = self.container.find(ctx.window, ctx.target) else {
            return RestoreStats::default();
        };

        let latest = match self.mode {
            RestoreMode::Diff => self.container.find(ctx.window, ctx.window.current()),
            RestoreMode::Overwrite => None,
        };

        let strategy = self.strategy.as_ref();

        let per_chunk = map_chunks(ctx.ids.len(), |range| {
            let commands = ctx.queue.writer(ctx.manager, ctx.stage, range.index as u32);
            let mut stats = RestoreStats::default();

            for slot in range.slots() {
                let Some(value) = record.get(slot) else {
                    continue;
                };

                if latest.is_some_and(|latest| latest.matches(slot, &value)) {
                    stats.skipped += 1;
                    continue;
                }

                let object = ctx.ids[slot as usize];
                let exists = ctx.world.contains(object);

                match strategy.restore(ctx.world, object, &value, exists, &commands) {
                    Ok(()) => stats.restored += 1,
                    Err(fault) => {
                        warn!(%fault, payload = T::type_name(), "restore fault");
                        stats.faults += 1;
                    }
                }
            }

            stats
        });

        per_chunk.into_iter().fold(RestoreStats::default(), |a, b| a + b)
    }

    fn evict(&mut self, window: &FrameWindow) -> usize {
        self.container.evict(window)
    }

    fn has_record(&self, window: &FrameWindow, frame: Frame) -> bool {
        self.container.find(window, frame).is_some()
    }

    fn retire(&self, object: ObjectId) {
        self.strategy.clear(object);
    }

    fn move_slots(&mut self, from: u32, to: u32, count: u32) {
        self.container.move_slots(from, to, count);
    }

    fn remove_slots(&mut self, from: u32, count: u32) {
        self.container.remove_slots(from, count);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
