use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::chunk::{self, ChunkRange};
use crate::command::{CommandQueue, DrainReport};
use crate::config::RollbackConfig;
use crate::container::{PayloadRecord, TypedContainer};
use crate::error::RollbackError;
use crate::frame::{Frame, FrameWindow};
use crate::index::SparseIndexTable;
use crate::mask::SlotMask;
use crate::object::{ObjectId, TrackedObject};
use crate::payload::{ListPayload, Payload, PayloadKind};
use crate::rollback::{Binding, ContainerStage, RestoreContext, RestoreStats, SaveContext};
use crate::strategy::{LiveField, PayloadStrategy, RestoreMode};
use crate::view::{ClearDelegate, RestoreDelegate, SaveDelegate};
use crate::world::LiveStore;

/// Everything [`RollbackManager::update`] needs for one tick.
pub struct UpdateState<'a, W> {
    pub world: &'a mut W,
    pub window: &'a mut FrameWindow,
    pub query: &'a [TrackedObject],
    pub restore_to: Option<Frame>,
    pub queue: &'a CommandQueue,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub frame: Frame,
    /// Slots tracked after the save.
    pub tracked: usize,
    /// Objects alive this frame, i.e. given a record.
    pub captured: usize,
    /// Objects seen for the first time.
    pub inserted: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub target: Frame,
    pub created: usize,
    pub destroyed: usize,
    pub stats: RestoreStats,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub evicted: usize,
    pub retired: usize,
}

#[derive(Debug)]
pub struct UpdateReport {
    pub save: SaveReport,
    /// `None` when no rollback was requested.
    pub restore: Option<Result<RestoreReport, RollbackError>>,
    pub drain: DrainReport,
    pub clear: ClearReport,
}

/// Frame history for one set of tracked objects and every payload type
/// registered against it.
///
/// Each slot holds one tracked object. A per-frame identity record tells
/// which objects were alive at that frame; one [`ContainerStage`] per payload
/// type holds the values.
///
/// Slots are renumbered only by [`RollbackManager::schedule_clear`].
pub struct RollbackManager<W: LiveStore> {
    id: u32,
    max_frame_count: u32,
    capacity: usize,
    index: SparseIndexTable,
    /// Slots present in the latest save query.
    seen: SlotMask,
    /// Slots alive in the latest save query.
    alive: SlotMask,
    identities: TypedContainer<ObjectId>,
    bindings: Vec<Box<dyn ContainerStage<W>>>,
    registered: HashMap<usize, usize>,
}

impl<W: LiveStore> RollbackManager<W> {
    pub fn new(max_frame_count: u32, capacity: usize) -> Self {
        RollbackManager {
            id: 0,
            max_frame_count,
            capacity,
            index: SparseIndexTable::with_capacity(capacity),
            seen: SlotMask::new(),
            alive: SlotMask::new(),
            identities: TypedContainer::with_capacity(max_frame_count, capacity),
            bindings: Vec::new(),
            registered: HashMap::new(),
        }
    }

    pub fn from_config(config: &RollbackConfig) -> Self {
        Self::new(config.max_frame_count, config.initial_capacity)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    /// Tracks `T` as a plain field, restored by overwriting.
    pub fn register_field<T: Payload>(&mut self) -> Result<(), RollbackError> {
        self.register_with::<T, _>(LiveField, RestoreMode::Overwrite)
    }

    /// Tracks `T` as a plain field, skipping values equal to the latest save.
    pub fn register_field_diff<T: Payload>(&mut self) -> Result<(), RollbackError> {
        self.register_with::<T, _>(LiveField, RestoreMode::Diff)
    }

    pub fn register_list<T: Payload + ListPayload>(&mut self) -> Result<(), RollbackError> {
        debug_assert_eq!(T::KIND, PayloadKind::List);
        self.register_with::<T, _>(LiveField, RestoreMode::Overwrite)
    }

    /// Tracks `T` with a custom strategy.
    pub fn register_with<T, S>(&mut self, strategy: S, mode: RestoreMode) -> Result<(), RollbackError>
    where
        T: Payload,
        S: PayloadStrategy<W, T> + 'static,
    {
        let type_index = T::type_index();
        if self.registered.contains_key(&type_index) {
            return Err(RollbackError::DuplicatePayload(T::type_name()));
        }

        let binding = Binding::<W, T>::new(
            self.max_frame_count,
            self.capacity,
            Box::new(strategy),
            mode,
        );

        self.registered.insert(type_index, self.bindings.len());
        self.bindings.push(Box::new(binding));

        debug!(manager = self.id, payload = T::type_name(), kind = ?T::KIND, ?mode, "payload registered");
        Ok(())
    }

    pub fn is_registered<T: Payload>(&self) -> bool {
        self.registered.contains_key(&T::type_index())
    }

    pub fn payload_count(&self) -> usize {
        self.bindings.len()
    }

    /// Names and layouts of the registered payloads, in registration order.
    pub fn payloads(&self) -> impl Iterator<Item = (&'static str, PayloadKind)> + '_ {
        self.bindings.iter().map(|b| (b.type_name(), b.kind()))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn slot_of(&self, object: ObjectId) -> Option<u32> {
        self.index.slot_of(object)
    }

    pub fn id_at(&self, slot: u32) -> Option<ObjectId> {
        self.index.id_at(slot)
    }

    pub fn ids(&self) -> &[ObjectId] {
        self.index.ids()
    }

    /// Slot range of batch `index` (count and start index).
    pub fn chunk(&self, index: usize) -> Option<ChunkRange> {
        chunk::chunk_at(self.index.len(), index)
    }

    pub fn chunk_count(&self) -> usize {
        chunk::chunk_count(self.index.len())
    }

    /// Logical frames with a retained identity record, oldest first.
    pub fn recorded_frames(&self, window: &FrameWindow) -> Vec<Frame> {
        let mut frames: Vec<Frame> = self
            .identities
            .frames()
            .filter(|&stored| window.retains_stored(stored))
            .map(|stored| window.logical(stored))
            .collect();

        frames.sort_by_key(|&f| window.current().diff(f).value());
        frames.reverse();
        frames
    }

    /// Objects alive at `frame`, or `None` if the frame was not recorded.
    pub fn alive_at(&self, window: &FrameWindow, frame: Frame) -> Option<Vec<ObjectId>> {
        let record = self.identities.find(window, frame)?;
        Some(
            record
                .present()
                .iter_ones()
                .filter_map(|slot| record.value(slot as u32).copied())
                .collect(),
        )
    }

    pub(crate) fn index(&self) -> &SparseIndexTable {
        &self.index
    }

    pub(crate) fn identities(&self) -> &TypedContainer<ObjectId> {
        &self.identities
    }

    pub(crate) fn seen(&self) -> &SlotMask {
        &self.seen
    }

    pub(crate) fn has_payload_record(&self, window: &FrameWindow, frame: Frame) -> bool {
        self.bindings.iter().any(|b| b.has_record(window, frame))
    }

    fn ensure_capacity(&mut self, needed: usize) {
        if needed <= self.capacity {
            return;
        }

        let grown = needed.next_power_of_two().max(self.capacity * 2);
        debug!(manager = self.id, from = self.capacity, to = grown, "growing rollback capacity");

        self.index.reserve(grown - self.index.len());
        self.identities.reserve(grown);
        for binding in &mut self.bindings {
            binding.reserve(grown);
        }

        self.capacity = grown;
    }

    /// Runs one full tick for this manager alone: save, optional restore
    /// followed by a drain of `queue`, then clear. The window is rewound on a
    /// successful restore but never advanced; that is left to the caller.
    pub fn update(&mut self, state: UpdateState<'_, W>) -> UpdateReport {
        let UpdateState {
            world,
            window,
            query,
            restore_to,
            queue,
        } = state;

        let save = self.schedule_save(world, window, query);

        let mut drain = DrainReport::default();
        let restore = match restore_to {
            Some(target) => {
                let result = self.schedule_restore(world, window, target, queue);
                match &result {
                    Ok(_) => {
                        drain = queue.apply(world);
                        window.rewind(target);
                    }
                    Err(error) => warn!(manager = self.id, %error, "rollback not performed"),
                }
                Some(result)
            }
            None => None,
        };

        let clear = self.schedule_clear(window);

        UpdateReport {
            save,
            restore,
            drain,
            clear,
        }
    }

    /// Captures the current frame for every object in `query`.
    ///
    /// New objects get a slot. Objects with `alive == false` keep their slot
    /// but get no record this frame.
    pub fn schedule_save(&mut self, world: &W, window: &FrameWindow, query: &[TrackedObject]) -> SaveReport {
        let frame = window.current();

        let incoming = query.iter().filter(|o| !self.index.contains(o.id)).count();
        self.ensure_capacity(self.index.len() + incoming);

        let mut inserted = 0;
        let rows: Vec<(u32, bool)> = query
            .iter()
            .map(|o| {
                let insertion = self.index.insert(o.id);
                inserted += insertion.is_new as usize;
                (insertion.slot, o.alive)
            })
            .collect();

        let len = self.index.len();
        self.seen.reset(len);
        self.alive.reset(len);
        for (slot, alive) in rows {
            self.seen.set(slot as usize);
            if alive {
                self.alive.set(slot as usize);
            }
        }

        let ids = self.index.ids();
        let alive = &self.alive;

        let record = self.identities.record_mut(window.ring_index(frame));
        record.begin(window.stored(frame), len);
        record.capture(&|slot| alive.get(slot as usize).then(|| ids[slot as usize]));

        let ctx = SaveContext {
            world,
            window,
            frame,
            ids,
            alive,
        };

        #[cfg(feature = "parallel")]
        self.bindings.par_iter_mut().for_each(|b| b.save(&ctx));
        #[cfg(not(feature = "parallel"))]
        self.bindings.iter_mut().for_each(|b| b.save(&ctx));

        let report = SaveReport {
            frame,
            tracked: len,
            captured: self.alive.count_ones(),
            inserted,
        };

        trace!(manager = self.id, ?frame, tracked = report.tracked, captured = report.captured, "saved");
        report
    }

    /// Reconciles the live world with `target` and installs its values.
    ///
    /// Objects alive at `target` but missing live get a `Create`, tracked
    /// objects live now but not alive at `target` get a `Destroy`. Values are
    /// written in place where possible, anything structural is queued. The
    /// index is never touched.
    pub fn schedule_restore(
        &self,
        world: &W,
        window: &FrameWindow,
        target: Frame,
        queue: &CommandQueue,
    ) -> Result<RestoreReport, RollbackError> {
        window.check(target)?;

        let identities = self
            .identities
            .find(window, target)
            .ok_or(RollbackError::FrameNotRecorded(target))?;

        let ids = self.index.ids();
        let manager = self.id;

        let structural = chunk::map_chunks(ids.len(), |range| {
            let commands = queue.writer(manager, 0, range.index as u32);
            let (mut created, mut destroyed) = (0, 0);

            for slot in range.slots() {
                let object = ids[slot as usize];
                let was_alive = identities.value(slot).is_some();
                let is_live = world.contains(object);

                debug_assert!(
                    identities.value(slot).is_none_or(|&id| id == object),
                    "slot {} recorded {:?} but holds {:?}",
                    slot,
                    identities.value(slot),
                    object
                );

                if was_alive && !is_live {
                    commands.create(object, slot);
                    created += 1;
                } else if !was_alive && is_live {
                    commands.destroy(object);
                    destroyed += 1;
                }
            }

            (created, destroyed)
        });

        let (created, destroyed) = structural
            .into_iter()
            .fold((0, 0), |(c, d), (c2, d2)| (c + c2, d + d2));

        let mut stats = RestoreStats::default();
        for (i, binding) in self.bindings.iter().enumerate() {
            let ctx = RestoreContext {
                world,
                window,
                target,
                ids,
                queue,
                manager,
                stage: i as u32 + 1,
            };
            stats = stats + binding.restore(&ctx);
        }

        if stats.faults > 0 {
            warn!(manager, ?target, faults = stats.faults, "restore finished with faults");
        }

        trace!(manager, ?target, created, destroyed, restored = stats.restored, skipped = stats.skipped, "restored");

        Ok(RestoreReport {
            target,
            created,
            destroyed,
            stats,
        })
    }

    /// Evicts records the window no longer retains and retires slots whose
    /// object was released or whose whole history has aged out. Retired slots
    /// are filled from the end so slots stay `0..len`.
    pub fn schedule_clear(&mut self, window: &FrameWindow) -> ClearReport {
        let mut evicted = self.identities.evict(window);
        for binding in &mut self.bindings {
            evicted += binding.evict(window);
        }

        let len = self.index.len();

        // Slots alive in at least one retained frame
        let mut retained = SlotMask::with_len(len);
        for ring in 0..self.identities.ring_len() {
            let record = self.identities.record(ring);
            if record.frame().is_none() {
                continue;
            }

            for (word, recorded) in retained.words_mut().iter_mut().zip(record.present().words()) {
                *word |= recorded;
            }
        }

        let retiring: Vec<u32> = (0..len)
            .rev()
            .filter(|&slot| !self.seen.get(slot) || !retained.get(slot))
            .map(|slot| slot as u32)
            .collect();

        // Descending order keeps the moved-in last slot a survivor
        for &slot in &retiring {
            let removal = self.index.swap_remove(slot);
            let last = removal.moved_from;

            self.identities.move_slots(last, slot, 1);
            self.identities.remove_slots(last, 1);

            for binding in &mut self.bindings {
                binding.retire(removal.removed);
                binding.move_slots(last, slot, 1);
                binding.remove_slots(last, 1);
            }

            let keep = self.seen.get(last as usize);
            self.seen.assign(slot as usize, keep);
            self.seen.truncate(last as usize);

            let keep = self.alive.get(last as usize);
            self.alive.assign(slot as usize, keep);
            self.alive.truncate(last as usize);
        }

        if !retiring.is_empty() || evicted > 0 {
            debug!(manager = self.id, evicted, retired = retiring.len(), tracked = self.index.len(), "cleared");
        }

        ClearReport {
            evicted,
            retired: retiring.len(),
        }
    }

    fn binding<T: Payload>(&self) -> Result<&Binding<W, T>, RollbackError> {
        self.registered
            .get(&T::type_index())
            .and_then(|&i| self.bindings[i].as_any().downcast_ref::<Binding<W, T>>())
            .ok_or(RollbackError::UnknownPayload(T::type_name()))
    }

    /// Direct write access to the current frame's record for `T`, for callers
    /// that produce values in their own pass over the objects.
    pub fn delegate_save<T: Payload>(&mut self, window: &FrameWindow) -> Result<SaveDelegate<'_, T>, RollbackError> {
        let binding = self
            .registered
            .get(&T::type_index())
            .and_then(|&i| self.bindings[i].as_any_mut().downcast_mut::<Binding<W, T>>())
            .ok_or(RollbackError::UnknownPayload(T::type_name()))?;

        let frame = window.current();
        let stored = window.stored(frame);
        let record = binding.container.record_mut(window.ring_index(frame));

        if record.frame() == Some(stored) {
            record.resize(self.index.len());
        } else {
            record.begin(stored, self.index.len());
        }

        Ok(SaveDelegate::new(&self.index, record, frame))
    }

    /// Read access to `T` as it was at `frame`.
    pub fn delegate_restore<T: Payload>(
        &self,
        window: &FrameWindow,
        frame: Frame,
    ) -> Result<RestoreDelegate<'_, T>, RollbackError> {
        window.check(frame)?;

        let record = self
            .binding::<T>()?
            .container
            .find(window, frame)
            .ok_or(RollbackError::FrameNotRecorded(frame))?;

        Ok(RestoreDelegate::new(&self.index, record, frame))
    }

    /// Eviction and retire hooks for `T` alone.
    pub fn delegate_clear<'a, T: Payload>(
        &'a mut self,
        window: &'a FrameWindow,
    ) -> Result<ClearDelegate<'a, W, T>, RollbackError> {
        let binding = self
            .registered
            .get(&T::type_index())
            .and_then(|&i| self.bindings[i].as_any_mut().downcast_mut::<Binding<W, T>>())
            .ok_or(RollbackError::UnknownPayload(T::type_name()))?;

        Ok(ClearDelegate::new(binding, window))
    }
}

#[cfg(test)]
#[path = "manager.tests.rs"]
mod tests;
