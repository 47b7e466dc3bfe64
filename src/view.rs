use std::borrow::Cow;

use crate::container::PayloadRecord;
use crate::frame::{Frame, FrameWindow};
use crate::index::SparseIndexTable;
use crate::object::ObjectId;
use crate::payload::Payload;
use crate::rollback::Binding;
use crate::strategy::ClearStrategy;
use crate::world::LiveStore;

/// Writes values for one payload type into the current frame's record.
pub struct SaveDelegate<'a, T: Payload> {
    index: &'a SparseIndexTable,
    record: &'a mut T::Record,
    frame: Frame,
}

impl<'a, T: Payload> SaveDelegate<'a, T> {
    pub(crate) fn new(index: &'a SparseIndexTable, record: &'a mut T::Record, frame: Frame) -> Self {
        SaveDelegate {
            index,
            record,
            frame,
        }
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Records `value` for `object`. Returns false if the object is not
    /// tracked by this manager.
    pub fn save(&mut self, object: ObjectId, value: Option<T>) -> bool {
        match self.index.slot_of(object) {
            Some(slot) => {
                self.record.set(slot, value);
                true
            }
            None => false,
        }
    }
}

/// Reads one payload type as it was at a past frame.
pub struct RestoreDelegate<'a, T: Payload> {
    index: &'a SparseIndexTable,
    record: &'a T::Record,
    frame: Frame,
}

impl<'a, T: Payload> RestoreDelegate<'a, T> {
    pub(crate) fn new(index: &'a SparseIndexTable, record: &'a T::Record, frame: Frame) -> Self {
        RestoreDelegate {
            index,
            record,
            frame,
        }
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn get(&self, object: ObjectId) -> Option<Cow<'a, T>> {
        let record: &'a T::Record = self.record;
        record.get(self.index.slot_of(object)?)
    }

    /// Calls `f` for every object that carried `T` at the frame, in slot order.
    pub fn for_each(&self, mut f: impl FnMut(ObjectId, &T)) {
        for (slot, object) in self.index.iter() {
            if let Some(value) = self.record.get(slot) {
                f(object, &value);
            }
        }
    }
}

/// Per-payload eviction and retire hooks.
pub struct ClearDelegate<'a, W, T: Payload> {
    binding: &'a mut Binding<W, T>,
    window: &'a FrameWindow,
}

impl<'a, W: LiveStore, T: Payload> ClearDelegate<'a, W, T> {
    pub(crate) fn new(binding: &'a mut Binding<W, T>, window: &'a FrameWindow) -> Self {
        ClearDelegate { binding, window }
    }

    /// Drops this payload's records outside the window.
    pub fn evict(&mut self) -> usize {
        self.binding.container.evict(self.window)
    }

    /// Runs the strategy's clear hook for `object`.
    pub fn clear(&self, object: ObjectId) {
        self.binding.strategy.clear(object);
    }

    /// Logical frames this payload still holds, oldest first.
    pub fn held_frames(&self) -> Vec<Frame> {
        let mut frames: Vec<Frame> = self
            .binding
            .container
            .frames()
            .map(|stored| self.window.logical(stored))
            .collect();

        frames.sort_by_key(|&f| std::cmp::Reverse(self.window.current().diff(f).value()));
        frames
    }
}
