use std::borrow::Cow;

use crate::chunk::{for_each_chunk_mut, map_chunks};
use crate::frame::{Frame, FrameWindow};
use crate::mask::SlotMask;
use crate::payload::{ListPayload, Payload};

/// One frame's worth of captured values for one payload type, indexed by slot.
///
/// A record's length is the slot count at the moment it was captured. Slots
/// past the end read as absent.
pub trait PayloadRecord<T: Clone>: Default + Send + Sync + 'static {
    /// Stored frame this record holds, `None` once evicted.
    fn frame(&self) -> Option<Frame>;

    /// Clears the record and claims it for `frame` with `slot_count` absent slots.
    fn begin(&mut self, frame: Frame, slot_count: usize);

    /// Grows to at least `slot_count` slots, preserving existing contents.
    fn resize(&mut self, slot_count: usize);

    fn reserve(&mut self, capacity: usize);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_present(&self, slot: u32) -> bool;

    fn present_count(&self) -> usize;

    /// Fills every slot from `source`. `None` marks the slot absent.
    fn capture(&mut self, source: &(dyn Fn(u32) -> Option<T> + Sync));

    fn get(&self, slot: u32) -> Option<Cow<'_, T>>;

    fn set(&mut self, slot: u32, value: Option<T>);

    /// True if `slot` is present and holds a value equal to `value`.
    fn matches(&self, slot: u32, value: &T) -> bool;

    /// Relocates slots `[from, from + count)` to `[to, to + count)`.
    fn move_slots(&mut self, from: u32, to: u32, count: u32);

    /// Drops slots `[from, from + count)`, shifting later slots down.
    fn remove_slots(&mut self, from: u32, count: u32);

    fn evict(&mut self);
}

/// Shared body of `move_slots` for both record layouts.
fn move_via_get_set<T: Clone, R: PayloadRecord<T>>(record: &mut R, from: u32, to: u32, count: u32) {
    if from == to || count == 0 {
        return;
    }

    let mut step = |k: u32| {
        let value = record.get(from + k).map(Cow::into_owned);
        if value.is_none() && (to + k) as usize >= record.len() {
            return;
        }
        record.set(to + k, value);
    };

    if to < from {
        (0..count).for_each(&mut step);
    } else {
        (0..count).rev().for_each(&mut step);
    }
}

/// Dense fixed-size values plus a presence mask.
pub struct FieldRecord<T> {
    frame: Option<Frame>,
    present: SlotMask,
    values: Vec<T>,
}

impl<T> Default for FieldRecord<T> {
    fn default() -> Self {
        FieldRecord {
            frame: None,
            present: SlotMask::new(),
            values: Vec::new(),
        }
    }
}

impl<T> FieldRecord<T> {
    pub fn value(&self, slot: u32) -> Option<&T> {
        if self.present.get(slot as usize) {
            self.values.get(slot as usize)
        } else {
            None
        }
    }

    pub fn present(&self) -> &SlotMask {
        &self.present
    }
}

impl<T> PayloadRecord<T> for FieldRecord<T>
where
    T: Clone + Default + Send + Sync + PartialEq + 'static,
{
    fn frame(&self) -> Option<Frame> {
        self.frame
    }

    fn begin(&mut self, frame: Frame, slot_count: usize) {
        self.frame = Some(frame);
        self.values.clear();
        self.values.resize(slot_count, T::default());
        self.present.reset(slot_count);
    }

    fn resize(&mut self, slot_count: usize) {
        if slot_count > self.values.len() {
            self.values.resize(slot_count, T::default());
            self.present.resize(slot_count);
        }
    }

    fn reserve(&mut self, capacity: usize) {
        self.values
            .reserve(capacity.saturating_sub(self.values.len()));
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn is_present(&self, slot: u32) -> bool {
        self.present.get(slot as usize)
    }

    fn present_count(&self) -> usize {
        self.present.count_ones()
    }

    fn capture(&mut self, source: &(dyn Fn(u32) -> Option<T> + Sync)) {
        for_each_chunk_mut(
            &mut self.values,
            self.present.words_mut(),
            |range, values, word| {
                let mut bits = 0u128;

                for (i, v) in values.iter_mut().enumerate() {
                    match source(range.start + i as u32) {
                        Some(value) => {
                            *v = value;
                            bits |= 1u128 << i;
                        }
                        None => *v = T::default(),
                    }
                }

                *word = bits;
            },
        );
    }

    fn get(&self, slot: u32) -> Option<Cow<'_, T>> {
        self.value(slot).map(Cow::Borrowed)
    }

    fn set(&mut self, slot: u32, value: Option<T>) {
        let i = slot as usize;
        if i >= self.values.len() {
            self.resize(i + 1);
        }

        match value {
            Some(value) => {
                self.values[i] = value;
                self.present.set(i);
            }
            None => {
                self.values[i] = T::default();
                self.present.unset(i);
            }
        }
    }

    fn matches(&self, slot: u32, value: &T) -> bool {
        self.value(slot) == Some(value)
    }

    fn move_slots(&mut self, from: u32, to: u32, count: u32) {
        move_via_get_set(self, from, to, count);
    }

    fn remove_slots(&mut self, from: u32, count: u32) {
        let from = from as usize;
        if from >= self.values.len() {
            return;
        }

        let end = (from + count as usize).min(self.values.len());
        self.values.drain(from..end);
        self.present.remove_range(from, end - from);
    }

    fn evict(&mut self) {
        self.frame = None;
        self.values.clear();
        self.present.reset(0);
    }
}

/// Variable-length payloads: an item count per slot and one flattened item
/// array. Offsets are recomputed after every capture or edit.
pub struct ListRecord<L: ListPayload> {
    frame: Option<Frame>,
    present: SlotMask,
    counts: Vec<u32>,
    offsets: Vec<u32>,
    items: Vec<L::Item>,
}

impl<L: ListPayload> Default for ListRecord<L> {
    fn default() -> Self {
        ListRecord {
            frame: None,
            present: SlotMask::new(),
            counts: Vec::new(),
            offsets: Vec::new(),
            items: Vec::new(),
        }
    }
}

impl<L: ListPayload> ListRecord<L> {
    pub fn items_at(&self, slot: u32) -> Option<&[L::Item]> {
        if !self.present.get(slot as usize) {
            return None;
        }

        let start = self.offsets[slot as usize] as usize;
        let count = self.counts[slot as usize] as usize;
        Some(&self.items[start..start + count])
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    fn recompute_offsets(&mut self) {
        self.offsets.resize(self.counts.len(), 0);

        let mut running = 0u32;
        for (offset, &count) in self.offsets.iter_mut().zip(self.counts.iter()) {
            *offset = running;
            running += count;
        }

        debug_assert_eq!(running as usize, self.items.len(), "counts/items out of sync");
    }
}

impl<L: ListPayload> PayloadRecord<L> for ListRecord<L> {
    fn frame(&self) -> Option<Frame> {
        self.frame
    }

    fn begin(&mut self, frame: Frame, slot_count: usize) {
        self.frame = Some(frame);
        self.items.clear();
        self.counts.clear();
        self.counts.resize(slot_count, 0);
        self.offsets.clear();
        self.offsets.resize(slot_count, 0);
        self.present.reset(slot_count);
    }

    fn resize(&mut self, slot_count: usize) {
        if slot_count > self.counts.len() {
            let end = self.items.len() as u32;
            self.counts.resize(slot_count, 0);
            self.offsets.resize(slot_count, end);
            self.present.resize(slot_count);
        }
    }

    fn reserve(&mut self, capacity: usize) {
        let additional = capacity.saturating_sub(self.counts.len());
        self.counts.reserve(additional);
        self.offsets.reserve(additional);
    }

    fn len(&self) -> usize {
        self.counts.len()
    }

    fn is_present(&self, slot: u32) -> bool {
        self.present.get(slot as usize)
    }

    fn present_count(&self) -> usize {
        self.present.count_ones()
    }

    fn capture(&mut self, source: &(dyn Fn(u32) -> Option<L> + Sync)) {
        let parts = map_chunks(self.counts.len(), |range| {
            let mut word = 0u128;
            let mut counts = Vec::with_capacity(range.count as usize);
            let mut items = Vec::new();

            for slot in range.slots() {
                match source(slot) {
                    Some(value) => {
                        word |= 1u128 << (slot - range.start);
                        counts.push(value.items().len() as u32);
                        items.extend_from_slice(value.items());
                    }
                    None => counts.push(0),
                }
            }

            (word, counts, items)
        });

        self.items.clear();
        self.counts.clear();

        for (i, (word, counts, items)) in parts.into_iter().enumerate() {
            self.present.words_mut()[i] = word;
            self.counts.extend(counts);
            self.items.extend(items);
        }

        self.recompute_offsets();
    }

    fn get(&self, slot: u32) -> Option<Cow<'_, L>> {
        self.items_at(slot)
            .map(|items| Cow::Owned(L::from_items(items.to_vec())))
    }

    fn set(&mut self, slot: u32, value: Option<L>) {
        let i = slot as usize;
        if i >= self.counts.len() {
            if value.is_none() {
                return;
            }
            self.resize(i + 1);
        }

        let start = self.offsets[i] as usize;
        let old = self.counts[i] as usize;
        let new_items: &[L::Item] = value.as_ref().map(|v| v.items()).unwrap_or(&[]);

        self.items
            .splice(start..start + old, new_items.iter().cloned());
        self.counts[i] = new_items.len() as u32;
        self.present.assign(i, value.is_some());

        self.recompute_offsets();
    }

    fn matches(&self, slot: u32, value: &L) -> bool {
        self.items_at(slot) == Some(value.items())
    }

    fn move_slots(&mut self, from: u32, to: u32, count: u32) {
        move_via_get_set(self, from, to, count);
    }

    fn remove_slots(&mut self, from: u32, count: u32) {
        let from = from as usize;
        if count == 0 || from >= self.counts.len() {
            return;
        }

        let end = (from + count as usize).min(self.counts.len());
        let start = self.offsets[from] as usize;
        let stop = (self.offsets[end - 1] + self.counts[end - 1]) as usize;

        self.items.drain(start..stop);
        self.counts.drain(from..end);
        self.present.remove_range(from, end - from);
        self.recompute_offsets();

        if self.items.capacity() > self.items.len() * 2 {
            self.items.shrink_to_fit();
        }
    }

    fn evict(&mut self) {
        self.frame = None;
        self.items.clear();
        self.counts.clear();
        self.offsets.clear();
        self.present.reset(0);
    }
}

/// A ring of per-frame records for one payload type, one record per frame
/// position in the retention window.
pub struct TypedContainer<T: Payload> {
    records: Vec<T::Record>,
}

impl<T: Payload> TypedContainer<T> {
    pub fn new(max_frame_count: u32) -> Self {
        TypedContainer {
            records: (0..FrameWindow::ring_len_for(max_frame_count))
                .map(|_| T::Record::default())
                .collect(),
        }
    }

    pub fn with_capacity(max_frame_count: u32, capacity: usize) -> Self {
        let mut container = Self::new(max_frame_count);
        container.reserve(capacity);
        container
    }

    pub fn ring_len(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, ring: usize) -> &T::Record {
        &self.records[ring]
    }

    pub fn record_mut(&mut self, ring: usize) -> &mut T::Record {
        &mut self.records[ring]
    }

    /// The record for `frame`, if it is still held.
    pub fn find(&self, window: &FrameWindow, frame: Frame) -> Option<&T::Record> {
        let record = &self.records[window.ring_index(frame)];
        (record.frame() == Some(window.stored(frame))).then_some(record)
    }

    pub fn find_mut(&mut self, window: &FrameWindow, frame: Frame) -> Option<&mut T::Record> {
        let stored = window.stored(frame);
        let record = &mut self.records[window.ring_index(frame)];
        (record.frame() == Some(stored)).then_some(record)
    }

    /// Grows the record at ring position `ring` to at least `count` slots.
    pub fn resize(&mut self, ring: usize, count: usize) {
        self.records[ring].resize(count);
    }

    pub fn reserve(&mut self, capacity: usize) {
        for record in &mut self.records {
            record.reserve(capacity);
        }
    }

    /// Relocates a run of slots in every held record.
    pub fn move_slots(&mut self, from: u32, to: u32, count: u32) {
        for record in self.records.iter_mut().filter(|r| r.frame().is_some()) {
            record.move_slots(from, to, count);
        }
    }

    pub fn remove_slots(&mut self, from: u32, count: u32) {
        for record in self.records.iter_mut().filter(|r| r.frame().is_some()) {
            record.remove_slots(from, count);
        }
    }

    /// Evicts records outside the window, including records left beyond the
    /// current frame by a rewind. Returns how many were evicted.
    pub fn evict(&mut self, window: &FrameWindow) -> usize {
        let mut evicted = 0;

        for record in &mut self.records {
            if let Some(stored) = record.frame() {
                if !window.retains_stored(stored) || window.is_future_stored(stored) {
                    record.evict();
                    evicted += 1;
                }
            }
        }

        evicted
    }

    /// Stored frames currently held, in ring order.
    pub fn frames(&self) -> impl Iterator<Item = Frame> + '_ {
        self.records.iter().filter_map(|r| r.frame())
    }
}

#[cfg(test)]
#[path = "container.tests.rs"]
mod tests;
