use std::fmt;
use std::ops::{Add, Sub};

use crate::error::RollbackError;

/// Absolute simulation frame in modular 32-bit time.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct Frame(pub u32);

/// Signed linear delta between two frames.
/// Range: -(2^31) ..= +(2^31 - 1)
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FrameDelta(pub i32);

impl Frame {
    pub fn new(value: u32) -> Self {
        Frame(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Wrap-aware signed difference: self - other.
    /// Positive means self is after other.
    pub fn diff(self, other: Frame) -> FrameDelta {
        FrameDelta(self.0.wrapping_sub(other.0) as i32)
    }

    pub fn is_after(self, other: Frame) -> bool {
        self.diff(other).0 > 0
    }

    pub fn is_before(self, other: Frame) -> bool {
        self.diff(other).0 < 0
    }

    pub fn add(self, delta: FrameDelta) -> Frame {
        Frame(self.0.wrapping_add(delta.0 as u32))
    }

    pub fn sub(self, delta: FrameDelta) -> Frame {
        Frame(self.0.wrapping_sub(delta.0 as u32))
    }

    pub fn next(self) -> Frame {
        Frame(self.0.wrapping_add(1))
    }
}

impl FrameDelta {
    pub fn new(v: i32) -> Self {
        FrameDelta(v)
    }

    pub fn value(self) -> i32 {
        self.0
    }
}

impl Add<FrameDelta> for Frame {
    type Output = Frame;

    fn add(self, delta: FrameDelta) -> Frame {
        Frame::add(self, delta)
    }
}

impl Sub<FrameDelta> for Frame {
    type Output = Frame;

    fn sub(self, delta: FrameDelta) -> Frame {
        Frame::sub(self, delta)
    }
}

/// `new_frame - old_frame = delta`
impl Sub<Frame> for Frame {
    type Output = FrameDelta;

    fn sub(self, other: Frame) -> FrameDelta {
        self.diff(other)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

impl fmt::Debug for FrameDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameDelta({})", self.0)
    }
}

/// Tracks "now" and the retention window every container is sized for.
///
/// Callers address history with logical frame numbers. Records are tagged
/// with *stored* frames (`logical + offset`), so [`FrameWindow::rebase`] can
/// renumber the present without touching anything already captured.
///
/// A frame `f` is retained while `0 <= current - f < max_frame_count`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameWindow {
    current: Frame,
    max_frame_count: u32,
    offset: i32,
}

impl FrameWindow {
    /// # Panics
    /// Panics if `max_frame_count` is zero. Use [`crate::config::RollbackConfig::validate`]
    /// to reject such configurations before reaching this point.
    pub fn new(max_frame_count: u32) -> Self {
        assert!(max_frame_count > 0, "retention window must hold at least one frame");
        FrameWindow {
            current: Frame(0),
            max_frame_count,
            offset: 0,
        }
    }

    pub fn with_offset(max_frame_count: u32, offset: i32) -> Self {
        let mut window = Self::new(max_frame_count);
        window.offset = offset;
        window
    }

    /// The frame the next save targets.
    pub fn current(&self) -> Frame {
        self.current
    }

    pub fn max_frame_count(&self) -> u32 {
        self.max_frame_count
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn set_current(&mut self, frame: Frame) {
        self.current = frame;
    }

    pub fn advance(&mut self) -> Frame {
        self.current = self.current.next();
        self.current
    }

    /// Moves "now" back to `target` after a restore. Records newer than
    /// `target` become unreadable and are dropped by the next clear.
    pub fn rewind(&mut self, target: Frame) {
        debug_assert!(!target.is_after(self.current), "rewind target is in the future");
        self.current = target;
    }

    /// Renumbers the current frame to `new_current` while keeping every stored
    /// record addressable under the shifted numbering.
    pub fn rebase(&mut self, new_current: Frame) {
        let stored_now = self.stored(self.current);
        self.offset = stored_now.0.wrapping_sub(new_current.0) as i32;
        self.current = new_current;
        debug_assert_eq!(self.stored(self.current), stored_now);
    }

    /// Logical frame -> tag used on records.
    pub fn stored(&self, frame: Frame) -> Frame {
        Frame(frame.0.wrapping_add(self.offset as u32))
    }

    /// Record tag -> logical frame.
    pub fn logical(&self, stored: Frame) -> Frame {
        Frame(stored.0.wrapping_sub(self.offset as u32))
    }

    /// Ring length for a window of `max_frame_count` frames. A power of two
    /// divides 2^32, so ring positions stay consecutive across the wrap of
    /// the stored numbering.
    pub fn ring_len_for(max_frame_count: u32) -> usize {
        max_frame_count.next_power_of_two() as usize
    }

    pub fn ring_len(&self) -> usize {
        Self::ring_len_for(self.max_frame_count)
    }

    /// Ring position of `frame` inside any container sized for this window.
    pub fn ring_index(&self, frame: Frame) -> usize {
        self.stored(frame).0 as usize & (self.ring_len() - 1)
    }

    /// Oldest frame still inside the window.
    pub fn oldest(&self) -> Frame {
        self.current
            .sub(FrameDelta((self.max_frame_count - 1) as i32))
    }

    pub fn contains(&self, frame: Frame) -> bool {
        let age = self.current.diff(frame).0;
        age >= 0 && (age as u32) < self.max_frame_count
    }

    /// Same test as [`FrameWindow::contains`] for a record tag.
    pub fn retains_stored(&self, stored: Frame) -> bool {
        self.contains(self.logical(stored))
    }

    /// True if the record tag lies beyond the current frame, which happens to
    /// every record newer than the target after a rewind.
    pub fn is_future_stored(&self, stored: Frame) -> bool {
        self.logical(stored).is_after(self.current)
    }

    /// Rejects frames the window cannot serve.
    pub fn check(&self, frame: Frame) -> Result<(), RollbackError> {
        if frame.is_after(self.current) {
            return Err(RollbackError::FutureFrame {
                requested: frame,
                current: self.current,
            });
        }

        if !self.contains(frame) {
            return Err(RollbackError::StaleFrame {
                requested: frame,
                oldest: self.oldest(),
            });
        }

        Ok(())
    }
}

impl Default for FrameWindow {
    fn default() -> Self {
        FrameWindow::new(crate::config::DEFAULT_MAX_FRAME_COUNT)
    }
}

#[cfg(test)]
#[path = "frame.tests.rs"]
mod tests;
