//! Spatial validation of historical claims.
//!
//! Each saved frame can carry a frozen [`Bvh`] of the physics world. Testing
//! an object against the snapshot of a past frame tells whether its placement
//! at that frame is still unobstructed, which is what lag-compensated hit
//! validation needs before honoring a rollback.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::bvh::{Aabb, Bvh, Collider};
use crate::config::RollbackConfig;
use crate::frame::{Frame, FrameWindow};
use crate::object::ObjectId;

/// The physics backend, as far as snapshots are concerned.
pub trait CollisionSource: Sync {
    fn colliders(&self) -> Vec<Collider>;
}

impl CollisionSource for Vec<Collider> {
    fn colliders(&self) -> Vec<Collider> {
        self.clone()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotState {
    Absent,
    Building,
    Published,
}

enum Snapshot {
    Building,
    Published(Arc<Bvh>),
}

/// Per-frame snapshot store, keyed by stored frame.
pub struct EntryTester {
    snapshots: RwLock<HashMap<Frame, Snapshot>>,
    tolerance: f32,
}

impl Default for EntryTester {
    fn default() -> Self {
        EntryTester::new(crate::config::DEFAULT_ENTRY_TOLERANCE)
    }
}

impl EntryTester {
    pub fn new(tolerance: f32) -> Self {
        EntryTester {
            snapshots: RwLock::new(HashMap::new()),
            tolerance,
        }
    }

    pub fn from_config(config: &RollbackConfig) -> Self {
        Self::new(config.entry_tolerance)
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }

    /// Claims `frame` for building. `None` if a snapshot for it already
    /// exists or is being built.
    pub fn begin(&self, window: &FrameWindow, frame: Frame) -> Option<SnapshotBuilder<'_>> {
        let key = window.stored(frame);

        let mut snapshots = self.snapshots.write();
        if snapshots.contains_key(&key) {
            return None;
        }
        snapshots.insert(key, Snapshot::Building);

        Some(SnapshotBuilder {
            tester: self,
            key,
            published: false,
        })
    }

    /// Builds and publishes the snapshot for `frame` from `source`.
    pub fn capture(&self, window: &FrameWindow, frame: Frame, source: &dyn CollisionSource) -> Option<Arc<Bvh>> {
        let builder = self.begin(window, frame)?;
        Some(builder.publish(source.colliders()))
    }

    pub fn state(&self, window: &FrameWindow, frame: Frame) -> SnapshotState {
        match self.snapshots.read().get(&window.stored(frame)) {
            None => SnapshotState::Absent,
            Some(Snapshot::Building) => SnapshotState::Building,
            Some(Snapshot::Published(_)) => SnapshotState::Published,
        }
    }

    pub fn snapshot(&self, window: &FrameWindow, frame: Frame) -> Option<Arc<Bvh>> {
        match self.snapshots.read().get(&window.stored(frame)) {
            Some(Snapshot::Published(bvh)) => Some(bvh.clone()),
            _ => None,
        }
    }

    /// [`EntryTester::test_with_tolerance`] using the configured tolerance.
    pub fn test(&self, window: &FrameWindow, frame: Frame, object: ObjectId, historical: Option<Aabb>) -> bool {
        self.test_with_tolerance(window, frame, object, historical, self.tolerance)
    }

    /// True only if `object`'s placement at `frame` has no other body within
    /// `tolerance` in that frame's snapshot.
    ///
    /// The placement is the object's own collider in the snapshot when it was
    /// part of the physics world then, otherwise `historical` (its replayed
    /// transform). Fails closed: no published snapshot, a frame outside the
    /// window or no known placement all give false.
    pub fn test_with_tolerance(
        &self,
        window: &FrameWindow,
        frame: Frame,
        object: ObjectId,
        historical: Option<Aabb>,
        tolerance: f32,
    ) -> bool {
        if !window.contains(frame) {
            return false;
        }

        let Some(bvh) = self.snapshot(window, frame) else {
            trace!(?frame, ?object, "no published snapshot, rejecting");
            return false;
        };

        let Some(placement) = bvh.bounds_of(object).or(historical) else {
            return false;
        };

        bvh.nearest(&placement, tolerance, object).is_none()
    }

    /// Drops snapshots the window no longer retains, including ones left
    /// ahead of the current frame by a rewind.
    pub fn clear(&self, window: &FrameWindow) -> usize {
        let mut snapshots = self.snapshots.write();
        let before = snapshots.len();

        snapshots.retain(|&stored, _| window.retains_stored(stored) && !window.is_future_stored(stored));

        let evicted = before - snapshots.len();
        if evicted > 0 {
            debug!(evicted, held = snapshots.len(), "entry snapshots cleared");
        }
        evicted
    }
}

/// Exclusive claim on one frame's snapshot. Dropping it without publishing
/// returns the frame to `Absent`.
pub struct SnapshotBuilder<'t> {
    tester: &'t EntryTester,
    key: Frame,
    published: bool,
}

impl SnapshotBuilder<'_> {
    pub fn publish(mut self, colliders: Vec<Collider>) -> Arc<Bvh> {
        let bvh = Arc::new(Bvh::build(colliders));
        trace!(stored = ?self.key, bodies = bvh.len(), "snapshot published");

        self.tester
            .snapshots
            .write()
            .insert(self.key, Snapshot::Published(bvh.clone()));
        self.published = true;

        bvh
    }
}

impl Drop for SnapshotBuilder<'_> {
    fn drop(&mut self) {
        if self.published {
            return;
        }

        let mut snapshots = self.tester.snapshots.write();
        if matches!(snapshots.get(&self.key), Some(Snapshot::Building)) {
            snapshots.remove(&self.key);
        }
    }
}

#[cfg(test)]
#[path = "entry.tests.rs"]
mod tests;
