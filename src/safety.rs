//! Invariant checks for debugging and tests.
//!
//! Each function walks a structure and returns the first violation it finds
//! as a message, or `Ok(())`.

use crate::container::PayloadRecord;
use crate::frame::FrameWindow;
use crate::manager::RollbackManager;
use crate::world::LiveStore;

/// Verifies that the frame window is self-consistent.
///
/// This function checks:
/// - the window holds at least one frame
/// - the current and oldest frames are both inside the window
/// - stored and logical numbering are inverses at the current frame
pub fn verify_window_invariants(window: &FrameWindow) -> Result<(), String> {
    if window.max_frame_count() == 0 {
        return Err("window holds no frames".to_string());
    }

    let current = window.current();
    if !window.contains(current) {
        return Err(format!("current frame {:?} is outside its own window", current));
    }

    let oldest = window.oldest();
    if !window.contains(oldest) {
        return Err(format!("oldest frame {:?} is outside the window", oldest));
    }

    let stored = window.stored(current);
    if window.logical(stored) != current {
        return Err(format!(
            "stored tag {:?} maps back to {:?}, expected {:?}",
            stored,
            window.logical(stored),
            current
        ));
    }

    Ok(())
}

/// Verifies that a manager's slots and identity history agree.
///
/// This function checks:
/// - slots are dense and the index is a bijection between slots and objects
/// - the save masks cover exactly the tracked slots
/// - every held identity record sits at its frame's ring position
/// - no identity record is longer than the slot count
/// - every identity recorded in a slot is the object that slot holds now
///
/// # Example
///
/// ```rust,ignore
/// manager.schedule_clear(&window);
/// if let Err(msg) = verify_manager_invariants(&manager, &window) {
///     panic!("manager invariant violation: {}", msg);
/// }
/// ```
pub fn verify_manager_invariants<W: LiveStore>(manager: &RollbackManager<W>, window: &FrameWindow) -> Result<(), String> {
    let index = manager.index();
    let ids = index.ids();

    for (slot, &id) in ids.iter().enumerate() {
        match index.slot_of(id) {
            Some(s) if s as usize == slot => {}
            other => {
                return Err(format!(
                    "slot {} holds {:?} but the index maps it to {:?}",
                    slot, id, other
                ));
            }
        }
    }

    if manager.seen().len() != ids.len() {
        return Err(format!(
            "seen mask covers {} slots, {} are tracked",
            manager.seen().len(),
            ids.len()
        ));
    }

    let identities = manager.identities();
    for ring in 0..identities.ring_len() {
        let record = identities.record(ring);
        let Some(stored) = record.frame() else {
            continue;
        };

        let frame = window.logical(stored);
        if window.ring_index(frame) != ring {
            return Err(format!(
                "record for {:?} sits at ring {}, expected {}",
                frame,
                ring,
                window.ring_index(frame)
            ));
        }

        if record.len() > ids.len() {
            return Err(format!(
                "record for {:?} spans {} slots, only {} are tracked",
                frame,
                record.len(),
                ids.len()
            ));
        }

        for slot in record.present().iter_ones() {
            let recorded = record.value(slot as u32).copied();
            if recorded != Some(ids[slot]) {
                return Err(format!(
                    "record for {:?} has {:?} at slot {}, which holds {:?}",
                    frame, recorded, slot, ids[slot]
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::object::{ObjectId, TrackedObject};
    use crate::world::World;

    #[test]
    fn test_verify_window() {
        let mut window = FrameWindow::with_offset(8, -3);
        assert!(verify_window_invariants(&window).is_ok());

        window.set_current(Frame(100));
        window.rebase(Frame(2));
        assert!(verify_window_invariants(&window).is_ok());
    }

    #[test]
    fn test_verify_empty_manager() {
        let manager = RollbackManager::<World>::new(4, 8);
        let window = FrameWindow::new(4);
        assert!(verify_manager_invariants(&manager, &window).is_ok());
    }

    #[test]
    fn test_verify_manager_across_ticks() {
        let mut manager = RollbackManager::<World>::new(4, 2);
        let mut window = FrameWindow::new(4);
        let world = World::new();

        let objects: Vec<ObjectId> = (0..10).map(|i| ObjectId::new(i, 1)).collect();

        for f in 0..10usize {
            // Drop one object per tick from the front
            let query: Vec<TrackedObject> = objects[f.min(9)..]
                .iter()
                .map(|&id| TrackedObject::alive(id))
                .collect();

            manager.schedule_save(&world, &window, &query);
            manager.schedule_clear(&window);
            assert!(verify_manager_invariants(&manager, &window).is_ok());

            window.advance();
        }
    }
}
