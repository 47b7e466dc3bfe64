//! Deferred structural changes.
//!
//! Restore tasks run while the live store is shared, so anything that would
//! add or remove an object or a field is sent here instead. The queue is
//! drained once, sequentially, after every producer of the phase is done.

use std::cell::Cell;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{trace, warn};

use crate::object::ObjectId;
use crate::payload::{ErasedPayload, Payload};
use crate::world::LiveStore;

#[derive(Debug)]
pub enum StructuralCommand {
    /// Bring a tracked object back. `slot` is the slot it holds in the
    /// issuing manager.
    Create { object: ObjectId, slot: u32 },
    Destroy { object: ObjectId },
    AddField { object: ObjectId, payload: ErasedPayload },
    RemoveField {
        object: ObjectId,
        type_index: usize,
        type_name: &'static str,
    },
}

/// Drain order. Objects are created before anything is attached to them and
/// destroyed after everything else has run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandKind {
    Create,
    AddField,
    RemoveField,
    Destroy,
}

impl StructuralCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            StructuralCommand::Create { .. } => CommandKind::Create,
            StructuralCommand::AddField { .. } => CommandKind::AddField,
            StructuralCommand::RemoveField { .. } => CommandKind::RemoveField,
            StructuralCommand::Destroy { .. } => CommandKind::Destroy,
        }
    }

    pub fn object(&self) -> ObjectId {
        match self {
            StructuralCommand::Create { object, .. }
            | StructuralCommand::Destroy { object }
            | StructuralCommand::AddField { object, .. }
            | StructuralCommand::RemoveField { object, .. } => *object,
        }
    }
}

/// Position of a command in the logical submission order: which manager,
/// which stage of it (0 is structural reconciliation, then one per payload
/// binding), which chunk, and the command's index within that chunk.
///
/// Parallel tasks finish in any order; sorting by this key makes the drain
/// deterministic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionKey {
    pub manager: u32,
    pub stage: u32,
    pub batch: u32,
    pub sequence: u32,
}

#[derive(Debug)]
pub struct Submission {
    pub key: SubmissionKey,
    pub command: StructuralCommand,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub applied: usize,
    pub dropped: usize,
}

impl std::ops::AddAssign for DrainReport {
    fn add_assign(&mut self, other: DrainReport) {
        self.applied += other.applied;
        self.dropped += other.dropped;
    }
}

/// Many-producer, single-consumer queue of structural commands.
pub struct CommandQueue {
    sender: Sender<Submission>,
    receiver: Receiver<Submission>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        CommandQueue { sender, receiver }
    }

    /// A producer handle for one batch. Give every concurrent task its own.
    pub fn writer(&self, manager: u32, stage: u32, batch: u32) -> CommandWriter<'_> {
        CommandWriter {
            sender: &self.sender,
            manager,
            stage,
            batch,
            sequence: Cell::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Takes every pending command, grouped by kind and in submission order
    /// within each kind.
    pub fn drain(&self) -> Vec<Submission> {
        let mut pending: Vec<Submission> = self.receiver.try_iter().collect();
        pending.sort_by_key(|s| (s.command.kind(), s.key));
        pending
    }

    /// Drains and applies every pending command to `world`. Commands that no
    /// longer make sense are logged and dropped.
    pub fn apply<W: LiveStore>(&self, world: &mut W) -> DrainReport {
        let mut report = DrainReport::default();

        for Submission { key, command } in self.drain() {
            let kind = command.kind();
            let object = command.object();

            let (applied, payload) = match command {
                StructuralCommand::Create { object, .. } => (world.create(object), None),
                StructuralCommand::Destroy { object } => (world.destroy(object), None),
                StructuralCommand::AddField { object, payload } => {
                    let name = payload.type_name();
                    (world.add_field(object, payload), Some(name))
                }
                StructuralCommand::RemoveField {
                    object,
                    type_index,
                    type_name,
                } => (world.remove_field(object, type_index), Some(type_name)),
            };

            if applied {
                report.applied += 1;
            } else {
                warn!(?kind, ?object, ?payload, ?key, "dropping inconsistent structural command");
                report.dropped += 1;
            }
        }

        trace!(applied = report.applied, dropped = report.dropped, "command queue drained");
        report
    }
}

/// Producer handle for one task. Commands written through it keep the order
/// they were written in.
pub struct CommandWriter<'q> {
    sender: &'q Sender<Submission>,
    manager: u32,
    stage: u32,
    batch: u32,
    sequence: Cell<u32>,
}

impl CommandWriter<'_> {
    fn push(&self, command: StructuralCommand) {
        let sequence = self.sequence.get();
        self.sequence.set(sequence + 1);

        let key = SubmissionKey {
            manager: self.manager,
            stage: self.stage,
            batch: self.batch,
            sequence,
        };

        // The queue owns the receiver and outlives every writer
        if self.sender.send(Submission { key, command }).is_err() {
            warn!(?key, "command queue closed, structural command lost");
        }
    }

    pub fn create(&self, object: ObjectId, slot: u32) {
        self.push(StructuralCommand::Create { object, slot });
    }

    pub fn destroy(&self, object: ObjectId) {
        self.push(StructuralCommand::Destroy { object });
    }

    pub fn add_field<T: Payload>(&self, object: ObjectId, value: T) {
        self.push(StructuralCommand::AddField {
            object,
            payload: ErasedPayload::new(value),
        });
    }

    pub fn remove_field<T: Payload>(&self, object: ObjectId) {
        self.push(StructuralCommand::RemoveField {
            object,
            type_index: T::type_index(),
            type_name: T::type_name(),
        });
    }

    /// Number of commands written so far.
    pub fn written(&self) -> u32 {
        self.sequence.get()
    }
}

#[cfg(test)]
#[path = "command.tests.rs"]
mod tests;
