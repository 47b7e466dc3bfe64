use tracing::{debug, trace, warn};

use crate::command::{CommandQueue, DrainReport};
use crate::config::RollbackConfig;
use crate::entry::{CollisionSource, EntryTester};
use crate::error::RollbackError;
use crate::frame::{Frame, FrameWindow};
use crate::manager::{RestoreReport, RollbackManager, SaveReport};
use crate::object::TrackedObject;
use crate::world::LiveStore;

/// Where the group is within the current tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Saving,
    Restoring,
    Clearing,
}

/// Index of a manager inside its group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ManagerId(pub u32);

/// What the outer loop hands the group each tick.
pub struct TickInput<'a> {
    /// Tracked objects for every manager without an override.
    pub query: &'a [TrackedObject],
    pub overrides: Vec<(ManagerId, &'a [TrackedObject])>,
    /// Rollback target requested by the outer scheduler, if any.
    pub restore_to: Option<Frame>,
    /// Physics world to snapshot for this frame.
    pub colliders: Option<&'a dyn CollisionSource>,
}

impl<'a> TickInput<'a> {
    pub fn new(query: &'a [TrackedObject]) -> Self {
        TickInput {
            query,
            overrides: Vec::new(),
            restore_to: None,
            colliders: None,
        }
    }

    pub fn with_query(mut self, manager: ManagerId, query: &'a [TrackedObject]) -> Self {
        self.overrides.push((manager, query));
        self
    }

    pub fn restore_to(mut self, frame: Frame) -> Self {
        self.restore_to = Some(frame);
        self
    }

    pub fn colliders(mut self, source: &'a dyn CollisionSource) -> Self {
        self.colliders = Some(source);
        self
    }

    fn query_for(&self, manager: ManagerId) -> &'a [TrackedObject] {
        self.overrides
            .iter()
            .rev()
            .find(|(id, _)| *id == manager)
            .map_or(self.query, |&(_, query)| query)
    }
}

#[derive(Debug)]
pub enum RestoreOutcome {
    Performed {
        target: Frame,
        reports: Vec<RestoreReport>,
    },
    NotPerformed(RollbackError),
}

#[derive(Debug)]
pub struct TickReport {
    /// The frame that was saved.
    pub frame: Frame,
    pub saves: Vec<SaveReport>,
    pub restore: Option<RestoreOutcome>,
    pub drain: DrainReport,
    pub evicted: usize,
    pub retired: usize,
    /// Current frame after the tick.
    pub next_frame: Frame,
}

/// Drives every manager through Saving, optionally Restoring, and Clearing
/// once per tick, then advances the frame.
pub struct RollbackSystemGroup<W: LiveStore> {
    config: RollbackConfig,
    window: FrameWindow,
    managers: Vec<RollbackManager<W>>,
    queue: CommandQueue,
    entry: EntryTester,
    phase: Phase,
    #[cfg(feature = "parallel")]
    thread_pool: rayon::ThreadPool,
}

impl<W: LiveStore> RollbackSystemGroup<W> {
    pub fn new(config: RollbackConfig) -> Result<Self, RollbackError> {
        config.validate()?;

        #[cfg(feature = "parallel")]
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("resim-worker-{i}"))
            .build()?;

        Ok(RollbackSystemGroup {
            window: config.window(),
            managers: Vec::new(),
            queue: CommandQueue::new(),
            entry: EntryTester::from_config(&config),
            phase: Phase::Idle,
            #[cfg(feature = "parallel")]
            thread_pool,
            config,
        })
    }

    pub fn config(&self) -> &RollbackConfig {
        &self.config
    }

    pub fn window(&self) -> &FrameWindow {
        &self.window
    }

    pub fn current_frame(&self) -> Frame {
        self.window.current()
    }

    /// Re-numbers the current frame. Recorded history stays addressable.
    pub fn rebase(&mut self, frame: Frame) {
        debug!(from = ?self.window.current(), to = ?frame, "rebasing frame window");
        self.window.rebase(frame);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn entry_tester(&self) -> &EntryTester {
        &self.entry
    }

    /// Creates a manager sized from the group config.
    pub fn add_manager(&mut self) -> ManagerId {
        let id = ManagerId(self.managers.len() as u32);

        let mut manager = RollbackManager::from_config(&self.config);
        manager.set_id(id.0);
        self.managers.push(manager);

        id
    }

    pub fn manager(&self, id: ManagerId) -> Option<&RollbackManager<W>> {
        self.managers.get(id.0 as usize)
    }

    pub fn manager_mut(&mut self, id: ManagerId) -> Option<&mut RollbackManager<W>> {
        self.managers.get_mut(id.0 as usize)
    }

    pub fn managers(&self) -> &[RollbackManager<W>] {
        &self.managers
    }

    fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        #[cfg(feature = "parallel")]
        {
            self.thread_pool.install(f)
        }
        #[cfg(not(feature = "parallel"))]
        {
            f()
        }
    }

    /// Runs one tick. Structural changes requested by the restore are applied
    /// to `world` in a single drain before clearing.
    pub fn update(&mut self, world: &mut W, input: TickInput<'_>) -> TickReport {
        let frame = self.window.current();

        self.phase = Phase::Saving;
        let saves = {
            let window = &self.window;
            let input = &input;
            let world = &*world;
            let mut managers = std::mem::take(&mut self.managers);

            let saves = self.install(|| {
                managers
                    .iter_mut()
                    .map(|m| m.schedule_save(world, window, input.query_for(ManagerId(m.id()))))
                    .collect::<Vec<_>>()
            });

            self.managers = managers;
            saves
        };

        if let Some(source) = input.colliders {
            self.entry.capture(&self.window, frame, source);
        }

        let mut drain = DrainReport::default();
        let restore = input.restore_to.map(|target| {
            self.phase = Phase::Restoring;
            let outcome = self.restore(world, target);

            if let RestoreOutcome::Performed { .. } = outcome {
                drain = self.queue.apply(world);
                self.window.rewind(target);
            }
            outcome
        });

        self.phase = Phase::Clearing;
        let (mut evicted, mut retired) = (0, 0);
        for manager in &mut self.managers {
            let report = manager.schedule_clear(&self.window);
            evicted += report.evicted;
            retired += report.retired;
        }
        evicted += self.entry.clear(&self.window);

        self.phase = Phase::Idle;
        let next_frame = self.window.advance();

        trace!(?frame, ?next_frame, evicted, retired, "tick complete");

        TickReport {
            frame,
            saves,
            restore,
            drain,
            evicted,
            retired,
            next_frame,
        }
    }

    fn restore(&self, world: &W, target: Frame) -> RestoreOutcome {
        if let Err(error) = self.window.check(target) {
            warn!(%error, "rollback not performed");
            return RestoreOutcome::NotPerformed(error);
        }

        let window = &self.window;
        let queue = &self.queue;
        let managers = &self.managers;

        let results = self.install(|| {
            managers
                .iter()
                .map(|m| m.schedule_restore(world, window, target, queue))
                .collect::<Vec<_>>()
        });

        let mut reports = Vec::with_capacity(results.len());
        for (manager, result) in self.managers.iter().zip(results) {
            match result {
                Ok(report) => reports.push(report),
                // Registered after the target, nothing to put back
                Err(error) => warn!(manager = manager.id(), %error, "manager skipped restore"),
            }
        }

        // Nothing holds the target, rewinding to it would orphan all history
        if reports.is_empty() {
            let error = RollbackError::FrameNotRecorded(target);
            warn!(%error, "rollback not performed");
            return RestoreOutcome::NotPerformed(error);
        }

        RestoreOutcome::Performed { target, reports }
    }
}

#[cfg(test)]
#[path = "group.tests.rs"]
mod tests;
