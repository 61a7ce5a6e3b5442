//! Mock run scheduler.
//!
//! Runs progress on a timeline derived from their id (see
//! [`StatusTimeline`]). The scheduler arms one timer per run for the next
//! status boundary; each firing reconciles the stored run against the clock
//! and re-arms until the run is terminal. Reads also reconcile, so a run
//! created by an earlier process catches up as soon as it is looked at.

mod timers;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::run::{Run, RunError, RunStatus, StatusTimeline, Transition, synthesize_artifacts};
use crate::store::RunStore;

#[cfg(test)]
pub use timers::ManualTimers;
pub use timers::{TimerDriver, TokioTimers};

pub struct RunScheduler {
    store: Arc<RunStore>,
    clock: Arc<dyn Clock>,
    timers: Arc<dyn TimerDriver>,
    /// Latest status applied per run. Acts as a floor when the stored record
    /// lags behind because a write was lost.
    status_cache: Mutex<HashMap<String, RunStatus>>,
    /// Runs with a timer currently armed.
    scheduled: Mutex<HashSet<String>>,
    /// Serializes read, advance and save so each run is advanced once.
    advance: Mutex<()>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl RunScheduler {
    pub fn new(
        store: Arc<RunStore>,
        clock: Arc<dyn Clock>,
        timers: Arc<dyn TimerDriver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            clock,
            timers,
            status_cache: Mutex::new(HashMap::new()),
            scheduled: Mutex::new(HashSet::new()),
            advance: Mutex::new(()),
        })
    }

    /// Start tracking a freshly created run.
    pub fn register(self: &Arc<Self>, run: &Run) {
        lock(&self.status_cache).insert(run.run_id.clone(), run.status);
        self.arm(run);
    }

    /// Arm the next timer for a stored run. No-op when a timer is already
    /// pending or the run is unknown or terminal.
    pub fn schedule(self: &Arc<Self>, run_id: &str) {
        if let Some(run) = self.store.get_run(run_id) {
            self.arm(&run);
        }
    }

    pub fn cached_status(&self, run_id: &str) -> Option<RunStatus> {
        lock(&self.status_cache).get(run_id).copied()
    }

    #[cfg(test)]
    pub fn is_scheduled(&self, run_id: &str) -> bool {
        lock(&self.scheduled).contains(run_id)
    }

    fn arm(self: &Arc<Self>, run: &Run) {
        if run.status.is_terminal() {
            return;
        }
        let elapsed = run.elapsed_ms(self.clock.now());
        let Some(delay_ms) = StatusTimeline::for_run(&run.run_id).until_next_change(elapsed)
        else {
            return;
        };
        if !lock(&self.scheduled).insert(run.run_id.clone()) {
            return;
        }

        debug!(run_id = %run.run_id, delay_ms, "armed status timer");
        let this = Arc::clone(self);
        let run_id = run.run_id.clone();
        let delay = Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0));
        self.timers.schedule(
            delay,
            Box::new(move || {
                lock(&this.scheduled).remove(&run_id);
                this.reconcile(&run_id);
            }),
        );
    }

    /// Bring a stored run up to date with the clock and return it.
    ///
    /// Terminal runs come back untouched. Otherwise the status only moves
    /// forward; reaching SUCCEEDED attaches artifacts and FAILED attaches the
    /// simulated error.
    pub fn reconcile(self: &Arc<Self>, run_id: &str) -> Option<Run> {
        let run = self.store.get_run(run_id)?;
        if run.status.is_terminal() {
            return Some(run);
        }

        let run = {
            let _guard = lock(&self.advance);
            // Another caller may have advanced the run while we waited.
            let mut run = self.store.get_run(run_id)?;
            if run.status.is_terminal() {
                return Some(run);
            }

            let now = self.clock.now();
            let mut expected = StatusTimeline::for_run(run_id).status_at(run.elapsed_ms(now));
            if let Some(cached) = self.cached_status(run_id)
                && cached.rank() > expected.rank()
            {
                expected = cached;
            }

            if let Transition::Advance { from, to } = run.status.advance_to(expected) {
                apply_status(&mut run, to, now);
                info!(run_id, %from, %to, "run status advanced");
                self.store.save_run(&run);
                lock(&self.status_cache).insert(run_id.to_string(), to);
            }
            run
        };

        self.arm(&run);
        Some(run)
    }

    /// Stop tracking a run. A timer already armed finds nothing to do.
    pub fn forget(&self, run_id: &str) {
        lock(&self.status_cache).remove(run_id);
        lock(&self.scheduled).remove(run_id);
    }
}

fn apply_status(run: &mut Run, status: RunStatus, now: DateTime<Utc>) {
    run.status = status;
    run.updated_at = now;
    match status {
        RunStatus::Succeeded => {
            let artifacts = synthesize_artifacts(&run.run_id, &run.inputs.output, now);
            run.manifest.outputs.artifacts = artifacts.clone();
            run.artifacts = artifacts;
        }
        RunStatus::Failed => run.error = Some(RunError::simulated_failure()),
        RunStatus::Queued | RunStatus::Running => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ProfileId, Sku};
    use crate::clock::ManualClock;
    use crate::run::{QUEUED_DELAY_MS, RunManifest};
    use crate::store::{KvStore, MemoryKv};
    use crate::wizard::{WizardAction, WizardState};

    struct Harness {
        clock: Arc<ManualClock>,
        timers: Arc<ManualTimers>,
        store: Arc<RunStore>,
        scheduler: Arc<RunScheduler>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let timers = Arc::new(ManualTimers::new(clock.clone()));
        let store = Arc::new(RunStore::new(Arc::new(MemoryKv::new()), clock.clone()));
        let scheduler = RunScheduler::new(store.clone(), clock.clone(), timers.clone());
        Harness {
            clock,
            timers,
            store,
            scheduler,
        }
    }

    fn new_run(h: &Harness, run_id: &str) -> Run {
        let inputs = WizardState::default()
            .reduce(WizardAction::SetSku(Sku::Grant))
            .reduce(WizardAction::SetProfile(ProfileId::P2));
        let now = h.clock.now();
        let run = Run {
            run_id: run_id.to_string(),
            created_at: now,
            updated_at: now,
            sku: Sku::Grant,
            profile_id: ProfileId::P2,
            run_name: format!("Run {run_id}"),
            status: RunStatus::Queued,
            manifest: RunManifest::build(&inputs, Sku::Grant, ProfileId::P2, run_id, now, 30),
            inputs,
            artifacts: Vec::new(),
            error: None,
        };
        h.store.save_run(&run);
        h.scheduler.register(&run);
        run
    }

    // 'd' is 100 and fails; 'b' is 98 and succeeds.
    const FAILING_ID: &str = "run_dA1b2C3d4E5f";
    const SUCCEEDING_ID: &str = "run_bA1b2C3d4E5f";

    fn stored_status(h: &Harness, run_id: &str) -> RunStatus {
        h.store.get_run(run_id).unwrap().status
    }

    #[test]
    fn timers_walk_the_run_through_its_timeline() {
        let h = harness();
        new_run(&h, SUCCEEDING_ID);
        let timeline = StatusTimeline::for_run(SUCCEEDING_ID);
        assert_eq!(timeline.outcome(), RunStatus::Succeeded);
        assert!(h.scheduler.is_scheduled(SUCCEEDING_ID));

        h.timers.advance_ms(QUEUED_DELAY_MS - 1);
        assert_eq!(stored_status(&h, SUCCEEDING_ID), RunStatus::Queued);

        h.timers.advance_ms(1);
        assert_eq!(stored_status(&h, SUCCEEDING_ID), RunStatus::Running);
        assert_eq!(h.timers.pending(), 1);

        h.timers.advance_ms(timeline.transition_ms() - QUEUED_DELAY_MS);
        let run = h.store.get_run(SUCCEEDING_ID).unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert!(!run.artifacts.is_empty());
        assert_eq!(run.manifest.outputs.artifacts, run.artifacts);
        assert!(run.error.is_none());
        assert_eq!(h.timers.pending(), 0);
        assert!(!h.scheduler.is_scheduled(SUCCEEDING_ID));
        assert_eq!(
            h.scheduler.cached_status(SUCCEEDING_ID),
            Some(RunStatus::Succeeded)
        );
    }

    #[test]
    fn failing_run_gets_error_and_no_artifacts() {
        let h = harness();
        new_run(&h, FAILING_ID);
        h.timers.advance_ms(20_000);

        let run = h.store.get_run(FAILING_ID).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.artifacts.is_empty());
        let error = run.error.unwrap();
        assert_eq!(error.code, "ERR-RUN-FAILED");
        assert_eq!(error.message, "An error occurred during processing.");
    }

    #[test]
    fn reconcile_catches_up_without_timers() {
        let h = harness();
        let run = new_run(&h, SUCCEEDING_ID);
        // Move the clock without firing anything.
        h.clock.advance_ms(60_000);

        let reconciled = h.scheduler.reconcile(&run.run_id).unwrap();
        assert_eq!(reconciled.status, RunStatus::Succeeded);
        assert_eq!(reconciled.updated_at, h.clock.now());
    }

    #[test]
    fn reconcile_is_idempotent_and_terminal_is_immutable() {
        let h = harness();
        new_run(&h, SUCCEEDING_ID);
        h.timers.advance_ms(20_000);
        let first = h.scheduler.reconcile(SUCCEEDING_ID).unwrap();

        h.clock.advance_ms(60_000);
        let second = h.scheduler.reconcile(SUCCEEDING_ID).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn schedule_does_not_double_arm() {
        let h = harness();
        new_run(&h, SUCCEEDING_ID);
        h.scheduler.schedule(SUCCEEDING_ID);
        h.scheduler.schedule(SUCCEEDING_ID);
        assert_eq!(h.timers.pending(), 1);
    }

    #[test]
    fn schedule_ignores_unknown_and_terminal_runs() {
        let h = harness();
        h.scheduler.schedule("run_missing");
        assert_eq!(h.timers.pending(), 0);

        new_run(&h, FAILING_ID);
        h.timers.advance_ms(20_000);
        h.scheduler.schedule(FAILING_ID);
        assert_eq!(h.timers.pending(), 0);
    }

    #[test]
    fn forgotten_run_is_left_alone_by_pending_timer() {
        let h = harness();
        new_run(&h, SUCCEEDING_ID);
        h.store.delete_run(SUCCEEDING_ID);
        h.scheduler.forget(SUCCEEDING_ID);

        h.timers.advance_ms(20_000);
        assert!(h.store.get_run(SUCCEEDING_ID).is_none());
        assert_eq!(h.scheduler.cached_status(SUCCEEDING_ID), None);
    }

    /// Store whose reads are slow enough for concurrent callers to overlap.
    struct SlowKv(MemoryKv);

    impl KvStore for SlowKv {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            std::thread::sleep(std::time::Duration::from_millis(50));
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.0.set(key, value)
        }
        fn delete(&self, key: &str) -> anyhow::Result<()> {
            self.0.delete(key)
        }
        fn keys(&self) -> anyhow::Result<Vec<String>> {
            self.0.keys()
        }
    }

    #[test]
    fn concurrent_reconciles_agree_on_terminal_artifacts() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let timers = Arc::new(ManualTimers::new(clock.clone()));
        let store = Arc::new(RunStore::new(Arc::new(SlowKv(MemoryKv::new())), clock.clone()));
        let scheduler = RunScheduler::new(store.clone(), clock.clone(), timers.clone());
        let h = Harness {
            clock,
            timers,
            store,
            scheduler,
        };
        new_run(&h, SUCCEEDING_ID);
        h.clock.advance_ms(60_000);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let scheduler = h.scheduler.clone();
                std::thread::spawn(move || scheduler.reconcile(SUCCEEDING_ID).unwrap())
            })
            .collect();
        let results: Vec<Run> = handles.into_iter().map(|t| t.join().unwrap()).collect();

        let stored = h.store.get_run(SUCCEEDING_ID).unwrap();
        assert_eq!(stored.status, RunStatus::Succeeded);
        assert!(!stored.artifacts.is_empty());
        for run in &results {
            assert_eq!(run.artifacts, stored.artifacts);
            assert_eq!(run.updated_at, stored.updated_at);
        }
    }

    #[test]
    fn reconcile_missing_run_is_none() {
        let h = harness();
        assert!(h.scheduler.reconcile("run_missing").is_none());
    }
}
