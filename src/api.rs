use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::{DpackError, ErrorCode};
use crate::run::{DiscardKnowledge, Run, RunManifest, RunStatus, RunSummary, new_run_id};
use crate::scheduler::{RunScheduler, TimerDriver};
use crate::store::{KvStore, RunStore};
use crate::telemetry::{TelemetryEvent, log_event};
use crate::wizard::WizardState;

/// In-process run API backed by the local store and the mock scheduler.
pub struct RunApi {
    store: Arc<RunStore>,
    scheduler: Arc<RunScheduler>,
    clock: Arc<dyn Clock>,
    max_url_count: usize,
}

impl RunApi {
    /// Build the API over `kv`. Fails when mock mode is off, since no other
    /// backend exists.
    pub fn new(
        config: &AppConfig,
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        timers: Arc<dyn TimerDriver>,
    ) -> Result<Self, DpackError> {
        if !config.mock_mode {
            return Err(DpackError::Unavailable(
                "no run backend is available outside mock mode".into(),
            ));
        }
        let store = Arc::new(RunStore::new(kv, clock.clone()));
        let scheduler = RunScheduler::new(store.clone(), clock.clone(), timers);
        // Resume timers for runs left in flight by an earlier session.
        for summary in store.list_runs() {
            if !summary.status.is_terminal() {
                scheduler.schedule(&summary.run_id);
            }
        }
        Ok(Self {
            store,
            scheduler,
            clock,
            max_url_count: config.max_url_count,
        })
    }

    /// Submit the wizard inputs as a new run.
    pub async fn create_run(&self, inputs: WizardState) -> Result<RunSummary, DpackError> {
        let (Some(sku), Some(profile_id)) = (inputs.sku, inputs.profile_id) else {
            return Err(DpackError::validation_with(
                ErrorCode::ValidationRequired,
                "SKU and profile are required",
            ));
        };

        let mut inputs = inputs;
        if inputs.secure_mode && !inputs.sources.urls.is_empty() {
            warn!(
                count = inputs.sources.urls.len(),
                "secure mode: dropping URL sources"
            );
            inputs.sources.urls.clear();
        }

        let run_id = new_run_id();
        let now = self.clock.now();
        let run_name = match inputs.run_name.trim() {
            "" => format!("Run {run_id}"),
            name => name.to_string(),
        };
        let manifest = RunManifest::build(
            &inputs,
            sku,
            profile_id,
            &run_id,
            now,
            self.max_url_count,
        );

        let run = Run {
            run_id,
            created_at: now,
            updated_at: now,
            sku,
            profile_id,
            run_name,
            status: RunStatus::Queued,
            inputs,
            manifest,
            artifacts: Vec::new(),
            error: None,
        };

        self.store.save_run(&run);
        self.scheduler.register(&run);
        info!(run_id = %run.run_id, %sku, %profile_id, "run created");
        Ok(run.summary())
    }

    /// Current state of a run, reconciled against the clock.
    pub async fn get_run(&self, run_id: &str) -> Result<Option<Run>, DpackError> {
        Ok(self.scheduler.reconcile(run_id))
    }

    /// Run summaries, newest first, with in-flight runs brought up to date.
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>, DpackError> {
        let mut runs = self.store.list_runs();
        for summary in runs.iter_mut().filter(|s| !s.status.is_terminal()) {
            if let Some(run) = self.scheduler.reconcile(&summary.run_id) {
                summary.status = run.status;
            }
        }
        Ok(runs)
    }

    /// Remove a run. Deleting an unknown id is a no-op.
    pub async fn delete_run(&self, run_id: &str) -> Result<(), DpackError> {
        self.scheduler.forget(run_id);
        self.store.delete_run(run_id);
        info!(run_id, "run deleted");
        Ok(())
    }

    /// Keep the inputs and error of a failed run for later review.
    pub async fn save_discard_knowledge(
        &self,
        run_id: &str,
        note: Option<String>,
    ) -> Result<DiscardKnowledge, DpackError> {
        let run = self.require_run(run_id)?;
        if run.status != RunStatus::Failed {
            return Err(DpackError::InvalidState {
                run_id: run.run_id,
                status: run.status,
                expected: RunStatus::Failed,
            });
        }
        let knowledge = DiscardKnowledge::from_run(&run, note, self.clock.now());
        self.store
            .save_discard_knowledge(knowledge)
            .ok_or_else(|| DpackError::Unavailable("could not store discard knowledge".into()))
    }

    pub async fn discard_knowledge(
        &self,
        run_id: &str,
    ) -> Result<Option<DiscardKnowledge>, DpackError> {
        Ok(self.store.discard_knowledge(run_id))
    }

    /// Manifest of a run as pretty-printed JSON.
    pub async fn export_manifest(&self, run_id: &str) -> Result<String, DpackError> {
        let run = self.require_run(run_id)?;
        let json = run.manifest.to_pretty_json()?;
        log_event(&TelemetryEvent::ResultDownloaded {
            artifact_type: "manifest_json".into(),
        });
        Ok(json)
    }

    fn require_run(&self, run_id: &str) -> Result<Run, DpackError> {
        self.scheduler
            .reconcile(run_id)
            .ok_or_else(|| DpackError::RunNotFound(run_id.to_string()))
    }
}
