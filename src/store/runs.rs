//! Run repository over a [`KvStore`].
//!
//! Key layout:
//! - `dpp_runs`: run index `{ runs, last_updated }`, newest first, at most
//!   [`RUN_INDEX_LIMIT`] entries
//! - `dpp_run_<run_id>`: run detail, source files stripped
//! - `dpp_discard_knowledge`: map of run id to [`DiscardKnowledge`]
//!
//! Every operation is best-effort. Failures are logged and the call degrades
//! to a no-op, `None` or an empty list.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::clock::Clock;
use crate::run::{DiscardKnowledge, Run, RunSummary};

use super::kv::KvStore;

/// Entries kept in the run index; older runs fall out of the list.
pub const RUN_INDEX_LIMIT: usize = 50;

const RUNS_LIST_KEY: &str = "dpp_runs";
const RUN_PREFIX: &str = "dpp_run_";
const DISCARD_KNOWLEDGE_KEY: &str = "dpp_discard_knowledge";

#[derive(Debug, Serialize, Deserialize)]
struct RunIndex {
    runs: Vec<RunSummary>,
    last_updated: DateTime<Utc>,
}

pub struct RunStore {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    /// Held across read-modify-write of the shared index and discard map.
    shared_keys: Mutex<()>,
}

fn run_key(run_id: &str) -> String {
    format!("{RUN_PREFIX}{run_id}")
}

fn sort_newest_first(runs: &mut [RunSummary]) {
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

impl RunStore {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            clock,
            shared_keys: Mutex::new(()),
        }
    }

    fn lock_shared(&self) -> MutexGuard<'_, ()> {
        self.shared_keys.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.kv.set(key, &raw)
    }

    fn write_index(&self, runs: Vec<RunSummary>) -> Result<()> {
        let index = RunIndex {
            runs,
            last_updated: self.clock.now(),
        };
        self.write(RUNS_LIST_KEY, &index)
    }

    /// Run summaries, newest first.
    pub fn list_runs(&self) -> Vec<RunSummary> {
        match self.read::<RunIndex>(RUNS_LIST_KEY) {
            Ok(Some(index)) => {
                let mut runs = index.runs;
                sort_newest_first(&mut runs);
                runs
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(error = %e, "failed to parse runs list");
                Vec::new()
            }
        }
    }

    /// Insert or replace a summary, keeping the newest [`RUN_INDEX_LIMIT`].
    fn upsert_summary(&self, summary: RunSummary) -> Result<()> {
        let _guard = self.lock_shared();
        let mut runs = self.list_runs();
        match runs.iter_mut().find(|r| r.run_id == summary.run_id) {
            Some(existing) => *existing = summary,
            None => runs.push(summary),
        }
        sort_newest_first(&mut runs);
        if runs.len() > RUN_INDEX_LIMIT {
            let evicted = runs.split_off(RUN_INDEX_LIMIT);
            debug!(count = evicted.len(), "evicted runs from index");
        }
        self.write_index(runs)
    }

    /// Persist a run detail and refresh its index entry.
    pub fn save_run(&self, run: &Run) {
        let result = self
            .write(&run_key(&run.run_id), &run.persistable())
            .and_then(|()| self.upsert_summary(run.summary()));
        if let Err(e) = result {
            error!(run_id = %run.run_id, error = %e, "failed to save run");
        }
    }

    pub fn get_run(&self, run_id: &str) -> Option<Run> {
        self.read(&run_key(run_id)).unwrap_or_else(|e| {
            error!(run_id, error = %e, "failed to parse run");
            None
        })
    }

    /// Remove the detail record and the index entry.
    pub fn delete_run(&self, run_id: &str) {
        let result = self.kv.delete(&run_key(run_id)).and_then(|()| {
            let _guard = self.lock_shared();
            let runs = self
                .list_runs()
                .into_iter()
                .filter(|r| r.run_id != run_id)
                .collect();
            self.write_index(runs)
        });
        if let Err(e) = result {
            error!(run_id, error = %e, "failed to delete run");
        }
    }

    fn read_discard_map(&self) -> Result<BTreeMap<String, DiscardKnowledge>> {
        Ok(self.read(DISCARD_KNOWLEDGE_KEY)?.unwrap_or_default())
    }

    /// Store a discard-knowledge note, stamping `saved_at`. Returns the stored
    /// record, or `None` if it could not be written.
    pub fn save_discard_knowledge(
        &self,
        mut knowledge: DiscardKnowledge,
    ) -> Option<DiscardKnowledge> {
        knowledge.saved_at = Some(self.clock.now());
        let _guard = self.lock_shared();
        let result = self.read_discard_map().and_then(|mut map| {
            map.insert(knowledge.run_id.clone(), knowledge.clone());
            self.write(DISCARD_KNOWLEDGE_KEY, &map)
        });
        match result {
            Ok(()) => Some(knowledge),
            Err(e) => {
                error!(run_id = %knowledge.run_id, error = %e, "failed to save discard knowledge");
                None
            }
        }
    }

    pub fn discard_knowledge(&self, run_id: &str) -> Option<DiscardKnowledge> {
        match self.read_discard_map() {
            Ok(mut map) => map.remove(run_id),
            Err(e) => {
                error!(run_id, error = %e, "failed to get discard knowledge");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ProfileId, Sku};
    use crate::clock::ManualClock;
    use crate::run::{RunManifest, RunStatus};
    use crate::store::kv::MemoryKv;
    use crate::wizard::{SourceFile, WizardAction, WizardState};
    use chrono::Duration;

    fn store() -> (RunStore, Arc<MemoryKv>) {
        let kv = Arc::new(MemoryKv::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (RunStore::new(kv.clone(), clock), kv)
    }

    fn run_at(run_id: &str, created_at: DateTime<Utc>) -> Run {
        let inputs = WizardState::default()
            .reduce(WizardAction::SetSku(Sku::Grant))
            .reduce(WizardAction::SetProfile(ProfileId::P1))
            .reduce(WizardAction::AddFile(SourceFile {
                name: "plan.pdf".into(),
                size_bytes: 1024,
            }));
        let manifest =
            RunManifest::build(&inputs, Sku::Grant, ProfileId::P1, run_id, created_at, 30);
        Run {
            run_id: run_id.to_string(),
            created_at,
            updated_at: created_at,
            sku: Sku::Grant,
            profile_id: ProfileId::P1,
            run_name: format!("Run {run_id}"),
            status: RunStatus::Queued,
            inputs,
            manifest,
            artifacts: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn round_trip_strips_file_payloads_only() {
        let (store, _) = store();
        let run = run_at("run_a", Utc::now());
        store.save_run(&run);

        let loaded = store.get_run("run_a").unwrap();
        assert!(loaded.inputs.sources.files.is_empty());
        assert_eq!(loaded, run.persistable());
        assert_eq!(loaded.manifest.inputs.files.len(), 1);
    }

    #[test]
    fn missing_run_is_none() {
        let (store, _) = store();
        assert!(store.get_run("run_nope").is_none());
    }

    #[test]
    fn save_updates_existing_index_entry() {
        let (store, _) = store();
        let mut run = run_at("run_a", Utc::now());
        store.save_run(&run);
        run.status = RunStatus::Running;
        store.save_run(&run);

        let runs = store.list_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Running);
    }

    #[test]
    fn list_is_newest_first_and_capped() {
        let (store, _) = store();
        let base = Utc::now();
        // Save out of order to exercise sorting.
        for i in (0..55).rev() {
            store.save_run(&run_at(&format!("run_{i:02}"), base + Duration::seconds(i)));
        }

        let runs = store.list_runs();
        assert_eq!(runs.len(), RUN_INDEX_LIMIT);
        assert_eq!(runs[0].run_id, "run_54");
        assert_eq!(runs[49].run_id, "run_05");
        assert!(runs.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        // Evicted runs keep their detail record.
        assert!(store.get_run("run_00").is_some());
    }

    #[test]
    fn delete_removes_detail_and_index_entry() {
        let (store, _) = store();
        store.save_run(&run_at("run_a", Utc::now()));
        store.save_run(&run_at("run_b", Utc::now()));
        store.delete_run("run_a");

        assert!(store.get_run("run_a").is_none());
        let ids: Vec<_> = store.list_runs().into_iter().map(|r| r.run_id).collect();
        assert_eq!(ids, vec!["run_b".to_string()]);
    }

    #[test]
    fn corrupt_records_degrade_to_empty() {
        let (store, kv) = store();
        kv.set(RUNS_LIST_KEY, "not json").unwrap();
        kv.set("dpp_run_run_x", "{").unwrap();
        kv.set(DISCARD_KNOWLEDGE_KEY, "[").unwrap();

        assert!(store.list_runs().is_empty());
        assert!(store.get_run("run_x").is_none());
        assert!(store.discard_knowledge("run_x").is_none());
    }

    #[test]
    fn discard_knowledge_round_trip() {
        let (store, _) = store();
        let run = run_at("run_f", Utc::now());
        let knowledge = DiscardKnowledge::from_run(&run, Some("scope unclear".into()), Utc::now());

        let saved = store.save_discard_knowledge(knowledge).unwrap();
        assert!(saved.saved_at.is_some());

        let loaded = store.discard_knowledge("run_f").unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.note.as_deref(), Some("scope unclear"));
        assert!(store.discard_knowledge("run_other").is_none());
    }

    #[test]
    fn discard_knowledge_keeps_entries_per_run() {
        let (store, _) = store();
        let now = Utc::now();
        store.save_discard_knowledge(DiscardKnowledge::from_run(&run_at("run_1", now), None, now));
        store.save_discard_knowledge(DiscardKnowledge::from_run(&run_at("run_2", now), None, now));
        assert!(store.discard_knowledge("run_1").is_some());
        assert!(store.discard_knowledge("run_2").is_some());
    }

    #[test]
    fn concurrent_saves_keep_every_index_entry() {
        let (store, _) = store();
        let store = Arc::new(store);
        let base = Utc::now();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let at = base + Duration::seconds(t * 10 + i);
                        store.save_run(&run_at(&format!("run_{t}_{i}"), at));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.list_runs().len(), 40);
    }
}
