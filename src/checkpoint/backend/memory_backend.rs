//! In-Memory Run Store
//!
//! Checkpoint chains held in an arena keyed by `(job_id, run_id)`. Used for
//! tests and for runs that do not need to survive the process.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::traits::{RunStore, StorageError, StorageResult};
use crate::checkpoint::chain::CheckpointChain;
use crate::checkpoint::models::Checkpoint;
use crate::model::{Job, RunEvent, RunSetting};

type RunKey = (String, String);

#[derive(Default)]
struct MemoryState {
    chains: HashMap<RunKey, CheckpointChain>,
    // (run_id, step_number) per job in the order checkpoints were stored
    job_index: HashMap<String, Vec<(String, u32)>>,
    jobs: HashMap<String, Job>,
    settings: HashMap<RunKey, RunSetting>,
    events: HashMap<RunKey, Vec<RunEvent>>,
}

/// In-memory storage for testing and local development.
#[derive(Default)]
pub struct InMemoryRunStore {
    state: RwLock<MemoryState>,
}

impl InMemoryRunStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn run_key(job_id: &str, run_id: &str) -> RunKey {
    (job_id.to_string(), run_id.to_string())
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state
            .chains
            .entry(run_key(&checkpoint.job_id, &checkpoint.run_id))
            .or_default()
            .push(checkpoint.clone())?;
        state
            .job_index
            .entry(checkpoint.job_id.clone())
            .or_default()
            .push((checkpoint.run_id.clone(), checkpoint.step_number));
        Ok(())
    }

    async fn retrieve_latest_checkpoint(
        &self,
        job_id: &str,
        run_id: &str,
    ) -> StorageResult<Option<Checkpoint>> {
        let state = self.state.read().await;
        Ok(state
            .chains
            .get(&run_key(job_id, run_id))
            .and_then(|chain| chain.latest().cloned()))
    }

    async fn retrieve_checkpoint(
        &self,
        job_id: &str,
        run_id: &str,
        step_number: u32,
    ) -> StorageResult<Checkpoint> {
        let state = self.state.read().await;
        state
            .chains
            .get(&run_key(job_id, run_id))
            .and_then(|chain| chain.get(step_number).cloned())
            .ok_or_else(|| {
                StorageError::NotFound(format!("{}/{}/{}", job_id, run_id, step_number))
            })
    }

    async fn list_checkpoints_by_job(&self, job_id: &str) -> StorageResult<Vec<Checkpoint>> {
        let state = self.state.read().await;
        let Some(index) = state.job_index.get(job_id) else {
            return Ok(Vec::new());
        };
        Ok(index
            .iter()
            .filter_map(|(run_id, step)| {
                state
                    .chains
                    .get(&run_key(job_id, run_id))
                    .and_then(|chain| chain.get(*step).cloned())
            })
            .collect())
    }

    async fn store_job(&self, job: &Job) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn retrieve_job(&self, job_id: &str) -> StorageResult<Option<Job>> {
        let state = self.state.read().await;
        Ok(state.jobs.get(job_id).cloned())
    }

    async fn store_run_setting(&self, setting: &RunSetting) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state
            .settings
            .insert(run_key(&setting.job_id, &setting.run_id), setting.clone());
        Ok(())
    }

    async fn retrieve_run_setting(
        &self,
        job_id: &str,
        run_id: &str,
    ) -> StorageResult<Option<RunSetting>> {
        let state = self.state.read().await;
        Ok(state.settings.get(&run_key(job_id, run_id)).cloned())
    }

    async fn store_event(&self, event: &RunEvent) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state
            .events
            .entry(run_key(&event.job_id, &event.run_id))
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn list_events(&self, job_id: &str, run_id: &str) -> StorageResult<Vec<RunEvent>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .get(&run_key(job_id, run_id))
            .cloned()
            .unwrap_or_default())
    }
}
