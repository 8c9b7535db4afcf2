//! File System Run Store
//!
//! Stores run records on the local filesystem:
//!
//! ```text
//! <base>/jobs/<job_id>/job.json
//! <base>/jobs/<job_id>/runs/<run_id>/setting.json
//! <base>/jobs/<job_id>/runs/<run_id>/checkpoints/<step:08>.json
//! <base>/jobs/<job_id>/runs/<run_id>/events.jsonl
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::events_log::EventsLog;
use super::traits::{RunStore, StorageError, StorageResult};
use crate::checkpoint::chain::validate_successor;
use crate::checkpoint::models::Checkpoint;
use crate::model::{Job, RunEvent, RunSetting};

/// File system run store
///
/// JSON records are written atomically (temp file + rename); events are
/// appended to a JSONL log per run.
pub struct FileRunStore {
    base_path: PathBuf,
    // Serializes the read-validate-write sequence of checkpoint appends
    write_lock: Mutex<()>,
}

impl FileRunStore {
    /// Create a new file run store
    ///
    /// # Arguments
    /// * `base_path` - Base directory for all records
    pub fn new<P: AsRef<Path>>(base_path: P) -> StorageResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Ids are used verbatim as directory names, so anything that is not a
    /// single plain path component is rejected
    fn segment(id: &str) -> StorageResult<&str> {
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(id)
    }

    fn job_dir(&self, job_id: &str) -> StorageResult<PathBuf> {
        Ok(self.base_path.join("jobs").join(Self::segment(job_id)?))
    }

    fn run_dir(&self, job_id: &str, run_id: &str) -> StorageResult<PathBuf> {
        Ok(self.job_dir(job_id)?.join("runs").join(Self::segment(run_id)?))
    }

    fn checkpoint_dir(&self, job_id: &str, run_id: &str) -> StorageResult<PathBuf> {
        Ok(self.run_dir(job_id, run_id)?.join("checkpoints"))
    }

    fn checkpoint_path(
        &self,
        job_id: &str,
        run_id: &str,
        step_number: u32,
    ) -> StorageResult<PathBuf> {
        Ok(self
            .checkpoint_dir(job_id, run_id)?
            .join(format!("{:08}.json", step_number)))
    }

    async fn write_json<T: Serialize + Sync>(&self, path: &Path, value: &T) -> StorageResult<()> {
        let data = serde_json::to_vec_pretty(value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file + rename pattern
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> StorageResult<Option<T>> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| StorageError::Deserialization(format!("{}: {}", path.display(), e)))
    }

    /// Step numbers present in a run's checkpoint directory, ascending
    async fn list_steps(&self, job_id: &str, run_id: &str) -> StorageResult<Vec<u32>> {
        let dir = self.checkpoint_dir(job_id, run_id)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut steps = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(step) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u32>().ok())
            {
                steps.push(step);
            }
        }
        steps.sort_unstable();
        Ok(steps)
    }

    async fn list_runs(&self, job_id: &str) -> StorageResult<Vec<String>> {
        let dir = self.job_dir(job_id)?.join("runs");
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut runs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                runs.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(runs)
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    fn backend_type(&self) -> &'static str {
        "file"
    }

    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;

        let path = self.checkpoint_path(
            &checkpoint.job_id,
            &checkpoint.run_id,
            checkpoint.step_number,
        )?;
        if fs::try_exists(&path).await? {
            return Err(StorageError::Conflict(format!(
                "checkpoint for step {} of run {} already exists",
                checkpoint.step_number, checkpoint.run_id
            )));
        }

        let previous = self
            .retrieve_latest_checkpoint(&checkpoint.job_id, &checkpoint.run_id)
            .await?;
        validate_successor(previous.as_ref(), checkpoint)?;

        self.write_json(&path, checkpoint).await?;
        tracing::debug!(
            job_id = %checkpoint.job_id,
            run_id = %checkpoint.run_id,
            step = checkpoint.step_number,
            "Checkpoint written to {}",
            path.display()
        );
        Ok(())
    }

    async fn retrieve_latest_checkpoint(
        &self,
        job_id: &str,
        run_id: &str,
    ) -> StorageResult<Option<Checkpoint>> {
        let Some(step) = self.list_steps(job_id, run_id).await?.pop() else {
            return Ok(None);
        };
        self.read_json(&self.checkpoint_path(job_id, run_id, step)?)
            .await
    }

    async fn retrieve_checkpoint(
        &self,
        job_id: &str,
        run_id: &str,
        step_number: u32,
    ) -> StorageResult<Checkpoint> {
        self.read_json(&self.checkpoint_path(job_id, run_id, step_number)?)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}/{}", job_id, run_id, step_number)))
    }

    async fn list_checkpoints_by_job(&self, job_id: &str) -> StorageResult<Vec<Checkpoint>> {
        let mut checkpoints = Vec::new();
        for run_id in self.list_runs(job_id).await? {
            for step in self.list_steps(job_id, &run_id).await? {
                if let Some(cp) = self
                    .read_json::<Checkpoint>(&self.checkpoint_path(job_id, &run_id, step)?)
                    .await?
                {
                    checkpoints.push(cp);
                }
            }
        }
        checkpoints.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.run_id.cmp(&b.run_id))
                .then_with(|| a.step_number.cmp(&b.step_number))
        });
        Ok(checkpoints)
    }

    async fn store_job(&self, job: &Job) -> StorageResult<()> {
        self.write_json(&self.job_dir(&job.id)?.join("job.json"), job)
            .await
    }

    async fn retrieve_job(&self, job_id: &str) -> StorageResult<Option<Job>> {
        self.read_json(&self.job_dir(job_id)?.join("job.json")).await
    }

    async fn store_run_setting(&self, setting: &RunSetting) -> StorageResult<()> {
        let path = self
            .run_dir(&setting.job_id, &setting.run_id)?
            .join("setting.json");
        self.write_json(&path, setting).await
    }

    async fn retrieve_run_setting(
        &self,
        job_id: &str,
        run_id: &str,
    ) -> StorageResult<Option<RunSetting>> {
        self.read_json(&self.run_dir(job_id, run_id)?.join("setting.json"))
            .await
    }

    async fn store_event(&self, event: &RunEvent) -> StorageResult<()> {
        EventsLog::new(&self.run_dir(&event.job_id, &event.run_id)?).append(event)
    }

    async fn list_events(&self, job_id: &str, run_id: &str) -> StorageResult<Vec<RunEvent>> {
        EventsLog::new(&self.run_dir(job_id, run_id)?).read_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{create_initial_checkpoint, create_next_step_checkpoint};
    use crate::model::{Expert, Message, RunInput};
    use tempfile::TempDir;

    fn initial() -> Checkpoint {
        let expert = Expert::new("e", "E", "instr");
        create_initial_checkpoint("job", "run", &expert, vec![Message::user("q")])
    }

    #[tokio::test]
    async fn test_checkpoint_roundtrip_and_latest() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRunStore::new(temp_dir.path()).unwrap();

        assert!(store
            .retrieve_latest_checkpoint("job", "run")
            .await
            .unwrap()
            .is_none());

        let first = initial();
        let second = create_next_step_checkpoint(&first, vec![Message::expert("a", vec![])]);
        store.store_checkpoint(&first).await.unwrap();
        store.store_checkpoint(&second).await.unwrap();

        let latest = store.retrieve_latest_checkpoint("job", "run").await.unwrap();
        assert_eq!(latest, Some(second));
        assert!(temp_dir
            .path()
            .join("jobs/job/runs/run/checkpoints/00000001.json")
            .exists());
        assert!(!temp_dir
            .path()
            .join("jobs/job/runs/run/checkpoints/00000001.tmp")
            .exists());
    }

    #[tokio::test]
    async fn test_rewrite_and_gap_are_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRunStore::new(temp_dir.path()).unwrap();
        let first = initial();
        store.store_checkpoint(&first).await.unwrap();

        assert!(matches!(
            store.store_checkpoint(&first).await,
            Err(StorageError::Conflict(_))
        ));

        let mut gap = create_next_step_checkpoint(&first, vec![Message::user("x")]);
        gap.step_number = 5;
        assert!(matches!(
            store.store_checkpoint(&gap).await,
            Err(StorageError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_step_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRunStore::new(temp_dir.path()).unwrap();
        let result = store.retrieve_checkpoint("job", "run", 3).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_setting_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRunStore::new(temp_dir.path()).unwrap();
        let setting = RunSetting::new("job", "run", "e", "model", RunInput::query("hi"));
        store.store_run_setting(&setting).await.unwrap();
        assert_eq!(
            store.retrieve_run_setting("job", "run").await.unwrap(),
            Some(setting)
        );
        assert!(store.retrieve_run_setting("job", "x").await.unwrap().is_none());
    }

    #[test]
    fn test_directory_traversal_prevention() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRunStore::new(temp_dir.path()).unwrap();
        for bad in ["../../etc", "..", "a/b", "a\\b", ""] {
            assert!(
                matches!(store.run_dir(bad, "run"), Err(StorageError::InvalidId(id)) if id == bad),
                "{:?} was accepted",
                bad
            );
        }
        let path = store.run_dir("a..b", "a_b").unwrap();
        assert!(path.starts_with(temp_dir.path()));
    }

    #[tokio::test]
    async fn test_ids_with_separators_do_not_collide() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRunStore::new(temp_dir.path()).unwrap();

        let mut job = Job::start("a_b", "e", None);
        store.store_job(&job).await.unwrap();
        job.id = "a/b".to_string();
        assert!(matches!(
            store.store_job(&job).await,
            Err(StorageError::InvalidId(_))
        ));
        assert!(matches!(
            store.retrieve_job("a/b").await,
            Err(StorageError::InvalidId(_))
        ));
        assert_eq!(store.retrieve_job("a_b").await.unwrap().unwrap().id, "a_b");
    }
}
