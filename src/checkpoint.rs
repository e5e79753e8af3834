use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ReelError, ReelResult};

/// Pipeline stages in their fixed execution order. The derived `Ord`
/// follows declaration order, which is what stage comparisons rely on.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    Initialized,
    Compiled,
    SegmentsRendered,
    Rendered,
    ThumbnailExtracted,
    Completed,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ArtifactRecord {
    pub path: PathBuf,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CheckpointState {
    pub id: String,
    pub stage: RenderStage,
    pub progress: u8,
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactRecord>,
    /// Unix epoch milliseconds of the last save.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

/// File-backed progress record for one render job. Every mutation is
/// written through to disk immediately, so a crashed run can be resumed
/// from the last completed stage.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: CheckpointState,
}

pub fn checkpoint_path(job_id: &str, dir: &Path) -> PathBuf {
    dir.join(format!("render.job.{job_id}.json"))
}

impl CheckpointStore {
    pub fn new(job_id: &str, dir: &Path) -> Self {
        Self {
            path: checkpoint_path(job_id, dir),
            state: CheckpointState {
                id: job_id.to_string(),
                stage: RenderStage::Initialized,
                progress: 0,
                artifacts: BTreeMap::new(),
                timestamp: now_millis(),
                metadata: serde_json::Value::Null,
            },
        }
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the initial record. Any previous record for the same job is
    /// overwritten.
    pub fn initialize(&mut self) -> ReelResult<()> {
        self.state.stage = RenderStage::Initialized;
        self.state.progress = 0;
        self.state.artifacts.clear();
        self.save()
    }

    /// Loads an existing record from disk. A missing, unreadable, or corrupt
    /// file is not an error; it reports `Ok(false)` and leaves the in-memory
    /// state untouched so the caller can start fresh.
    pub fn load(&mut self) -> ReelResult<bool> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "checkpoint file is unreadable, starting over"
                );
                return Ok(false);
            }
        };
        match serde_json::from_str::<CheckpointState>(&raw) {
            Ok(state) => {
                self.state = state;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "checkpoint file is corrupt, starting over"
                );
                Ok(false)
            }
        }
    }

    pub fn save(&mut self) -> ReelResult<()> {
        self.state.timestamp = now_millis();
        let raw = serde_json::to_string_pretty(&self.state)
            .map_err(|e| ReelError::checkpoint(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| {
            ReelError::checkpoint(format!("failed to write {}: {e}", self.path.display()))
        })
    }

    pub fn update_stage(&mut self, stage: RenderStage, progress: u8) -> ReelResult<()> {
        tracing::debug!(?stage, progress, "checkpoint advanced");
        self.state.stage = stage;
        self.state.progress = progress.min(100);
        self.save()
    }

    pub fn add_artifact(
        &mut self,
        name: &str,
        path: PathBuf,
        size: u64,
        hash: Option<String>,
    ) -> ReelResult<()> {
        self.state
            .artifacts
            .insert(name.to_string(), ArtifactRecord { path, size, hash });
        self.save()
    }

    /// Whether `stage` has already run. Stages form a total order, so any
    /// recorded stage at or past the queried one counts as completed.
    pub fn is_stage_completed(&self, stage: RenderStage) -> bool {
        self.state.stage >= stage
    }

    pub fn mark_completed(&mut self) -> ReelResult<()> {
        self.update_stage(RenderStage::Completed, 100)
    }

    /// Removes the record from disk. Already-gone is fine.
    pub fn cleanup(&self) -> ReelResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReelError::checkpoint(format!(
                "failed to remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

pub fn hash_file_sha256(path: &Path) -> ReelResult<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| ReelError::checkpoint(format!("failed to read {}: {e}", path.display())))?;
    let digest = Sha256::digest(&bytes);
    let mut hex = String::with_capacity(64);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    Ok(hex)
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::new("job-1", dir.path());
        store.initialize().unwrap();
        store
            .update_stage(RenderStage::Compiled, 25)
            .unwrap();
        store
            .add_artifact("filtergraph", dir.path().join("graph.txt"), 512, None)
            .unwrap();

        let mut fresh = CheckpointStore::new("job-1", dir.path());
        assert!(fresh.load().unwrap());
        assert_eq!(fresh.state().stage, RenderStage::Compiled);
        assert_eq!(fresh.state().progress, 25);
        assert_eq!(fresh.state().artifacts.len(), 1);
        assert_eq!(fresh.state().artifacts["filtergraph"].size, 512);
    }

    #[test]
    fn stage_completion_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::new("job-2", dir.path());
        store.update_stage(RenderStage::Rendered, 80).unwrap();

        assert!(store.is_stage_completed(RenderStage::Initialized));
        assert!(store.is_stage_completed(RenderStage::Compiled));
        assert!(store.is_stage_completed(RenderStage::SegmentsRendered));
        assert!(store.is_stage_completed(RenderStage::Rendered));
        assert!(!store.is_stage_completed(RenderStage::ThumbnailExtracted));
        assert!(!store.is_stage_completed(RenderStage::Completed));
    }

    #[test]
    fn missing_file_loads_as_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::new("nope", dir.path());
        assert!(!store.load().unwrap());
        assert_eq!(store.state().stage, RenderStage::Initialized);
    }

    #[test]
    fn corrupt_file_loads_as_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = checkpoint_path("job-3", dir.path());
        std::fs::write(&path, "{not json").unwrap();

        let mut store = CheckpointStore::new("job-3", dir.path());
        assert!(!store.load().unwrap());
        assert_eq!(store.state().stage, RenderStage::Initialized);
    }

    #[test]
    fn unreadable_file_loads_as_fresh() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the file's place fails the read with something
        // other than NotFound.
        std::fs::create_dir(checkpoint_path("job-6", dir.path())).unwrap();

        let mut store = CheckpointStore::new("job-6", dir.path());
        assert!(!store.load().unwrap());
        assert_eq!(store.state().stage, RenderStage::Initialized);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::new("job-4", dir.path());
        store.initialize().unwrap();
        assert!(store.path().exists());
        store.cleanup().unwrap();
        assert!(!store.path().exists());
        store.cleanup().unwrap();
    }

    #[test]
    fn progress_is_clamped_to_one_hundred() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::new("job-5", dir.path());
        store.update_stage(RenderStage::Rendered, 250).unwrap();
        assert_eq!(store.state().progress, 100);
    }

    #[test]
    fn sha256_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(
            hash_file_sha256(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
