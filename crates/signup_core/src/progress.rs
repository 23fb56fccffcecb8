use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::RwLock,
};

use serde::{Deserialize, Serialize};
use shared::{
    domain::StepName,
    protocol::{SavedStep, StepStatus, SubmittedSiteStep},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProgressStoreError {
    #[error("failed to read progress file '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write progress file '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("malformed progress file '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode progress: {0}")]
    Encode(serde_json::Error),
}

/// Where signup steps park their form between mounts.
pub trait StepProgressStore: Send + Sync {
    fn load_step(&self, step_name: &StepName) -> Result<Option<SavedStep>, ProgressStoreError>;
    fn save_step(&self, step: SavedStep) -> Result<(), ProgressStoreError>;
    fn submit_step(&self, submission: SubmittedSiteStep) -> Result<(), ProgressStoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignupProgress {
    #[serde(default)]
    pub steps: BTreeMap<StepName, SavedStep>,
    #[serde(default)]
    pub submitted: Vec<SubmittedSiteStep>,
}

impl SignupProgress {
    fn record_submission(&mut self, submission: SubmittedSiteStep) {
        let mut saved = SavedStep::new(submission.step_name.clone(), submission.form.clone());
        saved.status = StepStatus::Completed;
        saved.saved_at = submission.submitted_at;
        self.steps.insert(submission.step_name.clone(), saved);
        self.submitted
            .retain(|existing| existing.step_name != submission.step_name);
        self.submitted.push(submission);
    }
}

#[derive(Default)]
pub struct InMemoryProgressStore {
    state: RwLock<SignupProgress>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(step: SavedStep) -> Self {
        let store = Self::new();
        store.write().steps.insert(step.step_name.clone(), step);
        store
    }

    pub fn progress(&self) -> SignupProgress {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SignupProgress> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StepProgressStore for InMemoryProgressStore {
    fn load_step(&self, step_name: &StepName) -> Result<Option<SavedStep>, ProgressStoreError> {
        Ok(self.progress().steps.get(step_name).cloned())
    }

    fn save_step(&self, step: SavedStep) -> Result<(), ProgressStoreError> {
        self.write().steps.insert(step.step_name.clone(), step);
        Ok(())
    }

    fn submit_step(&self, submission: SubmittedSiteStep) -> Result<(), ProgressStoreError> {
        self.write().record_submission(submission);
        Ok(())
    }
}

/// Keeps the whole progress document in one JSON file, rewritten on every
/// save.
pub struct JsonFileProgressStore {
    path: PathBuf,
}

impl JsonFileProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<SignupProgress, ProgressStoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(SignupProgress::default());
            }
            Err(source) => {
                return Err(ProgressStoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&raw).map_err(|source| ProgressStoreError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, progress: &SignupProgress) -> Result<(), ProgressStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ProgressStoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        let raw = serde_json::to_vec_pretty(progress).map_err(ProgressStoreError::Encode)?;
        fs::write(&self.path, raw).map_err(|source| ProgressStoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "progress saved");
        Ok(())
    }
}

impl StepProgressStore for JsonFileProgressStore {
    fn load_step(&self, step_name: &StepName) -> Result<Option<SavedStep>, ProgressStoreError> {
        Ok(self.read()?.steps.remove(step_name))
    }

    fn save_step(&self, step: SavedStep) -> Result<(), ProgressStoreError> {
        let mut progress = self.read()?;
        progress.steps.insert(step.step_name.clone(), step);
        self.write(&progress)
    }

    fn submit_step(&self, submission: SubmittedSiteStep) -> Result<(), ProgressStoreError> {
        let mut progress = self.read()?;
        progress.record_submission(submission);
        self.write(&progress)
    }
}
