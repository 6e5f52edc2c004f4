//! Durable local buffer of in-progress answers.
//!
//! One entry per `(candidate, stage)`, stored as a JSON object
//! `questionId -> optionId` in a file named
//! `candidate_<candidateId>_stage_<stageId>.json`. Entries survive process
//! restarts and are removed only after the backend confirms the stage.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::stage::StageId;

/// Answers of one stage, keyed by question id.
pub type AnswerSheet = BTreeMap<String, String>;

const ENTRY_EXT: &str = "json";
const STAGE_MARKER: &str = "_stage_";

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("invalid buffer key component: {0:?}")]
    InvalidKey(String),

    #[error("buffer I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt buffer entry {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Key/value store for per-stage answer snapshots.
pub trait ResponseStore {
    /// Upserts the snapshot; last write wins. Saving an empty sheet removes
    /// the entry.
    fn save(&self, candidate_id: &str, stage: &StageId, answers: &AnswerSheet)
    -> Result<(), BufferError>;

    /// Most recent snapshot, or an empty sheet.
    fn load(&self, candidate_id: &str, stage: &StageId) -> Result<AnswerSheet, BufferError>;

    /// Removes the entry. Clearing a missing entry succeeds.
    fn clear(&self, candidate_id: &str, stage: &StageId) -> Result<(), BufferError>;

    /// Stages of this candidate that still hold unsubmitted answers.
    fn pending_stages(&self, candidate_id: &str) -> Result<Vec<StageId>, BufferError>;
}

/// Builds the storage key for an entry.
pub fn buffer_key(candidate_id: &str, stage: &StageId) -> String {
    format!("candidate_{candidate_id}{STAGE_MARKER}{stage}")
}

/// File-per-entry [`ResponseStore`] rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileResponseBuffer {
    dir: PathBuf,
}

impl FileResponseBuffer {
    /// Opens (creating if needed) the buffer directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, BufferError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| BufferError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, candidate_id: &str, stage: &StageId) -> Result<PathBuf, BufferError> {
        validate_component(candidate_id)?;
        if candidate_id.contains(STAGE_MARKER) {
            return Err(BufferError::InvalidKey(candidate_id.to_string()));
        }
        validate_component(stage.as_str())?;
        Ok(self
            .dir
            .join(format!("{}.{ENTRY_EXT}", buffer_key(candidate_id, stage))))
    }
}

/// Rejects anything that could escape the buffer directory.
fn validate_component(value: &str) -> Result<(), BufferError> {
    let bad = value.is_empty()
        || value.contains(['/', '\\', '\0'])
        || value.contains("..");
    if bad {
        Err(BufferError::InvalidKey(value.to_string()))
    } else {
        Ok(())
    }
}

impl ResponseStore for FileResponseBuffer {
    fn save(
        &self,
        candidate_id: &str,
        stage: &StageId,
        answers: &AnswerSheet,
    ) -> Result<(), BufferError> {
        if answers.is_empty() {
            return self.clear(candidate_id, stage);
        }
        let path = self.entry_path(candidate_id, stage)?;
        let json = serde_json::to_vec(answers).map_err(|source| BufferError::Corrupt {
            path: path.clone(),
            source,
        })?;

        // Write-then-rename so a crash never leaves a half-written entry.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| BufferError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| BufferError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(candidate_id, %stage, count = answers.len(), "buffered answers");
        Ok(())
    }

    fn load(&self, candidate_id: &str, stage: &StageId) -> Result<AnswerSheet, BufferError> {
        let path = self.entry_path(candidate_id, stage)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(AnswerSheet::new()),
            Err(source) => return Err(BufferError::Io { path, source }),
        };
        serde_json::from_slice(&bytes).map_err(|source| BufferError::Corrupt { path, source })
    }

    fn clear(&self, candidate_id: &str, stage: &StageId) -> Result<(), BufferError> {
        let path = self.entry_path(candidate_id, stage)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(candidate_id, %stage, "cleared buffered answers");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BufferError::Io { path, source }),
        }
    }

    fn pending_stages(&self, candidate_id: &str) -> Result<Vec<StageId>, BufferError> {
        validate_component(candidate_id)?;
        let prefix = format!("candidate_{candidate_id}{STAGE_MARKER}");
        let suffix = format!(".{ENTRY_EXT}");
        let entries = fs::read_dir(&self.dir).map_err(|source| BufferError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut stages = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| BufferError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stage) = name
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_suffix(suffix.as_str()))
                && !stage.is_empty()
            {
                stages.push(StageId::new(stage));
            }
        }
        stages.sort();
        Ok(stages)
    }
}
