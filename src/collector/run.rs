//! Minimal view of a persisted training run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Anything that knows the output directory of a training run.
pub trait ResultDir {
    /// Directory the run writes its logs and images into.
    fn path_name(&self) -> &Path;
}

/// A training run as the dashboard stores it: an optional database id plus
/// its output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRun {
    /// Row id in the dashboard database, when the run has been persisted.
    pub id: Option<i64>,
    /// Output directory of the run.
    pub path_name: PathBuf,
}

impl TrainingRun {
    /// Unpersisted run pointing at `path_name`.
    pub fn new(path_name: impl Into<PathBuf>) -> Self {
        Self {
            id: None,
            path_name: path_name.into(),
        }
    }

    /// Attach a database id.
    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

impl ResultDir for TrainingRun {
    fn path_name(&self) -> &Path {
        &self.path_name
    }
}

impl ResultDir for Path {
    fn path_name(&self) -> &Path {
        self
    }
}

impl ResultDir for PathBuf {
    fn path_name(&self) -> &Path {
        self
    }
}
