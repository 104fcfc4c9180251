//! Row assembly: a file's sub-results become one immutable [`OutputRow`].

use std::path::Path;

use crate::engine::tools::{extension_of, stem_of};
use crate::types::{ClassificationResult, FileTask, OutputRow};

use super::error_handler::{Stage, StageErrors};

/// A file that passed the fingerprint check and has been hashed, waiting for its optional
/// classification.
#[derive(Clone, Debug)]
pub struct PendingRow {
    pub task: FileTask,
    pub digest: Option<String>,
    pub errors: StageErrors,
}

impl PendingRow {
    pub fn new(task: FileTask) -> Self {
        Self {
            task,
            digest: None,
            errors: StageErrors::new(),
        }
    }

    /// Complete the row. A classification error is merged after the earlier stages.
    pub fn into_row(mut self, classification: Option<ClassificationResult>) -> (OutputRow, FileTask) {
        let kind = classification.map(|c| {
            if let Some(err) = c.error {
                self.errors.push(Stage::Classify, err);
            }
            c.kind
        });
        let row = OutputRow {
            name: self.task.name.clone(),
            extension: self.task.extension.clone(),
            size: Some(self.task.size),
            rel_path: self.task.rel_path.clone(),
            subtree: self.task.subtree.clone(),
            classification: kind,
            digest: self.digest,
            errors: self.errors.merged(),
        };
        (row, self.task)
    }
}

/// Row for a file whose metadata could not be obtained: name and path only, plus the reason.
pub fn error_row(
    abs_path: &Path,
    rel_path: String,
    subtree: Option<String>,
    errors: &StageErrors,
) -> OutputRow {
    OutputRow {
        name: stem_of(abs_path),
        extension: extension_of(abs_path),
        size: None,
        rel_path,
        subtree,
        classification: None,
        digest: None,
        errors: errors.merged(),
    }
}
