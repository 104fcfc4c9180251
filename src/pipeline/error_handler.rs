//! Per-row error aggregation: stage-tagged messages merged into the row's single error field.

/// Pipeline stage a failure came from. Order here is the order in the merged field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Path normalization.
    Path,
    /// Metadata lookup.
    Stat,
    /// Content digest.
    Digest,
    /// Classification capability (or opening the file for it).
    Classify,
}

impl Stage {
    pub fn tag(self) -> &'static str {
        match self {
            Stage::Path => "path",
            Stage::Stat => "stat",
            Stage::Digest => "digest",
            Stage::Classify => "classify",
        }
    }
}

pub const ERROR_SEPARATOR: &str = " | ";

/// Accumulates failures for one file. Any stage may contribute zero or more messages.
#[derive(Clone, Debug, Default)]
pub struct StageErrors {
    entries: Vec<(Stage, String)>,
}

impl StageErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: Stage, msg: impl Into<String>) {
        let msg = msg.into();
        let msg = msg.trim();
        if !msg.is_empty() {
            self.entries.push((stage, msg.to_string()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Combine with another set (e.g. the classify stage finished on a worker).
    pub fn extend(&mut self, other: StageErrors) {
        self.entries.extend(other.entries);
    }

    /// `"<tag>: <msg> | <tag>: <msg>"`, ordered by stage then by arrival. `None` when empty.
    pub fn merged(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let mut sorted: Vec<&(Stage, String)> = self.entries.iter().collect();
        // Stable: keeps arrival order within a stage.
        sorted.sort_by_key(|(stage, _)| *stage);
        Some(
            sorted
                .iter()
                .map(|(stage, msg)| format!("{}: {}", stage.tag(), msg))
                .collect::<Vec<_>>()
                .join(ERROR_SEPARATOR),
        )
    }
}
