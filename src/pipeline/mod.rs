//! Pipeline components: walk, stat, classifier pool, error aggregation, output, checkpoints.

pub mod checkpoint;
pub mod classify;
pub mod context;
pub mod error_handler;
pub mod metadata;
pub mod orchestrator;
pub mod row;
pub mod walk;
pub mod writer;

pub use checkpoint::CheckpointGovernor;
pub use classify::{ClassifierPool, classify_file};
pub use context::{SharedSink, Sink};
pub use error_handler::{Stage, StageErrors};
pub use orchestrator::{Segment, plan_segments, run_scan};
pub use row::PendingRow;
pub use walk::{WalkOutcome, walk_files};
pub use writer::{OutputWriter, RetryPolicy};
