//! Storage module for persisting simulation data.
//!
//! Runs are recorded to SQLite as a sequence of immutable checkpoints keyed by
//! `(start_time, generation)`, which is what revival reads back.

mod database;
mod query;
mod recorder;
pub mod types;

pub use database::{Database, DatabaseStats};
pub use query::QueryBuilder;
pub use recorder::{Recorder, RecorderStats};
pub use types::{
    CheckpointInfo, CheckpointView, FitnessStats, OrganismSnapshot, RunInfo, new_start_time,
};
