//! Error types for every layer of the engine.
//!
//! Each concern owns a small enum; [`SimulationError`] is the top-level type
//! returned by the generation loop and wraps the others.

use crate::base::Location;
use crate::genome::OrganismId;
use thiserror::Error;

/// Boxed error returned by strategy hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while constructing or manipulating a `Chromosome`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChromosomeError {
    /// A base is not a member of the configured alphabet, or two chromosomes
    /// with different alphabets were combined.
    #[error("Base '{base}' is not in the configured alphabet")]
    InvalidAlphabet { base: char },

    /// Crossover cut outside `0..=min(len_a, len_b)`.
    #[error("Invalid crossover point {cut_point} (must be within 0..={max})")]
    InvalidCrossoverPoint { cut_point: usize, max: usize },

    /// An organism must carry at least one chromosome.
    #[error("Genome must contain at least one chromosome")]
    EmptyGenome,
}

/// Errors that can occur during mutation operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError {
    /// Combined per-base rate outside [0.0, 1.0].
    #[error("Invalid mutation rate: {0} (must be between 0.0 and 1.0)")]
    InvalidRate(f64),

    #[error(transparent)]
    Chromosome(#[from] ChromosomeError),
}

/// Errors raised by the world grid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    /// Deployment would put more organisms into a cell than it can hold.
    #[error("Eco-cell {location} is full (capacity {capacity}, {occupants} occupants)")]
    CapacityExceeded {
        location: Location,
        capacity: usize,
        occupants: usize,
    },

    #[error("Location {location} lies outside world bounds {bounds:?}")]
    OutOfBounds {
        location: Location,
        bounds: (usize, usize, usize),
    },

    #[error("No deployment locations given for population '{0}'")]
    NoLocations(String),

    #[error("Invalid world dimensions {0:?} (all must be non-zero)")]
    InvalidDimensions((usize, usize, usize)),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Database error types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),
    #[error("Database initialization error: {0}")]
    Initialization(String),
    #[error("Transaction error: {0}")]
    Transaction(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Insert error: {0}")]
    Insert(String),
    #[error("Close error: {0}")]
    Close(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
    /// Checkpoints are immutable once written.
    #[error("Checkpoint ({start_time}, generation {generation}) already exists")]
    CheckpointExists { start_time: String, generation: usize },
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Top-level error returned by the generation loop and entry points.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chromosome(#[from] ChromosomeError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// No checkpoint exists for the requested run and generation.
    #[error("No checkpoint for simulation '{start_time}' at generation {generation}")]
    RevivalNotFound { start_time: String, generation: usize },

    /// A strategy hook failed.
    #[error("Hook '{hook}' failed at generation {generation}: {source}")]
    Hook {
        hook: &'static str,
        generation: usize,
        #[source]
        source: HookError,
    },

    /// Two live organisms share an identity.
    #[error("Duplicate organism identity {0}")]
    DuplicateIdentity(OrganismId),

    #[error("Unknown population '{0}'")]
    UnknownPopulation(String),

    /// The simulation has already reached its terminal state.
    #[error("Simulation already terminated at generation {0}")]
    Terminated(usize),

    /// A step failed; the run stopped at a generation boundary.
    #[error("Simulation aborted after generation {last_completed_generation}: {source}")]
    Aborted {
        last_completed_generation: usize,
        #[source]
        source: Box<SimulationError>,
    },
}

impl SimulationError {
    /// Wrap a hook failure with the hook name and generation.
    pub(crate) fn hook(hook: &'static str, generation: usize, source: HookError) -> Self {
        Self::Hook {
            hook,
            generation,
            source,
        }
    }
}
