//! Commonly used imports for convenience.
//!
//! ```
//! use evogrid_sim::prelude::*;
//!
//! let chr = Chromosome::from_symbols("0110", Alphabet::binary()).unwrap();
//! assert_eq!(chr.len(), 4);
//! ```

pub use crate::base::{Alphabet, Location, SimRng};
pub use crate::errors::{
    ChromosomeError, ConfigError, DatabaseError, HookError, MutationError, SimulationError,
    WorldError,
};
pub use crate::evolution::{MutationModel, MutationType, Substitution, crossover, random_cut_point};
pub use crate::genome::{Chromosome, IdAllocator, Organism, OrganismId, Status};
pub use crate::interpreter::Interpreter;
pub use crate::simulation::{
    Configuration, HookContext, HookResult, NullHooks, Population, Populations, RevivalConfig,
    Simulation, SimulationSummary, StrategyHooks, TerminationReason, revive_simulation, simulate,
};
pub use crate::storage::{QueryBuilder, Recorder};
pub use crate::world::{DeploymentCode, EcoCell, OverflowPolicy, World};
