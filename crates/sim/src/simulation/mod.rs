//! Simulation engine, populations and configuration.
//!
//! [`Simulation`] drives a run generation by generation through the
//! [`StrategyHooks`] supplied by the caller. [`simulate`] and
//! [`revive_simulation`] run a fresh or a revived simulation to termination.

pub mod configs;
pub mod engine;
pub mod hooks;
pub mod initialization;
pub mod population;
mod revival;

pub use configs::{
    Configuration, ExecutionConfig, GenomeConfig, InterpreterConfig, MutationConfig,
    MutationTarget, PopulationConfig, ReportingConfig, RevivalConfig, WorldConfig,
};
pub use engine::{
    REPORT_TARGET, Simulation, SimulationState, SimulationSummary, TerminationReason,
    revive_simulation, simulate,
};
pub use hooks::{HookContext, HookResult, NullHooks, StrategyHooks};
pub use population::{Population, Populations};
