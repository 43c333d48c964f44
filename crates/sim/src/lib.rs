//! # evogrid-sim
//!
//! Generation-stepped simulation of digital organisms living in a 3-D grid of
//! eco-cells. Organisms carry chromosomes over a configurable alphabet that
//! can be executed by a codon tape interpreter; the scenario itself
//! (fitness, mating, movement, ecology) is supplied through
//! [`StrategyHooks`](simulation::StrategyHooks).
//!
//! Runs can be checkpointed to SQLite and revived from any recorded
//! generation.
//!
//! ```
//! use evogrid_sim::prelude::*;
//!
//! let mut config = Configuration::default();
//! config.population.population_size = 10;
//! config.execution.maximum_generations = 3;
//! config.execution.seed = Some(7);
//!
//! let summary = simulate(config, NullHooks).unwrap();
//! assert_eq!(summary.final_generation, 3);
//! ```

pub mod base;
pub mod errors;
pub mod evolution;
pub mod genome;
pub mod interpreter;
pub mod prelude;
pub mod simulation;
pub mod storage;
pub mod world;
