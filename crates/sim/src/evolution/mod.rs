//! Evolutionary operators: mutation, crossover and selection helpers.
//!
//! - **Mutation**: per-base point, insertion and deletion events
//! - **Recombination**: single-point crossover of chromosomes and genomes
//! - **Selection**: culling and cloning helpers for population-control hooks

pub mod mutation;
pub mod recombination;
pub mod selection;

pub use mutation::{MutationModel, MutationType, Substitution};
pub use recombination::{crossover, crossover_genomes, random_cut_point};
pub use selection::{cull_lowest, cull_random, fitness_proportional_pairs, top_up_by_cloning};
