//! Genome structures: chromosomes and the organisms carrying them.

mod chromosome;
mod organism;

pub use chromosome::Chromosome;
pub use organism::{IdAllocator, Organism, OrganismId, Status};
