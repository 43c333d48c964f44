use crate::base::Location;
use crate::errors::ChromosomeError;
use crate::genome::Chromosome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity token of an organism, unique within a run and its revivals.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OrganismId(pub u64);

impl fmt::Display for OrganismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic source of [`OrganismId`]s.
///
/// The next value is stored with every checkpoint so that identities handed
/// out after a revival never collide with recorded ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume allocation at `next`.
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// Hand out a fresh identity.
    #[inline]
    pub fn allocate(&mut self) -> OrganismId {
        let id = OrganismId(self.next);
        self.next += 1;
        id
    }

    /// The value the next call to [`allocate`](Self::allocate) returns.
    #[inline]
    pub fn peek(&self) -> u64 {
        self.next
    }
}

/// Bookkeeping record carried by each organism.
///
/// Fields are public: strategy hooks read and rewrite them freely. The engine
/// owns `deme`, `generation` and `birth_generation` for newly mated organisms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub location: Location,
    /// Name of the population the organism belongs to.
    pub deme: String,
    /// Generation the organism was last stepped in.
    pub generation: usize,
    pub birth_generation: usize,
    pub fitness: f64,
    pub identity: OrganismId,
    /// Identities of the parent organisms (empty for founders).
    pub parents: Vec<OrganismId>,
    /// Interpreter output list.
    pub output: Vec<i64>,
}

impl Status {
    pub fn new(
        identity: OrganismId,
        deme: impl Into<String>,
        location: Location,
        generation: usize,
    ) -> Self {
        Self {
            location,
            deme: deme.into(),
            generation,
            birth_generation: generation,
            fitness: 0.0,
            identity,
            parents: Vec::new(),
            output: Vec::new(),
        }
    }
}

/// A digital organism: one or more chromosomes plus a status record.
///
/// The genome can be edited in place but never shrunk to zero chromosomes;
/// use [`Organism::set_genome`] to replace it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct Organism {
    genome: Vec<Chromosome>,
    status: Status,
    /// Interpreter tape kept across generations.
    cytoplasm: Option<Vec<i64>>,
}

impl Organism {
    /// Create an organism. Fails with `EmptyGenome` for an empty chromosome list.
    pub fn new(genome: Vec<Chromosome>, status: Status) -> Result<Self, ChromosomeError> {
        if genome.is_empty() {
            return Err(ChromosomeError::EmptyGenome);
        }
        Ok(Self {
            genome,
            status,
            cytoplasm: None,
        })
    }

    /// Create a child from `genome` and its parents.
    ///
    /// The child gets a fresh identity, inherits the deme and location of the
    /// first parent, and starts with zero fitness and an empty tape. The
    /// engine stamps its birth generation when it enters a population.
    pub fn offspring(
        genome: Vec<Chromosome>,
        parents: &[&Organism],
        ids: &mut crate::genome::IdAllocator,
    ) -> Result<Self, ChromosomeError> {
        let first = parents.first().map(|p| &p.status);
        let mut status = Status::new(
            ids.allocate(),
            first.map(|s| s.deme.clone()).unwrap_or_default(),
            first.map(|s| s.location).unwrap_or_default(),
            first.map(|s| s.generation).unwrap_or_default(),
        );
        status.parents = parents.iter().map(|p| p.id()).collect();
        Self::new(genome, status)
    }

    /// Copy this organism under a new identity.
    ///
    /// Genome, status and tape are copied; the copy records this organism as
    /// its single parent.
    pub fn clone_with_new_identity(&self, ids: &mut IdAllocator) -> Self {
        let mut copy = self.clone();
        copy.status.identity = ids.allocate();
        copy.status.parents = vec![self.id()];
        copy
    }

    #[inline]
    pub fn id(&self) -> OrganismId {
        self.status.identity
    }

    #[inline]
    pub fn genome(&self) -> &[Chromosome] {
        &self.genome
    }

    /// Mutable access to the chromosomes. The slice length is fixed.
    #[inline]
    pub fn genome_mut(&mut self) -> &mut [Chromosome] {
        &mut self.genome
    }

    /// Replace the genome. Fails with `EmptyGenome` and leaves the organism
    /// unchanged when `genome` is empty.
    pub fn set_genome(&mut self, genome: Vec<Chromosome>) -> Result<(), ChromosomeError> {
        if genome.is_empty() {
            return Err(ChromosomeError::EmptyGenome);
        }
        self.genome = genome;
        Ok(())
    }

    #[inline]
    pub fn status(&self) -> &Status {
        &self.status
    }

    #[inline]
    pub fn status_mut(&mut self) -> &mut Status {
        &mut self.status
    }

    #[inline]
    pub fn fitness(&self) -> f64 {
        self.status.fitness
    }

    #[inline]
    pub fn set_fitness(&mut self, fitness: f64) {
        self.status.fitness = fitness;
    }

    #[inline]
    pub fn location(&self) -> Location {
        self.status.location
    }

    #[inline]
    pub fn cytoplasm(&self) -> Option<&[i64]> {
        self.cytoplasm.as_deref()
    }

    pub fn set_cytoplasm(&mut self, tape: Option<Vec<i64>>) {
        self.cytoplasm = tape;
    }

    pub(crate) fn take_cytoplasm(&mut self) -> Option<Vec<i64>> {
        self.cytoplasm.take()
    }

    /// All chromosomes concatenated into one symbol string.
    pub fn sequence(&self) -> String {
        self.genome.iter().map(|c| c.to_string()).collect()
    }

    /// Total number of bases across chromosomes.
    pub fn genome_length(&self) -> usize {
        self.genome.iter().map(Chromosome::len).sum()
    }
}
