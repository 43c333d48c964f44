//! Per-base mutation of chromosomes.
//!
//! A [`MutationModel`] applies one kind of mutation event (point substitution,
//! insertion, deletion or a mix of the latter two) at a fixed per-base
//! probability. Positions are found with a geometric skip instead of a coin
//! flip per base, which is much faster at the low rates typical of long runs.

pub use crate::errors::MutationError;
use crate::base::Alphabet;
use crate::errors::ChromosomeError;
use crate::genome::{Chromosome, Organism};
use rand::Rng;
use rand_distr::{Distribution, Geometric};
use serde::{Deserialize, Serialize};

/// Kind of mutation event applied at a selected position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationType {
    /// Replace the base.
    #[default]
    Point,
    /// Insert a random base before the position.
    Insertion,
    /// Remove the base.
    Deletion,
    /// Insertion or deletion with equal probability.
    Indel,
}

/// How a point substitution picks the replacement symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Substitution {
    /// Uniform over the other symbols; every event changes the base.
    #[default]
    ExcludeSelf,
    /// Uniform over all symbols; an event may redraw the same base.
    IncludeSelf,
}

/// Mutation parameters bound to one alphabet.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationModel {
    alphabet: Alphabet,
    mutation_type: MutationType,
    substitution: Substitution,
    background_rate: f64,
    additional_rate: f64,
    /// Combined per-base probability.
    rate: f64,
}

impl MutationModel {
    /// Create a model with per-base probability `background_rate + additional_rate`.
    ///
    /// # Errors
    /// `InvalidRate` when either component is negative or not finite, or the
    /// sum exceeds 1.0.
    pub fn new(
        alphabet: Alphabet,
        mutation_type: MutationType,
        background_rate: f64,
        additional_rate: f64,
    ) -> Result<Self, MutationError> {
        for r in [background_rate, additional_rate] {
            if !r.is_finite() || r < 0.0 {
                return Err(MutationError::InvalidRate(r));
            }
        }
        let rate = background_rate + additional_rate;
        if rate > 1.0 {
            return Err(MutationError::InvalidRate(rate));
        }

        Ok(Self {
            alphabet,
            mutation_type,
            substitution: Substitution::default(),
            background_rate,
            additional_rate,
            rate,
        })
    }

    /// Set the point substitution mode.
    pub fn with_substitution(mut self, substitution: Substitution) -> Self {
        self.substitution = substitution;
        self
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    #[inline]
    pub fn background_rate(&self) -> f64 {
        self.background_rate
    }

    #[inline]
    pub fn additional_rate(&self) -> f64 {
        self.additional_rate
    }

    #[inline]
    pub fn mutation_type(&self) -> MutationType {
        self.mutation_type
    }

    #[inline]
    pub fn substitution(&self) -> Substitution {
        self.substitution
    }

    #[inline]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Mutate `chromosome` in place and return the number of events applied.
    ///
    /// # Errors
    /// `InvalidAlphabet` when the chromosome uses a different alphabet.
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        chromosome: &mut Chromosome,
        rng: &mut R,
    ) -> Result<usize, MutationError> {
        if chromosome.alphabet() != &self.alphabet {
            let base = chromosome
                .symbols()
                .find(|&c| !self.alphabet.contains(c))
                .unwrap_or('?');
            return Err(ChromosomeError::InvalidAlphabet { base }.into());
        }

        let positions = self.sample_positions(chromosome.len(), rng);
        if positions.is_empty() {
            return Ok(0);
        }

        let bases = chromosome.bases_mut();
        // Descending order keeps earlier indices valid across length changes.
        for &pos in positions.iter().rev() {
            let kind = match self.mutation_type {
                MutationType::Indel if rng.random_bool(0.5) => MutationType::Insertion,
                MutationType::Indel => MutationType::Deletion,
                other => other,
            };
            match kind {
                MutationType::Point => {
                    bases[pos] = match self.substitution {
                        Substitution::ExcludeSelf => {
                            self.alphabet.random_other_index(bases[pos], rng)
                        }
                        Substitution::IncludeSelf => self.alphabet.random_index(rng),
                    };
                }
                MutationType::Insertion => {
                    let base = self.alphabet.random_index(rng);
                    bases.insert(pos, base);
                }
                MutationType::Deletion => {
                    bases.remove(pos);
                }
                MutationType::Indel => unreachable!("indel resolved above"),
            }
        }

        debug_assert!(chromosome.validate().is_ok());
        Ok(positions.len())
    }

    /// Mutate every chromosome of an organism. Returns the total event count.
    pub fn mutate_organism<R: Rng + ?Sized>(
        &self,
        organism: &mut Organism,
        rng: &mut R,
    ) -> Result<usize, MutationError> {
        let mut events = 0;
        for chromosome in organism.genome_mut() {
            events += self.mutate(chromosome, rng)?;
        }
        Ok(events)
    }

    /// Ascending positions in `0..len` hit by a mutation event.
    ///
    /// The gap to the next hit is geometric with success probability `rate`,
    /// which gives the same distribution as testing every base.
    fn sample_positions<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Vec<usize> {
        if len == 0 || self.rate <= 0.0 {
            return Vec::new();
        }
        if self.rate >= 1.0 {
            return (0..len).collect();
        }

        // rate lies in (0, 1) here, which Geometric accepts.
        let Ok(skip) = Geometric::new(self.rate) else {
            return Vec::new();
        };

        let mut positions = Vec::new();
        let mut pos = 0usize;
        loop {
            let gap = skip.sample(rng);
            pos = match usize::try_from(gap).ok().and_then(|g| pos.checked_add(g)) {
                Some(p) if p < len => p,
                _ => break,
            };
            positions.push(pos);
            pos += 1;
        }
        positions
    }
}
