//! Two-parent single-point crossover.

use crate::errors::ChromosomeError;
use crate::genome::{Chromosome, Organism};
use rand::Rng;

/// Single-point crossover of two chromosomes at `cut_point`.
///
/// Children are `a[..cut] + b[cut..]` and `b[..cut] + a[cut..]`; the parents
/// are not modified. See [`Chromosome::crossover`].
#[inline]
pub fn crossover(
    a: &Chromosome,
    b: &Chromosome,
    cut_point: usize,
) -> Result<(Chromosome, Chromosome), ChromosomeError> {
    a.crossover(b, cut_point)
}

/// Uniform cut point in `0..=min(len_a, len_b)`.
#[inline]
pub fn random_cut_point<R: Rng + ?Sized>(a: &Chromosome, b: &Chromosome, rng: &mut R) -> usize {
    rng.random_range(0..=a.len().min(b.len()))
}

/// Cross two genomes chromosome by chromosome, each pair at its own random cut.
///
/// Pairs are formed by position; when the genomes differ in chromosome count
/// the surplus chromosomes of each parent are copied into that parent's child
/// unchanged.
pub fn crossover_genomes<R: Rng + ?Sized>(
    a: &Organism,
    b: &Organism,
    rng: &mut R,
) -> Result<(Vec<Chromosome>, Vec<Chromosome>), ChromosomeError> {
    let (ga, gb) = (a.genome(), b.genome());
    let mut first = Vec::with_capacity(ga.len());
    let mut second = Vec::with_capacity(gb.len());

    for (ca, cb) in ga.iter().zip(gb) {
        let cut = random_cut_point(ca, cb, rng);
        let (c1, c2) = crossover(ca, cb, cut)?;
        first.push(c1);
        second.push(c2);
    }
    first.extend(ga.iter().skip(gb.len()).cloned());
    second.extend(gb.iter().skip(ga.len()).cloned());

    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{Alphabet, Location};
    use crate::genome::{IdAllocator, Status};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn organism(ids: &mut IdAllocator, chromosomes: &[&str]) -> Organism {
        let genome = chromosomes
            .iter()
            .map(|s| Chromosome::from_symbols(s, Alphabet::binary()).unwrap())
            .collect();
        Organism::new(genome, Status::new(ids.allocate(), "p", Location::ORIGIN, 0)).unwrap()
    }

    #[test]
    fn test_random_cut_point_in_range() {
        let a = Chromosome::from_symbols("0101", Alphabet::binary()).unwrap();
        let b = Chromosome::from_symbols("01", Alphabet::binary()).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let mut seen = [false; 3];
        for _ in 0..300 {
            let cut = random_cut_point(&a, &b, &mut rng);
            assert!(cut <= 2);
            seen[cut] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_crossover_genomes_preserves_base_count() {
        let mut ids = IdAllocator::new();
        let a = organism(&mut ids, &["000000", "0000"]);
        let b = organism(&mut ids, &["111111", "1111"]);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);

        let (c1, c2) = crossover_genomes(&a, &b, &mut rng).unwrap();
        assert_eq!(c1.len(), 2);
        assert_eq!(c2.len(), 2);
        let total: usize = c1.iter().chain(&c2).map(Chromosome::len).sum();
        assert_eq!(total, a.genome_length() + b.genome_length());
    }

    #[test]
    fn test_crossover_genomes_uneven_chromosome_counts() {
        let mut ids = IdAllocator::new();
        let a = organism(&mut ids, &["00", "00", "00"]);
        let b = organism(&mut ids, &["11"]);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);

        let (c1, c2) = crossover_genomes(&a, &b, &mut rng).unwrap();
        assert_eq!(c1.len(), 3);
        assert_eq!(c2.len(), 1);
        assert_eq!(c1[2].to_string(), "00");
    }
}
