use crate::base::Alphabet;
use crate::errors::ChromosomeError;
use rand::Rng;
use std::fmt;

/// An ordered sequence of symbolic bases over a shared [`Alphabet`].
///
/// Bases are stored as indices into the alphabet, so every base is a member
/// of it by construction. Length is not fixed: insertion and deletion
/// mutations grow or shrink the chromosome.
///
/// # Examples
///
/// ```rust
/// # use evogrid_sim::base::Alphabet;
/// # use evogrid_sim::genome::Chromosome;
/// let chr = Chromosome::from_symbols("0110", Alphabet::binary()).unwrap();
/// assert_eq!(chr.len(), 4);
/// assert_eq!(chr.to_string(), "0110");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromosome {
    alphabet: Alphabet,
    bases: Vec<u8>,
}

impl Chromosome {
    /// Create a chromosome from base indices, checking each against the
    /// alphabet.
    pub fn new(alphabet: Alphabet, bases: Vec<u8>) -> Result<Self, ChromosomeError> {
        if let Some(&bad) = bases.iter().find(|&&b| !alphabet.contains_index(b)) {
            return Err(ChromosomeError::InvalidAlphabet {
                base: char::from(bad),
            });
        }
        Ok(Self { alphabet, bases })
    }

    /// Parse a chromosome from its symbol string.
    pub fn from_symbols(text: &str, alphabet: Alphabet) -> Result<Self, ChromosomeError> {
        let bases = alphabet.encode(text)?;
        Ok(Self { alphabet, bases })
    }

    /// A chromosome of `length` uniformly random bases.
    pub fn random<R: Rng + ?Sized>(alphabet: Alphabet, length: usize, rng: &mut R) -> Self {
        let bases = (0..length).map(|_| alphabet.random_index(rng)).collect();
        Self { alphabet, bases }
    }

    /// A chromosome where every position holds `symbol`.
    pub fn uniform(
        alphabet: Alphabet,
        symbol: char,
        length: usize,
    ) -> Result<Self, ChromosomeError> {
        let index = alphabet
            .get_index(symbol)
            .ok_or(ChromosomeError::InvalidAlphabet { base: symbol })?;
        Ok(Self {
            alphabet,
            bases: vec![index; length],
        })
    }

    #[inline]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Base indices in order.
    #[inline]
    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Symbol at `position`.
    #[inline]
    pub fn get(&self, position: usize) -> Option<char> {
        self.bases
            .get(position)
            .and_then(|&b| self.alphabet.get_char(b))
    }

    /// Iterate over the symbols of the chromosome.
    pub fn symbols(&self) -> impl Iterator<Item = char> + '_ {
        self.bases
            .iter()
            .map(|&b| self.alphabet.get_char(b).unwrap_or('?'))
    }

    /// Replace the symbol at `position`. Out-of-range positions are ignored.
    pub fn set(&mut self, position: usize, symbol: char) -> Result<(), ChromosomeError> {
        let index = self
            .alphabet
            .get_index(symbol)
            .ok_or(ChromosomeError::InvalidAlphabet { base: symbol })?;
        if let Some(slot) = self.bases.get_mut(position) {
            *slot = index;
        }
        Ok(())
    }

    /// Raw index access for mutation operators; callers keep indices within
    /// the alphabet.
    #[inline]
    pub(crate) fn bases_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bases
    }

    /// Check that every stored base is a member of the alphabet.
    pub fn validate(&self) -> Result<(), ChromosomeError> {
        match self.bases.iter().find(|&&b| !self.alphabet.contains_index(b)) {
            Some(&bad) => Err(ChromosomeError::InvalidAlphabet {
                base: char::from(bad),
            }),
            None => Ok(()),
        }
    }

    /// Single-point crossover with `other` at `cut_point`.
    ///
    /// Returns `(self[..cut] + other[cut..], other[..cut] + self[cut..])`.
    /// The cut must lie within `0..=min(len_self, len_other)` and both
    /// chromosomes must share an alphabet.
    ///
    /// ```rust
    /// # use evogrid_sim::base::Alphabet;
    /// # use evogrid_sim::genome::Chromosome;
    /// let a = Chromosome::from_symbols("010101", Alphabet::binary()).unwrap();
    /// let b = Chromosome::from_symbols("101010", Alphabet::binary()).unwrap();
    /// let (c1, c2) = a.crossover(&b, 3).unwrap();
    /// assert_eq!(c1.to_string(), "010010");
    /// assert_eq!(c2.to_string(), "101101");
    /// ```
    pub fn crossover(
        &self,
        other: &Self,
        cut_point: usize,
    ) -> Result<(Self, Self), ChromosomeError> {
        if self.alphabet != other.alphabet {
            let base = other
                .alphabet
                .chars()
                .iter()
                .copied()
                .find(|&c| !self.alphabet.contains(c))
                .unwrap_or('?');
            return Err(ChromosomeError::InvalidAlphabet { base });
        }

        let max = self.len().min(other.len());
        if cut_point > max {
            return Err(ChromosomeError::InvalidCrossoverPoint { cut_point, max });
        }

        let mut first = Vec::with_capacity(other.len());
        first.extend_from_slice(&self.bases[..cut_point]);
        first.extend_from_slice(&other.bases[cut_point..]);

        let mut second = Vec::with_capacity(self.len());
        second.extend_from_slice(&other.bases[..cut_point]);
        second.extend_from_slice(&self.bases[cut_point..]);

        Ok((
            Self {
                alphabet: self.alphabet.clone(),
                bases: first,
            },
            Self {
                alphabet: self.alphabet.clone(),
                bases: second,
            },
        ))
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alphabet.decode(&self.bases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn binary(text: &str) -> Chromosome {
        Chromosome::from_symbols(text, Alphabet::binary()).unwrap()
    }

    #[test]
    fn test_from_symbols_rejects_foreign_base() {
        let err = Chromosome::from_symbols("0120", Alphabet::binary()).unwrap_err();
        assert_eq!(err, ChromosomeError::InvalidAlphabet { base: '2' });
    }

    #[test]
    fn test_new_rejects_out_of_range_index() {
        assert!(Chromosome::new(Alphabet::binary(), vec![0, 1, 2]).is_err());
        assert!(Chromosome::new(Alphabet::binary(), vec![0, 1, 1]).is_ok());
    }

    #[test]
    fn test_random_respects_length_and_alphabet() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let chr = Chromosome::random(Alphabet::dna(), 50, &mut rng);
        assert_eq!(chr.len(), 50);
        assert!(chr.validate().is_ok());
        assert!(chr.symbols().all(|c| "ATGC".contains(c)));
    }

    #[test]
    fn test_uniform_and_set() {
        let mut chr = Chromosome::uniform(Alphabet::dna(), 'A', 4).unwrap();
        chr.set(2, 'G').unwrap();
        assert_eq!(chr.to_string(), "AAGA");
        assert!(chr.set(0, 'X').is_err());
        // Out of range is ignored
        chr.set(99, 'C').unwrap();
        assert_eq!(chr.len(), 4);
    }

    #[test]
    fn test_crossover_scenario() {
        let (c1, c2) = binary("010101").crossover(&binary("101010"), 3).unwrap();
        assert_eq!(c1.to_string(), "010010");
        assert_eq!(c2.to_string(), "101101");
    }

    #[test]
    fn test_crossover_boundaries() {
        let a = binary("0000");
        let b = binary("11");

        let (c1, c2) = a.crossover(&b, 0).unwrap();
        assert_eq!(c1.to_string(), "11");
        assert_eq!(c2.to_string(), "0000");

        let (c1, c2) = a.crossover(&b, 2).unwrap();
        assert_eq!(c1.to_string(), "00");
        assert_eq!(c2.to_string(), "1100");

        let err = a.crossover(&b, 3).unwrap_err();
        assert_eq!(
            err,
            ChromosomeError::InvalidCrossoverPoint {
                cut_point: 3,
                max: 2
            }
        );
    }

    #[test]
    fn test_crossover_leaves_parents_untouched() {
        let a = binary("0011");
        let b = binary("1100");
        let _ = a.crossover(&b, 1).unwrap();
        assert_eq!(a.to_string(), "0011");
        assert_eq!(b.to_string(), "1100");
    }

    #[test]
    fn test_crossover_alphabet_mismatch() {
        let a = binary("0101");
        let b = Chromosome::from_symbols("ATGC", Alphabet::dna()).unwrap();
        assert!(matches!(
            a.crossover(&b, 1),
            Err(ChromosomeError::InvalidAlphabet { .. })
        ));
    }
}
