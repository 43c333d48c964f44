use crate::errors::{ChromosomeError, ConfigError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared, immutable set of chromosome base symbols.
///
/// Bases are stored as `u8` indices into this alphabet. Cloning is cheap: all
/// chromosomes of a run share one `Arc`. Serializes as the plain list of
/// symbols so configuration files can write `["0", "1"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<char>", into = "Vec<char>")]
pub struct Alphabet {
    /// Character representation of bases
    chars: Arc<[char]>,
    /// Mapping from char to index for fast lookup
    char_to_index: Arc<HashMap<char, u8>>,
}

impl Alphabet {
    /// Create a new alphabet from characters. The order determines the index
    /// mapping.
    ///
    /// Fails if the list is empty, longer than 256 symbols, or repeats a symbol.
    pub fn new(chars: impl Into<Vec<char>>) -> Result<Self, ConfigError> {
        let chars: Vec<char> = chars.into();
        if chars.is_empty() {
            return Err(ConfigError::Invalid("alphabet must not be empty".into()));
        }
        if chars.len() > 256 {
            return Err(ConfigError::Invalid(format!(
                "alphabet has {} symbols (at most 256 supported)",
                chars.len()
            )));
        }

        let mut char_to_index = HashMap::with_capacity(chars.len());
        for (i, &c) in chars.iter().enumerate() {
            if char_to_index.insert(c, i as u8).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "alphabet symbol '{c}' appears more than once"
                )));
            }
        }

        Ok(Self {
            chars: chars.into(),
            char_to_index: Arc::new(char_to_index),
        })
    }

    /// Binary alphabet (`0`, `1`).
    pub fn binary() -> Self {
        Self::new(vec!['0', '1']).expect("binary alphabet is valid")
    }

    /// Standard DNA alphabet (A, T, G, C).
    pub fn dna() -> Self {
        Self::new(vec!['A', 'T', 'G', 'C']).expect("DNA alphabet is valid")
    }

    /// Number of symbols.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Always false for a constructed alphabet.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Get character by index.
    #[inline]
    pub fn get_char(&self, index: u8) -> Option<char> {
        self.chars.get(index as usize).copied()
    }

    /// Get index by character.
    #[inline]
    pub fn get_index(&self, c: char) -> Option<u8> {
        self.char_to_index.get(&c).copied()
    }

    /// All symbols in index order.
    #[inline]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    #[inline]
    pub fn contains(&self, c: char) -> bool {
        self.char_to_index.contains_key(&c)
    }

    /// Check that `index` names a symbol of this alphabet.
    #[inline]
    pub fn contains_index(&self, index: u8) -> bool {
        (index as usize) < self.chars.len()
    }

    /// Translate a string of symbols into indices.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, ChromosomeError> {
        text.chars()
            .map(|c| {
                self.get_index(c)
                    .ok_or(ChromosomeError::InvalidAlphabet { base: c })
            })
            .collect()
    }

    /// Translate indices back into a string. Unknown indices render as `?`.
    pub fn decode(&self, indices: &[u8]) -> String {
        indices
            .iter()
            .map(|&i| self.get_char(i).unwrap_or('?'))
            .collect()
    }

    /// Draw a uniformly random symbol index.
    #[inline]
    pub fn random_index<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        rng.random_range(0..self.chars.len()) as u8
    }

    /// Draw a uniformly random symbol index different from `current`.
    ///
    /// A single-symbol alphabet has no alternative and returns `current`.
    #[inline]
    pub fn random_other_index<R: Rng + ?Sized>(&self, current: u8, rng: &mut R) -> u8 {
        let n = self.chars.len();
        if n < 2 {
            return current;
        }
        let pick = rng.random_range(0..n - 1) as u8;
        if pick >= current { pick + 1 } else { pick }
    }
}

impl TryFrom<Vec<char>> for Alphabet {
    type Error = ConfigError;

    fn try_from(chars: Vec<char>) -> Result<Self, Self::Error> {
        Self::new(chars)
    }
}

impl From<Alphabet> for Vec<char> {
    fn from(alphabet: Alphabet) -> Self {
        alphabet.chars.to_vec()
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::dna()
    }
}

impl PartialEq for Alphabet {
    fn eq(&self, other: &Self) -> bool {
        // Fast path: check if they point to the same Arc
        Arc::ptr_eq(&self.chars, &other.chars) || self.chars == other.chars
    }
}

impl Eq for Alphabet {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_alphabet_binary() {
        let alphabet = Alphabet::binary();
        assert_eq!(alphabet.len(), 2);
        assert_eq!(alphabet.get_index('0'), Some(0));
        assert_eq!(alphabet.get_index('1'), Some(1));
        assert_eq!(alphabet.get_char(1), Some('1'));
        assert_eq!(alphabet.get_char(2), None);
    }

    #[test]
    fn test_alphabet_rejects_empty_and_duplicates() {
        assert!(Alphabet::new(Vec::<char>::new()).is_err());
        assert!(Alphabet::new(vec!['A', 'B', 'A']).is_err());
    }

    #[test]
    fn test_alphabet_case_sensitive() {
        let alphabet = Alphabet::dna();
        assert!(alphabet.contains('A'));
        assert!(!alphabet.contains('a'));
    }

    #[test]
    fn test_alphabet_encode_decode() {
        let alphabet = Alphabet::dna();
        let indices = alphabet.encode("GATTACA").unwrap();
        assert_eq!(alphabet.decode(&indices), "GATTACA");

        let err = alphabet.encode("GANTA").unwrap_err();
        assert_eq!(err, ChromosomeError::InvalidAlphabet { base: 'N' });
    }

    #[test]
    fn test_alphabet_equality_different_arc() {
        assert_eq!(Alphabet::dna(), Alphabet::dna());
        assert_ne!(Alphabet::dna(), Alphabet::binary());
    }

    #[test]
    fn test_alphabet_ordering_matters() {
        let a = Alphabet::new(vec!['A', 'C']).unwrap();
        let b = Alphabet::new(vec!['C', 'A']).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_other_index_never_returns_current() {
        let alphabet = Alphabet::dna();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        for current in 0..4u8 {
            for _ in 0..200 {
                let next = alphabet.random_other_index(current, &mut rng);
                assert_ne!(next, current);
                assert!(alphabet.contains_index(next));
            }
        }
    }

    #[test]
    fn test_alphabet_serde_as_symbol_list() {
        let alphabet = Alphabet::binary();
        let json = serde_json::to_string(&alphabet).unwrap();
        assert_eq!(json, r#"["0","1"]"#);

        let back: Alphabet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, alphabet);
        assert!(serde_json::from_str::<Alphabet>(r#"["0","0"]"#).is_err());
    }
}
