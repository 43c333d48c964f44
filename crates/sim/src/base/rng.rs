//! Random source shared by the engine and every hook.
//!
//! Runs use `Xoshiro256PlusPlus`; its state is serialized with bincode into
//! each checkpoint so that revival continues the exact random stream.

use crate::errors::DatabaseError;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// The random number generator type used by simulations.
pub type SimRng = Xoshiro256PlusPlus;

/// Create the run RNG from an explicit seed, or from OS entropy.
pub fn rng_from_seed(seed: Option<u64>) -> SimRng {
    match seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_seed(rand::rng().random()),
    }
}

/// Serialize the generator state for a checkpoint.
pub fn rng_state_bytes(rng: &SimRng) -> Result<Vec<u8>, DatabaseError> {
    bincode::serialize(rng)
        .map_err(|e| DatabaseError::Encoding(format!("Failed to serialize RNG state: {e}")))
}

/// Restore a generator from checkpoint bytes.
pub fn rng_from_state_bytes(bytes: &[u8]) -> Result<SimRng, DatabaseError> {
    bincode::deserialize(bytes)
        .map_err(|e| DatabaseError::Encoding(format!("Failed to deserialize RNG state: {e}")))
}
