//! Base types shared by every layer: symbol alphabets, grid coordinates and
//! the run's random source.

mod alphabet;
mod location;
pub mod rng;

pub use alphabet::Alphabet;
pub use location::Location;
pub use rng::SimRng;
