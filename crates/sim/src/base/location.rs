use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer coordinate of an eco-cell in the 3-D world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Location {
    #[inline]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Origin cell `(0, 0, 0)`.
    pub const ORIGIN: Self = Self::new(0, 0, 0);

    /// Whether this location lies inside a world of the given dimensions.
    #[inline]
    pub fn within(&self, bounds: (usize, usize, usize)) -> bool {
        self.x < bounds.0 && self.y < bounds.1 && self.z < bounds.2
    }

    /// Flat index in x-major order, or `None` when out of bounds.
    #[inline]
    pub fn flat_index(&self, bounds: (usize, usize, usize)) -> Option<usize> {
        self.within(bounds)
            .then(|| (self.x * bounds.1 + self.y) * bounds.2 + self.z)
    }

    /// Inverse of [`Location::flat_index`].
    #[inline]
    pub fn from_flat_index(index: usize, bounds: (usize, usize, usize)) -> Self {
        let z = index % bounds.2;
        let y = (index / bounds.2) % bounds.1;
        let x = index / (bounds.1 * bounds.2);
        Self { x, y, z }
    }
}

impl From<(usize, usize, usize)> for Location {
    fn from((x, y, z): (usize, usize, usize)) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
