//! Spatial model: eco-cells arranged in a bounded 3-D grid.

mod cell;
mod grid;

pub use cell::EcoCell;
pub use grid::{DeploymentCode, OverflowPolicy, World, WorldSnapshot};
