//! The 3-D world: eco-cell grid, deployment, census and the fossil archive.

use crate::base::Location;
use crate::errors::WorldError;
use crate::genome::Organism;
use crate::simulation::{Population, Populations};
use crate::world::EcoCell;
use log::warn;
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// How a population is spread over its configured locations.
///
/// Configuration files use the numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DeploymentCode {
    /// Placement is left to the `deployment_scheme` hook.
    Custom = 0,
    /// Every organism into the first listed location.
    #[default]
    Single = 1,
    /// Uniform random choice among the listed locations.
    Random = 2,
    /// Round-robin over the listed locations.
    Even = 3,
    /// Every organism into the centre cell of the world.
    Centralized = 4,
}

impl TryFrom<u8> for DeploymentCode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Custom),
            1 => Ok(Self::Single),
            2 => Ok(Self::Random),
            3 => Ok(Self::Even),
            4 => Ok(Self::Centralized),
            other => Err(format!("unknown deployment code {other} (expected 0-4)")),
        }
    }
}

impl From<DeploymentCode> for u8 {
    fn from(code: DeploymentCode) -> Self {
        code as u8
    }
}

/// What deployment does when the chosen cell is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Fail with `CapacityExceeded`.
    #[default]
    Reject,
    /// Try the following listed locations in order.
    Spill,
    /// Place anyway and log a warning.
    Allow,
}

/// Serializable form of the world stored in checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub dimensions: (usize, usize, usize),
    pub cells: Vec<EcoCell>,
}

/// A bounded 3-D grid of [`EcoCell`]s stored in x-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    dimensions: (usize, usize, usize),
    cells: Vec<EcoCell>,
    /// Organisms archived since the last burial.
    fossils: Vec<Organism>,
}

impl World {
    /// Create a world of `x * y * z` empty cells, each holding `capacity`.
    pub fn new(x: usize, y: usize, z: usize, capacity: usize) -> Result<Self, WorldError> {
        if x == 0 || y == 0 || z == 0 {
            return Err(WorldError::InvalidDimensions((x, y, z)));
        }
        Ok(Self {
            dimensions: (x, y, z),
            cells: vec![EcoCell::new(capacity); x * y * z],
            fossils: Vec::new(),
        })
    }

    /// Rebuild a world from a checkpoint snapshot.
    pub fn from_snapshot(snapshot: WorldSnapshot) -> Result<Self, WorldError> {
        let (x, y, z) = snapshot.dimensions;
        if x == 0 || y == 0 || z == 0 || snapshot.cells.len() != x * y * z {
            return Err(WorldError::InvalidDimensions(snapshot.dimensions));
        }
        Ok(Self {
            dimensions: snapshot.dimensions,
            cells: snapshot.cells,
            fossils: Vec::new(),
        })
    }

    /// Snapshot of dimensions and cells. Fossils are stored separately.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            dimensions: self.dimensions,
            cells: self.cells.clone(),
        }
    }

    #[inline]
    pub fn dimensions(&self) -> (usize, usize, usize) {
        self.dimensions
    }

    #[inline]
    pub fn contains(&self, location: Location) -> bool {
        location.within(self.dimensions)
    }

    /// The centre cell, rounding down.
    pub fn centre(&self) -> Location {
        let (x, y, z) = self.dimensions;
        Location::new(x / 2, y / 2, z / 2)
    }

    pub fn cell(&self, location: Location) -> Option<&EcoCell> {
        location
            .flat_index(self.dimensions)
            .and_then(|i| self.cells.get(i))
    }

    pub fn cell_mut(&mut self, location: Location) -> Option<&mut EcoCell> {
        location
            .flat_index(self.dimensions)
            .and_then(|i| self.cells.get_mut(i))
    }

    /// All cell locations in x-major order.
    pub fn locations(&self) -> impl Iterator<Item = Location> + use<> {
        let dims = self.dimensions;
        (0..dims.0 * dims.1 * dims.2).map(move |i| Location::from_flat_index(i, dims))
    }

    /// Cells with their locations in x-major order.
    pub fn cells(&self) -> impl Iterator<Item = (Location, &EcoCell)> {
        let dims = self.dimensions;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, c)| (Location::from_flat_index(i, dims), c))
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = (Location, &mut EcoCell)> {
        let dims = self.dimensions;
        self.cells
            .iter_mut()
            .enumerate()
            .map(move |(i, c)| (Location::from_flat_index(i, dims), c))
    }

    /// Number of organisms currently counted in the grid.
    pub fn total_occupants(&self) -> usize {
        self.cells.iter().map(EcoCell::occupants).sum()
    }

    fn check_bounds(&self, location: Location) -> Result<usize, WorldError> {
        location
            .flat_index(self.dimensions)
            .ok_or(WorldError::OutOfBounds {
                location,
                bounds: self.dimensions,
            })
    }

    /// Place every organism of `population` according to `code`.
    ///
    /// Each placement sets the organism's location and counts it in the cell.
    /// [`DeploymentCode::Custom`] places nothing: the caller runs the
    /// `deployment_scheme` hook and a census instead.
    ///
    /// # Errors
    /// `NoLocations` when a code that reads `locations` gets an empty list,
    /// `OutOfBounds` for a location outside the grid, and `CapacityExceeded`
    /// when the overflow policy cannot place an organism.
    pub fn deploy<R: Rng + ?Sized>(
        &mut self,
        population: &mut Population,
        locations: &[Location],
        code: DeploymentCode,
        overflow: OverflowPolicy,
        rng: &mut R,
    ) -> Result<(), WorldError> {
        let candidates: Vec<Location> = match code {
            DeploymentCode::Custom => return Ok(()),
            DeploymentCode::Centralized => vec![self.centre()],
            _ if locations.is_empty() => {
                return Err(WorldError::NoLocations(population.name().to_string()));
            }
            _ => locations.to_vec(),
        };
        for &loc in &candidates {
            self.check_bounds(loc)?;
        }

        let n = candidates.len();
        for (i, organism) in population.agents_mut().iter_mut().enumerate() {
            let preferred = match code {
                DeploymentCode::Random => rng.random_range(0..n),
                DeploymentCode::Even => i % n,
                _ => 0,
            };
            let target = self.place(&candidates, preferred, overflow)?;
            organism.status_mut().location = target;
        }
        Ok(())
    }

    /// Pick a cell starting at `candidates[preferred]` and count one occupant.
    fn place(
        &mut self,
        candidates: &[Location],
        preferred: usize,
        overflow: OverflowPolicy,
    ) -> Result<Location, WorldError> {
        let first = candidates[preferred];
        let idx = self.check_bounds(first)?;
        if self.cells[idx].has_room() {
            self.cells[idx].add_occupant();
            return Ok(first);
        }

        match overflow {
            OverflowPolicy::Allow => {
                self.cells[idx].add_occupant();
                warn!(
                    "Eco-cell {first} over capacity ({} occupants, capacity {})",
                    self.cells[idx].occupants(),
                    self.cells[idx].capacity()
                );
                Ok(first)
            }
            OverflowPolicy::Spill => {
                let n = candidates.len();
                for step in 1..n {
                    let loc = candidates[(preferred + step) % n];
                    let j = self.check_bounds(loc)?;
                    if self.cells[j].has_room() {
                        self.cells[j].add_occupant();
                        return Ok(loc);
                    }
                }
                Err(self.capacity_error(first, idx))
            }
            OverflowPolicy::Reject => Err(self.capacity_error(first, idx)),
        }
    }

    fn capacity_error(&self, location: Location, idx: usize) -> WorldError {
        WorldError::CapacityExceeded {
            location,
            capacity: self.cells[idx].capacity(),
            occupants: self.cells[idx].occupants(),
        }
    }

    /// Recount occupancy from organism locations.
    ///
    /// # Errors
    /// `OutOfBounds` when an organism sits outside the grid; counts are left
    /// partially rebuilt in that case.
    pub fn census(&mut self, populations: &Populations) -> Result<(), WorldError> {
        for cell in &mut self.cells {
            cell.clear_occupants();
        }
        for organism in populations.organisms() {
            let idx = self.check_bounds(organism.location())?;
            self.cells[idx].add_occupant();
        }
        for (loc, cell) in self.cells() {
            if cell.is_over_capacity() {
                warn!(
                    "Eco-cell {loc} over capacity ({} occupants, capacity {})",
                    cell.occupants(),
                    cell.capacity()
                );
            }
        }
        Ok(())
    }

    /// Archive `ceil(ratio * size)` random organisms of every population.
    ///
    /// Fossils are copies that keep their identity. Returns how many were
    /// archived.
    pub fn fossilize<R: Rng + ?Sized>(
        &mut self,
        populations: &Populations,
        ratio: f64,
        rng: &mut R,
    ) -> usize {
        let ratio = ratio.clamp(0.0, 1.0);
        let mut archived = 0;
        for population in populations {
            let size = population.size();
            let count = ((ratio * size as f64).ceil() as usize).min(size);
            if count == 0 {
                continue;
            }
            for i in index::sample(rng, size, count) {
                self.fossils.push(population.agents()[i].clone());
            }
            archived += count;
        }
        archived
    }

    pub fn fossils(&self) -> &[Organism] {
        &self.fossils
    }

    /// Drain the fossil archive.
    pub fn take_fossils(&mut self) -> Vec<Organism> {
        std::mem::take(&mut self.fossils)
    }

    /// Put fossils back into the archive (ahead of newer ones).
    pub fn restore_fossils(&mut self, mut fossils: Vec<Organism>) {
        fossils.append(&mut self.fossils);
        self.fossils = fossils;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Alphabet;
    use crate::genome::{Chromosome, IdAllocator, Status};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn population(name: &str, size: usize, ids: &mut IdAllocator) -> Population {
        let agents = (0..size)
            .map(|_| {
                let chr = Chromosome::from_symbols("01", Alphabet::binary()).unwrap();
                Organism::new(vec![chr], Status::new(ids.allocate(), name, Location::ORIGIN, 0))
                    .unwrap()
            })
            .collect();
        Population::new(name, agents)
    }

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(17)
    }

    #[test]
    fn test_invalid_dimensions() {
        assert_eq!(
            World::new(0, 1, 1, 5).unwrap_err(),
            WorldError::InvalidDimensions((0, 1, 1))
        );
    }

    #[test]
    fn test_deploy_single() {
        let mut ids = IdAllocator::new();
        let mut world = World::new(2, 2, 1, 10).unwrap();
        let mut pop = population("p", 4, &mut ids);
        let loc = Location::new(1, 1, 0);

        world
            .deploy(&mut pop, &[loc], DeploymentCode::Single, OverflowPolicy::Reject, &mut rng())
            .unwrap();
        assert!(pop.agents().iter().all(|o| o.location() == loc));
        assert_eq!(world.cell(loc).unwrap().occupants(), 4);
    }

    #[test]
    fn test_deploy_even_round_robin() {
        let mut ids = IdAllocator::new();
        let mut world = World::new(3, 1, 1, 10).unwrap();
        let mut pop = population("p", 5, &mut ids);
        let locs = [Location::new(0, 0, 0), Location::new(2, 0, 0)];

        world
            .deploy(&mut pop, &locs, DeploymentCode::Even, OverflowPolicy::Reject, &mut rng())
            .unwrap();
        assert_eq!(world.cell(locs[0]).unwrap().occupants(), 3);
        assert_eq!(world.cell(locs[1]).unwrap().occupants(), 2);
        assert_eq!(pop.agents()[1].location(), locs[1]);
    }

    #[test]
    fn test_deploy_random_stays_in_listed_cells() {
        let mut ids = IdAllocator::new();
        let mut world = World::new(4, 4, 1, 100).unwrap();
        let mut pop = population("p", 50, &mut ids);
        let locs = [Location::new(0, 3, 0), Location::new(3, 0, 0)];

        world
            .deploy(&mut pop, &locs, DeploymentCode::Random, OverflowPolicy::Reject, &mut rng())
            .unwrap();
        assert!(pop.agents().iter().all(|o| locs.contains(&o.location())));
        assert_eq!(world.total_occupants(), 50);
    }

    #[test]
    fn test_deploy_centralized() {
        let mut ids = IdAllocator::new();
        let mut world = World::new(5, 3, 1, 10).unwrap();
        let mut pop = population("p", 2, &mut ids);
        world
            .deploy(&mut pop, &[], DeploymentCode::Centralized, OverflowPolicy::Reject, &mut rng())
            .unwrap();
        assert!(pop.agents().iter().all(|o| o.location() == Location::new(2, 1, 0)));
    }

    #[test]
    fn test_deploy_capacity_policies() {
        let mut ids = IdAllocator::new();
        let locs = [Location::new(0, 0, 0), Location::new(1, 0, 0)];

        let mut world = World::new(2, 1, 1, 2).unwrap();
        let mut pop = population("p", 3, &mut ids);
        let err = world
            .deploy(&mut pop, &locs, DeploymentCode::Single, OverflowPolicy::Reject, &mut rng())
            .unwrap_err();
        assert!(matches!(err, WorldError::CapacityExceeded { capacity: 2, .. }));

        let mut world = World::new(2, 1, 1, 2).unwrap();
        world
            .deploy(&mut pop, &locs, DeploymentCode::Single, OverflowPolicy::Spill, &mut rng())
            .unwrap();
        assert_eq!(world.cell(locs[1]).unwrap().occupants(), 1);

        let mut world = World::new(2, 1, 1, 2).unwrap();
        world
            .deploy(&mut pop, &locs, DeploymentCode::Single, OverflowPolicy::Allow, &mut rng())
            .unwrap();
        assert!(world.cell(locs[0]).unwrap().is_over_capacity());
    }

    #[test]
    fn test_deploy_errors() {
        let mut ids = IdAllocator::new();
        let mut world = World::new(2, 2, 2, 5).unwrap();
        let mut pop = population("p", 1, &mut ids);

        assert_eq!(
            world
                .deploy(&mut pop, &[], DeploymentCode::Even, OverflowPolicy::Reject, &mut rng())
                .unwrap_err(),
            WorldError::NoLocations("p".into())
        );
        assert!(matches!(
            world.deploy(
                &mut pop,
                &[Location::new(2, 0, 0)],
                DeploymentCode::Single,
                OverflowPolicy::Reject,
                &mut rng()
            ),
            Err(WorldError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_census_recounts_and_checks_bounds() {
        let mut ids = IdAllocator::new();
        let mut world = World::new(2, 1, 1, 5).unwrap();
        let mut pop = population("p", 3, &mut ids);
        pop.agents_mut()[2].status_mut().location = Location::new(1, 0, 0);
        let mut pops = Populations::from(vec![pop]);

        world.census(&pops).unwrap();
        assert_eq!(world.cell(Location::new(0, 0, 0)).unwrap().occupants(), 2);
        assert_eq!(world.cell(Location::new(1, 0, 0)).unwrap().occupants(), 1);

        pops.get_mut("p").unwrap().agents_mut()[0].status_mut().location = Location::new(9, 0, 0);
        assert!(matches!(
            world.census(&pops),
            Err(WorldError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_fossilize_rounds_up_and_keeps_identity() {
        let mut ids = IdAllocator::new();
        let mut world = World::new(1, 1, 1, 100).unwrap();
        let pops = Populations::from(vec![
            population("a", 10, &mut ids),
            population("b", 3, &mut ids),
        ]);

        // ceil(0.25 * 10) = 3, ceil(0.25 * 3) = 1
        assert_eq!(world.fossilize(&pops, 0.25, &mut rng()), 4);
        let live = pops.identity_set();
        assert!(world.fossils().iter().all(|f| live.contains(&f.id())));

        let taken = world.take_fossils();
        assert_eq!(taken.len(), 4);
        assert!(world.fossils().is_empty());

        world.restore_fossils(taken);
        assert_eq!(world.fossils().len(), 4);
        assert_eq!(world.fossilize(&pops, 0.0, &mut rng()), 0);
    }

    #[test]
    fn test_snapshot_round_trip_preserves_attributes() {
        let mut world = World::new(2, 2, 1, 3).unwrap();
        world
            .cell_mut(Location::new(1, 0, 0))
            .unwrap()
            .set_attribute("food", 7);

        let json = serde_json::to_string(&world.snapshot()).unwrap();
        let restored = World::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored, world);
    }

    #[test]
    fn test_deployment_code_numeric_serde() {
        let code: DeploymentCode = serde_json::from_str("3").unwrap();
        assert_eq!(code, DeploymentCode::Even);
        assert_eq!(serde_json::to_string(&DeploymentCode::Random).unwrap(), "2");
        assert!(serde_json::from_str::<DeploymentCode>("9").is_err());
    }
}
