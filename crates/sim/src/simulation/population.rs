//! Named populations of organisms and the ordered set of all populations.

use crate::base::Location;
use crate::errors::SimulationError;
use crate::genome::{Organism, OrganismId};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// A named, ordered collection of organisms (a deme).
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    name: Arc<str>,
    agents: Vec<Organism>,
}

impl Population {
    pub fn new(name: impl Into<Arc<str>>, agents: Vec<Organism>) -> Self {
        Self {
            name: name.into(),
            agents,
        }
    }

    /// Population (deme) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of organisms.
    pub fn size(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agents(&self) -> &[Organism] {
        &self.agents
    }

    /// Mutable access to the organism list; hooks add and remove agents here.
    pub fn agents_mut(&mut self) -> &mut Vec<Organism> {
        &mut self.agents
    }

    pub fn get(&self, index: usize) -> Option<&Organism> {
        self.agents.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Organism> {
        self.agents.get_mut(index)
    }

    pub fn push(&mut self, organism: Organism) {
        self.agents.push(organism);
    }

    /// Find an organism by identity.
    pub fn find(&self, id: OrganismId) -> Option<&Organism> {
        self.agents.iter().find(|o| o.id() == id)
    }

    /// Identities of all agents in order.
    pub fn ids(&self) -> Vec<OrganismId> {
        self.agents.iter().map(Organism::id).collect()
    }

    /// Organisms located in the cell at `location`.
    pub fn at_location(&self, location: Location) -> Vec<&Organism> {
        self.agents
            .iter()
            .filter(|o| o.location() == location)
            .collect()
    }

    /// Agent indices grouped by cell, cells in coordinate order.
    pub fn group_by_location(&self) -> BTreeMap<Location, Vec<usize>> {
        let mut groups: BTreeMap<Location, Vec<usize>> = BTreeMap::new();
        for (i, organism) in self.agents.iter().enumerate() {
            groups.entry(organism.location()).or_default().push(i);
        }
        groups
    }

    /// Fitness values of all agents in order.
    pub fn fitness_values(&self) -> Vec<f64> {
        self.agents.iter().map(Organism::fitness).collect()
    }
}

/// The ordered set of populations of one run.
///
/// Order is the configured population order and is preserved by checkpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Populations {
    pops: Vec<Population>,
}

impl Populations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a population at the end. Fails when the name is already in use.
    pub fn insert(&mut self, population: Population) -> Result<(), SimulationError> {
        if self.get(population.name()).is_some() {
            return Err(crate::errors::ConfigError::Invalid(format!(
                "duplicate population name '{}'",
                population.name()
            ))
            .into());
        }
        self.pops.push(population);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Population> {
        self.pops.iter().find(|p| p.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Population> {
        self.pops.iter_mut().find(|p| p.name() == name)
    }

    /// Like [`get`](Self::get) but fails with `UnknownPopulation`.
    pub fn require(&self, name: &str) -> Result<&Population, SimulationError> {
        self.get(name)
            .ok_or_else(|| SimulationError::UnknownPopulation(name.to_string()))
    }

    /// Like [`get_mut`](Self::get_mut) but fails with `UnknownPopulation`.
    pub fn require_mut(&mut self, name: &str) -> Result<&mut Population, SimulationError> {
        self.get_mut(name)
            .ok_or_else(|| SimulationError::UnknownPopulation(name.to_string()))
    }

    /// Population names in order.
    pub fn names(&self) -> Vec<String> {
        self.pops.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Population> {
        self.pops.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Population> {
        self.pops.iter_mut()
    }

    /// Number of populations.
    pub fn len(&self) -> usize {
        self.pops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pops.is_empty()
    }

    /// Total number of organisms across populations.
    pub fn total_size(&self) -> usize {
        self.pops.iter().map(Population::size).sum()
    }

    /// Every organism of every population, populations in order.
    pub fn organisms(&self) -> impl Iterator<Item = &Organism> {
        self.pops.iter().flat_map(|p| p.agents().iter())
    }

    pub fn organisms_mut(&mut self) -> impl Iterator<Item = &mut Organism> {
        self.pops.iter_mut().flat_map(|p| p.agents_mut().iter_mut())
    }

    /// Set of identities present in the run.
    pub fn identity_set(&self) -> HashSet<OrganismId> {
        self.organisms().map(Organism::id).collect()
    }

    /// Highest fitness in the run, or `None` without organisms.
    pub fn best_fitness(&self) -> Option<f64> {
        self.organisms().map(Organism::fitness).reduce(f64::max)
    }

    /// Move the organism `id` from population `from` to population `to`,
    /// rewriting its deme. Returns `Ok(false)` when `from` has no such organism.
    pub fn transfer(
        &mut self,
        from: &str,
        to: &str,
        id: OrganismId,
    ) -> Result<bool, SimulationError> {
        self.require(to)?;
        let source = self.require_mut(from)?;
        let Some(index) = source.agents().iter().position(|o| o.id() == id) else {
            return Ok(false);
        };
        let mut organism = source.agents_mut().remove(index);
        organism.status_mut().deme = to.to_string();
        self.require_mut(to)?.push(organism);
        Ok(true)
    }
}

impl From<Vec<Population>> for Populations {
    fn from(pops: Vec<Population>) -> Self {
        Self { pops }
    }
}

impl<'a> IntoIterator for &'a Populations {
    type Item = &'a Population;
    type IntoIter = std::slice::Iter<'a, Population>;

    fn into_iter(self) -> Self::IntoIter {
        self.pops.iter()
    }
}
