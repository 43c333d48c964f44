//! Initial population spawning and deployment.

use crate::base::{Location, SimRng};
use crate::errors::SimulationError;
use crate::genome::{Chromosome, IdAllocator, Organism, Status};
use crate::simulation::{Configuration, Population, Populations};
use crate::world::{DeploymentCode, World};
use log::debug;

/// Build the genome of one founder organism.
///
/// Each of the `genome_size` chromosomes is `initial_chromosome` verbatim
/// when one is configured, else `chromosome_size` random bases.
pub fn founder_genome(
    config: &Configuration,
    rng: &mut SimRng,
) -> Result<Vec<Chromosome>, SimulationError> {
    let genome = &config.genome;
    let alphabet = &genome.chromosome_bases;
    (0..genome.genome_size)
        .map(|_| -> Result<Chromosome, SimulationError> {
            match &genome.initial_chromosome {
                Some(text) => Ok(Chromosome::from_symbols(text, alphabet.clone())?),
                None => Ok(Chromosome::random(alphabet.clone(), genome.chromosome_size, rng)),
            }
        })
        .collect()
}

/// Spawn `population_size` founders for population `name`.
pub fn spawn_population(
    name: &str,
    config: &Configuration,
    ids: &mut IdAllocator,
    rng: &mut SimRng,
) -> Result<Population, SimulationError> {
    let agents = (0..config.population.population_size)
        .map(|_| -> Result<Organism, SimulationError> {
            let status = Status::new(ids.allocate(), name, Location::ORIGIN, 0);
            Ok(Organism::new(founder_genome(config, rng)?, status)?)
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!("Spawned population '{name}' with {} organisms", agents.len());
    Ok(Population::new(name, agents))
}

/// Spawn every configured population, in configuration order.
pub fn spawn_populations(
    config: &Configuration,
    ids: &mut IdAllocator,
    rng: &mut SimRng,
) -> Result<Populations, SimulationError> {
    let mut populations = Populations::new();
    for name in &config.population.population_names {
        populations.insert(spawn_population(name, config, ids, rng)?)?;
    }
    Ok(populations)
}

/// Deploy every population with the configured code and overflow policy.
///
/// Does nothing for [`DeploymentCode::Custom`]; the engine delegates that case
/// to the `deployment_scheme` hook.
pub fn deploy_populations(
    config: &Configuration,
    populations: &mut Populations,
    world: &mut World,
    rng: &mut SimRng,
) -> Result<(), SimulationError> {
    let code = config.population.deployment_code;
    if code == DeploymentCode::Custom {
        return Ok(());
    }
    for (index, population) in populations.iter_mut().enumerate() {
        let locations = config.population.locations_for(index);
        world.deploy(population, locations, code, config.population.overflow_policy, rng)?;
    }
    Ok(())
}
