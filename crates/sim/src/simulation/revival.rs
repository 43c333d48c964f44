//! Restoring a run from its recorded checkpoints.

use crate::base::rng::rng_from_state_bytes;
use crate::errors::{ConfigError, DatabaseError, SimulationError};
use crate::genome::IdAllocator;
use crate::simulation::engine::RunState;
use crate::simulation::{Configuration, Populations, RevivalConfig};
use crate::storage::QueryBuilder;
use log::{debug, info};
use std::collections::HashSet;

/// Read the checkpoints named by `revival` and rebuild the run state.
///
/// Population `i` comes from `rev_start[i]` (or `rev_start[0]` when a single
/// generation is given); world, random source and identity counter come from
/// the latest of those generations.
pub(crate) fn restore(
    revival: &RevivalConfig,
) -> Result<(Configuration, RunState), SimulationError> {
    let latest = revival.latest_generation().ok_or_else(|| {
        ConfigError::Invalid("rev_start must name at least one generation".into())
    })?;
    let start_time = revival.simulation_time.as_str();
    let not_found = |generation: usize| SimulationError::RevivalNotFound {
        start_time: start_time.to_string(),
        generation,
    };

    let query = QueryBuilder::new(&revival.database_source)?;
    let config = match &revival.parameters {
        Some(parameters) => parameters.clone(),
        None => match query.run_info(start_time) {
            Ok(info) => info.config,
            Err(DatabaseError::NotFound(_)) => return Err(not_found(latest)),
            Err(e) => return Err(e.into()),
        },
    };
    config.validate()?;

    let checkpoint = query.checkpoint(start_time, latest)?.ok_or_else(|| not_found(latest))?;
    let names = &checkpoint.populations;
    if revival.rev_start.len() != 1 && revival.rev_start.len() != names.len() {
        return Err(ConfigError::Invalid(format!(
            "rev_start has {} generations; expected 1 or {}",
            revival.rev_start.len(),
            names.len()
        ))
        .into());
    }

    let alphabet = &config.genome.chromosome_bases;
    let mut populations = Populations::new();
    for (index, name) in names.iter().enumerate() {
        let generation = revival.rev_start.get(index).copied().unwrap_or(latest);
        if generation != latest && query.checkpoint(start_time, generation)?.is_none() {
            return Err(not_found(generation));
        }
        let population = query.load_population(start_time, generation, name, alphabet)?;
        debug!(
            "Loaded population '{name}' from generation {generation} ({} organisms)",
            population.size()
        );
        populations.insert(population)?;
    }

    let mut seen = HashSet::new();
    if let Some(organism) = populations.organisms().find(|o| !seen.insert(o.id())) {
        return Err(SimulationError::DuplicateIdentity(organism.id()));
    }

    let mut world = query.load_world(start_time, latest, alphabet)?;
    world.census(&populations)?;
    let rng = rng_from_state_bytes(&checkpoint.rng_state)?;
    let ids = IdAllocator::starting_at(checkpoint.next_identity);
    query.close()?;

    info!(
        "Restored {start_time} at generation {latest}: {} organisms in {} populations",
        populations.total_size(),
        populations.len()
    );

    let bound = latest + revival.extend_gen;
    Ok((
        config,
        RunState {
            populations,
            world,
            rng,
            ids,
            generation: latest,
            bound,
        },
    ))
}
