//! Hooks and configurations shared by the integration tests.

#![allow(dead_code)]

use evogrid_sim::evolution::{crossover_genomes, cull_lowest, fitness_proportional_pairs};
use evogrid_sim::prelude::*;
use std::path::Path;

/// One-max breeding: fitness is the share of `1` bases, the lowest organisms
/// are culled and the population is refilled by fitness-proportional
/// crossover.
#[derive(Debug, Default)]
pub struct Breeding {
    pub cull: usize,
    pub mating_calls: usize,
    pub mutation_calls: usize,
}

impl Breeding {
    pub fn culling(cull: usize) -> Self {
        Self {
            cull,
            ..Self::default()
        }
    }
}

impl StrategyHooks for Breeding {
    fn fitness(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        for organism in ctx.populations.require_mut(population)?.agents_mut() {
            let length = organism.genome_length().max(1);
            let ones = organism.sequence().chars().filter(|&c| c == '1').count();
            organism.set_fitness(ones as f64 / length as f64);
        }
        Ok(())
    }

    fn prepopulation_control(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        cull_lowest(ctx.populations.require_mut(population)?, self.cull);
        Ok(())
    }

    fn mating(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        self.mating_calls += 1;
        let target = ctx.config.population.population_size;
        let pop = ctx.populations.require_mut(population)?;
        let missing = target.saturating_sub(pop.size());
        if missing == 0 || pop.is_empty() {
            return Ok(());
        }

        let mut children = Vec::with_capacity(missing + 1);
        for (i, j) in fitness_proportional_pairs(pop, missing.div_ceil(2), ctx.rng) {
            let (a, b) = (&pop.agents()[i], &pop.agents()[j]);
            let (first, second) = crossover_genomes(a, b, ctx.rng)?;
            children.push(Organism::offspring(first, &[a, b], ctx.ids)?);
            children.push(Organism::offspring(second, &[b, a], ctx.ids)?);
        }
        children.truncate(missing);
        for child in children {
            pop.push(child);
        }
        Ok(())
    }

    fn mutation_scheme(
        &mut self,
        organism: &mut Organism,
        model: &MutationModel,
        rng: &mut SimRng,
    ) -> HookResult {
        self.mutation_calls += 1;
        model.mutate_organism(organism, rng)?;
        Ok(())
    }
}

/// Small binary-genome configuration with a fixed seed.
pub fn small_config(generations: usize) -> Configuration {
    let mut config = Configuration::default();
    config.simulation_name = "integration".into();
    config.population.population_size = 20;
    config.genome.chromosome_size = 24;
    config.mutation.background_mutation = 0.01;
    config.execution.maximum_generations = generations;
    config.execution.seed = Some(42);
    config.execution.fossilized_frequency = 3;
    config.execution.fossilized_ratio = 0.1;
    config.execution.eco_buried_frequency = 4;
    config.reporting.print_frequency = 5;
    config
}

/// [`small_config`] recording every generation to `db`.
pub fn recorded_config(generations: usize, db: &Path) -> Configuration {
    let mut config = small_config(generations);
    config.reporting.database_file = Some(db.to_path_buf());
    config.reporting.database_logging_frequency = 1;
    config
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
