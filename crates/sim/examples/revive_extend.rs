//! Record a run, then revive it from its last checkpoint and extend it.
//!
//! The first run evolves a binary population for 50 generations and records
//! every tenth generation. The revived run picks up at generation 50 and runs
//! another 25 generations under the recorded configuration, logging into the
//! same database under a fresh start time.
//!
//! Run with `RUST_LOG=info cargo run --example revive_extend`.

use evogrid_sim::evolution::{crossover_genomes, cull_lowest, fitness_proportional_pairs};
use evogrid_sim::prelude::*;

/// Maximise the number of `1` bases by truncation selection and crossover.
struct OneMax;

impl StrategyHooks for OneMax {
    fn fitness(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        for organism in ctx.populations.require_mut(population)?.agents_mut() {
            let ones = organism.sequence().matches('1').count();
            organism.set_fitness(ones as f64 / organism.genome_length().max(1) as f64);
        }
        Ok(())
    }

    fn mutation_scheme(
        &mut self,
        organism: &mut Organism,
        model: &MutationModel,
        rng: &mut SimRng,
    ) -> HookResult {
        model.mutate_organism(organism, rng)?;
        Ok(())
    }

    fn prepopulation_control(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        let pop = ctx.populations.require_mut(population)?;
        let half = pop.size() / 2;
        cull_lowest(pop, half);
        Ok(())
    }

    fn mating(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        let target = ctx.config.population.population_size;
        let pop = ctx.populations.require_mut(population)?;
        let missing = target.saturating_sub(pop.size());

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
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("revive_extend.db");

    let mut config = Configuration::default();
    config.simulation_name = "revive_extend".into();
    config.population.population_size = 60;
    config.genome.chromosome_size = 64;
    config.mutation.background_mutation = 0.005;
    config.execution.maximum_generations = 50;
    config.execution.seed = Some(2013);
    config.reporting.database_file = Some(db_path.clone());
    config.reporting.database_logging_frequency = 10;

    let first = simulate(config, OneMax)?;
    println!(
        "First run {} ended at generation {} ({} checkpoints)",
        first.start_time, first.final_generation, first.checkpoints_written
    );

    let revival = RevivalConfig::new(
        &db_path,
        first.start_time.clone(),
        vec![first.final_generation],
        25,
    );
    let second = revive_simulation(&revival, OneMax)?;
    println!(
        "Revived run {} ended at generation {} ({})",
        second.start_time, second.final_generation, second.reason
    );

    let query = QueryBuilder::new(&db_path)?;
    for start_time in query.list_runs()? {
        let info = query.run_info(&start_time)?;
        let source = match &info.revived_from {
            Some((parent, generation)) => format!("revived from {parent} at {generation}"),
            None => "fresh".to_string(),
        };
        let generations = query.recorded_generations(&start_time)?;
        println!("{start_time} [{source}] checkpoints at {generations:?}");
        for (generation, stats) in query.fitness_history(&start_time)? {
            println!("  generation {generation:>3}: mean {:.3} max {:.3}", stats.mean, stats.max);
        }
    }
    query.close()?;

    Ok(())
}
