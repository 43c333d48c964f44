//! Can promoter-like sequences arise from random DNA?
//!
//! One population of 100 organisms lives in a single cell. Each carries one
//! 50-base chromosome that mutates at 10% per base every generation. Fitness
//! is the mean positional identity against a panel of known promoters. The
//! weakest tenth is culled while more than half the population would remain,
//! otherwise ten random organisms go. Survivors are cloned back up to 100.
//!
//! Run with `RUST_LOG=info cargo run --example promoter_origins [db-path]`.

use evogrid_sim::evolution::{cull_lowest, cull_random, top_up_by_cloning};
use evogrid_sim::prelude::*;
use evogrid_sim::storage::FitnessStats;

const KNOWN_PROMOTERS: &[&str] = &[
    "GTATAGGGTGTGACGCCTGCCCGGTGCCGGAAGGTTAATTGATGGGGTTA",
    "TCTTTTGATGTAATCCAATACATTTCCCCCAGATTGTCGAAGTGTTGAGC",
    "CCTGGTTGTCGAGCAGGAAATAGGCGAGGTAGATCACCGCCAGCATGAAG",
    "CTGGCTTTGCATCGCCATGCCTTCGCCAATCTGATCCCGACTGGACTTTT",
    "CCTCTCGACGGTTTCCAGCAGCGGAACGAGCAGTGATAATGCCGGCGTTT",
    "TTTTCTTGCCTGTTGCAAGTGAAACTTGCGCAAGTTTATTAGGCTCTAAA",
    "GCATGCCCATGCTGGACAGAGGTCTGAAGCAACGTATGGTCGGGGCGCTG",
    "GGTGGTTCTTGAGTATTCGAGCCAGCTATGGGGCTACCTTGAGTCAAACC",
];

struct PromoterSearch {
    target_size: usize,
}

fn identity(sequence: &str, known: &str) -> f64 {
    let matches = sequence.chars().zip(known.chars()).filter(|(a, b)| a == b).count();
    matches as f64 / known.len().max(1) as f64
}

impl StrategyHooks for PromoterSearch {
    fn fitness(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        for organism in ctx.populations.require_mut(population)?.agents_mut() {
            let sequence = organism.sequence();
            let total: f64 = KNOWN_PROMOTERS.iter().map(|k| identity(&sequence, k)).sum();
            organism.set_fitness(total / KNOWN_PROMOTERS.len() as f64);
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
        let decile = pop.size() / 10;
        if pop.size() - decile > self.target_size / 2 {
            cull_lowest(pop, decile);
        } else {
            cull_random(pop, 10, ctx.rng);
        }
        Ok(())
    }

    fn mating(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        let pop = ctx.populations.require_mut(population)?;
        top_up_by_cloning(pop, self.target_size, ctx.ids, ctx.rng);
        Ok(())
    }

    fn population_report(
        &mut self,
        ctx: &mut HookContext<'_>,
        population: &str,
    ) -> HookResult<Option<String>> {
        let pop = ctx.populations.require(population)?;
        let best = pop
            .agents()
            .iter()
            .max_by(|a, b| a.fitness().total_cmp(&b.fitness()))
            .map(Organism::sequence)
            .unwrap_or_default();
        Ok(Some(format!("best sequence {best}")))
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let db_path = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("promoter_origins.db"));

    let mut config = Configuration::default();
    config.simulation_name = "promoter_origins".into();
    config.population.population_size = 100;
    config.genome.chromosome_bases = Alphabet::dna();
    config.genome.chromosome_size = 50;
    config.mutation.background_mutation = 0.1;
    config.execution.maximum_generations = 100;
    config.execution.fossilized_ratio = 0.01;
    config.execution.fossilized_frequency = 20;
    config.reporting.print_frequency = 10;
    config.reporting.database_file = Some(db_path.clone());
    config.reporting.database_logging_frequency = 10;

    let hooks = PromoterSearch {
        target_size: config.population.population_size,
    };
    let summary = simulate(config, hooks)?;
    println!(
        "Run {} stopped at generation {} ({})",
        summary.start_time, summary.final_generation, summary.reason
    );

    let query = QueryBuilder::new(&db_path)?;
    let history: Vec<(usize, FitnessStats)> = query.fitness_history(&summary.start_time)?;
    println!("{:>10} {:>8} {:>8} {:>8}", "generation", "mean", "max", "std");
    for (generation, stats) in history {
        println!(
            "{generation:>10} {:>8.4} {:>8.4} {:>8.4}",
            stats.mean, stats.max, stats.std
        );
    }
    println!(
        "{} fossils buried in {}",
        query.fossil_count(&summary.start_time)?,
        db_path.display()
    );
    query.close()?;

    Ok(())
}
