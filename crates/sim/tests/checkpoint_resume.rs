//! Integration tests for checkpoint and revival.

mod common;

use common::{Breeding, init_logging, recorded_config};
use evogrid_sim::evolution::cull_random;
use evogrid_sim::prelude::*;
use evogrid_sim::storage::{CheckpointView, Database};
use tempfile::tempdir;

#[test]
fn test_revival_matches_uninterrupted_run() {
    init_logging();
    let dir = tempdir().unwrap();
    let db = dir.path().join("resume.sqlite");

    let mut full = Simulation::new(recorded_config(12, &db), Breeding::culling(4)).unwrap();
    let summary = full.run().unwrap();
    assert_eq!(summary.final_generation, 12);
    assert_eq!(summary.checkpoints_written, 13);
    assert_eq!(summary.checkpoint_failures, 0);

    let revival = RevivalConfig::new(&db, &summary.start_time, vec![6], 6);
    let mut revived = Simulation::revive(&revival, Breeding::culling(4)).unwrap();
    assert_eq!(revived.generation(), 6);
    assert_eq!(revived.bound(), 12);
    assert_ne!(revived.start_time(), summary.start_time);
    revived.run().unwrap();

    assert_eq!(revived.generation(), 12);
    assert_eq!(revived.populations(), full.populations());
    assert_eq!(revived.world().snapshot(), full.world().snapshot());
    assert_eq!(revived.next_identity(), full.next_identity());
}

#[test]
fn test_revived_run_is_recorded_with_source() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("lineage.sqlite");

    let source = simulate(recorded_config(5, &db), Breeding::culling(2)).unwrap();
    let revival = RevivalConfig::new(&db, &source.start_time, vec![3], 4);
    let revived = revive_simulation(&revival, Breeding::culling(2)).unwrap();
    assert_eq!(revived.final_generation, 7);
    // Initial checkpoint at generation 3 plus one per step.
    assert_eq!(revived.checkpoints_written, 5);

    let query = QueryBuilder::new(&db).unwrap();
    assert_eq!(query.list_runs().unwrap().len(), 2);
    let info = query.run_info(&revived.start_time).unwrap();
    assert_eq!(info.revived_from, Some((source.start_time.clone(), 3)));
    assert_eq!(query.recorded_generations(&revived.start_time).unwrap(), vec![3, 4, 5, 6, 7]);
    // The source run is untouched.
    assert_eq!(
        query.recorded_generations(&source.start_time).unwrap(),
        (0..=5).collect::<Vec<_>>()
    );
}

#[test]
fn test_reading_a_checkpoint_twice_is_identical() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("idempotent.sqlite");
    let summary = simulate(recorded_config(4, &db), Breeding::culling(3)).unwrap();

    let query = QueryBuilder::new(&db).unwrap();
    let alphabet = Alphabet::binary();
    let first = query.load_populations(&summary.start_time, 4, &alphabet).unwrap();
    let second = query.load_populations(&summary.start_time, 4, &alphabet).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.total_size(), 20);

    let world_a = query.load_world(&summary.start_time, 4, &alphabet).unwrap();
    let world_b = query.load_world(&summary.start_time, 4, &alphabet).unwrap();
    assert_eq!(world_a, world_b);
}

#[test]
fn test_revival_of_missing_checkpoint() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("missing.sqlite");
    let summary = simulate(recorded_config(2, &db), Breeding::default()).unwrap();

    let missing_generation = RevivalConfig::new(&db, &summary.start_time, vec![9], 1);
    let err = Simulation::revive(&missing_generation, Breeding::default()).unwrap_err();
    assert!(matches!(err, SimulationError::RevivalNotFound { generation: 9, .. }));

    let missing_run = RevivalConfig::new(&db, "1999-01-01-0.000000", vec![0], 1);
    let err = Simulation::revive(&missing_run, Breeding::default()).unwrap_err();
    assert!(matches!(err, SimulationError::RevivalNotFound { .. }));
}

#[test]
fn test_revival_per_population_generations() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("per_pop.sqlite");
    let mut config = recorded_config(6, &db);
    config.population.population_names = vec!["north".into(), "south".into()];
    let summary = simulate(config, Breeding::culling(5)).unwrap();

    let revival = RevivalConfig::new(&db, &summary.start_time, vec![2, 5], 0);
    let revived = Simulation::revive(&revival, Breeding::default()).unwrap();
    assert_eq!(revived.generation(), 5);
    assert!(matches!(revived.state(), evogrid_sim::simulation::SimulationState::Terminated(_)));

    let query = QueryBuilder::new(&db).unwrap();
    let alphabet = Alphabet::binary();
    let north = query.load_population(&summary.start_time, 2, "north", &alphabet).unwrap();
    let south = query.load_population(&summary.start_time, 5, "south", &alphabet).unwrap();
    assert_eq!(revived.populations().get("north"), Some(&north));
    assert_eq!(revived.populations().get("south"), Some(&south));

    let bad = RevivalConfig::new(&db, &summary.start_time, vec![1, 2, 3], 1);
    assert!(matches!(
        Simulation::revive(&bad, Breeding::default()),
        Err(SimulationError::Config(_))
    ));
}

#[test]
fn test_revival_with_replacement_parameters() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("override.sqlite");
    let summary = simulate(recorded_config(3, &db), Breeding::default()).unwrap();

    let mut parameters = recorded_config(3, &db);
    parameters.reporting.database_file = None;
    let revival =
        RevivalConfig::new(&db, &summary.start_time, vec![3], 2).with_parameters(parameters);
    let revived = revive_simulation(&revival, Breeding::default()).unwrap();
    assert_eq!(revived.final_generation, 5);
    assert_eq!(revived.checkpoints_written, 0);
}

/// Fails every checkpoint after the first.
#[derive(Default)]
struct FlakyStore {
    calls: usize,
}

impl StrategyHooks for FlakyStore {
    fn database_report(
        &mut self,
        recorder: &mut Recorder,
        view: &CheckpointView<'_>,
    ) -> Result<(), DatabaseError> {
        self.calls += 1;
        if self.calls > 1 {
            return Err(DatabaseError::Insert("disk full".into()));
        }
        recorder.record_checkpoint(view)
    }
}

#[test]
fn test_checkpoint_failures_do_not_stop_the_run() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("flaky.sqlite");
    let mut sim = Simulation::new(recorded_config(4, &db), FlakyStore::default()).unwrap();
    let summary = sim.run().unwrap();

    assert_eq!(summary.reason, TerminationReason::GenerationLimit);
    assert_eq!(summary.checkpoints_written, 1);
    assert_eq!(summary.checkpoint_failures, 4);
    assert_eq!(sim.hooks().calls, 5);

    let stats = Database::open(&db).unwrap().stats().unwrap();
    assert_eq!(stats.checkpoint_records, 1);
}

/// Scores every organism as NaN, as a 0/0 fitness would.
struct Undefined;

impl StrategyHooks for Undefined {
    fn fitness(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        for organism in ctx.populations.require_mut(population)?.agents_mut() {
            organism.set_fitness(f64::NAN);
        }
        Ok(())
    }
}

#[test]
fn test_nan_fitness_is_recorded_and_revived() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("nan.sqlite");
    let summary = simulate(recorded_config(4, &db), Undefined).unwrap();
    assert_eq!(summary.checkpoint_failures, 0);
    assert_eq!(summary.checkpoints_written, 5);

    let query = QueryBuilder::new(&db).unwrap();
    assert_eq!(query.recorded_generations(&summary.start_time).unwrap(), vec![0, 1, 2, 3, 4]);
    // Fossils archived at generation 3 are buried at generation 4.
    assert_eq!(query.fossil_count(&summary.start_time).unwrap(), 2);
    let pops = query.load_populations(&summary.start_time, 4, &Alphabet::binary()).unwrap();
    assert_eq!(pops.total_size(), 20);
    assert!(pops.organisms().all(|o| o.fitness().is_nan()));

    let history = query.fitness_history(&summary.start_time).unwrap();
    assert_eq!(history.len(), 5);
    assert!(history.iter().skip(1).all(|(_, stats)| stats.count == 0));
    query.close().unwrap();

    let revival = RevivalConfig::new(&db, &summary.start_time, vec![4], 2);
    let revived = revive_simulation(&revival, Undefined).unwrap();
    assert_eq!(revived.final_generation, 6);
    assert_eq!(revived.checkpoint_failures, 0);
}

/// Removes five random organisms per population each generation and never
/// breeds.
struct Dwindling;

impl StrategyHooks for Dwindling {
    fn prepopulation_control(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        cull_random(ctx.populations.require_mut(population)?, 5, ctx.rng);
        Ok(())
    }
}

#[test]
fn test_checkpointed_world_counts_surviving_organisms() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("occupancy.sqlite");
    let summary = simulate(recorded_config(2, &db), Dwindling).unwrap();

    let query = QueryBuilder::new(&db).unwrap();
    let alphabet = Alphabet::binary();
    for generation in 0..=2 {
        let pops = query.load_populations(&summary.start_time, generation, &alphabet).unwrap();
        let world = query.load_world(&summary.start_time, generation, &alphabet).unwrap();
        assert_eq!(pops.total_size(), 20 - 5 * generation);
        assert_eq!(world.total_occupants(), pops.total_size());
    }
    query.close().unwrap();

    let revival = RevivalConfig::new(&db, &summary.start_time, vec![2], 0);
    let revived = Simulation::revive(&revival, Dwindling).unwrap();
    assert_eq!(revived.world().total_occupants(), 10);
}
