//! Query interface for recorded runs.

use crate::base::{Alphabet, Location};
use crate::errors::DatabaseError;
use crate::simulation::{Configuration, Population, Populations};
use crate::storage::types::decode_organisms;
use crate::storage::{CheckpointInfo, Database, FitnessStats, OrganismSnapshot, RunInfo};
use crate::world::{World, WorldSnapshot};
use rusqlite::{OptionalExtension, params};
use std::collections::BTreeMap;

/// Read access to a recorded database.
pub struct QueryBuilder {
    db: Database,
}

impl QueryBuilder {
    /// Open an existing database for querying.
    pub fn new(db_path: impl AsRef<std::path::Path>) -> Result<Self, DatabaseError> {
        let db = Database::open_existing(db_path)?;
        Ok(Self { db })
    }

    /// Start-time identifiers of every registered run, oldest first.
    pub fn list_runs(&self) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare("SELECT start_time FROM runs ORDER BY start_time")
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row.map_err(|e| DatabaseError::Query(e.to_string()))?);
        }
        Ok(runs)
    }

    /// Metadata and configuration of one run.
    pub fn run_info(&self, start_time: &str) -> Result<RunInfo, DatabaseError> {
        let row = self
            .db
            .connection()
            .query_row(
                "SELECT simulation_name, config_json, revived_from, revived_generation, created_at
                 FROM runs WHERE start_time = ?1",
                params![start_time],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let (simulation_name, config_json, source, source_generation, created_at) =
            row.ok_or_else(|| DatabaseError::NotFound(format!("run '{start_time}'")))?;
        let config = Configuration::from_json_str(&config_json)
            .map_err(|e| DatabaseError::Encoding(format!("Stored configuration is invalid: {e}")))?;

        Ok(RunInfo {
            start_time: start_time.to_string(),
            simulation_name,
            config,
            revived_from: source.zip(source_generation.map(|g| g as usize)),
            created_at,
        })
    }

    /// Generations with a complete checkpoint, ascending.
    pub fn recorded_generations(&self, start_time: &str) -> Result<Vec<usize>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare("SELECT generation FROM checkpoints WHERE start_time = ?1 ORDER BY generation")
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let rows = stmt
            .query_map(params![start_time], |row| row.get::<_, i64>(0))
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut generations = Vec::new();
        for row in rows {
            generations.push(row.map_err(|e| DatabaseError::Query(e.to_string()))? as usize);
        }
        Ok(generations)
    }

    /// Checkpoint metadata, or `None` if no complete checkpoint exists.
    pub fn checkpoint(
        &self,
        start_time: &str,
        generation: usize,
    ) -> Result<Option<CheckpointInfo>, DatabaseError> {
        let row = self
            .db
            .connection()
            .query_row(
                "SELECT rng_state, next_identity, populations, organism_count, created_at
                 FROM checkpoints WHERE start_time = ?1 AND generation = ?2",
                params![start_time, generation as i64],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let Some((rng_state, next_identity, names_json, organism_count, created_at)) = row else {
            return Ok(None);
        };
        let populations: Vec<String> = serde_json::from_str(&names_json)
            .map_err(|e| DatabaseError::Encoding(e.to_string()))?;

        Ok(Some(CheckpointInfo {
            start_time: start_time.to_string(),
            generation,
            rng_state,
            next_identity: next_identity as u64,
            populations,
            organism_count: organism_count as usize,
            created_at,
        }))
    }

    fn require_checkpoint(
        &self,
        start_time: &str,
        generation: usize,
    ) -> Result<CheckpointInfo, DatabaseError> {
        self.checkpoint(start_time, generation)?.ok_or_else(|| {
            DatabaseError::NotFound(format!("checkpoint ({start_time}, generation {generation})"))
        })
    }

    /// Organisms of one population at a checkpoint, in recorded order.
    pub fn load_population(
        &self,
        start_time: &str,
        generation: usize,
        population: &str,
        alphabet: &Alphabet,
    ) -> Result<Population, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare_cached(
                "SELECT identity, fitness, x, y, z, data FROM organisms
                 WHERE start_time = ?1 AND generation = ?2 AND population = ?3
                 ORDER BY position",
            )
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let rows = stmt
            .query_map(params![start_time, generation as i64, population], |row| {
                Ok(OrganismSnapshot {
                    identity: row.get::<_, i64>(0)? as u64,
                    fitness: row.get::<_, Option<f64>>(1)?.unwrap_or(f64::NAN),
                    location: Location::new(
                        row.get::<_, i64>(2)? as usize,
                        row.get::<_, i64>(3)? as usize,
                        row.get::<_, i64>(4)? as usize,
                    ),
                    data: row.get(5)?,
                })
            })
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut agents = Vec::new();
        for row in rows {
            let snap = row.map_err(|e| DatabaseError::Query(e.to_string()))?;
            agents.push(snap.to_organism(alphabet)?);
        }
        Ok(Population::new(population, agents))
    }

    /// Every population recorded at a checkpoint, in run order.
    pub fn load_populations(
        &self,
        start_time: &str,
        generation: usize,
        alphabet: &Alphabet,
    ) -> Result<Populations, DatabaseError> {
        let info = self.require_checkpoint(start_time, generation)?;
        let pops = info
            .populations
            .iter()
            .map(|name| self.load_population(start_time, generation, name, alphabet))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Populations::from(pops))
    }

    /// World grid at a checkpoint, with its un-buried fossil archive.
    pub fn load_world(
        &self,
        start_time: &str,
        generation: usize,
        alphabet: &Alphabet,
    ) -> Result<World, DatabaseError> {
        let row = self
            .db
            .connection()
            .query_row(
                "SELECT snapshot, pending_fossils FROM world WHERE start_time = ?1 AND generation = ?2",
                params![start_time, generation as i64],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<Vec<u8>>>(1)?)),
            )
            .optional()
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let (snapshot_json, pending) = row.ok_or_else(|| {
            DatabaseError::NotFound(format!("world ({start_time}, generation {generation})"))
        })?;
        let snapshot: WorldSnapshot = serde_json::from_str(&snapshot_json)
            .map_err(|e| DatabaseError::Encoding(e.to_string()))?;
        let mut world =
            World::from_snapshot(snapshot).map_err(|e| DatabaseError::Encoding(e.to_string()))?;
        if let Some(bytes) = pending {
            world.restore_fossils(decode_organisms(&bytes, alphabet)?);
        }
        Ok(world)
    }

    /// Fitness statistics per checkpointed generation, over all populations.
    ///
    /// NaN fitness values are stored as NULL and left out of the statistics.
    pub fn fitness_history(
        &self,
        start_time: &str,
    ) -> Result<Vec<(usize, FitnessStats)>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT o.generation, o.fitness FROM organisms o
                 JOIN checkpoints c ON c.start_time = o.start_time AND c.generation = o.generation
                 WHERE o.start_time = ?1
                 ORDER BY o.generation",
            )
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let rows = stmt
            .query_map(params![start_time], |row| {
                Ok((row.get::<_, i64>(0)? as usize, row.get::<_, Option<f64>>(1)?))
            })
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut by_generation: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for row in rows {
            let (generation, fitness) = row.map_err(|e| DatabaseError::Query(e.to_string()))?;
            let values = by_generation.entry(generation).or_default();
            values.extend(fitness);
        }

        Ok(by_generation
            .into_iter()
            .map(|(generation, values)| (generation, FitnessStats::from_values(&values)))
            .collect())
    }

    /// Number of fossils buried for a run.
    pub fn fossil_count(&self, start_time: &str) -> Result<usize, DatabaseError> {
        self.db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM fossils WHERE start_time = ?1",
                params![start_time],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .map_err(|e| DatabaseError::Query(e.to_string()))
    }

    /// Close the database.
    pub fn close(self) -> Result<(), DatabaseError> {
        self.db.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::rng::rng_from_seed;
    use crate::genome::{Chromosome, Organism, OrganismId, Status};
    use crate::storage::{CheckpointView, Recorder};
    use rand::Rng;
    use tempfile::tempdir;

    fn organism(id: u64, deme: &str, fitness: f64) -> Organism {
        let chr = Chromosome::from_symbols("ACGT", Alphabet::dna()).unwrap();
        let mut status = Status::new(OrganismId(id), deme, Location::new(1, 0, 0), 2);
        status.fitness = fitness;
        Organism::new(vec![chr], status).unwrap()
    }

    #[test]
    fn test_checkpoint_restores_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("query.sqlite");
        let mut config = Configuration::default();
        config.simulation_name = "query-test".into();

        let pops = Populations::from(vec![
            Population::new("a", vec![organism(0, "a", 1.0), organism(1, "a", 3.0)]),
            Population::new("b", vec![]),
        ]);
        let mut world = World::new(2, 1, 1, 5).unwrap();
        world.census(&pops).unwrap();
        world
            .cell_mut(Location::new(1, 0, 0))
            .unwrap()
            .set_attribute("food", 7);
        world.fossilize(&pops, 0.5, &mut rng_from_seed(Some(2)));
        let mut rng = rng_from_seed(Some(9));
        let _: u64 = rng.random();

        let mut recorder = Recorder::open(&path, 3).unwrap();
        recorder.register_run("run-q", &config, Some(("run-p", 4))).unwrap();
        recorder
            .record_checkpoint(&CheckpointView {
                start_time: "run-q",
                generation: 2,
                populations: &pops,
                world: &world,
                rng: &rng,
                next_identity: 2,
            })
            .unwrap();
        drop(recorder);

        let query = QueryBuilder::new(&path).unwrap();
        assert_eq!(query.list_runs().unwrap(), vec!["run-q".to_string()]);
        let info = query.run_info("run-q").unwrap();
        assert_eq!(info.config, config);
        assert_eq!(info.revived_from, Some(("run-p".to_string(), 4)));
        assert_eq!(query.recorded_generations("run-q").unwrap(), vec![2]);

        let cp = query.checkpoint("run-q", 2).unwrap().unwrap();
        assert_eq!(cp.populations, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cp.organism_count, 2);
        assert!(query.checkpoint("run-q", 3).unwrap().is_none());

        let loaded = query.load_populations("run-q", 2, &Alphabet::dna()).unwrap();
        assert_eq!(loaded, pops);

        let loaded_world = query.load_world("run-q", 2, &Alphabet::dna()).unwrap();
        assert_eq!(loaded_world.snapshot(), world.snapshot());
        assert_eq!(loaded_world.fossils(), world.fossils());

        let history = query.fitness_history("run-q").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].1.mean, 2.0);
        assert_eq!(query.fossil_count("run-q").unwrap(), 0);
    }

    #[test]
    fn test_missing_database_and_run() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            QueryBuilder::new(dir.path().join("absent.sqlite")),
            Err(DatabaseError::NotFound(_))
        ));

        let path = dir.path().join("empty.sqlite");
        Database::open(&path).unwrap().close().unwrap();
        let query = QueryBuilder::new(&path).unwrap();
        assert!(matches!(query.run_info("nope"), Err(DatabaseError::NotFound(_))));
        assert!(query.load_populations("nope", 0, &Alphabet::dna()).is_err());
    }
}
