//! Checkpoint recorder.
//!
//! Writes one transaction per checkpoint. Organism records are encoded in
//! parallel before the transaction opens; the `checkpoints` row is inserted
//! last and acts as the completion marker.

use crate::base::rng::rng_state_bytes;
use crate::errors::DatabaseError;
use crate::genome::Organism;
use crate::simulation::Configuration;
use crate::storage::types::encode_organisms;
use crate::storage::{CheckpointView, Database, OrganismSnapshot};
use chrono::Utc;
use log::{debug, info};
use rayon::prelude::*;
use rusqlite::{OptionalExtension, params};
use std::path::Path;

/// Counters kept by a [`Recorder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub checkpoints_written: usize,
    pub organisms_written: usize,
    pub fossils_buried: usize,
    /// Encoded organism bytes written, after compression.
    pub bytes_written: usize,
}

/// Synchronous checkpoint writer bound to one database file.
#[derive(Debug)]
pub struct Recorder {
    db: Database,
    compression_level: i32,
    stats: RecorderStats,
}

impl Recorder {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>, compression_level: i32) -> Result<Self, DatabaseError> {
        let db = Database::open(path)?;
        debug!("Recorder opened {}", db.path());
        Ok(Self {
            db,
            compression_level,
            stats: RecorderStats::default(),
        })
    }

    pub fn stats(&self) -> &RecorderStats {
        &self.stats
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }

    /// Register a run and its full configuration.
    ///
    /// `revived_from` names the source run and generation of a revival.
    pub fn register_run(
        &mut self,
        start_time: &str,
        config: &Configuration,
        revived_from: Option<(&str, usize)>,
    ) -> Result<(), DatabaseError> {
        let config_json = config
            .to_json()
            .map_err(|e| DatabaseError::Encoding(e.to_string()))?;
        let (source, source_generation) = match revived_from {
            Some((source, generation)) => (Some(source), Some(generation as i64)),
            None => (None, None),
        };

        self.db
            .connection()
            .execute(
                "INSERT INTO runs (start_time, simulation_name, config_json, revived_from, revived_generation, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    start_time,
                    config.simulation_name,
                    config_json,
                    source,
                    source_generation,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| DatabaseError::Insert(e.to_string()))?;

        info!("Registered run {start_time} ({})", config.simulation_name);
        Ok(())
    }

    /// Whether a checkpoint for `(start_time, generation)` is complete.
    pub fn has_checkpoint(
        &self,
        start_time: &str,
        generation: usize,
    ) -> Result<bool, DatabaseError> {
        self.db
            .connection()
            .query_row(
                "SELECT 1 FROM checkpoints WHERE start_time = ?1 AND generation = ?2",
                params![start_time, generation as i64],
                |_| Ok(()),
            )
            .optional()
            .map(|row| row.is_some())
            .map_err(|e| DatabaseError::Query(e.to_string()))
    }

    /// Write a full checkpoint: every organism, the world and the RNG state.
    ///
    /// Either the whole checkpoint is visible afterwards or nothing is.
    pub fn record_checkpoint(&mut self, view: &CheckpointView<'_>) -> Result<(), DatabaseError> {
        if self.has_checkpoint(view.start_time, view.generation)? {
            return Err(DatabaseError::CheckpointExists {
                start_time: view.start_time.to_string(),
                generation: view.generation,
            });
        }

        let level = self.compression_level;
        let encoded = view
            .populations
            .iter()
            .map(|pop| {
                let snapshots = pop
                    .agents()
                    .par_iter()
                    .map(|organism| OrganismSnapshot::from_organism(organism, level))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((pop.name().to_string(), snapshots))
            })
            .collect::<Result<Vec<(String, Vec<OrganismSnapshot>)>, DatabaseError>>()?;

        let world_json = serde_json::to_string(&view.world.snapshot())
            .map_err(|e| DatabaseError::Encoding(e.to_string()))?;
        let pending_fossils = if view.world.fossils().is_empty() {
            None
        } else {
            Some(encode_organisms(view.world.fossils(), level)?)
        };
        let rng_state = rng_state_bytes(view.rng)?;
        let names_json = serde_json::to_string(&view.populations.names())
            .map_err(|e| DatabaseError::Encoding(e.to_string()))?;
        let generation = view.generation as i64;

        let mut organism_count = 0usize;
        let mut bytes = 0usize;
        let tx = self.db.transaction()?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO organisms (start_time, generation, population, position, identity, fitness, x, y, z, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .map_err(|e| DatabaseError::Insert(e.to_string()))?;

            for (population, snapshots) in &encoded {
                for (position, snap) in snapshots.iter().enumerate() {
                    stmt.execute(params![
                        view.start_time,
                        generation,
                        population,
                        position as i64,
                        snap.identity as i64,
                        snap.fitness,
                        snap.location.x as i64,
                        snap.location.y as i64,
                        snap.location.z as i64,
                        snap.data
                    ])
                    .map_err(|e| DatabaseError::Insert(e.to_string()))?;
                    organism_count += 1;
                    bytes += snap.data.len();
                }
            }
        }

        tx.execute(
            "INSERT INTO world (start_time, generation, snapshot, pending_fossils) VALUES (?1, ?2, ?3, ?4)",
            params![view.start_time, generation, world_json, pending_fossils],
        )
        .map_err(|e| DatabaseError::Insert(e.to_string()))?;

        tx.execute(
            "INSERT INTO checkpoints (start_time, generation, rng_state, next_identity, populations, organism_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                view.start_time,
                generation,
                rng_state,
                view.next_identity as i64,
                names_json,
                organism_count as i64,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| DatabaseError::Insert(e.to_string()))?;

        tx.commit()
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

        self.stats.checkpoints_written += 1;
        self.stats.organisms_written += organism_count;
        self.stats.bytes_written += bytes;
        debug!(
            "Checkpoint {} gen {}: {organism_count} organisms, {bytes} bytes",
            view.start_time, view.generation
        );
        Ok(())
    }

    /// Archive buried fossils. Returns the number of rows written.
    pub fn record_fossils(
        &mut self,
        start_time: &str,
        generation: usize,
        fossils: &[Organism],
    ) -> Result<usize, DatabaseError> {
        if fossils.is_empty() {
            return Ok(0);
        }
        let level = self.compression_level;
        let snapshots = fossils
            .par_iter()
            .map(|organism| OrganismSnapshot::from_organism(organism, level))
            .collect::<Result<Vec<_>, _>>()?;

        let tx = self.db.transaction()?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO fossils (start_time, generation, identity, population, fitness, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|e| DatabaseError::Insert(e.to_string()))?;
            for (organism, snap) in fossils.iter().zip(&snapshots) {
                stmt.execute(params![
                    start_time,
                    generation as i64,
                    snap.identity as i64,
                    organism.status().deme,
                    snap.fitness,
                    snap.data
                ])
                .map_err(|e| DatabaseError::Insert(e.to_string()))?;
            }
        }
        tx.commit()
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

        self.stats.fossils_buried += snapshots.len();
        Ok(snapshots.len())
    }

    /// Close the underlying database.
    pub fn close(self) -> Result<RecorderStats, DatabaseError> {
        let stats = self.stats;
        self.db.close()?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::rng::rng_from_seed;
    use crate::base::{Alphabet, Location};
    use crate::genome::{Chromosome, OrganismId, Status};
    use crate::simulation::{Population, Populations};
    use crate::world::World;
    use tempfile::tempdir;

    fn populations(n: usize) -> Populations {
        let agents = (0..n)
            .map(|i| {
                let chr = Chromosome::from_symbols("0110", Alphabet::binary()).unwrap();
                let mut status = Status::new(OrganismId(i as u64), "pop_01", Location::ORIGIN, 0);
                status.fitness = i as f64;
                Organism::new(vec![chr], status).unwrap()
            })
            .collect();
        Populations::from(vec![Population::new("pop_01", agents), Population::new("empty", vec![])])
    }

    #[test]
    fn test_record_checkpoint_and_reject_duplicate() {
        let dir = tempdir().unwrap();
        let mut recorder = Recorder::open(dir.path().join("rec.sqlite"), 3).unwrap();
        let config = Configuration::default();
        recorder.register_run("run-a", &config, None).unwrap();

        let pops = populations(5);
        let world = World::new(1, 1, 1, 10).unwrap();
        let rng = rng_from_seed(Some(1));
        let view = CheckpointView {
            start_time: "run-a",
            generation: 0,
            populations: &pops,
            world: &world,
            rng: &rng,
            next_identity: 5,
        };

        recorder.record_checkpoint(&view).unwrap();
        assert!(recorder.has_checkpoint("run-a", 0).unwrap());
        assert_eq!(recorder.stats().organisms_written, 5);

        let err = recorder.record_checkpoint(&view).unwrap_err();
        assert!(matches!(err, DatabaseError::CheckpointExists { generation: 0, .. }));

        let stats = recorder.database().stats().unwrap();
        assert_eq!(stats.checkpoint_records, 1);
        assert_eq!(stats.organism_records, 5);
        recorder.close().unwrap();
    }

    #[test]
    fn test_duplicate_run_rejected() {
        let dir = tempdir().unwrap();
        let mut recorder = Recorder::open(dir.path().join("runs.sqlite"), 1).unwrap();
        recorder.register_run("run-a", &Configuration::default(), None).unwrap();
        assert!(recorder.register_run("run-a", &Configuration::default(), None).is_err());
    }

    #[test]
    fn test_record_fossils() {
        let dir = tempdir().unwrap();
        let mut recorder = Recorder::open(dir.path().join("fossils.sqlite"), 1).unwrap();
        let pops = populations(3);
        let fossils: Vec<Organism> = pops.organisms().cloned().collect();

        assert_eq!(recorder.record_fossils("run-a", 4, &fossils).unwrap(), 3);
        assert_eq!(recorder.record_fossils("run-a", 8, &[]).unwrap(), 0);
        assert_eq!(recorder.stats().fossils_buried, 3);
        assert_eq!(recorder.database().stats().unwrap().fossil_records, 3);
    }
}
