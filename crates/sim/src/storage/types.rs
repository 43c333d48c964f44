use crate::base::{Alphabet, Location, SimRng};
use crate::errors::DatabaseError;
use crate::genome::{Chromosome, Organism, Status};
use crate::simulation::{Configuration, Population, Populations};
use crate::world::World;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Borrowed view of everything a checkpoint records.
///
/// Handed to the `database_report` hook; the default hook passes it straight
/// to [`Recorder::record_checkpoint`](crate::storage::Recorder::record_checkpoint).
#[derive(Debug, Clone, Copy)]
pub struct CheckpointView<'a> {
    pub start_time: &'a str,
    pub generation: usize,
    pub populations: &'a Populations,
    pub world: &'a World,
    pub rng: &'a SimRng,
    /// Next value of the identity allocator.
    pub next_identity: u64,
}

/// Serialized content of one organism.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrganismRecord {
    genome: Vec<String>,
    status: Status,
    cytoplasm: Option<Vec<i64>>,
}

/// Snapshot of an organism for database storage.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganismSnapshot {
    pub identity: u64,
    pub fitness: f64,
    pub location: Location,
    /// zstd-compressed bincode record of genome, status and tape.
    pub data: Vec<u8>,
}

impl OrganismSnapshot {
    /// Create a snapshot from an organism.
    pub fn from_organism(
        organism: &Organism,
        compression_level: i32,
    ) -> Result<Self, DatabaseError> {
        let record = OrganismRecord {
            genome: organism.genome().iter().map(|c| c.to_string()).collect(),
            status: organism.status().clone(),
            cytoplasm: organism.cytoplasm().map(<[i64]>::to_vec),
        };
        Ok(Self {
            identity: organism.id().0,
            fitness: organism.fitness(),
            location: organism.location(),
            data: encode_blob(&record, compression_level)?,
        })
    }

    /// Convert back to an organism, parsing chromosomes with `alphabet`.
    pub fn to_organism(&self, alphabet: &Alphabet) -> Result<Organism, DatabaseError> {
        let record: OrganismRecord = decode_blob(&self.data)?;
        let genome = record
            .genome
            .iter()
            .map(|text| Chromosome::from_symbols(text, alphabet.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::Encoding(format!("Failed to restore genome: {e}")))?;
        let mut organism = Organism::new(genome, record.status)
            .map_err(|e| DatabaseError::Encoding(format!("Failed to restore organism: {e}")))?;
        organism.set_cytoplasm(record.cytoplasm);
        Ok(organism)
    }
}

/// Bincode-encode and zstd-compress a value. Level 0 selects zstd's default.
pub fn encode_blob<T: Serialize>(value: &T, level: i32) -> Result<Vec<u8>, DatabaseError> {
    let raw = bincode::serialize(value)
        .map_err(|e| DatabaseError::Encoding(format!("Serialization failed: {e}")))?;
    zstd::bulk::compress(&raw, level)
        .map_err(|e| DatabaseError::Encoding(format!("Compression failed: {e}")))
}

/// Inverse of [`encode_blob`].
pub fn decode_blob<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, DatabaseError> {
    let raw = zstd::stream::decode_all(bytes)
        .map_err(|e| DatabaseError::Encoding(format!("Decompression failed: {e}")))?;
    bincode::deserialize(&raw)
        .map_err(|e| DatabaseError::Encoding(format!("Deserialization failed: {e}")))
}

/// Encode a list of organisms (the pending fossil archive) into one blob.
pub(crate) fn encode_organisms(
    organisms: &[Organism],
    level: i32,
) -> Result<Vec<u8>, DatabaseError> {
    let records: Vec<OrganismRecord> = organisms
        .iter()
        .map(|o| OrganismRecord {
            genome: o.genome().iter().map(|c| c.to_string()).collect(),
            status: o.status().clone(),
            cytoplasm: o.cytoplasm().map(<[i64]>::to_vec),
        })
        .collect();
    encode_blob(&records, level)
}

pub(crate) fn decode_organisms(
    bytes: &[u8],
    alphabet: &Alphabet,
) -> Result<Vec<Organism>, DatabaseError> {
    let records: Vec<OrganismRecord> = decode_blob(bytes)?;
    records
        .into_iter()
        .map(|r| {
            let genome = r
                .genome
                .iter()
                .map(|text| Chromosome::from_symbols(text, alphabet.clone()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| DatabaseError::Encoding(format!("Failed to restore genome: {e}")))?;
            let mut organism = Organism::new(genome, r.status)
                .map_err(|e| DatabaseError::Encoding(format!("Failed to restore organism: {e}")))?;
            organism.set_cytoplasm(r.cytoplasm);
            Ok(organism)
        })
        .collect()
}

/// Aggregated fitness statistics for a generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
    pub count: usize,
}

impl FitnessStats {
    /// Statistics over raw fitness values; all zero for an empty slice.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                min: 0.0,
                max: 0.0,
                std: 0.0,
                count: 0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std: variance.sqrt(),
            count: values.len(),
        }
    }

    /// Calculate fitness statistics from a population.
    pub fn from_population(pop: &Population) -> Self {
        Self::from_values(&pop.fitness_values())
    }
}

/// A recorded run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub start_time: String,
    pub simulation_name: String,
    pub config: Configuration,
    /// Source run and generation when this run is a revival.
    pub revived_from: Option<(String, usize)>,
    pub created_at: String,
}

/// Checkpoint metadata (the completion marker row).
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointInfo {
    pub start_time: String,
    pub generation: usize,
    pub rng_state: Vec<u8>,
    pub next_identity: u64,
    /// Population names in run order.
    pub populations: Vec<String>,
    pub organism_count: usize,
    pub created_at: String,
}

static LAST_START_MICROS: AtomicI64 = AtomicI64::new(0);

/// Start-time identifier `YYYY-MM-DD-<unix seconds>.<microseconds>`.
///
/// Identifiers are strictly increasing within a process, so two runs started
/// in the same microsecond still get distinct keys.
pub fn new_start_time() -> String {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_START_MICROS.load(Ordering::Relaxed);
    let micros = loop {
        let candidate = now.max(last + 1);
        match LAST_START_MICROS.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break candidate,
            Err(actual) => last = actual,
        }
    };
    format_start_time(micros)
}

fn format_start_time(micros: i64) -> String {
    let secs = micros.div_euclid(1_000_000);
    let frac = micros.rem_euclid(1_000_000);
    let date = Utc
        .timestamp_opt(secs, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "1970-01-01".to_string());
    format!("{date}-{secs}.{frac:06}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::OrganismId;

    fn organism() -> Organism {
        let alphabet = Alphabet::dna();
        let genome = vec![
            Chromosome::from_symbols("GATTACA", alphabet.clone()).unwrap(),
            Chromosome::from_symbols("CC", alphabet).unwrap(),
        ];
        let mut status = Status::new(OrganismId(42), "pop_1", Location::new(1, 2, 0), 5);
        status.fitness = 0.75;
        status.parents = vec![OrganismId(3), OrganismId(9)];
        status.output = vec![1, -2];
        let mut org = Organism::new(genome, status).unwrap();
        org.set_cytoplasm(Some(vec![0, 7, 0]));
        org
    }

    #[test]
    fn test_snapshot_restores_organism() {
        let org = organism();
        let snap = OrganismSnapshot::from_organism(&org, 3).unwrap();
        assert_eq!(snap.identity, 42);
        assert_eq!(snap.fitness, 0.75);
        assert_eq!(snap.location, Location::new(1, 2, 0));

        let back = snap.to_organism(&Alphabet::dna()).unwrap();
        assert_eq!(back, org);
    }

    #[test]
    fn test_snapshot_with_wrong_alphabet_fails() {
        let snap = OrganismSnapshot::from_organism(&organism(), 1).unwrap();
        let err = snap.to_organism(&Alphabet::binary()).unwrap_err();
        assert!(matches!(err, DatabaseError::Encoding(_)));
    }

    #[test]
    fn test_decode_garbage_blob() {
        assert!(decode_blob::<Vec<String>>(b"not zstd").is_err());
    }

    #[test]
    fn test_fitness_stats() {
        let stats = FitnessStats::from_values(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert!((stats.std - 1.118_033_988).abs() < 1e-6);
        assert_eq!(FitnessStats::from_values(&[]).count, 0);
    }

    #[test]
    fn test_start_time_format_and_uniqueness() {
        assert_eq!(format_start_time(1_382_200_534_100_000), "2013-10-19-1382200534.100000");

        let a = new_start_time();
        let b = new_start_time();
        assert_ne!(a, b);
        let (date, stamp) = a.rsplit_once('-').unwrap();
        assert_eq!(date.len(), 10);
        assert!(stamp.contains('.'));
    }
}
