//! Simulation parameters and configuration.
//!
//! A [`Configuration`] fully describes a run. It is loaded from JSON, checked
//! once by [`Configuration::validate`], and stored verbatim with every run so
//! revival can rebuild the same setup.

use crate::base::{Alphabet, Location};
use crate::errors::{ConfigError, MutationError};
use crate::evolution::{MutationModel, MutationType, Substitution};
use crate::interpreter::Interpreter;
use crate::world::{DeploymentCode, OverflowPolicy};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// The master configuration struct.
/// Can be deserialized from a file to fully reproduce a simulation setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub simulation_name: String,
    pub population: PopulationConfig,
    pub world: WorldConfig,
    pub genome: GenomeConfig,
    pub mutation: MutationConfig,
    pub interpreter: InterpreterConfig,
    pub execution: ExecutionConfig,
    pub reporting: ReportingConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            simulation_name: "simulation".to_string(),
            population: PopulationConfig::default(),
            world: WorldConfig::default(),
            genome: GenomeConfig::default(),
            mutation: MutationConfig::default(),
            interpreter: InterpreterConfig::default(),
            execution: ExecutionConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }
}

/// Populations and where they start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub population_names: Vec<String>,
    /// Initial number of organisms per population.
    pub population_size: usize,
    /// One location list per population, or a single list shared by all.
    pub population_locations: Vec<Vec<Location>>,
    pub deployment_code: DeploymentCode,
    pub overflow_policy: OverflowPolicy,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            population_names: vec!["pop_01".to_string()],
            population_size: 100,
            population_locations: vec![vec![Location::ORIGIN]],
            deployment_code: DeploymentCode::Single,
            overflow_policy: OverflowPolicy::Reject,
        }
    }
}

impl PopulationConfig {
    /// Deployment locations of the population at `index`.
    pub fn locations_for(&self, index: usize) -> &[Location] {
        match self.population_locations.as_slice() {
            [shared] => shared,
            lists => lists.get(index).map(Vec::as_slice).unwrap_or(&[]),
        }
    }
}

/// World bounds and cell capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub world_x: usize,
    pub world_y: usize,
    pub world_z: usize,
    pub eco_cell_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_x: 1,
            world_y: 1,
            world_z: 1,
            eco_cell_capacity: 100,
        }
    }
}

impl WorldConfig {
    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.world_x, self.world_y, self.world_z)
    }
}

/// Shape of founder genomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeConfig {
    /// Chromosomes per organism.
    pub genome_size: usize,
    /// Length of randomly generated chromosomes.
    pub chromosome_size: usize,
    pub chromosome_bases: Alphabet,
    /// When set, every founder chromosome is exactly this string.
    pub initial_chromosome: Option<String>,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            genome_size: 1,
            chromosome_size: 100,
            chromosome_bases: Alphabet::binary(),
            initial_chromosome: None,
        }
    }
}

/// Which organisms the mutation hook is applied to each generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationTarget {
    /// Only organisms created by mating this generation.
    New,
    /// Every organism.
    #[default]
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    pub background_mutation: f64,
    pub additional_mutation: f64,
    pub mutation_type: MutationType,
    pub substitution: Substitution,
    pub mutation_target: MutationTarget,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            background_mutation: 0.0001,
            additional_mutation: 0.0,
            mutation_type: MutationType::Point,
            substitution: Substitution::ExcludeSelf,
            mutation_target: MutationTarget::All,
        }
    }
}

impl MutationConfig {
    /// Build the mutation model over `alphabet`.
    pub fn model(&self, alphabet: &Alphabet) -> Result<MutationModel, MutationError> {
        Ok(MutationModel::new(
            alphabet.clone(),
            self.mutation_type,
            self.background_mutation,
            self.additional_mutation,
        )?
        .with_substitution(self.substitution))
    }
}

/// Codon interpreter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Interpreter name; only `"ragaraja"` is supported.
    pub interpreter: String,
    /// Symbols per codon.
    pub instruction_size: usize,
    pub ragaraja_version: u8,
    pub ragaraja_instructions: Vec<String>,
    /// Symbol translation applied before codons are formed.
    pub base_converter: Option<HashMap<char, char>>,
    pub max_tape_length: usize,
    /// Codon budget per organism per generation.
    pub max_codon: usize,
    pub interpret_chromosome: bool,
    /// Start from a zeroed tape every generation.
    pub clean_cell: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            interpreter: "ragaraja".to_string(),
            instruction_size: 3,
            ragaraja_version: 0,
            ragaraja_instructions: ["000", "001", "010", "011", "100", "101"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            base_converter: None,
            max_tape_length: 50,
            max_codon: 2000,
            interpret_chromosome: false,
            clean_cell: false,
        }
    }
}

/// Loop bounds and archival cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Stop once any organism reaches this fitness.
    pub goal: Option<f64>,
    pub maximum_generations: usize,
    pub eco_buried_frequency: usize,
    pub fossilized_ratio: f64,
    pub fossilized_frequency: usize,
    /// Optional RNG seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            goal: None,
            maximum_generations: 100,
            eco_buried_frequency: 100,
            fossilized_ratio: 0.01,
            fossilized_frequency: 20,
            seed: None,
        }
    }
}

/// Reporting and persistence cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub print_frequency: usize,
    /// SQLite file for checkpoints; no persistence when unset.
    pub database_file: Option<PathBuf>,
    pub database_logging_frequency: usize,
    /// zstd level for genome blobs.
    pub compression_level: i32,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            print_frequency: 10,
            database_file: None,
            database_logging_frequency: 1,
            compression_level: 3,
        }
    }
}

/// Whether `generation` is a multiple of `frequency`; a frequency of 0 never fires.
#[inline]
pub fn is_due(generation: usize, frequency: usize) -> bool {
    frequency != 0 && generation.is_multiple_of(frequency)
}

impl Configuration {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every cross-field constraint. Called once before a run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        // Populations
        let names = &self.population.population_names;
        if names.is_empty() {
            return invalid("population_names must not be empty".into());
        }
        let mut seen = HashSet::new();
        for name in names {
            if name.is_empty() {
                return invalid("population names must not be empty".into());
            }
            if !seen.insert(name) {
                return invalid(format!("duplicate population name '{name}'"));
            }
        }

        // World
        let dims = self.world.dimensions();
        if dims.0 == 0 || dims.1 == 0 || dims.2 == 0 {
            return invalid(format!("world dimensions {dims:?} must all be positive"));
        }
        if self.world.eco_cell_capacity == 0 {
            return invalid("eco_cell_capacity must be positive".into());
        }

        // Deployment
        let lists = &self.population.population_locations;
        if !matches!(
            self.population.deployment_code,
            DeploymentCode::Custom | DeploymentCode::Centralized
        ) {
            if lists.len() != 1 && lists.len() != names.len() {
                return invalid(format!(
                    "population_locations has {} lists; expected 1 or {}",
                    lists.len(),
                    names.len()
                ));
            }
            if lists.iter().any(Vec::is_empty) {
                return invalid("population_locations lists must not be empty".into());
            }
        }
        if let Some(loc) = lists.iter().flatten().find(|l| !l.within(dims)) {
            return invalid(format!("location {loc} lies outside world bounds {dims:?}"));
        }

        // Genome
        if self.genome.genome_size == 0 {
            return invalid("genome_size must be at least 1".into());
        }
        match &self.genome.initial_chromosome {
            Some(text) => {
                if let Some(c) = text.chars().find(|&c| !self.genome.chromosome_bases.contains(c)) {
                    return invalid(format!(
                        "initial_chromosome symbol '{c}' is not in chromosome_bases"
                    ));
                }
            }
            None if self.genome.chromosome_size == 0 => {
                return invalid("chromosome_size must be positive".into());
            }
            None => {}
        }

        // Mutation
        self.mutation
            .model(&self.genome.chromosome_bases)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        // Interpreter
        if self.interpreter.interpret_chromosome {
            if self.interpreter.interpreter != "ragaraja" {
                return invalid(format!(
                    "unsupported interpreter '{}'",
                    self.interpreter.interpreter
                ));
            }
            Interpreter::from_config(&self.interpreter)?;
        }

        // Execution
        let ratio = self.execution.fossilized_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return invalid(format!("fossilized_ratio {ratio} must be within [0, 1]"));
        }
        if let Some(goal) = self.execution.goal {
            if !goal.is_finite() {
                return invalid(format!("goal {goal} must be finite"));
            }
        }

        // Reporting
        if !(0..=22).contains(&self.reporting.compression_level) {
            return invalid(format!(
                "compression_level {} must be within 0..=22",
                self.reporting.compression_level
            ));
        }

        Ok(())
    }
}

/// Parameters for resuming a recorded run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevivalConfig {
    /// Database holding the recorded run.
    pub database_source: PathBuf,
    /// Start-time identifier of the recorded run.
    pub simulation_time: String,
    /// One generation for all populations, or one per population.
    pub rev_start: Vec<usize>,
    /// Generations to run past the latest revived generation.
    pub extend_gen: usize,
    /// Replacement configuration; the recorded one is used when absent.
    #[serde(default)]
    pub parameters: Option<Configuration>,
}

impl RevivalConfig {
    pub fn new(
        database_source: impl Into<PathBuf>,
        simulation_time: impl Into<String>,
        rev_start: Vec<usize>,
        extend_gen: usize,
    ) -> Self {
        Self {
            database_source: database_source.into(),
            simulation_time: simulation_time.into(),
            rev_start,
            extend_gen,
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Configuration) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Latest generation named in `rev_start`.
    pub fn latest_generation(&self) -> Option<usize> {
        self.rev_start.iter().copied().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        Configuration::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Configuration::from_json_str(
            r#"{
                "simulation_name": "demo",
                "population": {"population_names": ["a", "b"], "population_size": 10,
                               "population_locations": [[{"x": 0, "y": 0, "z": 0}]],
                               "deployment_code": 3},
                "genome": {"chromosome_bases": ["A", "T", "G", "C"], "chromosome_size": 30},
                "mutation": {"mutation_type": "indel", "substitution": "include_self",
                             "mutation_target": "new"},
                "execution": {"seed": 7, "goal": 2.5}
            }"#,
        )
        .unwrap();

        assert_eq!(config.simulation_name, "demo");
        assert_eq!(config.population.deployment_code, DeploymentCode::Even);
        assert_eq!(config.genome.chromosome_bases, Alphabet::dna());
        assert_eq!(config.mutation.mutation_type, MutationType::Indel);
        assert_eq!(config.mutation.mutation_target, MutationTarget::New);
        assert_eq!(config.execution.seed, Some(7));
        assert_eq!(config.world, WorldConfig::default());
        assert_eq!(config.population.locations_for(1), &[Location::ORIGIN]);
        config.validate().unwrap();
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = Configuration::default();
        config.reporting.database_file = Some(PathBuf::from("run.db"));
        config.interpreter.base_converter = Some([('A', '0')].into_iter().collect());
        let back = Configuration::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut c = Configuration::default();
        c.population.population_names = vec!["a".into(), "a".into()];
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.world.world_y = 0;
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.population.population_locations = vec![vec![Location::new(5, 0, 0)]];
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.genome.initial_chromosome = Some("012".into());
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.mutation.background_mutation = 0.9;
        c.mutation.additional_mutation = 0.2;
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.execution.fossilized_ratio = 1.5;
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.interpreter.interpret_chromosome = true;
        c.interpreter.ragaraja_version = 9;
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.population.population_names = vec!["a".into(), "b".into(), "c".into()];
        c.population.population_locations = vec![vec![Location::ORIGIN], vec![Location::ORIGIN]];
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_centralized_needs_no_locations() {
        let mut c = Configuration::default();
        c.population.deployment_code = DeploymentCode::Centralized;
        c.population.population_locations = Vec::new();
        c.validate().unwrap();
    }

    #[test]
    fn test_is_due() {
        assert!(is_due(0, 5));
        assert!(is_due(10, 5));
        assert!(!is_due(3, 5));
        assert!(!is_due(0, 0));
    }

    #[test]
    fn test_revival_latest_generation() {
        let rev = RevivalConfig::new("x.db", "t", vec![3, 7, 5], 10);
        assert_eq!(rev.latest_generation(), Some(7));
        assert_eq!(RevivalConfig::new("x.db", "t", vec![], 1).latest_generation(), None);
    }
}
