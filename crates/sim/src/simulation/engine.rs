//! Simulation engine for generation-stepped runs.
//!
//! The engine owns the populations, the world, the random source and the
//! identity allocator, and drives them through the strategy hooks one
//! generation at a time. Checkpoints go to an optional [`Recorder`].

use crate::base::SimRng;
use crate::base::rng::rng_from_seed;
use crate::errors::SimulationError;
use crate::evolution::MutationModel;
use crate::genome::{IdAllocator, OrganismId};
use crate::interpreter::Interpreter;
use crate::simulation::configs::is_due;
use crate::simulation::hooks::{HookContext, HookResult, StrategyHooks};
use crate::simulation::initialization::{deploy_populations, spawn_populations};
use crate::simulation::{Configuration, MutationTarget, Populations, RevivalConfig};
use crate::storage::{CheckpointView, FitnessStats, Recorder, new_start_time};
use crate::world::{DeploymentCode, World};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fmt;

/// Log target of periodic reports.
pub const REPORT_TARGET: &str = "evogrid::report";

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The generation counter reached the configured bound.
    GenerationLimit,
    /// An organism reached the configured fitness goal.
    GoalReached,
    /// A step failed.
    Aborted,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GenerationLimit => write!(f, "generation limit reached"),
            Self::GoalReached => write!(f, "fitness goal reached"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Lifecycle of a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Initializing,
    Running,
    Checkpointing,
    Terminated(TerminationReason),
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationSummary {
    pub start_time: String,
    pub final_generation: usize,
    pub reason: TerminationReason,
    pub checkpoints_written: usize,
    pub checkpoint_failures: usize,
}

/// State restored or created before the first checkpoint.
pub(crate) struct RunState {
    pub populations: Populations,
    pub world: World,
    pub rng: SimRng,
    pub ids: IdAllocator,
    pub generation: usize,
    pub bound: usize,
}

/// Main simulation engine.
#[derive(Debug)]
pub struct Simulation<H: StrategyHooks> {
    config: Configuration,
    hooks: H,
    populations: Populations,
    world: World,
    rng: SimRng,
    ids: IdAllocator,
    generation: usize,
    /// Generation at which the run stops.
    bound: usize,
    start_time: String,
    state: SimulationState,
    interpreter: Option<Interpreter>,
    mutation: MutationModel,
    recorder: Option<Recorder>,
    checkpoints_written: usize,
    checkpoint_failures: usize,
}

impl<H: StrategyHooks> Simulation<H> {
    /// Start a fresh run: spawn and deploy the populations, register the run
    /// and write the generation 0 checkpoint.
    pub fn new(config: Configuration, mut hooks: H) -> Result<Self, SimulationError> {
        config.validate()?;

        let mut rng = rng_from_seed(config.execution.seed);
        let (x, y, z) = config.world.dimensions();
        let mut world = World::new(x, y, z, config.world.eco_cell_capacity)?;
        let mut ids = IdAllocator::new();
        let mut populations = spawn_populations(&config, &mut ids, &mut rng)?;

        if config.population.deployment_code == DeploymentCode::Custom {
            for name in populations.names() {
                let mut ctx = HookContext {
                    populations: &mut populations,
                    world: &mut world,
                    rng: &mut rng,
                    ids: &mut ids,
                    generation: 0,
                    config: &config,
                };
                hooks
                    .deployment_scheme(&mut ctx, &name)
                    .map_err(|e| SimulationError::hook("deployment_scheme", 0, e))?;
            }
            world.census(&populations)?;
        } else {
            deploy_populations(&config, &mut populations, &mut world, &mut rng)?;
        }

        let bound = config.execution.maximum_generations;
        let state = RunState {
            populations,
            world,
            rng,
            ids,
            generation: 0,
            bound,
        };
        Self::assemble(config, hooks, state, None)
    }

    /// Resume a recorded run. See [`RevivalConfig`].
    pub fn revive(revival: &RevivalConfig, hooks: H) -> Result<Self, SimulationError> {
        let (config, state) = super::revival::restore(revival)?;
        let source = (revival.simulation_time.as_str(), state.generation);
        Self::assemble(config, hooks, state, Some(source))
    }

    /// Common tail of construction: start time, recorder, first checkpoint.
    fn assemble(
        config: Configuration,
        hooks: H,
        state: RunState,
        revived_from: Option<(&str, usize)>,
    ) -> Result<Self, SimulationError> {
        let interpreter = if config.interpreter.interpret_chromosome {
            Some(Interpreter::from_config(&config.interpreter)?)
        } else {
            None
        };
        let mutation = config.mutation.model(&config.genome.chromosome_bases)?;
        let start_time = new_start_time();

        let recorder = match &config.reporting.database_file {
            Some(path) => {
                let mut recorder = Recorder::open(path, config.reporting.compression_level)?;
                recorder.register_run(&start_time, &config, revived_from)?;
                Some(recorder)
            }
            None => None,
        };

        match revived_from {
            Some((source, generation)) => info!(
                "Simulation {start_time} ({}) revived from {source} at generation {generation}, running to {}",
                config.simulation_name, state.bound
            ),
            None => info!(
                "Simulation {start_time} ({}) started: {} populations, {} organisms, {} generations",
                config.simulation_name,
                state.populations.len(),
                state.populations.total_size(),
                state.bound
            ),
        }

        let mut sim = Self {
            config,
            hooks,
            populations: state.populations,
            world: state.world,
            rng: state.rng,
            ids: state.ids,
            generation: state.generation,
            bound: state.bound,
            start_time,
            state: SimulationState::Initializing,
            interpreter,
            mutation,
            recorder,
            checkpoints_written: 0,
            checkpoint_failures: 0,
        };

        // A revived run always records its starting point.
        sim.checkpoint(revived_from.is_some());
        sim.state = SimulationState::Running;
        if sim.generation >= sim.bound {
            sim.terminate(TerminationReason::GenerationLimit);
        }
        Ok(sim)
    }

    /// Run generations until the run terminates.
    pub fn run(&mut self) -> Result<SimulationSummary, SimulationError> {
        loop {
            if let Some(summary) = self.summary() {
                return Ok(summary);
            }
            self.step()?;
        }
    }

    /// Advance one generation.
    ///
    /// # Errors
    /// `Terminated` when the run has already ended; `Aborted` when a stage
    /// fails, after which the run is terminated.
    pub fn step(&mut self) -> Result<(), SimulationError> {
        if matches!(self.state, SimulationState::Terminated(_)) {
            return Err(SimulationError::Terminated(self.generation));
        }
        let last_completed_generation = self.generation;
        if let Err(source) = self.advance() {
            error!(
                "Simulation {} aborted in generation {}: {source}",
                self.start_time, self.generation
            );
            self.terminate(TerminationReason::Aborted);
            return Err(SimulationError::Aborted {
                last_completed_generation,
                source: Box::new(source),
            });
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<(), SimulationError> {
        self.generation += 1;
        let generation = self.generation;
        debug!("Generation {generation} started");

        // Ecology
        {
            let (hooks, mut ctx) = self.split();
            hooks
                .ecoregulate(&mut ctx)
                .map_err(|e| SimulationError::hook("ecoregulate", generation, e))?;
        }
        let locations: Vec<_> = self.world.locations().collect();
        for &location in &locations {
            let (hooks, mut ctx) = self.split();
            hooks
                .update_ecology(&mut ctx, location)
                .map_err(|e| SimulationError::hook("update_ecology", generation, e))?;
        }
        for &location in &locations {
            let (hooks, mut ctx) = self.split();
            hooks
                .update_local(&mut ctx, location)
                .map_err(|e| SimulationError::hook("update_local", generation, e))?;
        }

        // Movement
        for name in self.populations.names() {
            let (hooks, mut ctx) = self.split();
            hooks
                .organism_movement(&mut ctx, &name)
                .map_err(|e| SimulationError::hook("organism_movement", generation, e))?;
            hooks
                .organism_location(&mut ctx, &name)
                .map_err(|e| SimulationError::hook("organism_location", generation, e))?;
        }
        self.world.census(&self.populations)?;

        if let Some(interpreter) = &self.interpreter {
            interpreter.run_populations(&mut self.populations);
        }

        self.each_population("fitness", |h, ctx, name| h.fitness(ctx, name))?;
        self.each_population("prepopulation_control", |h, ctx, name| {
            h.prepopulation_control(ctx, name)
        })?;

        let before = self.populations.identity_set();
        self.each_population("mating", |h, ctx, name| h.mating(ctx, name))?;
        let newborns = self.stamp_newborns(&before)?;

        self.mutate(&newborns)?;

        self.each_population("postpopulation_control", |h, ctx, name| {
            h.postpopulation_control(ctx, name)
        })?;
        self.each_population("generation_events", |h, ctx, name| {
            h.generation_events(ctx, name)
        })?;
        for organism in self.populations.organisms_mut() {
            organism.status_mut().generation = generation;
        }
        // Culling and mating change occupancy after the movement census.
        self.world.census(&self.populations)?;

        if is_due(generation, self.config.reporting.print_frequency) {
            self.report()?;
        }

        if is_due(generation, self.config.execution.fossilized_frequency) {
            let archived = self.world.fossilize(
                &self.populations,
                self.config.execution.fossilized_ratio,
                &mut self.rng,
            );
            debug!("Fossilized {archived} organisms");
        }
        if is_due(generation, self.config.execution.eco_buried_frequency) {
            self.bury();
        }

        self.checkpoint(false);

        if self.goal_reached() {
            self.terminate(TerminationReason::GoalReached);
        } else if self.generation >= self.bound {
            self.terminate(TerminationReason::GenerationLimit);
        }
        Ok(())
    }

    /// Hooks plus a context over the rest of the state.
    fn split(&mut self) -> (&mut H, HookContext<'_>) {
        (
            &mut self.hooks,
            HookContext {
                populations: &mut self.populations,
                world: &mut self.world,
                rng: &mut self.rng,
                ids: &mut self.ids,
                generation: self.generation,
                config: &self.config,
            },
        )
    }

    /// Call a per-population hook for every population, in run order.
    fn each_population<F>(&mut self, hook: &'static str, mut call: F) -> Result<(), SimulationError>
    where
        F: FnMut(&mut H, &mut HookContext<'_>, &str) -> HookResult,
    {
        let generation = self.generation;
        for name in self.populations.names() {
            let (hooks, mut ctx) = self.split();
            call(hooks, &mut ctx, &name).map_err(|e| SimulationError::hook(hook, generation, e))?;
        }
        Ok(())
    }

    /// Stamp organisms whose identity was absent from `before` and return
    /// their identities. Fails on any identity held by two organisms.
    fn stamp_newborns(
        &mut self,
        before: &HashSet<OrganismId>,
    ) -> Result<HashSet<OrganismId>, SimulationError> {
        let generation = self.generation;
        let mut seen = HashSet::with_capacity(before.len());
        let mut newborns = HashSet::new();
        for population in self.populations.iter_mut() {
            let deme = population.name().to_string();
            for organism in population.agents_mut() {
                let id = organism.id();
                if !seen.insert(id) {
                    return Err(SimulationError::DuplicateIdentity(id));
                }
                if !before.contains(&id) {
                    let status = organism.status_mut();
                    status.deme.clone_from(&deme);
                    status.generation = generation;
                    status.birth_generation = generation;
                    newborns.insert(id);
                }
            }
        }
        if !newborns.is_empty() {
            debug!("{} organisms born in generation {generation}", newborns.len());
        }
        Ok(newborns)
    }

    fn mutate(&mut self, newborns: &HashSet<OrganismId>) -> Result<(), SimulationError> {
        let generation = self.generation;
        let all = self.config.mutation.mutation_target == MutationTarget::All;
        for population in self.populations.iter_mut() {
            for organism in population.agents_mut() {
                if all || newborns.contains(&organism.id()) {
                    self.hooks
                        .mutation_scheme(organism, &self.mutation, &mut self.rng)
                        .map_err(|e| SimulationError::hook("mutation_scheme", generation, e))?;
                }
            }
        }
        Ok(())
    }

    fn report(&mut self) -> Result<(), SimulationError> {
        let generation = self.generation;
        let start_time = self.start_time.clone();
        let (hooks, mut ctx) = self.split();
        let text = hooks
            .report(&mut ctx)
            .map_err(|e| SimulationError::hook("report", generation, e))?;
        info!(
            target: REPORT_TARGET,
            "[{start_time}] generation {generation}: {} organisms{}",
            ctx.populations.total_size(),
            text.map(|t| format!(" | {t}")).unwrap_or_default()
        );

        for name in ctx.populations.names() {
            let text = hooks
                .population_report(&mut ctx, &name)
                .map_err(|e| SimulationError::hook("population_report", generation, e))?;
            let pop = ctx.populations.require(&name)?;
            let stats = FitnessStats::from_population(pop);
            info!(
                target: REPORT_TARGET,
                "[{start_time}] generation {generation} {name}: size {} fitness mean {:.4} min {:.4} max {:.4} sd {:.4}{}",
                pop.size(),
                stats.mean,
                stats.min,
                stats.max,
                stats.std,
                text.map(|t| format!(" | {t}")).unwrap_or_default()
            );
        }
        Ok(())
    }

    /// Drain the fossil archive into the store; on failure keep the fossils
    /// for the next burial.
    fn bury(&mut self) {
        let fossils = self.world.take_fossils();
        if fossils.is_empty() {
            return;
        }
        let Some(recorder) = self.recorder.as_mut() else {
            debug!("Dropped {} fossils, no database configured", fossils.len());
            return;
        };
        match recorder.record_fossils(&self.start_time, self.generation, &fossils) {
            Ok(n) => debug!("Buried {n} fossils"),
            Err(e) => {
                warn!(
                    "Burial failed in generation {}, keeping {} fossils: {e}",
                    self.generation,
                    fossils.len()
                );
                self.world.restore_fossils(fossils);
            }
        }
    }

    /// Write a checkpoint when due (or when `force`d) and a store is open.
    /// Failures are logged and counted; the run continues.
    fn checkpoint(&mut self, force: bool) {
        let frequency = self.config.reporting.database_logging_frequency;
        let due = if force { frequency != 0 } else { is_due(self.generation, frequency) };
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        if !due {
            return;
        }

        let previous = self.state;
        self.state = SimulationState::Checkpointing;
        let view = CheckpointView {
            start_time: &self.start_time,
            generation: self.generation,
            populations: &self.populations,
            world: &self.world,
            rng: &self.rng,
            next_identity: self.ids.peek(),
        };
        match self.hooks.database_report(recorder, &view) {
            Ok(()) => self.checkpoints_written += 1,
            Err(e) => {
                self.checkpoint_failures += 1;
                warn!("Checkpoint for generation {} failed: {e}", self.generation);
            }
        }
        self.state = previous;
    }

    fn goal_reached(&self) -> bool {
        match self.config.execution.goal {
            Some(goal) => self.populations.organisms().any(|o| o.fitness() >= goal),
            None => false,
        }
    }

    fn terminate(&mut self, reason: TerminationReason) {
        self.state = SimulationState::Terminated(reason);
        info!(
            "Simulation {} terminated at generation {}: {reason} ({} checkpoints, {} failed)",
            self.start_time, self.generation, self.checkpoints_written, self.checkpoint_failures
        );
        if let Some(recorder) = self.recorder.take() {
            if let Err(e) = recorder.close() {
                warn!("Failed to close database: {e}");
            }
        }
    }

    /// Summary of the run, once it has terminated.
    pub fn summary(&self) -> Option<SimulationSummary> {
        match self.state {
            SimulationState::Terminated(reason) => Some(SimulationSummary {
                start_time: self.start_time.clone(),
                final_generation: self.generation,
                reason,
                checkpoints_written: self.checkpoints_written,
                checkpoint_failures: self.checkpoint_failures,
            }),
            _ => None,
        }
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Generation at which the run stops.
    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn start_time(&self) -> &str {
        &self.start_time
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn populations(&self) -> &Populations {
        &self.populations
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Next identity the allocator will hand out.
    pub fn next_identity(&self) -> u64 {
        self.ids.peek()
    }

    pub fn checkpoints_written(&self) -> usize {
        self.checkpoints_written
    }

    pub fn checkpoint_failures(&self) -> usize {
        self.checkpoint_failures
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn into_hooks(self) -> H {
        self.hooks
    }
}

/// Run a fresh simulation to termination.
pub fn simulate<H: StrategyHooks>(
    config: Configuration,
    hooks: H,
) -> Result<SimulationSummary, SimulationError> {
    Simulation::new(config, hooks)?.run()
}

/// Revive a recorded run and continue it to termination.
pub fn revive_simulation<H: StrategyHooks>(
    revival: &RevivalConfig,
    hooks: H,
) -> Result<SimulationSummary, SimulationError> {
    Simulation::revive(revival, hooks)?.run()
}
