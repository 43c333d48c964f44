//! Strategy hooks: the user-supplied behaviour of a run.
//!
//! Every hook has a no-op default, so an implementation only overrides what
//! its scenario needs. Per-population hooks are called once per population,
//! in run order, with the population name.

use crate::base::{Location, SimRng};
use crate::errors::{DatabaseError, HookError};
use crate::evolution::MutationModel;
use crate::genome::{IdAllocator, Organism};
use crate::simulation::{Configuration, Populations};
use crate::storage::{CheckpointView, Recorder};
use crate::world::World;

/// Result type returned by strategy hooks.
pub type HookResult<T = ()> = Result<T, HookError>;

/// Mutable view of the run handed to hooks.
pub struct HookContext<'a> {
    pub populations: &'a mut Populations,
    pub world: &'a mut World,
    /// The run's random source; hooks must draw all randomness from it for
    /// runs to be reproducible.
    pub rng: &'a mut SimRng,
    /// Identity source for new organisms.
    pub ids: &'a mut IdAllocator,
    pub generation: usize,
    pub config: &'a Configuration,
}

impl std::fmt::Debug for HookContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookContext")
            .field("generation", &self.generation)
            .field("populations", &self.populations.names())
            .finish_non_exhaustive()
    }
}

/// Scenario behaviour plugged into the generation loop.
///
/// Any error returned by a hook aborts the run, except for
/// [`database_report`](StrategyHooks::database_report), whose failures are
/// logged and counted.
#[allow(unused_variables)]
pub trait StrategyHooks {
    /// Place a population when `deployment_code` is `Custom`. A census
    /// follows once all populations are placed.
    fn deployment_scheme(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        Ok(())
    }

    fn organism_movement(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        Ok(())
    }

    fn organism_location(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        Ok(())
    }

    /// World-wide ecological update, once per generation.
    fn ecoregulate(&mut self, ctx: &mut HookContext<'_>) -> HookResult {
        Ok(())
    }

    /// Called for every cell in x-major order after `ecoregulate`.
    fn update_ecology(&mut self, ctx: &mut HookContext<'_>, location: Location) -> HookResult {
        Ok(())
    }

    /// Called for every cell after all `update_ecology` calls.
    fn update_local(&mut self, ctx: &mut HookContext<'_>, location: Location) -> HookResult {
        Ok(())
    }

    /// Compute and store the fitness of every organism in `population`.
    fn fitness(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        Ok(())
    }

    /// Mutate one organism. Called for newborns, or for every organism when
    /// `mutation_target` is `all`.
    fn mutation_scheme(
        &mut self,
        organism: &mut Organism,
        model: &MutationModel,
        rng: &mut SimRng,
    ) -> HookResult {
        Ok(())
    }

    fn prepopulation_control(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        Ok(())
    }

    /// Add offspring to `population`. Organisms with an identity unseen before
    /// this hook are stamped as born this generation.
    fn mating(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        Ok(())
    }

    fn postpopulation_control(
        &mut self,
        ctx: &mut HookContext<'_>,
        population: &str,
    ) -> HookResult {
        Ok(())
    }

    fn generation_events(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        Ok(())
    }

    /// Run-wide report text, logged when reporting is due.
    fn report(&mut self, ctx: &mut HookContext<'_>) -> HookResult<Option<String>> {
        Ok(None)
    }

    fn population_report(
        &mut self,
        ctx: &mut HookContext<'_>,
        population: &str,
    ) -> HookResult<Option<String>> {
        Ok(None)
    }

    /// Persist a checkpoint. The default writes the full state.
    fn database_report(
        &mut self,
        recorder: &mut Recorder,
        view: &CheckpointView<'_>,
    ) -> Result<(), DatabaseError> {
        recorder.record_checkpoint(view)
    }
}

/// Hooks that do nothing beyond the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHooks;

impl StrategyHooks for NullHooks {}

impl<H: StrategyHooks + ?Sized> StrategyHooks for &mut H {
    fn deployment_scheme(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        (**self).deployment_scheme(ctx, population)
    }

    fn organism_movement(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        (**self).organism_movement(ctx, population)
    }

    fn organism_location(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        (**self).organism_location(ctx, population)
    }

    fn ecoregulate(&mut self, ctx: &mut HookContext<'_>) -> HookResult {
        (**self).ecoregulate(ctx)
    }

    fn update_ecology(&mut self, ctx: &mut HookContext<'_>, location: Location) -> HookResult {
        (**self).update_ecology(ctx, location)
    }

    fn update_local(&mut self, ctx: &mut HookContext<'_>, location: Location) -> HookResult {
        (**self).update_local(ctx, location)
    }

    fn fitness(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        (**self).fitness(ctx, population)
    }

    fn mutation_scheme(
        &mut self,
        organism: &mut Organism,
        model: &MutationModel,
        rng: &mut SimRng,
    ) -> HookResult {
        (**self).mutation_scheme(organism, model, rng)
    }

    fn prepopulation_control(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        (**self).prepopulation_control(ctx, population)
    }

    fn mating(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        (**self).mating(ctx, population)
    }

    fn postpopulation_control(
        &mut self,
        ctx: &mut HookContext<'_>,
        population: &str,
    ) -> HookResult {
        (**self).postpopulation_control(ctx, population)
    }

    fn generation_events(&mut self, ctx: &mut HookContext<'_>, population: &str) -> HookResult {
        (**self).generation_events(ctx, population)
    }

    fn report(&mut self, ctx: &mut HookContext<'_>) -> HookResult<Option<String>> {
        (**self).report(ctx)
    }

    fn population_report(
        &mut self,
        ctx: &mut HookContext<'_>,
        population: &str,
    ) -> HookResult<Option<String>> {
        (**self).population_report(ctx, population)
    }

    fn database_report(
        &mut self,
        recorder: &mut Recorder,
        view: &CheckpointView<'_>,
    ) -> Result<(), DatabaseError> {
        (**self).database_report(recorder, view)
    }
}
