//! Selection building blocks for population-control and mating hooks.
//!
//! These helpers act on one [`Population`] and draw randomness only from the
//! generator they are handed, so hooks built from them stay reproducible.

use crate::genome::{IdAllocator, Organism};
use crate::simulation::Population;
use rand::Rng;
use rand::seq::index;

/// Remove the `count` organisms with the lowest fitness and return them.
///
/// Ties are broken by position (earlier agents go first). The relative order
/// of the survivors is preserved. Removing more agents than exist empties the
/// population.
pub fn cull_lowest(population: &mut Population, count: usize) -> Vec<Organism> {
    let count = count.min(population.size());
    if count == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..population.size()).collect();
    let agents = population.agents();
    order.sort_by(|&a, &b| agents[a].fitness().total_cmp(&agents[b].fitness()).then(a.cmp(&b)));

    let mut doomed = vec![false; population.size()];
    for &i in &order[..count] {
        doomed[i] = true;
    }
    remove_marked(population, &doomed)
}

/// Remove `count` organisms chosen uniformly without replacement and return
/// them.
pub fn cull_random<R: Rng + ?Sized>(
    population: &mut Population,
    count: usize,
    rng: &mut R,
) -> Vec<Organism> {
    let size = population.size();
    let count = count.min(size);
    if count == 0 {
        return Vec::new();
    }

    let mut doomed = vec![false; size];
    for i in index::sample(rng, size, count) {
        doomed[i] = true;
    }
    remove_marked(population, &doomed)
}

/// Clone random members until the population holds `target` organisms.
///
/// Clones get fresh identities from `ids` and are drawn only from the
/// organisms present before the call. Returns the number of clones added;
/// an empty population cannot be topped up and returns 0.
pub fn top_up_by_cloning<R: Rng + ?Sized>(
    population: &mut Population,
    target: usize,
    ids: &mut IdAllocator,
    rng: &mut R,
) -> usize {
    let existing = population.size();
    if existing == 0 || existing >= target {
        return 0;
    }

    let needed = target - existing;
    for _ in 0..needed {
        let source = rng.random_range(0..existing);
        let clone = population.agents()[source].clone_with_new_identity(ids);
        population.push(clone);
    }
    needed
}

/// Draw `n_pairs` parent index pairs with fitness-proportional sampling.
///
/// Each pair holds two distinct agents whenever the population has more than
/// one. When total fitness is not positive, sampling is uniform.
pub fn fitness_proportional_pairs<R: Rng + ?Sized>(
    population: &Population,
    n_pairs: usize,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    let size = population.size();
    if size == 0 {
        return Vec::new();
    }

    let weights: Vec<f64> = population
        .agents()
        .iter()
        .map(|o| o.fitness().max(0.0))
        .collect();
    let total: f64 = weights.iter().sum();

    let cumulative: Vec<f64> = weights
        .iter()
        .scan(0.0, |acc, &w| {
            *acc += w;
            Some(*acc)
        })
        .collect();

    let pick = |rng: &mut R| -> usize {
        if total > 0.0 && total.is_finite() {
            let r = rng.random_range(0.0..total);
            cumulative.iter().position(|&c| c > r).unwrap_or(size - 1)
        } else {
            rng.random_range(0..size)
        }
    };

    (0..n_pairs)
        .map(|_| {
            let first = pick(rng);
            let mut second = first;
            // A single positive-weight agent cannot yield a distinct mate.
            let mut attempts = 0;
            while second == first && size > 1 && attempts < 64 {
                second = pick(rng);
                attempts += 1;
            }
            if second == first && size > 1 {
                second = (first + 1 + rng.random_range(0..size - 1)) % size;
            }
            (first, second)
        })
        .collect()
}

fn remove_marked(population: &mut Population, doomed: &[bool]) -> Vec<Organism> {
    let agents = std::mem::take(population.agents_mut());
    let (removed, kept): (Vec<_>, Vec<_>) = agents
        .into_iter()
        .enumerate()
        .partition(|(i, _)| doomed[*i]);
    *population.agents_mut() = kept.into_iter().map(|(_, o)| o).collect();
    removed.into_iter().map(|(_, o)| o).collect()
}
