use std::{
    cmp::Ordering,
    sync::atomic::{self, AtomicBool},
};

use thiserror::Error;

use super::selection::{cumulative_fitness, roulette_index};
use crate::random::RandomSource;

/// A genome together with its last evaluated fitness.
#[derive(Clone, Debug, PartialEq)]
pub struct Individual<G> {
    pub genome: G,
    pub fitness: f64,
}

/// Settings of the generational loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OptimizerConfig {
    /// Number of individuals kept between generations.
    pub population_size: usize,
    /// Chance for each offspring to be mutated once per generation.
    pub mutation_probability: f64,
    /// Number of best individuals that always survive a generation.
    pub elites: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            mutation_probability: 0.25,
            elites: 1,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<(), EvolutionError> {
        if self.population_size == 0 {
            return Err(EvolutionError::EmptyPopulation);
        }
        if !(0.0..=1.0).contains(&self.mutation_probability) {
            return Err(EvolutionError::BadMutationProbability(
                self.mutation_probability,
            ));
        }
        if self.elites > self.population_size {
            return Err(EvolutionError::TooManyElites {
                elites: self.elites,
                population_size: self.population_size,
            });
        }
        Ok(())
    }
}

/// Fitness summary of the population after a generation (0 is the initial population).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationStats {
    pub generation: usize,
    pub best: f64,
    pub mean: f64,
}

/// Error structure for `Optimizer`
#[derive(Debug, Clone, Error)]
pub enum EvolutionError {
    #[error("Population must hold at least one individual!")]
    EmptyPopulation,
    #[error("Mutation probability must be within [0, 1], but got {0}!")]
    BadMutationProbability(f64),
    #[error("Cannot keep {elites} elites in a population of {population_size}!")]
    TooManyElites {
        elites: usize,
        population_size: usize,
    },
    #[error("Optimizer must be initialized before running a generation!")]
    Uninitialized,
}

/// Generational evolutionary optimizer.
///
/// It knows nothing about the genome it evolves; four operators supply that knowledge:
/// * `factory` - creates a random genome;
/// * `evaluator` - scores a genome, higher is better;
/// * `crossover` - recombines two genomes in place;
/// * `mutator` - changes one genome in place.
///
/// Each generation selects `population_size` offspring with fitness-proportionate
/// selection, pairs every offspring with a random mate for crossover, mutates some
/// of them, evaluates them, and merges them back: the `elites` best individuals of
/// the old population always survive, the remaining places go to the best of the rest
/// of the old population and the offspring. The best fitness never decreases.
///
/// Fitness-proportionate selection needs a positive total: negative and NaN fitness
/// count as zero on the wheel, and when nothing is left on the wheel the generation
/// selects uniformly instead.
///
/// # Examples
/// ```
/// # use evonnet::{evolution::{Optimizer, OptimizerConfig}, RandomSource};
/// let mut rng = RandomSource::seeded(1);
/// let config = OptimizerConfig { population_size: 20, ..OptimizerConfig::default() };
/// let mut optimizer = Optimizer::new(
///     config,
///     |rng: &mut RandomSource| rng.uniform_real(),
///     |x: &f64| *x,
///     |a: &mut f64, b: &mut f64, _: &mut RandomSource| std::mem::swap(a, b),
///     |x: &mut f64, rng: &mut RandomSource| *x = rng.uniform_real(),
/// )
/// .unwrap();
/// let best = optimizer.run(&mut rng, 10).fitness;
/// assert!(best > 0.5);
/// ```
pub struct Optimizer<G, F, E, C, M> {
    config: OptimizerConfig,
    factory: F,
    evaluator: E,
    crossover: C,
    mutator: M,
    /// Kept sorted by descending fitness.
    population: Vec<Individual<G>>,
    generation: usize,
    history: Vec<GenerationStats>,
}

impl<G, F, E, C, M> Optimizer<G, F, E, C, M>
where
    G: Clone,
    F: FnMut(&mut RandomSource) -> G,
    E: FnMut(&G) -> f64,
    C: FnMut(&mut G, &mut G, &mut RandomSource),
    M: FnMut(&mut G, &mut RandomSource),
{
    /// Returns an uninitialized optimizer.
    ///
    /// # Returns
    /// * `Ok(Optimizer)` if `config` is valid;
    /// * `Err(EvolutionError)` otherwise.
    pub fn new(
        config: OptimizerConfig,
        factory: F,
        evaluator: E,
        crossover: C,
        mutator: M,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        Ok(Self {
            config,
            factory,
            evaluator,
            crossover,
            mutator,
            population: Vec::with_capacity(config.population_size),
            generation: 0,
            history: Vec::new(),
        })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        !self.population.is_empty()
    }

    /// Current population, best first.
    pub fn population(&self) -> &[Individual<G>] {
        &self.population
    }

    /// Number of generations run since the last `initialize`.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Statistics of the initial population and of every generation since.
    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    /// Best individual, or `None` before `initialize`.
    pub fn best(&self) -> Option<&Individual<G>> {
        self.population.first()
    }

    /// Creates and evaluates a fresh population, discarding any previous one.
    pub fn initialize(&mut self, rng: &mut RandomSource) {
        let mut population: Vec<Individual<G>> = (0..self.config.population_size)
            .map(|_| Individual {
                genome: (self.factory)(rng),
                fitness: 0.0,
            })
            .collect();
        self.evaluate(&mut population);
        sort_descending(&mut population);

        self.population = population;
        self.generation = 0;
        self.history.clear();
        let stats = self.record();
        log::info!(
            "Population of {} initialized, best fitness {:.6}",
            self.population.len(),
            stats.best
        );
    }

    /// Runs one generation.
    ///
    /// # Returns
    /// * `Ok(Individual)` with the best individual after the generation;
    /// * `Err(EvolutionError::Uninitialized)` if `initialize` was never called.
    pub fn step(&mut self, rng: &mut RandomSource) -> Result<&Individual<G>, EvolutionError> {
        if !self.is_initialized() {
            return Err(EvolutionError::Uninitialized);
        }
        self.next_generation(rng);
        Ok(&self.population[0])
    }

    /// Initializes, then runs `generations` generations.
    /// Returns the best individual found.
    pub fn run(&mut self, rng: &mut RandomSource, generations: usize) -> &Individual<G> {
        self.initialize(rng);
        for _ in 0..generations {
            self.next_generation(rng);
        }
        self.finish();
        &self.population[0]
    }

    /// Same as `Optimizer::run`, but stops early at a generation boundary once
    /// `cancel` is set.
    ///
    /// # Returns
    /// * The number of generations actually run and the best individual found.
    pub fn run_with_cancel(
        &mut self,
        rng: &mut RandomSource,
        generations: usize,
        cancel: &AtomicBool,
    ) -> (usize, &Individual<G>) {
        self.initialize(rng);
        for _ in 0..generations {
            if cancel.load(atomic::Ordering::Relaxed) {
                log::info!("Cancelled after {} generations", self.generation);
                break;
            }
            self.next_generation(rng);
        }
        self.finish();
        (self.generation, &self.population[0])
    }

    fn finish(&self) {
        log::info!(
            "Evolution finished after {} generations, best fitness {:.6}",
            self.generation,
            self.population[0].fitness
        );
    }

    fn next_generation(&mut self, rng: &mut RandomSource) {
        let mut offspring = self.select(rng);
        self.recombine(&mut offspring, rng);
        self.mutate(&mut offspring, rng);
        self.evaluate(&mut offspring);
        self.reinsert(offspring);

        self.generation += 1;
        let stats = self.record();
        log::debug!(
            "Generation {}: best fitness {:.6}, mean fitness {:.6}",
            stats.generation,
            stats.best,
            stats.mean
        );
    }

    /// Clones `population_size` individuals, each chosen with probability
    /// proportional to its fitness.
    fn select(&self, rng: &mut RandomSource) -> Vec<Individual<G>> {
        let count = self.population.len();
        let partials = cumulative_fitness(self.population.iter().map(|i| i.fitness));
        let total = partials.last().copied().unwrap_or(0.0);

        if !(total > 0.0 && total.is_finite()) {
            log::warn!(
                "Total fitness {} is not positive, selecting uniformly",
                total
            );
            return (0..count)
                .map(|_| self.population[rng.uniform_int(0, count - 1)].clone())
                .collect();
        }

        (0..count)
            .map(|_| {
                let draw = rng.uniform_real_to(total);
                self.population[roulette_index(&partials, draw)].clone()
            })
            .collect()
    }

    /// Crosses every offspring with a uniformly chosen mate, possibly itself.
    /// Crossing with itself uses a throwaway copy as the mate.
    fn recombine(&mut self, offspring: &mut [Individual<G>], rng: &mut RandomSource) {
        let count = offspring.len();
        for i in 0..count {
            let j = rng.uniform_int(0, count - 1);
            if i == j {
                let mut copy = offspring[i].genome.clone();
                (self.crossover)(&mut offspring[i].genome, &mut copy, rng);
            } else {
                let (individual, mate) = pair_mut(offspring, i, j);
                (self.crossover)(&mut individual.genome, &mut mate.genome, rng);
            }
        }
    }

    fn mutate(&mut self, offspring: &mut [Individual<G>], rng: &mut RandomSource) {
        for individual in offspring.iter_mut() {
            if rng.uniform_real() < self.config.mutation_probability {
                (self.mutator)(&mut individual.genome, rng);
            }
        }
    }

    fn evaluate(&mut self, individuals: &mut [Individual<G>]) {
        for individual in individuals.iter_mut() {
            let fitness = (self.evaluator)(&individual.genome);
            individual.fitness = if fitness.is_nan() {
                f64::NEG_INFINITY
            } else {
                fitness
            };
        }
    }

    /// Elitist merge of the offspring into the population.
    fn reinsert(&mut self, mut offspring: Vec<Individual<G>>) {
        let size = self.config.population_size;
        let elites = self.config.elites.min(self.population.len());

        sort_descending(&mut self.population);
        let mut rest: Vec<Individual<G>> = self.population.drain(elites..).collect();
        rest.append(&mut offspring);
        // stable: on ties the old population goes first
        sort_descending(&mut rest);
        rest.truncate(size - elites);

        self.population.append(&mut rest);
        sort_descending(&mut self.population);
    }

    fn record(&mut self) -> GenerationStats {
        let mean = self.population.iter().map(|i| i.fitness).sum::<f64>()
            / self.population.len() as f64;
        let stats = GenerationStats {
            generation: self.generation,
            best: self.population[0].fitness,
            mean,
        };
        self.history.push(stats);
        stats
    }
}

fn sort_descending<G>(individuals: &mut [Individual<G>]) {
    individuals.sort_by(|a, b| {
        b.fitness
            .partial_cmp(&a.fitness)
            .unwrap_or(Ordering::Equal)
    });
}

/// Two distinct mutable elements of one slice.
fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(i, j);
    if i < j {
        let (left, right) = items.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}
