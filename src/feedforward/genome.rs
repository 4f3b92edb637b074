use thiserror::Error;

use super::net::{Net, ProcessError, SizeMismatch};
use crate::{
    config::EvolutionConfig,
    dataset::Dataset,
    evolution::{EvolutionError, GenerationStats, Optimizer},
    random::RandomSource,
    statistics::{FitnessStatistic, RSquared},
};

/// Scores weight genomes by running them on a net.
///
/// A genome holds one weight per connection, in the net's connection order.
/// Scoring installs the genome into the net, runs the forward pass over the selected
/// rows, feeds `(prediction, target)` pairs into the statistic and restores the
/// previous weights, so one evaluation never leaks into the next.
pub struct WeightEvaluator<'a, S> {
    net: &'a mut Net,
    dataset: &'a Dataset,
    indices: &'a [usize],
    statistic: S,
    /// Weights the net held before the current evaluation.
    saved: Vec<f64>,
}

impl<'a, S: FitnessStatistic> WeightEvaluator<'a, S> {
    /// # Arguments
    /// * `net` - net the genomes are installed into;
    /// * `dataset` - rows to evaluate, the last column being the target;
    /// * `indices` - rows of `dataset` used for scoring;
    /// * `statistic` - fitness computed over `(prediction, target)` pairs.
    ///
    /// # Returns
    /// * `Ok(WeightEvaluator)` if `indices` is not empty, every index is a row of
    /// `dataset` and the rows hold the inputs plus a target;
    /// * `Err(GenomeError)` otherwise.
    pub fn new(
        net: &'a mut Net,
        dataset: &'a Dataset,
        indices: &'a [usize],
        statistic: S,
    ) -> Result<Self, GenomeError> {
        if indices.is_empty() {
            return Err(GenomeError::NoRows);
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= dataset.row_count()) {
            return Err(GenomeError::RowOutOfRange(bad, dataset.row_count()));
        }
        if dataset.column_count() <= net.input_count() {
            return Err(GenomeError::Process(ProcessError::BadInputs(
                SizeMismatch {
                    expected: net.input_count() + 1,
                    got: dataset.column_count(),
                },
            )));
        }

        let saved = Vec::with_capacity(net.connection_count());
        Ok(WeightEvaluator {
            net,
            dataset,
            indices,
            statistic,
            saved,
        })
    }

    pub fn net(&self) -> &Net {
        self.net
    }

    /// Number of entries a genome must hold.
    pub fn genome_len(&self) -> usize {
        self.net.connection_count()
    }

    /// Statistic of the net's predictions with `genome` installed.
    /// The net's weights are unchanged afterwards, bit for bit.
    ///
    /// # Examples
    /// ```
    /// # use evonnet::{dataset::Dataset, feedforward::{Net, WeightEvaluator}, statistics::RSquared};
    /// let data = Dataset::from_rows(vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 7.0]]).unwrap();
    /// let mut net = Net::with_weights(&[1, 1], &[0.5]).unwrap();
    /// let mut evaluator = WeightEvaluator::new(&mut net, &data, &[0, 1, 2], RSquared::new()).unwrap();
    /// let fitness = evaluator.fitness(&[3.0]).unwrap();
    /// assert!(fitness > 0.9);
    /// assert_eq!(evaluator.net().weights(), vec![0.5]);
    /// ```
    pub fn fitness(&mut self, genome: &[f64]) -> Result<f64, GenomeError> {
        let installed = InstalledWeights::install(self.net, &mut self.saved, genome)?;

        self.statistic.reset();
        for &i in self.indices {
            let row = self.dataset.row(i);
            installed.net.feed_forward(row);
            self.statistic
                .add(installed.net.output(), self.dataset.target(i));
        }
        Ok(self.statistic.compute())
    }

    /// Fitness for the optimizer: a genome that cannot be scored ranks last.
    ///
    /// The only error past construction is a length mismatch. Genomes made by
    /// `random_genome` with `genome_len()` entries keep that length through
    /// `prefix_crossover` and `point_mutation`, so within `evolve_weights` this never fails.
    fn score(&mut self, genome: &[f64]) -> f64 {
        match self.fitness(genome) {
            Ok(fitness) => fitness,
            Err(e) => {
                log::warn!("Genome rejected: {}", e);
                f64::NEG_INFINITY
            }
        }
    }
}

/// Genome installed into a net; the previous weights come back on drop.
struct InstalledWeights<'n> {
    net: &'n mut Net,
    saved: &'n [f64],
}

impl<'n> InstalledWeights<'n> {
    fn install(
        net: &'n mut Net,
        saved: &'n mut Vec<f64>,
        genome: &[f64],
    ) -> Result<Self, SizeMismatch> {
        saved.clear();
        saved.extend(net.connections.iter().map(|c| c.weight));
        net.set_weights(genome)?;
        Ok(InstalledWeights { net, saved })
    }
}

impl Drop for InstalledWeights<'_> {
    fn drop(&mut self) {
        for (connection, &w) in self.net.connections.iter_mut().zip(self.saved.iter()) {
            connection.weight = w;
        }
    }
}

/// Genome of `len` entries drawn uniformly from `[low, high)`.
pub fn random_genome(len: usize, low: f64, high: f64, rng: &mut RandomSource) -> Vec<f64> {
    (0..len).map(|_| rng.uniform_real_between(low, high)).collect()
}

/// Swaps the first half of the entries of `a` and `b`.
pub fn prefix_crossover(a: &mut [f64], b: &mut [f64]) {
    let half = a.len().min(b.len()) / 2;
    a[..half].swap_with_slice(&mut b[..half]);
}

/// Replaces one uniformly chosen entry with a value from `[0, 1)`.
pub fn point_mutation(genome: &mut [f64], rng: &mut RandomSource) {
    if genome.is_empty() {
        return;
    }
    let i = rng.uniform_int(0, genome.len() - 1);
    genome[i] = rng.uniform_real();
}

/// Result of `evolve_weights`.
#[derive(Clone, Debug)]
pub struct EvolutionSummary {
    /// Weights installed into the net.
    pub weights: Vec<f64>,
    pub best_fitness: f64,
    pub generations: usize,
    pub history: Vec<GenerationStats>,
}

/// Fits the weights of `net` with the evolutionary optimizer, maximizing the
/// squared correlation between predictions and targets over the rows in `indices`.
///
/// Genome entries start uniform in `[init_low, init_high)`; crossover swaps genome
/// halves and mutation resets a single entry. The best genome found is installed
/// into `net`.
///
/// # Returns
/// * `Ok(EvolutionSummary)` on success;
/// * `Err(GenomeError)` if the rows or the configuration are unusable.
///
/// # Examples
/// ```
/// # use evonnet::{config::EvolutionConfig, dataset::Dataset, feedforward::{evolve_weights, Net}, RandomSource};
/// let rows = (0..10).map(|i| vec![i as f64 / 10.0, i as f64 / 5.0]).collect();
/// let data = Dataset::from_rows(rows).unwrap();
/// let indices: Vec<usize> = (0..10).collect();
/// let mut rng = RandomSource::seeded(5);
/// let mut net = Net::new(&[1, 2, 1], &mut rng).unwrap();
/// let config = EvolutionConfig { population_size: 20, generations: 10, ..EvolutionConfig::default() };
/// let summary = evolve_weights(&mut net, &data, &indices, &mut rng, &config).unwrap();
/// assert_eq!(net.weights(), summary.weights);
/// ```
pub fn evolve_weights(
    net: &mut Net,
    dataset: &Dataset,
    indices: &[usize],
    rng: &mut RandomSource,
    config: &EvolutionConfig,
) -> Result<EvolutionSummary, GenomeError> {
    let (low, high) = (config.init_low, config.init_high);
    if !(low < high) || !(high - low).is_finite() {
        return Err(GenomeError::BadInitRange(low, high));
    }

    let len = net.connection_count();
    let mut evaluator = WeightEvaluator::new(&mut *net, dataset, indices, RSquared::new())?;
    let mut optimizer = Optimizer::new(
        config.optimizer(),
        |rng: &mut RandomSource| random_genome(len, low, high, rng),
        |genome: &Vec<f64>| evaluator.score(genome),
        |a: &mut Vec<f64>, b: &mut Vec<f64>, _: &mut RandomSource| prefix_crossover(a, b),
        |genome: &mut Vec<f64>, rng: &mut RandomSource| point_mutation(genome, rng),
    )?;

    log::info!(
        "Evolving {} weights over {} rows for {} generations",
        len,
        indices.len(),
        config.generations
    );
    let best = optimizer.run(rng, config.generations).clone();
    let generations = optimizer.generation();
    let history = optimizer.history().to_vec();
    drop(optimizer);

    net.set_weights(&best.genome)?;
    Ok(EvolutionSummary {
        weights: best.genome,
        best_fitness: best.fitness,
        generations,
        history,
    })
}

/// Error structure for `WeightEvaluator` and `evolve_weights`
#[derive(Debug, Clone, Error)]
pub enum GenomeError {
    #[error("At least one row is needed to score a genome!")]
    NoRows,
    #[error("Row {0} is out of range for a dataset of {1} rows!")]
    RowOutOfRange(usize, usize),
    #[error("Rows must hold the inputs and a target. {0}")]
    Process(#[from] ProcessError),
    #[error("Genome does not match the connections of the net. {0}")]
    BadGenome(#[from] SizeMismatch),
    #[error("Initial weight range [{0}, {1}) is empty!")]
    BadInitRange(f64, f64),
    #[error(transparent)]
    Optimizer(#[from] EvolutionError),
}
