//! End-to-end regression run: split the rows, fit the net, then score both partitions.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use thiserror::Error;

use crate::{
    config::{ConfigError, ExperimentConfig, Strategy},
    dataset::Dataset,
    feedforward::{evolve_weights, GenomeError, Net, NewNetError, ProcessError, TrainError},
    random::RandomSource,
    statistics::{FitnessStatistic, LinearScaling, RSquared},
};

/// Configured experiment, ready to run on any dataset.
///
/// # Examples
/// ```
/// # use evonnet::{config::{ExperimentConfig, Strategy}, experiment::Experiment, Dataset};
/// let rows = (0..40).map(|i| { let x = i as f64 / 40.0; vec![x, 3.0 * x + 1.0] }).collect();
/// let data = Dataset::from_rows(rows).unwrap();
/// let mut config = ExperimentConfig { seed: Some(1), strategy: Strategy::Backprop, ..ExperimentConfig::default() };
/// config.backprop.epochs = 50;
/// let report = Experiment::new(config).unwrap().run(&data).unwrap();
/// assert_eq!(report.training.len() + report.test.len(), 40);
/// ```
#[derive(Clone, Debug)]
pub struct Experiment {
    config: ExperimentConfig,
}

/// Linearly rescaled predictions of one group of rows.
#[derive(Clone, Debug)]
pub struct Partition {
    /// Rows of the dataset the partition covers.
    pub indices: Vec<usize>,
    /// `(scaled prediction, target)` for each row.
    pub pairs: Vec<(f64, f64)>,
    /// Offset of the rescaling.
    pub alpha: f64,
    /// Factor of the rescaling.
    pub beta: f64,
    /// Squared correlation of scaled predictions and targets, `0` for no rows.
    pub r2: f64,
}

impl Partition {
    /// Runs `net` on `indices`, fits a linear rescaling of its predictions onto the
    /// targets of these rows and scores the rescaled predictions.
    pub fn score(net: &mut Net, dataset: &Dataset, indices: Vec<usize>) -> Result<Partition, ProcessError> {
        let mut scaling = LinearScaling::new();
        let mut raw = Vec::with_capacity(indices.len());
        for &i in &indices {
            net.evaluate(dataset.row(i))?;
            let pair = (net.output(), dataset.target(i));
            scaling.add(pair.0, pair.1);
            raw.push(pair);
        }

        let pairs: Vec<(f64, f64)> = raw
            .into_iter()
            .map(|(prediction, target)| (scaling.apply(prediction), target))
            .collect();
        let mut r2 = RSquared::new();
        for &(prediction, target) in &pairs {
            r2.add(prediction, target);
        }

        Ok(Partition {
            indices,
            alpha: scaling.alpha(),
            beta: scaling.beta(),
            r2: r2.compute(),
            pairs,
        })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Writes one `prediction target` line per row.
    pub fn write_pairs<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for (prediction, target) in &self.pairs {
            writeln!(out, "{} {}", prediction, target)?;
        }
        out.flush()
    }
}

/// Outcome of `Experiment::run`.
#[derive(Clone, Debug)]
pub struct ExperimentReport {
    /// Seed the run used; rerunning with it reproduces the report.
    pub seed: u64,
    pub strategy: Strategy,
    /// Trained net.
    pub net: Net,
    /// Backprop: mean squared error of the last epoch.
    /// Evolution: best squared correlation found.
    pub fit: f64,
    pub training: Partition,
    pub test: Partition,
}

impl Experiment {
    /// # Returns
    /// * `Ok(Experiment)` if `config` is valid;
    /// * `Err(ExperimentError)` otherwise.
    pub fn new(config: ExperimentConfig) -> Result<Experiment, ExperimentError> {
        config.validate()?;
        Ok(Experiment { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Trains a net on the leading `training_fraction` of the rows and scores it on
    /// both partitions. `dataset` itself is never modified.
    pub fn run(&self, dataset: &Dataset) -> Result<ExperimentReport, ExperimentError> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut rng = RandomSource::seeded(seed);

        let normalized;
        let data = if self.config.normalize {
            let mut copy = dataset.clone();
            copy.normalize();
            normalized = copy;
            &normalized
        } else {
            dataset
        };

        let (training, test) = data.split_at(self.config.training_fraction);
        if training.is_empty() {
            return Err(ExperimentError::NoTrainingRows(data.row_count()));
        }

        let geometry = self.config.geometry(data.input_count());
        log::info!(
            "Running {:?} on {} training and {} test rows, geometry {:?}, seed {}",
            self.config.strategy,
            training.len(),
            test.len(),
            geometry,
            seed
        );

        let mut net = Net::new(&geometry, &mut rng)?;
        let fit = match self.config.strategy {
            Strategy::Backprop => {
                let backprop = &self.config.backprop;
                let mut trainer = net.build_trainer(backprop.learning_rate)?;
                let cost = trainer.train_epochs(data, &training, backprop.epochs)?;
                net = trainer.teardown();
                cost
            }
            Strategy::Evolution => {
                evolve_weights(&mut net, data, &training, &mut rng, &self.config.evolution)?
                    .best_fitness
            }
        };

        let training = Partition::score(&mut net, data, training)?;
        let test = Partition::score(&mut net, data, test)?;
        log::info!(
            "Training R^2 {:.6}, test R^2 {:.6}",
            training.r2,
            test.r2
        );

        Ok(ExperimentReport {
            seed,
            strategy: self.config.strategy,
            net,
            fit,
            training,
            test,
        })
    }
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    NewNet(#[from] NewNetError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Genome(#[from] GenomeError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("No training rows left out of {0}!")]
    NoTrainingRows(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quadratic() -> Dataset {
        let rows = (0..30)
            .map(|i| {
                let x = i as f64 / 15.0 - 1.0;
                vec![x, x * x]
            })
            .collect();
        Dataset::from_rows(rows).unwrap()
    }

    #[test]
    fn scaling_is_fitted_per_partition() {
        let data = Dataset::from_rows(vec![
            vec![1.0, 3.0],
            vec![2.0, 5.0],
            vec![3.0, 7.0],
        ])
        .unwrap();
        let mut net = Net::with_weights(&[1, 1], &[1.0]).unwrap();
        let partition = Partition::score(&mut net, &data, vec![0, 1, 2]).unwrap();

        assert_relative_eq!(partition.beta, 2.0, epsilon = 1e-12);
        assert_relative_eq!(partition.alpha, 1.0, epsilon = 1e-12);
        assert_relative_eq!(partition.r2, 1.0, epsilon = 1e-12);
        for &(prediction, target) in &partition.pairs {
            assert_relative_eq!(prediction, target, epsilon = 1e-12);
        }
    }

    #[test]
    fn empty_partition_scores_zero() {
        let mut net = Net::with_weights(&[1, 1], &[1.0]).unwrap();
        let partition = Partition::score(&mut net, &quadratic(), Vec::new()).unwrap();
        assert!(partition.is_empty());
        assert_eq!(partition.r2, 0.0);
    }

    #[test]
    fn whole_dataset_for_training() {
        let config = ExperimentConfig {
            seed: Some(4),
            training_fraction: 1.0,
            strategy: Strategy::Backprop,
            backprop: crate::config::BackpropConfig {
                learning_rate: 0.05,
                epochs: 20,
            },
            ..ExperimentConfig::default()
        };
        let report = Experiment::new(config).unwrap().run(&quadratic()).unwrap();
        assert_eq!(report.training.len(), 30);
        assert!(report.test.is_empty());
        assert_eq!(report.test.r2, 0.0);
        assert_eq!(report.seed, 4);
    }

    #[test]
    fn no_training_rows() {
        let config = ExperimentConfig {
            seed: Some(4),
            training_fraction: 0.01,
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            Experiment::new(config).unwrap().run(&quadratic()),
            Err(ExperimentError::NoTrainingRows(30))
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ExperimentConfig {
            hidden_layers: vec![0],
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            Experiment::new(config),
            Err(ExperimentError::Config(ConfigError::EmptyHiddenLayer(0)))
        ));
    }

    #[test]
    fn input_dataset_is_untouched() {
        let data = quadratic();
        let config = ExperimentConfig {
            seed: Some(2),
            strategy: Strategy::Evolution,
            evolution: crate::config::EvolutionConfig {
                population_size: 10,
                generations: 3,
                ..Default::default()
            },
            ..ExperimentConfig::default()
        };
        Experiment::new(config).unwrap().run(&data).unwrap();
        assert_eq!(data, quadratic());
    }

    #[test]
    fn pairs_file() {
        let data = Dataset::from_rows(vec![vec![1.0, 0.5], vec![2.0, 1.5]]).unwrap();
        let mut net = Net::with_weights(&[1, 1], &[1.0]).unwrap();
        let partition = Partition::score(&mut net, &data, vec![0, 1]).unwrap();

        let path = std::env::temp_dir().join(format!("evonnet-pairs-{}.out", std::process::id()));
        partition.write_pairs(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let written = Dataset::parse(&text).unwrap();
        assert_eq!(written.row_count(), 2);
        for (i, &(prediction, target)) in partition.pairs.iter().enumerate() {
            assert_eq!(written.row(i), &[prediction, target]);
        }
    }
}
