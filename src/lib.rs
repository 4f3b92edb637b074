//! Layered feedforward networks for regression, fitted either by backpropagation or
//! by a generic evolutionary optimizer searching the connection weights.
//!
//! # Examples
//! ```
//! # use evonnet::{evolve_weights, EvolutionConfig, Dataset, Net, RandomSource};
//! let rows = (0..20).map(|i| { let x = i as f64 / 20.0; vec![x, x * x] }).collect();
//! let data = Dataset::from_rows(rows).unwrap();
//! let (training, _test) = data.split_at(0.5);
//!
//! let mut rng = RandomSource::seeded(11);
//! let mut net = Net::new(&[1, 5, 1], &mut rng).unwrap();
//! let config = EvolutionConfig { population_size: 20, generations: 20, ..EvolutionConfig::default() };
//! let summary = evolve_weights(&mut net, &data, &training, &mut rng, &config).unwrap();
//! assert!(summary.best_fitness >= summary.history[0].best);
//! ```

pub mod config;
pub mod dataset;
pub mod evolution;
pub mod experiment;
pub mod feedforward;
pub mod random;
pub mod statistics;

#[cfg(feature = "python")]
pub mod python_ffi;

pub use config::{EvolutionConfig, ExperimentConfig};
pub use dataset::Dataset;
pub use experiment::{Experiment, ExperimentReport};
pub use feedforward::{evolve_weights, Net, Trainer};
pub use random::RandomSource;
