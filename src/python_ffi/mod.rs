//! Python FFI
use pyo3::{prelude::*, wrap_pyfunction};
use thiserror::Error;

use crate::{
    config::{ConfigError, ExperimentConfig},
    dataset::{Dataset, DatasetError},
    experiment::{Experiment, ExperimentError},
    Impl_to_PyErr, RandomSource,
};

pub mod feedforward;
mod gen_macros;

/// Raised when a Python object's contents were moved into another object.
#[derive(Debug, Error)]
#[error("This {0} object is consumed and cannot be used")]
pub struct Consumed(pub &'static str);

/// Seeded source when `seed` is given, entropy-seeded otherwise.
pub(crate) fn random_source(seed: Option<u64>) -> RandomSource {
    seed.map_or_else(RandomSource::from_entropy, RandomSource::seeded)
}

/// Runs a whole experiment on `rows` (last column is the target).
/// `config` is YAML text; defaults are used when it is omitted.
///
/// Returns `(training R^2, test R^2, seed)`.
#[pyfunction]
fn run_experiment(rows: Vec<Vec<f64>>, config: Option<&str>) -> PyResult<(f64, f64, u64)> {
    let config = match config {
        Some(text) => ExperimentConfig::from_yaml(text)?,
        None => ExperimentConfig::default(),
    };
    let dataset = Dataset::from_rows(rows)?;
    let report = Experiment::new(config)?.run(&dataset)?;
    Ok((report.training.r2, report.test.r2, report.seed))
}

#[pymodule]
fn evonnet(_py: Python, m: &PyModule) -> PyResult<()> {
    feedforward::construct_module(m)?;
    m.add_function(wrap_pyfunction!(run_experiment, m)?)?;
    Ok(())
}

Impl_to_PyErr!(for Consumed, ConfigError, DatasetError, ExperimentError);
