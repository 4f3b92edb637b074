use pyo3::prelude::*;

use super::trainer::{ConsumableTrainer, Trainer};
use crate::config::EvolutionConfig;
use crate::dataset::Dataset;
use crate::feedforward::{
    evolve_weights, GenomeError, Net as InnerNet, NewNetError, ProcessError, SizeMismatch,
};
use crate::python_ffi::random_source;
use crate::{Impl_to_PyErr, MakeConsumable};

MakeConsumable!(ConsumableNet, InnerNet, Net);

#[pyclass]
pub struct Net {
    pub(super) net: ConsumableNet,
}

#[pymethods]
impl Net {
    /// Random weights in `[0, 1)` unless `weights` are given.
    #[new]
    pub fn new(
        geometry: Vec<usize>,
        weights: Option<Vec<f64>>,
        seed: Option<u64>,
    ) -> Result<Self, NewNetError> {
        let net = match weights {
            Some(weights) => InnerNet::with_weights(&geometry, &weights)?,
            None => InnerNet::new(&geometry, &mut random_source(seed))?,
        };
        Ok(Self {
            net: ConsumableNet::acquire(net),
        })
    }

    pub fn geometry(&self) -> PyResult<Vec<usize>> {
        Ok(self.net.get_ref()?.geometry().to_vec())
    }

    pub fn weights(&self) -> PyResult<Vec<f64>> {
        Ok(self.net.get_ref()?.weights())
    }

    pub fn set_weights(&mut self, weights: Vec<f64>) -> PyResult<()> {
        self.net.get_ref_mut()?.set_weights(&weights)?;
        Ok(())
    }

    pub fn evaluate(&mut self, row: Vec<f64>) -> PyResult<Vec<f64>> {
        let net = self.net.get_ref_mut()?;
        net.evaluate(&row)?;
        Ok(net.outputs())
    }

    /// Evolves the weights on `rows` (last column is the target) and keeps the best.
    /// Returns the best squared correlation.
    pub fn evolve(
        &mut self,
        rows: Vec<Vec<f64>>,
        generations: usize,
        population_size: Option<usize>,
        seed: Option<u64>,
    ) -> PyResult<f64> {
        let dataset = Dataset::from_rows(rows)?;
        let indices: Vec<usize> = (0..dataset.row_count()).collect();
        let config = EvolutionConfig {
            generations,
            population_size: population_size.unwrap_or(EvolutionConfig::default().population_size),
            ..EvolutionConfig::default()
        };
        let summary = evolve_weights(
            self.net.get_ref_mut()?,
            &dataset,
            &indices,
            &mut random_source(seed),
            &config,
        )?;
        Ok(summary.best_fitness)
    }

    pub fn build_trainer(&mut self, learning_rate: f64) -> PyResult<Trainer> {
        let net = self.net.get_ref()?.clone();
        let trainer = net.build_trainer(learning_rate)?;
        self.net.release()?;
        Ok(Trainer {
            trainer: ConsumableTrainer::acquire(trainer),
        })
    }
}

Impl_to_PyErr!(for NewNetError, ProcessError, SizeMismatch, GenomeError);
