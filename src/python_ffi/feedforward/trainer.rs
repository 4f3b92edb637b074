use pyo3::prelude::*;

use super::net::{ConsumableNet, Net};
use crate::dataset::Dataset;
use crate::feedforward::{TrainError, Trainer as InnerTrainer};
use crate::{Impl_to_PyErr, MakeConsumable};

MakeConsumable!(ConsumableTrainer, InnerTrainer, Trainer);

#[pyclass]
pub struct Trainer {
    pub(super) trainer: ConsumableTrainer,
}

#[pymethods]
impl Trainer {
    pub fn geometry(&self) -> PyResult<Vec<usize>> {
        Ok(self.trainer.get_ref()?.net_ref().geometry().to_vec())
    }

    pub fn weights(&self) -> PyResult<Vec<f64>> {
        Ok(self.trainer.get_ref()?.net_ref().weights())
    }

    pub fn learning_rate(&self) -> PyResult<f64> {
        Ok(self.trainer.get_ref()?.learning_rate())
    }

    /// One gradient step; returns the squared error before it.
    pub fn train(&mut self, row: Vec<f64>, target: f64) -> PyResult<f64> {
        Ok(self.trainer.get_ref_mut()?.train(&row, target)?)
    }

    /// Trains on every row (last column is the target) `epochs` times.
    /// Returns the mean squared error of the last pass.
    pub fn train_epochs(&mut self, rows: Vec<Vec<f64>>, epochs: usize) -> PyResult<f64> {
        let dataset = Dataset::from_rows(rows)?;
        let indices: Vec<usize> = (0..dataset.row_count()).collect();
        Ok(self
            .trainer
            .get_ref_mut()?
            .train_epochs(&dataset, &indices, epochs)?)
    }

    pub fn teardown(&mut self) -> PyResult<Net> {
        Ok(Net {
            net: ConsumableNet::acquire(self.trainer.release()?.teardown()),
        })
    }
}

Impl_to_PyErr!(for TrainError);
