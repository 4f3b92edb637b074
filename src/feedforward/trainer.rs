use thiserror::Error;

use super::net::{Net, ProcessError};
use crate::dataset::Dataset;

/// Net trainer structure.
///
/// Training procedure will look like this:
/// * One builds the trainer by calling `Net::build_trainer`, which will consume `Net`
/// and return `Trainer` object.
/// (Consuming `Net` prevents anyone from evaluating it between a forward pass and the
/// weight update that relies on the values cached by that pass.)
/// * Training data is processed row by row via `Trainer::train`, or a whole pass at a time
/// via `Trainer::train_epoch`. At any time one can call `Trainer::net_ref` to inspect the net.
/// * Once finished training, one can use `Trainer::teardown` to get `Net` object back.
///
/// Only nets with exactly one output node can be trained.
pub struct Trainer {
    /// The network object trainer possesses.
    pub(crate) net: Net,

    learning_rate: f64,
}

impl Trainer {
    /// Consumes `Net` and builds `Trainer` object containing it.
    pub(super) fn build(net: Net, learning_rate: f64) -> Result<Trainer, TrainError> {
        if net.output_count() != 1 {
            return Err(TrainError::MultipleOutputs(net.output_count()));
        }
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(TrainError::BadLearningRate(learning_rate));
        }
        Ok(Trainer { net, learning_rate })
    }

    /// Returns reference to contained `Net`.
    pub fn net_ref(&self) -> &Net {
        &self.net
    }

    /// Returns mutable reference to contained `Net`, allowing the use of `Net::evaluate`.
    pub fn net_mut(&mut self) -> &mut Net {
        &mut self.net
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// One gradient step towards `target`.
    ///
    /// `Net::evaluate` must have just been run for the row `target` belongs to:
    /// deltas and weight updates are computed from the values and derivatives cached
    /// by that forward pass.
    ///
    /// * The output node gets `delta = target - value`.
    /// * Hidden layers, from the deepest to the shallowest, get the weighted sum of the
    /// deltas of the nodes they feed.
    /// * Then every connection, layer by layer, moves by
    /// `learning_rate * source.value * target.delta * target.derivative`.
    pub fn train_step(&mut self, target: f64) {
        let net = &mut self.net;
        let depth = net.layer_count();

        for id in net.layer_ids(depth - 1) {
            let node = &mut net.nodes[id];
            node.delta = target - node.value;
        }

        for layer in (1..depth - 1).rev() {
            for id in net.layer_ids(layer) {
                let delta = net.nodes[id]
                    .outgoing()
                    .iter()
                    .map(|&c| {
                        let connection = &net.connections[c];
                        connection.weight * net.nodes[connection.target()].delta
                    })
                    .sum();
                net.nodes[id].delta = delta;
            }
        }

        for layer in 0..depth - 1 {
            for id in net.layer_ids(layer) {
                let value = net.nodes[id].value;
                for &c in net.nodes[id].outgoing() {
                    let fed = &net.nodes[net.connections[c].target()];
                    net.connections[c].weight +=
                        self.learning_rate * value * fed.delta * fed.derivative();
                }
            }
        }
    }

    /// Evaluates `row`, then performs one gradient step towards `target`.
    ///
    /// # Returns
    /// * The squared error of the output before the step;
    /// * `Err(TrainError)` if the row is too short.
    ///
    /// # Examples
    /// ```
    /// # use evonnet::{feedforward::Net, RandomSource};
    /// let mut trainer = Net::new(&[1, 1], &mut RandomSource::seeded(1))
    ///     .unwrap()
    ///     .build_trainer(0.01)
    ///     .unwrap();
    /// let before = trainer.train(&[0.5], 1.0).unwrap();
    /// let after = trainer.train(&[0.5], 1.0).unwrap();
    /// assert!(after < before);
    /// ```
    pub fn train(&mut self, row: &[f64], target: f64) -> Result<f64, TrainError> {
        self.net.evaluate(row)?;
        let error = target - self.net.output();
        self.train_step(target);
        Ok(error * error)
    }

    /// Trains once on every row in `indices`, in order, using the last column as target.
    ///
    /// # Returns
    /// * The mean squared error seen before each row's step (`0` for no rows);
    /// * `Err(TrainError)` if the rows are too short or an index is out of range.
    pub fn train_epoch(&mut self, data: &Dataset, indices: &[usize]) -> Result<f64, TrainError> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= data.row_count()) {
            return Err(TrainError::RowOutOfRange(bad, data.row_count()));
        }
        if indices.is_empty() {
            return Ok(0.0);
        }

        let mut costs_sum = 0.0;
        for &i in indices {
            costs_sum += self.train(data.row(i), data.target(i))?;
        }
        Ok(costs_sum / indices.len() as f64)
    }

    /// Repeats `Trainer::train_epoch` `epochs` times.
    ///
    /// # Returns
    /// * The mean squared error of the last epoch (`0` if `epochs` is zero).
    pub fn train_epochs(
        &mut self,
        data: &Dataset,
        indices: &[usize],
        epochs: usize,
    ) -> Result<f64, TrainError> {
        let mut cost = 0.0;
        for epoch in 0..epochs {
            cost = self.train_epoch(data, indices)?;
            log::debug!("Epoch {}: mean squared error {:.6}", epoch, cost);
        }
        log::info!(
            "Backpropagation finished after {} epochs, mean squared error {:.6}",
            epochs,
            cost
        );
        Ok(cost)
    }

    /// Consumes `Trainer` object and returns contained `Net` back.
    pub fn teardown(self) -> Net {
        self.net
    }
}

#[derive(Debug, Clone, Error)]
pub enum TrainError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("Only nets with a single output can be trained, but got {0} outputs!")]
    MultipleOutputs(usize),
    #[error("Learning rate must be positive and finite, but got {0}!")]
    BadLearningRate(f64),
    #[error("Row {0} is out of range for a dataset of {1} rows!")]
    RowOutOfRange(usize, usize),
}
