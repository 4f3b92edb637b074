use std::ops::Range;

use thiserror::Error;

use super::trainer::{TrainError, Trainer};
use crate::random::RandomSource;

/// Scale of the hidden activation `b * tanh(c * x)`.
const TANH_SCALE: f64 = 1.7159;
/// Slope of the hidden activation `b * tanh(c * x)`.
const TANH_SLOPE: f64 = 2.0 / 3.0;

/// Activation function and its derivatives.
///
/// Derivatives are expressed in terms of the activated value, so they can be
/// computed right after the forward pass without keeping the weighted sum.
pub(super) struct Activation {
    pub(super) func: fn(f64) -> f64,
    /// `(first, second)` derivative given the activated value.
    pub(super) derivatives: fn(f64) -> (f64, f64),
}

/// Scaled hyperbolic tangent, recommended in LeCun et al., "Efficient BackProp".
/// Implements the formula:
/// `1.7159 * tanh(2/3 * x)`.
fn scaled_tanh(x: f64) -> f64 {
    TANH_SCALE * (TANH_SLOPE * x).tanh()
}

fn scaled_tanh_derivatives(value: f64) -> (f64, f64) {
    let d = TANH_SCALE * TANH_SLOPE - TANH_SLOPE / TANH_SCALE * value * value;
    let d2 = -2.0 * TANH_SLOPE / TANH_SCALE * value * d;
    (d, d2)
}

fn identity(x: f64) -> f64 {
    x
}

fn identity_derivatives(_value: f64) -> (f64, f64) {
    (1.0, 0.0)
}

static SCALED_TANH: Activation = Activation {
    func: scaled_tanh,
    derivatives: scaled_tanh_derivatives,
};

static IDENTITY: Activation = Activation {
    func: identity,
    derivatives: identity_derivatives,
};

/// Role of a node in the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Copies column `index` of the data row.
    Input { index: usize },
    /// Scaled tanh neuron.
    Hidden,
    /// Identity neuron.
    Output,
}

impl NodeKind {
    pub(super) fn activation(self) -> Option<&'static Activation> {
        match self {
            NodeKind::Input { .. } => None,
            NodeKind::Hidden => Some(&SCALED_TANH),
            NodeKind::Output => Some(&IDENTITY),
        }
    }
}

/// Unit of the computation graph.
///
/// `incoming` and `outgoing` hold indices into the net's connection list.
#[derive(Clone, Debug)]
pub struct Node {
    kind: NodeKind,
    pub(super) value: f64,
    pub(super) delta: f64,
    bias: f64,
    derivative: f64,
    second_derivative: f64,
    incoming: Vec<usize>,
    outgoing: Vec<usize>,
}

impl Node {
    fn new(kind: NodeKind) -> Node {
        Node {
            kind,
            value: 0.0,
            delta: 0.0,
            bias: 0.0,
            derivative: 0.0,
            second_derivative: 0.0,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Cached output of the last forward pass.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Error signal of the last backpropagation step.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Stored bias. It does not take part in the weighted sum.
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// First derivative of the activation at the cached value.
    pub fn derivative(&self) -> f64 {
        self.derivative
    }

    /// Second derivative of the activation at the cached value.
    pub fn second_derivative(&self) -> f64 {
        self.second_derivative
    }

    pub fn incoming(&self) -> &[usize] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[usize] {
        &self.outgoing
    }

    /// Applies the activation to the weighted sum and caches its derivatives.
    fn activate(&mut self, sum: f64) {
        if let Some(activation) = self.kind.activation() {
            self.value = (activation.func)(sum);
            let (d, d2) = (activation.derivatives)(self.value);
            self.derivative = d;
            self.second_derivative = d2;
        }
    }
}

/// Weighted directed edge between two nodes, addressed by node index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Connection {
    source: usize,
    target: usize,
    pub(super) weight: f64,
}

impl Connection {
    pub fn source(&self) -> usize {
        self.source
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// Layered, fully connected computation graph.
#[derive(Clone, Debug)]
pub struct Net {
    /// The number of nodes in each layer.
    geometry: Box<[usize]>,

    /// Arena of all nodes, stored layer after layer:
    /// `nodes = [layer_0][layer_1] ... [layer_N]`
    pub(super) nodes: Vec<Node>,

    /// Range of `nodes` occupied by each layer.
    layers: Box<[Range<usize>]>,

    /// Canonical list of connections. A genome is positionally aligned to it.
    ///
    /// For each pair of adjacent layers, for each node of the next layer, for each node
    /// of the current layer, there is one connection:
    /// `connections = [l0 -> l1 node 0][l0 -> l1 node 1] ... [lN-1 -> lN node M]`
    pub(super) connections: Vec<Connection>,
}

impl Net {
    /// Returns a fully connected network for given geometry.
    /// Neuron biases and then connection weights are drawn from `[0, 1)`.
    ///
    /// # Arguments
    /// * `geometry` - a number slice that holds a desired number of nodes in each layer;
    /// * `rng` - random source for the initial biases and weights.
    ///
    /// # Returns
    /// * `Ok(Net)` if there are at least two layers and none is empty;
    /// * `Err(NewNetError)` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use evonnet::{feedforward::Net, RandomSource};
    /// let mut rng = RandomSource::seeded(1);
    /// let net = Net::new(&[3, 5, 1], &mut rng).unwrap();
    /// assert_eq!(net.connection_count(), 3 * 5 + 5 * 1);
    /// ```
    pub fn new(geometry: &[usize], rng: &mut RandomSource) -> Result<Net, NewNetError> {
        let mut net = Net::build(geometry)?;

        for node in net.nodes.iter_mut() {
            if node.kind.activation().is_some() {
                node.bias = rng.uniform_real();
            }
        }
        for connection in net.connections.iter_mut() {
            connection.weight = rng.uniform_real();
        }

        Ok(net)
    }

    /// Returns network with given connection weights and zero biases.
    ///
    /// # Examples
    /// ```
    /// # use evonnet::feedforward::Net;
    /// let mut net = Net::with_weights(&[2, 1], &[0.5, -1.0]).unwrap();
    /// net.evaluate(&[4.0, 1.0]).unwrap();
    /// assert_eq!(net.output(), 1.0);
    /// ```
    pub fn with_weights(geometry: &[usize], weights: &[f64]) -> Result<Net, NewNetError> {
        let mut net = Net::build(geometry)?;
        net.set_weights(weights).map_err(NewNetError::BadWeights)?;
        Ok(net)
    }

    /// Lays out nodes and connections with zero weights.
    fn build(geometry: &[usize]) -> Result<Net, NewNetError> {
        if geometry.len() < 2 {
            return Err(NewNetError::BadGeometry(geometry.len()));
        }
        if let Some(layer) = geometry.iter().position(|&size| size == 0) {
            return Err(NewNetError::EmptyLayer(layer));
        }

        let last = geometry.len() - 1;
        let mut nodes = Vec::with_capacity(geometry.iter().sum());
        let mut layers = Vec::with_capacity(geometry.len());

        for (depth, &size) in geometry.iter().enumerate() {
            let start = nodes.len();
            for j in 0..size {
                let kind = match depth {
                    0 => NodeKind::Input { index: j },
                    d if d == last => NodeKind::Output,
                    _ => NodeKind::Hidden,
                };
                nodes.push(Node::new(kind));
            }
            layers.push(start..nodes.len());
        }

        let connections_total = geometry.windows(2).map(|w| w[0] * w[1]).sum();
        let mut connections = Vec::with_capacity(connections_total);

        for pair in layers.windows(2) {
            for target in pair[1].clone() {
                for source in pair[0].clone() {
                    let id = connections.len();
                    connections.push(Connection {
                        source,
                        target,
                        weight: 0.0,
                    });
                    nodes[source].outgoing.push(id);
                    nodes[target].incoming.push(id);
                }
            }
        }

        Ok(Net {
            geometry: geometry.to_owned().into_boxed_slice(),
            nodes,
            layers: layers.into_boxed_slice(),
            connections,
        })
    }

    pub fn geometry(&self) -> &[usize] {
        &self.geometry
    }

    pub fn input_count(&self) -> usize {
        self.geometry[0]
    }

    pub fn output_count(&self) -> usize {
        self.geometry[self.geometry.len() - 1]
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Nodes of the layer at `depth` (0 is the input layer).
    pub fn layer(&self, depth: usize) -> &[Node] {
        &self.nodes[self.layers[depth].clone()]
    }

    /// Arena ranges of all layers, input layer first.
    pub fn layers(&self) -> &[Range<usize>] {
        &self.layers
    }

    /// Arena indices of the nodes of the layer at `depth`.
    pub fn layer_ids(&self, depth: usize) -> Range<usize> {
        self.layers[depth].clone()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Copies all connection weights, in connection order.
    pub fn weights(&self) -> Vec<f64> {
        self.connections.iter().map(|c| c.weight).collect()
    }

    /// Overwrites all connection weights, in connection order.
    ///
    /// # Returns
    /// * `Ok(())` if `weights` has one value per connection;
    /// * `Err(SizeMismatch)` otherwise, leaving the weights untouched.
    pub fn set_weights(&mut self, weights: &[f64]) -> Result<(), SizeMismatch> {
        if weights.len() != self.connections.len() {
            return Err(SizeMismatch {
                expected: self.connections.len(),
                got: weights.len(),
            });
        }
        for (connection, &w) in self.connections.iter_mut().zip(weights.iter()) {
            connection.weight = w;
        }
        Ok(())
    }

    /// Runs the forward pass for one data row.
    ///
    /// Every input node takes `row[index]`, then each following layer in depth order
    /// computes the weighted sum of its incoming connections, applies its activation
    /// and caches the derivatives. Extra trailing columns (such as the target) are ignored.
    ///
    /// # Arguments
    /// * `row` - slice that holds at least one value per input node.
    ///
    /// # Returns
    /// * `Ok(())` if the row is long enough;
    /// * `Err(ProcessError)` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use evonnet::{feedforward::Net, RandomSource};
    /// let mut net = Net::new(&[2, 4, 1], &mut RandomSource::seeded(3)).unwrap();
    /// net.evaluate(&[0.5, -0.5, 10.0]).unwrap();
    /// let first = net.output();
    /// net.evaluate(&[0.5, -0.5, 10.0]).unwrap();
    /// assert_eq!(first, net.output());
    /// ```
    pub fn evaluate(&mut self, row: &[f64]) -> Result<(), ProcessError> {
        if row.len() < self.input_count() {
            return Err(ProcessError::BadInputs(SizeMismatch {
                expected: self.input_count(),
                got: row.len(),
            }));
        }
        self.feed_forward(row);
        Ok(())
    }

    /// Forward pass without the row length check.
    pub(crate) fn feed_forward(&mut self, row: &[f64]) {
        for node in self.nodes[self.layers[0].clone()].iter_mut() {
            if let NodeKind::Input { index } = node.kind {
                node.value = row[index];
            }
        }

        for layer in self.layers[1..].iter() {
            for id in layer.clone() {
                let sum: f64 = self.nodes[id]
                    .incoming
                    .iter()
                    .map(|&c| {
                        let connection = &self.connections[c];
                        self.nodes[connection.source].value * connection.weight
                    })
                    .sum();
                self.nodes[id].activate(sum);
            }
        }
    }

    /// Value of the first output node after the last forward pass.
    pub fn output(&self) -> f64 {
        self.nodes[self.layers[self.layers.len() - 1].start].value
    }

    /// Values of all output nodes after the last forward pass.
    pub fn outputs(&self) -> Vec<f64> {
        self.layer(self.layers.len() - 1)
            .iter()
            .map(|n| n.value)
            .collect()
    }

    /// Consumes `Net` and builds `Trainer` object containing it.
    /// See `Trainer`'s documentation for details.
    pub fn build_trainer(self, learning_rate: f64) -> Result<Trainer, TrainError> {
        Trainer::build(self, learning_rate)
    }
}

/// Error structure for `Net::new` and `Net::with_weights`
#[derive(Debug, Clone, Error)]
pub enum NewNetError {
    #[error(
        "Net must have at least two layers (input and output), but got geometry with len {0}!"
    )]
    BadGeometry(usize),
    #[error("Layer {0} has no nodes!")]
    EmptyLayer(usize),
    #[error("Wrong number of weights for the provided geometry. {0}")]
    BadWeights(SizeMismatch),
}

/// Error structure for `Net::evaluate`
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    #[error("Row is too short for the input layer. {0}")]
    BadInputs(SizeMismatch),
}

/// Error structure for collections size mismatch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Expected {expected} values, but got {got}!")]
pub struct SizeMismatch {
    pub expected: usize,
    pub got: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_bad_geometry() {
        let mut rng = RandomSource::seeded(0);
        assert!(matches!(
            Net::new(&[3], &mut rng),
            Err(NewNetError::BadGeometry(1))
        ));
        assert!(matches!(
            Net::new(&[], &mut rng),
            Err(NewNetError::BadGeometry(0))
        ));
        assert!(matches!(
            Net::new(&[3, 0, 1], &mut rng),
            Err(NewNetError::EmptyLayer(1))
        ));
        assert!(matches!(
            Net::with_weights(&[2, 1], &[1.0]),
            Err(NewNetError::BadWeights(SizeMismatch {
                expected: 2,
                got: 1
            }))
        ));
    }

    #[test]
    fn layers_are_densely_connected() {
        let net = Net::new(&[3, 4, 2, 1], &mut RandomSource::seeded(5)).unwrap();
        assert_eq!(net.connection_count(), 3 * 4 + 4 * 2 + 2 * 1);
        assert_eq!(net.layer_count(), 4);

        for depth in 1..net.layer_count() {
            let previous = net.layer_ids(depth - 1);
            for id in net.layer_ids(depth) {
                let node = net.node(id);
                assert_eq!(node.incoming().len(), previous.len());
                for &c in node.incoming() {
                    assert!(previous.contains(&net.connections()[c].source()));
                    assert_eq!(net.connections()[c].target(), id);
                }
            }
        }
        for id in net.layer_ids(3) {
            assert!(net.node(id).outgoing().is_empty());
        }
        for id in net.layer_ids(0) {
            assert!(net.node(id).incoming().is_empty());
        }
    }

    #[test]
    fn node_kinds_follow_layers() {
        let net = Net::new(&[2, 3, 1], &mut RandomSource::seeded(5)).unwrap();
        assert_eq!(net.layer(0)[1].kind(), NodeKind::Input { index: 1 });
        assert!(net.layer(1).iter().all(|n| n.kind() == NodeKind::Hidden));
        assert_eq!(net.layer(2)[0].kind(), NodeKind::Output);
    }

    #[test]
    fn connection_order() {
        let net = Net::new(&[2, 2, 1], &mut RandomSource::seeded(5)).unwrap();
        let pairs: Vec<(usize, usize)> = net
            .connections()
            .iter()
            .map(|c| (c.source(), c.target()))
            .collect();
        assert_eq!(pairs, vec![(0, 2), (1, 2), (0, 3), (1, 3), (2, 4), (3, 4)]);
    }

    #[test]
    fn initial_values_are_in_unit_range() {
        let net = Net::new(&[4, 6, 1], &mut RandomSource::seeded(9)).unwrap();
        assert!(net.weights().iter().all(|w| (0.0..1.0).contains(w)));
        assert!(net.layer(1).iter().all(|n| (0.0..1.0).contains(&n.bias())));
        assert!(net.layer(0).iter().all(|n| n.bias() == 0.0));
    }

    #[test]
    fn hand_computed_forward_pass() {
        // in0 -> h, in1 -> h, h -> out
        let mut net = Net::with_weights(&[2, 1, 1], &[0.5, 0.25, 2.0]).unwrap();
        net.evaluate(&[1.0, 2.0]).unwrap();

        // weighted sum into the hidden node: 1.0 * 0.5 + 2.0 * 0.25 = 1.0
        let hidden = 1.7159 * (2.0f64 / 3.0).tanh();
        assert_relative_eq!(net.layer(1)[0].value(), hidden, epsilon = 1e-9);
        assert_relative_eq!(net.output(), 2.0 * hidden, epsilon = 1e-9);
        assert_eq!(net.outputs(), vec![net.output()]);
    }

    #[test]
    fn cached_derivatives_match_finite_differences() {
        let mut net = Net::with_weights(&[2, 1, 1], &[0.5, 0.25, 2.0]).unwrap();
        net.evaluate(&[1.0, 2.0]).unwrap();

        let h = 1e-5;
        let f = |x: f64| 1.7159 * (2.0 / 3.0 * x).tanh();
        let first = (f(1.0 + h) - f(1.0 - h)) / (2.0 * h);
        let second = (f(1.0 + h) - 2.0 * f(1.0) + f(1.0 - h)) / (h * h);

        let hidden = &net.layer(1)[0];
        assert_relative_eq!(hidden.derivative(), first, epsilon = 1e-6);
        assert_relative_eq!(hidden.second_derivative(), second, epsilon = 1e-4);

        let output = &net.layer(2)[0];
        assert_eq!(output.derivative(), 1.0);
        assert_eq!(output.second_derivative(), 0.0);
    }

    #[test]
    fn forward_pass_is_repeatable() {
        let mut net = Net::new(&[3, 5, 5, 1], &mut RandomSource::seeded(11)).unwrap();
        let row = [0.3, -0.7, 0.9, 42.0];
        net.evaluate(&row).unwrap();
        let first = net.outputs();
        net.evaluate(&row).unwrap();
        assert_eq!(first, net.outputs());
    }

    #[test]
    fn bias_is_not_summed() {
        let mut net = Net::new(&[2, 3, 1], &mut RandomSource::seeded(2)).unwrap();
        assert!(net.layer(1).iter().any(|n| n.bias() > 0.0));
        let zeros = vec![0.0; net.connection_count()];
        net.set_weights(&zeros).unwrap();
        net.evaluate(&[1.0, 1.0]).unwrap();
        assert_eq!(net.output(), 0.0);
    }

    #[test]
    fn short_rows_are_rejected() {
        let mut net = Net::new(&[3, 2, 1], &mut RandomSource::seeded(2)).unwrap();
        assert!(matches!(
            net.evaluate(&[1.0, 2.0]),
            Err(ProcessError::BadInputs(SizeMismatch {
                expected: 3,
                got: 2
            }))
        ));
    }

    #[test]
    fn weights_round_trip() {
        let mut net = Net::new(&[2, 2, 1], &mut RandomSource::seeded(4)).unwrap();
        let weights: Vec<f64> = (0..6).map(|i| i as f64 * 0.1).collect();
        net.set_weights(&weights).unwrap();
        assert_eq!(net.weights(), weights);
        assert_eq!(
            net.set_weights(&[1.0]),
            Err(SizeMismatch {
                expected: 6,
                got: 1
            })
        );
        assert_eq!(net.weights(), weights);
    }
}
