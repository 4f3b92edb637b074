//! Layered feedforward neural network, trained either by backpropagation
//! or by evolving its connection weights.

mod genome;
mod net;
mod trainer;

pub use genome::*;
pub use net::*;
pub use trainer::*;
