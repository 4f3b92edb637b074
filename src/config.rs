//! Experiment configuration.
//!
//! Loaded from YAML files; every missing field falls back to its default.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evolution::{EvolutionError, OptimizerConfig};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Seed of the random source, drawn from the system when absent
    pub seed: Option<u64>,
    /// Sizes of the hidden layers, between the input and the single output layer
    pub hidden_layers: Vec<usize>,
    /// Share of the rows used for training, the rest is the test partition
    pub training_fraction: f64,
    /// Rescale the whole dataset to [-1, 1] before splitting
    pub normalize: bool,
    pub strategy: Strategy,
    pub backprop: BackpropConfig,
    pub evolution: EvolutionConfig,
}

/// How the connection weights are fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Backprop,
    Evolution,
}

/// Gradient descent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackpropConfig {
    pub learning_rate: f64,
    /// Passes over the training rows
    pub epochs: usize,
}

/// Weight evolution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Chance for each offspring to be mutated
    pub mutation_probability: f64,
    /// Best individuals kept unconditionally
    pub elites: usize,
    /// Lower bound of the initial genome entries
    pub init_low: f64,
    /// Upper bound of the initial genome entries
    pub init_high: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: None,
            hidden_layers: vec![5],
            training_fraction: 0.5,
            normalize: true,
            strategy: Strategy::Evolution,
            backprop: BackpropConfig::default(),
            evolution: EvolutionConfig::default(),
        }
    }
}

impl Default for BackpropConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 2000,
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            generations: 500,
            mutation_probability: 0.25,
            elites: 1,
            init_low: -5.0,
            init_high: 5.0,
        }
    }
}

impl EvolutionConfig {
    /// Settings of the generational loop itself.
    pub fn optimizer(&self) -> OptimizerConfig {
        OptimizerConfig {
            population_size: self.population_size,
            mutation_probability: self.mutation_probability,
            elites: self.elites,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.optimizer().validate()?;
        if !(self.init_low < self.init_high) || !(self.init_high - self.init_low).is_finite() {
            return Err(ConfigError::BadInitRange {
                low: self.init_low,
                high: self.init_high,
            });
        }
        Ok(())
    }
}

impl ExperimentConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: ExperimentConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(layer) = self.hidden_layers.iter().position(|&size| size == 0) {
            return Err(ConfigError::EmptyHiddenLayer(layer));
        }
        if !(self.training_fraction > 0.0 && self.training_fraction <= 1.0) {
            return Err(ConfigError::BadTrainingFraction(self.training_fraction));
        }
        let rate = self.backprop.learning_rate;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(ConfigError::BadLearningRate(rate));
        }
        self.evolution.validate()
    }

    /// Layer sizes of the net for a dataset with `inputs` input columns.
    pub fn geometry(&self, inputs: usize) -> Vec<usize> {
        let mut geometry = Vec::with_capacity(self.hidden_layers.len() + 2);
        geometry.push(inputs);
        geometry.extend_from_slice(&self.hidden_layers);
        geometry.push(1);
        geometry
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read or write configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Hidden layer {0} has no nodes!")]
    EmptyHiddenLayer(usize),
    #[error("Training fraction must be within (0, 1], but got {0}!")]
    BadTrainingFraction(f64),
    #[error("Learning rate must be positive and finite, but got {0}!")]
    BadLearningRate(f64),
    #[error("Initial weight range [{low}, {high}) is empty!")]
    BadInitRange { low: f64, high: f64 },
    #[error(transparent)]
    Optimizer(#[from] EvolutionError),
}
