//! Generic population search: fitness-proportionate selection, crossover, mutation and
//! elitist reinsertion over any cloneable genome type.

mod optimizer;
mod selection;

pub use optimizer::*;
pub use selection::{cumulative_fitness, roulette_index};
