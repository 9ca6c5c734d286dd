//! Genetic programming representations and operators: typed expression trees,
//! grammar-guided derivation trees, grammatical-evolution chromosomes and
//! experimental imperative programs.
pub mod error;
pub mod grammar;
pub mod imperative;
pub mod operator;
pub mod population;
pub mod rng;
pub mod tree;

// Re-export commonly used types for convenience
pub use error::{EpochError, OptionExt, Result};
pub use operator::{Crossed, Crossover, Initialiser, Mutated, Mutation};
pub use rng::RandomNumberGenerator;
