//! # Error Types
//!
//! This module defines the error type shared by every representation in the
//! crate. Only conditions the caller must act on become errors: configuration
//! mistakes, broken index contracts and failed evaluations. Structural
//! incompatibilities (a crossover with no matching partner) and mapping
//! failures are reported through `Option` instead.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use epochx::error::{EpochError, Result};
//!
//! fn checked_depth(depth: usize, max_depth: usize) -> Result<usize> {
//!     if depth > max_depth {
//!         return Err(EpochError::Configuration(format!(
//!             "depth {} exceeds maximum depth {}",
//!             depth, max_depth
//!         )));
//!     }
//!     Ok(depth)
//! }
//!
//! assert!(checked_depth(3, 2).is_err());
//! ```
//!
//! Using the `OptionExt` trait to convert `Option` to `Result`:
//!
//! ```rust
//! use epochx::error::{EpochError, OptionExt};
//!
//! fn first_codon(codons: &[u32]) -> epochx::error::Result<u32> {
//!     codons.first().copied().ok_or_else_epoch(|| {
//!         EpochError::Index("chromosome is empty".to_string())
//!     })
//! }
//!
//! assert_eq!(first_codon(&[7, 3]).unwrap(), 7);
//! ```

use thiserror::Error;

/// Represents errors that can occur while building, evaluating or varying programs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EpochError {
    /// An invalid configuration was supplied: empty syntax, zero population
    /// size, inverted depth bounds, probabilities outside `0.0..=1.0`.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A node, codon or statement index outside the addressed structure.
    #[error("Index error: {0}")]
    Index(String),

    /// A node was assembled from children whose types it cannot accept.
    #[error("Type error: {0}")]
    Type(String),

    /// Evaluating a program failed, e.g. on an unbound variable.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// No program of the requested type fits the requested depth.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Error that occurs when a maximum number of attempts is reached.
    #[error("Maximum attempts reached: {0}")]
    MaxAttemptsReached(String),
}

/// A specialized Result type for operations in this crate.
pub type Result<T> = std::result::Result<T, EpochError>;

/// Extension trait for Option to convert to Result with a custom error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T, EpochError>` using a closure
    /// to generate the error.
    fn ok_or_else_epoch<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> EpochError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_epoch<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> EpochError,
    {
        self.ok_or_else(err_fn)
    }
}

/// Fails with a configuration error unless `value` is a probability.
pub(crate) fn check_probability(name: &str, value: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&value) {
        return Err(EpochError::Configuration(format!(
            "{} must be within 0.0..=1.0, got {}",
            name, value
        )));
    }
    Ok(value)
}
