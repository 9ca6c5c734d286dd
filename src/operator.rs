//! # Operators
//!
//! The `Crossover`, `Mutation` and `Initialiser` traits define the entry points
//! population-management code uses on every representation. Operators never
//! touch their parents: they clone first and return the children together with
//! a report describing the points and material involved, so statistics code can
//! inspect what happened without a listener bus.

use std::fmt::Debug;

use crate::{error::Result, rng::RandomNumberGenerator};

/// The two children of a successful crossover and what was exchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Crossed<I, R> {
    pub children: [I; 2],
    pub report: R,
}

/// The child of a successful mutation and what was changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutated<I, R> {
    pub child: I,
    pub report: R,
}

/// # Crossover
///
/// Combines two parents into two children.
pub trait Crossover<I> {
    /// Describes the crossover points and the material exchanged.
    type Report: Debug + Clone;

    /// Produces two children from clones of `parent1` and `parent2`.
    ///
    /// ## Returns
    ///
    /// `None` when the parents offer no compatible crossover points. This is
    /// a cancelled operation, not an error: the caller keeps the parents.
    fn crossover(
        &self,
        parent1: &I,
        parent2: &I,
        rng: &mut RandomNumberGenerator,
    ) -> Option<Crossed<I, Self::Report>>;
}

/// # Mutation
///
/// Produces a varied copy of a single parent.
pub trait Mutation<I> {
    /// Describes the mutation points and the material replaced.
    type Report: Debug + Clone;

    /// Produces a mutated clone of `parent`.
    ///
    /// ## Returns
    ///
    /// `Ok(None)` when the parent has nothing the operator can change, or a
    /// `EpochError` when the operator's configuration cannot produce the
    /// replacement material (e.g. no subtree of the required type fits).
    fn mutate(
        &self,
        parent: &I,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Option<Mutated<I, Self::Report>>>;
}

/// # Initialiser
///
/// Builds a starting population.
pub trait Initialiser<I> {
    /// Generates a complete population.
    ///
    /// ## Errors
    ///
    /// Configuration problems (zero population size, unreachable depths) and
    /// exhausted regeneration attempts while enforcing uniqueness.
    fn initialise(&self, rng: &mut RandomNumberGenerator) -> Result<Vec<I>>;
}
