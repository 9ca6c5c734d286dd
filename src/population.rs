//! # Population
//!
//! Population-level plumbing shared by every representation:
//!
//! - [`PopulationConfig`]: size, duplicate policy, regeneration bound and the
//!   threshold above which scoring runs in parallel.
//! - [`InitMethod`]: how an initial population is spread across the Full and
//!   Grow construction methods and across depths.
//! - [`Challenge`] and [`score_population`]: the boundary to external fitness
//!   functions. An individual that cannot be scored receives the challenge's
//!   worst score instead of aborting the run.
//!
//! ## Example
//!
//! ```rust
//! use epochx::population::{InitMethod, PopulationConfig};
//!
//! let config = PopulationConfig::builder()
//!     .size(500)
//!     .allow_duplicates(false)
//!     .build();
//! assert!(config.validate().is_ok());
//!
//! let method = InitMethod::RampedHalfAndHalf { start_depth: 2, end_depth: 6 };
//! assert!(method.validate().is_ok());
//! ```

use std::collections::HashSet;
use std::hash::Hash;
use std::ops::RangeInclusive;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::{EpochError, Result};

/// Tree construction style used when generating a single program.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrowthMethod {
    /// Every branch reaches exactly the requested depth.
    Full,
    /// Branches stop anywhere up to the requested depth.
    Grow,
}

/// Population-wide initialisation method.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMethod {
    /// All individuals built with [`GrowthMethod::Full`] at `depth`.
    Full { depth: usize },
    /// All individuals built with [`GrowthMethod::Grow`] up to `max_depth`.
    Grow { max_depth: usize },
    /// Individuals spread over `start_depth..=end_depth`, alternating Full
    /// and Grow inside every depth band.
    RampedHalfAndHalf { start_depth: usize, end_depth: usize },
}

impl InitMethod {
    /// Checks the depth bounds.
    pub fn validate(&self) -> Result<()> {
        if let InitMethod::RampedHalfAndHalf {
            start_depth,
            end_depth,
        } = *self
        {
            if start_depth > end_depth {
                return Err(EpochError::Configuration(format!(
                    "ramped start depth {} exceeds end depth {}",
                    start_depth, end_depth
                )));
            }
        }
        Ok(())
    }

    /// The depths individuals will be generated at.
    pub fn depths(&self) -> RangeInclusive<usize> {
        match *self {
            InitMethod::Full { depth } => depth..=depth,
            InitMethod::Grow { max_depth } => max_depth..=max_depth,
            InitMethod::RampedHalfAndHalf {
                start_depth,
                end_depth,
            } => start_depth..=end_depth,
        }
    }

    /// The construction method and depth for the `index`-th of
    /// `population_size` individuals.
    ///
    /// The ramp assigns contiguous index bands to depths, so each depth gets
    /// `population_size / bands` individuals (the remainder spreads over the
    /// bands), and alternates Full and Grow by index within a band.
    pub fn plan(&self, index: usize, population_size: usize) -> (GrowthMethod, usize) {
        match *self {
            InitMethod::Full { depth } => (GrowthMethod::Full, depth),
            InitMethod::Grow { max_depth } => (GrowthMethod::Grow, max_depth),
            InitMethod::RampedHalfAndHalf {
                start_depth,
                end_depth,
            } => {
                let bands = end_depth - start_depth + 1;
                let band = index * bands / population_size.max(1);
                let method = if index % 2 == 0 {
                    GrowthMethod::Full
                } else {
                    GrowthMethod::Grow
                };
                (method, start_depth + band.min(bands - 1))
            }
        }
    }

    /// Every (method, depth) pair the plan can produce.
    pub fn combinations(&self) -> Vec<(GrowthMethod, usize)> {
        match *self {
            InitMethod::Full { depth } => vec![(GrowthMethod::Full, depth)],
            InitMethod::Grow { max_depth } => vec![(GrowthMethod::Grow, max_depth)],
            InitMethod::RampedHalfAndHalf { .. } => self
                .depths()
                .flat_map(|d| [(GrowthMethod::Full, d), (GrowthMethod::Grow, d)])
                .collect(),
        }
    }
}

/// Configuration for assembling and scoring a population.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationConfig {
    size: usize,
    allow_duplicates: bool,
    /// Regeneration attempts per individual before giving up on uniqueness.
    max_attempts: usize,
    /// Minimum number of individuals to score in parallel.
    parallel_threshold: usize,
}

impl PopulationConfig {
    /// A configuration with the given size and duplicate policy, other
    /// settings at their defaults.
    pub fn new(size: usize, allow_duplicates: bool) -> Self {
        Self {
            size,
            allow_duplicates,
            ..Self::default()
        }
    }

    /// Starts a builder whose unset fields keep their defaults.
    pub fn builder() -> PopulationConfigBuilder {
        PopulationConfigBuilder::default()
    }

    /// Number of individuals to build.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether equal individuals may coexist.
    pub fn allow_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    /// Regeneration attempts per slot before giving up.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Smallest population scored in parallel.
    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    /// Fails fast on a zero population size or a zero attempt bound.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(EpochError::Configuration(
                "Population size cannot be zero".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(EpochError::Configuration(
                "Maximum generation attempts cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: 100,
            allow_duplicates: true,
            max_attempts: 1000,
            parallel_threshold: 1000,
        }
    }
}

/// Builder for `PopulationConfig`.
#[derive(Debug, Clone, Default)]
pub struct PopulationConfigBuilder {
    size: Option<usize>,
    allow_duplicates: Option<bool>,
    max_attempts: Option<usize>,
    parallel_threshold: Option<usize>,
}

impl PopulationConfigBuilder {
    pub fn size(mut self, value: usize) -> Self {
        self.size = Some(value);
        self
    }

    pub fn allow_duplicates(mut self, value: bool) -> Self {
        self.allow_duplicates = Some(value);
        self
    }

    pub fn max_attempts(mut self, value: usize) -> Self {
        self.max_attempts = Some(value);
        self
    }

    pub fn parallel_threshold(mut self, value: usize) -> Self {
        self.parallel_threshold = Some(value);
        self
    }

    pub fn build(self) -> PopulationConfig {
        let default = PopulationConfig::default();
        PopulationConfig {
            size: self.size.unwrap_or(default.size),
            allow_duplicates: self.allow_duplicates.unwrap_or(default.allow_duplicates),
            max_attempts: self.max_attempts.unwrap_or(default.max_attempts),
            parallel_threshold: self
                .parallel_threshold
                .unwrap_or(default.parallel_threshold),
        }
    }
}

/// Generates `config.size()` individuals, regenerating any whose key was
/// already accepted unless duplicates are allowed.
pub(crate) fn fill_population<I, K, G, F>(
    config: &PopulationConfig,
    mut generate: G,
    key: F,
) -> Result<Vec<I>>
where
    K: Eq + Hash,
    G: FnMut(usize) -> Result<I>,
    F: Fn(&I) -> K,
{
    config.validate()?;

    let mut population = Vec::with_capacity(config.size);
    let mut seen = HashSet::with_capacity(config.size);

    for index in 0..config.size {
        let mut attempts = 0;
        loop {
            let candidate = generate(index)?;
            if config.allow_duplicates || seen.insert(key(&candidate)) {
                population.push(candidate);
                break;
            }

            attempts += 1;
            trace!(index, attempts, "regenerating duplicate individual");
            if attempts >= config.max_attempts {
                return Err(EpochError::MaxAttemptsReached(format!(
                    "no unique individual found for slot {} after {} attempts",
                    index, attempts
                )));
            }
        }
    }

    debug!(size = population.len(), "population initialised");
    Ok(population)
}

/// A fitness function supplied by the problem being solved. Higher is better.
pub trait Challenge<I> {
    /// Scores an individual, or `None` if it cannot be evaluated (an unmapped
    /// chromosome, a program that failed to run).
    fn score(&self, individual: &I) -> Option<f64>;

    /// The score assigned to individuals that cannot be evaluated.
    fn worst_score(&self) -> f64 {
        f64::NEG_INFINITY
    }
}

/// Scores every individual, in parallel once the population reaches the
/// configured threshold. Invalid individuals and non-finite scores receive
/// the challenge's worst score.
///
/// Individuals may share variables, so a challenge that feeds inputs should
/// evaluate against its own [`Bindings`](crate::tree::Bindings) rather than
/// store them with [`Variable::set_value`](crate::tree::Variable::set_value),
/// whose slot every worker thread sees.
pub fn score_population<I, C>(population: &[I], challenge: &C, config: &PopulationConfig) -> Vec<f64>
where
    I: Sync,
    C: Challenge<I> + Sync,
{
    let score_one = |(index, individual): (usize, &I)| match challenge.score(individual) {
        Some(score) if score.is_finite() => score,
        other => {
            debug!(index, score = ?other, "invalid individual scored as worst");
            challenge.worst_score()
        }
    };

    if population.len() >= config.parallel_threshold {
        population.par_iter().enumerate().map(score_one).collect()
    } else {
        population.iter().enumerate().map(score_one).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramped_plan_covers_every_depth_with_both_methods() {
        let method = InitMethod::RampedHalfAndHalf {
            start_depth: 2,
            end_depth: 4,
        };
        let plan: Vec<_> = (0..12).map(|i| method.plan(i, 12)).collect();

        for depth in 2..=4 {
            let full = plan
                .iter()
                .filter(|p| **p == (GrowthMethod::Full, depth))
                .count();
            let grow = plan
                .iter()
                .filter(|p| **p == (GrowthMethod::Grow, depth))
                .count();
            assert_eq!(full, 2, "depth {}", depth);
            assert_eq!(grow, 2, "depth {}", depth);
        }
    }

    #[test]
    fn test_ramped_plan_never_exceeds_end_depth() {
        let method = InitMethod::RampedHalfAndHalf {
            start_depth: 1,
            end_depth: 3,
        };
        for size in 1..20 {
            for index in 0..size {
                let (_, depth) = method.plan(index, size);
                assert!((1..=3).contains(&depth));
            }
        }
    }

    #[test]
    fn test_inverted_ramp_is_rejected() {
        let method = InitMethod::RampedHalfAndHalf {
            start_depth: 5,
            end_depth: 2,
        };
        assert!(matches!(
            method.validate(),
            Err(EpochError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_population_is_rejected() {
        let config = PopulationConfig::new(0, true);
        let result = fill_population(&config, |i| Ok(i), |i| *i);
        match result {
            Err(EpochError::Configuration(msg)) => {
                assert!(msg.contains("Population size cannot be zero"))
            }
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_fill_population_regenerates_duplicates() {
        let config = PopulationConfig::new(3, false);
        let mut counter = 0;
        let population = fill_population(
            &config,
            |_| {
                counter += 1;
                Ok(counter / 2)
            },
            |value| *value,
        )
        .unwrap();
        assert_eq!(population, vec![0, 1, 2]);
    }

    #[test]
    fn test_fill_population_gives_up_after_max_attempts() {
        let config = PopulationConfig::builder()
            .size(2)
            .allow_duplicates(false)
            .max_attempts(5)
            .build();
        let result = fill_population(&config, |_| Ok(42), |value| *value);
        assert!(matches!(result, Err(EpochError::MaxAttemptsReached(_))));
    }

    struct HalfChallenge;

    impl Challenge<i32> for HalfChallenge {
        fn score(&self, individual: &i32) -> Option<f64> {
            if *individual < 0 {
                None
            } else if *individual == 0 {
                Some(f64::NAN)
            } else {
                Some(*individual as f64 / 2.0)
            }
        }
    }

    #[test]
    fn test_score_population_assigns_worst_to_invalid() {
        let config = PopulationConfig::default();
        let scores = score_population(&[4, -1, 0], &HalfChallenge, &config);
        assert_eq!(scores[0], 2.0);
        assert_eq!(scores[1], f64::NEG_INFINITY);
        assert_eq!(scores[2], f64::NEG_INFINITY);
    }

    #[test]
    fn test_score_population_parallel_matches_sequential() {
        let population: Vec<i32> = (1..=50).collect();
        let sequential = score_population(&population, &HalfChallenge, &PopulationConfig::default());
        let parallel_config = PopulationConfig::builder().parallel_threshold(1).build();
        let parallel = score_population(&population, &HalfChallenge, &parallel_config);
        assert_eq!(sequential, parallel);
    }
}
