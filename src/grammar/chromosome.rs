//! # Chromosomes
//!
//! The linear genotype of grammatical evolution: a sequence of integer codons
//! that a [`DerivationMapper`](crate::grammar::DerivationMapper) reads to
//! choose productions. Variation happens on the codons alone:
//!
//! - [`OnePointChromosomeCrossover`] cuts each parent at its own point and
//!   swaps the tails, so children may differ in length from their parents.
//! - [`CodonPointMutation`] redraws every codon with a fixed probability.
//! - [`RandomChromosomeInitialiser`] fills a population with fixed-length
//!   random chromosomes.

use std::fmt;

use tracing::debug;

use crate::error::{check_probability, EpochError, Result};
use crate::operator::{Crossed, Crossover, Initialiser, Mutated, Mutation};
use crate::population::{fill_population, PopulationConfig};
use crate::rng::RandomNumberGenerator;

/// Default largest value a freshly drawn codon may take.
pub const DEFAULT_MAX_CODON: u32 = u32::MAX;

/// A grammatical-evolution genome: a sequence of codons.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Chromosome {
    codons: Vec<u32>,
}

impl Chromosome {
    /// Wraps an existing codon sequence.
    pub fn new(codons: Vec<u32>) -> Self {
        Self { codons }
    }

    /// `length` codons drawn uniformly from `0..=max_codon`.
    pub fn random(length: usize, max_codon: u32, rng: &mut RandomNumberGenerator) -> Self {
        Self {
            codons: (0..length).map(|_| rng.gen_codon(max_codon)).collect(),
        }
    }

    /// The codons, in reading order.
    pub fn codons(&self) -> &[u32] {
        &self.codons
    }

    pub fn len(&self) -> usize {
        self.codons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codons.is_empty()
    }

    /// The codon at `index`.
    pub fn codon(&self, index: usize) -> Option<u32> {
        self.codons.get(index).copied()
    }

    /// ## Errors
    ///
    /// `EpochError::Index` if `index` is past the end.
    pub fn set_codon(&mut self, index: usize, codon: u32) -> Result<()> {
        let len = self.codons.len();
        let slot = self.codons.get_mut(index).ok_or_else(|| {
            EpochError::Index(format!("codon index {} out of range 0..{}", index, len))
        })?;
        *slot = codon;
        Ok(())
    }

    pub(crate) fn push(&mut self, codon: u32) {
        self.codons.push(codon);
    }

    /// Drops every codon from `length` on.
    pub fn truncate(&mut self, length: usize) {
        self.codons.truncate(length);
    }
}

impl From<Vec<u32>> for Chromosome {
    fn from(codons: Vec<u32>) -> Self {
        Self::new(codons)
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, codon) in self.codons.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", codon)?;
        }
        f.write_str("]")
    }
}

/// Cut points used by a [`OnePointChromosomeCrossover`]; each child keeps its
/// own parent's codons before the cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromosomeCut {
    pub points: [usize; 2],
}

/// Cuts each parent at its own random point and swaps the tails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnePointChromosomeCrossover;

impl Crossover<Chromosome> for OnePointChromosomeCrossover {
    type Report = ChromosomeCut;

    /// Cancelled when either parent is empty.
    fn crossover(
        &self,
        parent1: &Chromosome,
        parent2: &Chromosome,
        rng: &mut RandomNumberGenerator,
    ) -> Option<Crossed<Chromosome, ChromosomeCut>> {
        if parent1.is_empty() || parent2.is_empty() {
            return None;
        }
        let point1 = rng.gen_index(parent1.len());
        let point2 = rng.gen_index(parent2.len());

        let child1 = [&parent1.codons[..point1], &parent2.codons[point2..]].concat();
        let child2 = [&parent2.codons[..point2], &parent1.codons[point1..]].concat();

        debug!(point1, point2, "chromosomes crossed");
        Some(Crossed {
            children: [Chromosome::new(child1), Chromosome::new(child2)],
            report: ChromosomeCut {
                points: [point1, point2],
            },
        })
    }
}

/// Indices of the codons a [`CodonPointMutation`] redrew.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodonMutationReport {
    pub points: Vec<usize>,
}

/// Replaces each codon, with a fixed probability, by a fresh random codon.
#[derive(Debug, Clone)]
pub struct CodonPointMutation {
    probability: f64,
    max_codon: u32,
}

impl CodonPointMutation {
    /// ## Errors
    ///
    /// A configuration error if `probability` is not a probability.
    pub fn new(probability: f64, max_codon: u32) -> Result<Self> {
        Ok(Self {
            probability: check_probability("codon mutation probability", probability)?,
            max_codon,
        })
    }
}

impl Mutation<Chromosome> for CodonPointMutation {
    type Report = CodonMutationReport;

    fn mutate(
        &self,
        parent: &Chromosome,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Option<Mutated<Chromosome, CodonMutationReport>>> {
        let mut child = parent.clone();
        let mut points = Vec::new();
        for (index, codon) in child.codons.iter_mut().enumerate() {
            if rng.gen_bool(self.probability) {
                *codon = rng.gen_codon(self.max_codon);
                points.push(index);
            }
        }
        debug!(mutated = points.len(), "codons mutated");
        Ok(Some(Mutated {
            child,
            report: CodonMutationReport { points },
        }))
    }
}

/// Builds fixed-length chromosomes of uniformly random codons.
#[derive(Debug, Clone)]
pub struct RandomChromosomeInitialiser {
    population: PopulationConfig,
    length: usize,
    max_codon: u32,
}

impl RandomChromosomeInitialiser {
    /// ## Errors
    ///
    /// A configuration error for an empty population or zero-length
    /// chromosomes.
    pub fn new(population: PopulationConfig, length: usize, max_codon: u32) -> Result<Self> {
        population.validate()?;
        if length == 0 {
            return Err(EpochError::Configuration(
                "Chromosome length cannot be zero".to_string(),
            ));
        }
        Ok(Self {
            population,
            length,
            max_codon,
        })
    }
}

impl Initialiser<Chromosome> for RandomChromosomeInitialiser {
    fn initialise(&self, rng: &mut RandomNumberGenerator) -> Result<Vec<Chromosome>> {
        fill_population(
            &self.population,
            |_| Ok(Chromosome::random(self.length, self.max_codon, rng)),
            Chromosome::clone,
        )
    }
}
