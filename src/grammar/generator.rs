//! # Derivation generation and initialisers
//!
//! [`DerivationGenerator`] grows random derivation trees within a depth
//! budget. A production fits at level `l` under budget `d` when
//! `l + production.min_depth() <= d`, so a started derivation can always be
//! completed. Full prefers fitting recursive productions to push every branch
//! towards the budget; Grow picks uniformly among all fitting productions.
//!
//! Three initialisers build on it:
//!
//! - [`DerivationInitialiser`] yields derivation trees directly;
//! - [`ChromosomeInitialiser`] grows trees and encodes them as codons that a
//!   [`DerivationMapper`] maps straight back onto the same trees;
//! - [`RandomChromosomeInitialiser`](crate::grammar::RandomChromosomeInitialiser)
//!   draws codons without a grammar.

use std::sync::Arc;

use tracing::debug;

use crate::error::{EpochError, Result};
use crate::grammar::chromosome::Chromosome;
use crate::grammar::derivation::{DerivationTree, NonTerminalSymbol, Symbol, TerminalSymbol};
use crate::grammar::mapper::DerivationMapper;
use crate::grammar::model::{Grammar, GrammarSymbol, RuleId};
use crate::operator::Initialiser;
use crate::population::{fill_population, GrowthMethod, InitMethod, PopulationConfig};
use crate::rng::RandomNumberGenerator;

/// Grows random derivation trees within a depth budget.
#[derive(Debug, Clone)]
pub struct DerivationGenerator {
    grammar: Arc<Grammar>,
}

impl DerivationGenerator {
    /// A generator over `grammar`.
    pub fn new(grammar: Arc<Grammar>) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// A derivation from the start rule no deeper than `depth`.
    ///
    /// ## Errors
    ///
    /// `EpochError::Generation` if `depth` is below the grammar's minimum
    /// depth.
    pub fn generate(
        &self,
        method: GrowthMethod,
        depth: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<DerivationTree> {
        self.generate_rule(self.grammar.start(), method, 0, depth, rng)
    }

    /// Expands `rule` as if it sat at `level` of a tree whose non-terminals
    /// may not go below `depth`.
    pub fn generate_rule(
        &self,
        rule: RuleId,
        method: GrowthMethod,
        level: usize,
        depth: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<NonTerminalSymbol> {
        let definition = self.grammar.rule(rule);
        let fitting: Vec<usize> = definition
            .productions()
            .iter()
            .enumerate()
            .filter(|(_, p)| level + p.min_depth() <= depth)
            .map(|(i, _)| i)
            .collect();
        if fitting.is_empty() {
            return Err(EpochError::Generation(format!(
                "rule <{}> cannot complete within depth {} from level {}",
                definition.name(),
                depth,
                level
            )));
        }

        let candidates = match method {
            GrowthMethod::Full => {
                let recursive: Vec<usize> = fitting
                    .iter()
                    .copied()
                    .filter(|i| definition.productions()[*i].is_recursive())
                    .collect();
                if recursive.is_empty() {
                    fitting
                } else {
                    recursive
                }
            }
            GrowthMethod::Grow => fitting,
        };
        let production = *rng
            .choose(&candidates)
            .ok_or_else(|| EpochError::Generation("no candidate production".to_string()))?;

        let symbols = definition.productions()[production].symbols();
        let mut children = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            children.push(match symbol {
                GrammarSymbol::Literal(text) => Symbol::Terminal(TerminalSymbol::new(text.as_str())),
                GrammarSymbol::Rule(id) => {
                    Symbol::NonTerminal(self.generate_rule(*id, method, level + 1, depth, rng)?)
                }
            });
        }
        Ok(NonTerminalSymbol::new(rule, production, children))
    }
}

fn check_depths(grammar: &Grammar, method: &InitMethod) -> Result<()> {
    let start = *method.depths().start();
    if start < grammar.min_depth() {
        return Err(EpochError::Configuration(format!(
            "initial depth {} is below the grammar's minimum depth {}",
            start,
            grammar.min_depth()
        )));
    }
    Ok(())
}

/// Builds a population of derivation trees.
#[derive(Debug, Clone)]
pub struct DerivationInitialiser {
    generator: DerivationGenerator,
    population: PopulationConfig,
    method: InitMethod,
}

impl DerivationInitialiser {
    /// ## Errors
    ///
    /// A configuration error for an invalid population or method, or depths
    /// below the grammar's minimum depth.
    pub fn new(grammar: Arc<Grammar>, population: PopulationConfig, method: InitMethod) -> Result<Self> {
        population.validate()?;
        method.validate()?;
        check_depths(&grammar, &method)?;
        Ok(Self {
            generator: DerivationGenerator::new(grammar),
            population,
            method,
        })
    }

    /// The generator individuals are grown with.
    pub fn generator(&self) -> &DerivationGenerator {
        &self.generator
    }
}

impl Initialiser<DerivationTree> for DerivationInitialiser {
    fn initialise(&self, rng: &mut RandomNumberGenerator) -> Result<Vec<DerivationTree>> {
        let size = self.population.size();
        fill_population(
            &self.population,
            |index| {
                let (growth, depth) = self.method.plan(index, size);
                self.generator.generate(growth, depth, rng)
            },
            DerivationTree::clone,
        )
    }
}

/// Builds chromosomes that encode grown derivation trees, so every
/// individual maps.
#[derive(Debug, Clone)]
pub struct ChromosomeInitialiser {
    generator: DerivationGenerator,
    mapper: DerivationMapper,
    population: PopulationConfig,
    method: InitMethod,
    max_codon: u32,
}

impl ChromosomeInitialiser {
    /// ## Errors
    ///
    /// A configuration error for an invalid population or method, depths
    /// outside the grammar's minimum depth and the mapper's maximum depth, or
    /// a `max_codon` too small to select every production.
    pub fn new(
        mapper: DerivationMapper,
        population: PopulationConfig,
        method: InitMethod,
        max_codon: u32,
    ) -> Result<Self> {
        population.validate()?;
        method.validate()?;
        let grammar = Arc::clone(mapper.grammar());
        check_depths(&grammar, &method)?;

        let end = *method.depths().end();
        if end > mapper.config().max_depth {
            return Err(EpochError::Configuration(format!(
                "initial depth {} exceeds the mapper's maximum depth {}",
                end,
                mapper.config().max_depth
            )));
        }
        let widest = grammar
            .rules()
            .iter()
            .map(|r| r.productions().len())
            .max()
            .unwrap_or(1);
        if (widest - 1) as u64 > u64::from(max_codon) {
            return Err(EpochError::Configuration(format!(
                "max codon {} cannot select among {} productions",
                max_codon, widest
            )));
        }

        Ok(Self {
            generator: DerivationGenerator::new(grammar),
            mapper,
            population,
            method,
            max_codon,
        })
    }
}

impl Initialiser<Chromosome> for ChromosomeInitialiser {
    fn initialise(&self, rng: &mut RandomNumberGenerator) -> Result<Vec<Chromosome>> {
        let size = self.population.size();
        let population = fill_population(
            &self.population,
            |index| {
                let (growth, depth) = self.method.plan(index, size);
                let tree = self.generator.generate(growth, depth, rng)?;
                self.mapper.encode(&tree, self.max_codon, rng)
            },
            Chromosome::clone,
        )?;
        debug!(size = population.len(), "chromosomes encoded");
        Ok(population)
    }
}
