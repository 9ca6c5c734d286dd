//! # Whigham operators
//!
//! Grammar-guided variation on derivation trees. Both operators only ever
//! replace a non-terminal with another expansion of the same rule, so
//! children always conform to the grammar.

use std::sync::Arc;

use tracing::debug;

use crate::error::{EpochError, OptionExt, Result};
use crate::grammar::derivation::{DerivationTree, NonTerminalSymbol};
use crate::grammar::generator::DerivationGenerator;
use crate::grammar::model::Grammar;
use crate::operator::{Crossed, Crossover, Mutated, Mutation};
use crate::population::GrowthMethod;
use crate::rng::RandomNumberGenerator;

/// The non-terminals exchanged by a [`WhighamCrossover`], as pre-order
/// non-terminal indices. `subtrees[0]` came out of the first parent.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationExchange {
    pub points: [usize; 2],
    pub subtrees: [NonTerminalSymbol; 2],
}

/// Swaps two expansions of the same rule between the parents.
#[derive(Debug, Clone, Default)]
pub struct WhighamCrossover {
    max_depth: Option<usize>,
}

impl WhighamCrossover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels any crossover that would leave a child deeper than `max_depth`.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth),
        }
    }
}

impl Crossover<DerivationTree> for WhighamCrossover {
    type Report = DerivationExchange;

    /// Cancelled when the second parent has no non-terminal of the rule
    /// chosen in the first, or when a child would exceed the depth limit.
    fn crossover(
        &self,
        parent1: &DerivationTree,
        parent2: &DerivationTree,
        rng: &mut RandomNumberGenerator,
    ) -> Option<Crossed<DerivationTree, DerivationExchange>> {
        let point1 = rng.gen_index(parent1.nonterminal_count());
        let subtree1 = parent1.nth_nonterminal(point1)?.clone();

        let matching: Vec<usize> = parent2
            .nonterminals()
            .enumerate()
            .filter(|(_, nt)| nt.rule() == subtree1.rule())
            .map(|(i, _)| i)
            .collect();
        let Some(&point2) = rng.choose(&matching) else {
            debug!(point1, rule = subtree1.rule().index(), "crossover cancelled, rule absent from second parent");
            return None;
        };
        let subtree2 = parent2.nth_nonterminal(point2)?.clone();

        let mut child1 = parent1.clone();
        let mut child2 = parent2.clone();
        child1.set_nth_nonterminal(point1, subtree2.clone()).ok()?;
        child2.set_nth_nonterminal(point2, subtree1.clone()).ok()?;

        if let Some(max_depth) = self.max_depth {
            if child1.depth() > max_depth || child2.depth() > max_depth {
                debug!(point1, point2, max_depth, "crossover cancelled, child too deep");
                return None;
            }
        }

        debug!(point1, point2, "derivations exchanged");
        Some(Crossed {
            children: [child1, child2],
            report: DerivationExchange {
                points: [point1, point2],
                subtrees: [subtree1, subtree2],
            },
        })
    }
}

/// The expansion a [`WhighamMutation`] replaced and its regrown successor.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationReplacement {
    pub point: usize,
    pub removed: NonTerminalSymbol,
    pub inserted: NonTerminalSymbol,
}

/// Regrows one non-terminal from scratch with the Grow method.
#[derive(Debug, Clone)]
pub struct WhighamMutation {
    generator: DerivationGenerator,
    max_depth: usize,
}

impl WhighamMutation {
    pub fn new(grammar: Arc<Grammar>, max_depth: usize) -> Self {
        Self {
            generator: DerivationGenerator::new(grammar),
            max_depth,
        }
    }
}

impl Mutation<DerivationTree> for WhighamMutation {
    type Report = DerivationReplacement;

    /// The regrown subtree keeps within the maximum depth, or within the
    /// shallowest completion of its rule if the point already sits too deep.
    fn mutate(
        &self,
        parent: &DerivationTree,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Option<Mutated<DerivationTree, DerivationReplacement>>> {
        let levels = parent.nonterminal_levels();
        let point = rng.gen_index(levels.len());
        let removed = parent
            .nth_nonterminal(point)
            .ok_or_else_epoch(|| EpochError::Index(format!("no non-terminal at index {}", point)))?
            .clone();

        let level = levels[point];
        let rule = self.generator.grammar().rule(removed.rule());
        let depth = self.max_depth.max(level + rule.min_depth());
        let inserted =
            self.generator
                .generate_rule(removed.rule(), GrowthMethod::Grow, level, depth, rng)?;

        let mut child = parent.clone();
        child.set_nth_nonterminal(point, inserted.clone())?;
        debug!(point, level, "derivation regrown");

        Ok(Some(Mutated {
            child,
            report: DerivationReplacement {
                point,
                removed,
                inserted,
            },
        }))
    }
}
