//! # Tree Mutation
//!
//! - [`SubtreeMutation`] replaces one uniformly chosen subtree with a freshly
//!   grown subtree of the same return type.
//! - [`PointMutation`] visits every node and, with a fixed probability, swaps
//!   its operation for another of identical arity and return type, keeping
//!   the node's children.

use std::sync::Arc;

use tracing::debug;

use crate::error::{check_probability, EpochError, OptionExt, Result};
use crate::operator::{Mutated, Mutation};
use crate::population::GrowthMethod;
use crate::rng::RandomNumberGenerator;
use crate::tree::generator::TreeGenerator;
use crate::tree::node::{Node, NodeKind};
use crate::tree::syntax::Syntax;
use crate::tree::types::DataType;

/// The subtree a [`SubtreeMutation`] removed and the one it grew in its place.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtreeReplacement {
    pub point: usize,
    pub removed: Node,
    pub inserted: Node,
}

/// Replaces one subtree with a newly grown one of the same type.
#[derive(Debug, Clone)]
pub struct SubtreeMutation {
    generator: TreeGenerator,
    max_subtree_depth: usize,
}

impl SubtreeMutation {
    /// Grows replacements from `syntax`, at most `max_subtree_depth` deep.
    pub fn new(syntax: Arc<Syntax>, max_subtree_depth: usize) -> Self {
        Self {
            generator: TreeGenerator::new(syntax, max_subtree_depth),
            max_subtree_depth,
        }
    }

    pub fn max_subtree_depth(&self) -> usize {
        self.max_subtree_depth
    }
}

impl Mutation<Node> for SubtreeMutation {
    type Report = SubtreeReplacement;

    /// The point is drawn uniformly among the nodes whose return type the
    /// syntax can grow within the maximum subtree depth. Returns `Ok(None)`
    /// when there is no such node.
    ///
    /// ## Errors
    ///
    /// `EpochError::Type` if the parent is ill-typed.
    fn mutate(
        &self,
        parent: &Node,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Option<Mutated<Node, SubtreeReplacement>>> {
        let types = parent.return_types();
        if types.iter().any(Option::is_none) {
            return Err(EpochError::Type(
                "cannot mutate an ill-typed tree".to_string(),
            ));
        }
        let candidates: Vec<(usize, DataType)> = types
            .into_iter()
            .enumerate()
            .filter_map(|(index, data_type)| data_type.map(|t| (index, t)))
            .filter(|(_, t)| {
                self.generator
                    .can_generate(GrowthMethod::Grow, *t, self.max_subtree_depth)
            })
            .collect();
        if candidates.is_empty() {
            debug!(length = parent.length(), "no subtree type can be regrown");
            return Ok(None);
        }

        let (point, data_type) = candidates[rng.gen_index(candidates.len())];
        let removed = parent
            .nth_node(point)
            .ok_or_else_epoch(|| EpochError::Index(format!("no node at index {}", point)))?
            .clone();

        let inserted =
            self.generator
                .generate(GrowthMethod::Grow, data_type, self.max_subtree_depth, rng)?;

        let mut child = parent.clone();
        child.set_nth_node(point, inserted.clone())?;
        debug!(point, removed = removed.length(), inserted = inserted.length(), "subtree mutated");

        Ok(Some(Mutated {
            child,
            report: SubtreeReplacement {
                point,
                removed,
                inserted,
            },
        }))
    }
}

/// The pre-order indices whose operation a [`PointMutation`] replaced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointMutationReport {
    pub points: Vec<usize>,
}

/// Swaps node operations in place, keeping arity and type.
#[derive(Debug, Clone)]
pub struct PointMutation {
    syntax: Arc<Syntax>,
    probability: f64,
}

impl PointMutation {
    /// ## Errors
    ///
    /// A configuration error if `probability` is not a probability.
    pub fn new(syntax: Arc<Syntax>, probability: f64) -> Result<Self> {
        Ok(Self {
            syntax,
            probability: check_probability("point mutation probability", probability)?,
        })
    }

    fn visit(
        &self,
        node: &mut Node,
        index: &mut usize,
        points: &mut Vec<usize>,
        rng: &mut RandomNumberGenerator,
    ) {
        let current = *index;
        *index += 1;

        if rng.gen_bool(self.probability) {
            if let Some(replacement) = self.replacement(node, rng) {
                node.set_kind(replacement);
                points.push(current);
            }
        }

        for child in node.children_mut() {
            self.visit(child, index, points, rng);
        }
    }

    /// A different kind from the syntax with the same arity that returns the
    /// same type over the node's current children.
    fn replacement(&self, node: &Node, rng: &mut RandomNumberGenerator) -> Option<NodeKind> {
        let inputs: Vec<DataType> = node
            .children()
            .iter()
            .map(Node::return_type)
            .collect::<Option<_>>()?;
        let current = node.kind().return_type(&inputs)?;

        let candidates: Vec<&NodeKind> = self
            .syntax
            .kinds()
            .iter()
            .filter(|k| {
                k.arity() == node.arity()
                    && *k != node.kind()
                    && k.return_type(&inputs) == Some(current)
            })
            .collect();
        rng.choose(&candidates).map(|k| (*k).clone())
    }
}

impl Mutation<Node> for PointMutation {
    type Report = PointMutationReport;

    fn mutate(
        &self,
        parent: &Node,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Option<Mutated<Node, PointMutationReport>>> {
        let mut child = parent.clone();
        let mut points = Vec::new();
        self.visit(&mut child, &mut 0, &mut points, rng);
        debug!(mutated = points.len(), "point mutation applied");
        Ok(Some(Mutated {
            child,
            report: PointMutationReport { points },
        }))
    }
}
