//! # Tree Crossover
//!
//! Three ways of exchanging subtrees between two parents:
//!
//! - [`KozaCrossover`]: one point per parent, chosen as a function node with a
//!   fixed probability and otherwise as a terminal. Unconditional swap, no
//!   type checking.
//! - [`OnePointCrossover`]: both parents are walked together from the root;
//!   only positions reached through aligned ancestors are candidates, and the
//!   same candidate pair is used in both parents.
//! - [`SubtreeCrossover`]: strongly-typed swap; the partner point must return
//!   the same type as the first point.
//!
//! All of them clone the parents first and report the points and subtrees.

use tracing::debug;

use crate::error::{check_probability, Result};
use crate::operator::{Crossed, Crossover};
use crate::rng::RandomNumberGenerator;
use crate::tree::node::Node;
use crate::tree::types::DataType;

/// The points and subtrees exchanged by a tree crossover. `subtrees[0]` was
/// taken out of the first parent and inserted into the second child.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtreeExchange {
    pub points: [usize; 2],
    pub subtrees: [Node; 2],
}

/// Default probability of picking a function node as a crossover point.
pub const DEFAULT_FUNCTION_PROBABILITY: f64 = 0.9;

/// Picks a pre-order index, a function with probability `function_probability`
/// when the tree has any, otherwise a terminal.
fn select_point(tree: &Node, function_probability: f64, rng: &mut RandomNumberGenerator) -> usize {
    let functions = tree.function_count();
    let point = if functions > 0 && rng.gen_bool(function_probability) {
        tree.nth_function_index(rng.gen_index(functions))
    } else {
        tree.nth_terminal_index(rng.gen_index(tree.terminal_count()))
    };
    point.unwrap_or(0)
}

fn exchange(
    parent1: &Node,
    parent2: &Node,
    point1: usize,
    point2: usize,
) -> Option<Crossed<Node, SubtreeExchange>> {
    let subtree1 = parent1.nth_node(point1)?.clone();
    let subtree2 = parent2.nth_node(point2)?.clone();

    let mut child1 = parent1.clone();
    let mut child2 = parent2.clone();
    child1.set_nth_node(point1, subtree2.clone()).ok()?;
    child2.set_nth_node(point2, subtree1.clone()).ok()?;

    debug!(point1, point2, "subtrees exchanged");
    Some(Crossed {
        children: [child1, child2],
        report: SubtreeExchange {
            points: [point1, point2],
            subtrees: [subtree1, subtree2],
        },
    })
}

/// Koza's standard subtree crossover.
#[derive(Debug, Clone)]
pub struct KozaCrossover {
    function_probability: f64,
}

impl KozaCrossover {
    /// ## Errors
    ///
    /// A configuration error if `function_probability` is not a probability.
    pub fn new(function_probability: f64) -> Result<Self> {
        Ok(Self {
            function_probability: check_probability("function probability", function_probability)?,
        })
    }

    /// Chance that a swap point is a function node.
    pub fn function_probability(&self) -> f64 {
        self.function_probability
    }
}

impl Default for KozaCrossover {
    fn default() -> Self {
        Self {
            function_probability: DEFAULT_FUNCTION_PROBABILITY,
        }
    }
}

impl Crossover<Node> for KozaCrossover {
    type Report = SubtreeExchange;

    fn crossover(
        &self,
        parent1: &Node,
        parent2: &Node,
        rng: &mut RandomNumberGenerator,
    ) -> Option<Crossed<Node, SubtreeExchange>> {
        let point1 = select_point(parent1, self.function_probability, rng);
        let point2 = select_point(parent2, self.function_probability, rng);
        exchange(parent1, parent2, point1, point2)
    }
}

/// Poli and Langdon's one-point crossover over the common region.
#[derive(Debug, Clone, Default)]
pub struct OnePointCrossover {
    strict: bool,
}

impl OnePointCrossover {
    /// Aligns nodes by arity and return type.
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// Aligns nodes by operation class.
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Whether alignment compares operation classes rather than types.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Candidate point pairs: the roots, then every child pair whose parents
    /// and which itself are aligned, in pre-order.
    pub fn common_points(&self, parent1: &Node, parent2: &Node) -> Vec<(usize, usize)> {
        let types1 = parent1.return_types();
        let types2 = parent2.return_types();
        let mut points = vec![(0, 0)];
        if self.aligned(parent1, parent2, types1[0], types2[0]) {
            self.walk(
                parent1,
                parent2,
                (0, 0),
                (types1.as_slice(), types2.as_slice()),
                &mut points,
            );
        }
        points
    }

    fn aligned(
        &self,
        a: &Node,
        b: &Node,
        type_a: Option<DataType>,
        type_b: Option<DataType>,
    ) -> bool {
        if a.arity() != b.arity() {
            return false;
        }
        if self.strict {
            a.kind().same_class(b.kind())
        } else {
            matches!((type_a, type_b), (Some(x), Some(y)) if x == y)
        }
    }

    fn walk(
        &self,
        a: &Node,
        b: &Node,
        (index_a, index_b): (usize, usize),
        types: (&[Option<DataType>], &[Option<DataType>]),
        points: &mut Vec<(usize, usize)>,
    ) {
        let mut child_a = index_a + 1;
        let mut child_b = index_b + 1;
        for (ca, cb) in a.children().iter().zip(b.children()) {
            if self.aligned(ca, cb, types.0[child_a], types.1[child_b]) {
                points.push((child_a, child_b));
                self.walk(ca, cb, (child_a, child_b), types, points);
            }
            child_a += ca.length();
            child_b += cb.length();
        }
    }
}

impl Crossover<Node> for OnePointCrossover {
    type Report = SubtreeExchange;

    fn crossover(
        &self,
        parent1: &Node,
        parent2: &Node,
        rng: &mut RandomNumberGenerator,
    ) -> Option<Crossed<Node, SubtreeExchange>> {
        let points = self.common_points(parent1, parent2);
        let (point1, point2) = *rng.choose(&points)?;
        exchange(parent1, parent2, point1, point2)
    }
}

/// Strongly-typed subtree crossover.
#[derive(Debug, Clone)]
pub struct SubtreeCrossover {
    function_probability: f64,
}

impl SubtreeCrossover {
    /// `function_probability` biases the first parent's point towards
    /// function nodes, as in [`KozaCrossover::new`].
    ///
    /// ## Errors
    ///
    /// A configuration error if it is not a probability.
    pub fn new(function_probability: f64) -> Result<Self> {
        Ok(Self {
            function_probability: check_probability("function probability", function_probability)?,
        })
    }
}

impl Default for SubtreeCrossover {
    fn default() -> Self {
        Self {
            function_probability: DEFAULT_FUNCTION_PROBABILITY,
        }
    }
}

impl Crossover<Node> for SubtreeCrossover {
    type Report = SubtreeExchange;

    /// Cancelled when no node of the second parent returns the type of the
    /// point chosen in the first.
    fn crossover(
        &self,
        parent1: &Node,
        parent2: &Node,
        rng: &mut RandomNumberGenerator,
    ) -> Option<Crossed<Node, SubtreeExchange>> {
        let point1 = select_point(parent1, self.function_probability, rng);
        let data_type = parent1.nth_node(point1)?.return_type()?;

        let matching: Vec<usize> = parent2
            .return_types()
            .into_iter()
            .enumerate()
            .filter(|(_, t)| *t == Some(data_type))
            .map(|(i, _)| i)
            .collect();

        let Some(&point2) = rng.choose(&matching) else {
            debug!(point1, %data_type, "crossover cancelled, no matching type in second parent");
            return None;
        };
        exchange(parent1, parent2, point1, point2)
    }
}
