//! # TreeGenerator
//!
//! Random generation of strongly-typed trees by the Full and Grow methods.
//!
//! On construction the generator tabulates, for every depth up to its maximum,
//! which data types the syntax can produce:
//!
//! - the Full table holds the types of trees whose every branch has exactly
//!   that depth;
//! - the Grow table holds the types of trees of at most that depth.
//!
//! Generation then only picks a node whose children can themselves be
//! generated at the remaining depth, so it never backtracks.

use std::sync::Arc;

use tracing::trace;

use crate::error::{EpochError, Result};
use crate::population::GrowthMethod;
use crate::rng::RandomNumberGenerator;
use crate::tree::node::{Node, NodeKind};
use crate::tree::syntax::Syntax;
use crate::tree::types::{DataType, TypeSet};

/// Grows strongly typed random trees from a syntax.
#[derive(Debug, Clone)]
pub struct TreeGenerator {
    syntax: Arc<Syntax>,
    full_table: Vec<TypeSet>,
    grow_table: Vec<TypeSet>,
}

impl TreeGenerator {
    /// Creates a generator able to build trees up to `max_depth`.
    pub fn new(syntax: Arc<Syntax>, max_depth: usize) -> Self {
        let terminal_types: TypeSet = syntax
            .terminals()
            .filter_map(|k| k.return_type(&[]))
            .collect();

        let mut full_table = Vec::with_capacity(max_depth + 1);
        let mut grow_table = Vec::with_capacity(max_depth + 1);
        full_table.push(terminal_types);
        grow_table.push(terminal_types);

        for depth in 1..=max_depth {
            let full = function_outputs(&syntax, full_table[depth - 1]);
            let previous_grow = grow_table[depth - 1];
            let grow = previous_grow.union(function_outputs(&syntax, previous_grow));
            full_table.push(full);
            grow_table.push(grow);
        }

        Self {
            syntax,
            full_table,
            grow_table,
        }
    }

    pub fn syntax(&self) -> &Arc<Syntax> {
        &self.syntax
    }

    /// Deepest depth the type tables cover.
    pub fn max_depth(&self) -> usize {
        self.full_table.len() - 1
    }

    /// Types a tree built by `method` at `depth` can return.
    pub fn types_at(&self, method: GrowthMethod, depth: usize) -> TypeSet {
        let table = match method {
            GrowthMethod::Full => &self.full_table,
            GrowthMethod::Grow => &self.grow_table,
        };
        table.get(depth).copied().unwrap_or_default()
    }

    /// Whether `method` can build a tree of `data_type` at `depth`.
    pub fn can_generate(&self, method: GrowthMethod, data_type: DataType, depth: usize) -> bool {
        self.types_at(method, depth).contains(data_type)
    }

    /// The smallest depth at which a tree of `data_type` exists.
    pub fn min_depth(&self, data_type: DataType) -> Option<usize> {
        self.grow_table.iter().position(|t| t.contains(data_type))
    }

    /// Generates a random tree returning `data_type`.
    ///
    /// With [`GrowthMethod::Full`] every leaf sits at exactly `depth`; with
    /// [`GrowthMethod::Grow`] the tree's depth is at most `depth`.
    ///
    /// ## Errors
    ///
    /// `EpochError::Generation` if no such tree exists within the tables.
    pub fn generate(
        &self,
        method: GrowthMethod,
        data_type: DataType,
        depth: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Node> {
        if !self.can_generate(method, data_type, depth) {
            return Err(EpochError::Generation(format!(
                "no {:?} tree returning {} exists at depth {} (generator depth {})",
                method,
                data_type,
                depth,
                self.max_depth()
            )));
        }
        self.build(method, data_type, depth, rng)
    }

    fn build(
        &self,
        method: GrowthMethod,
        data_type: DataType,
        remaining: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Node> {
        let candidates = self.candidates(method, data_type, remaining);
        let (kind, signatures) = rng.choose(&candidates).ok_or_else(|| {
            EpochError::Generation(format!(
                "no node returns {} with {} levels remaining",
                data_type, remaining
            ))
        })?;
        let inputs = rng.choose(signatures).cloned().unwrap_or_default();
        trace!(node = %kind.identifier(), remaining, "generating node");

        let children = inputs
            .into_iter()
            .map(|input| self.build(method, input, remaining - 1, rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(Node::from_parts((*kind).clone(), children))
    }

    /// Kinds that can return `data_type` here, each with the child-type
    /// signatures that keep the children generable.
    fn candidates(
        &self,
        method: GrowthMethod,
        data_type: DataType,
        remaining: usize,
    ) -> Vec<(&NodeKind, Vec<Vec<DataType>>)> {
        let terminals_allowed = remaining == 0 || method == GrowthMethod::Grow;
        let child_types = remaining
            .checked_sub(1)
            .map(|depth| self.types_at(method, depth));

        self.syntax
            .kinds()
            .iter()
            .filter_map(|kind| {
                if kind.is_terminal() {
                    (terminals_allowed && kind.return_type(&[]) == Some(data_type))
                        .then(|| (kind, vec![Vec::new()]))
                } else {
                    let allowed = child_types?;
                    let signatures: Vec<_> = input_combinations(kind.arity(), allowed)
                        .into_iter()
                        .filter(|inputs| kind.return_type(inputs) == Some(data_type))
                        .collect();
                    (!signatures.is_empty()).then_some((kind, signatures))
                }
            })
            .collect()
    }
}

/// Types the syntax's functions can return when every child returns a type
/// in `allowed`.
fn function_outputs(syntax: &Syntax, allowed: TypeSet) -> TypeSet {
    syntax
        .functions()
        .flat_map(|kind| {
            input_combinations(kind.arity(), allowed)
                .into_iter()
                .filter_map(move |inputs| kind.return_type(&inputs))
        })
        .collect()
}

/// Every sequence of `arity` types drawn from `allowed`.
fn input_combinations(arity: usize, allowed: TypeSet) -> Vec<Vec<DataType>> {
    let mut combinations = vec![Vec::with_capacity(arity)];
    for _ in 0..arity {
        combinations = combinations
            .into_iter()
            .flat_map(|prefix| {
                allowed.iter().map(move |t| {
                    let mut next = prefix.clone();
                    next.push(t);
                    next
                })
            })
            .collect();
    }
    combinations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::types::Value;
    use crate::tree::variable::Variable;

    fn boolean_syntax() -> Arc<Syntax> {
        Arc::new(
            Syntax::new(vec![NodeKind::And, NodeKind::Literal(Value::Boolean(true))]).unwrap(),
        )
    }

    #[test]
    fn test_full_tree_is_complete() {
        let generator = TreeGenerator::new(boolean_syntax(), 2);
        let mut rng = RandomNumberGenerator::from_seed(1);
        for _ in 0..20 {
            let tree = generator
                .generate(GrowthMethod::Full, DataType::Boolean, 2, &mut rng)
                .unwrap();
            assert_eq!(tree.length(), 7);
            assert_eq!(tree.depth(), 2);
            for (i, node) in tree.iter().enumerate() {
                if node.is_terminal() {
                    assert_eq!(tree.nth_node_depth(i), Some(2));
                }
            }
        }
    }

    #[test]
    fn test_grow_respects_depth() {
        let generator = TreeGenerator::new(boolean_syntax(), 4);
        let mut rng = RandomNumberGenerator::from_seed(2);
        for _ in 0..50 {
            let tree = generator
                .generate(GrowthMethod::Grow, DataType::Boolean, 4, &mut rng)
                .unwrap();
            assert!(tree.depth() <= 4);
        }
    }

    #[test]
    fn test_typed_generation() {
        let x = Variable::new("x", DataType::Double);
        let syntax = Arc::new(
            Syntax::new(vec![
                NodeKind::If,
                NodeKind::GreaterThan,
                NodeKind::Add,
                NodeKind::Variable(x),
                NodeKind::Literal(Value::Integer(1)),
            ])
            .unwrap(),
        );
        let generator = TreeGenerator::new(syntax, 3);

        // Booleans only come from GT, so they need at least one level
        assert!(!generator.can_generate(GrowthMethod::Grow, DataType::Boolean, 0));
        assert!(generator.can_generate(GrowthMethod::Grow, DataType::Boolean, 1));
        assert_eq!(generator.min_depth(DataType::Boolean), Some(1));
        assert_eq!(generator.min_depth(DataType::Void), None);

        let mut rng = RandomNumberGenerator::from_seed(3);
        for _ in 0..30 {
            let tree = generator
                .generate(GrowthMethod::Grow, DataType::Double, 3, &mut rng)
                .unwrap();
            assert_eq!(tree.return_type(), Some(DataType::Double));
            assert!(tree.depth() <= 3);

            let tree = generator
                .generate(GrowthMethod::Full, DataType::Boolean, 2, &mut rng)
                .unwrap();
            assert_eq!(tree.return_type(), Some(DataType::Boolean));
            assert_eq!(tree.depth(), 2);
        }
    }

    #[test]
    fn test_unreachable_type_is_an_error() {
        let generator = TreeGenerator::new(boolean_syntax(), 3);
        let mut rng = RandomNumberGenerator::from_seed(4);
        assert!(matches!(
            generator.generate(GrowthMethod::Grow, DataType::Integer, 3, &mut rng),
            Err(EpochError::Generation(_))
        ));
        assert!(matches!(
            generator.generate(GrowthMethod::Full, DataType::Boolean, 4, &mut rng),
            Err(EpochError::Generation(_))
        ));
    }

    #[test]
    fn test_input_combinations() {
        let allowed: TypeSet = [DataType::Boolean, DataType::Integer].into_iter().collect();
        assert_eq!(input_combinations(0, allowed), vec![Vec::<DataType>::new()]);
        assert_eq!(input_combinations(2, allowed).len(), 4);
        assert_eq!(input_combinations(3, allowed).len(), 8);
    }
}
