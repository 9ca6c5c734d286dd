//! # Tree-based Genetic Programming
//!
//! Strongly-typed expression trees and the operators that build and vary
//! them. Every operator keeps trees well typed except [`KozaCrossover`],
//! which swaps unconditionally as in Koza's original formulation and is
//! meant for closed syntaxes where every node returns the same type.
pub mod crossover;
pub mod generator;
pub mod init;
pub mod mutation;
pub mod node;
pub mod syntax;
pub mod types;
pub mod variable;

pub use crossover::{KozaCrossover, OnePointCrossover, SubtreeCrossover, SubtreeExchange};
pub use generator::TreeGenerator;
pub use init::TreeInitialiser;
pub use mutation::{PointMutation, PointMutationReport, SubtreeMutation, SubtreeReplacement};
pub use node::{Node, NodeKind, PreOrder, TreeKey};
pub use syntax::Syntax;
pub use types::{DataType, TypeSet, Value};
pub use variable::{Bindings, Variable, VariableSet};
