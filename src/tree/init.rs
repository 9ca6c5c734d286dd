//! # TreeInitialiser
//!
//! Builds the initial population of expression trees by the Full, Grow or
//! ramped half-and-half method.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use epochx::operator::Initialiser;
//! use epochx::population::{InitMethod, PopulationConfig};
//! use epochx::rng::RandomNumberGenerator;
//! use epochx::tree::{DataType, NodeKind, Syntax, TreeInitialiser, Value};
//!
//! let syntax = Arc::new(Syntax::new(vec![
//!     NodeKind::And,
//!     NodeKind::Or,
//!     NodeKind::Literal(Value::Boolean(true)),
//!     NodeKind::Literal(Value::Boolean(false)),
//! ]).unwrap());
//!
//! let initialiser = TreeInitialiser::new(
//!     syntax,
//!     PopulationConfig::new(20, true),
//!     InitMethod::RampedHalfAndHalf { start_depth: 1, end_depth: 4 },
//!     DataType::Boolean,
//! ).unwrap();
//!
//! let mut rng = RandomNumberGenerator::from_seed(7);
//! let population = initialiser.initialise(&mut rng).unwrap();
//! assert_eq!(population.len(), 20);
//! assert!(population.iter().all(|tree| tree.depth() <= 4));
//! ```

use std::sync::Arc;

use crate::error::{EpochError, Result};
use crate::operator::Initialiser;
use crate::population::{fill_population, InitMethod, PopulationConfig};
use crate::rng::RandomNumberGenerator;
use crate::tree::generator::TreeGenerator;
use crate::tree::node::Node;
use crate::tree::syntax::Syntax;
use crate::tree::types::DataType;

/// Builds a population of trees of one return type.
#[derive(Debug, Clone)]
pub struct TreeInitialiser {
    generator: TreeGenerator,
    population: PopulationConfig,
    method: InitMethod,
    return_type: DataType,
}

impl TreeInitialiser {
    /// Creates an initialiser after checking that every depth of the plan
    /// can produce a tree of `return_type` by both methods it uses.
    pub fn new(
        syntax: Arc<Syntax>,
        population: PopulationConfig,
        method: InitMethod,
        return_type: DataType,
    ) -> Result<Self> {
        population.validate()?;
        method.validate()?;

        let generator = TreeGenerator::new(syntax, *method.depths().end());
        for (growth, depth) in method.combinations() {
            if !generator.can_generate(growth, return_type, depth) {
                return Err(EpochError::Configuration(format!(
                    "no {:?} tree returning {} exists at depth {}",
                    growth, return_type, depth
                )));
            }
        }

        Ok(Self {
            generator,
            population,
            method,
            return_type,
        })
    }

    pub fn generator(&self) -> &TreeGenerator {
        &self.generator
    }
}

impl Initialiser<Node> for TreeInitialiser {
    /// Generates the population; unless duplicates are allowed, a tree equal
    /// to one already accepted is regenerated.
    fn initialise(&self, rng: &mut RandomNumberGenerator) -> Result<Vec<Node>> {
        let size = self.population.size();
        fill_population(
            &self.population,
            |index| {
                let (growth, depth) = self.method.plan(index, size);
                self.generator
                    .generate(growth, self.return_type, depth, rng)
            },
            Node::key,
        )
    }
}
