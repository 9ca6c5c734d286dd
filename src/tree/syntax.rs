//! The set of node kinds programs may be built from.

use std::sync::Arc;

use crate::error::{EpochError, Result};
use crate::tree::node::NodeKind;
use crate::tree::variable::Variable;

/// The node kinds programs are built from.
#[derive(Debug, Clone)]
pub struct Syntax {
    kinds: Vec<NodeKind>,
}

impl Syntax {
    /// Creates a syntax from prototype node kinds.
    ///
    /// ## Errors
    ///
    /// A configuration error if `kinds` is empty or holds no terminal, since
    /// no finite program could then be generated.
    pub fn new(kinds: Vec<NodeKind>) -> Result<Self> {
        if kinds.is_empty() {
            return Err(EpochError::Configuration("syntax is empty".to_string()));
        }
        if !kinds.iter().any(NodeKind::is_terminal) {
            return Err(EpochError::Configuration(
                "syntax contains no terminal".to_string(),
            ));
        }
        Ok(Self { kinds })
    }

    pub fn kinds(&self) -> &[NodeKind] {
        &self.kinds
    }

    /// Kinds taking no children.
    pub fn terminals(&self) -> impl Iterator<Item = &NodeKind> {
        self.kinds.iter().filter(|k| k.is_terminal())
    }

    /// Kinds taking at least one child.
    pub fn functions(&self) -> impl Iterator<Item = &NodeKind> {
        self.kinds.iter().filter(|k| !k.is_terminal())
    }

    /// A copy of this syntax extended with terminals for `variables` that are
    /// not already present.
    pub fn with_variables<'a, I>(&self, variables: I) -> Syntax
    where
        I: IntoIterator<Item = &'a Arc<Variable>>,
    {
        let mut kinds = self.kinds.clone();
        for variable in variables {
            let kind = NodeKind::Variable(Arc::clone(variable));
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Syntax { kinds }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
