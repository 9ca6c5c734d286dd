//! # Node
//!
//! The strongly-typed expression tree. A [`Node`] owns its children
//! exclusively; the operation it performs is a closed [`NodeKind`], so
//! evaluation and return-type resolution are exhaustive matches.
//!
//! Nodes are addressed by pre-order index: index 0 is the root, a parent
//! precedes its children, and children are visited left to right.
//!
//! ## Example
//!
//! ```rust
//! use epochx::tree::{Node, NodeKind, Value};
//!
//! let tree = Node::new(
//!     NodeKind::If,
//!     vec![
//!         Node::literal(Value::Boolean(true)),
//!         Node::literal(Value::Integer(1)),
//!         Node::literal(Value::Integer(2)),
//!     ],
//! )
//! .unwrap();
//!
//! assert_eq!(tree.evaluate().unwrap(), Value::Integer(1));
//! assert_eq!(tree.length(), 4);
//! assert_eq!(tree.depth(), 1);
//! assert_eq!(tree.to_string(), "IF(true, 1, 2)");
//! ```

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::mem;
use std::sync::Arc;

use crate::error::{EpochError, OptionExt, Result};
use crate::tree::types::{DataType, Value};
use crate::tree::variable::{Bindings, Variable};

/// The operation a node performs.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A constant terminal.
    Literal(Value),
    /// A terminal reading a shared variable.
    Variable(Arc<Variable>),
    And,
    Or,
    Not,
    Nand,
    Nor,
    Xor,
    Implies,
    /// `IF(condition, then, else)`, evaluating only the chosen branch.
    If,
    Add,
    Subtract,
    Multiply,
    /// Division returning `1.0` when the divisor is zero.
    ProtectedDivide,
    Max,
    Min,
    Abs,
    Sine,
    Cosine,
    GreaterThan,
    LessThan,
    Equal,
}

impl NodeKind {
    /// Number of children the operation takes; 0 for terminals.
    pub fn arity(&self) -> usize {
        use NodeKind::*;
        match self {
            Literal(_) | NodeKind::Variable(_) => 0,
            Not | Abs | Sine | Cosine => 1,
            And | Or | Nand | Nor | Xor | Implies | Add | Subtract | Multiply
            | ProtectedDivide | Max | Min | GreaterThan | LessThan | Equal => 2,
            If => 3,
        }
    }

    /// Whether the operation takes no children.
    pub fn is_terminal(&self) -> bool {
        self.arity() == 0
    }

    /// The name the node prints as.
    pub fn identifier(&self) -> Cow<'_, str> {
        use NodeKind::*;
        let name = match self {
            Literal(value) => return Cow::Owned(value.to_string()),
            NodeKind::Variable(variable) => return Cow::Borrowed(variable.name()),
            And => "AND",
            Or => "OR",
            Not => "NOT",
            Nand => "NAND",
            Nor => "NOR",
            Xor => "XOR",
            Implies => "IMPLIES",
            If => "IF",
            Add => "ADD",
            Subtract => "SUB",
            Multiply => "MUL",
            ProtectedDivide => "PDIV",
            Max => "MAX",
            Min => "MIN",
            Abs => "ABS",
            Sine => "SIN",
            Cosine => "COS",
            GreaterThan => "GT",
            LessThan => "LT",
            Equal => "EQ",
        };
        Cow::Borrowed(name)
    }

    /// Whether both kinds are the same operation class, ignoring the payload
    /// of literals and variables.
    pub fn same_class(&self, other: &NodeKind) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }

    /// Resolves the return type for the given child types.
    ///
    /// Returns `None` when the inputs are invalid for this operation, either
    /// because their count differs from the arity or because a type is not
    /// accepted. Values are never inspected.
    pub fn return_type(&self, inputs: &[DataType]) -> Option<DataType> {
        use NodeKind::*;
        if inputs.len() != self.arity() {
            return None;
        }
        match self {
            Literal(value) => Some(value.data_type()),
            NodeKind::Variable(variable) => Some(variable.data_type()),
            And | Or | Not | Nand | Nor | Xor | Implies => inputs
                .iter()
                .all(|t| *t == DataType::Boolean)
                .then_some(DataType::Boolean),
            If => {
                if inputs[0] != DataType::Boolean {
                    return None;
                }
                DataType::common_super(inputs[1], inputs[2])
            }
            Add | Subtract | Multiply | Max | Min | Abs => DataType::numeric_result(inputs),
            ProtectedDivide | Sine | Cosine => {
                DataType::numeric_result(inputs).map(|_| DataType::Double)
            }
            GreaterThan | LessThan => {
                DataType::numeric_result(inputs).map(|_| DataType::Boolean)
            }
            Equal => DataType::common_super(inputs[0], inputs[1]).map(|_| DataType::Boolean),
        }
    }
}

impl PartialEq for NodeKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeKind::Literal(a), NodeKind::Literal(b)) => a == b,
            (NodeKind::Variable(a), NodeKind::Variable(b)) => Arc::ptr_eq(a, b),
            _ => self.same_class(other),
        }
    }
}

/// A node of an expression tree together with its exclusively owned children.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: NodeKind,
    children: Vec<Node>,
}

impl Node {
    /// Builds a node, checking arity and child types.
    ///
    /// ## Errors
    ///
    /// `EpochError::Type` if the number of children differs from the arity or
    /// the children's return types are not accepted by `kind`.
    pub fn new(kind: NodeKind, children: Vec<Node>) -> Result<Node> {
        if children.len() != kind.arity() {
            return Err(EpochError::Type(format!(
                "{} expects {} children, got {}",
                kind.identifier(),
                kind.arity(),
                children.len()
            )));
        }
        let node = Node { kind, children };
        if node.return_type().is_none() {
            return Err(EpochError::Type(format!(
                "{} cannot accept the types of its children",
                node.kind.identifier()
            )));
        }
        Ok(node)
    }

    /// Builds a node the caller already knows to be well formed.
    pub(crate) fn from_parts(kind: NodeKind, children: Vec<Node>) -> Node {
        debug_assert_eq!(kind.arity(), children.len());
        Node { kind, children }
    }

    /// A constant terminal.
    pub fn literal(value: Value) -> Node {
        Node::from_parts(NodeKind::Literal(value), Vec::new())
    }

    /// A terminal reading `variable`; the node shares the variable.
    pub fn variable(variable: &Arc<Variable>) -> Node {
        Node::from_parts(NodeKind::Variable(Arc::clone(variable)), Vec::new())
    }

    /// The operation this node performs.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Swaps the operation in place; the replacement must share the arity.
    pub(crate) fn set_kind(&mut self, kind: NodeKind) {
        debug_assert_eq!(kind.arity(), self.kind.arity());
        self.kind = kind;
    }

    /// The direct children, left to right.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Node] {
        &mut self.children
    }

    /// Number of direct children.
    pub fn arity(&self) -> usize {
        self.children.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether the node has children.
    pub fn is_function(&self) -> bool {
        !self.is_terminal()
    }

    /// Evaluates the tree, reading variables from their shared slots.
    /// Boolean connectives and `IF` short-circuit, so the right operand of
    /// `AND(false, x)` is never evaluated.
    ///
    /// ## Errors
    ///
    /// `EpochError::Evaluation` for an unbound variable or a value of the
    /// wrong type.
    pub fn evaluate(&self) -> Result<Value> {
        self.evaluate_with(&Bindings::new())
    }

    /// Evaluates the tree against `bindings`, falling back to a variable's
    /// shared slot when the environment does not bind it. The result always
    /// has the representation of the static [`Node::return_type`]: an
    /// integer produced where a double is expected is widened.
    pub fn evaluate_with(&self, bindings: &Bindings) -> Result<Value> {
        use NodeKind::*;
        let c = &self.children;
        let value = match &self.kind {
            Literal(value) => value.clone(),
            NodeKind::Variable(variable) => match bindings.get(variable) {
                Some(value) => value.clone(),
                None => variable.value().ok_or_else_epoch(|| {
                    EpochError::Evaluation(format!("variable '{}' is unbound", variable.name()))
                })?,
            }
            .widen_to(variable.data_type()),
            And => Value::Boolean(c[0].truth(bindings)? && c[1].truth(bindings)?),
            Or => Value::Boolean(c[0].truth(bindings)? || c[1].truth(bindings)?),
            Nand => Value::Boolean(!(c[0].truth(bindings)? && c[1].truth(bindings)?)),
            Nor => Value::Boolean(!(c[0].truth(bindings)? || c[1].truth(bindings)?)),
            Implies => Value::Boolean(!c[0].truth(bindings)? || c[1].truth(bindings)?),
            Xor => Value::Boolean(c[0].truth(bindings)? ^ c[1].truth(bindings)?),
            Not => Value::Boolean(!c[0].truth(bindings)?),
            If => {
                let (taken, other) = if c[0].truth(bindings)? {
                    (&c[1], &c[2])
                } else {
                    (&c[2], &c[1])
                };
                match taken.evaluate_with(bindings)? {
                    Value::Integer(i) if other.return_type() == Some(DataType::Double) => {
                        Value::Double(i as f64)
                    }
                    value => value,
                }
            }
            Add | Subtract | Multiply | Max | Min => arithmetic(
                &self.kind,
                c[0].evaluate_with(bindings)?,
                c[1].evaluate_with(bindings)?,
            )?,
            ProtectedDivide => {
                let numerator = c[0].number(bindings)?;
                let denominator = c[1].number(bindings)?;
                if denominator == 0.0 {
                    Value::Double(1.0)
                } else {
                    Value::Double(numerator / denominator)
                }
            }
            Abs => match c[0].evaluate_with(bindings)? {
                Value::Integer(i) => Value::Integer(i.wrapping_abs()),
                other => Value::Double(other.as_f64()?.abs()),
            },
            Sine => Value::Double(c[0].number(bindings)?.sin()),
            Cosine => Value::Double(c[0].number(bindings)?.cos()),
            GreaterThan => Value::Boolean(c[0].number(bindings)? > c[1].number(bindings)?),
            LessThan => Value::Boolean(c[0].number(bindings)? < c[1].number(bindings)?),
            Equal => {
                let (a, b) = (c[0].evaluate_with(bindings)?, c[1].evaluate_with(bindings)?);
                let equal = match (a.as_f64(), b.as_f64()) {
                    (Ok(x), Ok(y)) => x == y,
                    _ => a == b,
                };
                Value::Boolean(equal)
            }
        };
        Ok(value)
    }

    fn truth(&self, bindings: &Bindings) -> Result<bool> {
        self.evaluate_with(bindings)?.as_bool()
    }

    fn number(&self, bindings: &Bindings) -> Result<f64> {
        self.evaluate_with(bindings)?.as_f64()
    }

    /// Resolves the tree's return type bottom-up, or `None` if any node
    /// rejects its children's types.
    pub fn return_type(&self) -> Option<DataType> {
        let inputs = self
            .children
            .iter()
            .map(Node::return_type)
            .collect::<Option<Vec<_>>>()?;
        self.kind.return_type(&inputs)
    }

    /// The return type of every node, in pre-order, resolved in one pass.
    pub fn return_types(&self) -> Vec<Option<DataType>> {
        fn resolve(node: &Node, out: &mut Vec<Option<DataType>>) -> Option<DataType> {
            let slot = out.len();
            out.push(None);
            let inputs: Vec<Option<DataType>> =
                node.children.iter().map(|c| resolve(c, out)).collect();
            let resolved = inputs
                .into_iter()
                .collect::<Option<Vec<_>>>()
                .and_then(|inputs| node.kind.return_type(&inputs));
            out[slot] = resolved;
            resolved
        }

        let mut out = Vec::new();
        resolve(self, &mut out);
        out
    }

    /// Total number of nodes.
    pub fn length(&self) -> usize {
        1 + self.children.iter().map(Node::length).sum::<usize>()
    }

    /// Longest root-to-leaf edge count; a bare terminal has depth 0.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Number of terminal nodes.
    pub fn terminal_count(&self) -> usize {
        self.iter().filter(|n| n.is_terminal()).count()
    }

    /// Number of function nodes.
    pub fn function_count(&self) -> usize {
        self.iter().filter(|n| n.is_function()).count()
    }

    /// Number of distinct terminals, compared by printed name.
    pub fn distinct_terminal_count(&self) -> usize {
        self.distinct(Node::is_terminal)
    }

    /// Number of distinct function operations.
    pub fn distinct_function_count(&self) -> usize {
        self.distinct(Node::is_function)
    }

    fn distinct(&self, predicate: fn(&Node) -> bool) -> usize {
        self.iter()
            .filter(|n| predicate(n))
            .map(|n| n.kind.identifier())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Iterates the tree in pre-order.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// The node at pre-order index `n`.
    pub fn nth_node(&self, n: usize) -> Option<&Node> {
        self.iter().nth(n)
    }

    /// Mutable access to the node at pre-order index `n`.
    pub fn nth_node_mut(&mut self, n: usize) -> Option<&mut Node> {
        if n == 0 {
            return Some(self);
        }
        let mut remaining = n - 1;
        for child in &mut self.children {
            let length = child.length();
            if remaining < length {
                return child.nth_node_mut(remaining);
            }
            remaining -= length;
        }
        None
    }

    /// Replaces the subtree at pre-order index `n` and returns the old one.
    /// Index 0 replaces the whole tree.
    ///
    /// ## Errors
    ///
    /// `EpochError::Index` if `n` is not below [`Node::length`].
    pub fn set_nth_node(&mut self, n: usize, node: Node) -> Result<Node> {
        let length = self.length();
        let slot = self.nth_node_mut(n).ok_or_else_epoch(|| {
            EpochError::Index(format!("node index {} out of range for length {}", n, length))
        })?;
        Ok(mem::replace(slot, node))
    }

    /// Depth of the node at pre-order index `n`, the root being at depth 0.
    pub fn nth_node_depth(&self, n: usize) -> Option<usize> {
        if n == 0 {
            return Some(0);
        }
        let mut remaining = n - 1;
        for child in &self.children {
            let length = child.length();
            if remaining < length {
                return child.nth_node_depth(remaining).map(|d| d + 1);
            }
            remaining -= length;
        }
        None
    }

    /// Pre-order index of the `k`-th function node (counting from 0).
    pub fn nth_function_index(&self, k: usize) -> Option<usize> {
        self.locate(k, Node::is_function)
    }

    /// Pre-order index of the `k`-th terminal node (counting from 0).
    pub fn nth_terminal_index(&self, k: usize) -> Option<usize> {
        self.locate(k, Node::is_terminal)
    }

    /// A hashable key equal for two trees exactly when the trees are equal:
    /// variables are told apart by identity, not by name.
    pub fn key(&self) -> TreeKey {
        let tokens = self
            .iter()
            .map(|node| match &node.kind {
                NodeKind::Literal(value) => KeyToken::Literal(format!("{:?}", value)),
                NodeKind::Variable(variable) => {
                    KeyToken::Variable(Arc::as_ptr(variable) as usize)
                }
                kind => KeyToken::Operation(mem::discriminant(kind)),
            })
            .collect();
        TreeKey(tokens)
    }

    fn locate(&self, k: usize, predicate: fn(&Node) -> bool) -> Option<usize> {
        self.iter()
            .enumerate()
            .filter(|(_, n)| predicate(n))
            .nth(k)
            .map(|(i, _)| i)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind.identifier())?;
        if self.children.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", child)?;
        }
        f.write_str(")")
    }
}

/// Pre-order iterator over a tree.
pub struct PreOrder<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Pre-order image of a tree, see [`Node::key`]. Arities are fixed per
/// operation, so the token sequence determines the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeKey(Vec<KeyToken>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyToken {
    Operation(mem::Discriminant<NodeKind>),
    Literal(String),
    Variable(usize),
}

fn arithmetic(kind: &NodeKind, a: Value, b: Value) -> Result<Value> {
    if let (Value::Integer(x), Value::Integer(y)) = (&a, &b) {
        let (x, y) = (*x, *y);
        let result = match kind {
            NodeKind::Add => x.wrapping_add(y),
            NodeKind::Subtract => x.wrapping_sub(y),
            NodeKind::Multiply => x.wrapping_mul(y),
            NodeKind::Max => x.max(y),
            NodeKind::Min => x.min(y),
            other => {
                return Err(EpochError::Evaluation(format!(
                    "{} is not an arithmetic operator",
                    other.identifier()
                )))
            }
        };
        return Ok(Value::Integer(result));
    }

    let (x, y) = (a.as_f64()?, b.as_f64()?);
    let result = match kind {
        NodeKind::Add => x + y,
        NodeKind::Subtract => x - y,
        NodeKind::Multiply => x * y,
        NodeKind::Max => x.max(y),
        NodeKind::Min => x.min(y),
        other => {
            return Err(EpochError::Evaluation(format!(
                "{} is not an arithmetic operator",
                other.identifier()
            )))
        }
    };
    Ok(Value::Double(result))
}
