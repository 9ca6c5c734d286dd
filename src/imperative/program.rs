//! # Imperative programs
//!
//! Experimental statement-based programs: variable declarations, assignments,
//! conditionals, bounded loops and returns over expression trees. A statement
//! is addressed by a path of indices, one per nested block: `[2, 0]` is the
//! first statement in the body of the third top-level statement.
//!
//! Variables are compared by identity, so two declarations of `x` are two
//! different variables.
//!
//! ## Example
//!
//! ```rust
//! use epochx::imperative::{Block, Program, Statement};
//! use epochx::tree::{DataType, Node, NodeKind, Value, Variable};
//!
//! let a = Variable::new("a", DataType::Integer);
//! let total = Variable::new("total", DataType::Integer);
//!
//! // int total = a; loop (3) { total = ADD(total, a); } return total;
//! let program = Program::new(
//!     vec![a.clone()],
//!     Block::new(vec![
//!         Statement::Declaration { variable: total.clone(), value: Node::variable(&a) },
//!         Statement::Loop {
//!             iterations: Node::literal(Value::Integer(3)),
//!             body: Block::new(vec![Statement::Assignment {
//!                 variable: total.clone(),
//!                 value: Node::new(NodeKind::Add, vec![Node::variable(&total), Node::variable(&a)]).unwrap(),
//!             }]),
//!         },
//!         Statement::Return(Node::variable(&total)),
//!     ]),
//! );
//!
//! assert_eq!(program.execute(&[Value::Integer(5)]).unwrap(), Value::Integer(20));
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{EpochError, Result};
use crate::tree::node::{Node, NodeKind};
use crate::tree::types::{DataType, Value};
use crate::tree::variable::{Bindings, Variable};

/// Upper bound on the iterations of any single loop.
pub const DEFAULT_MAX_LOOP_ITERATIONS: usize = 1000;

/// One statement of an imperative program.
#[derive(Debug, Clone)]
pub enum Statement {
    Declaration { variable: Arc<Variable>, value: Node },
    Assignment { variable: Arc<Variable>, value: Node },
    If { condition: Node, body: Block },
    /// Runs `body` as many times as `iterations` evaluates to, clamped to
    /// the program's loop bound.
    Loop { iterations: Node, body: Block },
    Return(Node),
}

impl Statement {
    pub fn is_return(&self) -> bool {
        matches!(self, Statement::Return(_))
    }

    /// The nested block of an `If` or `Loop`.
    pub fn body(&self) -> Option<&Block> {
        match self {
            Statement::If { body, .. } | Statement::Loop { body, .. } => Some(body),
            _ => None,
        }
    }

    fn body_mut(&mut self) -> Option<&mut Block> {
        match self {
            Statement::If { body, .. } | Statement::Loop { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The expression this statement evaluates directly, nested blocks aside.
    pub fn expression(&self) -> &Node {
        match self {
            Statement::Declaration { value, .. } | Statement::Assignment { value, .. } => value,
            Statement::If { condition, .. } => condition,
            Statement::Loop { iterations, .. } => iterations,
            Statement::Return(value) => value,
        }
    }

    /// Uses of `variable` in this statement and any nested block, excluding
    /// its own declaration.
    pub fn references(&self, variable: &Arc<Variable>) -> usize {
        let target = match self {
            Statement::Assignment { variable: v, .. } if Arc::ptr_eq(v, variable) => 1,
            _ => 0,
        };
        let nested = self.body().map_or(0, |body| body.references(variable));
        target + nested + node_references(self.expression(), variable)
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "    ".repeat(indent);
        match self {
            Statement::Declaration { variable, value } => {
                writeln!(f, "{}{} {} = {};", pad, variable.data_type(), variable.name(), value)
            }
            Statement::Assignment { variable, value } => {
                writeln!(f, "{}{} = {};", pad, variable.name(), value)
            }
            Statement::If { condition, body } => {
                writeln!(f, "{}if ({}) {{", pad, condition)?;
                body.fmt_indented(f, indent + 1)?;
                writeln!(f, "{}}}", pad)
            }
            Statement::Loop { iterations, body } => {
                writeln!(f, "{}loop ({}) {{", pad, iterations)?;
                body.fmt_indented(f, indent + 1)?;
                writeln!(f, "{}}}", pad)
            }
            Statement::Return(value) => writeln!(f, "{}return {};", pad, value),
        }
    }
}

impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        use Statement::*;
        match (self, other) {
            (Declaration { variable: a, value: x }, Declaration { variable: b, value: y })
            | (Assignment { variable: a, value: x }, Assignment { variable: b, value: y }) => {
                Arc::ptr_eq(a, b) && x == y
            }
            (If { condition: a, body: x }, If { condition: b, body: y })
            | (Loop { iterations: a, body: x }, Loop { iterations: b, body: y }) => a == b && x == y,
            (Return(a), Return(b)) => a == b,
            _ => false,
        }
    }
}

fn node_references(node: &Node, variable: &Arc<Variable>) -> usize {
    node.iter()
        .filter(|n| matches!(n.kind(), NodeKind::Variable(v) if Arc::ptr_eq(v, variable)))
        .count()
}

enum Flow {
    Continue,
    Return(Value),
}

/// A sequence of statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    statements: Vec<Statement>,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Number of expression nodes reading `variable`, nested blocks included.
    pub fn references(&self, variable: &Arc<Variable>) -> usize {
        self.statements.iter().map(|s| s.references(variable)).sum()
    }

    /// The block owned by the compound statement at `path`, or this block
    /// for an empty path.
    pub fn block_at(&self, path: &[usize]) -> Option<&Block> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.statements.get(*first)?.body()?.block_at(rest),
        }
    }

    fn block_at_mut(&mut self, path: &[usize]) -> Option<&mut Block> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self
                .statements
                .get_mut(*first)?
                .body_mut()?
                .block_at_mut(rest),
        }
    }

    /// The statement at `path`.
    pub fn statement_at(&self, path: &[usize]) -> Option<&Statement> {
        let (last, parent) = path.split_last()?;
        self.block_at(parent)?.statements.get(*last)
    }

    /// Paths of every statement, pre-order.
    pub fn statement_paths(&self) -> Vec<Vec<usize>> {
        let mut paths = Vec::new();
        self.collect_paths(&mut Vec::new(), &mut paths);
        paths
    }

    fn collect_paths(&self, prefix: &mut Vec<usize>, paths: &mut Vec<Vec<usize>>) {
        for (index, statement) in self.statements.iter().enumerate() {
            prefix.push(index);
            paths.push(prefix.clone());
            if let Some(body) = statement.body() {
                body.collect_paths(prefix, paths);
            }
            prefix.pop();
        }
    }

    fn execute(&self, env: &mut Bindings, max_iterations: usize) -> Result<Flow> {
        for statement in &self.statements {
            match statement {
                Statement::Declaration { variable, value }
                | Statement::Assignment { variable, value } => {
                    let value = value.evaluate_with(env)?;
                    env.bind(variable, value)?;
                }
                Statement::If { condition, body } => {
                    if condition.evaluate_with(env)?.as_bool()? {
                        if let Flow::Return(value) = body.execute(env, max_iterations)? {
                            return Ok(Flow::Return(value));
                        }
                    }
                }
                Statement::Loop { iterations, body } => {
                    let count = iterations.evaluate_with(env)?.as_i64()?.max(0) as usize;
                    for _ in 0..count.min(max_iterations) {
                        if let Flow::Return(value) = body.execute(env, max_iterations)? {
                            return Ok(Flow::Return(value));
                        }
                    }
                }
                Statement::Return(value) => return Ok(Flow::Return(value.evaluate_with(env)?)),
            }
        }
        Ok(Flow::Continue)
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        self.statements
            .iter()
            .try_for_each(|s| s.fmt_indented(f, indent))
    }
}

/// A parameterised statement block with a loop bound.
#[derive(Debug, Clone)]
pub struct Program {
    parameters: Vec<Arc<Variable>>,
    body: Block,
    max_loop_iterations: usize,
}

impl Program {
    /// A program with the default loop bound.
    pub fn new(parameters: Vec<Arc<Variable>>, body: Block) -> Self {
        Self {
            parameters,
            body,
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
        }
    }

    /// Caps how often any loop body runs.
    pub fn with_max_loop_iterations(mut self, max: usize) -> Self {
        self.max_loop_iterations = max;
        self
    }

    /// The inputs bound by [`Program::execute`], in order.
    pub fn parameters(&self) -> &[Arc<Variable>] {
        &self.parameters
    }

    pub fn body(&self) -> &Block {
        &self.body
    }

    pub fn statement_at(&self, path: &[usize]) -> Option<&Statement> {
        self.body.statement_at(path)
    }

    /// Paths of every statement, pre-order.
    pub fn statement_paths(&self) -> Vec<Vec<usize>> {
        self.body.statement_paths()
    }

    /// Number of statements, nested ones included.
    pub fn length(&self) -> usize {
        self.statement_paths().len()
    }

    /// Uses of `variable` anywhere in the body, declarations excluded.
    pub fn references(&self, variable: &Arc<Variable>) -> usize {
        self.body.references(variable)
    }

    /// Removes and returns the statement at `path`.
    ///
    /// ## Errors
    ///
    /// `EpochError::Index` if no statement sits at `path`.
    pub fn remove(&mut self, path: &[usize]) -> Result<Statement> {
        let (last, parent) = path
            .split_last()
            .ok_or_else(|| EpochError::Index("empty statement path".to_string()))?;
        let block = self
            .body
            .block_at_mut(parent)
            .filter(|b| *last < b.len())
            .ok_or_else(|| EpochError::Index(format!("no statement at {:?}", path)))?;
        Ok(block.statements.remove(*last))
    }

    /// Inserts `statement` so that it ends up at `path`.
    ///
    /// ## Errors
    ///
    /// `EpochError::Index` if the enclosing block does not exist or the
    /// position is past its end.
    pub fn insert(&mut self, path: &[usize], statement: Statement) -> Result<()> {
        let (last, parent) = path
            .split_last()
            .ok_or_else(|| EpochError::Index("empty statement path".to_string()))?;
        let block = self
            .body
            .block_at_mut(parent)
            .filter(|b| *last <= b.len())
            .ok_or_else(|| EpochError::Index(format!("cannot insert at {:?}", path)))?;
        block.statements.insert(*last, statement);
        Ok(())
    }

    /// Checks that every expression is well typed for its statement: values
    /// assignable to their variables, Boolean conditions, Integer iteration
    /// counts.
    pub fn is_well_typed(&self) -> bool {
        self.statement_paths().iter().all(|path| {
            let Some(statement) = self.statement_at(path) else {
                return false;
            };
            let Some(data_type) = statement.expression().return_type() else {
                return false;
            };
            match statement {
                Statement::Declaration { variable, .. } | Statement::Assignment { variable, .. } => {
                    variable.data_type().is_assignable_from(data_type)
                }
                Statement::If { .. } => data_type == DataType::Boolean,
                Statement::Loop { .. } => data_type == DataType::Integer,
                Statement::Return(_) => true,
            }
        })
    }

    /// Binds `arguments` to the parameters in order and runs the body. Values
    /// live in an environment local to this call and the variables' shared
    /// slots are never written, so one program may run on several threads at
    /// once.
    /// Returns the first value returned, or `Value::Void` if the body runs
    /// to the end.
    ///
    /// ## Errors
    ///
    /// `EpochError::Evaluation` for a wrong argument count, an unbound
    /// variable or a wrongly typed value; `EpochError::Type` for an argument
    /// or assignment not assignable to its variable.
    pub fn execute(&self, arguments: &[Value]) -> Result<Value> {
        if arguments.len() != self.parameters.len() {
            return Err(EpochError::Evaluation(format!(
                "expected {} arguments, got {}",
                self.parameters.len(),
                arguments.len()
            )));
        }
        let mut env = Bindings::new();
        for (parameter, argument) in self.parameters.iter().zip(arguments) {
            env.bind(parameter, argument.clone())?;
        }
        trace!(statements = self.length(), "executing program");
        match self.body.execute(&mut env, self.max_loop_iterations)? {
            Flow::Return(value) => Ok(value),
            Flow::Continue => Ok(Value::Void),
        }
    }
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| Arc::ptr_eq(a, b))
            && self.body == other.body
            && self.max_loop_iterations == other.max_loop_iterations
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.body.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Node {
        Node::literal(Value::Integer(i))
    }

    fn add(a: Node, b: Node) -> Node {
        Node::new(NodeKind::Add, vec![a, b]).unwrap()
    }

    /// int y = x; if (GT(x, 2)) { y = ADD(y, 10); } return y;
    fn sample() -> (Program, Arc<Variable>, Arc<Variable>) {
        let x = Variable::new("x", DataType::Integer);
        let y = Variable::new("y", DataType::Integer);
        let program = Program::new(
            vec![x.clone()],
            Block::new(vec![
                Statement::Declaration {
                    variable: y.clone(),
                    value: Node::variable(&x),
                },
                Statement::If {
                    condition: Node::new(NodeKind::GreaterThan, vec![Node::variable(&x), int(2)]).unwrap(),
                    body: Block::new(vec![Statement::Assignment {
                        variable: y.clone(),
                        value: add(Node::variable(&y), int(10)),
                    }]),
                },
                Statement::Return(Node::variable(&y)),
            ]),
        );
        (program, x, y)
    }

    #[test]
    fn test_execute_is_local_to_each_call() {
        use rayon::prelude::*;

        let (program, x, y) = sample();
        let outputs: Vec<Value> = (0..500)
            .into_par_iter()
            .map(|i| program.execute(&[Value::Integer(i)]).unwrap())
            .collect();
        for (i, output) in outputs.into_iter().enumerate() {
            let i = i as i64;
            let expected = if i > 2 { i + 10 } else { i };
            assert_eq!(output, Value::Integer(expected));
        }
        assert_eq!(x.value(), None);
        assert_eq!(y.value(), None);
    }

    #[test]
    fn test_execute() {
        let (program, _, _) = sample();
        assert_eq!(program.execute(&[Value::Integer(1)]).unwrap(), Value::Integer(1));
        assert_eq!(program.execute(&[Value::Integer(5)]).unwrap(), Value::Integer(15));
        assert!(matches!(program.execute(&[]), Err(EpochError::Evaluation(_))));
        assert!(matches!(
            program.execute(&[Value::Boolean(true)]),
            Err(EpochError::Type(_))
        ));
    }

    #[test]
    fn test_loop_is_bounded() {
        let n = Variable::new("n", DataType::Integer);
        let program = Program::new(
            vec![],
            Block::new(vec![
                Statement::Declaration { variable: n.clone(), value: int(0) },
                Statement::Loop {
                    iterations: int(1_000_000),
                    body: Block::new(vec![Statement::Assignment {
                        variable: n.clone(),
                        value: add(Node::variable(&n), int(1)),
                    }]),
                },
                Statement::Return(Node::variable(&n)),
            ]),
        )
        .with_max_loop_iterations(50);
        assert_eq!(program.execute(&[]).unwrap(), Value::Integer(50));
    }

    #[test]
    fn test_no_return_yields_void() {
        let program = Program::new(vec![], Block::default());
        assert_eq!(program.execute(&[]).unwrap(), Value::Void);
    }

    #[test]
    fn test_paths_and_references() {
        let (program, x, y) = sample();
        assert_eq!(
            program.statement_paths(),
            vec![vec![0], vec![1], vec![1, 0], vec![2]]
        );
        assert_eq!(program.length(), 4);
        assert!(matches!(program.statement_at(&[1, 0]), Some(Statement::Assignment { .. })));
        assert!(program.statement_at(&[0, 0]).is_none());

        // y: assignment target, ADD operand, return value
        assert_eq!(program.references(&y), 3);
        // x: declaration value, condition
        assert_eq!(program.references(&x), 2);
        // Same name, different variable
        assert_eq!(program.references(&Variable::new("y", DataType::Integer)), 0);
    }

    #[test]
    fn test_remove_and_insert() {
        let (mut program, _, _) = sample();
        let removed = program.remove(&[1, 0]).unwrap();
        assert!(matches!(removed, Statement::Assignment { .. }));
        assert_eq!(program.length(), 3);
        program.insert(&[1, 0], removed.clone()).unwrap();
        assert_eq!(program.statement_at(&[1, 0]), Some(&removed));
        assert!(matches!(program.remove(&[7]), Err(EpochError::Index(_))));
        assert!(matches!(program.insert(&[0, 0], removed), Err(EpochError::Index(_))));
    }

    #[test]
    fn test_well_typed_and_display() {
        let (program, _, _) = sample();
        assert!(program.is_well_typed());
        assert_eq!(
            program.to_string(),
            "Integer y = x;\nif (GT(x, 2)) {\n    y = ADD(y, 10);\n}\nreturn y;\n"
        );

        let flag = Variable::new("flag", DataType::Boolean);
        let bad = Program::new(
            vec![],
            Block::new(vec![Statement::Declaration { variable: flag, value: int(1) }]),
        );
        assert!(!bad.is_well_typed());
    }
}
