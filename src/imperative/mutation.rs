//! # Statement mutations
//!
//! - [`DeletionMutation`] removes one statement. Returns are never removed,
//!   and a declaration is removable only while nothing else uses its variable.
//! - [`InsertionMutation`] inserts one synthesized statement at a random
//!   insertion point. Every position of every block is a point, except those
//!   after a `Return`. New expressions may only read the parameters and the
//!   variables declared before the point in an enclosing block.

use std::sync::Arc;

use tracing::debug;

use crate::error::{EpochError, Result};
use crate::imperative::program::{Block, Program, Statement};
use crate::operator::{Mutated, Mutation};
use crate::population::GrowthMethod;
use crate::rng::RandomNumberGenerator;
use crate::tree::generator::TreeGenerator;
use crate::tree::node::Node;
use crate::tree::syntax::Syntax;
use crate::tree::types::DataType;
use crate::tree::variable::Variable;

/// The statement a [`DeletionMutation`] removed and where it was.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementDeletion {
    pub path: Vec<usize>,
    pub removed: Statement,
}

/// Deletes one statement that can go without breaking the program.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeletionMutation;

impl DeletionMutation {
    /// Paths of the statements that may be removed from `program`.
    pub fn candidates(&self, program: &Program) -> Vec<Vec<usize>> {
        program
            .statement_paths()
            .into_iter()
            .filter(|path| match program.statement_at(path) {
                Some(Statement::Return(_)) | None => false,
                Some(Statement::Declaration { variable, .. }) => program.references(variable) == 0,
                Some(_) => true,
            })
            .collect()
    }
}

impl Mutation<Program> for DeletionMutation {
    type Report = StatementDeletion;

    /// `Ok(None)` when no statement is removable.
    fn mutate(
        &self,
        parent: &Program,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Option<Mutated<Program, StatementDeletion>>> {
        let candidates = self.candidates(parent);
        let Some(path) = rng.choose(&candidates) else {
            debug!("deletion cancelled, no removable statement");
            return Ok(None);
        };

        let mut child = parent.clone();
        let removed = child.remove(path)?;
        debug!(?path, "statement deleted");
        Ok(Some(Mutated {
            child,
            report: StatementDeletion {
                path: path.clone(),
                removed,
            },
        }))
    }
}

/// A position a statement may be inserted at, with the variables in scope
/// there.
#[derive(Debug, Clone)]
pub struct InsertionPoint {
    /// Path the inserted statement will have.
    pub path: Vec<usize>,
    pub scope: Vec<Arc<Variable>>,
}

/// Every insertion point of `program`, pre-order.
pub fn insertion_points(program: &Program) -> Vec<InsertionPoint> {
    let mut points = Vec::new();
    collect_points(
        program.body(),
        &mut Vec::new(),
        program.parameters().to_vec(),
        &mut points,
    );
    points
}

fn collect_points(
    block: &Block,
    prefix: &mut Vec<usize>,
    mut scope: Vec<Arc<Variable>>,
    points: &mut Vec<InsertionPoint>,
) {
    for (index, statement) in block.statements().iter().enumerate() {
        prefix.push(index);
        points.push(InsertionPoint {
            path: prefix.clone(),
            scope: scope.clone(),
        });
        if statement.is_return() {
            prefix.pop();
            return;
        }
        match statement {
            Statement::Declaration { variable, .. } => scope.push(Arc::clone(variable)),
            Statement::If { body, .. } | Statement::Loop { body, .. } => {
                collect_points(body, prefix, scope.clone(), points)
            }
            _ => {}
        }
        prefix.pop();
    }
    prefix.push(block.len());
    points.push(InsertionPoint {
        path: prefix.clone(),
        scope,
    });
    prefix.pop();
}

/// The statement an [`InsertionMutation`] synthesized and where it went.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementInsertion {
    pub path: Vec<usize>,
    pub inserted: Statement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    Declaration,
    Assignment,
    If,
    Loop,
}

/// Inserts one freshly synthesized statement at a random insertion point.
#[derive(Debug, Clone)]
pub struct InsertionMutation {
    syntax: Arc<Syntax>,
    max_depth: usize,
    declaration_types: Vec<DataType>,
}

impl InsertionMutation {
    /// `syntax` supplies the operators and constants of new expressions,
    /// which are grown to at most `max_depth`. New declarations take one of
    /// `declaration_types`.
    ///
    /// ## Errors
    ///
    /// A configuration error if `declaration_types` is empty.
    pub fn new(syntax: Arc<Syntax>, max_depth: usize, declaration_types: Vec<DataType>) -> Result<Self> {
        if declaration_types.is_empty() {
            return Err(EpochError::Configuration(
                "at least one declaration type is required".to_string(),
            ));
        }
        Ok(Self {
            syntax,
            max_depth,
            declaration_types,
        })
    }

    fn synthesize(
        &self,
        program: &Program,
        scope: &[Arc<Variable>],
        rng: &mut RandomNumberGenerator,
    ) -> Result<Option<Statement>> {
        let generator = TreeGenerator::new(
            Arc::new(self.syntax.with_variables(scope)),
            self.max_depth,
        );
        let reachable = |t: DataType| generator.can_generate(GrowthMethod::Grow, t, self.max_depth);

        let declarable: Vec<DataType> = self
            .declaration_types
            .iter()
            .copied()
            .filter(|t| reachable(*t))
            .collect();
        let assignable: Vec<&Arc<Variable>> = scope
            .iter()
            .filter(|v| !program.parameters().iter().any(|p| Arc::ptr_eq(p, v)))
            .filter(|v| reachable(v.data_type()))
            .collect();

        let mut kinds = Vec::new();
        if !declarable.is_empty() {
            kinds.push(StatementKind::Declaration);
        }
        if !assignable.is_empty() {
            kinds.push(StatementKind::Assignment);
            if reachable(DataType::Boolean) {
                kinds.push(StatementKind::If);
            }
            if reachable(DataType::Integer) {
                kinds.push(StatementKind::Loop);
            }
        }
        let Some(kind) = rng.choose(&kinds).copied() else {
            return Ok(None);
        };

        let grow = |t: DataType, rng: &mut RandomNumberGenerator| -> Result<Node> {
            generator.generate(GrowthMethod::Grow, t, self.max_depth, rng)
        };
        let assignment = |rng: &mut RandomNumberGenerator| -> Result<Statement> {
            let variable = rng.choose(&assignable).copied().map(Arc::clone).ok_or_else(|| {
                EpochError::Generation("no assignable variable in scope".to_string())
            })?;
            let value = generator.generate(GrowthMethod::Grow, variable.data_type(), self.max_depth, rng)?;
            Ok(Statement::Assignment { variable, value })
        };

        let statement = match kind {
            StatementKind::Declaration => {
                let data_type = *rng.choose(&declarable).ok_or_else(|| {
                    EpochError::Generation("no declarable type".to_string())
                })?;
                let variable = Variable::new(fresh_name(program), data_type);
                Statement::Declaration {
                    variable,
                    value: grow(data_type, rng)?,
                }
            }
            StatementKind::Assignment => assignment(rng)?,
            StatementKind::If => Statement::If {
                condition: grow(DataType::Boolean, rng)?,
                body: Block::new(vec![assignment(rng)?]),
            },
            StatementKind::Loop => Statement::Loop {
                iterations: grow(DataType::Integer, rng)?,
                body: Block::new(vec![assignment(rng)?]),
            },
        };
        Ok(Some(statement))
    }
}

/// The first `v{n}` not already naming a parameter or declared variable.
fn fresh_name(program: &Program) -> String {
    let mut taken: Vec<&str> = program.parameters().iter().map(|p| p.name()).collect();
    for path in program.statement_paths() {
        if let Some(Statement::Declaration { variable, .. }) = program.statement_at(&path) {
            taken.push(variable.name());
        }
    }
    (0..)
        .map(|n| format!("v{}", n))
        .find(|name| !taken.contains(&name.as_str()))
        .unwrap_or_default()
}

impl Mutation<Program> for InsertionMutation {
    type Report = StatementInsertion;

    /// `Ok(None)` when the syntax cannot build any statement at the chosen
    /// point.
    fn mutate(
        &self,
        parent: &Program,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Option<Mutated<Program, StatementInsertion>>> {
        let points = insertion_points(parent);
        let Some(point) = rng.choose(&points) else {
            return Ok(None);
        };
        let Some(inserted) = self.synthesize(parent, &point.scope, rng)? else {
            debug!(path = ?point.path, "insertion cancelled, nothing can be built in scope");
            return Ok(None);
        };

        let mut child = parent.clone();
        child.insert(&point.path, inserted.clone())?;
        debug!(path = ?point.path, candidates = points.len(), "statement inserted");
        Ok(Some(Mutated {
            child,
            report: StatementInsertion {
                path: point.path.clone(),
                inserted,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::NodeKind;
    use crate::tree::types::Value;

    fn int(i: i64) -> Node {
        Node::literal(Value::Integer(i))
    }

    /// int y = x; if (GT(x, 2)) { int z = 1; } return y;
    fn sample() -> (Program, Arc<Variable>, Arc<Variable>) {
        let x = Variable::new("x", DataType::Integer);
        let y = Variable::new("y", DataType::Integer);
        let z = Variable::new("z", DataType::Integer);
        let program = Program::new(
            vec![x.clone()],
            Block::new(vec![
                Statement::Declaration {
                    variable: y.clone(),
                    value: Node::variable(&x),
                },
                Statement::If {
                    condition: Node::new(NodeKind::GreaterThan, vec![Node::variable(&x), int(2)]).unwrap(),
                    body: Block::new(vec![Statement::Declaration {
                        variable: z,
                        value: int(1),
                    }]),
                },
                Statement::Return(Node::variable(&y)),
            ]),
        );
        (program, x, y)
    }

    fn syntax() -> Arc<Syntax> {
        Arc::new(
            Syntax::new(vec![
                NodeKind::Add,
                NodeKind::GreaterThan,
                NodeKind::Literal(Value::Integer(1)),
                NodeKind::Literal(Value::Integer(2)),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_deletion_candidates() {
        let (program, _, _) = sample();
        // y is returned, so only the If and the unused z declaration qualify
        assert_eq!(DeletionMutation.candidates(&program), vec![vec![1], vec![1, 0]]);
    }

    #[test]
    fn test_deletion_never_removes_return() {
        let (program, _, _) = sample();
        let mut rng = RandomNumberGenerator::from_seed(61);
        for _ in 0..20 {
            let mutated = DeletionMutation.mutate(&program, &mut rng).unwrap().unwrap();
            assert!(mutated.child.length() < program.length());
            assert!(mutated.child.statement_paths().iter().any(|p| {
                matches!(mutated.child.statement_at(p), Some(Statement::Return(_)))
            }));
        }
    }

    #[test]
    fn test_deletion_cancelled_on_return_only() {
        let program = Program::new(vec![], Block::new(vec![Statement::Return(int(1))]));
        let mut rng = RandomNumberGenerator::from_seed(62);
        assert!(DeletionMutation.mutate(&program, &mut rng).unwrap().is_none());
    }

    #[test]
    fn test_insertion_points_and_scope() {
        let (program, x, y) = sample();
        let points = insertion_points(&program);
        let paths: Vec<Vec<usize>> = points.iter().map(|p| p.path.clone()).collect();
        // Nothing after the return
        assert_eq!(paths, vec![vec![0], vec![1], vec![1, 0], vec![1, 1], vec![2]]);

        let names = |point: &InsertionPoint| -> Vec<String> {
            point.scope.iter().map(|v| v.name().to_string()).collect()
        };
        assert_eq!(names(&points[0]), vec!["x"]);
        assert_eq!(names(&points[2]), vec!["x", "y"]);
        assert_eq!(names(&points[3]), vec!["x", "y", "z"]);
        // z is local to the If body
        assert_eq!(names(&points[4]), vec!["x", "y"]);
        assert!(Arc::ptr_eq(&points[4].scope[0], &x));
        assert!(Arc::ptr_eq(&points[4].scope[1], &y));
    }

    #[test]
    fn test_insertion_on_empty_program() {
        let program = Program::new(vec![], Block::default());
        let points = insertion_points(&program);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].path, vec![0]);

        let mutation = InsertionMutation::new(syntax(), 2, vec![DataType::Integer]).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(63);
        let mutated = mutation.mutate(&program, &mut rng).unwrap().unwrap();
        // Nothing to assign yet, so the only option is a declaration
        assert!(matches!(
            mutated.report.inserted,
            Statement::Declaration { ref variable, .. } if variable.name() == "v0"
        ));
        assert!(mutated.child.is_well_typed());
    }

    #[test]
    fn test_insertion_keeps_programs_well_typed_and_runnable() {
        let (program, _, _) = sample();
        let mut program = program.with_max_loop_iterations(3);
        let mutation = InsertionMutation::new(syntax(), 2, vec![DataType::Integer, DataType::Boolean]).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(64);
        for _ in 0..20 {
            let before = program.length();
            let mutated = mutation.mutate(&program, &mut rng).unwrap().unwrap();
            assert!(mutated.child.length() > before);
            assert!(mutated.child.is_well_typed());
            assert!(mutated.child.execute(&[Value::Integer(4)]).is_ok());
            program = mutated.child;
        }
    }

    #[test]
    fn test_insertion_requires_declaration_types() {
        assert!(InsertionMutation::new(syntax(), 2, vec![]).is_err());
    }
}
