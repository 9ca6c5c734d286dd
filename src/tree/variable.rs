//! Named terminals bound to externally supplied values.
//!
//! A [`Variable`] is shared by every node that reads it through an `Arc`.
//! Node equality and the imperative reference counts compare variables by
//! identity (`Arc::ptr_eq`), never by name.
//!
//! Values reach a variable in one of two ways:
//!
//! - a [`Bindings`] environment passed to [`Node::evaluate_with`]. It is
//!   local to one evaluation, so trees sharing a variable can be evaluated
//!   on several threads at once;
//! - the variable's own slot, set with [`Variable::set_value`]. The slot is
//!   shared by every thread and is read only when the environment has no
//!   binding for the variable.
//!
//! [`Node::evaluate_with`]: crate::tree::Node::evaluate_with

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{EpochError, Result};
use crate::tree::types::{DataType, Value};

/// A typed, named input of an expression tree.
#[derive(Debug)]
pub struct Variable {
    name: String,
    data_type: DataType,
    value: RwLock<Option<Value>>,
}

impl Variable {
    /// Creates an unbound variable.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            data_type,
            value: RwLock::new(None),
        })
    }

    /// Creates a variable already bound to `value`, typed after it.
    pub fn with_value(name: impl Into<String>, value: Value) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            data_type: value.data_type(),
            value: RwLock::new(Some(value)),
        })
    }

    /// The name the variable prints as.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type every bound value is checked against.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The value held in the shared slot, if any.
    pub fn value(&self) -> Option<Value> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stores `value` in the shared slot, widened to the declared type.
    ///
    /// The slot is visible to every thread. Challenges scored in parallel
    /// should bind their inputs through [`Bindings`] instead.
    ///
    /// ## Errors
    ///
    /// `EpochError::Type` if `value` is not assignable to the declared type.
    pub fn set_value(&self, value: Value) -> Result<()> {
        let value = self.check(value)?;
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
        Ok(())
    }

    /// Empties the shared slot.
    pub fn clear(&self) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn check(&self, value: Value) -> Result<Value> {
        if !self.data_type.is_assignable_from(value.data_type()) {
            return Err(EpochError::Type(format!(
                "cannot bind {} value to {} variable '{}'",
                value.data_type(),
                self.data_type,
                self.name
            )));
        }
        Ok(value.widen_to(self.data_type))
    }
}

/// Values for one evaluation, keyed by variable identity.
///
/// ## Example
///
/// ```rust
/// use epochx::tree::{Bindings, DataType, Node, NodeKind, Value, Variable};
///
/// let x = Variable::new("x", DataType::Double);
/// let square = Node::new(NodeKind::Multiply, vec![Node::variable(&x), Node::variable(&x)]).unwrap();
///
/// let mut bindings = Bindings::new();
/// bindings.bind(&x, Value::Integer(3)).unwrap();
/// assert_eq!(square.evaluate_with(&bindings).unwrap(), Value::Double(9.0));
/// assert_eq!(x.value(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: Vec<(Arc<Variable>, Value)>,
}

impl Bindings {
    /// An environment with no bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `value` to `variable`, replacing an earlier binding of the same
    /// variable. Integers bound to a Double variable are widened.
    ///
    /// ## Errors
    ///
    /// `EpochError::Type` if `value` is not assignable to the variable's type.
    pub fn bind(&mut self, variable: &Arc<Variable>, value: Value) -> Result<()> {
        let value = variable.check(value)?;
        match self
            .values
            .iter_mut()
            .find(|(bound, _)| Arc::ptr_eq(bound, variable))
        {
            Some((_, slot)) => *slot = value,
            None => self.values.push((Arc::clone(variable), value)),
        }
        Ok(())
    }

    /// The value bound to `variable` in this environment.
    pub fn get(&self, variable: &Variable) -> Option<&Value> {
        self.values
            .iter()
            .find(|(bound, _)| std::ptr::eq(Arc::as_ptr(bound), variable))
            .map(|(_, value)| value)
    }

    /// Drops every binding.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The variables of a problem, addressed by name for binding.
#[derive(Debug, Clone, Default)]
pub struct VariableSet {
    variables: Vec<Arc<Variable>>,
}

impl VariableSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new unbound variable and returns a handle to it.
    ///
    /// ## Errors
    ///
    /// A configuration error if the name is already declared.
    pub fn declare(&mut self, name: &str, data_type: DataType) -> Result<Arc<Variable>> {
        if self.get(name).is_some() {
            return Err(EpochError::Configuration(format!(
                "variable '{}' declared twice",
                name
            )));
        }
        let variable = Variable::new(name, data_type);
        self.variables.push(Arc::clone(&variable));
        Ok(variable)
    }

    /// The variable declared under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<Variable>> {
        self.variables.iter().find(|v| v.name() == name)
    }

    /// Stores a value in the named variable's shared slot.
    pub fn bind(&self, name: &str, value: Value) -> Result<()> {
        self.lookup(name)?.set_value(value)
    }

    /// Stores several values at once, stopping at the first failure.
    pub fn bind_all<'a, I>(&self, bindings: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        bindings
            .into_iter()
            .try_for_each(|(name, value)| self.bind(name, value))
    }

    /// Builds an evaluation environment from named values, leaving the
    /// shared slots untouched.
    ///
    /// ## Errors
    ///
    /// `EpochError::Evaluation` for an undeclared name, `EpochError::Type`
    /// for a value the variable cannot hold.
    pub fn bindings<'a, I>(&self, values: I) -> Result<Bindings>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut bindings = Bindings::new();
        for (name, value) in values {
            bindings.bind(self.lookup(name)?, value)?;
        }
        Ok(bindings)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Variable>> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn lookup(&self, name: &str) -> Result<&Arc<Variable>> {
        self.get(name)
            .ok_or_else(|| EpochError::Evaluation(format!("no variable named '{}'", name)))
    }
}
