//! Data types and runtime values of expression trees.
//!
//! Return types are resolved statically from child types alone. The lattice
//! is deliberately small: equal types are compatible, `Double` accepts
//! `Integer`, `Object` accepts everything, anything else is incompatible.

use std::fmt;

use crate::error::{EpochError, Result};

/// The return type of a node.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Boolean,
    Integer,
    Double,
    Void,
    Object,
}

impl DataType {
    /// Every data type, in bit order of [`TypeSet`].
    pub const ALL: [DataType; 5] = [
        DataType::Boolean,
        DataType::Integer,
        DataType::Double,
        DataType::Void,
        DataType::Object,
    ];

    /// Whether arithmetic operators accept this type.
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Integer | DataType::Double)
    }

    /// Whether a value of type `other` may stand where `self` is expected.
    pub fn is_assignable_from(self, other: DataType) -> bool {
        self == other
            || self == DataType::Object
            || (self == DataType::Double && other == DataType::Integer)
    }

    /// The narrowest type both `a` and `b` are assignable to, if any.
    pub fn common_super(a: DataType, b: DataType) -> Option<DataType> {
        if a.is_assignable_from(b) {
            Some(a)
        } else if b.is_assignable_from(a) {
            Some(b)
        } else {
            None
        }
    }

    /// Result type of an arithmetic operator: `Integer` when every input is an
    /// integer, `Double` when the inputs mix, `None` for non-numeric inputs.
    pub fn numeric_result(inputs: &[DataType]) -> Option<DataType> {
        if inputs.is_empty() || !inputs.iter().all(|t| t.is_numeric()) {
            return None;
        }
        if inputs.iter().all(|t| *t == DataType::Integer) {
            Some(DataType::Integer)
        } else {
            Some(DataType::Double)
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "Boolean",
            DataType::Integer => "Integer",
            DataType::Double => "Double",
            DataType::Void => "Void",
            DataType::Object => "Object",
        };
        f.write_str(name)
    }
}

/// A compact set of data types, used by the generation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TypeSet(u8);

impl TypeSet {
    pub fn empty() -> Self {
        Self(0)
    }

    fn bit(data_type: DataType) -> u8 {
        1 << (data_type as u8)
    }

    pub fn insert(&mut self, data_type: DataType) {
        self.0 |= Self::bit(data_type);
    }

    pub fn contains(&self, data_type: DataType) -> bool {
        self.0 & Self::bit(data_type) != 0
    }

    /// Types in either set.
    pub fn union(self, other: TypeSet) -> TypeSet {
        TypeSet(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Members in [`DataType::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = DataType> + '_ {
        DataType::ALL.into_iter().filter(|t| self.contains(*t))
    }
}

impl FromIterator<DataType> for TypeSet {
    fn from_iter<T: IntoIterator<Item = DataType>>(iter: T) -> Self {
        let mut set = TypeSet::empty();
        iter.into_iter().for_each(|t| set.insert(t));
        set
    }
}

/// A value produced by evaluating a node.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Void,
}

impl Value {
    /// The runtime type of the value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Boolean(_) => DataType::Boolean,
            Value::Integer(_) => DataType::Integer,
            Value::Double(_) => DataType::Double,
            Value::Void => DataType::Void,
        }
    }

    /// Converts an `Integer` into a `Double` when `target` is `Double`, so a
    /// value always carries the representation its static type promises.
    /// Every other value is returned unchanged.
    pub fn widen_to(self, target: DataType) -> Value {
        match (self, target) {
            (Value::Integer(i), DataType::Double) => Value::Double(i as f64),
            (value, _) => value,
        }
    }

    /// The Boolean inside, or an evaluation error for any other variant.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(EpochError::Evaluation(format!(
                "expected a Boolean, got {}",
                other.data_type()
            ))),
        }
    }

    /// The numeric value as a double, integers included.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Integer(i) => Ok(*i as f64),
            Value::Double(d) => Ok(*d),
            other => Err(EpochError::Evaluation(format!(
                "expected a number, got {}",
                other.data_type()
            ))),
        }
    }

    /// The Integer inside; doubles are not truncated.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Integer(i) => Ok(*i),
            other => Err(EpochError::Evaluation(format!(
                "expected an Integer, got {}",
                other.data_type()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{:?}", d),
            Value::Void => f.write_str("void"),
        }
    }
}
