//! The closed value vocabulary shared by rule arguments and outcome payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A generated argument or an observed payload.
///
/// Values are totally ordered and serializable so that steps and outcomes can
/// be compared by equality and written into failure records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Text(String),
}

/// The kind of a [`Value`], used to declare rule argument types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Unit,
    Bool,
    Int,
    Text,
}

impl Value {
    /// The kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unit => ValueKind::Unit,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Text(_) => ValueKind::Text,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Well-founded complexity measure.
    ///
    /// Every accepted argument shrink must strictly lower this number. Integers
    /// rank by magnitude with negatives just above positives of the same
    /// magnitude; text ranks by length first, then by code points.
    pub fn complexity(&self) -> u128 {
        match self {
            Value::Unit => 0,
            Value::Bool(b) => u128::from(*b),
            Value::Int(n) => u128::from(n.unsigned_abs()) * 2 + u128::from(*n < 0),
            Value::Text(s) => {
                let length = s.chars().count() as u128;
                let codes: u128 = s.chars().map(|c| u128::from(u32::from(c))).sum();
                length * (u128::from(u32::from(char::MAX)) + 1) * 2 + codes
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Unit => "unit",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Conversion from a [`Value`] into a concrete type failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("expected a {expected} value, found {found}")]
    KindMismatch { expected: ValueKind, found: ValueKind },
    #[error("integer {value} does not fit in {target}")]
    OutOfRange { value: i64, target: &'static str },
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl TryFrom<Value> for bool {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(ValueError::KindMismatch {
                expected: ValueKind::Bool,
                found: other.kind(),
            }),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(ValueError::KindMismatch {
                expected: ValueKind::Text,
                found: other.kind(),
            }),
        }
    }
}

macro_rules! impl_int_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Int(i64::from(n))
                }
            }

            impl TryFrom<Value> for $t {
                type Error = ValueError;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value {
                        Value::Int(n) => <$t>::try_from(n).map_err(|_| ValueError::OutOfRange {
                            value: n,
                            target: stringify!($t),
                        }),
                        other => Err(ValueError::KindMismatch {
                            expected: ValueKind::Int,
                            found: other.kind(),
                        }),
                    }
                }
            }
        )*
    };
}

impl_int_value!(i8, i16, i32, i64, u8, u16, u32);
