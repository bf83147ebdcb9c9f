//! Runtime values produced by decode and consumed by encode.

use crate::schema::ValueKind;
use std::fmt;

/// A single field value: one variant per [`ValueKind`], or an array of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Char(char),
    F32(f32),
    F64(f64),
    Array(Vec<Value>),
}

impl Value {
    /// Kind of a scalar value; `None` for arrays.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::I8(_) => Some(ValueKind::I8),
            Value::I16(_) => Some(ValueKind::I16),
            Value::I32(_) => Some(ValueKind::I32),
            Value::I64(_) => Some(ValueKind::I64),
            Value::Char(_) => Some(ValueKind::Char),
            Value::F32(_) => Some(ValueKind::F32),
            Value::F64(_) => Some(ValueKind::F64),
            Value::Array(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::I8(x) => Some(*x as i64),
            Value::I16(x) => Some(*x as i64),
            Value::I32(x) => Some(*x as i64),
            Value::I64(x) => Some(*x),
            Value::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(x) => Some(*x as f64),
            Value::F64(x) => Some(*x),
            _ => self.as_i64().map(|i| i as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Parse text as a value of `kind`. Integers accept decimal or `0x` hex.
    pub fn parse_as(kind: ValueKind, text: &str) -> Option<Value> {
        let text = text.trim();
        let int = || -> Option<i64> {
            match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16).ok().map(|u| u as i64),
                None => text.parse().ok(),
            }
        };
        Some(match kind {
            ValueKind::Bool => match text {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return None,
            },
            ValueKind::I8 => Value::I8(int()? as i8),
            ValueKind::I16 => Value::I16(int()? as i16),
            ValueKind::I32 => Value::I32(int()? as i32),
            ValueKind::I64 => Value::I64(int()?),
            ValueKind::Char => {
                let mut chars = text.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                Value::Char(c)
            }
            ValueKind::F32 => Value::F32(text.parse().ok()?),
            ValueKind::F64 => Value::F64(text.parse().ok()?),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::I8(x) => write!(f, "{}", x),
            Value::I16(x) => write!(f, "{}", x),
            Value::I32(x) => write!(f, "{}", x),
            Value::I64(x) => write!(f, "{}", x),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::F32(x) => write!(f, "{}", x),
            Value::F64(x) => write!(f, "{}", x),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(x: $t) -> Self {
                Value::$variant(x)
            }
        })*
    };
}

impl_from!(bool => Bool, i8 => I8, i16 => I16, i32 => I32, i64 => I64, char => Char, f32 => F32, f64 => F64);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}
