//! Typed cell values and their fixed-width byte encoding.

use crate::error::TreeError;
use crate::types::ByteOrder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a table field or array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    /// NUL padded byte string of a fixed width
    FixedString(usize),
}

impl ScalarType {
    /// Encoded width in bytes
    pub fn width(&self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::UInt64 | ScalarType::Float64 => 8,
            ScalarType::FixedString(n) => *n,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ScalarType::Int8
                | ScalarType::UInt8
                | ScalarType::Int16
                | ScalarType::UInt16
                | ScalarType::Int32
                | ScalarType::UInt32
                | ScalarType::Int64
                | ScalarType::UInt64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarType::Float32 | ScalarType::Float64)
    }

    /// The zero value used when a field declares no default
    pub fn zero(&self) -> Value {
        match self {
            ScalarType::Bool => Value::Bool(false),
            ScalarType::Int8 => Value::Int8(0),
            ScalarType::UInt8 => Value::UInt8(0),
            ScalarType::Int16 => Value::Int16(0),
            ScalarType::UInt16 => Value::UInt16(0),
            ScalarType::Int32 => Value::Int32(0),
            ScalarType::UInt32 => Value::UInt32(0),
            ScalarType::Int64 => Value::Int64(0),
            ScalarType::UInt64 => Value::UInt64(0),
            ScalarType::Float32 => Value::Float32(0.0),
            ScalarType::Float64 => Value::Float64(0.0),
            ScalarType::FixedString(_) => Value::String(String::new()),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::FixedString(n) => write!(f, "String({})", n),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A single cell value.
///
/// `Vector` holds the elements of a fixed-length vector field; all other
/// variants are scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Vector(Vec<Value>),
}

impl Value {
    /// Short variant name used in error messages
    pub fn kind_name(&self) -> String {
        match self {
            Value::String(s) => format!("String({})", s.len()),
            Value::Vector(items) => format!("Vector({})", items.len()),
            Value::Bool(_) => "Bool".to_string(),
            Value::Int8(_) => "Int8".to_string(),
            Value::UInt8(_) => "UInt8".to_string(),
            Value::Int16(_) => "Int16".to_string(),
            Value::UInt16(_) => "UInt16".to_string(),
            Value::Int32(_) => "Int32".to_string(),
            Value::UInt32(_) => "UInt32".to_string(),
            Value::Int64(_) => "Int64".to_string(),
            Value::UInt64(_) => "UInt64".to_string(),
            Value::Float32(_) => "Float32".to_string(),
            Value::Float64(_) => "Float64".to_string(),
        }
    }

    /// Scalar type this value naturally has, if it is a scalar
    pub fn natural_type(&self) -> Option<ScalarType> {
        Some(match self {
            Value::Bool(_) => ScalarType::Bool,
            Value::Int8(_) => ScalarType::Int8,
            Value::UInt8(_) => ScalarType::UInt8,
            Value::Int16(_) => ScalarType::Int16,
            Value::UInt16(_) => ScalarType::UInt16,
            Value::Int32(_) => ScalarType::Int32,
            Value::UInt32(_) => ScalarType::UInt32,
            Value::Int64(_) => ScalarType::Int64,
            Value::UInt64(_) => ScalarType::UInt64,
            Value::Float32(_) => ScalarType::Float32,
            Value::Float64(_) => ScalarType::Float64,
            Value::String(s) => ScalarType::FixedString(s.len().max(1)),
            Value::Vector(_) => return None,
        })
    }

    fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Int8(v) => Some(*v as i128),
            Value::UInt8(v) => Some(*v as i128),
            Value::Int16(v) => Some(*v as i128),
            Value::UInt16(v) => Some(*v as i128),
            Value::Int32(v) => Some(*v as i128),
            Value::UInt32(v) => Some(*v as i128),
            Value::Int64(v) => Some(*v as i128),
            Value::UInt64(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Integer view of an integer value
    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(|v| i64::try_from(v).ok())
    }

    /// Float view of an integer or float value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            other => other.as_integer().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[Value]> {
        match self {
            Value::Vector(items) => Some(items),
            _ => None,
        }
    }

    /// Convert a scalar into `ty`, or `None` when the conversion would lose
    /// the value (out of range integer, over-long string, wrong variant).
    pub fn coerce_scalar(&self, ty: ScalarType) -> Option<Value> {
        match ty {
            ScalarType::Bool => self.as_bool().map(Value::Bool),
            ScalarType::Int8 => self.int_into::<i8>().map(Value::Int8),
            ScalarType::UInt8 => self.int_into::<u8>().map(Value::UInt8),
            ScalarType::Int16 => self.int_into::<i16>().map(Value::Int16),
            ScalarType::UInt16 => self.int_into::<u16>().map(Value::UInt16),
            ScalarType::Int32 => self.int_into::<i32>().map(Value::Int32),
            ScalarType::UInt32 => self.int_into::<u32>().map(Value::UInt32),
            ScalarType::Int64 => self.int_into::<i64>().map(Value::Int64),
            ScalarType::UInt64 => self.int_into::<u64>().map(Value::UInt64),
            ScalarType::Float32 => match self {
                Value::Float32(v) => Some(Value::Float32(*v)),
                Value::Float64(v) => Some(Value::Float32(*v as f32)),
                other => other.as_integer().map(|v| Value::Float32(v as f32)),
            },
            ScalarType::Float64 => self.as_f64().map(Value::Float64),
            ScalarType::FixedString(n) => match self {
                Value::String(s) if s.len() <= n => Some(Value::String(s.clone())),
                _ => None,
            },
        }
    }

    fn int_into<T: TryFrom<i128>>(&self) -> Option<T> {
        self.as_integer().and_then(|v| T::try_from(v).ok())
    }
}

macro_rules! put_bytes {
    ($out:expr, $v:expr, $order:expr) => {
        match $order {
            ByteOrder::Little => $out.extend_from_slice(&$v.to_le_bytes()),
            ByteOrder::Big => $out.extend_from_slice(&$v.to_be_bytes()),
        }
    };
}

macro_rules! take_bytes {
    ($ty:ty, $bytes:expr, $order:expr) => {{
        let mut buf = [0u8; std::mem::size_of::<$ty>()];
        buf.copy_from_slice($bytes);
        match $order {
            ByteOrder::Little => <$ty>::from_le_bytes(buf),
            ByteOrder::Big => <$ty>::from_be_bytes(buf),
        }
    }};
}

/// Append the encoding of an already-coerced scalar to `out`
pub(crate) fn encode_scalar(
    value: &Value,
    ty: ScalarType,
    order: ByteOrder,
    out: &mut Vec<u8>,
) -> Result<(), TreeError> {
    match (ty, value) {
        (ScalarType::Bool, Value::Bool(b)) => out.push(u8::from(*b)),
        (ScalarType::Int8, Value::Int8(v)) => put_bytes!(out, v, order),
        (ScalarType::UInt8, Value::UInt8(v)) => out.push(*v),
        (ScalarType::Int16, Value::Int16(v)) => put_bytes!(out, v, order),
        (ScalarType::UInt16, Value::UInt16(v)) => put_bytes!(out, v, order),
        (ScalarType::Int32, Value::Int32(v)) => put_bytes!(out, v, order),
        (ScalarType::UInt32, Value::UInt32(v)) => put_bytes!(out, v, order),
        (ScalarType::Int64, Value::Int64(v)) => put_bytes!(out, v, order),
        (ScalarType::UInt64, Value::UInt64(v)) => put_bytes!(out, v, order),
        (ScalarType::Float32, Value::Float32(v)) => put_bytes!(out, v, order),
        (ScalarType::Float64, Value::Float64(v)) => put_bytes!(out, v, order),
        (ScalarType::FixedString(n), Value::String(s)) if s.len() <= n => {
            out.extend_from_slice(s.as_bytes());
            out.resize(out.len() + (n - s.len()), 0);
        }
        (ty, other) => return Err(TreeError::mismatch("<encode>", ty, other.kind_name())),
    }
    Ok(())
}

/// Decode one scalar; `bytes` must be exactly `ty.width()` long
pub(crate) fn decode_scalar(ty: ScalarType, order: ByteOrder, bytes: &[u8]) -> Value {
    match ty {
        ScalarType::Bool => Value::Bool(bytes[0] != 0),
        ScalarType::Int8 => Value::Int8(take_bytes!(i8, bytes, order)),
        ScalarType::UInt8 => Value::UInt8(bytes[0]),
        ScalarType::Int16 => Value::Int16(take_bytes!(i16, bytes, order)),
        ScalarType::UInt16 => Value::UInt16(take_bytes!(u16, bytes, order)),
        ScalarType::Int32 => Value::Int32(take_bytes!(i32, bytes, order)),
        ScalarType::UInt32 => Value::UInt32(take_bytes!(u32, bytes, order)),
        ScalarType::Int64 => Value::Int64(take_bytes!(i64, bytes, order)),
        ScalarType::UInt64 => Value::UInt64(take_bytes!(u64, bytes, order)),
        ScalarType::Float32 => Value::Float32(take_bytes!(f32, bytes, order)),
        ScalarType::Float64 => Value::Float64(take_bytes!(f64, bytes, order)),
        ScalarType::FixedString(_) => {
            let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            Value::String(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int8(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{:?}", v),
            Value::Float64(v) => write!(f, "{:?}", v),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Vector(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int8(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UInt8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UInt16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Vector(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Value::Vector(items.into_iter().map(Into::into).collect())
    }
}
