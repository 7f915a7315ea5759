//! Arguments bound to placeholders, and values read back from rows.

use crate::error::{DmlError, DmlResult};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

/// A single argument or row value.
///
/// `List` is a slice argument: bound to a single `?` it expands to a
/// parenthesized placeholder list, interpolated it becomes `(a,b,c)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bool(bool),
    Time(NaiveDateTime),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    List(Vec<Value>),
}

impl Value {
    /// Build a string value from raw bytes, rejecting invalid UTF-8.
    pub fn text_from_bytes(bytes: Vec<u8>) -> DmlResult<Self> {
        String::from_utf8(bytes)
            .map(Value::Str)
            .map_err(|e| DmlError::not_valid(format!("argument is not valid UTF-8: {e}")))
    }

    pub fn list<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Number of driver arguments this value occupies once expanded.
    pub fn flat_len(&self) -> usize {
        match self {
            Value::List(items) => items.iter().map(Value::flat_len).sum(),
            _ => 1,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Time(_) => "time",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        match crate::interpolate::write_literal(&mut out, self) {
            Ok(()) => f.write_str(&out),
            Err(e) => write!(f, "[mydml] {e}"),
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_int!(
    i8 => Int, i16 => Int, i32 => Int, i64 => Int,
    u8 => Uint, u16 => Uint, u32 => Uint, u64 => Uint,
    f32 => Float, f64 => Float,
);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Time(v.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Ordered argument list with typed, chainable appenders.
///
/// ```ignore
/// let args = Args::new().int64(3).str("general/locale/code").null();
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.values.push(value.into());
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.push(value);
        self
    }

    pub fn int64(self, v: i64) -> Self {
        self.value(v)
    }

    pub fn int64s(self, v: &[i64]) -> Self {
        self.value(Value::list(v.iter().copied()))
    }

    pub fn uint64(self, v: u64) -> Self {
        self.value(v)
    }

    pub fn uint64s(self, v: &[u64]) -> Self {
        self.value(Value::list(v.iter().copied()))
    }

    pub fn float64(self, v: f64) -> Self {
        self.value(v)
    }

    pub fn str(self, v: impl Into<String>) -> Self {
        self.value(Value::Str(v.into()))
    }

    pub fn strs<S: AsRef<str>>(self, v: &[S]) -> Self {
        self.value(Value::list(v.iter().map(|s| s.as_ref())))
    }

    pub fn bool(self, v: bool) -> Self {
        self.value(v)
    }

    pub fn time(self, v: NaiveDateTime) -> Self {
        self.value(v)
    }

    pub fn bytes(self, v: impl Into<Vec<u8>>) -> Self {
        self.value(Value::Bytes(v.into()))
    }

    pub fn null(self) -> Self {
        self.value(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

impl From<Args> for Vec<Value> {
    fn from(args: Args) -> Self {
        args.values
    }
}

impl FromIterator<Value> for Args {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Args {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = Value::text_from_bytes(vec![0xff, 0xfe]).unwrap_err();
        assert!(err.is_not_valid());
        assert_eq!(
            Value::text_from_bytes(b"ok".to_vec()).unwrap(),
            Value::Str("ok".into())
        );
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7_i32)), Value::Int(7));
    }

    #[test]
    fn args_chain_and_flatten() {
        let args = Args::new().int64(1).int64s(&[2, 3]).str("x").null();
        assert_eq!(args.len(), 4);
        let flat: usize = args.as_slice().iter().map(Value::flat_len).sum();
        assert_eq!(flat, 5);
    }
}
