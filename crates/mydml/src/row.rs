//! Driver-neutral result rows and value decoding.

use crate::error::{DmlError, DmlResult};
use crate::value::Value;
use chrono::NaiveDateTime;
use std::sync::Arc;

/// One result row. Column names are shared by all rows of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// # Errors
    /// `NotValid` when the number of values differs from the number of columns.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> DmlResult<Self> {
        if columns.len() != values.len() {
            return Err(DmlError::not_valid(format!(
                "row has {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn shared_columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Decode the value of `column`.
    pub fn try_get<T: FromValue>(&self, column: &str) -> DmlResult<T> {
        let index = self
            .index_of(column)
            .ok_or_else(|| DmlError::not_found(format!("column `{column}` not in result set")))?;
        T::from_value(&self.values[index])
            .map_err(|e| e.context(format!("column `{column}`")))
    }

    /// Decode the value at `index`.
    pub fn try_get_at<T: FromValue>(&self, index: usize) -> DmlResult<T> {
        let value = self.values.get(index).ok_or_else(|| {
            DmlError::not_found(format!(
                "column index {index} out of {} columns",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }
}

/// Conversion from a result [`Value`] into a Rust type.
///
/// MySQL returns many types in text form, so numeric and temporal targets
/// also accept their string representation. `NULL` only decodes into
/// `Option<T>` and [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> DmlResult<Self>;
}

fn unexpected<T>(target: &str, value: &Value) -> DmlResult<T> {
    if value.is_null() {
        return Err(DmlError::not_valid(format!("cannot scan NULL into {target}")));
    }
    Err(DmlError::not_valid(format!(
        "cannot scan {} into {target}",
        value.kind_name()
    )))
}

fn text(value: &Value) -> Option<&str> {
    match value {
        Value::Str(s) => Some(s),
        Value::Bytes(b) => std::str::from_utf8(b).ok(),
        _ => None,
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> DmlResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> DmlResult<Self> {
        match value {
            Value::Int(v) => Ok(*v),
            Value::Uint(v) => i64::try_from(*v)
                .map_err(|_| DmlError::out_of_range(format!("{v} overflows i64"))),
            Value::Bool(b) => Ok(i64::from(*b)),
            other => match text(other).map(|s| s.trim().parse::<i64>()) {
                Some(Ok(v)) => Ok(v),
                _ => unexpected("i64", other),
            },
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> DmlResult<Self> {
        match value {
            Value::Uint(v) => Ok(*v),
            Value::Int(v) => u64::try_from(*v)
                .map_err(|_| DmlError::out_of_range(format!("{v} overflows u64"))),
            Value::Bool(b) => Ok(u64::from(*b)),
            other => match text(other).map(|s| s.trim().parse::<u64>()) {
                Some(Ok(v)) => Ok(v),
                _ => unexpected("u64", other),
            },
        }
    }
}

macro_rules! impl_from_value_narrow {
    ($($ty:ty => $wide:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> DmlResult<Self> {
                    let wide = <$wide>::from_value(value)?;
                    <$ty>::try_from(wide).map_err(|_| {
                        DmlError::out_of_range(format!(
                            "{wide} overflows {}",
                            stringify!($ty)
                        ))
                    })
                }
            }
        )*
    };
}

impl_from_value_narrow!(
    i32 => i64, i16 => i64, i8 => i64,
    u32 => u64, u16 => u64, u8 => u64,
);

impl FromValue for f64 {
    fn from_value(value: &Value) -> DmlResult<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            Value::Uint(v) => Ok(*v as f64),
            other => match text(other).map(|s| s.trim().parse::<f64>()) {
                Some(Ok(v)) => Ok(v),
                _ => unexpected("f64", other),
            },
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> DmlResult<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> DmlResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(v) => Ok(*v != 0),
            Value::Uint(v) => Ok(*v != 0),
            other => match text(other).map(str::trim) {
                Some("1") => Ok(true),
                Some("0") => Ok(false),
                Some(s) if s.eq_ignore_ascii_case("true") => Ok(true),
                Some(s) if s.eq_ignore_ascii_case("false") => Ok(false),
                _ => unexpected("bool", other),
            },
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> DmlResult<Self> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|_| DmlError::not_valid("column bytes are not valid UTF-8")),
            Value::Int(v) => Ok(v.to_string()),
            Value::Uint(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            Value::Time(t) => Ok(t.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Value::Json(j) => Ok(j.to_string()),
            other => unexpected("String", other),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> DmlResult<Self> {
        match value {
            Value::Time(t) => Ok(*t),
            other => {
                let parsed = text(other).and_then(|s| {
                    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S%.f").ok()
                });
                match parsed {
                    Some(t) => Ok(t),
                    None => unexpected("NaiveDateTime", other),
                }
            }
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> DmlResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Str(s) => Ok(s.as_bytes().to_vec()),
            other => unexpected("Vec<u8>", other),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> DmlResult<Self> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            other => match text(other).map(serde_json::from_str::<serde_json::Value>) {
                Some(Ok(j)) => Ok(j),
                Some(Err(e)) => Err(DmlError::not_valid(format!("invalid JSON column: {e}"))),
                None => unexpected("JSON", other),
            },
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> DmlResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row() -> Row {
        Row::new(
            Arc::from(vec![
                "id".to_string(),
                "sku".to_string(),
                "qty".to_string(),
                "updated_at".to_string(),
                "note".to_string(),
            ]),
            vec![
                Value::Int(7),
                Value::from("SKU-7"),
                Value::from("12.5"),
                Value::from("2024-03-01 10:00:00"),
                Value::Null,
            ],
        )
        .unwrap()
    }

    #[test]
    fn typed_access_by_name() {
        let row = row();
        assert_eq!(row.try_get::<i64>("id").unwrap(), 7);
        assert_eq!(row.try_get::<u8>("id").unwrap(), 7);
        assert_eq!(row.try_get::<String>("sku").unwrap(), "SKU-7");
        assert_eq!(row.try_get::<f64>("qty").unwrap(), 12.5);
        assert_eq!(
            row.try_get::<NaiveDateTime>("updated_at").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );
        assert_eq!(row.try_get::<Option<String>>("note").unwrap(), None);
    }

    #[test]
    fn null_into_non_null_target_fails() {
        let err = row().try_get::<String>("note").unwrap_err();
        assert!(err.is_not_valid());
        assert!(err.to_string().contains("column `note`"));
    }

    #[test]
    fn unknown_column_is_not_found() {
        assert!(row().try_get::<i64>("missing").unwrap_err().is_not_found());
        assert!(row().try_get_at::<i64>(9).unwrap_err().is_not_found());
    }

    #[test]
    fn narrowing_checks_range() {
        let err = i8::from_value(&Value::Int(300)).unwrap_err();
        assert!(err.is_out_of_range());
        assert!(u64::from_value(&Value::Int(-1)).unwrap_err().is_out_of_range());
    }

    #[test]
    fn row_length_must_match_columns() {
        let err = Row::new(Arc::from(vec!["a".to_string()]), vec![]).unwrap_err();
        assert!(err.is_not_valid());
    }
}
