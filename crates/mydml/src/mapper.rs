//! Column mapping between result rows / statement arguments and caller types.
//!
//! A type takes part in loading and record-driven execution by implementing
//! [`ColumnMapper`]. The runner hands it a [`ColumnMap`] in one of four modes:
//!
//! - [`ColumnMapMode::EntityReadAll`]: emit every field in declaration order
//! - [`ColumnMapMode::EntityReadSet`]: iterate the requested columns with
//!   [`ColumnMap::next`] and emit the matching field
//! - [`ColumnMapMode::Scan`]: iterate the columns of one result row and store
//!   each into the matching field
//! - [`ColumnMapMode::CollectionReadSet`]: emit one list per requested column,
//!   used to fill `IN (?)` placeholders from a collection
//!
//! The typed accessors ([`ColumnMap::int64`], [`ColumnMap::string`], ..) read
//! or write the field depending on the mode, so one mapping body serves all
//! entity modes.
//!
//! # Example
//! ```ignore
//! #[derive(Default)]
//! struct ConfigRow {
//!     config_id: i64,
//!     path: String,
//!     value: Option<String>,
//! }
//!
//! impl ColumnMapper for ConfigRow {
//!     fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
//!         if cm.mode() == ColumnMapMode::EntityReadAll {
//!             cm.int64(&mut self.config_id)?
//!                 .string(&mut self.path)?
//!                 .null_string(&mut self.value)?;
//!             return Ok(());
//!         }
//!         while cm.next() {
//!             match cm.column() {
//!                 "config_id" => cm.int64(&mut self.config_id)?,
//!                 "path" => cm.string(&mut self.path)?,
//!                 "value" => cm.null_string(&mut self.value)?,
//!                 other => return Err(DmlError::not_found(format!("column `{other}`"))),
//!             };
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::error::{DmlError, DmlResult};
use crate::row::{FromValue, Row};
use crate::value::Value;
use chrono::NaiveDateTime;
use std::fmt;

/// What the runner wants from a [`ColumnMapper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnMapMode {
    /// Emit all fields in declaration order.
    EntityReadAll,
    /// Emit the fields named by the requested columns.
    EntityReadSet,
    /// Store one result row.
    Scan,
    /// Emit one list of values per requested column.
    CollectionReadSet,
}

impl fmt::Display for ColumnMapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnMapMode::EntityReadAll => "EntityReadAll",
            ColumnMapMode::EntityReadSet => "EntityReadSet",
            ColumnMapMode::Scan => "Scan",
            ColumnMapMode::CollectionReadSet => "CollectionReadSet",
        };
        f.write_str(name)
    }
}

/// Callback contract for records and collections.
pub trait ColumnMapper {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()>;
}

/// Cursor handed to [`ColumnMapper::map_columns`].
#[derive(Debug)]
pub struct ColumnMap<'a> {
    mode: ColumnMapMode,
    columns: &'a [String],
    row: Option<&'a Row>,
    current: Option<usize>,
    position: usize,
    count: u64,
    args: Vec<Value>,
}

/// Unqualified part of `alias.column`.
pub(crate) fn unqualified(column: &str) -> &str {
    column.rsplit_once('.').map_or(column, |(_, name)| name)
}

macro_rules! field_accessors {
    ($($(#[$meta:meta])* $name:ident: $ty:ty;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self, field: &mut $ty) -> DmlResult<&mut Self> {
                self.field(field)
            }
        )*
    };
}

impl<'a> ColumnMap<'a> {
    /// Map one result row; `count` is the number of rows scanned before it.
    pub fn scan(row: &'a Row, count: u64) -> Self {
        Self::with_mode(ColumnMapMode::Scan, row.columns(), Some(row), count)
    }

    /// Collect all fields of an entity.
    pub fn read_all() -> Self {
        Self::with_mode(ColumnMapMode::EntityReadAll, &[], None, 0)
    }

    /// Collect the fields named by `columns`.
    pub fn read_set(columns: &'a [String]) -> Self {
        Self::with_mode(ColumnMapMode::EntityReadSet, columns, None, 0)
    }

    /// Collect one list per column from a collection.
    pub fn collection(columns: &'a [String]) -> Self {
        Self::with_mode(ColumnMapMode::CollectionReadSet, columns, None, 0)
    }

    fn with_mode(
        mode: ColumnMapMode,
        columns: &'a [String],
        row: Option<&'a Row>,
        count: u64,
    ) -> Self {
        Self {
            mode,
            columns,
            row,
            current: None,
            position: 0,
            count,
            args: Vec::new(),
        }
    }

    pub fn mode(&self) -> ColumnMapMode {
        self.mode
    }

    /// Rows scanned before the current one; 0 on the first row.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Advance to the next column; false once all columns were visited.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        let next = self.current.map_or(0, |i| i + 1);
        if next < self.columns.len() {
            self.current = Some(next);
            true
        } else {
            self.current = Some(self.columns.len());
            false
        }
    }

    /// Unqualified name of the current column, empty before the first
    /// [`ColumnMap::next`].
    pub fn column(&self) -> &'a str {
        let columns: &'a [String] = self.columns;
        match self.current.and_then(|i| columns.get(i)) {
            Some(name) => unqualified(name),
            None => "",
        }
    }

    /// Requested or scanned columns.
    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    /// Error for a mode a mapper does not handle.
    pub fn unsupported_mode(&self) -> DmlError {
        DmlError::not_supported(format!("column map mode {} is not handled", self.mode))
    }

    /// Arguments collected so far.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub(crate) fn into_args(self) -> Vec<Value> {
        self.args
    }

    fn scan_index(&mut self) -> usize {
        match self.current {
            Some(i) => i,
            None => {
                let i = self.position;
                self.position += 1;
                i
            }
        }
    }

    fn field<T>(&mut self, field: &mut T) -> DmlResult<&mut Self>
    where
        T: FromValue + Clone + Into<Value>,
    {
        match self.mode {
            ColumnMapMode::Scan => {
                let index = self.scan_index();
                let Some(row) = self.row else {
                    return Err(DmlError::not_valid("scan without a row"));
                };
                let value = row.get(index).ok_or_else(|| {
                    DmlError::not_found(format!(
                        "column index {index} out of {} columns",
                        row.len()
                    ))
                })?;
                *field = T::from_value(value).map_err(|e| {
                    e.context(format!(
                        "column `{}`",
                        self.columns.get(index).map_or("", String::as_str)
                    ))
                })?;
            }
            ColumnMapMode::EntityReadAll | ColumnMapMode::EntityReadSet => {
                self.args.push(field.clone().into());
            }
            ColumnMapMode::CollectionReadSet => return Err(self.unsupported_mode()),
        }
        Ok(self)
    }

    field_accessors! {
        int64: i64;
        int32: i32;
        int16: i16;
        int8: i8;
        uint64: u64;
        uint32: u32;
        uint16: u16;
        uint8: u8;
        float64: f64;
        float32: f32;
        string: String;
        bool: bool;
        time: NaiveDateTime;
        bytes: Vec<u8>;
        json: serde_json::Value;
        null_int64: Option<i64>;
        null_int32: Option<i32>;
        null_uint64: Option<u64>;
        null_float64: Option<f64>;
        null_string: Option<String>;
        null_bool: Option<bool>;
        null_time: Option<NaiveDateTime>;
        /// Any value, without conversion.
        value: Value;
    }

    fn push_list(&mut self, values: Vec<Value>) -> DmlResult<&mut Self> {
        if self.mode != ColumnMapMode::CollectionReadSet {
            return Err(self.unsupported_mode());
        }
        self.args.push(Value::List(values));
        Ok(self)
    }

    /// Emit the current column of every collection item.
    pub fn int64s(&mut self, values: &[i64]) -> DmlResult<&mut Self> {
        self.push_list(values.iter().copied().map(Value::Int).collect())
    }

    pub fn uint64s(&mut self, values: &[u64]) -> DmlResult<&mut Self> {
        self.push_list(values.iter().copied().map(Value::Uint).collect())
    }

    pub fn strings<S: AsRef<str>>(&mut self, values: &[S]) -> DmlResult<&mut Self> {
        self.push_list(
            values
                .iter()
                .map(|s| Value::Str(s.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn values(&mut self, values: Vec<Value>) -> DmlResult<&mut Self> {
        self.push_list(values)
    }
}

/// Collections load row by row and emit per-column lists of their items.
///
/// A scan into a collection clears it on the first row, so loading twice
/// into the same vector replaces its content.
impl<T: ColumnMapper + Default> ColumnMapper for Vec<T> {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
        match cm.mode() {
            ColumnMapMode::Scan => {
                if cm.count() == 0 {
                    self.clear();
                }
                let mut item = T::default();
                item.map_columns(cm)?;
                self.push(item);
                Ok(())
            }
            ColumnMapMode::CollectionReadSet => {
                let columns = cm.columns();
                for column in columns {
                    let single = std::slice::from_ref(column);
                    let mut values = Vec::with_capacity(self.len());
                    for item in self.iter_mut() {
                        let mut item_map = ColumnMap::read_set(single);
                        item.map_columns(&mut item_map)?;
                        values.extend(item_map.into_args());
                    }
                    cm.values(values)?;
                }
                Ok(())
            }
            ColumnMapMode::EntityReadAll | ColumnMapMode::EntityReadSet => {
                Err(cm.unsupported_mode())
            }
        }
    }
}

/// Adapter mapping a scan onto a closure, e.g. for ad-hoc loads.
pub struct ScanFn<F>(F);

impl<F> ScanFn<F>
where
    F: FnMut(&mut ColumnMap<'_>) -> DmlResult<()>,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ColumnMapper for ScanFn<F>
where
    F: FnMut(&mut ColumnMap<'_>) -> DmlResult<()>,
{
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
        if cm.mode() != ColumnMapMode::Scan {
            return Err(cm.unsupported_mode());
        }
        (self.0)(cm)
    }
}

#[cfg(test)]
mod tests;
