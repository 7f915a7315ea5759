//! INSERT statement builder.

use super::QueryBuilder;
use super::base::BuilderBase;
use super::macros::impl_common_methods;
use super::select::Select;
use super::writer::{Built, SqlWriter};
use crate::error::{DmlError, DmlResult};
use crate::ident::Ident;
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum DupValue {
    Values,
    Value(Value),
    Placeholder,
    Expr(String),
}

/// One `ON DUPLICATE KEY UPDATE` assignment.
#[derive(Debug, Clone)]
pub struct DupKey {
    column: String,
    value: DupValue,
}

impl DupKey {
    /// `col=VALUES(col)`
    pub fn values(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: DupValue::Values,
        }
    }

    /// `col=<literal>`
    pub fn value(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: DupValue::Value(value.into()),
        }
    }

    /// `col=?`
    pub fn placeholder(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: DupValue::Placeholder,
        }
    }

    /// `col=<raw expression>`
    pub fn expr(column: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: DupValue::Expr(raw.into()),
        }
    }
}

/// INSERT statement builder.
///
/// Values are always bound through placeholders. Rows added with
/// [`Insert::add_values`] travel with the statement; otherwise the runner
/// supplies them at execution time, either as arguments or from records.
///
/// ```ignore
/// let ins = Insert::new("tableX").add_columns(["columnA", "columnB"]).build_values();
/// assert_eq!(ins.to_string(), "INSERT INTO `tableX` (`columnA`,`columnB`) VALUES (?,?)");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Insert {
    pub(crate) base: BuilderBase,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    row_count: usize,
    record_placeholders: usize,
    ignore: bool,
    on_duplicate: Vec<DupKey>,
    from_select: Option<Box<Select>>,
}

impl_common_methods!(Insert);

impl Insert {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            base: BuilderBase::new(Ident::new(table)),
            row_count: 1,
            ..Self::default()
        }
    }

    pub fn add_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base.touch();
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Add one row of statement-owned values.
    pub fn add_values<T: Into<Value>>(mut self, row: impl IntoIterator<Item = T>) -> Self {
        self.base.touch();
        self.rows.push(row.into_iter().map(Into::into).collect());
        self
    }

    /// Render placeholders for a single row of values.
    pub fn build_values(self) -> Self {
        let rows = self.row_count.max(1);
        self.set_row_count(rows)
    }

    /// Number of placeholder rows rendered when no values were added.
    pub fn set_row_count(mut self, rows: usize) -> Self {
        self.base.touch();
        if rows == 0 {
            self.base
                .fail(DmlError::out_of_range("INSERT row count must be at least 1"));
        }
        self.row_count = rows;
        self
    }

    /// Placeholders per row when no column list is given.
    pub fn set_record_placeholders(mut self, n: usize) -> Self {
        self.base.touch();
        self.record_placeholders = n;
        self
    }

    /// `INSERT IGNORE`
    pub fn ignore(mut self) -> Self {
        self.base.touch();
        self.ignore = true;
        self
    }

    pub fn on_duplicate_key(mut self, keys: impl IntoIterator<Item = DupKey>) -> Self {
        self.base.touch();
        self.on_duplicate.extend(keys);
        self
    }

    /// `ON DUPLICATE KEY UPDATE col=VALUES(col)` for every inserted column.
    pub fn on_duplicate_keys_all(mut self) -> Self {
        self.base.touch();
        let keys: Vec<DupKey> = self.columns.iter().map(DupKey::values).collect();
        self.on_duplicate.extend(keys);
        self
    }

    /// `INSERT INTO t (..) SELECT ..`
    pub fn from_select(mut self, select: Select) -> Self {
        self.base.touch();
        self.from_select = Some(Box::new(select));
        self
    }

    fn compact_clauses(&mut self) {
        self.columns = Vec::new();
        self.rows = Vec::new();
        self.on_duplicate = Vec::new();
        self.from_select = None;
    }

    fn column_at(&self, i: usize) -> Option<&str> {
        self.columns.get(i).map(String::as_str)
    }

    fn write_values(&self, w: &mut SqlWriter, rows: usize) -> DmlResult<()> {
        w.push_str(" VALUES ");
        if !self.rows.is_empty() {
            let width = if self.columns.is_empty() {
                self.rows[0].len()
            } else {
                self.columns.len()
            };
            for (r, row) in self.rows.iter().enumerate() {
                if row.len() != width || width == 0 {
                    return Err(DmlError::not_valid(format!(
                        "INSERT row {r} has {} values, expected {width}",
                        row.len()
                    )));
                }
                if r > 0 {
                    w.push(',');
                }
                w.push('(');
                for (i, value) in row.iter().enumerate() {
                    if i > 0 {
                        w.push(',');
                    }
                    w.arg(value.clone(), self.column_at(i));
                }
                w.push(')');
            }
            return Ok(());
        }

        let width = if self.columns.is_empty() {
            self.record_placeholders
        } else {
            self.columns.len()
        };
        if width == 0 {
            return Err(DmlError::empty(format!(
                "INSERT into `{}` has no columns",
                self.base.table.name
            )));
        }
        for r in 0..rows {
            if r > 0 {
                w.push(',');
            }
            w.push('(');
            for i in 0..width {
                if i > 0 {
                    w.push(',');
                }
                w.placeholder(self.column_at(i));
            }
            w.push(')');
        }
        Ok(())
    }

    fn write_on_duplicate(&self, w: &mut SqlWriter) -> DmlResult<()> {
        if self.on_duplicate.is_empty() {
            return Ok(());
        }
        w.push_str(" ON DUPLICATE KEY UPDATE ");
        for (i, key) in self.on_duplicate.iter().enumerate() {
            if i > 0 {
                w.push_str(", ");
            }
            w.name(&key.column);
            w.push('=');
            match &key.value {
                DupValue::Values => {
                    w.push_str("VALUES(");
                    w.name(&key.column);
                    w.push(')');
                }
                DupValue::Value(v) => w.literal(v)?,
                DupValue::Placeholder => w.placeholder(Some(&key.column)),
                DupValue::Expr(raw) => w.raw(raw, Some(&key.column)),
            }
        }
        Ok(())
    }

    fn render(&self, rows: usize) -> DmlResult<Built> {
        if self.base.table.is_empty() {
            return Err(DmlError::empty("INSERT without table"));
        }
        let mut w = self.base.writer();
        w.push_str(if self.ignore {
            "INSERT IGNORE INTO "
        } else {
            "INSERT INTO "
        });
        w.name(&self.base.table.name);
        if !self.columns.is_empty() {
            w.push_str(" (");
            w.name_list(&self.columns);
            w.push(')');
        }
        match &self.from_select {
            Some(select) => {
                let built = select.build()?;
                w.push(' ');
                w.append(&built);
            }
            None => self.write_values(&mut w, rows)?,
        }
        self.write_on_duplicate(&mut w)?;
        Ok(w.finish())
    }
}

impl QueryBuilder for Insert {
    fn is_build_cached(&self) -> bool {
        self.is_cached()
    }

    fn build(&self) -> DmlResult<Arc<Built>> {
        self.base
            .cached(&self.base.cache_key, || self.render(self.row_count))
    }

    /// Re-keys the build cache per row count so each variant is rendered once.
    fn build_for_rows(&self, rows: usize) -> DmlResult<Arc<Built>> {
        if rows == 0 {
            return Err(DmlError::out_of_range("INSERT row count must be at least 1"));
        }
        if !self.rows.is_empty() || self.from_select.is_some() || rows == self.row_count {
            return self.build();
        }
        let key = format!("{}\u{0}rows={rows}", self.base.cache_key);
        self.base.cached(&key, || self.render(rows))
    }

    fn table_name(&self) -> &str {
        &self.base.table.name
    }
}
