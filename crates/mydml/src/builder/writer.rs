use crate::error::DmlResult;
use crate::ident;
use crate::interpolate::{self, Placeholder};
use crate::value::Value;

/// A rendered statement: SQL text, the placeholders found in it and any
/// arguments the builder itself owns (INSERT row values).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Built {
    pub(crate) sql: String,
    pub(crate) placeholders: Vec<Placeholder>,
    pub(crate) args: Vec<Value>,
}

impl Built {
    /// Wrap hand-written SQL, locating its placeholders by scanning.
    pub fn raw(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let placeholders = interpolate::scan_placeholders(&sql);
        Self {
            sql,
            placeholders,
            args: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Arguments owned by the statement, bound before any runtime argument.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Column names of the placeholders, in order; `None` where unknown.
    pub fn qualified_columns(&self) -> Vec<Option<&str>> {
        self.placeholders
            .iter()
            .map(|p| p.column.as_deref())
            .collect()
    }
}

/// Text buffer that records placeholder positions as it goes.
#[derive(Debug, Default)]
pub(crate) struct SqlWriter {
    sql: String,
    placeholders: Vec<Placeholder>,
    args: Vec<Value>,
    is_unsafe: bool,
}

impl SqlWriter {
    pub(crate) fn new(is_unsafe: bool) -> Self {
        Self {
            sql: String::with_capacity(128),
            placeholders: Vec::new(),
            args: Vec::new(),
            is_unsafe,
        }
    }

    pub(crate) fn push_str(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    pub(crate) fn push(&mut self, c: char) {
        self.sql.push(c);
    }

    pub(crate) fn name(&mut self, name: &str) {
        ident::write_name(&mut self.sql, name, self.is_unsafe);
    }

    /// Quote a plain identifier even in unsafe mode (aliases, CTE names).
    pub(crate) fn quoted(&mut self, name: &str) {
        ident::write_quoted_part(&mut self.sql, name);
    }

    pub(crate) fn name_as(&mut self, name: &str, alias: Option<&str>) {
        ident::write_name_as(&mut self.sql, name, alias, self.is_unsafe);
    }

    pub(crate) fn name_list(&mut self, names: &[String]) {
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                self.sql.push(',');
            }
            self.name(name);
        }
    }

    pub(crate) fn placeholder(&mut self, column: Option<&str>) {
        self.placeholders
            .push(Placeholder::scalar(self.sql.len(), column.map(str::to_string)));
        self.sql.push('?');
    }

    pub(crate) fn placeholders(&mut self, n: usize, column: Option<&str>) {
        for i in 0..n {
            if i > 0 {
                self.sql.push(',');
            }
            self.placeholder(column);
        }
    }

    /// Write one `(?,?)` group standing for a whole tuple list.
    pub(crate) fn tuple_placeholder(&mut self, columns: usize) {
        let pos = self.sql.len();
        self.sql.push('(');
        interpolate::write_placeholders(&mut self.sql, columns);
        self.sql.push(')');
        self.placeholders.push(Placeholder {
            pos,
            len: self.sql.len() - pos,
            column: None,
            tuple: columns,
        });
    }

    pub(crate) fn literal(&mut self, value: &Value) -> DmlResult<()> {
        interpolate::write_literal(&mut self.sql, value)
    }

    /// Write a bound argument owned by the statement.
    pub(crate) fn arg(&mut self, value: Value, column: Option<&str>) {
        self.placeholder(column);
        self.args.push(value);
    }

    /// Write a raw SQL fragment, recording the placeholders it contains.
    pub(crate) fn raw(&mut self, raw: &str, column: Option<&str>) {
        let offset = self.sql.len();
        for mut slot in interpolate::scan_placeholders(raw) {
            slot.pos += offset;
            slot.column = column.map(str::to_string);
            self.placeholders.push(slot);
        }
        self.sql.push_str(raw);
    }

    /// Append another rendered statement, shifting its placeholders.
    pub(crate) fn append(&mut self, built: &Built) {
        let offset = self.sql.len();
        self.sql.push_str(&built.sql);
        self.placeholders
            .extend(built.placeholders.iter().cloned().map(|mut p| {
                p.pos += offset;
                p
            }));
        self.args.extend(built.args.iter().cloned());
    }

    pub(crate) fn finish(self) -> Built {
        Built {
            sql: self.sql,
            placeholders: self.placeholders,
            args: self.args,
        }
    }
}
