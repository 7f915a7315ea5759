//! Backtick quoting of SQL identifiers.
//!
//! This module provides [`Ident`] (a table or column name with an optional
//! alias) and the free functions every builder uses to quote names.
//!
//! - A dotted name `db.table` is quoted part by part: `` `db`.`table` ``
//! - Embedded backticks are escaped by doubling them
//! - `*` and `qualifier.*` are never quoted
//! - In unsafe mode, names that look like expressions (`COUNT(*)`, `a + 1`)
//!   are written verbatim
//!
//! # Example
//! ```ignore
//! use mydml::ident::{quote, quote_as};
//!
//! assert_eq!(quote("catalog.entity_id"), "`catalog`.`entity_id`");
//! assert_eq!(quote_as("sales_order", "so"), "`sales_order` AS `so`");
//! ```

/// Quote a single identifier part, doubling embedded backticks.
pub(crate) fn write_quoted_part(out: &mut String, part: &str) {
    out.push('`');
    for ch in part.chars() {
        if ch == '`' {
            out.push_str("``");
        } else {
            out.push(ch);
        }
    }
    out.push('`');
}

/// Whether a name contains characters that make it an SQL expression rather
/// than a plain (optionally qualified) identifier.
pub(crate) fn looks_like_expression(name: &str) -> bool {
    let body = name.strip_suffix(".*").unwrap_or(name);
    body.chars().any(|c| {
        matches!(
            c,
            '(' | ')' | ' ' | '+' | '-' | '/' | '*' | '\'' | '"' | ',' | '=' | '<' | '>' | '!'
        )
    })
}

/// Write a possibly qualified name.
///
/// Splits on the first `.` only; anything after it is the column or table
/// part, so `a.b.c` becomes `` `a`.`b.c` ``.
pub(crate) fn write_name(out: &mut String, name: &str, is_unsafe: bool) {
    if name == "*" {
        out.push('*');
        return;
    }
    if is_unsafe && looks_like_expression(name) {
        out.push_str(name);
        return;
    }
    match name.split_once('.') {
        Some((qualifier, "*")) => {
            write_quoted_part(out, qualifier);
            out.push_str(".*");
        }
        Some((qualifier, rest)) if !qualifier.is_empty() && !rest.is_empty() => {
            write_quoted_part(out, qualifier);
            out.push('.');
            write_quoted_part(out, rest);
        }
        _ => write_quoted_part(out, name),
    }
}

/// Write `name AS alias`, or just the name when `alias` is empty.
pub(crate) fn write_name_as(out: &mut String, name: &str, alias: Option<&str>, is_unsafe: bool) {
    write_name(out, name, is_unsafe);
    if let Some(alias) = alias.filter(|a| !a.is_empty()) {
        out.push_str(" AS ");
        write_quoted_part(out, alias);
    }
}

/// Quote a possibly qualified identifier.
pub fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    write_quoted(&mut out, name);
    out
}

/// Append a quoted, possibly qualified identifier to `out`.
pub fn write_quoted(out: &mut String, name: &str) {
    write_name(out, name, false);
}

/// Quote an identifier followed by `AS` and the quoted alias.
pub fn quote_as(name: &str, alias: &str) -> String {
    let mut out = String::with_capacity(name.len() + alias.len() + 8);
    write_name_as(&mut out, name, Some(alias), false);
    out
}

/// A table or column reference with an optional alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ident {
    /// Name, optionally qualified as `qualifier.name`.
    pub name: String,
    /// At most one alias.
    pub alias: Option<String>,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(name: impl Into<String>, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self {
            name: name.into(),
            alias: (!alias.is_empty()).then_some(alias),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// The name other clauses use to refer to this reference: the alias if set.
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Render the reference as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + 8);
        self.write_sql(&mut out, false);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String, is_unsafe: bool) {
        write_name_as(out, &self.name, self.alias.as_deref(), is_unsafe);
    }
}

impl From<&str> for Ident {
    fn from(name: &str) -> Self {
        Ident::new(name)
    }
}

impl From<String> for Ident {
    fn from(name: String) -> Self {
        Ident::new(name)
    }
}
