//! Placeholder binding, list expansion and literal interpolation.
//!
//! Statements are rendered with `?` placeholders. Before execution the runner
//! pairs every placeholder with one argument:
//!
//! - scalar arguments stay `?` (or become literals when interpolating)
//! - list arguments expand to `?,?,?` inside existing parentheses, or to
//!   `(?,?,?)` when the placeholder is bare. Only the neighbouring characters
//!   decide, so a list bound to `FUNC(?)` becomes the argument list
//!   `FUNC(?,?,?)`; write `FUNC((?))` for a single row-constructor argument.
//! - tuple placeholders (`(?,?)` for a two-column tuple) take one list argument
//!   and expand to one group per row
//!
//! The placeholder count must equal the argument count; nothing is ever
//! truncated or padded.
//!
//! # Example
//! ```ignore
//! use mydml::{interpolate, Value};
//!
//! let sql = interpolate("SELECT * FROM `t` WHERE `id` IN ? AND `name` = ?", &[
//!     Value::list([1, 2, 3]),
//!     Value::from("it's"),
//! ])?;
//! assert_eq!(sql, "SELECT * FROM `t` WHERE `id` IN (1,2,3) AND `name` = 'it\\'s'");
//! ```

use crate::error::{DmlError, DmlResult};
use crate::value::Value;
use chrono::Timelike;

/// A placeholder recorded while rendering a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Byte offset of the placeholder text in the rendered SQL.
    pub pos: usize,
    /// Byte length of the placeholder text: 1 for `?`, longer for tuple groups.
    pub len: usize,
    /// Column the placeholder binds, when known.
    pub column: Option<String>,
    /// Number of columns of a tuple placeholder, 0 for a scalar one.
    pub tuple: usize,
}

impl Placeholder {
    pub(crate) fn scalar(pos: usize, column: Option<String>) -> Self {
        Self {
            pos,
            len: 1,
            column,
            tuple: 0,
        }
    }

    pub(crate) fn is_tuple(&self) -> bool {
        self.tuple > 0
    }
}

/// Write `n` comma separated placeholders.
pub fn write_placeholders(out: &mut String, n: usize) {
    for i in 0..n {
        if i > 0 {
            out.push(',');
        }
        out.push('?');
    }
}

/// Write `rows` parenthesized groups of `cols` placeholders: `(?,?,?),(?,?,?)`.
pub fn write_tuple_placeholders(out: &mut String, rows: usize, cols: usize) {
    for row in 0..rows {
        if row > 0 {
            out.push(',');
        }
        out.push('(');
        write_placeholders(out, cols);
        out.push(')');
    }
}

fn write_escaped_str(out: &mut String, s: &str) {
    out.reserve(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

/// Render a value as an SQL literal.
pub fn write_literal(out: &mut String, value: &Value) -> DmlResult<()> {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Int(v) => out.push_str(&v.to_string()),
        Value::Uint(v) => out.push_str(&v.to_string()),
        Value::Float(v) => {
            if !v.is_finite() {
                return Err(DmlError::not_valid(format!(
                    "float argument {v} has no SQL literal"
                )));
            }
            out.push_str(&v.to_string());
        }
        Value::Str(s) => write_escaped_str(out, s),
        Value::Bool(b) => out.push(if *b { '1' } else { '0' }),
        Value::Time(t) => {
            let text = if t.nanosecond() == 0 {
                t.format("%Y-%m-%d %H:%M:%S").to_string()
            } else {
                t.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
            };
            out.push('\'');
            out.push_str(&text);
            out.push('\'');
        }
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => write_escaped_str(out, s),
            Err(_) => {
                out.push_str("X'");
                out.push_str(&hex::encode_upper(bytes));
                out.push('\'');
            }
        },
        Value::Json(v) => write_escaped_str(out, &v.to_string()),
        Value::List(items) => {
            if items.is_empty() {
                return Err(DmlError::not_valid("empty list argument"));
            }
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                if item.is_list() {
                    return Err(DmlError::not_supported("nested list argument"));
                }
                write_literal(out, item)?;
            }
            out.push(')');
        }
    }
    Ok(())
}

fn skip_until(bytes: &[u8], mut i: usize, end: u8, backslash_escapes: bool) -> usize {
    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
            continue;
        }
        if b == end {
            // Doubled delimiter is an escaped delimiter.
            if bytes.get(i + 1) == Some(&end) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Find the `?` placeholders of hand-written SQL.
///
/// String literals, quoted identifiers and comments are skipped.
pub fn scan_placeholders(sql: &str) -> Vec<Placeholder> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'?' => {
                found.push(Placeholder::scalar(i, None));
                i += 1;
            }
            b'\'' | b'"' => i = skip_until(bytes, i + 1, bytes[i], true),
            b'`' => i = skip_until(bytes, i + 1, b'`', false),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = match sql[i + 2..].find("*/") {
                    Some(end) => i + 2 + end + 2,
                    None => bytes.len(),
                };
            }
            b'#' => i = skip_line(bytes, i),
            b'-' if bytes.get(i + 1) == Some(&b'-')
                && bytes.get(i + 2).is_none_or(|c| c.is_ascii_whitespace()) =>
            {
                i = skip_line(bytes, i)
            }
            _ => i += 1,
        }
    }
    found
}

fn skip_line(bytes: &[u8], i: usize) -> usize {
    bytes[i..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| i + p + 1)
}

/// `(?)` with only whitespace around the placeholder. A function call such
/// as `COALESCE(?)` counts too.
fn is_parenthesized(sql: &str, slot: &Placeholder) -> bool {
    sql[..slot.pos].trim_end().ends_with('(') && sql[slot.pos + slot.len..].trim_start().starts_with(')')
}

fn write_item(out: &mut String, flat: &mut Vec<Value>, item: Value, interpolate: bool) -> DmlResult<()> {
    if item.is_list() {
        return Err(DmlError::not_supported("nested list argument"));
    }
    if interpolate {
        write_literal(out, &item)
    } else {
        out.push('?');
        flat.push(item);
        Ok(())
    }
}

fn describe(slot: &Placeholder) -> String {
    match &slot.column {
        Some(column) => format!("placeholder for `{column}`"),
        None => format!("placeholder at byte {}", slot.pos),
    }
}

fn write_scalar_slot(
    out: &mut String,
    flat: &mut Vec<Value>,
    sql: &str,
    slot: &Placeholder,
    arg: Value,
    interpolate: bool,
) -> DmlResult<()> {
    let Value::List(items) = arg else {
        return write_item(out, flat, arg, interpolate);
    };
    if items.is_empty() {
        return Err(DmlError::not_valid(format!(
            "empty list argument for {}",
            describe(slot)
        )));
    }
    let wrap = !is_parenthesized(sql, slot);
    if wrap {
        out.push('(');
    }
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_item(out, flat, item, interpolate)?;
    }
    if wrap {
        out.push(')');
    }
    Ok(())
}

fn tuple_rows(slot: &Placeholder, arg: Value) -> DmlResult<Vec<Vec<Value>>> {
    let cols = slot.tuple;
    let Value::List(items) = arg else {
        return Err(DmlError::not_valid(format!(
            "tuple {} expects a list argument, got {}",
            describe(slot),
            arg.kind_name()
        )));
    };
    if items.is_empty() {
        return Err(DmlError::not_valid(format!(
            "empty list argument for tuple {}",
            describe(slot)
        )));
    }
    if items.iter().all(Value::is_list) {
        return items
            .into_iter()
            .map(|item| match item {
                Value::List(row) if row.len() == cols => Ok(row),
                other => Err(DmlError::not_valid(format!(
                    "tuple row has {} values, expected {cols}",
                    other.flat_len()
                ))),
            })
            .collect();
    }
    if items.len() % cols != 0 {
        return Err(DmlError::not_valid(format!(
            "{} tuple values do not divide into rows of {cols}",
            items.len()
        )));
    }
    let mut rows = Vec::with_capacity(items.len() / cols);
    let mut iter = items.into_iter();
    loop {
        let row: Vec<Value> = iter.by_ref().take(cols).collect();
        if row.is_empty() {
            break;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn write_tuple_slot(
    out: &mut String,
    flat: &mut Vec<Value>,
    slot: &Placeholder,
    arg: Value,
    interpolate: bool,
) -> DmlResult<()> {
    for (r, row) in tuple_rows(slot, arg)?.into_iter().enumerate() {
        if r > 0 {
            out.push(',');
        }
        out.push('(');
        for (i, item) in row.into_iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_item(out, flat, item, interpolate)?;
        }
        out.push(')');
    }
    Ok(())
}

/// Pair placeholders with arguments.
///
/// Returns the SQL to execute and the flattened driver arguments (empty when
/// interpolating).
pub(crate) fn bind(
    sql: &str,
    slots: &[Placeholder],
    args: Vec<Value>,
    interpolate: bool,
) -> DmlResult<(String, Vec<Value>)> {
    if slots.len() != args.len() {
        return Err(DmlError::not_valid(format!(
            "{} placeholders but {} arguments",
            slots.len(),
            args.len()
        )));
    }
    let rewrite = interpolate || slots.iter().any(Placeholder::is_tuple) || args.iter().any(Value::is_list);
    if !rewrite {
        return Ok((sql.to_string(), args));
    }

    let flat_len: usize = args.iter().map(Value::flat_len).sum();
    let mut out = String::with_capacity(sql.len() + flat_len * 2);
    let mut flat = Vec::with_capacity(if interpolate { 0 } else { flat_len });
    let mut last = 0;
    for (slot, arg) in slots.iter().zip(args) {
        out.push_str(&sql[last..slot.pos]);
        if slot.is_tuple() {
            write_tuple_slot(&mut out, &mut flat, slot, arg, interpolate)?;
        } else {
            write_scalar_slot(&mut out, &mut flat, sql, slot, arg, interpolate)?;
        }
        last = slot.pos + slot.len;
    }
    out.push_str(&sql[last..]);
    Ok((out, flat))
}

/// Replace every placeholder of `sql` with the literal of its argument.
pub fn interpolate(sql: &str, args: &[Value]) -> DmlResult<String> {
    let slots = scan_placeholders(sql);
    bind(sql, &slots, args.to_vec(), true).map(|(sql, _)| sql)
}

/// Expand list arguments of `sql` into placeholder lists.
///
/// Returns the rewritten SQL and the flattened arguments.
pub fn expand_placeholders(sql: &str, args: &[Value]) -> DmlResult<(String, Vec<Value>)> {
    let slots = scan_placeholders(sql);
    bind(sql, &slots, args.to_vec(), false)
}

/// Expand every `(?)` marker to a list of `counts[i]` placeholders.
///
/// ```ignore
/// let sql = repeat("SELECT * FROM `t` WHERE `id` IN (?) AND `name` IN (?)", &[3, 2])?;
/// assert_eq!(sql, "SELECT * FROM `t` WHERE `id` IN (?,?,?) AND `name` IN (?,?)");
/// ```
pub fn repeat(sql: &str, counts: &[usize]) -> DmlResult<String> {
    let markers: Vec<Placeholder> = scan_placeholders(sql)
        .into_iter()
        .filter(|slot| {
            sql[..slot.pos].ends_with('(') && sql[slot.pos + 1..].starts_with(')')
        })
        .collect();
    if markers.len() != counts.len() {
        return Err(DmlError::mismatch(format!(
            "{} repetition markers but {} counts",
            markers.len(),
            counts.len()
        )));
    }
    if let Some(pos) = counts.iter().position(|&n| n < 1) {
        return Err(DmlError::not_valid(format!(
            "repetition count at position {pos} must be at least 1"
        )));
    }

    let extra: usize = counts.iter().map(|n| (n - 1) * 2).sum();
    let mut out = String::with_capacity(sql.len() + extra);
    let mut last = 0;
    for (slot, &count) in markers.iter().zip(counts) {
        out.push_str(&sql[last..slot.pos]);
        write_placeholders(&mut out, count);
        last = slot.pos + 1;
    }
    out.push_str(&sql[last..]);
    Ok(out)
}

/// Like [`repeat`], but panics on error.
///
/// # Panics
/// Panics when the marker count and `counts` disagree or a count is zero.
pub fn must_repeat(sql: &str, counts: &[usize]) -> String {
    match repeat(sql, counts) {
        Ok(sql) => sql,
        Err(e) => panic!("[mydml] must_repeat: {e}"),
    }
}
