//! WHERE / HAVING / ON conditions.
//!
//! A [`Condition`] is a left-hand side (column, column tuple or raw
//! expression), an [`Op`] and an operand. Conditions are chained in a slice and
//! rendered each in its own parentheses, joined by `AND` unless the condition
//! was marked with [`Condition::or`]. [`paren_open`] and [`paren_close`] are
//! sentinels for explicit grouping.
//!
//! Literal operands are written into the SQL as escaped literals; use
//! [`Condition::placeholder`] to bind arguments at execution time instead.
//!
//! # Example
//! ```ignore
//! use mydml::condition::{column, columns, paren_close, paren_open};
//!
//! let conds = vec![
//!     column("scope_id").greater().int64(0),
//!     paren_open(),
//!     column("path").like().str("general/%"),
//!     column("path").equal().placeholder().or(),
//!     paren_close(),
//!     columns(["entity_id", "store_id"]).in_().tuples(),
//! ];
//! ```

use crate::builder::Select;
use crate::builder::QueryBuilder;
use crate::builder::writer::SqlWriter;
use crate::error::{DmlError, DmlResult};
use crate::value::Value;
use chrono::NaiveDateTime;

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Op {
    #[default]
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Like,
    NotLike,
    Regexp,
    NotRegexp,
    In,
    NotIn,
    Between,
    NotBetween,
    /// `col = GREATEST(a, b, ..)`
    Greatest,
    /// `col = LEAST(a, b, ..)`
    Least,
    Null,
    NotNull,
    /// Null-safe equality `<=>`.
    SpaceShip,
    Exists,
    NotExists,
}

impl Op {
    fn as_sql(self) -> &'static str {
        match self {
            Op::Equal => " = ",
            Op::NotEqual => " != ",
            Op::Less => " < ",
            Op::Greater => " > ",
            Op::LessOrEqual => " <= ",
            Op::GreaterOrEqual => " >= ",
            Op::Like => " LIKE ",
            Op::NotLike => " NOT LIKE ",
            Op::Regexp => " REGEXP ",
            Op::NotRegexp => " NOT REGEXP ",
            Op::In => " IN ",
            Op::NotIn => " NOT IN ",
            Op::Between => " BETWEEN ",
            Op::NotBetween => " NOT BETWEEN ",
            Op::Greatest => " = GREATEST",
            Op::Least => " = LEAST",
            Op::Null => " IS NULL",
            Op::NotNull => " IS NOT NULL",
            Op::SpaceShip => " <=> ",
            Op::Exists => "EXISTS ",
            Op::NotExists => "NOT EXISTS ",
        }
    }
}

#[derive(Debug, Clone)]
enum Left {
    Column(String),
    Columns(Vec<String>),
    Expr(String),
    Nothing,
    ParenOpen,
    ParenClose,
}

#[derive(Debug, Clone)]
enum Operand {
    None,
    Value(Value),
    Placeholder,
    Placeholders(usize),
    Column(String),
    Sub(Box<Select>),
    Expr(String),
    Tuples,
}

/// A single condition.
#[derive(Debug, Clone)]
pub struct Condition {
    left: Left,
    op: Op,
    operand: Operand,
    or: bool,
}

/// Ordered WHERE / HAVING / ON conditions.
pub type Conditions = Vec<Condition>;

/// Start a condition on a (possibly qualified) column.
pub fn column(name: impl Into<String>) -> Condition {
    Condition::new(Left::Column(name.into()))
}

/// Start a condition on a column tuple, e.g. `(a, b) IN ((?,?),(?,?))`.
pub fn columns<I, S>(names: I) -> Condition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Condition::new(Left::Columns(names.into_iter().map(Into::into).collect()))
}

/// A raw SQL expression used as-is; any `?` in it is a placeholder.
pub fn expr(raw: impl Into<String>) -> Condition {
    Condition::new(Left::Expr(raw.into()))
}

/// `EXISTS (sub-select)`
pub fn exists(select: Select) -> Condition {
    let mut c = Condition::new(Left::Nothing);
    c.op = Op::Exists;
    c.operand = Operand::Sub(Box::new(select));
    c
}

/// `NOT EXISTS (sub-select)`
pub fn not_exists(select: Select) -> Condition {
    let mut c = exists(select);
    c.op = Op::NotExists;
    c
}

/// Opening parenthesis sentinel.
pub fn paren_open() -> Condition {
    Condition::new(Left::ParenOpen)
}

/// Closing parenthesis sentinel.
pub fn paren_close() -> Condition {
    Condition::new(Left::ParenClose)
}

macro_rules! op_setters {
    ($($(#[$doc:meta])* $name:ident => $op:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(mut self) -> Self {
                self.op = Op::$op;
                self
            }
        )*
    };
}

impl Condition {
    fn new(left: Left) -> Self {
        Self {
            left,
            op: Op::Equal,
            operand: Operand::None,
            or: false,
        }
    }

    /// Join this condition to the previous one with `OR` instead of `AND`.
    pub fn or(mut self) -> Self {
        self.or = true;
        self
    }

    pub fn op(mut self, op: Op) -> Self {
        self.op = op;
        self
    }

    op_setters! {
        equal => Equal,
        not_equal => NotEqual,
        less => Less,
        greater => Greater,
        less_or_equal => LessOrEqual,
        greater_or_equal => GreaterOrEqual,
        like => Like,
        not_like => NotLike,
        regexp => Regexp,
        not_regexp => NotRegexp,
        /// `IN`; named with a trailing underscore as `in` is a keyword.
        in_ => In,
        not_in => NotIn,
        between => Between,
        not_between => NotBetween,
        greatest => Greatest,
        least => Least,
        null => Null,
        not_null => NotNull,
        space_ship => SpaceShip,
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.operand = Operand::Value(value.into());
        self
    }

    pub fn values<T: Into<Value>>(self, values: impl IntoIterator<Item = T>) -> Self {
        self.value(Value::list(values))
    }

    pub fn int64(self, v: i64) -> Self {
        self.value(v)
    }

    pub fn int64s(self, v: &[i64]) -> Self {
        self.values(v.iter().copied())
    }

    pub fn uint64(self, v: u64) -> Self {
        self.value(v)
    }

    pub fn uint64s(self, v: &[u64]) -> Self {
        self.values(v.iter().copied())
    }

    pub fn float64(self, v: f64) -> Self {
        self.value(v)
    }

    pub fn float64s(self, v: &[f64]) -> Self {
        self.values(v.iter().copied())
    }

    pub fn str(self, v: impl Into<String>) -> Self {
        self.value(Value::Str(v.into()))
    }

    pub fn strs<S: AsRef<str>>(self, v: &[S]) -> Self {
        self.values(v.iter().map(|s| s.as_ref()))
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

    /// `None` compares against NULL (`IS NULL` for equality).
    pub fn null_int64(self, v: Option<i64>) -> Self {
        self.value(v)
    }

    pub fn null_str(self, v: Option<&str>) -> Self {
        self.value(v)
    }

    pub fn null_float64(self, v: Option<f64>) -> Self {
        self.value(v)
    }

    pub fn null_time(self, v: Option<NaiveDateTime>) -> Self {
        self.value(v)
    }

    /// A single `?` bound at execution time. With `IN` it renders `(?)` and a
    /// list argument expands it.
    pub fn placeholder(mut self) -> Self {
        self.operand = Operand::Placeholder;
        self
    }

    /// `n` placeholders, e.g. for `BETWEEN ? AND ?` or `IN (?,?,?)`.
    pub fn placeholders(mut self, n: usize) -> Self {
        self.operand = Operand::Placeholders(n);
        self
    }

    /// Compare against another column.
    pub fn column(mut self, other: impl Into<String>) -> Self {
        self.operand = Operand::Column(other.into());
        self
    }

    /// Compare against a sub-select.
    pub fn sub(mut self, select: Select) -> Self {
        self.operand = Operand::Sub(Box::new(select));
        self
    }

    /// Compare against a raw SQL expression.
    pub fn expr(mut self, raw: impl Into<String>) -> Self {
        self.operand = Operand::Expr(raw.into());
        self
    }

    /// Tuple placeholder for a column tuple; one list argument expands it to
    /// one `(?,..)` group per row.
    pub fn tuples(mut self) -> Self {
        self.operand = Operand::Tuples;
        self
    }

    fn column_name(&self) -> Option<&str> {
        match &self.left {
            Left::Column(name) => Some(name),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match &self.left {
            Left::Column(name) => format!("condition on `{name}`"),
            Left::Columns(names) => format!("condition on ({})", names.join(",")),
            Left::Expr(raw) => format!("condition `{raw}`"),
            _ => "condition".to_string(),
        }
    }

    fn write(&self, w: &mut SqlWriter) -> DmlResult<()> {
        match &self.left {
            Left::Column(name) => w.name(name),
            Left::Columns(names) => {
                if names.is_empty() {
                    return Err(DmlError::empty("column tuple without columns"));
                }
                w.push('(');
                w.name_list(names);
                w.push(')');
            }
            Left::Expr(raw) => {
                w.raw(raw, None);
                if matches!(self.operand, Operand::None)
                    && !matches!(self.op, Op::Null | Op::NotNull)
                {
                    return Ok(());
                }
            }
            Left::Nothing | Left::ParenOpen | Left::ParenClose => {}
        }

        let column = self.column_name();
        match self.op {
            Op::Null | Op::NotNull => {
                w.push_str(self.op.as_sql());
                Ok(())
            }
            Op::Equal | Op::NotEqual if matches!(self.operand, Operand::Value(Value::Null)) => {
                w.push_str(if self.op == Op::Equal {
                    " IS NULL"
                } else {
                    " IS NOT NULL"
                });
                Ok(())
            }
            Op::In | Op::NotIn => {
                w.push_str(self.op.as_sql());
                self.write_list_operand(w, column)
            }
            Op::Greatest | Op::Least => {
                w.push_str(self.op.as_sql());
                self.write_list_operand(w, column)
            }
            Op::Between | Op::NotBetween => {
                w.push_str(self.op.as_sql());
                self.write_between_operand(w, column)
            }
            Op::Exists | Op::NotExists => {
                let Operand::Sub(select) = &self.operand else {
                    return Err(DmlError::not_valid("EXISTS requires a sub-select"));
                };
                w.push_str(self.op.as_sql());
                write_sub(w, select)
            }
            _ => {
                w.push_str(self.op.as_sql());
                self.write_scalar_operand(w, column)
            }
        }
    }

    fn write_scalar_operand(&self, w: &mut SqlWriter, column: Option<&str>) -> DmlResult<()> {
        match &self.operand {
            Operand::Value(v) => w.literal(v),
            Operand::Placeholder => {
                w.placeholder(column);
                Ok(())
            }
            Operand::Column(other) => {
                w.name(other);
                Ok(())
            }
            Operand::Sub(select) => write_sub(w, select),
            Operand::Expr(raw) => {
                w.raw(raw, column);
                Ok(())
            }
            Operand::Placeholders(_) | Operand::Tuples => Err(DmlError::not_valid(format!(
                "{} uses a list operand with a scalar operator",
                self.describe()
            ))),
            Operand::None => Err(DmlError::not_valid(format!(
                "{} has no operand",
                self.describe()
            ))),
        }
    }

    fn write_list_operand(&self, w: &mut SqlWriter, column: Option<&str>) -> DmlResult<()> {
        match &self.operand {
            Operand::Value(v @ Value::List(_)) => w.literal(v),
            Operand::Value(v) => {
                w.push('(');
                w.literal(v)?;
                w.push(')');
                Ok(())
            }
            Operand::Placeholder => {
                w.push('(');
                w.placeholder(column);
                w.push(')');
                Ok(())
            }
            Operand::Placeholders(n) if *n > 0 => {
                w.push('(');
                w.placeholders(*n, column);
                w.push(')');
                Ok(())
            }
            Operand::Sub(select) => write_sub(w, select),
            Operand::Expr(raw) => {
                w.push('(');
                w.raw(raw, column);
                w.push(')');
                Ok(())
            }
            Operand::Tuples => {
                let Left::Columns(names) = &self.left else {
                    return Err(DmlError::not_valid(
                        "tuple placeholders need a column tuple on the left side",
                    ));
                };
                w.push('(');
                w.tuple_placeholder(names.len());
                w.push(')');
                Ok(())
            }
            Operand::Placeholders(_) | Operand::Column(_) | Operand::None => Err(
                DmlError::not_valid(format!("{} needs a list operand", self.describe())),
            ),
        }
    }

    fn write_between_operand(&self, w: &mut SqlWriter, column: Option<&str>) -> DmlResult<()> {
        match &self.operand {
            Operand::Value(Value::List(items)) if items.len() == 2 => {
                w.literal(&items[0])?;
                w.push_str(" AND ");
                w.literal(&items[1])
            }
            Operand::Placeholders(2) => {
                w.placeholder(column);
                w.push_str(" AND ");
                w.placeholder(column);
                Ok(())
            }
            _ => Err(DmlError::not_valid(format!(
                "{} with BETWEEN requires exactly two operands",
                self.describe()
            ))),
        }
    }
}

fn write_sub(w: &mut SqlWriter, select: &Select) -> DmlResult<()> {
    let built = select.build()?;
    w.push('(');
    w.append(&built);
    w.push(')');
    Ok(())
}

/// Write conditions as `(c1) AND (c2) OR (c3)`, honoring parenthesis sentinels.
pub(crate) fn write_conditions(w: &mut SqlWriter, conditions: &[Condition]) -> DmlResult<()> {
    let mut depth: usize = 0;
    let mut need_join = false;
    for cond in conditions {
        match cond.left {
            Left::ParenOpen => {
                if need_join {
                    w.push_str(if cond.or { " OR " } else { " AND " });
                }
                w.push('(');
                depth += 1;
                need_join = false;
            }
            Left::ParenClose => {
                if depth == 0 {
                    return Err(DmlError::not_valid("unbalanced closing parenthesis"));
                }
                w.push(')');
                depth -= 1;
                need_join = true;
            }
            _ => {
                if need_join {
                    w.push_str(if cond.or { " OR " } else { " AND " });
                }
                w.push('(');
                cond.write(w)?;
                w.push(')');
                need_join = true;
            }
        }
    }
    if depth != 0 {
        return Err(DmlError::not_valid("unbalanced opening parenthesis"));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
