//! SELECT statement builder.

use super::QueryBuilder;
use super::base::BuilderBase;
use super::macros::{impl_clause_methods, impl_common_methods};
use super::writer::{Built, SqlWriter};
use crate::condition::{self, Condition, Conditions};
use crate::error::{DmlError, DmlResult};
use crate::ident::Ident;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum SelectColumn {
    Name(Ident),
    Expr { sql: String, alias: Option<String> },
    Sub { select: Box<Select>, alias: String },
}

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => " INNER JOIN ",
            JoinKind::Left => " LEFT JOIN ",
            JoinKind::Right => " RIGHT JOIN ",
            JoinKind::Cross => " CROSS JOIN ",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: Ident,
    on: Vec<Condition>,
    using: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LockMode {
    #[default]
    None,
    ForUpdate,
    ShareMode,
}

/// SELECT statement builder.
///
/// ```ignore
/// let sel = Select::new(["columnA"])
///     .from_alias("tableX", "X")
///     .filter(column("columnA").less_or_equal().float64(2.4));
/// assert_eq!(
///     sel.to_string(),
///     "SELECT `columnA` FROM `tableX` AS `X` WHERE (`columnA` <= 2.4)"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Select {
    pub(crate) base: BuilderBase,
    columns: Vec<SelectColumn>,
    derived: Option<Box<Select>>,
    joins: Vec<Join>,
    group_bys: Vec<String>,
    havings: Conditions,
    distinct: bool,
    lock: LockMode,
}

impl_clause_methods!(Select);
impl_common_methods!(Select);

impl Select {
    /// Create a SELECT of `columns`; an empty list selects `*`.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|c| SelectColumn::Name(Ident::new(c)))
                .collect(),
            ..Self::default()
        }
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.base.invalidate();
        self.base.table = Ident::new(table);
        self.derived = None;
        self
    }

    pub fn from_alias(mut self, table: impl Into<String>, alias: impl Into<String>) -> Self {
        self.base.invalidate();
        self.base.table = Ident::with_alias(table, alias);
        self.derived = None;
        self
    }

    /// Select from a derived table: `FROM (SELECT ..) AS alias`.
    pub fn from_sub(mut self, select: Select, alias: impl Into<String>) -> Self {
        self.base.touch();
        self.base.table = Ident::with_alias("", alias);
        self.derived = Some(Box::new(select));
        self
    }

    pub fn add_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base.touch();
        self.columns
            .extend(columns.into_iter().map(|c| SelectColumn::Name(Ident::new(c))));
        self
    }

    /// Add `column AS alias`.
    pub fn add_column_alias(mut self, column: impl Into<String>, alias: impl Into<String>) -> Self {
        self.base.touch();
        self.columns
            .push(SelectColumn::Name(Ident::with_alias(column, alias)));
        self
    }

    /// Add a raw expression column, e.g. `COUNT(*)`, with an optional alias.
    pub fn add_column_expr(mut self, sql: impl Into<String>, alias: Option<&str>) -> Self {
        self.base.touch();
        self.columns.push(SelectColumn::Expr {
            sql: sql.into(),
            alias: alias.map(str::to_string),
        });
        self
    }

    /// Add `(SELECT ..) AS alias` as a column.
    pub fn add_column_sub(mut self, select: Select, alias: impl Into<String>) -> Self {
        self.base.touch();
        self.columns.push(SelectColumn::Sub {
            select: Box::new(select),
            alias: alias.into(),
        });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.base.touch();
        self.distinct = true;
        self
    }

    fn push_join(mut self, kind: JoinKind, table: Ident, on: Vec<Condition>, using: Vec<String>) -> Self {
        self.base.touch();
        self.joins.push(Join {
            kind,
            table,
            on,
            using,
        });
        self
    }

    /// `INNER JOIN table ON (..)`
    pub fn join(self, table: Ident, on: impl IntoIterator<Item = Condition>) -> Self {
        self.push_join(JoinKind::Inner, table, on.into_iter().collect(), Vec::new())
    }

    pub fn left_join(self, table: Ident, on: impl IntoIterator<Item = Condition>) -> Self {
        self.push_join(JoinKind::Left, table, on.into_iter().collect(), Vec::new())
    }

    pub fn right_join(self, table: Ident, on: impl IntoIterator<Item = Condition>) -> Self {
        self.push_join(JoinKind::Right, table, on.into_iter().collect(), Vec::new())
    }

    pub fn cross_join(self, table: Ident) -> Self {
        self.push_join(JoinKind::Cross, table, Vec::new(), Vec::new())
    }

    /// `<kind> JOIN table USING (col, ..)`
    pub fn join_using<I, S>(self, kind: JoinKind, table: Ident, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let using = columns.into_iter().map(Into::into).collect();
        self.push_join(kind, table, Vec::new(), using)
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.base.touch();
        self.group_bys.push(column.into());
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.base.touch();
        self.havings.push(condition);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.base.touch();
        self.base.offset = Some(offset);
        self
    }

    /// LIMIT/OFFSET for a 1-based page number.
    pub fn paginate(self, page: u64, per_page: u64) -> Self {
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        self.limit(per_page).offset(offset)
    }

    pub fn for_update(mut self) -> Self {
        self.base.touch();
        self.lock = LockMode::ForUpdate;
        self
    }

    pub fn lock_in_share_mode(mut self) -> Self {
        self.base.touch();
        self.lock = LockMode::ShareMode;
        self
    }

    /// Apply `f` only when `condition` holds.
    pub fn when(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        if condition { f(self) } else { self }
    }

    /// Apply `f` only when `condition` does not hold.
    pub fn unless(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        self.when(!condition, f)
    }

    /// Turn this statement into `SELECT COUNT(*) AS `counted``, dropping
    /// ORDER BY, LIMIT and OFFSET.
    pub fn count(mut self) -> Self {
        self.base.touch();
        self.columns = vec![SelectColumn::Expr {
            sql: "COUNT(*)".to_string(),
            alias: Some("counted".to_string()),
        }];
        self.base.order_bys.clear();
        self.base.limit = None;
        self.base.offset = None;
        self
    }

    /// Whether an explicit projection was given; otherwise `*` is rendered.
    pub(crate) fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    fn compact_clauses(&mut self) {
        self.columns = Vec::new();
        self.joins = Vec::new();
        self.group_bys = Vec::new();
        self.havings = Vec::new();
        self.derived = None;
    }

    fn write_columns(&self, w: &mut SqlWriter) -> DmlResult<()> {
        if self.columns.is_empty() {
            w.push('*');
            return Ok(());
        }
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                w.push_str(", ");
            }
            match col {
                SelectColumn::Name(ident) => w.name_as(&ident.name, ident.alias.as_deref()),
                SelectColumn::Expr { sql, alias } => {
                    w.raw(sql, None);
                    if let Some(alias) = alias {
                        w.push_str(" AS ");
                        w.quoted(alias);
                    }
                }
                SelectColumn::Sub { select, alias } => {
                    let built = select.build()?;
                    w.push('(');
                    w.append(&built);
                    w.push_str(") AS ");
                    w.quoted(alias);
                }
            }
        }
        Ok(())
    }

    fn write_from(&self, w: &mut SqlWriter) -> DmlResult<()> {
        if let Some(derived) = &self.derived {
            let Some(alias) = self.base.table.alias.as_deref() else {
                return Err(DmlError::not_valid("derived table requires an alias"));
            };
            let built = derived.build()?;
            w.push_str(" FROM (");
            w.append(&built);
            w.push_str(") AS ");
            w.quoted(alias);
            return Ok(());
        }
        if self.base.table.is_empty() {
            if self.columns.is_empty() {
                return Err(DmlError::empty("SELECT without table and columns"));
            }
            return Ok(());
        }
        w.push_str(" FROM ");
        w.name_as(&self.base.table.name, self.base.table.alias.as_deref());
        Ok(())
    }

    fn write_joins(&self, w: &mut SqlWriter) -> DmlResult<()> {
        for join in &self.joins {
            w.push_str(join.kind.as_sql());
            w.name_as(&join.table.name, join.table.alias.as_deref());
            if !join.using.is_empty() {
                w.push_str(" USING (");
                w.name_list(&join.using);
                w.push(')');
            } else if !join.on.is_empty() {
                w.push_str(" ON ");
                condition::write_conditions(w, &join.on)?;
            } else if join.kind != JoinKind::Cross {
                return Err(DmlError::not_valid(format!(
                    "join of `{}` needs ON conditions or USING columns",
                    join.table.name
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn render(&self) -> DmlResult<Built> {
        let mut w = self.base.writer();
        w.push_str("SELECT ");
        if self.distinct {
            w.push_str("DISTINCT ");
        }
        self.write_columns(&mut w)?;
        self.write_from(&mut w)?;
        self.write_joins(&mut w)?;
        self.base.write_where(&mut w)?;
        if !self.group_bys.is_empty() {
            w.push_str(" GROUP BY ");
            for (i, col) in self.group_bys.iter().enumerate() {
                if i > 0 {
                    w.push_str(", ");
                }
                w.name(col);
            }
        }
        if !self.havings.is_empty() {
            w.push_str(" HAVING ");
            condition::write_conditions(&mut w, &self.havings)?;
        }
        self.base.write_order_by(&mut w);
        self.base.write_limit(&mut w);
        match self.lock {
            LockMode::None => {}
            LockMode::ForUpdate => w.push_str(" FOR UPDATE"),
            LockMode::ShareMode => w.push_str(" LOCK IN SHARE MODE"),
        }
        Ok(w.finish())
    }
}

impl QueryBuilder for Select {
    fn is_build_cached(&self) -> bool {
        self.is_cached()
    }

    fn build(&self) -> DmlResult<Arc<Built>> {
        self.base.cached(&self.base.cache_key, || self.render())
    }

    fn table_name(&self) -> &str {
        &self.base.table.name
    }
}
