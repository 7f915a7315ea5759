//! UNION / INTERSECT / EXCEPT of SELECT statements.

use super::QueryBuilder;
use super::base::{self, BuilderBase, OrderBy};
use super::macros::impl_common_methods;
use super::select::Select;
use super::writer::Built;
use crate::error::{DmlError, DmlResult};
use crate::interpolate::Placeholder;
use std::sync::Arc;

/// Synthetic column added to every branch by [`Union::preserve_result_set`].
pub const PRESERVE_RESULT_SET: &str = "_preserve_result_set";

/// Set operator joining the branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetOp {
    #[default]
    Union,
    UnionAll,
    Intersect,
    Except,
}

impl SetOp {
    fn as_sql(self) -> &'static str {
        match self {
            SetOp::Union => " UNION ",
            SetOp::UnionAll => " UNION ALL ",
            SetOp::Intersect => " INTERSECT ",
            SetOp::Except => " EXCEPT ",
        }
    }
}

/// Set operation over parenthesized SELECT branches.
///
/// In template mode a single SELECT is rendered once per replacement value:
///
/// ```ignore
/// let u = Union::template(
///     Select::new(["entity_id", "value"]).from("catalog_product_entity_{type}"),
/// )
/// .string_replace("{type}", ["varchar", "int", "decimal"])
/// .preserve_result_set();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Union {
    pub(crate) base: BuilderBase,
    selects: Vec<Select>,
    template: Option<Box<Select>>,
    replacements: Vec<(String, Vec<String>)>,
    op: SetOp,
    preserve: bool,
}

impl_common_methods!(Union);

impl Union {
    pub fn new(selects: impl IntoIterator<Item = Select>) -> Self {
        Self {
            selects: selects.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Render `select` once per value given to [`Union::string_replace`].
    pub fn template(select: Select) -> Self {
        Self {
            template: Some(Box::new(select)),
            ..Self::default()
        }
    }

    pub fn add_select(mut self, select: Select) -> Self {
        self.base.touch();
        self.selects.push(select);
        self
    }

    /// Replace `key` in the rendered template; the i-th value goes to the
    /// i-th branch. Every call must pass as many values as the first one.
    pub fn string_replace<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base.touch();
        let key = key.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if let Some((_, first)) = self.replacements.first() {
            if first.len() != values.len() {
                let expected = first.len();
                self.base.fail(DmlError::not_valid(format!(
                    "string_replace(`{key}`) got {} values, expected {expected}",
                    values.len()
                )));
            }
        } else if values.is_empty() {
            self.base
                .fail(DmlError::not_valid(format!("string_replace(`{key}`) without values")));
        }
        if key.is_empty() || key.contains('?') {
            self.base.fail(DmlError::not_valid(format!(
                "string_replace key `{key}` must be non-empty and free of placeholders"
            )));
        }
        self.replacements.push((key, values));
        self
    }

    pub fn all(mut self) -> Self {
        self.base.touch();
        self.op = SetOp::UnionAll;
        self
    }

    pub fn intersect(mut self) -> Self {
        self.base.touch();
        self.op = SetOp::Intersect;
        self
    }

    pub fn except(mut self) -> Self {
        self.base.touch();
        self.op = SetOp::Except;
        self
    }

    /// Keep the rows of each branch together and in branch order.
    ///
    /// Adds `i AS _preserve_result_set` to branch `i` and orders by it first.
    pub fn preserve_result_set(mut self) -> Self {
        self.base.touch();
        self.preserve = true;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.base.touch();
        self.base.order_bys.push(OrderBy {
            column: column.into(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.base.touch();
        self.base.order_bys.push(OrderBy {
            column: column.into(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.base.touch();
        self.base.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.base.touch();
        self.base.offset = Some(offset);
        self
    }

    fn compact_clauses(&mut self) {
        self.selects = Vec::new();
        self.template = None;
        self.replacements = Vec::new();
    }

    fn branch(&self, select: &Select, ordinal: usize) -> DmlResult<Arc<Built>> {
        if !self.preserve {
            return select.build();
        }
        let mut branch = select.clone();
        if !branch.has_columns() {
            branch = branch.add_columns(["*"]);
        }
        branch
            .add_column_expr(ordinal.to_string(), Some(PRESERVE_RESULT_SET))
            .build()
    }

    fn template_branches(&self, template: &Select) -> DmlResult<Vec<Arc<Built>>> {
        let Some((_, first)) = self.replacements.first() else {
            return Err(DmlError::empty("UNION template without string_replace"));
        };
        let mut branches = Vec::with_capacity(first.len());
        for i in 0..first.len() {
            let rendered = self.branch(template, i)?;
            let mut sql = rendered.sql().to_string();
            let mut placeholders = rendered.placeholders().to_vec();
            for (key, values) in &self.replacements {
                sql = replace_tracked(&sql, key, &values[i], &mut placeholders);
            }
            branches.push(Arc::new(Built {
                sql,
                placeholders,
                args: rendered.args().to_vec(),
            }));
        }
        Ok(branches)
    }

    fn render(&self) -> DmlResult<Built> {
        let branches = match &self.template {
            Some(template) => self.template_branches(template)?,
            None => {
                if self.selects.is_empty() {
                    return Err(DmlError::empty("UNION without SELECT statements"));
                }
                self.selects
                    .iter()
                    .enumerate()
                    .map(|(i, select)| self.branch(select, i))
                    .collect::<DmlResult<Vec<_>>>()?
            }
        };

        let mut w = self.base.writer();
        for (i, branch) in branches.iter().enumerate() {
            if i > 0 {
                w.push_str(self.op.as_sql());
            }
            w.push('(');
            w.append(branch);
            w.push(')');
        }

        let mut order_bys = Vec::with_capacity(self.base.order_bys.len() + 1);
        if self.preserve {
            order_bys.push(OrderBy {
                column: PRESERVE_RESULT_SET.to_string(),
                descending: false,
            });
        }
        order_bys.extend(self.base.order_bys.iter().cloned());
        base::write_order_by(&mut w, &order_bys);
        self.base.write_limit(&mut w);
        Ok(w.finish())
    }
}

/// Replace every `key` in `sql`, moving the placeholder slots behind each
/// occurrence by the length difference.
fn replace_tracked(sql: &str, key: &str, value: &str, slots: &mut [Placeholder]) -> String {
    let starts: Vec<usize> = sql.match_indices(key).map(|(at, _)| at).collect();
    if starts.is_empty() {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + starts.len() * value.len());
    let mut last = 0;
    for &at in &starts {
        out.push_str(&sql[last..at]);
        out.push_str(value);
        last = at + key.len();
    }
    out.push_str(&sql[last..]);
    for slot in slots.iter_mut() {
        let before = starts.iter().take_while(|&&at| at < slot.pos).count();
        slot.pos = (slot.pos + before * value.len()).saturating_sub(before * key.len());
    }
    out
}

impl QueryBuilder for Union {
    fn is_build_cached(&self) -> bool {
        self.is_cached()
    }

    fn build(&self) -> DmlResult<Arc<Built>> {
        self.base.cached(&self.base.cache_key, || self.render())
    }

    fn table_name(&self) -> &str {
        match &self.template {
            Some(template) => template.table_name(),
            None => self.selects.first().map_or("", |s| s.table_name()),
        }
    }
}
