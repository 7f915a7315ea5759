//! UPDATE statement builder.

use super::QueryBuilder;
use super::base::BuilderBase;
use super::macros::{impl_clause_methods, impl_common_methods};
use super::select::Select;
use super::writer::Built;
use crate::error::{DmlError, DmlResult};
use crate::ident::Ident;
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum SetValue {
    Value(Value),
    Placeholder,
    Expr(String),
    Sub(Box<Select>),
}

#[derive(Debug, Clone)]
struct SetClause {
    column: String,
    value: SetValue,
}

/// UPDATE statement builder.
///
/// ```ignore
/// let upd = Update::new("catalog_product_entity")
///     .set_value("has_options", 1)
///     .set_placeholder("sku")
///     .set_expr("updated_at", "NOW()")
///     .filter(column("entity_id").placeholder());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Update {
    pub(crate) base: BuilderBase,
    sets: Vec<SetClause>,
}

impl_clause_methods!(Update);
impl_common_methods!(Update);

impl Update {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            base: BuilderBase::new(Ident::new(table)),
            ..Self::default()
        }
    }

    pub fn with_alias(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            base: BuilderBase::new(Ident::with_alias(table, alias)),
            ..Self::default()
        }
    }

    fn push_set(mut self, column: impl Into<String>, value: SetValue) -> Self {
        self.base.touch();
        self.sets.push(SetClause {
            column: column.into(),
            value,
        });
        self
    }

    /// `col=<literal>`
    pub fn set_value(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push_set(column, SetValue::Value(value.into()))
    }

    /// `col=?`, bound at execution time.
    pub fn set_placeholder(self, column: impl Into<String>) -> Self {
        self.push_set(column, SetValue::Placeholder)
    }

    /// `col=<raw expression>`; placeholders in the expression bind to `col`.
    pub fn set_expr(self, column: impl Into<String>, raw: impl Into<String>) -> Self {
        self.push_set(column, SetValue::Expr(raw.into()))
    }

    /// `col=(SELECT ..)`
    pub fn set_sub(self, column: impl Into<String>, select: Select) -> Self {
        self.push_set(column, SetValue::Sub(Box::new(select)))
    }

    /// `col=?` for every column, in order.
    pub fn set_placeholders<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            self = self.set_placeholder(column);
        }
        self
    }

    fn compact_clauses(&mut self) {
        self.sets = Vec::new();
    }

    fn render(&self) -> DmlResult<Built> {
        if self.base.table.is_empty() {
            return Err(DmlError::empty("UPDATE without table"));
        }
        if self.sets.is_empty() {
            return Err(DmlError::empty(format!(
                "UPDATE of `{}` has no SET clause",
                self.base.table.name
            )));
        }
        let mut w = self.base.writer();
        w.push_str("UPDATE ");
        w.name_as(&self.base.table.name, self.base.table.alias.as_deref());
        w.push_str(" SET ");
        for (i, set) in self.sets.iter().enumerate() {
            if i > 0 {
                w.push_str(", ");
            }
            w.name(&set.column);
            w.push('=');
            match &set.value {
                SetValue::Value(v) => w.literal(v)?,
                SetValue::Placeholder => w.placeholder(Some(&set.column)),
                SetValue::Expr(raw) => w.raw(raw, Some(&set.column)),
                SetValue::Sub(select) => {
                    let built = select.build()?;
                    w.push('(');
                    w.append(&built);
                    w.push(')');
                }
            }
        }
        self.base.write_where(&mut w)?;
        self.base.write_order_by(&mut w);
        self.base.write_limit(&mut w);
        Ok(w.finish())
    }
}

impl QueryBuilder for Update {
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
