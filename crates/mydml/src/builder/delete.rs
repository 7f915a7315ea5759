//! DELETE statement builder.

use super::QueryBuilder;
use super::base::BuilderBase;
use super::macros::{impl_clause_methods, impl_common_methods};
use super::select::Select;
use super::writer::Built;
use crate::error::{DmlError, DmlResult};
use crate::ident::Ident;
use std::sync::Arc;

/// Single-table DELETE statement builder.
///
/// ```ignore
/// let del = Delete::new("t").filter(column("a").greater().int64(2));
/// assert_eq!(del.to_string(), "DELETE FROM `t` WHERE (`a` > 2)");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Delete {
    pub(crate) base: BuilderBase,
}

impl_clause_methods!(Delete);
impl_common_methods!(Delete);

impl Delete {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            base: BuilderBase::new(Ident::new(table)),
        }
    }

    pub fn with_alias(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            base: BuilderBase::new(Ident::with_alias(table, alias)),
        }
    }

    /// Multi-table deletes driven by a join are not supported; the statement
    /// fails to build with a not-supported error.
    pub fn from_select(mut self, select: Select) -> Self {
        self.base.touch();
        self.base.fail(DmlError::not_supported(format!(
            "DELETE from `{}` joined with `{}` is not supported",
            self.base.table.name,
            select.table_name()
        )));
        self
    }

    fn compact_clauses(&mut self) {}

    fn render(&self) -> DmlResult<Built> {
        if self.base.table.is_empty() {
            return Err(DmlError::empty("DELETE without table"));
        }
        let mut w = self.base.writer();
        w.push_str("DELETE FROM ");
        w.name_as(&self.base.table.name, self.base.table.alias.as_deref());
        self.base.write_where(&mut w)?;
        self.base.write_order_by(&mut w);
        self.base.write_limit(&mut w);
        Ok(w.finish())
    }
}

impl QueryBuilder for Delete {
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
