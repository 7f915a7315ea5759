use super::QueryBuilder;
use super::writer::Built;
use crate::error::{DmlError, DmlResult};
use std::sync::Arc;

/// Hand-written SQL run through the same runner as the builders.
///
/// Placeholders are located by scanning the text, skipping quoted strings,
/// quoted identifiers and comments.
#[derive(Debug, Clone)]
pub struct RawSql {
    table: String,
    built: Arc<Built>,
}

impl RawSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            table: String::new(),
            built: Arc::new(Built::raw(sql)),
        }
    }

    /// Wrap an already rendered statement, e.g. a prepared one.
    pub(crate) fn from_built(table: impl Into<String>, built: Arc<Built>) -> Self {
        Self {
            table: table.into(),
            built,
        }
    }

    pub fn sql(&self) -> &str {
        self.built.sql()
    }

    /// Table name reported in log events and error context.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_dbr<'c, C: crate::client::GenericClient>(
        &self,
        client: &'c C,
    ) -> crate::dbr::Dbr<'c, C> {
        crate::dbr::Dbr::new(client, Arc::new(self.clone()))
    }
}

impl QueryBuilder for RawSql {
    fn build(&self) -> DmlResult<Arc<Built>> {
        if self.built.sql().trim().is_empty() {
            return Err(DmlError::empty("raw SQL is empty"));
        }
        Ok(Arc::clone(&self.built))
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn is_build_cached(&self) -> bool {
        true
    }
}
