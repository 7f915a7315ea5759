//! Statement builders.
//!
//! Every builder renders to a [`Built`]: SQL text with backtick-quoted
//! identifiers and `?` placeholders, the placeholder positions and any
//! statement-owned arguments. Renderings are cached per cache key until a
//! clause changes.
//!
//! ```ignore
//! use mydml::{column, Select};
//!
//! let sel = Select::new(["path", "value"])
//!     .from_alias("core_config_data", "ccd")
//!     .filter(column("scope_id").in_().placeholder())
//!     .order_by("path");
//! let (sql, _) = sel.to_sql()?;
//! ```

pub(crate) mod base;
mod cache;
pub(crate) mod macros;
mod delete;
mod insert;
mod raw;
mod select;
mod union;
mod update;
mod with;
pub(crate) mod writer;


use crate::error::DmlResult;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

pub use cache::BuildCache;
pub use delete::Delete;
pub use insert::{DupKey, Insert};
pub use raw::RawSql;
pub use select::{JoinKind, Select};
pub use union::{SetOp, Union};
pub use update::Update;
pub use with::{Cte, With};
pub use writer::Built;

/// Common interface of all statement builders.
///
/// Object safe, so a runner can hold any builder behind `Arc<dyn QueryBuilder>`.
pub trait QueryBuilder: fmt::Debug + Send + Sync {
    /// Render the statement (or return the cached rendering).
    fn build(&self) -> DmlResult<Arc<Built>>;

    /// Render the statement for `rows` rows of values.
    ///
    /// Only multi-row statements care; everything else renders as usual.
    fn build_for_rows(&self, rows: usize) -> DmlResult<Arc<Built>> {
        let _ = rows;
        self.build()
    }

    /// Main table, used in log events and error context.
    fn table_name(&self) -> &str;

    /// Whether the next [`QueryBuilder::build`] is served from the build cache.
    fn is_build_cached(&self) -> bool {
        false
    }

    /// Render and return the SQL and the statement-owned arguments.
    fn to_sql(&self) -> DmlResult<(String, Vec<Value>)> {
        let built = self.build()?;
        Ok((built.sql.clone(), built.args.clone()))
    }
}

/// Start a SELECT of `columns`.
pub fn select<I, S>(columns: I) -> Select
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Select::new(columns)
}

/// Start an INSERT into `table`.
pub fn insert(table: impl Into<String>) -> Insert {
    Insert::new(table)
}

/// Start an UPDATE of `table`.
pub fn update(table: impl Into<String>) -> Update {
    Update::new(table)
}

/// Start a DELETE from `table`.
pub fn delete(table: impl Into<String>) -> Delete {
    Delete::new(table)
}

/// Start a UNION of `selects`.
pub fn union(selects: impl IntoIterator<Item = Select>) -> Union {
    Union::new(selects)
}

/// Start a WITH statement.
pub fn with() -> With {
    With::new()
}
