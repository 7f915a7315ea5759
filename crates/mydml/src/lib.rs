//! # mydml
//!
//! A MySQL/MariaDB statement builder and execution runner.
//!
//! ## Features
//!
//! - **Builders for every DML statement**: SELECT, INSERT, UPDATE, DELETE,
//!   UNION and WITH render backtick-quoted SQL with `?` placeholders
//! - **Build cache**: rendered SQL is kept per cache key until a clause changes
//! - **Arguments**: bound separately, or interpolated as escaped literals;
//!   list and tuple arguments expand to the right number of placeholders
//! - **Explicit column mapping**: records and collections implement
//!   [`ColumnMapper`] instead of relying on reflection
//! - **One runner for every scope**: pool, dedicated connection, transaction
//!   or any other [`GenericClient`]
//! - **Query monitoring**: correlation ids, `tracing` events, statistics
//!
//! ## Example
//!
//! ```ignore
//! use mydml::{column, ConnPool, ConnPoolConfig};
//!
//! let pool = ConnPool::connect(&ConnPoolConfig::new("mysql://app@localhost/shop")).await?;
//!
//! // SELECT
//! let paths = mydml::select(["path"])
//!     .from("core_config_data")
//!     .filter(column("scope_id").in_().placeholder())
//!     .order_by("path")
//!     .with_dbr(&pool)
//!     .arg(mydml::Value::list([0, 1]))
//!     .load_strings()
//!     .await?;
//!
//! // INSERT .. ON DUPLICATE KEY UPDATE
//! mydml::insert("core_config_data")
//!     .add_columns(["scope", "scope_id", "path", "value"])
//!     .add_values(["default", "0", "web/secure/url", "https://shop.test/"])
//!     .on_duplicate_keys_all()
//!     .with_dbr(&pool)
//!     .exec()
//!     .await?;
//!
//! // UPDATE
//! mydml::update("core_config_data")
//!     .set_value("value", "https://shop.test/")
//!     .filter(column("path").equal().str("web/unsecure/url"))
//!     .with_dbr(&pool)
//!     .exec()
//!     .await?;
//!
//! // DELETE
//! mydml::delete("core_config_data")
//!     .filter(column("config_id").greater().int64(2))
//!     .with_dbr(&pool)
//!     .interpolate()
//!     .exec()
//!     .await?;
//! ```

pub mod builder;
pub mod client;
pub mod condition;
pub mod config;
pub mod dbr;
pub mod error;
pub mod ident;
pub mod interpolate;
pub mod mapper;
pub mod monitor;
pub mod naming;
pub mod row;
pub mod stmt;
pub mod transaction;
pub mod value;

#[cfg(feature = "mysql")]
pub mod pool;

pub use builder::{
    BuildCache, Built, Cte, Delete, DupKey, Insert, JoinKind, QueryBuilder, RawSql, Select, SetOp,
    Union, Update, With, delete, insert, select, union, update, with,
};
pub use client::{ExecResult, GenericClient, RowStream, ScopeInfo, ScopeKind};
pub use condition::{Condition, Conditions, Op, column, columns, exists, expr, not_exists, paren_close, paren_open};
pub use config::ConnPoolConfig;
pub use dbr::Dbr;
pub use error::{DmlError, DmlResult, ErrorKind};
pub use ident::{Ident, quote, quote_as, write_quoted};
pub use interpolate::{expand_placeholders, interpolate, must_repeat, repeat};
pub use mapper::{ColumnMap, ColumnMapMode, ColumnMapper, ScanFn};
pub use monitor::{
    CompositeMonitor, MonitorConfig, NoopMonitor, QueryContext, QueryMonitor, QueryResult,
    QueryStats, QueryType, StatsMonitor,
};
pub use row::{FromValue, Row};
pub use stmt::Stmt;
pub use transaction::__next_savepoint_name;
pub use value::{Args, Value};

#[cfg(feature = "tracing")]
pub use monitor::TracingMonitor;

#[cfg(feature = "mysql")]
pub use pool::{Conn, ConnPool, Tx};
