//! Generic client trait for unified database access.
//!
//! The runner ([`Dbr`](crate::dbr::Dbr)) only talks to a [`GenericClient`], so
//! a pool, a dedicated connection, a transaction or a test double can all run
//! the same statements.

use crate::builder::RawSql;
use crate::dbr::Dbr;
use crate::error::DmlResult;
use crate::monitor::{Event, MonitorConfig, NoopMonitor, QueryContext, QueryMonitor};
use crate::row::Row;
use crate::value::Value;
use futures_core::Stream;
use futures_util::StreamExt;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Stream of rows returned by [`GenericClient::query_stream`].
pub type RowStream<'a> = Pin<Box<dyn Stream<Item = DmlResult<Row>> + Send + 'a>>;

/// Outcome of a statement executed with [`GenericClient::execute`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Auto-increment id generated by the statement, 0 when none.
    pub last_insert_id: u64,
}

/// What kind of connection scope a client represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Pool,
    Conn,
    Tx,
}

/// Process-unique id: a random per-process prefix and a counter.
pub(crate) fn next_id() -> String {
    static PREFIX: OnceLock<String> = OnceLock::new();
    static COUNTER: AtomicU64 = AtomicU64::new(1);

    let prefix = PREFIX.get_or_init(|| {
        let mut simple = uuid::Uuid::new_v4().simple().to_string();
        simple.truncate(8);
        simple
    });
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{n}")
}

/// Identity and monitoring state of a connection scope.
///
/// A pool owns one scope; dedicated connections and transactions derive theirs
/// from it, inheriting the monitor and the pool id.
#[derive(Clone)]
pub struct ScopeInfo {
    pub kind: ScopeKind,
    pub pool_id: String,
    pub conn_id: Option<String>,
    pub tx_id: Option<String>,
    /// Prefix statements with a `/*ID$<id>*/` comment outside transactions.
    pub embed_ids: bool,
    pub monitor: Arc<dyn QueryMonitor>,
    pub monitor_config: MonitorConfig,
}

impl fmt::Debug for ScopeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeInfo")
            .field("kind", &self.kind)
            .field("pool_id", &self.pool_id)
            .field("conn_id", &self.conn_id)
            .field("tx_id", &self.tx_id)
            .field("embed_ids", &self.embed_ids)
            .field("monitor_config", &self.monitor_config)
            .finish_non_exhaustive()
    }
}

impl Default for ScopeInfo {
    fn default() -> Self {
        Self::pool()
    }
}

impl ScopeInfo {
    /// A fresh pool scope without monitoring.
    pub fn pool() -> Self {
        Self {
            kind: ScopeKind::Pool,
            pool_id: next_id(),
            conn_id: None,
            tx_id: None,
            embed_ids: false,
            monitor: Arc::new(NoopMonitor),
            monitor_config: MonitorConfig::default(),
        }
    }

    /// Scope of a dedicated connection taken from this pool.
    pub fn conn(&self) -> Self {
        Self {
            kind: ScopeKind::Conn,
            conn_id: Some(next_id()),
            tx_id: None,
            ..self.clone()
        }
    }

    /// Scope of a transaction started on this pool or connection.
    pub fn tx(&self) -> Self {
        Self {
            kind: ScopeKind::Tx,
            tx_id: Some(next_id()),
            ..self.clone()
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor_config = config;
        self
    }

    pub fn with_embedded_ids(mut self, enabled: bool) -> Self {
        self.embed_ids = enabled;
        self
    }

    /// The id of the innermost scope: transaction, connection, then pool.
    pub fn id(&self) -> &str {
        self.tx_id
            .as_deref()
            .or(self.conn_id.as_deref())
            .unwrap_or(&self.pool_id)
    }

    /// Correlation comment prepended to statements, if enabled for this scope.
    pub(crate) fn correlation_prefix(&self, statement_id: &str) -> Option<String> {
        if !self.embed_ids || self.kind == ScopeKind::Tx {
            return None;
        }
        Some(format!("/*ID${statement_id}*/ "))
    }

    /// Monitoring context carrying this scope's ids.
    pub(crate) fn context(&self, event: Event, sql: &str, arg_count: usize) -> QueryContext {
        let mut ctx = QueryContext::new(event, sql, arg_count);
        ctx.pool_id = self.pool_id.clone();
        ctx.conn_id = self.conn_id.clone();
        ctx.tx_id = self.tx_id.clone();
        ctx
    }
}

/// A trait that unifies pools, dedicated connections and transactions.
///
/// Arguments are already flattened: list arguments were expanded to one value
/// per placeholder before the client sees them.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<Vec<Row>>> + Send;

    /// Execute a statement and return the affected row count and insert id.
    fn execute(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send;

    /// Execute a query and yield rows as they arrive.
    ///
    /// The default implementation buffers the result of [`GenericClient::query`].
    fn query_stream<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> RowStream<'a> {
        Box::pin(
            futures_util::stream::once(self.query(sql, args)).flat_map(|result| {
                let items: Vec<DmlResult<Row>> = match result {
                    Ok(rows) => rows.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                };
                futures_util::stream::iter(items)
            }),
        )
    }

    /// Validate a statement on the server without running it.
    ///
    /// The default implementation accepts every statement.
    fn prepare(&self, sql: &str) -> impl Future<Output = DmlResult<()>> + Send {
        let _ = sql;
        async { Ok(()) }
    }

    /// Identity and monitoring state of this client.
    fn scope(&self) -> &ScopeInfo;

    /// Run hand-written SQL through the runner.
    fn with_raw_sql(&self, sql: impl Into<String>) -> Dbr<'_, Self>
    where
        Self: Sized,
    {
        Dbr::new(self, Arc::new(RawSql::new(sql)))
    }
}

impl<C: GenericClient> GenericClient for &C {
    fn query(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<Vec<Row>>> + Send {
        (**self).query(sql, args)
    }

    fn execute(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send {
        (**self).execute(sql, args)
    }

    fn query_stream<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> RowStream<'a> {
        (**self).query_stream(sql, args)
    }

    fn prepare(&self, sql: &str) -> impl Future<Output = DmlResult<()>> + Send {
        (**self).prepare(sql)
    }

    fn scope(&self) -> &ScopeInfo {
        (**self).scope()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_share_a_prefix() {
        let a = next_id();
        let b = next_id();
        assert_ne!(a, b);
        let prefix = |id: &str| id.split('-').next().unwrap_or_default().to_string();
        assert_eq!(prefix(&a), prefix(&b));
        assert_eq!(prefix(&a).len(), 8);
    }

    #[test]
    fn derived_scopes_keep_pool_identity() {
        let pool = ScopeInfo::pool().with_embedded_ids(true);
        let conn = pool.conn();
        let tx = conn.tx();
        assert_eq!(conn.pool_id, pool.pool_id);
        assert_eq!(tx.conn_id, conn.conn_id);
        assert_eq!(tx.kind, ScopeKind::Tx);
        assert_eq!(tx.id(), tx.tx_id.as_deref().unwrap());
        assert_eq!(pool.id(), pool.pool_id);
    }

    #[test]
    fn correlation_prefix_is_skipped_in_transactions() {
        let pool = ScopeInfo::pool().with_embedded_ids(true);
        assert_eq!(pool.correlation_prefix("s1").as_deref(), Some("/*ID$s1*/ "));
        assert_eq!(pool.conn().correlation_prefix("s2").as_deref(), Some("/*ID$s2*/ "));
        assert_eq!(pool.tx().correlation_prefix("s3"), None);
        assert_eq!(ScopeInfo::pool().correlation_prefix("s4"), None);
    }
}
