//! MySQL connection scopes backed by sqlx.
//!
//! - [`ConnPool`]: statements run on any pooled connection
//! - [`Conn`]: one dedicated connection until [`Conn::close`]
//! - [`Tx`]: one transaction until [`Tx::commit`] or [`Tx::rollback`]
//!
//! All three implement [`GenericClient`], so every builder runs on any of
//! them through `with_dbr(&scope)`.
//!
//! # Example
//!
//! ```ignore
//! use mydml::{ConnPool, ConnPoolConfig};
//!
//! let pool = ConnPool::connect(&ConnPoolConfig::new("mysql://app@localhost/shop")).await?;
//! let conn = pool.conn().await?;
//! let ids = mydml::select(["entity_id"])
//!     .from("catalog_product_entity")
//!     .with_dbr(&conn)
//!     .load_int64s()
//!     .await?;
//! conn.close().await?;
//! ```

use crate::client::{ExecResult, GenericClient, RowStream, ScopeInfo};
use crate::config::ConnPoolConfig;
use crate::error::{DmlError, DmlResult};
use crate::ident;
use crate::monitor::{self, Event, MonitorConfig, QueryMonitor, QueryResult};
use crate::row::Row;
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::StreamExt;
use sqlx::mysql::{MySqlArguments, MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Column, MySql, Transaction, TypeInfo, ValueRef};
use std::fmt;
use std::future::Future;
use std::ops::DerefMut;
use std::sync::Arc;
use tokio::sync::Mutex;

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// Bind flattened arguments to a sqlx query.
fn bind_args<'q>(mut query: MySqlQuery<'q>, args: &'q [Value]) -> DmlResult<MySqlQuery<'q>> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(Option::<String>::None),
            Value::Int(v) => query.bind(*v),
            Value::Uint(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Str(s) => query.bind(s.as_str()),
            Value::Bool(b) => query.bind(*b),
            Value::Time(t) => query.bind(*t),
            Value::Bytes(b) => query.bind(b.as_slice()),
            Value::Json(j) => query.bind(j.to_string()),
            Value::List(_) => {
                return Err(DmlError::not_supported(
                    "list arguments must be expanded before binding",
                ));
            }
        };
    }
    Ok(query)
}

fn text_or_bytes(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(s) => Value::Str(s),
        Err(e) => Value::Bytes(e.into_bytes()),
    }
}

fn decode_value(row: &MySqlRow, index: usize) -> DmlResult<Value> {
    use sqlx::Row as _;

    let (is_null, type_name) = {
        let raw = row.try_get_raw(index)?;
        (raw.is_null(), raw.type_info().name().to_string())
    };
    if is_null {
        return Ok(Value::Null);
    }
    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::Int(row.try_get::<i64, _>(index)?)
        }
        name if name.ends_with(" UNSIGNED") => Value::Uint(row.try_get::<u64, _>(index)?),
        "FLOAT" => Value::Float(f64::from(row.try_get::<f32, _>(index)?)),
        "DOUBLE" => Value::Float(row.try_get::<f64, _>(index)?),
        "DATETIME" | "TIMESTAMP" => Value::Time(row.try_get::<NaiveDateTime, _>(index)?),
        "DATE" => Value::from(row.try_get::<NaiveDate, _>(index)?),
        "TIME" => Value::Str(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "YEAR" => Value::Uint(u64::from(row.try_get_unchecked::<u16, _>(index)?)),
        "JSON" => {
            let text = row.try_get_unchecked::<String, _>(index)?;
            serde_json::from_str(&text)
                .map(Value::Json)
                .map_err(|e| DmlError::not_valid(format!("invalid JSON column: {e}")))?
        }
        name if name.contains("BLOB") || name.contains("BINARY") => {
            Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?)
        }
        _ => text_or_bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
    };
    Ok(value)
}

fn decode_row(row: &MySqlRow, columns: &Arc<[String]>) -> DmlResult<Row> {
    use sqlx::Row as _;

    let values = (0..row.len())
        .map(|i| decode_value(row, i))
        .collect::<DmlResult<Vec<_>>>()?;
    Row::new(Arc::clone(columns), values)
}

fn column_names(row: &MySqlRow) -> Arc<[String]> {
    use sqlx::Row as _;

    row.columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>()
        .into()
}

fn decode_rows(rows: &[MySqlRow]) -> DmlResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns = column_names(first);
    rows.iter().map(|row| decode_row(row, &columns)).collect()
}

async fn fetch_rows<'c, E>(executor: E, sql: &str, args: &[Value]) -> DmlResult<Vec<Row>>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    let rows = bind_args(sqlx::query(sql), args)?
        .fetch_all(executor)
        .await?;
    decode_rows(&rows)
}

async fn execute_query<'c, E>(executor: E, sql: &str, args: &[Value]) -> DmlResult<ExecResult>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    let done = bind_args(sqlx::query(sql), args)?
        .execute(executor)
        .await?;
    Ok(ExecResult {
        rows_affected: done.rows_affected(),
        last_insert_id: done.last_insert_id(),
    })
}

async fn prepare_query<'c, E>(executor: E, sql: &str) -> DmlResult<()>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    executor.prepare(sql).await?;
    Ok(())
}

/// The connection held by a dedicated scope, or `AlreadyClosed`.
fn open<'g, X>(slot: &'g mut Option<X>, what: &str) -> DmlResult<&'g mut MySqlConnection>
where
    X: DerefMut<Target = MySqlConnection>,
{
    slot.as_deref_mut()
        .ok_or_else(|| DmlError::already_closed(format!("{what} is closed")))
}

/// A sqlx MySQL pool with its connection scope.
#[derive(Debug, Clone)]
pub struct ConnPool {
    pool: MySqlPool,
    scope: ScopeInfo,
}

impl ConnPool {
    /// Connect a new pool.
    ///
    /// With the `tracing` feature, enabling monitoring in the config installs
    /// a [`TracingMonitor`](crate::monitor::TracingMonitor).
    pub async fn connect(config: &ConnPoolConfig) -> DmlResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.dsn)
            .await?;
        let scope = ScopeInfo::pool()
            .with_embedded_ids(config.embed_correlation_ids)
            .with_monitor_config(config.monitor.clone());
        #[cfg(feature = "tracing")]
        let scope = if config.monitor.monitoring_enabled {
            scope.with_monitor(Arc::new(crate::monitor::TracingMonitor::new()))
        } else {
            scope
        };
        Ok(Self { pool, scope })
    }

    /// Wrap an existing sqlx pool.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self {
            pool,
            scope: ScopeInfo::pool(),
        }
    }

    pub fn with_monitor<M: QueryMonitor + 'static>(self, monitor: M) -> Self {
        self.with_monitor_arc(Arc::new(monitor))
    }

    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.scope = self.scope.with_monitor(monitor);
        self
    }

    pub fn with_monitor_config(mut self, config: MonitorConfig) -> Self {
        self.scope = self.scope.with_monitor_config(config);
        self
    }

    pub fn embed_correlation_ids(mut self, enabled: bool) -> Self {
        self.scope = self.scope.with_embedded_ids(enabled);
        self
    }

    pub fn inner(&self) -> &MySqlPool {
        &self.pool
    }

    /// Take a dedicated connection out of the pool.
    pub async fn conn(&self) -> DmlResult<Conn> {
        let conn = self.pool.acquire().await?;
        Ok(Conn {
            conn: Mutex::new(Some(conn)),
            scope: self.scope.conn(),
        })
    }

    /// Start a transaction on a pooled connection.
    pub async fn begin(&self) -> DmlResult<Tx> {
        let scope = self.scope.tx();
        let ctx = scope.context(Event::Begin, "BEGIN", 0);
        let tx = monitor::observe(
            &scope,
            ctx,
            async { Ok::<_, DmlError>(self.pool.begin().await?) },
            |_: &Transaction<'static, MySql>| QueryResult::Done,
        )
        .await?;
        Ok(Tx {
            tx: Mutex::new(Some(tx)),
            scope,
        })
    }

    /// Close the pool; later calls fail with `AlreadyClosed`.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl GenericClient for ConnPool {
    fn query(&self, sql: &str, args: &[Value]) -> impl Future<Output = DmlResult<Vec<Row>>> + Send {
        fetch_rows(&self.pool, sql, args)
    }

    fn execute(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send {
        execute_query(&self.pool, sql, args)
    }

    fn query_stream<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> RowStream<'a> {
        let query = match bind_args(sqlx::query(sql), args) {
            Ok(query) => query,
            Err(e) => return Box::pin(futures_util::stream::once(async move { Err(e) })),
        };
        let mut columns: Option<Arc<[String]>> = None;
        Box::pin(query.fetch(&self.pool).map(move |row| {
            let row = row?;
            let columns = columns.get_or_insert_with(|| column_names(&row));
            decode_row(&row, columns)
        }))
    }

    fn prepare(&self, sql: &str) -> impl Future<Output = DmlResult<()>> + Send {
        prepare_query(&self.pool, sql)
    }

    fn scope(&self) -> &ScopeInfo {
        &self.scope
    }
}

/// A dedicated pooled connection.
///
/// Returned to the pool by [`Conn::close`] or on drop.
pub struct Conn {
    conn: Mutex<Option<PoolConnection<MySql>>>,
    scope: ScopeInfo,
}

impl fmt::Debug for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn").field("scope", &self.scope).finish_non_exhaustive()
    }
}

impl Conn {
    /// Return the connection to the pool; later calls fail with `AlreadyClosed`.
    pub async fn close(&self) -> DmlResult<()> {
        match self.conn.lock().await.take() {
            Some(_) => Ok(()),
            None => Err(DmlError::already_closed("connection is closed")),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.conn.lock().await.is_none()
    }
}

impl GenericClient for Conn {
    fn query(&self, sql: &str, args: &[Value]) -> impl Future<Output = DmlResult<Vec<Row>>> + Send {
        async move {
            let mut guard = self.conn.lock().await;
            fetch_rows(open(&mut *guard, "connection")?, sql, args).await
        }
    }

    fn execute(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send {
        async move {
            let mut guard = self.conn.lock().await;
            execute_query(open(&mut *guard, "connection")?, sql, args).await
        }
    }

    fn prepare(&self, sql: &str) -> impl Future<Output = DmlResult<()>> + Send {
        async move {
            let mut guard = self.conn.lock().await;
            prepare_query(open(&mut *guard, "connection")?, sql).await
        }
    }

    fn scope(&self) -> &ScopeInfo {
        &self.scope
    }
}

/// A transaction on a pooled connection.
///
/// Dropping an open transaction rolls it back.
pub struct Tx {
    tx: Mutex<Option<Transaction<'static, MySql>>>,
    scope: ScopeInfo,
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx").field("scope", &self.scope).finish_non_exhaustive()
    }
}

impl Tx {
    pub async fn commit(&self) -> DmlResult<()> {
        let tx = self.take().await?;
        let ctx = self.scope.context(Event::Commit, "COMMIT", 0);
        monitor::observe(
            &self.scope,
            ctx,
            async { Ok::<_, DmlError>(tx.commit().await?) },
            |_: &()| QueryResult::Done,
        )
        .await
    }

    pub async fn rollback(&self) -> DmlResult<()> {
        let tx = self.take().await?;
        let ctx = self.scope.context(Event::Rollback, "ROLLBACK", 0);
        monitor::observe(
            &self.scope,
            ctx,
            async { Ok::<_, DmlError>(tx.rollback().await?) },
            |_: &()| QueryResult::Done,
        )
        .await
    }

    pub async fn is_closed(&self) -> bool {
        self.tx.lock().await.is_none()
    }

    pub async fn savepoint(&self, name: &str) -> DmlResult<()> {
        self.control("SAVEPOINT ", name).await
    }

    pub async fn release_savepoint(&self, name: &str) -> DmlResult<()> {
        self.control("RELEASE SAVEPOINT ", name).await
    }

    pub async fn rollback_to_savepoint(&self, name: &str) -> DmlResult<()> {
        self.control("ROLLBACK TO SAVEPOINT ", name).await
    }

    async fn control(&self, command: &str, name: &str) -> DmlResult<()> {
        if name.is_empty() {
            return Err(DmlError::empty("savepoint name"));
        }
        let mut sql = String::from(command);
        ident::write_quoted_part(&mut sql, name);
        let ctx = self.scope.context(Event::Exec, &sql, 0);
        monitor::observe(
            &self.scope,
            ctx,
            self.execute(&sql, &[]),
            |r: &ExecResult| QueryResult::Affected(r.rows_affected),
        )
        .await
        .map(|_| ())
    }

    async fn take(&self) -> DmlResult<Transaction<'static, MySql>> {
        self.tx
            .lock()
            .await
            .take()
            .ok_or_else(|| DmlError::already_closed("transaction is closed"))
    }
}

impl GenericClient for Tx {
    fn query(&self, sql: &str, args: &[Value]) -> impl Future<Output = DmlResult<Vec<Row>>> + Send {
        async move {
            let mut guard = self.tx.lock().await;
            fetch_rows(open(&mut *guard, "transaction")?, sql, args).await
        }
    }

    fn execute(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send {
        async move {
            let mut guard = self.tx.lock().await;
            execute_query(open(&mut *guard, "transaction")?, sql, args).await
        }
    }

    fn prepare(&self, sql: &str) -> impl Future<Output = DmlResult<()>> + Send {
        async move {
            let mut guard = self.tx.lock().await;
            prepare_query(open(&mut *guard, "transaction")?, sql).await
        }
    }

    fn scope(&self) -> &ScopeInfo {
        &self.scope
    }
}
