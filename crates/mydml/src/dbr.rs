//! The statement runner.
//!
//! A [`Dbr`] binds one statement to one client scope. It owns its argument
//! list, so every task that runs a shared statement takes its own `Dbr`
//! (`builder.with_dbr(&client)`, [`Stmt::with_dbr`](crate::stmt::Stmt::with_dbr)
//! or `dbr.clone()`).
//!
//! Arguments are bound in this order: arguments owned by the statement
//! (INSERT values), arguments read from records or collections, then the
//! arguments given with [`Dbr::arg`] / [`Dbr::args`].
//!
//! ```ignore
//! let mut rows: Vec<ConfigRow> = Vec::new();
//! let n = mydml::select(["config_id", "path", "value"])
//!     .from("core_config_data")
//!     .filter(column("path").like().placeholder())
//!     .with_dbr(&pool)
//!     .arg("web/%")
//!     .load(&mut rows)
//!     .await?;
//! ```

use crate::builder::{Built, QueryBuilder};
use crate::client::{ExecResult, GenericClient, next_id};
use crate::error::{DmlError, DmlResult};
use crate::interpolate;
use crate::mapper::{ColumnMap, ColumnMapper};
use crate::monitor::{self, Event, QueryResult};
use crate::row::{FromValue, Row};
use crate::stmt::Stmt;
use crate::value::Value;
use futures_util::{StreamExt, TryStreamExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// SQL and flattened arguments ready for the client.
#[derive(Debug)]
struct Bound {
    sql: String,
    args: Vec<Value>,
    cached: bool,
}

/// Runner snapshot: one statement, one client scope, its own arguments.
pub struct Dbr<'c, C> {
    client: &'c C,
    builder: Arc<dyn QueryBuilder>,
    args: Vec<Value>,
    interpolate: bool,
    id: String,
}

/// A clone is an independent snapshot with its own statement id.
impl<C> Clone for Dbr<'_, C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client,
            builder: Arc::clone(&self.builder),
            args: self.args.clone(),
            interpolate: self.interpolate,
            id: next_id(),
        }
    }
}

impl<C> fmt::Debug for Dbr<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dbr")
            .field("builder", &self.builder)
            .field("args", &self.args)
            .field("interpolate", &self.interpolate)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl<'c, C: GenericClient> Dbr<'c, C> {
    pub fn new(client: &'c C, builder: Arc<dyn QueryBuilder>) -> Self {
        Self {
            client,
            builder,
            args: Vec::new(),
            interpolate: false,
            id: next_id(),
        }
    }

    /// Correlation id of this snapshot.
    pub fn statement_id(&self) -> &str {
        &self.id
    }

    pub fn client(&self) -> &'c C {
        self.client
    }

    /// Append one argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append several arguments, e.g. an [`Args`](crate::value::Args) list.
    pub fn args<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Inline all arguments as literals instead of sending them separately.
    pub fn interpolate(mut self) -> Self {
        self.interpolate = true;
        self
    }

    /// Fill the remaining placeholders with per-column lists read from a
    /// collection in [`ColumnMapMode::CollectionReadSet`](crate::mapper::ColumnMapMode).
    ///
    /// Each distinct placeholder column is asked for once.
    pub fn with_collection<M: ColumnMapper>(mut self, collection: &mut M) -> DmlResult<Self> {
        let built = self.builder.build().map_err(|e| self.annotate(e))?;
        let skip = built.args.len() + self.args.len();
        let mut columns: Vec<String> = Vec::new();
        for column in built
            .placeholders
            .iter()
            .skip(skip)
            .filter_map(|p| p.column.as_deref())
        {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
        if columns.is_empty() {
            return Err(self.annotate(DmlError::not_found(
                "statement has no placeholder columns to read from the collection",
            )));
        }
        let mut cm = ColumnMap::collection(&columns);
        collection
            .map_columns(&mut cm)
            .map_err(|e| self.annotate(e))?;
        self.args.extend(cm.into_args());
        Ok(self)
    }

    /// Render the SQL and flattened arguments this snapshot would execute,
    /// without the correlation comment.
    pub fn to_sql(&self) -> DmlResult<(String, Vec<Value>)> {
        let built = self.builder.build()?;
        let args = self.collect_args(&built, Vec::new());
        interpolate::bind(&built.sql, &built.placeholders, args, self.interpolate)
    }

    /// Run the query and hand every row to `mapper` in scan mode.
    ///
    /// Returns the number of rows read.
    pub async fn load<M: ColumnMapper + ?Sized>(&self, mapper: &mut M) -> DmlResult<u64> {
        let bound = self.bound(Vec::new())?;
        let client = self.client;
        let run = async {
            let rows = client.query(&bound.sql, &bound.args).await?;
            let mut count = 0u64;
            for row in &rows {
                mapper.map_columns(&mut ColumnMap::scan(row, count))?;
                count += 1;
            }
            Ok::<_, DmlError>(count)
        };
        self.observed(Event::Load, &bound, run, |n: &u64| QueryResult::Rows(*n))
            .await
    }

    /// First column of every row as `i64`.
    pub async fn load_int64s(&self) -> DmlResult<Vec<i64>> {
        self.load_first_column().await
    }

    /// First column of every row as `String`.
    pub async fn load_strings(&self) -> DmlResult<Vec<String>> {
        self.load_first_column().await
    }

    /// First column of the first row; `None` without rows or for `NULL`.
    pub async fn load_int64(&self) -> DmlResult<Option<i64>> {
        let rows = self.fetch(Event::Load).await?;
        match rows.first() {
            Some(row) => row
                .try_get_at::<Option<i64>>(0)
                .map_err(|e| self.annotate(e)),
            None => Ok(None),
        }
    }

    async fn load_first_column<T: FromValue>(&self) -> DmlResult<Vec<T>> {
        let rows = self.fetch(Event::Load).await?;
        rows.iter()
            .map(|row| row.try_get_at::<T>(0))
            .collect::<DmlResult<Vec<T>>>()
            .map_err(|e| self.annotate(e))
    }

    /// Run the query and return the rows.
    pub async fn query(&self) -> DmlResult<Vec<Row>> {
        self.fetch(Event::Query).await
    }

    async fn fetch(&self, event: Event) -> DmlResult<Vec<Row>> {
        let bound = self.bound(Vec::new())?;
        let run = self.client.query(&bound.sql, &bound.args);
        self.observed(event, &bound, run, |rows: &Vec<Row>| QueryResult::Rows(rows.len() as u64))
            .await
    }

    /// Execute the statement.
    pub async fn exec(&self) -> DmlResult<ExecResult> {
        let bound = self.bound(Vec::new())?;
        self.execute(bound).await
    }

    /// Execute the statement with the arguments read from one record.
    ///
    /// Placeholders with a known column are read in read-set mode; a
    /// statement with anonymous placeholders asks for all fields instead.
    pub async fn exec_record<M: ColumnMapper>(&self, record: &mut M) -> DmlResult<ExecResult> {
        let bound = {
            let mut records: [&mut dyn ColumnMapper; 1] = [record];
            self.record_bound(&mut records)?
        };
        self.execute(bound).await
    }

    /// Execute the statement once for several records.
    ///
    /// Multi-row statements (INSERT) render one row per record; the
    /// placeholders are split evenly between the records.
    pub async fn exec_records<M: ColumnMapper>(&self, records: &mut [M]) -> DmlResult<ExecResult> {
        let bound = {
            let mut mappers: Vec<&mut dyn ColumnMapper> = records
                .iter_mut()
                .map(|r| r as &mut dyn ColumnMapper)
                .collect();
            self.record_bound(&mut mappers)?
        };
        self.execute(bound).await
    }

    async fn execute(&self, bound: Bound) -> DmlResult<ExecResult> {
        let run = self.client.execute(&bound.sql, &bound.args);
        self.observed(Event::Exec, &bound, run, |r: &ExecResult| QueryResult::Affected(r.rows_affected))
            .await
    }

    /// Stream the rows one by one into `f`; returns the number of rows.
    pub async fn iterate_serial<F>(&self, mut f: F) -> DmlResult<u64>
    where
        F: FnMut(&mut ColumnMap<'_>) -> DmlResult<()>,
    {
        let bound = self.bound(Vec::new())?;
        let client = self.client;
        let run = async {
            let mut rows = client.query_stream(&bound.sql, &bound.args);
            let mut count = 0u64;
            while let Some(row) = rows.next().await {
                let row = row?;
                f(&mut ColumnMap::scan(&row, count))?;
                count += 1;
            }
            Ok::<_, DmlError>(count)
        };
        self.observed(Event::IterateSerial, &bound, run, |n: &u64| QueryResult::Rows(*n))
            .await
    }

    /// Stream the rows into `f` with at most `workers` rows in flight.
    ///
    /// The first error stops the iteration and is returned. Returns the number
    /// of rows processed.
    pub async fn iterate_parallel<F, Fut>(&self, workers: usize, f: F) -> DmlResult<u64>
    where
        F: Fn(Row) -> Fut,
        Fut: Future<Output = DmlResult<()>>,
    {
        if workers < 1 {
            return Err(self.annotate(DmlError::out_of_range(format!(
                "iterate_parallel needs at least one worker, got {workers}"
            ))));
        }
        let bound = self.bound(Vec::new())?;
        let client = self.client;
        let processed = AtomicU64::new(0);
        let run = async {
            client
                .query_stream(&bound.sql, &bound.args)
                .try_for_each_concurrent(workers, |row| {
                    let work = f(row);
                    let processed = &processed;
                    async move {
                        work.await?;
                        processed.fetch_add(1, Ordering::Relaxed);
                        Ok::<(), DmlError>(())
                    }
                })
                .await?;
            Ok::<_, DmlError>(processed.load(Ordering::Relaxed))
        };
        self.observed(Event::IterateParallel, &bound, run, |n: &u64| QueryResult::Rows(*n))
            .await
    }

    /// Render the statement once and validate it on the server.
    ///
    /// The returned [`Stmt`] is shareable; every user takes its own runner
    /// with [`Stmt::with_dbr`].
    pub async fn prepare(&self) -> DmlResult<Stmt<'c, C>> {
        let cached = self.builder.is_build_cached();
        let built = self.builder.build().map_err(|e| self.annotate(e))?;
        let bound = Bound {
            sql: built.sql.clone(),
            args: Vec::new(),
            cached,
        };
        let run = self.client.prepare(&bound.sql);
        self.observed(Event::Prepare, &bound, run, |_: &()| QueryResult::Done)
            .await?;
        Ok(Stmt::new(self.client, self.builder.table_name(), built))
    }

    fn annotate(&self, err: DmlError) -> DmlError {
        err.context(format!(
            "table `{}` statement {}",
            self.builder.table_name(),
            self.id
        ))
    }

    fn collect_args(&self, built: &Built, records: Vec<Value>) -> Vec<Value> {
        let mut args = Vec::with_capacity(built.args.len() + records.len() + self.args.len());
        args.extend(built.args.iter().cloned());
        args.extend(records);
        args.extend(self.args.iter().cloned());
        args
    }

    fn bind(&self, built: &Built, records: Vec<Value>, cached: bool) -> DmlResult<Bound> {
        let args = self.collect_args(built, records);
        let (sql, args) = interpolate::bind(&built.sql, &built.placeholders, args, self.interpolate)
            .map_err(|e| self.annotate(e))?;
        let sql = match self.client.scope().correlation_prefix(&self.id) {
            Some(prefix) => prefix + &sql,
            None => sql,
        };
        Ok(Bound { sql, args, cached })
    }

    fn bound(&self, records: Vec<Value>) -> DmlResult<Bound> {
        let cached = self.builder.is_build_cached();
        let built = self.builder.build().map_err(|e| self.annotate(e))?;
        self.bind(&built, records, cached)
    }

    fn record_bound(&self, records: &mut [&mut dyn ColumnMapper]) -> DmlResult<Bound> {
        if records.is_empty() {
            return Err(self.annotate(DmlError::out_of_range(
                "at least one record is required",
            )));
        }
        let cached = self.builder.is_build_cached();
        let built = self
            .builder
            .build_for_rows(records.len())
            .map_err(|e| self.annotate(e))?;
        // Statement args fill the leading slots and runner args the trailing ones.
        let fixed = built.args.len() + self.args.len();
        if fixed > built.placeholders.len() {
            return Err(self.annotate(DmlError::not_valid(format!(
                "{} placeholders leave no room for {} statement and {} runner arguments",
                built.placeholders.len(),
                built.args.len(),
                self.args.len()
            ))));
        }
        let slots = &built.placeholders[built.args.len()..built.placeholders.len() - self.args.len()];
        if slots.len() % records.len() != 0 {
            return Err(self.annotate(DmlError::not_valid(format!(
                "{} placeholders cannot be split between {} records",
                slots.len(),
                records.len()
            ))));
        }
        let chunk = slots.len() / records.len();
        let mut values = Vec::with_capacity(slots.len());
        for (i, record) in records.iter_mut().enumerate() {
            let part = &slots[i * chunk..(i + 1) * chunk];
            let columns: Option<Vec<String>> =
                part.iter().map(|p| p.column.clone()).collect();
            let mut cm = match &columns {
                Some(columns) => ColumnMap::read_set(columns),
                None => ColumnMap::read_all(),
            };
            record
                .map_columns(&mut cm)
                .map_err(|e| self.annotate(e))?;
            values.extend(cm.into_args());
        }
        self.bind(&built, values, cached)
    }

    async fn observed<T, F>(
        &self,
        event: Event,
        bound: &Bound,
        run: F,
        summarize: impl FnOnce(&T) -> QueryResult,
    ) -> DmlResult<T>
    where
        F: Future<Output = DmlResult<T>>,
    {
        let scope = self.client.scope();
        let ctx = scope
            .context(event, &bound.sql, bound.args.len())
            .with_table(self.builder.table_name())
            .with_cached(bound.cached)
            .with_statement_id(self.id.as_str());
        monitor::observe(scope, ctx, run, summarize)
            .await
            .map_err(|e| self.annotate(e))
    }
}

#[cfg(test)]
mod tests;
