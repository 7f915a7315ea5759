use super::truncate_sql_bytes;
use super::types::{QueryContext, QueryMonitor, QueryResult};
use std::time::Duration;
use tracing::Level;

/// A `tracing` monitor emitting one event per runner call on target `mydml.sql`.
///
/// Statements served from the build cache are logged without their SQL text.
/// Slow statements are additionally logged at `WARN`.
///
/// Enable via the crate feature: `mydml = { features = ["tracing"] }`.
#[derive(Debug, Clone)]
pub struct TracingMonitor {
    /// Tracing event level for completed calls.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingMonitor {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl TracingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl QueryMonitor for TracingMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let level = if result.is_error() { Level::ERROR } else { self.level };
        let conn_id = ctx.conn_id.as_deref().unwrap_or("-");
        let tx_id = ctx.tx_id.as_deref().unwrap_or("-");
        let statement_id = ctx.statement_id.as_deref().unwrap_or("-");
        if ctx.cached {
            emit_at_level!(
                level,
                target: "mydml.sql",
                event = %ctx.event,
                query_type = ?ctx.query_type,
                table = %ctx.table,
                pool_id = %ctx.pool_id,
                conn_id,
                tx_id,
                statement_id,
                arg_count = ctx.arg_count,
                duration = ?duration,
                result = %result,
                cached = true,
            );
        } else {
            let sql = self.truncate_sql(&ctx.sql);
            emit_at_level!(
                level,
                target: "mydml.sql",
                event = %ctx.event,
                query_type = ?ctx.query_type,
                table = %ctx.table,
                pool_id = %ctx.pool_id,
                conn_id,
                tx_id,
                statement_id,
                arg_count = ctx.arg_count,
                duration = ?duration,
                result = %result,
                sql = %sql,
            );
        }
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        let sql = self.truncate_sql(&ctx.sql);
        tracing::warn!(
            target: "mydml.sql",
            event = %ctx.event,
            table = %ctx.table,
            duration = ?duration,
            sql = %sql,
            "slow query",
        );
    }
}
