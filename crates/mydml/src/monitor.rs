//! Query monitoring for statement execution.
//!
//! Every runner call (load, exec, query, prepare, transaction boundaries)
//! produces a [`QueryContext`] that is handed to the connection scope's
//! [`QueryMonitor`] when monitoring is enabled in its [`MonitorConfig`].
//!
//! # Example
//!
//! ```rust,ignore
//! use mydml::monitor::{CompositeMonitor, MonitorConfig, StatsMonitor, TracingMonitor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let stats = Arc::new(StatsMonitor::new());
//! let pool = ConnPool::connect(&config)
//!     .await?
//!     .with_monitor(CompositeMonitor::new().add(TracingMonitor::new()).add_arc(stats.clone()))
//!     .with_monitor_config(
//!         MonitorConfig::new()
//!             .with_slow_query_threshold(Duration::from_millis(250))
//!             .enable_monitoring(),
//!     );
//! ```

mod config;
mod monitors;
mod types;

#[cfg(feature = "tracing")]
mod tracing_monitor;


pub use config::MonitorConfig;
pub use monitors::{CompositeMonitor, NoopMonitor, QueryStats, StatsMonitor};
pub use types::{Event, QueryContext, QueryMonitor, QueryResult, QueryType};

#[cfg(feature = "tracing")]
pub use tracing_monitor::TracingMonitor;

use crate::client::ScopeInfo;
use crate::error::DmlResult;
use std::future::Future;
use std::time::Instant;

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Run `fut` and report it to the scope's monitor.
pub(crate) async fn observe<T, F>(
    scope: &ScopeInfo,
    ctx: QueryContext,
    fut: F,
    summarize: impl FnOnce(&T) -> QueryResult,
) -> DmlResult<T>
where
    F: Future<Output = DmlResult<T>>,
{
    let config = &scope.monitor_config;
    if !config.monitoring_enabled {
        return fut.await;
    }

    scope.monitor.on_query_start(&ctx);
    let start = Instant::now();
    let result = fut.await;
    let duration = start.elapsed();

    let query_result = match &result {
        Ok(value) => summarize(value),
        Err(e) => QueryResult::error(e.to_string()),
    };
    scope.monitor.on_query_complete(&ctx, duration, &query_result);
    if let Some(threshold) = config.slow_query_threshold {
        if duration > threshold {
            scope.monitor.on_slow_query(&ctx, duration);
        }
    }
    result
}
