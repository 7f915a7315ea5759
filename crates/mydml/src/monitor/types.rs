use std::fmt;
use std::time::Duration;

/// The type of SQL operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    /// Transaction control, DDL, anything else
    Other,
}

impl QueryType {
    /// Detect the query type from SQL text.
    ///
    /// Leading comments (including the correlation comment) are skipped. For
    /// `WITH ..` the statement after the last top-level parenthesis decides.
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = skip_comments(sql);
        if starts_with_keyword(trimmed, "SELECT") || trimmed.starts_with('(') {
            QueryType::Select
        } else if starts_with_keyword(trimmed, "INSERT") || starts_with_keyword(trimmed, "REPLACE") {
            QueryType::Insert
        } else if starts_with_keyword(trimmed, "UPDATE") {
            QueryType::Update
        } else if starts_with_keyword(trimmed, "DELETE") {
            QueryType::Delete
        } else if starts_with_keyword(trimmed, "WITH") {
            Self::detect_cte_dml(trimmed)
        } else {
            QueryType::Other
        }
    }

    fn detect_cte_dml(sql: &str) -> Self {
        let bytes = sql.as_bytes();
        let mut depth: i32 = 0;
        let mut last_top_level = 0;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        last_top_level = i + 1;
                    }
                }
                quote @ (b'\'' | b'"' | b'`') => {
                    i += 1;
                    while i < bytes.len() && bytes[i] != quote {
                        if bytes[i] == b'\\' && quote != b'`' {
                            i += 1;
                        }
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        let remainder = sql.get(last_top_level..).unwrap_or("").trim_start();
        if starts_with_keyword(remainder, "UPDATE") {
            QueryType::Update
        } else if starts_with_keyword(remainder, "DELETE") {
            QueryType::Delete
        } else {
            QueryType::Select
        }
    }
}

fn skip_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    while let Some(after) = rest.strip_prefix("/*") {
        match after.find("*/") {
            Some(end) => rest = after[end + 2..].trim_start(),
            None => return "",
        }
    }
    rest
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.len() >= keyword.len()
        && sql.is_char_boundary(keyword.len())
        && sql[..keyword.len()].eq_ignore_ascii_case(keyword)
        && sql[keyword.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_')
}

/// Runner operation that produced a [`QueryContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Load,
    Exec,
    Query,
    Prepare,
    Begin,
    Commit,
    Rollback,
    IterateSerial,
    IterateParallel,
}

impl Event {
    pub fn as_str(self) -> &'static str {
        match self {
            Event::Load => "Load",
            Event::Exec => "Exec",
            Event::Query => "Query",
            Event::Prepare => "Prepare",
            Event::Begin => "Begin",
            Event::Commit => "Commit",
            Event::Rollback => "Rollback",
            Event::IterateSerial => "IterateSerial",
            Event::IterateParallel => "IterateParallel",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context information about the statement being executed.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub event: Event,
    /// SQL sent to the server.
    pub sql: String,
    /// The statement text came from the build cache.
    pub cached: bool,
    /// Number of arguments bound to the driver.
    pub arg_count: usize,
    pub query_type: QueryType,
    /// Main table of the statement, empty when unknown.
    pub table: String,
    pub pool_id: String,
    pub conn_id: Option<String>,
    pub tx_id: Option<String>,
    pub statement_id: Option<String>,
}

impl QueryContext {
    pub fn new(event: Event, sql: &str, arg_count: usize) -> Self {
        Self {
            event,
            sql: sql.to_string(),
            cached: false,
            arg_count,
            query_type: QueryType::from_sql(sql),
            table: String::new(),
            pool_id: String::new(),
            conn_id: None,
            tx_id: None,
            statement_id: None,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn with_statement_id(mut self, id: impl Into<String>) -> Self {
        self.statement_id = Some(id.into());
        self
    }
}

/// Maximum length for error messages in `QueryResult::Error`.
const MAX_ERROR_LEN: usize = 512;

/// Outcome of a runner call, for monitoring purposes.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Rows read.
    Rows(u64),
    /// Rows changed by a mutation.
    Affected(u64),
    /// Call without a row count (prepare, commit, ..).
    Done,
    /// Failure, truncated to 512 bytes.
    Error(String),
}

impl QueryResult {
    /// Create an error result, truncating long messages.
    pub fn error(msg: String) -> Self {
        if msg.len() > MAX_ERROR_LEN {
            Self::Error(format!("{}...", super::truncate_sql_bytes(&msg, MAX_ERROR_LEN)))
        } else {
            Self::Error(msg)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(n) => write!(f, "{n} rows"),
            QueryResult::Affected(n) => write!(f, "{n} affected"),
            QueryResult::Done => f.write_str("done"),
            QueryResult::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Receives execution events of a connection scope.
pub trait QueryMonitor: Send + Sync {
    /// Called before the statement is sent.
    fn on_query_start(&self, _ctx: &QueryContext) {}

    /// Called after the call completes, successfully or not.
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult);

    /// Called after `on_query_complete` when the call exceeded the slow query threshold.
    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {}
}
