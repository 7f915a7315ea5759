use super::*;
use crate::builder::{Delete, Insert, Select, Union, Update};
use crate::client::ScopeInfo;
use crate::condition::{column, columns};
use crate::error::ErrorKind;
use crate::monitor::{MonitorConfig, QueryContext, QueryMonitor};
use std::sync::Mutex;
use std::time::Duration;

/// Records every call and answers with canned rows.
#[derive(Default)]
struct MockClient {
    scope: ScopeInfo,
    rows: Vec<Row>,
    fail: Option<String>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    prepared: Mutex<Vec<String>>,
}

impl MockClient {
    fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    fn last_call(&self) -> (String, Vec<Value>) {
        self.calls.lock().unwrap().last().cloned().expect("no call recorded")
    }

    fn record(&self, sql: &str, args: &[Value]) -> DmlResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), args.to_vec()));
        match &self.fail {
            Some(msg) => Err(DmlError::client(msg.clone())),
            None => Ok(()),
        }
    }
}

impl GenericClient for MockClient {
    fn query(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<Vec<Row>>> + Send {
        let result = self.record(sql, args).map(|()| self.rows.clone());
        async move { result }
    }

    fn execute(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send {
        let result = self.record(sql, args).map(|()| ExecResult {
            rows_affected: 1,
            last_insert_id: 42,
        });
        async move { result }
    }

    fn prepare(&self, sql: &str) -> impl Future<Output = DmlResult<()>> + Send {
        self.prepared.lock().unwrap().push(sql.to_string());
        async { Ok(()) }
    }

    fn scope(&self) -> &ScopeInfo {
        &self.scope
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct ConfigRow {
    config_id: i64,
    path: String,
    value: Option<String>,
}

impl ConfigRow {
    fn new(config_id: i64, path: &str, value: Option<&str>) -> Self {
        Self {
            config_id,
            path: path.to_string(),
            value: value.map(str::to_string),
        }
    }
}

impl ColumnMapper for ConfigRow {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
        if cm.mode() == crate::mapper::ColumnMapMode::EntityReadAll {
            cm.int64(&mut self.config_id)?
                .string(&mut self.path)?
                .null_string(&mut self.value)?;
            return Ok(());
        }
        while cm.next() {
            match cm.column() {
                "config_id" => cm.int64(&mut self.config_id)?,
                "path" => cm.string(&mut self.path)?,
                "value" => cm.null_string(&mut self.value)?,
                other => return Err(cm.unsupported_mode().context(format!("column `{other}`"))),
            };
        }
        Ok(())
    }
}

fn config_rows() -> Vec<Row> {
    let columns: Arc<[String]> = Arc::from(vec![
        "config_id".to_string(),
        "path".to_string(),
        "value".to_string(),
    ]);
    vec![
        Row::new(
            columns.clone(),
            vec![Value::Int(1), Value::from("web/secure/url"), Value::from("https://a/")],
        )
        .unwrap(),
        Row::new(
            columns,
            vec![Value::Int(2), Value::from("web/unsecure/url"), Value::Null],
        )
        .unwrap(),
    ]
}

fn config_select() -> Select {
    Select::new(["config_id", "path", "value"])
        .from("core_config_data")
        .filter(column("path").like().placeholder())
}

#[tokio::test]
async fn load_scans_every_row() {
    let client = MockClient::with_rows(config_rows());
    let mut rows: Vec<ConfigRow> = Vec::new();
    let n = config_select()
        .with_dbr(&client)
        .arg("web/%")
        .load(&mut rows)
        .await
        .unwrap();

    assert_eq!(n, 2);
    assert_eq!(
        rows,
        vec![
            ConfigRow::new(1, "web/secure/url", Some("https://a/")),
            ConfigRow::new(2, "web/unsecure/url", None),
        ]
    );
    let (sql, args) = client.last_call();
    assert_eq!(
        sql,
        "SELECT `config_id`, `path`, `value` FROM `core_config_data` WHERE (`path` LIKE ?)"
    );
    assert_eq!(args, vec![Value::from("web/%")]);
}

#[tokio::test]
async fn load_first_column_helpers() {
    let client = MockClient::with_rows(config_rows());
    let dbr = config_select().with_dbr(&client).arg("web/%");

    assert_eq!(dbr.load_int64s().await.unwrap(), vec![1, 2]);
    assert_eq!(dbr.load_int64().await.unwrap(), Some(1));

    assert_eq!(dbr.load_strings().await.unwrap(), vec!["1", "2"]);

    let empty = MockClient::default();
    let none = config_select()
        .with_dbr(&empty)
        .arg("x")
        .load_int64()
        .await
        .unwrap();
    assert_eq!(none, None);
}

#[tokio::test]
async fn exec_binds_statement_args_before_runner_args() {
    let client = MockClient::default();
    let upd = Update::new("core_config_data")
        .set_value("value", "https://b/")
        .set_placeholder("updated_by")
        .filter(column("config_id").placeholder());
    let res = upd
        .with_dbr(&client)
        .args([Value::from("admin"), Value::Int(7)])
        .exec()
        .await
        .unwrap();

    assert_eq!(res, ExecResult { rows_affected: 1, last_insert_id: 42 });
    let (sql, args) = client.last_call();
    assert_eq!(
        sql,
        "UPDATE `core_config_data` SET `value`='https://b/', `updated_by`=? WHERE (`config_id` = ?)"
    );
    assert_eq!(args, vec![Value::from("admin"), Value::Int(7)]);
}

#[tokio::test]
async fn argument_count_mismatch_is_not_valid_and_names_the_table() {
    let client = MockClient::default();
    let dbr = config_select().with_dbr(&client);
    let err = dbr.load(&mut Vec::<ConfigRow>::new()).await.unwrap_err();
    assert!(err.is_not_valid());
    let message = err.to_string();
    assert!(message.contains("table `core_config_data`"));
    assert!(message.contains(dbr.statement_id()));
    assert!(client.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn client_errors_carry_the_statement_context() {
    let client = MockClient {
        fail: Some("server has gone away".to_string()),
        ..MockClient::default()
    };
    let err = Delete::new("core_config_data")
        .with_dbr(&client)
        .exec()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Driver);
    assert!(err.to_string().contains("server has gone away"));
    assert!(err.to_string().contains("table `core_config_data`"));
}

#[tokio::test]
async fn interpolation_inlines_every_argument() {
    let client = MockClient::default();
    Delete::new("core_config_data")
        .filter(column("config_id").greater().placeholder())
        .filter(column("scope_id").in_().placeholder())
        .with_dbr(&client)
        .arg(2)
        .arg(Value::list([0i64, 1]))
        .interpolate()
        .exec()
        .await
        .unwrap();

    let (sql, args) = client.last_call();
    assert_eq!(
        sql,
        "DELETE FROM `core_config_data` WHERE (`config_id` > 2) AND (`scope_id` IN (0,1))"
    );
    assert!(args.is_empty());
}

#[tokio::test]
async fn list_arguments_expand_placeholders() {
    let client = MockClient::with_rows(config_rows());
    Select::new(["path"])
        .from("core_config_data")
        .filter(column("config_id").in_().placeholder())
        .with_dbr(&client)
        .arg(Value::list([1i64, 2, 3]))
        .query()
        .await
        .unwrap();

    let (sql, args) = client.last_call();
    assert_eq!(
        sql,
        "SELECT `path` FROM `core_config_data` WHERE (`config_id` IN (?,?,?))"
    );
    assert_eq!(args, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[tokio::test]
async fn union_template_expands_tuple_lists_per_branch() {
    let client = MockClient::default();
    Union::template(
        Select::new(["value"])
            .from("catalog_product_entity_{type}")
            .filter(columns(["entity_id", "store_id"]).in_().tuples()),
    )
    .string_replace("{type}", ["varchar", "int"])
    .with_dbr(&client)
    .arg(Value::list([Value::list([1i64, 0]), Value::list([2i64, 1])]))
    .arg(Value::list([Value::list([3i64, 0])]))
    .query()
    .await
    .unwrap();

    let (sql, args) = client.last_call();
    assert_eq!(
        sql,
        "(SELECT `value` FROM `catalog_product_entity_varchar` \
         WHERE ((`entity_id`,`store_id`) IN ((?,?),(?,?)))) \
         UNION (SELECT `value` FROM `catalog_product_entity_int` \
         WHERE ((`entity_id`,`store_id`) IN ((?,?))))"
    );
    assert_eq!(
        args,
        vec![
            Value::Int(1),
            Value::Int(0),
            Value::Int(2),
            Value::Int(1),
            Value::Int(3),
            Value::Int(0),
        ]
    );
}

#[tokio::test]
async fn exec_records_renders_one_row_per_record() {
    let client = MockClient::default();
    let mut records = vec![
        ConfigRow::new(5, "a/b/c", Some("1")),
        ConfigRow::new(6, "a/b/d", None),
    ];
    Insert::new("core_config_data")
        .add_columns(["path", "value"])
        .with_dbr(&client)
        .exec_records(&mut records)
        .await
        .unwrap();

    let (sql, args) = client.last_call();
    assert_eq!(
        sql,
        "INSERT INTO `core_config_data` (`path`,`value`) VALUES (?,?),(?,?)"
    );
    assert_eq!(
        args,
        vec![
            Value::from("a/b/c"),
            Value::from("1"),
            Value::from("a/b/d"),
            Value::Null,
        ]
    );
}

#[tokio::test]
async fn exec_record_reads_named_placeholders() {
    let client = MockClient::default();
    let mut record = ConfigRow::new(9, "web/cookie/lifetime", Some("3600"));
    Update::new("core_config_data")
        .set_placeholder("value")
        .filter(column("path").placeholder())
        .with_dbr(&client)
        .exec_record(&mut record)
        .await
        .unwrap();

    let (sql, args) = client.last_call();
    assert_eq!(sql, "UPDATE `core_config_data` SET `value`=? WHERE (`path` = ?)");
    assert_eq!(
        args,
        vec![Value::from("3600"), Value::from("web/cookie/lifetime")]
    );
}

#[tokio::test]
async fn exec_record_leaves_trailing_slots_to_runner_args() {
    let client = MockClient::default();
    let mut record = ConfigRow::new(9, "web/cookie/lifetime", Some("3600"));
    Update::new("core_config_data")
        .set_placeholder("value")
        .filter(column("path").placeholder())
        .filter(column("config_id").placeholder())
        .with_dbr(&client)
        .arg(9i64)
        .exec_record(&mut record)
        .await
        .unwrap();

    let (sql, args) = client.last_call();
    assert_eq!(
        sql,
        "UPDATE `core_config_data` SET `value`=? WHERE (`path` = ?) AND (`config_id` = ?)"
    );
    assert_eq!(
        args,
        vec![
            Value::from("3600"),
            Value::from("web/cookie/lifetime"),
            Value::Int(9),
        ]
    );
}

#[tokio::test]
async fn exec_record_with_too_many_runner_args_is_not_valid() {
    let client = MockClient::default();
    let mut record = ConfigRow::new(9, "web/cookie/lifetime", Some("3600"));
    let err = Update::new("core_config_data")
        .set_placeholder("value")
        .with_dbr(&client)
        .arg(1i64)
        .arg(2i64)
        .exec_record(&mut record)
        .await
        .unwrap_err();
    assert!(err.is_not_valid());
    assert!(client.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn exec_records_requires_a_record() {
    let client = MockClient::default();
    let err = Insert::new("t")
        .add_columns(["path"])
        .with_dbr(&client)
        .exec_records::<ConfigRow>(&mut [])
        .await
        .unwrap_err();
    assert!(err.is_out_of_range());
}

#[tokio::test]
async fn with_collection_fills_in_lists() {
    let client = MockClient::with_rows(config_rows());
    let mut wanted = vec![
        ConfigRow::new(1, "web/secure/url", None),
        ConfigRow::new(2, "web/unsecure/url", None),
    ];
    Select::new(["config_id", "path", "value"])
        .from("core_config_data")
        .filter(column("config_id").in_().placeholder())
        .with_dbr(&client)
        .with_collection(&mut wanted)
        .unwrap()
        .query()
        .await
        .unwrap();

    let (sql, args) = client.last_call();
    assert_eq!(
        sql,
        "SELECT `config_id`, `path`, `value` FROM `core_config_data` WHERE (`config_id` IN (?,?))"
    );
    assert_eq!(args, vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn with_collection_without_placeholders_is_not_found() {
    let client = MockClient::default();
    let err = Select::new(["path"])
        .from("core_config_data")
        .with_dbr(&client)
        .with_collection(&mut Vec::<ConfigRow>::new())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn correlation_ids_are_embedded_outside_transactions() {
    let client = MockClient {
        scope: ScopeInfo::pool().with_embedded_ids(true),
        ..MockClient::default()
    };
    let dbr = Delete::new("t").with_dbr(&client);
    dbr.exec().await.unwrap();
    let (sql, _) = client.last_call();
    assert_eq!(sql, format!("/*ID${}*/ DELETE FROM `t`", dbr.statement_id()));

    // to_sql never carries the comment
    assert_eq!(dbr.to_sql().unwrap().0, "DELETE FROM `t`");

    let tx_client = MockClient {
        scope: client.scope.tx(),
        ..MockClient::default()
    };
    Delete::new("t").with_dbr(&tx_client).exec().await.unwrap();
    assert_eq!(tx_client.last_call().0, "DELETE FROM `t`");
}

#[test]
fn clones_get_their_own_statement_id() {
    let client = MockClient::default();
    let dbr = Delete::new("t").with_dbr(&client).arg(1);
    let copy = dbr.clone();
    assert_ne!(dbr.statement_id(), copy.statement_id());
    assert_eq!(copy.to_sql().unwrap_err().kind(), ErrorKind::NotValid);
}

#[tokio::test]
async fn iterate_serial_streams_rows() {
    let client = MockClient::with_rows(config_rows());
    let mut paths = Vec::new();
    let n = config_select()
        .with_dbr(&client)
        .arg("web/%")
        .iterate_serial(|cm| {
            let mut row = ConfigRow::default();
            row.map_columns(cm)?;
            paths.push(row.path);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(n, 2);
    assert_eq!(paths, vec!["web/secure/url", "web/unsecure/url"]);
}

#[tokio::test]
async fn iterate_serial_stops_at_the_first_error() {
    let client = MockClient::with_rows(config_rows());
    let err = config_select()
        .with_dbr(&client)
        .arg("web/%")
        .iterate_serial(|_| Err(DmlError::not_found("stop")))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn iterate_parallel_processes_all_rows() {
    let client = MockClient::with_rows(config_rows());
    let seen = Mutex::new(Vec::new());
    let n = config_select()
        .with_dbr(&client)
        .arg("web/%")
        .iterate_parallel(2, |row| {
            let seen = &seen;
            async move {
                let id: i64 = row.try_get("config_id")?;
                seen.lock().unwrap().push(id);
                Ok::<(), DmlError>(())
            }
        })
        .await
        .unwrap();
    assert_eq!(n, 2);
    let mut seen = seen.into_inner().unwrap();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2]);
}

#[tokio::test]
async fn iterate_parallel_returns_the_first_worker_error() {
    let client = MockClient::with_rows(config_rows());
    let err = config_select()
        .with_dbr(&client)
        .arg("web/%")
        .iterate_parallel(1, |row| async move {
            let id: i64 = row.try_get("config_id")?;
            if id == 2 {
                return Err(DmlError::not_found(format!("config {id}")));
            }
            Ok::<(), DmlError>(())
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("config 2"));
}

#[tokio::test]
async fn iterate_parallel_needs_a_worker() {
    let client = MockClient::with_rows(config_rows());
    let err = config_select()
        .with_dbr(&client)
        .arg("web/%")
        .iterate_parallel(0, |_row| async { Ok::<(), DmlError>(()) })
        .await
        .unwrap_err();
    assert!(err.is_out_of_range());
    assert!(client.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn prepared_statements_hand_out_fresh_runners() {
    let client = MockClient::with_rows(config_rows());
    let stmt = config_select().with_dbr(&client).prepare().await.unwrap();
    assert_eq!(
        *client.prepared.lock().unwrap(),
        vec![stmt.sql().to_string()]
    );

    let a = stmt.with_dbr().arg("web/%");
    let b = stmt.with_dbr().arg("general/%");
    assert_ne!(a.statement_id(), b.statement_id());
    assert_eq!(a.load_int64s().await.unwrap(), vec![1, 2]);
    b.query().await.unwrap();
    assert_eq!(client.last_call().1, vec![Value::from("general/%")]);
}

#[derive(Default)]
struct CacheRecorder {
    seen: Mutex<Vec<(bool, String)>>,
}

impl QueryMonitor for CacheRecorder {
    fn on_query_complete(&self, ctx: &QueryContext, _duration: Duration, _result: &QueryResult) {
        self.seen
            .lock()
            .unwrap()
            .push((ctx.cached, ctx.table.clone()));
    }
}

#[tokio::test]
async fn monitor_sees_build_cache_hits() {
    let recorder = Arc::new(CacheRecorder::default());
    let client = MockClient {
        scope: ScopeInfo::pool()
            .with_monitor(recorder.clone())
            .with_monitor_config(MonitorConfig::new().enable_monitoring()),
        ..MockClient::default()
    };
    let dbr = Delete::new("t").with_dbr(&client);
    dbr.exec().await.unwrap();
    dbr.exec().await.unwrap();

    let seen = recorder.seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![(false, "t".to_string()), (true, "t".to_string())]
    );
}

#[tokio::test]
async fn runner_builds_warm_the_source_builder() {
    let client = MockClient::with_rows(config_rows());
    let sel = config_select();
    assert!(!sel.is_cached());
    sel.with_dbr(&client).arg("web/%").query().await.unwrap();
    assert!(sel.is_cached());

    let narrowed = sel.clone().filter(column("config_id").placeholder());
    assert!(!narrowed.is_cached());
    assert!(sel.is_cached());
}

#[tokio::test]
async fn single_placeholder_in_follows_the_argument_length() {
    let client = MockClient::default();
    let sel = Select::new(["config_id"])
        .from("core_config_data")
        .filter(column("config_id").in_().placeholder());

    sel.with_dbr(&client)
        .arg(Value::list([199i64]))
        .query()
        .await
        .unwrap();
    let (sql, args) = client.last_call();
    assert!(sql.ends_with("WHERE (`config_id` IN (?))"));
    assert_eq!(args.len(), 1);

    sel.with_dbr(&client)
        .arg(Value::list([199i64, 217]))
        .query()
        .await
        .unwrap();
    let (sql, args) = client.last_call();
    assert!(sql.ends_with("WHERE (`config_id` IN (?,?))"));
    assert_eq!(args, vec![Value::Int(199), Value::Int(217)]);
}

#[tokio::test]
async fn raw_sql_runs_through_the_client() {
    let client = MockClient::with_rows(config_rows());
    let ids = client
        .with_raw_sql("SELECT `config_id` FROM `core_config_data` WHERE `path` LIKE ?")
        .arg("web/%")
        .load_int64s()
        .await
        .unwrap();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(client.last_call().1, vec![Value::from("web/%")]);
}
