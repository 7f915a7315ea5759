//! Statements run end to end against an in-memory client.

use mydml::{
    ColumnMap, ColumnMapMode, ColumnMapper, Cte, DmlError, DmlResult, DupKey, ExecResult,
    GenericClient, RawSql, Row, ScopeInfo, Select, Union, Value, With, column,
};
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MemoryClient {
    scope: ScopeInfo,
    rows: Vec<Row>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MemoryClient {
    fn returning(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    fn last(&self) -> (String, Vec<Value>) {
        self.log.lock().unwrap().last().cloned().unwrap()
    }
}

impl GenericClient for MemoryClient {
    fn query(&self, sql: &str, args: &[Value]) -> impl Future<Output = DmlResult<Vec<Row>>> + Send {
        self.log.lock().unwrap().push((sql.to_string(), args.to_vec()));
        let rows = self.rows.clone();
        async move { Ok(rows) }
    }

    fn execute(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send {
        self.log.lock().unwrap().push((sql.to_string(), args.to_vec()));
        let affected = args.len() as u64;
        async move {
            Ok(ExecResult {
                rows_affected: affected,
                last_insert_id: 0,
            })
        }
    }

    fn scope(&self) -> &ScopeInfo {
        &self.scope
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct ConfigValue {
    scope: String,
    path: String,
    value: String,
}

impl ColumnMapper for ConfigValue {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
        if cm.mode() == ColumnMapMode::EntityReadAll {
            cm.string(&mut self.scope)?
                .string(&mut self.path)?
                .string(&mut self.value)?;
            return Ok(());
        }
        while cm.next() {
            match cm.column() {
                "scope" => cm.string(&mut self.scope)?,
                "path" => cm.string(&mut self.path)?,
                "value" => cm.string(&mut self.value)?,
                other => return Err(DmlError::not_found(format!("column `{other}`"))),
            };
        }
        Ok(())
    }
}

fn value(scope: &str, path: &str, v: &str) -> ConfigValue {
    ConfigValue {
        scope: scope.to_string(),
        path: path.to_string(),
        value: v.to_string(),
    }
}

fn rows(columns: &[&str], data: Vec<Vec<Value>>) -> Vec<Row> {
    let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
    data.into_iter()
        .map(|values| Row::new(columns.clone(), values).unwrap())
        .collect()
}

#[tokio::test]
async fn upsert_many_records() {
    let client = MemoryClient::default();
    let mut records = vec![
        value("default", "web/secure/url", "https://shop.test/"),
        value("websites", "web/secure/url", "https://eu.shop.test/"),
    ];
    let res = mydml::insert("core_config_data")
        .add_columns(["scope", "path", "value"])
        .on_duplicate_key([DupKey::values("value")])
        .with_dbr(&client)
        .exec_records(&mut records)
        .await
        .unwrap();

    let (sql, args) = client.last();
    assert_eq!(
        sql,
        "INSERT INTO `core_config_data` (`scope`,`path`,`value`) VALUES (?,?,?),(?,?,?) \
         ON DUPLICATE KEY UPDATE `value`=VALUES(`value`)"
    );
    assert_eq!(res.rows_affected, 6);
    assert_eq!(args[3], Value::from("websites"));
    assert_eq!(args[5], Value::from("https://eu.shop.test/"));
}

#[tokio::test]
async fn union_template_loads_into_a_collection() {
    let client = MemoryClient::returning(rows(
        &["scope", "path", "value"],
        vec![
            vec!["default".into(), "a".into(), "1".into()],
            vec!["stores".into(), "a".into(), "2".into()],
        ],
    ));
    let mut loaded = vec![value("stale", "stale", "stale")];
    let n = Union::template(
        Select::new(["scope", "path", "value"])
            .from("core_config_data_{scope}")
            .filter(column("path").placeholder()),
    )
    .string_replace("{scope}", ["default", "stores"])
    .with_dbr(&client)
    .args(["a", "a"])
    .load(&mut loaded)
    .await
    .unwrap();

    assert_eq!(n, 2);
    assert_eq!(loaded, vec![value("default", "a", "1"), value("stores", "a", "2")]);
}

#[tokio::test]
async fn cte_select_streams_rows() {
    let client = MemoryClient::returning(rows(
        &["id"],
        vec![vec![Value::Int(3)], vec![Value::Int(4)], vec![Value::Int(5)]],
    ));
    let mut ids = Vec::new();
    With::new()
        .recursive()
        .cte(
            Cte::select("tree", Select::new(["entity_id", "parent_id"]).from("catalog_category_entity"))
                .columns(["id", "parent"]),
        )
        .select(Select::new(["id"]).from("tree"))
        .with_dbr(&client)
        .iterate_serial(|cm| {
            let mut id = 0i64;
            while cm.next() {
                cm.int64(&mut id)?;
            }
            ids.push(id);
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(ids, vec![3, 4, 5]);
    assert!(client.last().0.starts_with("WITH RECURSIVE `tree` (`id`,`parent`) AS "));
}

#[tokio::test]
async fn raw_sql_expands_list_arguments() {
    let client = MemoryClient::default();
    RawSql::new("DELETE FROM `core_config_data` WHERE `path` IN ? AND `scope_id` = ?")
        .with_dbr(&client)
        .arg(Value::list(["a", "b"]))
        .arg(0)
        .exec()
        .await
        .unwrap();

    let (sql, args) = client.last();
    assert_eq!(
        sql,
        "DELETE FROM `core_config_data` WHERE `path` IN (?,?) AND `scope_id` = ?"
    );
    assert_eq!(args, vec![Value::from("a"), Value::from("b"), Value::Int(0)]);
}

#[test]
fn free_functions_rewrite_placeholders() {
    let sql = mydml::interpolate(
        "SELECT * FROM `t` WHERE `a` IN ? AND `b` = ?",
        &[Value::list([1i64, 2]), Value::from("x'y")],
    )
    .unwrap();
    assert_eq!(sql, "SELECT * FROM `t` WHERE `a` IN (1,2) AND `b` = 'x\\'y'");

    assert_eq!(
        mydml::repeat("SELECT * FROM `t` WHERE `a` IN (?) AND `b` IN (?)", &[2, 3]).unwrap(),
        "SELECT * FROM `t` WHERE `a` IN (?,?) AND `b` IN (?,?,?)"
    );
    assert!(mydml::repeat("SELECT (?)", &[1, 2]).unwrap_err().is_mismatch());
}
