use super::*;
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq)]
struct ConfigRow {
    config_id: i64,
    scope: String,
    path: String,
    value: Option<String>,
}

impl ColumnMapper for ConfigRow {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
        if cm.mode() == ColumnMapMode::EntityReadAll {
            cm.int64(&mut self.config_id)?
                .string(&mut self.scope)?
                .string(&mut self.path)?
                .null_string(&mut self.value)?;
            return Ok(());
        }
        while cm.next() {
            match cm.column() {
                "config_id" => cm.int64(&mut self.config_id)?,
                "scope" => cm.string(&mut self.scope)?,
                "path" => cm.string(&mut self.path)?,
                "value" => cm.null_string(&mut self.value)?,
                other => return Err(DmlError::not_found(format!("column `{other}`"))),
            };
        }
        Ok(())
    }
}

fn row(columns: &[&str], values: Vec<Value>) -> Row {
    let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    Row::new(Arc::from(columns), values).unwrap()
}

fn sample() -> ConfigRow {
    ConfigRow {
        config_id: 3,
        scope: "default".to_string(),
        path: "web/secure/url".to_string(),
        value: None,
    }
}

#[test]
fn scan_fills_named_fields() {
    let r = row(
        &["path", "config_id", "value"],
        vec![Value::from("general/locale/code"), Value::Int(9), Value::from("de_DE")],
    );
    let mut entity = ConfigRow::default();
    entity.map_columns(&mut ColumnMap::scan(&r, 0)).unwrap();
    assert_eq!(entity.config_id, 9);
    assert_eq!(entity.path, "general/locale/code");
    assert_eq!(entity.value.as_deref(), Some("de_DE"));
    assert_eq!(entity.scope, "");
}

#[test]
fn scan_unknown_column_is_not_found() {
    let r = row(&["config_id", "nope"], vec![Value::Int(1), Value::Int(2)]);
    let err = ConfigRow::default()
        .map_columns(&mut ColumnMap::scan(&r, 0))
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("nope"));
}

#[test]
fn scan_null_into_non_null_field_names_column() {
    let r = row(&["path"], vec![Value::Null]);
    let err = ConfigRow::default()
        .map_columns(&mut ColumnMap::scan(&r, 0))
        .unwrap_err();
    assert!(err.is_not_valid());
    assert!(err.to_string().contains("column `path`"));
}

#[test]
fn positional_scan_without_next() {
    let r = row(&["a", "b"], vec![Value::Int(4), Value::from("x")]);
    let mut id = 0i64;
    let mut name = String::new();
    let mut cm = ColumnMap::scan(&r, 0);
    cm.int64(&mut id).unwrap().string(&mut name).unwrap();
    assert_eq!((id, name.as_str()), (4, "x"));

    let mut extra = 0i64;
    assert!(cm.int64(&mut extra).unwrap_err().is_not_found());
}

#[test]
fn read_all_emits_declaration_order() {
    let mut entity = sample();
    let mut cm = ColumnMap::read_all();
    entity.map_columns(&mut cm).unwrap();
    assert_eq!(
        cm.into_args(),
        vec![
            Value::Int(3),
            Value::from("default"),
            Value::from("web/secure/url"),
            Value::Null,
        ]
    );
}

#[test]
fn read_set_follows_requested_columns() {
    let columns = vec!["main.path".to_string(), "config_id".to_string()];
    let mut entity = sample();
    let mut cm = ColumnMap::read_set(&columns);
    entity.map_columns(&mut cm).unwrap();
    assert_eq!(cm.args(), &[Value::from("web/secure/url"), Value::Int(3)]);
}

#[test]
fn column_is_empty_before_next() {
    let columns = vec!["a".to_string()];
    let mut cm = ColumnMap::read_set(&columns);
    assert_eq!(cm.column(), "");
    assert!(cm.next());
    assert_eq!(cm.column(), "a");
    assert!(!cm.next());
    assert_eq!(cm.column(), "");
}

#[test]
fn collection_scan_replaces_content_on_first_row() {
    let mut items = vec![sample()];
    let first = row(&["config_id"], vec![Value::Int(10)]);
    let second = row(&["config_id"], vec![Value::Int(11)]);
    items.map_columns(&mut ColumnMap::scan(&first, 0)).unwrap();
    items.map_columns(&mut ColumnMap::scan(&second, 1)).unwrap();
    let ids: Vec<i64> = items.iter().map(|c| c.config_id).collect();
    assert_eq!(ids, vec![10, 11]);
}

#[test]
fn collection_read_set_emits_lists() {
    let mut items = vec![
        sample(),
        ConfigRow {
            config_id: 4,
            path: "web/unsecure/url".to_string(),
            ..sample()
        },
    ];
    let columns = vec!["config_id".to_string(), "path".to_string()];
    let mut cm = ColumnMap::collection(&columns);
    items.map_columns(&mut cm).unwrap();
    assert_eq!(
        cm.into_args(),
        vec![
            Value::list([3i64, 4]),
            Value::list(["web/secure/url", "web/unsecure/url"]),
        ]
    );
}

#[test]
fn modes_outside_a_mapper_are_not_supported() {
    let mut items: Vec<ConfigRow> = Vec::new();
    let err = items.map_columns(&mut ColumnMap::read_all()).unwrap_err();
    assert!(err.is_not_supported());
    assert!(err.to_string().contains("EntityReadAll"));

    let columns = vec!["config_id".to_string()];
    let mut cm = ColumnMap::collection(&columns);
    let mut id = 0i64;
    assert!(cm.int64(&mut id).unwrap_err().is_not_supported());
    assert!(ColumnMap::read_all().int64s(&[1]).unwrap_err().is_not_supported());
}

#[test]
fn scan_fn_adapter() {
    let r = row(&["n"], vec![Value::from("42")]);
    let mut total = 0u32;
    let mut mapper = ScanFn::new(|cm| {
        let mut n = 0u32;
        cm.uint32(&mut n)?;
        total += n;
        Ok(())
    });
    mapper.map_columns(&mut ColumnMap::scan(&r, 0)).unwrap();
    assert!(mapper.map_columns(&mut ColumnMap::read_all()).is_err());
    drop(mapper);
    assert_eq!(total, 42);
}
