//! Derived entities and enums, parameter binding and literal substitution.

use rowmap::prelude::*;
use rowmap::{BoundParam, MemoryDriver, ResultSet};
use serde::{Deserialize, Serialize};

#[derive(SqlEnum, Debug, Clone, Copy, PartialEq)]
#[rowmap(storage = "tinyint")]
enum Status {
    Active = 1,
    Suspended = 2,
    Closed = 9,
}

#[derive(SqlEnum, Debug, Clone, Copy, PartialEq)]
enum Tier {
    Free,
    Pro,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
struct Preferences {
    theme: String,
    notifications: bool,
}

#[derive(Entity, Debug, Clone, PartialEq)]
#[rowmap(default, params)]
struct Account {
    id: i64,
    #[rowmap(column = "display_name")]
    name: String,
    status: Status,
    tier: Option<Tier>,
    prefs: Json<Preferences>,
    #[rowmap(skip)]
    loaded: bool,
}

impl Default for Account {
    fn default() -> Self {
        Account {
            id: 0,
            name: String::new(),
            status: Status::Active,
            tier: None,
            prefs: Json(Preferences::default()),
            loaded: true,
        }
    }
}

#[derive(Entity, Debug, PartialEq)]
#[rowmap(constructor)]
struct Point {
    x: i32,
    y: i32,
    #[rowmap(skip)]
    label: Option<String>,
}

fn accounts() -> ResultSet {
    ResultSet::new([
        ("id", SqlType::BigInt),
        ("display_name", SqlType::Text),
        ("status", SqlType::Text),
        ("tier", SqlType::Integer),
        ("prefs", SqlType::Json),
        ("loaded", SqlType::Boolean),
    ])
    .row(vec![
        Value::BigInt(1),
        Value::Text("ada".into()),
        Value::Text("SUSPENDED".into()),
        Value::Int(1),
        Value::Text(r#"{"theme":"dark","notifications":true}"#.into()),
        Value::Bool(false),
    ])
    .row(vec![
        Value::BigInt(2),
        Value::Text("bob".into()),
        Value::TinyInt(9),
        Value::Null,
        Value::Json(serde_json::json!({"theme": "light", "notifications": false})),
        Value::Bool(false),
    ])
}

#[test]
fn derived_entity_reads_enums_json_and_skips_fields() {
    let mapper = Mapper::new();
    let mut driver = MemoryDriver::new();
    driver.push_result(accounts());

    let rows: Vec<Account> = mapper.query(&mut driver, "q", &Params::new()).unwrap();
    assert_eq!(rows[0].name, "ada");
    assert_eq!(rows[0].status, Status::Suspended);
    assert_eq!(rows[0].tier, Some(Tier::Pro));
    assert_eq!(rows[0].prefs.0.theme, "dark");
    assert!(rows[0].loaded);

    assert_eq!(rows[1].status, Status::Closed);
    assert_eq!(rows[1].tier, None);
    assert!(!rows[1].prefs.0.notifications);
}

#[test]
fn unknown_enum_text_is_a_conversion_error() {
    let mapper = Mapper::new();
    let mut driver = MemoryDriver::new();
    driver.push_result(ResultSet::from_rows(
        &["status"],
        vec![vec![Value::Text("archived".into())]],
    ));

    let err = mapper
        .query::<Account, _>(&mut driver, "q", &Params::new())
        .unwrap_err();
    assert!(err.is_conversion());
    assert!(err.to_string().contains("archived"));
}

#[test]
fn to_params_binds_enum_storage_hints() {
    let mapper = Mapper::new();
    let account = Account {
        id: 5,
        name: "eve".into(),
        status: Status::Closed,
        tier: Some(Tier::Free),
        ..Account::default()
    };
    let (_, bound) = mapper
        .prepare("insert into accounts values (...)", &account.to_params())
        .unwrap();

    let names: Vec<&str> = bound.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["id", "display_name", "status", "tier", "prefs"]);
    assert_eq!(bound[2].value, Value::TinyInt(9));
    assert_eq!(bound[2].sql_type, Some(SqlType::TinyInt));
    assert_eq!(bound[3].value, Value::Int(0));
    assert_eq!(bound[3].sql_type, Some(SqlType::Integer));
    assert!(matches!(bound[4].value, Value::Text(_) | Value::Json(_)));
}

#[test]
fn constructor_entities_bind_by_name() {
    let mapper = Mapper::new();
    let mut driver = MemoryDriver::new();
    driver.push_result(
        ResultSet::new([("Y", SqlType::Integer), ("X", SqlType::Integer)])
            .row(vec![Value::Int(2), Value::Int(1)]),
    );
    let point: Point = mapper.query_single(&mut driver, "q", &Params::new()).unwrap();
    assert_eq!(
        point,
        Point {
            x: 1,
            y: 2,
            label: None,
        }
    );
}

#[test]
fn literal_tokens_render_into_command_text() {
    let mapper = Mapper::new();
    let mut driver = MemoryDriver::new();
    driver.push_result(accounts());

    mapper
        .query::<Account, _>(
            &mut driver,
            "select * from accounts where status = {=status} and id in @ids and vip = {=vip}",
            &Params::new()
                .bind("status", Status::Suspended)
                .bind("vip", false)
                .bind("ids", 3_i64),
        )
        .unwrap();

    let command = driver.last_command().unwrap();
    assert_eq!(
        command.sql,
        "select * from accounts where status = 2 and id in @ids and vip = 0"
    );
    assert_eq!(
        command.params,
        [BoundParam {
            name: "ids".into(),
            value: Value::BigInt(3),
            sql_type: None,
        }]
    );
}

#[test]
fn text_literals_are_refused() {
    let mapper = Mapper::new();
    let err = mapper
        .prepare("select {=name}", &Params::new().bind("name", "x'; drop table t; --".to_string()))
        .unwrap_err();
    assert!(matches!(err, Error::Literal(_)));
}
