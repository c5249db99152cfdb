//! Change-tracking proxies over runtime-declared interfaces.

use std::sync::Arc;

use rowmap::prelude::*;
use rowmap::{Attribute, MemoryDriver, ResultSet};

fn person() -> Arc<InterfaceDescriptor> {
    let entity = InterfaceDescriptor::builder("IEntity")
        .annotated(
            "Id",
            SqlType::BigInt,
            vec![Attribute::new("Key"), Attribute::new("Column").arg("name", "person_id")],
        )
        .build()
        .unwrap();
    InterfaceDescriptor::builder("IPerson")
        .extends(&entity)
        .member("Name", SqlType::Text)
        .annotated("Age", SqlType::Integer, vec![Attribute::new("Range").arg("min", "0")])
        .build()
        .unwrap()
}

#[test]
fn dirty_set_has_set_semantics() {
    let mut proxy = Proxy::new(person());
    assert!(!proxy.is_dirty());

    assert!(proxy.set("Age", 30).unwrap());
    assert_eq!(proxy.dirty_members(), ["Age"]);

    assert!(!proxy.set("Age", 30).unwrap());
    assert_eq!(proxy.dirty_members(), ["Age"]);

    proxy.set("Name", "Ada").unwrap();
    assert_eq!(proxy.dirty_members().len(), 2);
    assert!(proxy.dirty_members().contains(&"Age"));
    assert!(proxy.dirty_members().contains(&"Name"));

    proxy.mark_clean();
    assert!(!proxy.is_dirty());
    assert!(proxy.dirty_members().is_empty());
    assert_eq!(proxy.get_as::<i32>("age").unwrap(), 30);
}

#[test]
fn populated_members_start_dirty() {
    let mapper = Mapper::new();
    let iface = person();
    let mut driver = MemoryDriver::new();
    driver.push_result(
        ResultSet::new([
            ("id", SqlType::Integer),
            ("name", SqlType::Text),
            ("nickname", SqlType::Text),
        ])
        .row(vec![Value::Int(5), Value::Text("Grace".into()), Value::Text("amazing".into())])
        .row(vec![Value::Int(6), Value::Text("Alan".into()), Value::Null]),
    );

    let mut rows = mapper
        .query_proxies(&mut driver, "select id, name, nickname from people", &Params::new(), &iface)
        .unwrap();
    assert_eq!(rows.len(), 2);

    let first = &mut rows[0];
    assert_eq!(first.dirty_members(), ["Id", "Name"]);
    assert_eq!(first.get("Id"), Some(&Value::BigInt(5)));
    assert_eq!(first.get("Age"), Some(&Value::Null));

    first.mark_clean();
    first.set("Name", "Grace H.").unwrap();
    assert_eq!(first.dirty_members(), ["Name"]);
    // Instances never share storage.
    assert_eq!(rows[1].get_as::<String>("Name").unwrap(), "Alan");
    assert!(rows[1].is_dirty());
}

#[test]
fn member_metadata_survives_on_instances() {
    let proxy = Proxy::new(person());
    let id = proxy.member("Id").unwrap();
    assert!(id.attribute("Key").is_some());
    assert_eq!(id.attribute("Column").and_then(|a| a.get("name")), Some("person_id"));
    assert_eq!(id.declared_in, "IEntity");
    assert_eq!(
        proxy.member("Age").unwrap().attribute("Range").unwrap().get("min"),
        Some("0")
    );
    let names: Vec<&str> = proxy.iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["Id", "Name", "Age"]);
}

#[test]
fn values_are_coerced_to_declared_types() {
    let mut proxy = Proxy::new(person());
    proxy.set("Id", 9_i32).unwrap();
    assert_eq!(proxy.get("Id"), Some(&Value::BigInt(9)));
    assert!(proxy.set("Age", "old").is_err());
    assert!(proxy.set("Missing", 1).is_err());
}

#[test]
fn interfaces_cache_separately_and_purge() {
    let mapper = Mapper::new();
    let a = person();
    let b = person();
    let mut driver = MemoryDriver::new();
    let rows = || ResultSet::from_rows(&["Id"], vec![vec![Value::BigInt(1)]]);
    driver.push_result(rows()).push_result(rows());

    mapper.query_proxies(&mut driver, "q", &Params::new(), &a).unwrap();
    mapper.query_proxies(&mut driver, "q", &Params::new(), &b).unwrap();
    assert_eq!(mapper.cache().len(), 2);
    assert_eq!(mapper.purge_interface(&a), 1);
    assert_eq!(mapper.cache().len(), 1);
}
