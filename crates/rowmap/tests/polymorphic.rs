//! Discriminator-driven polymorphic rows.

use rowmap::prelude::*;
use rowmap::{MemoryDriver, ResultSet};

#[derive(Entity, Debug, Default, PartialEq)]
struct Foo {
    name: String,
}

#[derive(Entity, Debug, Default, PartialEq)]
struct Bar {
    value: f64,
}

#[derive(Debug, PartialEq)]
enum Item {
    Foo(Foo),
    Bar(Bar),
}

fn items() -> ResultSet {
    ResultSet::new([
        ("Name", SqlType::Text),
        ("Type", SqlType::Integer),
        ("Value", SqlType::Double),
    ])
    .row(vec![Value::Text("abc".into()), Value::Int(1), Value::Double(3.0)])
    .row(vec![Value::Text("def".into()), Value::Int(2), Value::Double(4.0)])
}

fn register(mapper: &Mapper) {
    mapper.register_polymorphic::<Item, i32>("Type", |kind| match kind {
        1 => Some(Variant::of(Item::Foo)),
        2 => Some(Variant::of(Item::Bar)),
        _ => None,
    });
}

#[test]
fn resolves_each_row_by_discriminator() {
    let mapper = Mapper::new();
    register(&mapper);
    let mut driver = MemoryDriver::new();
    driver.push_result(items());

    let rows: Vec<Item> = mapper
        .query_polymorphic(&mut driver, "select Name, Type, Value from items", &Params::new())
        .unwrap();
    assert_eq!(
        rows,
        [
            Item::Foo(Foo { name: "abc".into() }),
            Item::Bar(Bar { value: 4.0 }),
        ]
    );
}

#[test]
fn concrete_materializers_are_cached_per_type() {
    let mapper = Mapper::new();
    register(&mapper);
    let mut driver = MemoryDriver::new();
    driver.push_result(
        items()
            .row(vec![Value::Text("ghi".into()), Value::Int(1), Value::Null])
            .row(vec![Value::Text("jkl".into()), Value::Int(1), Value::Null]),
    );

    let rows: Vec<Item> = mapper.query_polymorphic(&mut driver, "q", &Params::new()).unwrap();
    assert_eq!(rows.len(), 4);
    let stats = mapper.cache().stats();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 2);
}

#[test]
fn unrecognized_discriminator_names_the_value() {
    let mapper = Mapper::new();
    register(&mapper);
    let mut driver = MemoryDriver::new();
    driver.push_result(
        ResultSet::new([("Name", SqlType::Text), ("Type", SqlType::Integer)])
            .row(vec![Value::Text("zzz".into()), Value::Int(9)]),
    );

    let err = mapper
        .query_polymorphic::<Item, _>(&mut driver, "q", &Params::new())
        .unwrap_err();
    match err {
        Error::UnrecognizedVariant(e) => {
            assert_eq!(e.value, "9");
            assert_eq!(e.column, "Type");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn last_registration_wins() {
    let mapper = Mapper::new();
    register(&mapper);
    let replaced = mapper.register_polymorphic::<Item, String>("Name", |name| {
        (name == "abc").then(|| Variant::of(Item::Foo))
    });
    assert!(replaced);

    let mut driver = MemoryDriver::new();
    driver.push_result(items());
    let err = mapper
        .query_polymorphic::<Item, _>(&mut driver, "q", &Params::new())
        .unwrap_err();
    assert!(matches!(err, Error::UnrecognizedVariant(ref e) if e.value == "'def'"));
}

#[test]
fn missing_registration_is_a_construction_error() {
    let mapper = Mapper::new();
    let mut driver = MemoryDriver::new();
    driver.push_result(items());
    let err = mapper
        .query_polymorphic::<Item, _>(&mut driver, "q", &Params::new())
        .unwrap_err();
    assert!(matches!(err, Error::Construction(_)));
}
