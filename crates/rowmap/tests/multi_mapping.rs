//! Splitting one row into several objects.

use std::collections::BTreeMap;

use rowmap::prelude::*;
use rowmap::{MemoryDriver, ResultSet, ShapeErrorKind};

#[derive(Entity, Debug, Default, Clone, PartialEq)]
struct Parent {
    id: i64,
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
struct Child {
    id: i64,
}

fn parent_child_rows() -> ResultSet {
    [(1, 1), (1, 2), (2, 3), (1, 4), (3, 5)].into_iter().fold(
        ResultSet::new([("Id", SqlType::BigInt), ("Id", SqlType::BigInt)]),
        |set, (parent, child)| set.row(vec![Value::BigInt(parent), Value::BigInt(child)]),
    )
}

#[test]
fn splits_on_second_id_preserving_row_order() {
    let mapper = Mapper::new();
    let mut driver = MemoryDriver::new();
    driver.push_result(parent_child_rows());

    let mut calls = 0;
    let pairs = mapper
        .query_map(
            &mut driver,
            "select p.Id, c.Id from parent p join child c on c.ParentId = p.Id",
            &Params::new(),
            SplitOn::Default,
            |(parent, child): (Parent, Child)| {
                calls += 1;
                (parent.id, child.id)
            },
        )
        .unwrap();

    assert_eq!(calls, 5);
    assert_eq!(pairs, [(1, 1), (1, 2), (2, 3), (1, 4), (3, 5)]);
}

#[test]
fn combine_can_fold_parents_by_identity() {
    let mapper = Mapper::new();
    let mut driver = MemoryDriver::new();
    driver.push_result(parent_child_rows());

    let mut children: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    let parents = mapper
        .query_map(
            &mut driver,
            "q",
            &Params::new(),
            "Id",
            |(parent, child): (Parent, Child)| {
                children.entry(parent.id).or_default().push(child.id);
                parent
            },
        )
        .unwrap();

    // The engine hands back one parent per row; deduplication is the caller's.
    assert_eq!(parents.len(), 5);
    assert_eq!(children[&1], [1, 2, 4]);
    assert_eq!(children[&2], [3]);
    assert_eq!(children[&3], [5]);
}

#[derive(Entity, Debug, Default, PartialEq)]
struct Post {
    id: i64,
    title: String,
}

#[derive(Entity, Debug, Default, PartialEq)]
struct User {
    user_id: i64,
    name: String,
}

#[derive(Entity, Debug, Default, PartialEq)]
struct Comment {
    comment_id: i64,
    body: String,
}

#[test]
fn three_way_split_by_distinct_names() {
    let mapper = Mapper::new();
    let mut driver = MemoryDriver::new();
    driver.push_result(
        ResultSet::new([
            ("id", SqlType::BigInt),
            ("title", SqlType::Text),
            ("user_id", SqlType::BigInt),
            ("name", SqlType::Text),
            ("comment_id", SqlType::BigInt),
            ("body", SqlType::Text),
        ])
        .row(vec![
            Value::BigInt(1),
            Value::Text("hello".into()),
            Value::BigInt(7),
            Value::Text("ada".into()),
            Value::BigInt(70),
            Value::Text("first".into()),
        ]),
    );

    let rows = mapper
        .query_map(
            &mut driver,
            "q",
            &Params::new(),
            "user_id, comment_id",
            |(post, user, comment): (Post, User, Comment)| (post, user, comment),
        )
        .unwrap();
    let (post, user, comment) = &rows[0];
    assert_eq!(post.title, "hello");
    assert_eq!(user.name, "ada");
    assert_eq!(comment.body, "first");
}

#[test]
fn ambiguous_name_needs_an_ordinal() {
    let rows = || {
        ResultSet::new([
            ("Id", SqlType::BigInt),
            ("Id", SqlType::BigInt),
            ("Id", SqlType::BigInt),
        ])
        .row(vec![Value::BigInt(1), Value::BigInt(2), Value::BigInt(3)])
    };
    let mapper = Mapper::new();
    let mut driver = MemoryDriver::new();

    driver.push_result(rows());
    let err = mapper
        .query_map(&mut driver, "q", &Params::new(), SplitOn::Default, |(p, c): (Parent, Child)| (p, c))
        .unwrap_err();
    assert_eq!(err.shape_kind(), Some(ShapeErrorKind::AmbiguousSplit));

    driver.push_result(rows());
    let pairs = mapper
        .query_map(
            &mut driver,
            "q",
            &Params::new(),
            SplitOn::ordinals(vec![2]),
            |(p, c): (Parent, Child)| (p.id, c.id),
        )
        .unwrap();
    assert_eq!(pairs, [(1, 3)]);
}

#[test]
fn each_range_gets_its_own_cached_materializer() {
    let mapper = Mapper::new();
    let mut driver = MemoryDriver::new();
    driver.push_result(parent_child_rows()).push_result(parent_child_rows());

    for _ in 0..2 {
        mapper
            .query_map(&mut driver, "q", &Params::new(), SplitOn::Default, |(p, c): (Parent, Child)| (p, c))
            .unwrap();
    }
    let stats = mapper.cache().stats();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 2);
}
