//! Materializer compilation.
//!
//! Compiling reflects over an [`EntityDescriptor`] once for a given column
//! window and produces a [`Materializer`]: a shareable closure that turns
//! the cursor's current row into a `T` without looking at names again.

use std::fmt;
use std::sync::Arc;

use crate::config::CompileOptions;
use crate::cursor::RowCursor;
use crate::entity::{ArgsBuilder, Constructor, DefaultBuilder, Entity, EntityDescriptor, MemberSetter};
use crate::error::{Error, Result};
use crate::handler::TypeHandlers;
use crate::row::ColumnInfo;
use crate::shape::Shape;

type ReadFn<T> = dyn Fn(&dyn RowCursor) -> Result<T> + Send + Sync;

/// A compiled row-to-object function.
///
/// Clones share the same compiled closure; [`Materializer::ptr_eq`] tells
/// whether two handles came from the same compilation.
pub struct Materializer<T> {
    read: Arc<ReadFn<T>>,
}

impl<T> Clone for Materializer<T> {
    fn clone(&self) -> Self {
        Self {
            read: Arc::clone(&self.read),
        }
    }
}

impl<T> Materializer<T> {
    /// Wrap a hand-written row function.
    pub fn from_fn(read: impl Fn(&dyn RowCursor) -> Result<T> + Send + Sync + 'static) -> Self {
        Self {
            read: Arc::new(read),
        }
    }

    /// Materialize the cursor's current row.
    pub fn read(&self, cursor: &dyn RowCursor) -> Result<T> {
        (self.read)(cursor)
    }

    /// Whether both handles share one compiled closure.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.read), Arc::as_ptr(&other.read))
    }
}

impl<T> fmt::Debug for Materializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Materializer")
            .field("target", &std::any::type_name::<T>())
            .field("ptr", &Arc::as_ptr(&self.read).cast::<()>())
            .finish()
    }
}

enum Init<T> {
    Default(DefaultBuilder<T>),
    Args {
        build: ArgsBuilder<T>,
        /// Cursor ordinal per argument; `None` takes the missing-column default
        ordinals: Vec<Option<usize>>,
        names: Vec<String>,
    },
}

struct Setter<T> {
    ordinal: usize,
    column: String,
    assign: MemberSetter<T>,
}

/// Compile a materializer for `T` over the columns of `window`, which start
/// at cursor ordinal `start`.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(entity = std::any::type_name::<T>(), columns = window.len(), start = start)
)]
pub(crate) fn compile_entity<T: Entity>(
    window: &Shape,
    start: usize,
    handlers: &TypeHandlers,
    options: CompileOptions,
) -> Result<Materializer<T>> {
    let descriptor = T::describe();
    let target = std::any::type_name::<T>();

    if let Some(build) = descriptor.loose_builder() {
        tracing::debug!("Capturing every column");
        let info = Arc::new(ColumnInfo::new(
            window.columns().iter().map(|c| c.name.clone()).collect(),
        ));
        let end = start + window.len();
        return Ok(Materializer::from_fn(move |cursor| {
            let values = (start..end)
                .map(|i| cursor.value(i).cloned())
                .collect::<Result<Vec<_>>>()?;
            Ok(build(Arc::clone(&info), values))
        }));
    }

    let mut consumed = vec![false; window.len()];
    let init = match select_constructor(&descriptor, window, options)? {
        Some(ctor) => {
            tracing::debug!(arity = ctor.arity(), positional = ctor.is_positional(), "Using constructor");
            constructor_init(ctor, window, start, handlers, options, &mut consumed)?
        }
        None => match descriptor.default_builder() {
            Some(make) => Init::Default(make),
            None => {
                let columns: Vec<&str> = window.columns().iter().map(|c| c.name.as_str()).collect();
                return Err(Error::construction(
                    target,
                    format!(
                        "no parameterless constructor and no constructor matching columns {columns:?}"
                    ),
                ));
            }
        },
    };

    let mut setters = Vec::new();
    for (i, column) in window.columns().iter().enumerate() {
        if consumed[i] {
            continue;
        }
        let members = descriptor.members();
        let Some(member) = position_by_name(members, &column.name, options, |m| m.name())
            .map(|m| &members[m])
        else {
            tracing::trace!(column = %column.name, "Column has no matching member");
            continue;
        };
        setters.push(Setter {
            ordinal: start + i,
            column: column.name.clone(),
            assign: member.bind(handlers),
        });
    }
    tracing::debug!(setters = setters.len(), "Compiled materializer");

    let apply_nulls = options.apply_null_values;
    Ok(Materializer::from_fn(move |cursor| {
        let mut value = match &init {
            Init::Default(make) => make(),
            Init::Args {
                build,
                ordinals,
                names,
            } => {
                let args = ordinals
                    .iter()
                    .map(|ordinal| ordinal.map(|i| cursor.value(i)).transpose())
                    .collect::<Result<Vec<_>>>()?;
                build(args.as_slice(), names.as_slice()).map_err(|e| e.in_target(target))?
            }
        };
        for setter in &setters {
            let column_value = cursor.value(setter.ordinal)?;
            if column_value.is_null() && !apply_nulls {
                continue;
            }
            (setter.assign)(&mut value, column_value)
                .map_err(|e| e.in_column(&setter.column).in_target(target))?;
        }
        Ok(value)
    }))
}

/// Pick the constructor to use, or `None` for the parameterless one.
///
/// Preference: a positional constructor; the single constructor whose
/// parameters all name returned columns; a constructor marked preferred;
/// the parameterless constructor; the widest fully matching constructor.
fn select_constructor<'d, T: 'static>(
    descriptor: &'d EntityDescriptor<T>,
    window: &Shape,
    options: CompileOptions,
) -> Result<Option<&'d Constructor<T>>> {
    let constructors = descriptor.constructors();
    if let Some(ctor) = constructors.iter().find(|c| c.is_positional()) {
        return Ok(Some(ctor));
    }
    for ctor in constructors {
        if ctor.params().len() != ctor.arity() {
            return Err(Error::construction(
                descriptor.name(),
                format!(
                    "constructor names {} parameters but takes {} arguments",
                    ctor.params().len(),
                    ctor.arity()
                ),
            ));
        }
    }

    let matching: Vec<&Constructor<T>> = constructors
        .iter()
        .filter(|c| {
            c.params().iter().all(|p| {
                window
                    .columns()
                    .iter()
                    .any(|col| options.names_match(&col.name, p))
            })
        })
        .collect();

    if matching.len() == 1 {
        return Ok(Some(matching[0]));
    }
    if let Some(ctor) = constructors.iter().find(|c| c.is_preferred()) {
        return Ok(Some(ctor));
    }
    if descriptor.has_default_constructor() {
        return Ok(None);
    }
    Ok(matching
        .into_iter()
        .min_by_key(|c| std::cmp::Reverse(c.arity())))
}

fn constructor_init<T: 'static>(
    ctor: &Constructor<T>,
    window: &Shape,
    start: usize,
    handlers: &TypeHandlers,
    options: CompileOptions,
    consumed: &mut [bool],
) -> Result<Init<T>> {
    let mut ordinals = Vec::with_capacity(ctor.arity());
    let mut names = Vec::with_capacity(ctor.arity());

    if ctor.is_positional() {
        for i in 0..ctor.arity() {
            match window.column(i) {
                Some(column) => {
                    ordinals.push(Some(start + i));
                    names.push(column.name.clone());
                    consumed[i] = true;
                }
                None => {
                    ordinals.push(None);
                    names.push(format!("#{i}"));
                }
            }
        }
    } else {
        for param in ctor.params() {
            match position_by_name(window.columns(), param, options, |c| c.name.as_str()) {
                Some(i) => {
                    ordinals.push(Some(start + i));
                    names.push(window.columns()[i].name.clone());
                    consumed[i] = true;
                }
                None => {
                    ordinals.push(None);
                    names.push((*param).to_string());
                }
            }
        }
    }

    Ok(Init::Args {
        build: ctor.bind(handlers),
        ordinals,
        names,
    })
}

/// Index of the item whose name matches `name`, preferring an exact match
/// over a case-insensitive (or underscore-insensitive) one.
fn position_by_name<I>(
    items: &[I],
    name: &str,
    options: CompileOptions,
    name_of: impl Fn(&I) -> &str,
) -> Option<usize> {
    items
        .iter()
        .position(|item| name_of(item) == name)
        .or_else(|| {
            items
                .iter()
                .position(|item| options.names_match(name_of(item), name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCursor, ResultSet};
    use crate::types::SqlType;
    use crate::value::Value;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i64,
        first_name: String,
        age: Option<i32>,
    }

    impl Entity for Person {
        fn describe() -> EntityDescriptor<Self> {
            EntityDescriptor::with_default("Person")
                .member("Id", |p: &mut Person, v: i64| p.id = v)
                .member("FirstName", |p: &mut Person, v: String| p.first_name = v)
                .member("Age", |p: &mut Person, v: Option<i32>| p.age = v)
        }
    }

    #[derive(Debug, PartialEq)]
    struct Pair {
        a: i32,
        b: Option<i32>,
        note: String,
    }

    impl Entity for Pair {
        fn describe() -> EntityDescriptor<Self> {
            EntityDescriptor::new("Pair")
                .constructor(Constructor::new(&["a", "b"], |(a, b): (i32, Option<i32>)| {
                    Pair {
                        a,
                        b,
                        note: String::new(),
                    }
                }))
                .member("note", |p: &mut Pair, v: String| p.note = v)
        }
    }

    fn cursor_over(set: ResultSet) -> MemoryCursor {
        let mut cursor = MemoryCursor::new(vec![set]);
        assert!(cursor.advance().unwrap());
        cursor
    }

    fn compile<T: Entity>(cursor: &MemoryCursor, options: CompileOptions) -> Result<Materializer<T>> {
        compile_entity::<T>(&Shape::of(cursor), 0, &TypeHandlers::new(), options)
    }

    #[test]
    fn members_match_case_insensitively() {
        let cursor = cursor_over(ResultSet::from_rows(
            &["ID", "firstname", "Extra"],
            vec![vec![Value::BigInt(4), Value::Text("Ann".into()), Value::Int(0)]],
        ));
        let person = compile::<Person>(&cursor, CompileOptions::default())
            .unwrap()
            .read(&cursor)
            .unwrap();
        assert_eq!(
            person,
            Person {
                id: 4,
                first_name: "Ann".into(),
                age: None
            }
        );
    }

    #[test]
    fn underscores_match_only_when_enabled() {
        let cursor = cursor_over(ResultSet::from_rows(
            &["first_name"],
            vec![vec![Value::Text("Bo".into())]],
        ));
        let strict = compile::<Person>(&cursor, CompileOptions::default()).unwrap();
        assert_eq!(strict.read(&cursor).unwrap().first_name, "");

        let loose = CompileOptions {
            match_underscores: true,
            ..CompileOptions::default()
        };
        let person = compile::<Person>(&cursor, loose).unwrap().read(&cursor).unwrap();
        assert_eq!(person.first_name, "Bo");
    }

    #[test]
    fn null_members_are_skipped_unless_applied() {
        #[derive(Debug, PartialEq)]
        struct Defaulted {
            age: Option<i32>,
        }
        impl Entity for Defaulted {
            fn describe() -> EntityDescriptor<Self> {
                EntityDescriptor::new("Defaulted")
                    .default_constructor(|| Defaulted { age: Some(30) })
                    .member("age", |d: &mut Defaulted, v: Option<i32>| d.age = v)
            }
        }

        let cursor = cursor_over(ResultSet::new([("age", SqlType::Integer)]).row(vec![Value::Null]));
        let kept = compile::<Defaulted>(&cursor, CompileOptions::default()).unwrap();
        assert_eq!(kept.read(&cursor).unwrap().age, Some(30));

        let applied = CompileOptions {
            apply_null_values: true,
            ..CompileOptions::default()
        };
        let cleared = compile::<Defaulted>(&cursor, applied).unwrap();
        assert_eq!(cleared.read(&cursor).unwrap().age, None);
    }

    #[test]
    fn constructor_plus_remaining_members() {
        let cursor = cursor_over(ResultSet::from_rows(
            &["note", "B", "A"],
            vec![vec![Value::Text("hi".into()), Value::Null, Value::BigInt(2)]],
        ));
        let pair = compile::<Pair>(&cursor, CompileOptions::default())
            .unwrap()
            .read(&cursor)
            .unwrap();
        assert_eq!(
            pair,
            Pair {
                a: 2,
                b: None,
                note: "hi".into()
            }
        );
    }

    #[test]
    fn no_usable_constructor_is_a_construction_error() {
        let cursor = cursor_over(ResultSet::from_rows(&["a"], vec![vec![Value::Int(1)]]));
        let err = compile::<Pair>(&cursor, CompileOptions::default()).unwrap_err();
        match err {
            Error::Construction(e) => {
                assert_eq!(e.target, "Pair");
                assert!(e.message.contains("\"a\""));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn conversion_errors_name_the_column() {
        let cursor = cursor_over(ResultSet::from_rows(
            &["Id"],
            vec![vec![Value::Text("seven".into())]],
        ));
        let err = compile::<Person>(&cursor, CompileOptions::default())
            .unwrap()
            .read(&cursor)
            .unwrap_err();
        match err {
            Error::Conversion(e) => {
                assert_eq!(e.column.as_deref(), Some("Id"));
                assert!(e.target.is_some_and(|t| t.ends_with("Person")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn positional_tuples_fill_missing_trailing_columns() {
        let cursor = cursor_over(ResultSet::from_rows(&["x"], vec![vec![Value::Int(9)]]));
        let tuple = compile::<(i32, Option<String>, i64)>(&cursor, CompileOptions::default())
            .unwrap()
            .read(&cursor)
            .unwrap();
        assert_eq!(tuple, (9, None, 0));
    }

    #[test]
    fn clones_share_identity() {
        let m = Materializer::from_fn(|_| Ok(1_u8));
        let other = Materializer::from_fn(|_| Ok(1_u8));
        assert!(m.ptr_eq(&m.clone()));
        assert!(!m.ptr_eq(&other));
    }
}
