//! Result set shapes and materializer cache keys.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::config::CompileOptions;
use crate::cursor::RowCursor;
use crate::error::{Error, Result, ShapeErrorKind};
use crate::types::SqlType;

/// One column of a result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

/// The ordered column name/type signature of a result set.
///
/// Cloning is cheap; the column list is shared.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    columns: Arc<[Column]>,
}

impl Shape {
    /// Build a shape from a column list.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    /// Read the shape of the cursor's current result set.
    pub fn of(cursor: &dyn RowCursor) -> Self {
        (0..cursor.column_count())
            .map(|i| Column::new(cursor.column_name(i), cursor.column_type(i)))
            .collect::<Vec<_>>()
            .into()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the shape has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All columns in ordinal order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The column at `ordinal`.
    pub fn column(&self, ordinal: usize) -> Option<&Column> {
        self.columns.get(ordinal)
    }

    /// Ordinal of the first column named `name`, ignoring ASCII case.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The sub-shape covering `count` columns from `start`.
    ///
    /// `None` for `count` means "through the last column".
    pub fn window(&self, start: usize, count: Option<usize>) -> Result<Shape> {
        let len = self.len();
        let end = match count {
            Some(count) => start.checked_add(count),
            None => Some(len),
        };
        match end {
            Some(end) if start <= end && end <= len => {
                if start == 0 && end == len {
                    Ok(self.clone())
                } else {
                    Ok(Shape::new(self.columns[start..end].to_vec()))
                }
            }
            _ => Err(Error::shape(
                ShapeErrorKind::ColumnOutOfRange,
                format!(
                    "columns {start}..{} are outside a result set of {len} columns",
                    end.map_or_else(|| "overflow".to_string(), |e| e.to_string())
                ),
            )),
        }
    }
}

impl From<Vec<Column>> for Shape {
    fn from(columns: Vec<Column>) -> Self {
        Shape::new(columns)
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.columns
                    .iter()
                    .map(|c| format!("{}: {}", c.name, c.sql_type.sql_name())),
            )
            .finish()
    }
}

/// What a materializer produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// A Rust type known at compile time
    Type {
        id: TypeId,
        name: &'static str,
    },
    /// A dynamic proxy interface, identified by its descriptor id
    Interface { id: u64, name: Arc<str> },
}

impl Target {
    /// The target for Rust type `T`.
    pub fn of<T: 'static>() -> Self {
        Target::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Display name of the target.
    pub fn name(&self) -> &str {
        match self {
            Target::Type { name, .. } => name,
            Target::Interface { name, .. } => name,
        }
    }
}

/// Identity of a compiled materializer.
///
/// Two cursors with the same column name/type sequence, requested for the
/// same target at the same start offset under the same compile options,
/// produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    pub target: Target,
    /// Columns covered by the materializer
    pub shape: Shape,
    /// Ordinal of the first covered column in the full row
    pub start: usize,
    pub options: CompileOptions,
}

impl ShapeKey {
    pub fn new(target: Target, shape: Shape, start: usize, options: CompileOptions) -> Self {
        Self {
            target,
            shape,
            start,
            options,
        }
    }
}
