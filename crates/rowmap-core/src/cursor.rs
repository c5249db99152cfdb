//! Driver collaborator surface.
//!
//! The engine never talks to a database itself. A driver executes command
//! text and hands back a forward-only [`RowCursor`] that may span several
//! result sets.

use crate::error::Result;
use crate::params::BoundParam;
use crate::types::SqlType;
use crate::value::Value;

/// Forward-only cursor over one or more result sets.
///
/// A freshly returned cursor is positioned on the first result set, before
/// its first row. Column metadata describes the current result set.
pub trait RowCursor {
    /// Number of columns in the current result set.
    fn column_count(&self) -> usize;

    /// Name of the column at `ordinal`.
    fn column_name(&self, ordinal: usize) -> &str;

    /// Runtime type the driver reports for the column at `ordinal`.
    fn column_type(&self, ordinal: usize) -> SqlType;

    /// Move to the next row. Returns `false` when the result set is exhausted.
    fn advance(&mut self) -> Result<bool>;

    /// Value of the column at `ordinal` in the current row.
    fn value(&self, ordinal: usize) -> Result<&Value>;

    /// Move to the next result set. Returns `false` when none remain.
    fn next_result(&mut self) -> Result<bool>;
}

/// Command execution surface consumed by the mapper.
pub trait Driver {
    /// Cursor type, which may borrow the driver.
    type Cursor<'c>: RowCursor
    where
        Self: 'c;

    /// Execute a command and return the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[BoundParam]) -> Result<u64>;

    /// Execute a command and return a cursor over its result sets.
    fn execute_reader<'c>(
        &'c mut self,
        sql: &str,
        params: &[BoundParam],
    ) -> Result<Self::Cursor<'c>>;
}

impl<C: RowCursor + ?Sized> RowCursor for Box<C> {
    fn column_count(&self) -> usize {
        (**self).column_count()
    }

    fn column_name(&self, ordinal: usize) -> &str {
        (**self).column_name(ordinal)
    }

    fn column_type(&self, ordinal: usize) -> SqlType {
        (**self).column_type(ordinal)
    }

    fn advance(&mut self) -> Result<bool> {
        (**self).advance()
    }

    fn value(&self, ordinal: usize) -> Result<&Value> {
        (**self).value(ordinal)
    }

    fn next_result(&mut self) -> Result<bool> {
        (**self).next_result()
    }
}
