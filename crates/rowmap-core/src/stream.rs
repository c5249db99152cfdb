//! Row streams over one result set.
//!
//! A [`RowStream`] carries a plan that is compiled against the result set's
//! shape when the first row arrives, so empty result sets never compile
//! anything. [`Rows`] drives a stream over a cursor it owns.

use std::fmt;

use crate::cursor::RowCursor;
use crate::error::{Error, Result};
use crate::shape::Shape;

/// Reads one value out of the cursor's current row.
pub(crate) type RowFn<'m, R> = Box<dyn FnMut(&dyn RowCursor) -> Result<R> + 'm>;

type Plan<'m, R> = Box<dyn FnOnce(&Shape) -> Result<RowFn<'m, R>> + 'm>;

pub(crate) struct RowStream<'m, R> {
    plan: Option<Plan<'m, R>>,
    read: Option<RowFn<'m, R>>,
}

impl<'m, R> RowStream<'m, R> {
    pub(crate) fn new(plan: impl FnOnce(&Shape) -> Result<RowFn<'m, R>> + 'm) -> Self {
        Self {
            plan: Some(Box::new(plan)),
            read: None,
        }
    }

    /// Advance `cursor` and read the next row, or `None` at the end of the
    /// result set.
    pub(crate) fn next_row<C: RowCursor>(&mut self, cursor: &mut C) -> Result<Option<R>> {
        if !cursor.advance()? {
            return Ok(None);
        }
        if self.read.is_none() {
            let plan = self
                .plan
                .take()
                .ok_or_else(|| Error::Custom("row plan already failed to compile".into()))?;
            self.read = Some(plan(&Shape::of(&*cursor))?);
        }
        let Some(read) = self.read.as_mut() else {
            return Err(Error::Custom("row reader is not compiled".into()));
        };
        read(&*cursor).map(Some)
    }
}

/// Read every remaining row of the current result set.
pub(crate) fn drain<C: RowCursor, R>(cursor: &mut C, mut stream: RowStream<'_, R>) -> Result<Vec<R>> {
    let mut rows = Vec::new();
    while let Some(row) = stream.next_row(cursor)? {
        rows.push(row);
    }
    Ok(rows)
}

/// Lazy, single-pass iterator over the rows of one result set.
///
/// Owns its cursor; the first error ends the iteration.
pub struct Rows<'m, C, T> {
    cursor: C,
    stream: RowStream<'m, T>,
    done: bool,
}

impl<'m, C: RowCursor, T> Rows<'m, C, T> {
    pub(crate) fn new(cursor: C, stream: RowStream<'m, T>) -> Self {
        Self {
            cursor,
            stream,
            done: false,
        }
    }

    /// Give the cursor back, e.g. to move on to a later result set by hand.
    pub fn into_cursor(self) -> C {
        self.cursor
    }
}

impl<C: RowCursor, T> Iterator for Rows<'_, C, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.stream.next_row(&mut self.cursor) {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<C: RowCursor, T> std::iter::FusedIterator for Rows<'_, C, T> {}

impl<C, T> fmt::Debug for Rows<'_, C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("target", &std::any::type_name::<T>())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCursor, ResultSet};
    use crate::value::Value;
    use std::cell::Cell;
    use std::rc::Rc;

    fn ints(values: &[i32]) -> ResultSet {
        ResultSet::from_rows(
            &["n"],
            values.iter().map(|v| vec![Value::Int(*v)]).collect(),
        )
    }

    fn counting_plan<'m>(compiled: Rc<Cell<usize>>) -> RowStream<'m, i32> {
        RowStream::new(move |shape: &Shape| -> Result<RowFn<'m, i32>> {
            compiled.set(compiled.get() + 1);
            assert_eq!(shape.len(), 1);
            Ok(Box::new(|cursor: &dyn RowCursor| -> Result<i32> {
                cursor.value(0)?.as_i64().map(|v| v as i32).ok_or_else(|| Error::Custom("not an int".into()))
            }))
        })
    }

    #[test]
    fn compiles_once_on_first_row() {
        let compiled = Rc::new(Cell::new(0));
        let rows = Rows::new(
            MemoryCursor::new(vec![ints(&[1, 2, 3])]),
            counting_plan(Rc::clone(&compiled)),
        );
        let values: Vec<i32> = rows.collect::<Result<_>>().unwrap();
        assert_eq!(values, [1, 2, 3]);
        assert_eq!(compiled.get(), 1);
    }

    #[test]
    fn empty_result_set_never_compiles() {
        let compiled = Rc::new(Cell::new(0));
        let mut rows = Rows::new(
            MemoryCursor::new(vec![ints(&[])]),
            counting_plan(Rc::clone(&compiled)),
        );
        assert!(rows.next().is_none());
        assert!(rows.next().is_none());
        assert_eq!(compiled.get(), 0);
    }

    #[test]
    fn fault_ends_iteration() {
        let mut rows = Rows::new(
            MemoryCursor::new(vec![ints(&[1, 2, 3]).fail_after(1)]),
            counting_plan(Rc::new(Cell::new(0))),
        );
        assert_eq!(rows.next().unwrap().unwrap(), 1);
        assert!(rows.next().unwrap().is_err());
        assert!(rows.next().is_none());
    }
}
