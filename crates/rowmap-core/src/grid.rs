//! Sequential reader over the result sets of one multi-statement command.
//!
//! Result sets are read strictly in order, one `read*` call per set, empty
//! sets included. Buffered reads drain the set and move the cursor to the
//! next one before returning. An unbuffered read hands out an iterator that
//! drives the shared cursor; until that iterator has run to the end, every
//! further read fails with [`SequencingErrorKind::ReaderActive`].
//!
//! A driver error faults the reader for good. Any other error (a row that
//! fails to convert, an unresolvable split) abandons only the current set:
//! its remaining rows are skipped and the next read gets the next set.

use std::fmt;
use std::sync::Arc;

use crate::cursor::RowCursor;
use crate::entity::Entity;
use crate::error::{Error, Result, SequencingErrorKind};
use crate::mapper::Mapper;
use crate::proxy::{InterfaceDescriptor, Proxy};
use crate::split::{SplitOn, SplitTargets};
use crate::stream::{RowStream, drain};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GridState {
    /// Positioned on an unread result set
    Ready,
    /// An unbuffered reader is iterating the current result set
    Streaming,
    /// Every result set has been read
    Consumed,
    /// The cursor failed; nothing more can be read
    Faulted,
    Disposed,
}

/// Reads the result sets of one command, in order.
pub struct GridReader<'m, C: RowCursor> {
    mapper: &'m Mapper,
    cursor: Option<C>,
    result_index: usize,
    state: GridState,
}

impl<'m, C: RowCursor> GridReader<'m, C> {
    /// Wrap a cursor positioned on its first result set.
    pub fn new(mapper: &'m Mapper, cursor: C) -> Self {
        Self {
            mapper,
            cursor: Some(cursor),
            result_index: 0,
            state: GridState::Ready,
        }
    }

    /// Index of the next result set to be read.
    pub fn result_index(&self) -> usize {
        self.result_index
    }

    /// Whether every result set has been read, or the reader was disposed.
    pub fn is_consumed(&self) -> bool {
        matches!(self.state, GridState::Consumed | GridState::Disposed)
    }

    /// Read every row of the next result set as `T`.
    ///
    /// If a row fails to materialize, the rest of the set is skipped and the
    /// reader stays usable; a driver error faults it instead.
    pub fn read<T: Entity>(&mut self) -> Result<Vec<T>> {
        let stream = self.mapper.entity_rows::<T>();
        self.consume(|cursor| drain(cursor, stream))
    }

    /// Read the first row of the next result set and skip the rest.
    pub fn read_first<T: Entity>(&mut self) -> Result<Option<T>> {
        let mut stream = self.mapper.entity_rows::<T>();
        self.consume(|cursor| {
            let first = stream.next_row(cursor)?;
            while cursor.advance()? {}
            Ok(first)
        })
    }

    /// Multi-map every row of the next result set.
    pub fn read_split<S, R>(
        &mut self,
        split: impl Into<SplitOn>,
        combine: impl FnMut(S) -> R + 'm,
    ) -> Result<Vec<R>>
    where
        S: SplitTargets,
    {
        let stream = self.mapper.split_rows(split.into(), combine);
        self.consume(|cursor| drain(cursor, stream))
    }

    /// Read the next result set through the discriminator registered for `B`.
    pub fn read_polymorphic<B: 'static>(&mut self) -> Result<Vec<B>> {
        let stream = self.mapper.polymorphic_rows::<B>();
        self.consume(|cursor| drain(cursor, stream))
    }

    /// Read the next result set as proxies of `interface`.
    pub fn read_proxies(&mut self, interface: &Arc<InterfaceDescriptor>) -> Result<Vec<Proxy>> {
        let stream = self.mapper.proxy_rows(Arc::clone(interface));
        self.consume(|cursor| drain(cursor, stream))
    }

    /// Stream the next result set.
    ///
    /// The returned iterator borrows the reader. Dropping it before it has
    /// returned `None` leaves the result set half read, and later reads fail.
    pub fn read_unbuffered<T: Entity>(&mut self) -> Result<GridRows<'_, 'm, C, T>> {
        self.ensure_ready()?;
        let stream = self.mapper.entity_rows::<T>();
        self.transition(GridState::Streaming);
        Ok(GridRows {
            grid: self,
            stream,
            done: false,
        })
    }

    /// Release the cursor, discarding unread result sets. Idempotent.
    pub fn dispose(&mut self) {
        if self.state == GridState::Disposed {
            return;
        }
        if let Some(cursor) = self.cursor.take() {
            drop(cursor);
            tracing::trace!(result_index = self.result_index, "Released grid cursor");
        }
        self.transition(GridState::Disposed);
    }

    fn ensure_ready(&self) -> Result<()> {
        let kind = match self.state {
            GridState::Ready => return Ok(()),
            GridState::Streaming => SequencingErrorKind::ReaderActive,
            GridState::Consumed => SequencingErrorKind::Exhausted,
            GridState::Faulted => SequencingErrorKind::Faulted,
            GridState::Disposed => SequencingErrorKind::Disposed,
        };
        Err(Error::sequencing(kind, self.result_index))
    }

    fn consume<R>(&mut self, read: impl FnOnce(&mut C) -> Result<R>) -> Result<R> {
        self.ensure_ready()?;
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(Error::sequencing(SequencingErrorKind::Disposed, self.result_index));
        };
        match read(cursor) {
            Ok(value) => {
                self.finish_set()?;
                Ok(value)
            }
            Err(e) => {
                self.abandon_set(&e);
                Err(e)
            }
        }
    }

    /// Recover from a failed read of the current set.
    fn abandon_set(&mut self, error: &Error) {
        if matches!(error, Error::Driver(_)) {
            self.fault();
            return;
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };
        let skipped = loop {
            match cursor.advance() {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        match skipped {
            Ok(()) => {
                tracing::debug!(result_index = self.result_index, error = %error, "Skipped rest of result set");
                // finish_set faults the reader itself if the cursor fails
                let _ = self.finish_set();
            }
            Err(_) => self.fault(),
        }
    }

    /// Move past the result set just read.
    fn finish_set(&mut self) -> Result<()> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(Error::sequencing(SequencingErrorKind::Disposed, self.result_index));
        };
        match cursor.next_result() {
            Ok(more) => {
                self.result_index += 1;
                if more {
                    self.transition(GridState::Ready);
                } else {
                    self.cursor = None;
                    self.transition(GridState::Consumed);
                }
                Ok(())
            }
            Err(e) => {
                self.fault();
                Err(e)
            }
        }
    }

    fn fault(&mut self) {
        self.cursor = None;
        self.transition(GridState::Faulted);
    }

    fn transition(&mut self, next: GridState) {
        tracing::trace!(from = ?self.state, to = ?next, result_index = self.result_index, "Grid reader state");
        self.state = next;
    }
}

impl<C: RowCursor> Drop for GridReader<'_, C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<C: RowCursor> fmt::Debug for GridReader<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridReader")
            .field("result_index", &self.result_index)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Single-pass iterator over one result set of a [`GridReader`].
pub struct GridRows<'g, 'm, C: RowCursor, T> {
    grid: &'g mut GridReader<'m, C>,
    stream: RowStream<'m, T>,
    done: bool,
}

impl<C: RowCursor, T> Iterator for GridRows<'_, '_, C, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(cursor) = self.grid.cursor.as_mut() else {
            self.done = true;
            return Some(Err(Error::sequencing(
                SequencingErrorKind::Disposed,
                self.grid.result_index,
            )));
        };
        match self.stream.next_row(cursor) {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                self.grid.finish_set().err().map(Err)
            }
            Err(e) => {
                self.done = true;
                self.grid.abandon_set(&e);
                Some(Err(e))
            }
        }
    }
}

impl<C: RowCursor, T> std::iter::FusedIterator for GridRows<'_, '_, C, T> {}
