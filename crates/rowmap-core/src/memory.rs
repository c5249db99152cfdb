//! In-memory scripted driver.
//!
//! `MemoryDriver` replays result sets queued ahead of time and records every
//! command it is given. It backs the test suites and doubles as a reference
//! implementation of the [`Driver`] and [`RowCursor`] contracts.

use std::collections::VecDeque;

use crate::cursor::{Driver, RowCursor};
use crate::error::{DriverError, Error, Result};
use crate::params::BoundParam;
use crate::shape::Column;
use crate::types::SqlType;
use crate::value::Value;

/// One scripted result set.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    fail_after: Option<usize>,
}

impl ResultSet {
    /// A result set with explicitly typed columns.
    pub fn new<'a>(columns: impl IntoIterator<Item = (&'a str, SqlType)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, ty)| Column::new(name, ty))
                .collect(),
            ..Self::default()
        }
    }

    /// A result set whose column types are inferred from the first non-NULL
    /// value in each column. All-NULL columns report [`SqlType::Unknown`].
    pub fn from_rows(names: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let ty = rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .find(|v| !v.is_null())
                    .map_or(SqlType::Unknown, Value::sql_type);
                Column::new(*name, ty)
            })
            .collect();
        Self {
            columns,
            rows,
            fail_after: None,
        }
    }

    /// Append a row.
    #[must_use]
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    /// Make the cursor fault when asked for row number `n` (zero-based).
    #[must_use]
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A command the driver received.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedCommand {
    pub sql: String,
    pub params: Vec<BoundParam>,
}

enum Reply {
    Rows(Vec<ResultSet>),
    Affected(u64),
    Fail(String),
}

/// Driver that answers commands from a queue of scripted replies.
#[derive(Default)]
pub struct MemoryDriver {
    replies: VecDeque<Reply>,
    commands: Vec<ExecutedCommand>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result sets for the next reader command.
    pub fn push_results(&mut self, sets: Vec<ResultSet>) -> &mut Self {
        self.replies.push_back(Reply::Rows(sets));
        self
    }

    /// Queue a single result set.
    pub fn push_result(&mut self, set: ResultSet) -> &mut Self {
        self.push_results(vec![set])
    }

    /// Queue the affected row count for the next non-query command.
    pub fn push_affected(&mut self, rows: u64) -> &mut Self {
        self.replies.push_back(Reply::Affected(rows));
        self
    }

    /// Queue a driver failure for the next command.
    pub fn push_failure(&mut self, message: impl Into<String>) -> &mut Self {
        self.replies.push_back(Reply::Fail(message.into()));
        self
    }

    /// Commands executed so far, oldest first.
    pub fn commands(&self) -> &[ExecutedCommand] {
        &self.commands
    }

    /// The most recent command.
    pub fn last_command(&self) -> Option<&ExecutedCommand> {
        self.commands.last()
    }

    /// Number of replies not yet consumed.
    pub fn pending(&self) -> usize {
        self.replies.len()
    }

    fn record(&mut self, sql: &str, params: &[BoundParam]) -> Result<Reply> {
        self.commands.push(ExecutedCommand {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.replies
            .pop_front()
            .ok_or_else(|| Error::from(DriverError::new(format!("no scripted reply for: {sql}"))))
    }
}

impl Driver for MemoryDriver {
    type Cursor<'c> = MemoryCursor;

    fn execute(&mut self, sql: &str, params: &[BoundParam]) -> Result<u64> {
        match self.record(sql, params)? {
            Reply::Affected(rows) => Ok(rows),
            Reply::Rows(sets) => Ok(sets.iter().map(|s| s.len() as u64).sum()),
            Reply::Fail(message) => Err(DriverError::new(message).into()),
        }
    }

    fn execute_reader<'c>(
        &'c mut self,
        sql: &str,
        params: &[BoundParam],
    ) -> Result<Self::Cursor<'c>> {
        match self.record(sql, params)? {
            Reply::Rows(sets) => Ok(MemoryCursor::new(sets)),
            Reply::Affected(_) => Ok(MemoryCursor::new(Vec::new())),
            Reply::Fail(message) => Err(DriverError::new(message).into()),
        }
    }
}

static NO_COLUMN: &str = "";

/// Cursor over scripted result sets.
#[derive(Debug)]
pub struct MemoryCursor {
    sets: VecDeque<ResultSet>,
    /// Index of the current row; `None` before the first `advance`.
    row: Option<usize>,
}

impl MemoryCursor {
    pub fn new(sets: Vec<ResultSet>) -> Self {
        Self {
            sets: sets.into(),
            row: None,
        }
    }

    fn current(&self) -> Option<&ResultSet> {
        self.sets.front()
    }
}

impl RowCursor for MemoryCursor {
    fn column_count(&self) -> usize {
        self.current().map_or(0, |s| s.columns.len())
    }

    fn column_name(&self, ordinal: usize) -> &str {
        self.current()
            .and_then(|s| s.columns.get(ordinal))
            .map_or(NO_COLUMN, |c| c.name.as_str())
    }

    fn column_type(&self, ordinal: usize) -> SqlType {
        self.current()
            .and_then(|s| s.columns.get(ordinal))
            .map_or(SqlType::Unknown, |c| c.sql_type.clone())
    }

    fn advance(&mut self) -> Result<bool> {
        let Some(set) = self.sets.front() else {
            return Ok(false);
        };
        let next = self.row.map_or(0, |r| r + 1);
        if set.fail_after == Some(next) {
            return Err(DriverError::new(format!("cursor faulted before row {next}")).into());
        }
        if next < set.rows.len() {
            self.row = Some(next);
            Ok(true)
        } else {
            self.row = Some(set.rows.len());
            Ok(false)
        }
    }

    fn value(&self, ordinal: usize) -> Result<&Value> {
        let row = self
            .current()
            .zip(self.row)
            .and_then(|(set, r)| set.rows.get(r))
            .ok_or_else(|| Error::from(DriverError::new("cursor is not positioned on a row")))?;
        row.get(ordinal).ok_or_else(|| {
            DriverError::new(format!(
                "column ordinal {ordinal} out of range for {} columns",
                row.len()
            ))
            .into()
        })
    }

    fn next_result(&mut self) -> Result<bool> {
        self.sets.pop_front();
        self.row = None;
        Ok(!self.sets.is_empty())
    }
}
