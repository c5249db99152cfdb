//! Multi-mapping: one row, several objects.
//!
//! A row is partitioned into contiguous column ranges, one per target type.
//! Boundaries come from split column names (searched forward, ignoring case)
//! or from explicit ordinals. Each range gets its own cached materializer.

use std::ops::Range;

use crate::cursor::RowCursor;
use crate::entity::Entity;
use crate::error::{Error, Result, ShapeErrorKind};
use crate::mapper::Mapper;
use crate::materializer::Materializer;
use crate::shape::Shape;

/// Where one object's columns end and the next begin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SplitOn {
    /// Use the mapper's configured default split column
    #[default]
    Default,
    /// Split column names. A single name is reused for every boundary;
    /// otherwise one name per boundary.
    Names(Vec<String>),
    /// Ordinal of the first column of every object after the first
    Ordinals(Vec<usize>),
}

impl SplitOn {
    /// Split at the named column(s).
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SplitOn::Names(names.into_iter().map(Into::into).collect())
    }

    /// Split at explicit ordinals.
    pub fn ordinals(ordinals: impl Into<Vec<usize>>) -> Self {
        SplitOn::Ordinals(ordinals.into())
    }
}

/// Comma-separated names, e.g. `"Id,UserId"`.
impl From<&str> for SplitOn {
    fn from(list: &str) -> Self {
        SplitOn::names(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }
}

impl From<Vec<usize>> for SplitOn {
    fn from(ordinals: Vec<usize>) -> Self {
        SplitOn::Ordinals(ordinals)
    }
}

/// Partition `shape` into `parts` contiguous column ranges.
pub fn split_ranges(
    shape: &Shape,
    parts: usize,
    split: &SplitOn,
    default_name: &str,
) -> Result<Vec<Range<usize>>> {
    let len = shape.len();
    if parts == 0 {
        return Err(Error::shape(ShapeErrorKind::InvalidSplit, "cannot split into zero parts"));
    }
    if parts == 1 {
        return Ok(vec![0..len]);
    }
    let boundaries = match split {
        SplitOn::Default => name_boundaries(shape, parts - 1, &[default_name.to_string()])?,
        SplitOn::Names(names) => name_boundaries(shape, parts - 1, names)?,
        SplitOn::Ordinals(ordinals) => ordinal_boundaries(len, parts - 1, ordinals)?,
    };

    let mut ranges = Vec::with_capacity(parts);
    let mut begin = 0;
    for boundary in boundaries {
        ranges.push(begin..boundary);
        begin = boundary;
    }
    ranges.push(begin..len);
    Ok(ranges)
}

fn ordinal_boundaries(len: usize, needed: usize, ordinals: &[usize]) -> Result<Vec<usize>> {
    if ordinals.len() != needed {
        return Err(Error::shape(
            ShapeErrorKind::InvalidSplit,
            format!("{} split ordinals given, {needed} required", ordinals.len()),
        ));
    }
    let mut previous = 0;
    for &ordinal in ordinals {
        if ordinal <= previous || ordinal >= len {
            return Err(Error::shape(
                ShapeErrorKind::InvalidSplit,
                format!(
                    "split ordinals {ordinals:?} must increase strictly within 1..{len}"
                ),
            ));
        }
        previous = ordinal;
    }
    Ok(ordinals.to_vec())
}

fn name_boundaries(shape: &Shape, needed: usize, names: &[String]) -> Result<Vec<usize>> {
    let matches = |ordinal: usize, name: &str| {
        shape
            .column(ordinal)
            .is_some_and(|c| c.name.eq_ignore_ascii_case(name))
    };

    if let [name] = names {
        let found: Vec<usize> = (1..shape.len()).filter(|&i| matches(i, name)).collect();
        if found.len() < needed {
            return Err(Error::shape(
                ShapeErrorKind::SplitNotFound,
                format!(
                    "split column '{name}' found {} time(s) after the first column, {needed} required",
                    found.len()
                ),
            ));
        }
        if found.len() > needed {
            return Err(Error::shape(
                ShapeErrorKind::AmbiguousSplit,
                format!(
                    "split column '{name}' appears at ordinals {found:?} but only {needed} boundaries are needed; split by ordinal instead"
                ),
            ));
        }
        return Ok(found);
    }

    if names.len() != needed {
        return Err(Error::shape(
            ShapeErrorKind::InvalidSplit,
            format!("{} split names given, {needed} required", names.len()),
        ));
    }

    let mut boundaries = Vec::with_capacity(needed);
    let mut previous = 0;
    for name in names {
        let Some(boundary) = (previous + 1..shape.len()).find(|&i| matches(i, name)) else {
            return Err(Error::shape(
                ShapeErrorKind::SplitNotFound,
                format!("split column '{name}' not found after ordinal {previous}"),
            ));
        };
        boundaries.push(boundary);
        previous = boundary;
    }

    // A name that repeats inside the object it starts could have meant the later column.
    for (k, name) in names.iter().enumerate() {
        let end = boundaries.get(k + 1).copied().unwrap_or(shape.len());
        if let Some(again) = (boundaries[k] + 1..end).find(|&i| matches(i, name)) {
            return Err(Error::shape(
                ShapeErrorKind::AmbiguousSplit,
                format!(
                    "split column '{name}' matches ordinals {} and {again}; split by ordinal instead",
                    boundaries[k]
                ),
            ));
        }
    }
    Ok(boundaries)
}

/// Tuples of entities that one row can be split into.
///
/// Implemented for tuples of two to seven [`Entity`] types.
pub trait SplitTargets: Sized + 'static {
    /// Number of objects per row.
    const ARITY: usize;

    /// One materializer per range.
    type Parsers: Clone + Send + Sync;

    /// Fetch (or compile) the materializer for every range.
    fn parsers(mapper: &Mapper, shape: &Shape, ranges: &[Range<usize>]) -> Result<Self::Parsers>;

    /// Materialize every object of the cursor's current row.
    fn read(parsers: &Self::Parsers, cursor: &dyn RowCursor) -> Result<Self>;
}

macro_rules! split_targets {
    ($arity:expr => $($name:ident $idx:tt),+) => {
        impl<$($name: Entity),+> SplitTargets for ($($name,)+) {
            const ARITY: usize = $arity;

            type Parsers = ($(Materializer<$name>,)+);

            fn parsers(
                mapper: &Mapper,
                shape: &Shape,
                ranges: &[Range<usize>],
            ) -> Result<Self::Parsers> {
                if ranges.len() != Self::ARITY {
                    return Err(Error::shape(
                        ShapeErrorKind::InvalidSplit,
                        format!("{} ranges for {} targets", ranges.len(), Self::ARITY),
                    ));
                }
                Ok(($(
                    mapper.materializer::<$name>(
                        shape,
                        ranges[$idx].start,
                        Some(ranges[$idx].len()),
                    )?,
                )+))
            }

            fn read(parsers: &Self::Parsers, cursor: &dyn RowCursor) -> Result<Self> {
                Ok(($(parsers.$idx.read(cursor)?,)+))
            }
        }
    };
}

split_targets!(2 => A 0, B 1);
split_targets!(3 => A 0, B 1, C 2);
split_targets!(4 => A 0, B 1, C 2, D 3);
split_targets!(5 => A 0, B 1, C 2, D 3, E 4);
split_targets!(6 => A 0, B 1, C 2, D 3, E 4, F 5);
split_targets!(7 => A 0, B 1, C 2, D 3, E 4, F 5, G 6);

/// Compiled multi-mapping for one result set shape.
pub struct SplitReader<S: SplitTargets> {
    parsers: S::Parsers,
}

impl<S: SplitTargets> SplitReader<S> {
    /// Partition `shape` and fetch one materializer per range.
    pub fn new(mapper: &Mapper, shape: &Shape, split: &SplitOn) -> Result<Self> {
        let ranges = split_ranges(shape, S::ARITY, split, &mapper.config().default_split_on)?;
        tracing::debug!(targets = S::ARITY, ?ranges, "Split row into ranges");
        Ok(Self {
            parsers: S::parsers(mapper, shape, &ranges)?,
        })
    }

    /// Materialize every object of the cursor's current row.
    pub fn read(&self, cursor: &dyn RowCursor) -> Result<S> {
        S::read(&self.parsers, cursor)
    }
}
