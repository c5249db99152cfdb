//! rowmap - fast, shape-cached mapping of SQL result sets into Rust types.
//!
//! rowmap sits between a database driver and application code. It turns
//! forward-only result set rows into typed values and typed values into
//! bound parameters, compiling one materializer per (target type, column
//! shape) pair and caching it for every later query of the same shape.
//!
//! - Struct, tuple and dynamic-record materialization with derive macros
//! - Pluggable type handlers: enums by number or name, `Option`, JSON
//! - Multi-mapping one row into several objects
//! - Multiple result sets through a strictly ordered `GridReader`
//! - Discriminator-driven polymorphic rows
//! - Change-tracking proxies over runtime-declared interfaces
//! - `{=name}` literal substitution
//!
//! # Quick Start
//!
//! ```ignore
//! use rowmap::prelude::*;
//!
//! #[derive(Entity, Debug, Default)]
//! struct Post {
//!     id: i64,
//!     title: String,
//!     #[rowmap(column = "author_id")]
//!     author: Option<i64>,
//! }
//!
//! fn recent<D: Driver>(mapper: &Mapper, driver: &mut D) -> Result<Vec<Post>> {
//!     mapper.query(
//!         driver,
//!         "select id, title, author_id from posts where id > @after",
//!         &Params::new().bind("after", 100_i64),
//!     )
//! }
//! ```
//!
//! The driver is any type implementing [`Driver`]; [`MemoryDriver`] replays
//! scripted result sets and is what the test suites run against.

pub use rowmap_core::{
    Attribute, BoundParam, CacheStats, ChangeTracking, Column, ColumnInfo, CompileOptions,
    Constructor, DefaultHandler, Discriminator, Driver, DynamicRow, Entity, EntityDescriptor, Error,
    ExecutedCommand, GridReader, GridRows, InterfaceBuilder, InterfaceDescriptor, Json, Mapper,
    MapperConfig, Materializer, MaterializerCache, Member, MemberDecl, MemoryCursor, MemoryDriver,
    NullableHandler, ParamValue, Params, Proxy, Result, ResultSet, RowCursor, Rows,
    SequencingErrorKind, Shape, ShapeErrorKind, SplitOn, SqlEnum, SqlType, SqlValue, ToParams,
    TypeHandler, TypeHandlers, Value, Variant, coerce, expand_literals,
};

/// Error payload types.
pub mod error {
    pub use rowmap_core::error::*;
}

pub use rowmap_macros::{Entity, SqlEnum};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```ignore
/// use rowmap::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ChangeTracking, Driver, DynamicRow, Entity, Error, GridReader, InterfaceDescriptor, Json,
        Mapper, MapperConfig, Params, Proxy, Result, RowCursor, SplitOn, SqlEnum, SqlType,
        SqlValue, ToParams, TypeHandler, Value, Variant,
    };
}
