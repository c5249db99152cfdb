//! Core engine for rowmap.
//!
//! This crate turns forward-only result set rows into typed values:
//!
//! - `Mapper` with the query surface, configuration and registries
//! - `Entity` descriptors and compiled, shape-cached `Materializer`s
//! - `TypeHandler` registry with enum, nullable and JSON support
//! - `GridReader` for multi-result-set commands
//! - Multi-mapping (`SplitOn`), polymorphic rows and change-tracking proxies
//! - `Driver`/`RowCursor` collaborator traits and an in-memory `MemoryDriver`

pub mod cache;
pub mod config;
pub mod cursor;
pub mod entity;
pub mod error;
pub mod grid;
pub mod handler;
pub mod literal;
pub mod mapper;
pub mod materializer;
pub mod memory;
pub mod params;
pub mod polymorphic;
pub mod proxy;
pub mod row;
pub mod shape;
pub mod split;
pub mod stream;
pub mod types;
pub mod value;

pub use cache::{CacheStats, MaterializerCache};
pub use config::{CompileOptions, MapperConfig};
pub use cursor::{Driver, RowCursor};
pub use entity::{ArgList, Constructor, Entity, EntityDescriptor, Member};
pub use error::{
    ConstructionError, ConversionError, DriverError, Error, LiteralError, Result, SequencingError,
    SequencingErrorKind, ShapeError, ShapeErrorKind, UnrecognizedVariantError,
};
pub use grid::{GridReader, GridRows};
pub use handler::{
    DefaultHandler, Json, NullableHandler, ParamValue, SqlEnum, SqlValue, TypeHandler,
    TypeHandlers, coerce,
};
pub use literal::expand_literals;
pub use mapper::Mapper;
pub use materializer::Materializer;
pub use memory::{ExecutedCommand, MemoryCursor, MemoryDriver, ResultSet};
pub use params::{BoundParam, Params, ToParams};
pub use polymorphic::{Discriminator, Discriminators, PolymorphicReader, Variant};
pub use proxy::{Attribute, ChangeTracking, InterfaceBuilder, InterfaceDescriptor, MemberDecl, Proxy};
pub use row::{ColumnInfo, DynamicRow};
pub use shape::{Column, Shape, ShapeKey, Target};
pub use split::{SplitOn, SplitReader, SplitTargets, split_ranges};
pub use stream::Rows;
pub use types::SqlType;
pub use value::Value;
