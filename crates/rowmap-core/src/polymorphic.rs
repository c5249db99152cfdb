//! Discriminator-driven polymorphic materialization.
//!
//! A registration for base type `B` names a discriminator column and a
//! function from the discriminator's value to a [`Variant`]. Each row reads
//! the discriminator first, resolves the variant, and materializes the
//! concrete type with its own cached materializer over the full row shape.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::cursor::RowCursor;
use crate::entity::Entity;
use crate::error::{Error, Result, UnrecognizedVariantError};
use crate::handler::{SqlValue, TypeHandlers};
use crate::mapper::Mapper;
use crate::shape::Shape;
use crate::value::Value;

type ReadVariant<B> = dyn Fn(&Mapper, &Shape, &dyn RowCursor) -> Result<B> + Send + Sync;

/// A concrete type a polymorphic row can resolve to, with its conversion
/// into the base type.
pub struct Variant<B> {
    name: &'static str,
    read: Arc<ReadVariant<B>>,
}

impl<B> Clone for Variant<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            read: Arc::clone(&self.read),
        }
    }
}

impl<B: 'static> Variant<B> {
    /// Rows resolving to this variant materialize as `C`, then convert.
    pub fn of<C: Entity>(into: impl Fn(C) -> B + Send + Sync + 'static) -> Self {
        Self {
            name: std::any::type_name::<C>(),
            read: Arc::new(move |mapper: &Mapper, shape: &Shape, cursor: &dyn RowCursor| -> Result<B> {
                let concrete = mapper.materializer::<C>(shape, 0, None)?;
                Ok(into(concrete.read(cursor)?))
            }),
        }
    }

    /// Type name of the concrete type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<B> fmt::Debug for Variant<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Variant").field(&self.name).finish()
    }
}

type Resolver<B> = Box<dyn Fn(&Value) -> Result<Option<Variant<B>>> + Send + Sync>;

/// The discriminator column and resolver registered for base type `B`.
pub struct Discriminator<B> {
    column: String,
    bind: Arc<dyn Fn(&TypeHandlers) -> Resolver<B> + Send + Sync>,
}

impl<B> Clone for Discriminator<B> {
    fn clone(&self) -> Self {
        Self {
            column: self.column.clone(),
            bind: Arc::clone(&self.bind),
        }
    }
}

impl<B: 'static> Discriminator<B> {
    /// Discriminate on `column`, whose value is read as `D`.
    pub fn new<D: SqlValue>(
        column: impl Into<String>,
        resolve: impl Fn(D) -> Option<Variant<B>> + Send + Sync + 'static,
    ) -> Self {
        let resolve = Arc::new(resolve);
        Self {
            column: column.into(),
            bind: Arc::new(move |handlers: &TypeHandlers| -> Resolver<B> {
                let handler = handlers.resolve::<D>();
                let resolve = Arc::clone(&resolve);
                Box::new(move |value: &Value| -> Result<Option<Variant<B>>> {
                    Ok(resolve(handler.read_nullable(value)?))
                })
            }),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

/// Per-base-type discriminator registrations. The last registration wins.
#[derive(Default)]
pub struct Discriminators {
    entries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Discriminators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the discriminator for `B`.
    pub fn register<B: 'static>(&self, discriminator: Discriminator<B>) -> bool {
        let column = discriminator.column.clone();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let replaced = entries
            .insert(TypeId::of::<B>(), Arc::new(discriminator))
            .is_some();
        tracing::debug!(
            base = std::any::type_name::<B>(),
            column = %column,
            replaced,
            "Registered polymorphic discriminator"
        );
        replaced
    }

    /// The discriminator registered for `B`.
    pub fn get<B: 'static>(&self) -> Option<Discriminator<B>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&TypeId::of::<B>())
            .and_then(|entry| entry.downcast_ref::<Discriminator<B>>())
            .cloned()
    }

    pub fn contains<B: 'static>(&self) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(&TypeId::of::<B>())
    }
}

impl fmt::Debug for Discriminators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("Discriminators")
            .field("registered", &entries.len())
            .finish()
    }
}

/// Reads polymorphic rows of one result set.
pub struct PolymorphicReader<'m, B> {
    mapper: &'m Mapper,
    shape: Shape,
    ordinal: usize,
    column: String,
    resolve: Resolver<B>,
}

impl<'m, B: 'static> PolymorphicReader<'m, B> {
    /// Prepare to read rows of `shape` as `B`.
    pub fn new(mapper: &'m Mapper, shape: Shape) -> Result<Self> {
        let base = std::any::type_name::<B>();
        let discriminator = mapper.discriminators().get::<B>().ok_or_else(|| {
            Error::construction(base, "no polymorphic discriminator registered")
        })?;
        let ordinal = shape.index_of(discriminator.column()).ok_or_else(|| {
            Error::construction(
                base,
                format!(
                    "discriminator column '{}' is not in the result set",
                    discriminator.column()
                ),
            )
        })?;
        Ok(Self {
            mapper,
            column: shape.columns()[ordinal].name.clone(),
            shape,
            ordinal,
            resolve: (discriminator.bind)(mapper.handlers()),
        })
    }

    /// Materialize the cursor's current row.
    pub fn read(&self, cursor: &dyn RowCursor) -> Result<B> {
        let value = cursor.value(self.ordinal)?;
        match (self.resolve)(value).map_err(|e| e.in_column(&self.column))? {
            Some(variant) => {
                tracing::trace!(variant = variant.name(), "Resolved polymorphic row");
                (variant.read)(self.mapper, &self.shape, cursor)
            }
            None => Err(UnrecognizedVariantError {
                base: std::any::type_name::<B>(),
                column: self.column.clone(),
                value: value.to_string(),
            }
            .into()),
        }
    }
}
