//! Type handler registry.
//!
//! A [`TypeHandler`] converts a column [`Value`] into a typed Rust value and a
//! typed value back into a bindable parameter. Every member type used by an
//! entity implements [`SqlValue`], which supplies the built-in conversion; the
//! [`TypeHandlers`] registry lets callers override that per type.
//!
//! Resolution is static where it can be: `Option<T>` always wraps whatever
//! handler `T` resolves to, so a handler registered for `T` is honored for
//! nullable members too.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::types::SqlType;
use crate::value::Value;

/// A converted parameter value plus an optional storage hint for the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamValue {
    pub value: Value,
    pub sql_type: Option<SqlType>,
}

impl ParamValue {
    /// A parameter the driver types by inference.
    pub fn inferred(value: Value) -> Self {
        Self {
            value,
            sql_type: None,
        }
    }

    /// A parameter carrying an explicit storage type.
    pub fn typed(value: Value, sql_type: SqlType) -> Self {
        Self {
            value,
            sql_type: Some(sql_type),
        }
    }
}

/// Conversion strategy between column values and one Rust type.
pub trait TypeHandler<T>: Send + Sync {
    /// Convert a non-NULL column value.
    fn read(&self, value: &Value) -> Result<T>;

    /// Convert a value for parameter binding.
    fn write(&self, value: &T) -> Result<ParamValue>;

    /// The value a SQL NULL maps to, or `None` if `T` cannot represent NULL.
    fn null(&self) -> Option<T> {
        None
    }

    /// The value for a constructor argument whose column the row lacks.
    fn missing(&self) -> Option<T> {
        self.null()
    }

    /// Read an argument whose column the row lacks.
    fn read_missing(&self) -> Result<T> {
        self.missing().ok_or_else(|| {
            Error::conversion(std::any::type_name::<T>(), "missing column with no default")
        })
    }

    /// Read a possibly-NULL column value.
    fn read_nullable(&self, value: &Value) -> Result<T> {
        if value.is_null() {
            self.null()
                .ok_or_else(|| Error::conversion(std::any::type_name::<T>(), "NULL"))
        } else {
            self.read(value)
        }
    }
}

/// Rust types that can be read from and written to SQL values.
pub trait SqlValue: Sized + Send + 'static {
    /// Convert from a non-NULL column value.
    fn from_sql(value: &Value) -> Result<Self>;

    /// Convert into a column value. Values the column representation
    /// cannot hold are a conversion error, never a substitute.
    fn to_sql(&self) -> Result<Value>;

    /// Explicit storage type to attach when binding, if any.
    fn type_hint() -> Option<SqlType> {
        None
    }

    /// The value SQL NULL maps to when NULL must be materialized.
    fn null_value() -> Option<Self> {
        None
    }

    /// The zero value for a constructor argument past the last column.
    fn missing_value() -> Option<Self> {
        Self::null_value()
    }

    /// Resolve the handler for this type against a registry.
    fn handler(handlers: &TypeHandlers) -> Arc<dyn TypeHandler<Self>> {
        handlers
            .lookup::<Self>()
            .unwrap_or_else(|| Arc::new(DefaultHandler::<Self>::new()))
    }
}

/// The built-in handler backed by a type's [`SqlValue`] implementation.
pub struct DefaultHandler<T>(PhantomData<fn() -> T>);

impl<T> DefaultHandler<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DefaultHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SqlValue> TypeHandler<T> for DefaultHandler<T> {
    fn read(&self, value: &Value) -> Result<T> {
        T::from_sql(value)
    }

    fn write(&self, value: &T) -> Result<ParamValue> {
        Ok(ParamValue {
            value: value.to_sql()?,
            sql_type: T::type_hint(),
        })
    }

    fn null(&self) -> Option<T> {
        T::null_value()
    }

    fn missing(&self) -> Option<T> {
        T::missing_value()
    }
}

/// Wraps the handler of `T` so NULL maps to `None`.
pub struct NullableHandler<T> {
    inner: Arc<dyn TypeHandler<T>>,
}

impl<T: SqlValue> TypeHandler<Option<T>> for NullableHandler<T> {
    fn read(&self, value: &Value) -> Result<Option<T>> {
        if value.is_null() {
            Ok(None)
        } else {
            self.inner.read(value).map(Some)
        }
    }

    fn write(&self, value: &Option<T>) -> Result<ParamValue> {
        match value {
            Some(v) => self.inner.write(v),
            None => Ok(ParamValue {
                value: Value::Null,
                sql_type: T::type_hint(),
            }),
        }
    }

    fn null(&self) -> Option<Option<T>> {
        Some(None)
    }
}

/// Registry of handler overrides keyed by target type.
///
/// Lookups take a read lock; registration takes a write lock. Callers that
/// cache compiled materializers must purge them after registering, which
/// [`Mapper::register_type_handler`](crate::Mapper::register_type_handler)
/// does.
#[derive(Default)]
pub struct TypeHandlers {
    handlers: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl TypeHandlers {
    /// Create an empty registry (built-in handlers only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `T`, replacing any previous registration.
    ///
    /// Returns `true` if a previous handler was replaced.
    pub fn register<T, H>(&self, handler: H) -> bool
    where
        T: 'static,
        H: TypeHandler<T> + 'static,
    {
        let handler: Arc<dyn TypeHandler<T>> = Arc::new(handler);
        let mut map = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let replaced = map
            .insert(TypeId::of::<T>(), Arc::new(handler))
            .is_some();
        if replaced {
            tracing::warn!(
                target_type = std::any::type_name::<T>(),
                "Replacing registered type handler"
            );
        } else {
            tracing::debug!(
                target_type = std::any::type_name::<T>(),
                "Registered type handler"
            );
        }
        replaced
    }

    /// Remove the override for `T`, falling back to the built-in handler.
    pub fn remove<T: 'static>(&self) -> bool {
        let mut map = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&TypeId::of::<T>()).is_some()
    }

    /// The registered override for `T`, if any.
    pub fn lookup<T: 'static>(&self) -> Option<Arc<dyn TypeHandler<T>>> {
        let map = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        map.get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn TypeHandler<T>>>())
            .cloned()
    }

    /// Resolve the effective handler for `T`.
    pub fn resolve<T: SqlValue>(&self) -> Arc<dyn TypeHandler<T>> {
        T::handler(self)
    }

    /// Check whether an override exists for `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        let map = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        map.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered overrides.
    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if no overrides are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TypeHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeHandlers")
            .field("overrides", &self.len())
            .finish()
    }
}

// ============================================================================
// Built-in conversions
// ============================================================================

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integer_from(value: &Value, expected: &'static str) -> Result<i64> {
    if let Some(v) = value.as_i64() {
        return Ok(v);
    }
    let out_of_range = || Error::conversion(expected, format!("{value:?} is not an integer"));
    match value {
        Value::Float(_) | Value::Double(_) | Value::Decimal(_) => {
            let f = match value {
                Value::Decimal(s) => {
                    if let Ok(i) = s.parse::<i64>() {
                        return Ok(i);
                    }
                    s.parse::<f64>().map_err(|_| out_of_range())?
                }
                other => other.as_f64().unwrap_or(f64::NAN),
            };
            if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                Ok(f as i64)
            } else {
                Err(out_of_range())
            }
        }
        other => Err(Error::conversion(expected, other.type_name())),
    }
}

macro_rules! integer_sql_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl SqlValue for $ty {
                fn from_sql(value: &Value) -> Result<Self> {
                    let wide = integer_from(value, stringify!($ty))?;
                    <$ty>::try_from(wide).map_err(|_| {
                        Error::conversion(
                            stringify!($ty),
                            format!("value {} out of range", wide),
                        )
                    })
                }

                fn to_sql(&self) -> Result<Value> {
                    Ok(Value::$variant((*self).into()))
                }

                fn null_value() -> Option<Self> {
                    Some(0)
                }
            }
        )*
    };
}

integer_sql_value! {
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    u8 => SmallInt,
    u16 => Int,
    u32 => BigInt,
}

impl SqlValue for u64 {
    fn from_sql(value: &Value) -> Result<Self> {
        let wide = integer_from(value, "u64")?;
        u64::try_from(wide)
            .map_err(|_| Error::conversion("u64", format!("value {} out of range", wide)))
    }

    fn to_sql(&self) -> Result<Value> {
        i64::try_from(*self)
            .map(Value::BigInt)
            .map_err(|_| Error::conversion("BIGINT", format!("u64 value {} out of range", self)))
    }

    fn null_value() -> Option<Self> {
        Some(0)
    }
}

impl SqlValue for bool {
    fn from_sql(value: &Value) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| Error::conversion("bool", value.type_name()))
    }

    fn to_sql(&self) -> Result<Value> {
        Ok(Value::Bool(*self))
    }

    fn null_value() -> Option<Self> {
        Some(false)
    }
}

impl SqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            other => {
                let wide = other
                    .as_f64()
                    .ok_or_else(|| Error::conversion("f32", other.type_name()))?;
                let narrow = wide as f32;
                if narrow.is_infinite() && wide.is_finite() {
                    return Err(Error::conversion(
                        "f32",
                        format!("value {} overflows f32", wide),
                    ));
                }
                Ok(narrow)
            }
        }
    }

    fn to_sql(&self) -> Result<Value> {
        Ok(Value::Float(*self))
    }

    fn null_value() -> Option<Self> {
        Some(0.0)
    }
}

impl SqlValue for f64 {
    fn from_sql(value: &Value) -> Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| Error::conversion("f64", value.type_name()))
    }

    fn to_sql(&self) -> Result<Value> {
        Ok(Value::Double(*self))
    }

    fn null_value() -> Option<Self> {
        Some(0.0)
    }
}

impl SqlValue for String {
    fn from_sql(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) | Value::Decimal(s) => Ok(s.clone()),
            Value::Json(v) => Ok(v.to_string()),
            other => Err(Error::conversion("String", other.type_name())),
        }
    }

    fn to_sql(&self) -> Result<Value> {
        Ok(Value::Text(self.clone()))
    }

    fn missing_value() -> Option<Self> {
        Some(String::new())
    }
}

impl SqlValue for Vec<u8> {
    fn from_sql(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            Value::Uuid(u) => Ok(u.to_vec()),
            other => Err(Error::conversion("Vec<u8>", other.type_name())),
        }
    }

    fn to_sql(&self) -> Result<Value> {
        Ok(Value::Bytes(self.clone()))
    }

    fn missing_value() -> Option<Self> {
        Some(Vec::new())
    }
}

impl SqlValue for [u8; 16] {
    fn from_sql(value: &Value) -> Result<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Bytes(b) if b.len() == 16 => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(b);
                Ok(arr)
            }
            Value::Text(s) => parse_uuid(s)
                .ok_or_else(|| Error::conversion("UUID", format!("malformed UUID text '{s}'"))),
            other => Err(Error::conversion("UUID", other.type_name())),
        }
    }

    fn to_sql(&self) -> Result<Value> {
        Ok(Value::Uuid(*self))
    }

    fn null_value() -> Option<Self> {
        Some([0u8; 16])
    }
}

fn parse_uuid(text: &str) -> Option<[u8; 16]> {
    let hex: Vec<u8> = text
        .trim_matches(|c| c == '{' || c == '}')
        .bytes()
        .filter(|b| *b != b'-')
        .collect();
    if hex.len() != 32 {
        return None;
    }
    let mut out = [0u8; 16];
    for (i, pair) in hex.chunks(2).enumerate() {
        let pair = std::str::from_utf8(pair).ok()?;
        out[i] = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(out)
}

impl SqlValue for serde_json::Value {
    fn from_sql(value: &Value) -> Result<Self> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            Value::Text(s) => serde_json::from_str(s)
                .map_err(|e| Error::conversion("valid JSON", format!("invalid JSON: {e}"))),
            other => Err(Error::conversion("JSON", other.type_name())),
        }
    }

    fn to_sql(&self) -> Result<Value> {
        Ok(Value::Json(self.clone()))
    }

    fn missing_value() -> Option<Self> {
        Some(serde_json::Value::Null)
    }
}

impl SqlValue for Value {
    fn from_sql(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }

    fn to_sql(&self) -> Result<Value> {
        Ok(self.clone())
    }

    fn null_value() -> Option<Self> {
        Some(Value::Null)
    }
}

impl<T: SqlValue> SqlValue for Option<T> {
    fn from_sql(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql(value).map(Some)
        }
    }

    fn to_sql(&self) -> Result<Value> {
        match self {
            Some(v) => v.to_sql(),
            None => Ok(Value::Null),
        }
    }

    fn type_hint() -> Option<SqlType> {
        T::type_hint()
    }

    fn null_value() -> Option<Self> {
        Some(None)
    }

    fn handler(handlers: &TypeHandlers) -> Arc<dyn TypeHandler<Self>> {
        handlers.lookup::<Self>().unwrap_or_else(|| {
            Arc::new(NullableHandler {
                inner: T::handler(handlers),
            })
        })
    }
}

/// A structured document stored as JSON text.
///
/// Reads accept either a JSON column or text holding a JSON document; writes
/// bind the canonical `serde_json` serialization as text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Json<T>(pub T);

impl<T> SqlValue for Json<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn from_sql(value: &Value) -> Result<Self> {
        let parsed = match value {
            Value::Json(v) => serde_json::from_value(v.clone()),
            Value::Text(s) => serde_json::from_str(s),
            other => return Err(Error::conversion("JSON document", other.type_name())),
        };
        parsed
            .map(Json)
            .map_err(|e| Error::conversion("JSON document", format!("invalid document: {e}")))
    }

    fn to_sql(&self) -> Result<Value> {
        serde_json::to_string(&self.0)
            .map(Value::Text)
            .map_err(|e| Error::conversion("JSON document", format!("document failed to serialize: {e}")))
    }

    fn type_hint() -> Option<SqlType> {
        Some(SqlType::Text)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Field-less enums stored as their numeric discriminant.
///
/// Usually implemented with `#[derive(SqlEnum)]`; pair with
/// [`sql_enum_value!`](crate::sql_enum_value) when implementing by hand.
pub trait SqlEnum: Copy + Send + 'static {
    /// Enum type name used in error messages.
    const NAME: &'static str;
    /// Variant names and their discriminants.
    const VARIANTS: &'static [(&'static str, i64)];
    /// Storage type used when binding.
    const STORAGE: SqlType;

    /// The variant for a discriminant.
    fn from_discriminant(discriminant: i64) -> Option<Self>;

    /// The discriminant of this variant.
    fn discriminant(self) -> i64;
}

/// Read an enum from its numeric value or case-insensitive variant name.
pub fn enum_from_sql<E: SqlEnum>(value: &Value) -> Result<E> {
    if let Value::Text(name) = value {
        let trimmed = name.trim();
        return E::VARIANTS
            .iter()
            .find(|(variant, _)| variant.eq_ignore_ascii_case(trimmed))
            .and_then(|(_, d)| E::from_discriminant(*d))
            .or_else(|| trimmed.parse::<i64>().ok().and_then(E::from_discriminant))
            .ok_or_else(|| {
                Error::conversion(E::NAME, format!("unrecognized enum text '{name}'"))
            });
    }
    let discriminant = integer_from(value, E::NAME)?;
    E::from_discriminant(discriminant).ok_or_else(|| {
        Error::conversion(E::NAME, format!("unrecognized discriminant {discriminant}"))
    })
}

/// Write an enum as its discriminant in the declared storage width.
///
/// A discriminant that does not fit the storage type is a conversion error,
/// so the bound value always agrees with the storage hint.
pub fn enum_to_sql<E: SqlEnum>(value: E) -> Result<Value> {
    let d = value.discriminant();
    let out_of_range = || {
        Error::conversion(
            E::NAME,
            format!("discriminant {d} does not fit {}", E::STORAGE.sql_name()),
        )
    };
    Ok(match E::STORAGE {
        SqlType::TinyInt => Value::TinyInt(i8::try_from(d).map_err(|_| out_of_range())?),
        SqlType::SmallInt => Value::SmallInt(i16::try_from(d).map_err(|_| out_of_range())?),
        SqlType::Integer => Value::Int(i32::try_from(d).map_err(|_| out_of_range())?),
        _ => Value::BigInt(d),
    })
}

/// Implement [`SqlValue`] for a type that implements [`SqlEnum`].
#[macro_export]
macro_rules! sql_enum_value {
    ($ty:ty) => {
        impl $crate::SqlValue for $ty {
            fn from_sql(value: &$crate::Value) -> $crate::Result<Self> {
                $crate::handler::enum_from_sql::<$ty>(value)
            }

            fn to_sql(&self) -> $crate::Result<$crate::Value> {
                $crate::handler::enum_to_sql::<$ty>(*self)
            }

            fn type_hint() -> ::std::option::Option<$crate::SqlType> {
                ::std::option::Option::Some(<$ty as $crate::SqlEnum>::STORAGE)
            }
        }
    };
}

// ============================================================================
// Untyped coercion
// ============================================================================

/// Coerce a value to the representation of a declared SQL type.
///
/// NULL passes through unchanged. Used where the target is described by a
/// [`SqlType`] rather than a Rust type, as with dynamic proxy members.
pub fn coerce(value: &Value, target: &SqlType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(match target {
        SqlType::TinyInt => Value::TinyInt(i8::from_sql(value)?),
        SqlType::SmallInt => Value::SmallInt(i16::from_sql(value)?),
        SqlType::Integer => Value::Int(i32::from_sql(value)?),
        SqlType::BigInt => Value::BigInt(i64::from_sql(value)?),
        SqlType::Real => Value::Float(f32::from_sql(value)?),
        SqlType::Double => Value::Double(f64::from_sql(value)?),
        SqlType::Decimal => match value {
            Value::Decimal(_) => value.clone(),
            Value::Text(s) if s.parse::<f64>().is_ok() => Value::Decimal(s.clone()),
            other => Value::Decimal(
                other
                    .to_literal()
                    .filter(|_| other.sql_type().is_numeric())
                    .ok_or_else(|| Error::conversion("DECIMAL", other.type_name()))?,
            ),
        },
        SqlType::Boolean => Value::Bool(bool::from_sql(value)?),
        SqlType::Text => Value::Text(String::from_sql(value)?),
        SqlType::Blob => Value::Bytes(Vec::<u8>::from_sql(value)?),
        SqlType::Uuid => Value::Uuid(<[u8; 16]>::from_sql(value)?),
        SqlType::Json => Value::Json(serde_json::Value::from_sql(value)?),
        SqlType::Date => match value {
            Value::Date(_) => value.clone(),
            other => Value::Date(i32::from_sql(other)?),
        },
        SqlType::Time => match value {
            Value::Time(_) => value.clone(),
            other => Value::Time(i64::from_sql(other)?),
        },
        SqlType::Timestamp => match value {
            Value::Timestamp(_) => value.clone(),
            other => Value::Timestamp(i64::from_sql(other)?),
        },
        SqlType::Array(_) | SqlType::Unknown => value.clone(),
    })
}
