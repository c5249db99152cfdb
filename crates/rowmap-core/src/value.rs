//! Dynamic SQL values.

use serde::{Deserialize, Serialize};

use crate::types::SqlType;

/// A dynamically-typed SQL value.
///
/// This enum represents every value a row cursor can hand back and every
/// value that can be bound as a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 8-bit signed integer
    TinyInt(i8),

    /// 16-bit signed integer
    SmallInt(i16),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// Arbitrary precision decimal (stored as string)
    Decimal(String),

    /// Text string
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Date (days since epoch)
    Date(i32),

    /// Time (microseconds since midnight)
    Time(i64),

    /// Timestamp (microseconds since epoch)
    Timestamp(i64),

    /// UUID (as 16 bytes)
    Uuid([u8; 16]),

    /// JSON value
    Json(serde_json::Value),

    /// Array of values
    Array(Vec<Value>),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::TinyInt(_) => "TINYINT",
            Value::SmallInt(_) => "SMALLINT",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "REAL",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::Uuid(_) => "UUID",
            Value::Json(_) => "JSON",
            Value::Array(_) => "ARRAY",
        }
    }

    /// The SQL type a driver would report for a column holding this value.
    pub fn sql_type(&self) -> SqlType {
        match self {
            Value::Null => SqlType::Unknown,
            Value::Bool(_) => SqlType::Boolean,
            Value::TinyInt(_) => SqlType::TinyInt,
            Value::SmallInt(_) => SqlType::SmallInt,
            Value::Int(_) => SqlType::Integer,
            Value::BigInt(_) => SqlType::BigInt,
            Value::Float(_) => SqlType::Real,
            Value::Double(_) => SqlType::Double,
            Value::Decimal(_) => SqlType::Decimal,
            Value::Text(_) => SqlType::Text,
            Value::Bytes(_) => SqlType::Blob,
            Value::Date(_) => SqlType::Date,
            Value::Time(_) => SqlType::Time,
            Value::Timestamp(_) => SqlType::Timestamp,
            Value::Uuid(_) => SqlType::Uuid,
            Value::Json(_) => SqlType::Json,
            Value::Array(items) => SqlType::Array(Box::new(
                items
                    .iter()
                    .find(|v| !v.is_null())
                    .map_or(SqlType::Unknown, Value::sql_type),
            )),
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::TinyInt(v) => Some(*v != 0),
            Value::SmallInt(v) => Some(*v != 0),
            Value::Int(v) => Some(*v != 0),
            Value::BigInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(i64::from(*v)),
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::TinyInt(v) => Some(f64::from(*v)),
            Value::SmallInt(v) => Some(f64::from(*v)),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            Value::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Render this value as inline SQL literal text.
    ///
    /// Only values with an unambiguous, injection-free textual form are
    /// renderable: NULL, booleans (as `1`/`0`), integers, finite floats and
    /// well-formed decimals. An array renders as a parenthesised list for
    /// `IN` clauses, provided every element is itself renderable; an empty
    /// array renders as a subquery that matches nothing. Everything else
    /// returns `None`.
    ///
    /// ```
    /// use rowmap_core::Value;
    ///
    /// assert_eq!(Value::Bool(true).to_literal().as_deref(), Some("1"));
    /// assert_eq!(Value::Decimal("-12.50".into()).to_literal().as_deref(), Some("-12.50"));
    /// assert_eq!(Value::Text("x".into()).to_literal(), None);
    /// assert_eq!(
    ///     Value::Array(vec![Value::Int(1), Value::Int(2)]).to_literal().as_deref(),
    ///     Some("(1,2)")
    /// );
    /// ```
    pub fn to_literal(&self) -> Option<String> {
        match self {
            Value::Null => Some("null".to_string()),
            Value::Bool(v) => Some(if *v { "1" } else { "0" }.to_string()),
            Value::TinyInt(v) => Some(v.to_string()),
            Value::SmallInt(v) => Some(v.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::BigInt(v) => Some(v.to_string()),
            Value::Float(v) if v.is_finite() => Some(v.to_string()),
            Value::Double(v) if v.is_finite() => Some(v.to_string()),
            Value::Decimal(s) if is_decimal_text(s) => Some(s.clone()),
            Value::Array(items) if items.is_empty() => Some("(SELECT NULL WHERE 1 = 0)".to_string()),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Array(_) => None,
                    scalar => scalar.to_literal(),
                })
                .collect::<Option<Vec<_>>>()
                .map(|parts| format!("({})", parts.join(","))),
            _ => None,
        }
    }
}

/// Renders the value for messages: text quoted, NULL as `NULL`.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::TinyInt(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Decimal(s) => write!(f, "{s}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Json(v) => write!(f, "{v}"),
            other => write!(f, "{other:?}"),
        }
    }
}

fn is_decimal_text(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut seen_dot = false;
    let mut seen_digit = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    seen_digit
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<[u8; 16]> for Value {
    fn from(v: [u8; 16]) -> Self {
        Value::Uuid(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_sql_types() {
        assert_eq!(Value::Null.sql_type(), SqlType::Unknown);
        assert_eq!(Value::BigInt(1).sql_type(), SqlType::BigInt);
        assert_eq!(Value::Text("a".into()).sql_type(), SqlType::Text);
        assert_eq!(
            Value::Array(vec![Value::Null, Value::Int(1)]).sql_type(),
            SqlType::Array(Box::new(SqlType::Integer))
        );
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::TinyInt(-3).as_i64(), Some(-3));
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::Double(1.0).as_i64(), None);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(Some(5_i32)), Value::Int(5));
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn test_literals() {
        assert_eq!(Value::Null.to_literal().as_deref(), Some("null"));
        assert_eq!(Value::Bool(false).to_literal().as_deref(), Some("0"));
        assert_eq!(Value::BigInt(-42).to_literal().as_deref(), Some("-42"));
        assert_eq!(Value::Double(2.5).to_literal().as_deref(), Some("2.5"));
        assert_eq!(Value::Double(f64::NAN).to_literal(), None);
        assert_eq!(Value::Decimal("1.2.3".into()).to_literal(), None);
        assert_eq!(Value::Decimal("1; drop".into()).to_literal(), None);
        assert_eq!(Value::Bytes(vec![1]).to_literal(), None);
    }

    #[test]
    fn test_list_literals() {
        let ids = Value::Array(vec![Value::Int(1), Value::BigInt(2), Value::Bool(true)]);
        assert_eq!(ids.to_literal().as_deref(), Some("(1,2,1)"));
        assert_eq!(
            Value::Array(Vec::new()).to_literal().as_deref(),
            Some("(SELECT NULL WHERE 1 = 0)")
        );
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Text("x".into())]).to_literal(),
            None
        );
        assert_eq!(
            Value::Array(vec![Value::Array(vec![Value::Int(1)])]).to_literal(),
            None
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Text("abc".into()).to_string(), "'abc'");
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
