//! SQL type definitions used for shapes and parameter hints.

use serde::{Deserialize, Serialize};

/// SQL data types observed on result set columns and declared on parameters.
///
/// The same enum serves as the runtime column type in a [`Shape`](crate::Shape)
/// and as the explicit storage hint attached to a bound parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    // Integer types
    TinyInt,
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,

    // Fixed precision
    Decimal,

    // Boolean
    Boolean,

    // String and binary
    Text,
    Blob,

    // Date/time types
    Date,
    Time,
    Timestamp,

    // UUID
    Uuid,

    // JSON
    Json,

    // Arrays
    Array(Box<SqlType>),

    /// Column whose type the driver could not report (e.g. an all-NULL column)
    Unknown,
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::TinyInt => "TINYINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal => "DECIMAL".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::Array(inner) => format!("{}[]", inner.sql_name()),
            SqlType::Unknown => "UNKNOWN".to_string(),
        }
    }

    /// Parse an integer storage name as accepted by `#[rowmap(storage = "...")]`.
    ///
    /// Returns `None` for names that are not integer storage types.
    pub fn integer_storage(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tinyint" | "i8" => Some(SqlType::TinyInt),
            "smallint" | "i16" => Some(SqlType::SmallInt),
            "integer" | "int" | "i32" => Some(SqlType::Integer),
            "bigint" | "i64" => Some(SqlType::BigInt),
            _ => None,
        }
    }

    /// Check if this type is numeric.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt
                | SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Real
                | SqlType::Double
                | SqlType::Decimal
        )
    }

    /// Check if this type is an integer type.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
        )
    }

    /// Check if this type is a date/time type.
    pub const fn is_temporal(&self) -> bool {
        matches!(self, SqlType::Date | SqlType::Time | SqlType::Timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_storage_names() {
        assert_eq!(SqlType::integer_storage("SmallInt"), Some(SqlType::SmallInt));
        assert_eq!(SqlType::integer_storage("i64"), Some(SqlType::BigInt));
        assert_eq!(SqlType::integer_storage("text"), None);
    }

    #[test]
    fn array_names_nest() {
        let ty = SqlType::Array(Box::new(SqlType::Integer));
        assert_eq!(ty.sql_name(), "INTEGER[]");
        assert!(!ty.is_numeric());
        assert!(SqlType::Decimal.is_numeric());
        assert!(!SqlType::Decimal.is_integer());
    }
}
