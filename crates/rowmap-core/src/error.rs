//! Error types for mapping operations.

use std::fmt;

/// The primary error type for all rowmap operations.
#[derive(Debug)]
pub enum Error {
    /// No usable constructor or member mapping for a target type
    Construction(ConstructionError),
    /// A column value could not be coerced to the declared member type
    Conversion(ConversionError),
    /// A discriminator value has no registered concrete type
    UnrecognizedVariant(UnrecognizedVariantError),
    /// A grid reader was driven out of order or after it finished
    Sequencing(SequencingError),
    /// Column ranges could not be derived from the result set shape
    Shape(ShapeError),
    /// Failure reported by the driver collaborator
    Driver(DriverError),
    /// A `{=name}` literal token could not be rendered
    Literal(LiteralError),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConstructionError {
    pub target: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ConversionError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
    pub target: Option<&'static str>,
}

#[derive(Debug)]
pub struct UnrecognizedVariantError {
    pub base: &'static str,
    pub column: String,
    pub value: String,
}

#[derive(Debug)]
pub struct SequencingError {
    pub kind: SequencingErrorKind,
    pub result_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencingErrorKind {
    /// A previous unbuffered reader was not fully consumed
    ReaderActive,
    /// Every result set has already been read
    Exhausted,
    /// The reader was disposed
    Disposed,
    /// The underlying cursor faulted mid-read
    Faulted,
}

#[derive(Debug)]
pub struct ShapeError {
    pub kind: ShapeErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeErrorKind {
    /// Split column name matches more columns than there are boundaries
    AmbiguousSplit,
    /// Split column name does not appear where a boundary is needed
    SplitNotFound,
    /// Explicit split ordinals are out of order or out of range
    InvalidSplit,
    /// A requested column window lies outside the result set
    ColumnOutOfRange,
}

#[derive(Debug)]
pub struct DriverError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct LiteralError {
    pub name: String,
    pub message: String,
}

impl Error {
    /// Is this a grid reader ordering/exhaustion failure?
    pub fn is_sequencing(&self) -> bool {
        matches!(self, Error::Sequencing(_))
    }

    /// Is this a value conversion failure?
    pub fn is_conversion(&self) -> bool {
        matches!(self, Error::Conversion(_))
    }

    /// The sequencing kind, if this is a sequencing error.
    pub fn sequencing_kind(&self) -> Option<SequencingErrorKind> {
        match self {
            Error::Sequencing(e) => Some(e.kind),
            _ => None,
        }
    }

    /// The shape kind, if this is a shape error.
    pub fn shape_kind(&self) -> Option<ShapeErrorKind> {
        match self {
            Error::Shape(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Attach a column name to a conversion error that has none yet.
    #[must_use]
    pub fn in_column(self, column: &str) -> Self {
        match self {
            Error::Conversion(mut e) => {
                if e.column.is_none() {
                    e.column = Some(column.to_string());
                }
                Error::Conversion(e)
            }
            other => other,
        }
    }

    /// Attach the target type name to a conversion error that has none yet.
    #[must_use]
    pub fn in_target(self, target: &'static str) -> Self {
        match self {
            Error::Conversion(mut e) => {
                if e.target.is_none() {
                    e.target = Some(target);
                }
                Error::Conversion(e)
            }
            other => other,
        }
    }

    pub(crate) fn conversion(expected: &'static str, actual: impl Into<String>) -> Self {
        Error::Conversion(ConversionError {
            expected,
            actual: actual.into(),
            column: None,
            target: None,
        })
    }

    pub(crate) fn construction(target: &'static str, message: impl Into<String>) -> Self {
        Error::Construction(ConstructionError {
            target,
            message: message.into(),
        })
    }

    pub(crate) fn sequencing(kind: SequencingErrorKind, result_index: usize) -> Self {
        Error::Sequencing(SequencingError { kind, result_index })
    }

    pub(crate) fn shape(kind: ShapeErrorKind, message: impl Into<String>) -> Self {
        Error::Shape(ShapeError {
            kind,
            message: message.into(),
        })
    }
}

impl DriverError {
    /// Wrap a driver failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Construction(e) => write!(f, "Construction error: {}", e),
            Error::Conversion(e) => write!(f, "Conversion error: {}", e),
            Error::UnrecognizedVariant(e) => write!(f, "Unrecognized variant: {}", e),
            Error::Sequencing(e) => write!(f, "Sequencing error: {}", e),
            Error::Shape(e) => write!(f, "Shape error: {}", e.message),
            Error::Driver(e) => write!(f, "Driver error: {}", e.message),
            Error::Literal(e) => write!(f, "Literal error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Driver(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot construct {}: {}", self.target, self.message)
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for UnrecognizedVariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no {} variant registered for {} = {}",
            self.base, self.column, self.value
        )
    }
}

impl fmt::Display for SequencingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            SequencingErrorKind::ReaderActive => {
                "the previous unbuffered reader has not been fully consumed"
            }
            SequencingErrorKind::Exhausted => "all result sets have already been read",
            SequencingErrorKind::Disposed => "the grid reader has been disposed",
            SequencingErrorKind::Faulted => "the underlying cursor faulted during a read",
        };
        write!(f, "{} (result set {})", what, self.result_index)
    }
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{={}}}: {}", self.name, self.message)
    }
}

impl From<ConstructionError> for Error {
    fn from(err: ConstructionError) -> Self {
        Error::Construction(err)
    }
}

impl From<ConversionError> for Error {
    fn from(err: ConversionError) -> Self {
        Error::Conversion(err)
    }
}

impl From<UnrecognizedVariantError> for Error {
    fn from(err: UnrecognizedVariantError) -> Self {
        Error::UnrecognizedVariant(err)
    }
}

impl From<SequencingError> for Error {
    fn from(err: SequencingError) -> Self {
        Error::Sequencing(err)
    }
}

impl From<ShapeError> for Error {
    fn from(err: ShapeError) -> Self {
        Error::Shape(err)
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        Error::Driver(err)
    }
}

impl From<LiteralError> for Error {
    fn from(err: LiteralError) -> Self {
        Error::Literal(err)
    }
}

/// Result type alias for rowmap operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_column_stamps_only_missing_column() {
        let err = Error::conversion("i32", "TEXT").in_column("age");
        match &err {
            Error::Conversion(e) => assert_eq!(e.column.as_deref(), Some("age")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "Conversion error: expected i32 for column 'age', found TEXT"
        );

        let err = err.in_column("other");
        match err {
            Error::Conversion(e) => assert_eq!(e.column.as_deref(), Some("age")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn kind_helpers() {
        let err = Error::sequencing(SequencingErrorKind::Exhausted, 4);
        assert!(err.is_sequencing());
        assert!(!err.is_conversion());
        assert_eq!(err.sequencing_kind(), Some(SequencingErrorKind::Exhausted));
        assert!(err.to_string().contains("result set 4"));

        let err = Error::shape(ShapeErrorKind::AmbiguousSplit, "Id appears twice");
        assert_eq!(err.shape_kind(), Some(ShapeErrorKind::AmbiguousSplit));
        assert_eq!(err.sequencing_kind(), None);
    }

    #[test]
    fn driver_error_exposes_source() {
        use std::error::Error as _;

        let io = std::io::Error::other("socket closed");
        let err = Error::from(DriverError::new("read failed").with_source(io));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Driver error: read failed");
    }
}
