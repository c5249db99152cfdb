//! Named command parameters.

use std::fmt;

use crate::error::Result;
use crate::handler::{ParamValue, SqlValue, TypeHandlers};
use crate::types::SqlType;
use crate::value::Value;

/// A parameter after it has been written through its type handler.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub value: Value,
    /// Explicit storage hint; `None` leaves inference to the driver.
    pub sql_type: Option<SqlType>,
}

impl BoundParam {
    /// Does this parameter answer to `name`? Leading `@`, `:` or `$`
    /// sigils are ignored on both sides and the comparison ignores case.
    pub fn is_named(&self, name: &str) -> bool {
        strip_sigil(&self.name).eq_ignore_ascii_case(strip_sigil(name))
    }
}

fn strip_sigil(name: &str) -> &str {
    name.trim_start_matches(['@', ':', '$'])
}

type Binder = Box<dyn Fn(&TypeHandlers) -> Result<ParamValue> + Send>;

/// Ordered bag of named parameter values.
///
/// Values are kept typed until binding so the handler registered for their
/// type (including enum storage hints) decides how they reach the driver.
///
/// ```
/// use rowmap_core::{Params, TypeHandlers, Value};
///
/// let params = Params::new().bind("id", 7_i32).bind("name", "Ada".to_string());
/// let bound = params.bind_all(&TypeHandlers::new()).unwrap();
/// assert_eq!(bound[0].value, Value::Int(7));
/// assert_eq!(bound[1].name, "name");
/// ```
#[derive(Default)]
pub struct Params {
    entries: Vec<(String, Binder)>,
}

impl Params {
    /// Create an empty parameter bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, builder style.
    #[must_use]
    pub fn bind<T: SqlValue>(mut self, name: impl Into<String>, value: T) -> Self {
        self.push(name, value);
        self
    }

    /// Add a parameter.
    pub fn push<T: SqlValue>(&mut self, name: impl Into<String>, value: T) {
        self.entries.push((
            name.into(),
            Box::new(move |handlers: &TypeHandlers| handlers.resolve::<T>().write(&value)),
        ));
    }

    /// Append every parameter of `other`.
    pub fn extend(&mut self, other: Params) {
        self.entries.extend(other.entries);
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parameter names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Write every value through its resolved handler.
    pub fn bind_all(&self, handlers: &TypeHandlers) -> Result<Vec<BoundParam>> {
        self.entries
            .iter()
            .map(|(name, binder)| {
                let ParamValue { value, sql_type } = binder(handlers)?;
                Ok(BoundParam {
                    name: name.clone(),
                    value,
                    sql_type,
                })
            })
            .collect()
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Params")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// Converts an object into command parameters, one per mapped member.
pub trait ToParams {
    fn to_params(&self) -> Params;
}

impl ToParams for () {
    fn to_params(&self) -> Params {
        Params::new()
    }
}
