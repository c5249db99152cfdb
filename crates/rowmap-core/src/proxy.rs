//! Dynamic proxies with change tracking.
//!
//! An [`InterfaceDescriptor`] is an ordered list of named, typed, annotated
//! members (inherited members first). A [`Proxy`] is a live instance of one:
//! its own value storage plus the set of members written since it was
//! created or last marked clean.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::CompileOptions;
use crate::cursor::RowCursor;
use crate::error::{Error, Result};
use crate::handler::{SqlValue, coerce};
use crate::materializer::Materializer;
use crate::shape::{Shape, Target};
use crate::types::SqlType;
use crate::value::Value;

static NEXT_INTERFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Declarative metadata attached to a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<(String, String)>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Add a named argument.
    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push((key.into(), value.into()));
        self
    }

    /// Look up an argument by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// One member declared by an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDecl {
    pub name: String,
    pub sql_type: SqlType,
    pub attributes: Vec<Attribute>,
    /// Interface that declared the member
    pub declared_in: String,
}

impl MemberDecl {
    /// First attribute named `name`.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Flattened description of a data-carrying interface.
#[derive(Debug)]
pub struct InterfaceDescriptor {
    id: u64,
    name: String,
    members: Vec<MemberDecl>,
    parents: Vec<Arc<InterfaceDescriptor>>,
}

impl InterfaceDescriptor {
    /// Start describing an interface.
    pub fn builder(name: impl Into<String>) -> InterfaceBuilder {
        InterfaceBuilder {
            name: name.into(),
            parents: Vec::new(),
            own: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every member, inherited ones first, in declaration order.
    pub fn members(&self) -> &[MemberDecl] {
        &self.members
    }

    pub fn parents(&self) -> &[Arc<InterfaceDescriptor>] {
        &self.parents
    }

    /// Ordinal of the member called `name`, ignoring ASCII case.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.name == name)
            .or_else(|| {
                self.members
                    .iter()
                    .position(|m| m.name.eq_ignore_ascii_case(name))
            })
    }

    pub fn member(&self, name: &str) -> Option<&MemberDecl> {
        self.index_of(name).map(|i| &self.members[i])
    }

    /// Whether this interface is `other` or inherits from it.
    pub fn extends(&self, other: &InterfaceDescriptor) -> bool {
        self.id == other.id || self.parents.iter().any(|p| p.extends(other))
    }

    /// Cache target for materializers producing this interface.
    pub fn target(&self) -> Target {
        Target::Interface {
            id: self.id,
            name: self.name.as_str().into(),
        }
    }
}

/// Builder for [`InterfaceDescriptor`].
#[derive(Debug)]
pub struct InterfaceBuilder {
    name: String,
    parents: Vec<Arc<InterfaceDescriptor>>,
    own: Vec<MemberDecl>,
}

impl InterfaceBuilder {
    /// Inherit every member of `parent`.
    #[must_use]
    pub fn extends(mut self, parent: &Arc<InterfaceDescriptor>) -> Self {
        self.parents.push(Arc::clone(parent));
        self
    }

    /// Declare a member.
    #[must_use]
    pub fn member(self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.annotated(name, sql_type, Vec::new())
    }

    /// Declare a member carrying metadata.
    #[must_use]
    pub fn annotated(
        mut self,
        name: impl Into<String>,
        sql_type: SqlType,
        attributes: Vec<Attribute>,
    ) -> Self {
        self.own.push(MemberDecl {
            name: name.into(),
            sql_type,
            attributes,
            declared_in: self.name.clone(),
        });
        self
    }

    /// Flatten inherited members and finish.
    ///
    /// A member inherited through several parents appears once. Declaring a
    /// member twice on the same interface is an error; redeclaring an
    /// inherited member replaces it in place.
    pub fn build(self) -> Result<Arc<InterfaceDescriptor>> {
        let mut members: Vec<MemberDecl> = Vec::new();
        for parent in &self.parents {
            for member in parent.members() {
                if !members.iter().any(|m| m.name.eq_ignore_ascii_case(&member.name)) {
                    members.push(member.clone());
                }
            }
        }
        for (i, member) in self.own.iter().enumerate() {
            if self.own[..i]
                .iter()
                .any(|m| m.name.eq_ignore_ascii_case(&member.name))
            {
                return Err(Error::Custom(format!(
                    "interface {} declares member '{}' twice",
                    self.name, member.name
                )));
            }
            match members
                .iter()
                .position(|m| m.name.eq_ignore_ascii_case(&member.name))
            {
                Some(existing) => members[existing] = member.clone(),
                None => members.push(member.clone()),
            }
        }
        let id = NEXT_INTERFACE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(interface = %self.name, id, members = members.len(), "Built interface descriptor");
        Ok(Arc::new(InterfaceDescriptor {
            id,
            name: self.name,
            members,
            parents: self.parents,
        }))
    }
}

/// Side-channel change tracking.
pub trait ChangeTracking {
    /// Whether any member was written since creation or the last clean.
    fn is_dirty(&self) -> bool;

    /// Names of written members, in declaration order.
    fn dirty_members(&self) -> Vec<&str>;

    /// Forget every recorded write.
    fn mark_clean(&mut self);
}

/// A live instance of an interface.
///
/// Each proxy owns its storage; clones are independent copies.
#[derive(Clone)]
pub struct Proxy {
    interface: Arc<InterfaceDescriptor>,
    values: Vec<Value>,
    dirty: BTreeSet<usize>,
}

impl Proxy {
    /// A clean instance with every member NULL.
    pub fn new(interface: Arc<InterfaceDescriptor>) -> Self {
        let values = vec![Value::Null; interface.members().len()];
        Self {
            interface,
            values,
            dirty: BTreeSet::new(),
        }
    }

    pub fn interface(&self) -> &Arc<InterfaceDescriptor> {
        &self.interface
    }

    /// Current value of a member.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.interface.index_of(name).map(|i| &self.values[i])
    }

    /// Current value of a member, converted.
    pub fn get_as<T: SqlValue>(&self, name: &str) -> Result<T> {
        let value = self.get(name).ok_or_else(|| self.unknown(name))?;
        if value.is_null() {
            if let Some(default) = T::null_value() {
                return Ok(default);
            }
        }
        T::from_sql(value).map_err(|e| e.in_column(name))
    }

    /// Write a member. The value is coerced to the member's declared type.
    ///
    /// Returns whether the stored value changed. Only a change marks the
    /// member dirty.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<bool> {
        let index = self.interface.index_of(name).ok_or_else(|| self.unknown(name))?;
        let member = &self.interface.members()[index];
        let value = coerce(&value.into(), &member.sql_type).map_err(|e| e.in_column(&member.name))?;
        if self.values[index] == value {
            return Ok(false);
        }
        self.values[index] = value;
        self.dirty.insert(index);
        Ok(true)
    }

    /// Declaration of a member, with its metadata.
    pub fn member(&self, name: &str) -> Option<&MemberDecl> {
        self.interface.member(name)
    }

    /// (member name, value) pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.interface
            .members()
            .iter()
            .map(|m| m.name.as_str())
            .zip(self.values.iter())
    }

    fn populate(&mut self, index: usize, value: Value) {
        self.values[index] = value;
        self.dirty.insert(index);
    }

    fn unknown(&self, name: &str) -> Error {
        Error::Custom(format!(
            "interface {} has no member '{name}'",
            self.interface.name()
        ))
    }
}

impl ChangeTracking for Proxy {
    fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    fn dirty_members(&self) -> Vec<&str> {
        self.dirty
            .iter()
            .map(|&i| self.interface.members()[i].name.as_str())
            .collect()
    }

    fn mark_clean(&mut self) {
        self.dirty.clear();
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.iter() {
            map.entry(&name, value);
        }
        map.finish()
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.interface.id == other.interface.id && self.values == other.values
    }
}

/// Compile a row-to-proxy materializer for `interface` over `window`.
pub(crate) fn compile_proxy(
    interface: &Arc<InterfaceDescriptor>,
    window: &Shape,
    start: usize,
    options: CompileOptions,
) -> Materializer<Proxy> {
    let mut bindings = Vec::new();
    for (i, column) in window.columns().iter().enumerate() {
        let found = interface
            .members()
            .iter()
            .position(|m| m.name == column.name)
            .or_else(|| {
                interface
                    .members()
                    .iter()
                    .position(|m| options.names_match(&column.name, &m.name))
            });
        match found {
            Some(member) => bindings.push((start + i, member)),
            None => tracing::trace!(column = %column.name, "Column has no matching interface member"),
        }
    }
    tracing::debug!(
        interface = %interface.name(),
        bound = bindings.len(),
        start,
        "Compiled proxy materializer"
    );

    let interface = Arc::clone(interface);
    let apply_nulls = options.apply_null_values;
    Materializer::from_fn(move |cursor: &dyn RowCursor| {
        let mut proxy = Proxy::new(Arc::clone(&interface));
        for &(ordinal, member) in &bindings {
            let raw = cursor.value(ordinal)?;
            if raw.is_null() && !apply_nulls {
                continue;
            }
            let decl = &interface.members()[member];
            let value = coerce(raw, &decl.sql_type).map_err(|e| e.in_column(&decl.name))?;
            proxy.populate(member, value);
        }
        Ok(proxy)
    })
}
