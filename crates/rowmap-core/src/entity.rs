//! Entity descriptors.
//!
//! An [`Entity`] describes how it can be built from a row: which
//! constructors it exposes (with parameter names), which members can be
//! assigned after construction, and whether it simply captures every column.
//! The description is reflected over once per shape when a materializer is
//! compiled; the per-row work is a fixed list of boxed closures.
//!
//! `#[derive(Entity)]` writes the descriptor for ordinary structs. Tuples of
//! scalar values are entities that bind by column position.

use std::sync::Arc;

use crate::error::Result;
use crate::handler::{SqlValue, TypeHandlers};
use crate::row::ColumnInfo;
use crate::value::Value;

/// A type that rows can be materialized into.
pub trait Entity: Sized + Send + 'static {
    /// Describe how to construct and populate `Self`.
    fn describe() -> EntityDescriptor<Self>;
}

/// Assigns one converted column value to a member.
pub(crate) type MemberSetter<T> = Box<dyn Fn(&mut T, &Value) -> Result<()> + Send + Sync>;

/// Builds a value from constructor arguments, given the argument values and
/// the column names they came from. Both slices have exactly the
/// constructor's arity.
#[doc(hidden)]
/// Builds a value from one slot per argument; `None` marks a column the
/// row does not have.
pub type ArgsBuilder<T> = Box<dyn Fn(&[Option<&Value>], &[String]) -> Result<T> + Send + Sync>;

pub(crate) type DefaultBuilder<T> = Arc<dyn Fn() -> T + Send + Sync>;

pub(crate) type LooseBuilder<T> = Arc<dyn Fn(Arc<ColumnInfo>, Vec<Value>) -> T + Send + Sync>;

/// A settable member.
pub struct Member<T> {
    name: &'static str,
    bind: Box<dyn Fn(&TypeHandlers) -> MemberSetter<T> + Send + Sync>,
}

impl<T: 'static> Member<T> {
    /// A member named `name` holding values of type `F`.
    pub fn new<F: SqlValue>(
        name: &'static str,
        assign: impl Fn(&mut T, F) + Send + Sync + 'static,
    ) -> Self {
        let assign = Arc::new(assign);
        Self {
            name,
            bind: Box::new(move |handlers: &TypeHandlers| -> MemberSetter<T> {
                let handler = handlers.resolve::<F>();
                let assign = Arc::clone(&assign);
                Box::new(move |target: &mut T, value: &Value| -> Result<()> {
                    assign(target, handler.read_nullable(value)?);
                    Ok(())
                })
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn bind(&self, handlers: &TypeHandlers) -> MemberSetter<T> {
        (self.bind)(handlers)
    }
}

/// Argument tuples a constructor can take.
///
/// Implemented for tuples of one to twelve [`SqlValue`] types.
pub trait ArgList: Sized + Send + 'static {
    /// Number of arguments.
    const LEN: usize;

    /// Resolve a handler per argument and return a reader for the tuple.
    #[doc(hidden)]
    fn reader(handlers: &TypeHandlers) -> ArgsBuilder<Self>;
}

macro_rules! arg_list {
    ($len:expr => $($name:ident $idx:tt),+) => {
        impl<$($name: SqlValue),+> ArgList for ($($name,)+) {
            const LEN: usize = $len;

            fn reader(handlers: &TypeHandlers) -> ArgsBuilder<Self> {
                let resolved = ($(handlers.resolve::<$name>(),)+);
                Box::new(move |values: &[Option<&Value>], names: &[String]| -> Result<Self> {
                    Ok(($(
                        match values[$idx] {
                            Some(value) => resolved.$idx.read_nullable(value),
                            None => resolved.$idx.read_missing(),
                        }
                        .map_err(|e| e.in_column(&names[$idx]))?,
                    )+))
                })
            }
        }
    };
}

arg_list!(1 => A 0);
arg_list!(2 => A 0, B 1);
arg_list!(3 => A 0, B 1, C 2);
arg_list!(4 => A 0, B 1, C 2, D 3);
arg_list!(5 => A 0, B 1, C 2, D 3, E 4);
arg_list!(6 => A 0, B 1, C 2, D 3, E 4, F 5);
arg_list!(7 => A 0, B 1, C 2, D 3, E 4, F 5, G 6);
arg_list!(8 => A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
arg_list!(9 => A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8);
arg_list!(10 => A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9);
arg_list!(11 => A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10);
arg_list!(12 => A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11);

/// A constructor taking named (or positional) arguments.
pub struct Constructor<T> {
    params: Vec<&'static str>,
    arity: usize,
    preferred: bool,
    by_position: bool,
    bind: Box<dyn Fn(&TypeHandlers) -> ArgsBuilder<T> + Send + Sync>,
}

impl<T: 'static> Constructor<T> {
    /// A constructor whose arguments bind to the columns named `params`.
    ///
    /// `params` must list one name per element of `A`; a mismatch is
    /// reported as a construction error when a materializer is compiled.
    pub fn new<A: ArgList>(
        params: &[&'static str],
        build: impl Fn(A) -> T + Send + Sync + 'static,
    ) -> Self {
        Self::with_binding::<A>(params.to_vec(), false, build)
    }

    /// A constructor whose arguments bind to columns by position.
    ///
    /// Columns beyond the arity are ignored. Arguments past the last
    /// column take their type's missing-column default (`0`, `None`, an
    /// empty string).
    pub fn positional<A: ArgList>(build: impl Fn(A) -> T + Send + Sync + 'static) -> Self {
        Self::with_binding::<A>(Vec::new(), true, build)
    }

    fn with_binding<A: ArgList>(
        params: Vec<&'static str>,
        by_position: bool,
        build: impl Fn(A) -> T + Send + Sync + 'static,
    ) -> Self {
        let build = Arc::new(build);
        Self {
            params,
            arity: A::LEN,
            preferred: false,
            by_position,
            bind: Box::new(move |handlers: &TypeHandlers| -> ArgsBuilder<T> {
                let read = A::reader(handlers);
                let build = Arc::clone(&build);
                Box::new(move |values: &[Option<&Value>], names: &[String]| -> Result<T> {
                    Ok(build(read(values, names)?))
                })
            }),
        }
    }

    /// Prefer this constructor over the parameterless one.
    #[must_use]
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }

    pub fn params(&self) -> &[&'static str] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_preferred(&self) -> bool {
        self.preferred
    }

    pub fn is_positional(&self) -> bool {
        self.by_position
    }

    pub(crate) fn bind(&self, handlers: &TypeHandlers) -> ArgsBuilder<T> {
        (self.bind)(handlers)
    }
}

/// Everything the materializer compiler needs to know about an entity.
pub struct EntityDescriptor<T> {
    name: &'static str,
    default: Option<DefaultBuilder<T>>,
    constructors: Vec<Constructor<T>>,
    members: Vec<Member<T>>,
    loose: Option<LooseBuilder<T>>,
}

impl<T: 'static> EntityDescriptor<T> {
    /// Start an empty descriptor.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            default: None,
            constructors: Vec::new(),
            members: Vec::new(),
            loose: None,
        }
    }

    /// Declare the parameterless constructor.
    #[must_use]
    pub fn default_constructor(mut self, make: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(make));
        self
    }

    /// Declare a constructor.
    #[must_use]
    pub fn constructor(mut self, constructor: Constructor<T>) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Declare a settable member.
    #[must_use]
    pub fn member<F: SqlValue>(
        mut self,
        name: &'static str,
        assign: impl Fn(&mut T, F) + Send + Sync + 'static,
    ) -> Self {
        self.members.push(Member::new(name, assign));
        self
    }

    /// Capture every column instead of matching by name.
    #[must_use]
    pub fn capture_all(
        mut self,
        build: impl Fn(Arc<ColumnInfo>, Vec<Value>) -> T + Send + Sync + 'static,
    ) -> Self {
        self.loose = Some(Arc::new(build));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn members(&self) -> &[Member<T>] {
        &self.members
    }

    pub fn constructors(&self) -> &[Constructor<T>] {
        &self.constructors
    }

    pub fn has_default_constructor(&self) -> bool {
        self.default.is_some()
    }

    pub(crate) fn default_builder(&self) -> Option<DefaultBuilder<T>> {
        self.default.clone()
    }

    pub(crate) fn loose_builder(&self) -> Option<LooseBuilder<T>> {
        self.loose.clone()
    }
}

impl<T: Default + 'static> EntityDescriptor<T> {
    /// A descriptor constructed through `Default`.
    pub fn with_default(name: &'static str) -> Self {
        Self::new(name).default_constructor(T::default)
    }
}

macro_rules! tuple_entity {
    ($($name:ident),+) => {
        impl<$($name: SqlValue),+> Entity for ($($name,)+) {
            fn describe() -> EntityDescriptor<Self> {
                EntityDescriptor::new(std::any::type_name::<Self>())
                    .constructor(Constructor::positional(|args: Self| args))
            }
        }
    };
}

tuple_entity!(A);
tuple_entity!(A, B);
tuple_entity!(A, B, C);
tuple_entity!(A, B, C, D);
tuple_entity!(A, B, C, D, E);
tuple_entity!(A, B, C, D, E, F);
tuple_entity!(A, B, C, D, E, F, G);
tuple_entity!(A, B, C, D, E, F, G, H);
tuple_entity!(A, B, C, D, E, F, G, H, I);
tuple_entity!(A, B, C, D, E, F, G, H, I, J);
tuple_entity!(A, B, C, D, E, F, G, H, I, J, K);
tuple_entity!(A, B, C, D, E, F, G, H, I, J, K, L);
