//! The mapper: configuration, handler registry, materializer cache and
//! polymorphic registrations, plus the query surface built on them.
//!
//! A [`Mapper`] is `Send + Sync` and meant to be shared. Every query takes
//! the driver by `&mut`, so one cursor is only ever driven by one caller.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::cache::MaterializerCache;
use crate::config::{CompileOptions, MapperConfig};
use crate::cursor::{Driver, RowCursor};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::grid::GridReader;
use crate::handler::{SqlValue, TypeHandler, TypeHandlers};
use crate::literal::expand_literals;
use crate::materializer::{Materializer, compile_entity};
use crate::params::{BoundParam, Params};
use crate::polymorphic::{Discriminator, Discriminators, PolymorphicReader, Variant};
use crate::proxy::{InterfaceDescriptor, Proxy, compile_proxy};
use crate::shape::{Shape, ShapeKey, Target};
use crate::split::{SplitOn, SplitReader, SplitTargets};
use crate::stream::{RowFn, RowStream, Rows, drain};

/// Entry point for materializing query results.
pub struct Mapper {
    config: MapperConfig,
    options: CompileOptions,
    handlers: TypeHandlers,
    cache: MaterializerCache,
    discriminators: Discriminators,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::with_config(MapperConfig::default())
    }
}

impl Mapper {
    /// Create a mapper with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mapper with an explicit configuration.
    pub fn with_config(config: MapperConfig) -> Self {
        Self {
            options: config.compile_options(),
            config,
            handlers: TypeHandlers::new(),
            cache: MaterializerCache::new(),
            discriminators: Discriminators::new(),
        }
    }

    /// Process-wide mapper with the default configuration.
    pub fn global() -> &'static Mapper {
        static GLOBAL: OnceLock<Mapper> = OnceLock::new();
        GLOBAL.get_or_init(Mapper::new)
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Registered type handler overrides.
    ///
    /// Registering through this reference does not purge compiled
    /// materializers; prefer [`Mapper::register_type_handler`].
    pub fn handlers(&self) -> &TypeHandlers {
        &self.handlers
    }

    pub fn discriminators(&self) -> &Discriminators {
        &self.discriminators
    }

    pub fn cache(&self) -> &MaterializerCache {
        &self.cache
    }

    // ==================== Registration ====================

    /// Register a type handler for `T` and purge every compiled materializer
    /// so later compilations pick it up.
    pub fn register_type_handler<T, H>(&self, handler: H) -> bool
    where
        T: 'static,
        H: TypeHandler<T> + 'static,
    {
        let replaced = self.handlers.register::<T, H>(handler);
        self.cache.purge();
        replaced
    }

    /// Register how rows of base type `B` resolve to concrete types.
    ///
    /// The discriminator column is read as `D` and passed to `resolve`;
    /// `None` means the value is unrecognized. Re-registering replaces the
    /// previous registration.
    pub fn register_polymorphic<B, D>(
        &self,
        column: impl Into<String>,
        resolve: impl Fn(D) -> Option<Variant<B>> + Send + Sync + 'static,
    ) -> bool
    where
        B: 'static,
        D: SqlValue,
    {
        self.discriminators
            .register(Discriminator::new(column, resolve))
    }

    /// Drop every compiled materializer.
    pub fn purge_cache(&self) -> usize {
        self.cache.purge()
    }

    /// Drop the compiled materializers for `T`.
    pub fn purge_cache_for<T: 'static>(&self) -> usize {
        self.cache.purge_target(&Target::of::<T>())
    }

    /// Drop the compiled materializers for an interface.
    pub fn purge_interface(&self, interface: &InterfaceDescriptor) -> usize {
        self.cache.purge_target(&interface.target())
    }

    // ==================== Materializers ====================

    /// The cached materializer for `T` over `count` columns of `shape`
    /// starting at `start` (`None` runs through the last column).
    pub fn materializer<T: Entity>(
        &self,
        shape: &Shape,
        start: usize,
        count: Option<usize>,
    ) -> Result<Materializer<T>> {
        let window = shape.window(start, count)?;
        let key = ShapeKey::new(Target::of::<T>(), window.clone(), start, self.options);
        self.cache.get_or_compile(key, || {
            compile_entity::<T>(&window, start, &self.handlers, self.options)
        })
    }

    /// The cached proxy materializer for `interface` over a column window.
    pub fn proxy_materializer(
        &self,
        interface: &Arc<InterfaceDescriptor>,
        shape: &Shape,
        start: usize,
        count: Option<usize>,
    ) -> Result<Materializer<Proxy>> {
        let window = shape.window(start, count)?;
        let key = ShapeKey::new(interface.target(), window.clone(), start, self.options);
        self.cache
            .get_or_compile(key, || Ok(compile_proxy(interface, &window, start, self.options)))
    }

    /// Materializer for rows of the cursor's current result set.
    ///
    /// Asking again for the same shape and offset returns the same cached
    /// instance; a different offset or count yields a different one.
    pub fn get_row_parser<T: Entity>(
        &self,
        cursor: &dyn RowCursor,
        start: usize,
        count: Option<usize>,
    ) -> Result<Materializer<T>> {
        self.materializer::<T>(&Shape::of(cursor), start, count)
    }

    // ==================== Commands ====================

    /// Bind `params` through the handler registry and substitute `{=name}`
    /// literal tokens.
    pub fn prepare<'s>(&self, sql: &'s str, params: &Params) -> Result<(Cow<'s, str>, Vec<BoundParam>)> {
        let bound = params.bind_all(&self.handlers)?;
        expand_literals(sql, bound)
    }

    /// Execute a command and return the affected row count.
    #[tracing::instrument(level = "debug", skip(self, driver, params))]
    pub fn execute<D: Driver>(&self, driver: &mut D, sql: &str, params: &Params) -> Result<u64> {
        let (sql, bound) = self.prepare(sql, params)?;
        let affected = driver.execute(&sql, &bound)?;
        tracing::debug!(affected, "Executed command");
        Ok(affected)
    }

    /// Execute a command and hand back the raw cursor, for use with
    /// [`Mapper::get_row_parser`].
    pub fn execute_reader<'d, D: Driver>(
        &self,
        driver: &'d mut D,
        sql: &str,
        params: &Params,
    ) -> Result<D::Cursor<'d>> {
        let (sql, bound) = self.prepare(sql, params)?;
        driver.execute_reader(&sql, &bound)
    }

    /// Execute a query and buffer every row of its first result set.
    #[tracing::instrument(
        level = "debug",
        skip(self, driver, params),
        fields(entity = std::any::type_name::<T>())
    )]
    pub fn query<T: Entity, D: Driver>(
        &self,
        driver: &mut D,
        sql: &str,
        params: &Params,
    ) -> Result<Vec<T>> {
        let (sql, bound) = self.prepare(sql, params)?;
        let mut cursor = driver.execute_reader(&sql, &bound)?;
        let rows = drain(&mut cursor, self.entity_rows::<T>())?;
        tracing::debug!(rows = rows.len(), "Buffered query rows");
        Ok(rows)
    }

    /// Execute a query and stream the rows of its first result set.
    pub fn query_unbuffered<'m, 'd, T: Entity, D: Driver>(
        &'m self,
        driver: &'d mut D,
        sql: &str,
        params: &Params,
    ) -> Result<Rows<'m, D::Cursor<'d>, T>> {
        let (sql, bound) = self.prepare(sql, params)?;
        let cursor = driver.execute_reader(&sql, &bound)?;
        Ok(Rows::new(cursor, self.entity_rows::<T>()))
    }

    /// The first row, if any. Later rows are not read.
    pub fn query_first<T: Entity, D: Driver>(
        &self,
        driver: &mut D,
        sql: &str,
        params: &Params,
    ) -> Result<Option<T>> {
        self.query_unbuffered::<T, D>(driver, sql, params)?
            .next()
            .transpose()
    }

    /// The only row. Zero rows or more than one row is an error.
    pub fn query_single<T: Entity, D: Driver>(
        &self,
        driver: &mut D,
        sql: &str,
        params: &Params,
    ) -> Result<T> {
        let mut rows = self.query_unbuffered::<T, D>(driver, sql, params)?;
        let Some(first) = rows.next().transpose()? else {
            return Err(Error::Custom("query returned no rows, expected exactly one".into()));
        };
        if rows.next().transpose()?.is_some() {
            return Err(Error::Custom(
                "query returned more than one row, expected exactly one".into(),
            ));
        }
        Ok(first)
    }

    /// First column of the first row. `None` when there are no rows or the
    /// value is NULL.
    pub fn query_scalar<T: SqlValue, D: Driver>(
        &self,
        driver: &mut D,
        sql: &str,
        params: &Params,
    ) -> Result<Option<T>> {
        let (sql, bound) = self.prepare(sql, params)?;
        let mut cursor = driver.execute_reader(&sql, &bound)?;
        if !cursor.advance()? {
            return Ok(None);
        }
        let value = cursor.value(0)?;
        if value.is_null() {
            return Ok(None);
        }
        self.handlers
            .resolve::<T>()
            .read(value)
            .map(Some)
            .map_err(|e| e.in_column(cursor.column_name(0)))
    }

    /// Multi-mapping query: every row is split into the objects of `S`
    /// and passed to `combine`, once per row and in row order.
    #[tracing::instrument(
        level = "debug",
        skip(self, driver, params, split, combine),
        fields(targets = S::ARITY)
    )]
    pub fn query_map<S, R, D>(
        &self,
        driver: &mut D,
        sql: &str,
        params: &Params,
        split: impl Into<SplitOn>,
        combine: impl FnMut(S) -> R,
    ) -> Result<Vec<R>>
    where
        S: SplitTargets,
        D: Driver,
    {
        let (sql, bound) = self.prepare(sql, params)?;
        let mut cursor = driver.execute_reader(&sql, &bound)?;
        drain(&mut cursor, self.split_rows(split.into(), combine))
    }

    /// Rows resolved through the discriminator registered for `B`.
    #[tracing::instrument(
        level = "debug",
        skip(self, driver, params),
        fields(base = std::any::type_name::<B>())
    )]
    pub fn query_polymorphic<B: 'static, D: Driver>(
        &self,
        driver: &mut D,
        sql: &str,
        params: &Params,
    ) -> Result<Vec<B>> {
        let (sql, bound) = self.prepare(sql, params)?;
        let mut cursor = driver.execute_reader(&sql, &bound)?;
        drain(&mut cursor, self.polymorphic_rows::<B>())
    }

    /// Rows materialized as change-tracking proxies of `interface`.
    #[tracing::instrument(
        level = "debug",
        skip(self, driver, params, interface),
        fields(interface = %interface.name())
    )]
    pub fn query_proxies<D: Driver>(
        &self,
        driver: &mut D,
        sql: &str,
        params: &Params,
        interface: &Arc<InterfaceDescriptor>,
    ) -> Result<Vec<Proxy>> {
        let (sql, bound) = self.prepare(sql, params)?;
        let mut cursor = driver.execute_reader(&sql, &bound)?;
        drain(&mut cursor, self.proxy_rows(Arc::clone(interface)))
    }

    /// Execute a multi-statement command and read its result sets in order.
    pub fn query_multiple<'m, 'd, D: Driver>(
        &'m self,
        driver: &'d mut D,
        sql: &str,
        params: &Params,
    ) -> Result<GridReader<'m, D::Cursor<'d>>> {
        let (sql, bound) = self.prepare(sql, params)?;
        let cursor = driver.execute_reader(&sql, &bound)?;
        Ok(GridReader::new(self, cursor))
    }

    // ==================== Row plans ====================

    pub(crate) fn entity_rows<'m, T: Entity>(&'m self) -> RowStream<'m, T> {
        RowStream::new(move |shape: &Shape| -> Result<RowFn<'m, T>> {
            let parser = self.materializer::<T>(shape, 0, None)?;
            Ok(Box::new(move |cursor: &dyn RowCursor| -> Result<T> {
                parser.read(cursor)
            }))
        })
    }

    pub(crate) fn split_rows<'m, S, R>(
        &'m self,
        split: SplitOn,
        mut combine: impl FnMut(S) -> R + 'm,
    ) -> RowStream<'m, R>
    where
        S: SplitTargets,
    {
        RowStream::new(move |shape: &Shape| -> Result<RowFn<'m, R>> {
            let reader = SplitReader::<S>::new(self, shape, &split)?;
            Ok(Box::new(move |cursor: &dyn RowCursor| -> Result<R> {
                Ok(combine(reader.read(cursor)?))
            }))
        })
    }

    pub(crate) fn polymorphic_rows<'m, B: 'static>(&'m self) -> RowStream<'m, B> {
        RowStream::new(move |shape: &Shape| -> Result<RowFn<'m, B>> {
            let reader = PolymorphicReader::<B>::new(self, shape.clone())?;
            Ok(Box::new(move |cursor: &dyn RowCursor| -> Result<B> {
                reader.read(cursor)
            }))
        })
    }

    pub(crate) fn proxy_rows<'m>(
        &'m self,
        interface: Arc<InterfaceDescriptor>,
    ) -> RowStream<'m, Proxy> {
        RowStream::new(move |shape: &Shape| -> Result<RowFn<'m, Proxy>> {
            let parser = self.proxy_materializer(&interface, shape, 0, None)?;
            Ok(Box::new(move |cursor: &dyn RowCursor| -> Result<Proxy> {
                parser.read(cursor)
            }))
        })
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .field("cache", &self.cache)
            .field("discriminators", &self.discriminators)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityDescriptor;
    use crate::handler::{DefaultHandler, ParamValue};
    use crate::memory::{MemoryDriver, ResultSet};
    use crate::types::SqlType;
    use crate::value::Value;

    #[derive(Debug, Default, PartialEq)]
    struct User {
        id: i64,
        name: String,
    }

    impl Entity for User {
        fn describe() -> EntityDescriptor<Self> {
            EntityDescriptor::with_default("User")
                .member("id", |u: &mut User, v: i64| u.id = v)
                .member("name", |u: &mut User, v: String| u.name = v)
        }
    }

    fn users() -> ResultSet {
        ResultSet::new([("Id", SqlType::BigInt), ("Name", SqlType::Text)])
            .row(vec![Value::BigInt(1), Value::Text("ada".into())])
            .row(vec![Value::BigInt(2), Value::Text("bob".into())])
    }

    #[test]
    fn query_buffers_rows() {
        let mapper = Mapper::new();
        let mut driver = MemoryDriver::new();
        driver.push_result(users());
        let rows: Vec<User> = mapper
            .query(&mut driver, "select id, name from users where id > @min", &Params::new().bind("min", 0_i32))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], User { id: 2, name: "bob".into() });
        let command = driver.last_command().unwrap();
        assert_eq!(command.params[0].value, Value::Int(0));
    }

    #[test]
    fn same_shape_reuses_materializer() {
        let mapper = Mapper::new();
        let shape = Shape::new(users().columns().to_vec());
        let a = mapper.materializer::<User>(&shape, 0, None).unwrap();
        let b = mapper.materializer::<User>(&shape, 0, None).unwrap();
        let c = mapper.materializer::<User>(&shape, 1, None).unwrap();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(mapper.purge_cache_for::<User>(), 2);
    }

    #[test]
    fn first_single_and_scalar() {
        let mapper = Mapper::new();
        let mut driver = MemoryDriver::new();
        driver.push_result(users()).push_result(users()).push_result(users());
        let first: Option<User> = mapper.query_first(&mut driver, "q", &Params::new()).unwrap();
        assert_eq!(first.unwrap().id, 1);
        let err = mapper.query_single::<User, _>(&mut driver, "q", &Params::new()).unwrap_err();
        assert!(err.to_string().contains("more than one row"));
        let count: Option<i32> = mapper.query_scalar(&mut driver, "q", &Params::new()).unwrap();
        assert_eq!(count, Some(1));

        driver.push_result(ResultSet::new([("n", SqlType::Integer)]));
        assert!(mapper.query_single::<User, _>(&mut driver, "q", &Params::new()).is_err());
    }

    #[test]
    fn registering_a_handler_purges_the_cache() {
        struct Shouting;
        impl TypeHandler<String> for Shouting {
            fn read(&self, value: &Value) -> Result<String> {
                DefaultHandler::<String>::new().read(value).map(|s| s.to_uppercase())
            }
            fn write(&self, value: &String) -> Result<ParamValue> {
                Ok(ParamValue::inferred(Value::Text(value.clone())))
            }
        }

        let mapper = Mapper::new();
        let mut driver = MemoryDriver::new();
        driver.push_result(users()).push_result(users());
        let before: Vec<User> = mapper.query(&mut driver, "q", &Params::new()).unwrap();
        assert_eq!(before[0].name, "ada");
        assert_eq!(mapper.cache().len(), 1);

        assert!(!mapper.register_type_handler::<String, _>(Shouting));
        assert!(mapper.cache().is_empty());
        let after: Vec<User> = mapper.query(&mut driver, "q", &Params::new()).unwrap();
        assert_eq!(after[0].name, "ADA");
    }

    #[test]
    fn execute_expands_literals() {
        let mapper = Mapper::new();
        let mut driver = MemoryDriver::new();
        driver.push_affected(3);
        let affected = mapper
            .execute(
                &mut driver,
                "delete from t where flag = {=flag} and id = @id",
                &Params::new().bind("flag", true).bind("id", 9_i64),
            )
            .unwrap();
        assert_eq!(affected, 3);
        let command = driver.last_command().unwrap();
        assert_eq!(command.sql, "delete from t where flag = 1 and id = @id");
        assert_eq!(command.params.len(), 1);
    }

    #[test]
    fn driver_failures_propagate() {
        let mapper = Mapper::new();
        let mut driver = MemoryDriver::new();
        driver.push_failure("connection reset");
        let err = mapper.query::<User, _>(&mut driver, "q", &Params::new()).unwrap_err();
        assert!(matches!(err, Error::Driver(_)));
    }
}
