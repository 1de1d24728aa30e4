//! Connection locator with default, read and write roles.
//!
//! The locator holds factories, not connections. Each (role, name) pair is
//! materialized on first use and cached for the locator's lifetime, so every
//! later lookup returns the same `Arc<Connection>`.
//!
//! # Selection
//!
//! [`ConnectionLocator::get_read`] and [`ConnectionLocator::get_write`] pick a
//! connection once and then stick to it:
//!
//! 1. Reads are sent to the write connection while locked to write.
//! 2. A role without factories uses the default connection.
//! 3. A role with an already materialized connection reuses the first one.
//! 4. Otherwise a registered name is chosen at random.

use crate::db::connection::Connection;
use crate::db::log::{QueryLogger, QuerySink};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, QueryLogEntry, Role};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use rand::seq::IteratorRandom;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info};

type FactoryFn = dyn Fn() -> BoxFuture<'static, DbResult<Connection>> + Send + Sync;

/// Asynchronous constructor for one [`Connection`].
#[derive(Clone)]
pub struct ConnectionFactory(Arc<FactoryFn>);

impl ConnectionFactory {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DbResult<Connection>> + Send + 'static,
    {
        Self(Arc::new(move || factory().boxed()))
    }

    /// Open a new sqlx connection from `config` on every invocation.
    pub fn from_config(config: ConnectionConfig) -> Self {
        let config = Arc::new(config);
        Self::new(move || {
            let config = Arc::clone(&config);
            async move { Connection::connect_with(&config).await }
        })
    }

    /// Hand over an already open connection. Only the first invocation succeeds.
    pub fn from_connection(connection: Connection) -> Self {
        let slot = Arc::new(std::sync::Mutex::new(Some(connection)));
        Self::new(move || {
            let taken = slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            async move {
                taken.ok_or_else(|| {
                    DbError::connection(
                        "Connection was already handed over",
                        "Use a factory that opens a new connection per invocation",
                    )
                })
            }
        })
    }

    pub async fn create(&self) -> DbResult<Connection> {
        (self.0)().await
    }
}

impl std::fmt::Debug for ConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ConnectionFactory")
    }
}

#[derive(Debug, Default)]
struct RolePool {
    factories: IndexMap<String, ConnectionFactory>,
    /// Materialized connections in the order they were first resolved.
    instances: IndexMap<String, Arc<Connection>>,
    selected: Option<Arc<Connection>>,
}

#[derive(Debug)]
struct LocatorState {
    default_factory: ConnectionFactory,
    default_instance: Option<Arc<Connection>>,
    read: RolePool,
    write: RolePool,
    log_queries: bool,
}

impl LocatorState {
    fn pool_mut(&mut self, role: Role) -> Option<&mut RolePool> {
        match role {
            Role::Default => None,
            Role::Read => Some(&mut self.read),
            Role::Write => Some(&mut self.write),
        }
    }

    fn connections(&self) -> impl Iterator<Item = &Arc<Connection>> {
        self.default_instance
            .iter()
            .chain(self.read.instances.values())
            .chain(self.write.instances.values())
    }
}

/// Lazily materializes and routes connections by role.
///
/// Share it behind an `Arc`; every method takes `&self`. Factories must not
/// call back into the locator that invokes them.
#[derive(Debug)]
pub struct ConnectionLocator {
    state: Mutex<LocatorState>,
    lock_to_write: AtomicBool,
    queries: Arc<QuerySink>,
}

impl ConnectionLocator {
    pub fn new(default_factory: ConnectionFactory) -> Self {
        Self {
            state: Mutex::new(LocatorState {
                default_factory,
                default_instance: None,
                read: RolePool::default(),
                write: RolePool::default(),
                log_queries: false,
            }),
            lock_to_write: AtomicBool::new(false),
            queries: Arc::new(QuerySink::new()),
        }
    }

    /// A locator whose default role is an already open connection.
    pub fn from_connection(connection: Connection) -> Self {
        Self::new(ConnectionFactory::from_connection(connection))
    }

    pub fn from_config(config: ConnectionConfig) -> Self {
        Self::new(ConnectionFactory::from_config(config))
    }

    /// Register a read factory while building the locator.
    pub fn with_read_factory(mut self, name: impl Into<String>, factory: ConnectionFactory) -> Self {
        self.state
            .get_mut()
            .read
            .factories
            .insert(name.into(), factory);
        self
    }

    /// Register a write factory while building the locator.
    pub fn with_write_factory(
        mut self,
        name: impl Into<String>,
        factory: ConnectionFactory,
    ) -> Self {
        self.state
            .get_mut()
            .write
            .factories
            .insert(name.into(), factory);
        self
    }

    /// Replace the default factory. An already materialized default connection
    /// stays in use.
    pub async fn set_default_factory(&self, factory: ConnectionFactory) {
        self.state.lock().await.default_factory = factory;
    }

    /// Register or replace a read factory.
    pub async fn set_read_factory(&self, name: impl Into<String>, factory: ConnectionFactory) {
        self.state
            .lock()
            .await
            .read
            .factories
            .insert(name.into(), factory);
    }

    /// Register or replace a write factory.
    pub async fn set_write_factory(&self, name: impl Into<String>, factory: ConnectionFactory) {
        self.state
            .lock()
            .await
            .write
            .factories
            .insert(name.into(), factory);
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    pub async fn get_default(&self) -> DbResult<Arc<Connection>> {
        let mut state = self.state.lock().await;
        self.resolve_default(&mut state).await
    }

    pub async fn get_read(&self) -> DbResult<Arc<Connection>> {
        if self.is_locked_to_write() {
            return self.get_write().await;
        }
        self.select(Role::Read).await
    }

    pub async fn get_write(&self) -> DbResult<Arc<Connection>> {
        self.select(Role::Write).await
    }

    /// Resolve a connection by role and name.
    ///
    /// The default role has a single connection named `"DEFAULT"`.
    pub async fn get(&self, role: Role, name: &str) -> DbResult<Arc<Connection>> {
        let mut state = self.state.lock().await;
        if role == Role::Default {
            if name != Role::Default.as_str() {
                return Err(DbError::connection_not_found(role, name));
            }
            return self.resolve_default(&mut state).await;
        }
        self.resolve_named(&mut state, role, name).await
    }

    async fn select(&self, role: Role) -> DbResult<Arc<Connection>> {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let Some(pool) = state.pool_mut(role) else {
            return self.resolve_default(state).await;
        };
        if let Some(selected) = &pool.selected {
            return Ok(Arc::clone(selected));
        }

        let connection = if pool.factories.is_empty() {
            self.resolve_default(state).await?
        } else if let Some((_, first)) = pool.instances.first() {
            Arc::clone(first)
        } else {
            let name = pick_random(&pool.factories).ok_or_else(|| {
                DbError::internal(format!("No {} factory available", role))
            })?;
            debug!(role = %role, name = %name, "Selected connection at random");
            self.resolve_named(state, role, &name).await?
        };

        if let Some(pool) = state.pool_mut(role) {
            pool.selected = Some(Arc::clone(&connection));
        }
        Ok(connection)
    }

    async fn resolve_default(&self, state: &mut LocatorState) -> DbResult<Arc<Connection>> {
        if let Some(connection) = &state.default_instance {
            return Ok(Arc::clone(connection));
        }
        let connection = state.default_factory.create().await?;
        let connection = self.wire(connection, Role::Default.as_str(), state.log_queries);
        state.default_instance = Some(Arc::clone(&connection));
        Ok(connection)
    }

    async fn resolve_named(
        &self,
        state: &mut LocatorState,
        role: Role,
        name: &str,
    ) -> DbResult<Arc<Connection>> {
        let log_queries = state.log_queries;
        let pool = state
            .pool_mut(role)
            .ok_or_else(|| DbError::connection_not_found(role, name))?;

        if let Some(connection) = pool.instances.get(name) {
            return Ok(Arc::clone(connection));
        }
        let factory = pool
            .factories
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::connection_not_found(role, name))?;

        let connection = factory.create().await?;
        let connection = self.wire(connection, &format!("{}:{}", role, name), log_queries);
        pool.instances
            .insert(name.to_string(), Arc::clone(&connection));
        Ok(connection)
    }

    /// Route a new connection's log entries into the locator's sink.
    fn wire(&self, connection: Connection, label: &str, log_queries: bool) -> Arc<Connection> {
        let sink = Arc::clone(&self.queries);
        let tag = label.to_string();
        connection.set_query_logger(Some(Arc::new(move |mut entry: QueryLogEntry| {
            entry.connection = Some(tag.clone());
            sink.deliver(entry);
        })));
        connection.log_queries(log_queries);

        info!(
            connection = %label,
            driver = connection.driver_name(),
            log_queries,
            "Connection materialized"
        );
        Arc::new(connection)
    }

    // =========================================================================
    // Routing flags
    // =========================================================================

    /// Whether a read connection has been selected.
    pub async fn has_read(&self) -> bool {
        self.state.lock().await.read.selected.is_some()
    }

    /// Whether a write connection has been selected.
    pub async fn has_write(&self) -> bool {
        self.state.lock().await.write.selected.is_some()
    }

    /// Send reads to the write connection until unlocked.
    pub fn lock_to_write(&self, lock: bool) {
        self.lock_to_write.store(lock, Ordering::SeqCst);
    }

    pub fn is_locked_to_write(&self) -> bool {
        self.lock_to_write.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Query log
    // =========================================================================

    /// Toggle query logging on every materialized connection and on those
    /// materialized later.
    pub async fn log_queries(&self, enabled: bool) {
        let mut state = self.state.lock().await;
        for connection in state.connections() {
            connection.log_queries(enabled);
        }
        state.log_queries = enabled;
    }

    pub async fn is_logging_queries(&self) -> bool {
        self.state.lock().await.log_queries
    }

    /// Send entries from every connection to `logger` instead of the
    /// locator's buffer.
    pub fn set_query_logger(&self, logger: Option<QueryLogger>) {
        self.queries.set_logger(logger);
    }

    /// Buffered entries from all connections, oldest first.
    pub fn get_queries(&self) -> Vec<QueryLogEntry> {
        self.queries.entries()
    }

    pub fn clear_queries(&self) {
        self.queries.clear();
    }
}

fn pick_random(factories: &IndexMap<String, ConnectionFactory>) -> Option<String> {
    let mut rng = rand::thread_rng();
    factories.keys().choose(&mut rng).cloned()
}
