//! Engine registry: schema-keyed caches of pools and session factories.
//!
//! The registry owns two nested caches, `database name -> schema -> pool`
//! and `database name -> schema -> session factory`, and constructs entries
//! lazily. Pools are built with `connect_lazy_with`, so construction never
//! touches the network; the first statement on a session does.
//!
//! # Concurrency Safety
//!
//! Cache reads and inserts are guarded by a `std::sync::Mutex` held across
//! the whole miss path. Construction is synchronous and never awaits, so
//! holding the lock is cheap and gives the construct-at-most-once-per-key
//! guarantee directly: two threads racing on the same (database, schema) key
//! can never build two distinct pools.
//!
//! # Fork safety (sync mode)
//!
//! Pool handles wrap OS-level sockets that must not be shared across a
//! process fork. The registry arms a [`ForkGuard`] when the first pool is
//! constructed; every subsequent cache access compares the recorded process
//! id with the current one and, in a forked child, disposes all cached
//! handles exactly once and re-arms for the child's pid. Manual `dispose`
//! remains idempotent with this hook.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::config::PostgresConfig;
use crate::error::{ActiveError, ActiveResult};
use crate::session::{Session, SyncSession};

/// Default pool size when internal pooling is enabled.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Pooling strategy for constructed engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// Use the wrapped pool with the given connection cap.
    Internal { max_connections: u32 },
    /// No pooling: a single connection, discarded when idle.
    Disabled,
}

/// Normalized engine-construction options, derived once from the config.
///
/// Recognized override keys (via `PostgresConfig::engine_options` or
/// [`EngineRegistry::with_engine_options`]): `pool` (`internal`/`none`),
/// `max_connections`, `connect_timeout`, `timeout`, `pre_ping`, `echo`.
/// Unknown keys are ignored with a warning. Caller overrides win over the
/// normalized defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub pooling: Pooling,
    /// Driver connect arguments, in insertion order. Seeded with the connect
    /// timeout under `connect_timeout`; the async driver expects the same
    /// setting under `timeout` instead, so async mode renames the key.
    pub connect_args: Vec<(String, String)>,
    /// Health-check connections before use. Default true in sync mode only.
    pub pre_ping: bool,
    /// Statement echo; mirrors the config debug flag.
    pub echo: bool,
    /// URI query parameters after mode-specific driver quirks are applied
    /// (async mode renames `sslmode` to `ssl`).
    pub params: Vec<(String, String)>,
}

impl EngineOptions {
    /// Derive normalized options from a configuration descriptor.
    pub fn prepare(config: &PostgresConfig) -> Self {
        let is_async = config.mode.is_async();

        let pooling = if !config.use_internal_pool || is_async {
            Pooling::Disabled
        } else {
            Pooling::Internal {
                max_connections: DEFAULT_MAX_CONNECTIONS,
            }
        };

        let timeout_key = if is_async { "timeout" } else { "connect_timeout" };
        let connect_args = vec![(
            timeout_key.to_string(),
            config.connect_timeout.as_secs().to_string(),
        )];

        let mut params = config.extra_params.clone();
        if is_async {
            for (key, _) in &mut params {
                if key == "sslmode" {
                    "ssl".clone_into(key);
                }
            }
        }

        let mut options = Self {
            pooling,
            connect_args,
            pre_ping: !is_async,
            echo: config.debug,
            params,
        };
        options.apply_overrides(&config.engine_options);
        options
    }

    /// Merge caller-declared overrides; the caller wins on every key.
    fn apply_overrides(&mut self, overrides: &[(String, String)]) {
        for (key, value) in overrides {
            match key.as_str() {
                "pool" => match value.as_str() {
                    "none" => self.pooling = Pooling::Disabled,
                    "internal" => {
                        if !matches!(self.pooling, Pooling::Internal { .. }) {
                            self.pooling = Pooling::Internal {
                                max_connections: DEFAULT_MAX_CONNECTIONS,
                            };
                        }
                    }
                    other => warn!(value = other, "unrecognized pool override"),
                },
                "max_connections" => {
                    if let Ok(max) = value.parse::<u32>() {
                        self.pooling = Pooling::Internal {
                            max_connections: max,
                        };
                    }
                }
                "connect_timeout" | "timeout" => {
                    if let Some(entry) = self
                        .connect_args
                        .iter_mut()
                        .find(|(k, _)| k == "connect_timeout" || k == "timeout")
                    {
                        entry.1.clone_from(value);
                    }
                }
                "pre_ping" => self.pre_ping = matches!(value.as_str(), "1" | "true" | "yes"),
                "echo" => self.echo = matches!(value.as_str(), "1" | "true" | "yes"),
                other => warn!(key = other, "unrecognized engine option"),
            }
        }
    }

    /// The effective connect timeout, whichever key carries it.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_args
            .iter()
            .find(|(k, _)| k == "connect_timeout" || k == "timeout")
            .and_then(|(_, v)| v.parse().ok())
            .map_or(
                Duration::from_secs(crate::config::DEFAULT_CONNECT_TIMEOUT_SECS),
                Duration::from_secs,
            )
    }
}

/// One-shot after-fork hook state.
///
/// Armed when the first pool is constructed; fires at most once per fork
/// event and re-arms for the child process afterwards.
#[derive(Debug, Default)]
pub(crate) struct ForkGuard {
    registered: AtomicBool,
    pid: AtomicU32,
}

impl ForkGuard {
    /// Record the current process id. Idempotent. The pid is published
    /// before the armed flag so a concurrent fork check never observes an
    /// armed guard whose pid is still unset. Racing callers in the same
    /// process store the same pid, so the unguarded pair of stores is safe.
    fn arm(&self, pid: u32) {
        if !self.is_armed() {
            self.pid.store(pid, Ordering::Release);
            self.registered.store(true, Ordering::Release);
        }
    }

    /// Whether the given pid differs from the armed one (a fork happened).
    fn fork_detected(&self, pid: u32) -> bool {
        self.registered.load(Ordering::Acquire) && self.pid.load(Ordering::Acquire) != pid
    }

    /// Re-arm for the (child) process after disposal.
    fn rearm(&self, pid: u32) {
        self.pid.store(pid, Ordering::Release);
    }

    fn is_armed(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }
}

/// A cached factory producing sessions bound to one (database, schema) pool.
///
/// Sync-mode factories produce sessions that expire attribute snapshots on
/// commit; async-mode factories never do (`expire_on_commit=false`), because
/// an async session cannot transparently re-fetch expired attributes outside
/// an explicit suspension point.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    pool: PgPool,
    schema: String,
    expire_on_commit: bool,
    echo: bool,
}

impl SessionFactory {
    /// Produce one independent session.
    pub fn session(&self) -> Session {
        Session::new(
            self.pool.clone(),
            self.schema.clone(),
            self.expire_on_commit,
            self.echo,
        )
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }
}

type SchemaMap<T> = HashMap<String, HashMap<String, T>>;

/// Process-wide registry of engines and session factories, keyed first by
/// database name, then by schema.
///
/// At most one pool and one factory exist per (database, schema) pair.
/// Disposal closes every cached pool and clears both caches; the next access
/// transparently reconstructs fresh handles.
pub struct EngineRegistry {
    config: PostgresConfig,
    options: EngineOptions,
    engines: Mutex<SchemaMap<PgPool>>,
    factories: Mutex<SchemaMap<SessionFactory>>,
    fork_guard: ForkGuard,
    /// Lazily-built runtime driving the blocking facade (sync mode only).
    runtime: OnceLock<Arc<Runtime>>,
}

impl EngineRegistry {
    /// Construct a registry, deriving normalized engine options once.
    pub fn new(config: PostgresConfig) -> Self {
        let options = EngineOptions::prepare(&config);
        debug!(
            database = %config.database,
            mode = ?config.mode,
            options = ?options,
            "engine registry constructed"
        );
        Self {
            config,
            options,
            engines: Mutex::new(HashMap::new()),
            factories: Mutex::new(HashMap::new()),
            fork_guard: ForkGuard::default(),
            runtime: OnceLock::new(),
        }
    }

    /// Construct a registry with additional engine option overrides applied
    /// after the config's own (these win over both).
    pub fn with_engine_options(
        mut config: PostgresConfig,
        overrides: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        config.engine_options.extend(overrides);
        Self::new(config)
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    /// The normalized engine-construction options.
    pub fn engine_options(&self) -> &EngineOptions {
        &self.options
    }

    fn default_schema<'a>(&'a self, schema: Option<&'a str>) -> &'a str {
        schema.unwrap_or(&self.config.default_schema)
    }

    /// Dispose cached handles once if the process has forked since the guard
    /// was armed. Sync mode only; async engines hold no armed guard.
    fn check_fork(&self) {
        if self.config.mode.is_async() {
            return;
        }
        let pid = std::process::id();
        if self.fork_guard.fork_detected(pid) {
            info!(pid, "fork detected, disposing inherited engine handles");
            self.clear_caches();
            self.fork_guard.rearm(pid);
        }
    }

    /// Return the cached pool for `(database, schema_or_default)`,
    /// constructing and inserting it on a miss.
    pub fn engine(&self, schema: Option<&str>) -> ActiveResult<PgPool> {
        self.check_fork();
        let schema = self.default_schema(schema).to_string();
        let database = self.config.database.clone();

        let mut engines = self
            .engines
            .lock()
            .map_err(|_| ActiveError::configuration("engine cache poisoned"))?;
        if let Some(pool) = engines.get(&database).and_then(|m| m.get(&schema)) {
            return Ok(pool.clone());
        }

        let pool = self.build_pool(&schema)?;
        engines
            .entry(database.clone())
            .or_default()
            .insert(schema.clone(), pool.clone());
        drop(engines);

        if !self.config.mode.is_async() {
            self.fork_guard.arm(std::process::id());
        }
        info!(
            database = %database,
            schema = %schema,
            uri = %self.config.masked_uri(),
            "engine constructed"
        );
        Ok(pool)
    }

    /// Build a lazily-connecting pool for one schema.
    fn build_pool(&self, schema: &str) -> ActiveResult<PgPool> {
        let mut connect = PgConnectOptions::new_without_pgpass()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.database)
            .options([("search_path", schema)]);

        for (key, value) in &self.options.params {
            match key.as_str() {
                "sslmode" | "ssl" => {
                    let mode = PgSslMode::from_str(value).map_err(|e| {
                        ActiveError::invalid_input(format!("invalid sslmode {value}: {e}"))
                    })?;
                    connect = connect.ssl_mode(mode);
                }
                "application_name" => {
                    connect = connect.application_name(value);
                }
                // Remaining params only matter for URI derivation.
                _ => {}
            }
        }

        let mut pool_options = PgPoolOptions::new()
            .acquire_timeout(self.options.connect_timeout())
            .test_before_acquire(self.options.pre_ping)
            .min_connections(0);
        pool_options = match self.options.pooling {
            Pooling::Internal { max_connections } => pool_options.max_connections(max_connections),
            Pooling::Disabled => pool_options
                .max_connections(1)
                .idle_timeout(Some(Duration::ZERO)),
        };

        Ok(pool_options.connect_lazy_with(connect))
    }

    /// Return the cached session factory for `(database, schema_or_default)`,
    /// building one bound to `engine(schema)` on a miss.
    pub fn session_factory(&self, schema: Option<&str>) -> ActiveResult<SessionFactory> {
        self.check_fork();
        let schema = self.default_schema(schema).to_string();
        let database = self.config.database.clone();

        {
            let factories = self
                .factories
                .lock()
                .map_err(|_| ActiveError::configuration("session factory cache poisoned"))?;
            if let Some(factory) = factories.get(&database).and_then(|m| m.get(&schema)) {
                return Ok(factory.clone());
            }
        }

        // Engine lookup happens outside the factory lock; the insert below
        // tolerates a racing construction because both race arms hold the
        // same cached pool.
        let pool = self.engine(Some(&schema))?;
        let factory = SessionFactory {
            pool,
            schema: schema.clone(),
            expire_on_commit: !self.config.mode.is_async(),
            echo: self.options.echo,
        };
        let mut factories = self
            .factories
            .lock()
            .map_err(|_| ActiveError::configuration("session factory cache poisoned"))?;
        let entry = factories
            .entry(database)
            .or_default()
            .entry(schema)
            .or_insert(factory);
        Ok(entry.clone())
    }

    /// Produce a session for the given (or default) schema.
    pub fn session(&self, schema: Option<&str>) -> ActiveResult<Session> {
        Ok(self.session_factory(schema)?.session())
    }

    /// The central session-acquisition policy: return `session` unchanged if
    /// provided, otherwise produce one from the default-schema factory.
    pub fn new_session(&self, session: Option<Session>) -> ActiveResult<Session> {
        match session {
            Some(session) => Ok(session),
            None => self.session(None),
        }
    }

    /// Produce a blocking session for the given (or default) schema.
    /// Only available on sync-mode registries.
    pub fn sync_session(&self, schema: Option<&str>) -> ActiveResult<SyncSession> {
        if self.config.mode.is_async() {
            return Err(ActiveError::configuration(
                "blocking sessions require a sync-mode registry",
            ));
        }
        let session = self.session(schema)?;
        Ok(SyncSession::new(session, self.runtime()?))
    }

    /// Blocking analogue of [`EngineRegistry::new_session`].
    pub fn new_sync_session(&self, session: Option<SyncSession>) -> ActiveResult<SyncSession> {
        match session {
            Some(session) => Ok(session),
            None => self.sync_session(None),
        }
    }

    /// The runtime driving the blocking facade, built on first use.
    pub(crate) fn runtime(&self) -> ActiveResult<Arc<Runtime>> {
        if let Some(rt) = self.runtime.get() {
            return Ok(rt.clone());
        }
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| ActiveError::connection(format!("failed to build runtime: {e}")))?;
        Ok(self.runtime.get_or_init(|| Arc::new(rt)).clone())
    }

    /// Run a future to completion on the registry runtime.
    pub fn block_on<F: Future>(&self, fut: F) -> ActiveResult<F::Output> {
        Ok(self.runtime()?.block_on(fut))
    }

    /// Drain both caches, returning pools in stable (database, schema) order.
    fn drain_pools(&self) -> Vec<PgPool> {
        let mut pools = Vec::new();
        if let Ok(mut engines) = self.engines.lock() {
            let mut entries: Vec<_> = engines
                .drain()
                .flat_map(|(db, schemas)| {
                    schemas
                        .into_iter()
                        .map(move |(schema, pool)| ((db.clone(), schema), pool))
                })
                .collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            pools.extend(entries.into_iter().map(|(_, pool)| pool));
        }
        if let Ok(mut factories) = self.factories.lock() {
            factories.clear();
        }
        pools
    }

    /// Clear both caches without waiting on pool shutdown. Used by the fork
    /// hook, where inherited sockets must simply be abandoned.
    fn clear_caches(&self) {
        let dropped = self.drain_pools().len();
        debug!(engines = dropped, "engine caches cleared");
    }

    /// Clear both caches and close every drained pool. Idempotent.
    ///
    /// Blocking on the close is only possible outside an async runtime.
    /// Called from inside one, this drains the caches without awaiting the
    /// close; the drained pools shut down when their last clones drop. Async
    /// callers who need the close awaited use
    /// [`EngineRegistry::dispose_async`].
    pub fn dispose(&self) {
        let pools = self.drain_pools();
        if pools.is_empty() {
            return;
        }
        // Blocking inside an async context would panic; there the drained
        // handles shut down as their last references go away.
        if tokio::runtime::Handle::try_current().is_err() {
            if let Ok(rt) = self.runtime() {
                rt.block_on(async {
                    for pool in &pools {
                        pool.close().await;
                    }
                });
            }
        }
        info!(engines = pools.len(), "engine registry disposed");
    }

    /// Close every cached pool and clear both caches, suspending for each
    /// pool's shutdown in stable (database, schema) order. Idempotent.
    pub async fn dispose_async(&self) {
        let pools = self.drain_pools();
        for pool in &pools {
            pool.close().await;
        }
        if !pools.is_empty() {
            info!(engines = pools.len(), "engine registry disposed");
        }
    }

    /// Number of cached engine handles (diagnostics).
    pub fn cached_engines(&self) -> usize {
        self.engines
            .lock()
            .map(|m| m.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    /// Number of cached session factories (diagnostics).
    pub fn cached_factories(&self) -> usize {
        self.factories
            .lock()
            .map(|m| m.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("database", &self.config.database)
            .field("mode", &self.config.mode)
            .field("cached_engines", &self.cached_engines())
            .field("cached_factories", &self.cached_factories())
            .field("fork_guard_armed", &self.fork_guard.is_armed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionMode;

    fn sync_config() -> PostgresConfig {
        PostgresConfig::new().with_database("registry_test")
    }

    #[test]
    fn sync_defaults_keep_internal_pool_and_pre_ping() {
        let options = EngineOptions::prepare(&sync_config());
        assert_eq!(
            options.pooling,
            Pooling::Internal {
                max_connections: DEFAULT_MAX_CONNECTIONS
            }
        );
        assert!(options.pre_ping);
        assert!(!options.echo);
        assert_eq!(
            options.connect_args,
            vec![("connect_timeout".to_string(), "10".to_string())]
        );
    }

    #[test]
    fn async_mode_disables_pooling_and_renames_driver_keys() {
        let config = sync_config()
            .with_mode(ExecutionMode::Async)
            .with_param("sslmode", "disable")
            .with_param("application_name", "t");
        let options = EngineOptions::prepare(&config);
        assert_eq!(options.pooling, Pooling::Disabled);
        assert!(!options.pre_ping);
        assert_eq!(
            options.connect_args,
            vec![("timeout".to_string(), "10".to_string())]
        );
        assert_eq!(options.params[0], ("ssl".to_string(), "disable".to_string()));
        assert_eq!(
            options.params[1],
            ("application_name".to_string(), "t".to_string())
        );
    }

    #[test]
    fn disabling_internal_pool_forces_no_pooling() {
        let config = sync_config().with_internal_pool(false);
        assert_eq!(EngineOptions::prepare(&config).pooling, Pooling::Disabled);
    }

    #[test]
    fn debug_flag_mirrors_into_echo() {
        let config = sync_config().with_debug(true);
        assert!(EngineOptions::prepare(&config).echo);
    }

    #[test]
    fn caller_overrides_win_over_normalized_defaults() {
        let config = sync_config()
            .with_engine_option("pool", "none")
            .with_engine_option("pre_ping", "false")
            .with_engine_option("connect_timeout", "3");
        let options = EngineOptions::prepare(&config);
        assert_eq!(options.pooling, Pooling::Disabled);
        assert!(!options.pre_ping);
        assert_eq!(options.connect_timeout(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn engine_is_cached_per_schema() {
        let registry = EngineRegistry::new(sync_config());
        let a1 = registry.engine(Some("alpha")).unwrap();
        let a2 = registry.engine(Some("alpha")).unwrap();
        let b = registry.engine(Some("beta")).unwrap();
        assert_eq!(registry.cached_engines(), 2);

        // Handles for the same key share identity: closing one closes the
        // other. Handles for different keys are independent.
        a1.close().await;
        assert!(a2.is_closed());
        assert!(!b.is_closed());
    }

    #[test]
    fn default_schema_is_used_when_none_given() {
        let registry = EngineRegistry::new(sync_config().with_default_schema("tenant"));
        let _ = registry.engine(None).unwrap();
        let _ = registry.engine(Some("tenant")).unwrap();
        assert_eq!(registry.cached_engines(), 1);
    }

    #[test]
    fn dispose_resets_state_and_next_access_reconstructs() {
        let registry = EngineRegistry::new(sync_config());
        let before = registry.engine(Some("alpha")).unwrap();
        let _ = registry.session_factory(Some("alpha")).unwrap();
        assert_eq!(registry.cached_engines(), 1);
        assert_eq!(registry.cached_factories(), 1);

        registry.dispose();
        assert_eq!(registry.cached_engines(), 0);
        assert_eq!(registry.cached_factories(), 0);
        assert!(before.is_closed());

        let after = registry.engine(Some("alpha")).unwrap();
        assert!(!after.is_closed());
        assert_eq!(registry.cached_engines(), 1);
        // Disposal is idempotent.
        registry.dispose();
        registry.dispose();
    }

    #[tokio::test]
    async fn dispose_async_closes_and_clears() {
        let registry = EngineRegistry::new(sync_config().with_mode(ExecutionMode::Async));
        let pool = registry.engine(Some("alpha")).unwrap();
        let _ = registry.engine(Some("beta")).unwrap();
        registry.dispose_async().await;
        assert!(pool.is_closed());
        assert_eq!(registry.cached_engines(), 0);
        // Idempotent.
        registry.dispose_async().await;
    }

    #[test]
    fn session_factory_is_cached_and_bound_to_engine_schema() {
        let registry = EngineRegistry::new(sync_config());
        let f1 = registry.session_factory(Some("alpha")).unwrap();
        let f2 = registry.session_factory(Some("alpha")).unwrap();
        assert_eq!(f1.schema(), "alpha");
        assert_eq!(f2.schema(), "alpha");
        assert_eq!(registry.cached_factories(), 1);
        assert_eq!(registry.cached_engines(), 1);
    }

    #[test]
    fn fork_guard_fires_once_and_rearms() {
        let guard = ForkGuard::default();
        assert!(!guard.fork_detected(100));

        guard.arm(100);
        assert!(!guard.fork_detected(100));
        assert!(guard.fork_detected(101));

        guard.rearm(101);
        assert!(!guard.fork_detected(101));

        // Arming again is a no-op; the original registration stands.
        guard.arm(999);
        assert!(!guard.fork_detected(101));
    }

    #[test]
    fn fork_guard_arming_is_never_observed_as_a_fork() {
        // A fork check racing with the first arming must not misread a
        // half-armed guard as a fork in the same process.
        let pid = std::process::id();
        for _ in 0..200 {
            let guard = Arc::new(ForkGuard::default());
            let watcher = {
                let guard = Arc::clone(&guard);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        assert!(!guard.fork_detected(pid));
                    }
                })
            };
            guard.arm(pid);
            watcher.join().unwrap();
            assert!(guard.is_armed());
            assert!(!guard.fork_detected(pid));
        }
    }

    #[test]
    fn sync_session_requires_sync_mode() {
        let registry = EngineRegistry::new(sync_config().with_mode(ExecutionMode::Async));
        assert!(matches!(
            registry.sync_session(None),
            Err(ActiveError::Configuration { .. })
        ));
    }
}
