//! ActiveRecord-style convenience layer over PostgreSQL.
//!
//! This crate exposes create/read/update/delete and query operations
//! directly on mapped entity types instead of through an external repository
//! object, in both a blocking and a suspend-capable execution mode:
//!
//! - [`PostgresConfig`] describes one logical database target and derives
//!   connection URIs for either mode.
//! - [`EngineRegistry`] lazily constructs and caches one engine handle and
//!   one session factory per (database, schema) pair, disposes them on
//!   demand, and protects sync-mode handles across process forks.
//! - [`Model`] is the mapping contract an entity type implements once;
//!   [`ActiveRecord`]/[`ActiveRecordSync`] then provide the full CRUD/query
//!   surface for it.
//! - [`SelectQuery`] is a lazily-resolved selection, materialized against a
//!   [`Session`] on demand.
//! - [`PrimaryKeyed`]/[`UpdateTracked`] add generated-identifier and
//!   timestamp-tracking behavior to entities that opt in.
//!
//! ```ignore
//! let registry = EngineRegistry::new(PostgresConfig::from_env());
//! let mut session = registry.session(None)?;
//! let mut country = Country { name: "France".into(), ..Default::default() };
//! country.save(&mut session, true).await?;
//! let found = Country::find_by(&mut session, vec![col("name").eq("France")]).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod mixins;
pub mod model;
pub mod query;
pub mod record;
pub mod session;
pub mod value;

pub use config::{ExecutionMode, PostgresConfig};
pub use engine::{EngineOptions, EngineRegistry, Pooling, SessionFactory};
pub use error::{ActiveError, ActiveResult};
pub use mixins::{
    CREATED_AT_COLUMN, PK_COLUMN, PrimaryKeyed, PrimaryKeyedSync, UPDATED_AT_COLUMN,
    UpdateTracked, UpdateTrackedSync,
};
pub use model::{Column, Model};
pub use query::{Expr, SelectQuery, col};
pub use record::{ActiveRecord, ActiveRecordSync};
pub use session::{EntityState, Session, SyncSession};
pub use value::{ColumnType, Value};
