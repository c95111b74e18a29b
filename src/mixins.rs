//! Opt-in attribute bundles composed into entity types at definition time.
//!
//! Rust has no class mixins, so these are opt-in traits plus canonical
//! column declarations a model splices into its column list:
//!
//! ```ignore
//! const COLUMNS: &[Column] = &[PK_COLUMN, Column::new("name", ColumnType::Text),
//!                              CREATED_AT_COLUMN, UPDATED_AT_COLUMN];
//! impl PrimaryKeyed for City {}
//! impl UpdateTracked for City {}
//! ```

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ActiveResult;
use crate::model::{Column, Model};
use crate::query::{SelectQuery, col};
use crate::session::{Session, SyncSession};
use crate::value::{ColumnType, Value};

/// Generated uuid identifier column: filled by `gen_random_uuid()` on first
/// insert when not supplied by the caller.
pub const PK_COLUMN: Column = Column::new("id", ColumnType::Uuid)
    .primary_key()
    .server_default();

/// Set once, server-side, at insert.
pub const CREATED_AT_COLUMN: Column =
    Column::new("created_at", ColumnType::Timestamp).server_default();

/// Server-side at insert, rewritten at every update.
pub const UPDATED_AT_COLUMN: Column = Column::new("updated_at", ColumnType::Timestamp)
    .server_default()
    .touch_on_update();

/// Entities keyed by a generated uuid identifier.
pub trait PrimaryKeyed: Model {
    /// The canonical generated-identifier column.
    fn pk_column() -> &'static Column {
        &PK_COLUMN
    }

    /// Lookup by generated identifier; sugar for a primary-key `get`.
    fn find(
        session: &mut Session,
        id: Uuid,
    ) -> impl Future<Output = ActiveResult<Option<Self>>> + Send {
        async move { session.get(&Value::Uuid(id)).await }
    }
}

/// Blocking twin of [`PrimaryKeyed`].
pub trait PrimaryKeyedSync: Model {
    fn find(session: &mut SyncSession, id: Uuid) -> ActiveResult<Option<Self>> {
        session.get(&Value::Uuid(id))
    }
}

impl<M: PrimaryKeyed> PrimaryKeyedSync for M {}

/// Entities carrying created/updated timestamps with age-based queries.
pub trait UpdateTracked: Model {
    const CREATED_AT: &'static str = "created_at";
    const UPDATED_AT: &'static str = "updated_at";

    /// Most recently modified row, or `None` on an empty relation.
    fn last_modified(
        session: &mut Session,
    ) -> impl Future<Output = ActiveResult<Option<Self>>> + Send {
        async move {
            SelectQuery::new()
                .order_by_desc(Self::UPDATED_AT)
                .first_scalar(session)
                .await
        }
    }

    /// Most recently created row, or `None` on an empty relation.
    fn last_created(
        session: &mut Session,
    ) -> impl Future<Output = ActiveResult<Option<Self>>> + Send {
        async move {
            SelectQuery::new()
                .order_by_desc(Self::CREATED_AT)
                .first_scalar(session)
                .await
        }
    }

    /// Oldest row by creation time, or `None` on an empty relation.
    fn first_created(
        session: &mut Session,
    ) -> impl Future<Output = ActiveResult<Option<Self>>> + Send {
        async move {
            SelectQuery::new()
                .order_by(Self::CREATED_AT)
                .first_scalar(session)
                .await
        }
    }

    /// Rows with `updated_at` strictly greater than `cutoff`, newest first.
    /// Without a cutoff: all rows, newest first, unfiltered. `query`
    /// narrows the base selection.
    fn get_since(
        session: &mut Session,
        cutoff: Option<DateTime<Utc>>,
        query: Option<SelectQuery<Self>>,
    ) -> impl Future<Output = ActiveResult<Vec<Self>>> + Send {
        async move {
            let mut query = query.unwrap_or_default();
            if let Some(cutoff) = cutoff {
                query = query.filter(col(Self::UPDATED_AT).gt(cutoff));
            }
            query.order_by_desc(Self::UPDATED_AT).scalars(session).await
        }
    }
}

/// Blocking twin of [`UpdateTracked`].
pub trait UpdateTrackedSync: Model {
    const CREATED_AT: &'static str = "created_at";
    const UPDATED_AT: &'static str = "updated_at";

    fn last_modified(session: &mut SyncSession) -> ActiveResult<Option<Self>> {
        SelectQuery::new()
            .order_by_desc(Self::UPDATED_AT)
            .first_scalar_sync(session)
    }

    fn last_created(session: &mut SyncSession) -> ActiveResult<Option<Self>> {
        SelectQuery::new()
            .order_by_desc(Self::CREATED_AT)
            .first_scalar_sync(session)
    }

    fn first_created(session: &mut SyncSession) -> ActiveResult<Option<Self>> {
        SelectQuery::new()
            .order_by(Self::CREATED_AT)
            .first_scalar_sync(session)
    }

    fn get_since(
        session: &mut SyncSession,
        cutoff: Option<DateTime<Utc>>,
        query: Option<SelectQuery<Self>>,
    ) -> ActiveResult<Vec<Self>> {
        let mut query = query.unwrap_or_default();
        if let Some(cutoff) = cutoff {
            query = query.filter(col(Self::UPDATED_AT).gt(cutoff));
        }
        query.order_by_desc(Self::UPDATED_AT).scalars_sync(session)
    }
}

impl<M: UpdateTracked> UpdateTrackedSync for M {
    const CREATED_AT: &'static str = <M as UpdateTracked>::CREATED_AT;
    const UPDATED_AT: &'static str = <M as UpdateTracked>::UPDATED_AT;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_columns_carry_their_flags() {
        assert!(PK_COLUMN.primary_key);
        assert!(PK_COLUMN.server_default);
        assert!(!PK_COLUMN.touch_on_update);

        assert!(CREATED_AT_COLUMN.server_default);
        assert!(!CREATED_AT_COLUMN.touch_on_update);

        assert!(UPDATED_AT_COLUMN.server_default);
        assert!(UPDATED_AT_COLUMN.touch_on_update);
    }
}
