//! The active record surface: CRUD and query operations on entity types.
//!
//! Two structurally parallel traits realize one contract: [`ActiveRecord`]
//! for the suspend-capable mode and [`ActiveRecordSync`] for the blocking
//! mode. Both are blanket-implemented for every [`Model`], so a mapped type
//! gets the full surface by declaring its mapping. Import whichever trait
//! matches the execution mode of your registry; the semantics are identical.
//!
//! All operations resolve through a session obtained from the engine
//! registry; "pass an explicit session" and "let the layer create one" are
//! interchangeable call conventions via
//! [`crate::engine::EngineRegistry::new_session`].

use crate::error::{ActiveError, ActiveResult};
use crate::model::Model;
use crate::query::{Expr, SelectQuery};
use crate::session::{Session, SyncSession};
use crate::value::Value;

fn default_order_column<M: Model>() -> ActiveResult<String> {
    if M::columns().is_empty() {
        return Err(ActiveError::configuration(format!(
            "model {} has no mapped columns",
            M::model_name()
        )));
    }
    Ok(M::primary_key_column()?.name.to_string())
}

fn apply_predicates<M: Model>(predicates: Vec<Expr>) -> SelectQuery<M> {
    predicates
        .into_iter()
        .fold(SelectQuery::new(), SelectQuery::filter)
}

/// Suspend-capable CRUD/query operations, provided for every mapped type.
pub trait ActiveRecord: Model {
    /// An unexecuted selection over this entity type.
    fn select() -> SelectQuery<Self> {
        SelectQuery::new()
    }

    /// `select()` narrowed by the given predicates.
    fn filter_by(predicates: Vec<Expr>) -> SelectQuery<Self> {
        apply_predicates(predicates)
    }

    /// Alias for [`ActiveRecord::filter_by`].
    fn where_(predicates: Vec<Expr>) -> SelectQuery<Self> {
        apply_predicates(predicates)
    }

    /// Direct primary-key lookup. `None` means not found.
    fn get(
        session: &mut Session,
        pk: &Value,
    ) -> impl Future<Output = ActiveResult<Option<Self>>> + Send {
        session.get(pk)
    }

    /// First entity matching the predicates, or `None`.
    fn find_by(
        session: &mut Session,
        predicates: Vec<Expr>,
    ) -> impl Future<Output = ActiveResult<Option<Self>>> + Send {
        async move { apply_predicates(predicates).first_scalar(session).await }
    }

    /// First row ordered ascending by `order_column` (default: primary key).
    fn first(
        session: &mut Session,
        order_column: Option<&str>,
    ) -> impl Future<Output = ActiveResult<Option<Self>>> + Send {
        async move {
            let column = match order_column {
                Some(column) => column.to_string(),
                None => default_order_column::<Self>()?,
            };
            Self::select().order_by(column).first_scalar(session).await
        }
    }

    /// Last row: ordered descending by `order_column` (default: primary key).
    fn last(
        session: &mut Session,
        order_column: Option<&str>,
    ) -> impl Future<Output = ActiveResult<Option<Self>>> + Send {
        async move {
            let column = match order_column {
                Some(column) => column.to_string(),
                None => default_order_column::<Self>()?,
            };
            Self::select()
                .order_by_desc(column)
                .first_scalar(session)
                .await
        }
    }

    /// Execute `query` (default: `select()`), applying `limit` if given.
    fn all(
        session: &mut Session,
        query: Option<SelectQuery<Self>>,
        limit: Option<u64>,
    ) -> impl Future<Output = ActiveResult<Vec<Self>>> + Send {
        async move {
            let mut query = query.unwrap_or_else(Self::select);
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            query.scalars(session).await
        }
    }

    /// Execute the given query as-is.
    fn exec(
        session: &mut Session,
        query: SelectQuery<Self>,
    ) -> impl Future<Output = ActiveResult<Vec<Self>>> + Send {
        async move { query.scalars(session).await }
    }

    /// Row count of `query` (default: `select()`), independent of any
    /// ordering, offset, or limit on it.
    fn count(
        session: &mut Session,
        query: Option<SelectQuery<Self>>,
    ) -> impl Future<Output = ActiveResult<i64>> + Send {
        async move { query.unwrap_or_else(Self::select).count(session).await }
    }

    /// Attach the entity to the session; with `commit`, commit and refresh
    /// its attributes from the database.
    fn add(
        session: &mut Session,
        entity: &mut Self,
        commit: bool,
    ) -> impl Future<Output = ActiveResult<()>> + Send {
        session.add(entity, commit)
    }

    /// Bulk insert with the configured conflict policy; see
    /// [`Session::add_all`].
    fn add_all(
        session: &mut Session,
        entities: &[Self],
        commit: bool,
        skip_duplicate: bool,
        fields: Option<&[&str]>,
    ) -> impl Future<Output = ActiveResult<Vec<Self>>> + Send {
        session.add_all(entities, commit, skip_duplicate, fields)
    }

    /// Sugar for [`ActiveRecord::add`] on `self`.
    fn save(
        &mut self,
        session: &mut Session,
        commit: bool,
    ) -> impl Future<Output = ActiveResult<()>> + Send {
        session.add(self, commit)
    }

    /// Mark the entity deleted; takes effect at the next flush/commit.
    fn delete(session: &mut Session, entity: &Self) -> ActiveResult<()> {
        session.delete(entity)
    }

    /// Immediately re-fetch the entity's attributes from storage.
    fn refresh(
        session: &mut Session,
        entity: &mut Self,
    ) -> impl Future<Output = ActiveResult<()>> + Send {
        session.refresh(entity)
    }

    /// Invalidate the entity's snapshot, forcing a later re-fetch.
    fn expire(session: &mut Session, entity: &Self) -> ActiveResult<()> {
        session.expire(entity)
    }

    /// Detach the entity from its session without deleting it.
    fn expunge(session: &mut Session, entity: &Self) -> ActiveResult<()> {
        session.expunge(entity)
    }

    /// Commit the given session. With no session to resolve, this is a
    /// no-session error.
    fn commit(session: Option<&mut Session>) -> impl Future<Output = ActiveResult<()>> + Send {
        async move {
            match session {
                Some(session) => session.commit().await,
                None => Err(ActiveError::NoSession),
            }
        }
    }

    /// Roll back the given session. With no session to resolve, this is a
    /// no-session error.
    fn rollback(session: Option<&mut Session>) -> impl Future<Output = ActiveResult<()>> + Send {
        async move {
            match session {
                Some(session) => session.rollback().await,
                None => Err(ActiveError::NoSession),
            }
        }
    }

    /// Whether the entity has pending in-memory changes versus its last
    /// known persisted state.
    fn is_modified(session: &Session, entity: &Self) -> ActiveResult<bool> {
        session.is_modified(entity)
    }
}

impl<M: Model> ActiveRecord for M {}

/// Blocking CRUD/query operations, provided for every mapped type.
///
/// Identical semantics to [`ActiveRecord`]; every operation drives the async
/// core to completion on the registry runtime held by the [`SyncSession`].
pub trait ActiveRecordSync: Model {
    fn select() -> SelectQuery<Self> {
        SelectQuery::new()
    }

    fn filter_by(predicates: Vec<Expr>) -> SelectQuery<Self> {
        apply_predicates(predicates)
    }

    fn where_(predicates: Vec<Expr>) -> SelectQuery<Self> {
        apply_predicates(predicates)
    }

    fn get(session: &mut SyncSession, pk: &Value) -> ActiveResult<Option<Self>> {
        session.get(pk)
    }

    fn find_by(session: &mut SyncSession, predicates: Vec<Expr>) -> ActiveResult<Option<Self>> {
        apply_predicates(predicates).first_scalar_sync(session)
    }

    fn first(session: &mut SyncSession, order_column: Option<&str>) -> ActiveResult<Option<Self>> {
        let column = match order_column {
            Some(column) => column.to_string(),
            None => default_order_column::<Self>()?,
        };
        Self::select().order_by(column).first_scalar_sync(session)
    }

    fn last(session: &mut SyncSession, order_column: Option<&str>) -> ActiveResult<Option<Self>> {
        let column = match order_column {
            Some(column) => column.to_string(),
            None => default_order_column::<Self>()?,
        };
        Self::select()
            .order_by_desc(column)
            .first_scalar_sync(session)
    }

    fn all(
        session: &mut SyncSession,
        query: Option<SelectQuery<Self>>,
        limit: Option<u64>,
    ) -> ActiveResult<Vec<Self>> {
        let mut query = query.unwrap_or_else(Self::select);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        query.scalars_sync(session)
    }

    fn exec(session: &mut SyncSession, query: SelectQuery<Self>) -> ActiveResult<Vec<Self>> {
        query.scalars_sync(session)
    }

    fn count(session: &mut SyncSession, query: Option<SelectQuery<Self>>) -> ActiveResult<i64> {
        query.unwrap_or_else(Self::select).count_sync(session)
    }

    fn add(session: &mut SyncSession, entity: &mut Self, commit: bool) -> ActiveResult<()> {
        session.add(entity, commit)
    }

    fn add_all(
        session: &mut SyncSession,
        entities: &[Self],
        commit: bool,
        skip_duplicate: bool,
        fields: Option<&[&str]>,
    ) -> ActiveResult<Vec<Self>> {
        session.add_all(entities, commit, skip_duplicate, fields)
    }

    fn save(&mut self, session: &mut SyncSession, commit: bool) -> ActiveResult<()> {
        session.add(self, commit)
    }

    fn delete(session: &mut SyncSession, entity: &Self) -> ActiveResult<()> {
        session.delete(entity)
    }

    fn refresh(session: &mut SyncSession, entity: &mut Self) -> ActiveResult<()> {
        session.refresh(entity)
    }

    fn expire(session: &mut SyncSession, entity: &Self) -> ActiveResult<()> {
        session.expire(entity)
    }

    fn expunge(session: &mut SyncSession, entity: &Self) -> ActiveResult<()> {
        session.expunge(entity)
    }

    fn commit(session: Option<&mut SyncSession>) -> ActiveResult<()> {
        match session {
            Some(session) => session.commit(),
            None => Err(ActiveError::NoSession),
        }
    }

    fn rollback(session: Option<&mut SyncSession>) -> ActiveResult<()> {
        match session {
            Some(session) => session.rollback(),
            None => Err(ActiveError::NoSession),
        }
    }

    fn is_modified(session: &SyncSession, entity: &Self) -> ActiveResult<bool> {
        session.is_modified(entity)
    }
}

impl<M: Model> ActiveRecordSync for M {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;
    use crate::query::col;
    use crate::value::ColumnType;

    #[derive(Debug, Default)]
    struct Widget {
        id: Option<i64>,
    }

    impl Model for Widget {
        const TABLE: &'static str = "widget";

        fn columns() -> &'static [Column] {
            const COLUMNS: &[Column] = &[Column::new("id", ColumnType::Int).primary_key()];
            COLUMNS
        }

        fn values(&self) -> Vec<(&'static str, Value)> {
            vec![("id", Value::from(self.id))]
        }

        fn set_value(&mut self, column: &str, value: Value) -> bool {
            match column {
                "id" => {
                    if let Value::Int(v) = value {
                        self.id = Some(v);
                    }
                    true
                }
                _ => false,
            }
        }
    }

    #[test]
    fn filter_by_folds_predicates_into_one_selection() {
        let query: SelectQuery<Widget> =
            <Widget as ActiveRecord>::filter_by(vec![col("id").gt(1i64), col("id").lt(9i64)]);
        let (sql, params) = query.to_sql();
        assert_eq!(
            sql,
            "SELECT \"id\" FROM \"public\".\"widget\" WHERE \"id\" > $1 AND \"id\" < $2"
        );
        assert_eq!(params.len(), 2);
    }

    #[tokio::test]
    async fn commit_without_session_is_a_no_session_error() {
        let result = <Widget as ActiveRecord>::commit(None).await;
        assert!(matches!(result, Err(ActiveError::NoSession)));
        let result = <Widget as ActiveRecord>::rollback(None).await;
        assert!(matches!(result, Err(ActiveError::NoSession)));
    }

    #[test]
    fn sync_commit_without_session_is_a_no_session_error() {
        let result = <Widget as ActiveRecordSync>::commit(None);
        assert!(matches!(result, Err(ActiveError::NoSession)));
    }
}
