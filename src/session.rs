//! Sessions: the unit of work shared by both execution modes.
//!
//! A [`Session`] owns a lazily-begun transaction over one engine pool and
//! tracks the lifecycle state of every entity it has touched
//! (Pending/Persistent/Detached/Deleted; entities it has never seen are
//! Transient). Inserts and updates run inside the session transaction as
//! they are added (nothing is durable before `commit`) while deletes are
//! queued and take effect at the next flush. Reads flush queued deletes
//! first, so a session always observes its own writes.
//!
//! [`SyncSession`] is the blocking facade: the same session, every operation
//! driven to completion on the registry runtime. One core algorithm, two
//! surfaces.
//!
//! Concurrency: a session is not a synchronization point. Concurrent logical
//! tasks must not share one session without serializing access; the safe
//! pattern is one session per task.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::error::{ActiveError, ActiveResult};
use crate::model::{Model, quote_ident};
use crate::value::{Value, bind_value};

/// Identity-map key: (qualified table, rendered primary key).
pub(crate) type EntityKey = (String, String);

/// Lifecycle state of an entity known to a session. Entities the session has
/// never seen are Transient and have no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Written inside the session transaction, not yet committed.
    Pending,
    /// Flushed/committed; the row exists.
    Persistent,
    /// Attribute snapshot invalidated; the next refresh re-fetches.
    Expired,
    /// Detached from the session; attribute values frozen as of detachment.
    Detached,
    /// Marked for deletion; the row is removed at the next flush.
    Deleted,
}

/// A queued deletion, applied at the next flush in FIFO order.
#[derive(Debug)]
struct PendingDelete {
    table: String,
    pk_column: &'static str,
    pk: Value,
    key: EntityKey,
}

/// Render a multi-row INSERT statement.
pub(crate) fn insert_sql(
    table: &str,
    columns: &[&str],
    rows: usize,
    skip_duplicate: bool,
    returning: &[&str],
) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut placeholder = 1;
    let tuples = (0..rows)
        .map(|_| {
            let tuple = (0..columns.len())
                .map(|_| {
                    let p = format!("${placeholder}");
                    placeholder += 1;
                    p
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("({tuple})")
        })
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("INSERT INTO {table} ({column_list}) VALUES {tuples}");
    if skip_duplicate {
        sql.push_str(" ON CONFLICT DO NOTHING");
    }
    if !returning.is_empty() {
        let returning_list = returning
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" RETURNING {returning_list}"));
    }
    sql
}

/// Render an UPDATE statement. `touch` columns are rewritten to `now()`.
pub(crate) fn update_sql(
    table: &str,
    set_columns: &[&str],
    touch_columns: &[&str],
    pk_column: &str,
    returning: &[&str],
) -> String {
    let mut assignments: Vec<String> = set_columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quote_ident(c), i + 1))
        .collect();
    assignments.extend(
        touch_columns
            .iter()
            .map(|c| format!("{} = now()", quote_ident(c))),
    );
    let mut sql = format!(
        "UPDATE {table} SET {} WHERE {} = ${}",
        assignments.join(", "),
        quote_ident(pk_column),
        set_columns.len() + 1,
    );
    if !returning.is_empty() {
        let returning_list = returning
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" RETURNING {returning_list}"));
    }
    sql
}

/// Render a DELETE statement keyed on the primary column.
pub(crate) fn delete_sql(table: &str, pk_column: &str) -> String {
    format!("DELETE FROM {table} WHERE {} = $1", quote_ident(pk_column))
}

/// A unit-of-work session bound to one (database, schema) pool.
pub struct Session {
    pool: PgPool,
    schema: String,
    tx: Option<Transaction<'static, Postgres>>,
    states: HashMap<EntityKey, EntityState>,
    /// Attribute snapshots taken at load/flush time, backing `is_modified`.
    snapshots: HashMap<EntityKey, BTreeMap<String, Value>>,
    pending_deletes: Vec<PendingDelete>,
    expire_on_commit: bool,
    echo: bool,
}

impl Session {
    pub(crate) fn new(pool: PgPool, schema: String, expire_on_commit: bool, echo: bool) -> Self {
        Self {
            pool,
            schema,
            tx: None,
            states: HashMap::new(),
            snapshots: HashMap::new(),
            pending_deletes: Vec::new(),
            expire_on_commit,
            echo,
        }
    }

    /// Schema this session's statements resolve against.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Lifecycle state of an entity, or `None` while it is Transient.
    pub fn entity_state<M: Model>(&self, entity: &M) -> ActiveResult<Option<EntityState>> {
        Ok(self
            .entity_key(entity)?
            .and_then(|key| self.states.get(&key).copied()))
    }

    fn entity_key<M: Model>(&self, entity: &M) -> ActiveResult<Option<EntityKey>> {
        let pk = entity.pk_value()?;
        if pk.is_null() {
            return Ok(None);
        }
        Ok(Some((M::qualified_table(), pk.to_string())))
    }

    fn require_key<M: Model>(&self, entity: &M, operation: &str) -> ActiveResult<EntityKey> {
        self.entity_key(entity)?.ok_or_else(|| {
            ActiveError::invalid_input(format!(
                "cannot {operation} an entity of {} without a primary key value",
                M::model_name()
            ))
        })
    }

    fn log_sql(&self, sql: &str, params: usize) {
        if self.echo {
            info!(sql, params, "executing statement");
        } else {
            debug!(sql, params, "executing statement");
        }
    }

    /// The session connection; begins the transaction on first use.
    async fn conn(&mut self) -> ActiveResult<&mut PgConnection> {
        if self.tx.is_none() {
            let tx = self.pool.begin().await?;
            self.tx = Some(tx);
        }
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(ActiveError::NoSession),
        }
    }

    /// Execute a raw statement inside the session transaction, returning the
    /// number of affected rows. Escape hatch; the mapped operations below
    /// are the intended surface.
    pub async fn execute_sql(&mut self, sql: &str, params: &[Value]) -> ActiveResult<u64> {
        self.flush().await?;
        self.log_sql(sql, params.len());
        let mut query = sqlx::query(sql);
        for value in params {
            query = bind_value(query, value);
        }
        let result = query.execute(self.conn().await?).await?;
        Ok(result.rows_affected())
    }

    pub(crate) async fn fetch_all_rows(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> ActiveResult<Vec<PgRow>> {
        self.flush().await?;
        self.log_sql(sql, params.len());
        let mut query = sqlx::query(sql);
        for value in params {
            query = bind_value(query, value);
        }
        Ok(query.fetch_all(self.conn().await?).await?)
    }

    pub(crate) async fn fetch_optional_row(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> ActiveResult<Option<PgRow>> {
        self.flush().await?;
        self.log_sql(sql, params.len());
        let mut query = sqlx::query(sql);
        for value in params {
            query = bind_value(query, value);
        }
        Ok(query.fetch_optional(self.conn().await?).await?)
    }

    fn snapshot<M: Model>(&mut self, key: EntityKey, entity: &M) {
        let snapshot = entity
            .values()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        self.snapshots.insert(key.clone(), snapshot);
        self.states.insert(key, EntityState::Persistent);
    }

    /// Record a freshly-fetched entity as Persistent.
    pub(crate) fn track_loaded<M: Model>(&mut self, entity: &M) -> ActiveResult<()> {
        if let Some(key) = self.entity_key(entity)? {
            self.snapshot(key, entity);
        }
        Ok(())
    }

    /// Attach an entity: INSERT for entities the session has not persisted,
    /// UPDATE for ones it already knows, whether Pending, Persistent,
    /// Expired, or Detached (re-adding a detached entity merges the passed
    /// instance's state back in). Runs
    /// inside the session transaction; with `commit` the transaction is
    /// committed and the entity's attributes are refreshed from the
    /// database. On commit failure the session is rolled back and the
    /// original error re-raised.
    pub async fn add<M: Model>(&mut self, entity: &mut M, commit: bool) -> ActiveResult<()> {
        // Pending counts as known: re-adding an instance whose INSERT already
        // ran must update in place, not insert the same key twice.
        let known = match self.entity_key(entity)? {
            Some(ref key) => matches!(
                self.states.get(key),
                Some(
                    EntityState::Pending
                        | EntityState::Persistent
                        | EntityState::Expired
                        | EntityState::Detached
                )
            ),
            None => false,
        };
        let result = if known {
            self.update_entity(entity).await
        } else {
            self.insert_entity(entity).await
        };
        if let Err(err) = result {
            // Re-raise the original error unchanged, even if rollback fails.
            self.rollback().await.ok();
            return Err(err);
        }

        if commit {
            if let Err(err) = self.commit().await {
                self.rollback().await.ok();
                return Err(err);
            }
            self.refresh(entity).await?;
        }
        Ok(())
    }

    async fn insert_entity<M: Model>(&mut self, entity: &mut M) -> ActiveResult<()> {
        let values: BTreeMap<&'static str, Value> = entity.values().into_iter().collect();
        // Null server-default columns are omitted so the database-side
        // generator fills them; RETURNING carries them back.
        let columns: Vec<&str> = M::columns()
            .iter()
            .filter(|c| {
                !(c.server_default && values.get(c.name).is_none_or(Value::is_null))
            })
            .map(|c| c.name)
            .collect();
        let returning: Vec<&str> = M::columns().iter().map(|c| c.name).collect();
        let sql = insert_sql(&M::qualified_table(), &columns, 1, false, &returning);
        let params: Vec<Value> = columns
            .iter()
            .map(|c| values.get(c).cloned().unwrap_or(Value::Null))
            .collect();
        let row = self
            .fetch_optional_row(&sql, &params)
            .await?
            .ok_or_else(|| ActiveError::database("insert returned no row", None))?;
        *entity = M::from_row(&row)?;
        let key = self.require_key(entity, "track")?;
        self.states.insert(key, EntityState::Pending);
        Ok(())
    }

    async fn update_entity<M: Model>(&mut self, entity: &mut M) -> ActiveResult<()> {
        let key = self.require_key(entity, "update")?;
        let pk_column = M::primary_key_column()?;
        let values: BTreeMap<&'static str, Value> = entity.values().into_iter().collect();
        let set_columns: Vec<&str> = M::columns()
            .iter()
            .filter(|c| !c.primary_key && !c.touch_on_update)
            .map(|c| c.name)
            .collect();
        let touch_columns: Vec<&str> = M::columns()
            .iter()
            .filter(|c| c.touch_on_update)
            .map(|c| c.name)
            .collect();
        let returning: Vec<&str> = M::columns().iter().map(|c| c.name).collect();
        let sql = update_sql(
            &M::qualified_table(),
            &set_columns,
            &touch_columns,
            pk_column.name,
            &returning,
        );
        let mut params: Vec<Value> = set_columns
            .iter()
            .map(|c| values.get(c).cloned().unwrap_or(Value::Null))
            .collect();
        params.push(entity.pk_value()?);
        let row = self
            .fetch_optional_row(&sql, &params)
            .await?
            .ok_or_else(|| ActiveError::database("update matched no row", None))?;
        *entity = M::from_row(&row)?;
        self.states.insert(key, EntityState::Pending);
        Ok(())
    }

    /// Bulk insert via a single multi-row statement.
    ///
    /// With `skip_duplicate`, rows colliding on a uniqueness constraint are
    /// skipped by the database's own conflict clause and excluded from the
    /// returned sequence; without it, a collision fails the whole batch and
    /// nothing is inserted. `fields` restricts the inserted columns.
    pub async fn add_all<M: Model>(
        &mut self,
        entities: &[M],
        commit: bool,
        skip_duplicate: bool,
        fields: Option<&[&str]>,
    ) -> ActiveResult<Vec<M>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let dumps: Vec<BTreeMap<&'static str, Value>> = entities
            .iter()
            .map(|e| e.values().into_iter().collect())
            .collect();
        let columns: Vec<&str> = M::columns()
            .iter()
            .filter(|c| {
                if let Some(fields) = fields {
                    if !c.primary_key && !fields.contains(&c.name) {
                        return false;
                    }
                }
                // Omit generated columns left unset on every row.
                !(c.server_default
                    && dumps
                        .iter()
                        .all(|d| d.get(c.name).is_none_or(Value::is_null)))
            })
            .map(|c| c.name)
            .collect();
        let returning: Vec<&str> = M::columns().iter().map(|c| c.name).collect();
        let sql = insert_sql(
            &M::qualified_table(),
            &columns,
            entities.len(),
            skip_duplicate,
            &returning,
        );
        let mut params = Vec::with_capacity(columns.len() * entities.len());
        for dump in &dumps {
            for column in &columns {
                params.push(dump.get(column).cloned().unwrap_or(Value::Null));
            }
        }
        let rows = self.fetch_all_rows(&sql, &params).await?;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in &rows {
            let entity = M::from_row(row)?;
            let key = self.require_key(&entity, "track")?;
            self.states.insert(key, EntityState::Pending);
            inserted.push(entity);
        }
        if commit {
            self.commit().await?;
        }
        Ok(inserted)
    }

    /// Mark an entity deleted. The DELETE statement runs at the next flush
    /// or commit, not immediately.
    pub fn delete<M: Model>(&mut self, entity: &M) -> ActiveResult<()> {
        let key = self.require_key(entity, "delete")?;
        let pk_column = M::primary_key_column()?;
        self.pending_deletes.push(PendingDelete {
            table: M::qualified_table(),
            pk_column: pk_column.name,
            pk: entity.pk_value()?,
            key: key.clone(),
        });
        self.states.insert(key.clone(), EntityState::Deleted);
        self.snapshots.remove(&key);
        Ok(())
    }

    /// Apply queued deletions inside the session transaction, FIFO.
    pub async fn flush(&mut self) -> ActiveResult<()> {
        if self.pending_deletes.is_empty() {
            return Ok(());
        }
        let deletes = std::mem::take(&mut self.pending_deletes);
        for op in &deletes {
            let sql = delete_sql(&op.table, op.pk_column);
            self.log_sql(&sql, 1);
            let query = bind_value(sqlx::query(&sql), &op.pk);
            query.execute(self.conn().await?).await?;
            self.states.insert(op.key.clone(), EntityState::Deleted);
        }
        Ok(())
    }

    /// Flush, then commit the session transaction. Pending entities become
    /// Persistent; with `expire_on_commit`, their attribute snapshots are
    /// invalidated so the next refresh re-fetches.
    pub async fn commit(&mut self) -> ActiveResult<()> {
        self.flush().await?;
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        for state in self.states.values_mut() {
            if *state == EntityState::Pending {
                *state = EntityState::Persistent;
            }
        }
        if self.expire_on_commit {
            self.snapshots.clear();
            for state in self.states.values_mut() {
                if *state == EntityState::Persistent {
                    *state = EntityState::Expired;
                }
            }
        }
        Ok(())
    }

    /// Roll back the session transaction, discarding queued deletions and
    /// pending entity state.
    pub async fn rollback(&mut self) -> ActiveResult<()> {
        self.pending_deletes.clear();
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        self.states
            .retain(|_, state| *state != EntityState::Pending);
        Ok(())
    }

    /// Direct primary-key lookup. `None` means not found, never an error.
    pub async fn get<M: Model>(&mut self, pk: &Value) -> ActiveResult<Option<M>> {
        let pk_column = M::primary_key_column()?;
        let columns = M::columns()
            .iter()
            .map(|c| quote_ident(c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {columns} FROM {} WHERE {} = $1 LIMIT 1",
            M::qualified_table(),
            quote_ident(pk_column.name),
        );
        let row = self.fetch_optional_row(&sql, std::slice::from_ref(pk)).await?;
        match row {
            Some(row) => {
                let entity = M::from_row(&row)?;
                self.track_loaded(&entity)?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// Re-fetch the entity's attributes from storage immediately.
    pub async fn refresh<M: Model>(&mut self, entity: &mut M) -> ActiveResult<()> {
        let key = self.require_key(entity, "refresh")?;
        let refreshed: Option<M> = self.get(&entity.pk_value()?).await?;
        match refreshed {
            Some(fresh) => {
                *entity = fresh;
                self.states.insert(key, EntityState::Persistent);
                Ok(())
            }
            None => Err(ActiveError::database(
                "refresh target row no longer exists",
                None,
            )),
        }
    }

    /// Invalidate the entity's snapshot, forcing a later re-fetch.
    pub fn expire<M: Model>(&mut self, entity: &M) -> ActiveResult<()> {
        let key = self.require_key(entity, "expire")?;
        self.snapshots.remove(&key);
        self.states.insert(key, EntityState::Expired);
        Ok(())
    }

    /// Detach the entity from this session without deleting it from storage.
    pub fn expunge<M: Model>(&mut self, entity: &M) -> ActiveResult<()> {
        let key = self.require_key(entity, "expunge")?;
        self.snapshots.remove(&key);
        self.states.insert(key, EntityState::Detached);
        Ok(())
    }

    /// Whether the entity has in-memory changes versus its last known
    /// persisted state. Pending entities always count as modified.
    pub fn is_modified<M: Model>(&self, entity: &M) -> ActiveResult<bool> {
        let Some(key) = self.entity_key(entity)? else {
            return Ok(false);
        };
        match self.states.get(&key) {
            Some(EntityState::Pending) => Ok(true),
            _ => match self.snapshots.get(&key) {
                Some(snapshot) => {
                    let current: BTreeMap<String, Value> = entity
                        .values()
                        .into_iter()
                        .map(|(name, value)| (name.to_string(), value))
                        .collect();
                    Ok(&current != snapshot)
                }
                None => Ok(false),
            },
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("schema", &self.schema)
            .field("in_transaction", &self.tx.is_some())
            .field("tracked_entities", &self.states.len())
            .field("pending_deletes", &self.pending_deletes.len())
            .field("expire_on_commit", &self.expire_on_commit)
            .finish()
    }
}

/// Blocking facade over [`Session`] for the synchronous execution mode.
///
/// Every method drives the corresponding async operation to completion on
/// the registry runtime. Semantics are identical to the async surface.
pub struct SyncSession {
    inner: Session,
    runtime: Arc<Runtime>,
}

impl SyncSession {
    pub(crate) fn new(inner: Session, runtime: Arc<Runtime>) -> Self {
        Self { inner, runtime }
    }

    pub fn schema(&self) -> &str {
        self.inner.schema()
    }

    /// The wrapped suspend-capable session.
    pub fn as_async(&mut self) -> &mut Session {
        &mut self.inner
    }

    pub fn entity_state<M: Model>(&self, entity: &M) -> ActiveResult<Option<EntityState>> {
        self.inner.entity_state(entity)
    }

    pub fn execute_sql(&mut self, sql: &str, params: &[Value]) -> ActiveResult<u64> {
        let rt = self.runtime.clone();
        rt.block_on(self.inner.execute_sql(sql, params))
    }

    pub(crate) fn fetch_all_rows(&mut self, sql: &str, params: &[Value]) -> ActiveResult<Vec<PgRow>> {
        let rt = self.runtime.clone();
        rt.block_on(self.inner.fetch_all_rows(sql, params))
    }

    pub(crate) fn fetch_optional_row(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> ActiveResult<Option<PgRow>> {
        let rt = self.runtime.clone();
        rt.block_on(self.inner.fetch_optional_row(sql, params))
    }

    pub(crate) fn track_loaded<M: Model>(&mut self, entity: &M) -> ActiveResult<()> {
        self.inner.track_loaded(entity)
    }

    pub fn add<M: Model>(&mut self, entity: &mut M, commit: bool) -> ActiveResult<()> {
        let rt = self.runtime.clone();
        rt.block_on(self.inner.add(entity, commit))
    }

    pub fn add_all<M: Model>(
        &mut self,
        entities: &[M],
        commit: bool,
        skip_duplicate: bool,
        fields: Option<&[&str]>,
    ) -> ActiveResult<Vec<M>> {
        let rt = self.runtime.clone();
        rt.block_on(self.inner.add_all(entities, commit, skip_duplicate, fields))
    }

    pub fn delete<M: Model>(&mut self, entity: &M) -> ActiveResult<()> {
        self.inner.delete(entity)
    }

    pub fn flush(&mut self) -> ActiveResult<()> {
        let rt = self.runtime.clone();
        rt.block_on(self.inner.flush())
    }

    pub fn commit(&mut self) -> ActiveResult<()> {
        let rt = self.runtime.clone();
        rt.block_on(self.inner.commit())
    }

    pub fn rollback(&mut self) -> ActiveResult<()> {
        let rt = self.runtime.clone();
        rt.block_on(self.inner.rollback())
    }

    pub fn get<M: Model>(&mut self, pk: &Value) -> ActiveResult<Option<M>> {
        let rt = self.runtime.clone();
        rt.block_on(self.inner.get(pk))
    }

    pub fn refresh<M: Model>(&mut self, entity: &mut M) -> ActiveResult<()> {
        let rt = self.runtime.clone();
        rt.block_on(self.inner.refresh(entity))
    }

    pub fn expire<M: Model>(&mut self, entity: &M) -> ActiveResult<()> {
        self.inner.expire(entity)
    }

    pub fn expunge<M: Model>(&mut self, entity: &M) -> ActiveResult<()> {
        self.inner.expunge(entity)
    }

    pub fn is_modified<M: Model>(&self, entity: &M) -> ActiveResult<bool> {
        self.inner.is_modified(entity)
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession").field("inner", &self.inner).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sql_numbers_placeholders_row_major() {
        let sql = insert_sql("\"public\".\"city\"", &["name", "code"], 2, false, &["id"]);
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"city\" (\"name\", \"code\") \
             VALUES ($1, $2), ($3, $4) RETURNING \"id\""
        );
    }

    #[test]
    fn insert_sql_adds_conflict_clause_for_skip_duplicate() {
        let sql = insert_sql("\"public\".\"city\"", &["name"], 1, true, &[]);
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"city\" (\"name\") VALUES ($1) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn update_sql_touches_and_keys_on_primary_column() {
        let sql = update_sql(
            "\"public\".\"city\"",
            &["name", "code"],
            &["updated_at"],
            "id",
            &["id", "updated_at"],
        );
        assert_eq!(
            sql,
            "UPDATE \"public\".\"city\" SET \"name\" = $1, \"code\" = $2, \
             \"updated_at\" = now() WHERE \"id\" = $3 RETURNING \"id\", \"updated_at\""
        );
    }

    #[test]
    fn delete_sql_keys_on_primary_column() {
        assert_eq!(
            delete_sql("\"public\".\"city\"", "id"),
            "DELETE FROM \"public\".\"city\" WHERE \"id\" = $1"
        );
    }
}
