//! Lazily-resolved selections over one entity type.
//!
//! [`SelectQuery`] carries predicate/ordering/limit state and renders to a
//! parameterized SELECT on demand; it executes nothing until
//! [`SelectQuery::scalars`] materializes it against a session. The wrapper
//! holds no session of its own and never mutates shared session state; the
//! session is always passed at materialization.

use std::marker::PhantomData;

use crate::error::ActiveResult;
use crate::model::{Model, quote_ident};
use crate::session::{Session, SyncSession};
use crate::value::Value;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl Comparison {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
        }
    }
}

/// A single predicate over one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        column: String,
        op: Comparison,
        value: Value,
    },
    IsNull {
        column: String,
    },
    IsNotNull {
        column: String,
    },
}

impl Expr {
    /// Render this predicate, appending bound values to `params`.
    fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            Self::Compare { column, op, value } => {
                params.push(value.clone());
                format!("{} {} ${}", quote_ident(column), op.sql(), params.len())
            }
            Self::IsNull { column } => format!("{} IS NULL", quote_ident(column)),
            Self::IsNotNull { column } => format!("{} IS NOT NULL", quote_ident(column)),
        }
    }
}

/// Start a predicate on a named column: `col("name").eq("Berlin")`.
pub fn col(name: impl Into<String>) -> ColumnRef {
    ColumnRef { name: name.into() }
}

/// A column reference awaiting its comparison.
#[derive(Debug, Clone)]
pub struct ColumnRef {
    name: String,
}

impl ColumnRef {
    fn compare(self, op: Comparison, value: impl Into<Value>) -> Expr {
        Expr::Compare {
            column: self.name,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Expr {
        self.compare(Comparison::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Expr {
        self.compare(Comparison::Ne, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Expr {
        self.compare(Comparison::Gt, value)
    }

    pub fn gte(self, value: impl Into<Value>) -> Expr {
        self.compare(Comparison::Gte, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Expr {
        self.compare(Comparison::Lt, value)
    }

    pub fn lte(self, value: impl Into<Value>) -> Expr {
        self.compare(Comparison::Lte, value)
    }

    pub fn like(self, pattern: impl Into<String>) -> Expr {
        self.compare(Comparison::Like, Value::Text(pattern.into()))
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull { column: self.name }
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNotNull { column: self.name }
    }
}

/// Sort direction of one ORDER BY term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    Desc,
}

/// An unexecuted selection over entity type `M`.
#[derive(Debug)]
pub struct SelectQuery<M: Model> {
    predicates: Vec<Expr>,
    order: Vec<(String, OrderDir)>,
    limit: Option<u64>,
    offset: Option<u64>,
    _entity: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for SelectQuery<M> {
    fn clone(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
            _entity: PhantomData,
        }
    }
}

impl<M: Model> Default for SelectQuery<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> SelectQuery<M> {
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            _entity: PhantomData,
        }
    }

    /// Add a predicate (AND-combined with existing ones).
    #[allow(clippy::should_implement_trait)]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.predicates.push(expr);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order.push((column.into(), OrderDir::Asc));
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order.push((column.into(), OrderDir::Desc));
        self
    }

    /// Drop any ordering accumulated so far.
    pub fn clear_order(mut self) -> Self {
        self.order.clear();
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn where_clause(&self, params: &mut Vec<Value>) -> String {
        if self.predicates.is_empty() {
            return String::new();
        }
        let terms = self
            .predicates
            .iter()
            .map(|p| p.render(params))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!(" WHERE {terms}")
    }

    /// Render the selection to SQL plus bound parameters.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let columns = M::columns()
            .iter()
            .map(|c| quote_ident(c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params = Vec::new();
        let mut sql = format!("SELECT {columns} FROM {}", M::qualified_table());
        sql.push_str(&self.where_clause(&mut params));
        if !self.order.is_empty() {
            let terms = self
                .order
                .iter()
                .map(|(column, dir)| match dir {
                    OrderDir::Asc => quote_ident(column),
                    OrderDir::Desc => format!("{} DESC", quote_ident(column)),
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {terms}"));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        (sql, params)
    }

    /// Rewrite to a row-count aggregate: ordering stripped, offset zeroed,
    /// limit dropped, selected columns replaced by `COUNT(*)`.
    pub fn count_sql(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", M::qualified_table());
        sql.push_str(&self.where_clause(&mut params));
        (sql, params)
    }

    /// Execute the selection and map rows to entities. Execution failures
    /// propagate unmodified; no retry.
    pub async fn scalars(&self, session: &mut Session) -> ActiveResult<Vec<M>> {
        let (sql, params) = self.to_sql();
        let rows = session.fetch_all_rows(&sql, &params).await?;
        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            let entity = M::from_row(row)?;
            session.track_loaded(&entity)?;
            entities.push(entity);
        }
        Ok(entities)
    }

    /// First matching entity, or `None`.
    pub async fn first_scalar(&self, session: &mut Session) -> ActiveResult<Option<M>> {
        let (sql, params) = self.clone().limit(1).to_sql();
        let row = session.fetch_optional_row(&sql, &params).await?;
        match row {
            Some(row) => {
                let entity = M::from_row(&row)?;
                session.track_loaded(&entity)?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// Execute the count rewrite. An empty aggregate yields 0.
    pub async fn count(&self, session: &mut Session) -> ActiveResult<i64> {
        let (sql, params) = self.count_sql();
        let row = session.fetch_optional_row(&sql, &params).await?;
        match row {
            Some(row) => {
                use sqlx::Row;
                Ok(row.try_get::<i64, _>(0)?)
            }
            None => Ok(0),
        }
    }

    /// Blocking analogue of [`SelectQuery::scalars`].
    pub fn scalars_sync(&self, session: &mut SyncSession) -> ActiveResult<Vec<M>> {
        let (sql, params) = self.to_sql();
        let rows = session.fetch_all_rows(&sql, &params)?;
        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            let entity = M::from_row(row)?;
            session.track_loaded(&entity)?;
            entities.push(entity);
        }
        Ok(entities)
    }

    /// Blocking analogue of [`SelectQuery::first_scalar`].
    pub fn first_scalar_sync(&self, session: &mut SyncSession) -> ActiveResult<Option<M>> {
        let (sql, params) = self.clone().limit(1).to_sql();
        let row = session.fetch_optional_row(&sql, &params)?;
        match row {
            Some(row) => {
                let entity = M::from_row(&row)?;
                session.track_loaded(&entity)?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// Blocking analogue of [`SelectQuery::count`].
    pub fn count_sync(&self, session: &mut SyncSession) -> ActiveResult<i64> {
        let (sql, params) = self.count_sql();
        let row = session.fetch_optional_row(&sql, &params)?;
        match row {
            Some(row) => {
                use sqlx::Row;
                Ok(row.try_get::<i64, _>(0)?)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;
    use crate::value::ColumnType;

    #[derive(Debug, Default)]
    struct City {
        id: Option<i64>,
        name: String,
    }

    impl Model for City {
        const TABLE: &'static str = "city";

        fn columns() -> &'static [Column] {
            const COLUMNS: &[Column] = &[
                Column::new("id", ColumnType::Int).primary_key(),
                Column::new("name", ColumnType::Text),
            ];
            COLUMNS
        }

        fn values(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("id", Value::from(self.id)),
                ("name", Value::from(self.name.as_str())),
            ]
        }

        fn set_value(&mut self, column: &str, value: Value) -> bool {
            match column {
                "id" => {
                    if let Value::Int(v) = value {
                        self.id = Some(v);
                    }
                }
                "name" => {
                    if let Value::Text(v) = value {
                        self.name = v;
                    }
                }
                _ => return false,
            }
            true
        }
    }

    #[test]
    fn bare_select_lists_all_columns() {
        let (sql, params) = SelectQuery::<City>::new().to_sql();
        assert_eq!(sql, "SELECT \"id\", \"name\" FROM \"public\".\"city\"");
        assert!(params.is_empty());
    }

    #[test]
    fn predicates_render_with_sequential_placeholders() {
        let (sql, params) = SelectQuery::<City>::new()
            .filter(col("name").like("B%"))
            .filter(col("id").gt(10i64))
            .to_sql();
        assert_eq!(
            sql,
            "SELECT \"id\", \"name\" FROM \"public\".\"city\" \
             WHERE \"name\" LIKE $1 AND \"id\" > $2"
        );
        assert_eq!(params, vec![Value::Text("B%".into()), Value::Int(10)]);
    }

    #[test]
    fn null_predicates_bind_nothing() {
        let (sql, params) = SelectQuery::<City>::new()
            .filter(col("name").is_not_null())
            .filter(col("id").is_null())
            .to_sql();
        assert_eq!(
            sql,
            "SELECT \"id\", \"name\" FROM \"public\".\"city\" \
             WHERE \"name\" IS NOT NULL AND \"id\" IS NULL"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn ordering_limit_and_offset_render_in_order() {
        let (sql, _) = SelectQuery::<City>::new()
            .order_by("name")
            .order_by_desc("id")
            .limit(5)
            .offset(10)
            .to_sql();
        assert_eq!(
            sql,
            "SELECT \"id\", \"name\" FROM \"public\".\"city\" \
             ORDER BY \"name\", \"id\" DESC LIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn count_rewrite_strips_order_offset_and_limit_but_keeps_predicates() {
        let (sql, params) = SelectQuery::<City>::new()
            .filter(col("name").eq("Berlin"))
            .order_by_desc("id")
            .limit(3)
            .offset(7)
            .count_sql();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM \"public\".\"city\" WHERE \"name\" = $1"
        );
        assert_eq!(params, vec![Value::Text("Berlin".into())]);
    }

    #[test]
    fn clear_order_drops_accumulated_ordering() {
        let (sql, _) = SelectQuery::<City>::new()
            .order_by("name")
            .clear_order()
            .to_sql();
        assert_eq!(sql, "SELECT \"id\", \"name\" FROM \"public\".\"city\"");
    }
}
