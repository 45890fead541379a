//! SQL SELECT builder
//!
//! Provides a typed query builder that works with [`Entity`] types and uses
//! parameterized queries via sqlx to prevent SQL injection.

use std::fmt;
use std::marker::PhantomData;

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::{Column, Condition, Entity, OrderDirection, SqlValue};

/// A SELECT query under construction for entity `E`.
///
/// Filters accumulate (joined with `AND`), sort keys accumulate in call order,
/// and `limit`/`offset` replace any previously set bound.
pub struct Select<E: Entity> {
    projection: Vec<&'static str>,
    where_clauses: Vec<String>,
    values: Vec<SqlValue>,
    order_by: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Select<E> {
    /// Create a new query selecting every column of the entity.
    pub fn new() -> Self {
        Self {
            projection: Vec::new(),
            where_clauses: Vec::new(),
            values: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            _entity: PhantomData,
        }
    }

    /// Restrict the projection to `columns`. An empty list keeps every column.
    ///
    /// [`fetch_all`](Self::fetch_all) and [`fetch_optional`](Self::fetch_optional)
    /// decode rows with `E`'s `FromRow`, so every field left out of the
    /// projection must be `#[sqlx(default)]`; otherwise decoding fails with
    /// `sqlx::Error::ColumnNotFound`. [`fetch_rows`](Self::fetch_rows) returns
    /// the raw rows instead.
    pub fn columns(mut self, columns: impl IntoIterator<Item = Column<E>>) -> Self {
        self.projection = columns.into_iter().map(|c| c.name()).collect();
        self
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, condition: Condition) -> Self {
        let (sql, values) = condition.into_parts();
        self.where_clauses.push(sql);
        self.values.extend(values);
        self
    }

    /// Add a sort key.
    pub fn order_by(mut self, column: Column<E>, direction: OrderDirection) -> Self {
        self.order_by
            .push(format!("{} {}", column.name(), direction.to_sql()));
        self
    }

    /// Set limit directly.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set offset directly.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    /// Values to bind, in placeholder order.
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// The `SELECT ... FROM table` head, before any clause.
    pub fn head_sql(&self) -> String {
        if self.projection.is_empty() {
            E::select_sql()
        } else {
            format!(
                "SELECT {} FROM {}",
                self.projection.join(", "),
                E::TABLE_NAME
            )
        }
    }

    fn where_sql(&self) -> String {
        if self.where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_clauses.join(" AND "))
        }
    }

    /// Build the SQL query string.
    pub fn to_sql(&self) -> String {
        let mut sql = self.head_sql();
        sql.push_str(&self.where_sql());

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        sql
    }

    /// Build a COUNT query string (ignores ordering and pagination).
    pub fn to_count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}{}", E::TABLE_NAME, self.where_sql())
    }

    /// Execute the query and return the raw rows.
    pub async fn fetch_rows<'c, X>(&self, executor: X) -> Result<Vec<SqliteRow>, sqlx::Error>
    where
        X: sqlx::Executor<'c, Database = sqlx::Sqlite>,
    {
        let sql = self.to_sql();
        tracing::debug!(sql = %sql, "Executing entity query");

        let mut query = sqlx::query(&sql);
        for value in &self.values {
            query = value.bind_to_query(query);
        }
        query.fetch_all(executor).await
    }

    /// Execute the query and return all matching entities.
    pub async fn fetch_all<'c, X>(&self, executor: X) -> Result<Vec<E>, sqlx::Error>
    where
        X: sqlx::Executor<'c, Database = sqlx::Sqlite>,
        E: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let rows = self.fetch_rows(executor).await?;
        rows.iter().map(E::from_row).collect()
    }

    /// Execute the query and return the first entity, if any.
    pub async fn fetch_optional<'c, X>(&self, executor: X) -> Result<Option<E>, sqlx::Error>
    where
        X: sqlx::Executor<'c, Database = sqlx::Sqlite>,
        E: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let sql = self.to_sql();
        tracing::debug!(sql = %sql, "Executing entity query (one)");

        let mut query = sqlx::query(&sql);
        for value in &self.values {
            query = value.bind_to_query(query);
        }

        match query.fetch_optional(executor).await? {
            Some(row) => Ok(Some(E::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Execute a COUNT query.
    pub async fn count<'c, X>(&self, executor: X) -> Result<i64, sqlx::Error>
    where
        X: sqlx::Executor<'c, Database = sqlx::Sqlite>,
    {
        let sql = self.to_count_sql();
        tracing::debug!(sql = %sql, "Executing count query");

        let mut query = sqlx::query(&sql);
        for value in &self.values {
            query = value.bind_to_query(query);
        }

        let row = query.fetch_one(executor).await?;
        row.try_get::<i64, _>(0)
    }
}

impl<E: Entity> Default for Select<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Clone for Select<E> {
    fn clone(&self) -> Self {
        Self {
            projection: self.projection.clone(),
            where_clauses: self.where_clauses.clone(),
            values: self.values.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> PartialEq for Select<E> {
    fn eq(&self, other: &Self) -> bool {
        self.projection == other.projection
            && self.where_clauses == other.where_clauses
            && self.values == other.values
            && self.order_by == other.order_by
            && self.limit == other.limit
            && self.offset == other.offset
    }
}

impl<E: Entity> fmt::Debug for Select<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("sql", &self.to_sql())
            .field("values", &self.values)
            .finish()
    }
}

impl<E: Entity> fmt::Display for Select<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::ColumnDef;

    #[derive(Debug, sqlx::FromRow)]
    struct Pet {
        id: i64,
        name: String,
        age: i64,
    }

    impl Entity for Pet {
        const TABLE_NAME: &'static str = "pets";
        const PRIMARY_KEY: &'static str = "id";
        const COLUMNS: &'static [ColumnDef] = &[
            ColumnDef::new("id", "id"),
            ColumnDef::new("name", "name"),
            ColumnDef::new("age", "age"),
        ];
    }

    /// Same table, but every field may be missing from a narrowed projection.
    #[derive(Debug, sqlx::FromRow)]
    struct LoosePet {
        #[sqlx(default)]
        id: i64,
        #[sqlx(default)]
        name: String,
        #[sqlx(default)]
        age: i64,
    }

    impl Entity for LoosePet {
        const TABLE_NAME: &'static str = "pets";
        const PRIMARY_KEY: &'static str = "id";
        const COLUMNS: &'static [ColumnDef] = Pet::COLUMNS;
    }

    const NAME: Column<Pet> = Column::new("name", "name");
    const AGE: Column<Pet> = Column::new("age", "age");

    async fn seeded_pool() -> sqlx::SqlitePool {
        // One long-lived connection so the in-memory database survives between queries
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE pets (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        for (name, age) in [("rex", 3), ("tom", 7), ("kit", 1), ("ace", 12)] {
            sqlx::query("INSERT INTO pets (name, age) VALUES (?, ?)")
                .bind(name)
                .bind(age)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool
    }

    #[test]
    fn test_build_sql() {
        let select = Select::<Pet>::new()
            .filter(AGE.gte(2))
            .filter(NAME.like("%e%"))
            .order_by(AGE, OrderDirection::Desc)
            .order_by(NAME, OrderDirection::Asc)
            .limit(10)
            .offset(5);

        assert_eq!(
            select.to_sql(),
            "SELECT id, name, age FROM pets WHERE age >= ? AND name LIKE ? ORDER BY age DESC, name ASC LIMIT 10 OFFSET 5"
        );
        assert_eq!(
            select.to_count_sql(),
            "SELECT COUNT(*) FROM pets WHERE age >= ? AND name LIKE ?"
        );
        assert_eq!(select.values(), &[SqlValue::Int(2), SqlValue::from("%e%")]);
    }

    #[test]
    fn test_limit_last_write_wins() {
        let select = Select::<Pet>::new().limit(10).limit(5).offset(3).offset(0);
        assert_eq!(select.limit_value(), Some(5));
        assert_eq!(select.offset_value(), Some(0));
    }

    #[test]
    fn test_offset_without_limit() {
        let select = Select::<Pet>::new().offset(2);
        assert_eq!(select.to_sql(), "SELECT id, name, age FROM pets LIMIT -1 OFFSET 2");
    }

    #[test]
    fn test_projection() {
        let select = Select::<Pet>::new().columns([NAME]);
        assert_eq!(select.to_sql(), "SELECT name FROM pets");
        let all = Select::<Pet>::new().columns(Vec::new());
        assert_eq!(all.to_sql(), "SELECT id, name, age FROM pets");
    }

    #[tokio::test]
    async fn test_fetch_all_and_count() {
        let pool = seeded_pool().await;
        let select = Select::<Pet>::new()
            .filter(AGE.gt(2))
            .order_by(AGE, OrderDirection::Asc);

        let pets = select.fetch_all(&pool).await.unwrap();
        let names: Vec<&str> = pets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["rex", "tom", "ace"]);
        assert!(pets.iter().all(|p| p.id > 0 && p.age > 2));

        assert_eq!(select.count(&pool).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_fetch_optional() {
        let pool = seeded_pool().await;
        let found = Select::<Pet>::new()
            .filter(NAME.eq("kit"))
            .fetch_optional(&pool)
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.age), Some(1));

        let missing = Select::<Pet>::new()
            .filter(NAME.eq("nobody"))
            .fetch_optional(&pool)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_narrowed_projection_decoding() {
        let pool = seeded_pool().await;

        let err = Select::<Pet>::new()
            .columns([NAME])
            .fetch_all(&pool)
            .await
            .err()
            .unwrap();
        assert!(
            matches!(&err, sqlx::Error::ColumnNotFound(column) if column == "id"),
            "{err:?}"
        );

        let pets = Select::<LoosePet>::new()
            .columns([Column::new("name", "name")])
            .filter(Column::<LoosePet>::new("age", "age").gt(5))
            .order_by(Column::new("name", "name"), OrderDirection::Asc)
            .fetch_all(&pool)
            .await
            .unwrap();
        let names: Vec<&str> = pets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["ace", "tom"]);
        assert!(pets.iter().all(|p| p.id == 0 && p.age == 0));

        let rows = Select::<Pet>::new()
            .columns([NAME])
            .fetch_rows(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 4);
    }
}
