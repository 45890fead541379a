//! Core traits and value types for the ORM layer
//!
//! [`Entity`] is implemented by `#[derive(Entity)]` from `gqlglue-macros`.

use std::fmt;
use std::marker::PhantomData;

use super::Condition;

/// Column definition: the SQL column and the GraphQL field it is exposed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name in the database
    pub name: &'static str,
    /// Field name in the GraphQL schema (e.g. `createdAt`)
    pub field: &'static str,
}

impl ColumnDef {
    pub const fn new(name: &'static str, field: &'static str) -> Self {
        Self { name, field }
    }
}

/// Metadata about a database entity (table).
///
/// Implemented by `#[derive(Entity)]` macro.
pub trait Entity: Sized + Send + Sync + 'static {
    /// The SQL table name (e.g., "users")
    const TABLE_NAME: &'static str;

    /// The primary key column name (e.g., "id")
    const PRIMARY_KEY: &'static str;

    /// All columns in declaration order
    const COLUMNS: &'static [ColumnDef];

    /// List of all column names in the table
    fn column_names() -> Vec<&'static str> {
        Self::COLUMNS.iter().map(|c| c.name).collect()
    }

    /// Build a SELECT query for all columns
    fn select_sql() -> String {
        format!(
            "SELECT {} FROM {}",
            Self::column_names().join(", "),
            Self::TABLE_NAME
        )
    }

    /// Look up a column by GraphQL field name, falling back to the SQL column name.
    fn column(name: &str) -> Option<Column<Self>> {
        Self::COLUMNS
            .iter()
            .find(|c| c.field == name)
            .or_else(|| Self::COLUMNS.iter().find(|c| c.name == name))
            .map(|c| Column::new(c.name, c.field))
    }
}

/// A typed reference to one column of entity `E`.
///
/// Comparison methods build [`Condition`]s that can be passed to
/// [`Select::filter`](super::Select::filter).
pub struct Column<E> {
    name: &'static str,
    field: &'static str,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Column<E> {
    pub const fn new(name: &'static str, field: &'static str) -> Self {
        Self {
            name,
            field,
            _entity: PhantomData,
        }
    }

    /// SQL column name
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// GraphQL field name
    pub const fn field(&self) -> &'static str {
        self.field
    }

    pub fn eq(self, value: impl Into<SqlValue>) -> Condition {
        Condition::compare(self.name, "=", value.into())
    }

    pub fn ne(self, value: impl Into<SqlValue>) -> Condition {
        Condition::compare(self.name, "<>", value.into())
    }

    pub fn gt(self, value: impl Into<SqlValue>) -> Condition {
        Condition::compare(self.name, ">", value.into())
    }

    pub fn gte(self, value: impl Into<SqlValue>) -> Condition {
        Condition::compare(self.name, ">=", value.into())
    }

    pub fn lt(self, value: impl Into<SqlValue>) -> Condition {
        Condition::compare(self.name, "<", value.into())
    }

    pub fn lte(self, value: impl Into<SqlValue>) -> Condition {
        Condition::compare(self.name, "<=", value.into())
    }

    pub fn like(self, pattern: impl Into<SqlValue>) -> Condition {
        Condition::compare(self.name, "LIKE", pattern.into())
    }

    pub fn is_in<V: Into<SqlValue>>(self, values: impl IntoIterator<Item = V>) -> Condition {
        Condition::membership(self.name, false, values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<V: Into<SqlValue>>(self, values: impl IntoIterator<Item = V>) -> Condition {
        Condition::membership(self.name, true, values.into_iter().map(Into::into).collect())
    }
}

impl<E> Clone for Column<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Column<E> {}

impl<E> PartialEq for Column<E> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.field == other.field
    }
}

impl<E> Eq for Column<E> {}

impl<E> fmt::Debug for Column<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("field", &self.field)
            .finish()
    }
}

impl<E> fmt::Display for Column<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Sort direction for ORDER BY clauses.
#[derive(async_graphql::Enum, Copy, Clone, Debug, Default, Eq, PartialEq)]
#[graphql(name = "SortDirection")]
pub enum OrderDirection {
    /// Ascending order (A-Z, 1-9, oldest-newest)
    #[default]
    #[graphql(name = "Asc")]
    Asc,
    /// Descending order (Z-A, 9-1, newest-oldest)
    #[graphql(name = "Desc")]
    Desc,
}

impl OrderDirection {
    /// Convert to SQL order string
    pub fn to_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Represents a SQL value that can be bound to a query.
///
/// Used by conditions to collect values for parameterized queries.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Bind this value to a sqlx query
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::String(s) => f.write_str(s),
            SqlValue::Int(i) => write!(f, "{i}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Bool(b) => write!(f, "{b}"),
            SqlValue::Null => f.write_str("NULL"),
        }
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::String(value.clone())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value.into())
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        SqlValue::Int(value.into())
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}
