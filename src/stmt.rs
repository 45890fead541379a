//! Statement builder with logging
//!
//! [`Stmt`] wraps a [`Select`] and offers a fluent interface for filtering,
//! ordering and paginating it, while recording one human-readable line per
//! applied operation.
//!
//! ```rust,ignore
//! let stmt = Stmt::new(Select::<User>::new())
//!     .gte_filter(User::AGE, 18)
//!     .lt_filter(User::AGE, 30)
//!     .ordered_by(User::NAME)
//!     .limit(10)
//!     .offset(0);
//!
//! println!("{}", stmt.log(" - "));
//! // SELECT id, name, age FROM users
//! //  - age >= 18
//! //  - age < 30
//! //  - order by name
//! //  - limit 10
//! //  - offset 0
//!
//! let users = stmt.into_select().fetch_all(&pool).await?;
//! ```
//!
//! Values are not checked against the column type here; SQLite reports
//! mismatches when the query runs.

use std::fmt::Display;

use crate::orm::{Column, Condition, Entity, OrderDirection, Relation, Select, SqlValue};

/// Default prefix for each operation line rendered by [`Stmt::log`].
pub const DEFAULT_LOG_PREFIX: &str = " - ";

/// A [`Select`] under construction plus the log of operations applied to it.
#[derive(Debug, Clone)]
pub struct Stmt<E: Entity> {
    select: Select<E>,
    log: Vec<String>,
}

impl<E: Entity> Stmt<E> {
    pub fn new(select: Select<E>) -> Self {
        Self {
            select,
            log: Vec::new(),
        }
    }

    /// `column <= value`
    pub fn lte_filter(self, column: Column<E>, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        let entry = format!("{column} <= {value}");
        self.apply_filter(column.lte(value), entry)
    }

    /// `column >= value`
    pub fn gte_filter(self, column: Column<E>, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        let entry = format!("{column} >= {value}");
        self.apply_filter(column.gte(value), entry)
    }

    /// `column < value`
    pub fn lt_filter(self, column: Column<E>, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        let entry = format!("{column} < {value}");
        self.apply_filter(column.lt(value), entry)
    }

    /// `column > value`
    pub fn gt_filter(self, column: Column<E>, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        let entry = format!("{column} > {value}");
        self.apply_filter(column.gt(value), entry)
    }

    /// `column = value`
    pub fn eq_filter(self, column: Column<E>, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        let entry = format!("{column} == {value}");
        self.apply_filter(column.eq(value), entry)
    }

    /// `column <> value`
    pub fn ne_filter(self, column: Column<E>, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        let entry = format!("{column} != {value}");
        self.apply_filter(column.ne(value), entry)
    }

    /// `column IN (values)`
    pub fn con_filter<V: Into<SqlValue>>(
        self,
        column: Column<E>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
        let entry = format!("{column} in {}", display_list(&values));
        self.apply_filter(column.is_in(values), entry)
    }

    /// `column NOT IN (values)`
    pub fn not_con_filter<V: Into<SqlValue>>(
        self,
        column: Column<E>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
        let entry = format!("{column} not in {}", display_list(&values));
        self.apply_filter(column.not_in(values), entry)
    }

    /// Entities with at least one related row matching `values`.
    pub fn con_model_filter<V: Into<SqlValue>>(
        self,
        relation: Relation<E>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
        let entry = format!(
            "{} relationship in {}",
            relation.name(),
            display_list(&values)
        );
        self.apply_filter(relation.any_in(values), entry)
    }

    /// `column LIKE pattern`
    pub fn like_filter(self, column: Column<E>, pattern: impl Into<SqlValue>) -> Self {
        let pattern = pattern.into();
        let entry = format!("{column} like {pattern}");
        self.apply_filter(column.like(pattern), entry)
    }

    /// Plain `WHERE column = value`, logged as a where clause rather than a comparison.
    pub fn where_filter(self, column: Column<E>, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        let entry = format!("{column} where {value}");
        self.apply_filter(column.eq(value), entry)
    }

    /// Apply an arbitrary condition with a caller-supplied log line.
    pub fn filter(self, condition: Condition, entry: impl Display) -> Self {
        self.apply_filter(condition, entry.to_string())
    }

    /// Append an ascending sort key.
    pub fn ordered_by(self, column: Column<E>) -> Self {
        self.ordered(column, OrderDirection::Asc)
    }

    /// Append a descending sort key.
    pub fn ordered_by_desc(self, column: Column<E>) -> Self {
        self.ordered(column, OrderDirection::Desc)
    }

    /// Append a sort key in the given direction.
    pub fn ordered(mut self, column: Column<E>, direction: OrderDirection) -> Self {
        let entry = match direction {
            OrderDirection::Asc => format!("order by {column}"),
            OrderDirection::Desc => format!("order by {column} desc"),
        };
        self.select = self.select.order_by(column, direction);
        self.record(entry)
    }

    /// Set the row limit. A later call replaces the earlier bound.
    pub fn limit(mut self, limit: i64) -> Self {
        self.select = self.select.limit(limit);
        self.record(format!("limit {limit}"))
    }

    /// Set the row offset. A later call replaces the earlier bound.
    pub fn offset(mut self, offset: i64) -> Self {
        self.select = self.select.offset(offset);
        self.record(format!("offset {offset}"))
    }

    /// Apply `op` only when `value` is present.
    ///
    /// ```rust,ignore
    /// stmt.when(args.min_age, |s, age| s.gte_filter(User::AGE, age))
    /// ```
    pub fn when<T>(self, value: Option<T>, op: impl FnOnce(Self, T) -> Self) -> Self {
        match value {
            Some(value) => op(self, value),
            None => self,
        }
    }

    /// The query built so far.
    pub fn select(&self) -> &Select<E> {
        &self.select
    }

    /// Finish building and return the query. Nothing is executed.
    pub fn into_select(self) -> Select<E> {
        tracing::debug!(
            table = E::TABLE_NAME,
            operations = self.log.len(),
            log = %self.log.join("; "),
            "Statement built"
        );
        self.select
    }

    /// Operation log, one entry per applied operation in call order.
    pub fn log_entries(&self) -> &[String] {
        &self.log
    }

    /// Render the log: the SELECT head on the first line, then one line per operation.
    pub fn log(&self, prefix: &str) -> String {
        let mut out = self.select.head_sql();
        out.push('\n');
        for entry in &self.log {
            out.push_str(prefix);
            out.push_str(entry);
            out.push('\n');
        }
        out
    }

    fn apply_filter(mut self, condition: Condition, entry: String) -> Self {
        self.select = self.select.filter(condition);
        self.record(entry)
    }

    fn record(mut self, entry: String) -> Self {
        tracing::trace!(table = E::TABLE_NAME, op = %entry, "Statement operation applied");
        self.log.push(entry);
        self
    }
}

impl<E: Entity> From<Select<E>> for Stmt<E> {
    fn from(select: Select<E>) -> Self {
        Self::new(select)
    }
}

impl<E: Entity> Default for Stmt<E> {
    fn default() -> Self {
        Self::new(Select::new())
    }
}

fn display_list(values: &[SqlValue]) -> String {
    let items: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}
