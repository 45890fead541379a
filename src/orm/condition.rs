//! WHERE clause fragments and relationship predicates

use std::fmt;
use std::marker::PhantomData;

use super::{Entity, SqlValue};

/// A parameterized WHERE clause fragment with its bind values.
///
/// Placeholders are positional `?`, bound in the order the values appear.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    sql: String,
    values: Vec<SqlValue>,
}

impl Condition {
    /// Build a condition from raw SQL. The number of `?` placeholders must match `values`.
    pub fn raw(sql: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            values,
        }
    }

    pub(crate) fn compare(column: &str, op: &str, value: SqlValue) -> Self {
        match (op, &value) {
            ("=", SqlValue::Null) => Self::raw(format!("{column} IS NULL"), Vec::new()),
            ("<>", SqlValue::Null) => Self::raw(format!("{column} IS NOT NULL"), Vec::new()),
            _ => Self::raw(format!("{column} {op} ?"), vec![value]),
        }
    }

    pub(crate) fn membership(column: &str, negated: bool, values: Vec<SqlValue>) -> Self {
        if values.is_empty() {
            // IN () is not valid SQL
            return if negated {
                Self::raw("1 = 1", Vec::new())
            } else {
                Self::raw("0 = 1", Vec::new())
            };
        }
        let keyword = if negated { "NOT IN" } else { "IN" };
        Self::raw(
            format!("{column} {keyword} ({})", placeholders(values.len())),
            values,
        )
    }

    /// Both conditions must hold.
    pub fn and(self, other: Condition) -> Self {
        self.combine("AND", other)
    }

    /// Either condition may hold.
    pub fn or(self, other: Condition) -> Self {
        self.combine("OR", other)
    }

    fn combine(mut self, op: &str, other: Condition) -> Self {
        self.values.extend(other.values);
        Self {
            sql: format!("({} {op} {})", self.sql, other.sql),
            values: self.values,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub(crate) fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.values)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Join table linking an entity to the target of a many-to-many relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// The association table (e.g., "book_genres")
    pub table: &'static str,
    /// Column in `table` referencing the owning entity's primary key
    pub local_key: &'static str,
    /// Column in `table` referencing the target's key
    pub remote_key: &'static str,
    /// The target table (e.g., "genres")
    pub target: &'static str,
    /// Key column on the target table
    pub target_key: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelationKind {
    HasMany {
        table: &'static str,
        foreign_key: &'static str,
    },
    Through(Link),
}

/// A relationship from entity `E` to rows of another table.
///
/// Used to filter `E` by attributes of related rows, e.g. books having any
/// genre named "fantasy".
pub struct Relation<E> {
    name: &'static str,
    kind: RelationKind,
    match_column: &'static str,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Relation<E> {
    /// One-to-many: rows of `table` point back at `E` through `foreign_key`.
    pub const fn has_many(
        name: &'static str,
        table: &'static str,
        foreign_key: &'static str,
        match_column: &'static str,
    ) -> Self {
        Self {
            name,
            kind: RelationKind::HasMany { table, foreign_key },
            match_column,
            _entity: PhantomData,
        }
    }

    /// Many-to-many through an association table.
    pub const fn through(name: &'static str, link: Link, match_column: &'static str) -> Self {
        Self {
            name,
            kind: RelationKind::Through(link),
            match_column,
            _entity: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<E: Entity> Relation<E> {
    /// Match entities with at least one related row whose match column is in `values`.
    pub fn any_in<V: Into<SqlValue>>(self, values: impl IntoIterator<Item = V>) -> Condition {
        let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Condition::raw("0 = 1", Vec::new());
        }
        let marks = placeholders(values.len());
        let subquery = match self.kind {
            RelationKind::HasMany { table, foreign_key } => format!(
                "SELECT {table}.{foreign_key} FROM {table} WHERE {table}.{} IN ({marks})",
                self.match_column
            ),
            RelationKind::Through(link) => format!(
                "SELECT {t}.{local} FROM {t} JOIN {target} ON {target}.{target_key} = {t}.{remote} \
                 WHERE {target}.{col} IN ({marks})",
                t = link.table,
                local = link.local_key,
                remote = link.remote_key,
                target = link.target,
                target_key = link.target_key,
                col = self.match_column,
            ),
        };
        Condition::raw(
            format!("{}.{} IN ({subquery})", E::TABLE_NAME, E::PRIMARY_KEY),
            values,
        )
    }
}

impl<E> Clone for Relation<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Relation<E> {}

impl<E> fmt::Debug for Relation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("match_column", &self.match_column)
            .finish()
    }
}
