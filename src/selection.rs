//! Selected-field mapping
//!
//! Resolves the fields a GraphQL client asked for to the columns of an
//! entity, so a resolver can fetch only what is needed:
//!
//! ```rust,ignore
//! // Fields outside the narrowed projection must decode to a default.
//! #[derive(gqlglue::Entity, sqlx::FromRow, SimpleObject)]
//! struct User {
//!     #[sqlx(default)]
//!     id: i64,
//!     #[sqlx(default)]
//!     name: String,
//! }
//!
//! async fn users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
//!     let columns = selected_fields::<User>(ctx);
//!     let select = Select::<User>::new().columns(columns);
//!     // ...
//! }
//! ```
//!
//! Requested names that do not exist on the entity are dropped without error,
//! so "not a column" and "not requested" look the same to the caller.

use std::collections::HashSet;

use async_graphql::context::SelectionField;

use crate::orm::{Column, Entity};

/// Map requested field names to entity columns, in entity declaration order.
///
/// A name matches a column by its GraphQL field name or its SQL column name.
pub fn selected_columns<E, S>(names: impl IntoIterator<Item = S>) -> Vec<Column<E>>
where
    E: Entity,
    S: AsRef<str>,
{
    let requested: HashSet<String> = names
        .into_iter()
        .map(|name| name.as_ref().to_owned())
        .collect();

    E::COLUMNS
        .iter()
        .filter(|c| requested.contains(c.field) || requested.contains(c.name))
        .map(|c| Column::new(c.name, c.field))
        .collect()
}

/// Names of every field requested below the current field, nested ones included.
///
/// Fragment spreads and inline fragments are flattened by async-graphql, so
/// their fields show up here as well. Each name appears once, in first-seen order.
pub fn requested_fields(ctx: &async_graphql::Context<'_>) -> Vec<String> {
    let mut names = Vec::new();
    collect_names(ctx.field(), &mut names);
    names
}

fn collect_names(field: SelectionField<'_>, names: &mut Vec<String>) {
    for child in field.selection_set() {
        let name = child.name();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_owned());
        }
        collect_names(child, names);
    }
}

/// Columns of `E` requested below the current field.
pub fn selected_fields<E: Entity>(ctx: &async_graphql::Context<'_>) -> Vec<Column<E>> {
    let columns = selected_columns::<E, _>(requested_fields(ctx));
    tracing::trace!(
        table = E::TABLE_NAME,
        columns = ?columns.iter().map(|c| c.name()).collect::<Vec<_>>(),
        "Resolved selected columns"
    );
    columns
}
