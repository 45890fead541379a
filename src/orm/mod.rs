//! ORM query layer
//!
//! The SQL side of the crate: entity metadata, typed columns, bind values and
//! a parameterized [`Select`] builder executed through sqlx (SQLite).
//!
//! ```rust,ignore
//! use gqlglue::orm::{Entity, OrderDirection, Select};
//!
//! #[derive(gqlglue::Entity, sqlx::FromRow)]
//! #[entity(table = "users")]
//! struct User {
//!     id: i64,
//!     name: String,
//!     age: i64,
//! }
//!
//! let adults = Select::<User>::new()
//!     .filter(User::AGE.gte(18))
//!     .order_by(User::NAME, OrderDirection::Asc)
//!     .fetch_all(&pool)
//!     .await?;
//! ```
//!
//! Narrowing the projection with [`Select::columns`] only decodes into entities
//! whose left-out fields are `#[sqlx(default)]`.

mod builder;
mod condition;
mod traits;

pub use builder::*;
pub use condition::*;
pub use traits::*;
