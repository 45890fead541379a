//! gqlglue: glue for serving GraphQL from a microservice
//!
//! - [`Stmt`]: a chainable query filter that records every operation it applies
//! - [`selection`]: maps the fields a client requested to entity columns
//! - [`server`]: an axum route that runs each GraphQL request inside its own
//!   database session
//!
//! The SQL side lives in [`orm`]; entities describe their table with
//! `#[derive(Entity)]`.

// The derive emits `::gqlglue::...` paths, which must also resolve in this crate.
extern crate self as gqlglue;

pub mod config;
pub mod error;
pub mod logging;
pub mod orm;
pub mod selection;
pub mod server;
pub mod stmt;

pub use error::{Error, Result, ResultExt};
pub use gqlglue_macros::Entity;
pub use orm::{Column, Condition, OrderDirection, Relation, Select, SqlValue};
pub use selection::{requested_fields, selected_columns, selected_fields};
pub use server::{ContextExt, GraphqlRoute, ResolverMap, SessionFactory, TransactionFactory};
pub use stmt::Stmt;
