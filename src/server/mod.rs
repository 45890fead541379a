//! axum adapter for GraphQL executors
//!
//! [`GraphqlRoute`] turns any [`async_graphql::Executor`] (a static schema or a
//! dynamic one built with [`ResolverMap`]) plus a [`SessionFactory`] into an
//! axum router. Resolvers reach the request's session and verified claims
//! through [`ContextExt`].

mod auth;
mod context;
mod resolvers;
mod route;
mod session;

pub use auth::{Claims, Identity, TokenType, TokenVerifier, extract_token};
pub use context::{ContextExt, GraphqlContext, SessionHandle};
pub use resolvers::{MUTATION, QUERY, ResolverMap};
pub use route::GraphqlRoute;
pub use session::{FnSessionFactory, SessionFactory, SessionOutcome, TransactionFactory, from_fn};
