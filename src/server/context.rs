//! Per-request context available to resolvers

use std::sync::Arc;

use async_graphql::{Context, ErrorExtensions};
use axum::http::HeaderMap;
use tokio::sync::Mutex;

use super::auth::{Claims, Identity};

/// Shared handle to the request's session. Resolvers lock it for the duration
/// of a query; the guard may be held across `.await`.
pub type SessionHandle<S> = Arc<Mutex<S>>;

/// Data attached to every request executed by a
/// [`GraphqlRoute`](super::GraphqlRoute).
pub struct GraphqlContext<S> {
    pub headers: HeaderMap,
    pub session: SessionHandle<S>,
    /// Claims from a verified service token
    pub service: Option<Claims>,
    /// Claims from a verified client token
    pub user: Option<Claims>,
}

impl<S> GraphqlContext<S> {
    pub fn new(headers: HeaderMap, session: SessionHandle<S>, identity: Identity) -> Self {
        Self {
            headers,
            session,
            service: identity.service,
            user: identity.user,
        }
    }
}

impl<S> std::fmt::Debug for GraphqlContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlContext")
            .field("headers", &self.headers)
            .field("service", &self.service)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

fn unauthorized() -> async_graphql::Error {
    async_graphql::Error::new("Authentication required")
        .extend_with(|_, e| e.set("code", "UNAUTHORIZED"))
}

/// Accessors for the request context from inside a resolver.
pub trait ContextExt {
    /// The request context. Errors when the session type does not match the
    /// route's factory.
    fn graphql_context<S: Send + 'static>(&self) -> async_graphql::Result<&GraphqlContext<S>>;

    /// The request's session handle
    fn session<S: Send + 'static>(&self) -> async_graphql::Result<SessionHandle<S>> {
        self.graphql_context::<S>()
            .map(|context| Arc::clone(&context.session))
    }

    /// The verified client, or an `UNAUTHORIZED` error
    fn auth_user(&self) -> async_graphql::Result<&Claims>;

    fn try_auth_user(&self) -> Option<&Claims>;

    /// The verified calling service, or an `UNAUTHORIZED` error
    fn auth_service(&self) -> async_graphql::Result<&Claims>;
}

impl<'a> ContextExt for Context<'a> {
    fn graphql_context<S: Send + 'static>(&self) -> async_graphql::Result<&GraphqlContext<S>> {
        self.data_opt::<GraphqlContext<S>>().ok_or_else(|| {
            async_graphql::Error::new("Request context not available")
                .extend_with(|_, e| e.set("code", "INTERNAL_ERROR"))
        })
    }

    fn auth_user(&self) -> async_graphql::Result<&Claims> {
        self.try_auth_user().ok_or_else(unauthorized)
    }

    fn try_auth_user(&self) -> Option<&Claims> {
        self.data_opt::<Identity>()
            .and_then(|identity| identity.user.as_ref())
    }

    fn auth_service(&self) -> async_graphql::Result<&Claims> {
        self.data_opt::<Identity>()
            .and_then(|identity| identity.service.as_ref())
            .ok_or_else(unauthorized)
    }
}
