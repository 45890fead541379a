//! The GraphQL HTTP route
//!
//! [`GraphqlRoute`] pairs an executor with a [`SessionFactory`]. Every request
//! gets its own session, which is handed back to the factory once the response
//! is built, whether execution succeeded, returned errors or panicked.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql::{ErrorExtensions, Executor, Pos, Response, ServerError};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::Router;
use axum::extract::State;
use axum::http::header::ACCEPT;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::post;
use futures::FutureExt;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use super::auth::{Identity, TokenVerifier};
use super::context::GraphqlContext;
use super::session::{SessionFactory, SessionOutcome};
use crate::config::GraphqlConfig;

/// A GraphQL endpoint backed by per-request sessions.
pub struct GraphqlRoute<E, F> {
    executor: E,
    factory: Arc<F>,
    config: Arc<GraphqlConfig>,
    verifier: Option<TokenVerifier>,
}

impl<E, F> Clone for GraphqlRoute<E, F>
where
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            factory: Arc::clone(&self.factory),
            config: Arc::clone(&self.config),
            verifier: self.verifier.clone(),
        }
    }
}

impl<E, F> GraphqlRoute<E, F>
where
    E: Executor,
    F: SessionFactory,
{
    pub fn new(executor: E, factory: F) -> Self {
        Self {
            executor,
            factory: Arc::new(factory),
            config: Arc::new(GraphqlConfig::default()),
            verifier: None,
        }
    }

    /// Use `config` for the mount path, the playground and token verification.
    pub fn with_config(mut self, config: GraphqlConfig) -> Self {
        self.verifier = config.jwt_secret.as_deref().map(TokenVerifier::new);
        self.config = Arc::new(config);
        self
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Execute one request inside a fresh session.
    ///
    /// Errors never escape as `Err`: failing to acquire a session, resolver
    /// errors and panics all end up in the response's `errors`. So does a
    /// session that a resolver kept hold of, which is dropped instead of
    /// released.
    pub async fn execute(&self, headers: HeaderMap, request: async_graphql::Request) -> Response {
        let session = match self.factory.acquire().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Failed to acquire session");
                return Response::from_errors(vec![e.extend().into_server_error(Pos::default())]);
            }
        };
        let session = Arc::new(Mutex::new(session));

        let identity = Identity::from_headers(&headers, self.verifier.as_ref());
        if identity == Identity::default() {
            tracing::trace!("No verified identity on request");
        }
        let context = GraphqlContext::new(headers, Arc::clone(&session), identity.clone());
        let request = request.data(context).data(identity);

        let mut response = match AssertUnwindSafe(self.executor.execute(request))
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(panic = %message, "Resolver panicked");
                Response::from_errors(vec![ServerError::new(
                    format!("Internal error: {message}"),
                    None,
                )])
            }
        };

        let outcome = SessionOutcome::from_response(&response);
        match Arc::try_unwrap(session) {
            Ok(session) => {
                if let Err(e) = self.factory.release(session.into_inner(), outcome).await {
                    tracing::error!(error = %e, ?outcome, "Failed to release session");
                    response
                        .errors
                        .push(e.extend().into_server_error(Pos::default()));
                }
            }
            Err(_) => {
                // the factory never sees the session; a transaction rolls back on drop
                tracing::warn!(?outcome, "Session still referenced after execution, dropping without release");
                response.errors.push(ServerError::new(
                    "Session still in use after execution; it was dropped without release",
                    None,
                ));
            }
        }

        tracing::debug!(?outcome, errors = response.errors.len(), "GraphQL request finished");
        response
    }

    /// A router serving POST and GET on the configured path.
    pub fn into_router<S>(self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let path = self.config.path.clone();
        tracing::info!(path = %path, playground = self.config.playground, "Mounting GraphQL route");

        Router::new()
            .route(
                &path,
                post(graphql_handler::<E, F>).get(graphiql::<E, F>),
            )
            .with_state(self)
            .layer(TraceLayer::new_for_http())
    }
}

async fn graphql_handler<E, F>(
    State(route): State<GraphqlRoute<E, F>>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse
where
    E: Executor,
    F: SessionFactory,
{
    route.execute(headers, req.into_inner()).await.into()
}

async fn graphiql<E, F>(
    State(route): State<GraphqlRoute<E, F>>,
    headers: HeaderMap,
) -> axum::response::Response
where
    E: Executor,
    F: SessionFactory,
{
    let accepts_html = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if route.config.playground && accepts_html {
        Html(GraphiQLSource::build().endpoint(route.path()).finish()).into_response()
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
