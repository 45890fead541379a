//! Per-request database sessions
//!
//! A [`SessionFactory`] hands out one session per GraphQL request and gets it
//! back once the response is built, together with whether the request
//! succeeded.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::Result;

/// How the request that used a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Success,
    /// The response carried at least one error, or execution panicked
    Failed,
}

impl SessionOutcome {
    pub fn from_response(response: &async_graphql::Response) -> Self {
        if response.errors.is_empty() {
            SessionOutcome::Success
        } else {
            SessionOutcome::Failed
        }
    }
}

/// Produces and releases scoped sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Session: Send + 'static;

    async fn acquire(&self) -> Result<Self::Session>;

    /// End a session. The default drops it.
    async fn release(&self, session: Self::Session, _outcome: SessionOutcome) -> Result<()> {
        drop(session);
        Ok(())
    }
}

#[async_trait]
impl<T: SessionFactory> SessionFactory for Arc<T> {
    type Session = T::Session;

    async fn acquire(&self) -> Result<Self::Session> {
        T::acquire(self).await
    }

    async fn release(&self, session: Self::Session, outcome: SessionOutcome) -> Result<()> {
        T::release(self, session, outcome).await
    }
}

/// A pooled connection per request, returned to the pool on release.
#[async_trait]
impl SessionFactory for SqlitePool {
    type Session = PoolConnection<Sqlite>;

    async fn acquire(&self) -> Result<Self::Session> {
        Ok(sqlx::Pool::acquire(self).await?)
    }
}

/// A transaction per request: committed when the response has no errors,
/// rolled back otherwise.
///
/// A transaction that never comes back to [`SessionFactory::release`], because
/// a resolver still holds it when the request ends, is rolled back when
/// dropped. The route reports that as a response error.
#[derive(Debug, Clone)]
pub struct TransactionFactory {
    pool: SqlitePool,
}

impl TransactionFactory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SessionFactory for TransactionFactory {
    type Session = Transaction<'static, Sqlite>;

    async fn acquire(&self) -> Result<Self::Session> {
        Ok(self.pool.begin().await?)
    }

    async fn release(&self, session: Self::Session, outcome: SessionOutcome) -> Result<()> {
        match outcome {
            SessionOutcome::Success => session.commit().await?,
            SessionOutcome::Failed => {
                tracing::debug!("Rolling back request transaction");
                session.rollback().await?
            }
        }
        Ok(())
    }
}

/// Factory backed by a zero-argument async closure. See [`from_fn`].
#[derive(Clone)]
pub struct FnSessionFactory<F> {
    f: F,
}

/// Build a [`SessionFactory`] from a closure returning a session future.
///
/// Sessions made this way are dropped on release.
pub fn from_fn<F, Fut, S>(f: F) -> FnSessionFactory<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S>> + Send,
    S: Send + 'static,
{
    FnSessionFactory { f }
}

#[async_trait]
impl<F, Fut, S> SessionFactory for FnSessionFactory<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S>> + Send,
    S: Send + 'static,
{
    type Session = S;

    async fn acquire(&self) -> Result<S> {
        (self.f)().await
    }
}

impl<F> std::fmt::Debug for FnSessionFactory<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSessionFactory").finish_non_exhaustive()
    }
}
