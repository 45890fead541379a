//! Error types for gqlglue.
//!
//! Query and session failures keep the underlying [`sqlx::Error`] intact so
//! callers see the engine's own error.
//!
//! A bare `?` in a resolver turns [`Error`] into an `async_graphql::Error` that
//! keeps only the message. Call [`ResultExt::extend_code`] (or
//! [`ErrorExtensions::extend`] on the error) first to carry the code in
//! `extensions.code`:
//!
//! ```rust,ignore
//! let users = select.fetch_all(&mut **conn).await.extend_code()?;
//! ```

use async_graphql::ErrorExtensions;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Query execution or session handling failed in the database driver.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A dynamic schema could not be built from the registered resolvers.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A bearer token failed verification.
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Machine-readable code placed in the GraphQL error extensions.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "DATABASE_ERROR",
            Error::Schema(_) => "SCHEMA_ERROR",
            Error::Token(_) => "UNAUTHORIZED",
            Error::Config(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<async_graphql::dynamic::SchemaError> for Error {
    fn from(err: async_graphql::dynamic::SchemaError) -> Self {
        Error::Schema(err.to_string())
    }
}

impl ErrorExtensions for Error {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Attach [`Error::code`] to errors on their way into a GraphQL response.
pub trait ResultExt<T> {
    fn extend_code(self) -> async_graphql::Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn extend_code(self) -> async_graphql::Result<T> {
        self.map_err(|err| err.into().extend())
    }
}
