//! A small users service.
//!
//! ```text
//! cargo run --example users
//! curl -s localhost:8000/graphql -H 'content-type: application/json' \
//!     -d '{"query":"{ users(minAge: 18, first: 10) { name age } }"}'
//! ```

use async_graphql::Value;
use async_graphql::dynamic::{FieldFuture, FieldValue, InputValue, ResolverContext, Schema, TypeRef};
use gqlglue::config::Config;
use gqlglue::orm::{Entity as _, Select};
use gqlglue::stmt::DEFAULT_LOG_PREFIX;
use gqlglue::{ContextExt, Entity, GraphqlRoute, ResolverMap, ResultExt, Stmt, selected_fields};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqlitePool};
use tracing::info;

#[derive(Debug, Clone, Entity, sqlx::FromRow)]
#[entity(table = "users")]
struct User {
    #[sqlx(default)]
    id: i64,
    #[sqlx(default)]
    name: String,
    #[sqlx(default)]
    age: i64,
}

fn user_attr<'a>(ctx: ResolverContext<'a>, get: fn(&User) -> Value) -> FieldFuture<'a> {
    FieldFuture::new(async move {
        let user = ctx.parent_value.try_downcast_ref::<User>()?;
        Ok(Some(FieldValue::value(get(user))))
    })
}

fn schema() -> gqlglue::Result<Schema> {
    ResolverMap::new()
        .resolve_with_args(
            "Query.users",
            TypeRef::named_nn_list_nn("User"),
            [
                InputValue::new("minAge", TypeRef::named(TypeRef::INT)),
                InputValue::new("first", TypeRef::named(TypeRef::INT)),
            ],
            |ctx| {
                FieldFuture::new(async move {
                    let min_age = ctx.args.get("minAge").map(|v| v.i64()).transpose()?;
                    let first = ctx.args.get("first").map(|v| v.i64()).transpose()?;

                    let stmt = Stmt::new(Select::<User>::new().columns(selected_fields::<User>(ctx.ctx)))
                        .when(min_age, |s, age| s.gte_filter(User::AGE, age))
                        .ordered_by(User::NAME)
                        .when(first, Stmt::limit);
                    tracing::debug!("users query\n{}", stmt.log(DEFAULT_LOG_PREFIX));

                    let session = ctx.ctx.session::<PoolConnection<Sqlite>>()?;
                    let mut conn = session.lock().await;
                    let users = stmt.into_select().fetch_all(&mut **conn).await.extend_code()?;
                    Ok(Some(FieldValue::list(users.into_iter().map(FieldValue::owned_any))))
                })
            },
        )
        .resolve("User.id", TypeRef::named_nn(TypeRef::INT), |ctx| {
            user_attr(ctx, |u| u.id.into())
        })
        .resolve("User.name", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            user_attr(ctx, |u| u.name.clone().into())
        })
        .resolve("User.age", TypeRef::named_nn(TypeRef::INT), |ctx| {
            user_attr(ctx, |u| u.age.into())
        })
        .into_schema()
}

async fn seed(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER NOT NULL)",
    )
    .execute(pool)
    .await?;

    let count: i64 = sqlx::query("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?
        .try_get(0)?;
    if count == 0 {
        sqlx::query("INSERT INTO users (name, age) VALUES ('ada', 36), ('linus', 21), ('grace', 85), ('tim', 12)")
            .execute(pool)
            .await?;
        info!("Seeded {} table", User::TABLE_NAME);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    gqlglue::logging::init(&config.log)?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(&config.database_url)
        .await?;
    seed(&pool).await?;

    let app: axum::Router = GraphqlRoute::new(schema()?, pool)
        .with_config(config.graphql.clone())
        .into_router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
    info!(
        "GraphQL endpoint at http://{}{}",
        listener.local_addr()?,
        config.graphql.path
    );
    axum::serve(listener, app).await?;
    Ok(())
}
