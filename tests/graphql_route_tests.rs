use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_graphql::{Context, EmptySubscription, Object, Schema, SimpleObject};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use gqlglue::orm::{Link, Relation, Select};
use gqlglue::server::{Claims, SessionOutcome, TokenType};
use gqlglue::{
    ContextExt, GraphqlRoute, ResultExt, SessionFactory, Stmt, TransactionFactory, selected_fields,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Executor as _, Row, Sqlite, SqlitePool, Transaction};
use tower::ServiceExt;

#[derive(Debug, Clone, gqlglue::Entity, sqlx::FromRow, SimpleObject)]
#[entity(table = "books")]
struct Book {
    #[sqlx(default)]
    id: i64,
    #[sqlx(default)]
    title: String,
    #[sqlx(default)]
    year: i64,
}

impl Book {
    const GENRES: Relation<Book> = Relation::through(
        "genres",
        Link {
            table: "book_genres",
            local_key: "book_id",
            remote_key: "genre_id",
            target: "genres",
            target_key: "id",
        },
        "name",
    );
}

type Tx = Transaction<'static, Sqlite>;

struct Query;

#[Object]
impl Query {
    async fn books(
        &self,
        ctx: &Context<'_>,
        min_year: Option<i64>,
        genre: Option<String>,
        first: Option<i64>,
    ) -> async_graphql::Result<Vec<Book>> {
        let stmt = Stmt::new(Select::<Book>::new().columns(selected_fields::<Book>(ctx)))
            .when(min_year, |s, year| s.gte_filter(Book::YEAR, year))
            .when(genre, |s, genre| s.con_model_filter(Book::GENRES, [genre]))
            .ordered_by(Book::YEAR)
            .when(first, Stmt::limit);

        let session = ctx.session::<Tx>()?;
        let mut tx = session.lock().await;
        stmt.into_select().fetch_all(&mut **tx).await.extend_code()
    }

    async fn whoami(&self, ctx: &Context<'_>) -> async_graphql::Result<String> {
        Ok(ctx.auth_user()?.sub.clone())
    }

    async fn broken(&self) -> async_graphql::Result<i64> {
        Err("resolver failed".into())
    }
}

struct Mutation;

#[Object]
impl Mutation {
    async fn add_book(
        &self,
        ctx: &Context<'_>,
        title: String,
        year: i64,
        reject: Option<bool>,
    ) -> async_graphql::Result<i64> {
        let session = ctx.session::<Tx>()?;
        let mut tx = session.lock().await;
        let id = sqlx::query("INSERT INTO books (title, year) VALUES (?, ?)")
            .bind(&title)
            .bind(year)
            .execute(&mut **tx)
            .await?
            .last_insert_rowid();

        if reject.unwrap_or(false) {
            return Err("book rejected".into());
        }
        Ok(id)
    }
}

type BookSchema = Schema<Query, Mutation, EmptySubscription>;

fn schema() -> BookSchema {
    Schema::new(Query, Mutation, EmptySubscription)
}

async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    pool.execute(
        "CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT NOT NULL, year INTEGER NOT NULL);
         CREATE TABLE genres (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE book_genres (book_id INTEGER NOT NULL, genre_id INTEGER NOT NULL);
         INSERT INTO books (id, title, year) VALUES
             (1, 'Dune', 1965), (2, 'Neuromancer', 1984), (3, 'Hyperion', 1989), (4, 'Emma', 1815);
         INSERT INTO genres (id, name) VALUES (1, 'scifi'), (2, 'romance');
         INSERT INTO book_genres (book_id, genre_id) VALUES (1, 1), (2, 1), (3, 1), (4, 2);",
    )
    .await
    .unwrap();
    pool
}

fn app(pool: &SqlitePool) -> Router {
    GraphqlRoute::new(schema(), TransactionFactory::new(pool.clone())).into_router()
}

async fn post(app: Router, body: Value, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/graphql")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = app
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn book_count(pool: &SqlitePool) -> i64 {
    sqlx::query("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await
        .unwrap()
        .try_get(0)
        .unwrap()
}

#[tokio::test]
async fn test_filters_and_selected_columns() {
    let pool = pool().await;
    let (status, body) = post(
        app(&pool),
        json!({ "query": "{ books(minYear: 1900, first: 2) { title } }" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["books"],
        json!([{ "title": "Dune" }, { "title": "Neuromancer" }])
    );
}

#[tokio::test]
async fn test_relationship_filter() {
    let pool = pool().await;
    let (_, body) = post(
        app(&pool),
        json!({ "query": "{ books(genre: \"romance\") { id title year } }" }),
        None,
    )
    .await;

    assert_eq!(
        body["data"]["books"],
        json!([{ "id": 4, "title": "Emma", "year": 1815 }])
    );
}

#[tokio::test]
async fn test_mutation_commits() {
    let pool = pool().await;
    let (status, body) = post(
        app(&pool),
        json!({ "query": "mutation { addBook(title: \"Solaris\", year: 1961) }" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["addBook"], 5);
    assert_eq!(book_count(&pool).await, 5);
}

#[tokio::test]
async fn test_failed_mutation_rolls_back() {
    let pool = pool().await;
    let (status, body) = post(
        app(&pool),
        json!({ "query": "mutation { addBook(title: \"Solaris\", year: 1961, reject: true) }" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["errors"][0]["message"], "book rejected");
    assert_eq!(book_count(&pool).await, 4);
}

/// Session double that records how often it was handed out and returned.
#[derive(Default)]
struct RecordingFactory {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

#[async_trait::async_trait]
impl SessionFactory for RecordingFactory {
    type Session = ();

    async fn acquire(&self) -> gqlglue::Result<()> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self, _session: (), _outcome: SessionOutcome) -> gqlglue::Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_resolver_error_still_releases_session() {
    let recorder = Arc::new(RecordingFactory::default());
    let app: Router = GraphqlRoute::new(schema(), Arc::clone(&recorder)).into_router();

    let (status, body) = post(app, json!({ "query": "{ broken }" }), None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body["errors"].as_array().unwrap().is_empty());
    assert_eq!(recorder.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let pool = pool().await;
    let response = app(&pool)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/graphql")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_graphiql_on_get() {
    let pool = pool().await;

    let response = app(&pool)
        .oneshot(
            Request::builder()
                .uri("/graphql")
                .header(header::ACCEPT, "text/html")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("graphiql"));

    let response = app(&pool)
        .oneshot(Request::builder().uri("/graphql").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_bearer_token_reaches_resolvers() {
    use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};

    let pool = pool().await;
    let config = gqlglue::config::GraphqlConfig {
        jwt_secret: Some("route-secret".to_string()),
        ..Default::default()
    };
    let app: Router = GraphqlRoute::new(schema(), TransactionFactory::new(pool.clone()))
        .with_config(config)
        .into_router();

    let now = get_current_timestamp();
    let claims = Claims {
        sub: "reader-1".to_string(),
        role: None,
        token_type: TokenType::Client,
        exp: now + 600,
        iat: now,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"route-secret"),
    )
    .unwrap();

    let (_, body) = post(app.clone(), json!({ "query": "{ whoami }" }), Some(&token)).await;
    assert_eq!(body["data"]["whoami"], "reader-1");

    let (status, body) = post(app, json!({ "query": "{ whoami }" }), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_database_error_code_in_response() {
    let pool = pool().await;
    pool.execute("DROP TABLE books").await.unwrap();

    let (status, body) = post(app(&pool), json!({ "query": "{ books { title } }" }), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["errors"][0]["extensions"]["code"], "DATABASE_ERROR");
}
