#![allow(dead_code)]

use axum::body::Body;
use http_body_util::BodyExt;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use pokerboard::config::Config;
use pokerboard::mail::{MailQueue, RecordingQueue};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
    pub mail: Arc<RecordingQueue>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mail = Arc::new(RecordingQueue::new());
        let (router, db) = Self::build(mail.clone()).await;
        Self { router, db, mail }
    }

    /// App whose mail queue is `queue`; `mail` stays empty.
    pub async fn with_queue(queue: Arc<dyn MailQueue>) -> Self {
        let (router, db) = Self::build(queue).await;
        Self { router, db, mail: Arc::new(RecordingQueue::new()) }
    }

    async fn build(queue: Arc<dyn MailQueue>) -> (Router, SqlitePool) {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("Failed to create in-memory SQLite pool");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let router = pokerboard::build_app(pool.clone(), Config::default(), queue)
            .await
            .expect("Failed to build app");

        (router, pool)
    }

    /// Send a request through the app and return the response.
    pub async fn request(&self, req: Request<Body>) -> Response {
        tower::ServiceExt::oneshot(self.router.clone(), req)
            .await
            .unwrap()
    }

    /// Create a user with [`PASSWORD`] and return its id.
    pub async fn create_user(&self, email: &str) -> String {
        let user = pokerboard::models::User::new(
            email.to_string(),
            "Test".to_string(),
            "User".to_string(),
            pokerboard::password::hash_password(PASSWORD).unwrap(),
        );
        let mut conn = self.db.acquire().await.unwrap();
        pokerboard::db::insert_user(&mut conn, &user)
            .await
            .expect("Failed to create test user");
        user.id
    }

    /// Log in and return the session cookie string.
    pub async fn login(&self, email: &str) -> String {
        let body = serde_json::json!({ "email": email, "password": PASSWORD });
        let resp = self.post_json("/login", &body, None).await;
        assert_eq!(resp.status(), StatusCode::OK);

        resp.headers()
            .get("set-cookie")
            .expect("Login should set a session cookie")
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    /// Create a user, log in, and return (user_id, cookie).
    pub async fn signed_in(&self, email: &str) -> (String, String) {
        let id = self.create_user(email).await;
        let cookie = self.login(email).await;
        (id, cookie)
    }

    /// Send a GET request with an optional session cookie.
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::empty()).unwrap();
        self.request(req).await
    }

    pub async fn post_json(&self, uri: &str, body: &Value, cookie: Option<&str>) -> Response {
        self.send_json("POST", uri, body, cookie).await
    }

    pub async fn patch_json(&self, uri: &str, body: &Value, cookie: Option<&str>) -> Response {
        self.send_json("PATCH", uri, body, cookie).await
    }

    async fn send_json(&self, method: &str, uri: &str, body: &Value, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .uri(uri)
            .method(method)
            .header("content-type", "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        self.request(req).await
    }

    /// Send a DELETE request with an optional session cookie.
    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri).method("DELETE");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::empty()).unwrap();
        self.request(req).await
    }

    /// Create a group owned by the logged-in user and return its id.
    pub async fn create_group(&self, title: &str, cookie: &str) -> String {
        let resp = self
            .post_json("/groups", &serde_json::json!({ "title": title }), Some(cookie))
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp).await["id"].as_str().unwrap().to_string()
    }

    /// Create a pokerboard managed by the logged-in user and return its id.
    pub async fn create_pokerboard(&self, title: &str, cookie: &str) -> String {
        let resp = self
            .post_json("/pokerboards", &serde_json::json!({ "title": title }), Some(cookie))
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp).await["id"].as_str().unwrap().to_string()
    }

    /// Latest token issued for `email`.
    pub async fn token_for(&self, email: &str) -> String {
        let (token,): (String,) = sqlx::query_as(
            "SELECT token_key FROM email_verifications WHERE email = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(email)
        .fetch_one(&self.db)
        .await
        .expect("No token issued");
        token
    }

    pub async fn count(&self, sql: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(sql).fetch_one(&self.db).await.unwrap();
        n
    }
}

/// Read the full response body as a String.
pub async fn body_string(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    serde_json::from_str(&body_string(resp).await).unwrap()
}

/// Assert the response has `status` and a JSON `message` equal to `message`.
pub async fn assert_message(resp: Response, status: StatusCode, message: &str) {
    assert_eq!(resp.status(), status);
    let body = body_json(resp).await;
    assert_eq!(body["message"], message, "unexpected body: {body}");
}
