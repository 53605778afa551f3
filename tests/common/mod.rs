#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use taskboard::config::Config;
use taskboard::mailer::MemoryMailer;
use taskboard::{build_router, AppState};

pub const ADMIN_EMAIL: &str = "boss@example.com";
pub const PASSWORD: &str = "hunter2hunter2";

pub struct TestApp {
    _dir: TempDir,
    app: Router,
    pub mailer: MemoryMailer,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config = Config::for_database(dir.path().join("taskboard.db"));
        config.admin_email = Some(ADMIN_EMAIL.to_string());
        adjust(&mut config);

        let mailer = MemoryMailer::new();
        let state = AppState::new(config, Arc::new(mailer.clone()));
        Self {
            _dir: dir,
            app: build_router(state),
            mailer,
        }
    }

    /// Calls `/api/<procedure>` with a JSON body and returns status plus parsed body.
    pub async fn call(&self, procedure: &str, token: Option<&str>, input: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/{procedure}"))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(input.to_string())).unwrap();
        self.send(request).await
    }

    pub async fn query(&self, procedure: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(format!("/api/{procedure}"));
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// GETs a page with an optional session cookie; returns status and `Location`.
    pub async fn page(&self, path: &str, token: Option<&str>) -> (StatusCode, Option<String>) {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("session={token}"));
        }
        let response = self
            .app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        (response.status(), location)
    }

    /// Signs up and logs in; returns `(user id, session token)`.
    pub async fn register(&self, email: &str) -> (i64, String) {
        let (status, body) = self
            .call("auth.signup", None, json!({ "email": email, "password": PASSWORD, "name": "Test" }))
            .await;
        assert_eq!(status, StatusCode::OK, "signup failed: {body}");
        let id = body["user"]["id"].as_i64().unwrap();
        (id, self.login(email, PASSWORD).await)
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .call("auth.login", None, json!({ "email": email, "password": password }))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn create_todo(&self, token: &str, title: &str) -> Value {
        let (status, body) = self.call("todo.create", Some(token), json!({ "title": title })).await;
        assert_eq!(status, StatusCode::OK, "create failed: {body}");
        body
    }

    pub async fn grant(&self, admin_token: &str, user_id: i64, role: &str, permissions: &[&str]) -> (StatusCode, Value) {
        self.call(
            "admin.updateUserRole",
            Some(admin_token),
            json!({ "userId": user_id, "role": role, "permissions": permissions }),
        )
        .await
    }
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
