mod common;

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;

use common::{error_code, TestApp, ADMIN_EMAIL, PASSWORD};

#[tokio::test]
async fn signup_validates_and_rejects_duplicates() {
    let app = TestApp::new();

    let (status, body) = app
        .call("auth.signup", None, json!({ "email": "Ann@Example.com", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "User created successfully");
    assert_eq!(body["user"]["email"], "ann@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["permissions"], json!([]));
    assert!(body["user"].get("passwordHash").is_none());

    let (status, body) = app
        .call("auth.signup", None, json!({ "email": "ann@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");

    let (status, _) = app
        .call("auth.signup", None, json!({ "email": "bob@example.com", "password": "short" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call("auth.signup", None, json!({ "email": "not-an-email", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bootstrap_email_becomes_admin() {
    let app = TestApp::new();
    let (_, token) = app.register(ADMIN_EMAIL).await;

    let (status, me) = app.query("auth.me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "admin");
    assert_eq!(me["email"], ADMIN_EMAIL);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = TestApp::new();
    app.register("ann@example.com").await;

    for (email, password) in [("ann@example.com", "wrong-password"), ("nobody@example.com", PASSWORD)] {
        let (status, body) = app
            .call("auth.login", None, json!({ "email": email, "password": password }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn password_reset_flow() {
    let app = TestApp::new();
    app.register("ann@example.com").await;

    let (status, body) = app
        .call("auth.forgotpassword", None, json!({ "email": "nobody@example.com" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let (status, _) = app
        .call("auth.forgotpassword", None, json!({ "email": "ann@example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    let (to, link) = &sent[0];
    assert_eq!(to, "ann@example.com");
    let token = link
        .split("token=")
        .nth(1)
        .expect("link carries a token")
        .to_string();

    let (status, _) = app
        .call("auth.resetpassword", None, json!({ "token": token, "newPassword": "short" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call("auth.resetpassword", None, json!({ "token": token, "newPassword": "brand-new-pass" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .call("auth.resetpassword", None, json!({ "token": token, "newPassword": "another-pass" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.login("ann@example.com", "brand-new-pass").await;
    let (status, _) = app
        .call("auth.login", None, json!({ "email": "ann@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_reset_tokens_are_refused() {
    let app = TestApp::with_config(|config| config.reset_token_ttl = Duration::minutes(-1));
    app.register("ann@example.com").await;

    app.call("auth.forgotpassword", None, json!({ "email": "ann@example.com" }))
        .await;
    let (_, link) = app.mailer.sent().pop().unwrap();
    let token = link.split("token=").nth(1).unwrap().to_string();

    let (status, body) = app
        .call("auth.resetpassword", None, json!({ "token": token, "newPassword": "brand-new-pass" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid or expired token");
}

#[tokio::test]
async fn malformed_bodies_use_the_error_format() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/auth.signup")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");
}
