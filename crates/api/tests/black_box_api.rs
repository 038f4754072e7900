use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use warden_api::app::{build_app, services};
use warden_auth::{Argon2Hasher, AuthConfig, Role, UserStore};
use warden_infra::InMemoryAuthStore;

const JWT_SECRET: &str = "black-box-test-secret-0123456789abcdef";

struct TestServer {
    base_url: String,
    store: Arc<InMemoryAuthStore>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, bound to an ephemeral port.
        let config = Arc::new(AuthConfig::with_secret(JWT_SECRET));
        let (state, store) = services::in_memory(config, Arc::new(Argon2Hasher::fast()))
            .await
            .expect("failed to wire services");
        let app = build_app(state, &[]);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.unwrap()
    }

    async fn signup(&self, email: &str) -> Value {
        let res = self
            .post(
                "/api/auth/signup",
                json!({ "email": email, "password": "correct horse", "name": "Test User" }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json().await.unwrap()
    }

    async fn grant(&self, email: &str, role: Role) {
        let mut user = self.store.find_user_by_email(email).await.unwrap().unwrap();
        user.roles.insert(role);
        self.store.save_user(user).await.unwrap();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, claims: Value) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn access_token(body: &Value) -> String {
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.get("/health", None).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn signup_returns_bearer_token_pair() {
    let srv = TestServer::spawn().await;
    let body = srv.signup("alice@example.com").await;

    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 86_400_000);
    assert_eq!(body["access_token"].as_str().unwrap().split('.').count(), 3);
    assert_eq!(body["refresh_token"].as_str().unwrap().len(), 43);
}

#[tokio::test]
async fn duplicate_signup_is_conflict_with_error_envelope() {
    let srv = TestServer::spawn().await;
    srv.signup("bob@example.com").await;

    let res = srv
        .post(
            "/api/auth/signup",
            json!({ "email": "bob@example.com", "password": "correct horse", "name": "Bob" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let request_id = res
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(body["path"], "/api/auth/signup");
    assert!(body["timestamp"].is_string());
    assert_eq!(body["request_id"].as_str().map(str::to_string), request_id);
}

#[tokio::test]
async fn invalid_signup_reports_every_field() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post("/api/auth/signup", json!({ "email": "nope", "password": "short" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
    assert!(fields.contains(&"name"));
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .post(srv.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn login_failure_is_generic() {
    let srv = TestServer::spawn().await;
    srv.signup("carol@example.com").await;

    for (email, password) in [
        ("carol@example.com", "wrong password"),
        ("nobody@example.com", "correct horse"),
    ] {
        let res = srv
            .post("/api/auth/login", json!({ "email": email, "password": password }))
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["message"], "Invalid email or password");
    }
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let srv = TestServer::spawn().await;
    let body = srv.signup("dave@example.com").await;

    let res = srv.get("/api/auth/me", None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.get("/api/auth/me", Some("not.a.token")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.get("/api/auth/me", Some(&access_token(&body))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["email"], "dave@example.com");
    assert_eq!(me["name"], "Test User");
    assert_eq!(me["enabled"], true);
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let srv = TestServer::spawn().await;
    let now = Utc::now();
    let forged = mint_jwt(
        "some-other-secret-0123456789abcdef0123",
        json!({
            "sub": "mallory@example.com",
            "roles": ["ROLE_ADMIN"],
            "scopes": ["users:read:any"],
            "iat": now.timestamp(),
            "exp": (now + ChronoDuration::minutes(10)).timestamp(),
        }),
    );

    let res = srv.get("/api/admin/roles", Some(&forged)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_access_token_is_reported_distinctly() {
    let srv = TestServer::spawn().await;
    let issued = Utc::now() - ChronoDuration::hours(2);
    let expired = mint_jwt(
        JWT_SECRET,
        json!({
            "sub": "henry@example.com",
            "roles": ["ROLE_USER"],
            "scopes": ["tickets:read:own"],
            "iat": issued.timestamp(),
            "exp": (issued + ChronoDuration::hours(1)).timestamp(),
        }),
    );

    let res = srv.get("/api/auth/me", Some(&expired)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "TOKEN_EXPIRED");
    assert_eq!(body["message"], "Access token has expired");

    let res = srv.get("/api/auth/me", Some("not.a.token")).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["message"], "Invalid access token");
}

#[tokio::test]
async fn refresh_flow_and_supersession() {
    let srv = TestServer::spawn().await;
    let first = srv.signup("erin@example.com").await;
    let first_refresh = first["refresh_token"].as_str().unwrap().to_string();

    let res = srv
        .post("/api/auth/refresh", json!({ "refresh_token": first_refresh }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let refreshed: Value = res.json().await.unwrap();
    assert_eq!(refreshed["refresh_token"], first_refresh.as_str());

    let res = srv
        .post(
            "/api/auth/login",
            json!({ "email": "erin@example.com", "password": "correct horse" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .post("/api/auth/refresh", json!({ "refresh_token": first_refresh }))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.post("/api/auth/refresh", json!({ "refresh_token": "  " })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_roles_requires_admin_role() {
    let srv = TestServer::spawn().await;
    let body = srv.signup("frank@example.com").await;

    let res = srv.get("/api/admin/roles", None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.get("/api/admin/roles", Some(&access_token(&body))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["code"], "FORBIDDEN");

    srv.grant("frank@example.com", Role::ADMIN).await;
    let res = srv
        .post(
            "/api/auth/login",
            json!({ "email": "frank@example.com", "password": "correct horse" }),
        )
        .await;
    let admin: Value = res.json().await.unwrap();

    let res = srv.get("/api/admin/roles", Some(&access_token(&admin))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let roles: Value = res.json().await.unwrap();
    let listed = roles["roles"].as_array().unwrap();
    assert_eq!(listed.len(), 3);
    let admin_entry = listed.iter().find(|r| r["role"] == "ROLE_ADMIN").unwrap();
    assert_eq!(admin_entry["scopes"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn scope_policy_distinguishes_legacy_tokens() {
    let srv = TestServer::spawn().await;
    let now = Utc::now();
    let legacy = mint_jwt(
        JWT_SECRET,
        json!({
            "sub": "legacy@example.com",
            "iat": now.timestamp(),
            "exp": (now + ChronoDuration::minutes(10)).timestamp(),
        }),
    );

    let res = srv.get("/api/admin/scopes", Some(&legacy)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "No scopes found in token");

    let user = srv.signup("gina@example.com").await;
    let res = srv.get("/api/admin/scopes", Some(&access_token(&user))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Insufficient permissions");

    srv.grant("gina@example.com", Role::ADMIN).await;
    let res = srv
        .post(
            "/api/auth/refresh",
            json!({ "refresh_token": user["refresh_token"] }),
        )
        .await;
    let refreshed: Value = res.json().await.unwrap();

    let res = srv.get("/api/admin/scopes", Some(&access_token(&refreshed))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["subject"], "gina@example.com");
    assert!(body["scopes"].as_array().unwrap().iter().any(|s| s == "users:read:any"));
}
