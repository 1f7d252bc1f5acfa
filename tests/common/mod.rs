//! Shared helpers for the oneshot integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use taskgate::{
    ServerConfig,
    auth::CookieConfig,
    create_app,
    db::Database,
    jwt::{JwtConfig, UserClaim},
    mail::{ActivationMail, MailError, Mailer},
    rate_limit::RateLimitConfig,
};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-at-least-32-bytes!!";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-at-least-32-bytes!";
pub const CLIENT_URL: &str = "http://localhost:5173";
pub const PASSWORD: &str = "Passw0rd!";

/// Records activation mails instead of sending them.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<ActivationMail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_activation(&self, mail: &ActivationMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// Always fails to deliver.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send_activation(&self, _mail: &ActivationMail) -> Result<(), MailError> {
        let err = "not-an-address".parse::<lettre::Address>().unwrap_err();
        Err(MailError::Address(err))
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
    pub mailer: Arc<RecordingMailer>,
    pub uploads: TempDir,
}

pub struct TestOptions {
    pub mailer: Option<Arc<dyn Mailer>>,
    pub rate_limit: Option<RateLimitConfig>,
    pub access_ttl: u64,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            mailer: None,
            rate_limit: None,
            access_ttl: taskgate::jwt::ACCESS_TOKEN_DURATION_SECS,
        }
    }
}

pub async fn test_app() -> TestApp {
    test_app_with(TestOptions::default()).await
}

pub async fn test_app_with(options: TestOptions) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let uploads = tempfile::tempdir().expect("Failed to create uploads dir");
    let recording = Arc::new(RecordingMailer::default());
    let mailer: Arc<dyn Mailer> = options
        .mailer
        .unwrap_or_else(|| recording.clone() as Arc<dyn Mailer>);

    let refresh_ttl = taskgate::jwt::REFRESH_TOKEN_DURATION_SECS;
    let config = ServerConfig {
        db: db.clone(),
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        access_ttl: options.access_ttl,
        refresh_ttl,
        cookie: CookieConfig::new(false, refresh_ttl),
        client_url: CLIENT_URL.to_string(),
        mailer,
        uploads_dir: uploads.path().to_path_buf(),
        // Minimum cost keeps the tests fast
        bcrypt_cost: 4,
        rate_limit: options.rate_limit,
    };

    TestApp {
        app: create_app(&config),
        db,
        jwt: JwtConfig::with_ttls(ACCESS_SECRET, REFRESH_SECRET, options.access_ttl, refresh_ttl),
        mailer: recording,
        uploads,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(json_request("POST", uri, None, body)).await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn sign_up(&self, name: &str, email: &str) -> Response<Body> {
        self.post_json(
            "/auth/signUp",
            serde_json::json!({ "name": name, "email": email, "password": PASSWORD }),
        )
        .await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Response<Body> {
        self.post_json(
            "/auth/signIn",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Read the pending activation token straight from the database.
    pub async fn activation_token(&self, email: &str) -> String {
        self.db
            .users()
            .get_by_email(email)
            .await
            .unwrap()
            .expect("user exists")
            .activation_token
            .expect("activation pending")
    }

    /// Sign up, activate and sign in. Returns the session.
    pub async fn signed_in_user(&self, name: &str, email: &str) -> Session {
        assert_eq!(self.sign_up(name, email).await.status(), StatusCode::CREATED);
        let token = self.activation_token(email).await;
        let response = self.get(&format!("/auth/activate/{}", token)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = self.sign_in(email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);
        Session::from_response(response).await
    }
}

/// Tokens and user returned by a sign-in style response.
pub struct Session {
    pub user: UserClaim,
    pub access_token: String,
    pub refresh_token: String,
}

impl Session {
    pub async fn from_response(response: Response<Body>) -> Self {
        let refresh_token = refresh_cookie_value(&response).expect("refresh cookie set");
        let json = body_json(response).await;
        Self {
            user: serde_json::from_value(json["data"]["user"].clone()).unwrap(),
            access_token: json["data"]["accessToken"].as_str().unwrap().to_string(),
            refresh_token,
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

pub fn json_request(method: &str, uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(bearer) = bearer {
        builder = builder.header("authorization", bearer);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn authed_request(method: &str, uri: &str, bearer: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", bearer)
        .body(Body::empty())
        .unwrap()
}

pub fn cookie_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Check if cookies contain a token being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=;", cookie_name)) && c.contains("Max-Age=0"))
}

/// Value of a non-empty `refreshToken` cookie set by the response.
pub fn refresh_cookie_value(response: &Response<Body>) -> Option<String> {
    extract_set_cookies(response).iter().find_map(|c| {
        let value = c.strip_prefix("refreshToken=")?.split(';').next()?;
        (!value.is_empty()).then(|| value.to_string())
    })
}
