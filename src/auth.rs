//! Administrator sessions
//!
//! A single configured credential. Successful logins get a random bearer
//! token that lives in a TTL cache; restarting the server logs everyone out.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use moka::future::Cache;

use crate::config::Config;

#[derive(Clone)]
pub struct AdminAuth {
    username: String,
    password: Option<String>,
    ttl: Duration,
    tokens: Cache<String, String>,
}

impl AdminAuth {
    pub fn new(username: &str, password: Option<String>, ttl: Duration) -> Self {
        let tokens = Cache::builder().max_capacity(1_000).time_to_live(ttl).build();
        Self {
            username: username.to_string(),
            password,
            ttl,
            tokens,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.admin_username, config.admin_password.clone(), config.admin_token_ttl)
    }

    pub fn enabled(&self) -> bool {
        self.password.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A fresh token when the credentials match, `None` otherwise.
    pub async fn login(&self, username: &str, password: &str) -> Option<String> {
        let expected = self.password.as_deref()?;

        // evaluate both so timing does not reveal which one failed
        let user_ok = constant_time_eq(username, &self.username);
        let pass_ok = constant_time_eq(password, expected);
        if !(user_ok & pass_ok) {
            tracing::warn!("Rejected admin login for '{}'", username);
            return None;
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        self.tokens.insert(token.clone(), username.to_string()).await;
        tracing::info!("Admin '{}' logged in", username);
        Some(token)
    }

    /// Username behind a live token.
    pub async fn verify(&self, token: &str) -> Option<String> {
        self.tokens.get(token).await
    }

    pub async fn logout(&self, token: &str) {
        self.tokens.invalidate(token).await;
    }
}

/// Compares blake3 digests; `blake3::Hash` equality is constant-time.
fn constant_time_eq(a: &str, b: &str) -> bool {
    blake3::hash(a.as_bytes()) == blake3::hash(b.as_bytes())
}

pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Rejects requests without a live admin token.
pub async fn require_admin(State(auth): State<AdminAuth>, request: Request, next: Next) -> Response {
    let Some(token) = bearer_token(&request).map(str::to_owned) else {
        return unauthorized("missing bearer token");
    };
    if auth.verify(&token).await.is_none() {
        return unauthorized("invalid or expired token");
    }
    next.run(request).await
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
