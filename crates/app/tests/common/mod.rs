#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum_test::{TestResponse, TestServer};
use courtside::auth::Authenticator;
use courtside::cache::ViewCache;
use courtside::{AppState, router};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};

pub const SECRET: &str = "courtside-test-secret";
pub const AUDIENCE: &str = "https://api.courtside.test";

/// Far enough ahead that the real clock never catches up.
pub const FUTURE_DATE: &str = "2099-06-01";

pub async fn server() -> TestServer {
    let pool = courtside_db::connect_memory().await.unwrap();
    courtside_db::migrate(&pool).await.unwrap();
    let state = AppState {
        pool,
        views: Arc::new(ViewCache::new(Duration::from_secs(60))),
        auth: Arc::new(Authenticator::with_secret(SECRET, AUDIENCE)),
        places: None,
        tz: chrono_tz::Tz::UTC,
    };
    TestServer::new(router(state)).unwrap()
}

/// An HS256 token for `subject`, whose email local part is also `subject`.
pub fn token(subject: &str) -> String {
    let claims = json!({
        "sub": subject,
        "aud": AUDIENCE,
        "exp": chrono::Utc::now().timestamp() + 3600,
        "email": format!("{subject}@example.com"),
        "given_name": subject,
        "family_name": "Hooper",
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

/// Sync `subject` and return their internal id.
pub async fn sign_up(server: &TestServer, subject: &str) -> i64 {
    let body: Value = server
        .post("/api/users/sync")
        .authorization_bearer(token(subject))
        .await
        .json();
    body["user"]["id"].as_i64().unwrap()
}

pub async fn court(server: &TestServer, subject: &str, name: &str) -> i64 {
    let body: Value = server
        .post("/api/courts")
        .authorization_bearer(token(subject))
        .json(&json!({ "name": name, "city": "Oakland", "court_type": "outdoor" }))
        .await
        .json();
    body["court"]["id"].as_i64().unwrap()
}

pub async fn create_game(server: &TestServer, subject: &str, court_id: i64, players_needed: i64) -> TestResponse {
    server
        .post("/api/games")
        .authorization_bearer(token(subject))
        .json(&json!({
            "court_id": court_id,
            "date": FUTURE_DATE,
            "start_time": "18:30",
            "game_type": "basketball-5v5",
            "skill_level": "intermediate",
            "players_needed": players_needed,
        }))
        .await
}

pub async fn game(server: &TestServer, subject: &str, court_id: i64, players_needed: i64) -> i64 {
    let body: Value = create_game(server, subject, court_id, players_needed).await.json();
    body["game"]["id"].as_i64().unwrap()
}

pub async fn join(server: &TestServer, subject: &str, game_id: i64) -> TestResponse {
    server
        .post(&format!("/api/games/{game_id}/join"))
        .authorization_bearer(token(subject))
        .await
}

pub async fn leave(server: &TestServer, subject: &str, game_id: i64) -> TestResponse {
    server
        .post(&format!("/api/games/{game_id}/leave"))
        .authorization_bearer(token(subject))
        .await
}
