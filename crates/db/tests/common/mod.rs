#![allow(dead_code)]

use std::sync::Mutex;

use chrono::NaiveDate;
use chrono_tz::Tz;
use courtside_models::{
    Court, GameDetail, Identity, Moment, NewCourt, NewGame, NoViews, User, UserId,
    ViewInvalidator, ViewKey,
};
use sqlx::SqlitePool;

pub async fn setup() -> SqlitePool {
    let pool = courtside_db::connect_memory().await.unwrap();
    courtside_db::migrate(&pool).await.unwrap();
    pool
}

/// A migrated database file with a pool of several connections, so that
/// concurrent tasks really write through separate connections. Keep the
/// directory alive for as long as the pool is used.
pub async fn setup_file() -> (SqlitePool, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("courtside.db").display());
    let pool = courtside_db::connect(&url).await.unwrap();
    courtside_db::migrate(&pool).await.unwrap();
    assert!(pool.options().get_max_connections() > 1);
    (pool, dir)
}

/// Remembers every key it was asked to invalidate.
#[derive(Default)]
pub struct RecordingViews(Mutex<Vec<ViewKey>>);

impl RecordingViews {
    pub fn keys(&self) -> Vec<ViewKey> {
        self.0.lock().unwrap().clone()
    }
}

impl ViewInvalidator for RecordingViews {
    fn invalidate(&self, keys: &[ViewKey]) {
        self.0.lock().unwrap().extend_from_slice(keys);
    }
}

pub fn identity(subject: &str) -> Identity {
    Identity {
        subject: subject.to_string(),
        email: Some(format!("{subject}@example.com")),
        first_name: Some(subject.to_string()),
        last_name: None,
        full_name: None,
        avatar_url: Some(format!("https://img.example.com/{subject}.png")),
    }
}

pub async fn user(pool: &SqlitePool, subject: &str) -> User {
    courtside_db::sync_user(pool, &NoViews, &identity(subject)).await.unwrap()
}

pub async fn court(pool: &SqlitePool, name: &str) -> Court {
    let input = NewCourt {
        name: Some(name.to_string()),
        city: Some("Oakland".to_string()),
        state: Some("CA".to_string()),
        court_type: Some("outdoor".to_string()),
        amenities: vec!["lights".to_string()],
        ..Default::default()
    };
    courtside_db::find_or_create_court(pool, &input).await.unwrap()
}

/// Noon on 2030-06-01, server time.
pub fn now() -> Moment {
    at("2030-06-01", 12, 0)
}

pub fn at(date: &str, hour: u32, minute: u32) -> Moment {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    Moment::from_naive(day.and_hms_opt(hour, minute, 0).unwrap())
}

pub fn new_game(court_id: i64, date: &str, time: &str, players_needed: i64) -> NewGame {
    NewGame {
        court_id: Some(court_id),
        date: Some(date.to_string()),
        start_time: Some(time.to_string()),
        game_type: Some("basketball-5v5".to_string()),
        skill_level: Some("intermediate".to_string()),
        players_needed: Some(players_needed),
        notes: None,
    }
}

pub async fn game(
    pool: &SqlitePool,
    organizer: UserId,
    court_id: i64,
    date: &str,
    time: &str,
    players_needed: i64,
) -> GameDetail {
    courtside_db::create_game(
        pool,
        &NoViews,
        organizer,
        &new_game(court_id, date, time, players_needed),
        Tz::UTC,
    )
    .await
    .unwrap()
}

pub async fn count_games(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM games").fetch_one(pool).await.unwrap()
}
