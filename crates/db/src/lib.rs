use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

mod courts;
mod games;
mod participation;
mod social;
mod users;

pub use courts::{court_detail, find_or_create_court, get_court, list_courts};
pub use games::{create_game, get_game, list_games, user_games};
pub use participation::{join_game, leave_game};
pub use social::{
    add_favorite, add_friend, are_friends, list_favorites, list_friends, remove_favorite,
    remove_friend,
};
pub use users::{
    find_user_by_external_id, get_user, search_players, sync_user, update_profile,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a file database. Writers on different pool connections wait on each
/// other for up to `BUSY_TIMEOUT` instead of failing with SQLITE_BUSY.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    info!("Connected to database: {database_url}");
    Ok(pool)
}

/// A private in-memory database. The pool holds exactly one connection that
/// never expires, since closing it would drop the database.
pub async fn connect_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("Migrations applied");
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// `%term%` for LIKE, with the wildcard characters in `term` escaped.
/// Pair with `ESCAPE '\'`.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
