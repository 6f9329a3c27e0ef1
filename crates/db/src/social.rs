//! Friendships and favorite courts.
//!
//! A friendship is a single row keyed by the ordered pair (low id, high id),
//! so adding or removing one is one statement and both sides always agree.

use courtside_models::{
    Conflict, Court, CourtId, Error, Result, UserId, UserSummary, ViewInvalidator, ViewKey,
};
use sqlx::SqlitePool;
use tracing::info;

use crate::courts::{COURT_COLUMNS, get_court};
use crate::users::{SUMMARY_COLUMNS, ensure_user, get_user};

fn edge(a: UserId, b: UserId) -> (UserId, UserId) {
    if a < b { (a, b) } else { (b, a) }
}

pub async fn add_friend(
    pool: &SqlitePool,
    views: &dyn ViewInvalidator,
    user: UserId,
    friend: UserId,
) -> Result<UserSummary> {
    if user == friend {
        return Err(Error::validation("you cannot add yourself as a friend"));
    }
    ensure_user(pool, user).await?;
    let other = get_user(pool, friend).await?;

    let (low, high) = edge(user, friend);
    let inserted =
        sqlx::query("INSERT OR IGNORE INTO friendships (user_low, user_high) VALUES (?, ?)")
            .bind(low)
            .bind(high)
            .execute(pool)
            .await?
            .rows_affected();
    if inserted == 0 {
        return Err(Conflict::AlreadyFriends.into());
    }

    info!(user, friend, "Friendship added");
    views.invalidate(&[ViewKey::Profile(user), ViewKey::Profile(friend), ViewKey::Dashboard]);
    Ok(UserSummary::from(&other))
}

pub async fn remove_friend(
    pool: &SqlitePool,
    views: &dyn ViewInvalidator,
    user: UserId,
    friend: UserId,
) -> Result<()> {
    ensure_user(pool, user).await?;
    ensure_user(pool, friend).await?;

    let (low, high) = edge(user, friend);
    let removed = sqlx::query("DELETE FROM friendships WHERE user_low = ? AND user_high = ?")
        .bind(low)
        .bind(high)
        .execute(pool)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(Conflict::NotFriends.into());
    }

    info!(user, friend, "Friendship removed");
    views.invalidate(&[ViewKey::Profile(user), ViewKey::Profile(friend), ViewKey::Dashboard]);
    Ok(())
}

pub async fn are_friends(pool: &SqlitePool, a: UserId, b: UserId) -> Result<bool> {
    let (low, high) = edge(a, b);
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM friendships WHERE user_low = ? AND user_high = ?")
            .bind(low)
            .bind(high)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

pub async fn list_friends(pool: &SqlitePool, user: UserId) -> Result<Vec<UserSummary>> {
    ensure_user(pool, user).await?;
    let sql = format!(
        "SELECT {SUMMARY_COLUMNS} FROM friendships f \
         JOIN users u ON u.id = CASE WHEN f.user_low = ?1 THEN f.user_high ELSE f.user_low END \
         WHERE f.user_low = ?1 OR f.user_high = ?1 \
         ORDER BY u.name COLLATE NOCASE, u.id"
    );
    let friends = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(user)
        .fetch_all(pool)
        .await?;
    Ok(friends)
}

pub async fn add_favorite(
    pool: &SqlitePool,
    views: &dyn ViewInvalidator,
    user: UserId,
    court: CourtId,
) -> Result<Court> {
    ensure_user(pool, user).await?;
    let found = get_court(pool, court).await?;

    let inserted =
        sqlx::query("INSERT OR IGNORE INTO favorites (user_id, court_id) VALUES (?, ?)")
            .bind(user)
            .bind(court)
            .execute(pool)
            .await?
            .rows_affected();
    if inserted == 0 {
        return Err(Conflict::AlreadyFavorite.into());
    }

    info!(user, court, "Favorite added");
    views.invalidate(&[ViewKey::Profile(user), ViewKey::Dashboard]);
    Ok(found)
}

pub async fn remove_favorite(
    pool: &SqlitePool,
    views: &dyn ViewInvalidator,
    user: UserId,
    court: CourtId,
) -> Result<()> {
    ensure_user(pool, user).await?;
    get_court(pool, court).await?;

    let removed = sqlx::query("DELETE FROM favorites WHERE user_id = ? AND court_id = ?")
        .bind(user)
        .bind(court)
        .execute(pool)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(Conflict::NotFavorite.into());
    }

    info!(user, court, "Favorite removed");
    views.invalidate(&[ViewKey::Profile(user), ViewKey::Dashboard]);
    Ok(())
}

pub async fn list_favorites(pool: &SqlitePool, user: UserId) -> Result<Vec<Court>> {
    ensure_user(pool, user).await?;
    let sql = format!(
        "SELECT {COURT_COLUMNS} FROM courts \
         WHERE id IN (SELECT court_id FROM favorites WHERE user_id = ?) \
         ORDER BY name COLLATE NOCASE, id"
    );
    let courts = sqlx::query_as::<_, Court>(&sql).bind(user).fetch_all(pool).await?;
    Ok(courts)
}
