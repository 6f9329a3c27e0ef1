use courtside_models::{
    Conflict, DEFAULT_RATING, Error, Identity, Page, PageRequest, ProfileUpdate, Result, User,
    UserId, UserSummary, ViewInvalidator, ViewKey,
};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::{is_unique_violation, like_pattern};

pub(crate) const USER_COLUMNS: &str = "id, external_id, email, name, username, avatar_url, rating, \
    games_played, courts_visited, bio, location, created_at, updated_at";

pub(crate) const SUMMARY_COLUMNS: &str = "u.id, u.name, u.username, u.avatar_url, u.rating";

const MAX_SEARCH_LIMIT: u32 = 50;
const USERNAME_MAX: usize = 30;
const MAX_USERNAME_ATTEMPTS: u32 = 8;

/// Resolve an authenticated identity to its user, creating the user on first
/// sight. Later syncs refresh the display name and avatar and nothing else.
pub async fn sync_user(
    pool: &SqlitePool,
    views: &dyn ViewInvalidator,
    identity: &Identity,
) -> Result<User> {
    let email = identity
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| Error::validation("email required"))?;
    let name = identity.display_name();

    let user = match find_user_by_external_id(pool, &identity.subject).await? {
        Some(existing) => {
            let sql = format!(
                "UPDATE users SET name = ?, avatar_url = ?, updated_at = datetime('now') \
                 WHERE id = ? RETURNING {USER_COLUMNS}"
            );
            let user = sqlx::query_as::<_, User>(&sql)
                .bind(&name)
                .bind(&identity.avatar_url)
                .bind(existing.id)
                .fetch_one(pool)
                .await?;
            debug!(user_id = user.id, "Refreshed user from identity claims");
            user
        }
        None => insert_user(pool, identity, email, &name).await?,
    };

    // Rosters cached under Game and Court keys show the old name until they expire.
    views.invalidate(&[ViewKey::Profile(user.id), ViewKey::Dashboard]);
    Ok(user)
}

/// Insert a first-seen identity under the first free username. Another
/// sync can take that username between the lookup and the insert; the
/// unique index turns that into a retry with the next candidate.
async fn insert_user(pool: &SqlitePool, identity: &Identity, email: &str, name: &str) -> Result<User> {
    let sql = format!(
        "INSERT INTO users (external_id, email, name, username, avatar_url, rating) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(external_id) DO UPDATE SET \
            name = excluded.name, \
            avatar_url = excluded.avatar_url, \
            updated_at = datetime('now') \
         RETURNING {USER_COLUMNS}"
    );

    let mut attempt = 0;
    loop {
        attempt += 1;
        let username = available_username(pool, email).await?;
        let inserted = sqlx::query_as::<_, User>(&sql)
            .bind(&identity.subject)
            .bind(email)
            .bind(name)
            .bind(&username)
            .bind(&identity.avatar_url)
            .bind(DEFAULT_RATING)
            .fetch_one(pool)
            .await;

        match inserted {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "Created user on first sync");
                return Ok(user);
            }
            Err(e) if is_unique_violation(&e) && attempt < MAX_USERNAME_ATTEMPTS => {
                debug!(username = %username, attempt, "Username claimed concurrently, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub async fn get_user(pool: &SqlitePool, id: UserId) -> Result<User> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::not_found("user", id))
}

pub async fn find_user_by_external_id(pool: &SqlitePool, external_id: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE external_id = ?");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(external_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Edit a profile. Only the owner may do so; a username already held by
/// someone else leaves the profile untouched.
pub async fn update_profile(
    pool: &SqlitePool,
    views: &dyn ViewInvalidator,
    actor: UserId,
    target: UserId,
    update: &ProfileUpdate,
) -> Result<User> {
    if actor != target {
        return Err(Error::Forbidden("you can only edit your own profile".to_string()));
    }
    let current = get_user(pool, target).await?;

    let username = match update.username.as_deref().map(str::trim) {
        Some(u) if u != current.username => {
            validate_username(u)?;
            if username_taken(pool, u, Some(target)).await? {
                return Err(Conflict::UsernameTaken.into());
            }
            Some(u)
        }
        _ => None,
    };
    let name = match update.name.as_deref().map(str::trim) {
        Some("") => return Err(Error::validation("name cannot be empty")),
        other => other,
    };
    let bio = update.bio.as_deref().map(str::trim);
    let location = update.location.as_deref().map(str::trim);

    let sql = format!(
        "UPDATE users SET \
            username = COALESCE(?, username), \
            name = COALESCE(?, name), \
            bio = CASE WHEN ? IS NULL THEN bio ELSE NULLIF(?, '') END, \
            location = CASE WHEN ? IS NULL THEN location ELSE NULLIF(?, '') END, \
            updated_at = datetime('now') \
         WHERE id = ? RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(username)
        .bind(name)
        .bind(bio)
        .bind(bio)
        .bind(location)
        .bind(location)
        .bind(target)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::from(Conflict::UsernameTaken)
            } else {
                Error::from(e)
            }
        })?;

    info!(user_id = user.id, "Profile updated");
    // As in sync_user, cached rosters keep the old name until they expire.
    views.invalidate(&[ViewKey::Profile(user.id), ViewKey::Dashboard]);
    Ok(user)
}

/// Case-insensitive substring search over display name and username.
pub async fn search_players(
    pool: &SqlitePool,
    query: Option<&str>,
    page: Option<u32>,
    limit: Option<u32>,
) -> Result<Page<UserSummary>> {
    let req = PageRequest::new(page, limit, MAX_SEARCH_LIMIT);
    let pattern = like_pattern(query.unwrap_or(""));

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users u \
         WHERE u.name LIKE ?1 ESCAPE '\\' OR u.username LIKE ?1 ESCAPE '\\'",
    )
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT {SUMMARY_COLUMNS} FROM users u \
         WHERE u.name LIKE ?1 ESCAPE '\\' OR u.username LIKE ?1 ESCAPE '\\' \
         ORDER BY u.name COLLATE NOCASE, u.id LIMIT ?2 OFFSET ?3"
    );
    let items = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(&pattern)
        .bind(i64::from(req.limit))
        .bind(req.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page { items, total, page: req.page, limit: req.limit })
}

pub(crate) async fn ensure_user(pool: &SqlitePool, id: UserId) -> Result<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    found.map(|_| ()).ok_or_else(|| Error::not_found("user", id))
}

async fn username_taken(pool: &SqlitePool, username: &str, except: Option<UserId>) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE username = ? AND id IS NOT ?")
            .bind(username)
            .bind(except)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// First free username derived from the email local part: `jo`, `jo2`, `jo3`...
async fn available_username(pool: &SqlitePool, email: &str) -> Result<String> {
    let base = username_base(email);
    let mut candidate = base.clone();
    let mut n = 1;
    while username_taken(pool, &candidate, None).await? {
        n += 1;
        candidate = format!("{base}{n}");
    }
    Ok(candidate)
}

fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("");
    let base: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(USERNAME_MAX - 6)
        .collect();
    if base.is_empty() { "player".to_string() } else { base }
}

fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(3..=USERNAME_MAX).contains(&len) {
        return Err(Error::validation(format!(
            "username must be between 3 and {USERNAME_MAX} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(Error::validation(
            "username may only contain letters, digits, '.', '_' and '-'",
        ));
    }
    Ok(())
}
