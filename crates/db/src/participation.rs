use courtside_models::{
    Conflict, GameDetail, GameId, Moment, Participation, Result, UserId, ViewInvalidator, ViewKey,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::games::get_game;
use crate::users::ensure_user;

/// Add `user` to the game's roster.
///
/// The insert itself re-checks start time and capacity, so two requests
/// racing for the last spot cannot both get it. When the insert is refused
/// the game is re-read to report why.
pub async fn join_game(
    pool: &SqlitePool,
    views: &dyn ViewInvalidator,
    game_id: GameId,
    user: UserId,
    now: &Moment,
) -> Result<GameDetail> {
    ensure_user(pool, user).await?;
    let game = get_game(pool, game_id).await?;
    if let Some(conflict) = join_conflict(&game, user, now) {
        return Err(conflict.into());
    }

    let today = now.date_key();
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO game_participants (game_id, user_id, is_organizer) \
         SELECT g.id, ?1, 0 FROM games g \
         WHERE g.id = ?2 \
           AND (g.date > ?3 OR (g.date = ?3 AND g.start_time > ?4)) \
           AND (SELECT COUNT(*) FROM game_participants gp WHERE gp.game_id = g.id) \
               < g.players_needed",
    )
    .bind(user)
    .bind(game_id)
    .bind(&today)
    .bind(now.time_key())
    .execute(pool)
    .await?
    .rows_affected();

    if inserted == 0 {
        let game = get_game(pool, game_id).await?;
        let conflict = join_conflict(&game, user, now).unwrap_or(Conflict::GameFull);
        warn!(game_id, user, %conflict, "Join refused by conditional insert");
        return Err(conflict.into());
    }

    info!(game_id, user, "Joined game");
    views.invalidate(&[
        ViewKey::Game(game_id),
        ViewKey::Profile(user),
        ViewKey::Dashboard,
        ViewKey::Court(game.game.court_id),
    ]);
    get_game(pool, game_id).await
}

/// Remove `user` from the roster. The organizer can never be removed; the
/// delete statement excludes them regardless of what was read beforehand.
pub async fn leave_game(
    pool: &SqlitePool,
    views: &dyn ViewInvalidator,
    game_id: GameId,
    user: UserId,
) -> Result<GameDetail> {
    let game = get_game(pool, game_id).await?;
    leave_check(&game, user)?;

    let removed = sqlx::query(
        "DELETE FROM game_participants \
         WHERE game_id = ?1 AND user_id = ?2 AND is_organizer = 0 \
           AND user_id <> (SELECT organizer_id FROM games WHERE id = ?1)",
    )
    .bind(game_id)
    .bind(user)
    .execute(pool)
    .await?
    .rows_affected();

    if removed == 0 {
        let game = get_game(pool, game_id).await?;
        leave_check(&game, user)?;
        return Err(Conflict::NotParticipant.into());
    }

    info!(game_id, user, "Left game");
    views.invalidate(&[
        ViewKey::Game(game_id),
        ViewKey::Profile(user),
        ViewKey::Dashboard,
        ViewKey::Court(game.game.court_id),
    ]);
    get_game(pool, game_id).await
}

fn join_conflict(game: &GameDetail, user: UserId, now: &Moment) -> Option<Conflict> {
    if game.game.has_started(now) {
        Some(Conflict::GameInPast)
    } else if game.participation(user) != Participation::NotParticipant {
        Some(Conflict::AlreadyJoined)
    } else if game.participants.len() as i64 >= game.game.players_needed {
        Some(Conflict::GameFull)
    } else {
        None
    }
}

fn leave_check(game: &GameDetail, user: UserId) -> Result<()> {
    match game.participation(user) {
        Participation::Participant => Ok(()),
        Participation::Organizer => Err(Conflict::OrganizerCannotLeave.into()),
        Participation::NotParticipant => Err(Conflict::NotParticipant.into()),
    }
}
