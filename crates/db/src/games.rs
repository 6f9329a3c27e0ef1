use std::collections::HashMap;

use chrono_tz::Tz;
use courtside_models::schedule::parse_date;
use courtside_models::{
    CourtSummary, DEFAULT_GAME_STATUS, Error, Game, GameDetail, GameFilter, GameId, GameSort,
    Moment, NewGame, Page, Participant, RECENT_GAMES_CAP, Result, UserGames, UserId, UserSummary,
    ViewInvalidator, ViewKey,
};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

use crate::courts::find_court;
use crate::users::{SUMMARY_COLUMNS, ensure_user};

pub(crate) const GAME_COLUMNS: &str = "g.id, g.court_id, g.organizer_id, g.date, g.start_time, \
    g.game_type, g.skill_level, g.players_needed, g.notes, g.status, \
    (SELECT COUNT(*) FROM game_participants gp WHERE gp.game_id = g.id) AS participant_count, \
    g.created_at, g.updated_at";

#[derive(FromRow)]
struct GameRecord {
    #[sqlx(flatten)]
    game: Game,
    court_name: String,
    court_address: String,
    court_city: String,
    court_state: String,
    court_type: String,
    organizer_name: String,
    organizer_username: String,
    organizer_avatar_url: Option<String>,
    organizer_rating: f64,
}

fn detail_select() -> String {
    format!(
        "SELECT {GAME_COLUMNS}, \
            c.name AS court_name, c.address AS court_address, c.city AS court_city, \
            c.state AS court_state, c.court_type AS court_type, \
            o.name AS organizer_name, o.username AS organizer_username, \
            o.avatar_url AS organizer_avatar_url, o.rating AS organizer_rating \
         FROM games g \
         JOIN courts c ON c.id = g.court_id \
         JOIN users o ON o.id = g.organizer_id"
    )
}

/// Schedule a game. The organizer becomes its first participant in the same
/// transaction, so no game ever exists without one.
pub async fn create_game(
    pool: &SqlitePool,
    views: &dyn ViewInvalidator,
    organizer: UserId,
    input: &NewGame,
    tz: Tz,
) -> Result<GameDetail> {
    let draft = input.validate(tz)?;
    ensure_user(pool, organizer).await?;
    if find_court(pool, draft.court_id).await?.is_none() {
        return Err(Error::not_found("court", draft.court_id));
    }

    let mut tx = pool.begin().await?;
    let game_id: GameId = sqlx::query_scalar(
        "INSERT INTO games (court_id, organizer_id, date, start_time, game_type, skill_level, \
            players_needed, notes, status) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(draft.court_id)
    .bind(organizer)
    .bind(draft.slot.date_key())
    .bind(draft.slot.time_key())
    .bind(&draft.game_type)
    .bind(&draft.skill_level)
    .bind(draft.players_needed)
    .bind(&draft.notes)
    .bind(DEFAULT_GAME_STATUS)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("INSERT INTO game_participants (game_id, user_id, is_organizer) VALUES (?, ?, 1)")
        .bind(game_id)
        .bind(organizer)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(
        game_id,
        organizer,
        court_id = draft.court_id,
        date = %draft.slot.date_key(),
        start = %draft.slot.time_key(),
        "Game created"
    );
    views.invalidate(&[
        ViewKey::Dashboard,
        ViewKey::Profile(organizer),
        ViewKey::Court(draft.court_id),
    ]);
    get_game(pool, game_id).await
}

pub async fn get_game(pool: &SqlitePool, id: GameId) -> Result<GameDetail> {
    let sql = format!("{} WHERE g.id = ?", detail_select());
    let record = sqlx::query_as::<_, GameRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::not_found("game", id))?;
    let mut details = with_rosters(pool, vec![record]).await?;
    details.pop().ok_or_else(|| Error::not_found("game", id))
}

pub async fn list_games(
    pool: &SqlitePool,
    filter: &GameFilter,
    now: &Moment,
) -> Result<Page<GameDetail>> {
    let req = filter.page_request();
    let bounds = ListBounds::from_filter(filter)?;

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM games g WHERE 1 = 1");
    bounds.push_filters(&mut count, now);
    let mut total: i64 = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new(format!("{} WHERE 1 = 1", detail_select()));
    bounds.push_filters(&mut query, now);
    match bounds.sort {
        GameSort::Date => query.push(" ORDER BY g.date ASC, g.start_time ASC, g.id ASC"),
        GameSort::Recent => {
            total = total.min(i64::from(RECENT_GAMES_CAP));
            query.push(" ORDER BY g.date DESC, g.start_time DESC, g.id DESC")
        }
    };
    query
        .push(" LIMIT ")
        .push_bind(i64::from(req.limit))
        .push(" OFFSET ")
        .push_bind(req.offset());
    let records = query.build_query_as::<GameRecord>().fetch_all(pool).await?;
    let items = with_rosters(pool, records).await?;

    Ok(Page { items, total, page: req.page, limit: req.limit })
}

/// A user's games split at `now`: not yet started (soonest first) and
/// history (most recent first, capped). Each side is its own query.
pub async fn user_games(pool: &SqlitePool, user: UserId, now: &Moment) -> Result<UserGames> {
    ensure_user(pool, user).await?;
    let involved = "(g.organizer_id = ?1 OR g.id IN \
        (SELECT game_id FROM game_participants WHERE user_id = ?1))";
    let not_started = "(g.date > ?2 OR (g.date = ?2 AND g.start_time > ?3))";

    let sql = format!(
        "{} WHERE {involved} AND {not_started} \
         ORDER BY g.date ASC, g.start_time ASC, g.id ASC",
        detail_select()
    );
    let upcoming = sqlx::query_as::<_, GameRecord>(&sql)
        .bind(user)
        .bind(now.date_key())
        .bind(now.time_key())
        .fetch_all(pool)
        .await?;

    let sql = format!(
        "{} WHERE {involved} AND NOT {not_started} \
         ORDER BY g.date DESC, g.start_time DESC, g.id DESC LIMIT ?4",
        detail_select()
    );
    let history = sqlx::query_as::<_, GameRecord>(&sql)
        .bind(user)
        .bind(now.date_key())
        .bind(now.time_key())
        .bind(i64::from(RECENT_GAMES_CAP))
        .fetch_all(pool)
        .await?;

    Ok(UserGames {
        upcoming: with_rosters(pool, upcoming).await?,
        history: with_rosters(pool, history).await?,
    })
}

/// Validated, owned copy of the list filter, ready to bind.
struct ListBounds {
    court_id: Option<i64>,
    game_type: Option<String>,
    skill_levels: Vec<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    organizer: Option<String>,
    open_spots_only: bool,
    upcoming_only: bool,
    sort: GameSort,
}

impl ListBounds {
    fn from_filter(filter: &GameFilter) -> Result<Self> {
        let day = |raw: &Option<String>| -> Result<Option<String>> {
            match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                Some(s) => Ok(Some(parse_date(s)?.format("%Y-%m-%d").to_string())),
                None => Ok(None),
            }
        };
        Ok(Self {
            court_id: filter.court_id,
            game_type: filter
                .game_type
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            skill_levels: filter.skill_levels(),
            date_from: day(&filter.date_from)?,
            date_to: day(&filter.date_to)?,
            organizer: filter
                .organizer
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            open_spots_only: filter.has_open_spots.unwrap_or(false),
            upcoming_only: filter.upcoming.unwrap_or(false),
            sort: filter.sort.unwrap_or_default(),
        })
    }

    fn push_filters(&self, query: &mut QueryBuilder<'_, Sqlite>, now: &Moment) {
        if let Some(court_id) = self.court_id {
            query.push(" AND g.court_id = ").push_bind(court_id);
        }
        if let Some(game_type) = &self.game_type {
            query.push(" AND g.game_type = ").push_bind(game_type.clone());
        }
        if !self.skill_levels.is_empty() {
            query.push(" AND g.skill_level IN (");
            let mut levels = query.separated(", ");
            for level in &self.skill_levels {
                levels.push_bind(level.clone());
            }
            levels.push_unseparated(")");
        }
        if let Some(from) = &self.date_from {
            query.push(" AND g.date >= ").push_bind(from.clone());
        }
        if let Some(to) = &self.date_to {
            query.push(" AND g.date <= ").push_bind(to.clone());
        }
        if let Some(organizer) = &self.organizer {
            query
                .push(" AND g.organizer_id IN (SELECT id FROM users WHERE external_id = ")
                .push_bind(organizer.clone())
                .push(")");
        }
        if self.open_spots_only {
            query.push(
                " AND (SELECT COUNT(*) FROM game_participants gp WHERE gp.game_id = g.id) \
                 < g.players_needed",
            );
        }
        if self.upcoming_only {
            push_not_started(query, now);
        }
    }
}

fn push_not_started(query: &mut QueryBuilder<'_, Sqlite>, now: &Moment) {
    let today = now.date_key();
    query
        .push(" AND (g.date > ")
        .push_bind(today.clone())
        .push(" OR (g.date = ")
        .push_bind(today)
        .push(" AND g.start_time > ")
        .push_bind(now.time_key())
        .push("))");
}

/// Attach court, organizer and roster to each record, keeping order.
async fn with_rosters(pool: &SqlitePool, records: Vec<GameRecord>) -> Result<Vec<GameDetail>> {
    let ids: Vec<GameId> = records.iter().map(|r| r.game.id).collect();
    let mut rosters = load_participants(pool, &ids).await?;

    Ok(records
        .into_iter()
        .map(|r| {
            let participants = rosters.remove(&r.game.id).unwrap_or_default();
            GameDetail {
                court: CourtSummary {
                    id: r.game.court_id,
                    name: r.court_name,
                    address: r.court_address,
                    city: r.court_city,
                    state: r.court_state,
                    court_type: r.court_type,
                },
                organizer: UserSummary {
                    id: r.game.organizer_id,
                    name: r.organizer_name,
                    username: r.organizer_username,
                    avatar_url: r.organizer_avatar_url,
                    rating: r.organizer_rating,
                },
                participants,
                game: r.game,
            }
        })
        .collect())
}

/// Rosters for several games in one query; organizer first, then join order.
async fn load_participants(
    pool: &SqlitePool,
    game_ids: &[GameId],
) -> Result<HashMap<GameId, Vec<Participant>>> {
    let mut rosters: HashMap<GameId, Vec<Participant>> = HashMap::new();
    if game_ids.is_empty() {
        return Ok(rosters);
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT p.game_id, {SUMMARY_COLUMNS}, p.is_organizer, p.joined_at \
         FROM game_participants p JOIN users u ON u.id = p.user_id \
         WHERE p.game_id IN ("
    ));
    let mut ids = query.separated(", ");
    for id in game_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY p.game_id, p.is_organizer DESC, p.joined_at, p.rowid");

    for participant in query.build_query_as::<Participant>().fetch_all(pool).await? {
        rosters.entry(participant.game_id).or_default().push(participant);
    }
    Ok(rosters)
}
