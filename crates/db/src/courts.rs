use courtside_models::{
    COURT_UPCOMING_GAMES, Court, CourtDetail, CourtFilter, CourtId, Error, Game, Moment, NewCourt,
    Page, PageRequest, Result,
};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

use crate::games::GAME_COLUMNS;
use crate::like_pattern;

pub(crate) const COURT_COLUMNS: &str = "id, name, description, latitude, longitude, address, \
    city, state, court_type, amenities, images, rating, place_id, created_at, updated_at";

const MAX_COURT_LIMIT: u32 = 100;

/// Return the court `input` points at (by id, then by place id), or create
/// it. An existing court is returned unchanged.
pub async fn find_or_create_court(pool: &SqlitePool, input: &NewCourt) -> Result<Court> {
    if let Some(id) = input.id {
        if let Some(court) = find_court(pool, id).await? {
            return Ok(court);
        }
    }
    let place_id = non_empty(&input.place_id);
    if let Some(place_id) = place_id {
        if let Some(court) = find_court_by_place_id(pool, place_id).await? {
            return Ok(court);
        }
    }

    let name = non_empty(&input.name).ok_or_else(|| Error::validation("court name is required"))?;
    let description = non_empty(&input.description).unwrap_or(name);

    let sql = format!(
        "INSERT INTO courts (name, description, latitude, longitude, address, city, state, \
            court_type, amenities, images, rating, place_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(place_id) DO NOTHING \
         RETURNING {COURT_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, Court>(&sql)
        .bind(name)
        .bind(description)
        .bind(input.latitude.unwrap_or_default())
        .bind(input.longitude.unwrap_or_default())
        .bind(non_empty(&input.address).unwrap_or_default())
        .bind(non_empty(&input.city).unwrap_or_default())
        .bind(non_empty(&input.state).unwrap_or_default())
        .bind(non_empty(&input.court_type).unwrap_or_default())
        .bind(Json(&input.amenities))
        .bind(Json(&input.images))
        .bind(input.rating)
        .bind(place_id)
        .fetch_optional(pool)
        .await?;

    match inserted {
        Some(court) => {
            info!(court_id = court.id, place_id = ?court.place_id, "Court created");
            Ok(court)
        }
        // Lost a race with another request creating the same place.
        None => match place_id {
            Some(place_id) => find_court_by_place_id(pool, place_id)
                .await?
                .ok_or_else(|| Error::not_found("place", place_id)),
            None => Err(Error::validation("court could not be created")),
        },
    }
}

pub async fn get_court(pool: &SqlitePool, id: CourtId) -> Result<Court> {
    find_court(pool, id).await?.ok_or_else(|| Error::not_found("court", id))
}

/// A court with its next few games that haven't started yet.
pub async fn court_detail(pool: &SqlitePool, id: CourtId, now: &Moment) -> Result<CourtDetail> {
    let court = get_court(pool, id).await?;
    let sql = format!(
        "SELECT {GAME_COLUMNS} FROM games g \
         WHERE g.court_id = ?1 AND (g.date > ?2 OR (g.date = ?2 AND g.start_time > ?3)) \
         ORDER BY g.date, g.start_time, g.id LIMIT ?4"
    );
    let upcoming_games = sqlx::query_as::<_, Game>(&sql)
        .bind(id)
        .bind(now.date_key())
        .bind(now.time_key())
        .bind(COURT_UPCOMING_GAMES)
        .fetch_all(pool)
        .await?;
    Ok(CourtDetail { court, upcoming_games })
}

pub async fn list_courts(pool: &SqlitePool, filter: &CourtFilter) -> Result<Page<Court>> {
    let req = PageRequest::new(filter.page, filter.limit, MAX_COURT_LIMIT);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM courts c WHERE 1 = 1");
    push_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut query =
        QueryBuilder::<Sqlite>::new(format!("SELECT {COURT_COLUMNS} FROM courts c WHERE 1 = 1"));
    push_filters(&mut query, filter);
    query
        .push(" ORDER BY c.name COLLATE NOCASE, c.id LIMIT ")
        .push_bind(i64::from(req.limit))
        .push(" OFFSET ")
        .push_bind(req.offset());
    let items = query.build_query_as::<Court>().fetch_all(pool).await?;

    Ok(Page { items, total, page: req.page, limit: req.limit })
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &CourtFilter) {
    if let Some(city) = non_empty(&filter.city) {
        query.push(" AND c.city = ").push_bind(city.to_string()).push(" COLLATE NOCASE");
    }
    if let Some(court_type) = non_empty(&filter.court_type) {
        query.push(" AND c.court_type = ").push_bind(court_type.to_string());
    }
    if let Some(q) = non_empty(&filter.q) {
        query
            .push(" AND c.name LIKE ")
            .push_bind(like_pattern(q))
            .push(" ESCAPE '\\'");
    }
}

pub(crate) async fn find_court(pool: &SqlitePool, id: CourtId) -> Result<Option<Court>> {
    let sql = format!("SELECT {COURT_COLUMNS} FROM courts WHERE id = ?");
    let court = sqlx::query_as::<_, Court>(&sql).bind(id).fetch_optional(pool).await?;
    Ok(court)
}

async fn find_court_by_place_id(pool: &SqlitePool, place_id: &str) -> Result<Option<Court>> {
    let sql = format!("SELECT {COURT_COLUMNS} FROM courts WHERE place_id = ?");
    let court = sqlx::query_as::<_, Court>(&sql)
        .bind(place_id)
        .fetch_optional(pool)
        .await?;
    Ok(court)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
