use axum::extract::State;
use courtside_models::{CourtFilter, CourtId, Error, NewCourt, ViewKey};
use courtside_places::NearbySearch;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::CurrentUser;
use crate::error::{ApiResult, Id, Params, Payload, success};
use crate::state::AppState;

pub async fn list(State(state): State<AppState>, Params(filter): Params<CourtFilter>) -> ApiResult {
    let page = courtside_db::list_courts(&state.pool, &filter).await?;
    Ok(success(json!({
        "courts": page.items,
        "total": page.total,
        "page": page.page,
        "limit": page.limit,
    })))
}

pub async fn find_or_create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Payload(input): Payload<NewCourt>,
) -> ApiResult {
    let court = courtside_db::find_or_create_court(&state.pool, &input).await?;
    info!(court = court.id, user = user.id, "Court resolved");
    Ok(success(json!({ "court": court })))
}

pub async fn detail(State(state): State<AppState>, Id(id): Id<CourtId>) -> ApiResult {
    let (pool, now) = (&state.pool, state.now());
    let view = state
        .views
        .read_through(ViewKey::Court(id), None, move || async move {
            let detail = courtside_db::court_detail(pool, id, &now).await?;
            Ok(json!({ "court": detail }))
        })
        .await?;
    Ok(success(view))
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    lat: f64,
    lng: f64,
    radius: Option<u32>,
    keyword: Option<String>,
}

/// Places provider passthrough. Nothing is stored until a result is posted
/// back to `/courts`.
pub async fn nearby(
    State(state): State<AppState>,
    _user: CurrentUser,
    Params(query): Params<NearbyQuery>,
) -> ApiResult {
    let client = state
        .places
        .as_ref()
        .ok_or_else(|| Error::Upstream("places search is not configured".to_string()))?;
    let search = NearbySearch {
        latitude: query.lat,
        longitude: query.lng,
        radius_meters: query.radius,
        keyword: query.keyword,
    };
    let places = client
        .nearby(&search)
        .await
        .map_err(|e| Error::Upstream(e.to_string()))?;
    Ok(success(json!({ "places": places })))
}
