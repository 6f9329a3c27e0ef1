use axum::extract::State;
use courtside_models::{CourtId, UserId};
use serde_json::json;

use crate::auth::CurrentUser;
use crate::error::{ApiResult, Id, success};
use crate::state::AppState;

pub async fn friends(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult {
    let friends = courtside_db::list_friends(&state.pool, user.id).await?;
    Ok(success(json!({ "friends": friends })))
}

pub async fn add_friend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Id(friend): Id<UserId>,
) -> ApiResult {
    let friend = courtside_db::add_friend(&state.pool, state.views.as_ref(), user.id, friend).await?;
    Ok(success(json!({ "friend": friend })))
}

pub async fn remove_friend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Id(friend): Id<UserId>,
) -> ApiResult {
    courtside_db::remove_friend(&state.pool, state.views.as_ref(), user.id, friend).await?;
    Ok(success(json!({})))
}

pub async fn favorites(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult {
    let courts = courtside_db::list_favorites(&state.pool, user.id).await?;
    Ok(success(json!({ "favorites": courts })))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Id(court): Id<CourtId>,
) -> ApiResult {
    let court = courtside_db::add_favorite(&state.pool, state.views.as_ref(), user.id, court).await?;
    Ok(success(json!({ "court": court })))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Id(court): Id<CourtId>,
) -> ApiResult {
    courtside_db::remove_favorite(&state.pool, state.views.as_ref(), user.id, court).await?;
    Ok(success(json!({})))
}
