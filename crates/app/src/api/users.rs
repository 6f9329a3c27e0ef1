use axum::extract::State;
use courtside_models::{ProfileUpdate, PublicUser, Result, UserId, ViewKey};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::auth::{CurrentIdentity, CurrentUser};
use crate::error::{ApiResult, Id, Params, Payload, success};
use crate::state::AppState;

pub async fn sync(State(state): State<AppState>, CurrentIdentity(identity): CurrentIdentity) -> ApiResult {
    let user = courtside_db::sync_user(&state.pool, state.views.as_ref(), &identity).await?;
    info!(user = user.id, "User synced");
    Ok(success(json!({ "user": user })))
}

pub async fn me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult {
    let mut view = profile_view(&state, user.id).await?;
    view["user"] = json!(user);
    Ok(success(view))
}

pub async fn profile(State(state): State<AppState>, Id(id): Id<UserId>) -> ApiResult {
    let view = profile_view(&state, id).await?;
    Ok(success(view))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Id(id): Id<UserId>,
    Payload(patch): Payload<ProfileUpdate>,
) -> ApiResult {
    let user = courtside_db::update_profile(&state.pool, state.views.as_ref(), actor.id, id, &patch).await?;
    Ok(success(json!({ "user": user })))
}

pub async fn games(State(state): State<AppState>, Id(id): Id<UserId>) -> ApiResult {
    let games = courtside_db::user_games(&state.pool, id, &state.now()).await?;
    Ok(success(json!({ "upcoming": games.upcoming, "history": games.history })))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

pub async fn search(State(state): State<AppState>, Params(query): Params<SearchQuery>) -> ApiResult {
    let page = courtside_db::search_players(&state.pool, query.q.as_deref(), query.page, query.limit).await?;
    Ok(success(json!({
        "players": page.items,
        "total": page.total,
        "page": page.page,
        "limit": page.limit,
    })))
}

pub async fn dashboard(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult {
    let (pool, now) = (&state.pool, state.now());
    let view = state
        .views
        .read_through(ViewKey::Dashboard, Some(user.id), move || async move {
            let games = courtside_db::user_games(pool, user.id, &now).await?;
            let favorites = courtside_db::list_favorites(pool, user.id).await?;
            Ok(json!({
                "user": user,
                "upcoming": games.upcoming,
                "history": games.history,
                "favorites": favorites,
            }))
        })
        .await?;
    Ok(success(view))
}

/// A user's public profile with their friends and favorite courts. Only the
/// public shape is cached, so one entry serves every viewer.
async fn profile_view(state: &AppState, id: UserId) -> Result<Value> {
    let pool = &state.pool;
    state
        .views
        .read_through(ViewKey::Profile(id), None, move || async move {
            let user = PublicUser::from(courtside_db::get_user(pool, id).await?);
            let friends = courtside_db::list_friends(pool, id).await?;
            let favorites = courtside_db::list_favorites(pool, id).await?;
            Ok(json!({ "user": user, "friends": friends, "favorites": favorites }))
        })
        .await
}
