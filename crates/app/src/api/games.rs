use axum::extract::State;
use courtside_models::{GameDetail, GameFilter, GameId, NewGame, UserId, ViewKey};
use serde_json::{Value, json};
use tracing::info;

use crate::auth::CurrentUser;
use crate::error::{ApiResult, Id, Params, Payload, success};
use crate::state::AppState;

pub async fn list(State(state): State<AppState>, Params(filter): Params<GameFilter>) -> ApiResult {
    let page = courtside_db::list_games(&state.pool, &filter, &state.now()).await?;
    Ok(success(json!({
        "games": page.items,
        "total": page.total,
        "page": page.page,
        "limit": page.limit,
    })))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Payload(input): Payload<NewGame>,
) -> ApiResult {
    let game = courtside_db::create_game(&state.pool, state.views.as_ref(), user.id, &input, state.tz).await?;
    info!(game = game.game.id, organizer = user.id, "Game created");
    Ok(success(json!({ "game": game })))
}

pub async fn detail(State(state): State<AppState>, Id(id): Id<GameId>) -> ApiResult {
    let pool = &state.pool;
    let view = state
        .views
        .read_through(ViewKey::Game(id), None, move || async move {
            let game = courtside_db::get_game(pool, id).await?;
            Ok(json!({ "game": game }))
        })
        .await?;
    Ok(success(view))
}

pub async fn join(State(state): State<AppState>, CurrentUser(user): CurrentUser, Id(id): Id<GameId>) -> ApiResult {
    let game = courtside_db::join_game(&state.pool, state.views.as_ref(), id, user.id, &state.now()).await?;
    info!(game = id, user = user.id, "Joined game");
    Ok(success(roster_for(&game, user.id)))
}

pub async fn leave(State(state): State<AppState>, CurrentUser(user): CurrentUser, Id(id): Id<GameId>) -> ApiResult {
    let game = courtside_db::leave_game(&state.pool, state.views.as_ref(), id, user.id).await?;
    info!(game = id, user = user.id, "Left game");
    Ok(success(roster_for(&game, user.id)))
}

fn roster_for(game: &GameDetail, user: UserId) -> Value {
    json!({ "game": game, "participation": game.participation(user) })
}
