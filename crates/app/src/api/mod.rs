//! HTTP surface under `/api`. Every handler answers with the success
//! envelope or an [`ApiError`](crate::error::ApiError).

use axum::Router;
use axum::routing::{get, post};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{ApiResult, success};
use crate::state::AppState;
use crate::version_string;

mod courts;
mod games;
mod social;
mod users;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/users/sync", post(users::sync))
        .route("/users/me", get(users::me))
        .route("/users/{id}", get(users::profile).patch(users::update))
        .route("/users/{id}/games", get(users::games))
        .route("/players", get(users::search))
        .route("/dashboard", get(users::dashboard))
        .route("/courts", get(courts::list).post(courts::find_or_create))
        .route("/courts/{id}", get(courts::detail))
        .route("/places/nearby", get(courts::nearby))
        .route("/games", get(games::list).post(games::create))
        .route("/games/{id}", get(games::detail))
        .route("/games/{id}/join", post(games::join))
        .route("/games/{id}/leave", post(games::leave))
        .route("/friends", get(social::friends))
        .route("/friends/{id}", post(social::add_friend).delete(social::remove_friend))
        .route("/favorites", get(social::favorites))
        .route(
            "/favorites/{court_id}",
            post(social::add_favorite).delete(social::remove_favorite),
        );

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> ApiResult {
    Ok(success(json!({
        "status": "ok",
        "version": version_string(),
    })))
}
