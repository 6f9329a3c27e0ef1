pub mod api;
pub mod auth;
pub mod cache;
pub mod error;
pub mod state;

pub use api::router;
pub use state::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("COURTSIDE_GIT_HASH");

pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH})")
}
