mod dto;
pub mod handlers;
pub mod import;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::option_routes())
        .merge(handlers::import_routes())
}
