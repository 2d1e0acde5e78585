mod dto;
pub mod handlers;
pub mod prompt;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod stats;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::report_routes()
}
