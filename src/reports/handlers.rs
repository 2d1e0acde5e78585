use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    dates::{monday_of, parse_date, parse_flag, today},
    error::{AppError, AppResult},
    reports::{
        dto::{HistoryQuery, WeeklyQuery},
        repo_types::{HistoryItem, WeeklyReportView},
        services,
    },
    state::AppState,
};

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/reports/weekly", get(weekly_report))
        .route("/reports/weekly/history", get(report_history))
}

#[instrument(skip(state))]
pub async fn weekly_report(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<WeeklyQuery>,
) -> AppResult<Json<WeeklyReportView>> {
    let week_start = match q.week_start.as_deref() {
        Some(raw) => parse_date(raw)
            .map_err(|_| AppError::validation("Invalid week_start format. Use Y-m-d."))?,
        None => monday_of(today())?,
    };
    let regenerate = parse_flag(q.regenerate.as_deref());

    let view = services::generate_weekly_report(
        &state.db,
        state.ai.as_ref(),
        user_id,
        week_start,
        regenerate,
    )
    .await?;
    Ok(Json(view))
}

#[instrument(skip(state))]
pub async fn report_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<HistoryQuery>,
) -> AppResult<Json<Vec<HistoryItem>>> {
    // unparsable limits fall back to the default
    let limit = q.limit.as_deref().and_then(|l| l.trim().parse::<i64>().ok());
    Ok(Json(services::history(&state.db, user_id, limit).await?))
}
