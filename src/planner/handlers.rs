use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    body::OptionalJsonBody,
    dates::{parse_date, parse_flag, today},
    error::{AppError, AppResult},
    planner::{
        dto::{GenerateQuery, GeneratePlanRequest, ShoppingListQuery},
        services,
    },
    state::AppState,
};

pub fn planner_routes() -> Router<AppState> {
    Router::new()
        .route("/meals/generate", post(generate_plan))
        .route("/shopping-list", get(shopping_list))
}

/// Body is optional; `date` defaults to today.
#[instrument(skip(state, payload))]
pub async fn generate_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<GenerateQuery>,
    OptionalJsonBody(payload): OptionalJsonBody<GeneratePlanRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let req = payload.unwrap_or_default();
    let date = match req.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => today(),
    };
    let save = parse_flag(q.save.as_deref());

    let plan = services::generate_plan(
        &state.db,
        state.ai.as_ref(),
        user_id,
        date,
        req.target_calories,
        save,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

#[instrument(skip(state))]
pub async fn shopping_list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ShoppingListQuery>,
) -> AppResult<Json<Value>> {
    let (Some(start), Some(end)) = (q.start.as_deref(), q.end.as_deref()) else {
        return Err(AppError::validation("Missing start or end date"));
    };
    let list = services::shopping_list(
        &state.db,
        state.ai.as_ref(),
        user_id,
        parse_date(start)?,
        parse_date(end)?,
    )
    .await?;
    Ok(Json(list))
}
