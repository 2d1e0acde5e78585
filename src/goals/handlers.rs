use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    body::JsonBody,
    dates::{parse_date, today},
    error::{AppError, AppResult},
    goals::{
        dto::{ActiveQuery, CreateGoalRequest, UpdateGoalRequest},
        repo_types::CaloricGoal,
        services,
    },
    state::AppState,
};

pub fn goal_routes() -> Router<AppState> {
    Router::new()
        .route("/caloric-goals", get(list_goals).post(create_goal))
        .route("/caloric-goals/active", get(active_goal))
        .route(
            "/caloric-goals/:id",
            get(get_goal).put(update_goal).delete(delete_goal),
        )
}

#[instrument(skip(state))]
pub async fn list_goals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<CaloricGoal>>> {
    Ok(Json(services::list_for_user(&state.db, user_id).await?))
}

#[instrument(skip(state))]
pub async fn active_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ActiveQuery>,
) -> AppResult<Json<CaloricGoal>> {
    let date = match q.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => today(),
    };
    services::find_active(&state.db, user_id, date)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("No active caloric goal found for this date."))
}

#[instrument(skip(state))]
pub async fn get_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CaloricGoal>> {
    Ok(Json(services::get_goal(&state.db, user_id, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<CreateGoalRequest>,
) -> AppResult<(StatusCode, Json<CaloricGoal>)> {
    let goal = services::create_goal(&state.db, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

#[instrument(skip(state, payload))]
pub async fn update_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateGoalRequest>,
) -> AppResult<Json<CaloricGoal>> {
    Ok(Json(services::update_goal(&state.db, user_id, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    services::delete_goal(&state.db, user_id, id).await?;
    Ok(Json(json!({ "message": "Caloric goal deleted successfully." })))
}
