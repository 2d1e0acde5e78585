use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    body::JsonBody,
    error::AppResult,
    meals::{
        dto::{MealView, UpdateMealRequest, UpsertMealRequest},
        services,
    },
    state::AppState,
};

pub fn meal_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals).post(upsert_meal))
        .route("/meals/:id", put(update_meal).delete(delete_meal))
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<MealView>>> {
    Ok(Json(services::list_meals(&state.db, user_id).await?))
}

/// 201 when the day had no meal yet, 200 when it was overwritten.
#[instrument(skip(state, payload))]
pub async fn upsert_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<UpsertMealRequest>,
) -> AppResult<(StatusCode, Json<MealView>)> {
    let (created, view) = services::upsert_meal(&state.db, user_id, payload).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(view)))
}

#[instrument(skip(state, payload))]
pub async fn update_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateMealRequest>,
) -> AppResult<Json<MealView>> {
    Ok(Json(services::update_meal(&state.db, user_id, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    services::delete_meal(&state.db, user_id, id).await?;
    Ok(Json(json!({ "message": "Meal deleted" })))
}
