use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    body::JsonBody,
    error::{AppError, AppResult},
    extract::{extract_text, is_supported, resolve_mime, MAX_SIZE_BYTES},
    meal_options::{
        dto::{CreateMealOptionRequest, ImportResponse, UpdateMealOptionRequest},
        import::import_from_text,
        repo_types::MealOption,
        services,
    },
    state::AppState,
};

pub fn option_routes() -> Router<AppState> {
    Router::new()
        .route("/meal-options", get(list_options).post(create_option))
        .route(
            "/meal-options/:id",
            get(get_option).put(update_option).delete(delete_option),
        )
}

/// Room above the file limit so oversized uploads reach our own check.
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/meal-options/import", post(import_options))
        .layer(DefaultBodyLimit::max(2 * MAX_SIZE_BYTES))
}

#[instrument(skip(state))]
pub async fn list_options(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> AppResult<Json<Vec<MealOption>>> {
    Ok(Json(services::list_options(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn get_option(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MealOption>> {
    Ok(Json(services::get_option(&state.db, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_option(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    JsonBody(payload): JsonBody<CreateMealOptionRequest>,
) -> AppResult<(StatusCode, Json<MealOption>)> {
    let option = services::create_option(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(option)))
}

#[instrument(skip(state, payload))]
pub async fn update_option(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateMealOptionRequest>,
) -> AppResult<Json<MealOption>> {
    Ok(Json(services::update_option(&state.db, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_option(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    services::delete_option(&state.db, id).await?;
    Ok(Json(json!({ "message": "MealOption deleted" })))
}

/// POST /meal-options/import (multipart, field `file`)
#[instrument(skip(state, mp))]
pub async fn import_options(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> AppResult<(StatusCode, Json<ImportResponse>)> {
    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let mime = resolve_mime(field.content_type(), field.file_name());
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((mime, data));
        break;
    }

    let (mime, data) = upload.ok_or_else(|| {
        AppError::validation("No file uploaded. Send the document in a 'file' field.")
    })?;
    if data.len() > MAX_SIZE_BYTES {
        warn!(%user_id, size = data.len(), "import file too large");
        return Err(AppError::PayloadTooLarge(
            "File exceeds the 5 MB size limit.".into(),
        ));
    }
    if !is_supported(&mime) {
        warn!(%user_id, %mime, "unsupported import type");
        return Err(AppError::validation(format!(
            "Unsupported file type: {mime}. Allowed: PDF, DOCX, MD, TXT."
        )));
    }

    // pdf/docx parsing is CPU-bound
    let text = tokio::task::spawn_blocking(move || extract_text(&mime, &data))
        .await
        .map_err(extraction_failed)??;
    info!(%user_id, chars = text.len(), "document text extracted");

    let result = import_from_text(&state.db, state.ai.as_ref(), &text).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// The PDF reader can panic on malformed input; that is an unreadable
/// document, not a server fault.
fn extraction_failed(e: tokio::task::JoinError) -> AppError {
    if e.is_panic() {
        warn!(error = %e, "text extraction panicked");
        AppError::Unprocessable("Could not extract text from file".into())
    } else {
        AppError::Internal(e.to_string())
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File exceeds the 5 MB size limit.".into())
    } else {
        AppError::validation(format!("Invalid multipart body: {}", e.body_text()))
    }
}
