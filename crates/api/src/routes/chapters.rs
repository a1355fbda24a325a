use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Uuid;

use keeper_common::get_current_timestamp;
use keeper_database::{OrderDirection, QueryCriteria, SqlxCrud, SqlxFilterQuery};
use keeper_runtime::Chapter;

use crate::middleware::{authenticate, ensure_account, ensure_session_gm};
use crate::response::{AppError, AppSuccess};
use crate::GlobalState;

pub fn chapter_routes() -> Router<GlobalState> {
    Router::new()
        .route("/session/{id}/chapters", post(create_chapter))
        .route("/session/{id}/chapters", get(list_chapters))
        .route("/chapter/{id}", put(update_chapter))
        .route("/chapter/{id}", delete(delete_chapter))
        .route_layer(middleware::from_fn(authenticate))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPayload {
    title: String,
    summary: Option<String>,
    ordinal: Option<i32>,
    is_current: Option<bool>,
}

async fn create_chapter(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChapterPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;
    let session = ensure_session_gm(&state, id, &user).await?;

    if payload.title.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("title is required"),
        ));
    }

    let mut chapter = Chapter::new(
        session.id,
        &payload.title,
        payload.summary.as_deref().unwrap_or(""),
        payload.ordinal.unwrap_or(0),
    );
    chapter.is_current = payload.is_current.unwrap_or(false);
    let chapter = chapter.create(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::CREATED,
        "Chapter created successfully",
        json!(chapter),
    ))
}

async fn list_chapters(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, &user_id).await?;

    let chapters = Chapter::find_by_criteria(
        QueryCriteria::new()
            .add_valued_filter("session", "=", id)
            .order_by("ordinal", OrderDirection::Asc),
        state.pool(),
    )
    .await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Chapters fetched successfully",
        json!(chapters),
    ))
}

async fn update_chapter(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChapterPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    let mut chapter = Chapter::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Chapter not found"),
    ))?;

    ensure_session_gm(&state, chapter.session, &user).await?;

    chapter.title = payload.title.trim().to_string();
    if let Some(summary) = payload.summary {
        chapter.summary = summary.trim().to_string();
    }
    if let Some(ordinal) = payload.ordinal {
        chapter.ordinal = ordinal;
    }
    if let Some(is_current) = payload.is_current {
        chapter.is_current = is_current;
    }
    chapter.updated_at = get_current_timestamp();
    let chapter = chapter.update(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Chapter updated successfully",
        json!(chapter),
    ))
}

async fn delete_chapter(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    let chapter = Chapter::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Chapter not found"),
    ))?;

    ensure_session_gm(&state, chapter.session, &user).await?;
    chapter.delete(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Chapter deleted successfully",
        json!({ "id": id }),
    ))
}
