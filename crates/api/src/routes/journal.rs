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
use keeper_runtime::{GameSession, JournalEntry, UserRole};

use crate::middleware::{authenticate, ensure_account, ensure_session_gm};
use crate::response::{AppError, AppSuccess};
use crate::GlobalState;

pub fn journal_routes() -> Router<GlobalState> {
    Router::new()
        .route("/session/{id}/journal", post(create_entry))
        .route("/session/{id}/journal", get(list_entries))
        .route("/journal/{id}", put(update_entry))
        .route("/journal/{id}", delete(delete_entry))
        .route_layer(middleware::from_fn(authenticate))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalPayload {
    title: String,
    body: Option<String>,
    is_secret: Option<bool>,
}

async fn create_entry(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JournalPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    let session = GameSession::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Session not found"),
    ))?;

    if payload.title.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("title is required"),
        ));
    }

    // Only the GM can pen secret entries.
    let is_secret = payload.is_secret.unwrap_or(false);
    if is_secret && session.gm != user.id && user.role != UserRole::Admin {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            anyhow!("Only the GM may write secret entries"),
        ));
    }

    let entry = JournalEntry::new(
        session.id,
        user.id,
        &payload.title,
        payload.body.as_deref().unwrap_or(""),
        is_secret,
    )
    .create(state.pool())
    .await?;

    Ok(AppSuccess::new(
        StatusCode::CREATED,
        "Journal entry created successfully",
        json!(entry),
    ))
}

async fn list_entries(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    let session = GameSession::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Session not found"),
    ))?;

    let is_gm = session.gm == user.id || user.role == UserRole::Admin;
    let mut criteria = QueryCriteria::new()
        .add_valued_filter("session", "=", id)
        .order_by("created_at", OrderDirection::Desc);
    if !is_gm {
        criteria = criteria.add_valued_filter("is_secret", "=", false);
    }

    let entries = JournalEntry::find_by_criteria(criteria, state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Journal entries fetched successfully",
        json!(entries),
    ))
}

async fn update_entry(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JournalPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    let mut entry = JournalEntry::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Journal entry not found"),
    ))?;

    // Authors may edit their own entries; the GM may edit any.
    if entry.author != user.id {
        ensure_session_gm(&state, entry.session, &user).await?;
    }

    entry.title = payload.title.trim().to_string();
    if let Some(body) = payload.body {
        entry.body = body;
    }
    if let Some(is_secret) = payload.is_secret {
        entry.is_secret = is_secret;
    }
    entry.updated_at = get_current_timestamp();
    let entry = entry.update(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Journal entry updated successfully",
        json!(entry),
    ))
}

async fn delete_entry(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    let entry = JournalEntry::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Journal entry not found"),
    ))?;

    if entry.author != user.id {
        ensure_session_gm(&state, entry.session, &user).await?;
    }
    entry.delete(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Journal entry deleted successfully",
        json!({ "id": id }),
    ))
}
