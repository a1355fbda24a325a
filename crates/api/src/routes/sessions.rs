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
use sqlx::types::{Json as SqlxJson, Uuid};

use keeper_common::get_current_timestamp;
use keeper_database::{OrderDirection, QueryCriteria, SqlxCrud, SqlxFilterQuery};
use keeper_runtime::{GameSession, ProjectionState, SessionEvent, SessionStatus};

use crate::middleware::{authenticate, ensure_account, ensure_session_gm};
use crate::response::{AppError, AppSuccess};
use crate::GlobalState;

pub fn session_routes() -> Router<GlobalState> {
    Router::new()
        .route("/session", post(create_session))
        .route("/sessions", get(list_sessions))
        .route("/session/{id}", get(get_session))
        .route("/session/{id}", put(update_session))
        .route("/session/{id}", delete(delete_session))
        .route("/session/join", post(join_session))
        .route("/session/{id}/projection", put(update_projection))
        .route_layer(middleware::from_fn(authenticate))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionPayload {
    name: String,
    description: Option<String>,
}

async fn create_session(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<CreateSessionPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    if payload.name.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("name is required"),
        ));
    }

    // Join codes are random; retry on the rare collision with an existing
    // session before giving up.
    let mut session = GameSession::new(
        &payload.name,
        payload.description.as_deref().unwrap_or(""),
        user.id,
    );
    for _ in 0..3 {
        let clash = GameSession::find_one_by_criteria(
            QueryCriteria::new().add_valued_filter("join_code", "=", session.join_code.clone()),
            state.pool(),
        )
        .await?;
        if clash.is_none() {
            break;
        }
        session.join_code = GameSession::generate_join_code();
    }

    let session = session.create(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::CREATED,
        "Session created successfully",
        json!(session),
    ))
}

async fn list_sessions(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    let sessions = GameSession::find_by_criteria(
        QueryCriteria::new()
            .add_valued_filter("gm", "=", user.id)
            .order_by("created_at", OrderDirection::Desc),
        state.pool(),
    )
    .await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Sessions fetched successfully",
        json!(sessions),
    ))
}

async fn get_session(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, &user_id).await?;

    let session = GameSession::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Session not found"),
    ))?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Session fetched successfully",
        json!(session),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionPayload {
    name: Option<String>,
    description: Option<String>,
    status: Option<SessionStatus>,
}

async fn update_session(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSessionPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;
    let mut session = ensure_session_gm(&state, id, &user).await?;

    if let Some(name) = payload.name {
        session.name = name.trim().to_string();
    }
    if let Some(description) = payload.description {
        session.description = description.trim().to_string();
    }
    if let Some(status) = payload.status {
        session.status = status;
    }
    session.updated_at = get_current_timestamp();
    let session = session.update(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Session updated successfully",
        json!(session),
    ))
}

async fn delete_session(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;
    let session = ensure_session_gm(&state, id, &user).await?;

    // Characters, chapters, journal entries and their sub-records go with
    // it through the FK cascade.
    session.delete(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Session deleted successfully",
        json!({ "id": id }),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionPayload {
    code: String,
}

async fn join_session(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<JoinSessionPayload>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, &user_id).await?;

    let code = payload.code.trim().to_uppercase();
    let session = GameSession::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("join_code", "=", code),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("No session with that join code"),
    ))?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Session joined successfully",
        json!(session),
    ))
}

async fn update_projection(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectionState>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;
    let mut session = ensure_session_gm(&state, id, &user).await?;

    session.projection = SqlxJson(payload);
    session.updated_at = get_current_timestamp();
    let session = session.update(state.pool()).await?;

    state
        .broadcast
        .broadcast(
            session.id,
            SessionEvent::projection_update(json!(session.projection.0)),
        )
        .await;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Projection updated successfully",
        json!(session),
    ))
}
