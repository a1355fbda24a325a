use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Uuid;

use keeper_database::{OrderDirection, QueryCriteria, SqlxCrud, SqlxFilterQuery};
use keeper_runtime::{
    classify_percentile, roll_formula, GameSession, RollHistory, SessionEvent, UserRole,
};

use crate::middleware::{authenticate, ensure_account};
use crate::response::{AppError, AppSuccess};
use crate::routes::characters::{ensure_character_access, load_character};
use crate::GlobalState;

pub fn roll_routes() -> Router<GlobalState> {
    Router::new()
        .route("/character/{id}/roll", post(roll_for_character))
        .route("/session/{id}/rolls", get(list_session_rolls))
        .route_layer(middleware::from_fn(authenticate))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollPayload {
    formula: String,
    skill_name: Option<String>,
    is_secret: Option<bool>,
}

async fn roll_for_character(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RollPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;
    let character = load_character(&state, id).await?;
    ensure_character_access(&state, &character, &user).await?;

    // A malformed formula is the player's problem, not the server's: 400
    // with a readable message, never a crash.
    let output = roll_formula(&payload.formula)
        .map_err(|e| AppError::new(StatusCode::BAD_REQUEST, anyhow!(e)))?;

    let skill = payload.skill_name.as_ref().and_then(|name| {
        character
            .skill_value(name)
            .map(|value| (name.clone(), value))
    });
    let outcome = skill
        .as_ref()
        .map(|(_, value)| classify_percentile(output.total, *value));

    let is_secret = payload.is_secret.unwrap_or(false);
    let roll = RollHistory::record(
        character.session,
        Some(character.id),
        user.id,
        &payload.formula,
        &output,
        skill,
        outcome,
        is_secret,
    )
    .create(state.pool())
    .await?;

    // GM-secret rolls stay off the table stream.
    if !is_secret {
        state
            .broadcast
            .broadcast(character.session, SessionEvent::roll_result(json!(roll)))
            .await;
    }

    Ok(AppSuccess::new(
        StatusCode::CREATED,
        "Roll recorded successfully",
        json!(roll),
    ))
}

async fn list_session_rolls(
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
        .order_by("created_at", OrderDirection::Desc)
        .limit(100);
    if !is_gm {
        criteria = criteria.add_valued_filter("is_secret", "=", false);
    }

    let rolls = RollHistory::find_by_criteria(criteria, state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Rolls fetched successfully",
        json!(rolls),
    ))
}
