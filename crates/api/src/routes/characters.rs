use std::collections::BTreeMap;

use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::{Json as SqlxJson, Uuid};

use keeper_common::get_current_timestamp;
use keeper_database::{OrderDirection, QueryCriteria, SqlxCrud, SqlxFilterQuery};
use keeper_runtime::{
    ActiveEffect, Character, Characteristics, GameSession, GaugeField, MutatorError,
    SanityCondition, User, UserRole,
};

use crate::middleware::{authenticate, ensure_account, ensure_session_gm};
use crate::response::{AppError, AppSuccess};
use crate::GlobalState;

pub fn character_routes() -> Router<GlobalState> {
    Router::new()
        .route("/character", post(create_character))
        .route("/session/{id}/characters", get(list_session_characters))
        .route("/character/{id}", get(get_character))
        .route("/character/{id}", patch(patch_character))
        .route("/character/{id}", delete(delete_character))
        .route_layer(middleware::from_fn(authenticate))
}

pub(crate) async fn load_character(
    state: &GlobalState,
    id: Uuid,
) -> Result<Character, AppError> {
    Character::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Character not found"),
    ))
}

/// GM of the owning session, the owning player, or an admin.
pub(crate) async fn ensure_character_access(
    state: &GlobalState,
    character: &Character,
    user: &User,
) -> Result<GameSession, AppError> {
    let session = GameSession::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", character.session),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Session not found"),
    ))?;

    let is_gm = user.role == UserRole::Admin || session.gm == user.id;
    let is_owner = character.player == Some(user.id);
    if is_gm || is_owner {
        Ok(session)
    } else {
        Err(AppError::new(
            StatusCode::FORBIDDEN,
            anyhow!("You are not authorized to act on this character"),
        ))
    }
}

pub(crate) async fn character_sheet(
    state: &GlobalState,
    character: &Character,
) -> Result<serde_json::Value, AppError> {
    let effects = ActiveEffect::find_by_criteria(
        QueryCriteria::new()
            .add_valued_filter("character", "=", character.id)
            .add_valued_filter("is_active", "=", true)
            .order_by("created_at", OrderDirection::Desc),
        state.pool(),
    )
    .await?;

    let conditions = SanityCondition::find_by_criteria(
        QueryCriteria::new()
            .add_valued_filter("character", "=", character.id)
            .add_valued_filter("is_active", "=", true)
            .order_by("created_at", OrderDirection::Desc),
        state.pool(),
    )
    .await?;

    Ok(json!({
        "character": character,
        "activeEffects": effects,
        "sanityConditions": conditions,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCharacterPayload {
    session: Uuid,
    name: String,
    occupation: Option<String>,
    characteristics: Characteristics,
    skills: Option<BTreeMap<String, i32>>,
    money: Option<i64>,
}

async fn create_character(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<CreateCharacterPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    let session = GameSession::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", payload.session),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Session not found"),
    ))?;

    if payload.name.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("name is required"),
        ));
    }

    // The GM's characters are unowned NPCs; everyone else plays their own
    // investigator. Skills lock as part of creation.
    let player = if session.gm == user.id {
        None
    } else {
        Some(user.id)
    };

    let character = Character::new(
        session.id,
        player,
        &payload.name,
        payload.occupation.as_deref().unwrap_or(""),
        payload.characteristics,
        payload.skills.unwrap_or_default(),
        payload.money.unwrap_or(0),
    )
    .create(state.pool())
    .await?;

    Ok(AppSuccess::new(
        StatusCode::CREATED,
        "Character created successfully",
        json!(character),
    ))
}

async fn list_session_characters(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, &user_id).await?;

    let characters = Character::find_by_criteria(
        QueryCriteria::new()
            .add_valued_filter("session", "=", id)
            .add_valued_filter("is_active", "=", true)
            .order_by("created_at", OrderDirection::Asc),
        state.pool(),
    )
    .await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Characters fetched successfully",
        json!(characters),
    ))
}

async fn get_character(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, &user_id).await?;

    let character = load_character(&state, id).await?;
    let sheet = character_sheet(&state, &character).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Character fetched successfully",
        sheet,
    ))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchCharacterPayload {
    name: Option<String>,
    occupation: Option<String>,
    money: Option<i64>,
    skills: Option<BTreeMap<String, i32>>,
    hit_points: Option<i32>,
    sanity: Option<i32>,
    magic_points: Option<i32>,
    luck: Option<i32>,
}

async fn patch_character(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PatchCharacterPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;
    let mut character = load_character(&state, id).await?;
    let session = ensure_character_access(&state, &character, &user).await?;

    let is_gm = user.role == UserRole::Admin || session.gm == user.id;

    let mut dirty = false;
    if let Some(name) = payload.name {
        character.name = name.trim().to_string();
        dirty = true;
    }
    if let Some(occupation) = payload.occupation {
        character.occupation = occupation.trim().to_string();
        dirty = true;
    }
    if let Some(money) = payload.money {
        character.money = money;
        dirty = true;
    }
    if let Some(skills) = payload.skills {
        if character.skills_locked && !is_gm {
            return Err(AppError::new(
                StatusCode::FORBIDDEN,
                anyhow!("Skills are locked after creation"),
            ));
        }
        character.skills =
            SqlxJson(skills.into_iter().map(|(k, v)| (k, v.clamp(0, 100))).collect());
        dirty = true;
    }
    if dirty {
        character.updated_at = get_current_timestamp();
        character = character.update(state.pool()).await?;
    }

    // Gauge targets route through the mutator so the status set is
    // re-derived and broadcast exactly like any other stat change.
    let gauges = [
        (GaugeField::HitPoints, payload.hit_points, character.hit_points),
        (GaugeField::Sanity, payload.sanity, character.sanity),
        (
            GaugeField::MagicPoints,
            payload.magic_points,
            character.magic_points,
        ),
        (GaugeField::Luck, payload.luck, character.luck),
    ];
    for (field, target, current) in gauges {
        let Some(target) = target else { continue };
        let outcome = state
            .mutator
            .apply_delta(
                state.pool(),
                &state.broadcast,
                character.id,
                field,
                target - current,
                Some(user.id),
            )
            .await
            .map_err(map_mutator_error)?;
        character = outcome.character;
    }

    let sheet = character_sheet(&state, &character).await?;
    Ok(AppSuccess::new(
        StatusCode::OK,
        "Character updated successfully",
        sheet,
    ))
}

async fn delete_character(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;
    let mut character = load_character(&state, id).await?;
    ensure_session_gm(&state, character.session, &user).await?;

    // Soft delete; the row only disappears with its session.
    character.is_active = false;
    character.updated_at = get_current_timestamp();
    character.update(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Character deleted successfully",
        json!({ "id": id }),
    ))
}

pub(crate) fn map_mutator_error(err: MutatorError) -> AppError {
    match err {
        MutatorError::NotFound(id) => AppError::new(
            StatusCode::NOT_FOUND,
            anyhow!("Character {id} not found"),
        ),
        MutatorError::Database(e) => {
            AppError::new(StatusCode::INTERNAL_SERVER_ERROR, anyhow!(e))
        }
    }
}
