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

use keeper_common::get_current_timestamp;
use keeper_database::{OrderDirection, QueryCriteria, SqlxCrud, SqlxFilterQuery};
use keeper_runtime::{
    roll_formula, ActiveEffect, EffectDuration, EffectKind, GaugeField, SessionEvent,
};

use crate::middleware::{authenticate, ensure_account, ensure_session_gm};
use crate::response::{AppError, AppSuccess};
use crate::routes::characters::{load_character, map_mutator_error};
use crate::GlobalState;

pub fn effect_routes() -> Router<GlobalState> {
    Router::new()
        .route("/characters/{id}/effects", post(apply_effect))
        .route("/characters/{id}/effects", get(list_effects))
        .route("/effects/{id}/expire", post(expire_effect))
        .route_layer(middleware::from_fn(authenticate))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EffectTypeTag {
    Buff,
    Debuff,
    Damage,
    SanityLoss,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyEffectPayload {
    #[serde(rename = "type")]
    kind: EffectTypeTag,
    name: String,
    description: Option<String>,
    value: String,
    duration: Option<EffectDuration>,
}

/// Resolves the magnitude of an effect value: a plain signed integer, or a
/// dice formula the engine rolls on the spot.
fn resolve_magnitude(value: &str) -> Result<i32, AppError> {
    if let Ok(magnitude) = value.trim().parse::<i32>() {
        return Ok(magnitude);
    }
    let output = roll_formula(value)
        .map_err(|e| AppError::new(StatusCode::BAD_REQUEST, anyhow!(e)))?;
    i32::try_from(output.total)
        .map_err(|_| AppError::new(StatusCode::BAD_REQUEST, anyhow!("value out of range")))
}

async fn apply_effect(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApplyEffectPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;
    let character = load_character(&state, id).await?;
    ensure_session_gm(&state, character.session, &user).await?;

    if payload.name.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("name is required"),
        ));
    }

    let magnitude = resolve_magnitude(&payload.value)?;

    // Damage and sanity loss route through the mutator first: gauge change,
    // status re-derive and `character_updated` are one atomic unit. The
    // ledger row is the record of the event itself.
    let kind = match payload.kind {
        EffectTypeTag::Damage => {
            state
                .mutator
                .apply_delta(
                    state.pool(),
                    &state.broadcast,
                    character.id,
                    GaugeField::HitPoints,
                    -magnitude.abs(),
                    Some(user.id),
                )
                .await
                .map_err(map_mutator_error)?;
            EffectKind::Damage {
                amount: magnitude.abs(),
            }
        }
        EffectTypeTag::SanityLoss => {
            state
                .mutator
                .apply_delta(
                    state.pool(),
                    &state.broadcast,
                    character.id,
                    GaugeField::Sanity,
                    -magnitude.abs(),
                    Some(user.id),
                )
                .await
                .map_err(map_mutator_error)?;
            EffectKind::SanityLoss {
                amount: magnitude.abs(),
            }
        }
        EffectTypeTag::Buff => EffectKind::Buff {
            modifier: magnitude,
        },
        EffectTypeTag::Debuff => EffectKind::Debuff {
            modifier: magnitude,
            severity: None,
            auto: false,
        },
    };

    let effect = ActiveEffect::record(
        character.id,
        kind,
        &payload.name,
        payload.description.as_deref().unwrap_or(""),
        &payload.value,
        payload.duration,
        Some(user.id),
    )
    .create(state.pool())
    .await?;

    state
        .broadcast
        .broadcast(
            character.session,
            SessionEvent::effect_applied(json!({
                "characterId": character.id,
                "effect": effect,
            })),
        )
        .await;

    Ok(AppSuccess::new(
        StatusCode::CREATED,
        "Effect applied successfully",
        json!(effect),
    ))
}

async fn list_effects(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, &user_id).await?;
    let character = load_character(&state, id).await?;

    let effects = ActiveEffect::find_by_criteria(
        QueryCriteria::new()
            .add_valued_filter("character", "=", character.id)
            .add_valued_filter("is_active", "=", true)
            .order_by("created_at", OrderDirection::Desc),
        state.pool(),
    )
    .await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Effects fetched successfully",
        json!(effects),
    ))
}

/// Expiry keeps the row for history and only drops the active flag.
async fn expire_effect(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    let mut effect = ActiveEffect::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Effect not found"),
    ))?;

    let character = load_character(&state, effect.character).await?;
    ensure_session_gm(&state, character.session, &user).await?;

    effect.is_active = false;
    effect.updated_at = get_current_timestamp();
    let effect = effect.update(state.pool()).await?;

    state
        .broadcast
        .broadcast(
            character.session,
            SessionEvent::effect_applied(json!({
                "characterId": character.id,
                "effect": effect,
            })),
        )
        .await;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Effect expired successfully",
        json!(effect),
    ))
}
