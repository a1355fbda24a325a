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
use keeper_runtime::InventoryItem;

use crate::middleware::{authenticate, ensure_account};
use crate::response::{AppError, AppSuccess};
use crate::routes::characters::{ensure_character_access, load_character};
use crate::GlobalState;

pub fn item_routes() -> Router<GlobalState> {
    Router::new()
        .route("/character/{id}/items", post(create_item))
        .route("/character/{id}/items", get(list_items))
        .route("/item/{id}", put(update_item))
        .route("/item/{id}", delete(delete_item))
        .route_layer(middleware::from_fn(authenticate))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
    name: String,
    description: Option<String>,
    quantity: Option<i32>,
}

async fn create_item(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ItemPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;
    let character = load_character(&state, id).await?;
    ensure_character_access(&state, &character, &user).await?;

    if payload.name.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("name is required"),
        ));
    }

    let item = InventoryItem::new(
        character.id,
        &payload.name,
        payload.description.as_deref().unwrap_or(""),
        payload.quantity.unwrap_or(1),
    )
    .create(state.pool())
    .await?;

    Ok(AppSuccess::new(
        StatusCode::CREATED,
        "Item created successfully",
        json!(item),
    ))
}

async fn list_items(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, &user_id).await?;
    let character = load_character(&state, id).await?;

    let items = InventoryItem::find_by_criteria(
        QueryCriteria::new()
            .add_valued_filter("character", "=", character.id)
            .order_by("created_at", OrderDirection::Asc),
        state.pool(),
    )
    .await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Items fetched successfully",
        json!(items),
    ))
}

async fn update_item(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ItemPayload>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    let mut item = InventoryItem::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Item not found"),
    ))?;

    let character = load_character(&state, item.character).await?;
    ensure_character_access(&state, &character, &user).await?;

    item.name = payload.name.trim().to_string();
    if let Some(description) = payload.description {
        item.description = description.trim().to_string();
    }
    if let Some(quantity) = payload.quantity {
        item.quantity = quantity.max(0);
    }
    item.updated_at = get_current_timestamp();
    let item = item.update(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Item updated successfully",
        json!(item),
    ))
}

async fn delete_item(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state, &user_id).await?;

    let item = InventoryItem::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Item not found"),
    ))?;

    let character = load_character(&state, item.character).await?;
    ensure_character_access(&state, &character, &user).await?;
    item.delete(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Item deleted successfully",
        json!({ "id": id }),
    ))
}
