use anyhow::anyhow;
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Uuid;

use keeper_common::{get_current_timestamp, EnvVars};
use keeper_database::{QueryCriteria, SqlxCrud, SqlxFilterQuery};
use keeper_runtime::{User, UserRole};

use crate::env::ApiServerEnv;
use crate::middleware::{authenticate, ensure_account, seal_token};
use crate::response::{AppError, AppSuccess};
use crate::GlobalState;

pub fn user_routes() -> Router<GlobalState> {
    Router::new()
        .route("/user/register", post(register))
        .route(
            "/user/me",
            get(me).route_layer(middleware::from_fn(authenticate)),
        )
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    handle: String,
    display_name: String,
    role: Option<UserRole>,
}

async fn register(
    State(state): State<GlobalState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<AppSuccess, AppError> {
    if payload.handle.trim().is_empty() || payload.display_name.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("handle and displayName are required"),
        ));
    }

    let handle = payload.handle.trim().to_lowercase();
    let existing = User::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("handle", "=", handle.clone()),
        state.pool(),
    )
    .await?;
    if existing.is_some() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("handle is already taken"),
        ));
    }

    let role = payload.role.unwrap_or(UserRole::Player);
    let user = User::new(&handle, &payload.display_name, role)
        .create(state.pool())
        .await?;

    let env = ApiServerEnv::load();
    let token = seal_token(user.id, &env.get_env_var("SECRET_SALT"))?;

    Ok(AppSuccess::new(
        StatusCode::CREATED,
        "User registered successfully",
        json!({ "user": user, "token": token }),
    ))
}

async fn me(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<AppSuccess, AppError> {
    let mut user = ensure_account(&state, &user_id).await?;

    user.last_active = get_current_timestamp();
    let user = user.update(state.pool()).await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "User fetched successfully",
        json!(user),
    ))
}
