use anyhow::anyhow;
use axum::body::Body;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::{extract::Request, response::Response};
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use keeper_common::{decrypt, encrypt, get_current_timestamp, EnvVars};
use keeper_database::{QueryCriteria, SqlxFilterQuery};
use keeper_runtime::{GameSession, User, UserRole};

use crate::env::ApiServerEnv;
use crate::response::AppError;
use crate::utils::extract_bearer_token;
use crate::GlobalState;

/// Tokens older than this are rejected; clients re-register to refresh.
const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedRequest {
    pub user_id: Uuid,
    pub timestamp: i64,
}

/// Seals a bearer token for `user_id` under the server's secret salt.
pub fn seal_token(user_id: Uuid, salt: &str) -> Result<String, AppError> {
    let payload = serde_json::to_string(&AuthenticatedRequest {
        user_id,
        timestamp: get_current_timestamp(),
    })?;
    encrypt(&payload, salt)
        .map_err(|e| AppError::new(StatusCode::INTERNAL_SERVER_ERROR, anyhow!(e)))
}

/// Decrypts the bearer token and injects the caller's user id into request
/// extensions. Requests without a valid token proceed with a nil id;
/// `ensure_account` turns that into a 401 on protected handlers.
pub async fn authenticate(mut req: Request, next: Next) -> Result<Response<Body>, AppError> {
    let env = ApiServerEnv::load();
    let user_id = extract_bearer_token(&req)
        .and_then(|token| {
            decrypt(&token, &env.get_env_var("SECRET_SALT"))
                .map_err(|e| AppError::new(StatusCode::UNAUTHORIZED, anyhow!(e)))
        })
        .and_then(|decrypted| {
            serde_json::from_str::<AuthenticatedRequest>(&decrypted)
                .map_err(|e| AppError::new(StatusCode::UNAUTHORIZED, anyhow!(e)))
        })
        .and_then(|authenticated_request| {
            if authenticated_request.timestamp < get_current_timestamp() - TOKEN_TTL_SECS {
                return Err(AppError::new(
                    StatusCode::UNAUTHORIZED,
                    anyhow!("authentication expired"),
                ));
            }
            Ok(authenticated_request.user_id)
        })
        .unwrap_or(Uuid::nil());

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

pub async fn ensure_account(state: &GlobalState, user_id: &Uuid) -> Result<User, AppError> {
    if user_id.is_nil() {
        return Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            anyhow!("not authenticated"),
        ));
    }

    User::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", *user_id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::UNAUTHORIZED,
        anyhow!("unknown account"),
    ))
}

/// Loads the session and verifies the caller runs it. Admins pass.
pub async fn ensure_session_gm(
    state: &GlobalState,
    session_id: Uuid,
    user: &User,
) -> Result<GameSession, AppError> {
    let session = GameSession::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("id", "=", session_id),
        state.pool(),
    )
    .await?
    .ok_or(AppError::new(
        StatusCode::NOT_FOUND,
        anyhow!("Session not found"),
    ))?;

    if user.role == UserRole::Admin || session.gm == user.id {
        Ok(session)
    } else {
        Err(AppError::new(
            StatusCode::FORBIDDEN,
            anyhow!("Only the GM may do this"),
        ))
    }
}
