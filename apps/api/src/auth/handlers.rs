use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::user::SessionUser;
use crate::state::AppState;

/// GET /auth/current-user
pub async fn handle_current_user(auth: AuthUser) -> Json<SessionUser> {
    Json(auth.user)
}

/// GET /auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError> {
    state.sessions.revoke(&auth.token).await?;
    info!("User {} logged out", auth.user.id);
    Ok(Json(json!({ "status": "ok" })))
}
