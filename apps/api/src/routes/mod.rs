pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::contracts::handlers as contracts;
use crate::state::AppState;

/// Headroom for multipart framing and the `contractType` field on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Contracts API
        .route("/contracts/detect-type", post(contracts::handle_detect_type))
        .route("/contracts/analyze", post(contracts::handle_analyze))
        .route(
            "/contracts/user-contracts",
            get(contracts::handle_user_contracts),
        )
        .route(
            "/contracts/contract/:id",
            get(contracts::handle_get_contract).delete(contracts::handle_delete_contract),
        )
        .route("/contracts/summary", get(contracts::handle_summary))
        // Session API
        .route("/auth/current-user", get(auth::handle_current_user))
        .route("/auth/logout", get(auth::handle_logout))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
