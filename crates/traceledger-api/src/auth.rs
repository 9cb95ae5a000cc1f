//! Bearer-token issuance and verification. Credential validation itself
//! (matching a username/password against an identity store) is out of
//! scope here and delegated to whatever external collaborator issues the
//! login call; this module only signs and checks the token that results.

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use traceledger_core::Error;
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

pub fn issue_token(secret: &str, expiry_seconds: u64, subject: &str) -> Result<String, Error> {
    let exp = (chrono::Utc::now() + chrono::Duration::seconds(expiry_seconds as i64)).timestamp();
    let claims = Claims { sub: subject.to_string(), exp };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| Error::Internal(format!("failed to sign token: {e}")))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, Error> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| Error::Authorization(format!("invalid bearer token: {e}")))
}

/// Rejects any request without a valid `Authorization: Bearer <token>`
/// header. Installed on every route except `/auth/login` and the
/// health/operations endpoints.
pub async fn require_bearer_token(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            warn!("rejected request with missing bearer token");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    match verify_token(&state.config.auth.token_secret, token) {
        Ok(_claims) => Ok(next.run(request).await),
        Err(e) => {
            warn!(error = %e, "rejected request with invalid bearer token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
