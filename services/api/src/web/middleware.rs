//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting the poll-authoring routes.
//!
//! Author tokens are issued by the external identity provider and signed
//! with the shared secret; this service only verifies them. Token
//! issuance is out of scope here.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::token::decode_voter_claims;
use crate::web::state::AppState;

/// The authenticated poll author, inserted into request extensions.
#[derive(Debug, Clone, Copy)]
pub struct AuthorId(pub Uuid);

/// Middleware that validates the `Authorization: Bearer` token and
/// extracts the author's id.
///
/// If valid, inserts an [`AuthorId`] into request extensions for handlers
/// to use. If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the Authorization header
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Strip the Bearer prefix
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. Verify the token signature, expiry, and audience
    let claims = decode_voter_claims(&state.config.jwt_secret, token).map_err(|e| {
        warn!("rejected bearer token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    // 4. Insert the author id into request extensions
    req.extensions_mut().insert(AuthorId(claims.sub));

    // 5. Continue to the handler
    Ok(next.run(req).await)
}
