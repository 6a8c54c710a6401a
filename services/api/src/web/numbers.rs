//! services/api/src/web/numbers.rs
//!
//! The phone pool endpoint backing the "Vote by Phone Number" dropdown.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use textpoll_core::phone;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::failure::ApiFailure;
use crate::web::polls::available_pool;
use crate::web::state::AppState;

#[derive(Deserialize)]
pub struct NumbersParams {
    /// When editing, the poll whose current binding stays selectable.
    pub poll_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct PoolNumber {
    pub e164: String,
    pub display: String,
}

/// GET /phone-numbers - the currently available pool.
#[utoipa::path(
    get,
    path = "/phone-numbers",
    params(("poll_id" = Option<Uuid>, Query,
        description = "Include this poll's own binding in the result")),
    responses(
        (status = 200, description = "Available numbers", body = [PoolNumber]),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "poll_id does not exist")
    ),
    security(("bearer" = []))
)]
pub async fn available_numbers_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NumbersParams>,
) -> Result<impl IntoResponse, ApiFailure> {
    let now = Utc::now();

    let keep = match params.poll_id {
        Some(poll_id) => state.store.get_poll(poll_id).await?.phone_number,
        None => None,
    };

    let numbers: Vec<PoolNumber> = available_pool(&state, keep.as_deref(), now)
        .await?
        .into_iter()
        .map(|e164| PoolNumber {
            // Pool entries were validated at startup, so formatting can
            // only fail if the metadata set shrinks; fall back to E.164.
            display: phone::display_form(&e164).unwrap_or_else(|_| e164.clone()),
            e164,
        })
        .collect();

    Ok(Json(numbers))
}
