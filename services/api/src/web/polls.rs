//! services/api/src/web/polls.rs
//!
//! Poll authoring and the public poll read model.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use textpoll_core::domain::{page_bounds, NewPoll, Poll, PollPatch, VoteOptions};
use textpoll_core::options::{leading_label, total_votes, zero_counts};
use textpoll_core::phone;
use textpoll_core::validate::{validate_options, validate_poll_fields};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::failure::ApiFailure;
use crate::web::middleware::AuthorId;
use crate::web::state::AppState;

const POLLS_PER_PAGE: u32 = 3;

//=========================================================================================
// Request and Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreatePollRequest {
    pub title: String,
    pub description: Option<String>,
    /// 2–6 unique option labels, in ballot order.
    pub vote_options: Vec<String>,
    pub end_date: DateTime<Utc>,
    /// An E.164 number from the configured pool, or empty/absent to
    /// leave SMS voting disabled.
    pub phone_number: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePollRequest {
    pub title: String,
    pub description: Option<String>,
    pub end_date: DateTime<Utc>,
    pub phone_number: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PollSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub end_date: DateTime<Utc>,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_expired: bool,
}

impl PollSummary {
    fn assemble(poll: Poll, now: DateTime<Utc>) -> Self {
        Self {
            is_expired: poll.is_expired(now),
            id: poll.id,
            title: poll.title,
            description: poll.description,
            end_date: poll.end_date,
            phone_number: poll.phone_number,
            created_at: poll.created_at,
        }
    }
}

/// The full read model the vote page renders: the summary plus the option
/// counts and derived results.
#[derive(Serialize, ToSchema)]
pub struct PollView {
    #[serde(flatten)]
    #[schema(inline)]
    pub summary: PollSummary,
    /// Option label → `{position, vote_count}`.
    #[schema(value_type = Object)]
    pub options: VoteOptions,
    pub total_votes: i64,
    pub leading_option: Option<String>,
}

impl PollView {
    fn assemble(poll: Poll, options: VoteOptions, now: DateTime<Utc>) -> Self {
        Self {
            total_votes: total_votes(&options),
            leading_option: leading_label(&options).map(str::to_string),
            summary: PollSummary::assemble(poll, now),
            options,
        }
    }
}

#[derive(Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
}

//=========================================================================================
// Pool Computation
//=========================================================================================

/// The configured numbers minus those bound to unexpired polls, with an
/// optional carve-out for a poll's own current binding.
pub(crate) async fn available_pool(
    state: &AppState,
    keep: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<String>, ApiFailure> {
    let bound = state.store.bound_numbers(now).await?;
    Ok(phone::available_numbers(
        &state.config.phone_numbers,
        &bound,
        keep,
    ))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /polls - create a poll with a zero-initialized option set.
#[utoipa::path(
    post,
    path = "/polls",
    request_body = CreatePollRequest,
    responses(
        (status = 201, description = "Poll created", body = PollView),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 409, description = "Phone number was bound by a concurrent poll"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer" = []))
)]
pub async fn create_poll_handler(
    State(state): State<Arc<AppState>>,
    Extension(author): Extension<AuthorId>,
    Json(req): Json<CreatePollRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let now = Utc::now();

    // 1. Validate the option labels and the shared poll fields
    let labels = validate_options(&req.vote_options)?;
    let available = available_pool(&state, None, now).await?;
    let phone_number = validate_poll_fields(
        &req.title,
        req.end_date,
        req.phone_number.as_deref(),
        &available,
        now,
    )?;

    // 2. Every option starts at zero votes, positions in ballot order
    let options = zero_counts(&labels);

    // 3. Persist poll and option set together; a pool race surfaces as 409
    let new_poll = NewPoll {
        owner_id: author.0,
        title: req.title.trim().to_string(),
        description: req.description.filter(|d| !d.trim().is_empty()),
        end_date: req.end_date,
        phone_number,
    };
    let poll = state.store.create_poll(&new_poll, &options).await?;

    Ok((
        StatusCode::CREATED,
        Json(PollView::assemble(poll, options, now)),
    ))
}

/// GET /polls/{id} - the public read model for a single poll.
#[utoipa::path(
    get,
    path = "/polls/{id}",
    params(("id" = Uuid, Path, description = "The poll id")),
    responses(
        (status = 200, description = "The poll with live results", body = PollView),
        (status = 404, description = "No such poll")
    )
)]
pub async fn get_poll_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiFailure> {
    let now = Utc::now();
    let poll = state.store.get_poll(poll_id).await?;
    let options = state.store.get_options(poll_id).await?;
    Ok(Json(PollView::assemble(poll, options, now)))
}

/// GET /polls?page=N - the author's polls, newest first.
#[utoipa::path(
    get,
    path = "/polls",
    params(("page" = Option<u32>, Query, description = "Zero-based page number")),
    responses(
        (status = 200, description = "One page of the author's polls", body = [PollSummary]),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearer" = []))
)]
pub async fn list_polls_handler(
    State(state): State<Arc<AppState>>,
    Extension(author): Extension<AuthorId>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiFailure> {
    let now = Utc::now();
    let (from, to) = page_bounds(params.page.unwrap_or(0), POLLS_PER_PAGE);
    let polls = state
        .store
        .list_polls_by_owner(author.0, from, to - from + 1)
        .await?;
    let summaries: Vec<PollSummary> = polls
        .into_iter()
        .map(|poll| PollSummary::assemble(poll, now))
        .collect();
    Ok(Json(summaries))
}

/// PUT /polls/{id} - owner edit. Options are immutable and not accepted.
#[utoipa::path(
    put,
    path = "/polls/{id}",
    params(("id" = Uuid, Path, description = "The poll id")),
    request_body = UpdatePollRequest,
    responses(
        (status = 200, description = "Poll updated", body = PollSummary),
        (status = 403, description = "Not the poll owner"),
        (status = 404, description = "No such poll"),
        (status = 409, description = "Phone number was bound by a concurrent poll"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer" = []))
)]
pub async fn update_poll_handler(
    State(state): State<Arc<AppState>>,
    Extension(author): Extension<AuthorId>,
    Path(poll_id): Path<Uuid>,
    Json(req): Json<UpdatePollRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let now = Utc::now();

    let existing = state.store.get_poll(poll_id).await?;
    if existing.owner_id != author.0 {
        return Err(ApiFailure::new(
            StatusCode::FORBIDDEN,
            "Only the poll owner can edit this poll",
        ));
    }

    // The poll's own binding stays selectable while every other active
    // binding is excluded.
    let available = available_pool(&state, existing.phone_number.as_deref(), now).await?;
    let phone_number = validate_poll_fields(
        &req.title,
        req.end_date,
        req.phone_number.as_deref(),
        &available,
        now,
    )?;

    let patch = PollPatch {
        title: req.title.trim().to_string(),
        description: req.description.filter(|d| !d.trim().is_empty()),
        end_date: req.end_date,
        phone_number,
    };
    let poll = state.store.update_poll(poll_id, author.0, &patch).await?;

    Ok(Json(PollSummary::assemble(poll, now)))
}

/// DELETE /polls/{id} - owner delete.
#[utoipa::path(
    delete,
    path = "/polls/{id}",
    params(("id" = Uuid, Path, description = "The poll id")),
    responses(
        (status = 204, description = "Poll deleted"),
        (status = 403, description = "Not the poll owner"),
        (status = 404, description = "No such poll")
    ),
    security(("bearer" = []))
)]
pub async fn delete_poll_handler(
    State(state): State<Arc<AppState>>,
    Extension(author): Extension<AuthorId>,
    Path(poll_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiFailure> {
    let existing = state.store.get_poll(poll_id).await?;
    if existing.owner_id != author.0 {
        return Err(ApiFailure::new(
            StatusCode::FORBIDDEN,
            "Only the poll owner can delete this poll",
        ));
    }
    state.store.delete_poll(poll_id, author.0).await?;
    Ok(StatusCode::NO_CONTENT)
}
