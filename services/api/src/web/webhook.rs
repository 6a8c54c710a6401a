//! services/api/src/web/webhook.rs
//!
//! The inbound SMS vote path.
//!
//! The SMS gateway delivers each text as a signed, form-encoded webhook.
//! Processing is a strictly sequential state machine; every state owns
//! exactly one question and one failure exit, and a later state cannot be
//! reached without passing the earlier ones. The states are encoded as
//! types, so an out-of-order transition does not compile.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use textpoll_core::domain::{Poll, Voter};
use textpoll_core::options::match_selection;
use textpoll_core::phone;
use textpoll_core::ports::{PollStore, PortError};
use tracing::{info, warn};

use crate::token::mint_voter_token;
use crate::web::failure::ApiFailure;
use crate::web::signature::verify_signature;
use crate::web::state::AppState;

/// The provider's delivery payload. Only the routing fields matter here;
/// provider metadata like the message id is carried for logging.
#[derive(Debug, Deserialize)]
pub struct InboundSms {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

//=========================================================================================
// Flow States
//=========================================================================================

/// State 1: nothing about the request is trusted yet.
struct Unverified<'a> {
    headers: &'a HeaderMap,
    raw_body: &'a [u8],
}

/// State 2: the signature checked out; the bytes are from the gateway.
struct Verified<'a> {
    raw_body: &'a [u8],
}

/// State 3: the payload parsed; the sender must map to a voter.
struct ResolvingVoter {
    payload: InboundSms,
}

/// State 4: the destination must map to an active poll.
struct ResolvingPoll {
    payload: InboundSms,
    voter: Voter,
}

/// State 5: the message body must map to an option position.
struct ResolvingOption {
    payload: InboundSms,
    voter: Voter,
    poll: Poll,
}

/// State 6: everything resolved; one atomic increment remains.
struct Committing {
    voter: Voter,
    poll: Poll,
    label: String,
}

impl<'a> Unverified<'a> {
    fn verify(self, secret: &str) -> Result<Verified<'a>, ApiFailure> {
        if !verify_signature(self.headers, self.raw_body, secret) {
            return Err(ApiFailure::new(
                StatusCode::UNAUTHORIZED,
                "Could not verify the webhook signature",
            ));
        }
        Ok(Verified {
            raw_body: self.raw_body,
        })
    }
}

impl Verified<'_> {
    fn parse(self) -> Result<ResolvingVoter, ApiFailure> {
        let payload: InboundSms = serde_urlencoded::from_bytes(self.raw_body).map_err(|e| {
            ApiFailure::new(
                StatusCode::BAD_REQUEST,
                format!("Malformed webhook payload: {}", e),
            )
        })?;
        if let Some(sid) = &payload.message_sid {
            tracing::debug!(message_sid = %sid, "verified webhook delivery");
        }
        Ok(ResolvingVoter { payload })
    }
}

impl ResolvingVoter {
    async fn resolve_voter(self, store: &dyn PollStore) -> Result<ResolvingPoll, ApiFailure> {
        let comparison = phone::comparison_form(&self.payload.from).map_err(|e| {
            ApiFailure::new(
                StatusCode::BAD_REQUEST,
                format!("Malformed webhook payload: {}", e),
            )
        })?;

        let voter = store
            .find_voter_by_phone(&comparison)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => ApiFailure::not_found(format!(
                    "No voter is registered with the phone number {}",
                    comparison
                )),
                other => other.into(),
            })?;

        Ok(ResolvingPoll {
            payload: self.payload,
            voter,
        })
    }
}

impl ResolvingPoll {
    async fn resolve_poll(
        self,
        store: &dyn PollStore,
        now: DateTime<Utc>,
    ) -> Result<ResolvingOption, ApiFailure> {
        let stored = phone::stored_form(&self.payload.to).map_err(|e| {
            ApiFailure::new(
                StatusCode::BAD_REQUEST,
                format!("Malformed webhook payload: {}", e),
            )
        })?;

        let poll = store
            .find_active_poll_by_number(&stored, now)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => ApiFailure::not_found(format!(
                    "No active poll is bound to the phone number {}",
                    stored
                )),
                other => other.into(),
            })?;

        Ok(ResolvingOption {
            payload: self.payload,
            voter: self.voter,
            poll,
        })
    }
}

impl ResolvingOption {
    async fn resolve_option(self, store: &dyn PollStore) -> Result<Committing, ApiFailure> {
        let options = store
            .get_options(self.poll.id)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => {
                    option_not_found(self.payload.body.trim(), &self.poll)
                }
                other => other.into(),
            })?;

        let label = match_selection(&self.payload.body, &options)
            .map_err(|e| option_not_found(&e.attempted, &self.poll))?
            .to_string();

        Ok(Committing {
            voter: self.voter,
            poll: self.poll,
            label,
        })
    }
}

impl Committing {
    async fn commit(
        self,
        store: &dyn PollStore,
        jwt_secret: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ApiFailure> {
        // The increment acts under the voter's own identity, not an admin
        // bypass; the store never computes the new count locally.
        let token = mint_voter_token(jwt_secret, &self.voter, now)
            .map_err(|e| ApiFailure::internal(format!("Failed to mint voter token: {}", e)))?;

        store
            .increment_vote(&token, self.poll.id, &self.label)
            .await?;

        info!(
            poll_id = %self.poll.id,
            option = %self.label,
            "recorded SMS vote"
        );
        Ok(())
    }
}

fn option_not_found(attempted: &str, poll: &Poll) -> ApiFailure {
    ApiFailure::not_found(format!(
        "No option found for selection '{}' on poll {}",
        attempted, poll.id
    ))
}

//=========================================================================================
// Handler
//=========================================================================================

/// POST /webhooks/vote - process one inbound SMS vote.
#[utoipa::path(
    post,
    path = "/webhooks/vote",
    request_body(content_type = "application/x-www-form-urlencoded",
        description = "Gateway delivery with From, To and Body fields."),
    responses(
        (status = 200, description = "Vote recorded"),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Signature verification failed"),
        (status = 404, description = "Voter, poll, or option not found"),
        (status = 500, description = "Vote increment failed")
    )
)]
pub async fn vote_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiFailure> {
    let now = Utc::now();
    let outcome = Unverified {
        headers: &headers,
        raw_body: &body,
    }
    .verify(&state.config.webhook_signing_secret)?
    .parse()?
    .resolve_voter(state.store.as_ref())
    .await?
    .resolve_poll(state.store.as_ref(), now)
    .await?
    .resolve_option(state.store.as_ref())
    .await?
    .commit(state.store.as_ref(), &state.config.jwt_secret, now)
    .await;

    if let Err(failure) = &outcome {
        warn!(status = %failure.status, "webhook rejected: {}", failure.message);
    }
    outcome?;

    Ok((StatusCode::OK, Json(json!({ "vote_success": true }))))
}
