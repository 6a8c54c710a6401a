//! services/api/src/web/voters.rs
//!
//! Voter phone registration: submit a number, receive a code by SMS, echo
//! it back. The flow follows the explicit state machine in
//! `textpoll_core::registration`; handlers only drive listed transitions.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use textpoll_core::phone;
use textpoll_core::registration::{PendingRegistration, RegistrationState};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::failure::ApiFailure;
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub phone_number: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub phone_number: String,
    pub code: String,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub phone_number: String,
    pub state: &'static str,
}

#[derive(Serialize, ToSchema)]
pub struct VerifyResponse {
    pub voter_id: Uuid,
    pub phone_number: String,
    pub state: &'static str,
}

fn generate_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

fn invalid_phone(e: phone::PhoneError) -> ApiFailure {
    ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
}

/// POST /voters/register - start (or restart) a registration.
#[utoipa::path(
    post,
    path = "/voters/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Verification code sent", body = RegisterResponse),
        (status = 409, description = "Phone number already registered"),
        (status = 422, description = "Not a valid phone number"),
        (status = 500, description = "Code delivery failed")
    )
)]
pub async fn register_voter_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let now = Utc::now();
    let comparison = phone::comparison_form(&req.phone_number).map_err(invalid_phone)?;
    let stored = phone::stored_form(&req.phone_number).map_err(invalid_phone)?;

    if state.store.find_voter_by_phone(&comparison).await.is_ok() {
        return Err(ApiFailure::new(
            StatusCode::CONFLICT,
            format!("The phone number {} is already registered", stored),
        ));
    }

    // Resume from the stored state if a flow is underway; a failed flow
    // restarts from scratch.
    let prior = match state.store.get_pending_registration(&comparison).await {
        Ok(pending) if pending.state != RegistrationState::Error => pending.state,
        _ => RegistrationState::Register,
    };
    let next = prior.code_sent().map_err(|e| {
        ApiFailure::new(
            StatusCode::CONFLICT,
            format!("Registration cannot restart from the '{}' state", e.from.as_str()),
        )
    })?;

    let mut pending = PendingRegistration::new(comparison, generate_code(), now);
    pending.state = next;

    state.store.upsert_pending_registration(&pending).await?;
    state
        .sms
        .send(
            &stored,
            &format!("Your TextPoll verification code is {}", pending.code),
        )
        .await?;

    Ok(Json(RegisterResponse {
        phone_number: stored,
        state: next.as_str(),
    }))
}

/// POST /voters/verify - complete a registration with the texted code.
#[utoipa::path(
    post,
    path = "/voters/verify",
    request_body = VerifyRequest,
    responses(
        (status = 201, description = "Voter profile created", body = VerifyResponse),
        (status = 400, description = "Incorrect verification code"),
        (status = 404, description = "No registration in progress"),
        (status = 410, description = "Verification code expired"),
        (status = 422, description = "Not a valid phone number")
    )
)]
pub async fn verify_voter_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let now = Utc::now();
    let comparison = phone::comparison_form(&req.phone_number).map_err(invalid_phone)?;

    let pending = state
        .store
        .get_pending_registration(&comparison)
        .await
        .map_err(|_| {
            ApiFailure::not_found(format!(
                "No registration in progress for the phone number {}",
                comparison
            ))
        })?;

    if pending.is_expired(now) {
        let failed = pending.state.failed().unwrap_or(RegistrationState::Error);
        state
            .store
            .set_registration_state(&comparison, failed)
            .await?;
        return Err(ApiFailure::new(
            StatusCode::GONE,
            "The verification code has expired; register again",
        ));
    }

    if pending.code != req.code {
        let failed = pending.state.failed().unwrap_or(RegistrationState::Error);
        state
            .store
            .set_registration_state(&comparison, failed)
            .await?;
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            "Incorrect verification code",
        ));
    }

    let next = pending.state.confirmed().map_err(|e| {
        ApiFailure::new(
            StatusCode::CONFLICT,
            format!("Registration is in the '{}' state, not awaiting a code", e.from.as_str()),
        )
    })?;

    // The synthesized address exists only to back the email claim of
    // voter-scoped tokens.
    let email = format!("{}@sms.textpoll.dev", comparison);
    let voter = state.store.create_voter(&comparison, &email).await?;
    state.store.set_registration_state(&comparison, next).await?;

    Ok((
        StatusCode::CREATED,
        Json(VerifyResponse {
            voter_id: voter.id,
            phone_number: voter.phone_number,
            state: next.as_str(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use textpoll_core::domain::{NewPoll, Poll, PollPatch, VoteOptions, Voter};
    use textpoll_core::ports::{PollStore, PortError, PortResult, SmsSender};

    #[derive(Default)]
    struct MockStore {
        pending: Mutex<HashMap<String, PendingRegistration>>,
        voters: Mutex<HashMap<String, Voter>>,
    }

    #[async_trait]
    impl PollStore for MockStore {
        async fn create_poll(&self, _: &NewPoll, _: &VoteOptions) -> PortResult<Poll> {
            unreachable!("not part of registration")
        }
        async fn get_poll(&self, _: Uuid) -> PortResult<Poll> {
            unreachable!("not part of registration")
        }
        async fn list_polls_by_owner(&self, _: Uuid, _: u32, _: u32) -> PortResult<Vec<Poll>> {
            unreachable!("not part of registration")
        }
        async fn update_poll(&self, _: Uuid, _: Uuid, _: &PollPatch) -> PortResult<Poll> {
            unreachable!("not part of registration")
        }
        async fn delete_poll(&self, _: Uuid, _: Uuid) -> PortResult<()> {
            unreachable!("not part of registration")
        }
        async fn bound_numbers(&self, _: DateTime<Utc>) -> PortResult<Vec<String>> {
            unreachable!("not part of registration")
        }
        async fn find_active_poll_by_number(
            &self,
            _: &str,
            _: DateTime<Utc>,
        ) -> PortResult<Poll> {
            unreachable!("not part of registration")
        }
        async fn get_options(&self, _: Uuid) -> PortResult<VoteOptions> {
            unreachable!("not part of registration")
        }
        async fn increment_vote(&self, _: &str, _: Uuid, _: &str) -> PortResult<()> {
            unreachable!("not part of registration")
        }

        async fn find_voter_by_phone(&self, phone: &str) -> PortResult<Voter> {
            self.voters
                .lock()
                .unwrap()
                .get(phone)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("voter {}", phone)))
        }

        async fn upsert_pending_registration(
            &self,
            pending: &PendingRegistration,
        ) -> PortResult<()> {
            self.pending
                .lock()
                .unwrap()
                .insert(pending.phone_number.clone(), pending.clone());
            Ok(())
        }

        async fn get_pending_registration(&self, phone: &str) -> PortResult<PendingRegistration> {
            self.pending
                .lock()
                .unwrap()
                .get(phone)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("registration {}", phone)))
        }

        async fn set_registration_state(
            &self,
            phone: &str,
            new_state: RegistrationState,
        ) -> PortResult<()> {
            if let Some(pending) = self.pending.lock().unwrap().get_mut(phone) {
                pending.state = new_state;
            }
            Ok(())
        }

        async fn create_voter(&self, phone: &str, email: &str) -> PortResult<Voter> {
            let voter = Voter {
                id: Uuid::new_v4(),
                phone_number: phone.to_string(),
                email: email.to_string(),
                created_at: Utc::now(),
            };
            self.voters
                .lock()
                .unwrap()
                .insert(phone.to_string(), voter.clone());
            Ok(voter)
        }
    }

    #[derive(Default)]
    struct MockSms {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SmsSender for MockSms {
        async fn send(&self, to: &str, body: &str) -> PortResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn test_state() -> (Arc<AppState>, Arc<MockStore>, Arc<MockSms>) {
        let store = Arc::new(MockStore::default());
        let sms = Arc::new(MockSms::default());
        let config = Config {
            bind_address: "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
            database_url: "postgres://unused".to_string(),
            log_level: "info".to_string(),
            webhook_signing_secret: "whsec_test".to_string(),
            jwt_secret: "jwt_test".to_string(),
            phone_numbers: vec![],
            cors_origin: "http://localhost:3000".to_string(),
            sms_api_url: None,
            sms_account_sid: None,
            sms_auth_token: None,
            sms_from_number: None,
        };
        let app_state = Arc::new(AppState {
            store: store.clone(),
            sms: sms.clone(),
            config: Arc::new(config),
        });
        (app_state, store, sms)
    }

    const PHONE: &str = "+15551230000";

    #[tokio::test]
    async fn register_sends_a_code_and_waits_for_verification() {
        let (state, store, sms) = test_state();

        register_voter_handler(
            State(state),
            Json(RegisterRequest {
                phone_number: PHONE.to_string(),
            }),
        )
        .await
        .unwrap();

        let pending = store.pending.lock().unwrap();
        let entry = pending.get("15551230000").unwrap();
        assert_eq!(entry.state, RegistrationState::Verify);
        assert_eq!(entry.code.len(), 6);

        let sent = sms.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, PHONE);
        assert!(sent[0].1.contains(&entry.code));
    }

    #[tokio::test]
    async fn verify_with_the_right_code_creates_a_voter() {
        let (state, store, _) = test_state();

        register_voter_handler(
            State(state.clone()),
            Json(RegisterRequest {
                phone_number: PHONE.to_string(),
            }),
        )
        .await
        .unwrap();
        let code = store
            .pending
            .lock()
            .unwrap()
            .get("15551230000")
            .unwrap()
            .code
            .clone();

        verify_voter_handler(
            State(state),
            Json(VerifyRequest {
                phone_number: PHONE.to_string(),
                code,
            }),
        )
        .await
        .unwrap();

        let voters = store.voters.lock().unwrap();
        let voter = voters.get("15551230000").unwrap();
        assert_eq!(voter.email, "15551230000@sms.textpoll.dev");
        assert_eq!(
            store.pending.lock().unwrap().get("15551230000").unwrap().state,
            RegistrationState::Success
        );
    }

    #[tokio::test]
    async fn wrong_code_fails_the_flow() {
        let (state, store, _) = test_state();

        register_voter_handler(
            State(state.clone()),
            Json(RegisterRequest {
                phone_number: PHONE.to_string(),
            }),
        )
        .await
        .unwrap();

        let failure = verify_voter_handler(
            State(state),
            Json(VerifyRequest {
                phone_number: PHONE.to_string(),
                code: "000000x".to_string(),
            }),
        )
        .await
        .err()
        .expect("expected a failure");

        assert_eq!(failure.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            store.pending.lock().unwrap().get("15551230000").unwrap().state,
            RegistrationState::Error
        );
    }

    #[tokio::test]
    async fn expired_code_is_gone() {
        let (state, store, _) = test_state();

        let mut pending = PendingRegistration::new(
            "15551230000".to_string(),
            "123456".to_string(),
            Utc::now() - Duration::hours(1),
        );
        pending.state = RegistrationState::Verify;
        store.upsert_pending_registration(&pending).await.unwrap();

        let failure = verify_voter_handler(
            State(state),
            Json(VerifyRequest {
                phone_number: PHONE.to_string(),
                code: "123456".to_string(),
            }),
        )
        .await
        .err()
        .expect("expected a failure");

        assert_eq!(failure.status, StatusCode::GONE);
    }

    #[tokio::test]
    async fn registered_number_cannot_register_again() {
        let (state, store, _) = test_state();
        store
            .create_voter("15551230000", "15551230000@sms.textpoll.dev")
            .await
            .unwrap();

        let failure = register_voter_handler(
            State(state),
            Json(RegisterRequest {
                phone_number: PHONE.to_string(),
            }),
        )
        .await
        .err()
        .expect("expected a failure");

        assert_eq!(failure.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn verify_without_registering_is_not_found() {
        let (state, _, _) = test_state();

        let failure = verify_voter_handler(
            State(state),
            Json(VerifyRequest {
                phone_number: PHONE.to_string(),
                code: "123456".to_string(),
            }),
        )
        .await
        .err()
        .expect("expected a failure");

        assert_eq!(failure.status, StatusCode::NOT_FOUND);
    }
}
