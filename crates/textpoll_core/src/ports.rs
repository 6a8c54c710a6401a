//! crates/textpoll_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or SMS
//! providers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{NewPoll, Poll, PollPatch, VoteOptions, Voter};
use crate::registration::{PendingRegistration, RegistrationState};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database,
/// SMS provider).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A storage uniqueness guarantee fired, e.g. two polls racing for the
    /// same phone number.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait PollStore: Send + Sync {
    // --- Poll Authoring ---
    /// Inserts the poll and its zero-initialized option set in one
    /// transaction. A phone number already bound to an active poll is a
    /// `Conflict`.
    async fn create_poll(&self, poll: &NewPoll, options: &VoteOptions) -> PortResult<Poll>;

    async fn get_poll(&self, poll_id: Uuid) -> PortResult<Poll>;

    async fn list_polls_by_owner(
        &self,
        owner_id: Uuid,
        offset: u32,
        limit: u32,
    ) -> PortResult<Vec<Poll>>;

    async fn update_poll(
        &self,
        poll_id: Uuid,
        owner_id: Uuid,
        patch: &PollPatch,
    ) -> PortResult<Poll>;

    async fn delete_poll(&self, poll_id: Uuid, owner_id: Uuid) -> PortResult<()>;

    // --- Phone Pool ---
    /// Numbers currently bound to polls that have not yet expired.
    async fn bound_numbers(&self, now: DateTime<Utc>) -> PortResult<Vec<String>>;

    // --- SMS Vote Path ---
    /// Looks up a voter by comparison-form phone number.
    async fn find_voter_by_phone(&self, phone: &str) -> PortResult<Voter>;

    /// The unexpired poll bound to an E.164 number, if any.
    async fn find_active_poll_by_number(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Poll>;

    async fn get_options(&self, poll_id: Uuid) -> PortResult<VoteOptions>;

    /// Applies exactly one atomic `vote_count += 1` to the named option,
    /// acting under the voter-scoped bearer token rather than a
    /// superuser bypass. The increment and the vote-log row commit
    /// together; no count is ever computed on this side of the boundary.
    async fn increment_vote(
        &self,
        voter_token: &str,
        poll_id: Uuid,
        option_label: &str,
    ) -> PortResult<()>;

    // --- Voter Registration ---
    async fn upsert_pending_registration(
        &self,
        pending: &PendingRegistration,
    ) -> PortResult<()>;

    async fn get_pending_registration(&self, phone: &str) -> PortResult<PendingRegistration>;

    async fn set_registration_state(
        &self,
        phone: &str,
        state: RegistrationState,
    ) -> PortResult<()>;

    /// Creates (or returns the existing) voter profile for a verified
    /// phone number.
    async fn create_voter(&self, phone: &str, email: &str) -> PortResult<Voter>;
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Delivers one outbound message to an E.164 destination.
    async fn send(&self, to: &str, body: &str) -> PortResult<()>;
}
