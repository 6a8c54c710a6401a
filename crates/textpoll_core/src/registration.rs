//! crates/textpoll_core/src/registration.rs
//!
//! The voter phone-registration flow, modeled as an explicit state
//! machine instead of being implied by whichever screen happens to
//! render. Exactly four states; anything outside the listed transitions
//! is rejected with a typed error.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a verification code stays valid.
pub const CODE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    /// A phone number was submitted; no code has been sent yet.
    Register,
    /// A code was sent and we are waiting for the voter to echo it back.
    Verify,
    /// The code matched; a voter profile exists.
    Success,
    /// The flow failed (wrong code, expired code) and must restart.
    Error,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid registration transition from {from:?}")]
pub struct InvalidTransition {
    pub from: RegistrationState,
}

impl RegistrationState {
    /// Register → Verify. Re-sending a code while already waiting is
    /// also a Verify → Verify self-transition.
    pub fn code_sent(self) -> Result<Self, InvalidTransition> {
        match self {
            Self::Register | Self::Verify => Ok(Self::Verify),
            from => Err(InvalidTransition { from }),
        }
    }

    /// Verify → Success, only when a code is actually outstanding.
    pub fn confirmed(self) -> Result<Self, InvalidTransition> {
        match self {
            Self::Verify => Ok(Self::Success),
            from => Err(InvalidTransition { from }),
        }
    }

    /// Register/Verify → Error. A finished flow cannot fail after the
    /// fact.
    pub fn failed(self) -> Result<Self, InvalidTransition> {
        match self {
            Self::Register | Self::Verify => Ok(Self::Error),
            from => Err(InvalidTransition { from }),
        }
    }
}

impl RegistrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Verify => "verify",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "register" => Some(Self::Register),
            "verify" => Some(Self::Verify),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A registration waiting for its code, keyed by comparison-form phone.
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    pub phone_number: String,
    pub code: String,
    pub state: RegistrationState,
    pub expires_at: DateTime<Utc>,
}

impl PendingRegistration {
    pub fn new(phone_number: String, code: String, now: DateTime<Utc>) -> Self {
        Self {
            phone_number,
            code,
            state: RegistrationState::Verify,
            expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
