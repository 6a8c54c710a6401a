//! crates/textpoll_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One selectable choice within a poll.
///
/// `position` is the external voting key: the digit a voter texts to pick
/// this option. Positions are assigned 1..N at creation and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOption {
    pub position: i32,
    pub vote_count: i64,
}

/// The full option set of a poll, keyed by the (case-sensitive) label.
pub type VoteOptions = BTreeMap<String, VoteOption>;

/// A user-created poll, open for voting until its end date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub end_date: DateTime<Utc>,
    /// E.164 number voters can text, if SMS voting is enabled.
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    /// A poll is open for voting only while `now` is strictly before its
    /// end date; a poll ending exactly now is already expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !(self.end_date > now)
    }
}

/// The validated input for creating a poll, before it has an id.
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub end_date: DateTime<Utc>,
    pub phone_number: Option<String>,
}

/// An owner edit to an existing poll. Options are immutable after
/// creation and deliberately absent here.
#[derive(Debug, Clone, Deserialize)]
pub struct PollPatch {
    pub title: String,
    pub description: Option<String>,
    pub end_date: DateTime<Utc>,
    pub phone_number: Option<String>,
}

/// A voter who registered a phone number.
///
/// `phone_number` is kept in comparison form (E.164 digits without the
/// leading `+`), which is how inbound `From` numbers are matched. The
/// email is synthesized at registration and only exists so a voter-scoped
/// token can carry the claim.
#[derive(Debug, Clone, Serialize)]
pub struct Voter {
    pub id: Uuid,
    pub phone_number: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Paging arithmetic for poll listings.
///
/// Mirrors the inclusive from/to ranges the dashboard requests, 3 rows per
/// page: page 0 covers rows 0..=3, later pages shift the start by one to
/// avoid repeating the boundary row.
pub fn page_bounds(page: u32, per_page: u32) -> (u32, u32) {
    let mut from = page * per_page;
    let to = from + per_page;
    if page > 0 {
        from += 1;
    }
    (from, to)
}
