//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `PollStore` port from the `textpoll_core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use textpoll_core::domain::{NewPoll, Poll, PollPatch, VoteOptions, Voter};
use textpoll_core::ports::{PollStore, PortError, PortResult};
use textpoll_core::registration::{PendingRegistration, RegistrationState};
use uuid::Uuid;

use crate::token::decode_voter_claims;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `PollStore` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    /// Shared secret for verifying the voter tokens that scope vote
    /// increments.
    jwt_secret: String,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool, jwt_secret: String) -> Self {
        Self { pool, jwt_secret }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a sqlx error to the port taxonomy. Uniqueness and exclusion
/// violations (two polls racing for one phone number) become `Conflict`;
/// `P0002` is raised by `increment_vote_count` for an unknown option.
fn map_db_error(e: sqlx::Error, context: &str) -> PortError {
    if let sqlx::Error::RowNotFound = e {
        return PortError::NotFound(context.to_string());
    }
    if let Some(db_err) = e.as_database_error() {
        match db_err.code().as_deref() {
            Some("23505") | Some("23P01") => {
                return PortError::Conflict(context.to_string());
            }
            Some("P0002") => return PortError::NotFound(context.to_string()),
            _ => {}
        }
    }
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct PollRecord {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    description: Option<String>,
    end_date: DateTime<Utc>,
    phone_number: Option<String>,
    created_at: DateTime<Utc>,
}
impl PollRecord {
    fn to_domain(self) -> Poll {
        Poll {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            description: self.description,
            end_date: self.end_date,
            phone_number: self.phone_number,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct VoterRecord {
    id: Uuid,
    phone_number: String,
    email: String,
    created_at: DateTime<Utc>,
}
impl VoterRecord {
    fn to_domain(self) -> Voter {
        Voter {
            id: self.id,
            phone_number: self.phone_number,
            email: self.email,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct PendingRecord {
    phone_number: String,
    code: String,
    state: String,
    expires_at: DateTime<Utc>,
}
impl PendingRecord {
    fn to_domain(self) -> PortResult<PendingRegistration> {
        let state = RegistrationState::parse(&self.state).ok_or_else(|| {
            PortError::Unexpected(format!("Unknown registration state '{}'", self.state))
        })?;
        Ok(PendingRegistration {
            phone_number: self.phone_number,
            code: self.code,
            state,
            expires_at: self.expires_at,
        })
    }
}

#[derive(FromRow)]
struct OptionsRecord {
    options: Json<VoteOptions>,
}

const POLL_COLUMNS: &str = "id, owner_id, title, description, end_date, phone_number, created_at";

//=========================================================================================
// `PollStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl PollStore for PgStore {
    async fn create_poll(&self, poll: &NewPoll, options: &VoteOptions) -> PortResult<Poll> {
        let mut tx: Transaction<'_, Postgres> = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let record = sqlx::query_as::<_, PollRecord>(
            "INSERT INTO polls (id, owner_id, title, description, end_date, phone_number) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, owner_id, title, description, end_date, phone_number, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(poll.owner_id)
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(poll.end_date)
        .bind(&poll.phone_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            map_db_error(
                e,
                "The selected phone number is already in use by an active poll",
            )
        })?;

        sqlx::query("INSERT INTO vote_options (poll_id, options) VALUES ($1, $2)")
            .bind(record.id)
            .bind(Json(options))
            .execute(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.to_domain())
    }

    async fn get_poll(&self, poll_id: Uuid) -> PortResult<Poll> {
        let record = sqlx::query_as::<_, PollRecord>(&format!(
            "SELECT {} FROM polls WHERE id = $1",
            POLL_COLUMNS
        ))
        .bind(poll_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("Poll {} not found", poll_id)))?;
        Ok(record.to_domain())
    }

    async fn list_polls_by_owner(
        &self,
        owner_id: Uuid,
        offset: u32,
        limit: u32,
    ) -> PortResult<Vec<Poll>> {
        let records = sqlx::query_as::<_, PollRecord>(&format!(
            "SELECT {} FROM polls WHERE owner_id = $1 \
             ORDER BY created_at DESC OFFSET $2 LIMIT $3",
            POLL_COLUMNS
        ))
        .bind(owner_id)
        .bind(i64::from(offset))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_poll(
        &self,
        poll_id: Uuid,
        owner_id: Uuid,
        patch: &PollPatch,
    ) -> PortResult<Poll> {
        let record = sqlx::query_as::<_, PollRecord>(&format!(
            "UPDATE polls \
             SET title = $1, description = $2, end_date = $3, phone_number = $4 \
             WHERE id = $5 AND owner_id = $6 \
             RETURNING {}",
            POLL_COLUMNS
        ))
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(patch.end_date)
        .bind(&patch.phone_number)
        .bind(poll_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_db_error(
                e,
                "The selected phone number is already in use by an active poll",
            )
        })?;
        Ok(record.to_domain())
    }

    async fn delete_poll(&self, poll_id: Uuid, owner_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM polls WHERE id = $1 AND owner_id = $2")
            .bind(poll_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Poll {} not found", poll_id)));
        }
        Ok(())
    }

    async fn bound_numbers(&self, now: DateTime<Utc>) -> PortResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT phone_number FROM polls \
             WHERE phone_number IS NOT NULL AND end_date > $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(rows.into_iter().map(|(number,)| number).collect())
    }

    async fn find_voter_by_phone(&self, phone: &str) -> PortResult<Voter> {
        let record = sqlx::query_as::<_, VoterRecord>(
            "SELECT id, phone_number, email, created_at FROM voters WHERE phone_number = $1",
        )
        .bind(phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("No voter with phone number {}", phone)))?;
        Ok(record.to_domain())
    }

    async fn find_active_poll_by_number(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Poll> {
        let record = sqlx::query_as::<_, PollRecord>(&format!(
            "SELECT {} FROM polls WHERE phone_number = $1 AND end_date > $2",
            POLL_COLUMNS
        ))
        .bind(phone)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("No active poll bound to {}", phone)))?;
        Ok(record.to_domain())
    }

    async fn get_options(&self, poll_id: Uuid) -> PortResult<VoteOptions> {
        let record = sqlx::query_as::<_, OptionsRecord>(
            "SELECT options FROM vote_options WHERE poll_id = $1",
        )
        .bind(poll_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("No options for poll {}", poll_id)))?;
        Ok(record.options.0)
    }

    async fn increment_vote(
        &self,
        voter_token: &str,
        poll_id: Uuid,
        option_label: &str,
    ) -> PortResult<()> {
        // The token is verified here, at the trust boundary, exactly the
        // way the database's own policies would: bad or expired tokens
        // never reach SQL.
        let claims =
            decode_voter_claims(&self.jwt_secret, voter_token).map_err(|_| PortError::Unauthorized)?;
        let claims_json =
            serde_json::to_string(&claims).map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut tx: Transaction<'_, Postgres> = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // 1. Scope the transaction to the voter; the vote_log RLS policy
        //    reads these claims.
        sqlx::query("SELECT set_config('request.jwt.claims', $1, true)")
            .bind(&claims_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // 2. One atomic increment, computed inside the database.
        sqlx::query("SELECT increment_vote_count($1, $2)")
            .bind(poll_id)
            .bind(option_label)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                map_db_error(
                    e,
                    &format!("No option '{}' on poll {}", option_label, poll_id),
                )
            })?;

        // 3. The audit row commits with the increment or not at all.
        sqlx::query("INSERT INTO vote_log (poll_id, voter_id, option_label) VALUES ($1, $2, $3)")
            .bind(poll_id)
            .bind(claims.sub)
            .bind(option_label)
            .execute(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn upsert_pending_registration(
        &self,
        pending: &PendingRegistration,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO pending_registrations (phone_number, code, state, expires_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (phone_number) DO UPDATE \
             SET code = EXCLUDED.code, state = EXCLUDED.state, expires_at = EXCLUDED.expires_at",
        )
        .bind(&pending.phone_number)
        .bind(&pending.code)
        .bind(pending.state.as_str())
        .bind(pending.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get_pending_registration(&self, phone: &str) -> PortResult<PendingRegistration> {
        let record = sqlx::query_as::<_, PendingRecord>(
            "SELECT phone_number, code, state, expires_at \
             FROM pending_registrations WHERE phone_number = $1",
        )
        .bind(phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("No registration in progress for {}", phone)))?;
        record.to_domain()
    }

    async fn set_registration_state(
        &self,
        phone: &str,
        state: RegistrationState,
    ) -> PortResult<()> {
        let result =
            sqlx::query("UPDATE pending_registrations SET state = $1 WHERE phone_number = $2")
                .bind(state.as_str())
                .bind(phone)
                .execute(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "No registration in progress for {}",
                phone
            )));
        }
        Ok(())
    }

    async fn create_voter(&self, phone: &str, email: &str) -> PortResult<Voter> {
        let record = sqlx::query_as::<_, VoterRecord>(
            "INSERT INTO voters (id, phone_number, email) VALUES ($1, $2, $3) \
             ON CONFLICT (phone_number) DO UPDATE SET email = EXCLUDED.email \
             RETURNING id, phone_number, email, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(phone)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }
}
