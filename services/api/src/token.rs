//! services/api/src/token.rs
//!
//! Voter-scoped bearer tokens for the webhook→backend hop.
//!
//! Once an inbound SMS has been resolved to a registered voter, the
//! increment runs under a short-lived token carrying that voter's
//! identity, so the database's row-level-security policies apply to the
//! voter rather than an admin bypass. The same shared secret verifies the
//! author tokens issued by the external identity provider.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use textpoll_core::domain::Voter;
use uuid::Uuid;

pub const TOKEN_AUDIENCE: &str = "authenticated";
pub const TOKEN_ROLE: &str = "authenticated";
const TOKEN_TTL_HOURS: i64 = 1;

/// The claims of a voter-scoped token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterClaims {
    pub aud: String,
    pub exp: usize,
    pub sub: Uuid,
    pub email: String,
    pub role: String,
}

/// Signs a one-hour token for the given voter.
pub fn mint_voter_token(
    secret: &str,
    voter: &Voter,
    now: DateTime<Utc>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = VoterClaims {
        aud: TOKEN_AUDIENCE.to_string(),
        exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
        sub: voter.id,
        email: voter.email.clone(),
        role: TOKEN_ROLE.to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verifies a voter token and returns its claims. Expiry and audience
/// are both enforced.
pub fn decode_voter_claims(
    secret: &str,
    token: &str,
) -> Result<VoterClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_audience(&[TOKEN_AUDIENCE]);
    let data = decode::<VoterClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter() -> Voter {
        Voter {
            id: Uuid::new_v4(),
            phone_number: "15551230000".to_string(),
            email: "15551230000@sms.textpoll.dev".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn minted_token_carries_the_voter_identity() {
        let voter = voter();
        let token = mint_voter_token("secret", &voter, Utc::now()).unwrap();
        let claims = decode_voter_claims("secret", &token).unwrap();

        assert_eq!(claims.sub, voter.id);
        assert_eq!(claims.email, voter.email);
        assert_eq!(claims.aud, TOKEN_AUDIENCE);
        assert_eq!(claims.role, TOKEN_ROLE);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint_voter_token("secret", &voter(), Utc::now()).unwrap();
        assert!(decode_voter_claims("other-secret", &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Mint far enough in the past to clear the default leeway.
        let token = mint_voter_token(
            "secret",
            &voter(),
            Utc::now() - Duration::hours(TOKEN_TTL_HOURS + 1),
        )
        .unwrap();
        assert!(decode_voter_claims("secret", &token).is_err());
    }
}
