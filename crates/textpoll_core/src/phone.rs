//! crates/textpoll_core/src/phone.rs
//!
//! Phone number normalization.
//!
//! Numbers exist in three textual forms and every boundary converts
//! explicitly between them:
//! - stored form: E.164 (`+46701234567`), the canonical key a poll is
//!   bound to;
//! - display form: international formatting (`+46 70 123 45 67`);
//! - comparison form: E.164 without the leading `+`, the shape the auth
//!   layer stores for voters and the shape inbound `From` numbers are
//!   matched against.

use phonenumber::Mode;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("'{0}' is not a recognizable phone number")]
    Unparseable(String),
}

// Parse success alone decides. A carrier-validity check on top would
// reject reserved ranges (US 555 numbers among them), which gateways
// and sandboxes hand out routinely.
fn parse(input: &str) -> Result<phonenumber::PhoneNumber, PhoneError> {
    phonenumber::parse(None, input).map_err(|_| PhoneError::Unparseable(input.to_string()))
}

/// Canonical E.164 storage form, e.g. `+15551230000`.
pub fn stored_form(input: &str) -> Result<String, PhoneError> {
    Ok(parse(input)?.format().mode(Mode::E164).to_string())
}

/// Locale-formatted display form, e.g. `+1 555-123-0000`.
pub fn display_form(input: &str) -> Result<String, PhoneError> {
    Ok(parse(input)?.format().mode(Mode::International).to_string())
}

/// E.164 digits without the leading `+`, e.g. `15551230000`.
pub fn comparison_form(input: &str) -> Result<String, PhoneError> {
    let stored = stored_form(input)?;
    Ok(stored.trim_start_matches('+').to_string())
}

/// Filters the configured pool down to numbers not bound to an active
/// poll, preserving the configured order. `keep` is the carve-out for the
/// edit form: a poll's own current binding stays selectable even though
/// it is in use.
pub fn available_numbers(
    configured: &[String],
    in_use: &[String],
    keep: Option<&str>,
) -> Vec<String> {
    configured
        .iter()
        .filter(|number| {
            Some(number.as_str()) == keep || !in_use.contains(number)
        })
        .cloned()
        .collect()
}
