//! crates/textpoll_core/src/validate.rs
//!
//! Server-side validation for poll creation and edits. The web form runs
//! the same checks, but the trust boundary is here: everything the UI
//! enforces is re-checked before anything is persisted.

use chrono::{DateTime, Duration, Utc};

use crate::phone::{self, PhoneError};

pub const MIN_TITLE_LEN: usize = 5;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

/// User-correctable input problems, surfaced as field-level errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title has a minimum characters of 5")]
    TitleTooShort,
    #[error("You have to select at least two items and max at six items")]
    OptionCount,
    #[error("Vote option need to be unique")]
    DuplicateOption,
    #[error("Vote options can not be empty")]
    EmptyOption,
    #[error("End date must be in the future")]
    EndDateInPast,
    #[error("End date can be at most one week ahead")]
    EndDateTooFar,
    #[error(transparent)]
    Phone(#[from] PhoneError),
    #[error("Phone number {0} is not available")]
    PhoneNotAvailable(String),
}

/// The latest end date a poll created at `now` may carry.
pub fn next_week(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(7)
}

// The minimum is measured on the trimmed title, since that is what gets
// persisted; padding cannot satisfy it.
fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().chars().count() < MIN_TITLE_LEN {
        return Err(ValidationError::TitleTooShort);
    }
    Ok(())
}

fn validate_end_date(end_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ValidationError> {
    if end_date <= now {
        return Err(ValidationError::EndDateInPast);
    }
    if end_date > next_week(now) {
        return Err(ValidationError::EndDateTooFar);
    }
    Ok(())
}

/// Normalizes a chosen phone number to stored form and checks it against
/// the currently available pool.
fn validate_phone_choice(
    number: &str,
    available: &[String],
) -> Result<String, ValidationError> {
    let stored = phone::stored_form(number)?;
    if !available.contains(&stored) {
        return Err(ValidationError::PhoneNotAvailable(stored));
    }
    Ok(stored)
}

/// Validates the option labels of a new poll: 2–6 entries, trimmed,
/// non-empty, unique. Returns the cleaned labels in submission order.
pub fn validate_options(labels: &[String]) -> Result<Vec<String>, ValidationError> {
    let cleaned: Vec<String> = labels.iter().map(|label| label.trim().to_string()).collect();
    if cleaned.iter().any(|label| label.is_empty()) {
        return Err(ValidationError::EmptyOption);
    }
    if cleaned.len() < MIN_OPTIONS || cleaned.len() > MAX_OPTIONS {
        return Err(ValidationError::OptionCount);
    }
    for (index, label) in cleaned.iter().enumerate() {
        if cleaned[..index].contains(label) {
            return Err(ValidationError::DuplicateOption);
        }
    }
    Ok(cleaned)
}

/// Validates the shared title/end-date shape of creations and edits, plus
/// the phone binding if one was chosen. Returns the normalized phone
/// number, if any.
pub fn validate_poll_fields(
    title: &str,
    end_date: DateTime<Utc>,
    phone_number: Option<&str>,
    available: &[String],
    now: DateTime<Utc>,
) -> Result<Option<String>, ValidationError> {
    validate_title(title)?;
    validate_end_date(end_date, now)?;
    phone_number
        .filter(|number| !number.is_empty())
        .map(|number| validate_phone_choice(number, available))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Vec<String> {
        vec!["+15550001111".to_string()]
    }

    fn tomorrow() -> DateTime<Utc> {
        Utc::now() + Duration::days(1)
    }

    #[test]
    fn short_title_is_rejected() {
        let err = validate_poll_fields("abcd", tomorrow(), None, &pool(), Utc::now());
        assert_eq!(err, Err(ValidationError::TitleTooShort));
    }

    #[test]
    fn whitespace_padding_does_not_satisfy_the_title_minimum() {
        let err = validate_poll_fields("a    ", tomorrow(), None, &pool(), Utc::now());
        assert_eq!(err, Err(ValidationError::TitleTooShort));
    }

    #[test]
    fn five_character_title_passes() {
        assert!(validate_poll_fields("abcde", tomorrow(), None, &pool(), Utc::now()).is_ok());
    }

    #[test]
    fn end_date_in_the_past_is_rejected() {
        let now = Utc::now();
        let err = validate_poll_fields("Lunch spot", now - Duration::hours(1), None, &pool(), now);
        assert_eq!(err, Err(ValidationError::EndDateInPast));
    }

    #[test]
    fn end_date_beyond_one_week_is_rejected() {
        let now = Utc::now();
        let err =
            validate_poll_fields("Lunch spot", now + Duration::days(8), None, &pool(), now);
        assert_eq!(err, Err(ValidationError::EndDateTooFar));
    }

    #[test]
    fn too_few_and_too_many_options_are_rejected() {
        let one = vec!["A".to_string()];
        assert_eq!(validate_options(&one), Err(ValidationError::OptionCount));

        let seven: Vec<String> = (1..=7).map(|n| n.to_string()).collect();
        assert_eq!(validate_options(&seven), Err(ValidationError::OptionCount));
    }

    #[test]
    fn duplicate_options_are_rejected() {
        let labels = vec!["Yes".to_string(), "Yes".to_string()];
        assert_eq!(validate_options(&labels), Err(ValidationError::DuplicateOption));
    }

    #[test]
    fn option_labels_are_case_sensitive() {
        let labels = vec!["Yes".to_string(), "yes".to_string()];
        assert_eq!(
            validate_options(&labels),
            Ok(vec!["Yes".to_string(), "yes".to_string()])
        );
    }

    #[test]
    fn whitespace_only_option_is_rejected() {
        let labels = vec!["Yes".to_string(), "   ".to_string()];
        assert_eq!(validate_options(&labels), Err(ValidationError::EmptyOption));
    }

    #[test]
    fn unpooled_phone_number_is_rejected() {
        let err = validate_poll_fields(
            "Lunch spot",
            tomorrow(),
            Some("+15559998888"),
            &pool(),
            Utc::now(),
        );
        assert_eq!(
            err,
            Err(ValidationError::PhoneNotAvailable("+15559998888".to_string()))
        );
    }

    #[test]
    fn pooled_phone_number_is_normalized() {
        let stored = validate_poll_fields(
            "Lunch spot",
            tomorrow(),
            Some("+1 555 000 1111"),
            &pool(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(stored, Some("+15550001111".to_string()));
    }

    #[test]
    fn empty_phone_choice_means_sms_voting_disabled() {
        let stored =
            validate_poll_fields("Lunch spot", tomorrow(), Some(""), &pool(), Utc::now()).unwrap();
        assert_eq!(stored, None);
    }
}
