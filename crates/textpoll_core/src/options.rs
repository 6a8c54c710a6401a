//! crates/textpoll_core/src/options.rs
//!
//! Option-set helpers and the option-position matcher that drives the
//! inbound-SMS vote path.

use crate::domain::{VoteOption, VoteOptions};

/// The voter's message could not be mapped to an option of the poll.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("no option found for selection '{attempted}'")]
pub struct OptionNotFound {
    /// The raw message body the voter sent.
    pub attempted: String,
}

/// Matches a free-text SMS body against an option set by position.
///
/// The body is trimmed and a single leading `#` is allowed, so "2" and
/// "#2" both select the option at position 2. Anything that does not
/// parse to the position of an option is `OptionNotFound`; this is a
/// domain miss, distinct from transport or lookup failures.
pub fn match_selection<'a>(
    body: &str,
    options: &'a VoteOptions,
) -> Result<&'a str, OptionNotFound> {
    let not_found = || OptionNotFound {
        attempted: body.to_string(),
    };

    let text = body.trim();
    let text = text.strip_prefix('#').unwrap_or(text);
    let position: i32 = text.parse().map_err(|_| not_found())?;

    options
        .iter()
        .find(|(_, option)| option.position == position)
        .map(|(label, _)| label.as_str())
        .ok_or_else(not_found)
}

/// Builds the zero-initialized option set for a new poll, assigning
/// positions 1..N in the order the author listed the labels.
pub fn zero_counts(labels: &[String]) -> VoteOptions {
    labels
        .iter()
        .enumerate()
        .map(|(index, label)| {
            (
                label.clone(),
                VoteOption {
                    position: index as i32 + 1,
                    vote_count: 0,
                },
            )
        })
        .collect()
}

/// Labels in ascending position order, the order ballots display them.
pub fn sorted_labels(options: &VoteOptions) -> Vec<&str> {
    let mut labels: Vec<(&str, i32)> = options
        .iter()
        .map(|(label, option)| (label.as_str(), option.position))
        .collect();
    labels.sort_by_key(|(_, position)| *position);
    labels.into_iter().map(|(label, _)| label).collect()
}

/// The label with the single highest vote count, or `None` when the top
/// spot is tied. Used by the results view to highlight a leader.
pub fn leading_label(options: &VoteOptions) -> Option<&str> {
    let mut leader: Option<(&str, i64)> = None;
    let mut tied = false;
    for (label, option) in options {
        match leader {
            Some((_, best)) if option.vote_count > best => {
                leader = Some((label, option.vote_count));
                tied = false;
            }
            Some((_, best)) if option.vote_count == best => tied = true,
            None => leader = Some((label, option.vote_count)),
            _ => {}
        }
    }
    match (leader, tied) {
        (Some((label, _)), false) => Some(label),
        _ => None,
    }
}

pub fn total_votes(options: &VoteOptions) -> i64 {
    options.values().map(|option| option.vote_count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yes_no() -> VoteOptions {
        zero_counts(&["Yes".to_string(), "No".to_string()])
    }

    #[test]
    fn zero_counts_assigns_positions_in_listed_order() {
        let options = yes_no();
        assert_eq!(options.len(), 2);
        assert_eq!(options["Yes"], VoteOption { position: 1, vote_count: 0 });
        assert_eq!(options["No"], VoteOption { position: 2, vote_count: 0 });
    }

    #[test]
    fn plain_digit_selects_by_position() {
        assert_eq!(match_selection("2", &yes_no()), Ok("No"));
    }

    #[test]
    fn leading_hash_marker_is_stripped() {
        assert_eq!(match_selection("#2", &yes_no()), Ok("No"));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(match_selection("  1 \n", &yes_no()), Ok("Yes"));
    }

    #[test]
    fn out_of_range_position_is_not_found() {
        let err = match_selection("9", &yes_no()).unwrap_err();
        assert_eq!(err.attempted, "9");
    }

    #[test]
    fn non_numeric_body_is_not_found() {
        assert!(match_selection("yes please", &yes_no()).is_err());
    }

    #[test]
    fn empty_body_is_not_found() {
        assert!(match_selection("", &yes_no()).is_err());
        assert!(match_selection("#", &yes_no()).is_err());
    }

    #[test]
    fn empty_option_set_never_matches() {
        assert!(match_selection("1", &VoteOptions::new()).is_err());
    }

    #[test]
    fn labels_sort_by_position_not_alphabetically() {
        let options = zero_counts(&[
            "Zebra".to_string(),
            "Apple".to_string(),
            "Mango".to_string(),
        ]);
        assert_eq!(sorted_labels(&options), vec!["Zebra", "Apple", "Mango"]);
    }

    #[test]
    fn leader_is_the_unique_highest_count() {
        let mut options = yes_no();
        options.get_mut("No").unwrap().vote_count = 3;
        assert_eq!(leading_label(&options), Some("No"));
        assert_eq!(total_votes(&options), 3);
    }

    #[test]
    fn tied_leaders_mean_no_leader() {
        let mut options = yes_no();
        options.get_mut("Yes").unwrap().vote_count = 2;
        options.get_mut("No").unwrap().vote_count = 2;
        assert_eq!(leading_label(&options), None);
    }
}
