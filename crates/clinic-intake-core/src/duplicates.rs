//! Duplicate intake detection.

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use crate::models::Client;

/// Minimum full-name similarity when dates of birth agree.
pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.93;

/// Fewer digits than this is not treated as a phone number.
const MIN_PHONE_DIGITS: usize = 7;

/// Why two clients were judged the same person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    Email,
    Phone,
    NameAndBirthDate,
}

impl DuplicateReason {
    pub fn describe(&self) -> &'static str {
        match self {
            DuplicateReason::Email => "same email address",
            DuplicateReason::Phone => "same phone number",
            DuplicateReason::NameAndBirthDate => "same date of birth and similar name",
        }
    }
}

/// Earlier client a new intake duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch<'a> {
    pub original: &'a Client,
    pub reason: DuplicateReason,
}

/// Lowercased, trimmed email; None when blank.
pub fn normalize_email(email: Option<&str>) -> Option<String> {
    let email = email?.trim().to_lowercase();
    (!email.is_empty()).then_some(email)
}

/// Digits of a phone number; None when too short to identify anyone.
pub fn phone_digits(phone: Option<&str>) -> Option<String> {
    let digits: String = phone?.chars().filter(char::is_ascii_digit).collect();
    (digits.len() >= MIN_PHONE_DIGITS).then_some(digits)
}

fn same_person(a: &Client, b: &Client) -> Option<DuplicateReason> {
    if let (Some(x), Some(y)) = (normalize_email(a.email.as_deref()), normalize_email(b.email.as_deref())) {
        if x == y {
            return Some(DuplicateReason::Email);
        }
    }

    if let (Some(x), Some(y)) = (phone_digits(a.phone.as_deref()), phone_digits(b.phone.as_deref())) {
        if x == y {
            return Some(DuplicateReason::Phone);
        }
    }

    let dob = |c: &Client| c.date_of_birth.as_deref().map(str::trim).filter(|d| !d.is_empty()).map(String::from);
    if let (Some(x), Some(y)) = (dob(a), dob(b)) {
        let (name_a, name_b) = (a.full_name().to_lowercase(), b.full_name().to_lowercase());
        if x == y && !name_a.is_empty() && jaro_winkler(&name_a, &name_b) >= NAME_SIMILARITY_THRESHOLD {
            return Some(DuplicateReason::NameAndBirthDate);
        }
    }

    None
}

/// Find the oldest earlier, non-duplicate client that `client` duplicates.
///
/// `existing` is every client in creation order. Only clients created before
/// `client` are candidates; if `client` is not in the list, all are.
pub fn find_duplicate<'a>(client: &Client, existing: &'a [Client]) -> Option<DuplicateMatch<'a>> {
    let position = existing
        .iter()
        .position(|c| c.id == client.id)
        .unwrap_or(existing.len());

    existing[..position]
        .iter()
        .filter(|candidate| !candidate.is_duplicate)
        .find_map(|candidate| {
            same_person(client, candidate).map(|reason| DuplicateMatch {
                original: candidate,
                reason,
            })
        })
}
