//! Operator evaluation between a field value and a comparison value.
//!
//! A missing field behaves exactly like the empty string.

use regex::Regex;

use crate::models::Operator;

/// Split a comma-separated comparison value into trimmed, non-empty tokens.
pub fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect()
}

/// Apply `operator` to a field value. Never fails: a regex that does not
/// compile evaluates to `false`.
pub fn evaluate(field_value: Option<&str>, operator: Operator, comparison: &str) -> bool {
    let field = field_value.unwrap_or("");

    match operator {
        Operator::Exists => !field.trim().is_empty(),
        Operator::NotExists => field.trim().is_empty(),
        Operator::Equals => field == comparison,
        Operator::NotEquals => field != comparison,
        Operator::Contains => contains_ci(field, comparison),
        Operator::NotContains => !contains_ci(field, comparison),
        Operator::ContainsAny => {
            let tokens = split_list(comparison);
            tokens.iter().any(|token| contains_ci(field, token))
        }
        Operator::ContainsAll => {
            let tokens = split_list(comparison);
            !tokens.is_empty() && tokens.iter().all(|token| contains_ci(field, token))
        }
        Operator::InList => split_list(comparison).contains(&field.trim()),
        Operator::NotInList => !split_list(comparison).contains(&field.trim()),
        Operator::Regex => match Regex::new(comparison) {
            Ok(pattern) => pattern.is_match(field),
            Err(e) => {
                // Fail closed so one bad criteria cannot block the others
                log::warn!("Criteria regex {:?} does not compile: {}", comparison, e);
                false
            }
        },
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
