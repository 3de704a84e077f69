//! Write-time validation of administrator-entered criteria.

use regex::Regex;

use crate::models::{NewCriteria, Operator};

use super::{split_list, EvaluationError, EvaluationResult, FieldWhitelist};

/// Check that a criteria is well formed before it is stored.
pub fn validate_criteria(input: &NewCriteria, whitelist: &FieldWhitelist) -> EvaluationResult<()> {
    if input.name.trim().is_empty() {
        return Err(EvaluationError::InvalidCriteria("name is required".into()));
    }

    whitelist.resolve(&input.field)?;

    match input.operator {
        op if op.ignores_value() => Ok(()),
        Operator::Regex => Regex::new(&input.value).map(|_| ()).map_err(|e| {
            EvaluationError::InvalidCriteria(format!("regex does not compile: {}", e))
        }),
        op if op.takes_list() && split_list(&input.value).is_empty() => Err(
            EvaluationError::InvalidCriteria(format!("{} needs at least one value", op)),
        ),
        op if input.value.is_empty() => Err(EvaluationError::InvalidCriteria(format!(
            "{} needs a comparison value",
            op
        ))),
        _ => Ok(()),
    }
}
