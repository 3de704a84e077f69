//! Evaluation-criteria rule engine.
//!
//! Pipeline: Criteria list → active filter + whitelist check + priority sort
//! → per-criteria field read and operator evaluation → first match / all matches.

mod fields;
mod matcher;
mod operator;
mod validate;

pub use fields::*;
pub use matcher::*;
pub use operator::*;
pub use validate::*;

use thiserror::Error;

/// Evaluation errors. All of them are configuration problems the caller must report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Field not allowed for evaluation: {0}")]
    FieldNotAllowed(String),

    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),
}

pub type EvaluationResult<T> = Result<T, EvaluationError>;
