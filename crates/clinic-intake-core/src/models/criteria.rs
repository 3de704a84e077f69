//! Evaluation criteria models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Entity, EntityType};

/// Comparison operator applied between a client field and a criteria value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Exists,
    NotExists,
    Equals,
    NotEquals,
    Contains,
    NotContains,
    ContainsAny,
    ContainsAll,
    InList,
    NotInList,
    Regex,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Operator::Exists,
        Operator::NotExists,
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::NotContains,
        Operator::ContainsAny,
        Operator::ContainsAll,
        Operator::InList,
        Operator::NotInList,
        Operator::Regex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Exists => "exists",
            Operator::NotExists => "not_exists",
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::ContainsAny => "contains_any",
            Operator::ContainsAll => "contains_all",
            Operator::InList => "in_list",
            Operator::NotInList => "not_in_list",
            Operator::Regex => "regex",
        }
    }

    /// Operators whose value is a comma-separated token list.
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            Operator::ContainsAny | Operator::ContainsAll | Operator::InList | Operator::NotInList
        )
    }

    /// Operators that ignore the comparison value.
    pub fn ignores_value(&self) -> bool {
        matches!(self, Operator::Exists | Operator::NotExists)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = crate::evaluation::EvaluationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| crate::evaluation::EvaluationError::UnknownOperator(s.to_string()))
    }
}

/// Action taken when a criteria matches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaAction {
    Flag,
    FlagUrgent,
    FlagReview,
}

impl CriteriaAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriteriaAction::Flag => "flag",
            CriteriaAction::FlagUrgent => "flag_urgent",
            CriteriaAction::FlagReview => "flag_review",
        }
    }
}

impl FromStr for CriteriaAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flag" => Ok(CriteriaAction::Flag),
            "flag_urgent" => Ok(CriteriaAction::FlagUrgent),
            "flag_review" => Ok(CriteriaAction::FlagReview),
            _ => Err(format!("Unknown criteria action: {}", s)),
        }
    }
}

fn default_active() -> bool {
    true
}

/// Administrator input for a new criteria.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewCriteria {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Client field name, checked against the field whitelist
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
    pub action: CriteriaAction,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// A stored evaluation criteria.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationCriteria {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub field: String,
    pub operator: Operator,
    pub value: String,
    pub action: CriteriaAction,
    /// Lower evaluates first
    pub priority: i32,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl EvaluationCriteria {
    /// Create a criteria from administrator input.
    pub fn new(input: NewCriteria, created_by: Option<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            field: input.field,
            operator: input.operator,
            value: input.value,
            action: input.action,
            priority: input.priority,
            is_active: input.is_active,
            created_by,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// The input fields of this criteria (for re-validation after a patch).
    pub fn as_input(&self) -> NewCriteria {
        NewCriteria {
            name: self.name.clone(),
            description: self.description.clone(),
            field: self.field.clone(),
            operator: self.operator,
            value: self.value.clone(),
            action: self.action,
            priority: self.priority,
            is_active: self.is_active,
        }
    }
}

impl Entity for EvaluationCriteria {
    const ENTITY_TYPE: EntityType = EntityType::EvaluationCriteria;
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["id", "createdAt", "createdBy"];

    fn id(&self) -> &str {
        &self.id
    }
}
