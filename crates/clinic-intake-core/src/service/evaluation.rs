use serde::{Deserialize, Serialize};

use super::{Actor, IntakeService, Mutation, ServiceError, ServiceResult};
use crate::duplicates::{find_duplicate, DuplicateReason};
use crate::evaluation::CriteriaMatcher;
use crate::models::{AuditAction, Client, ClientStatus, CriteriaAction, EvaluationCriteria};

/// Earlier client an intake appears to repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateFinding {
    pub client_id: String,
    pub reason: DuplicateReason,
}

/// What evaluating a client yields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOutcome {
    pub client_id: String,
    /// Matching criteria in evaluation order
    pub matched: Vec<EvaluationCriteria>,
    /// Action of the first match
    pub action: Option<CriteriaAction>,
    pub duplicate: Option<DuplicateFinding>,
    pub notes: String,
}

impl EvaluationOutcome {
    pub fn is_flagged(&self) -> bool {
        !self.matched.is_empty() || self.duplicate.is_some()
    }

    /// Status the evaluation assigns.
    pub fn status(&self) -> ClientStatus {
        if self.is_flagged() {
            ClientStatus::EvaluationFlagged
        } else {
            ClientStatus::EvaluationComplete
        }
    }
}

impl IntakeService {
    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Evaluate a client without writing anything.
    pub fn preview_evaluation(&self, id: &str) -> ServiceResult<EvaluationOutcome> {
        let client = self.get_client(id)?;
        self.run_evaluation(&client)
    }

    /// Evaluate a client and store the result on its record.
    ///
    /// A client already past evaluation keeps its status; only the
    /// evaluation fields are refreshed.
    pub fn evaluate_client(&self, actor: &Actor, id: &str) -> ServiceResult<Mutation<Client>> {
        let before = self.get_client(id)?;
        if before.is_closed() {
            return Err(ServiceError::InvalidTransition(format!(
                "client {} is closed; reopen it first",
                id
            )));
        }
        let outcome = self.run_evaluation(&before)?;

        let mut after = before.clone();
        after.evaluation_score = outcome.action.map(|a| a.as_str().to_string());
        after.matched_criteria_ids = outcome.matched.iter().map(|c| c.id.clone()).collect();
        after.evaluation_notes = Some(outcome.notes.clone());
        after.evaluated_at = Some(chrono::Utc::now().to_rfc3339());
        match &outcome.duplicate {
            Some(duplicate) => {
                after.is_duplicate = true;
                after.duplicate_of_client_id = Some(duplicate.client_id.clone());
            }
            // A stale flag from an earlier run no longer holds
            None if before.status != ClientStatus::Duplicate => {
                after.is_duplicate = false;
                after.duplicate_of_client_id = None;
            }
            None => {}
        }
        let status = outcome.status();
        if before.status.can_advance_to(status) {
            after.status = status;
        }

        log::info!(
            "Evaluated client {}: {} criteria matched{}",
            id,
            outcome.matched.len(),
            if outcome.duplicate.is_some() { ", possible duplicate" } else { "" }
        );
        self.save_transition(actor, AuditAction::Evaluate, &before, after)
    }

    fn run_evaluation(&self, client: &Client) -> ServiceResult<EvaluationOutcome> {
        let criteria = self.backend.list_criteria()?;
        let matcher = CriteriaMatcher::new(&criteria, &self.whitelist)?;
        let matched: Vec<EvaluationCriteria> = matcher.matches(client).into_iter().cloned().collect();

        let existing = self.backend.list_clients()?;
        let duplicate = find_duplicate(client, &existing).map(|m| DuplicateFinding {
            client_id: m.original.id.clone(),
            reason: m.reason,
        });

        let notes = evaluation_notes(&matched, duplicate.as_ref());
        Ok(EvaluationOutcome {
            client_id: client.id.clone(),
            action: matched.first().map(|c| c.action),
            matched,
            duplicate,
            notes,
        })
    }
}

fn evaluation_notes(matched: &[EvaluationCriteria], duplicate: Option<&DuplicateFinding>) -> String {
    let mut lines: Vec<String> = if matched.is_empty() {
        vec!["No criteria matched".to_string()]
    } else {
        matched
            .iter()
            .map(|c| format!("Matched \"{}\" ({})", c.name, c.action.as_str()))
            .collect()
    };
    if let Some(d) = duplicate {
        lines.push(format!("Possible duplicate of client {} ({})", d.client_id, d.reason.describe()));
    }
    lines.join("\n")
}
