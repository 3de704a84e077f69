use serde::{Deserialize, Serialize};

use super::{require_admin, snapshot, Actor, IntakeService, ServiceError, ServiceResult};
use crate::evaluation::validate_criteria;
use crate::models::{AuditAction, EntityType, EvaluationCriteria, NewCriteria};
use crate::store::{apply_patch, Patch};

/// One item of a bulk criteria update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaUpdate {
    pub id: String,
    pub patch: Patch,
}

/// An item a bulk operation could not apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: String,
    pub error: String,
}

/// Items applied and items rejected by a bulk operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome<T> {
    pub applied: Vec<T>,
    pub failures: Vec<BulkFailure>,
}

impl IntakeService {
    // =========================================================================
    // Evaluation criteria
    // =========================================================================

    /// Criteria in evaluation order.
    pub fn list_criteria(&self) -> ServiceResult<Vec<EvaluationCriteria>> {
        Ok(self.backend.list_criteria()?)
    }

    pub fn get_criteria(&self, id: &str) -> ServiceResult<EvaluationCriteria> {
        self.backend
            .get_criteria(id)?
            .ok_or_else(|| ServiceError::not_found(EntityType::EvaluationCriteria, id))
    }

    pub fn create_criteria(&self, actor: &Actor, input: NewCriteria) -> ServiceResult<EvaluationCriteria> {
        require_admin(actor, "manage evaluation criteria")?;
        validate_criteria(&input, &self.whitelist)?;

        let created = self.backend.create_criteria(input, Some(actor.id.clone()))?;
        self.audit(
            actor,
            AuditAction::Create,
            EntityType::EvaluationCriteria,
            &created.id,
            None,
            Some(snapshot(&created)?),
        )?;
        Ok(created)
    }

    /// Partial update, validated against the merged result before writing.
    pub fn update_criteria(&self, actor: &Actor, id: &str, patch: &Patch) -> ServiceResult<EvaluationCriteria> {
        require_admin(actor, "manage evaluation criteria")?;
        let (before, after) = self.apply_criteria_patch(id, patch)?;
        self.audit(
            actor,
            AuditAction::Update,
            EntityType::EvaluationCriteria,
            id,
            Some(snapshot(&before)?),
            Some(snapshot(&after)?),
        )?;
        Ok(after)
    }

    pub fn delete_criteria(&self, actor: &Actor, id: &str) -> ServiceResult<()> {
        require_admin(actor, "manage evaluation criteria")?;
        let before = self.get_criteria(id)?;
        if !self.backend.delete_criteria(id)? {
            return Err(ServiceError::not_found(EntityType::EvaluationCriteria, id));
        }
        self.audit(
            actor,
            AuditAction::Delete,
            EntityType::EvaluationCriteria,
            id,
            Some(snapshot(&before)?),
            None,
        )
    }

    /// Apply several patches. Items succeed or fail independently and the
    /// applied subset is audited as one bulk entry.
    pub fn bulk_update_criteria(
        &self,
        actor: &Actor,
        updates: Vec<CriteriaUpdate>,
    ) -> ServiceResult<BulkOutcome<EvaluationCriteria>> {
        require_admin(actor, "manage evaluation criteria")?;

        let mut previous = Vec::new();
        let mut outcome = BulkOutcome {
            applied: Vec::new(),
            failures: Vec::new(),
        };
        for update in updates {
            match self.apply_criteria_patch(&update.id, &update.patch) {
                Ok((before, after)) => {
                    previous.push(before);
                    outcome.applied.push(after);
                }
                Err(ServiceError::Backend(e)) => return Err(ServiceError::Backend(e)),
                Err(e) => {
                    log::warn!("Bulk criteria update skipped {}: {}", update.id, e);
                    outcome.failures.push(BulkFailure {
                        id: update.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if !outcome.applied.is_empty() {
            let ids: Vec<&str> = outcome.applied.iter().map(|c| c.id.as_str()).collect();
            self.audit(
                actor,
                AuditAction::BulkUpdate,
                EntityType::EvaluationCriteria,
                &ids.join(","),
                Some(snapshot(&previous)?),
                Some(snapshot(&outcome.applied)?),
            )?;
        }
        Ok(outcome)
    }

    fn apply_criteria_patch(
        &self,
        id: &str,
        patch: &Patch,
    ) -> ServiceResult<(EvaluationCriteria, EvaluationCriteria)> {
        let before = self.get_criteria(id)?;
        let merged = apply_patch(&before, patch)?;
        validate_criteria(&merged.as_input(), &self.whitelist)?;

        let after = self
            .backend
            .update_criteria(id, patch)?
            .ok_or_else(|| ServiceError::not_found(EntityType::EvaluationCriteria, id))?;
        Ok((before, after))
    }
}
