use serde_json::json;

use super::{snapshot, Actor, IntakeService, Mutation, ServiceError, ServiceResult};
use crate::models::{
    parse_outreach_attempt_count, AttemptStatus, AuditAction, Client, EntityType, OutreachAttempt,
    SentEmail, OUTREACH_ATTEMPT_COUNT,
};
use crate::store::Patch;

impl IntakeService {
    // =========================================================================
    // Outreach
    // =========================================================================

    /// Attempts to pre-create per client: the stored setting, else the
    /// configured default.
    pub fn outreach_attempt_count(&self) -> ServiceResult<u32> {
        let Some(setting) = self.backend.get_setting(OUTREACH_ATTEMPT_COUNT)? else {
            return Ok(self.default_attempt_count);
        };
        match parse_outreach_attempt_count(&setting.value) {
            Ok(count) => Ok(count),
            Err(e) => {
                log::warn!("Ignoring {} setting: {}", OUTREACH_ATTEMPT_COUNT, e);
                Ok(self.default_attempt_count)
            }
        }
    }

    /// Attempts of a client by attempt number.
    pub fn list_outreach(&self, client_id: &str) -> ServiceResult<Vec<OutreachAttempt>> {
        self.get_client(client_id)?;
        Ok(self.backend.list_outreach_for_client(client_id)?)
    }

    pub fn get_outreach_attempt(&self, id: &str) -> ServiceResult<OutreachAttempt> {
        self.backend
            .get_outreach_attempt(id)?
            .ok_or_else(|| ServiceError::not_found(EntityType::OutreachAttempt, id))
    }

    /// Pre-create the pending attempt sequence of a client.
    pub fn initialize_outreach(&self, actor: &Actor, client_id: &str) -> ServiceResult<Vec<OutreachAttempt>> {
        let client = self.get_client(client_id)?;
        if client.is_closed() {
            return Err(ServiceError::InvalidTransition(format!(
                "client {} is closed",
                client_id
            )));
        }
        if !self.backend.list_outreach_for_client(client_id)?.is_empty() {
            return Err(ServiceError::Validation(format!(
                "outreach already initialized for client {}",
                client_id
            )));
        }

        let count = self.outreach_attempt_count()?;
        let created = self.backend.initialize_outreach_for_client(client_id, count)?;
        self.audit(
            actor,
            AuditAction::BulkCreate,
            EntityType::OutreachAttempt,
            client_id,
            None,
            Some(snapshot(&created)?),
        )?;
        log::info!("Initialized {} outreach attempts for client {}", created.len(), client_id);
        Ok(created)
    }

    /// Mark an attempt sent and move its client along the outreach sequence.
    ///
    /// The client only moves forward; a client already past the status the
    /// attempt implies keeps its status but gets its contact dates.
    pub fn record_outreach_sent(
        &self,
        actor: &Actor,
        attempt_id: &str,
        email: SentEmail,
    ) -> ServiceResult<Mutation<OutreachAttempt>> {
        let before = self.get_outreach_attempt(attempt_id)?;
        if matches!(before.status, AttemptStatus::Sent | AttemptStatus::Replied) {
            return Err(ServiceError::Validation(format!(
                "attempt {} was already sent",
                attempt_id
            )));
        }
        let client_before = self.get_client(&before.client_id)?;
        if client_before.is_closed() {
            return Err(ServiceError::InvalidTransition(format!(
                "client {} is closed",
                client_before.id
            )));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut patch = Patch::new();
        patch.insert("status".into(), AttemptStatus::Sent.as_str().into());
        patch.insert("sentDate".into(), now.clone().into());
        patch.insert("emailSubject".into(), email.subject.into());
        patch.insert("emailBody".into(), email.body.into());
        patch.insert("emailMessageId".into(), email.message_id.into());
        let attempt = self
            .backend
            .update_outreach_attempt(attempt_id, &patch)?
            .ok_or_else(|| ServiceError::not_found(EntityType::OutreachAttempt, attempt_id))?;

        let mut client = client_before.clone();
        advance_after_send(&mut client, &attempt, &now);
        client.touch();
        if !self.backend.save_client(&client)? {
            return Err(ServiceError::not_found(EntityType::Client, &client.id));
        }

        self.audit(
            actor,
            AuditAction::Update,
            EntityType::OutreachAttempt,
            attempt_id,
            Some(json!({"attempt": snapshot(&before)?, "client": snapshot(&client_before)?})),
            Some(json!({"attempt": snapshot(&attempt)?, "client": snapshot(&client)?})),
        )?;

        let document = self.after_client_change(client);
        Ok(Mutation {
            value: attempt,
            warnings: document.warnings,
        })
    }

    /// Partial update of an attempt (notes, schedule, skip or fail).
    pub fn update_outreach_attempt(&self, actor: &Actor, id: &str, patch: &Patch) -> ServiceResult<OutreachAttempt> {
        let before = self.get_outreach_attempt(id)?;
        let after = self
            .backend
            .update_outreach_attempt(id, patch)?
            .ok_or_else(|| ServiceError::not_found(EntityType::OutreachAttempt, id))?;
        self.audit(
            actor,
            AuditAction::Update,
            EntityType::OutreachAttempt,
            id,
            Some(snapshot(&before)?),
            Some(snapshot(&after)?),
        )?;
        Ok(after)
    }

    /// Delete every attempt of a client. Returns how many were removed.
    pub fn reset_outreach(&self, actor: &Actor, client_id: &str) -> ServiceResult<usize> {
        let existing = self.list_outreach(client_id)?;
        if existing.is_empty() {
            return Ok(0);
        }
        let removed = self.backend.delete_outreach_for_client(client_id)?;
        self.audit(
            actor,
            AuditAction::BulkDelete,
            EntityType::OutreachAttempt,
            client_id,
            Some(snapshot(&existing)?),
            None,
        )?;
        log::info!("Removed {} outreach attempts for client {}", removed, client_id);
        Ok(removed)
    }
}

fn advance_after_send(client: &mut Client, attempt: &OutreachAttempt, sent_at: &str) {
    let target = attempt.client_status_after_send();
    if client.status.can_advance_to(target) {
        client.status = target;
    }
    let date = match attempt.attempt_number {
        0 | 1 => &mut client.initial_outreach_date,
        2 => &mut client.follow_up_1_date,
        _ => &mut client.follow_up_2_date,
    };
    *date = Some(sent_at.to_string());
    client.last_contact_date = Some(sent_at.to_string());
}
