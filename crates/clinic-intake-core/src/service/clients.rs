use super::{snapshot, Actor, IntakeService, Mutation, ServiceError, ServiceResult};
use crate::models::{AuditAction, Client, ClientStatus, EntityType, NewClient, ReopenEvent, Workflow};
use crate::store::Patch;

impl IntakeService {
    // =========================================================================
    // Clients
    // =========================================================================

    /// Record a new intake submission.
    pub fn create_client(&self, actor: &Actor, intake: NewClient) -> ServiceResult<Client> {
        if intake.first_name.trim().is_empty() && intake.last_name.trim().is_empty() {
            return Err(ServiceError::Validation("client name is required".into()));
        }
        if let Some(email) = intake.email.as_deref().map(str::trim) {
            if !email.is_empty() && !email.contains('@') {
                return Err(ServiceError::Validation(format!("invalid email address: {}", email)));
            }
        }

        let client = self.backend.create_client(intake)?;
        self.audit(
            actor,
            AuditAction::Create,
            EntityType::Client,
            &client.id,
            None,
            Some(snapshot(&client)?),
        )?;
        log::info!("Created client {}", client.id);
        Ok(client)
    }

    pub fn get_client(&self, id: &str) -> ServiceResult<Client> {
        self.backend
            .get_client(id)?
            .ok_or_else(|| ServiceError::not_found(EntityType::Client, id))
    }

    pub fn list_clients(&self) -> ServiceResult<Vec<Client>> {
        Ok(self.backend.list_clients()?)
    }

    /// Closed clients, most recently closed first.
    pub fn list_closed_clients(&self, workflow: Option<Workflow>) -> ServiceResult<Vec<Client>> {
        Ok(self.backend.list_closed_clients(workflow)?)
    }

    /// Partial update of non-lifecycle fields.
    pub fn update_client(&self, actor: &Actor, id: &str, patch: &Patch) -> ServiceResult<Mutation<Client>> {
        let before = self.get_client(id)?;
        let after = self
            .backend
            .update_client(id, patch)?
            .ok_or_else(|| ServiceError::not_found(EntityType::Client, id))?;

        self.audit(
            actor,
            AuditAction::Update,
            EntityType::Client,
            id,
            Some(snapshot(&before)?),
            Some(snapshot(&after)?),
        )?;
        Ok(self.after_client_change(after))
    }

    /// Move a client to `status`.
    ///
    /// Plain transitions must go forward. Closure statuses and `duplicate`
    /// are routed to [`close_client`](Self::close_client) and
    /// [`mark_duplicate`](Self::mark_duplicate).
    pub fn change_status(&self, actor: &Actor, id: &str, status: ClientStatus) -> ServiceResult<Mutation<Client>> {
        match status {
            ClientStatus::Duplicate => return self.mark_duplicate(actor, id, None),
            ClientStatus::ClosedNoContact | ClientStatus::ClosedOther => {
                return self.close_client(actor, id, status, None)
            }
            _ => {}
        }

        let before = self.get_client(id)?;
        ensure_open(&before)?;
        if before.status == status {
            return Ok(Mutation::clean(before));
        }
        if !before.status.can_advance_to(status) {
            return Err(ServiceError::InvalidTransition(format!(
                "{} -> {}",
                before.status, status
            )));
        }

        let mut after = before.clone();
        after.status = status;
        stamp_status_dates(&mut after, status);
        self.save_transition(actor, AuditAction::StatusChange, &before, after)
    }

    /// Close a client with `closed_no_contact` or `closed_other`.
    pub fn close_client(
        &self,
        actor: &Actor,
        id: &str,
        status: ClientStatus,
        reason: Option<String>,
    ) -> ServiceResult<Mutation<Client>> {
        if !matches!(status, ClientStatus::ClosedNoContact | ClientStatus::ClosedOther) {
            return Err(ServiceError::Validation(format!("{} is not a closure status", status)));
        }
        let before = self.get_client(id)?;
        ensure_open(&before)?;

        let mut after = before.clone();
        close(&mut after, status, reason);
        self.save_transition(actor, AuditAction::StatusChange, &before, after)
    }

    /// Close a client as a duplicate, optionally of another client.
    pub fn mark_duplicate(
        &self,
        actor: &Actor,
        id: &str,
        duplicate_of: Option<&str>,
    ) -> ServiceResult<Mutation<Client>> {
        let before = self.get_client(id)?;
        ensure_open(&before)?;
        if let Some(original) = duplicate_of {
            if original == id {
                return Err(ServiceError::Validation("a client cannot duplicate itself".into()));
            }
            self.get_client(original)?;
        }

        let mut after = before.clone();
        after.is_duplicate = true;
        after.duplicate_of_client_id = duplicate_of.map(String::from);
        close(&mut after, ClientStatus::Duplicate, Some("duplicate".into()));
        self.save_transition(actor, AuditAction::StatusChange, &before, after)
    }

    /// Reopen a closed client into the entry status of the workflow it was
    /// closed from.
    pub fn reopen_client(&self, actor: &Actor, id: &str, reason: Option<String>) -> ServiceResult<Mutation<Client>> {
        let before = self.get_client(id)?;
        if !before.is_closed() {
            return Err(ServiceError::InvalidTransition(format!(
                "client {} is not closed",
                id
            )));
        }

        let workflow = before.closed_from_workflow.unwrap_or(Workflow::Evaluation);
        let mut after = before.clone();
        after.reopen_history.push(ReopenEvent {
            reopened_at: chrono::Utc::now().to_rfc3339(),
            reopened_by: actor.id.clone(),
            reason,
            previous_status: before.status,
            previous_closed_date: before.closed_date.clone(),
            previous_closed_reason: before.closed_reason.clone(),
        });
        after.status = workflow.entry_status();
        after.closed_date = None;
        after.closed_reason = None;
        after.closed_from_workflow = None;
        if before.status == ClientStatus::Duplicate {
            after.is_duplicate = false;
            after.duplicate_of_client_id = None;
        }

        log::info!("Reopening client {} into {}", id, workflow.as_str());
        self.save_transition(actor, AuditAction::Reopen, &before, after)
    }

    /// Persist a whole-record transition and audit it.
    pub(crate) fn save_transition(
        &self,
        actor: &Actor,
        action: AuditAction,
        before: &Client,
        mut after: Client,
    ) -> ServiceResult<Mutation<Client>> {
        after.touch();
        if !self.backend.save_client(&after)? {
            return Err(ServiceError::not_found(EntityType::Client, &after.id));
        }
        self.audit(
            actor,
            action,
            EntityType::Client,
            &after.id,
            Some(snapshot(before)?),
            Some(snapshot(&after)?),
        )?;
        Ok(self.after_client_change(after))
    }
}

fn ensure_open(client: &Client) -> ServiceResult<()> {
    if client.is_closed() {
        Err(ServiceError::InvalidTransition(format!(
            "client {} is closed; reopen it first",
            client.id
        )))
    } else {
        Ok(())
    }
}

fn close(client: &mut Client, status: ClientStatus, reason: Option<String>) {
    client.closed_from_workflow = client.status.workflow();
    client.status = status;
    client.closed_date = Some(chrono::Utc::now().to_rfc3339());
    client.closed_reason = reason;
}

/// Timestamps implied by reaching a status.
fn stamp_status_dates(client: &mut Client, status: ClientStatus) {
    let now = chrono::Utc::now().to_rfc3339();
    match status {
        ClientStatus::Replied => {
            client.replied_date = Some(now.clone());
            client.last_contact_date = Some(now);
        }
        ClientStatus::Referred => {
            client.referral_date.get_or_insert(now);
        }
        _ => {}
    }
}
