//! Store trait implementations over sheets.

use clinic_intake_sheets::Workbook;

use super::{SheetsBackend, AUDIT_LOG, CLIENTS, CLINICS, CRITERIA, OUTREACH, SETTINGS, TEMPLATES};
use crate::models::{
    AuditLogEntry, Client, EmailTemplate, EvaluationCriteria, NewClient, NewCriteria, NewEmailTemplate,
    NewOutreachAttempt, NewReferralClinic, OutreachAttempt, ReferralClinic, Setting, TemplateType, Workflow,
};
use crate::store::{
    sort_closed_clients, AuditStore, ClientStore, ClinicStore, CriteriaStore, OutreachStore, Patch,
    SettingsStore, StoreError, StoreResult, TemplateStore,
};

// ============================================================================
// Clients
// ============================================================================

impl<W: Workbook> ClientStore for SheetsBackend<W> {
    fn list_clients(&self) -> StoreResult<Vec<Client>> {
        self.records(&CLIENTS)
    }

    fn get_client(&self, id: &str) -> StoreResult<Option<Client>> {
        self.find(&CLIENTS, "id", id)
    }

    fn create_client(&self, intake: NewClient) -> StoreResult<Client> {
        let client = Client::new(intake);
        self.append(&CLIENTS, &client)?;
        Ok(client)
    }

    fn update_client(&self, id: &str, patch: &Patch) -> StoreResult<Option<Client>> {
        self.patch_entity(&CLIENTS, id, patch, |_: &mut Client| {})
    }

    fn save_client(&self, client: &Client) -> StoreResult<bool> {
        self.replace(&CLIENTS, "id", &client.id, client)
    }

    fn list_closed_clients(&self, workflow: Option<Workflow>) -> StoreResult<Vec<Client>> {
        let mut clients: Vec<Client> = self
            .list_clients()?
            .into_iter()
            .filter(|c| c.is_closed())
            .filter(|c| workflow.map_or(true, |w| c.closed_from_workflow == Some(w)))
            .collect();
        sort_closed_clients(&mut clients);
        Ok(clients)
    }
}

// ============================================================================
// Evaluation Criteria
// ============================================================================

impl<W: Workbook> CriteriaStore for SheetsBackend<W> {
    fn list_criteria(&self) -> StoreResult<Vec<EvaluationCriteria>> {
        let mut criteria: Vec<EvaluationCriteria> = self.records(&CRITERIA)?;
        criteria.sort_by_key(|c| c.priority);
        Ok(criteria)
    }

    fn get_criteria(&self, id: &str) -> StoreResult<Option<EvaluationCriteria>> {
        self.find(&CRITERIA, "id", id)
    }

    fn create_criteria(&self, input: NewCriteria, created_by: Option<String>) -> StoreResult<EvaluationCriteria> {
        let criteria = EvaluationCriteria::new(input, created_by);
        self.append(&CRITERIA, &criteria)?;
        Ok(criteria)
    }

    fn update_criteria(&self, id: &str, patch: &Patch) -> StoreResult<Option<EvaluationCriteria>> {
        self.patch_entity(&CRITERIA, id, patch, |_: &mut EvaluationCriteria| {})
    }

    fn delete_criteria(&self, id: &str) -> StoreResult<bool> {
        self.remove(&CRITERIA, "id", id)
    }
}

// ============================================================================
// Outreach Attempts
// ============================================================================

impl<W: Workbook> OutreachStore for SheetsBackend<W> {
    fn list_outreach_attempts(&self) -> StoreResult<Vec<OutreachAttempt>> {
        self.records(&OUTREACH)
    }

    fn list_outreach_for_client(&self, client_id: &str) -> StoreResult<Vec<OutreachAttempt>> {
        let mut attempts: Vec<OutreachAttempt> = self
            .list_outreach_attempts()?
            .into_iter()
            .filter(|a| a.client_id == client_id)
            .collect();
        attempts.sort_by_key(|a| a.attempt_number);
        Ok(attempts)
    }

    fn get_outreach_attempt(&self, id: &str) -> StoreResult<Option<OutreachAttempt>> {
        self.find(&OUTREACH, "id", id)
    }

    fn create_outreach_attempt(&self, input: NewOutreachAttempt) -> StoreResult<OutreachAttempt> {
        if input.attempt_number == 0 {
            return Err(StoreError::Validation("attempt numbers start at 1".into()));
        }
        let taken = self
            .list_outreach_for_client(&input.client_id)?
            .iter()
            .any(|a| a.attempt_number == input.attempt_number);
        if taken {
            return Err(StoreError::Validation(format!(
                "client {} already has attempt {}",
                input.client_id, input.attempt_number
            )));
        }

        let attempt = OutreachAttempt::new(input);
        self.append(&OUTREACH, &attempt)?;
        Ok(attempt)
    }

    fn update_outreach_attempt(&self, id: &str, patch: &Patch) -> StoreResult<Option<OutreachAttempt>> {
        self.patch_entity(&OUTREACH, id, patch, |_: &mut OutreachAttempt| {})
    }

    fn delete_outreach_attempt(&self, id: &str) -> StoreResult<bool> {
        self.remove(&OUTREACH, "id", id)
    }

    fn delete_outreach_for_client(&self, client_id: &str) -> StoreResult<usize> {
        self.remove_where(&OUTREACH, "clientId", |cell| cell == client_id)
    }
}

// ============================================================================
// Referral Clinics
// ============================================================================

impl<W: Workbook> ClinicStore for SheetsBackend<W> {
    fn list_clinics(&self) -> StoreResult<Vec<ReferralClinic>> {
        self.records(&CLINICS)
    }

    fn get_clinic(&self, id: &str) -> StoreResult<Option<ReferralClinic>> {
        self.find(&CLINICS, "id", id)
    }

    fn create_clinic(&self, input: NewReferralClinic) -> StoreResult<ReferralClinic> {
        let clinic = ReferralClinic::new(input);
        self.append(&CLINICS, &clinic)?;
        Ok(clinic)
    }

    fn update_clinic(&self, id: &str, patch: &Patch) -> StoreResult<Option<ReferralClinic>> {
        self.patch_entity(&CLINICS, id, patch, ReferralClinic::normalize)
    }

    fn delete_clinic(&self, id: &str) -> StoreResult<bool> {
        self.remove(&CLINICS, "id", id)
    }
}

// ============================================================================
// Email Templates
// ============================================================================

impl<W: Workbook> TemplateStore for SheetsBackend<W> {
    fn list_templates(&self) -> StoreResult<Vec<EmailTemplate>> {
        self.records(&TEMPLATES)
    }

    fn get_template(&self, id: &str) -> StoreResult<Option<EmailTemplate>> {
        self.find(&TEMPLATES, "id", id)
    }

    fn get_template_by_type(&self, template_type: TemplateType) -> StoreResult<Option<EmailTemplate>> {
        self.find(&TEMPLATES, "type", template_type.as_str())
    }

    fn create_template(&self, input: NewEmailTemplate, updated_by: Option<String>) -> StoreResult<EmailTemplate> {
        if self.get_template_by_type(input.template_type)?.is_some() {
            return Err(StoreError::Validation(format!(
                "a {} template already exists",
                input.template_type.as_str()
            )));
        }
        let template = EmailTemplate::new(input, updated_by);
        self.append(&TEMPLATES, &template)?;
        Ok(template)
    }

    fn update_template(&self, id: &str, patch: &Patch) -> StoreResult<Option<EmailTemplate>> {
        self.patch_entity(&TEMPLATES, id, patch, |_: &mut EmailTemplate| {})
    }

    fn delete_template(&self, id: &str) -> StoreResult<bool> {
        self.remove(&TEMPLATES, "id", id)
    }
}

// ============================================================================
// Settings
// ============================================================================

impl<W: Workbook> SettingsStore for SheetsBackend<W> {
    fn list_settings(&self) -> StoreResult<Vec<Setting>> {
        let mut settings: Vec<Setting> = self.records(&SETTINGS)?;
        settings.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(settings)
    }

    fn get_setting(&self, key: &str) -> StoreResult<Option<Setting>> {
        self.find(&SETTINGS, "key", key)
    }

    fn set_setting(&self, key: &str, value: &str, updated_by: Option<String>) -> StoreResult<Setting> {
        let setting = Setting::new(key, value, updated_by);
        if !self.replace(&SETTINGS, "key", key, &setting)? {
            self.append(&SETTINGS, &setting)?;
        }
        Ok(setting)
    }

    fn delete_setting(&self, key: &str) -> StoreResult<bool> {
        self.remove(&SETTINGS, "key", key)
    }
}

// ============================================================================
// Audit Log
// ============================================================================

impl<W: Workbook> AuditStore for SheetsBackend<W> {
    fn append_audit_entry(&self, entry: &AuditLogEntry) -> StoreResult<()> {
        self.append(&AUDIT_LOG, entry)
    }

    fn list_audit_entries(&self) -> StoreResult<Vec<AuditLogEntry>> {
        self.records(&AUDIT_LOG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttemptStatus, ClientStatus, CriteriaAction, Operator};
    use crate::store::patch_from_value;
    use clinic_intake_sheets::MemoryWorkbook;
    use serde_json::json;

    fn backend() -> SheetsBackend<MemoryWorkbook> {
        SheetsBackend::new(MemoryWorkbook::new())
    }

    #[test]
    fn test_client_round_trip_through_cells() {
        let backend = backend();
        let mut client = backend
            .create_client(NewClient {
                first_name: "Jo".into(),
                last_name: "Park".into(),
                age: Some("15".into()),
                phone: Some("0123".into()),
                ..Default::default()
            })
            .unwrap();
        client.status = ClientStatus::EvaluationFlagged;
        client.matched_criteria_ids = vec!["c-1".into(), "c-2".into()];
        client.is_duplicate = true;
        backend.save_client(&client).unwrap();

        let fetched = backend.get_client(&client.id).unwrap().unwrap();
        assert_eq!(fetched, client);
        // Digit strings stay text
        assert_eq!(fetched.phone.as_deref(), Some("0123"));
    }

    #[test]
    fn test_criteria_sorted_by_priority() {
        let backend = backend();
        for (name, priority) in [("B", 2), ("A", 1), ("C", 2)] {
            backend
                .create_criteria(
                    NewCriteria {
                        name: name.into(),
                        description: None,
                        field: "age".into(),
                        operator: Operator::Exists,
                        value: String::new(),
                        action: CriteriaAction::Flag,
                        priority,
                        is_active: true,
                    },
                    None,
                )
                .unwrap();
        }
        let names: Vec<_> = backend.list_criteria().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_outreach_uniqueness_and_update() {
        let backend = backend();
        let attempts = backend.initialize_outreach_for_client("client-1", 2).unwrap();
        assert!(matches!(
            backend.create_outreach_attempt(NewOutreachAttempt::pending("client-1", 2)),
            Err(StoreError::Validation(_))
        ));

        let patch = patch_from_value(json!({"status": "sent"})).unwrap();
        let updated = backend.update_outreach_attempt(&attempts[0].id, &patch).unwrap().unwrap();
        assert_eq!(updated.status, AttemptStatus::Sent);
        assert_eq!(backend.get_outreach_attempt(&attempts[0].id).unwrap(), Some(updated));

        assert_eq!(backend.delete_outreach_for_client("client-1").unwrap(), 2);
        assert!(backend.list_outreach_attempts().unwrap().is_empty());
    }

    #[test]
    fn test_settings_upsert() {
        let backend = backend();
        backend.set_setting("b", "1", None).unwrap();
        backend.set_setting("a", "2", None).unwrap();
        backend.set_setting("b", "3", None).unwrap();

        let settings = backend.list_settings().unwrap();
        let pairs: Vec<_> = settings.iter().map(|s| (s.key.as_str(), s.value.as_str())).collect();
        assert_eq!(pairs, vec![("a", "2"), ("b", "3")]);
    }

    #[test]
    fn test_one_template_per_type() {
        let backend = backend();
        let input = NewEmailTemplate {
            template_type: TemplateType::InitialOutreach,
            name: "Welcome".into(),
            subject: "Hi".into(),
            body: "Body".into(),
            is_active: true,
        };
        backend.create_template(input.clone(), None).unwrap();
        assert!(backend.create_template(input, None).is_err());
    }
}
