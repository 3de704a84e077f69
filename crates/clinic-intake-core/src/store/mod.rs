//! Data-access layer: one capability trait per entity, two interchangeable backends.
//!
//! ```text
//!                      IntakeService
//!                            │
//!                    Box<dyn Backend>
//!                            │
//!            ┌───────────────┴───────────────┐
//!            ▼                               ▼
//!    db::Database (SQLite)      sheets::SheetsBackend<W: Workbook>
//! ```
//!
//! Both backends honour the same contract: `create_*` assigns a fresh id and
//! timestamps, `update_*` is a partial merge that returns `Ok(None)` for an
//! unknown id, `delete_*` reports whether something was removed, and listing
//! operations return the same order.

mod patch;

pub use patch::*;

use clinic_intake_sheets::{FileWorkbook, MemoryWorkbook, RecordError, SheetError};
use thiserror::Error;

use crate::config::BackendConfig;
use crate::db::Database;
use crate::models::{
    AuditLogEntry, Client, EmailTemplate, EntityType, EvaluationCriteria, NewClient, NewCriteria,
    NewEmailTemplate, NewOutreachAttempt, NewReferralClinic, OutreachAttempt, ReferralClinic,
    Setting, TemplateType, Workflow,
};
use crate::sheets::SheetsBackend;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spreadsheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Spreadsheet record error: {0}")]
    Record(#[from] RecordError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Client records. Clients are never hard-deleted.
pub trait ClientStore {
    /// All clients in creation order.
    fn list_clients(&self) -> StoreResult<Vec<Client>>;

    fn get_client(&self, id: &str) -> StoreResult<Option<Client>>;

    fn create_client(&self, intake: NewClient) -> StoreResult<Client>;

    /// Partial merge; lifecycle fields are rejected.
    fn update_client(&self, id: &str, patch: &Patch) -> StoreResult<Option<Client>>;

    /// Replace a whole record (lifecycle transitions). Returns false if absent.
    fn save_client(&self, client: &Client) -> StoreResult<bool>;

    /// Closed clients, most recently closed first.
    fn list_closed_clients(&self, workflow: Option<Workflow>) -> StoreResult<Vec<Client>>;
}

/// Evaluation criteria.
pub trait CriteriaStore {
    /// All criteria by ascending priority, ties in creation order.
    fn list_criteria(&self) -> StoreResult<Vec<EvaluationCriteria>>;

    fn get_criteria(&self, id: &str) -> StoreResult<Option<EvaluationCriteria>>;

    fn create_criteria(&self, input: NewCriteria, created_by: Option<String>) -> StoreResult<EvaluationCriteria>;

    fn update_criteria(&self, id: &str, patch: &Patch) -> StoreResult<Option<EvaluationCriteria>>;

    fn delete_criteria(&self, id: &str) -> StoreResult<bool>;
}

/// Outreach attempts.
pub trait OutreachStore {
    fn list_outreach_attempts(&self) -> StoreResult<Vec<OutreachAttempt>>;

    /// Attempts of one client by attempt number.
    fn list_outreach_for_client(&self, client_id: &str) -> StoreResult<Vec<OutreachAttempt>>;

    fn get_outreach_attempt(&self, id: &str) -> StoreResult<Option<OutreachAttempt>>;

    /// Fails with a validation error if the client already has that attempt number.
    fn create_outreach_attempt(&self, input: NewOutreachAttempt) -> StoreResult<OutreachAttempt>;

    fn update_outreach_attempt(&self, id: &str, patch: &Patch) -> StoreResult<Option<OutreachAttempt>>;

    fn delete_outreach_attempt(&self, id: &str) -> StoreResult<bool>;

    /// Pre-create pending attempts 1..=count, skipping numbers that already exist.
    ///
    /// Items are written one by one; on failure the attempts already written stay.
    fn initialize_outreach_for_client(&self, client_id: &str, count: u32) -> StoreResult<Vec<OutreachAttempt>> {
        let existing: Vec<u32> = self
            .list_outreach_for_client(client_id)?
            .iter()
            .map(|a| a.attempt_number)
            .collect();

        let mut created = Vec::new();
        for number in (1..=count).filter(|n| !existing.contains(n)) {
            created.push(self.create_outreach_attempt(NewOutreachAttempt::pending(client_id, number))?);
        }
        Ok(created)
    }

    /// Remove every attempt of a client; returns how many were removed.
    fn delete_outreach_for_client(&self, client_id: &str) -> StoreResult<usize>;
}

/// Referral clinics.
pub trait ClinicStore {
    fn list_clinics(&self) -> StoreResult<Vec<ReferralClinic>>;

    fn get_clinic(&self, id: &str) -> StoreResult<Option<ReferralClinic>>;

    fn create_clinic(&self, input: NewReferralClinic) -> StoreResult<ReferralClinic>;

    fn update_clinic(&self, id: &str, patch: &Patch) -> StoreResult<Option<ReferralClinic>>;

    fn delete_clinic(&self, id: &str) -> StoreResult<bool>;
}

/// Email templates, at most one per type.
pub trait TemplateStore {
    fn list_templates(&self) -> StoreResult<Vec<EmailTemplate>>;

    fn get_template(&self, id: &str) -> StoreResult<Option<EmailTemplate>>;

    fn get_template_by_type(&self, template_type: TemplateType) -> StoreResult<Option<EmailTemplate>>;

    /// Fails with a validation error if a template of that type exists.
    fn create_template(&self, input: NewEmailTemplate, updated_by: Option<String>) -> StoreResult<EmailTemplate>;

    fn update_template(&self, id: &str, patch: &Patch) -> StoreResult<Option<EmailTemplate>>;

    fn delete_template(&self, id: &str) -> StoreResult<bool>;
}

/// Key/value settings.
pub trait SettingsStore {
    fn list_settings(&self) -> StoreResult<Vec<Setting>>;

    fn get_setting(&self, key: &str) -> StoreResult<Option<Setting>>;

    /// Insert or replace.
    fn set_setting(&self, key: &str, value: &str, updated_by: Option<String>) -> StoreResult<Setting>;

    fn delete_setting(&self, key: &str) -> StoreResult<bool>;
}

/// Append-only audit log. There is no update or delete.
pub trait AuditStore {
    fn append_audit_entry(&self, entry: &AuditLogEntry) -> StoreResult<()>;

    /// All entries in append order.
    fn list_audit_entries(&self) -> StoreResult<Vec<AuditLogEntry>>;

    fn list_audit_entries_for(&self, entity_type: EntityType, entity_id: &str) -> StoreResult<Vec<AuditLogEntry>> {
        Ok(self
            .list_audit_entries()?
            .into_iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .collect())
    }

    fn last_audit_entry(&self) -> StoreResult<Option<AuditLogEntry>> {
        Ok(self.list_audit_entries()?.pop())
    }
}

/// Everything the service needs from a persistence backend.
pub trait Backend:
    ClientStore + CriteriaStore + OutreachStore + ClinicStore + TemplateStore + SettingsStore + AuditStore + Send
{
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Open the backend selected by configuration.
pub fn open_backend(config: &BackendConfig) -> StoreResult<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match config {
        BackendConfig::Sqlite { path: Some(path) } => Box::new(Database::open(path)?),
        BackendConfig::Sqlite { path: None } => Box::new(Database::open_in_memory()?),
        BackendConfig::Sheets { path: Some(path) } => {
            Box::new(SheetsBackend::new(FileWorkbook::open(path)?))
        }
        BackendConfig::Sheets { path: None } => Box::new(SheetsBackend::new(MemoryWorkbook::new())),
    };
    log::info!("Opened {} backend", backend.backend_name());
    Ok(backend)
}

/// Order closed clients by closure date descending, ties by id.
///
/// Dates are compared as instants when they parse as RFC 3339, so both
/// backends agree regardless of offset formatting.
pub(crate) fn sort_closed_clients(clients: &mut [Client]) {
    fn instant(client: &Client) -> Option<chrono::DateTime<chrono::Utc>> {
        client
            .closed_date
            .as_deref()
            .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&chrono::Utc))
    }

    clients.sort_by(|a, b| {
        let by_date = match (instant(a), instant(b)) {
            (Some(x), Some(y)) => y.cmp(&x),
            _ => b.closed_date.cmp(&a.closed_date),
        };
        by_date.then_with(|| a.id.cmp(&b.id))
    });
}
