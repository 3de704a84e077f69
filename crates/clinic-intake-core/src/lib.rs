//! Clinic Intake Core Library
//!
//! Intake triage for a therapy practice: rule-based evaluation of new clients,
//! outreach tracking, referral clinics and a tamper-evident audit log, over
//! either a SQLite database or a spreadsheet workbook.
//!
//! # Architecture
//!
//! ```text
//! Intake form → create_client
//!                    │
//!              evaluate_client ── criteria matcher + duplicate detection
//!                    │
//!     evaluation_complete / evaluation_flagged
//!                    │
//!          initialize_outreach → record_outreach_sent (1..N)
//!                    │
//!        replied → scheduling  |  referral  |  closed ── reopen
//!
//!   every mutation ──► audit log entry (hash-chained)
//! ```
//!
//! # Modules
//!
//! - [`models`]: Domain types (Client, EvaluationCriteria, OutreachAttempt, etc.)
//! - [`evaluation`]: Field accessor, operator evaluator and criteria matcher
//! - [`store`]: Storage traits shared by both backends
//! - [`db`]: SQLite backend
//! - [`sheets`]: Spreadsheet backend
//! - [`audit`]: Hash-chained audit logger
//! - [`duplicates`]: Duplicate intake detection
//! - [`service`]: Access rules, lifecycle transitions and auditing
//! - [`config`]: TOML configuration

pub mod audit;
pub mod config;
pub mod db;
pub mod duplicates;
pub mod evaluation;
pub mod models;
pub mod service;
pub mod sheets;
pub mod store;

// Re-export commonly used types
pub use audit::{AuditLogger, ChainReport};
pub use config::{BackendConfig, ClinicConfig};
pub use db::Database;
pub use evaluation::{ClientField, CriteriaMatcher, FieldWhitelist};
pub use models::{
    Client, ClientStatus, EmailTemplate, EvaluationCriteria, OutreachAttempt, ReferralClinic,
    Setting, Workflow,
};
pub use service::{Actor, IntakeService, Mutation, Role, ServiceError};
pub use sheets::SheetsBackend;
pub use store::{open_backend, Backend, StoreError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use models::{NewClient, NewCriteria, NewReferralClinic, SentEmail, TemplateType};
use service::CriteriaUpdate;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicIntakeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Backend error: {0}")]
    BackendError(String),
}

impl From<ServiceError> for ClinicIntakeError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(m) => ClinicIntakeError::InvalidInput(m),
            ServiceError::NotFound { .. } => ClinicIntakeError::NotFound(e.to_string()),
            ServiceError::Forbidden(m) => ClinicIntakeError::Forbidden(m),
            ServiceError::InvalidTransition(m) => ClinicIntakeError::InvalidTransition(m),
            ServiceError::Backend(_) => ClinicIntakeError::BackendError(e.to_string()),
        }
    }
}

impl From<config::ConfigError> for ClinicIntakeError {
    fn from(e: config::ConfigError) -> Self {
        ClinicIntakeError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for ClinicIntakeError {
    fn from(e: serde_json::Error) -> Self {
        ClinicIntakeError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicIntakeError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicIntakeError::BackendError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open the backend described by a TOML configuration.
#[uniffi::export]
pub fn open_clinic(config_toml: String) -> Result<Arc<ClinicIntakeCore>, ClinicIntakeError> {
    let config = ClinicConfig::from_toml_str(&config_toml)?;
    ClinicIntakeCore::new(IntakeService::open(&config)?)
}

/// In-memory SQLite backend with default configuration (for testing).
#[uniffi::export]
pub fn open_clinic_in_memory() -> Result<Arc<ClinicIntakeCore>, ClinicIntakeError> {
    ClinicIntakeCore::new(IntakeService::open(&ClinicConfig::default())?)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe service wrapper for FFI. Entities cross the boundary as JSON
/// strings in their camelCase wire form.
#[derive(uniffi::Object)]
pub struct ClinicIntakeCore {
    service: Arc<Mutex<IntakeService>>,
}

impl ClinicIntakeCore {
    fn new(service: IntakeService) -> Result<Arc<Self>, ClinicIntakeError> {
        Ok(Arc::new(Self {
            service: Arc::new(Mutex::new(service)),
        }))
    }
}

#[uniffi::export]
impl ClinicIntakeCore {
    // =========================================================================
    // Client Operations
    // =========================================================================

    /// Record an intake submission.
    pub fn create_client(&self, actor: FfiActor, intake_json: String) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        let intake: NewClient = from_json(&intake_json)?;
        to_json(&service.create_client(&actor.into(), intake)?)
    }

    pub fn get_client(&self, id: String) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        to_json(&service.get_client(&id)?)
    }

    pub fn list_clients(&self) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        to_json(&service.list_clients()?)
    }

    /// Closed clients, optionally of one workflow, most recent first.
    pub fn list_closed_clients(&self, workflow: Option<String>) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        let workflow = workflow
            .map(|w| Workflow::from_str(&w).map_err(ClinicIntakeError::InvalidInput))
            .transpose()?;
        to_json(&service.list_closed_clients(workflow)?)
    }

    pub fn update_client(
        &self,
        actor: FfiActor,
        id: String,
        patch_json: String,
    ) -> Result<FfiMutation, ClinicIntakeError> {
        let service = self.service.lock()?;
        let patch = store::patch_from_value(from_json(&patch_json)?).map_err(ServiceError::from)?;
        service.update_client(&actor.into(), &id, &patch)?.try_into()
    }

    pub fn change_status(&self, actor: FfiActor, id: String, status: String) -> Result<FfiMutation, ClinicIntakeError> {
        let service = self.service.lock()?;
        let status = parse_status(&status)?;
        service.change_status(&actor.into(), &id, status)?.try_into()
    }

    pub fn close_client(
        &self,
        actor: FfiActor,
        id: String,
        status: String,
        reason: Option<String>,
    ) -> Result<FfiMutation, ClinicIntakeError> {
        let service = self.service.lock()?;
        let status = parse_status(&status)?;
        service.close_client(&actor.into(), &id, status, reason)?.try_into()
    }

    pub fn reopen_client(
        &self,
        actor: FfiActor,
        id: String,
        reason: Option<String>,
    ) -> Result<FfiMutation, ClinicIntakeError> {
        let service = self.service.lock()?;
        service.reopen_client(&actor.into(), &id, reason)?.try_into()
    }

    pub fn mark_duplicate(
        &self,
        actor: FfiActor,
        id: String,
        duplicate_of: Option<String>,
    ) -> Result<FfiMutation, ClinicIntakeError> {
        let service = self.service.lock()?;
        service
            .mark_duplicate(&actor.into(), &id, duplicate_of.as_deref())?
            .try_into()
    }

    // =========================================================================
    // Evaluation Operations
    // =========================================================================

    pub fn evaluate_client(&self, actor: FfiActor, id: String) -> Result<FfiMutation, ClinicIntakeError> {
        let service = self.service.lock()?;
        service.evaluate_client(&actor.into(), &id)?.try_into()
    }

    /// Evaluation outcome without saving it.
    pub fn preview_evaluation(&self, id: String) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        to_json(&service.preview_evaluation(&id)?)
    }

    pub fn list_criteria(&self) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        to_json(&service.list_criteria()?)
    }

    pub fn create_criteria(&self, actor: FfiActor, criteria_json: String) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        let input: NewCriteria = from_json(&criteria_json)?;
        to_json(&service.create_criteria(&actor.into(), input)?)
    }

    pub fn update_criteria(
        &self,
        actor: FfiActor,
        id: String,
        patch_json: String,
    ) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        let patch = store::patch_from_value(from_json(&patch_json)?).map_err(ServiceError::from)?;
        to_json(&service.update_criteria(&actor.into(), &id, &patch)?)
    }

    pub fn delete_criteria(&self, actor: FfiActor, id: String) -> Result<(), ClinicIntakeError> {
        let service = self.service.lock()?;
        Ok(service.delete_criteria(&actor.into(), &id)?)
    }

    /// `updates_json` is a list of `{"id": ..., "patch": {...}}`.
    pub fn bulk_update_criteria(&self, actor: FfiActor, updates_json: String) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        let updates: Vec<CriteriaUpdate> = from_json(&updates_json)?;
        to_json(&service.bulk_update_criteria(&actor.into(), updates)?)
    }

    // =========================================================================
    // Outreach Operations
    // =========================================================================

    pub fn initialize_outreach(&self, actor: FfiActor, client_id: String) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        to_json(&service.initialize_outreach(&actor.into(), &client_id)?)
    }

    pub fn list_outreach(&self, client_id: String) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        to_json(&service.list_outreach(&client_id)?)
    }

    pub fn record_outreach_sent(
        &self,
        actor: FfiActor,
        attempt_id: String,
        subject: Option<String>,
        body: Option<String>,
        message_id: Option<String>,
    ) -> Result<FfiMutation, ClinicIntakeError> {
        let service = self.service.lock()?;
        let email = SentEmail {
            subject,
            body,
            message_id,
        };
        service
            .record_outreach_sent(&actor.into(), &attempt_id, email)?
            .try_into()
    }

    pub fn reset_outreach(&self, actor: FfiActor, client_id: String) -> Result<u32, ClinicIntakeError> {
        let service = self.service.lock()?;
        Ok(service.reset_outreach(&actor.into(), &client_id)? as u32)
    }

    // =========================================================================
    // Clinic, Template and Settings Operations
    // =========================================================================

    pub fn list_clinics(&self) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        to_json(&service.list_clinics()?)
    }

    pub fn create_clinic(&self, actor: FfiActor, clinic_json: String) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        let input: NewReferralClinic = from_json(&clinic_json)?;
        to_json(&service.create_clinic(&actor.into(), input)?)
    }

    /// Render the template of `template_type` for a client.
    pub fn render_template(
        &self,
        template_type: String,
        client_id: String,
        extras: HashMap<String, String>,
    ) -> Result<FfiRenderedEmail, ClinicIntakeError> {
        let service = self.service.lock()?;
        let template_type = TemplateType::from_str(&template_type).map_err(ClinicIntakeError::InvalidInput)?;
        let extras: BTreeMap<String, String> = extras.into_iter().collect();
        let rendered = service.render_template(template_type, &client_id, &extras)?;
        Ok(FfiRenderedEmail {
            subject: rendered.subject,
            body: rendered.body,
        })
    }

    pub fn set_setting(&self, actor: FfiActor, key: String, value: String) -> Result<(), ClinicIntakeError> {
        let service = self.service.lock()?;
        service.set_setting(&actor.into(), &key, &value)?;
        Ok(())
    }

    pub fn get_setting(&self, key: String) -> Result<Option<String>, ClinicIntakeError> {
        let service = self.service.lock()?;
        match service.get_setting(&key) {
            Ok(setting) => Ok(Some(setting.value)),
            Err(ServiceError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Audit Operations
    // =========================================================================

    pub fn list_audit_entries(&self, actor: FfiActor) -> Result<String, ClinicIntakeError> {
        let service = self.service.lock()?;
        to_json(&service.list_audit_entries(&actor.into())?)
    }

    pub fn verify_audit_chain(&self, actor: FfiActor) -> Result<FfiChainReport, ClinicIntakeError> {
        let service = self.service.lock()?;
        Ok(service.verify_audit_chain(&actor.into())?.into())
    }
}

fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, ClinicIntakeError> {
    Ok(serde_json::from_str(json)?)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ClinicIntakeError> {
    serde_json::to_string(value).map_err(|e| ClinicIntakeError::BackendError(e.to_string()))
}

fn parse_status(status: &str) -> Result<ClientStatus, ClinicIntakeError> {
    ClientStatus::from_str(status).map_err(ClinicIntakeError::InvalidInput)
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe caller identity.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiActor {
    pub id: String,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl From<FfiActor> for Actor {
    fn from(actor: FfiActor) -> Self {
        Actor {
            id: actor.id,
            email: actor.email,
            role: if actor.is_admin { Role::Admin } else { Role::Staff },
        }
    }
}

/// FFI-safe mutation result: the entity as JSON plus non-fatal warnings.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMutation {
    pub json: String,
    pub warnings: Vec<String>,
}

impl<T: Serialize> TryFrom<Mutation<T>> for FfiMutation {
    type Error = ClinicIntakeError;

    fn try_from(mutation: Mutation<T>) -> Result<Self, Self::Error> {
        Ok(Self {
            json: to_json(&mutation.value)?,
            warnings: mutation.warnings,
        })
    }
}

/// FFI-safe rendered email.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRenderedEmail {
    pub subject: String,
    pub body: String,
}

/// FFI-safe audit chain verification result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChainReport {
    pub entries: u32,
    pub head_hash: Option<String>,
    pub intact: bool,
    pub broken_entry_id: Option<String>,
    pub break_reason: Option<String>,
}

impl From<ChainReport> for FfiChainReport {
    fn from(report: ChainReport) -> Self {
        let intact = report.is_intact();
        let (broken_entry_id, break_reason) = match report.first_break {
            Some(b) => (Some(b.entry_id), Some(b.reason)),
            None => (None, None),
        };
        Self {
            entries: report.entries as u32,
            head_hash: report.head_hash,
            intact,
            broken_entry_id,
            break_reason,
        }
    }
}
