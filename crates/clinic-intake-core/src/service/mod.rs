//! Intake service: access rules, lifecycle transitions and auditing on top of
//! a storage [`Backend`].
//!
//! Every mutating operation writes exactly one audit entry. Creates carry only
//! a new value, deletes only a previous value.

mod admin;
mod clients;
mod criteria;
mod evaluation;
mod outreach;

pub use admin::*;
pub use clients::*;
pub use criteria::*;
pub use evaluation::*;
pub use outreach::*;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::audit::{AuditLogger, ChainReport};
use crate::config::ClinicConfig;
use crate::evaluation::{EvaluationError, FieldWhitelist};
use crate::models::{AuditAction, AuditLogEntry, Client, EntityType, NewAuditEntry};
use crate::store::{open_backend, Backend, StoreError};

/// Service errors.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{} not found: {}", .entity.as_str(), .id)]
    NotFound { entity: EntityType, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    /// Detail is logged, not shown.
    #[error("Storage backend failure")]
    Backend(#[source] StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(message) => ServiceError::Validation(message),
            other => {
                log::error!("Storage backend failure: {}", other);
                ServiceError::Backend(other)
            }
        }
    }
}

impl From<EvaluationError> for ServiceError {
    fn from(e: EvaluationError) -> Self {
        ServiceError::Validation(e.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e).into()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub(crate) fn not_found(entity: EntityType, id: &str) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
}

/// Authenticated caller of a service operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub email: Option<String>,
    pub role: Role,
}

impl Actor {
    pub fn admin(id: &str) -> Self {
        Self {
            id: id.to_string(),
            email: None,
            role: Role::Admin,
        }
    }

    pub fn staff(id: &str) -> Self {
        Self {
            id: id.to_string(),
            email: None,
            role: Role::Staff,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Result of a mutation plus non-fatal problems from follow-up work.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

impl<T> Mutation<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }
}

/// Follow-up work after a client record changes, such as regenerating the
/// client's intake document. Failures never undo the change.
pub trait ClientDocumentHook: Send {
    fn client_changed(&self, client: &Client) -> Result<(), String>;
}

/// The intake service.
pub struct IntakeService {
    backend: Box<dyn Backend>,
    whitelist: FieldWhitelist,
    default_attempt_count: u32,
    document_hook: Option<Box<dyn ClientDocumentHook>>,
}

impl IntakeService {
    pub fn new(backend: Box<dyn Backend>, config: &ClinicConfig) -> ServiceResult<Self> {
        let whitelist = config.whitelist()?;
        log::info!(
            "Intake service on {} backend ({} evaluable fields)",
            backend.backend_name(),
            whitelist.fields().count()
        );
        Ok(Self {
            backend,
            whitelist,
            default_attempt_count: config.outreach.default_attempt_count,
            document_hook: None,
        })
    }

    /// Open the configured backend and build a service over it.
    pub fn open(config: &ClinicConfig) -> ServiceResult<Self> {
        let backend = open_backend(&config.backend)?;
        Self::new(backend, config)
    }

    pub fn with_document_hook(mut self, hook: Box<dyn ClientDocumentHook>) -> Self {
        self.document_hook = Some(hook);
        self
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn whitelist(&self) -> &FieldWhitelist {
        &self.whitelist
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// All audit entries in append order (admin only).
    pub fn list_audit_entries(&self, actor: &Actor) -> ServiceResult<Vec<AuditLogEntry>> {
        require_admin(actor, "read the audit log")?;
        Ok(self.backend.list_audit_entries()?)
    }

    /// Audit entries of one entity (admin only).
    pub fn audit_history(
        &self,
        actor: &Actor,
        entity_type: EntityType,
        entity_id: &str,
    ) -> ServiceResult<Vec<AuditLogEntry>> {
        require_admin(actor, "read the audit log")?;
        Ok(self.backend.list_audit_entries_for(entity_type, entity_id)?)
    }

    /// Walk the hash chain (admin only).
    pub fn verify_audit_chain(&self, actor: &Actor) -> ServiceResult<ChainReport> {
        require_admin(actor, "verify the audit log")?;
        Ok(AuditLogger::new(self.backend.as_ref()).verify_chain()?)
    }

    fn audit(
        &self,
        actor: &Actor,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: &str,
        previous_value: Option<Value>,
        new_value: Option<Value>,
    ) -> ServiceResult<()> {
        AuditLogger::new(self.backend.as_ref()).log(NewAuditEntry {
            actor_id: actor.id.clone(),
            actor_email: actor.email.clone(),
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            previous_value,
            new_value,
        })?;
        Ok(())
    }

    /// Run the document hook; a failure becomes a warning.
    fn after_client_change(&self, client: Client) -> Mutation<Client> {
        let mut mutation = Mutation::clean(client);
        if let Some(hook) = &self.document_hook {
            if let Err(e) = hook.client_changed(&mutation.value) {
                log::warn!("Document update failed for client {}: {}", mutation.value.id, e);
                mutation
                    .warnings
                    .push(format!("Client document was not updated: {}", e));
            }
        }
        mutation
    }
}

pub(crate) fn require_admin(actor: &Actor, what: &str) -> ServiceResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!("only administrators may {}", what)))
    }
}

pub(crate) fn snapshot<T: Serialize>(value: &T) -> ServiceResult<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::Database;
    use crate::models::NewClient;

    pub fn service() -> IntakeService {
        IntakeService::new(
            Box::new(Database::open_in_memory().unwrap()),
            &ClinicConfig::default(),
        )
        .unwrap()
    }

    pub fn admin() -> Actor {
        Actor::admin("admin-1").with_email("admin@clinic.example")
    }

    pub fn staff() -> Actor {
        Actor::staff("staff-1")
    }

    pub fn intake(first: &str, last: &str) -> NewClient {
        NewClient {
            first_name: first.into(),
            last_name: last.into(),
            ..Default::default()
        }
    }
}
