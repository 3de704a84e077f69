//! Audit log models.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Kind of mutation recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Evaluate,
    StatusChange,
    BulkCreate,
    BulkUpdate,
    BulkDelete,
    Reopen,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Evaluate => "evaluate",
            AuditAction::StatusChange => "status_change",
            AuditAction::BulkCreate => "bulk_create",
            AuditAction::BulkUpdate => "bulk_update",
            AuditAction::BulkDelete => "bulk_delete",
            AuditAction::Reopen => "reopen",
        }
    }
}

/// Entity a mutation touched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Client,
    EvaluationCriteria,
    OutreachAttempt,
    ReferralClinic,
    EmailTemplate,
    Setting,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Client => "client",
            EntityType::EvaluationCriteria => "evaluation_criteria",
            EntityType::OutreachAttempt => "outreach_attempt",
            EntityType::ReferralClinic => "referral_clinic",
            EntityType::EmailTemplate => "email_template",
            EntityType::Setting => "setting",
        }
    }
}

/// Entry content before it is sealed into the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub actor_id: String,
    pub actor_email: Option<String>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub previous_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Immutable record of one mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub timestamp: String,
    pub actor_id: String,
    pub actor_email: Option<String>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub previous_value: Option<Value>,
    pub new_value: Option<Value>,
    /// Hash of the preceding entry; None for the first entry
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

/// Hashed view of an entry: everything except `entryHash`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashedFields<'a> {
    id: &'a str,
    timestamp: &'a str,
    actor_id: &'a str,
    actor_email: Option<&'a str>,
    action: AuditAction,
    entity_type: EntityType,
    entity_id: &'a str,
    previous_value: Option<&'a Value>,
    new_value: Option<&'a Value>,
    previous_hash: Option<&'a str>,
}

impl AuditLogEntry {
    /// Seal an entry onto the chain after `previous_hash`.
    pub fn seal(entry: NewAuditEntry, previous_hash: Option<String>) -> Result<Self, serde_json::Error> {
        let mut sealed = Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            actor_id: entry.actor_id,
            actor_email: entry.actor_email,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            previous_value: entry.previous_value,
            new_value: entry.new_value,
            previous_hash,
            entry_hash: String::new(),
        };
        sealed.entry_hash = sealed.compute_hash()?;
        Ok(sealed)
    }

    /// SHA-256 (hex) over the canonical JSON of all fields but `entryHash`.
    pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
        let canonical = serde_json::to_string(&HashedFields {
            id: &self.id,
            timestamp: &self.timestamp,
            actor_id: &self.actor_id,
            actor_email: self.actor_email.as_deref(),
            action: self.action,
            entity_type: self.entity_type,
            entity_id: &self.entity_id,
            previous_value: self.previous_value.as_ref(),
            new_value: self.new_value.as_ref(),
            previous_hash: self.previous_hash.as_deref(),
        })?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}
