//! Hash-chained audit trail over an [`AuditStore`].
//!
//! Each entry stores the hash of the entry before it, so editing or removing
//! a stored entry breaks every later link.

use serde::{Deserialize, Serialize};

use crate::models::{AuditLogEntry, NewAuditEntry};
use crate::store::{AuditStore, StoreResult};

/// Where and why a chain stopped verifying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBreak {
    /// Position of the offending entry in append order
    pub index: usize,
    pub entry_id: String,
    pub reason: String,
}

/// Result of walking the whole chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub entries: usize,
    pub head_hash: Option<String>,
    pub first_break: Option<ChainBreak>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.first_break.is_none()
    }
}

/// Audit log writer and verifier.
pub struct AuditLogger<'a, S: AuditStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: AuditStore + ?Sized> AuditLogger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Seal `entry` onto the chain and persist it.
    pub fn log(&self, entry: NewAuditEntry) -> StoreResult<AuditLogEntry> {
        let previous_hash = self.store.last_audit_entry()?.map(|e| e.entry_hash);
        let sealed = AuditLogEntry::seal(entry, previous_hash)?;
        self.store.append_audit_entry(&sealed)?;

        log::debug!(
            "Audit {} {} {} by {}",
            sealed.action.as_str(),
            sealed.entity_type.as_str(),
            sealed.entity_id,
            sealed.actor_id
        );
        Ok(sealed)
    }

    /// Verify every stored entry.
    pub fn verify_chain(&self) -> StoreResult<ChainReport> {
        let report = check_chain(&self.store.list_audit_entries()?)?;
        if let Some(b) = &report.first_break {
            log::warn!("Audit chain broken at entry {} ({}): {}", b.index, b.entry_id, b.reason);
        }
        Ok(report)
    }
}

/// Check hashes and links of entries in append order.
pub fn check_chain(entries: &[AuditLogEntry]) -> Result<ChainReport, serde_json::Error> {
    let mut previous: Option<&str> = None;

    for (index, entry) in entries.iter().enumerate() {
        let broken = |reason: &str| ChainReport {
            entries: entries.len(),
            head_hash: entries.last().map(|e| e.entry_hash.clone()),
            first_break: Some(ChainBreak {
                index,
                entry_id: entry.id.clone(),
                reason: reason.to_string(),
            }),
        };

        if entry.previous_hash.as_deref() != previous {
            return Ok(broken("previous hash does not match the preceding entry"));
        }
        if entry.compute_hash()? != entry.entry_hash {
            return Ok(broken("entry contents do not match its hash"));
        }
        previous = Some(entry.entry_hash.as_str());
    }

    Ok(ChainReport {
        entries: entries.len(),
        head_hash: previous.map(String::from),
        first_break: None,
    })
}
