//! Audit log database operations.

use rusqlite::{params, Row};

use super::{parse_enum, parse_json, Database};
use crate::models::{AuditLogEntry, EntityType};
use crate::store::{AuditStore, StoreError, StoreResult};

const COLUMNS: &str = "id, timestamp, actor_id, actor_email, action, entity_type, entity_id, \
                       previous_value, new_value, previous_hash, entry_hash";

impl Database {
    fn query_audit(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StoreResult<Vec<AuditLogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, AuditRow::read)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }
}

impl AuditStore for Database {
    fn append_audit_entry(&self, entry: &AuditLogEntry) -> StoreResult<()> {
        let previous_value = entry.previous_value.as_ref().map(serde_json::to_string).transpose()?;
        let new_value = entry.new_value.as_ref().map(serde_json::to_string).transpose()?;

        self.conn.execute(
            &format!(
                "INSERT INTO audit_log ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                COLUMNS
            ),
            params![
                entry.id,
                entry.timestamp,
                entry.actor_id,
                entry.actor_email,
                entry.action.as_str(),
                entry.entity_type.as_str(),
                entry.entity_id,
                previous_value,
                new_value,
                entry.previous_hash,
                entry.entry_hash,
            ],
        )?;
        Ok(())
    }

    fn list_audit_entries(&self) -> StoreResult<Vec<AuditLogEntry>> {
        self.query_audit(&format!("SELECT {} FROM audit_log ORDER BY seq", COLUMNS), &[])
    }

    fn list_audit_entries_for(&self, entity_type: EntityType, entity_id: &str) -> StoreResult<Vec<AuditLogEntry>> {
        self.query_audit(
            &format!(
                "SELECT {} FROM audit_log WHERE entity_type = ? AND entity_id = ? ORDER BY seq",
                COLUMNS
            ),
            &[&entity_type.as_str(), &entity_id],
        )
    }

    fn last_audit_entry(&self) -> StoreResult<Option<AuditLogEntry>> {
        Ok(self
            .query_audit(
                &format!("SELECT {} FROM audit_log ORDER BY seq DESC LIMIT 1", COLUMNS),
                &[],
            )?
            .pop())
    }
}

/// Intermediate row struct for database mapping.
struct AuditRow {
    id: String,
    timestamp: String,
    actor_id: String,
    actor_email: Option<String>,
    action: String,
    entity_type: String,
    entity_id: String,
    previous_value: Option<String>,
    new_value: Option<String>,
    previous_hash: Option<String>,
    entry_hash: String,
}

impl AuditRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            actor_id: row.get(2)?,
            actor_email: row.get(3)?,
            action: row.get(4)?,
            entity_type: row.get(5)?,
            entity_id: row.get(6)?,
            previous_value: row.get(7)?,
            new_value: row.get(8)?,
            previous_hash: row.get(9)?,
            entry_hash: row.get(10)?,
        })
    }
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditLogEntry {
            id: row.id,
            timestamp: row.timestamp,
            actor_id: row.actor_id,
            actor_email: row.actor_email,
            action: parse_enum("audit_log.action", &row.action)?,
            entity_type: parse_enum("audit_log.entity_type", &row.entity_type)?,
            entity_id: row.entity_id,
            previous_value: row
                .previous_value
                .map(|v| parse_json("audit_log.previous_value", &v))
                .transpose()?,
            new_value: row
                .new_value
                .map(|v| parse_json("audit_log.new_value", &v))
                .transpose()?,
            previous_hash: row.previous_hash,
            entry_hash: row.entry_hash,
        })
    }
}
