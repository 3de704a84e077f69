//! Outreach attempt database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_as_validation, parse_enum, Database};
use crate::models::{NewOutreachAttempt, OutreachAttempt};
use crate::store::{apply_patch, OutreachStore, Patch, StoreError, StoreResult};

const COLUMNS: &str = "id, client_id, attempt_number, attempt_type, status, scheduled_date, \
                       sent_date, email_subject, email_body, email_message_id, notes, \
                       created_at, updated_at";

impl Database {
    fn query_attempts(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StoreResult<Vec<OutreachAttempt>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, AttemptRow::read)?;

        let mut attempts = Vec::new();
        for row in rows {
            attempts.push(row?.try_into()?);
        }
        Ok(attempts)
    }
}

impl OutreachStore for Database {
    fn list_outreach_attempts(&self) -> StoreResult<Vec<OutreachAttempt>> {
        self.query_attempts(
            &format!("SELECT {} FROM outreach_attempts ORDER BY rowid", COLUMNS),
            &[],
        )
    }

    fn list_outreach_for_client(&self, client_id: &str) -> StoreResult<Vec<OutreachAttempt>> {
        self.query_attempts(
            &format!(
                "SELECT {} FROM outreach_attempts WHERE client_id = ? ORDER BY attempt_number",
                COLUMNS
            ),
            &[&client_id],
        )
    }

    fn get_outreach_attempt(&self, id: &str) -> StoreResult<Option<OutreachAttempt>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM outreach_attempts WHERE id = ?", COLUMNS),
                [id],
                AttemptRow::read,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn create_outreach_attempt(&self, input: NewOutreachAttempt) -> StoreResult<OutreachAttempt> {
        if input.attempt_number == 0 {
            return Err(StoreError::Validation("attempt numbers start at 1".into()));
        }
        let attempt = OutreachAttempt::new(input);

        self.conn
            .execute(
                &format!(
                    "INSERT INTO outreach_attempts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    COLUMNS
                ),
                params![
                    attempt.id,
                    attempt.client_id,
                    attempt.attempt_number,
                    attempt.attempt_type.as_str(),
                    attempt.status.as_str(),
                    attempt.scheduled_date,
                    attempt.sent_date,
                    attempt.email_subject,
                    attempt.email_body,
                    attempt.email_message_id,
                    attempt.notes,
                    attempt.created_at,
                    attempt.updated_at,
                ],
            )
            .map_err(|e| {
                constraint_as_validation(
                    e,
                    format!(
                        "client {} already has attempt {}",
                        attempt.client_id, attempt.attempt_number
                    ),
                )
            })?;
        Ok(attempt)
    }

    fn update_outreach_attempt(&self, id: &str, patch: &Patch) -> StoreResult<Option<OutreachAttempt>> {
        let Some(current) = self.get_outreach_attempt(id)? else {
            return Ok(None);
        };
        let updated = apply_patch(&current, patch)?;

        self.conn.execute(
            r#"
            UPDATE outreach_attempts SET
                attempt_type = ?2,
                status = ?3,
                scheduled_date = ?4,
                sent_date = ?5,
                email_subject = ?6,
                email_body = ?7,
                email_message_id = ?8,
                notes = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
            params![
                updated.id,
                updated.attempt_type.as_str(),
                updated.status.as_str(),
                updated.scheduled_date,
                updated.sent_date,
                updated.email_subject,
                updated.email_body,
                updated.email_message_id,
                updated.notes,
                updated.updated_at,
            ],
        )?;
        Ok(Some(updated))
    }

    fn delete_outreach_attempt(&self, id: &str) -> StoreResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM outreach_attempts WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    fn delete_outreach_for_client(&self, client_id: &str) -> StoreResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM outreach_attempts WHERE client_id = ?", [client_id])?)
    }
}

/// Intermediate row struct for database mapping.
struct AttemptRow {
    id: String,
    client_id: String,
    attempt_number: u32,
    attempt_type: String,
    status: String,
    scheduled_date: Option<String>,
    sent_date: Option<String>,
    email_subject: Option<String>,
    email_body: Option<String>,
    email_message_id: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl AttemptRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            client_id: row.get(1)?,
            attempt_number: row.get(2)?,
            attempt_type: row.get(3)?,
            status: row.get(4)?,
            scheduled_date: row.get(5)?,
            sent_date: row.get(6)?,
            email_subject: row.get(7)?,
            email_body: row.get(8)?,
            email_message_id: row.get(9)?,
            notes: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl TryFrom<AttemptRow> for OutreachAttempt {
    type Error = StoreError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(OutreachAttempt {
            id: row.id,
            client_id: row.client_id,
            attempt_number: row.attempt_number,
            attempt_type: parse_enum("outreach_attempts.attempt_type", &row.attempt_type)?,
            status: parse_enum("outreach_attempts.status", &row.status)?,
            scheduled_date: row.scheduled_date,
            sent_date: row.sent_date,
            email_subject: row.email_subject,
            email_body: row.email_body,
            email_message_id: row.email_message_id,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
