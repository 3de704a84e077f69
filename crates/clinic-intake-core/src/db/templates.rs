//! Email template database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_as_validation, parse_enum, Database};
use crate::models::{EmailTemplate, NewEmailTemplate, TemplateType};
use crate::store::{apply_patch, Patch, StoreError, StoreResult, TemplateStore};

const COLUMNS: &str = "id, type, name, subject, body, is_active, updated_by, created_at, updated_at";

impl Database {
    fn query_template(&self, filter: &str, arg: &str) -> StoreResult<Option<EmailTemplate>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM email_templates WHERE {} = ?", COLUMNS, filter),
                [arg],
                TemplateRow::read,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }
}

impl TemplateStore for Database {
    fn list_templates(&self) -> StoreResult<Vec<EmailTemplate>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM email_templates ORDER BY rowid", COLUMNS))?;
        let rows = stmt.query_map([], TemplateRow::read)?;

        let mut templates = Vec::new();
        for row in rows {
            templates.push(row?.try_into()?);
        }
        Ok(templates)
    }

    fn get_template(&self, id: &str) -> StoreResult<Option<EmailTemplate>> {
        self.query_template("id", id)
    }

    fn get_template_by_type(&self, template_type: TemplateType) -> StoreResult<Option<EmailTemplate>> {
        self.query_template("type", template_type.as_str())
    }

    fn create_template(&self, input: NewEmailTemplate, updated_by: Option<String>) -> StoreResult<EmailTemplate> {
        let template = EmailTemplate::new(input, updated_by);

        self.conn
            .execute(
                &format!(
                    "INSERT INTO email_templates ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    COLUMNS
                ),
                params![
                    template.id,
                    template.template_type.as_str(),
                    template.name,
                    template.subject,
                    template.body,
                    template.is_active,
                    template.updated_by,
                    template.created_at,
                    template.updated_at,
                ],
            )
            .map_err(|e| {
                constraint_as_validation(
                    e,
                    format!("a {} template already exists", template.template_type.as_str()),
                )
            })?;
        Ok(template)
    }

    fn update_template(&self, id: &str, patch: &Patch) -> StoreResult<Option<EmailTemplate>> {
        let Some(current) = self.get_template(id)? else {
            return Ok(None);
        };
        let updated = apply_patch(&current, patch)?;

        self.conn.execute(
            r#"
            UPDATE email_templates SET
                name = ?2,
                subject = ?3,
                body = ?4,
                is_active = ?5,
                updated_by = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                updated.id,
                updated.name,
                updated.subject,
                updated.body,
                updated.is_active,
                updated.updated_by,
                updated.updated_at,
            ],
        )?;
        Ok(Some(updated))
    }

    fn delete_template(&self, id: &str) -> StoreResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM email_templates WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct TemplateRow {
    id: String,
    template_type: String,
    name: String,
    subject: String,
    body: String,
    is_active: bool,
    updated_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TemplateRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            template_type: row.get(1)?,
            name: row.get(2)?,
            subject: row.get(3)?,
            body: row.get(4)?,
            is_active: row.get(5)?,
            updated_by: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl TryFrom<TemplateRow> for EmailTemplate {
    type Error = StoreError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(EmailTemplate {
            id: row.id,
            template_type: parse_enum("email_templates.type", &row.template_type)?,
            name: row.name,
            subject: row.subject,
            body: row.body,
            is_active: row.is_active,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
