//! Evaluation criteria database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_enum, Database};
use crate::models::{EvaluationCriteria, NewCriteria};
use crate::store::{apply_patch, CriteriaStore, Patch, StoreError, StoreResult};

const COLUMNS: &str = "id, name, description, field, operator, value, action, priority, \
                       is_active, created_by, created_at, updated_at";

impl Database {
    fn insert_criteria(&self, criteria: &EvaluationCriteria) -> StoreResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO evaluation_criteria ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                COLUMNS
            ),
            params![
                criteria.id,
                criteria.name,
                criteria.description,
                criteria.field,
                criteria.operator.as_str(),
                criteria.value,
                criteria.action.as_str(),
                criteria.priority,
                criteria.is_active,
                criteria.created_by,
                criteria.created_at,
                criteria.updated_at,
            ],
        )?;
        Ok(())
    }
}

impl CriteriaStore for Database {
    fn list_criteria(&self) -> StoreResult<Vec<EvaluationCriteria>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM evaluation_criteria ORDER BY priority, rowid",
            COLUMNS
        ))?;
        let rows = stmt.query_map([], CriteriaRow::read)?;

        let mut criteria = Vec::new();
        for row in rows {
            criteria.push(row?.try_into()?);
        }
        Ok(criteria)
    }

    fn get_criteria(&self, id: &str) -> StoreResult<Option<EvaluationCriteria>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM evaluation_criteria WHERE id = ?", COLUMNS),
                [id],
                CriteriaRow::read,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn create_criteria(&self, input: NewCriteria, created_by: Option<String>) -> StoreResult<EvaluationCriteria> {
        let criteria = EvaluationCriteria::new(input, created_by);
        self.insert_criteria(&criteria)?;
        Ok(criteria)
    }

    fn update_criteria(&self, id: &str, patch: &Patch) -> StoreResult<Option<EvaluationCriteria>> {
        let Some(current) = self.get_criteria(id)? else {
            return Ok(None);
        };
        let updated = apply_patch(&current, patch)?;

        self.conn.execute(
            r#"
            UPDATE evaluation_criteria SET
                name = ?2,
                description = ?3,
                field = ?4,
                operator = ?5,
                value = ?6,
                action = ?7,
                priority = ?8,
                is_active = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
            params![
                updated.id,
                updated.name,
                updated.description,
                updated.field,
                updated.operator.as_str(),
                updated.value,
                updated.action.as_str(),
                updated.priority,
                updated.is_active,
                updated.updated_at,
            ],
        )?;
        Ok(Some(updated))
    }

    fn delete_criteria(&self, id: &str) -> StoreResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM evaluation_criteria WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct CriteriaRow {
    id: String,
    name: String,
    description: Option<String>,
    field: String,
    operator: String,
    value: String,
    action: String,
    priority: i32,
    is_active: bool,
    created_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl CriteriaRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            field: row.get(3)?,
            operator: row.get(4)?,
            value: row.get(5)?,
            action: row.get(6)?,
            priority: row.get(7)?,
            is_active: row.get(8)?,
            created_by: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl TryFrom<CriteriaRow> for EvaluationCriteria {
    type Error = StoreError;

    fn try_from(row: CriteriaRow) -> Result<Self, Self::Error> {
        Ok(EvaluationCriteria {
            id: row.id,
            name: row.name,
            description: row.description,
            field: row.field,
            operator: parse_enum("evaluation_criteria.operator", &row.operator)?,
            value: row.value,
            action: parse_enum("evaluation_criteria.action", &row.action)?,
            priority: row.priority,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
