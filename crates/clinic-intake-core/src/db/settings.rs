//! Settings database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::Database;
use crate::models::Setting;
use crate::store::{SettingsStore, StoreResult};

fn read_setting(row: &Row<'_>) -> rusqlite::Result<Setting> {
    Ok(Setting {
        key: row.get(0)?,
        value: row.get(1)?,
        updated_at: row.get(2)?,
        updated_by: row.get(3)?,
    })
}

impl SettingsStore for Database {
    fn list_settings(&self) -> StoreResult<Vec<Setting>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value, updated_at, updated_by FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], read_setting)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn get_setting(&self, key: &str) -> StoreResult<Option<Setting>> {
        self.conn
            .query_row(
                "SELECT key, value, updated_at, updated_by FROM settings WHERE key = ?",
                [key],
                read_setting,
            )
            .optional()
            .map_err(Into::into)
    }

    fn set_setting(&self, key: &str, value: &str, updated_by: Option<String>) -> StoreResult<Setting> {
        let setting = Setting::new(key, value, updated_by);
        self.conn.execute(
            r#"
            INSERT INTO settings (key, value, updated_at, updated_by)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by
            "#,
            params![setting.key, setting.value, setting.updated_at, setting.updated_by],
        )?;
        Ok(setting)
    }

    fn delete_setting(&self, key: &str) -> StoreResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }
}
