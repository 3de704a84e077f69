//! Spreadsheet backend.
//!
//! One sheet per entity with a header row of camelCase field names. A sheet
//! that does not exist yet reads as empty and is created with its header on
//! the first write. Rows whose cells are all blank are ignored.

mod schema;
mod stores;

pub use schema::*;

use clinic_intake_sheets::{Row, SheetData, SheetError, SheetSchema, Workbook};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::models::Entity;
use crate::store::{apply_patch, Backend, Patch, StoreError, StoreResult};

/// Store backed by a [`Workbook`].
pub struct SheetsBackend<W: Workbook> {
    workbook: W,
}

impl<W: Workbook> SheetsBackend<W> {
    pub fn new(workbook: W) -> Self {
        Self { workbook }
    }

    /// Underlying workbook.
    pub fn workbook(&self) -> &W {
        &self.workbook
    }

    /// Read a sheet; None if it has not been created.
    fn load(&self, schema: &SheetSchema) -> StoreResult<Option<SheetData>> {
        match self.workbook.read_sheet(schema.name) {
            Ok(data) => Ok(Some(data)),
            Err(SheetError::SheetNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Decode every non-blank row.
    fn records<T: DeserializeOwned>(&self, schema: &SheetSchema) -> StoreResult<Vec<T>> {
        let Some(data) = self.load(schema)? else {
            return Ok(Vec::new());
        };
        data.rows
            .iter()
            .filter(|row| !is_blank(row))
            .map(|row| decode(schema, &data.header, row))
            .collect()
    }

    /// Find the first row whose `column` equals `key`.
    fn find<T: DeserializeOwned>(&self, schema: &SheetSchema, column: &str, key: &str) -> StoreResult<Option<T>> {
        let Some(data) = self.load(schema)? else {
            return Ok(None);
        };
        match position(&data, column, key) {
            Some(index) => Ok(Some(decode(schema, &data.header, &data.rows[index])?)),
            None => Ok(None),
        }
    }

    /// Header of the sheet, creating the sheet if needed.
    fn ensure_sheet(&self, schema: &SheetSchema) -> StoreResult<Vec<String>> {
        if let Some(data) = self.load(schema)? {
            return Ok(data.header);
        }
        let header = schema.header();
        self.workbook.create_sheet(schema.name, &header)?;
        log::info!("Created sheet {}", schema.name);
        Ok(header.into_iter().map(String::from).collect())
    }

    fn append<T: Serialize>(&self, schema: &SheetSchema, record: &T) -> StoreResult<()> {
        let header = self.ensure_sheet(schema)?;
        let row = schema.encode(&header, &serde_json::to_value(record)?, None)?;
        self.workbook.append_rows(schema.name, vec![row])?;
        Ok(())
    }

    /// Overwrite the row whose `column` equals `key`. Returns false if absent.
    fn replace<T: Serialize>(&self, schema: &SheetSchema, column: &str, key: &str, record: &T) -> StoreResult<bool> {
        let Some(data) = self.load(schema)? else {
            return Ok(false);
        };
        let Some(index) = position(&data, column, key) else {
            return Ok(false);
        };
        let row = schema.encode(&data.header, &serde_json::to_value(record)?, data.rows.get(index))?;
        self.workbook.update_row(schema.name, index, row)?;
        Ok(true)
    }

    /// Delete every row whose `column` satisfies `matches`.
    fn remove_where(&self, schema: &SheetSchema, column: &str, matches: impl Fn(&str) -> bool) -> StoreResult<usize> {
        let Some(data) = self.load(schema)? else {
            return Ok(0);
        };
        let Some(col) = data.column(column) else {
            return Ok(0);
        };
        let indices: Vec<usize> = data
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.get(col).is_some_and(|cell| matches(cell)))
            .map(|(i, _)| i)
            .collect();
        if !indices.is_empty() {
            self.workbook.delete_rows(schema.name, &indices)?;
        }
        Ok(indices.len())
    }

    fn remove(&self, schema: &SheetSchema, column: &str, key: &str) -> StoreResult<bool> {
        Ok(self.remove_where(schema, column, |cell| cell == key)? > 0)
    }

    /// Partial merge of one entity.
    fn patch_entity<T: Entity>(
        &self,
        schema: &SheetSchema,
        id: &str,
        patch: &Patch,
        normalize: impl FnOnce(&mut T),
    ) -> StoreResult<Option<T>> {
        let Some(current) = self.find::<T>(schema, "id", id)? else {
            return Ok(None);
        };
        let mut updated = apply_patch(&current, patch)?;
        normalize(&mut updated);
        self.replace(schema, "id", id, &updated)?;
        Ok(Some(updated))
    }
}

impl<W: Workbook> Backend for SheetsBackend<W> {
    fn backend_name(&self) -> &'static str {
        "sheets"
    }
}

fn is_blank(row: &Row) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

fn position(data: &SheetData, column: &str, key: &str) -> Option<usize> {
    let col = data.column(column)?;
    data.rows
        .iter()
        .position(|row| row.get(col).map(String::as_str) == Some(key))
}

/// Decode a row into an entity. Empty cells read as absent fields.
fn decode<T: DeserializeOwned>(schema: &SheetSchema, header: &[String], row: &Row) -> StoreResult<T> {
    let mut value = schema.decode(header, row)?;
    if let Value::Object(object) = &mut value {
        object.retain(|_, v| !v.is_null());
    }
    serde_json::from_value(value).map_err(|e| StoreError::Corrupt(format!("{} row: {}", schema.name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewClient;
    use crate::store::ClientStore;
    use clinic_intake_sheets::MemoryWorkbook;

    fn backend() -> SheetsBackend<MemoryWorkbook> {
        SheetsBackend::new(MemoryWorkbook::new())
    }

    #[test]
    fn test_missing_sheet_reads_empty() {
        let backend = backend();
        assert!(backend.list_clients().unwrap().is_empty());
        assert!(backend.get_client("anything").unwrap().is_none());
        assert!(!backend.workbook().has_sheet("Clients").unwrap());
    }

    #[test]
    fn test_first_write_creates_sheet_with_header() {
        let backend = backend();
        backend.create_client(NewClient::default()).unwrap();

        let data = backend.workbook().read_sheet("Clients").unwrap();
        assert_eq!(data.header[0], "id");
        assert_eq!(data.header.len(), CLIENTS.columns.len());
        assert_eq!(data.rows.len(), 1);
    }

    #[test]
    fn test_blank_rows_ignored() {
        let backend = backend();
        let created = backend.create_client(NewClient::default()).unwrap();
        backend
            .workbook()
            .append_rows("Clients", vec![vec![String::new(), " ".into()]])
            .unwrap();

        let clients = backend.list_clients().unwrap();
        assert_eq!(clients, vec![created]);
    }

    #[test]
    fn test_hand_added_column_survives_update() {
        let workbook = MemoryWorkbook::new();
        let mut header = CLIENTS.header();
        header.push("Staff notes");
        workbook.create_sheet("Clients", &header).unwrap();
        let backend = SheetsBackend::new(workbook);

        let mut client = backend.create_client(NewClient::default()).unwrap();
        let last = header.len() - 1;
        let mut row = backend.workbook().read_sheet("Clients").unwrap().rows[0].clone();
        row[last] = "call after 5pm".into();
        backend.workbook().update_row("Clients", 0, row).unwrap();

        client.phone = Some("555-0100".into());
        assert!(backend.save_client(&client).unwrap());

        let data = backend.workbook().read_sheet("Clients").unwrap();
        assert_eq!(data.rows[0][last], "call after 5pm");
        assert_eq!(backend.get_client(&client.id).unwrap(), Some(client));
    }

    #[test]
    fn test_corrupt_row_reported() {
        let backend = backend();
        backend.create_client(NewClient::default()).unwrap();
        let data = backend.workbook().read_sheet("Clients").unwrap();
        let status = data.column("status").unwrap();
        let mut row = data.rows[0].clone();
        row[status] = "sleeping".into();
        backend.workbook().update_row("Clients", 0, row).unwrap();

        assert!(matches!(
            backend.list_clients(),
            Err(StoreError::Corrupt(_))
        ));
    }
}
