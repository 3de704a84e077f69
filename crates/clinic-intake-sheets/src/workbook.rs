//! Workbook trait and the bundled in-memory / JSON-file implementations.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single sheet row. Cells are plain strings; an empty string is an empty cell.
pub type Row = Vec<String>;

/// Workbook errors.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Sheet already exists: {0}")]
    SheetExists(String),

    #[error("Row {index} out of range in sheet {sheet}")]
    RowOutOfRange { sheet: String, index: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook file is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Workbook lock poisoned")]
    Poisoned,
}

pub type SheetResult<T> = Result<T, SheetError>;

/// Header plus data rows of one sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetData {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

impl SheetData {
    /// Position of a column in the header.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }
}

/// Row-level access to a spreadsheet.
///
/// Data row indices are zero-based and exclude the header row.
pub trait Workbook: Send + Sync {
    /// Names of all sheets, in workbook order.
    fn sheet_names(&self) -> SheetResult<Vec<String>>;

    /// Read a whole sheet. Fails with [`SheetError::SheetNotFound`] when absent.
    fn read_sheet(&self, sheet: &str) -> SheetResult<SheetData>;

    /// Create an empty sheet with the given header row.
    fn create_sheet(&self, sheet: &str, header: &[&str]) -> SheetResult<()>;

    /// Append rows after the last data row.
    fn append_rows(&self, sheet: &str, rows: Vec<Row>) -> SheetResult<()>;

    /// Overwrite one data row.
    fn update_row(&self, sheet: &str, index: usize, row: Row) -> SheetResult<()>;

    /// Delete data rows; later rows shift up.
    fn delete_rows(&self, sheet: &str, indices: &[usize]) -> SheetResult<()>;

    /// Check whether a sheet exists.
    fn has_sheet(&self, sheet: &str) -> SheetResult<bool> {
        Ok(self.sheet_names()?.iter().any(|name| name == sheet))
    }
}

/// Sheet storage shared by the bundled workbook implementations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct WorkbookData {
    sheets: BTreeMap<String, SheetData>,
}

impl WorkbookData {
    fn sheet(&self, name: &str) -> SheetResult<&SheetData> {
        self.sheets
            .get(name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))
    }

    fn sheet_mut(&mut self, name: &str) -> SheetResult<&mut SheetData> {
        self.sheets
            .get_mut(name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))
    }

    fn create(&mut self, name: &str, header: &[&str]) -> SheetResult<()> {
        if self.sheets.contains_key(name) {
            return Err(SheetError::SheetExists(name.to_string()));
        }
        self.sheets.insert(
            name.to_string(),
            SheetData {
                header: header.iter().map(|h| h.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn append(&mut self, name: &str, rows: Vec<Row>) -> SheetResult<()> {
        self.sheet_mut(name)?.rows.extend(rows);
        Ok(())
    }

    fn update(&mut self, name: &str, index: usize, row: Row) -> SheetResult<()> {
        let sheet = self.sheet_mut(name)?;
        match sheet.rows.get_mut(index) {
            Some(slot) => {
                *slot = row;
                Ok(())
            }
            None => Err(SheetError::RowOutOfRange {
                sheet: name.to_string(),
                index,
            }),
        }
    }

    fn delete(&mut self, name: &str, indices: &[usize]) -> SheetResult<()> {
        let sheet = self.sheet_mut(name)?;
        if let Some(&bad) = indices.iter().find(|&&i| i >= sheet.rows.len()) {
            return Err(SheetError::RowOutOfRange {
                sheet: name.to_string(),
                index: bad,
            });
        }

        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        // Remove from the bottom so earlier indices stay valid
        for index in sorted.into_iter().rev() {
            sheet.rows.remove(index);
        }
        Ok(())
    }
}

/// Workbook held entirely in memory (tests, ephemeral deployments).
#[derive(Debug, Default)]
pub struct MemoryWorkbook {
    data: Mutex<WorkbookData>,
}

impl MemoryWorkbook {
    /// Create an empty workbook.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SheetResult<MutexGuard<'_, WorkbookData>> {
        self.data.lock().map_err(|_| SheetError::Poisoned)
    }
}

impl Workbook for MemoryWorkbook {
    fn sheet_names(&self) -> SheetResult<Vec<String>> {
        Ok(self.lock()?.sheets.keys().cloned().collect())
    }

    fn read_sheet(&self, sheet: &str) -> SheetResult<SheetData> {
        Ok(self.lock()?.sheet(sheet)?.clone())
    }

    fn create_sheet(&self, sheet: &str, header: &[&str]) -> SheetResult<()> {
        self.lock()?.create(sheet, header)
    }

    fn append_rows(&self, sheet: &str, rows: Vec<Row>) -> SheetResult<()> {
        self.lock()?.append(sheet, rows)
    }

    fn update_row(&self, sheet: &str, index: usize, row: Row) -> SheetResult<()> {
        self.lock()?.update(sheet, index, row)
    }

    fn delete_rows(&self, sheet: &str, indices: &[usize]) -> SheetResult<()> {
        self.lock()?.delete(sheet, indices)
    }
}

/// Workbook persisted as a single JSON document on disk.
///
/// Every call reads the file, applies the change and rewrites it through a
/// sibling temp file, so an interrupted write never leaves a truncated workbook.
#[derive(Debug)]
pub struct FileWorkbook {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileWorkbook {
    /// Open (or lazily create) a workbook file.
    pub fn open<P: AsRef<Path>>(path: P) -> SheetResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            write_atomically(&path, &WorkbookData::default())?;
            log::info!("Created workbook file {}", path.display());
        }
        Ok(Self {
            path,
            guard: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> SheetResult<WorkbookData> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn read<T>(&self, f: impl FnOnce(&WorkbookData) -> SheetResult<T>) -> SheetResult<T> {
        let _guard = self.guard.lock().map_err(|_| SheetError::Poisoned)?;
        f(&self.load()?)
    }

    fn modify(&self, f: impl FnOnce(&mut WorkbookData) -> SheetResult<()>) -> SheetResult<()> {
        let _guard = self.guard.lock().map_err(|_| SheetError::Poisoned)?;
        let mut data = self.load()?;
        f(&mut data)?;
        write_atomically(&self.path, &data)
    }
}

fn write_atomically(path: &Path, data: &WorkbookData) -> SheetResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(data)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl Workbook for FileWorkbook {
    fn sheet_names(&self) -> SheetResult<Vec<String>> {
        self.read(|data| Ok(data.sheets.keys().cloned().collect()))
    }

    fn read_sheet(&self, sheet: &str) -> SheetResult<SheetData> {
        self.read(|data| data.sheet(sheet).cloned())
    }

    fn create_sheet(&self, sheet: &str, header: &[&str]) -> SheetResult<()> {
        self.modify(|data| data.create(sheet, header))
    }

    fn append_rows(&self, sheet: &str, rows: Vec<Row>) -> SheetResult<()> {
        self.modify(|data| data.append(sheet, rows))
    }

    fn update_row(&self, sheet: &str, index: usize, row: Row) -> SheetResult<()> {
        self.modify(|data| data.update(sheet, index, row))
    }

    fn delete_rows(&self, sheet: &str, indices: &[usize]) -> SheetResult<()> {
        self.modify(|data| data.delete(sheet, indices))
    }
}
