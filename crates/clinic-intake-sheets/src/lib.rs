//! Spreadsheet workbook abstraction for the clinic intake sheets backend.
//!
//! A workbook is a set of named sheets. Every sheet starts with a header row
//! naming its columns; the remaining rows hold one record each, every cell a
//! plain string. The hosted-spreadsheet transport is not part of this crate:
//! anything that can read and rewrite rows implements [`Workbook`].

pub mod workbook;
pub mod record;

pub use record::*;
pub use workbook::*;
