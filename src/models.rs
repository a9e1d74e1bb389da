//! Core data models for ComicRack to YACReader reconciliation.
//!
//! This module contains the source/target record types, the field mapping
//! table with its update policies, and the per-run statistics.

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;

// ============================================================================
// Source Models
// ============================================================================

/// One `Book` element from the ComicRack library document.
#[derive(Clone, Debug, Default)]
pub struct SourceRecord {
    pub file: String,
    /// `file` after path normalization, computed once at load time.
    pub file_norm: String,
    fields: FxHashMap<String, String>,
}

impl SourceRecord {
    pub fn new(file: impl Into<String>) -> Self {
        let file = file.into();
        Self {
            file_norm: crate::normalize::normalize_path(&file),
            file,
            fields: FxHashMap::default(),
        }
    }

    /// Builder-style setter, mostly useful in tests.
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.set_field(name, value);
        self
    }

    /// The first occurrence of a field wins; later repeats are ignored.
    pub fn set_field(&mut self, name: &str, value: &str) {
        self.fields
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }

    /// An empty value counts as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

// ============================================================================
// Target Models
// ============================================================================

/// Identity/path pair from the `comic` table. `path` is `None` when the
/// column is NULL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetRecord {
    pub comic_info_id: i64,
    pub path: Option<String>,
}

impl TargetRecord {
    /// The path as logged: NULL columns print as `NULL`.
    pub fn display_path(&self) -> &str {
        self.path.as_deref().unwrap_or("NULL")
    }
}

/// A typed SQLite value, either persisted in `comic_info` or staged for it.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    /// Null, empty string and zero all count as "no value yet".
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Integer(i) => *i == 0,
            FieldValue::Real(r) => *r == 0.0,
            FieldValue::Text(s) => s.is_empty(),
        }
    }

    /// Compare by text rendering, since column affinity may store "5" as 5.
    pub fn same_as(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Null, _) | (_, FieldValue::Null) => false,
            _ => self.to_string() == other.to_string(),
        }
    }

    /// Literal form used when rendering a statement for diagnostics.
    pub fn to_sql_literal(&self) -> String {
        match self {
            FieldValue::Null => "NULL".to_string(),
            FieldValue::Text(s) => format!("'{}'", s),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Real(r) => write!(f, "{}", r),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<ValueRef<'_>> for FieldValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => FieldValue::Null,
            ValueRef::Integer(i) => FieldValue::Integer(i),
            ValueRef::Real(r) => FieldValue::Real(r),
            ValueRef::Text(t) => FieldValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => FieldValue::Text(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            FieldValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            FieldValue::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// Current `comic_info` values for one record, keyed by column.
#[derive(Clone, Debug, Default)]
pub struct CurrentValues {
    values: FxHashMap<String, FieldValue>,
}

impl CurrentValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: FieldValue) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: FieldValue) {
        self.values.insert(column.to_string(), value);
    }

    /// Missing columns read as `Null`.
    pub fn get(&self, column: &str) -> &FieldValue {
        self.values.get(column).unwrap_or(&FieldValue::Null)
    }
}

// ============================================================================
// Field Mapping
// ============================================================================

/// Column holding the reader's page position; exempt from overwrite-all.
pub const PAGE_POSITION_COLUMN: &str = "CurrentPage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Overwrite whenever the source has a value.
    Always,
    /// Only fill a null/empty/zero target value.
    IfEmpty,
    /// Fill an empty target value or replace a differing one.
    IfChanged,
}

/// Where a mapping's candidate value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceField {
    /// A `Book` child element, read verbatim.
    Text(&'static str),
    /// `Year`/`Month`/`Day` composed into one date string.
    Date,
    /// Read flag derived from `LastPageRead`/`PageCount`.
    ReadStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: SourceField,
    pub column: &'static str,
    pub policy: UpdatePolicy,
}

impl FieldMapping {
    pub const fn new(source: SourceField, column: &'static str, policy: UpdatePolicy) -> Self {
        Self { source, column, policy }
    }
}

/// ComicRack field -> YACReader `comic_info` column, in staging order.
pub const DEFAULT_FIELD_MAPPINGS: &[FieldMapping] = &[
    FieldMapping::new(SourceField::Text("Title"), "Title", UpdatePolicy::IfChanged),
    FieldMapping::new(SourceField::Text("Series"), "Series", UpdatePolicy::IfChanged),
    FieldMapping::new(SourceField::Text("Volume"), "Volume", UpdatePolicy::IfChanged),
    FieldMapping::new(SourceField::Text("Number"), "Number", UpdatePolicy::IfChanged),
    FieldMapping::new(SourceField::Text("Writer"), "Writer", UpdatePolicy::IfChanged),
    FieldMapping::new(SourceField::Text("Penciller"), "Penciller", UpdatePolicy::IfChanged),
    FieldMapping::new(SourceField::Text("Inker"), "Inker", UpdatePolicy::IfChanged),
    FieldMapping::new(SourceField::Text("Publisher"), "Publisher", UpdatePolicy::IfChanged),
    FieldMapping::new(SourceField::Text("Imprint"), "Imprint", UpdatePolicy::IfChanged),
    FieldMapping::new(SourceField::Text("CurrentPage"), PAGE_POSITION_COLUMN, UpdatePolicy::IfEmpty),
    // Only a fully read comic gets its flag written
    FieldMapping::new(SourceField::ReadStatus, "Read", UpdatePolicy::IfEmpty),
    FieldMapping::new(SourceField::Date, "Date", UpdatePolicy::IfChanged),
];

/// A (column, value) pair selected for write-back.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedField {
    pub column: &'static str,
    pub value: FieldValue,
}

// ============================================================================
// Run Models
// ============================================================================

/// Result of writing one record back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Updated,
    Unchanged,
    /// The UPDATE matched no `comic_info` row.
    NoRow,
    Failed(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub updated: usize,
    pub unchanged: usize,
    pub missing: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    Loaded,
    Running,
    Completed,
    Cancelled,
    Aborted,
}

/// Terminal state plus counters, as handed back to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub state: RunState,
    pub stats: RunStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::Text(String::new()).is_empty());
        assert!(FieldValue::Integer(0).is_empty());
        assert!(FieldValue::Real(0.0).is_empty());
        assert!(!FieldValue::Text("0".into()).is_empty());
        assert!(!FieldValue::Integer(42).is_empty());
    }

    #[test]
    fn test_same_as_crosses_affinity() {
        assert!(FieldValue::Text("5".into()).same_as(&FieldValue::Integer(5)));
        assert!(!FieldValue::Text("5".into()).same_as(&FieldValue::Text("6".into())));
        assert!(!FieldValue::Null.same_as(&FieldValue::Text(String::new())));
    }

    #[test]
    fn test_sql_literals() {
        assert_eq!(FieldValue::Text("Batman".into()).to_sql_literal(), "'Batman'");
        assert_eq!(FieldValue::Null.to_sql_literal(), "NULL");
        assert_eq!(FieldValue::Integer(7).to_sql_literal(), "7");
    }

    #[test]
    fn test_source_record_ignores_empty_fields() {
        let record = SourceRecord::new("C:/Comics/a.cbz")
            .with_field("Series", "")
            .with_field("Title", "Hush");
        assert_eq!(record.field("Series"), None);
        assert_eq!(record.field("Title"), Some("Hush"));
        assert_eq!(record.file_norm, "c:/comics/a.cbz");
    }

    #[test]
    fn test_source_record_first_field_wins() {
        let record = SourceRecord::new("C:/Comics/a.cbz")
            .with_field("Series", "Batman")
            .with_field("Series", "Detective Comics");
        assert_eq!(record.field("Series"), Some("Batman"));

        // An empty first occurrence still shadows a later value
        let record = SourceRecord::new("C:/Comics/a.cbz")
            .with_field("Series", "")
            .with_field("Series", "Detective Comics");
        assert_eq!(record.field("Series"), None);
    }

    #[test]
    fn test_page_position_is_never_always() {
        let page = DEFAULT_FIELD_MAPPINGS
            .iter()
            .find(|m| m.column == PAGE_POSITION_COLUMN)
            .unwrap();
        assert_eq!(page.policy, UpdatePolicy::IfEmpty);
    }
}
