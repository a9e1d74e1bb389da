//! Derived fields: values computed from several ComicRack elements.

use crate::models::{FieldValue, SourceRecord};
use tracing::warn;

/// Read flag as stored in YACReader's `Read` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Unread = 0,
    Read = 1,
}

impl From<ReadStatus> for FieldValue {
    fn from(status: ReadStatus) -> Self {
        FieldValue::Integer(status as i64)
    }
}

/// Build a date string from `Year`, `Month` and `Day`.
///
/// Returns "YYYY", "MM-YYYY" or "DD-MM-YYYY" depending on which parts exist.
/// A finer part is only used when every coarser part is present.
pub fn compose_date(record: &SourceRecord) -> Option<String> {
    let year = record.field("Year")?;
    let Some(month) = record.field("Month") else {
        return Some(year.to_string());
    };
    match record.field("Day") {
        Some(day) => Some(format!("{}-{}-{}", day, month, year)),
        None => Some(format!("{}-{}", month, year)),
    }
}

/// Derive the read flag from `LastPageRead` and `PageCount`.
///
/// `None` means skip: the field is neither written nor defaulted. A comic
/// counts as read once at most one page remains.
pub fn derive_read_status(record: &SourceRecord) -> Option<ReadStatus> {
    let last_page_read = parse_count(record, "LastPageRead")?;
    let page_count = parse_count(record, "PageCount")?;

    if page_count - last_page_read < 2 {
        Some(ReadStatus::Read)
    } else {
        Some(ReadStatus::Unread)
    }
}

fn parse_count(record: &SourceRecord, name: &str) -> Option<i64> {
    let raw = record.field(name)?;
    match raw.trim().parse::<i64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring non-numeric {} '{}' for {}", name, raw, record.file);
            None
        }
    }
}
