//! Field merge policy: decides, per mapped column, whether a ComicRack value
//! is written over the value currently stored in YACReader.
//!
//! Decision order for each mapping:
//! 1. No candidate value (or an empty one) -> never staged
//! 2. overwrite-all (except the page-position column) or `Always` -> staged
//! 3. `IfEmpty`/`IfChanged` with an empty current value -> staged
//! 4. `IfChanged` with a different current value -> staged

use crate::derive::{compose_date, derive_read_status};
use crate::models::{
    CurrentValues, FieldMapping, FieldValue, SourceField, SourceRecord, StagedField, UpdatePolicy,
    PAGE_POSITION_COLUMN,
};
use tracing::debug;

/// Candidate value for one mapping, before any policy is applied.
pub fn candidate_value(mapping: &FieldMapping, source: &SourceRecord) -> Option<FieldValue> {
    match mapping.source {
        SourceField::Text(name) => source.field(name).map(|v| FieldValue::Text(v.to_string())),
        SourceField::Date => {
            let date = compose_date(source);
            debug!("Date constructed: {:?}", date);
            date.map(FieldValue::Text)
        }
        SourceField::ReadStatus => {
            let status = derive_read_status(source)?;
            debug!(
                "Read status: {}/{}, value = {:?}",
                source.field("LastPageRead").unwrap_or_default(),
                source.field("PageCount").unwrap_or_default(),
                status
            );
            Some(status.into())
        }
    }
}

/// Stage the columns that should be written for one matched record.
///
/// Pure: `current` is the record's persisted `comic_info` row.
pub fn stage_fields(
    mappings: &[FieldMapping],
    current: &CurrentValues,
    source: &SourceRecord,
    overwrite_all: bool,
) -> Vec<StagedField> {
    let mut staged = Vec::new();

    for mapping in mappings {
        // Unread (0) counts as no value: the flag is only ever set, never cleared
        let Some(candidate) = candidate_value(mapping, source).filter(|v| !v.is_empty()) else {
            continue;
        };

        let forced = overwrite_all && mapping.column != PAGE_POSITION_COLUMN;
        if forced || mapping.policy == UpdatePolicy::Always {
            debug!("Overwriting {} with {}", mapping.column, candidate.to_sql_literal());
            staged.push(StagedField { column: mapping.column, value: candidate });
            continue;
        }

        let existing = current.get(mapping.column);
        debug!("Current value in DB: {} = {}", mapping.column, existing.to_sql_literal());

        let fill = existing.is_empty();
        let replace = mapping.policy == UpdatePolicy::IfChanged && !existing.same_as(&candidate);
        if fill {
            debug!("Current value is empty, staging {} = {}", mapping.column, candidate.to_sql_literal());
        } else if replace {
            debug!(
                "Current value {} changed, staging {} = {}",
                existing.to_sql_literal(),
                mapping.column,
                candidate.to_sql_literal()
            );
        } else {
            continue;
        }
        staged.push(StagedField { column: mapping.column, value: candidate });
    }

    staged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_FIELD_MAPPINGS;

    const SERIES_IF_EMPTY: &[FieldMapping] =
        &[FieldMapping::new(SourceField::Text("Series"), "Series", UpdatePolicy::IfEmpty)];
    const SERIES_IF_CHANGED: &[FieldMapping] =
        &[FieldMapping::new(SourceField::Text("Series"), "Series", UpdatePolicy::IfChanged)];
    const SERIES_ALWAYS: &[FieldMapping] =
        &[FieldMapping::new(SourceField::Text("Series"), "Series", UpdatePolicy::Always)];

    fn batman() -> SourceRecord {
        SourceRecord::new("C:/Comics/Batman 001.cbz").with_field("Series", "Batman")
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn columns(staged: &[StagedField]) -> Vec<&'static str> {
        staged.iter().map(|s| s.column).collect()
    }

    #[test]
    fn test_always_ignores_current_value() {
        for current in [FieldValue::Null, text("Batman"), text("Detective")] {
            let row = CurrentValues::new().with("Series", current);
            let staged = stage_fields(SERIES_ALWAYS, &row, &batman(), false);
            assert_eq!(staged, vec![StagedField { column: "Series", value: text("Batman") }]);
        }
    }

    #[test]
    fn test_if_empty_only_fills() {
        for current in [FieldValue::Null, text(""), FieldValue::Integer(0)] {
            let row = CurrentValues::new().with("Series", current);
            assert_eq!(stage_fields(SERIES_IF_EMPTY, &row, &batman(), false).len(), 1);
        }
        let row = CurrentValues::new().with("Series", text("Detective Comics"));
        assert!(stage_fields(SERIES_IF_EMPTY, &row, &batman(), false).is_empty());
    }

    #[test]
    fn test_if_changed() {
        let empty = CurrentValues::new();
        assert_eq!(columns(&stage_fields(SERIES_IF_CHANGED, &empty, &batman(), false)), vec!["Series"]);

        let same = CurrentValues::new().with("Series", text("Batman"));
        assert!(stage_fields(SERIES_IF_CHANGED, &same, &batman(), false).is_empty());

        let differs = CurrentValues::new().with("Series", text("Batman Vol. 2"));
        assert_eq!(columns(&stage_fields(SERIES_IF_CHANGED, &differs, &batman(), false)), vec!["Series"]);
    }

    #[test]
    fn test_if_changed_compares_across_affinity() {
        let mapping = &[FieldMapping::new(SourceField::Text("Volume"), "Volume", UpdatePolicy::IfChanged)];
        let source = batman().with_field("Volume", "2");
        let row = CurrentValues::new().with("Volume", FieldValue::Integer(2));
        assert!(stage_fields(mapping, &row, &source, false).is_empty());
    }

    #[test]
    fn test_absent_candidate_never_staged() {
        let source = SourceRecord::new("C:/Comics/Batman 001.cbz");
        let row = CurrentValues::new();
        assert!(stage_fields(SERIES_ALWAYS, &row, &source, true).is_empty());
        assert!(stage_fields(DEFAULT_FIELD_MAPPINGS, &row, &source, true).is_empty());
    }

    #[test]
    fn test_overwrite_all_forces_everything_but_page_position() {
        let source = batman()
            .with_field("Title", "The Bat-Man")
            .with_field("CurrentPage", "3")
            .with_field("LastPageRead", "20")
            .with_field("PageCount", "20")
            .with_field("Year", "1940");
        let row = CurrentValues::new()
            .with("Title", text("Curated title"))
            .with("Series", text("Batman"))
            .with("CurrentPage", FieldValue::Integer(42))
            .with("Read", FieldValue::Integer(1))
            .with("Date", text("1940"));

        let staged = stage_fields(DEFAULT_FIELD_MAPPINGS, &row, &source, true);
        assert_eq!(columns(&staged), vec!["Title", "Series", "Read", "Date"]);

        let kept = stage_fields(DEFAULT_FIELD_MAPPINGS, &row, &source, false);
        assert_eq!(columns(&kept), vec!["Title"]);
    }

    #[test]
    fn test_page_position_fills_when_empty() {
        let source = batman().with_field("CurrentPage", "7");
        let row = CurrentValues::new()
            .with("Series", text("Batman"))
            .with("CurrentPage", FieldValue::Integer(0));
        let staged = stage_fields(DEFAULT_FIELD_MAPPINGS, &row, &source, true);
        assert!(staged.contains(&StagedField { column: "CurrentPage", value: text("7") }));
    }

    #[test]
    fn test_derived_fields() {
        let source = SourceRecord::new("/c/x.cbz")
            .with_field("Year", "2001")
            .with_field("Month", "05")
            .with_field("Day", "09")
            .with_field("LastPageRead", "18")
            .with_field("PageCount", "20");
        let staged = stage_fields(DEFAULT_FIELD_MAPPINGS, &CurrentValues::new(), &source, false);
        assert_eq!(
            staged,
            vec![
                StagedField { column: "Read", value: FieldValue::Integer(1) },
                StagedField { column: "Date", value: text("09-05-2001") },
            ]
        );
    }

    #[test]
    fn test_unread_status_is_not_written() {
        let source = SourceRecord::new("/c/x.cbz")
            .with_field("LastPageRead", "3")
            .with_field("PageCount", "20");
        let row = CurrentValues::new().with("Read", FieldValue::Integer(1));
        assert!(stage_fields(DEFAULT_FIELD_MAPPINGS, &row, &source, true).is_empty());
    }
}
