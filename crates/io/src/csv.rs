//! CSV ingestion: one file per source, mapped onto the declared schema.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use canonize_core::{RawRecord, DECLARED_FIELDS};
use canonize_engine::config::{RunConfig, SourceConfig};

use crate::error::IoError;

/// Load every configured source relative to `base_dir`, in source-name
/// order.
pub fn load_sources(config: &RunConfig, base_dir: &Path) -> Result<Vec<RawRecord>, IoError> {
    let mut records = Vec::new();
    for (name, source) in &config.sources {
        let path = base_dir.join(&source.file);
        let data = std::fs::read_to_string(&path)
            .map_err(|e| IoError::Io(format!("{}: {e}", path.display())))?;
        let mut loaded = load_source_records(name, &data, source)?;
        log::info!("loaded {} record(s) from source '{name}'", loaded.len());
        records.append(&mut loaded);
    }
    Ok(records)
}

/// Parse one source's CSV into raw records, applying its column mapping.
///
/// Only the record-id column is required. A declared field whose column is
/// absent from the header just stays null; unmapped extra columns are kept
/// in `extensions`. Empty cells become null rather than empty strings.
pub fn load_source_records(
    source_name: &str,
    csv_data: &str,
    source: &SourceConfig,
) -> Result<Vec<RawRecord>, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IoError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let col = &source.columns;

    let find = |name: &str| headers.iter().position(|h| h == name);

    let record_id_idx = find(&col.record_id).ok_or_else(|| IoError::MissingColumn {
        source: source_name.into(),
        column: col.record_id.clone(),
    })?;

    let field_indices: Vec<(&str, Option<usize>)> = DECLARED_FIELDS
        .iter()
        .map(|(field, _)| (*field, find(col.column_for(field))))
        .collect();

    let quality_idx = col.quality_score.as_deref().and_then(find);
    let observed_idx = col.observed_at.as_deref().and_then(find);
    let group_key_idx = col.group_key.as_deref().and_then(find);

    let mapped: Vec<usize> = field_indices
        .iter()
        .filter_map(|(_, idx)| *idx)
        .chain([record_id_idx])
        .chain(quality_idx)
        .chain(observed_idx)
        .chain(group_key_idx)
        .collect();

    let mut records = Vec::new();

    for row in reader.records() {
        let row = row.map_err(|e| IoError::Io(e.to_string()))?;

        let record_id = row
            .get(record_id_idx)
            .unwrap_or("")
            .trim()
            .to_string();
        if record_id.is_empty() {
            return Err(IoError::BadValue {
                source: source_name.into(),
                record_id: "<blank>".into(),
                column: col.record_id.clone(),
                value: String::new(),
            });
        }

        let cell = |idx: Option<usize>| -> Option<String> {
            let value = row.get(idx?)?.trim();
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        };

        let quality_score = match cell(quality_idx) {
            Some(raw) => raw.parse::<f64>().map_err(|_| IoError::BadValue {
                source: source_name.into(),
                record_id: record_id.clone(),
                column: col.quality_score.clone().unwrap_or_default(),
                value: raw.clone(),
            })?,
            None => 1.0,
        };

        let observed_at = match cell(observed_idx) {
            Some(raw) => parse_timestamp(&raw).ok_or_else(|| IoError::BadValue {
                source: source_name.into(),
                record_id: record_id.clone(),
                column: col.observed_at.clone().unwrap_or_default(),
                value: raw.clone(),
            })?,
            // Records with no observation timestamp sort behind everything.
            None => DateTime::<Utc>::UNIX_EPOCH,
        };

        let mut record = RawRecord {
            source_dataset: source_name.to_string(),
            source_record_id: record_id,
            organization_name: None,
            email: None,
            phone: None,
            website: None,
            province: None,
            address: None,
            status: None,
            extensions: BTreeMap::new(),
            source_priority: source.priority,
            quality_score,
            observed_at,
            group_key: cell(group_key_idx),
        };

        for (field, idx) in &field_indices {
            record.set_field(field, cell(*idx));
        }

        // Unmapped columns ride along for downstream inspection.
        for (i, header) in headers.iter().enumerate() {
            if mapped.contains(&i) {
                continue;
            }
            if let Some(value) = cell(Some(i)) {
                record.extensions.insert(header.clone(), value);
            }
        }

        records.push(record);
    }

    Ok(records)
}

/// RFC 3339 first, then bare dates at UTC midnight.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use canonize_engine::config::ColumnMapping;

    fn source(columns: ColumnMapping) -> SourceConfig {
        SourceConfig {
            file: "test.csv".into(),
            priority: Some(2),
            columns,
        }
    }

    #[test]
    fn load_with_default_columns() {
        let csv = "\
record_id,organization_name,email,notes
r1,Aero School,info@aero.example,vip
r2,Zebra Mining,,
";
        let records =
            load_source_records("crm", csv, &source(ColumnMapping::default())).unwrap();
        assert_eq!(records.len(), 2);

        let r1 = &records[0];
        assert_eq!(r1.qualified_id(), "crm:r1");
        assert_eq!(r1.organization_name.as_deref(), Some("Aero School"));
        assert_eq!(r1.email.as_deref(), Some("info@aero.example"));
        assert_eq!(r1.source_priority, Some(2));
        assert_eq!(r1.extensions.get("notes").map(String::as_str), Some("vip"));

        // Empty cells are null, not empty strings.
        assert_eq!(records[1].email, None);
        assert!(records[1].extensions.is_empty());
    }

    #[test]
    fn load_with_remapped_columns() {
        let csv = "\
id,org,score,seen
77,Aero School,0.8,2026-03-01
";
        let columns = ColumnMapping {
            record_id: "id".into(),
            organization_name: Some("org".into()),
            quality_score: Some("score".into()),
            observed_at: Some("seen".into()),
            ..ColumnMapping::default()
        };
        let records = load_source_records("signups", csv, &source(columns)).unwrap();
        assert_eq!(records[0].source_record_id, "77");
        assert_eq!(records[0].organization_name.as_deref(), Some("Aero School"));
        assert_eq!(records[0].quality_score, 0.8);
        assert_eq!(
            records[0].observed_at,
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn missing_record_id_column_is_an_error() {
        let csv = "name\nAero School\n";
        let err =
            load_source_records("crm", csv, &source(ColumnMapping::default())).unwrap_err();
        match err {
            IoError::MissingColumn { source, column } => {
                assert_eq!(source, "crm");
                assert_eq!(column, "record_id");
            }
            other => panic!("expected missing column, got {other}"),
        }
    }

    #[test]
    fn absent_declared_field_column_stays_null() {
        let csv = "record_id\nr1\n";
        let records =
            load_source_records("crm", csv, &source(ColumnMapping::default())).unwrap();
        assert_eq!(records[0].organization_name, None);
        assert_eq!(records[0].quality_score, 1.0);
    }

    #[test]
    fn unparseable_quality_score_names_the_record() {
        let csv = "record_id,score\nr9,very good\n";
        let columns = ColumnMapping {
            quality_score: Some("score".into()),
            ..ColumnMapping::default()
        };
        let err = load_source_records("crm", csv, &source(columns)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("crm"));
        assert!(msg.contains("r9"));
        assert!(msg.contains("very good"));
    }

    #[test]
    fn blank_record_id_is_an_error() {
        let csv = "record_id,organization_name\n,Aero School\n";
        let err =
            load_source_records("crm", csv, &source(ColumnMapping::default())).unwrap_err();
        assert!(matches!(err, IoError::BadValue { .. }));
    }

    #[test]
    fn rfc3339_timestamps_parse() {
        assert_eq!(
            parse_timestamp("2026-03-01T08:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 6, 30, 0).unwrap())
        );
        assert_eq!(parse_timestamp("last week"), None);
    }
}
