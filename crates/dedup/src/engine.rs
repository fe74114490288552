use std::borrow::Cow;

use log::{debug, info, warn};

use crate::blocking::{build_mobile_index, build_name_index, mobile_key, name_key, BlockingIndex};
use crate::config::{ColumnSelection, DedupConfig};
use crate::error::DedupError;
use crate::matcher::find_best_match;
use crate::model::{
    CellValue, Dataset, DedupMeta, DedupResult, Partition, Record, RecordMatch, RecordStatus,
};
use crate::summary::compute_summary;

/// Match every batch record against the registry and split the batch into
/// perfect duplicates and records to upload.
///
/// Validation happens before any index is built: an empty selection or a
/// column missing from either dataset is an error, never a silent no-match.
pub fn run<'a>(
    config: &DedupConfig,
    registry: &'a Dataset,
    batch: &Dataset,
) -> Result<DedupResult<'a>, DedupError> {
    config.validate()?;
    config.columns.validate_against(registry, batch)?;

    if registry.is_empty() {
        warn!("{} is empty; every {} record will be treated as new", registry.label, batch.label);
    }

    let cols = &config.columns;
    let mobile_index = build_mobile_index(registry, cols.mobile.as_deref());
    let name_index = build_name_index(registry, cols.name.as_deref());
    info!(
        "blocking indices built: mobile {} bucket(s) / {} record(s), name {} bucket(s) / {} record(s)",
        mobile_index.bucket_count(),
        mobile_index.indexed_records(),
        name_index.bucket_count(),
        name_index.indexed_records(),
    );

    let mut matches: Vec<RecordMatch<'a>> = Vec::new();
    let mut partition = Partition::default();

    for (batch_index, daily) in batch.records.iter().enumerate() {
        let candidates = candidate_indices(daily, registry.len(), cols, &mobile_index, &name_index);
        debug!("batch row {batch_index}: {} candidate(s)", candidates.len());

        let best = find_best_match(
            daily,
            candidates.iter().map(|&i| (i, &registry.records[i])),
            config,
        );

        match best {
            Some(best) => {
                let status = if best.is_perfect() {
                    partition.perfect_duplicates.push(batch_index);
                    RecordStatus::PerfectDuplicate
                } else {
                    partition.new_records.push(batch_index);
                    RecordStatus::NewOrPartial
                };
                matches.push(RecordMatch {
                    batch_index,
                    status,
                    best,
                });
            }
            None => partition.new_records.push(batch_index),
        }
    }

    let summary = compute_summary(registry.len(), batch.len(), &matches, &partition);
    info!(
        "{} perfect duplicate(s), {} record(s) to upload",
        summary.perfect_duplicates, summary.to_upload
    );

    Ok(DedupResult {
        meta: DedupMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            columns: cols.clone(),
        },
        summary,
        partition,
        matches,
    })
}

/// Candidate cascade: mobile bucket, else name bucket, else (only when
/// neither identity column is bound) the whole registry.
fn candidate_indices<'i>(
    daily: &Record,
    registry_len: usize,
    cols: &ColumnSelection,
    mobile_index: &'i BlockingIndex,
    name_index: &'i BlockingIndex,
) -> Cow<'i, [usize]> {
    if let Some(key) = cols.mobile.as_deref().and_then(|c| mobile_key(daily.get(c))) {
        let found = mobile_index.candidates(&key);
        if !found.is_empty() {
            return Cow::Borrowed(found);
        }
    }

    if let Some(key) = cols.name.as_deref().and_then(|c| name_key(daily.get(c))) {
        let found = name_index.candidates(&key);
        if !found.is_empty() {
            return Cow::Borrowed(found);
        }
    }

    if cols.mobile.is_none() && cols.name.is_none() {
        return Cow::Owned((0..registry_len).collect());
    }

    Cow::Borrowed(&[])
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Parse CSV text (header row required) into a dataset. Blank cells become
/// `Null`; everything else is kept as text.
pub fn load_csv_dataset(label: &str, csv_data: &str) -> Result<Dataset, DedupError> {
    let data_err = |e: csv::Error| DedupError::DataParse {
        dataset: label.into(),
        message: e.to_string(),
    };

    let csv_data = csv_data.strip_prefix('\u{feff}').unwrap_or(csv_data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(data_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(data_err)?;
        let record = Record::from_pairs(columns.iter().enumerate().map(|(i, column)| {
            let cell = match row.get(i) {
                Some(raw) if !raw.trim().is_empty() => CellValue::Text(raw.to_string()),
                _ => CellValue::Null,
            };
            (column.clone(), cell)
        }));
        records.push(record);
    }

    debug!("{label}: loaded {} row(s), {} column(s)", records.len(), columns.len());
    Ok(Dataset::new(label, columns, records))
}

/// Parse a JSON array of flat objects into a dataset. Columns are the union
/// of keys in first-seen order; cells keep their JSON types.
pub fn load_json_dataset(label: &str, json_data: &str) -> Result<Dataset, DedupError> {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(json_data)
        .map_err(|e| DedupError::DataParse {
            dataset: label.into(),
            message: e.to_string(),
        })?;

    let mut columns: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
        records.push(Record::from_pairs(
            row.into_iter().map(|(k, v)| (k, cell_from_json(v))),
        ));
    }

    debug!("{label}: loaded {} row(s), {} column(s)", records.len(), columns.len());
    Ok(Dataset::new(label, columns, records))
}

fn cell_from_json(value: serde_json::Value) -> CellValue {
    use serde_json::Value;
    match value {
        Value::Null => CellValue::Null,
        Value::Bool(b) => CellValue::Bool(b),
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Null),
        Value::String(s) => CellValue::Text(s),
        other => CellValue::Text(other.to_string()),
    }
}
