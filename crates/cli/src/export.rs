//! Output files: batch subsets, the match report, the ZIP bundle, and the
//! pruned batch written by `--apply`.
//!
//! File names carry the run date (`%d_%m_%Y`) so a day's outputs sort
//! together:
//! - `<date>_possibleDuplicate.csv`   perfect-duplicate batch rows
//! - `<date>_DailyLinelist.csv`       new/partial batch rows
//! - `<date>_MatchReport.csv`         one row per batch record with a match
//! - `<date>_DeduplicationResults.zip` all of the above, deflated

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::info;

use dupfinder_dedup::config::ColumnSelection;
use dupfinder_dedup::model::{Column, Dataset, MatchDetail, RecordMatch};

use crate::exit_codes::{EXIT_EXPORT, EXIT_INPUT};
use crate::CliError;

pub const DATE_FORMAT: &str = "%d_%m_%Y";

const TICK: &str = "✅";
const CROSS: &str = "❌";

fn export_err(msg: impl Into<String>) -> CliError {
    CliError { code: EXIT_EXPORT, message: msg.into(), hint: None }
}

/// Date stamp for output names: `--date` if given (validated), else today.
pub fn run_date(date: Option<&str>) -> Result<String, CliError> {
    match date {
        Some(s) => {
            NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| {
                CliError::args(format!("invalid --date '{s}'")).with_hint("use DD_MM_YYYY, e.g. 07_03_2025")
            })?;
            Ok(s.to_string())
        }
        None => Ok(chrono::Local::now().format(DATE_FORMAT).to_string()),
    }
}

pub fn possible_duplicate_name(date: &str) -> String {
    format!("{date}_possibleDuplicate.csv")
}

pub fn daily_linelist_name(date: &str) -> String {
    format!("{date}_DailyLinelist.csv")
}

pub fn match_report_name(date: &str) -> String {
    format!("{date}_MatchReport.csv")
}

pub fn bundle_name(date: &str) -> String {
    format!("{date}_DeduplicationResults.zip")
}

/// An output file held in memory until it is written loose or zipped.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// CSV bodies
// ---------------------------------------------------------------------------

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, CliError> {
    writer
        .into_inner()
        .map_err(|e| export_err(format!("CSV write error: {e}")))
}

/// Batch rows at `indices`, with the batch header and column order.
/// `None` when there are no rows, so no empty file is produced.
pub fn subset_csv(batch: &Dataset, indices: &[usize]) -> Result<Option<Vec<u8>>, CliError> {
    if indices.is_empty() {
        return Ok(None);
    }

    let mut wtr = csv::Writer::from_writer(Vec::new());
    let write_err = |e: csv::Error| export_err(format!("CSV write error: {e}"));

    wtr.write_record(&batch.columns).map_err(write_err)?;
    for &idx in indices {
        let Some(record) = batch.get(idx) else { continue };
        wtr.write_record(batch.columns.iter().map(|c| record.get(c).to_string()))
            .map_err(write_err)?;
    }

    finish_csv(wtr).map(Some)
}

fn indicator(column: Column, detail: &MatchDetail) -> String {
    let tick = |hit: bool| (if hit { TICK } else { CROSS }).to_string();
    let pct = |p: f64| format!("{}%", p as u32);

    match detail {
        MatchDetail::Exact { mobile, address, extra, .. } => match column {
            // Exact stage is only reached on equal names.
            Column::Name => TICK.to_string(),
            Column::Mobile => tick(*mobile),
            Column::Address => tick(*address),
            Column::Extra => tick(*extra),
        },
        MatchDetail::Fuzzy { name_pct, mobile, address_pct, extra_pct } => match column {
            Column::Name => pct(*name_pct),
            Column::Mobile => tick(*mobile),
            Column::Address => pct(*address_pct),
            Column::Extra => pct(*extra_pct),
        },
    }
}

/// Side-by-side comparison of each matched batch record with its best
/// registry match. Columns that were not selected are left out.
pub fn match_report_csv(
    matches: &[RecordMatch<'_>],
    batch: &Dataset,
    cols: &ColumnSelection,
) -> Result<Option<Vec<u8>>, CliError> {
    if matches.is_empty() {
        return Ok(None);
    }

    let selected: Vec<(Column, &str)> = cols.selected().collect();
    let write_err = |e: csv::Error| export_err(format!("CSV write error: {e}"));

    let mut header: Vec<String> = ["Daily_Rec", "Status", "Match_Type", "Score"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for (column, _) in &selected {
        header.push(format!("Daily_Col{}", column.ordinal()));
        header.push(format!("Yearly_Col{}", column.ordinal()));
    }
    for (column, _) in &selected {
        header.push(format!("Col{}", column.ordinal()));
    }

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&header).map_err(write_err)?;

    for m in matches {
        let Some(daily) = batch.get(m.batch_index) else { continue };
        let mut row = vec![
            (m.batch_index + 1).to_string(),
            m.status.to_string(),
            m.best.category.to_string(),
            m.best.score.to_string(),
        ];
        for (_, name) in &selected {
            row.push(daily.get(name).to_string());
            row.push(m.best.registry_record.get(name).to_string());
        }
        for (column, _) in &selected {
            row.push(indicator(*column, &m.best.detail));
        }
        wtr.write_record(&row).map_err(write_err)?;
    }

    finish_csv(wtr).map(Some)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write each file into `dir`. Returns the written paths.
pub fn write_files(dir: &Path, files: &[ExportFile]) -> Result<Vec<PathBuf>, CliError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| export_err(format!("cannot create {}: {e}", dir.display())))?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(&file.name);
        std::fs::write(&path, &file.bytes)
            .map_err(|e| export_err(format!("cannot write {}: {e}", path.display())))?;
        info!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Deflate all files into one archive at `dir/<date>_DeduplicationResults.zip`.
pub fn write_zip(dir: &Path, date: &str, files: &[ExportFile]) -> Result<PathBuf, CliError> {
    use zip::write::SimpleFileOptions;

    std::fs::create_dir_all(dir)
        .map_err(|e| export_err(format!("cannot create {}: {e}", dir.display())))?;

    let path = dir.join(bundle_name(date));
    let zip_err = |e: zip::result::ZipError| export_err(format!("cannot write {}: {e}", path.display()));

    let file = std::fs::File::create(&path)
        .map_err(|e| export_err(format!("cannot create {}: {e}", path.display())))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in files {
        zip.start_file(entry.name.as_str(), options).map_err(zip_err)?;
        zip.write_all(&entry.bytes)
            .map_err(|e| export_err(format!("cannot write {}: {e}", path.display())))?;
    }
    zip.finish().map_err(zip_err)?;

    info!("wrote {} ({} file(s))", path.display(), files.len());
    Ok(path)
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Sheet row numbers of the perfect duplicates, bottom first. Row 1 is the
/// header, so batch index `i` sits on row `i + 2`.
pub fn deletion_rows(perfect_duplicates: &[usize]) -> Vec<usize> {
    let mut rows: Vec<usize> = perfect_duplicates.iter().map(|i| i + 2).collect();
    rows.sort_unstable_by(|a, b| b.cmp(a));
    rows
}

/// Rewrite the batch CSV at `path` without the rows at `perfect_duplicates`.
/// Cells are copied as read; the file is replaced via a temp file + rename.
/// Returns the number of rows removed.
pub fn prune_batch_file(path: &Path, perfect_duplicates: &[usize]) -> Result<usize, CliError> {
    let skip: BTreeSet<usize> = perfect_duplicates.iter().copied().collect();
    let read_err = |e: csv::Error| CliError {
        code: EXIT_INPUT,
        message: format!("cannot read {}: {e}", path.display()),
        hint: None,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(read_err)?;

    let tmp_path = path.with_extension("csv.tmp");
    let tmp_err = |e: String| export_err(format!("cannot write {}: {e}", tmp_path.display()));

    let mut removed = 0;
    {
        let mut wtr = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&tmp_path)
            .map_err(|e| tmp_err(e.to_string()))?;

        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(read_err)?;
            // line 0 is the header
            if line > 0 && skip.contains(&(line - 1)) {
                removed += 1;
                continue;
            }
            wtr.write_record(&row).map_err(|e| tmp_err(e.to_string()))?;
        }
        wtr.flush().map_err(|e| tmp_err(e.to_string()))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| export_err(format!("failed to rename tmp to {}: {e}", path.display())))?;

    info!("removed {removed} row(s) from {}", path.display());
    Ok(removed)
}
