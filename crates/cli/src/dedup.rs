//! `dupfinder run` / `dupfinder validate`: daily linelist deduplication
//! against a yearly registry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use log::{info, warn};

use dupfinder_dedup::config::{ColumnSelection, DedupConfig};
use dupfinder_dedup::{DedupError, DedupResult};

use crate::exit_codes::{dedup_exit_code, EXIT_EXPORT, EXIT_INVALID_CONFIG};
use crate::export::{self, ExportFile};
use crate::source::{self, Source, DEFAULT_TIMEOUT_SECS};
use crate::CliError;

/// Column bindings. Each flag overrides the matching key of the config's
/// `[columns]` table.
#[derive(Args, Debug, Clone, Default)]
pub struct ColumnArgs {
    /// Column holding the patient name (Col1)
    #[arg(long, value_name = "COLUMN")]
    pub name: Option<String>,

    /// Column holding the mobile number (Col2)
    #[arg(long, value_name = "COLUMN")]
    pub mobile: Option<String>,

    /// Column holding the address (Col3)
    #[arg(long, value_name = "COLUMN")]
    pub address: Option<String>,

    /// Any other column to compare (Col4)
    #[arg(long, value_name = "COLUMN")]
    pub extra: Option<String>,
}

impl ColumnArgs {
    fn apply_to(self, columns: &mut ColumnSelection) {
        if let Some(name) = self.name {
            columns.name = Some(name);
        }
        if let Some(mobile) = self.mobile {
            columns.mobile = Some(mobile);
        }
        if let Some(address) = self.address {
            columns.address = Some(address);
        }
        if let Some(extra) = self.extra {
            columns.extra = Some(extra);
        }
    }
}

#[derive(Subcommand)]
pub enum DedupCommands {
    /// Match a daily batch against the yearly registry
    #[command(after_help = "\
Examples:
  dupfinder run --registry yearly.csv --batch daily.csv --name 'Patient Name' --mobile 'Mobile No'
  dupfinder run -r yearly.csv -b daily.csv --config dedup.toml --out-dir out/
  dupfinder run -r yearly.csv -b daily.csv --config dedup.toml --out-dir out/ --zip --date 07_03_2025
  dupfinder run -r 'https://docs.google.com/spreadsheets/d/<id>/edit' -b daily.csv --config dedup.toml --json
  dupfinder run -r yearly.csv -b daily.csv --config dedup.toml --apply")]
    Run {
        /// Yearly registry: CSV/JSON path or http(s) URL (Google Sheets links accepted)
        #[arg(long, short = 'r', env = "DUPFINDER_REGISTRY")]
        registry: String,

        /// Daily batch: CSV/JSON path or http(s) URL
        #[arg(long, short = 'b')]
        batch: String,

        /// TOML config with [columns], [weights], [fuzzy], [exact] tables
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        #[command(flatten)]
        columns: ColumnArgs,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the duplicate/linelist subsets and the match report here
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Bundle the exported files into one ZIP instead of loose files
        #[arg(long, requires = "out_dir")]
        zip: bool,

        /// Date stamp for exported file names (DD_MM_YYYY, default today)
        #[arg(long)]
        date: Option<String>,

        /// Remove perfect duplicates from the batch file (local CSV only)
        #[arg(long)]
        apply: bool,

        /// Timeout in seconds for remote sources
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,

        /// Suppress the human summary
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Validate config and column bindings without matching
    #[command(after_help = "\
Examples:
  dupfinder validate --config dedup.toml
  dupfinder validate --config dedup.toml --registry yearly.csv --batch daily.csv
  dupfinder validate --name 'Patient Name' --registry yearly.csv --batch daily.csv")]
    Validate {
        /// TOML config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        #[command(flatten)]
        columns: ColumnArgs,

        /// Registry to check the bindings against
        #[arg(long, short = 'r', requires = "batch")]
        registry: Option<String>,

        /// Batch to check the bindings against
        #[arg(long, short = 'b', requires = "registry")]
        batch: Option<String>,

        /// Timeout in seconds for remote sources
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },
}

pub fn cmd_dedup(cmd: DedupCommands) -> Result<(), CliError> {
    match cmd {
        DedupCommands::Run {
            registry,
            batch,
            config,
            columns,
            json,
            output,
            out_dir,
            zip,
            date,
            apply,
            timeout,
            quiet,
        } => cmd_run(RunOptions {
            registry,
            batch,
            config,
            columns,
            json,
            output,
            out_dir,
            zip,
            date,
            apply,
            timeout: Duration::from_secs(timeout),
            quiet,
        }),
        DedupCommands::Validate { config, columns, registry, batch, timeout } => {
            cmd_validate(config, columns, registry, batch, Duration::from_secs(timeout))
        }
    }
}

fn dedup_err(err: DedupError) -> CliError {
    let hint = match &err {
        DedupError::NoColumnsSelected => Some("pass --name/--mobile/--address/--extra or a [columns] table".to_string()),
        DedupError::MissingColumn { .. } => Some("column names are case-sensitive and must match the header row".to_string()),
        _ => None,
    };
    CliError { code: dedup_exit_code(&err), message: err.to_string(), hint }
}

/// Config file (if any) with column flags layered on top, validated.
fn resolve_config(path: Option<&Path>, columns: ColumnArgs) -> Result<DedupConfig, CliError> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| CliError {
                code: EXIT_INVALID_CONFIG,
                message: format!("cannot read config {}: {e}", path.display()),
                hint: None,
            })?;
            DedupConfig::parse(&text).map_err(dedup_err)?
        }
        None => DedupConfig::default(),
    };
    columns.apply_to(&mut config.columns);
    config.validate().map_err(dedup_err)?;
    Ok(config)
}

fn describe_columns(columns: &ColumnSelection) -> String {
    columns
        .selected()
        .map(|(slot, name)| format!("{slot}='{name}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

struct RunOptions {
    registry: String,
    batch: String,
    config: Option<PathBuf>,
    columns: ColumnArgs,
    json: bool,
    output: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    zip: bool,
    date: Option<String>,
    apply: bool,
    timeout: Duration,
    quiet: bool,
}

fn cmd_run(opts: RunOptions) -> Result<(), CliError> {
    let config = resolve_config(opts.config.as_deref(), opts.columns)?;
    let date = export::run_date(opts.date.as_deref())?;

    let registry_src = Source::parse(&opts.registry);
    let batch_src = Source::parse(&opts.batch);

    // Pruning rewrites the batch in place, which needs a local CSV.
    let prune_path = match (opts.apply, batch_src.local_path()) {
        (false, _) => None,
        (true, Some(path)) if !batch_src.is_json() => Some(path.to_path_buf()),
        (true, _) => {
            return Err(CliError::args(format!("--apply needs a local CSV batch, got {batch_src}"))
                .with_hint("download the batch as CSV, or drop --apply to preview"));
        }
    };

    info!("matching on {}", describe_columns(&config.columns));
    let registry = source::load_dataset("registry", &registry_src, opts.timeout)?;
    let batch = source::load_dataset("batch", &batch_src, opts.timeout)?;

    let result = dupfinder_dedup::run(&config, &registry, &batch).map_err(dedup_err)?;

    // Output
    if opts.json || opts.output.is_some() {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError { code: EXIT_EXPORT, message: format!("JSON serialization error: {e}"), hint: None })?;

        if let Some(ref path) = opts.output {
            std::fs::write(path, &json_str)
                .map_err(|e| CliError { code: EXIT_EXPORT, message: format!("cannot write output: {e}"), hint: None })?;
            eprintln!("wrote {}", path.display());
        }

        if opts.json {
            println!("{json_str}");
        }
    }

    if !opts.quiet {
        print_summary(&result);
    }

    if let Some(ref dir) = opts.out_dir {
        let files = export_files(&result, &batch, &config.columns, &date)?;
        if files.is_empty() {
            warn!("batch is empty; nothing to export");
        } else if opts.zip {
            let path = export::write_zip(dir, &date, &files)?;
            eprintln!("wrote {}", path.display());
        } else {
            for path in export::write_files(dir, &files)? {
                eprintln!("wrote {}", path.display());
            }
        }
    }

    let rows = export::deletion_rows(&result.partition.perfect_duplicates);
    if rows.is_empty() {
        return Ok(());
    }
    let row_list = rows.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ");

    match prune_path {
        Some(path) => {
            let removed = export::prune_batch_file(&path, &result.partition.perfect_duplicates)?;
            eprintln!("removed {removed} perfect duplicate(s) from {} (rows {row_list})", path.display());
        }
        None if !opts.quiet => {
            eprintln!("preview: would remove rows {row_list} from the batch (re-run with --apply)");
        }
        None => {}
    }

    Ok(())
}

fn print_summary(result: &DedupResult<'_>) {
    let s = &result.summary;
    eprintln!("{} PERFECT DUPLICATES | {} TO UPLOAD", s.perfect_duplicates, s.to_upload);
    if !s.category_counts.is_empty() {
        let counts = s
            .category_counts
            .iter()
            .map(|(category, n)| format!("{category} {n}"))
            .collect::<Vec<_>>()
            .join(", ");
        eprintln!("matches: {counts}; {} with no registry match", s.unmatched);
    }
}

/// Subsets and report in write order; empty ones are left out.
fn export_files(
    result: &DedupResult<'_>,
    batch: &dupfinder_dedup::Dataset,
    columns: &ColumnSelection,
    date: &str,
) -> Result<Vec<ExportFile>, CliError> {
    let bodies = [
        (
            export::possible_duplicate_name(date),
            export::subset_csv(batch, &result.partition.perfect_duplicates)?,
        ),
        (
            export::daily_linelist_name(date),
            export::subset_csv(batch, &result.partition.new_records)?,
        ),
        (
            export::match_report_name(date),
            export::match_report_csv(&result.matches, batch, columns)?,
        ),
    ];

    Ok(bodies
        .into_iter()
        .filter_map(|(name, bytes)| bytes.map(|bytes| ExportFile { name, bytes }))
        .collect())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_validate(
    config_path: Option<PathBuf>,
    columns: ColumnArgs,
    registry: Option<String>,
    batch: Option<String>,
    timeout: Duration,
) -> Result<(), CliError> {
    let config = resolve_config(config_path.as_deref(), columns)?;
    eprintln!(
        "config ok: {} column(s) selected ({})",
        config.columns.selected_count(),
        describe_columns(&config.columns)
    );

    if let (Some(registry), Some(batch)) = (registry, batch) {
        let registry = source::load_dataset("registry", &Source::parse(&registry), timeout)?;
        let batch = source::load_dataset("batch", &Source::parse(&batch), timeout)?;
        config
            .columns
            .validate_against(&registry, &batch)
            .map_err(dedup_err)?;
        eprintln!(
            "columns present in registry ({} rows) and batch ({} rows)",
            registry.len(),
            batch.len()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dedup.toml");
        std::fs::write(&path, "[columns]\nname = \"Name\"\nmobile = \"Phone\"\n\n[fuzzy]\nhigh = 90.0\n").unwrap();

        let flags = ColumnArgs { mobile: Some("Mobile No".into()), ..Default::default() };
        let config = resolve_config(Some(&path), flags).unwrap();

        assert_eq!(config.columns.name.as_deref(), Some("Name"));
        assert_eq!(config.columns.mobile.as_deref(), Some("Mobile No"));
        assert!(config.columns.address.is_none());
        assert_eq!(config.fuzzy.high, 90.0);
    }

    #[test]
    fn flags_alone_are_enough() {
        let flags = ColumnArgs { address: Some("Address".into()), ..Default::default() };
        let config = resolve_config(None, flags).unwrap();
        assert_eq!(config.columns.selected_count(), 1);
    }

    #[test]
    fn no_columns_is_config_error() {
        let err = resolve_config(None, ColumnArgs::default()).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_CONFIG);
        assert!(err.hint.is_some());
    }

    #[test]
    fn unreadable_config_is_config_error() {
        let err = resolve_config(Some(Path::new("/nonexistent/dedup.toml")), ColumnArgs::default()).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_CONFIG);
        assert!(err.message.starts_with("cannot read config"));
    }

    #[test]
    fn describe_lists_selected_slots() {
        let columns = ColumnSelection {
            name: Some("Patient Name".into()),
            extra: Some("Ward".into()),
            ..Default::default()
        };
        assert_eq!(describe_columns(&columns), "name='Patient Name', extra='Ward'");
    }
}
