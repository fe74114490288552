//! Registry and batch sources: local CSV/JSON files or remote URLs.
//!
//! Google Sheets edit links are rewritten to their CSV export endpoint so a
//! shared sheet can be passed as-is. Everything else is fetched verbatim.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use regex::Regex;

use dupfinder_dedup::engine::{load_csv_dataset, load_json_dataset};
use dupfinder_dedup::model::Dataset;

use crate::exit_codes::{dedup_exit_code, EXIT_ERROR, EXIT_FETCH, EXIT_INPUT};
use crate::CliError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("dupfinder/", env!("CARGO_PKG_VERSION"));

const SHEETS_HOST: &str = "docs.google.com/spreadsheets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Url(String),
}

impl Source {
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_string())
        } else {
            Self::Path(PathBuf::from(raw))
        }
    }

    /// `.json` sources hold an array of objects; anything else is CSV.
    pub fn is_json(&self) -> bool {
        match self {
            Self::Path(path) => has_json_extension(path),
            Self::Url(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                path.to_ascii_lowercase().ends_with(".json")
            }
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Url(_) => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Rewrite a Google Sheets link to its CSV export URL. Other URLs, and sheet
/// links without a recognizable document id, are returned unchanged.
pub fn export_url(url: &str) -> Result<String, CliError> {
    if !url.contains(SHEETS_HOST) {
        return Ok(url.to_string());
    }

    let re = Regex::new(r"/d/([a-zA-Z0-9_-]+)")
        .map_err(|e| CliError { code: EXIT_ERROR, message: format!("invalid sheet id pattern: {e}"), hint: None })?;

    Ok(match re.captures(url).and_then(|c| c.get(1)) {
        Some(id) => format!("https://{SHEETS_HOST}/d/{}/export?format=csv", id.as_str()),
        None => url.to_string(),
    })
}

/// GET `url` and return the body as text. Non-2xx responses are errors.
pub fn fetch_text(url: &str, timeout: Duration) -> Result<String, CliError> {
    let fetch_err = |message: String| CliError { code: EXIT_FETCH, message, hint: None };

    let http = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("failed to build HTTP client: {e}"),
            hint: None,
        })?;

    debug!("GET {url}");
    let response = http
        .get(url)
        .send()
        .map_err(|e| fetch_err(format!("cannot fetch {url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let err = fetch_err(format!("cannot fetch {url}: HTTP {status}"));
        return Err(if status.as_u16() == 401 || status.as_u16() == 403 || status.as_u16() == 404 {
            err.with_hint("is the sheet shared as \"anyone with the link can view\"?")
        } else {
            err
        });
    }

    response
        .text()
        .map_err(|e| fetch_err(format!("cannot read response from {url}: {e}")))
}

/// Read a source into a dataset labelled `label` ("registry" / "batch").
pub fn load_dataset(label: &str, source: &Source, timeout: Duration) -> Result<Dataset, CliError> {
    let text = match source {
        Source::Path(path) => std::fs::read_to_string(path).map_err(|e| CliError {
            code: EXIT_INPUT,
            message: format!("cannot read {label} {}: {e}", path.display()),
            hint: None,
        })?,
        Source::Url(url) => fetch_text(&export_url(url)?, timeout)?,
    };

    let parsed = if source.is_json() {
        load_json_dataset(label, &text)
    } else {
        load_csv_dataset(label, &text)
    };
    let dataset = parsed.map_err(|e| CliError {
        code: dedup_exit_code(&e),
        message: e.to_string(),
        hint: None,
    })?;

    info!("{label}: {} record(s) from {source}", dataset.len());
    Ok(dataset)
}
