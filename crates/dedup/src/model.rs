use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::ColumnSelection;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single cell as delivered by ingestion. Sources disagree on types
/// (a phone number may arrive as text or as a number), so every variant
/// must be coercible to text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Text rendering of the cell, or `None` for missing values.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) if n.is_nan() => None,
            Self::Number(n) => Some(number_text(*n)),
            Self::Text(s) => Some(s.clone()),
        }
    }
}

/// Integral numbers render without a fractional part so that a phone number
/// read as `5551234567.0` compares equal to the text `5551234567`.
fn number_text(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}

static NULL_CELL: CellValue = CellValue::Null;

/// One row of a dataset, read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, CellValue>,
}

impl Record {
    pub fn new(fields: HashMap<String, CellValue>) -> Self {
        Self { fields }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CellValue>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Field by column name. Absent fields read as `Null`.
    pub fn get(&self, column: &str) -> &CellValue {
        self.fields.get(column).unwrap_or(&NULL_CELL)
    }

    pub fn fields(&self) -> &HashMap<String, CellValue> {
        &self.fields
    }
}

/// Ordered rows sharing one column schema. Row position is the record's
/// identity within the dataset.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub label: String,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(label: impl Into<String>, columns: Vec<String>, records: Vec<Record>) -> Self {
        Self {
            label: label.into(),
            columns,
            records,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }
}

/// The four comparison slots a user can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Name,
    Mobile,
    Address,
    Extra,
}

impl Column {
    pub const ALL: [Column; 4] = [Column::Name, Column::Mobile, Column::Address, Column::Extra];

    /// Position in report tables (Col1..Col4).
    pub fn ordinal(&self) -> usize {
        match self {
            Self::Name => 1,
            Self::Mobile => 2,
            Self::Address => 3,
            Self::Extra => 4,
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Mobile => write!(f, "mobile"),
            Self::Address => write!(f, "address"),
            Self::Extra => write!(f, "extra"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pair matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchCategory {
    // exact stage
    Perfect,
    Strong,
    Partial,
    Weak,
    // fuzzy stage
    High,
    Medium,
    Low,
}

impl MatchCategory {
    pub fn kind(&self) -> MatchKind {
        match self {
            Self::Perfect | Self::Strong | Self::Partial | Self::Weak => MatchKind::Exact,
            Self::High | Self::Medium | Self::Low => MatchKind::Fuzzy,
        }
    }
}

impl std::fmt::Display for MatchCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Perfect => write!(f, "PERFECT"),
            Self::Strong => write!(f, "STRONG"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::Weak => write!(f, "WEAK"),
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// Per-column evidence behind a match.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchDetail {
    /// Name was equal; flags record which other selected columns were too.
    /// Unselected columns always read `false`.
    Exact {
        mobile: bool,
        address: bool,
        extra: bool,
        matched_columns: usize,
        selected_columns: usize,
    },
    /// Similarity percentages (0-100). Unselected columns read 0.
    Fuzzy {
        name_pct: f64,
        mobile: bool,
        address_pct: f64,
        extra_pct: f64,
    },
}

/// Relationship between one batch record and one registry record.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult<'a> {
    pub category: MatchCategory,
    pub score: u8,
    pub detail: MatchDetail,
    pub registry_index: usize,
    #[serde(skip)]
    pub registry_record: &'a Record,
}

impl MatchResult<'_> {
    pub fn kind(&self) -> MatchKind {
        match self.detail {
            MatchDetail::Exact { .. } => MatchKind::Exact,
            MatchDetail::Fuzzy { .. } => MatchKind::Fuzzy,
        }
    }

    pub fn is_perfect(&self) -> bool {
        self.category == MatchCategory::Perfect
    }
}

// ---------------------------------------------------------------------------
// Run output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    PerfectDuplicate,
    NewOrPartial,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerfectDuplicate => write!(f, "PERFECT DUPLICATE"),
            Self::NewOrPartial => write!(f, "NEW/PARTIAL"),
        }
    }
}

/// Best match found for one batch record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordMatch<'a> {
    pub batch_index: usize,
    pub status: RecordStatus,
    pub best: MatchResult<'a>,
}

/// Batch indices split into rows to skip and rows to upload. Both sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub perfect_duplicates: Vec<usize>,
    pub new_records: Vec<usize>,
}

impl Partition {
    pub fn is_perfect_duplicate(&self, batch_index: usize) -> bool {
        self.perfect_duplicates.binary_search(&batch_index).is_ok()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupSummary {
    pub registry_records: usize,
    pub batch_records: usize,
    pub perfect_duplicates: usize,
    pub to_upload: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub category_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupMeta {
    pub engine_version: String,
    pub run_at: String,
    pub columns: ColumnSelection,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupResult<'a> {
    pub meta: DedupMeta,
    pub summary: DedupSummary,
    pub partition: Partition,
    pub matches: Vec<RecordMatch<'a>>,
}
