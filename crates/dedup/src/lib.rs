//! `dupfinder-dedup`: record-linkage engine for daily patient linelists.
//!
//! Pure engine crate: receives pre-loaded registry and batch datasets,
//! returns the best registry match per batch record and the split into
//! perfect duplicates vs. records to upload. No CLI, network or file IO.

pub mod blocking;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod similarity;
pub mod summary;

pub use config::{ColumnSelection, DedupConfig};
pub use engine::{load_csv_dataset, load_json_dataset, run};
pub use error::DedupError;
pub use model::{CellValue, Dataset, DedupResult, MatchCategory, MatchResult, Record, RecordMatch};
pub use normalize::normalize;
