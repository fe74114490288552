//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Table
//!
//! | Code | Domain     | Description                                     |
//! |------|------------|-------------------------------------------------|
//! | 0    | Universal  | Success                                         |
//! | 1    | Universal  | General error (unspecified)                     |
//! | 2    | Universal  | CLI usage error (bad args, bad flag combination) |
//! | 3    | config     | Invalid config or column selection              |
//! | 4    | input      | Registry/batch could not be read or parsed      |
//! | 5    | export     | Report, subset, bundle or pruned batch not written |
//! | 6    | fetch      | Remote source could not be fetched              |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use dupfinder_dedup::DedupError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
/// Perfect duplicates in the batch are a normal outcome, not a failure.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Dedup (3-6)
// =============================================================================

/// Config file unreadable or invalid, no column bound, or a bound column
/// missing from the registry or batch.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Registry or batch source could not be read or parsed.
pub const EXIT_INPUT: u8 = 4;

/// An output file could not be written.
pub const EXIT_EXPORT: u8 = 5;

/// Remote source fetch failed (network error, timeout, non-2xx status).
pub const EXIT_FETCH: u8 = 6;

/// Map an engine error to its exit code.
pub fn dedup_exit_code(err: &DedupError) -> u8 {
    match err {
        DedupError::ConfigParse(_)
        | DedupError::ConfigValidation(_)
        | DedupError::NoColumnsSelected
        | DedupError::MissingColumn { .. } => EXIT_INVALID_CONFIG,
        DedupError::DataParse { .. } => EXIT_INPUT,
    }
}
