//! Cell canonicalization.
//!
//! Every comparison in the crate goes through [`normalize`]: lowercase,
//! trimmed text, with every "no data" spelling collapsed to `""`.

use crate::model::CellValue;

/// Tokens that sources use to mean "missing". Compared after lowercasing.
const PLACEHOLDERS: &[&str] = &["nan", "na", "none", "null", "0", ""];

/// Canonical comparable form of a cell. Total: never fails.
pub fn normalize(value: &CellValue) -> String {
    match value.to_text() {
        Some(text) => normalize_str(&text),
        None => String::new(),
    }
}

/// [`normalize`] for text that is already a string.
pub fn normalize_str(text: &str) -> String {
    let s = text.to_lowercase();
    let s = s.trim();
    if PLACEHOLDERS.contains(&s) {
        return String::new();
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn placeholders_collapse_to_empty() {
        for raw in ["NA", "nan", "NULL", "None", "0", "", "   ", " na "] {
            assert_eq!(normalize_str(raw), "", "{raw:?}");
        }
        assert_eq!(normalize(&CellValue::Null), "");
        assert_eq!(normalize(&CellValue::Number(0.0)), "");
        assert_eq!(normalize(&CellValue::Number(f64::NAN)), "");
    }

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(normalize_str("  John SMITH "), "john smith");
        assert_eq!(normalize(&CellValue::Number(9876543210.0)), "9876543210");
        assert_eq!(normalize(&CellValue::Bool(true)), "true");
    }

    #[test]
    fn placeholder_words_inside_text_survive() {
        assert_eq!(normalize_str("Nana"), "nana");
        assert_eq!(normalize_str("10"), "10");
    }

    proptest! {
        #[test]
        fn idempotent(raw in "[ a-zA-Z0-9.]{0,16}") {
            let once = normalize_str(&raw);
            prop_assert_eq!(normalize_str(&once), once);
        }
    }
}
