//! Blocking indices over the registry.
//!
//! Records are bucketed by a cheap key so each batch record is compared only
//! against its bucket. A record whose key field is blank or garbage gets no
//! bucket at all; it is unreachable through that index.

use std::collections::HashMap;

use crate::model::{CellValue, Dataset};
use crate::normalize::normalize;

/// Trailing characters of a normalized mobile number used as its block key.
pub const MOBILE_KEY_LEN: usize = 4;

/// Block key → registry row indices, in registry order.
#[derive(Debug, Clone, Default)]
pub struct BlockingIndex {
    buckets: HashMap<String, Vec<usize>>,
}

impl BlockingIndex {
    /// Bucket every registry row by `key_fn` applied to `column`.
    /// An unset column yields an empty index.
    pub fn build(
        registry: &Dataset,
        column: Option<&str>,
        key_fn: fn(&CellValue) -> Option<String>,
    ) -> Self {
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        let Some(column) = column else {
            return Self { buckets };
        };

        for (idx, record) in registry.records.iter().enumerate() {
            if let Some(key) = key_fn(record.get(column)) {
                buckets.entry(key).or_default().push(idx);
            }
        }

        Self { buckets }
    }

    /// Registry indices sharing `key`; empty when the key is unknown.
    pub fn candidates(&self, key: &str) -> &[usize] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total indexed records across all buckets.
    pub fn indexed_records(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Last four characters of the normalized number. Values shorter than four
/// characters produce no key.
pub fn mobile_key(value: &CellValue) -> Option<String> {
    let m = normalize(value);
    let len = m.chars().count();
    if len < MOBILE_KEY_LEN {
        return None;
    }
    Some(m.chars().skip(len - MOBILE_KEY_LEN).collect())
}

/// First whitespace-delimited token of the normalized name.
pub fn name_key(value: &CellValue) -> Option<String> {
    normalize(value).split_whitespace().next().map(str::to_string)
}

pub fn build_mobile_index(registry: &Dataset, mobile_column: Option<&str>) -> BlockingIndex {
    BlockingIndex::build(registry, mobile_column, mobile_key)
}

pub fn build_name_index(registry: &Dataset, name_column: Option<&str>) -> BlockingIndex {
    BlockingIndex::build(registry, name_column, name_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    fn registry(rows: &[(&str, &str)]) -> Dataset {
        let records = rows
            .iter()
            .map(|(name, mobile)| Record::from_pairs([("name", *name), ("mobile", *mobile)]))
            .collect();
        Dataset::new("registry", vec!["name".into(), "mobile".into()], records)
    }

    #[test]
    fn mobile_key_is_last_four() {
        assert_eq!(mobile_key(&"9876543210".into()).as_deref(), Some("3210"));
        assert_eq!(mobile_key(&CellValue::Number(9876543210.0)).as_deref(), Some("3210"));
        assert_eq!(mobile_key(&"1234".into()).as_deref(), Some("1234"));
    }

    #[test]
    fn short_or_blank_mobile_has_no_key() {
        assert_eq!(mobile_key(&"12".into()), None);
        assert_eq!(mobile_key(&"".into()), None);
        assert_eq!(mobile_key(&"NA".into()), None);
        assert_eq!(mobile_key(&CellValue::Null), None);
    }

    #[test]
    fn name_key_is_first_token() {
        assert_eq!(name_key(&"  John   Smith ".into()).as_deref(), Some("john"));
        assert_eq!(name_key(&"none".into()), None);
    }

    #[test]
    fn mobile_index_excludes_garbage() {
        let reg = registry(&[
            ("a", "9876543210"),
            ("b", "12"),
            ("c", ""),
            ("d", "1111113210"),
        ]);
        let idx = build_mobile_index(&reg, Some("mobile"));
        assert_eq!(idx.candidates("3210"), &[0, 3]);
        assert_eq!(idx.candidates("12"), &[] as &[usize]);
        assert_eq!(idx.candidates(""), &[] as &[usize]);
        assert_eq!(idx.bucket_count(), 1);
        assert_eq!(idx.indexed_records(), 2);
    }

    #[test]
    fn name_index_preserves_registry_order() {
        let reg = registry(&[
            ("Ravi Kumar", "1"),
            ("Asha Patil", "2"),
            ("ravi shah", "3"),
            ("NULL", "4"),
        ]);
        let idx = build_name_index(&reg, Some("name"));
        assert_eq!(idx.candidates("ravi"), &[0, 2]);
        assert_eq!(idx.candidates("asha"), &[1]);
        assert_eq!(idx.indexed_records(), 3);
    }

    #[test]
    fn unset_column_builds_empty_index() {
        let reg = registry(&[("a", "9876543210")]);
        assert!(build_mobile_index(&reg, None).is_empty());
        assert!(build_name_index(&reg, None).is_empty());
    }
}
