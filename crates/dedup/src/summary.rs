use std::collections::BTreeMap;

use crate::model::{DedupSummary, Partition, RecordMatch};

/// Compute summary statistics from the per-record matches and the partition.
pub fn compute_summary(
    registry_records: usize,
    batch_records: usize,
    matches: &[RecordMatch<'_>],
    partition: &Partition,
) -> DedupSummary {
    let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
    for m in matches {
        *category_counts.entry(m.best.category.to_string()).or_insert(0) += 1;
    }

    DedupSummary {
        registry_records,
        batch_records,
        perfect_duplicates: partition.perfect_duplicates.len(),
        to_upload: partition.new_records.len(),
        matched: matches.len(),
        unmatched: batch_records - matches.len(),
        category_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MatchCategory, MatchDetail, MatchResult, Record, RecordStatus};

    fn record_match(batch_index: usize, category: MatchCategory, record: &Record) -> RecordMatch<'_> {
        RecordMatch {
            batch_index,
            status: if category == MatchCategory::Perfect {
                RecordStatus::PerfectDuplicate
            } else {
                RecordStatus::NewOrPartial
            },
            best: MatchResult {
                category,
                score: 100,
                detail: MatchDetail::Fuzzy {
                    name_pct: 0.0,
                    mobile: false,
                    address_pct: 0.0,
                    extra_pct: 0.0,
                },
                registry_index: 0,
                registry_record: record,
            },
        }
    }

    #[test]
    fn summary_counts() {
        let rec = Record::default();
        let matches = vec![
            record_match(0, MatchCategory::Perfect, &rec),
            record_match(1, MatchCategory::Perfect, &rec),
            record_match(3, MatchCategory::High, &rec),
        ];
        let partition = Partition {
            perfect_duplicates: vec![0, 1],
            new_records: vec![2, 3, 4],
        };
        let summary = compute_summary(10, 5, &matches, &partition);
        assert_eq!(summary.registry_records, 10);
        assert_eq!(summary.perfect_duplicates, 2);
        assert_eq!(summary.to_upload, 3);
        assert_eq!(summary.matched, 3);
        assert_eq!(summary.unmatched, 2);
        assert_eq!(summary.category_counts["PERFECT"], 2);
        assert_eq!(summary.category_counts["HIGH"], 1);
        assert!(!summary.category_counts.contains_key("LOW"));
    }
}
