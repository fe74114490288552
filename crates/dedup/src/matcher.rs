//! Pairwise matching: exact stage, then fuzzy stage.

use crate::config::DedupConfig;
use crate::model::{CellValue, Column, MatchDetail, MatchResult, Record};
use crate::normalize::normalize;
use crate::similarity::{token_set_ratio, token_sort_ratio};

/// Name similarity below this, with no mobile match, rejects the pair before
/// address/extra are looked at.
pub const GATEKEEPER_NAME_PCT: f64 = 50.0;

/// Blank-vs-blank is not a mobile match.
fn mobiles_match(a: &CellValue, b: &CellValue) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    !a.is_empty() && !b.is_empty() && a == b
}

fn normalized_pair(daily: &Record, candidate: &Record, column: &str) -> (String, String) {
    (normalize(daily.get(column)), normalize(candidate.get(column)))
}

/// Exact stage. Applies only when a name column is bound and both names
/// normalize to the same non-empty value; the category then reflects how
/// many other selected columns are equal too. Score is always 100.
pub fn check_exact_match<'a>(
    daily: &Record,
    candidate: &'a Record,
    candidate_index: usize,
    config: &DedupConfig,
) -> Option<MatchResult<'a>> {
    let cols = &config.columns;
    let name_col = cols.name.as_deref()?;

    let (daily_name, yearly_name) = normalized_pair(daily, candidate, name_col);
    if daily_name.is_empty() || daily_name != yearly_name {
        return None;
    }

    let mobile = cols
        .mobile
        .as_deref()
        .is_some_and(|c| mobiles_match(daily.get(c), candidate.get(c)));
    let equal = |column: Option<&str>| {
        column.is_some_and(|c| {
            let (a, b) = normalized_pair(daily, candidate, c);
            a == b
        })
    };
    let address = equal(cols.address.as_deref());
    let extra = equal(cols.extra.as_deref());

    let selected_columns = cols.selected_count();
    let matched_columns = 1 + [mobile, address, extra].iter().filter(|m| **m).count();

    Some(MatchResult {
        category: config.exact.categorize(matched_columns, selected_columns),
        score: 100,
        detail: MatchDetail::Exact {
            mobile,
            address,
            extra,
            matched_columns,
            selected_columns,
        },
        registry_index: candidate_index,
        registry_record: candidate,
    })
}

/// Fuzzy stage: weighted similarity over the selected columns, normalized by
/// the weight of the selected columns only.
pub fn check_fuzzy_match<'a>(
    daily: &Record,
    candidate: &'a Record,
    candidate_index: usize,
    config: &DedupConfig,
) -> Option<MatchResult<'a>> {
    let cols = &config.columns;
    let weights = &config.weights;

    let name_pct = cols.name.as_deref().map_or(0.0, |c| {
        let (a, b) = normalized_pair(daily, candidate, c);
        token_sort_ratio(&a, &b)
    });
    let mobile = cols
        .mobile
        .as_deref()
        .is_some_and(|c| mobiles_match(daily.get(c), candidate.get(c)));

    // Gatekeeper. With neither identity column bound there is nothing to gate on.
    let has_identity = cols.name.is_some() || cols.mobile.is_some();
    if has_identity && name_pct < GATEKEEPER_NAME_PCT && !mobile {
        return None;
    }

    let set_ratio = |column: Option<&str>| {
        column.map_or(0.0, |c| {
            let (a, b) = normalized_pair(daily, candidate, c);
            token_set_ratio(&a, &b)
        })
    };
    let address_pct = set_ratio(cols.address.as_deref());
    let extra_pct = set_ratio(cols.extra.as_deref());

    let mut score = 0.0;
    let mut total_weight = 0.0;
    for (column, _) in cols.selected() {
        let weight = weights.weight(column);
        let pct = match column {
            Column::Name => name_pct,
            Column::Mobile if mobile => 100.0,
            Column::Mobile => 0.0,
            Column::Address => address_pct,
            Column::Extra => extra_pct,
        };
        score += (pct / 100.0) * weight;
        total_weight += weight;
    }
    if total_weight > 0.0 {
        score = score / total_weight * 100.0;
    }

    let category = config.fuzzy.categorize(score)?;

    Some(MatchResult {
        category,
        score: score.round().clamp(0.0, 100.0) as u8,
        detail: MatchDetail::Fuzzy {
            name_pct,
            mobile,
            address_pct,
            extra_pct,
        },
        registry_index: candidate_index,
        registry_record: candidate,
    })
}

/// Exact stage first; the fuzzy stage runs only when it yields nothing.
pub fn match_pair<'a>(
    daily: &Record,
    candidate: &'a Record,
    candidate_index: usize,
    config: &DedupConfig,
) -> Option<MatchResult<'a>> {
    check_exact_match(daily, candidate, candidate_index, config)
        .or_else(|| check_fuzzy_match(daily, candidate, candidate_index, config))
}

/// Highest-scoring qualifying candidate. Ties keep the first one seen, so
/// candidate order decides.
pub fn find_best_match<'a, I>(daily: &Record, candidates: I, config: &DedupConfig) -> Option<MatchResult<'a>>
where
    I: IntoIterator<Item = (usize, &'a Record)>,
{
    let mut best: Option<MatchResult<'a>> = None;
    for (idx, candidate) in candidates {
        let Some(result) = match_pair(daily, candidate, idx, config) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| result.score > b.score) {
            best = Some(result);
        }
    }
    best
}

/// Every qualifying candidate, best first. Equal scores stay in candidate order.
pub fn find_all_matches<'a, I>(daily: &Record, candidates: I, config: &DedupConfig) -> Vec<MatchResult<'a>>
where
    I: IntoIterator<Item = (usize, &'a Record)>,
{
    let mut matches: Vec<MatchResult<'a>> = candidates
        .into_iter()
        .filter_map(|(idx, candidate)| match_pair(daily, candidate, idx, config))
        .collect();
    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnSelection;
    use crate::model::{MatchCategory, MatchKind};

    fn rec(name: &str, mobile: &str, addr: &str, extra: &str) -> Record {
        Record::from_pairs([
            ("name", name),
            ("mobile", mobile),
            ("addr", addr),
            ("disease", extra),
        ])
    }

    fn config(name: bool, mobile: bool, addr: bool, extra: bool) -> DedupConfig {
        DedupConfig::new(ColumnSelection {
            name: name.then(|| "name".into()),
            mobile: mobile.then(|| "mobile".into()),
            address: addr.then(|| "addr".into()),
            extra: extra.then(|| "disease".into()),
        })
    }

    // -- exact stage --------------------------------------------------------

    #[test]
    fn exact_perfect_requires_every_selected_column() {
        let cfg = config(true, true, true, true);
        let yearly = rec("John Smith", "5551234567", "12 Oak St", "TB");

        let same = rec("john smith ", "5551234567", "12 oak st", "tb");
        let m = check_exact_match(&same, &yearly, 0, &cfg).unwrap();
        assert_eq!(m.category, MatchCategory::Perfect);
        assert_eq!(m.score, 100);
        assert_eq!(m.kind(), MatchKind::Exact);

        // Any single differing column downgrades to STRONG (3/4).
        for daily in [
            rec("john smith", "5550000000", "12 oak st", "tb"),
            rec("john smith", "5551234567", "99 elm st", "tb"),
            rec("john smith", "5551234567", "12 oak st", "malaria"),
        ] {
            let m = check_exact_match(&daily, &yearly, 0, &cfg).unwrap();
            assert_eq!(m.category, MatchCategory::Strong);
        }

        let two_off = rec("john smith", "5550000000", "99 elm st", "tb");
        let m = check_exact_match(&two_off, &yearly, 0, &cfg).unwrap();
        assert_eq!(m.category, MatchCategory::Partial);

        let three_off = rec("john smith", "", "99 elm st", "malaria");
        let m = check_exact_match(&three_off, &yearly, 0, &cfg).unwrap();
        assert_eq!(m.category, MatchCategory::Weak);
    }

    #[test]
    fn exact_blank_mobiles_do_not_match() {
        let cfg = config(true, true, false, false);
        let yearly = rec("asha", "NA", "", "");
        let daily = rec("asha", "", "", "");
        let m = check_exact_match(&daily, &yearly, 0, &cfg).unwrap();
        match m.detail {
            MatchDetail::Exact { mobile, matched_columns, selected_columns, .. } => {
                assert!(!mobile);
                assert_eq!(matched_columns, 1);
                assert_eq!(selected_columns, 2);
            }
            other => panic!("unexpected detail: {other:?}"),
        }
        assert_eq!(m.category, MatchCategory::Partial);
    }

    #[test]
    fn exact_needs_name_column_and_non_empty_name() {
        let yearly = rec("", "5551234567", "", "");
        let daily = rec("null", "5551234567", "", "");
        assert!(check_exact_match(&daily, &yearly, 0, &config(true, true, false, false)).is_none());
        assert!(check_exact_match(&daily, &yearly, 0, &config(false, true, false, false)).is_none());
    }

    #[test]
    fn exact_name_mismatch_falls_through() {
        let cfg = config(true, true, false, false);
        let yearly = rec("john smith", "5551234567", "", "");
        let daily = rec("jon smith", "5551234567", "", "");
        assert!(check_exact_match(&daily, &yearly, 0, &cfg).is_none());
        let m = match_pair(&daily, &yearly, 0, &cfg).unwrap();
        assert_eq!(m.kind(), MatchKind::Fuzzy);
    }

    // -- fuzzy stage --------------------------------------------------------

    #[test]
    fn gatekeeper_rejects_weak_name_without_mobile() {
        let cfg = config(true, true, true, true);
        let yearly = rec("ramesh patil", "9876543210", "12 oak st", "tb");
        let daily = rec("sunita kale", "9123456789", "12 oak st", "tb");
        assert!(token_sort_ratio("sunita kale", "ramesh patil") < GATEKEEPER_NAME_PCT);
        assert!(check_fuzzy_match(&daily, &yearly, 0, &cfg).is_none());
    }

    #[test]
    fn mobile_match_opens_the_gate() {
        let cfg = config(true, true, false, false);
        let yearly = rec("ramesh patil", "9876543210", "", "");
        let daily = rec("sunita kale", "9876543210", "", "");
        let m = check_fuzzy_match(&daily, &yearly, 3, &cfg).unwrap();
        assert_eq!(m.registry_index, 3);
        match m.detail {
            MatchDetail::Fuzzy { mobile, .. } => assert!(mobile),
            other => panic!("unexpected detail: {other:?}"),
        }
    }

    #[test]
    fn fuzzy_score_weighted_over_selected_columns() {
        let yearly = rec("john smith", "", "12 Oak St", "");
        let daily = rec("jon smyth", "", "12 Oak St", "");

        // name 80 * 40 + address 100 * 20 over 60
        let m = check_fuzzy_match(&daily, &yearly, 0, &config(true, false, true, false)).unwrap();
        assert_eq!(m.score, 87);
        assert_eq!(m.category, MatchCategory::High);

        // mobile selected but blank on both sides adds weight, not score: 52/90
        let m = check_fuzzy_match(&daily, &yearly, 0, &config(true, true, true, false)).unwrap();
        assert_eq!(m.score, 58);
        assert_eq!(m.category, MatchCategory::Medium);
    }

    #[test]
    fn fuzzy_below_low_threshold_rejected() {
        let mut cfg = config(true, false, true, false);
        cfg.fuzzy.low = 95.0;
        cfg.fuzzy.medium = 96.0;
        cfg.fuzzy.high = 97.0;
        let yearly = rec("john smith", "", "12 Oak St", "");
        let daily = rec("jon smyth", "", "12 Oak St", "");
        assert!(check_fuzzy_match(&daily, &yearly, 0, &cfg).is_none());
    }

    #[test]
    fn attribute_only_selection_is_scored_directly() {
        let cfg = config(false, false, true, false);
        let yearly = rec("", "", "flat 4 12 oak st", "");
        let daily = rec("", "", "12 oak st", "");
        let m = check_fuzzy_match(&daily, &yearly, 0, &cfg).unwrap();
        assert_eq!(m.score, 100);
    }

    // -- selection ----------------------------------------------------------

    #[test]
    fn best_match_prefers_highest_score_then_first_seen() {
        let cfg = config(true, true, false, false);
        let registry = [
            rec("jon smith", "5551234567", "", ""),
            rec("john smith", "5551234567", "", ""),
            rec("john smith", "5551234567", "", ""),
        ];
        let daily = rec("john smith", "5551234567", "", "");
        let best = find_best_match(&daily, registry.iter().enumerate(), &cfg).unwrap();
        assert_eq!(best.registry_index, 1);
        assert!(std::ptr::eq(best.registry_record, &registry[1]));
        assert_eq!(best.category, MatchCategory::Perfect);
    }

    #[test]
    fn all_matches_sorted_and_consistent_with_best() {
        let cfg = config(true, false, true, false);
        let registry = [
            rec("jon smyth", "", "12 oak st", ""),
            rec("zzz qqq", "", "12 oak st", ""),
            rec("john smith", "", "99 elm st", ""),
        ];
        let daily = rec("john smith", "", "12 oak st", "");
        let all = find_all_matches(&daily, registry.iter().enumerate(), &cfg);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].registry_index, 2);
        assert_eq!(all[0].score, 100);
        assert_eq!(all[1].registry_index, 0);

        let best = find_best_match(&daily, registry.iter().enumerate(), &cfg).unwrap();
        assert_eq!(best.registry_index, all[0].registry_index);
    }

    #[test]
    fn no_candidates_no_match() {
        let cfg = config(true, false, false, false);
        let daily = rec("john", "", "", "");
        assert!(find_best_match(&daily, std::iter::empty(), &cfg).is_none());
    }
}
