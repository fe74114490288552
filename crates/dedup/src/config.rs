use serde::{Deserialize, Serialize};

use crate::error::DedupError;
use crate::model::{Column, Dataset, MatchCategory};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    #[serde(default)]
    pub columns: ColumnSelection,
    #[serde(default)]
    pub weights: ColumnWeights,
    #[serde(default)]
    pub fuzzy: FuzzyThresholds,
    #[serde(default)]
    pub exact: ExactThresholds,
}

// ---------------------------------------------------------------------------
// Column selection
// ---------------------------------------------------------------------------

/// Which dataset column feeds each comparison slot. `None` means the slot
/// is not compared at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl ColumnSelection {
    pub fn get(&self, column: Column) -> Option<&str> {
        match column {
            Column::Name => self.name.as_deref(),
            Column::Mobile => self.mobile.as_deref(),
            Column::Address => self.address.as_deref(),
            Column::Extra => self.extra.as_deref(),
        }
    }

    pub fn is_selected(&self, column: Column) -> bool {
        self.get(column).is_some()
    }

    /// Bound slots in Col1..Col4 order.
    pub fn selected(&self) -> impl Iterator<Item = (Column, &str)> + '_ {
        Column::ALL
            .into_iter()
            .filter_map(move |c| self.get(c).map(|name| (c, name)))
    }

    pub fn selected_count(&self) -> usize {
        self.selected().count()
    }

    pub fn is_empty(&self) -> bool {
        self.selected_count() == 0
    }

    /// Every bound column must exist in both schemas.
    pub fn validate_against(&self, registry: &Dataset, batch: &Dataset) -> Result<(), DedupError> {
        if self.is_empty() {
            return Err(DedupError::NoColumnsSelected);
        }
        for (_, column) in self.selected() {
            for dataset in [registry, batch] {
                if !dataset.has_column(column) {
                    return Err(DedupError::MissingColumn {
                        dataset: dataset.label.clone(),
                        column: column.into(),
                    });
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fuzzy scoring
// ---------------------------------------------------------------------------

/// Relative weight of each slot in the fuzzy score. The score is divided by
/// the sum over selected slots only, so absolute scale does not matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnWeights {
    pub name: f64,
    pub mobile: f64,
    pub address: f64,
    pub extra: f64,
}

impl Default for ColumnWeights {
    fn default() -> Self {
        Self {
            name: 40.0,
            mobile: 30.0,
            address: 20.0,
            extra: 10.0,
        }
    }
}

impl ColumnWeights {
    pub fn weight(&self, column: Column) -> f64 {
        match column {
            Column::Name => self.name,
            Column::Mobile => self.mobile,
            Column::Address => self.address,
            Column::Extra => self.extra,
        }
    }
}

/// Score cut-offs for the fuzzy stage. Below `low` the pair is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FuzzyThresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for FuzzyThresholds {
    fn default() -> Self {
        Self {
            high: 80.0,
            medium: 55.0,
            low: 40.0,
        }
    }
}

impl FuzzyThresholds {
    pub fn categorize(&self, score: f64) -> Option<MatchCategory> {
        if score >= self.high {
            Some(MatchCategory::High)
        } else if score >= self.medium {
            Some(MatchCategory::Medium)
        } else if score >= self.low {
            Some(MatchCategory::Low)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Exact-stage categories
// ---------------------------------------------------------------------------

/// Fraction of selected columns that must match exactly for each category.
/// PERFECT always means every selected column matched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExactThresholds {
    pub strong: f64,
    pub partial: f64,
}

impl Default for ExactThresholds {
    fn default() -> Self {
        Self {
            strong: 0.75,
            partial: 0.5,
        }
    }
}

impl ExactThresholds {
    pub fn categorize(&self, matched: usize, selected: usize) -> MatchCategory {
        let matched_f = matched as f64;
        let selected_f = selected as f64;
        if matched == selected {
            MatchCategory::Perfect
        } else if matched_f >= selected_f * self.strong {
            MatchCategory::Strong
        } else if matched_f >= selected_f * self.partial {
            MatchCategory::Partial
        } else {
            MatchCategory::Weak
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl DedupConfig {
    pub fn new(columns: ColumnSelection) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    /// Deserialize without validating. Callers that merge in column
    /// bindings from elsewhere must call [`DedupConfig::validate`] afterwards.
    pub fn parse(input: &str) -> Result<Self, DedupError> {
        toml::from_str(input).map_err(|e| DedupError::ConfigParse(e.to_string()))
    }

    pub fn from_toml(input: &str) -> Result<Self, DedupError> {
        let config = Self::parse(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DedupError> {
        if self.columns.is_empty() {
            return Err(DedupError::NoColumnsSelected);
        }
        for (slot, column) in self.columns.selected() {
            if column.trim().is_empty() {
                return Err(DedupError::ConfigValidation(format!(
                    "columns.{slot} is bound to an empty column name"
                )));
            }
        }

        for column in Column::ALL {
            let w = self.weights.weight(column);
            if !w.is_finite() || w <= 0.0 {
                return Err(DedupError::ConfigValidation(format!(
                    "weights.{column} must be a positive number, got {w}"
                )));
            }
        }

        let f = &self.fuzzy;
        for (label, value) in [("high", f.high), ("medium", f.medium), ("low", f.low)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(DedupError::ConfigValidation(format!(
                    "fuzzy.{label} must be within 0..=100, got {value}"
                )));
            }
        }
        if !(f.high >= f.medium && f.medium >= f.low) {
            return Err(DedupError::ConfigValidation(format!(
                "fuzzy thresholds must satisfy high >= medium >= low, got {}/{}/{}",
                f.high, f.medium, f.low
            )));
        }

        let e = &self.exact;
        for (label, value) in [("strong", e.strong), ("partial", e.partial)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(DedupError::ConfigValidation(format!(
                    "exact.{label} must be within (0, 1], got {value}"
                )));
            }
        }
        if e.strong < e.partial {
            return Err(DedupError::ConfigValidation(format!(
                "exact thresholds must satisfy strong >= partial, got {}/{}",
                e.strong, e.partial
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    const FULL: &str = r#"
[columns]
name    = "Patient Name"
mobile  = "Mobile No"
address = "Address"
extra   = "Disease"

[weights]
name = 50
mobile = 30
address = 10
extra = 10

[fuzzy]
high = 85
medium = 70
low = 50

[exact]
strong = 0.8
partial = 0.4
"#;

    #[test]
    fn parse_full() {
        let config = DedupConfig::from_toml(FULL).unwrap();
        assert_eq!(config.columns.name.as_deref(), Some("Patient Name"));
        assert_eq!(config.columns.extra.as_deref(), Some("Disease"));
        assert_eq!(config.columns.selected_count(), 4);
        assert_eq!(config.weights.name, 50.0);
        assert_eq!(config.fuzzy.low, 50.0);
        assert_eq!(config.exact.strong, 0.8);
    }

    #[test]
    fn tables_default_independently() {
        let config = DedupConfig::from_toml(
            r#"
[columns]
name = "name"

[fuzzy]
high = 90
"#,
        )
        .unwrap();
        assert_eq!(config.weights, ColumnWeights::default());
        assert_eq!(config.fuzzy.high, 90.0);
        assert_eq!(config.fuzzy.medium, 55.0);
        assert_eq!(config.exact, ExactThresholds::default());
        assert!(!config.columns.is_selected(Column::Mobile));
    }

    #[test]
    fn reject_no_columns() {
        let err = DedupConfig::from_toml("[weights]\nname = 1\n").unwrap_err();
        assert!(matches!(err, DedupError::NoColumnsSelected));
    }

    #[test]
    fn reject_unknown_slot() {
        let err = DedupConfig::from_toml("[columns]\nphone = \"Mobile\"\n").unwrap_err();
        assert!(matches!(err, DedupError::ConfigParse(_)));
    }

    #[test]
    fn reject_blank_binding() {
        let err = DedupConfig::from_toml("[columns]\nname = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("columns.name"));
    }

    #[test]
    fn reject_non_positive_weight() {
        let input = "[columns]\nname = \"n\"\n[weights]\nextra = 0\n";
        let err = DedupConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("weights.extra"));
    }

    #[test]
    fn reject_inverted_thresholds() {
        let input = "[columns]\nname = \"n\"\n[fuzzy]\nhigh = 50\nmedium = 60\nlow = 40\n";
        let err = DedupConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("high >= medium >= low"));

        let input = "[columns]\nname = \"n\"\n[exact]\nstrong = 0.4\npartial = 0.6\n";
        let err = DedupConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("strong >= partial"));
    }

    #[test]
    fn exact_categories() {
        let t = ExactThresholds::default();
        assert_eq!(t.categorize(4, 4), MatchCategory::Perfect);
        assert_eq!(t.categorize(3, 4), MatchCategory::Strong);
        assert_eq!(t.categorize(2, 4), MatchCategory::Partial);
        assert_eq!(t.categorize(1, 4), MatchCategory::Weak);
        assert_eq!(t.categorize(2, 3), MatchCategory::Partial);
        assert_eq!(t.categorize(1, 2), MatchCategory::Partial);
        assert_eq!(t.categorize(1, 1), MatchCategory::Perfect);
    }

    #[test]
    fn fuzzy_categories() {
        let t = FuzzyThresholds::default();
        assert_eq!(t.categorize(100.0), Some(MatchCategory::High));
        assert_eq!(t.categorize(80.0), Some(MatchCategory::High));
        assert_eq!(t.categorize(57.8), Some(MatchCategory::Medium));
        assert_eq!(t.categorize(40.0), Some(MatchCategory::Low));
        assert_eq!(t.categorize(39.9), None);
    }

    #[test]
    fn selection_checked_against_both_schemas() {
        let registry = Dataset::new(
            "registry",
            vec!["name".into(), "mobile".into()],
            vec![Record::default()],
        );
        let batch = Dataset::new("batch", vec!["name".into()], vec![]);

        let ok = ColumnSelection {
            name: Some("name".into()),
            ..Default::default()
        };
        assert!(ok.validate_against(&registry, &batch).is_ok());

        let missing = ColumnSelection {
            name: Some("name".into()),
            mobile: Some("mobile".into()),
            ..Default::default()
        };
        match missing.validate_against(&registry, &batch).unwrap_err() {
            DedupError::MissingColumn { dataset, column } => {
                assert_eq!(dataset, "batch");
                assert_eq!(column, "mobile");
            }
            other => panic!("unexpected error: {other}"),
        }

        let none = ColumnSelection::default();
        assert!(matches!(
            none.validate_against(&registry, &batch),
            Err(DedupError::NoColumnsSelected)
        ));
    }
}
