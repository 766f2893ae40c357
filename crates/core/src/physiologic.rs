//! Physiologic limit guard.
//!
//! Rejects values that are not compatible with life, independent of any
//! reference range. This runs before reference-range classification: an
//! impossible value (a transcription slip, a unit mix-up) must block data
//! entry rather than merely be flagged abnormal.

use crate::{LabError, LabResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Absolute life-compatible bounds for one result item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhysiologicLimit {
    /// Human-readable analyte name, used in failure messages.
    pub label: String,
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Item-code keyed table of physiologic limits.
///
/// Lookup is tiered: exact code, then case-insensitive match, then substring
/// match. The tiers are checked strictly in that order so the looser
/// substring heuristic can never shadow an exact entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhysiologicLimitTable {
    entries: BTreeMap<String, PhysiologicLimit>,
}

impl PhysiologicLimitTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a limit table from YAML text (a mapping of item code → limit).
    ///
    /// # Errors
    ///
    /// Returns [`LabError::TableDeserialization`] on schema mismatch, or
    /// [`LabError::InvalidTableEntry`] when a limit is inverted.
    pub fn from_yaml_str(yaml_text: &str) -> LabResult<Self> {
        let entries: BTreeMap<String, PhysiologicLimit> = serde_yaml::from_str(yaml_text)?;
        let table = Self { entries };
        table.validate()?;
        Ok(table)
    }

    /// Built-in limits for common analytes.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "GLU".to_string(),
            PhysiologicLimit {
                label: "Glucose".into(),
                min: 10.0,
                max: 1500.0,
                unit: Some("mg/dL".into()),
            },
        );
        entries.insert(
            "K".to_string(),
            PhysiologicLimit {
                label: "Potassium".into(),
                min: 1.0,
                max: 12.0,
                unit: Some("mmol/L".into()),
            },
        );
        entries.insert(
            "NA".to_string(),
            PhysiologicLimit {
                label: "Sodium".into(),
                min: 90.0,
                max: 200.0,
                unit: Some("mmol/L".into()),
            },
        );
        entries.insert(
            "HGB".to_string(),
            PhysiologicLimit {
                label: "Hemoglobin".into(),
                min: 1.0,
                max: 25.0,
                unit: Some("g/dL".into()),
            },
        );
        entries.insert(
            "WBC".to_string(),
            PhysiologicLimit {
                label: "White blood cells".into(),
                min: 0.0,
                max: 500.0,
                unit: Some("10^3/uL".into()),
            },
        );
        entries.insert(
            "CREA".to_string(),
            PhysiologicLimit {
                label: "Creatinine".into(),
                min: 0.1,
                max: 40.0,
                unit: Some("mg/dL".into()),
            },
        );
        Self { entries }
    }

    /// Tiered lookup: exact → case-insensitive → substring.
    pub fn lookup(&self, item_code: &str) -> Option<&PhysiologicLimit> {
        if let Some(limit) = self.entries.get(item_code) {
            return Some(limit);
        }

        let folded = item_code.to_lowercase();
        if let Some(limit) = self
            .entries
            .iter()
            .find(|(code, _)| code.to_lowercase() == folded)
            .map(|(_, limit)| limit)
        {
            return Some(limit);
        }

        self.entries
            .iter()
            .find(|(code, _)| {
                let code = code.to_lowercase();
                folded.contains(&code) || code.contains(&folded)
            })
            .map(|(_, limit)| limit)
    }

    /// Check a raw value for the given item code.
    ///
    /// Accepts plain numbers and strings with a `<`/`>` prefix (the numeric
    /// part is what gets checked). Non-numeric values and item codes without
    /// a table entry are permissive — only a value provably outside the
    /// life-compatible bounds is a failure.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::Validation`] with a human-readable message when
    /// the value lies outside `[min, max]`.
    pub fn check(&self, item_code: &str, raw_value: &str) -> LabResult<()> {
        let Some(limit) = self.lookup(item_code) else {
            return Ok(());
        };

        let Some(value) = parse_guarded_number(raw_value) else {
            return Ok(());
        };

        if value < limit.min || value > limit.max {
            let unit = limit.unit.as_deref().unwrap_or("");
            return Err(LabError::Validation(format!(
                "{} value {} is outside the physiologically possible range {}-{} {}",
                limit.label, raw_value.trim(), limit.min, limit.max, unit
            )));
        }

        Ok(())
    }

    /// Convenience wrapper for values already known to be numeric.
    pub fn check_numeric(&self, item_code: &str, value: f64) -> LabResult<()> {
        self.check(item_code, &value.to_string())
    }

    fn validate(&self) -> LabResult<()> {
        for (code, limit) in &self.entries {
            if limit.min > limit.max {
                return Err(LabError::InvalidTableEntry {
                    code: code.clone(),
                    reason: format!("inverted limit: min {} > max {}", limit.min, limit.max),
                });
            }
        }
        Ok(())
    }
}

/// Extract the numeric part of a raw value, tolerating a `<` or `>` prefix
/// (instrument readouts like `"<0.1"` or `">1000"`).
fn parse_guarded_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('<')
        .or_else(|| trimmed.strip_prefix('>'))
        .unwrap_or(trimmed);
    stripped.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_lookup_wins() {
        let table = PhysiologicLimitTable::builtin();
        let limit = table.lookup("K").expect("K entry");
        assert_eq!(limit.label, "Potassium");
    }

    #[test]
    fn case_insensitive_lookup_beats_substring() {
        // "na" case-folds to the exact NA entry; the substring tier would
        // also match it, but must not be consulted first.
        let table = PhysiologicLimitTable::builtin();
        let limit = table.lookup("na").expect("na entry");
        assert_eq!(limit.label, "Sodium");
    }

    #[test]
    fn substring_lookup_is_last_resort() {
        let table = PhysiologicLimitTable::builtin();
        // "GLU-FASTING" contains "GLU".
        let limit = table.lookup("GLU-FASTING").expect("substring match");
        assert_eq!(limit.label, "Glucose");
    }

    #[test]
    fn missing_entry_is_permissive() {
        let table = PhysiologicLimitTable::builtin();
        table.check("TSH", "123456.0").expect("unknown code is permissive");
    }

    #[test]
    fn out_of_bounds_value_is_a_hard_failure() {
        let table = PhysiologicLimitTable::builtin();
        let err = table.check("K", "55.0").expect_err("impossible potassium");
        assert!(matches!(err, LabError::Validation(msg) if msg.contains("Potassium")));

        table.check("K", "4.2").expect("plausible potassium");
    }

    #[test]
    fn prefixed_values_are_checked_numerically() {
        let table = PhysiologicLimitTable::builtin();
        table.check("GLU", "<20").expect("inside bounds");
        let err = table.check("GLU", ">2000").expect_err("outside bounds");
        assert!(matches!(err, LabError::Validation(_)));
    }

    #[test]
    fn non_numeric_value_is_permissive() {
        let table = PhysiologicLimitTable::builtin();
        table.check("GLU", "hemolyzed").expect("text is not checked");
    }

    #[test]
    fn boundary_values_are_accepted() {
        let table = PhysiologicLimitTable::builtin();
        table.check_numeric("K", 1.0).expect("min boundary");
        table.check_numeric("K", 12.0).expect("max boundary");
    }

    #[test]
    fn yaml_table_rejects_inverted_limits() {
        let yaml = r#"
X:
  label: Test item
  min: 10.0
  max: 1.0
"#;
        let err = PhysiologicLimitTable::from_yaml_str(yaml).expect_err("inverted limit");
        assert!(matches!(err, LabError::InvalidTableEntry { .. }));
    }
}
