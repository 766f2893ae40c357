//! Reference range catalog.
//!
//! The catalog is a static item-code → range mapping, not a database. It is
//! loadable from a YAML string with no I/O, and ships with a built-in default
//! table. Wire structs use `deny_unknown_fields` so a typo in a range key is
//! caught at load time instead of silently ignoring a bound.

use crate::{LabError, LabResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A closed low/high interval for one demographic segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeBand {
    pub low: f64,
    pub high: f64,
}

/// Per-item reference bounds, optionally segmented by demographic group, with
/// optional absolute critical bounds that trump the segment classification.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogReferenceRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adult_male: Option<RangeBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adult_female: Option<RangeBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pediatric: Option<RangeBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adult_general: Option<RangeBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_high: Option<f64>,
}

/// Item-code keyed catalog of reference ranges.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RangeCatalog {
    entries: BTreeMap<String, CatalogReferenceRange>,
}

impl RangeCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a catalog from YAML text (a mapping of item code → range).
    ///
    /// # Errors
    ///
    /// Returns [`LabError::TableDeserialization`] if the YAML does not match
    /// the wire schema, or [`LabError::InvalidTableEntry`] if any band is
    /// inverted (`low > high`) or the critical bounds cross.
    pub fn from_yaml_str(yaml_text: &str) -> LabResult<Self> {
        let entries: BTreeMap<String, CatalogReferenceRange> = serde_yaml::from_str(yaml_text)?;
        let catalog = Self { entries };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The built-in default catalog for common chemistry/hematology items.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();

        entries.insert(
            "GLU".to_string(),
            CatalogReferenceRange {
                unit: Some("mg/dL".into()),
                adult_general: Some(RangeBand { low: 70.0, high: 100.0 }),
                pediatric: Some(RangeBand { low: 60.0, high: 100.0 }),
                critical_low: Some(40.0),
                critical_high: Some(450.0),
                ..Default::default()
            },
        );
        entries.insert(
            "K".to_string(),
            CatalogReferenceRange {
                unit: Some("mmol/L".into()),
                adult_general: Some(RangeBand { low: 3.5, high: 5.1 }),
                critical_low: Some(2.8),
                critical_high: Some(6.2),
                ..Default::default()
            },
        );
        entries.insert(
            "NA".to_string(),
            CatalogReferenceRange {
                unit: Some("mmol/L".into()),
                adult_general: Some(RangeBand { low: 136.0, high: 145.0 }),
                critical_low: Some(120.0),
                critical_high: Some(160.0),
                ..Default::default()
            },
        );
        entries.insert(
            "HGB".to_string(),
            CatalogReferenceRange {
                unit: Some("g/dL".into()),
                adult_male: Some(RangeBand { low: 13.5, high: 17.5 }),
                adult_female: Some(RangeBand { low: 12.0, high: 15.5 }),
                pediatric: Some(RangeBand { low: 11.0, high: 14.5 }),
                critical_low: Some(7.0),
                critical_high: Some(20.0),
                ..Default::default()
            },
        );
        entries.insert(
            "WBC".to_string(),
            CatalogReferenceRange {
                unit: Some("10^3/uL".into()),
                adult_general: Some(RangeBand { low: 4.0, high: 11.0 }),
                pediatric: Some(RangeBand { low: 5.0, high: 14.5 }),
                critical_low: Some(1.0),
                critical_high: Some(50.0),
                ..Default::default()
            },
        );
        entries.insert(
            "CREA".to_string(),
            CatalogReferenceRange {
                unit: Some("mg/dL".into()),
                adult_male: Some(RangeBand { low: 0.7, high: 1.3 }),
                adult_female: Some(RangeBand { low: 0.6, high: 1.1 }),
                pediatric: Some(RangeBand { low: 0.3, high: 0.7 }),
                critical_high: Some(7.4),
                ..Default::default()
            },
        );

        Self { entries }
    }

    /// Look up a range by exact item code.
    pub fn get(&self, item_code: &str) -> Option<&CatalogReferenceRange> {
        self.entries.get(item_code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert one entry, failing on duplicates so two configuration sources
    /// cannot silently shadow each other.
    pub fn insert(&mut self, code: impl Into<String>, range: CatalogReferenceRange) -> LabResult<()> {
        let code = code.into();
        if self.entries.contains_key(&code) {
            return Err(LabError::DuplicateTableEntry(code));
        }
        self.entries.insert(code, range);
        Ok(())
    }

    fn validate(&self) -> LabResult<()> {
        for (code, range) in &self.entries {
            for band in [
                range.adult_male,
                range.adult_female,
                range.pediatric,
                range.adult_general,
            ]
            .into_iter()
            .flatten()
            {
                if band.low > band.high {
                    return Err(LabError::InvalidTableEntry {
                        code: code.clone(),
                        reason: format!("inverted band: low {} > high {}", band.low, band.high),
                    });
                }
            }
            if let (Some(lo), Some(hi)) = (range.critical_low, range.critical_high) {
                if lo >= hi {
                    return Err(LabError::InvalidTableEntry {
                        code: code.clone(),
                        reason: format!("critical bounds cross: {lo} >= {hi}"),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalog_yaml() {
        let yaml = r#"
GLU:
  unit: mg/dL
  adult_general: { low: 70.0, high: 100.0 }
  critical_low: 40.0
  critical_high: 450.0
HGB:
  unit: g/dL
  adult_male: { low: 13.5, high: 17.5 }
  adult_female: { low: 12.0, high: 15.5 }
"#;
        let catalog = RangeCatalog::from_yaml_str(yaml).expect("parse catalog");
        assert_eq!(catalog.len(), 2);
        let glu = catalog.get("GLU").expect("GLU entry");
        assert_eq!(glu.critical_high, Some(450.0));
        assert_eq!(glu.adult_general, Some(RangeBand { low: 70.0, high: 100.0 }));
    }

    #[test]
    fn rejects_unknown_keys() {
        let yaml = r#"
GLU:
  adult_general: { low: 70.0, high: 100.0 }
  critcal_high: 450.0
"#;
        let err = RangeCatalog::from_yaml_str(yaml).expect_err("should reject typo key");
        assert!(matches!(err, LabError::TableDeserialization(_)));
    }

    #[test]
    fn rejects_inverted_band() {
        let yaml = r#"
K:
  adult_general: { low: 5.1, high: 3.5 }
"#;
        let err = RangeCatalog::from_yaml_str(yaml).expect_err("should reject inverted band");
        assert!(matches!(err, LabError::InvalidTableEntry { code, .. } if code == "K"));
    }

    #[test]
    fn rejects_crossed_critical_bounds() {
        let yaml = r#"
NA:
  adult_general: { low: 136.0, high: 145.0 }
  critical_low: 160.0
  critical_high: 120.0
"#;
        let err = RangeCatalog::from_yaml_str(yaml).expect_err("should reject crossed bounds");
        assert!(matches!(err, LabError::InvalidTableEntry { .. }));
    }

    #[test]
    fn insert_refuses_duplicates() {
        let mut catalog = RangeCatalog::builtin();
        let err = catalog
            .insert("GLU", CatalogReferenceRange::default())
            .expect_err("duplicate must fail");
        assert!(matches!(err, LabError::DuplicateTableEntry(code) if code == "GLU"));
    }

    #[test]
    fn builtin_catalog_is_internally_consistent() {
        let catalog = RangeCatalog::builtin();
        assert!(!catalog.is_empty());
        catalog.validate().expect("builtin catalog must validate");
    }
}
