//! Reference range evaluation.
//!
//! Classifies a numeric result as normal/low/high/critical. Two input paths:
//!
//! - a legacy range expression string (`"<X"`, `">X"`, `"A-B"`), or
//! - a structured [`CatalogReferenceRange`] plus optional patient
//!   demographics, where explicit critical bounds are checked first and a
//!   demographic-specific band is resolved before the interval rule runs.
//!
//! The escalation rule is shared by both paths: a value below half the lower
//! bound, or above one-and-a-half times the upper bound, is critical rather
//! than merely low/high.

use crate::catalog::{CatalogReferenceRange, RangeBand};
use crate::constants::{ADULT_AGE_YEARS, CRITICAL_HIGH_FACTOR, CRITICAL_LOW_FACTOR};
use crate::demographics::PatientDemographics;
use chrono::NaiveDate;
use lis_types::{Gender, ResultFlag};

/// Bounds recovered from a legacy range expression. At least one side is set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParsedRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Parse a legacy range expression.
///
/// Recognised forms: `"<X"` (upper bound only), `">X"` (lower bound only),
/// `"A-B"` (closed interval). Anything else — including textual ranges like
/// `"negative"` — returns `None`: such values cannot be numerically
/// validated.
pub fn parse_range_expression(expression: &str) -> Option<ParsedRange> {
    let expr = expression.trim();

    if let Some(rest) = expr.strip_prefix('<') {
        let max = rest.trim().parse::<f64>().ok()?;
        return Some(ParsedRange {
            min: None,
            max: Some(max),
        });
    }

    if let Some(rest) = expr.strip_prefix('>') {
        let min = rest.trim().parse::<f64>().ok()?;
        return Some(ParsedRange {
            min: Some(min),
            max: None,
        });
    }

    // "A-B": split on the first '-' that is not a leading sign.
    let split_at = expr.char_indices().skip(1).find(|(_, c)| *c == '-')?.0;
    let low = expr[..split_at].trim().parse::<f64>().ok()?;
    let high = expr[split_at + 1..].trim().parse::<f64>().ok()?;
    Some(ParsedRange {
        min: Some(low),
        max: Some(high),
    })
}

/// Classify `value` against optional bounds with critical escalation.
///
/// - below `min`: low, or critical when `value < min * 0.5`
/// - above `max`: high, or critical when `value > max * 1.5`
/// - otherwise normal
pub fn classify_bounds(value: f64, min: Option<f64>, max: Option<f64>) -> ResultFlag {
    if let Some(min) = min {
        if value < min {
            if value < min * CRITICAL_LOW_FACTOR {
                return ResultFlag::Critical;
            }
            return ResultFlag::Low;
        }
    }

    if let Some(max) = max {
        if value > max {
            if value > max * CRITICAL_HIGH_FACTOR {
                return ResultFlag::Critical;
            }
            return ResultFlag::High;
        }
    }

    ResultFlag::Normal
}

/// Classify `value` against a legacy range expression.
///
/// Non-numeric expressions classify as normal: there is nothing to validate
/// against, and flagging would be noise.
pub fn classify_against_expression(value: f64, expression: &str) -> ResultFlag {
    match parse_range_expression(expression) {
        Some(range) => classify_bounds(value, range.min, range.max),
        None => ResultFlag::Normal,
    }
}

/// Resolve the demographic-specific band for a patient.
///
/// Resolution order: gender-specific band → pediatric band when the patient
/// is under 18 on `as_of` → general band → none. Without demographics only
/// the general band can apply.
pub fn resolve_band(
    range: &CatalogReferenceRange,
    demographics: Option<&PatientDemographics>,
    as_of: NaiveDate,
) -> Option<RangeBand> {
    if let Some(demo) = demographics {
        let gender_band = match demo.gender {
            Gender::Male => range.adult_male,
            Gender::Female => range.adult_female,
            Gender::Other => None,
        };
        if let Some(band) = gender_band {
            return Some(band);
        }

        if demo.age_in_years(as_of) < ADULT_AGE_YEARS {
            if let Some(band) = range.pediatric {
                return Some(band);
            }
        }
    }

    range.adult_general
}

/// Evaluate a numeric result against a structured catalog range.
///
/// Explicit `critical_low`/`critical_high` bounds are checked first: crossing
/// either is critical even if the demographic band alone would call the value
/// merely low or high. With no applicable band and no crossed critical bound
/// the value classifies as normal.
pub fn evaluate(
    value: f64,
    range: &CatalogReferenceRange,
    demographics: Option<&PatientDemographics>,
    as_of: NaiveDate,
) -> ResultFlag {
    if let Some(critical_low) = range.critical_low {
        if value <= critical_low {
            return ResultFlag::Critical;
        }
    }
    if let Some(critical_high) = range.critical_high {
        if value >= critical_high {
            return ResultFlag::Critical;
        }
    }

    match resolve_band(range, demographics, as_of) {
        Some(band) => classify_bounds(value, Some(band.low), Some(band.high)),
        None => ResultFlag::Normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RangeCatalog;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn parses_closed_interval() {
        assert_eq!(
            parse_range_expression("4.0-5.0"),
            Some(ParsedRange {
                min: Some(4.0),
                max: Some(5.0)
            })
        );
        assert_eq!(
            parse_range_expression(" 70 - 100 "),
            Some(ParsedRange {
                min: Some(70.0),
                max: Some(100.0)
            })
        );
    }

    #[test]
    fn parses_one_sided_bounds() {
        assert_eq!(
            parse_range_expression("<5.0"),
            Some(ParsedRange {
                min: None,
                max: Some(5.0)
            })
        );
        assert_eq!(
            parse_range_expression(">0.5"),
            Some(ParsedRange {
                min: Some(0.5),
                max: None
            })
        );
    }

    #[test]
    fn parses_negative_lower_bound() {
        assert_eq!(
            parse_range_expression("-2.0-2.0"),
            Some(ParsedRange {
                min: Some(-2.0),
                max: Some(2.0)
            })
        );
    }

    #[test]
    fn non_numeric_expression_classifies_normal() {
        assert_eq!(parse_range_expression("negative"), None);
        assert_eq!(classify_against_expression(3.0, "negative"), ResultFlag::Normal);
        assert_eq!(classify_against_expression(3.0, ""), ResultFlag::Normal);
    }

    #[test]
    fn interval_classification_boundary_grid() {
        // Range [4.0, 8.0]: escalation thresholds at 2.0 and 12.0.
        let classify = |v: f64| classify_bounds(v, Some(4.0), Some(8.0));

        assert_eq!(classify(1.9), ResultFlag::Critical); // v < min*0.5
        assert_eq!(classify(2.0), ResultFlag::Low); // v == min*0.5
        assert_eq!(classify(3.9), ResultFlag::Low); // min*0.5 <= v < min
        assert_eq!(classify(4.0), ResultFlag::Normal); // v == min
        assert_eq!(classify(6.0), ResultFlag::Normal);
        assert_eq!(classify(8.0), ResultFlag::Normal); // v == max
        assert_eq!(classify(8.1), ResultFlag::High); // max < v <= max*1.5
        assert_eq!(classify(12.0), ResultFlag::High); // v == max*1.5
        assert_eq!(classify(12.1), ResultFlag::Critical); // v > max*1.5
    }

    #[test]
    fn upper_bound_only_expression_never_flags_low() {
        assert_eq!(classify_against_expression(0.0, "<5.0"), ResultFlag::Normal);
        assert_eq!(classify_against_expression(6.0, "<5.0"), ResultFlag::High);
        assert_eq!(classify_against_expression(7.5, "<5.0"), ResultFlag::High);
        assert_eq!(classify_against_expression(7.6, "<5.0"), ResultFlag::Critical);
    }

    #[test]
    fn lower_bound_only_expression_never_flags_high() {
        assert_eq!(classify_against_expression(100.0, ">0.5"), ResultFlag::Normal);
        assert_eq!(classify_against_expression(0.3, ">0.5"), ResultFlag::Low);
        assert_eq!(classify_against_expression(0.2, ">0.5"), ResultFlag::Critical);
    }

    #[test]
    fn explicit_critical_bound_beats_demographic_band() {
        // Catalog range 4.0-5.0 with critical_high 5.0: a value of 6.0 is
        // critical, not merely high.
        let range = CatalogReferenceRange {
            adult_general: Some(RangeBand { low: 4.0, high: 5.0 }),
            critical_high: Some(5.0),
            ..Default::default()
        };
        assert_eq!(evaluate(6.0, &range, None, date(2026, 8, 29)), ResultFlag::Critical);
    }

    #[test]
    fn pediatric_band_applies_under_18() {
        let range = CatalogReferenceRange {
            pediatric: Some(RangeBand { low: 2.0, high: 8.0 }),
            adult_general: Some(RangeBand { low: 4.0, high: 10.0 }),
            ..Default::default()
        };
        let child = PatientDemographics::new(Gender::Other, date(2016, 1, 1));
        let as_of = date(2026, 8, 29); // age 10

        // 3.0 is below the adult general band but inside the pediatric one.
        assert_eq!(evaluate(3.0, &range, Some(&child), as_of), ResultFlag::Normal);
        // 9.0 is inside the adult band but above the pediatric one.
        assert_eq!(evaluate(9.0, &range, Some(&child), as_of), ResultFlag::High);
    }

    #[test]
    fn gender_band_wins_over_pediatric_and_general() {
        let range = CatalogReferenceRange {
            adult_female: Some(RangeBand { low: 12.0, high: 15.5 }),
            pediatric: Some(RangeBand { low: 11.0, high: 14.5 }),
            adult_general: Some(RangeBand { low: 13.0, high: 17.0 }),
            ..Default::default()
        };
        // A 16-year-old female: the gender band applies before the pediatric one.
        let patient = PatientDemographics::new(Gender::Female, date(2010, 6, 1));
        let as_of = date(2026, 8, 29);
        assert_eq!(evaluate(15.0, &range, Some(&patient), as_of), ResultFlag::Normal);
        assert_eq!(evaluate(11.5, &range, Some(&patient), as_of), ResultFlag::Low);
    }

    #[test]
    fn no_demographics_falls_back_to_general_band() {
        let range = CatalogReferenceRange {
            adult_male: Some(RangeBand { low: 13.5, high: 17.5 }),
            adult_general: Some(RangeBand { low: 12.0, high: 17.0 }),
            ..Default::default()
        };
        assert_eq!(evaluate(12.5, &range, None, date(2026, 8, 29)), ResultFlag::Normal);
    }

    #[test]
    fn no_applicable_band_classifies_normal() {
        let range = CatalogReferenceRange {
            adult_male: Some(RangeBand { low: 13.5, high: 17.5 }),
            ..Default::default()
        };
        let patient = PatientDemographics::new(Gender::Female, date(1990, 1, 1));
        assert_eq!(
            evaluate(1.0, &range, Some(&patient), date(2026, 8, 29)),
            ResultFlag::Normal
        );
    }

    #[test]
    fn builtin_catalog_glucose_scenarios() {
        let catalog = RangeCatalog::builtin();
        let glu = catalog.get("GLU").expect("GLU entry");
        let as_of = date(2026, 8, 29);

        assert_eq!(evaluate(85.0, glu, None, as_of), ResultFlag::Normal);
        assert_eq!(evaluate(110.0, glu, None, as_of), ResultFlag::High);
        assert_eq!(evaluate(39.0, glu, None, as_of), ResultFlag::Critical);
        assert_eq!(evaluate(500.0, glu, None, as_of), ResultFlag::Critical);
    }
}
