//! Constants used throughout the workflow core.
//!
//! All thresholds that encode clinical policy live here so they can be
//! audited in one place.

/// A value below `min * CRITICAL_LOW_FACTOR` escalates a low result to critical.
pub const CRITICAL_LOW_FACTOR: f64 = 0.5;

/// A value above `max * CRITICAL_HIGH_FACTOR` escalates a high result to critical.
pub const CRITICAL_HIGH_FACTOR: f64 = 1.5;

/// Patients younger than this (in whole years) resolve to the pediatric range.
pub const ADULT_AGE_YEARS: u32 = 18;

/// Maximum number of retests permitted in one test lineage before escalation
/// is forced.
pub const MAX_RETESTS_PER_LINEAGE: u32 = 3;

/// Maximum number of recollections permitted in one sample chain before
/// escalation is forced.
pub const MAX_RECOLLECTIONS_PER_CHAIN: u32 = 2;
