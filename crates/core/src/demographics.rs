//! Patient demographics as needed for reference range resolution.

use chrono::{Datelike, NaiveDate};
use lis_types::Gender;
use serde::{Deserialize, Serialize};

/// The demographic facts that influence which reference range applies.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatientDemographics {
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
}

impl PatientDemographics {
    pub fn new(gender: Gender, date_of_birth: NaiveDate) -> Self {
        Self {
            gender,
            date_of_birth,
        }
    }

    /// Age in completed years on `as_of`, using calendar year/month/day
    /// arithmetic. Dividing day counts by 365 drifts around leap years and
    /// misclassifies patients near the pediatric boundary.
    pub fn age_in_years(&self, as_of: NaiveDate) -> u32 {
        age_in_years(self.date_of_birth, as_of)
    }
}

/// Completed years between `date_of_birth` and `as_of`.
///
/// The year difference is reduced by one when the birthday has not yet
/// occurred in the `as_of` year. A birth date in the future yields zero.
pub fn age_in_years(date_of_birth: NaiveDate, as_of: NaiveDate) -> u32 {
    if as_of < date_of_birth {
        return 0;
    }

    let mut years = as_of.year() - date_of_birth.year();
    let birthday_passed = (as_of.month(), as_of.day()) >= (date_of_birth.month(), date_of_birth.day());
    if !birthday_passed {
        years -= 1;
    }

    years.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn age_counts_completed_years_only() {
        let dob = date(2008, 6, 15);
        assert_eq!(age_in_years(dob, date(2026, 6, 14)), 17);
        assert_eq!(age_in_years(dob, date(2026, 6, 15)), 18);
        assert_eq!(age_in_years(dob, date(2026, 6, 16)), 18);
    }

    #[test]
    fn age_handles_leap_day_birth() {
        let dob = date(2008, 2, 29);
        // Feb 28 in a non-leap year: birthday not yet reached.
        assert_eq!(age_in_years(dob, date(2026, 2, 28)), 17);
        assert_eq!(age_in_years(dob, date(2026, 3, 1)), 18);
    }

    #[test]
    fn age_is_zero_for_future_birth_date() {
        let dob = date(2030, 1, 1);
        assert_eq!(age_in_years(dob, date(2026, 1, 1)), 0);
    }

    #[test]
    fn age_is_not_divide_by_365() {
        // 10 calendar years spanning two leap days: day-count division by 365
        // would claim the birthday has passed before it has.
        let dob = date(2016, 3, 1);
        assert_eq!(age_in_years(dob, date(2026, 2, 28)), 9);
        assert_eq!(age_in_years(dob, date(2026, 3, 1)), 10);
    }
}
