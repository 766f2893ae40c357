//! Closed status vocabulary for the laboratory workflow.
//!
//! Every lifecycle entity (order, test, sample) has exactly one status enum,
//! defined here and nowhere else, so that status handling is exhaustive at
//! compile time. Parsing from wire strings fails loudly with [`StatusError`]
//! rather than defaulting: an unknown status value means the client and
//! backend schemas have drifted, which must never be papered over.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing status vocabulary from wire strings.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// The input was not a member of the `TestStatus` closed set.
    #[error("unknown test status: {0:?}")]
    UnknownTestStatus(String),
    /// The input was not a member of the `SampleStatus` closed set.
    #[error("unknown sample status: {0:?}")]
    UnknownSampleStatus(String),
    /// The input was not a member of the `OrderStatus` closed set.
    #[error("unknown order status: {0:?}")]
    UnknownOrderStatus(String),
    /// The input was not a member of the `Priority` closed set.
    #[error("unknown priority: {0:?}")]
    UnknownPriority(String),
    /// The input was not a member of the `RejectionType` closed set.
    #[error("unknown rejection type: {0:?}")]
    UnknownRejectionType(String),
}

/// Lifecycle status of a single ordered test.
///
/// `Superseded` marks a test that was rejected for retest and replaced by a
/// successor; such tests are retained for audit and never deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    Ordered,
    Collected,
    InProgress,
    Resulted,
    Validated,
    Completed,
    Reported,
    Rejected,
    Superseded,
}

impl TestStatus {
    /// Whether this status is terminal for order aggregation purposes
    /// (reported/rejected-equivalent).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TestStatus::Reported | TestStatus::Rejected | TestStatus::Superseded
        )
    }

    /// Wire name of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Ordered => "ordered",
            TestStatus::Collected => "collected",
            TestStatus::InProgress => "in-progress",
            TestStatus::Resulted => "resulted",
            TestStatus::Validated => "validated",
            TestStatus::Completed => "completed",
            TestStatus::Reported => "reported",
            TestStatus::Rejected => "rejected",
            TestStatus::Superseded => "superseded",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ordered" => Ok(TestStatus::Ordered),
            "collected" => Ok(TestStatus::Collected),
            "in-progress" => Ok(TestStatus::InProgress),
            "resulted" => Ok(TestStatus::Resulted),
            "validated" => Ok(TestStatus::Validated),
            "completed" => Ok(TestStatus::Completed),
            "reported" => Ok(TestStatus::Reported),
            "rejected" => Ok(TestStatus::Rejected),
            "superseded" => Ok(TestStatus::Superseded),
            other => Err(StatusError::UnknownTestStatus(other.to_string())),
        }
    }
}

/// Lifecycle status of a specimen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleStatus {
    Pending,
    Collected,
    Received,
    Rejected,
    RecollectionRequested,
}

impl SampleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleStatus::Pending => "pending",
            SampleStatus::Collected => "collected",
            SampleStatus::Received => "received",
            SampleStatus::Rejected => "rejected",
            SampleStatus::RecollectionRequested => "recollection-requested",
        }
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SampleStatus::Pending),
            "collected" => Ok(SampleStatus::Collected),
            "received" => Ok(SampleStatus::Received),
            "rejected" => Ok(SampleStatus::Rejected),
            "recollection-requested" => Ok(SampleStatus::RecollectionRequested),
            other => Err(StatusError::UnknownSampleStatus(other.to_string())),
        }
    }
}

/// Derived overall status of an order. Always computed from the statuses of
/// the order's tests, never stored or mutated independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Ordered,
    InProgress,
    Completed,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Ordered => "ordered",
            OrderStatus::InProgress => "in-progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ordered" => Ok(OrderStatus::Ordered),
            "in-progress" => Ok(OrderStatus::InProgress),
            "completed" => Ok(OrderStatus::Completed),
            "delivered" => Ok(OrderStatus::Delivered),
            other => Err(StatusError::UnknownOrderStatus(other.to_string())),
        }
    }
}

/// Order priority. Ordering is significant: escalation is monotonic, a later
/// event may raise the priority but never lower it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Routine,
    Urgent,
    Stat,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Routine => "routine",
            Priority::Urgent => "urgent",
            Priority::Stat => "stat",
        }
    }

    /// Monotonic escalation: returns the more severe of the two priorities.
    pub fn escalate_to(self, target: Priority) -> Priority {
        self.max(target)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "routine" => Ok(Priority::Routine),
            "urgent" => Ok(Priority::Urgent),
            "stat" => Ok(Priority::Stat),
            other => Err(StatusError::UnknownPriority(other.to_string())),
        }
    }
}

/// How a disputed result or specimen is to be handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionType {
    /// Re-run the test against the existing specimen.
    #[serde(rename = "re-test")]
    ReTest,
    /// The specimen itself is unusable; draw a new one.
    #[serde(rename = "re-collect")]
    ReCollect,
}

impl RejectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionType::ReTest => "re-test",
            RejectionType::ReCollect => "re-collect",
        }
    }
}

impl fmt::Display for RejectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RejectionType {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "re-test" => Ok(RejectionType::ReTest),
            "re-collect" => Ok(RejectionType::ReCollect),
            other => Err(StatusError::UnknownRejectionType(other.to_string())),
        }
    }
}

/// Classification of a numeric result against its reference range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFlag {
    Normal,
    Low,
    High,
    Critical,
}

impl ResultFlag {
    /// Whether the flag marks a result outside its reference range.
    pub fn is_abnormal(self) -> bool {
        matches!(self, ResultFlag::Low | ResultFlag::High | ResultFlag::Critical)
    }

    /// Whether the flag requires urgent clinician notification.
    pub fn is_critical(self) -> bool {
        matches!(self, ResultFlag::Critical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultFlag::Normal => "normal",
            ResultFlag::Low => "low",
            ResultFlag::High => "high",
            ResultFlag::Critical => "critical",
        }
    }
}

impl fmt::Display for ResultFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing state carried on an order. No workflow rule consumes it here;
/// it round-trips through the API for the billing surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Waived,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Waived => "waived",
        };
        f.write_str(s)
    }
}

/// Patient gender as used for reference range resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    /// Unknown or not disclosed; resolution falls through to the general range.
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_strings() {
        let all = [
            TestStatus::Ordered,
            TestStatus::Collected,
            TestStatus::InProgress,
            TestStatus::Resulted,
            TestStatus::Validated,
            TestStatus::Completed,
            TestStatus::Reported,
            TestStatus::Rejected,
            TestStatus::Superseded,
        ];
        for status in all {
            let parsed: TestStatus = status.as_str().parse().expect("round trip");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unknown_test_status_fails_loudly() {
        let err = "sample-collected".parse::<TestStatus>().expect_err("must fail");
        assert!(matches!(err, StatusError::UnknownTestStatus(s) if s == "sample-collected"));
    }

    #[test]
    fn terminal_statuses_are_reported_rejected_superseded() {
        assert!(TestStatus::Reported.is_terminal());
        assert!(TestStatus::Rejected.is_terminal());
        assert!(TestStatus::Superseded.is_terminal());
        assert!(!TestStatus::Validated.is_terminal());
        assert!(!TestStatus::Ordered.is_terminal());
    }

    #[test]
    fn priority_escalation_is_monotonic() {
        assert_eq!(Priority::Routine.escalate_to(Priority::Urgent), Priority::Urgent);
        assert_eq!(Priority::Stat.escalate_to(Priority::Urgent), Priority::Stat);
        assert_eq!(Priority::Urgent.escalate_to(Priority::Urgent), Priority::Urgent);
    }

    #[test]
    fn rejection_type_wire_names_use_hyphens() {
        assert_eq!(
            serde_json::to_string(&RejectionType::ReCollect).expect("serialize"),
            "\"re-collect\""
        );
        let parsed: RejectionType = serde_json::from_str("\"re-test\"").expect("deserialize");
        assert_eq!(parsed, RejectionType::ReTest);
    }

    #[test]
    fn result_flag_abnormality_predicates() {
        assert!(!ResultFlag::Normal.is_abnormal());
        assert!(ResultFlag::Low.is_abnormal());
        assert!(ResultFlag::High.is_abnormal());
        assert!(ResultFlag::Critical.is_abnormal());
        assert!(ResultFlag::Critical.is_critical());
        assert!(!ResultFlag::High.is_critical());
    }

    #[test]
    fn test_status_serde_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&TestStatus::InProgress).expect("serialize"),
            "\"in-progress\""
        );
        let parsed: TestStatus = serde_json::from_str("\"superseded\"").expect("deserialize");
        assert_eq!(parsed, TestStatus::Superseded);
    }
}
