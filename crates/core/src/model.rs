//! Domain model for orders, tests, and samples.
//!
//! These are plain value types; all state transitions go through the
//! lifecycle modules so their invariants hold everywhere. The one derived
//! field, [`Order::overall_status`], is refreshed from the aggregator and is
//! never mutated independently.

use crate::order_status;
use chrono::{DateTime, Utc};
use lis_types::{
    OrderStatus, PaymentStatus, Priority, RejectionType, ResultFlag, SampleStatus, TestStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One measured value for a result item (e.g. the `HGB` item of a CBC panel).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub value: ResultValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub flag: ResultFlag,
}

/// A raw result value. Text values (e.g. "positive") cannot be range-checked
/// and always classify as normal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    Numeric(f64),
    Text(String),
}

impl ResultValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            ResultValue::Numeric(v) => Some(*v),
            ResultValue::Text(_) => None,
        }
    }
}

/// One entry in a rejection history. Append-only: histories are never
/// truncated or edited, so the full collect → reject → recollect chain stays
/// reconstructable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub reason: String,
    pub rejection_type: RejectionType,
    pub rejected_by: String,
    pub rejected_at: DateTime<Utc>,
}

/// A single ordered laboratory test within an [`Order`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderTest {
    pub id: Uuid,
    pub test_code: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_id: Option<String>,
    #[serde(default)]
    pub results: BTreeMap<String, ResultEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_notes: Option<String>,
    #[serde(default)]
    pub rejection_history: Vec<RejectionRecord>,
    #[serde(default)]
    pub is_retest: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_test_id: Option<Uuid>,
    #[serde(default)]
    pub retest_number: u32,
}

impl OrderTest {
    /// A fresh test in `ordered` status, as created when an order is placed.
    pub fn new(test_code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            test_code: test_code.into(),
            status: TestStatus::Ordered,
            sample_id: None,
            results: BTreeMap::new(),
            technician_notes: None,
            validated_by: None,
            validated_at: None,
            validation_notes: None,
            rejection_history: Vec::new(),
            is_retest: false,
            original_test_id: None,
            retest_number: 0,
        }
    }

    pub fn is_superseded(&self) -> bool {
        self.status == TestStatus::Superseded
    }

    /// Whether any result item on this test carries a critical flag.
    pub fn has_critical_result(&self) -> bool {
        self.results.values().any(|entry| entry.flag.is_critical())
    }
}

/// A laboratory order: one patient, one or more tests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub patient_id: String,
    pub ordered_at: DateTime<Utc>,
    pub priority: Priority,
    pub tests: Vec<OrderTest>,
    /// Derived; refresh via [`Order::refresh_status`] after any test mutation.
    pub overall_status: OrderStatus,
    pub payment_status: PaymentStatus,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        patient_id: impl Into<String>,
        ordered_at: DateTime<Utc>,
        priority: Priority,
        tests: Vec<OrderTest>,
    ) -> Self {
        let mut order = Self {
            id: id.into(),
            patient_id: patient_id.into(),
            ordered_at,
            priority,
            tests,
            overall_status: OrderStatus::Ordered,
            payment_status: PaymentStatus::Pending,
        };
        order.refresh_status();
        order
    }

    /// Recompute `overall_status` from the contained tests' statuses.
    pub fn refresh_status(&mut self) {
        let statuses: Vec<TestStatus> = self.tests.iter().map(|t| t.status).collect();
        self.overall_status = order_status::aggregate(&statuses);
    }

    /// The active (non-superseded) test with the given code, if any.
    pub fn test(&self, test_code: &str) -> Option<&OrderTest> {
        self.tests
            .iter()
            .find(|t| t.test_code == test_code && !t.is_superseded())
    }

    /// Mutable variant of [`Order::test`].
    pub fn test_mut(&mut self, test_code: &str) -> Option<&mut OrderTest> {
        self.tests
            .iter_mut()
            .find(|t| t.test_code == test_code && !t.is_superseded())
    }

    /// Whether any test on this order has been validated. Recollection is
    /// blocked once this is true.
    pub fn has_validated_test(&self) -> bool {
        self.tests.iter().any(|t| t.status == TestStatus::Validated)
    }

    /// Number of retests recorded in the lineage rooted at `original_id`,
    /// i.e. the highest `retest_number` among tests pointing at it.
    pub fn retest_count_for(&self, original_id: Uuid) -> u32 {
        self.tests
            .iter()
            .filter(|t| t.original_test_id == Some(original_id) || t.id == original_id)
            .map(|t| t.retest_number)
            .max()
            .unwrap_or(0)
    }

    /// Escalate the order priority, never downgrading.
    pub fn escalate_priority(&mut self, target: Priority) {
        self.priority = self.priority.escalate_to(target);
    }
}

/// A physical specimen linked to an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub order_id: String,
    pub status: SampleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_ml: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_sample_id: Option<String>,
    #[serde(default)]
    pub recollection_attempt: u32,
    #[serde(default)]
    pub rejection_history: Vec<RejectionRecord>,
}

impl Sample {
    /// A fresh specimen in `pending` status.
    pub fn new(id: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order_id: order_id.into(),
            status: SampleStatus::Pending,
            container: None,
            volume_ml: None,
            collected_by: None,
            collected_at: None,
            original_sample_id: None,
            recollection_attempt: 0,
            rejection_history: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_order_derives_status_from_tests() {
        let order = Order::new(
            "ord-1",
            "pat-1",
            Utc::now(),
            Priority::Routine,
            vec![OrderTest::new("CBC"), OrderTest::new("GLU")],
        );
        assert_eq!(order.overall_status, OrderStatus::Ordered);
    }

    #[test]
    fn test_lookup_skips_superseded_entries() {
        let mut original = OrderTest::new("CBC");
        original.status = TestStatus::Superseded;
        let mut retest = OrderTest::new("CBC");
        retest.is_retest = true;
        retest.original_test_id = Some(original.id);
        retest.retest_number = 1;
        let retest_id = retest.id;

        let order = Order::new(
            "ord-2",
            "pat-1",
            Utc::now(),
            Priority::Routine,
            vec![original, retest],
        );

        assert_eq!(order.test("CBC").expect("active test").id, retest_id);
    }

    #[test]
    fn retest_count_tracks_lineage_maximum() {
        let mut original = OrderTest::new("K");
        original.status = TestStatus::Superseded;
        let original_id = original.id;

        let mut first = OrderTest::new("K");
        first.status = TestStatus::Superseded;
        first.is_retest = true;
        first.original_test_id = Some(original_id);
        first.retest_number = 1;

        let mut second = OrderTest::new("K");
        second.is_retest = true;
        second.original_test_id = Some(original_id);
        second.retest_number = 2;

        let order = Order::new(
            "ord-3",
            "pat-1",
            Utc::now(),
            Priority::Routine,
            vec![original, first, second],
        );
        assert_eq!(order.retest_count_for(original_id), 2);
    }

    #[test]
    fn escalate_priority_never_downgrades() {
        let mut order = Order::new("ord-4", "pat-1", Utc::now(), Priority::Stat, vec![]);
        order.escalate_priority(Priority::Urgent);
        assert_eq!(order.priority, Priority::Stat);
    }

    #[test]
    fn critical_result_detection() {
        let mut test = OrderTest::new("K");
        test.results.insert(
            "K".into(),
            ResultEntry {
                value: ResultValue::Numeric(7.2),
                unit: Some("mmol/L".into()),
                flag: ResultFlag::Critical,
            },
        );
        assert!(test.has_critical_result());
    }
}
