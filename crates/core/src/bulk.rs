//! Bulk validation.
//!
//! Applies a validation decision to many (order, test) pairs in one pass.
//! Best-effort batching: each item is processed independently and one item's
//! failure neither aborts nor rolls back any other item.
//!
//! Call-boundary contract: items carrying critical values are expected to be
//! excluded by the caller before invocation. The processor does not
//! re-derive criticality — re-filtering here would hide caller bugs behind a
//! second, possibly diverging filter. It still fails any individual item
//! whose lifecycle state cannot be validated.

use crate::model::Order;
use crate::{test_lifecycle, LabError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One (order, test) pair to validate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkValidationItem {
    pub order_id: String,
    pub test_code: String,
}

/// Per-item outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub order_id: String,
    pub test_code: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch report. `results` always has exactly one entry per requested item,
/// so callers can distinguish "0 requested" from "all requested failed" from
/// partial success.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BulkValidationReport {
    pub results: Vec<BulkItemResult>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BulkValidationReport {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.is_empty() && self.failure_count == 0
    }

    pub fn is_partial(&self) -> bool {
        self.success_count > 0 && self.failure_count > 0
    }
}

/// Validate every item against the supplied orders.
///
/// Orders are keyed by id; an item referencing a missing order or test fails
/// individually with [`LabError::UnknownOrder`]/[`LabError::UnknownTest`]
/// rendered into its `error` field.
pub fn validate_bulk(
    orders: &mut BTreeMap<String, Order>,
    items: &[BulkValidationItem],
    validated_by: &str,
    validation_notes: Option<&str>,
    validated_at: DateTime<Utc>,
) -> BulkValidationReport {
    let mut report = BulkValidationReport::default();

    for item in items {
        let outcome = validate_one(orders, item, validated_by, validation_notes, validated_at);
        match outcome {
            Ok(()) => {
                report.success_count += 1;
                report.results.push(BulkItemResult {
                    order_id: item.order_id.clone(),
                    test_code: item.test_code.clone(),
                    success: true,
                    error: None,
                });
            }
            Err(err) => {
                tracing::warn!(
                    order_id = %item.order_id,
                    test_code = %item.test_code,
                    error = %err,
                    "bulk validation item failed"
                );
                report.failure_count += 1;
                report.results.push(BulkItemResult {
                    order_id: item.order_id.clone(),
                    test_code: item.test_code.clone(),
                    success: false,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    report
}

fn validate_one(
    orders: &mut BTreeMap<String, Order>,
    item: &BulkValidationItem,
    validated_by: &str,
    validation_notes: Option<&str>,
    validated_at: DateTime<Utc>,
) -> Result<(), LabError> {
    let order = orders
        .get_mut(&item.order_id)
        .ok_or_else(|| LabError::UnknownOrder(item.order_id.clone()))?;

    let order_id = order.id.clone();
    let test = order
        .test_mut(&item.test_code)
        .ok_or_else(|| LabError::UnknownTest {
            order_id,
            test_code: item.test_code.clone(),
        })?;

    test_lifecycle::validate(
        test,
        validated_by,
        validation_notes.map(str::to_string),
        validated_at,
    )?;
    order.refresh_status();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderTest, ResultEntry, ResultValue};
    use lis_types::{OrderStatus, Priority, ResultFlag, TestStatus};

    fn resulted_order(id: &str, codes: &[&str]) -> Order {
        let tests = codes.iter().map(|c| OrderTest::new(*c)).collect();
        let mut order = Order::new(id, "pat-1", Utc::now(), Priority::Routine, tests);
        for code in codes {
            let test = order.test_mut(code).expect("test");
            test_lifecycle::collect(test, "S-1", Utc::now()).expect("collect");
            let mut results = BTreeMap::new();
            results.insert(
                code.to_string(),
                ResultEntry {
                    value: ResultValue::Numeric(1.0),
                    unit: None,
                    flag: ResultFlag::Normal,
                },
            );
            test_lifecycle::enter_results(test, results, None).expect("enter");
        }
        order.refresh_status();
        order
    }

    fn items(pairs: &[(&str, &str)]) -> Vec<BulkValidationItem> {
        pairs
            .iter()
            .map(|(o, t)| BulkValidationItem {
                order_id: o.to_string(),
                test_code: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn all_items_succeed() {
        let mut orders = BTreeMap::new();
        orders.insert("ord-1".to_string(), resulted_order("ord-1", &["K", "NA"]));

        let report = validate_bulk(
            &mut orders,
            &items(&[("ord-1", "K"), ("ord-1", "NA")]),
            "dr.osei",
            Some("batch approved"),
            Utc::now(),
        );

        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 0);
        assert_eq!(report.results.len(), 2);
        assert!(report.all_succeeded());

        let order = orders.get("ord-1").expect("order");
        assert_eq!(order.overall_status, OrderStatus::Completed);
        for test in &order.tests {
            assert_eq!(test.status, TestStatus::Validated);
            assert_eq!(test.validation_notes.as_deref(), Some("batch approved"));
        }
    }

    #[test]
    fn one_failure_does_not_abort_the_rest() {
        let mut orders = BTreeMap::new();
        orders.insert("ord-1".to_string(), resulted_order("ord-1", &["K"]));
        // ord-2's test is still ordered: validation must fail for it alone.
        orders.insert(
            "ord-2".to_string(),
            Order::new(
                "ord-2",
                "pat-2",
                Utc::now(),
                Priority::Routine,
                vec![OrderTest::new("GLU")],
            ),
        );

        let report = validate_bulk(
            &mut orders,
            &items(&[("ord-1", "K"), ("ord-2", "GLU")]),
            "dr.osei",
            None,
            Utc::now(),
        );

        assert_eq!(report.success_count, 1);
        assert_eq!(report.failure_count, 1);
        assert_eq!(report.results.len(), 2);
        assert!(report.is_partial());

        assert!(report.results[0].success);
        assert!(!report.results[1].success);
        assert!(report.results[1]
            .error
            .as_deref()
            .expect("error message")
            .contains("invalid transition"));

        // The successful item stuck.
        let validated = orders.get("ord-1").expect("order").test("K").expect("test");
        assert_eq!(validated.status, TestStatus::Validated);
    }

    #[test]
    fn n_minus_k_counting() {
        let mut orders = BTreeMap::new();
        orders.insert("ord-1".to_string(), resulted_order("ord-1", &["K", "NA"]));

        // 3 requested, 1 invalid (unknown order).
        let report = validate_bulk(
            &mut orders,
            &items(&[("ord-1", "K"), ("ord-1", "NA"), ("ord-9", "K")]),
            "dr.osei",
            None,
            Utc::now(),
        );
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 1);
    }

    #[test]
    fn empty_request_is_distinguishable_from_all_failed() {
        let mut orders = BTreeMap::new();
        let empty = validate_bulk(&mut orders, &[], "dr.osei", None, Utc::now());
        assert!(empty.is_empty());
        assert!(!empty.all_succeeded());

        let all_failed = validate_bulk(
            &mut orders,
            &items(&[("ord-9", "K")]),
            "dr.osei",
            None,
            Utc::now(),
        );
        assert!(!all_failed.is_empty());
        assert_eq!(all_failed.failure_count, 1);
        assert!(!all_failed.all_succeeded());
        assert!(!all_failed.is_partial());
    }

    #[test]
    fn already_validated_item_fails_individually() {
        let mut orders = BTreeMap::new();
        orders.insert("ord-1".to_string(), resulted_order("ord-1", &["K"]));

        let first = validate_bulk(
            &mut orders,
            &items(&[("ord-1", "K")]),
            "dr.osei",
            None,
            Utc::now(),
        );
        assert_eq!(first.success_count, 1);

        let second = validate_bulk(
            &mut orders,
            &items(&[("ord-1", "K")]),
            "dr.osei",
            None,
            Utc::now(),
        );
        assert_eq!(second.failure_count, 1);
    }
}
