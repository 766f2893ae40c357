//! Worklist queries.
//!
//! The pending-entry and pending-validation worklists feed the technician
//! and pathologist screens. Exclusion of superseded tests is an invariant of
//! these queries, not a display filter: a superseded test can never reappear
//! in either list.

use crate::model::{Order, OrderTest};
use lis_types::TestStatus;

/// One worklist row: a test plus the order it belongs to.
#[derive(Clone, Copy, Debug)]
pub struct WorkItem<'a> {
    pub order_id: &'a str,
    pub patient_id: &'a str,
    pub test: &'a OrderTest,
}

/// Tests awaiting result entry: collected or on the bench, not superseded.
pub fn pending_entry<'a, I>(orders: I) -> Vec<WorkItem<'a>>
where
    I: IntoIterator<Item = &'a Order>,
{
    filter_tests(orders, &[TestStatus::Collected, TestStatus::InProgress])
}

/// Tests awaiting approval: resulted, not superseded.
pub fn pending_validation<'a, I>(orders: I) -> Vec<WorkItem<'a>>
where
    I: IntoIterator<Item = &'a Order>,
{
    filter_tests(orders, &[TestStatus::Resulted])
}

fn filter_tests<'a, I>(orders: I, statuses: &[TestStatus]) -> Vec<WorkItem<'a>>
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut items = Vec::new();
    for order in orders {
        for test in &order.tests {
            if test.is_superseded() {
                continue;
            }
            if statuses.contains(&test.status) {
                items.push(WorkItem {
                    order_id: &order.id,
                    patient_id: &order.patient_id,
                    test,
                });
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderTest, ResultEntry, ResultValue};
    use crate::test_lifecycle;
    use chrono::Utc;
    use lis_types::{Priority, ResultFlag};
    use std::collections::BTreeMap;

    fn sample_orders() -> Vec<Order> {
        let mut order = Order::new(
            "ord-1",
            "pat-1",
            Utc::now(),
            Priority::Routine,
            vec![OrderTest::new("K"), OrderTest::new("GLU"), OrderTest::new("HGB")],
        );
        {
            let test = order.test_mut("K").expect("K");
            test_lifecycle::collect(test, "S-1", Utc::now()).expect("collect");
        }
        {
            let test = order.test_mut("GLU").expect("GLU");
            test_lifecycle::collect(test, "S-1", Utc::now()).expect("collect");
            let mut results = BTreeMap::new();
            results.insert(
                "GLU".to_string(),
                ResultEntry {
                    value: ResultValue::Numeric(85.0),
                    unit: None,
                    flag: ResultFlag::Normal,
                },
            );
            test_lifecycle::enter_results(test, results, None).expect("enter");
        }
        order.refresh_status();
        vec![order]
    }

    #[test]
    fn pending_entry_lists_collected_tests_only() {
        let orders = sample_orders();
        let items = pending_entry(&orders);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].test.test_code, "K");
        assert_eq!(items[0].order_id, "ord-1");
    }

    #[test]
    fn pending_validation_lists_resulted_tests_only() {
        let orders = sample_orders();
        let items = pending_validation(&orders);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].test.test_code, "GLU");
    }

    #[test]
    fn superseded_tests_never_appear() {
        let mut orders = sample_orders();
        test_lifecycle::supersede_for_retest(&mut orders[0], "GLU").expect("supersede");

        // The superseded original is resulted-shaped history; the successor
        // (collected) appears in pending-entry instead.
        let validation = pending_validation(&orders);
        assert!(validation.is_empty());

        let entry = pending_entry(&orders);
        let codes: Vec<&str> = entry.iter().map(|i| i.test.test_code.as_str()).collect();
        assert_eq!(codes, vec!["K", "GLU"]);
        assert!(entry.iter().all(|i| !i.test.is_superseded()));
    }
}
