//! Per-test lifecycle state machine.
//!
//! `ordered → collected → (in-progress) → resulted → validated | superseded`.
//!
//! Every transition validates its preconditions before mutating; an invalid
//! transition returns [`LabError::InvalidTransition`] and leaves the test
//! untouched. Superseding never deletes: the original test is retained with
//! status `superseded` and a successor is created alongside it.

use crate::model::{Order, OrderTest, ResultEntry};
use crate::{LabError, LabResult};
use chrono::{DateTime, Utc};
use lis_types::TestStatus;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Record that the specimen for this test was collected.
///
/// # Errors
///
/// Fails when the test is not in `ordered` status or the sample id is blank.
pub fn collect(test: &mut OrderTest, sample_id: &str, _collected_at: DateTime<Utc>) -> LabResult<()> {
    if sample_id.trim().is_empty() {
        return Err(LabError::Validation(
            "sample collection requires a sample identifier".into(),
        ));
    }
    require_status(test, &[TestStatus::Ordered], TestStatus::Collected)?;

    test.sample_id = Some(sample_id.trim().to_string());
    test.status = TestStatus::Collected;
    Ok(())
}

/// Mark the test as being worked on by the analyzer/bench.
pub fn start_processing(test: &mut OrderTest) -> LabResult<()> {
    require_status(test, &[TestStatus::Collected], TestStatus::InProgress)?;
    test.status = TestStatus::InProgress;
    Ok(())
}

/// Enter results for the test.
///
/// # Errors
///
/// Fails when the test is not in `collected`/`in-progress` status or the
/// results mapping is empty.
pub fn enter_results(
    test: &mut OrderTest,
    results: BTreeMap<String, ResultEntry>,
    technician_notes: Option<String>,
) -> LabResult<()> {
    if results.is_empty() {
        return Err(LabError::EmptyResults);
    }
    require_status(
        test,
        &[TestStatus::Collected, TestStatus::InProgress],
        TestStatus::Resulted,
    )?;

    test.results = results;
    test.technician_notes = technician_notes;
    test.status = TestStatus::Resulted;
    Ok(())
}

/// Approve the entered results.
///
/// # Errors
///
/// Fails when the test is not in `resulted` status or the validator identity
/// is blank.
pub fn validate(
    test: &mut OrderTest,
    validated_by: &str,
    validation_notes: Option<String>,
    validated_at: DateTime<Utc>,
) -> LabResult<()> {
    if validated_by.trim().is_empty() {
        return Err(LabError::Validation(
            "validation requires a validator identity".into(),
        ));
    }
    require_status(test, &[TestStatus::Resulted], TestStatus::Validated)?;

    test.validated_by = Some(validated_by.trim().to_string());
    test.validated_at = Some(validated_at);
    test.validation_notes = validation_notes;
    test.status = TestStatus::Validated;
    Ok(())
}

/// Release a validated test to the clinician-facing report.
pub fn report(test: &mut OrderTest) -> LabResult<()> {
    require_status(test, &[TestStatus::Validated], TestStatus::Reported)?;
    test.status = TestStatus::Reported;
    Ok(())
}

/// Supersede the active test with the given code and create its retest
/// successor on the same order.
///
/// The disputed test must be in `resulted` status. It is marked `superseded`
/// (never removed) and the successor is created with:
/// - `is_retest = true`,
/// - `original_test_id` pointing at the superseded test,
/// - `retest_number` one greater than the predecessor's,
/// - status `collected` when the sample id carries over, else `ordered`.
///
/// Returns the successor's id. The order's derived status is refreshed.
///
/// # Errors
///
/// Fails when the order has no active test with that code or the test is not
/// in `resulted` status; nothing is mutated on failure.
pub fn supersede_for_retest(order: &mut Order, test_code: &str) -> LabResult<Uuid> {
    let order_id = order.id.clone();
    let test = order
        .test_mut(test_code)
        .ok_or_else(|| LabError::UnknownTest {
            order_id,
            test_code: test_code.to_string(),
        })?;
    require_status(test, &[TestStatus::Resulted], TestStatus::Superseded)?;

    test.status = TestStatus::Superseded;
    let predecessor_id = test.id;
    let sample_id = test.sample_id.clone();
    let retest_number = test.retest_number + 1;

    let mut successor = OrderTest::new(test_code);
    successor.is_retest = true;
    successor.original_test_id = Some(predecessor_id);
    successor.retest_number = retest_number;
    successor.sample_id = sample_id.clone();
    successor.status = if sample_id.is_some() {
        TestStatus::Collected
    } else {
        TestStatus::Ordered
    };
    let successor_id = successor.id;

    order.tests.push(successor);
    order.refresh_status();

    tracing::debug!(
        order_id = %order.id,
        test_code,
        retest_number,
        "test superseded for retest"
    );

    Ok(successor_id)
}

fn require_status(test: &OrderTest, allowed: &[TestStatus], to: TestStatus) -> LabResult<()> {
    if allowed.contains(&test.status) {
        return Ok(());
    }
    Err(LabError::InvalidTransition {
        test_code: test.test_code.clone(),
        from: test.status,
        to,
    })
}
