//! Per-sample lifecycle state machine.
//!
//! `pending → collected → (received) → rejected | recollection-requested`.
//!
//! A `re-collect` rejection is the one multi-entity operation in the core:
//! the rejected sample gains exactly one successor, every test that
//! referenced it is repointed, and the order priority is escalated — all in
//! one call, with every guard checked before the first mutation so a failure
//! is always a no-op.

use crate::model::{Order, RejectionRecord, Sample};
use crate::{LabError, LabResult};
use chrono::{DateTime, Utc};
use lis_types::{Priority, RejectionType, SampleStatus, TestStatus};
use uuid::Uuid;

/// Record that the specimen was drawn.
pub fn collect(sample: &mut Sample, collected_by: &str, collected_at: DateTime<Utc>) -> LabResult<()> {
    if collected_by.trim().is_empty() {
        return Err(LabError::Validation(
            "sample collection requires a collector identity".into(),
        ));
    }
    require_status(sample, &[SampleStatus::Pending], SampleStatus::Collected)?;

    sample.collected_by = Some(collected_by.trim().to_string());
    sample.collected_at = Some(collected_at);
    sample.status = SampleStatus::Collected;
    Ok(())
}

/// Record that the lab received the specimen.
pub fn receive(sample: &mut Sample) -> LabResult<()> {
    require_status(sample, &[SampleStatus::Collected], SampleStatus::Received)?;
    sample.status = SampleStatus::Received;
    Ok(())
}

/// Reject the specimen without creating a successor.
///
/// Used for the terminal rejection of a chain (no further recollection) or
/// when the successor is created separately via [`reject_and_recollect`].
pub fn reject(sample: &mut Sample, record: RejectionRecord) -> LabResult<()> {
    require_status(
        sample,
        &[
            SampleStatus::Pending,
            SampleStatus::Collected,
            SampleStatus::Received,
            SampleStatus::RecollectionRequested,
        ],
        SampleStatus::Rejected,
    )?;

    sample.rejection_history.push(record);
    sample.status = SampleStatus::Rejected;
    Ok(())
}

/// Flag the specimen as needing recollection without rejecting it yet.
///
/// This is the interim state while the recollection decision awaits
/// confirmation; [`reject_and_recollect`] accepts samples in this state.
pub fn request_recollection(sample: &mut Sample) -> LabResult<()> {
    require_status(
        sample,
        &[SampleStatus::Collected, SampleStatus::Received],
        SampleStatus::RecollectionRequested,
    )?;
    sample.status = SampleStatus::RecollectionRequested;
    Ok(())
}

/// Reject the specimen and create its recollection successor.
///
/// In one operation:
/// - the sample transitions to `rejected` with the record appended,
/// - exactly one successor sample is created in `pending` status with
///   `original_sample_id` pointing back and `recollection_attempt + 1`,
/// - every test on the order that referenced the rejected sample is
///   repointed to the successor and reset to `ordered` (it awaits the new
///   draw), terminal tests excepted,
/// - the order priority is escalated to `urgent` (monotonic).
///
/// Returns the successor sample. All guards run before any mutation; a
/// failure leaves order and sample untouched.
///
/// # Errors
///
/// Fails when the sample does not belong to the order, when the order
/// already has validated tests (recollection would strand approved results
/// on a specimen declared unusable), or when the sample is not in a
/// rejectable state.
pub fn reject_and_recollect(
    order: &mut Order,
    sample: &mut Sample,
    record: RejectionRecord,
) -> LabResult<Sample> {
    if sample.order_id != order.id {
        return Err(LabError::ConstraintViolation(format!(
            "sample {} belongs to order {}, not order {}",
            sample.id, sample.order_id, order.id
        )));
    }
    if order.has_validated_test() {
        return Err(LabError::RejectionNotPermitted(
            RejectionType::ReCollect,
            format!(
                "order {} already has validated tests; recollection would invalidate them",
                order.id
            ),
        ));
    }
    let rejectable = matches!(
        sample.status,
        SampleStatus::Pending
            | SampleStatus::Collected
            | SampleStatus::Received
            | SampleStatus::RecollectionRequested
    );
    if !rejectable {
        return Err(LabError::InvalidSampleTransition {
            sample_id: sample.id.clone(),
            from: sample.status,
            to: SampleStatus::Rejected,
        });
    }

    // Guards passed; from here the whole operation applies.
    sample.rejection_history.push(record);
    sample.status = SampleStatus::Rejected;

    let mut successor = Sample::new(Uuid::new_v4().to_string(), order.id.clone());
    successor.container = sample.container.clone();
    successor.original_sample_id = Some(sample.id.clone());
    successor.recollection_attempt = sample.recollection_attempt + 1;

    for test in &mut order.tests {
        if test.sample_id.as_deref() == Some(sample.id.as_str()) && !test.status.is_terminal() {
            test.sample_id = Some(successor.id.clone());
            test.status = TestStatus::Ordered;
        }
    }

    order.escalate_priority(Priority::Urgent);
    order.refresh_status();

    tracing::info!(
        order_id = %order.id,
        rejected_sample = %sample.id,
        successor_sample = %successor.id,
        attempt = successor.recollection_attempt,
        "sample rejected for recollection"
    );

    Ok(successor)
}

fn require_status(sample: &Sample, allowed: &[SampleStatus], to: SampleStatus) -> LabResult<()> {
    if allowed.contains(&sample.status) {
        return Ok(());
    }
    Err(LabError::InvalidSampleTransition {
        sample_id: sample.id.clone(),
        from: sample.status,
        to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderTest;
    use crate::test_lifecycle;
    use lis_types::RejectionType;

    fn record(rtype: RejectionType) -> RejectionRecord {
        RejectionRecord {
            reason: "hemolyzed specimen".into(),
            rejection_type: rtype,
            rejected_by: "tech.amara".into(),
            rejected_at: Utc::now(),
        }
    }

    fn collected_sample(order_id: &str) -> Sample {
        let mut sample = Sample::new("S-1", order_id);
        collect(&mut sample, "tech.amara", Utc::now()).expect("collect");
        sample
    }

    #[test]
    fn happy_path_pending_to_received() {
        let mut sample = Sample::new("S-1", "ord-1");
        collect(&mut sample, "tech.amara", Utc::now()).expect("collect");
        assert_eq!(sample.status, SampleStatus::Collected);
        receive(&mut sample).expect("receive");
        assert_eq!(sample.status, SampleStatus::Received);
    }

    #[test]
    fn cannot_receive_uncollected_sample() {
        let mut sample = Sample::new("S-1", "ord-1");
        let err = receive(&mut sample).expect_err("pending cannot be received");
        assert!(matches!(
            err,
            LabError::InvalidSampleTransition {
                from: SampleStatus::Pending,
                to: SampleStatus::Received,
                ..
            }
        ));
    }

    #[test]
    fn reject_appends_to_history() {
        let mut sample = collected_sample("ord-1");
        reject(&mut sample, record(RejectionType::ReTest)).expect("reject");
        assert_eq!(sample.status, SampleStatus::Rejected);
        assert_eq!(sample.rejection_history.len(), 1);

        // Already rejected: a second rejection is an invalid transition and
        // must not touch the history.
        let err = reject(&mut sample, record(RejectionType::ReTest)).expect_err("double reject");
        assert!(matches!(err, LabError::InvalidSampleTransition { .. }));
        assert_eq!(sample.rejection_history.len(), 1);
    }

    #[test]
    fn recollect_creates_backlinked_successor_and_escalates() {
        let mut order = Order::new(
            "ord-1",
            "pat-1",
            Utc::now(),
            Priority::Routine,
            vec![OrderTest::new("K"), OrderTest::new("NA")],
        );
        for code in ["K", "NA"] {
            let test = order.test_mut(code).expect("test");
            test_lifecycle::collect(test, "S-1", Utc::now()).expect("collect test");
        }
        let mut sample = collected_sample("ord-1");

        let successor =
            reject_and_recollect(&mut order, &mut sample, record(RejectionType::ReCollect))
                .expect("recollect");

        assert_eq!(sample.status, SampleStatus::Rejected);
        assert_eq!(successor.status, SampleStatus::Pending);
        assert_eq!(successor.original_sample_id.as_deref(), Some("S-1"));
        assert_eq!(successor.recollection_attempt, 1);
        assert_eq!(order.priority, Priority::Urgent);

        // Every test that pointed at S-1 now points at the successor and
        // awaits the new draw.
        for code in ["K", "NA"] {
            let test = order.test(code).expect("test");
            assert_eq!(test.sample_id.as_deref(), Some(successor.id.as_str()));
            assert_eq!(test.status, TestStatus::Ordered);
        }
    }

    #[test]
    fn recollect_does_not_downgrade_stat_priority() {
        let mut order = Order::new("ord-1", "pat-1", Utc::now(), Priority::Stat, vec![]);
        let mut sample = collected_sample("ord-1");
        reject_and_recollect(&mut order, &mut sample, record(RejectionType::ReCollect))
            .expect("recollect");
        assert_eq!(order.priority, Priority::Stat);
    }

    #[test]
    fn recollect_chain_increments_attempt() {
        let mut order = Order::new("ord-1", "pat-1", Utc::now(), Priority::Routine, vec![]);
        let mut first = collected_sample("ord-1");

        let mut second =
            reject_and_recollect(&mut order, &mut first, record(RejectionType::ReCollect))
                .expect("first recollect");
        collect(&mut second, "tech.amara", Utc::now()).expect("collect successor");

        let third =
            reject_and_recollect(&mut order, &mut second, record(RejectionType::ReCollect))
                .expect("second recollect");
        assert_eq!(third.recollection_attempt, 2);
        assert_eq!(third.original_sample_id.as_deref(), Some(second.id.as_str()));
    }

    #[test]
    fn recollect_is_blocked_after_validation_without_mutation() {
        let mut order = Order::new(
            "ord-1",
            "pat-1",
            Utc::now(),
            Priority::Routine,
            vec![OrderTest::new("K")],
        );
        {
            let test = order.test_mut("K").expect("test");
            test.sample_id = Some("S-1".into());
            test.status = TestStatus::Validated;
        }
        order.refresh_status();
        let mut sample = collected_sample("ord-1");
        let order_before = order.clone();
        let sample_before = sample.clone();

        let err = reject_and_recollect(&mut order, &mut sample, record(RejectionType::ReCollect))
            .expect_err("validated results must block recollection");
        assert!(matches!(
            err,
            LabError::RejectionNotPermitted(RejectionType::ReCollect, _)
        ));

        // No-op on failure: the approval survives, nothing is repointed and
        // no successor exists.
        assert_eq!(order, order_before);
        assert_eq!(sample, sample_before);
        assert_eq!(order.test("K").expect("test").status, TestStatus::Validated);
    }

    #[test]
    fn recollect_rejects_foreign_sample_without_mutation() {
        let mut order = Order::new("ord-1", "pat-1", Utc::now(), Priority::Routine, vec![]);
        let mut sample = collected_sample("ord-2");
        let order_before = order.clone();
        let sample_before = sample.clone();

        let err = reject_and_recollect(&mut order, &mut sample, record(RejectionType::ReCollect))
            .expect_err("foreign sample");
        assert!(matches!(err, LabError::ConstraintViolation(_)));
        assert_eq!(order, order_before);
        assert_eq!(sample, sample_before);
    }

    #[test]
    fn request_recollection_is_an_interim_state() {
        let mut sample = collected_sample("ord-1");
        request_recollection(&mut sample).expect("request");
        assert_eq!(sample.status, SampleStatus::RecollectionRequested);

        let mut order = Order::new("ord-1", "pat-1", Utc::now(), Priority::Routine, vec![]);
        reject_and_recollect(&mut order, &mut sample, record(RejectionType::ReCollect))
            .expect("recollect from interim state");
        assert_eq!(sample.status, SampleStatus::Rejected);
    }

    #[test]
    fn terminal_tests_keep_their_sample_reference() {
        let mut order = Order::new(
            "ord-1",
            "pat-1",
            Utc::now(),
            Priority::Routine,
            vec![OrderTest::new("K")],
        );
        {
            let test = order.test_mut("K").expect("test");
            test.sample_id = Some("S-1".into());
            test.status = TestStatus::Rejected;
        }
        let mut sample = collected_sample("ord-1");
        reject_and_recollect(&mut order, &mut sample, record(RejectionType::ReCollect))
            .expect("recollect");

        // The rejected test is audit history; its pointer stays on the
        // original specimen.
        let test = &order.tests[0];
        assert_eq!(test.sample_id.as_deref(), Some("S-1"));
    }
}
