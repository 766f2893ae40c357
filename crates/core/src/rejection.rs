//! Rejection workflow.
//!
//! Orchestrates the test and sample state machines to implement the
//! `re-test` vs `re-collect` decision when a human disputes a result or a
//! specimen. Every guard runs before the first mutation, so a failed
//! rejection is always a no-op, and every successful rejection appends
//! exactly one [`RejectionRecord`] to the relevant history.

use crate::config::CoreConfig;
use crate::model::{Order, RejectionRecord, Sample};
use crate::{sample_lifecycle, test_lifecycle, LabError, LabResult};
use chrono::{DateTime, Utc};
use lis_types::{OrderStatus, RejectionType, TestStatus};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// What a completed rejection produced. Carries enough for the caller to
/// refresh its view of the order without re-deriving anything.
#[derive(Clone, Debug, Serialize)]
pub struct RejectionOutcome {
    pub rejection_type: RejectionType,
    /// Successor test id (re-test path only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_test_id: Option<Uuid>,
    /// Successor sample (re-collect path only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_sample: Option<Sample>,
    /// The order's derived status after the rejection.
    pub order_status: OrderStatus,
}

/// Remaining-attempt report, consulted before offering the rejection UI.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct RejectionOptions {
    pub retests_remaining: u32,
    pub recollections_remaining: u32,
    /// Recollection is blocked because the order already has validated tests.
    pub recollect_blocked: bool,
    /// No rejection path remains; the dispute must be escalated manually.
    pub escalation_required: bool,
}

/// Orchestrates test/sample rejections under the configured attempt ceilings.
#[derive(Clone)]
pub struct RejectionWorkflow {
    cfg: Arc<CoreConfig>,
}

impl RejectionWorkflow {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    /// Reject a disputed result (`re-test`) or specimen (`re-collect`).
    ///
    /// Re-test supersedes the disputed test and creates its successor on the
    /// same specimen; the sample is not touched. Re-collect rejects the
    /// specimen, creates the recollection successor, repoints affected tests
    /// and escalates the order to urgent; it requires the sample to be
    /// passed in.
    ///
    /// # Errors
    ///
    /// - [`LabError::Validation`] when reason or actor is blank.
    /// - [`LabError::ConstraintViolation`] when `re-collect` is requested
    ///   after a test on the order was validated (never silently downgraded
    ///   to `re-test`), when the sample is missing, or when the attempt
    ///   ceiling for the requested path is exhausted.
    /// - [`LabError::InvalidTransition`] when the disputed test is not in
    ///   `resulted` status (re-test path).
    ///
    /// Nothing is mutated on any error.
    pub fn reject(
        &self,
        order: &mut Order,
        sample: Option<&mut Sample>,
        test_code: &str,
        reason: &str,
        rejection_type: RejectionType,
        rejected_by: &str,
        rejected_at: DateTime<Utc>,
    ) -> LabResult<RejectionOutcome> {
        if reason.trim().is_empty() {
            return Err(LabError::Validation("rejection requires a reason".into()));
        }
        if rejected_by.trim().is_empty() {
            return Err(LabError::Validation("rejection requires an actor".into()));
        }

        let record = RejectionRecord {
            reason: reason.trim().to_string(),
            rejection_type,
            rejected_by: rejected_by.trim().to_string(),
            rejected_at,
        };

        match rejection_type {
            RejectionType::ReTest => self.reject_for_retest(order, test_code, record),
            RejectionType::ReCollect => self.reject_for_recollect(order, sample, test_code, record),
        }
    }

    fn reject_for_retest(
        &self,
        order: &mut Order,
        test_code: &str,
        record: RejectionRecord,
    ) -> LabResult<RejectionOutcome> {
        let order_id = order.id.clone();
        let test = order.test(test_code).ok_or_else(|| LabError::UnknownTest {
            order_id,
            test_code: test_code.to_string(),
        })?;

        if test.retest_number >= self.cfg.max_retests_per_lineage() {
            return Err(LabError::ConstraintViolation(format!(
                "retest limit reached for test {} ({} of {}); escalate manually",
                test_code,
                test.retest_number,
                self.cfg.max_retests_per_lineage()
            )));
        }
        // Precondition checked here so the record append below cannot be
        // followed by a failing supersede (partial mutation).
        if test.status != TestStatus::Resulted {
            return Err(LabError::InvalidTransition {
                test_code: test_code.to_string(),
                from: test.status,
                to: TestStatus::Superseded,
            });
        }

        let order_id = order.id.clone();
        let test = order
            .test_mut(test_code)
            .ok_or_else(|| LabError::UnknownTest {
                order_id,
                test_code: test_code.to_string(),
            })?;
        test.rejection_history.push(record);

        let new_test_id = test_lifecycle::supersede_for_retest(order, test_code)?;

        Ok(RejectionOutcome {
            rejection_type: RejectionType::ReTest,
            new_test_id: Some(new_test_id),
            new_sample: None,
            order_status: order.overall_status,
        })
    }

    fn reject_for_recollect(
        &self,
        order: &mut Order,
        sample: Option<&mut Sample>,
        test_code: &str,
        record: RejectionRecord,
    ) -> LabResult<RejectionOutcome> {
        if order.test(test_code).is_none() {
            return Err(LabError::UnknownTest {
                order_id: order.id.clone(),
                test_code: test_code.to_string(),
            });
        }

        // Recollecting after partial validation would strand validated
        // results on a specimen declared unusable. Block it outright; the
        // caller must choose re-test or escalate.
        if order.has_validated_test() {
            return Err(LabError::RejectionNotPermitted(
                RejectionType::ReCollect,
                format!(
                    "order {} already has validated tests; recollection would invalidate them",
                    order.id
                ),
            ));
        }

        let sample = sample.ok_or_else(|| {
            LabError::ConstraintViolation(
                "re-collect rejection requires the sample to be supplied".into(),
            )
        })?;

        if sample.recollection_attempt >= self.cfg.max_recollections_per_chain() {
            return Err(LabError::ConstraintViolation(format!(
                "recollection limit reached for sample {} ({} of {}); escalate manually",
                sample.id,
                sample.recollection_attempt,
                self.cfg.max_recollections_per_chain()
            )));
        }

        let new_sample = sample_lifecycle::reject_and_recollect(order, sample, record)?;

        Ok(RejectionOutcome {
            rejection_type: RejectionType::ReCollect,
            new_test_id: None,
            new_sample: Some(new_sample),
            order_status: order.overall_status,
        })
    }

    /// Report remaining attempts for the disputed test and its specimen.
    ///
    /// # Errors
    ///
    /// Fails when the order has no active test with the given code.
    pub fn options(
        &self,
        order: &Order,
        test_code: &str,
        sample: Option<&Sample>,
    ) -> LabResult<RejectionOptions> {
        let test = order.test(test_code).ok_or_else(|| LabError::UnknownTest {
            order_id: order.id.clone(),
            test_code: test_code.to_string(),
        })?;

        let retests_remaining = self
            .cfg
            .max_retests_per_lineage()
            .saturating_sub(test.retest_number);

        let recollect_blocked = order.has_validated_test();
        let recollections_remaining = match sample {
            Some(sample) => self
                .cfg
                .max_recollections_per_chain()
                .saturating_sub(sample.recollection_attempt),
            None => 0,
        };

        let recollect_available = recollections_remaining > 0 && !recollect_blocked;
        Ok(RejectionOptions {
            retests_remaining,
            recollections_remaining,
            recollect_blocked,
            escalation_required: retests_remaining == 0 && !recollect_available,
        })
    }
}
