//! Workflow facade.
//!
//! [`LabService`] ties the pure components together into the operations the
//! API surface exposes: result entry (guard, classify, transition),
//! validation, rejection, and bulk validation. It is constructed with its
//! configuration and holds no mutable state; callers own the order/sample
//! values and their caching.

use crate::bulk::{self, BulkValidationItem, BulkValidationReport};
use crate::config::CoreConfig;
use crate::demographics::PatientDemographics;
use crate::model::{Order, ResultEntry, ResultValue, Sample};
use crate::rejection::{RejectionOptions, RejectionOutcome, RejectionWorkflow};
use crate::{reference_range, sample_lifecycle, test_lifecycle, LabError, LabResult};
use chrono::{DateTime, Utc};
use lis_types::{RejectionType, ResultFlag, TestStatus};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One raw result item as submitted by the bench.
#[derive(Clone, Debug, Deserialize)]
pub struct ResultInput {
    /// Raw value text; numeric when it parses as a number.
    pub value: String,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Laboratory workflow operations over caller-owned order/sample values.
#[derive(Clone)]
pub struct LabService {
    cfg: Arc<CoreConfig>,
    rejection: RejectionWorkflow,
}

impl LabService {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        let rejection = RejectionWorkflow::new(cfg.clone());
        Self { cfg, rejection }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Classify one numeric value for an item code against the configured
    /// catalog. Items without a catalog entry classify as normal.
    pub fn classify(
        &self,
        item_code: &str,
        value: f64,
        demographics: Option<&PatientDemographics>,
        as_of: DateTime<Utc>,
    ) -> ResultFlag {
        match self.cfg.catalog().get(item_code) {
            Some(range) => {
                reference_range::evaluate(value, range, demographics, as_of.date_naive())
            }
            None => ResultFlag::Normal,
        }
    }

    /// Enter results for a test on an order.
    ///
    /// Order of checks, matching the data-entry contract:
    /// 1. the physiologic limit guard runs over every item first — an
    ///    impossible value blocks the whole submission before anything is
    ///    classified or mutated;
    /// 2. each numeric value is classified against the reference range
    ///    catalog (text values classify normal);
    /// 3. the lifecycle transition to `resulted` is applied and the order's
    ///    derived status refreshed.
    ///
    /// # Errors
    ///
    /// [`LabError::Validation`] for physiologically impossible values,
    /// [`LabError::EmptyResults`] for an empty mapping,
    /// [`LabError::UnknownTest`] / [`LabError::InvalidTransition`] from the
    /// lifecycle. Nothing is mutated on any error.
    pub fn enter_results(
        &self,
        order: &mut Order,
        test_code: &str,
        inputs: &BTreeMap<String, ResultInput>,
        technician_notes: Option<String>,
        demographics: Option<&PatientDemographics>,
        now: DateTime<Utc>,
    ) -> LabResult<()> {
        if order.test(test_code).is_none() {
            return Err(LabError::UnknownTest {
                order_id: order.id.clone(),
                test_code: test_code.to_string(),
            });
        }
        if inputs.is_empty() {
            return Err(LabError::EmptyResults);
        }

        for (item_code, input) in inputs {
            self.cfg.limits().check(item_code, &input.value)?;
        }

        let mut results = BTreeMap::new();
        for (item_code, input) in inputs {
            let entry = match input.value.trim().parse::<f64>() {
                Ok(numeric) => ResultEntry {
                    flag: self.classify(item_code, numeric, demographics, now),
                    value: ResultValue::Numeric(numeric),
                    unit: input.unit.clone(),
                },
                Err(_) => ResultEntry {
                    value: ResultValue::Text(input.value.trim().to_string()),
                    unit: input.unit.clone(),
                    flag: ResultFlag::Normal,
                },
            };
            results.insert(item_code.clone(), entry);
        }

        let order_id = order.id.clone();
        let test = order
            .test_mut(test_code)
            .ok_or_else(|| LabError::UnknownTest {
                order_id,
                test_code: test_code.to_string(),
            })?;
        test_lifecycle::enter_results(test, results, technician_notes)?;
        order.refresh_status();

        tracing::debug!(order_id = %order.id, test_code, "results entered");
        Ok(())
    }

    /// Approve a resulted test and refresh the order's derived status.
    pub fn validate_test(
        &self,
        order: &mut Order,
        test_code: &str,
        validated_by: &str,
        validation_notes: Option<String>,
        validated_at: DateTime<Utc>,
    ) -> LabResult<()> {
        let order_id = order.id.clone();
        let test = order
            .test_mut(test_code)
            .ok_or_else(|| LabError::UnknownTest {
                order_id,
                test_code: test_code.to_string(),
            })?;
        test_lifecycle::validate(test, validated_by, validation_notes, validated_at)?;
        order.refresh_status();
        Ok(())
    }

    /// Reject a disputed result or specimen. See [`RejectionWorkflow::reject`].
    #[allow(clippy::too_many_arguments)]
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
        self.rejection.reject(
            order,
            sample,
            test_code,
            reason,
            rejection_type,
            rejected_by,
            rejected_at,
        )
    }

    /// Remaining-attempt report for the rejection UI.
    pub fn rejection_options(
        &self,
        order: &Order,
        test_code: &str,
        sample: Option<&Sample>,
    ) -> LabResult<RejectionOptions> {
        self.rejection.options(order, test_code, sample)
    }

    /// Best-effort bulk validation. The caller is responsible for excluding
    /// items with critical values beforehand; see [`bulk::validate_bulk`].
    pub fn validate_bulk(
        &self,
        orders: &mut BTreeMap<String, Order>,
        items: &[BulkValidationItem],
        validated_by: &str,
        validation_notes: Option<&str>,
        validated_at: DateTime<Utc>,
    ) -> BulkValidationReport {
        bulk::validate_bulk(orders, items, validated_by, validation_notes, validated_at)
    }

    /// Record a specimen draw and move the waiting tests along with it.
    ///
    /// The sample transitions to `collected` and every test on the order
    /// that references it (still in `ordered` status) transitions to
    /// `collected` as well.
    pub fn collect_sample(
        &self,
        order: &mut Order,
        sample: &mut Sample,
        collected_by: &str,
        collected_at: DateTime<Utc>,
    ) -> LabResult<()> {
        if sample.order_id != order.id {
            return Err(LabError::ConstraintViolation(format!(
                "sample {} belongs to order {}, not order {}",
                sample.id, sample.order_id, order.id
            )));
        }
        sample_lifecycle::collect(sample, collected_by, collected_at)?;

        let sample_id = sample.id.clone();
        for test in &mut order.tests {
            if test.status == TestStatus::Ordered
                && test.sample_id.as_deref() == Some(sample_id.as_str())
            {
                test_lifecycle::collect(test, &sample_id, collected_at)?;
            }
        }
        order.refresh_status();
        Ok(())
    }
}
