//! Wire models for the REST surface.
//!
//! The core's domain types stay independent of the HTTP contract; these DTOs
//! are the exact JSON shapes the API speaks (camelCase keys, per the
//! frontend contract) with translation helpers from the domain types.

use chrono::{DateTime, NaiveDate, Utc};
use lis_core::{
    BulkItemResult, BulkValidationItem, BulkValidationReport, Order, OrderTest, RejectionOptions,
    RejectionRecord, ResultEntry, ResultValue, Sample,
};
use lis_types::{
    Gender, OrderStatus, PaymentStatus, Priority, RejectionType, ResultFlag, SampleStatus,
    TestStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// Responses
// ============================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntryDto {
    /// Numeric value when the result is numeric, text otherwise.
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[schema(value_type = String)]
    pub flag: ResultFlag,
}

impl From<&ResultEntry> for ResultEntryDto {
    fn from(entry: &ResultEntry) -> Self {
        let value = match &entry.value {
            ResultValue::Numeric(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(v.to_string())),
            ResultValue::Text(s) => serde_json::Value::String(s.clone()),
        };
        Self {
            value,
            unit: entry.unit.clone(),
            flag: entry.flag,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectionRecordDto {
    pub reason: String,
    #[schema(value_type = String)]
    pub rejection_type: RejectionType,
    pub rejected_by: String,
    pub rejected_at: DateTime<Utc>,
}

impl From<&RejectionRecord> for RejectionRecordDto {
    fn from(record: &RejectionRecord) -> Self {
        Self {
            reason: record.reason.clone(),
            rejection_type: record.rejection_type,
            rejected_by: record.rejected_by.clone(),
            rejected_at: record.rejected_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderTestDto {
    pub id: Uuid,
    pub test_code: String,
    #[schema(value_type = String)]
    pub status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_id: Option<String>,
    pub results: BTreeMap<String, ResultEntryDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_notes: Option<String>,
    pub rejection_history: Vec<RejectionRecordDto>,
    pub is_retest: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_test_id: Option<Uuid>,
    pub retest_number: u32,
    pub has_critical_result: bool,
}

impl From<&OrderTest> for OrderTestDto {
    fn from(test: &OrderTest) -> Self {
        Self {
            id: test.id,
            test_code: test.test_code.clone(),
            status: test.status,
            sample_id: test.sample_id.clone(),
            results: test
                .results
                .iter()
                .map(|(code, entry)| (code.clone(), ResultEntryDto::from(entry)))
                .collect(),
            technician_notes: test.technician_notes.clone(),
            validated_by: test.validated_by.clone(),
            validated_at: test.validated_at,
            validation_notes: test.validation_notes.clone(),
            rejection_history: test.rejection_history.iter().map(Into::into).collect(),
            is_retest: test.is_retest,
            original_test_id: test.original_test_id,
            retest_number: test.retest_number,
            has_critical_result: test.has_critical_result(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: String,
    pub patient_id: String,
    pub ordered_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub priority: Priority,
    #[schema(value_type = String)]
    pub overall_status: OrderStatus,
    #[schema(value_type = String)]
    pub payment_status: PaymentStatus,
    pub tests: Vec<OrderTestDto>,
}

impl From<&Order> for OrderDto {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            patient_id: order.patient_id.clone(),
            ordered_at: order.ordered_at,
            priority: order.priority,
            overall_status: order.overall_status,
            payment_status: order.payment_status,
            tests: order.tests.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SampleDto {
    pub id: String,
    pub order_id: String,
    #[schema(value_type = String)]
    pub status: SampleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_ml: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_sample_id: Option<String>,
    pub recollection_attempt: u32,
    pub rejection_history: Vec<RejectionRecordDto>,
}

impl From<&Sample> for SampleDto {
    fn from(sample: &Sample) -> Self {
        Self {
            id: sample.id.clone(),
            order_id: sample.order_id.clone(),
            status: sample.status,
            container: sample.container.clone(),
            volume_ml: sample.volume_ml,
            collected_by: sample.collected_by.clone(),
            collected_at: sample.collected_at,
            original_sample_id: sample.original_sample_id.clone(),
            recollection_attempt: sample.recollection_attempt,
            rejection_history: sample.rejection_history.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRes {
    pub order: OrderDto,
    pub sample: SampleDto,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersRes {
    pub orders: Vec<OrderDto>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorklistItemDto {
    pub order_id: String,
    pub patient_id: String,
    #[schema(value_type = String)]
    pub priority: Priority,
    pub test: OrderTestDto,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorklistRes {
    pub items: Vec<WorklistItemDto>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectRes {
    #[schema(value_type = String)]
    pub rejection_type: RejectionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_test_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_sample_id: Option<String>,
    pub order: OrderDto,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectionOptionsRes {
    pub retests_remaining: u32,
    pub recollections_remaining: u32,
    pub recollect_blocked: bool,
    pub escalation_required: bool,
}

impl From<RejectionOptions> for RejectionOptionsRes {
    fn from(options: RejectionOptions) -> Self {
        Self {
            retests_remaining: options.retests_remaining,
            recollections_remaining: options.recollections_remaining,
            recollect_blocked: options.recollect_blocked,
            escalation_required: options.escalation_required,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemResultDto {
    pub order_id: String,
    pub test_code: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&BulkItemResult> for BulkItemResultDto {
    fn from(result: &BulkItemResult) -> Self {
        Self {
            order_id: result.order_id.clone(),
            test_code: result.test_code.clone(),
            success: result.success,
            error: result.error.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkValidateRes {
    pub results: Vec<BulkItemResultDto>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl From<&BulkValidationReport> for BulkValidateRes {
    fn from(report: &BulkValidationReport) -> Self {
        Self {
            results: report.results.iter().map(Into::into).collect(),
            success_count: report.success_count,
            failure_count: report.failure_count,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecollectRes {
    pub rejected_sample: SampleDto,
    pub new_sample: SampleDto,
    pub order: OrderDto,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientDemographicsReq {
    #[schema(value_type = String)]
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderReq {
    pub patient_id: String,
    #[serde(default)]
    pub demographics: Option<PatientDemographicsReq>,
    #[schema(value_type = String)]
    pub priority: Priority,
    pub test_codes: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultItemReq {
    pub value: String,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnterResultsReq {
    pub results: BTreeMap<String, ResultItemReq>,
    #[serde(default)]
    pub technician_notes: Option<String>,
    #[serde(default)]
    pub entered_by: Option<String>,
}

/// Approval is the only decision this endpoint accepts; rejection goes
/// through the dedicated reject endpoint. An unknown decision string fails
/// deserialization rather than being coerced.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValidationDecision {
    Approved,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateReq {
    pub decision: ValidationDecision,
    #[serde(default)]
    pub validation_notes: Option<String>,
    #[serde(default)]
    pub validated_by: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectReq {
    pub rejection_reason: String,
    #[schema(value_type = String)]
    pub rejection_type: RejectionType,
    #[serde(default)]
    pub rejected_by: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkValidateItemReq {
    pub order_id: String,
    pub test_code: String,
}

impl From<&BulkValidateItemReq> for BulkValidationItem {
    fn from(item: &BulkValidateItemReq) -> Self {
        Self {
            order_id: item.order_id.clone(),
            test_code: item.test_code.clone(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkValidateReq {
    pub items: Vec<BulkValidateItemReq>,
    #[serde(default)]
    pub validation_notes: Option<String>,
    #[serde(default)]
    pub validated_by: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectSampleReq {
    pub collected_by: String,
}

/// Terminal specimen rejection. The disposition label is caller-supplied so
/// the audit record reflects what was actually decided (e.g. `re-test` when
/// the remaining work moves to another specimen).
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectSampleReq {
    pub rejection_reason: String,
    #[schema(value_type = String)]
    pub rejection_type: RejectionType,
    #[serde(default)]
    pub rejected_by: Option<String>,
}

/// Reject-and-recollect carries an implied `re-collect` disposition, so the
/// request names only the reason and actor.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecollectSampleReq {
    pub rejection_reason: String,
    #[serde(default)]
    pub rejected_by: Option<String>,
}
