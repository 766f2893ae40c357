use lis_types::{RejectionType, SampleStatus, TestStatus};

/// Errors produced by the laboratory workflow core.
///
/// The taxonomy mirrors how callers must react:
/// - `Validation` and `EmptyResults` are local and recoverable; they block
///   submission before any dispatch.
/// - `ConstraintViolation` and `InvalidTransition`/`InvalidSampleTransition`
///   mean the requested operation is inconsistent with current state and was
///   refused without mutating anything.
/// - `Unknown*` identify a missing entity.
/// - `Status` indicates schema drift between client and backend vocabularies
///   and must fail loudly, never default.
#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("invalid transition for test {test_code}: {from} -> {to}")]
    InvalidTransition {
        test_code: String,
        from: TestStatus,
        to: TestStatus,
    },

    #[error("invalid transition for sample {sample_id}: {from} -> {to}")]
    InvalidSampleTransition {
        sample_id: String,
        from: SampleStatus,
        to: SampleStatus,
    },

    #[error("rejection type {0} is not permitted here: {1}")]
    RejectionNotPermitted(RejectionType, String),

    #[error("result entry requires a non-empty results mapping")]
    EmptyResults,

    #[error("unknown order: {0}")]
    UnknownOrder(String),

    #[error("order {order_id} has no test with code {test_code}")]
    UnknownTest {
        order_id: String,
        test_code: String,
    },

    #[error("unknown sample: {0}")]
    UnknownSample(String),

    #[error("status vocabulary error: {0}")]
    Status(#[from] lis_types::StatusError),

    #[error("failed to deserialize configuration table: {0}")]
    TableDeserialization(#[from] serde_yaml::Error),

    #[error("duplicate configuration entry for item code {0:?}")]
    DuplicateTableEntry(String),

    #[error("configuration entry for {code:?} is invalid: {reason}")]
    InvalidTableEntry { code: String, reason: String },
}

pub type LabResult<T> = std::result::Result<T, LabError>;
