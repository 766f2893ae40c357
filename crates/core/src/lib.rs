//! # LIS Core
//!
//! Core business logic for the laboratory order/sample/test lifecycle:
//! - reference range evaluation with demographic resolution and critical
//!   escalation
//! - the physiologic limit guard
//! - order status aggregation
//! - test and sample lifecycle state machines
//! - the rejection (re-test / re-collect) workflow
//! - bulk validation
//!
//! Everything here is synchronous and side-effect-free: operations take the
//! order/sample values they work on and return results. Persistence, HTTP,
//! and caching belong to the API crates.

pub mod bulk;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod demographics;
pub mod error;
pub mod model;
pub mod order_status;
pub mod physiologic;
pub mod reference_range;
pub mod rejection;
pub mod sample_lifecycle;
pub mod service;
pub mod test_lifecycle;
pub mod workqueue;

pub use bulk::{BulkItemResult, BulkValidationItem, BulkValidationReport};
pub use catalog::{CatalogReferenceRange, RangeBand, RangeCatalog};
pub use config::CoreConfig;
pub use demographics::PatientDemographics;
pub use error::{LabError, LabResult};
pub use model::{Order, OrderTest, RejectionRecord, ResultEntry, ResultValue, Sample};
pub use physiologic::{PhysiologicLimit, PhysiologicLimitTable};
pub use rejection::{RejectionOptions, RejectionOutcome, RejectionWorkflow};
pub use service::{LabService, ResultInput};
pub use workqueue::WorkItem;
