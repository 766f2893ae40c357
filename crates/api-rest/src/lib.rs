//! # API REST
//!
//! REST surface for the laboratory workflow core.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON wire shapes, CORS, status-code mapping)
//!
//! Mutations are applied under a store-wide write lock, and a per-row busy
//! flag additionally rejects a second validate/reject for the same
//! order+test while one is in flight (HTTP 409). Responses are never
//! retried server-side: a client that saw a timeout must treat the outcome
//! as "may have completed" and refresh, because re-issuing a rejection
//! could create a second retest.

#![warn(rust_2018_idioms)]

pub mod store;
pub mod wire;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
    Router,
};
use chrono::Utc;
use lis_core::{
    CoreConfig, LabError, LabService, Order, OrderTest, PatientDemographics, RejectionRecord,
    ResultInput, Sample,
};
use lis_types::RejectionType;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use store::{LabStore, World};
use wire::*;

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: LabService,
    pub store: LabStore,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            service: LabService::new(cfg),
            store: LabStore::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(CoreConfig::default()))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        create_order,
        list_orders,
        get_order,
        pending_entry,
        pending_validation,
        enter_results,
        validate_test,
        reject_test,
        rejection_options,
        validate_bulk,
        collect_sample,
        reject_sample,
        reject_and_recollect,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        CreateOrderReq,
        PatientDemographicsReq,
        CreateOrderRes,
        ListOrdersRes,
        OrderDto,
        OrderTestDto,
        ResultEntryDto,
        RejectionRecordDto,
        SampleDto,
        WorklistRes,
        WorklistItemDto,
        EnterResultsReq,
        ResultItemReq,
        ValidateReq,
        ValidationDecision,
        RejectReq,
        RejectRes,
        RejectionOptionsRes,
        BulkValidateReq,
        BulkValidateItemReq,
        BulkValidateRes,
        BulkItemResultDto,
        CollectSampleReq,
        RejectSampleReq,
        RecollectSampleReq,
        RecollectRes,
    ))
)]
struct ApiDoc;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:order_id", get(get_order))
        .route("/worklists/pending-entry", get(pending_entry))
        .route("/worklists/pending-validation", get(pending_validation))
        .route("/results/validate-bulk", post(validate_bulk))
        .route("/results/:order_id/tests/:test_code", post(enter_results))
        .route(
            "/results/:order_id/tests/:test_code/validate",
            post(validate_test),
        )
        .route(
            "/results/:order_id/tests/:test_code/reject",
            post(reject_test),
        )
        .route(
            "/results/:order_id/tests/:test_code/rejection-options",
            get(rejection_options),
        )
        .route("/samples/:sample_id/collect", patch(collect_sample))
        .route("/samples/:sample_id/reject", patch(reject_sample))
        .route(
            "/samples/:sample_id/reject-and-recollect",
            post(reject_and_recollect),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Error mapping
// ============================================================================

/// REST-facing error: a status code plus a human-readable message.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    /// A second mutation for a row that already has one in flight. The first
    /// request may still complete; the client must refresh, not retry.
    fn row_busy(order_id: &str, test_code: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: format!(
                "a request for order {order_id} test {test_code} is already in flight; \
                 it may have completed, refresh before retrying"
            ),
        }
    }
}

impl From<LabError> for ApiError {
    fn from(err: LabError) -> Self {
        let status = match &err {
            LabError::Validation(_) | LabError::EmptyResults => StatusCode::UNPROCESSABLE_ENTITY,
            LabError::ConstraintViolation(_)
            | LabError::RejectionNotPermitted(_, _)
            | LabError::InvalidTransition { .. }
            | LabError::InvalidSampleTransition { .. } => StatusCode::CONFLICT,
            LabError::UnknownOrder(_) | LabError::UnknownTest { .. } | LabError::UnknownSample(_) => {
                StatusCode::NOT_FOUND
            }
            LabError::Status(_)
            | LabError::TableDeserialization(_)
            | LabError::DuplicateTableEntry(_)
            | LabError::InvalidTableEntry { .. } => {
                tracing::error!("internal workflow error: {err:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorRes {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Health check response", body = HealthRes))
)]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "LIS is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderReq,
    responses(
        (status = 201, description = "Order created with its initial sample", body = CreateOrderRes),
        (status = 422, description = "Invalid request", body = ErrorRes)
    )
)]
/// Create an order with one pending sample covering all requested tests.
async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderReq>,
) -> Result<(StatusCode, Json<CreateOrderRes>), ApiError> {
    if req.patient_id.trim().is_empty() {
        return Err(LabError::Validation("patientId is required".into()).into());
    }
    if req.test_codes.is_empty() {
        return Err(LabError::Validation("at least one test code is required".into()).into());
    }

    let order_id = format!("ORD-{}", Uuid::new_v4());
    let sample_id = format!("SMP-{}", Uuid::new_v4());

    let mut sample = Sample::new(sample_id.clone(), order_id.clone());
    sample.container = Some("vacutainer".into());

    let tests = req
        .test_codes
        .iter()
        .map(|code| {
            let mut test = OrderTest::new(code.clone());
            test.sample_id = Some(sample_id.clone());
            test
        })
        .collect();

    let order = Order::new(
        order_id.clone(),
        req.patient_id.clone(),
        Utc::now(),
        req.priority,
        tests,
    );

    let mut world = state.store.write();
    if let Some(demo) = &req.demographics {
        world.patients.insert(
            req.patient_id.clone(),
            PatientDemographics::new(demo.gender, demo.date_of_birth),
        );
    }
    let res = CreateOrderRes {
        order: OrderDto::from(&order),
        sample: SampleDto::from(&sample),
    };
    world.orders.insert(order_id, order);
    world.samples.insert(sample_id, sample);

    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    get,
    path = "/orders",
    responses((status = 200, description = "All orders", body = ListOrdersRes))
)]
async fn list_orders(State(state): State<AppState>) -> Json<ListOrdersRes> {
    let world = state.store.read();
    Json(ListOrdersRes {
        orders: world.orders.values().map(OrderDto::from).collect(),
    })
}

#[utoipa::path(
    get,
    path = "/orders/{order_id}",
    params(("order_id" = String, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "The order", body = OrderDto),
        (status = 404, description = "Unknown order", body = ErrorRes)
    )
)]
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDto>, ApiError> {
    let world = state.store.read();
    let order = world
        .orders
        .get(&order_id)
        .ok_or_else(|| ApiError::from(LabError::UnknownOrder(order_id)))?;
    Ok(Json(OrderDto::from(order)))
}

#[utoipa::path(
    get,
    path = "/worklists/pending-entry",
    responses((status = 200, description = "Tests awaiting result entry", body = WorklistRes))
)]
/// Superseded tests are excluded by the core query, not by this handler.
async fn pending_entry(State(state): State<AppState>) -> Json<WorklistRes> {
    let world = state.store.read();
    Json(worklist_response(
        lis_core::workqueue::pending_entry(world.orders.values()),
        &world,
    ))
}

#[utoipa::path(
    get,
    path = "/worklists/pending-validation",
    responses((status = 200, description = "Tests awaiting approval", body = WorklistRes))
)]
async fn pending_validation(State(state): State<AppState>) -> Json<WorklistRes> {
    let world = state.store.read();
    Json(worklist_response(
        lis_core::workqueue::pending_validation(world.orders.values()),
        &world,
    ))
}

fn worklist_response(items: Vec<lis_core::WorkItem<'_>>, world: &World) -> WorklistRes {
    let items = items
        .into_iter()
        .map(|item| WorklistItemDto {
            order_id: item.order_id.to_string(),
            patient_id: item.patient_id.to_string(),
            priority: world
                .orders
                .get(item.order_id)
                .map(|o| o.priority)
                .unwrap_or(lis_types::Priority::Routine),
            test: OrderTestDto::from(item.test),
        })
        .collect();
    WorklistRes { items }
}

#[utoipa::path(
    post,
    path = "/results/{order_id}/tests/{test_code}",
    params(
        ("order_id" = String, Path, description = "Order identifier"),
        ("test_code" = String, Path, description = "Test code")
    ),
    request_body = EnterResultsReq,
    responses(
        (status = 200, description = "Updated test", body = OrderTestDto),
        (status = 404, description = "Unknown order or test", body = ErrorRes),
        (status = 409, description = "Invalid state or row busy", body = ErrorRes),
        (status = 422, description = "Physiologically impossible value", body = ErrorRes)
    )
)]
/// Submit entered results. The physiologic guard runs first and blocks the
/// whole submission on an impossible value; numeric values are then
/// classified against the demographic-aware reference ranges.
async fn enter_results(
    State(state): State<AppState>,
    Path((order_id, test_code)): Path<(String, String)>,
    Json(req): Json<EnterResultsReq>,
) -> Result<Json<OrderTestDto>, ApiError> {
    let _lease = state
        .store
        .try_claim_row(&order_id, &test_code)
        .ok_or_else(|| ApiError::row_busy(&order_id, &test_code))?;

    let mut world = state.store.write();
    let World {
        orders, patients, ..
    } = &mut *world;

    let order = orders
        .get_mut(&order_id)
        .ok_or_else(|| ApiError::from(LabError::UnknownOrder(order_id.clone())))?;
    let demographics = patients.get(&order.patient_id).copied();

    let inputs: BTreeMap<String, ResultInput> = req
        .results
        .iter()
        .map(|(code, item)| {
            (
                code.clone(),
                ResultInput {
                    value: item.value.clone(),
                    unit: item.unit.clone(),
                },
            )
        })
        .collect();

    state.service.enter_results(
        order,
        &test_code,
        &inputs,
        req.technician_notes.clone(),
        demographics.as_ref(),
        Utc::now(),
    )?;

    let test = order
        .test(&test_code)
        .ok_or_else(|| ApiError::not_found("test vanished after result entry"))?;
    Ok(Json(OrderTestDto::from(test)))
}

#[utoipa::path(
    post,
    path = "/results/{order_id}/tests/{test_code}/validate",
    params(
        ("order_id" = String, Path, description = "Order identifier"),
        ("test_code" = String, Path, description = "Test code")
    ),
    request_body = ValidateReq,
    responses(
        (status = 200, description = "Updated test", body = OrderTestDto),
        (status = 404, description = "Unknown order or test", body = ErrorRes),
        (status = 409, description = "Invalid state or row busy", body = ErrorRes)
    )
)]
async fn validate_test(
    State(state): State<AppState>,
    Path((order_id, test_code)): Path<(String, String)>,
    Json(req): Json<ValidateReq>,
) -> Result<Json<OrderTestDto>, ApiError> {
    let _lease = state
        .store
        .try_claim_row(&order_id, &test_code)
        .ok_or_else(|| ApiError::row_busy(&order_id, &test_code))?;

    let ValidateReq {
        decision: ValidationDecision::Approved,
        validation_notes,
        validated_by,
    } = req;

    let mut world = state.store.write();
    let order = world
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| ApiError::from(LabError::UnknownOrder(order_id.clone())))?;

    state.service.validate_test(
        order,
        &test_code,
        validated_by.as_deref().unwrap_or("system"),
        validation_notes,
        Utc::now(),
    )?;

    let test = order
        .test(&test_code)
        .ok_or_else(|| ApiError::not_found("test vanished after validation"))?;
    Ok(Json(OrderTestDto::from(test)))
}

#[utoipa::path(
    post,
    path = "/results/{order_id}/tests/{test_code}/reject",
    params(
        ("order_id" = String, Path, description = "Order identifier"),
        ("test_code" = String, Path, description = "Test code")
    ),
    request_body = RejectReq,
    responses(
        (status = 200, description = "Rejection applied", body = RejectRes),
        (status = 404, description = "Unknown order or test", body = ErrorRes),
        (status = 409, description = "Constraint violation or row busy", body = ErrorRes),
        (status = 422, description = "Invalid request", body = ErrorRes)
    )
)]
/// Reject a disputed result. `re-test` supersedes the test and creates its
/// successor; `re-collect` additionally rejects the specimen, creates the
/// recollection sample and escalates the order to urgent. Recollection is
/// refused outright when the order already has validated tests.
async fn reject_test(
    State(state): State<AppState>,
    Path((order_id, test_code)): Path<(String, String)>,
    Json(req): Json<RejectReq>,
) -> Result<Json<RejectRes>, ApiError> {
    let _lease = state
        .store
        .try_claim_row(&order_id, &test_code)
        .ok_or_else(|| ApiError::row_busy(&order_id, &test_code))?;

    let mut world = state.store.write();
    let World {
        orders, samples, ..
    } = &mut *world;

    let order = orders
        .get_mut(&order_id)
        .ok_or_else(|| ApiError::from(LabError::UnknownOrder(order_id.clone())))?;

    let sample_id = order
        .test(&test_code)
        .and_then(|t| t.sample_id.clone());
    let sample = sample_id.and_then(|id| samples.get_mut(&id));

    let outcome = state.service.reject(
        order,
        sample,
        &test_code,
        &req.rejection_reason,
        req.rejection_type,
        req.rejected_by.as_deref().unwrap_or("system"),
        Utc::now(),
    )?;

    let new_sample_id = outcome.new_sample.as_ref().map(|s| s.id.clone());
    if let Some(new_sample) = outcome.new_sample {
        samples.insert(new_sample.id.clone(), new_sample);
    }

    Ok(Json(RejectRes {
        rejection_type: outcome.rejection_type,
        new_test_id: outcome.new_test_id,
        new_sample_id,
        order: OrderDto::from(&*order),
    }))
}

#[utoipa::path(
    get,
    path = "/results/{order_id}/tests/{test_code}/rejection-options",
    params(
        ("order_id" = String, Path, description = "Order identifier"),
        ("test_code" = String, Path, description = "Test code")
    ),
    responses(
        (status = 200, description = "Remaining attempts", body = RejectionOptionsRes),
        (status = 404, description = "Unknown order or test", body = ErrorRes)
    )
)]
/// Remaining-attempt report to consult before offering the rejection UI.
async fn rejection_options(
    State(state): State<AppState>,
    Path((order_id, test_code)): Path<(String, String)>,
) -> Result<Json<RejectionOptionsRes>, ApiError> {
    let world = state.store.read();
    let order = world
        .orders
        .get(&order_id)
        .ok_or_else(|| ApiError::from(LabError::UnknownOrder(order_id.clone())))?;

    let sample = order
        .test(&test_code)
        .and_then(|t| t.sample_id.as_ref())
        .and_then(|id| world.samples.get(id));

    let options = state.service.rejection_options(order, &test_code, sample)?;
    Ok(Json(RejectionOptionsRes::from(options)))
}

#[utoipa::path(
    post,
    path = "/results/validate-bulk",
    request_body = BulkValidateReq,
    responses((status = 200, description = "Batch report", body = BulkValidateRes))
)]
/// Best-effort batch validation: each item is applied independently and the
/// report itemizes failures. Items carrying critical values are expected to
/// be excluded by the caller; this endpoint does not re-filter them.
async fn validate_bulk(
    State(state): State<AppState>,
    Json(req): Json<BulkValidateReq>,
) -> Json<BulkValidateRes> {
    let items: Vec<lis_core::BulkValidationItem> = req.items.iter().map(Into::into).collect();

    let mut world = state.store.write();
    let report = state.service.validate_bulk(
        &mut world.orders,
        &items,
        req.validated_by.as_deref().unwrap_or("system"),
        req.validation_notes.as_deref(),
        Utc::now(),
    );

    Json(BulkValidateRes::from(&report))
}

#[utoipa::path(
    patch,
    path = "/samples/{sample_id}/collect",
    params(("sample_id" = String, Path, description = "Sample identifier")),
    request_body = CollectSampleReq,
    responses(
        (status = 200, description = "Updated sample", body = SampleDto),
        (status = 404, description = "Unknown sample", body = ErrorRes),
        (status = 409, description = "Invalid state", body = ErrorRes)
    )
)]
/// Record a specimen draw; waiting tests on the order move to `collected`.
async fn collect_sample(
    State(state): State<AppState>,
    Path(sample_id): Path<String>,
    Json(req): Json<CollectSampleReq>,
) -> Result<Json<SampleDto>, ApiError> {
    let mut world = state.store.write();
    let World {
        orders, samples, ..
    } = &mut *world;

    let sample = samples
        .get_mut(&sample_id)
        .ok_or_else(|| ApiError::from(LabError::UnknownSample(sample_id.clone())))?;
    let order = orders
        .get_mut(&sample.order_id)
        .ok_or_else(|| ApiError::from(LabError::UnknownOrder(sample.order_id.clone())))?;

    state
        .service
        .collect_sample(order, sample, &req.collected_by, Utc::now())?;

    Ok(Json(SampleDto::from(&*sample)))
}

#[utoipa::path(
    patch,
    path = "/samples/{sample_id}/reject",
    params(("sample_id" = String, Path, description = "Sample identifier")),
    request_body = RejectSampleReq,
    responses(
        (status = 200, description = "Updated sample", body = SampleDto),
        (status = 404, description = "Unknown sample", body = ErrorRes),
        (status = 409, description = "Invalid state", body = ErrorRes)
    )
)]
/// Terminal specimen rejection without a recollection successor. Use
/// `reject-and-recollect` to chain a new draw. The rejection type from the
/// request is recorded as-is in the audit history.
async fn reject_sample(
    State(state): State<AppState>,
    Path(sample_id): Path<String>,
    Json(req): Json<RejectSampleReq>,
) -> Result<Json<SampleDto>, ApiError> {
    if req.rejection_reason.trim().is_empty() {
        return Err(LabError::Validation("rejection requires a reason".into()).into());
    }

    let mut world = state.store.write();
    let sample = world
        .samples
        .get_mut(&sample_id)
        .ok_or_else(|| ApiError::from(LabError::UnknownSample(sample_id.clone())))?;

    let record = RejectionRecord {
        reason: req.rejection_reason.trim().to_string(),
        rejection_type: req.rejection_type,
        rejected_by: req.rejected_by.as_deref().unwrap_or("system").to_string(),
        rejected_at: Utc::now(),
    };
    lis_core::sample_lifecycle::reject(sample, record)?;

    Ok(Json(SampleDto::from(&*sample)))
}

#[utoipa::path(
    post,
    path = "/samples/{sample_id}/reject-and-recollect",
    params(("sample_id" = String, Path, description = "Sample identifier")),
    request_body = RecollectSampleReq,
    responses(
        (status = 200, description = "Rejection applied, successor created", body = RecollectRes),
        (status = 404, description = "Unknown sample or order", body = ErrorRes),
        (status = 409, description = "Invalid state or validated results present", body = ErrorRes)
    )
)]
/// Reject the specimen and create its recollection successor in one
/// operation: tests are repointed, the order escalates to urgent. Refused
/// once the order has validated tests.
async fn reject_and_recollect(
    State(state): State<AppState>,
    Path(sample_id): Path<String>,
    Json(req): Json<RecollectSampleReq>,
) -> Result<Json<RecollectRes>, ApiError> {
    if req.rejection_reason.trim().is_empty() {
        return Err(LabError::Validation("rejection requires a reason".into()).into());
    }

    let mut world = state.store.write();
    let World {
        orders, samples, ..
    } = &mut *world;

    let sample = samples
        .get_mut(&sample_id)
        .ok_or_else(|| ApiError::from(LabError::UnknownSample(sample_id.clone())))?;
    let order = orders
        .get_mut(&sample.order_id)
        .ok_or_else(|| ApiError::from(LabError::UnknownOrder(sample.order_id.clone())))?;

    let record = RejectionRecord {
        reason: req.rejection_reason.trim().to_string(),
        rejection_type: RejectionType::ReCollect,
        rejected_by: req.rejected_by.as_deref().unwrap_or("system").to_string(),
        rejected_at: Utc::now(),
    };

    let new_sample = lis_core::sample_lifecycle::reject_and_recollect(order, sample, record)?;
    let res = RecollectRes {
        rejected_sample: SampleDto::from(&*sample),
        new_sample: SampleDto::from(&new_sample),
        order: OrderDto::from(&*order),
    };
    samples.insert(new_sample.id.clone(), new_sample);

    Ok(Json(res))
}
